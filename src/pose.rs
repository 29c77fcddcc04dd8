use crate::essential::EssentialMatrix;
use crate::matches::BearingMatch;
use crate::point::ScenePoint;
use crate::triangulation::DltTriangulator;
use log::*;
use nalgebra::{IsometryMatrix3, Matrix4, Rotation3, Vector3};

/// The pose of the second camera relative to the first, transforming
/// points in the first camera's frame into the second camera's frame.
///
/// Camera space is defined as thus:
///
/// * Origin is the optical center
/// * Positive z axis is forwards
/// * Positive y axis is down
/// * Positive x axis is right
///
/// Note that this is a right-handed coordinate space.
///
/// As recovered from an essential matrix the translation is a unit
/// vector; [`RelativePose::scale`] with the physical baseline distance is
/// the single step that gives the reconstruction metric units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativePose(pub IsometryMatrix3<f64>);

impl RelativePose {
    /// Creates a pose with no change in position or orientation.
    pub fn identity() -> Self {
        Self(IsometryMatrix3::identity())
    }

    /// Create the pose from rotation and translation.
    pub fn from_parts(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self(IsometryMatrix3::from_parts(translation.into(), rotation))
    }

    /// Retrieve the isometry.
    pub fn isometry(self) -> IsometryMatrix3<f64> {
        self.0
    }

    /// Retrieve the homogeneous matrix.
    pub fn homogeneous(self) -> Matrix4<f64> {
        self.0.to_homogeneous()
    }

    /// Applies a scale factor to the translation component of the pose.
    #[must_use]
    pub fn scale(self, scale: f64) -> Self {
        let mut isometry = self.0;
        isometry.translation.vector *= scale;
        Self(isometry)
    }

    /// Transform a point in the first camera's frame into the second
    /// camera's frame.
    pub fn transform(self, point: ScenePoint) -> ScenePoint {
        ScenePoint(self.homogeneous() * point.homogeneous())
    }
}

impl From<IsometryMatrix3<f64>> for RelativePose {
    fn from(isometry: IsometryMatrix3<f64>) -> Self {
        Self(isometry)
    }
}

/// Recovers the relative pose from an essential matrix by testing the
/// four decomposition candidates against the inlier matches.
///
/// Each candidate is scored by the number of matches it triangulates in
/// front of both cameras, and the candidate with the most survivors wins.
/// Returns the winning unscaled pose and the indices of its
/// cheirality-consistent matches, or `None` when the decomposition fails
/// or no candidate places a single point in front of both cameras.
pub(crate) fn recover_pose(
    essential: &EssentialMatrix,
    matches: &[BearingMatch],
    triangulator: &DltTriangulator,
    epsilon: f64,
    max_iterations: usize,
) -> Option<(RelativePose, Vec<usize>)> {
    let candidates = essential.possible_unscaled_poses(epsilon, max_iterations)?;
    let mut best: Option<(RelativePose, Vec<usize>)> = None;
    for pose in candidates {
        let consistent: Vec<usize> = matches
            .iter()
            .enumerate()
            .filter(|(_, &BearingMatch(a, b))| triangulator.triangulate(&pose, a, b).is_some())
            .map(|(ix, _)| ix)
            .collect();
        if best
            .as_ref()
            .map_or(true, |(_, winner)| consistent.len() > winner.len())
        {
            best = Some((pose, consistent));
        }
    }
    let (pose, consistent) = best?;
    trace!(
        "pose recovery kept {} of {} matches",
        consistent.len(),
        matches.len()
    );
    if consistent.is_empty() {
        None
    } else {
        Some((pose, consistent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Unit};

    fn bearing(point: Point3<f64>) -> nalgebra::UnitVector3<f64> {
        Unit::new_normalize(point.coords)
    }

    #[test]
    fn recovers_the_cheirality_consistent_pose() {
        let rotation = Rotation3::from_euler_angles(0.02, -0.01, 0.03);
        let translation = Vector3::new(0.7, 0.1, -0.2);
        let pose = RelativePose::from_parts(translation, rotation);

        // A handful of points in front of both cameras.
        let points = [
            Point3::new(0.3, 0.1, 4.0),
            Point3::new(-0.6, -0.2, 5.0),
            Point3::new(0.9, 0.4, 6.5),
            Point3::new(-0.1, 0.6, 3.5),
            Point3::new(0.2, -0.5, 7.0),
            Point3::new(-0.8, 0.3, 4.5),
            Point3::new(0.5, -0.1, 5.5),
            Point3::new(0.0, 0.2, 6.0),
            Point3::new(-0.4, -0.6, 8.0),
            Point3::new(0.7, 0.7, 4.2),
        ];
        let matches: Vec<BearingMatch> = points
            .iter()
            .map(|&p| {
                let transformed = pose.isometry() * p;
                BearingMatch(bearing(p), bearing(transformed))
            })
            .collect();

        let essential = EssentialMatrix::from(pose);
        let triangulator = DltTriangulator::new();
        let (recovered, consistent) =
            recover_pose(&essential, &matches, &triangulator, 1e-12, 1000).unwrap();

        assert_eq!(consistent.len(), matches.len());
        let angle = recovered
            .isometry()
            .rotation
            .rotation_to(&rotation)
            .angle();
        assert!(angle < 1e-6, "rotation residual {}", angle);
        let direction_residual = 1.0
            - recovered
                .isometry()
                .translation
                .vector
                .normalize()
                .dot(&translation.normalize());
        assert!(
            direction_residual < 1e-6,
            "translation direction residual {}",
            direction_residual
        );
    }

    #[test]
    fn scale_applies_the_baseline() {
        let pose = RelativePose::from_parts(
            Vector3::new(1.0, 0.0, 0.0),
            Rotation3::identity(),
        );
        let scaled = pose.scale(12.5);
        assert_eq!(scaled.isometry().translation.vector, Vector3::new(12.5, 0.0, 0.0));
    }
}
