use crate::error::PairError;
use crate::matches::BearingMatch;
use crate::point::ScenePoint;
use crate::pose::RelativePose;
use log::*;
use nalgebra::{Matrix4, RowVector4, UnitVector3};

/// Homogeneous weights below this magnitude mark a point at infinity.
const WEIGHT_EPSILON: f64 = 1e-6;

/// Two-view triangulator based on algorithm 12 from "Multiple View
/// Geometry in Computer Vision, Second Edition".
///
/// The reference view sits at the identity pose and the second view at the
/// relative pose, so the triangulated point comes out in the reference
/// camera's frame. When the pose translation carries the physical
/// baseline, the point is metric.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct DltTriangulator {
    epsilon: f64,
    max_iterations: usize,
}

impl DltTriangulator {
    /// Creates a `DltTriangulator` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the epsilon used in the SVD solver.
    ///
    /// Default is `1e-12`.
    #[must_use]
    pub fn epsilon(self, epsilon: f64) -> Self {
        Self { epsilon, ..self }
    }

    /// Set the maximum number of iterations for the SVD solver.
    ///
    /// Default is `1000`.
    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    /// Triangulate a point from bearings `a` and `b` observed by the
    /// reference camera and the posed camera respectively.
    ///
    /// Returns `None` when the solve fails, when the result is not finite,
    /// or when the point does not lie in front of both cameras.
    pub fn triangulate(
        &self,
        relative_pose: &RelativePose,
        a: UnitVector3<f64>,
        b: UnitVector3<f64>,
    ) -> Option<ScenePoint> {
        let pose = relative_pose.homogeneous();
        let mut design = Matrix4::zeros();
        design
            .row_mut(0)
            .copy_from(&RowVector4::new(-a.z, 0.0, a.x, 0.0));
        design
            .row_mut(1)
            .copy_from(&RowVector4::new(0.0, -a.z, a.y, 0.0));
        design
            .row_mut(2)
            .copy_from(&(b.x * pose.row(2) - b.z * pose.row(0)));
        design
            .row_mut(3)
            .copy_from(&(b.y * pose.row(2) - b.z * pose.row(1)));

        let svd = design.try_svd(false, true, self.epsilon, self.max_iterations)?;

        // The null-space vector of V* corresponding to the smallest
        // singular value is the homogeneous coordinate of the point.
        let mut homogeneous = svd.v_t?.row(3).transpose();
        // The SVD leaves the sign arbitrary. A positive weight keeps the
        // bearing of the point unambiguous.
        if homogeneous.w < 0.0 {
            homogeneous = -homogeneous;
        }
        Some(ScenePoint(homogeneous))
            .filter(|point| point.homogeneous().iter().all(|n| n.is_finite()))
            .filter(|&point| {
                // The cheirality constraint in both views.
                point.bearing().dot(&a).is_sign_positive()
                    && relative_pose
                        .transform(point)
                        .bearing()
                        .dot(&b)
                        .is_sign_positive()
            })
    }
}

impl Default for DltTriangulator {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            max_iterations: 1000,
        }
    }
}

/// The points that survived triangulation, keyed by the index of the match
/// they came from, together with the observed depth window.
pub(crate) struct TriangulatedPair {
    pub points: Vec<(usize, ScenePoint)>,
    pub min_depth: f64,
    pub max_depth: f64,
}

/// Triangulates every match under the scaled pose, keeping points whose
/// homogeneous weight is sound and whose depth is positive and below
/// `maximum_depth`. Tracks the running depth window of the survivors.
pub(crate) fn triangulate_pair(
    triangulator: &DltTriangulator,
    pose: &RelativePose,
    matches: &[BearingMatch],
    maximum_depth: f64,
) -> Result<TriangulatedPair, PairError> {
    let mut points = Vec::with_capacity(matches.len());
    let mut min_depth = f64::MAX;
    let mut max_depth = f64::MIN;
    for (ix, &BearingMatch(a, b)) in matches.iter().enumerate() {
        let point = match triangulator.triangulate(pose, a, b) {
            Some(point) => point,
            None => continue,
        };
        let homogeneous = point.homogeneous();
        if homogeneous.w.abs() < WEIGHT_EPSILON {
            continue;
        }
        let depth = homogeneous.z / homogeneous.w;
        if depth <= 0.0 || depth >= maximum_depth {
            continue;
        }
        min_depth = min_depth.min(depth);
        max_depth = max_depth.max(depth);
        points.push((ix, point));
    }
    if points.is_empty() {
        return Err(PairError::TriangulationEmpty);
    }
    debug!(
        "triangulated {} of {} matches, depth window {:.3}..{:.3}",
        points.len(),
        matches.len(),
        min_depth,
        max_depth
    );
    Ok(TriangulatedPair {
        points,
        min_depth,
        max_depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Rotation3, Unit, Vector3};

    fn bearing(point: Point3<f64>) -> UnitVector3<f64> {
        Unit::new_normalize(point.coords)
    }

    #[test]
    fn triangulates_a_known_point() {
        let point = Point3::new(0.3, 0.1, 2.0);
        let pose = RelativePose::from_parts(
            Vector3::new(0.1, 0.1, 0.1),
            Rotation3::new(Vector3::new(0.1, 0.1, 0.1)),
        );
        let a = bearing(point);
        let b = bearing(pose.isometry() * point);
        let triangulated = DltTriangulator::new()
            .triangulate(&pose, a, b)
            .unwrap()
            .point()
            .unwrap();
        assert!((point.coords - triangulated.coords).norm() < 1e-9);
    }

    #[test]
    fn rejects_a_point_behind_the_cameras() {
        let point = Point3::new(0.2, -0.1, -3.0);
        let pose = RelativePose::from_parts(Vector3::new(0.5, 0.0, 0.0), Rotation3::identity());
        let a = bearing(point);
        let b = bearing(pose.isometry() * point);
        assert!(DltTriangulator::new().triangulate(&pose, a, b).is_none());
    }

    #[test]
    fn depth_window_spans_the_scene() {
        let pose = RelativePose::from_parts(Vector3::new(0.8, 0.0, 0.0), Rotation3::identity());
        let points = [
            Point3::new(0.3, 0.1, 4.0),
            Point3::new(-0.2, 0.2, 6.0),
            Point3::new(0.1, -0.3, 9.0),
        ];
        let matches: Vec<BearingMatch> = points
            .iter()
            .map(|&p| BearingMatch(bearing(p), bearing(pose.isometry() * p)))
            .collect();
        let triangulated =
            triangulate_pair(&DltTriangulator::new(), &pose, &matches, 100.0).unwrap();
        assert_eq!(triangulated.points.len(), 3);
        assert!((triangulated.min_depth - 4.0).abs() < 1e-6);
        assert!((triangulated.max_depth - 9.0).abs() < 1e-6);
    }

    #[test]
    fn depth_ceiling_can_empty_the_pair() {
        let pose = RelativePose::from_parts(Vector3::new(0.8, 0.0, 0.0), Rotation3::identity());
        let point = Point3::new(0.3, 0.1, 4.0);
        let matches = vec![BearingMatch(
            bearing(point),
            bearing(pose.isometry() * point),
        )];
        let outcome = triangulate_pair(&DltTriangulator::new(), &pose, &matches, 2.0);
        assert_eq!(outcome.err(), Some(PairError::TriangulationEmpty));
    }
}
