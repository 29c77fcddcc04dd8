use crate::matches::BearingMatch;
use crate::pose::RelativePose;
use float_ord::FloatOrd;
use nalgebra::{Matrix3, OMatrix, OVector, Rotation3, Vector3, SVD, U8, U9};
use sample_consensus::{Estimator, Model};

/// This stores an essential matrix, which is satisfied by the following
/// constraint:
///
/// transpose(x') * E * x = 0
///
/// Where `x'` and `x` are homogeneous normalized image coordinates of the
/// second and first view respectively. The essential matrix embodies the
/// epipolar constraint between two calibrated views: it encodes the
/// relative rotation and the direction of translation between them, but
/// not the translation's length.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct EssentialMatrix(pub Matrix3<f64>);

impl EssentialMatrix {
    /// Can be used to enforce the constraints of an essential matrix to fix it.
    ///
    /// This finds the closest essential matrix in frobenius form. This just means
    /// that the two non-zero singular values are averaged and the null singular
    /// value is forced to zero.
    pub fn recondition(self, epsilon: f64, max_iterations: usize) -> Option<Self> {
        let mut svd = self.0.try_svd(true, true, epsilon, max_iterations)?;
        svd.singular_values[2] = 0.0;
        let averaged = (svd.singular_values[0] + svd.singular_values[1]) / 2.0;
        svd.singular_values[0] = averaged;
        svd.singular_values[1] = averaged;
        // Cannot fail because we asked for both U and V* on decomp.
        let mat = svd.recompose().ok()?;
        Some(Self(mat))
    }

    /// Returns the two possible rotations for the essential matrix along
    /// with a unit translation bearing whose sign is undetermined.
    ///
    /// `epsilon` is the threshold by which the singular value decomposition
    /// is considered complete and `max_iterations` caps its execution time.
    pub fn possible_rotations_unscaled_translation(
        &self,
        epsilon: f64,
        max_iterations: usize,
    ) -> Option<(Rotation3<f64>, Rotation3<f64>, Vector3<f64>)> {
        let Self(essential) = *self;

        // `W` from https://en.wikipedia.org/wiki/Essential_matrix#Finding_one_solution.
        let w = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let wt = w.transpose();

        let svd = SVD::try_new(essential, true, true, epsilon, max_iterations)?;
        let mut u = svd.u?;
        let mut v_t = svd.v_t?;
        // Force the determinants to be positive to keep the handedness of
        // the rotation matrices correct.
        // Last column of U is undetermined since d = (a a 0).
        if u.determinant() < 0.0 {
            for n in u.column_mut(2).iter_mut() {
                *n *= -1.0;
            }
        }
        // Last row of V* is undetermined since d = (a a 0).
        if v_t.determinant() < 0.0 {
            for n in v_t.row_mut(2).iter_mut() {
                *n *= -1.0;
            }
        }
        Some((
            Rotation3::from_matrix_unchecked(u * w * v_t),
            Rotation3::from_matrix_unchecked(u * wt * v_t),
            u.column(2).into_owned(),
        ))
    }

    /// See [`EssentialMatrix::possible_rotations_unscaled_translation`].
    ///
    /// This returns the four candidate poses formed from the two rotations
    /// and the two translation signs. Exactly one of them places real
    /// scene points in front of both cameras; picking it is the job of the
    /// cheirality test in pose recovery.
    pub fn possible_unscaled_poses(
        &self,
        epsilon: f64,
        max_iterations: usize,
    ) -> Option<[RelativePose; 4]> {
        self.possible_rotations_unscaled_translation(epsilon, max_iterations)
            .map(|(rot_a, rot_b, t)| {
                [
                    RelativePose::from_parts(t, rot_a),
                    RelativePose::from_parts(t, rot_b),
                    RelativePose::from_parts(-t, rot_a),
                    RelativePose::from_parts(-t, rot_b),
                ]
            })
    }
}

/// Generates the essential matrix corresponding to this relative camera
/// pose.
impl From<RelativePose> for EssentialMatrix {
    fn from(pose: RelativePose) -> Self {
        Self(pose.0.translation.vector.cross_matrix() * *pose.0.rotation.matrix())
    }
}

impl Model<BearingMatch> for EssentialMatrix {
    /// The first-order (Sampson) approximation of the geometric epipolar
    /// distance, in normalized image coordinates. Dividing a pixel
    /// threshold by the focal length gives a threshold for this residual.
    fn residual(&self, data: &BearingMatch) -> f64 {
        let Self(essential) = *self;
        let &BearingMatch(a, b) = data;
        let a = a.into_inner() / a.z;
        let b = b.into_inner() / b.z;
        let ea = essential * a;
        let etb = essential.transpose() * b;
        let constraint = b.dot(&ea);
        let gradient =
            ea.x * ea.x + ea.y * ea.y + etb.x * etb.x + etb.y * etb.y;
        if gradient <= f64::EPSILON {
            return f64::INFINITY;
        }
        (constraint * constraint / gradient).sqrt()
    }
}

fn encode_epipolar_equation(
    matches: impl Iterator<Item = BearingMatch>,
) -> OMatrix<f64, U8, U9> {
    let mut out: OMatrix<f64, U8, U9> = nalgebra::zero();
    for (i, BearingMatch(a, b)) in (0..8).zip(matches) {
        let mut row = OVector::<f64, U9>::zeros();
        let ap = a.into_inner() / a.z;
        let bp = b.into_inner() / b.z;
        for j in 0..3 {
            let v = ap[j] * bp;
            row.fixed_rows_mut::<3>(3 * j).copy_from(&v);
        }
        out.row_mut(i).copy_from(&row.transpose());
    }
    out
}

/// Performs the
/// [eight-point algorithm](https://en.wikipedia.org/wiki/Eight-point_algorithm)
/// by Richard Hartley and Andrew Zisserman on calibrated bearings.
///
/// The estimated matrix is reconditioned with
/// [`EssentialMatrix::recondition`] before it is handed to consensus.
#[derive(Copy, Clone, Debug)]
pub struct EightPoint {
    pub epsilon: f64,
    pub iterations: usize,
}

impl EightPoint {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_matches<I>(&self, data: I) -> Option<EssentialMatrix>
    where
        I: Iterator<Item = BearingMatch> + Clone,
    {
        let epipolar_constraint = encode_epipolar_equation(data);
        let eet = epipolar_constraint.transpose() * epipolar_constraint;
        let eigens = eet.try_symmetric_eigen(self.epsilon, self.iterations)?;
        let eigenvector = eigens
            .eigenvalues
            .iter()
            .enumerate()
            .min_by_key(|&(_, &n)| FloatOrd(n))
            .map(|(ix, _)| eigens.eigenvectors.column(ix).into_owned())?;
        let mat = Matrix3::from_iterator(eigenvector.iter().copied());
        Some(EssentialMatrix(mat))
    }
}

impl Default for EightPoint {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            iterations: 1000,
        }
    }
}

impl Estimator<BearingMatch> for EightPoint {
    type Model = EssentialMatrix;
    type ModelIter = Option<EssentialMatrix>;
    const MIN_SAMPLES: usize = 8;

    fn estimate<I>(&self, data: I) -> Self::ModelIter
    where
        I: Iterator<Item = BearingMatch> + Clone,
    {
        self.from_matches(data)
            .and_then(|essential| essential.recondition(self.epsilon, self.iterations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Unit};

    fn pose() -> RelativePose {
        RelativePose::from_parts(
            Vector3::new(-0.8, 0.4, 0.5),
            Rotation3::from_euler_angles(0.2, 0.3, 0.4),
        )
    }

    fn scene() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.3, 0.1, 4.0),
            Point3::new(-0.6, -0.2, 5.0),
            Point3::new(0.9, 0.4, 6.5),
            Point3::new(-0.1, 0.6, 3.5),
            Point3::new(0.2, -0.5, 7.0),
            Point3::new(-0.8, 0.3, 4.5),
            Point3::new(0.5, -0.1, 5.5),
            Point3::new(0.4, 0.8, 6.0),
            Point3::new(-0.3, -0.7, 8.0),
            Point3::new(0.1, 0.2, 4.8),
        ]
    }

    fn matches_from(pose: RelativePose) -> Vec<BearingMatch> {
        scene()
            .into_iter()
            .map(|p| {
                let transformed = pose.isometry() * p;
                BearingMatch(
                    Unit::new_normalize(p.coords),
                    Unit::new_normalize(transformed.coords),
                )
            })
            .collect()
    }

    #[test]
    fn pose_essential_has_zero_residual() {
        let essential = EssentialMatrix::from(pose());
        for data in matches_from(pose()) {
            assert!(essential.residual(&data) < 1e-9);
        }
    }

    #[test]
    fn recondition_zeroes_the_null_singular_value() {
        let essential = EssentialMatrix(Matrix3::new(
            0.7, -0.3, 0.44, 0.12, 0.9, -0.63, -0.25, 0.51, 0.08,
        ));
        let reconditioned = essential.recondition(1e-9, 100).unwrap();
        let svd = reconditioned.0.svd(false, false);
        assert!(svd.singular_values[2].abs() < 1e-9);
        assert!(
            (svd.singular_values[0] - svd.singular_values[1]).abs()
                < 1e-9 * svd.singular_values[0].max(1.0)
        );
    }

    #[test]
    fn decomposition_recovers_the_pose() {
        let pose = pose();
        let essential = EssentialMatrix::from(pose);
        let candidates = essential.possible_unscaled_poses(1e-9, 100).unwrap();
        let one_correct = candidates.iter().any(|candidate| {
            let angle_residual = candidate
                .isometry()
                .rotation
                .rotation_to(&pose.isometry().rotation)
                .angle();
            let translation_residual = 1.0
                - candidate
                    .isometry()
                    .translation
                    .vector
                    .normalize()
                    .dot(&pose.isometry().translation.vector.normalize());
            angle_residual < 1e-6 && translation_residual < 1e-6
        });
        assert!(one_correct);
    }

    #[test]
    fn eight_point_recovers_the_essential_matrix() {
        let pose = pose();
        let matches = matches_from(pose);
        let estimated = EightPoint::new()
            .estimate(matches.iter().copied().take(8))
            .unwrap();
        for data in &matches {
            assert!(
                estimated.residual(data) < 1e-6,
                "residual {}",
                estimated.residual(data)
            );
        }
    }
}
