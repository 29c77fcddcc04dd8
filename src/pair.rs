use crate::camera::CameraIntrinsics;
use crate::error::PairError;
use crate::essential::EightPoint;
use crate::matcher;
use crate::matches::{BearingMatch, Correspondence};
use crate::pose;
use crate::reprojection;
use crate::settings::HeightSettings;
use crate::triangulation::{self, DltTriangulator};
use akaze::Akaze;
use arrsac::Arrsac;
use image::DynamicImage;
use log::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use sample_consensus::Consensus;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The reconstruction report of one adjacent image pair. Produced once per
/// pair and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PairResult {
    /// The smallest accepted depth coordinate, in baseline units.
    pub min_depth: f64,
    /// The largest accepted depth coordinate, in baseline units.
    pub max_depth: f64,
    /// Cheirality-consistent inliers the pose was recovered from.
    pub inlier_count: usize,
    /// Mean pixel reprojection error over both views.
    pub mean_reprojection_error: f64,
}

impl PairResult {
    /// The depth spread of the reconstruction. Non-negative by
    /// construction, since both bounds come from the same survivor set.
    pub fn extent(&self) -> f64 {
        self.max_depth - self.min_depth
    }
}

/// Runs the reconstruction stages for one adjacent image pair:
/// matching, calibration, essential matrix consensus, pose recovery with
/// baseline scaling, triangulation, and reprojection validation.
///
/// Every stage either advances the pair or terminates it with the
/// [`PairError`] of that stage. A pair is evaluated exactly once; with a
/// fixed consensus seed the outcome is deterministic.
pub struct PairPipeline<'a> {
    intrinsics: &'a CameraIntrinsics,
    baseline: f64,
    settings: &'a HeightSettings,
}

impl<'a> PairPipeline<'a> {
    /// `intrinsics` are shared read-only; `baseline` is the physical
    /// distance between the two camera positions.
    pub fn new(
        intrinsics: &'a CameraIntrinsics,
        baseline: f64,
        settings: &'a HeightSettings,
    ) -> Self {
        Self {
            intrinsics,
            baseline,
            settings,
        }
    }

    /// The full pipeline from a pair of frames.
    pub fn evaluate(&self, a: &DynamicImage, b: &DynamicImage) -> Result<PairResult, PairError> {
        let akaze = Akaze::new(self.settings.akaze_threshold);
        let correspondences = matcher::match_pair(&akaze, a, b, self.settings)?;
        self.evaluate_correspondences(&correspondences)
    }

    /// The geometric stages over an externally produced correspondence
    /// set.
    ///
    /// Feature matching is a capability, not a commitment; when
    /// correspondences come from another matching engine, hand them in
    /// here, best quality first.
    pub fn evaluate_correspondences(
        &self,
        correspondences: &[Correspondence],
    ) -> Result<PairResult, PairError> {
        // Calibration lifts the pixel observations to undistorted
        // bearings; lens correction happens here, per point.
        let bearings: Vec<BearingMatch> = correspondences
            .iter()
            .map(|correspondence| {
                BearingMatch(
                    self.intrinsics.calibrate(correspondence.a),
                    self.intrinsics.calibrate(correspondence.b),
                )
            })
            .collect();

        // The essential matrix under sample consensus. The pixel threshold
        // becomes a normalized-coordinate threshold through the focal
        // length.
        let estimator = EightPoint::new();
        let threshold = self.settings.consensus_inlier_threshold / self.intrinsics.mean_focal();
        let mut consensus = Arrsac::new(
            threshold,
            Xoshiro256PlusPlus::seed_from_u64(self.settings.consensus_seed),
        );
        let (essential, inliers) = consensus
            .model_inliers(&estimator, bearings.iter().copied())
            .ok_or(PairError::DegenerateGeometry)?;
        debug!("essential matrix supported by {} inliers", inliers.len());
        if inliers.len() < self.settings.minimum_consensus_inliers {
            return Err(PairError::InsufficientInliers {
                found: inliers.len(),
                minimum: self.settings.minimum_consensus_inliers,
            });
        }
        let inlier_correspondences: Vec<Correspondence> =
            inliers.iter().map(|&ix| correspondences[ix]).collect();
        let inlier_bearings: Vec<BearingMatch> =
            inliers.iter().map(|&ix| bearings[ix]).collect();

        // Pose recovery, then the one step that makes the reconstruction
        // metric: scaling the unit translation by the baseline.
        let triangulator = DltTriangulator::new();
        let (unscaled, consistent) = pose::recover_pose(
            &essential,
            &inlier_bearings,
            &triangulator,
            estimator.epsilon,
            estimator.iterations,
        )
        .ok_or(PairError::PoseRecoveryFailed {
            found: 0,
            minimum: self.settings.minimum_pose_inliers,
        })?;
        if consistent.len() < self.settings.minimum_pose_inliers {
            return Err(PairError::PoseRecoveryFailed {
                found: consistent.len(),
                minimum: self.settings.minimum_pose_inliers,
            });
        }
        let inlier_count = consistent.len();
        let pose = unscaled.scale(self.baseline);
        let consistent_correspondences: Vec<Correspondence> = consistent
            .iter()
            .map(|&ix| inlier_correspondences[ix])
            .collect();
        let consistent_bearings: Vec<BearingMatch> =
            consistent.iter().map(|&ix| inlier_bearings[ix]).collect();

        // Triangulation with the depth plausibility filter.
        let maximum_depth = self.settings.maximum_depth_factor * self.baseline;
        let triangulated = triangulation::triangulate_pair(
            &triangulator,
            &pose,
            &consistent_bearings,
            maximum_depth,
        )?;

        // Reprojection validation closes the loop back to pixels.
        let mean_reprojection_error = reprojection::validate(
            self.intrinsics,
            &pose,
            &consistent_correspondences,
            &triangulated.points,
            self.settings.maximum_reprojection_error,
        )?;

        Ok(PairResult {
            min_depth: triangulated.min_depth,
            max_depth: triangulated.max_depth,
            inlier_count,
            mean_reprojection_error,
        })
    }
}
