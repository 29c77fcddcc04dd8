#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The settings for the height estimation process.
///
/// Every threshold that has been observed to vary between deployments is a
/// field here rather than a constant in the code. The defaults are the
/// values that have worked on handheld capture sequences of a few dozen
/// centimeters of baseline; expect to retune `minimum_keypoints`,
/// `minimum_consensus_inliers`, and `maximum_reprojection_error` for other
/// capture styles.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HeightSettings {
    /// The detector response threshold handed to AKAZE.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_akaze_threshold")
    )]
    pub akaze_threshold: f64,
    /// The minimum keypoints each view must yield before matching is attempted.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_minimum_keypoints")
    )]
    pub minimum_keypoints: usize,
    /// The fraction of matches, best descriptor distance first, to retain.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_match_retention_fraction")
    )]
    pub match_retention_fraction: f64,
    /// If the retained fraction would fall below this count, all matches
    /// are kept instead.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_match_retention_floor")
    )]
    pub match_retention_floor: usize,
    /// The minimum retained correspondences needed to attempt geometry.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_minimum_matches")
    )]
    pub minimum_matches: usize,
    /// The sample consensus inlier threshold, in pixels of epipolar
    /// (Sampson) distance.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_consensus_inlier_threshold")
    )]
    pub consensus_inlier_threshold: f64,
    /// The minimum inliers that must support the essential matrix.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_minimum_consensus_inliers")
    )]
    pub minimum_consensus_inliers: usize,
    /// The minimum cheirality-consistent inliers after pose recovery.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_minimum_pose_inliers")
    )]
    pub minimum_pose_inliers: usize,
    /// The ceiling on the mean reprojection error, in pixels.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_maximum_reprojection_error")
    )]
    pub maximum_reprojection_error: f64,
    /// Triangulated depths beyond this multiple of the baseline are
    /// rejected as implausible.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_maximum_depth_factor")
    )]
    pub maximum_depth_factor: f64,
    /// Depth extents at or below this value, in baseline units, are
    /// treated as noise and do not contribute to the average.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_minimum_extent")
    )]
    pub minimum_extent: f64,
    /// Optional sanity ceiling on a contributing depth extent, in baseline
    /// units. `None` disables the bound.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_maximum_extent")
    )]
    pub maximum_extent: Option<f64>,
    /// The seed for the consensus RNG. The estimator is reseeded with this
    /// value for every pair, so runs are reproducible.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_consensus_seed")
    )]
    pub consensus_seed: u64,
}

impl Default for HeightSettings {
    fn default() -> Self {
        Self {
            akaze_threshold: default_akaze_threshold(),
            minimum_keypoints: default_minimum_keypoints(),
            match_retention_fraction: default_match_retention_fraction(),
            match_retention_floor: default_match_retention_floor(),
            minimum_matches: default_minimum_matches(),
            consensus_inlier_threshold: default_consensus_inlier_threshold(),
            minimum_consensus_inliers: default_minimum_consensus_inliers(),
            minimum_pose_inliers: default_minimum_pose_inliers(),
            maximum_reprojection_error: default_maximum_reprojection_error(),
            maximum_depth_factor: default_maximum_depth_factor(),
            minimum_extent: default_minimum_extent(),
            maximum_extent: default_maximum_extent(),
            consensus_seed: default_consensus_seed(),
        }
    }
}

fn default_akaze_threshold() -> f64 {
    0.001
}

fn default_minimum_keypoints() -> usize {
    100
}

fn default_match_retention_fraction() -> f64 {
    0.15
}

fn default_match_retention_floor() -> usize {
    50
}

fn default_minimum_matches() -> usize {
    50
}

fn default_consensus_inlier_threshold() -> f64 {
    1.0
}

fn default_minimum_consensus_inliers() -> usize {
    30
}

fn default_minimum_pose_inliers() -> usize {
    10
}

fn default_maximum_reprojection_error() -> f64 {
    5.0
}

fn default_maximum_depth_factor() -> f64 {
    100.0
}

fn default_minimum_extent() -> f64 {
    0.1
}

fn default_maximum_extent() -> Option<f64> {
    Some(500.0)
}

fn default_consensus_seed() -> u64 {
    0
}
