use thiserror::Error;

/// Failure of a single adjacent-pair evaluation.
///
/// Every stage of the pair pipeline has its own failure mode, and all of
/// them are ordinary outcomes rather than exceptional ones. Scenes with
/// little texture, little parallax, or near-planar structure are expected
/// to fail somewhere in the middle of the pipeline. A pair failure
/// terminates that pair only; the sequence aggregator decides what it
/// means for the run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PairError {
    /// Feature detection yielded too few keypoints in one of the views.
    #[error("only {found} keypoints detected (minimum {minimum})")]
    TooFewKeypoints { found: usize, minimum: usize },
    /// Too few correspondences survived matching and retention.
    #[error("only {found} correspondences retained (minimum {minimum})")]
    TooFewMatches { found: usize, minimum: usize },
    /// Sample consensus could not converge on an essential matrix.
    #[error("essential matrix estimation did not produce a model")]
    DegenerateGeometry,
    /// The essential matrix was supported by too few inliers.
    #[error("essential matrix supported by only {found} inliers (minimum {minimum})")]
    InsufficientInliers { found: usize, minimum: usize },
    /// No candidate pose placed enough points in front of both cameras.
    #[error("only {found} cheirality-consistent inliers after pose recovery (minimum {minimum})")]
    PoseRecoveryFailed { found: usize, minimum: usize },
    /// Every triangulated point was rejected by the plausibility filter.
    #[error("no triangulated point survived depth filtering")]
    TriangulationEmpty,
    /// The reconstruction reprojects too far from the observed keypoints.
    #[error("mean reprojection error {error:.3} px exceeds the ceiling {ceiling:.3} px")]
    ReprojectionTooHigh { error: f64, ceiling: f64 },
    /// An unexpected fault was caught at the pair boundary.
    #[error("internal fault: {0}")]
    Fault(String),
}

/// Failure of a whole sequence run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SequenceError {
    /// Fewer than two images were supplied, so no pair can be formed.
    #[error("a sequence needs at least two images, got {count}")]
    InsufficientImages { count: usize },
    /// The first pair failed. Its failure becomes the run result.
    #[error("first pair failed: {0}")]
    FirstPair(PairError),
    /// No pair contributed a usable depth extent.
    #[error("no pair produced a usable depth extent")]
    NoValidData,
    /// An unexpected fault was caught at the run boundary.
    #[error("internal fault: {0}")]
    Fault(String),
}
