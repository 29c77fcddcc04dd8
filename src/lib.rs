//! Estimates the physical size of a photographed object from a short
//! ordered sequence of calibrated images taken from slightly offset
//! viewpoints, given the physical baseline distance between consecutive
//! shots.
//!
//! Each adjacent pair of frames is reconstructed independently with a
//! two-view structure-from-motion pipeline: AKAZE keypoints are matched
//! symmetrically between the frames, an essential matrix is estimated
//! under ARRSAC consensus, the relative pose is recovered from it and
//! scaled by the known baseline, the surviving correspondences are
//! triangulated, and the reconstruction is validated by reprojection.
//! The depth spreads of the pairs that survive are averaged into a single
//! scalar in the baseline's unit.
//!
//! Two-view geometry fails routinely in the wild. Low texture, low
//! parallax, and near-planar scenes all produce ill-conditioned estimates,
//! so every stage reports failure as a value rather than a crash: pairs
//! fail with a [`PairError`], runs fail with a [`SequenceError`], and a
//! failed pair after the first one merely leaves the average.
//!
//! # What "height" means here
//!
//! The measured quantity is the spread of triangulated depths along the
//! camera's forward (Z) axis. With a camera looking straight down, that is
//! the height of the object under it; with a camera looking at the object
//! from the side, it is closer to the object's thickness. The crate
//! deliberately reports the forward-axis spread and leaves the
//! interpretation to the caller.
//!
//! # Example
//!
//! ```no_run
//! use baseline_height::{CameraIntrinsics, Distortion, HeightEstimator};
//! use baseline_height::nalgebra::{Point2, Vector2};
//!
//! let intrinsics = CameraIntrinsics::identity()
//!     .focals(Vector2::new(984.2, 980.8))
//!     .principal_point(Point2::new(690.0, 233.2))
//!     .distortion(Distortion::from_coefficients(&[-0.37, 0.2, 0.0, 0.0, -0.07]));
//! // Shots were taken 12.5 cm apart, so the result is in centimeters.
//! let estimator = HeightEstimator::new(intrinsics, 12.5);
//! let height = estimator.estimate_files(["0.png", "1.png", "2.png"])?;
//! println!("depth extent: {:.1} cm", height);
//! # Ok::<(), baseline_height::SequenceError>(())
//! ```

mod camera;
mod error;
mod essential;
mod matcher;
mod matches;
mod pair;
mod point;
mod pose;
mod reprojection;
mod sequence;
mod settings;
mod triangulation;

pub use camera::*;
pub use error::*;
pub use essential::*;
pub use matches::*;
pub use nalgebra;
pub use pair::*;
pub use point::*;
pub use pose::*;
pub use sequence::*;
pub use settings::*;
pub use triangulation::*;
