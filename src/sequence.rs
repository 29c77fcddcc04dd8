use crate::camera::CameraIntrinsics;
use crate::error::{PairError, SequenceError};
use crate::pair::{PairPipeline, PairResult};
use crate::settings::HeightSettings;
use image::{DynamicImage, ImageResult};
use log::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Delivers decoded single-channel frames to the estimator.
///
/// This is the collaborator contract for everything the pipeline does not
/// own: reading bytes, decoding the container format, and converting to
/// grayscale. Frames are requested per pair and released afterwards; the
/// estimator caches the one frame that adjacent pairs share.
pub trait FrameSource {
    /// The number of frames in the sequence.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load frame `index` as a single-channel image.
    fn frame(&self, index: usize) -> ImageResult<DynamicImage>;
}

/// A frame source over image files on disk. Frames are decoded with the
/// `image` crate and converted to grayscale.
pub struct ImageFiles(Vec<PathBuf>);

impl ImageFiles {
    pub fn new(paths: impl IntoIterator<Item = impl AsRef<Path>>) -> Self {
        Self(
            paths
                .into_iter()
                .map(|path| path.as_ref().to_path_buf())
                .collect(),
        )
    }
}

impl FrameSource for ImageFiles {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn frame(&self, index: usize) -> ImageResult<DynamicImage> {
        let image = image::open(&self.0[index])?;
        Ok(DynamicImage::ImageLuma8(image.to_luma8()))
    }
}

/// In-memory frames, converted to grayscale on access.
impl FrameSource for [DynamicImage] {
    fn len(&self) -> usize {
        (*self).len()
    }

    fn frame(&self, index: usize) -> ImageResult<DynamicImage> {
        Ok(DynamicImage::ImageLuma8(self[index].to_luma8()))
    }
}

/// Estimates the depth extent of a photographed object from an ordered
/// image sequence with a known baseline between consecutive shots.
///
/// Adjacent frames are paired, each pair is reconstructed independently by
/// a [`PairPipeline`], and the plausible per-pair depth extents are
/// averaged with equal weight. The first pair anchors the run: if it
/// fails, its failure is the run's result and nothing further is
/// evaluated. Failures of later pairs only exclude them from the average.
///
/// The result is the spread of triangulated depths along the camera's
/// forward axis, in the unit of the baseline. When the camera looks
/// straight down at the object, that spread is the object's height;
/// in a fronto-parallel capture it is closer to the object's thickness.
/// Which of the two the caller wants is the caller's call; this type
/// reports the forward-axis spread either way.
pub struct HeightEstimator {
    intrinsics: CameraIntrinsics,
    baseline: f64,
    settings: HeightSettings,
}

impl HeightEstimator {
    /// Creates an estimator for one capture setup. `intrinsics` are shared
    /// read-only by every pair evaluation and `baseline` is the physical
    /// distance between consecutive camera positions, in the unit the
    /// result should be expressed in.
    pub fn new(intrinsics: CameraIntrinsics, baseline: f64) -> Self {
        Self {
            intrinsics,
            baseline,
            settings: Default::default(),
        }
    }

    /// Replace the settings.
    #[must_use]
    pub fn settings(self, settings: HeightSettings) -> Self {
        Self { settings, ..self }
    }

    /// Runs the estimation over image files on disk.
    pub fn estimate_files(
        &self,
        paths: impl IntoIterator<Item = impl AsRef<Path>>,
    ) -> Result<f64, SequenceError> {
        self.estimate(&ImageFiles::new(paths))
    }

    /// Runs the estimation over a frame source.
    ///
    /// This is the run boundary: nothing escapes it except the result or a
    /// [`SequenceError`].
    pub fn estimate<S: FrameSource + ?Sized>(&self, source: &S) -> Result<f64, SequenceError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(source))) {
            Ok(result) => result,
            Err(payload) => Err(SequenceError::Fault(describe_panic(payload))),
        }
    }

    fn run<S: FrameSource + ?Sized>(&self, source: &S) -> Result<f64, SequenceError> {
        let count = source.len();
        if count < 2 {
            return Err(SequenceError::InsufficientImages { count });
        }
        info!(
            "estimating over {} adjacent pairs with baseline {}",
            count - 1,
            self.baseline
        );
        let pipeline = PairPipeline::new(&self.intrinsics, self.baseline, &self.settings);
        let mut cached: Option<DynamicImage> = None;
        let outcomes = (0..count - 1)
            .map(|index| (index, self.evaluate_pair(&pipeline, source, index, &mut cached)));
        aggregate(outcomes, &self.settings)
    }

    /// Evaluates one pair inside its fault boundary. Any panic below this
    /// point becomes a [`PairError::Fault`] for this pair alone.
    fn evaluate_pair<S: FrameSource + ?Sized>(
        &self,
        pipeline: &PairPipeline,
        source: &S,
        index: usize,
        cached: &mut Option<DynamicImage>,
    ) -> Result<PairResult, PairError> {
        // Adjacent pairs share a frame, so the second frame of the
        // previous pair is reused.
        let first = match cached.take() {
            Some(frame) => frame,
            None => load(source, index)?,
        };
        let second = load(source, index + 1)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| pipeline.evaluate(&first, &second)))
            .unwrap_or_else(|payload| Err(PairError::Fault(describe_panic(payload))));
        *cached = Some(second);
        outcome
    }
}

fn load<S: FrameSource + ?Sized>(source: &S, index: usize) -> Result<DynamicImage, PairError> {
    source
        .frame(index)
        .map_err(|error| PairError::Fault(format!("frame {}: {}", index, error)))
}

fn describe_panic(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "opaque panic payload".to_string())
}

/// Reduces the pair outcomes to the run result.
///
/// The first pair's failure is promoted to the whole run. Later failures
/// only exclude their pair. A successful pair contributes its extent to an
/// equal-weighted mean when the extent clears the noise floor and, when a
/// sanity bound is configured, stays under it.
fn aggregate(
    outcomes: impl IntoIterator<Item = (usize, Result<PairResult, PairError>)>,
    settings: &HeightSettings,
) -> Result<f64, SequenceError> {
    let mut sum = 0.0;
    let mut contributing = 0usize;
    for (index, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                let extent = result.extent();
                let plausible = extent > settings.minimum_extent
                    && settings
                        .maximum_extent
                        .map_or(true, |bound| extent < bound);
                if plausible {
                    debug!(
                        "pair {} contributes extent {:.3} ({} inliers, {:.2} px error)",
                        index, extent, result.inlier_count, result.mean_reprojection_error
                    );
                    sum += extent;
                    contributing += 1;
                } else {
                    info!(
                        "pair {} extent {:.3} is outside the plausible window",
                        index, extent
                    );
                }
            }
            Err(failure) if index == 0 => {
                return Err(SequenceError::FirstPair(failure));
            }
            Err(failure) => {
                info!("pair {} failed ({}), excluded from the average", index, failure);
            }
        }
    }
    if contributing == 0 {
        return Err(SequenceError::NoValidData);
    }
    Ok(sum / contributing as f64)
}
