use crate::camera::CameraIntrinsics;
use crate::error::PairError;
use crate::matches::Correspondence;
use crate::point::ScenePoint;
use crate::pose::RelativePose;
use log::*;

/// Scores the reconstruction by reprojecting every surviving point into
/// both views and averaging the pixel distance to the observed
/// correspondences.
///
/// Points are keyed by the index of the correspondence they came from, so
/// each reprojection is compared against exactly the observation that
/// produced it. A point whose bearing cannot be mapped back to a pixel is
/// skipped; if that leaves nothing to score, the pair is accepted with the
/// ceiling itself as a low-confidence placeholder error rather than being
/// rejected outright.
///
/// Returns the mean error when it is at or below `ceiling` and
/// [`PairError::ReprojectionTooHigh`] otherwise.
pub(crate) fn validate(
    intrinsics: &CameraIntrinsics,
    pose: &RelativePose,
    correspondences: &[Correspondence],
    points: &[(usize, ScenePoint)],
    ceiling: f64,
) -> Result<f64, PairError> {
    let mut total = 0.0;
    let mut samples = 0usize;
    for &(ix, point) in points {
        let observed = &correspondences[ix];
        let in_b = pose.transform(point);
        let reprojected = intrinsics
            .uncalibrate(point.bearing())
            .zip(intrinsics.uncalibrate(in_b.bearing()));
        let (pixel_a, pixel_b) = match reprojected {
            Some(pixels) => pixels,
            None => continue,
        };
        total += (pixel_a - observed.a).norm() + (pixel_b - observed.b).norm();
        samples += 2;
    }
    if samples == 0 {
        warn!("no point could be reprojected, accepting with placeholder error");
        return Ok(ceiling);
    }
    let error = total / samples as f64;
    debug!("mean reprojection error {:.3} px over {} samples", error, samples);
    if error > ceiling {
        return Err(PairError::ReprojectionTooHigh { error, ceiling });
    }
    Ok(error)
}
