use nalgebra::{Matrix3, Point2, Unit, UnitVector3, Vector2, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Iterations of the fixed-point inversion of the distortion model.
const UNDISTORT_ITERATIONS: usize = 10;

/// Brown-Conrady radial-tangential lens distortion with up to five
/// coefficients, in the `[k1, k2, p1, p2, k3]` ordering that camera
/// calibration tools commonly emit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    /// No distortion. Same as [`Default::default`].
    pub fn none() -> Self {
        Default::default()
    }

    /// Creates the distortion from up to five coefficients in
    /// `[k1, k2, p1, p2, k3]` order. Missing coefficients are zero;
    /// extra coefficients are ignored.
    pub fn from_coefficients(coefficients: &[f64]) -> Self {
        let coefficient = |ix: usize| coefficients.get(ix).copied().unwrap_or(0.0);
        Self {
            k1: coefficient(0),
            k2: coefficient(1),
            p1: coefficient(2),
            p2: coefficient(3),
            k3: coefficient(4),
        }
    }

    fn is_none(&self) -> bool {
        *self == Self::none()
    }

    /// Applies the forward distortion model to a point in normalized
    /// image coordinates.
    pub fn distort(&self, point: Point2<f64>) -> Point2<f64> {
        let (x, y) = (point.x, point.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
        Point2::new(
            x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x),
            y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y,
        )
    }

    /// Inverts the distortion model by fixed-point iteration. The model
    /// has no closed-form inverse; for the moderate distortion this crate
    /// is calibrated against, a handful of iterations recovers the
    /// undistorted point to well below the keypoint localization noise.
    pub fn undistort(&self, point: Point2<f64>) -> Point2<f64> {
        if self.is_none() {
            return point;
        }
        let mut undistorted = point;
        for _ in 0..UNDISTORT_ITERATIONS {
            let (x, y) = (undistorted.x, undistorted.y);
            let r2 = x * x + y * y;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
            let tangential_x = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let tangential_y = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            undistorted = Point2::new(
                (point.x - tangential_x) / radial,
                (point.y - tangential_y) / radial,
            );
        }
        undistorted
    }
}

/// Intrinsic camera parameters as per
/// [this Wikipedia page](https://en.wikipedia.org/wiki/Camera_resectioning#Intrinsic_parameters),
/// together with the lens distortion of the camera.
///
/// These are constructed once per sequence and shared read-only by every
/// pair evaluation. Distortion is corrected at keypoint calibration time
/// rather than by resampling whole images, so the pixel buffers the
/// pipeline sees are the original frames.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
    pub distortion: Distortion,
}

impl CameraIntrinsics {
    /// Creates camera intrinsics that would create an identity intrinsic
    /// matrix with no distortion.
    pub fn identity() -> Self {
        Self {
            focals: Vector2::new(1.0, 1.0),
            principal_point: Point2::new(0.0, 0.0),
            distortion: Distortion::none(),
        }
    }

    #[must_use]
    pub fn focals(self, focals: Vector2<f64>) -> Self {
        Self { focals, ..self }
    }

    /// Set both focal lengths to the same value, in pixels.
    #[must_use]
    pub fn focal(self, focal: f64) -> Self {
        Self {
            focals: Vector2::new(focal, focal),
            ..self
        }
    }

    #[must_use]
    pub fn principal_point(self, principal_point: Point2<f64>) -> Self {
        Self {
            principal_point,
            ..self
        }
    }

    #[must_use]
    pub fn distortion(self, distortion: Distortion) -> Self {
        Self { distortion, ..self }
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focals.x,  0.0,            self.principal_point.x,
            0.0,            self.focals.y,  self.principal_point.y,
            0.0,            0.0,            1.0,
        )
    }

    pub(crate) fn mean_focal(&self) -> f64 {
        (self.focals.x + self.focals.y) / 2.0
    }

    /// Takes a point in pixel coordinates, undistorts it, and converts it
    /// to the bearing of the light that produced it.
    ///
    /// The bearing's X axis points right, Y axis points down, and Z axis
    /// points forwards out of the camera.
    pub fn calibrate(&self, point: Point2<f64>) -> UnitVector3<f64> {
        let centered = point - self.principal_point;
        let distorted = Point2::new(centered.x / self.focals.x, centered.y / self.focals.y);
        let normalized = self.distortion.undistort(distorted);
        Unit::new_normalize(Vector3::new(normalized.x, normalized.y, 1.0))
    }

    /// Converts a bearing back into distorted pixel coordinates.
    ///
    /// This is fallible, since a bearing pointing behind the camera has no
    /// pixel location.
    pub fn uncalibrate(&self, bearing: UnitVector3<f64>) -> Option<Point2<f64>> {
        if bearing.z <= 0.0 {
            return None;
        }
        let normalized = Point2::new(bearing.x / bearing.z, bearing.y / bearing.z);
        let distorted = self.distortion.distort(normalized);
        Some(Point2::new(
            distorted.x * self.focals.x + self.principal_point.x,
            distorted.y * self.focals.y + self.principal_point.y,
        ))
    }
}

/// Basic camera specifications that one could find on a manufacturer's
/// website. Useful to derive centered intrinsics when no calibration is
/// available, only the sensor geometry.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraSpecification {
    pub pixels: Vector2<usize>,
    pub pixel_dimensions: Vector2<f64>,
}

impl CameraSpecification {
    /// Creates a [`CameraSpecification`] using the sensor dimensions, in
    /// meters.
    pub fn from_sensor(pixels: Vector2<usize>, sensor_dimensions: Vector2<f64>) -> Self {
        Self {
            pixels,
            pixel_dimensions: Vector2::new(
                sensor_dimensions.x / pixels.x as f64,
                sensor_dimensions.y / pixels.y as f64,
            ),
        }
    }

    /// Creates a [`CameraSpecification`] using the sensor width assuming a
    /// square pixel.
    pub fn from_sensor_square(pixels: Vector2<usize>, sensor_width: f64) -> Self {
        let pixel_width = sensor_width / pixels.x as f64;
        Self {
            pixels,
            pixel_dimensions: Vector2::new(pixel_width, pixel_width),
        }
    }

    /// Combines the [`CameraSpecification`] with a focal length in pixels
    /// to create a [`CameraIntrinsics`].
    ///
    /// This assumes square pixels and a perfectly centered principal point.
    pub fn intrinsics_centered(&self, focal: f64) -> CameraIntrinsics {
        CameraIntrinsics::identity()
            .focal(focal)
            .principal_point(self.pixels.map(|p| p as f64 / 2.0 - 0.5).into())
    }
}
