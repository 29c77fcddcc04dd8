use nalgebra::{Point3, Unit, UnitVector3, Vector4};

/// A triangulated point in the reference camera's frame, stored as a
/// homogeneous coordinate. The positive X axis is right, positive Y is
/// down, and positive Z is forwards from the optical center. When the
/// relative pose has been scaled by the physical baseline, the units are
/// the baseline's units.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ScenePoint(pub Vector4<f64>);

impl ScenePoint {
    /// Retrieve the homogeneous vector.
    pub fn homogeneous(self) -> Vector4<f64> {
        self.0
    }

    /// Retrieve the euclidean 3d point by normalizing the homogeneous
    /// coordinate. This fails for points at infinity.
    pub fn point(self) -> Option<Point3<f64>> {
        Point3::from_homogeneous(self.0)
    }

    /// Retrieve the normalized bearing of the point out of the camera's
    /// optical center.
    pub fn bearing(self) -> UnitVector3<f64> {
        Unit::new_normalize(self.0.xyz())
    }
}

impl From<Vector4<f64>> for ScenePoint {
    fn from(homogeneous: Vector4<f64>) -> Self {
        Self(homogeneous)
    }
}
