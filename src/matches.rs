use nalgebra::{Point2, UnitVector3};

/// A mutual nearest-neighbor correspondence between two views, in pixel
/// coordinates, together with its descriptor distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// The observed pixel location in the first view.
    pub a: Point2<f64>,
    /// The observed pixel location in the second view.
    pub b: Point2<f64>,
    /// The Hamming distance between the matched descriptors.
    pub distance: u32,
}

/// Calibrated bearing match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BearingMatch(pub UnitVector3<f64>, pub UnitVector3<f64>);
