//! Drives the geometric stages with synthetic correspondences of a known
//! box scene and checks that the recovered depth extent matches the
//! ground truth.

use baseline_height::nalgebra::{Point2, Point3, Rotation3, Unit, Vector2, Vector3};
use baseline_height::{
    CameraIntrinsics, Correspondence, Distortion, HeightSettings, PairPipeline, RelativePose,
};

const BASELINE: f64 = 0.85;
const NEAR: f64 = 4.0;
const FAR: f64 = 9.0;

fn intrinsics(distortion: Distortion) -> CameraIntrinsics {
    CameraIntrinsics::identity()
        .focals(Vector2::new(800.0, 800.0))
        .principal_point(Point2::new(320.0, 240.0))
        .distortion(distortion)
}

/// Three fronto-parallel slabs of a box scene spanning depths 4 to 9.
fn scene() -> Vec<Point3<f64>> {
    let mut points = Vec::new();
    for &z in &[NEAR, (NEAR + FAR) / 2.0, FAR] {
        for i in 0..9 {
            for j in 0..9 {
                let x = -1.0 + i as f64 * 0.25;
                let y = -1.0 + j as f64 * 0.25;
                points.push(Point3::new(x, y, z));
            }
        }
    }
    points
}

fn ground_truth_pose() -> RelativePose {
    RelativePose::from_parts(
        Vector3::new(BASELINE, 0.0, 0.0),
        Rotation3::from_euler_angles(0.01, -0.02, 0.005),
    )
}

/// Projects the scene into both views through the camera model, so the
/// correspondences carry exactly the pixels a perfect matcher would see.
fn correspondences(intrinsics: &CameraIntrinsics) -> Vec<Correspondence> {
    let pose = ground_truth_pose();
    scene()
        .into_iter()
        .map(|point| {
            let a = Unit::new_normalize(point.coords);
            let b = Unit::new_normalize((pose.isometry() * point).coords);
            Correspondence {
                a: intrinsics.uncalibrate(a).unwrap(),
                b: intrinsics.uncalibrate(b).unwrap(),
                distance: 0,
            }
        })
        .collect()
}

#[test]
fn recovers_the_depth_extent_of_a_box_scene() {
    pretty_env_logger::try_init_timed().ok();
    let intrinsics = intrinsics(Distortion::none());
    let settings = HeightSettings::default();
    let pipeline = PairPipeline::new(&intrinsics, BASELINE, &settings);
    let result = pipeline
        .evaluate_correspondences(&correspondences(&intrinsics))
        .unwrap();

    assert!(result.min_depth <= result.max_depth);
    assert!(result.inlier_count >= settings.minimum_pose_inliers);
    assert!(result.mean_reprojection_error < 0.5);

    let truth = FAR - NEAR;
    let extent = result.extent();
    assert!(
        (extent - truth).abs() <= truth * 0.05,
        "extent {} not within 5% of {}",
        extent,
        truth
    );
    assert!((result.min_depth - NEAR).abs() <= NEAR * 0.05);
    assert!((result.max_depth - FAR).abs() <= FAR * 0.05);
}

#[test]
fn recovers_the_depth_extent_through_lens_distortion() {
    let intrinsics = intrinsics(Distortion::from_coefficients(&[
        -0.2, 0.05, 0.001, -0.001, 0.01,
    ]));
    let settings = HeightSettings::default();
    let pipeline = PairPipeline::new(&intrinsics, BASELINE, &settings);
    let result = pipeline
        .evaluate_correspondences(&correspondences(&intrinsics))
        .unwrap();

    let truth = FAR - NEAR;
    assert!(
        (result.extent() - truth).abs() <= truth * 0.05,
        "extent {} not within 5% of {}",
        result.extent(),
        truth
    );
}

#[test]
fn evaluation_is_deterministic() {
    let intrinsics = intrinsics(Distortion::none());
    let settings = HeightSettings::default();
    let pipeline = PairPipeline::new(&intrinsics, BASELINE, &settings);
    let correspondences = correspondences(&intrinsics);
    let first = pipeline.evaluate_correspondences(&correspondences);
    let second = pipeline.evaluate_correspondences(&correspondences);
    assert_eq!(first, second);
}
