use crate::error::PairError;
use crate::matches::Correspondence;
use crate::settings::HeightSettings;
use akaze::{Akaze, KeyPoint};
use bitarray::{BitArray, Hamming};
use image::DynamicImage;
use itertools::Itertools;
use log::*;
use nalgebra::Point2;
use space::{Knn, LinearKnn};

pub(crate) type Descriptor = BitArray<64>;

/// Detects keypoints in both frames and produces the retained
/// correspondence set, ordered best descriptor distance first.
pub(crate) fn match_pair(
    akaze: &Akaze,
    a: &DynamicImage,
    b: &DynamicImage,
    settings: &HeightSettings,
) -> Result<Vec<Correspondence>, PairError> {
    let (keypoints_a, descriptors_a) = akaze.extract(a);
    let (keypoints_b, descriptors_b) = akaze.extract(b);
    debug!(
        "extracted {} and {} keypoints",
        keypoints_a.len(),
        keypoints_b.len()
    );
    let found = keypoints_a.len().min(keypoints_b.len());
    if found < settings.minimum_keypoints {
        return Err(PairError::TooFewKeypoints {
            found,
            minimum: settings.minimum_keypoints,
        });
    }

    let correspondences = symmetric_matches(&descriptors_a, &descriptors_b)
        .map(|(aix, bix, distance)| Correspondence {
            a: pixel(&keypoints_a[aix]),
            b: pixel(&keypoints_b[bix]),
            distance,
        })
        .collect_vec();
    let correspondences = retain_best(
        correspondences,
        settings.match_retention_fraction,
        settings.match_retention_floor,
    );
    if correspondences.len() < settings.minimum_matches {
        return Err(PairError::TooFewMatches {
            found: correspondences.len(),
            minimum: settings.minimum_matches,
        });
    }
    info!("retained {} correspondences", correspondences.len());
    Ok(correspondences)
}

fn pixel(keypoint: &KeyPoint) -> Point2<f64> {
    Point2::new(keypoint.point.0 as f64, keypoint.point.1 as f64)
}

/// Sorts by ascending descriptor distance and keeps the best `fraction`.
/// When that would leave fewer than `floor` matches, everything is kept.
fn retain_best(
    mut correspondences: Vec<Correspondence>,
    fraction: f64,
    floor: usize,
) -> Vec<Correspondence> {
    correspondences.sort_unstable_by_key(|correspondence| correspondence.distance);
    let keep = (correspondences.len() as f64 * fraction) as usize;
    if keep >= floor {
        correspondences.truncate(keep);
    }
    correspondences
}

/// The best match in `b` for every descriptor in `a`.
fn nearest(a: &[Descriptor], b: &[Descriptor]) -> Vec<Option<(usize, u32)>> {
    let knn = LinearKnn {
        metric: Hamming,
        iter: b.iter(),
    };
    a.iter()
        .map(|descriptor| {
            knn.knn(descriptor, 1)
                .into_iter()
                .next()
                .map(|neighbor| (neighbor.index, neighbor.distance))
        })
        .collect()
}

/// Performs symmetric (cross-checked) matching between `a` and `b`.
///
/// A correspondence survives only when the best match of the feature in
/// `a` is a feature in `b` whose own best match is that same feature in
/// `a`. Mutuality is a strong filter; a feature whose match is not
/// reciprocated usually sits on repeated structure.
fn symmetric_matches(
    a: &[Descriptor],
    b: &[Descriptor],
) -> impl Iterator<Item = (usize, usize, u32)> {
    let forward = nearest(a, b);
    let reverse = nearest(b, a);
    forward
        .into_iter()
        .enumerate()
        .filter_map(move |(aix, forward_match)| {
            forward_match.and_then(|(bix, distance)| {
                let reciprocated = reverse[bix].map(|(ix, _)| ix) == Some(aix);
                reciprocated.then(|| (aix, bix, distance))
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correspondence(distance: u32) -> Correspondence {
        Correspondence {
            a: Point2::new(0.0, 0.0),
            b: Point2::new(0.0, 0.0),
            distance,
        }
    }

    #[test]
    fn retention_keeps_the_best_fraction() {
        let correspondences = (0..100).rev().map(correspondence).collect_vec();
        let retained = retain_best(correspondences, 0.15, 10);
        assert_eq!(retained.len(), 15);
        assert!(retained.iter().enumerate().all(|(ix, c)| c.distance == ix as u32));
    }

    #[test]
    fn retention_floor_keeps_everything() {
        let correspondences = (0..100).map(correspondence).collect_vec();
        let retained = retain_best(correspondences, 0.15, 50);
        assert_eq!(retained.len(), 100);
    }
}
