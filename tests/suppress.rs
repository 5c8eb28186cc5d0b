use easttext::{
    decode,
    nms::{area, intersection_area, overlap_ratio},
    suppress, suppress_indices, Candidate, EastError, GeometryMap, DEFAULT_OVERLAP_THRESHOLD,
    EAST_STRIDE,
};
use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn candidate(start_x: i32, start_y: i32, end_x: i32, end_y: i32, confidence: f32) -> Candidate {
    Candidate {
        start_x,
        start_y,
        end_x,
        end_y,
        confidence,
        cell: (0, 0),
    }
}

fn random_candidates(rng: &mut StdRng, count: usize) -> Vec<Candidate> {
    (0..count)
        .map(|_| {
            let start_x = rng.random_range(0..100);
            let start_y = rng.random_range(0..100);
            candidate(
                start_x,
                start_y,
                start_x + rng.random_range(0..30),
                start_y + rng.random_range(0..30),
                // Coarse scores so ties actually happen.
                rng.random_range(1..=10) as f32 / 10.0,
            )
        })
        .collect()
}

fn decoded_candidates(rng: &mut StdRng) -> Vec<Candidate> {
    let scores = Array2::from_shape_fn((20, 20), |_| rng.random::<f32>());
    let geometry = Array3::from_shape_fn((5, 20, 20), |(channel, _, _)| {
        if channel == 4 {
            rng.random_range(-0.5..0.5)
        } else {
            rng.random_range(2.0..20.0)
        }
    });
    let geometry = GeometryMap::from_channels(geometry.view()).unwrap();
    decode(scores.view(), &geometry, 0.6, EAST_STRIDE).unwrap()
}

#[test]
fn fully_overlapping_keeps_the_more_confident() {
    let boxes = [candidate(0, 0, 20, 20, 0.9), candidate(0, 0, 20, 20, 0.95)];

    let kept = suppress(&boxes, 0.5).unwrap();

    assert_eq!(kept, vec![boxes[1]]);
}

#[test]
fn disjoint_boxes_are_all_kept_by_confidence() {
    let boxes = [candidate(0, 0, 10, 10, 0.6), candidate(50, 50, 60, 60, 0.8)];

    let kept = suppress(&boxes, DEFAULT_OVERLAP_THRESHOLD).unwrap();

    assert_eq!(kept, vec![boxes[1], boxes[0]]);
}

#[test]
fn empty_input_is_not_an_error() {
    assert!(suppress(&[], 0.5).unwrap().is_empty());
}

#[test]
fn overlap_is_measured_against_the_weaker_box() {
    // A small box inside a large one is fully covered even though the IoU is low.
    let large = candidate(0, 0, 99, 99, 0.9);
    let small = candidate(10, 10, 19, 19, 0.5);
    assert_eq!(area(&large), 10_000);
    assert_eq!(area(&small), 100);
    assert_eq!(intersection_area(&large, &small), 100);
    assert_eq!(overlap_ratio(&large, &small), 1.0);
    assert_eq!(suppress(&[large, small], 0.5).unwrap(), vec![large]);

    // The other way round the large box is barely covered and survives.
    let large = candidate(0, 0, 99, 99, 0.5);
    let small = candidate(10, 10, 19, 19, 0.9);
    assert!((overlap_ratio(&small, &large) - 0.01).abs() < 1e-6);
    assert_eq!(suppress(&[large, small], 0.5).unwrap(), vec![small, large]);
}

#[test]
fn areas_count_pixels_inclusively() {
    let a = candidate(0, 0, 9, 9, 0.9);
    let b = candidate(9, 9, 20, 20, 0.8);
    assert_eq!(intersection_area(&a, &b), 1);
    assert_eq!(intersection_area(&a, &candidate(10, 10, 20, 20, 0.8)), 0);
    assert_eq!(area(&candidate(5, 5, 5, 5, 0.1)), 1);
    assert_eq!(area(&candidate(5, 5, 4, 5, 0.1)), 0);
}

#[test]
fn threshold_must_be_exceeded_to_suppress() {
    // b is covered by exactly half.
    let a = candidate(0, 0, 9, 9, 0.9);
    let b = candidate(5, 0, 14, 9, 0.8);
    assert_eq!(overlap_ratio(&a, &b), 0.5);
    assert_eq!(suppress(&[a, b], 0.5).unwrap().len(), 2);
    assert_eq!(suppress(&[a, b], 0.49).unwrap(), vec![a]);

    let inner = candidate(2, 2, 5, 5, 0.1);
    assert_eq!(suppress(&[a, inner], 1.0).unwrap().len(), 2);
}

#[test]
fn ties_break_on_coordinates() {
    let boxes = [
        candidate(40, 5, 50, 10, 0.8),
        candidate(20, 1, 30, 4, 0.8),
        candidate(0, 5, 10, 10, 0.8),
        candidate(0, 5, 12, 10, 0.8),
        candidate(80, 80, 90, 90, 0.9),
    ];

    let order = suppress_indices(&boxes, 0.5).unwrap();

    assert_eq!(order, vec![4, 1, 2, 0]);
}

#[test]
fn suppressed_boxes_do_not_suppress_others() {
    // b is removed by a; c overlaps b heavily but not a, so it stays.
    let a = candidate(0, 0, 9, 9, 0.9);
    let b = candidate(4, 0, 13, 9, 0.8);
    let c = candidate(10, 0, 19, 9, 0.7);
    assert_eq!(suppress(&[c, b, a], 0.5).unwrap(), vec![a, c]);
}

#[test]
fn invalid_thresholds_are_rejected() {
    let boxes = [candidate(0, 0, 1, 1, 0.5)];
    for threshold in [0.0, -0.5, 1.5, f32::NAN] {
        assert!(matches!(
            suppress(&boxes, threshold),
            Err(EastError::InvalidParameter(_))
        ));
    }
}

#[test]
fn output_is_a_subsequence_of_the_input() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..20 {
        let boxes = random_candidates(&mut rng, 60);
        let indices = suppress_indices(&boxes, 0.4).unwrap();
        let kept = suppress(&boxes, 0.4).unwrap();

        assert!(kept.len() <= boxes.len());
        assert_eq!(indices.len(), kept.len());
        for (index, candidate) in indices.iter().zip(&kept) {
            assert_eq!(&boxes[*index], candidate);
        }
        let mut unique = indices.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), indices.len());
    }
}

#[test]
fn kept_boxes_respect_the_threshold() {
    let mut rng = StdRng::seed_from_u64(5);
    for threshold in [0.1, 0.3, 0.5, 0.9] {
        let mut boxes = random_candidates(&mut rng, 80);
        boxes.extend(decoded_candidates(&mut rng));
        let kept = suppress(&boxes, threshold).unwrap();

        for (i, better) in kept.iter().enumerate() {
            for weaker in &kept[i + 1..] {
                assert!(better.confidence >= weaker.confidence);
                assert!(overlap_ratio(better, weaker) <= threshold);
            }
        }
    }
}

#[test]
fn suppression_is_idempotent_and_deterministic() {
    let mut rng = StdRng::seed_from_u64(9);
    for threshold in [0.2, DEFAULT_OVERLAP_THRESHOLD, 1.0] {
        let mut boxes = random_candidates(&mut rng, 80);
        boxes.extend(decoded_candidates(&mut rng));

        let once = suppress(&boxes, threshold).unwrap();
        let again = suppress(&boxes, threshold).unwrap();
        let twice = suppress(&once, threshold).unwrap();

        assert_eq!(once, again);
        assert_eq!(once, twice);
    }
}
