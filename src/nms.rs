//! Non-maximum suppression over decoded candidates.
//!
//! Overlap is measured as the intersection area divided by the area of the
//! lower-confidence box, not as intersection over union. Areas count pixels
//! inclusively, so a box spanning `start..=end` is `end - start + 1` wide.

use std::cmp::Ordering;

use float_ord::FloatOrd;
use tracing::instrument;

use crate::{
    error::{EastError, Result},
    Candidate,
};

pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.5;

/// Keeps the highest-confidence candidates whose overlap with every
/// better-ranked kept candidate is at most `overlap_threshold`.
///
/// The result is a subsequence of `candidates`, ordered by confidence
/// descending.
pub fn suppress(candidates: &[Candidate], overlap_threshold: f32) -> Result<Vec<Candidate>> {
    Ok(suppress_indices(candidates, overlap_threshold)?
        .into_iter()
        .map(|index| candidates[index])
        .collect())
}

/// Same as [`suppress`] but returns positions into `candidates`.
#[instrument(skip(candidates), fields(count = candidates.len()), level = "debug")]
pub fn suppress_indices(candidates: &[Candidate], overlap_threshold: f32) -> Result<Vec<usize>> {
    if !(overlap_threshold > 0.0 && overlap_threshold <= 1.0) {
        return Err(EastError::InvalidParameter(format!(
            "overlap threshold must be within (0, 1], got {overlap_threshold}"
        )));
    }

    let mut order = (0..candidates.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| rank(&candidates[a], &candidates[b]).then(a.cmp(&b)));

    let mut suppressed = vec![false; candidates.len()];
    let mut kept = Vec::new();
    for (position, &index) in order.iter().enumerate() {
        if suppressed[index] {
            continue;
        }
        kept.push(index);
        let best = &candidates[index];
        for &other in &order[position + 1..] {
            if !suppressed[other] && overlap_ratio(best, &candidates[other]) > overlap_threshold {
                suppressed[other] = true;
            }
        }
    }

    log::trace!("Kept {} of {} candidates", kept.len(), candidates.len());
    Ok(kept)
}

/// Confidence descending, then start_y, start_x, end_x and end_y ascending.
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    FloatOrd(b.confidence)
        .cmp(&FloatOrd(a.confidence))
        .then(a.start_y.cmp(&b.start_y))
        .then(a.start_x.cmp(&b.start_x))
        .then(a.end_x.cmp(&b.end_x))
        .then(a.end_y.cmp(&b.end_y))
}

/// Fraction of `other` covered by `kept`. Zero when `other` has no area.
pub fn overlap_ratio(kept: &Candidate, other: &Candidate) -> f32 {
    let area = area(other);
    if area == 0 {
        return 0.0;
    }
    (intersection_area(kept, other) as f64 / area as f64) as f32
}

pub fn area(candidate: &Candidate) -> i64 {
    span(candidate.start_x, candidate.end_x) * span(candidate.start_y, candidate.end_y)
}

pub fn intersection_area(a: &Candidate, b: &Candidate) -> i64 {
    let width = span(a.start_x.max(b.start_x), a.end_x.min(b.end_x));
    let height = span(a.start_y.max(b.start_y), a.end_y.min(b.end_y));
    width * height
}

fn span(start: i32, end: i32) -> i64 {
    (end as i64 - start as i64 + 1).max(0)
}
