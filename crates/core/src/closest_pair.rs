//! Exact closest-pair search under the weighted metric.
//!
//! Divide and conquer on the latitude axis with a strip scan ordered by the
//! temporal axis. The recursion is driven by an explicit task stack so the
//! call-stack depth stays constant regardless of input size.

use crate::metric::{weighted_distance, AXIS_WEIGHTS};
use crate::types::FeatureVector;

/// Subproblems at or below this size are solved by brute force.
const BRUTE_FORCE_THRESHOLD: usize = 3;

/// Axis the point set is halved on.
pub const SPLIT_AXIS: usize = 0;

/// Axis the strip is ordered by.
pub const STRIP_AXIS: usize = 2;

/// The two closest points of a set, as indices into the input slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPair {
    pub distance: f64,
    pub a: usize,
    pub b: usize,
}

/// Indices of `points` ordered by the value on `axis`.
///
/// The sort is stable, so equal values keep ascending index order.
pub fn sort_by_axis(points: &[FeatureVector], axis: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&i, &j| points[i].axis(axis).total_cmp(&points[j].axis(axis)));
    order
}

/// O(n^2) scan over every pair. `None` for fewer than two points.
pub fn brute_force(points: &[FeatureVector]) -> Option<ClosestPair> {
    let all: Vec<usize> = (0..points.len()).collect();
    brute_force_subset(points, &all)
}

/// Brute force restricted to `subset`, scanning pairs in slice order.
/// The first pair found wins ties.
fn brute_force_subset(points: &[FeatureVector], subset: &[usize]) -> Option<ClosestPair> {
    let mut best: Option<ClosestPair> = None;
    for (pos, &i) in subset.iter().enumerate() {
        for &j in &subset[pos + 1..] {
            let distance = weighted_distance(&points[i], &points[j]);
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(ClosestPair { distance, a: i, b: j });
            }
        }
    }
    best
}

/// Closest pair of `points`. `None` for fewer than two points.
pub fn closest_pair(points: &[FeatureVector]) -> Option<ClosestPair> {
    let by_split = sort_by_axis(points, SPLIT_AXIS);
    let by_strip = sort_by_axis(points, STRIP_AXIS);
    closest_pair_sorted(points, &by_split, &by_strip)
}

enum Task {
    Solve {
        by_split: Vec<usize>,
        by_strip: Vec<usize>,
        slot: usize,
    },
    Merge {
        by_strip: Vec<usize>,
        split_value: f64,
        left: usize,
        right: usize,
        slot: usize,
    },
}

/// Closest pair given the same index set pre-sorted by [`SPLIT_AXIS`] and by
/// [`STRIP_AXIS`].
pub fn closest_pair_sorted(
    points: &[FeatureVector],
    by_split: &[usize],
    by_strip: &[usize],
) -> Option<ClosestPair> {
    if by_split.len() < 2 {
        return None;
    }

    let mut results: Vec<Option<ClosestPair>> = vec![None];
    let mut in_left = vec![false; points.len()];
    let mut stack = vec![Task::Solve {
        by_split: by_split.to_vec(),
        by_strip: by_strip.to_vec(),
        slot: 0,
    }];

    while let Some(task) = stack.pop() {
        match task {
            Task::Solve {
                by_split,
                by_strip,
                slot,
            } => {
                if by_split.len() <= BRUTE_FORCE_THRESHOLD {
                    results[slot] = brute_force_subset(points, &by_split);
                    continue;
                }

                let mid = by_split.len() / 2;
                let split_value = points[by_split[mid]].axis(SPLIT_AXIS);
                let (left_split, right_split) = by_split.split_at(mid);

                // Partition by membership, not by coordinate, so duplicates of
                // the split value stay on the side the split order put them.
                for &i in left_split {
                    in_left[i] = true;
                }
                let (left_strip, right_strip): (Vec<usize>, Vec<usize>) =
                    by_strip.iter().copied().partition(|&i| in_left[i]);
                for &i in left_split {
                    in_left[i] = false;
                }

                let left = results.len();
                let right = left + 1;
                results.push(None);
                results.push(None);

                stack.push(Task::Merge {
                    by_strip,
                    split_value,
                    left,
                    right,
                    slot,
                });
                stack.push(Task::Solve {
                    by_split: right_split.to_vec(),
                    by_strip: right_strip,
                    slot: right,
                });
                stack.push(Task::Solve {
                    by_split: left_split.to_vec(),
                    by_strip: left_strip,
                    slot: left,
                });
            }
            Task::Merge {
                by_strip,
                split_value,
                left,
                right,
                slot,
            } => {
                let best = match (results[left].take(), results[right].take()) {
                    (Some(l), Some(r)) => Some(if l.distance <= r.distance { l } else { r }),
                    (l, r) => l.or(r),
                };
                results[slot] = scan_strip(points, &by_strip, split_value, best);
            }
        }
    }

    results[0].take()
}

/// Look for a pair straddling the split that beats `best`.
///
/// Candidates are points whose weighted gap to the split line is below the
/// current best distance. Each is compared with its successors in strip
/// order until the weighted strip-axis gap alone reaches that distance, which
/// keeps the result exact in three dimensions.
fn scan_strip(
    points: &[FeatureVector],
    by_strip: &[usize],
    split_value: f64,
    best: Option<ClosestPair>,
) -> Option<ClosestPair> {
    let split_scale = AXIS_WEIGHTS[SPLIT_AXIS].sqrt();
    let strip_scale = AXIS_WEIGHTS[STRIP_AXIS].sqrt();

    let mut best = best;
    let mut d = best.map_or(f64::INFINITY, |b| b.distance);

    let strip: Vec<usize> = by_strip
        .iter()
        .copied()
        .filter(|&i| split_scale * (points[i].axis(SPLIT_AXIS) - split_value).abs() < d)
        .collect();

    for (pos, &i) in strip.iter().enumerate() {
        for &j in &strip[pos + 1..] {
            let gap = points[j].axis(STRIP_AXIS) - points[i].axis(STRIP_AXIS);
            if strip_scale * gap >= d {
                break;
            }
            let distance = weighted_distance(&points[i], &points[j]);
            if distance < d {
                d = distance;
                best = Some(ClosestPair { distance, a: i, b: j });
            }
        }
    }

    best
}
