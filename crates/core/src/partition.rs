//! Greedy partition of a batch into `k` roughly balanced groups.
//!
//! Seeds come from the closest pair, extended by farthest-point sampling.
//! Each group then grows around its seed by pulling the nearest unvisited
//! point from a [`SpatialIndex`] until it reaches `n / k` members. Leftovers
//! go to the currently smallest group.

use chrono::NaiveDate;

use crate::closest_pair::closest_pair;
use crate::metric::{weighted_distance, FeatureConfig};
use crate::spatial_index::SpatialIndex;
use crate::types::{Event, FeatureVector};

/// Result of partitioning. Every index in `0..n` appears in exactly one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Member indices per group, seed first.
    pub groups: Vec<Vec<usize>>,
    /// Seed index of each group.
    pub seeds: Vec<usize>,
    /// `k` as requested by the caller.
    pub requested_k: usize,
}

impl Partition {
    /// Number of groups actually produced.
    pub fn effective_k(&self) -> usize {
        self.groups.len()
    }

    /// Whether `k` had to be reduced to fit the number of points.
    pub fn was_clamped(&self) -> bool {
        self.effective_k() != self.requested_k
    }

    /// Total number of members across all groups.
    pub fn total_members(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

/// Earliest date in `events`, or `None` when empty.
pub fn min_date<'e>(events: impl IntoIterator<Item = &'e Event>) -> Option<NaiveDate> {
    events.into_iter().map(|e| e.date).min()
}

/// Partition `events` into `k` groups using feature vectors relative to the
/// batch-wide minimum date. Group members are indices into `events`.
pub fn partition_events(events: &[Event], k: usize, features: &FeatureConfig) -> Partition {
    let Some(batch_min) = min_date(events) else {
        return partition_points(&[], k);
    };
    let points: Vec<FeatureVector> = events
        .iter()
        .map(|e| features.vector_for(e, batch_min))
        .collect();
    partition_points(&points, k)
}

/// Partition feature vectors into `min(k, n)` groups.
///
/// `k == 0` is treated as `1`; upstream validation is expected to reject it.
/// Empty input yields no groups.
pub fn partition_points(points: &[FeatureVector], k: usize) -> Partition {
    let n = points.len();
    if n == 0 {
        return Partition {
            groups: Vec::new(),
            seeds: Vec::new(),
            requested_k: k,
        };
    }

    let effective_k = k.clamp(1, n);
    if effective_k != k {
        tracing::warn!(requested_k = k, effective_k, events = n, "Clamped k to batch size");
    }

    let seeds = select_seeds(points, effective_k);

    let mut visited = vec![false; n];
    let mut groups: Vec<Vec<usize>> = seeds
        .iter()
        .map(|&s| {
            visited[s] = true;
            vec![s]
        })
        .collect();

    let target = n / effective_k;
    let index = SpatialIndex::build(points);

    for (group, &seed) in groups.iter_mut().zip(&seeds) {
        let mut nearest = index.query_all_ordered_by_distance(points[seed]);
        while group.len() < target {
            match nearest.find(|&i| !visited[i]) {
                Some(i) => {
                    visited[i] = true;
                    group.push(i);
                }
                None => break,
            }
        }
    }

    for i in 0..n {
        if visited[i] {
            continue;
        }
        let smallest = groups
            .iter()
            .enumerate()
            .min_by_key(|(g, members)| (members.len(), *g))
            .map_or(0, |(g, _)| g);
        groups[smallest].push(i);
        visited[i] = true;
    }

    tracing::debug!(
        k = effective_k,
        target,
        sizes = ?groups.iter().map(Vec::len).collect::<Vec<_>>(),
        "Partitioned batch"
    );

    Partition {
        groups,
        seeds,
        requested_k: k,
    }
}

/// Closest-pair seeds extended by farthest-point sampling to `k` seeds.
fn select_seeds(points: &[FeatureVector], k: usize) -> Vec<usize> {
    let mut seeds = match closest_pair(points) {
        Some(pair) if pair.a != pair.b => vec![pair.a, pair.b],
        _ => match farthest_from(points, 0) {
            Some(far) => vec![0, far],
            None => vec![0],
        },
    };
    seeds.truncate(k);

    let mut is_seed = vec![false; points.len()];
    let mut min_dist = vec![f64::INFINITY; points.len()];
    for &s in &seeds {
        is_seed[s] = true;
        update_min_distances(points, s, &mut min_dist);
    }

    while seeds.len() < k {
        let mut best: Option<(usize, f64)> = None;
        for (i, &d) in min_dist.iter().enumerate() {
            if is_seed[i] {
                continue;
            }
            if best.map_or(true, |(_, best_d)| d > best_d) {
                best = Some((i, d));
            }
        }
        let Some((next, _)) = best else { break };
        is_seed[next] = true;
        update_min_distances(points, next, &mut min_dist);
        seeds.push(next);
    }

    seeds
}

fn update_min_distances(points: &[FeatureVector], seed: usize, min_dist: &mut [f64]) {
    for (i, d) in min_dist.iter_mut().enumerate() {
        *d = d.min(weighted_distance(&points[i], &points[seed]));
    }
}

/// Index of the point farthest from `origin`, first index on ties.
fn farthest_from(points: &[FeatureVector], origin: usize) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        if i == origin {
            continue;
        }
        let d = weighted_distance(&points[origin], p);
        if best.map_or(true, |(_, best_d)| d > best_d) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}
