//! Summary statistics over a clustering result.
//!
//! Mean leaf size, record count per level, and mean coordinate spread of
//! leaf clusters. Consumed by reporting; the engine never reads it back.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::engine::ClusteringResult;
use crate::types::{Event, EventId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_events: usize,
    pub total_clusters: usize,
    pub mean_events_per_cluster: f64,
    /// Record count per tree level, internal nodes included.
    pub clusters_per_level: BTreeMap<usize, usize>,
    /// Mean `max(lat) - min(lat)` over leaf clusters.
    pub mean_lat_spread: f64,
    /// Mean `max(lon) - min(lon)` over leaf clusters.
    pub mean_lon_spread: f64,
}

/// Build a [`QualityReport`] for `result`, looking up coordinates in `events`.
pub fn analyze(events: &[Event], result: &ClusteringResult) -> QualityReport {
    let by_id: HashMap<EventId, &Event> = events.iter().map(|e| (e.id, e)).collect();

    let mut clusters_per_level: BTreeMap<usize, usize> = BTreeMap::new();
    for record in &result.clusters {
        *clusters_per_level.entry(record.level).or_default() += 1;
    }

    let mut sizes = Vec::new();
    let mut spreads = Vec::new();
    for leaf in result.leaf_clusters() {
        sizes.push(leaf.event_ids.len() as f64);

        let members: Vec<&Event> = leaf
            .event_ids
            .iter()
            .filter_map(|id| by_id.get(id).copied())
            .filter(|e| e.has_valid_coordinates())
            .collect();
        if let Some(spread) = spread(&members) {
            spreads.push(spread);
        }
    }

    QualityReport {
        total_events: result.total_events,
        total_clusters: sizes.len(),
        mean_events_per_cluster: mean(sizes.iter().copied()),
        clusters_per_level,
        mean_lat_spread: mean(spreads.iter().map(|s| s.0)),
        mean_lon_spread: mean(spreads.iter().map(|s| s.1)),
    }
}

/// `(lat spread, lon spread)`, `None` for an empty set.
fn spread(events: &[&Event]) -> Option<(f64, f64)> {
    let first = events.first()?;
    let (mut min_lat, mut max_lat) = (first.lat, first.lat);
    let (mut min_lon, mut max_lon) = (first.lon, first.lon);
    for e in &events[1..] {
        min_lat = min_lat.min(e.lat);
        max_lat = max_lat.max(e.lat);
        min_lon = min_lon.min(e.lon);
        max_lon = max_lon.max(e.lon);
    }
    Some((max_lat - min_lat, max_lon - min_lon))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
