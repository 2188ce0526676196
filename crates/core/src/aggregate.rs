//! Flattening of cluster trees into persisted cluster records.
//!
//! Walks a tree in pre-order, assigns request-wide cluster ids, and computes
//! per-node centroid, mean temporal offset, and WKT bounding box.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::divisive::{ClusterTree, NodeId};
use crate::metric::days_since;
use crate::types::{Event, EventId};

/// Identifier of a cluster record, unique within one clustering result.
pub type ClusterId = i64;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Flat, immutable description of one tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub cluster_id: ClusterId,
    pub parent_cluster_id: Option<ClusterId>,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    /// Mean day offset from the group's minimum date, string encoded.
    pub centroid_time_days: String,
    /// Root of a group is level 0.
    pub level: usize,
    /// Partition group this record belongs to, e.g. `G0`.
    pub group_tag: String,
    /// `POLYGON((...))` over the member extent, empty without coordinates.
    pub bounding_box: String,
    pub event_ids: Vec<EventId>,
    pub size: usize,
    pub is_leaf: bool,
    /// Leaf label (`C1`, `C2`, ...); `None` for internal nodes.
    pub label: Option<String>,
}

/// Hands out sequential cluster ids for one clustering request.
#[derive(Debug, Clone, Default)]
pub struct IdCounter {
    next: ClusterId,
}

impl IdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> ClusterId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Records for one tree plus the event -> leaf cluster mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattened {
    pub records: Vec<ClusterRecord>,
    pub event_clusters: BTreeMap<EventId, ClusterId>,
    /// Sum of leaf sizes.
    pub leaf_members: usize,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Mean `(lat, lon)` over events with finite coordinates, `(0.0, 0.0)` if none.
pub fn centroid(events: &[&Event]) -> (f64, f64) {
    let (mut lat, mut lon, mut count) = (0.0, 0.0, 0usize);
    for e in events.iter().filter(|e| e.has_valid_coordinates()) {
        lat += e.lat;
        lon += e.lon;
        count += 1;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    (lat / count as f64, lon / count as f64)
}

/// Mean day offset from `min_date`, `0.0` without a reference date or members.
pub fn mean_time_offset(events: &[&Event], min_date: Option<NaiveDate>) -> f64 {
    let Some(min_date) = min_date else {
        return 0.0;
    };
    if events.is_empty() {
        return 0.0;
    }
    let total: i64 = events.iter().map(|e| days_since(e.date, min_date)).sum();
    total as f64 / events.len() as f64
}

/// String encoding of a day offset, two decimals.
pub fn format_days(days: f64) -> String {
    format!("{days:.2}")
}

/// WKT polygon over the min/max lon/lat of events with finite coordinates.
///
/// Vertices run counter-clockwise from the south-west corner and close on it.
/// Returns an empty string when no event has valid coordinates.
pub fn bounding_box_wkt(events: &[&Event]) -> String {
    let mut valid = events.iter().filter(|e| e.has_valid_coordinates()).peekable();
    if valid.peek().is_none() {
        return String::new();
    }

    let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
    for e in valid {
        min_lat = min_lat.min(e.lat);
        max_lat = max_lat.max(e.lat);
        min_lon = min_lon.min(e.lon);
        max_lon = max_lon.max(e.lon);
    }

    format!(
        "POLYGON(({min_lon} {min_lat}, {max_lon} {min_lat}, {max_lon} {max_lat}, {min_lon} {max_lat}, {min_lon} {min_lat}))"
    )
}

// ---------------------------------------------------------------------------
// Flatten
// ---------------------------------------------------------------------------

/// Flatten `tree` into records in pre-order.
///
/// `events[i]` is the event behind tree member `i`. `min_date` is the
/// group-wide minimum date, shared by every node so temporal offsets are
/// comparable inside the group.
pub fn flatten(
    tree: &ClusterTree,
    events: &[&Event],
    ids: &mut IdCounter,
    min_date: Option<NaiveDate>,
    group_tag: &str,
) -> Flattened {
    let mut out = Flattened::default();
    if tree.is_empty() {
        return out;
    }

    let mut assigned: Vec<Option<ClusterId>> = vec![None; tree.len()];

    for id in tree.pre_order() {
        let node = tree.node(id);
        let cluster_id = ids.next_id();
        assigned[id] = Some(cluster_id);

        // Pre-order guarantees the parent already has an id.
        let parent_cluster_id = node.parent.and_then(|p: NodeId| assigned[p]);

        let members: Vec<&Event> = node.members.iter().map(|&m| events[m]).collect();
        let (centroid_lat, centroid_lon) = centroid(&members);

        if node.is_leaf() {
            out.leaf_members += members.len();
            for e in &members {
                out.event_clusters.insert(e.id, cluster_id);
            }
        }

        out.records.push(ClusterRecord {
            cluster_id,
            parent_cluster_id,
            centroid_lat,
            centroid_lon,
            centroid_time_days: format_days(mean_time_offset(&members, min_date)),
            level: node.depth,
            group_tag: group_tag.to_string(),
            bounding_box: bounding_box_wkt(&members),
            event_ids: members.iter().map(|e| e.id).collect(),
            size: members.len(),
            is_leaf: node.is_leaf(),
            label: node.label.clone(),
        });
    }

    out
}
