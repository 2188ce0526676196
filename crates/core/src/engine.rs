//! End-to-end clustering of one request's batch of events.
//!
//! Partition -> per-group bisection -> flatten -> completeness check. All
//! counters are created per call, so concurrent calls share nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::{flatten, ClusterId, ClusterRecord, IdCounter};
use crate::divisive::{build_tree, LabelCounter};
use crate::error::CoreError;
use crate::metric::FeatureConfig;
use crate::partition::{min_date, partition_events};
use crate::types::{Event, EventId, FeatureVector};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default number of top-level groups.
pub const DEFAULT_K: usize = 5;

/// Default minimum leaf size for bisection.
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 10;

/// Parameters for one clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    pub k: usize,
    pub min_cluster_size: usize,
    pub features: FeatureConfig,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            features: FeatureConfig::default(),
        }
    }
}

impl ClusteringConfig {
    pub fn new(k: usize, min_cluster_size: usize) -> Self {
        Self {
            k,
            min_cluster_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.k == 0 {
            return Err(CoreError::Validation("k must be at least 1".into()));
        }
        if self.min_cluster_size == 0 {
            return Err(CoreError::Validation(
                "min_cluster_size must be at least 1".into(),
            ));
        }
        self.features.validate()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Output of [`process`].
///
/// `clusters` holds every tree node (internal and leaf) in pre-order per
/// group; `total_clusters` counts leaf clusters only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub total_events: usize,
    pub total_clusters: usize,
    pub is_complete: bool,
    pub missing_events: usize,
    /// Number of partition groups after clamping `k` to the batch size.
    pub effective_k: usize,
    pub clusters: Vec<ClusterRecord>,
    pub event_clusters: BTreeMap<EventId, ClusterId>,
}

impl ClusteringResult {
    pub fn leaf_clusters(&self) -> impl Iterator<Item = &ClusterRecord> {
        self.clusters.iter().filter(|c| c.is_leaf)
    }
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

/// Cluster `events` into `k` groups bisected down to `min_cluster_size`.
pub fn process(
    events: &[Event],
    k: usize,
    min_cluster_size: usize,
) -> Result<ClusteringResult, CoreError> {
    process_with_config(events, &ClusteringConfig::new(k, min_cluster_size))
}

/// [`process`] with explicit feature parameters.
pub fn process_with_config(
    events: &[Event],
    config: &ClusteringConfig,
) -> Result<ClusteringResult, CoreError> {
    config.validate()?;
    if events.is_empty() {
        return Err(CoreError::Validation(
            "At least one event is required".into(),
        ));
    }

    let partition = partition_events(events, config.k, &config.features);

    let mut labels = LabelCounter::new();
    let mut ids = IdCounter::new();
    let mut clusters = Vec::new();
    let mut event_clusters = BTreeMap::new();
    let mut leaf_members = 0usize;

    for (group_index, members) in partition.groups.iter().enumerate() {
        let group_events: Vec<&Event> = members.iter().map(|&i| &events[i]).collect();
        let group_min = min_date(group_events.iter().copied());

        let points: Vec<FeatureVector> = match group_min {
            Some(reference) => group_events
                .iter()
                .map(|e| config.features.vector_for(e, reference))
                .collect(),
            None => Vec::new(),
        };

        let tree = build_tree(&points, config.min_cluster_size, &mut labels);
        let flat = flatten(
            &tree,
            &group_events,
            &mut ids,
            group_min,
            &format!("G{group_index}"),
        );

        tracing::debug!(
            group = group_index,
            events = group_events.len(),
            nodes = flat.records.len(),
            leaves = tree.leaves().len(),
            "Clustered group"
        );

        leaf_members += flat.leaf_members;
        clusters.extend(flat.records);
        event_clusters.extend(flat.event_clusters);
    }

    let total_events = events.len();
    let is_complete = leaf_members == total_events;
    let missing_events = total_events.saturating_sub(leaf_members);
    if !is_complete {
        tracing::warn!(
            total_events,
            leaf_members,
            missing_events,
            "Clustering result does not cover every event"
        );
    }

    let total_clusters = clusters.iter().filter(|c| c.is_leaf).count();
    tracing::info!(
        total_events,
        k = partition.effective_k(),
        total_clusters,
        records = clusters.len(),
        "Clustering complete"
    );

    Ok(ClusteringResult {
        total_events,
        total_clusters,
        is_complete,
        missing_events,
        effective_k: partition.effective_k(),
        clusters,
        event_clusters,
    })
}
