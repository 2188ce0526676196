//! Geotemporal event clustering engine.
//!
//! Groups `(lat, lon, date)` events into a hierarchy of spatially and
//! temporally coherent clusters. The pipeline is deterministic:
//!
//! ```text
//! events -> feature vectors -> greedy partition into k groups
//!        -> divisive bisection per group -> flat cluster records
//! ```
//!
//! Pure domain logic: no I/O, no async, no state shared between calls.

pub mod aggregate;
pub mod closest_pair;
pub mod divisive;
pub mod engine;
pub mod error;
pub mod input;
pub mod metric;
pub mod partition;
pub mod quality;
pub mod spatial_index;
pub mod types;
