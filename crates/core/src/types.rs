use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Caller-supplied event identifier. Opaque to the engine.
pub type EventId = i64;

/// A single geotemporal event, validated at the system boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub lat: f64,
    pub lon: f64,
    pub date: NaiveDate,
}

impl Event {
    pub fn new(id: EventId, lat: f64, lon: f64, date: NaiveDate) -> Self {
        Self { id, lat, lon, date }
    }

    /// Whether both coordinates are finite numbers.
    pub fn has_valid_coordinates(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Geometric proxy for an event: `(lat, lon, temporal_value)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector(pub [f64; 3]);

impl FeatureVector {
    pub const DIMENSIONS: usize = 3;

    pub fn new(lat: f64, lon: f64, temporal: f64) -> Self {
        Self([lat, lon, temporal])
    }

    pub fn lat(&self) -> f64 {
        self.0[0]
    }

    pub fn lon(&self) -> f64 {
        self.0[1]
    }

    pub fn temporal(&self) -> f64 {
        self.0[2]
    }

    /// Component along `axis` (0 = lat, 1 = lon, 2 = temporal).
    pub fn axis(&self, axis: usize) -> f64 {
        self.0[axis]
    }
}
