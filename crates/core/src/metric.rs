//! Weighted 3-D distance and the temporal feature transform.
//!
//! Events are projected onto `(lat, lon, temporal_value)` where the temporal
//! value is the day offset from a reference date plus Gaussian boosts centred
//! on configured historical periods. Distances weight the temporal axis 5x.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Event, FeatureVector};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Per-axis weights applied to squared differences: `[lat, lon, temporal]`.
pub const AXIS_WEIGHTS: [f64; 3] = [1.0, 1.0, 5.0];

/// Sigma (in days) used for feature vectors during grouping and bisection.
pub const DEFAULT_GROUPING_SIGMA: f64 = 300.0;

/// Sigma (in days) for general-purpose temporal normalization.
pub const DEFAULT_SIGMA: f64 = 183.0;

/// Month/day of the centre of a historical period, within its midpoint year.
const PERIOD_CENTER_MONTH: u32 = 7;
const PERIOD_CENTER_DAY: u32 = 1;

// ---------------------------------------------------------------------------
// Distance
// ---------------------------------------------------------------------------

/// Weighted squared Euclidean distance.
pub fn weighted_distance_squared(p: &FeatureVector, q: &FeatureVector) -> f64 {
    p.0.iter()
        .zip(q.0.iter())
        .zip(AXIS_WEIGHTS.iter())
        .map(|((a, b), w)| w * (a - b) * (a - b))
        .sum()
}

/// Weighted Euclidean distance with weights [`AXIS_WEIGHTS`].
///
/// Both operands are fixed 3-component vectors, so a dimensionality mismatch
/// cannot be expressed.
pub fn weighted_distance(p: &FeatureVector, q: &FeatureVector) -> f64 {
    weighted_distance_squared(p, q).sqrt()
}

/// Gaussian probability density at `x` for mean `mu` and spread `sigma`.
pub fn gaussian(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    (1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt())) * (-0.5 * z * z).exp()
}

// ---------------------------------------------------------------------------
// Historical periods
// ---------------------------------------------------------------------------

/// An inclusive range of years that boosts the temporal value of nearby events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalPeriod {
    pub start_year: i32,
    pub end_year: i32,
}

impl HistoricalPeriod {
    pub const fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
        }
    }

    /// July 1 of the midpoint year (integer midpoint).
    pub fn center_date(&self) -> Option<NaiveDate> {
        let mid_year = (self.start_year + self.end_year).div_euclid(2);
        NaiveDate::from_ymd_opt(mid_year, PERIOD_CENTER_MONTH, PERIOD_CENTER_DAY)
    }
}

/// 1914-1918 and 1939-1945.
pub const DEFAULT_PERIODS: [HistoricalPeriod; 2] = [
    HistoricalPeriod::new(1914, 1918),
    HistoricalPeriod::new(1939, 1945),
];

// ---------------------------------------------------------------------------
// Feature transform
// ---------------------------------------------------------------------------

/// Whole days from `min_date` to `date`. Negative when `date` is earlier.
pub fn days_since(date: NaiveDate, min_date: NaiveDate) -> i64 {
    (date - min_date).num_days()
}

/// Day offset plus the sum of Gaussian boosts for every period.
pub fn temporal_value(
    date: NaiveDate,
    min_date: NaiveDate,
    periods: &[HistoricalPeriod],
    sigma: f64,
) -> f64 {
    let days = days_since(date, min_date) as f64;
    let boost: f64 = periods
        .iter()
        .filter_map(HistoricalPeriod::center_date)
        .map(|center| gaussian(days, days_since(center, min_date) as f64, sigma))
        .sum();
    days + boost
}

/// Build the `(lat, lon, temporal_value)` vector for one event.
pub fn feature_vector(
    lat: f64,
    lon: f64,
    date: NaiveDate,
    min_date: NaiveDate,
    periods: &[HistoricalPeriod],
    sigma: f64,
) -> FeatureVector {
    FeatureVector::new(lat, lon, temporal_value(date, min_date, periods, sigma))
}

/// Periods and spread used when projecting events into feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub periods: Vec<HistoricalPeriod>,
    pub sigma: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            periods: DEFAULT_PERIODS.to_vec(),
            sigma: DEFAULT_GROUPING_SIGMA,
        }
    }
}

impl FeatureConfig {
    /// Feature vector for `event` relative to `min_date`.
    pub fn vector_for(&self, event: &Event, min_date: NaiveDate) -> FeatureVector {
        feature_vector(
            event.lat,
            event.lon,
            event.date,
            min_date,
            &self.periods,
            self.sigma,
        )
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Sigma must be a positive number of days, got {}",
                self.sigma
            )));
        }
        for period in &self.periods {
            if period.start_year > period.end_year {
                return Err(CoreError::Validation(format!(
                    "Historical period start {} is after end {}",
                    period.start_year, period.end_year
                )));
            }
            if period.center_date().is_none() {
                return Err(CoreError::Validation(format!(
                    "Historical period {}-{} is outside the supported calendar range",
                    period.start_year, period.end_year
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // -- Distance ------------------------------------------------------------

    #[test]
    fn distance_weights_temporal_axis() {
        let p = FeatureVector::new(0.0, 0.0, 0.0);
        let q = FeatureVector::new(0.0, 0.0, 1.0);
        assert!((weighted_distance(&p, &q) - 5.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn distance_spatial_axes_are_unweighted() {
        let p = FeatureVector::new(0.0, 0.0, 0.0);
        let q = FeatureVector::new(3.0, 4.0, 0.0);
        assert!((weighted_distance(&p, &q) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let p = FeatureVector::new(1.5, -2.0, 40.0);
        let q = FeatureVector::new(-3.0, 7.25, 12.0);
        assert_eq!(weighted_distance(&p, &q), weighted_distance(&q, &p));
        assert_eq!(weighted_distance(&p, &p), 0.0);
    }

    // -- Gaussian ------------------------------------------------------------

    #[test]
    fn gaussian_peak_value() {
        let sigma = 300.0;
        let expected = 1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt());
        assert!((gaussian(10.0, 10.0, sigma) - expected).abs() < 1e-15);
    }

    #[test]
    fn gaussian_is_symmetric_around_mean() {
        assert!((gaussian(5.0, 0.0, 2.0) - gaussian(-5.0, 0.0, 2.0)).abs() < 1e-15);
        assert!(gaussian(5.0, 0.0, 2.0) < gaussian(1.0, 0.0, 2.0));
    }

    // -- Feature transform ---------------------------------------------------

    #[test]
    fn period_center_is_july_first_of_midpoint_year() {
        assert_eq!(DEFAULT_PERIODS[0].center_date(), Some(date(1916, 7, 1)));
        assert_eq!(DEFAULT_PERIODS[1].center_date(), Some(date(1942, 7, 1)));
    }

    #[test]
    fn temporal_value_without_periods_is_day_offset() {
        let v = temporal_value(date(2000, 1, 11), date(2000, 1, 1), &[], DEFAULT_SIGMA);
        assert_eq!(v, 10.0);
    }

    #[test]
    fn temporal_value_allows_dates_before_min_date() {
        let v = temporal_value(date(1999, 12, 31), date(2000, 1, 1), &[], DEFAULT_SIGMA);
        assert_eq!(v, -1.0);
    }

    #[test]
    fn temporal_value_adds_boost_at_period_center() {
        let min = date(1900, 1, 1);
        let center = date(1916, 7, 1);
        let sigma = DEFAULT_SIGMA;
        let plain = days_since(center, min) as f64;
        let boosted = temporal_value(center, min, &DEFAULT_PERIODS, sigma);
        let peak = gaussian(0.0, 0.0, sigma);
        assert!(boosted > plain);
        assert!((boosted - plain - peak).abs() < 1e-9);
    }

    #[test]
    fn feature_vector_keeps_coordinates() {
        let v = feature_vector(13.75, 100.5, date(2024, 1, 3), date(2024, 1, 1), &[], 300.0);
        assert_eq!(v.lat(), 13.75);
        assert_eq!(v.lon(), 100.5);
        assert_eq!(v.temporal(), 2.0);
    }

    // -- Config validation ---------------------------------------------------

    #[test]
    fn default_feature_config_is_valid() {
        let config = FeatureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sigma, DEFAULT_GROUPING_SIGMA);
        assert_eq!(config.periods.len(), 2);
    }

    #[test]
    fn rejects_non_positive_sigma() {
        let config = FeatureConfig {
            sigma: 0.0,
            ..FeatureConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_period() {
        let config = FeatureConfig {
            periods: vec![HistoricalPeriod::new(1945, 1939)],
            sigma: DEFAULT_SIGMA,
        };
        assert!(config.validate().is_err());
    }
}
