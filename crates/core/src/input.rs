//! Boundary validation: raw caller payloads to [`Event`]s.
//!
//! The engine assumes unique ids, finite in-range coordinates and parsed
//! dates. Everything here enforces that before [`crate::engine::process`]
//! is called.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Event, EventId};

/// Event as received from a caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "EventID")]
    pub event_id: Option<EventId>,
    #[serde(rename = "Lat")]
    pub lat: Option<f64>,
    #[serde(rename = "Lon")]
    pub lon: Option<f64>,
    #[serde(rename = "Date")]
    pub date: Option<String>,
}

/// Parse a calendar date, dropping any time-of-day suffix.
///
/// Accepts `2020-01-31`, `2020-01-31T10:00:00Z` and `2020-01-31 10:00:00`.
pub fn normalize_date(raw: &str) -> Result<NaiveDate, CoreError> {
    let trimmed = raw.trim();
    let day = trimmed
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| CoreError::Validation(format!("Invalid date '{raw}': {e}")))
}

pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), CoreError> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(CoreError::Validation(format!(
            "Coordinates must be finite, got ({lat}, {lon})"
        )));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(CoreError::Validation(format!(
            "Latitude {lat} is outside [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(CoreError::Validation(format!(
            "Longitude {lon} is outside [-180, 180]"
        )));
    }
    Ok(())
}

/// Validate a whole batch. The first offending event fails the batch.
pub fn validate_events(raw: Vec<RawEvent>) -> Result<Vec<Event>, CoreError> {
    if raw.is_empty() {
        return Err(CoreError::Validation(
            "At least one event is required".into(),
        ));
    }

    let mut seen: HashSet<EventId> = HashSet::with_capacity(raw.len());
    let mut events = Vec::with_capacity(raw.len());

    for (index, item) in raw.into_iter().enumerate() {
        let id = require(item.event_id, "EventID", index)?;
        let lat = require(item.lat, "Lat", index)?;
        let lon = require(item.lon, "Lon", index)?;
        let date = require(item.date, "Date", index)?;

        validate_coordinates(lat, lon).map_err(|e| at_index(e, index))?;
        let date = normalize_date(&date).map_err(|e| at_index(e, index))?;

        if !seen.insert(id) {
            return Err(CoreError::Validation(format!(
                "Duplicate EventID {id} at index {index}"
            )));
        }
        events.push(Event::new(id, lat, lon, date));
    }

    Ok(events)
}

fn require<T>(value: Option<T>, field: &str, index: usize) -> Result<T, CoreError> {
    value.ok_or_else(|| {
        CoreError::Validation(format!("Event at index {index} is missing {field}"))
    })
}

fn at_index(err: CoreError, index: usize) -> CoreError {
    match err {
        CoreError::Validation(msg) => {
            CoreError::Validation(format!("Event at index {index}: {msg}"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn raw(id: EventId, lat: f64, lon: f64, date: &str) -> RawEvent {
        RawEvent {
            event_id: Some(id),
            lat: Some(lat),
            lon: Some(lon),
            date: Some(date.to_string()),
        }
    }

    // -- Dates ---------------------------------------------------------------

    #[test]
    fn plain_date_parses() {
        assert_eq!(
            normalize_date("1944-06-06").unwrap(),
            NaiveDate::from_ymd_opt(1944, 6, 6).unwrap()
        );
    }

    #[test]
    fn time_suffix_is_dropped() {
        let expected = NaiveDate::from_ymd_opt(1944, 6, 6).unwrap();
        assert_eq!(normalize_date("1944-06-06T05:30:00Z").unwrap(), expected);
        assert_eq!(normalize_date("1944-06-06 05:30:00").unwrap(), expected);
        assert_eq!(normalize_date("  1944-06-06\n").unwrap(), expected);
    }

    #[test]
    fn malformed_date_is_rejected() {
        assert_matches!(normalize_date("06/06/1944"), Err(CoreError::Validation(_)));
        assert_matches!(normalize_date(""), Err(CoreError::Validation(_)));
        assert_matches!(normalize_date("1944-02-30"), Err(CoreError::Validation(_)));
    }

    // -- Coordinates ---------------------------------------------------------

    #[test]
    fn coordinate_bounds() {
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
        assert!(validate_coordinates(90.5, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.1).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::INFINITY).is_err());
    }

    // -- Batches -------------------------------------------------------------

    #[test]
    fn valid_batch_converts_in_order() {
        let events = validate_events(vec![
            raw(7, 10.0, 20.0, "2001-01-01"),
            raw(3, -5.0, 40.0, "2002-02-02T00:00:00"),
        ])
        .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, 7);
        assert_eq!(events[1].date, NaiveDate::from_ymd_opt(2002, 2, 2).unwrap());
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert_matches!(validate_events(Vec::new()), Err(CoreError::Validation(_)));
    }

    #[test]
    fn missing_field_names_field_and_index() {
        let mut second = raw(2, 0.0, 0.0, "2000-01-01");
        second.lon = None;
        let err = validate_events(vec![raw(1, 0.0, 0.0, "2000-01-01"), second]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Lon"), "{msg}");
        assert!(msg.contains("index 1"), "{msg}");
    }

    #[test]
    fn out_of_range_coordinate_reports_index() {
        let err = validate_events(vec![raw(1, 95.0, 0.0, "2000-01-01")]).unwrap_err();
        assert!(err.to_string().contains("index 0"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = validate_events(vec![
            raw(1, 0.0, 0.0, "2000-01-01"),
            raw(1, 1.0, 1.0, "2000-01-02"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate EventID 1"));
    }

    #[test]
    fn raw_event_uses_wire_names() {
        let parsed: RawEvent =
            serde_json::from_str(r#"{"EventID": 5, "Lat": 1.5, "Lon": -2.0, "Date": "1999-12-31"}"#)
                .unwrap();
        assert_eq!(parsed, raw(5, 1.5, -2.0, "1999-12-31"));

        let partial: RawEvent = serde_json::from_str(r#"{"EventID": 5}"#).unwrap();
        assert_eq!(partial.lat, None);
        assert_eq!(partial.date, None);
    }
}
