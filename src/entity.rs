//! Normalized records and their natural keys.
//!
//! Every record here is fully coerced: dates are calendar dates, absent
//! measurements are `None`, names are whitespace-collapsed. Foreign references
//! are carried as natural keys, never as generated ids.

use crate::coerce::{weekday_label, Numeric};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Why a single source row was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum RowError {
    MissingField {
        field: &'static str,
    },
    InvalidDate {
        raw: String,
    },
    InvalidNumber {
        field: &'static str,
        raw: String,
    },
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowError::MissingField { field } => {
                write!(f, "Required field '{}' is missing or empty", field)
            }
            RowError::InvalidDate { raw } => write!(f, "Could not parse date: '{}'", raw),
            RowError::InvalidNumber { field, raw } => {
                write!(f, "Field '{}' is not a number: '{}'", field, raw)
            }
        }
    }
}

impl std::error::Error for RowError {}

/// Core trait for normalized records.
///
/// # Example
///
/// ```ignore
/// use dendro::Entity;
///
/// let line = station.to_ndjson_line()?;
/// ```
pub trait Entity: Serialize + Sized {
    /// The name of this entity type
    const NAME: &'static str;

    /// Convert entity to JSON string
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Convert entity to NDJSON line (newline-delimited JSON)
    fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let json = self.to_json()?;
        Ok(format!("{}\n", json))
    }
}

/// Station natural key. Names compare case-insensitively, the way the
/// station table's collation does; the first spelling seen is kept.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct StationKey {
    name: String,
    #[serde(skip)]
    folded: String,
}

impl StationKey {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let folded = name.to_lowercase();
        Self { name, folded }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for StationKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for StationKey {}

impl Hash for StationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

/// A meteorological station
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub name: String,
}

impl Station {
    pub fn key(&self) -> StationKey {
        StationKey::new(self.name.clone())
    }
}

impl Entity for Station {
    const NAME: &'static str = "Station";
}

/// Pollutant concentrations and environmental readings; any may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Measurements {
    pub so2: Option<Numeric>,
    pub pm10: Option<Numeric>,
    pub pm25: Option<Numeric>,
    pub co: Option<Numeric>,
    pub no: Option<Numeric>,
    pub no2: Option<Numeric>,
    pub o3: Option<Numeric>,
    pub temperature: Option<Numeric>,
    pub humidity: Option<Numeric>,
}

/// One measurement row of a station
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutionReading {
    pub number: i64,
    pub station: StationKey,
    pub date: NaiveDate,
    pub timestamp: NaiveDateTime,
    pub day: &'static str,
    pub year: i32,
    #[serde(flatten)]
    pub measurements: Measurements,
}

impl PollutionReading {
    /// Build a reading; calendar date, weekday label and year all derive
    /// from `timestamp`.
    pub fn new(
        number: i64,
        station: StationKey,
        timestamp: NaiveDateTime,
        measurements: Measurements,
    ) -> Self {
        let date = timestamp.date();
        Self {
            number,
            station,
            date,
            timestamp,
            day: weekday_label(date),
            year: date.year(),
            measurements,
        }
    }
}

impl Entity for PollutionReading {
    const NAME: &'static str = "PollutionReading";
}

/// A species catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeType {
    pub type_id: i64,
    pub greek_name: String,
    pub scientific_name: String,
    pub amount: Numeric,
}

impl Entity for TreeType {
    const NAME: &'static str = "TreeType";
}

/// Location natural key. A missing street number is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LocationKey {
    pub tax_code: String,
    pub street_id: String,
    pub street_name: String,
    pub street_number: Option<String>,
}

/// A street address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    #[serde(flatten)]
    pub key: LocationKey,
    pub area_id: i64,
}

impl Entity for Location {
    const NAME: &'static str = "Location";
}

/// Species lookup by local name, with the catalog entry to use when the
/// name matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SpeciesRef {
    pub name: String,
    pub fallback: String,
}

/// An individual tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tree {
    pub species: SpeciesRef,
    pub common_name: String,
    pub position_x: Option<Numeric>,
    pub position_y: Option<Numeric>,
    pub lat: Option<Numeric>,
    pub lon: Option<Numeric>,
    pub location: LocationKey,
}

impl Entity for Tree {
    const NAME: &'static str = "Tree";
}
