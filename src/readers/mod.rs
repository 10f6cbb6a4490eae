//! Source readers, one per domain.
//!
//! Every reader is a pure function over an in-memory [`Table`] or
//! [`Workbook`](crate::table::Workbook) returning a
//! [`ReadReport`](crate::report::ReadReport). Columns are fixed positions,
//! except for the timeseries export, which is addressed by header name. Row 0
//! (or the first sheet of a workbook) is a title/header and never data.
//! Entirely blank rows are not data either and are passed over silently.

pub mod locations;
pub mod pollution;
pub mod stations;
pub mod timeseries;
pub mod tree_types;
pub mod trees;

pub use locations::read_locations;
pub use pollution::read_pollution;
pub use stations::read_stations;
pub use timeseries::read_timeseries;
pub use tree_types::read_tree_types;
pub use trees::read_trees;

use crate::coerce::clean_text;
use crate::entity::{RowError, StationKey};
use crate::table::Table;

/// Station of a pollution sheet: the text of cell A1.
pub(crate) fn sheet_station(sheet: &Table) -> Result<StationKey, RowError> {
    clean_text(sheet.cell(0, 0))
        .map(StationKey::new)
        .ok_or(RowError::MissingField {
            field: "station name",
        })
}
