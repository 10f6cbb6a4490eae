//! Yearly pollutant concentration timeseries (CSV with a header row).
//!
//! Columns are addressed by name. Only `time` is mandatory; a missing
//! concentration column reads as NULL for every row. The export carries no
//! particulate, temperature or humidity data.

use crate::coerce::{nullable_number, parse_date};
use crate::entity::{Measurements, PollutionReading, RowError, StationKey};
use crate::extraction::{Extractor, RowView};
use crate::report::ReadReport;
use crate::table::{SourceError, Table};

pub const TIME_COLUMN: &str = "time";
pub const SO2_COLUMN: &str = "so2_conc";
pub const NO_COLUMN: &str = "no_conc";
pub const NO2_COLUMN: &str = "no2_conc";
pub const O3_COLUMN: &str = "o3_conc";
pub const CO_COLUMN: &str = "co_conc";

/// Read every row of a timeseries export, attributing it to `station`.
pub fn read_timeseries(
    table: &Table,
    station: &str,
) -> Result<ReadReport<PollutionReading>, SourceError> {
    if table.column_index(TIME_COLUMN).is_none() {
        return Err(SourceError::MissingColumn {
            table: table.name().to_string(),
            column: TIME_COLUMN.to_string(),
        });
    }

    let station = StationKey::new(station);
    let mut report = ReadReport::new("timeseries");

    for (index, row) in table.rows().iter().enumerate() {
        if row.is_blank() {
            continue;
        }
        let view = RowView::new(table, row);
        report.record(table.name(), index, read_row(&station, index, &view).into());
    }

    report.log_summary();
    Ok(report)
}

fn read_row(
    station: &StationKey,
    index: usize,
    row: &RowView<'_>,
) -> Result<PollutionReading, RowError> {
    let time = row.cell(TIME_COLUMN);
    if time.is_blank() {
        return Err(RowError::MissingField { field: TIME_COLUMN });
    }
    let timestamp = parse_date(time)?;

    let measurements = Measurements {
        so2: nullable_number(row.cell(SO2_COLUMN)),
        co: nullable_number(row.cell(CO_COLUMN)),
        no: nullable_number(row.cell(NO_COLUMN)),
        no2: nullable_number(row.cell(NO2_COLUMN)),
        o3: nullable_number(row.cell(O3_COLUMN)),
        ..Measurements::default()
    };

    Ok(PollutionReading::new(
        index as i64 + 1,
        station.clone(),
        timestamp,
        measurements,
    ))
}
