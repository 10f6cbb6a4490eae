//! Measurement rows of the pollution workbook.
//!
//! Each sheet after the legend belongs to one station (named in A1). Data rows
//! are laid out by position:
//!
//! | col | field |
//! |-----|-------|
//! | B   | sequence number |
//! | C   | date |
//! | D   | weekday (ignored, derived from the date) |
//! | E-K | SO2, PM10, PM2.5, CO, NO, NO2, O3 |
//! | M   | temperature |
//! | N   | humidity |

use super::sheet_station;
use crate::coerce::{integer, nullable_number, parse_date};
use crate::entity::{Measurements, PollutionReading, RowError, StationKey};
use crate::extraction::Extractor;
use crate::report::ReadReport;
use crate::table::{Row, Workbook};
use chrono::NaiveTime;

const NUMBER: usize = 1;
const DATE: usize = 2;
const SO2: usize = 4;
const PM10: usize = 5;
const PM25: usize = 6;
const CO: usize = 7;
const NO: usize = 8;
const NO2: usize = 9;
const O3: usize = 10;
const TEMPERATURE: usize = 12;
const HUMIDITY: usize = 13;

/// Measurement rows of every station sheet, attributed to the sheet's station.
pub fn read_pollution(workbook: &Workbook) -> ReadReport<PollutionReading> {
    let mut report = ReadReport::new("pollution");

    for sheet in workbook.sheets().iter().skip(1) {
        let station = match sheet_station(sheet) {
            Ok(station) => station,
            Err(reason) => {
                // already reported by the station reader
                tracing::debug!("Passing over sheet '{}': {}", sheet.name(), reason);
                continue;
            }
        };

        tracing::debug!("Reading sheet '{}' for station {}", sheet.name(), station.name());

        for (index, row) in sheet.rows().iter().enumerate().skip(1) {
            if row.is_blank() {
                continue;
            }
            report.record(sheet.name(), index, read_row(&station, index, row).into());
        }
    }

    report.log_summary();
    report
}

fn read_row(station: &StationKey, index: usize, row: &Row) -> Result<PollutionReading, RowError> {
    let date = row.cell(DATE);
    if date.is_blank() {
        return Err(RowError::MissingField { field: "date" });
    }
    let timestamp = parse_date(date)?.date().and_time(NaiveTime::MIN);

    // Title row is 0, so the row index doubles as the data row's position.
    let number = integer(row.cell(NUMBER)).unwrap_or(index as i64);

    let measurements = Measurements {
        so2: nullable_number(row.cell(SO2)),
        pm10: nullable_number(row.cell(PM10)),
        pm25: nullable_number(row.cell(PM25)),
        co: nullable_number(row.cell(CO)),
        no: nullable_number(row.cell(NO)),
        no2: nullable_number(row.cell(NO2)),
        o3: nullable_number(row.cell(O3)),
        temperature: nullable_number(row.cell(TEMPERATURE)),
        humidity: nullable_number(row.cell(HUMIDITY)),
    };

    Ok(PollutionReading::new(
        number,
        station.clone(),
        timestamp,
        measurements,
    ))
}
