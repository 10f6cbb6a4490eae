//! Stations of the pollution workbook.

use super::sheet_station;
use crate::dedup::{NaturalKeyMap, Presence};
use crate::entity::{Station, StationKey};
use crate::report::ReadReport;
use crate::table::Workbook;

/// One station per distinct sheet title, skipping the workbook's first
/// (legend) sheet.
///
/// `sentinel` names the station that timeseries readings are attributed to;
/// it is appended after the workbook's stations unless already among them.
pub fn read_stations(workbook: &Workbook, sentinel: Option<&str>) -> ReadReport<Station> {
    let mut report = ReadReport::new("stations");
    let mut stations: NaturalKeyMap<StationKey, Presence> = NaturalKeyMap::new();

    for sheet in workbook.sheets().iter().skip(1) {
        report.rows_read += 1;
        match sheet_station(sheet) {
            Ok(key) => {
                stations.observe(key, ());
            }
            Err(reason) => report.skip(sheet.name(), 0, reason),
        }
    }

    let from_sheets = stations.len();
    if let Some(name) = sentinel {
        stations.observe(StationKey::new(name), ());
    }

    report.records = stations
        .into_iter()
        .map(|(key, _)| Station {
            name: key.name().to_string(),
        })
        .collect();

    tracing::info!("Found {} unique meteorological stations", from_sheets);
    report
}
