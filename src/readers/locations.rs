//! Street addresses from the first sheet of the trees workbook.
//!
//! Columns: B postal code, C street id, D street name, E street number,
//! F municipal district (area id). Rows sharing a street collapse into one
//! street carrying every distinct number seen for it.

use crate::coerce::{clean_text, identifier, integer, postal_code, street_number};
use crate::dedup::{NaturalKeyMap, StreetAccumulator, StreetSighting};
use crate::entity::{Location, LocationKey, RowError};
use crate::extraction::Extractor;
use crate::report::ReadReport;
use crate::table::{Row, Table};

const TAX_CODE: usize = 1;
const STREET_ID: usize = 2;
const STREET_NAME: usize = 3;
const STREET_NUMBER: usize = 4;
const AREA_ID: usize = 5;

/// A location key without its street number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreetKey {
    pub tax_code: String,
    pub street_id: String,
    pub street_name: String,
}

impl StreetKey {
    pub fn with_number(&self, street_number: Option<String>) -> LocationKey {
        LocationKey {
            tax_code: self.tax_code.clone(),
            street_id: self.street_id.clone(),
            street_name: self.street_name.clone(),
            street_number,
        }
    }
}

/// Location key of an address or tree row.
pub(crate) fn location_key(row: &Row) -> LocationKey {
    LocationKey {
        tax_code: postal_code(row.cell(TAX_CODE)),
        street_id: identifier(row.cell(STREET_ID)),
        street_name: clean_text(row.cell(STREET_NAME)).unwrap_or_default(),
        street_number: street_number(row.cell(STREET_NUMBER)),
    }
}

/// One location per street and number of the trees sheet, in first-seen order.
pub fn read_locations(table: &Table) -> ReadReport<Location> {
    let mut report = ReadReport::new("locations");
    let mut streets: NaturalKeyMap<StreetKey, StreetAccumulator> = NaturalKeyMap::new();

    for (index, row) in table.rows().iter().enumerate().skip(1) {
        if row.is_blank() {
            continue;
        }
        report.rows_read += 1;
        match read_row(row) {
            Ok((street, sighting)) => {
                streets.observe(street, sighting);
            }
            Err(reason) => report.skip(table.name(), index, reason),
        }
    }

    let addresses: usize = streets.iter().map(|(_, s)| s.numbers.len()).sum();
    tracing::info!(
        "Found {} unique streets with {} total addresses",
        streets.len(),
        addresses
    );

    for (street, accumulated) in streets {
        for number in accumulated.expand() {
            report.records.push(Location {
                key: street.with_number(number),
                area_id: accumulated.area_id,
            });
        }
    }

    report
}

fn read_row(row: &Row) -> Result<(StreetKey, StreetSighting), RowError> {
    let key = location_key(row);
    if key.street_id.is_empty() {
        return Err(RowError::MissingField { field: "street_id" });
    }
    if key.street_name.is_empty() {
        return Err(RowError::MissingField {
            field: "street_name",
        });
    }

    let area = row.cell(AREA_ID);
    let area_id = if area.is_blank() {
        0
    } else {
        integer(area).ok_or_else(|| RowError::InvalidNumber {
            field: "area_id",
            raw: area.to_string(),
        })?
    };

    let street = StreetKey {
        tax_code: key.tax_code,
        street_id: key.street_id,
        street_name: key.street_name,
    };
    let sighting = StreetSighting {
        area_id,
        number: key.street_number,
    };
    Ok((street, sighting))
}
