//! Individual trees from the first sheet of the trees workbook.
//!
//! Each tree refers to its address (columns B-E, read exactly as the
//! locations reader reads them) and to its species by common name (column H).
//! Columns I-L hold the projected position and the latitude/longitude.

use super::locations::location_key;
use crate::coerce::{clean_text, nullable_number};
use crate::entity::{SpeciesRef, Tree};
use crate::extraction::Extractor;
use crate::report::{ReadReport, RowOutcome};
use crate::table::{Row, Table};

const COMMON_NAME: usize = 7;
const POSITION_X: usize = 8;
const POSITION_Y: usize = 9;
const LATITUDE: usize = 10;
const LONGITUDE: usize = 11;

/// Every non-blank row is a tree. Species names matching no catalog entry
/// resolve to `unknown_species` when the reference is looked up.
pub fn read_trees(table: &Table, unknown_species: &str) -> ReadReport<Tree> {
    let mut report = ReadReport::new("trees");

    for (index, row) in table.rows().iter().enumerate().skip(1) {
        if row.is_blank() {
            continue;
        }
        report.record(
            table.name(),
            index,
            RowOutcome::Parsed(read_row(row, unknown_species)),
        );
    }

    report.log_summary();
    report
}

fn read_row(row: &Row, unknown_species: &str) -> Tree {
    let common_name = clean_text(row.cell(COMMON_NAME)).unwrap_or_default();

    Tree {
        species: SpeciesRef {
            name: common_name.clone(),
            fallback: unknown_species.to_string(),
        },
        common_name,
        position_x: nullable_number(row.cell(POSITION_X)),
        position_y: nullable_number(row.cell(POSITION_Y)),
        lat: nullable_number(row.cell(LATITUDE)),
        lon: nullable_number(row.cell(LONGITUDE)),
        location: location_key(row),
    }
}
