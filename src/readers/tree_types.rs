//! Species catalog (CSV, header row, positional).
//!
//! Columns: type id, local name, scientific name, six size-class counts, total,
//! area, crown volume, average crown volume. Only the third size-class count
//! is kept, as `amount`.

use crate::coerce::{clean_text, integer, nullable_number, Numeric};
use crate::entity::{RowError, TreeType};
use crate::extraction::Extractor;
use crate::report::ReadReport;
use crate::table::{Row, Table};

const TYPE_ID: usize = 0;
const LOCAL_NAME: usize = 1;
const SCIENTIFIC_NAME: usize = 2;
const AMOUNT: usize = 5;

/// Species catalog rows after the header row.
pub fn read_tree_types(table: &Table) -> ReadReport<TreeType> {
    let mut report = ReadReport::new("tree types");

    for (index, row) in table.rows().iter().enumerate().skip(1) {
        if row.is_blank() {
            continue;
        }
        report.record(table.name(), index, read_row(row).into());
    }

    report.log_summary();
    report
}

fn read_row(row: &Row) -> Result<TreeType, RowError> {
    let id = row.cell(TYPE_ID);
    if id.is_blank() {
        return Err(RowError::MissingField { field: "type_id" });
    }
    let type_id = integer(id).ok_or_else(|| RowError::InvalidNumber {
        field: "type_id",
        raw: id.to_string(),
    })?;

    Ok(TreeType {
        type_id,
        greek_name: clean_text(row.cell(LOCAL_NAME)).unwrap_or_default(),
        scientific_name: clean_text(row.cell(SCIENTIFIC_NAME)).unwrap_or_default(),
        amount: nullable_number(row.cell(AMOUNT)).unwrap_or(Numeric::Int(0)),
    })
}
