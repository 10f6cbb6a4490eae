//! Column addressing for tabular rows.
//!
//! Most sources are read by fixed column position through [`Row`]; the
//! timeseries export is read by header name through [`RowView`]. Both
//! implement [`Extractor`], so every reader pulls cells the same way.

use crate::table::{Cell, Row, Table};
use std::fmt;

/// Reference to a column of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// Zero-based column position (column A is 0)
    Index(usize),
    /// Header name
    Name(String),
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        ColumnRef::Name(name.to_string())
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "[{}]", i),
            ColumnRef::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Trait for types that can hand out cells by column reference
pub trait Extractor {
    /// Cell at the given column, `None` if the column does not exist
    fn extract(&self, column: &ColumnRef) -> Option<&Cell>;

    /// Cell at the given column, treating a missing column as an empty cell
    fn cell(&self, column: impl Into<ColumnRef>) -> &Cell {
        const EMPTY: &Cell = &Cell::Empty;
        self.extract(&column.into()).unwrap_or(EMPTY)
    }
}

/// A row seen through its table's headers.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    row: &'a Row,
    headers: Option<&'a [String]>,
}

impl<'a> RowView<'a> {
    pub fn new(table: &'a Table, row: &'a Row) -> Self {
        Self {
            row,
            headers: table.headers(),
        }
    }
}

impl Extractor for RowView<'_> {
    fn extract(&self, column: &ColumnRef) -> Option<&Cell> {
        let index = match column {
            ColumnRef::Index(i) => *i,
            ColumnRef::Name(name) => self
                .headers?
                .iter()
                .position(|h| h.trim() == name.as_str())?,
        };
        Some(self.row.get(index))
    }
}

impl Extractor for Row {
    fn extract(&self, column: &ColumnRef) -> Option<&Cell> {
        match column {
            ColumnRef::Index(i) => Some(self.get(*i)),
            ColumnRef::Name(_) => None,
        }
    }
}
