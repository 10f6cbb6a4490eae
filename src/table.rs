//! In-memory tabular sources.
//!
//! Workbooks are read with `calamine` and delimited files with `csv`. Both end
//! up as [`Table`]s of [`Cell`]s addressed by zero-based row and column, the
//! same positions a spreadsheet user sees (column A is 0), regardless of where
//! the used range of a sheet starts.

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::NaiveDateTime;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

static EMPTY_CELL: Cell = Cell::Empty;

/// A single raw cell value as found in a source.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Text cell, or `Empty` for the empty string.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    /// True for empty cells and text cells holding only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Int(i) => write!(f, "{}", i),
            // Spreadsheets store every number as a float; ids and postal codes
            // must not pick up a trailing ".0".
            Cell::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) => Cell::Float(*f),
            Data::String(s) => Cell::text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(Cell::DateTime)
                .unwrap_or_else(|| Cell::Float(dt.as_f64())),
            Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(Cell::DateTime)
                .unwrap_or_else(|_| Cell::text(s.clone())),
            Data::DurationIso(s) => Cell::text(s.clone()),
        }
    }
}

/// One row of cells. Columns past the end read as [`Cell::Empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn get(&self, column: usize) -> &Cell {
        self.cells.get(column).unwrap_or(&EMPTY_CELL)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Vec<Cell>> for Row {
    fn from(cells: Vec<Cell>) -> Self {
        Row::new(cells)
    }
}

/// A named grid of rows: one worksheet or one delimited file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    name: String,
    headers: Option<Vec<String>>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            headers: None,
            rows: rows.into_iter().map(Row::new).collect(),
        }
    }

    /// Attach column names, making the table addressable by name.
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Position of a named column (names are compared after trimming).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .as_ref()?
            .iter()
            .position(|h| h.trim() == name.trim())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows.get(row).map(|r| r.get(column)).unwrap_or(&EMPTY_CELL)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build a table from a worksheet range, re-anchoring it at cell A1.
    pub fn from_range(name: impl Into<String>, range: &Range<Data>) -> Self {
        let (first_row, first_col) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Row> = (0..first_row).map(|_| Row::default()).collect();
        rows.extend(range.rows().map(|cells| {
            std::iter::repeat(Cell::Empty)
                .take(first_col)
                .chain(cells.iter().map(Cell::from))
                .collect::<Vec<_>>()
                .into()
        }));

        Self {
            name: name.into(),
            headers: None,
            rows,
        }
    }

    /// Read a delimited file. With `has_headers`, the first record becomes the
    /// column names instead of a data row.
    pub fn read_csv<P: AsRef<Path>>(path: P, has_headers: bool) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| SourceError::Csv {
            path: path.to_path_buf(),
            error: csv::Error::from(e),
        })?;
        Self::from_csv_reader(path.display().to_string(), file, has_headers).map_err(|e| match e {
            SourceError::Csv { error, .. } => SourceError::Csv {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    pub fn from_csv_reader<R: Read>(
        name: impl Into<String>,
        reader: R,
        has_headers: bool,
    ) -> Result<Self, SourceError> {
        let name = name.into();
        let csv_error = |error| SourceError::Csv {
            path: PathBuf::from(&name),
            error,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .flexible(true)
            .from_reader(reader);

        let headers = if has_headers {
            Some(
                rdr.headers()
                    .map_err(csv_error)?
                    .iter()
                    .map(|h| h.trim().to_string())
                    .collect::<Vec<_>>(),
            )
        } else {
            None
        };

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(csv_error)?;
            rows.push(Row::new(
                record
                    .iter()
                    .map(|field| {
                        if field.trim().is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(field.to_string())
                        }
                    })
                    .collect(),
            ));
        }

        Ok(Self {
            name,
            headers,
            rows,
        })
    }
}

/// All worksheets of a workbook, in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    name: String,
    sheets: Vec<Table>,
}

impl Workbook {
    pub fn new(name: impl Into<String>, sheets: Vec<Table>) -> Self {
        Self {
            name: name.into(),
            sheets,
        }
    }

    /// Open any format calamine understands (xlsx, xls, xlsb, ods).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let workbook_error = |error| SourceError::Workbook {
            path: path.to_path_buf(),
            error,
        };

        let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
        let sheet_names = workbook.sheet_names().to_vec();

        let mut sheets = Vec::with_capacity(sheet_names.len());
        for sheet_name in sheet_names {
            let range = workbook
                .worksheet_range(&sheet_name)
                .map_err(workbook_error)?;
            sheets.push(Table::from_range(sheet_name, &range));
        }

        tracing::debug!("Opened {} with {} sheets", path.display(), sheets.len());

        Ok(Self {
            name: path.display().to_string(),
            sheets,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sheets(&self) -> &[Table] {
        &self.sheets
    }

    pub fn first_sheet(&self) -> Result<&Table, SourceError> {
        self.sheets.first().ok_or_else(|| SourceError::NoSheets {
            workbook: self.name.clone(),
        })
    }
}

/// Failure to read a source at all. Fatal to the batch built from it.
#[derive(Debug)]
pub enum SourceError {
    Workbook {
        path: PathBuf,
        error: calamine::Error,
    },
    Csv {
        path: PathBuf,
        error: csv::Error,
    },
    NoSheets {
        workbook: String,
    },
    MissingColumn {
        table: String,
        column: String,
    },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Workbook { path, error } => {
                write!(f, "Failed to read workbook {}: {}", path.display(), error)
            }
            SourceError::Csv { path, error } => {
                write!(f, "Failed to read delimited file {}: {}", path.display(), error)
            }
            SourceError::NoSheets { workbook } => write!(f, "Workbook {} has no sheets", workbook),
            SourceError::MissingColumn { table, column } => {
                write!(f, "Column '{}' not found in {}", column, table)
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Workbook { error, .. } => Some(error),
            SourceError::Csv { error, .. } => Some(error),
            _ => None,
        }
    }
}
