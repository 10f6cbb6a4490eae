//! Writers for exported statements and normalized records.
//!
//! Statement files hold one unit per line; record files hold one JSON object
//! per line (NDJSON).

use crate::statement::{Batch, Schema};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File the combined export is written to.
pub const COMBINED_FILE: &str = "import_data.sql";

/// Error type for serialization operations
#[derive(Debug)]
pub enum SerializationError {
    JsonError(serde_json::Error),
    IoError(std::io::Error),
}

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        SerializationError::JsonError(err)
    }
}

impl From<std::io::Error> for SerializationError {
    fn from(err: std::io::Error) -> Self {
        SerializationError::IoError(err)
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::JsonError(e) => write!(f, "JSON error: {}", e),
            SerializationError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for SerializationError {}

/// NDJSON (Newline Delimited JSON) writer
pub struct NdjsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a single record as an NDJSON line
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<(), SerializationError> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    pub fn write_all<T: Serialize>(&mut self, records: &[T]) -> Result<(), SerializationError> {
        for record in records {
            self.write(record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SerializationError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Statement file writer: one rendered unit per line.
pub struct SqlWriter<W: Write> {
    writer: W,
    lines: usize,
}

impl<W: Write> SqlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    pub fn write_batch(&mut self, batch: &Batch, schema: &Schema) -> Result<(), SerializationError> {
        for line in batch.lines(schema) {
            writeln!(self.writer, "{}", line)?;
            self.lines += 1;
        }
        Ok(())
    }

    /// Lines written so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn flush(&mut self) -> Result<(), SerializationError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Write every batch to its own file under `dir`, and all of them in order to
/// [`COMBINED_FILE`] when `combined` is set. Returns the files written.
pub fn export_batches(
    batches: &[Batch],
    schema: &Schema,
    dir: &Path,
    combined: bool,
) -> Result<Vec<PathBuf>, SerializationError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for batch in batches {
        let path = dir.join(batch.domain.file_name());
        let mut writer = SqlWriter::new(BufWriter::new(File::create(&path)?));
        writer.write_batch(batch, schema)?;
        writer.flush()?;
        tracing::info!("Wrote {} statements to {}", writer.lines(), path.display());
        written.push(path);
    }

    if combined {
        let path = dir.join(COMBINED_FILE);
        let mut writer = SqlWriter::new(BufWriter::new(File::create(&path)?));
        for batch in batches {
            writer.write_batch(batch, schema)?;
        }
        writer.flush()?;
        tracing::info!("Wrote {} statements to {}", writer.lines(), path.display());
        written.push(path);
    }

    Ok(written)
}
