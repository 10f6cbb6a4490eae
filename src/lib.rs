//! # Dendro: urban tree and air-quality import
//!
//! Dendro reads spreadsheet workbooks and delimited files describing
//! meteorological stations, pollution measurements, tree species, street
//! addresses and individual trees, normalizes them, and turns them into
//! ordered batches of SQL inserts.
//!
//! ## Pipeline
//!
//! 1. Sources are read into memory ([`table`]): workbooks through `calamine`,
//!    delimited files through `csv`.
//! 2. One reader per domain ([`readers`]) coerces cells ([`coerce`]),
//!    deduplicates by natural key ([`dedup`]) and reports skipped rows
//!    ([`report`]).
//! 3. Records become statement units ([`statement`]) whose foreign references
//!    are natural-key lookups.
//! 4. Batches are exported as flat statement files ([`serialization`]) or
//!    applied through a [`loader::StatementSink`], with generated ids
//!    registered as batches are applied.
//!
//! ## Example
//!
//! ```ignore
//! use dendro::{ImportConfig, Pipeline, Sources};
//!
//! let config = ImportConfig::load_from_file("dendro.yaml")?.with_env();
//! let pipeline = Pipeline::from_config(&config);
//! let extraction = pipeline.extract(&Sources::open(&config.sources)?)?;
//! pipeline.export(&extraction, &config.output_dir, true)?;
//! ```
//!
//! ## Features
//!
//! - `mysql`: [`database::MysqlSink`] and purge support over a Diesel/r2d2
//!   pool.

// Source data and cell handling
pub mod coerce;
pub mod extraction;
pub mod table;

// Records and readers
pub mod dedup;
pub mod entity;
pub mod readers;
pub mod report;

// Statements and their destinations
pub mod loader;
pub mod serialization;
pub mod statement;

pub mod config;
pub mod pipeline;

#[cfg(feature = "mysql")]
pub mod database;

// Re-export key types
pub use config::{ConfigError, DatabaseConfig, ImportConfig, Sentinels, SourcePaths};
pub use entity::{Entity, RowError};
pub use loader::{DryRunSink, ErrorPolicy, LoadError, LoadReport, StatementSink};
pub use pipeline::{Extraction, Pipeline, RunReport, Sources};
pub use report::{ReadReport, SkippedRow};
pub use serialization::SerializationError;
pub use statement::{Batch, Domain, Insertable, KeyRegistry, Resolution, Schema};
pub use table::{Cell, SourceError, Table, Workbook};

#[cfg(feature = "mysql")]
pub use database::{Database, MysqlSink};
