//! Extraction, export and loading of a whole import run.
//!
//! Batches always come out in dependency order: stations, tree types,
//! locations, pollution, each timeseries file, trees. Every referenced entity
//! is therefore inserted before anything that refers to it.

use crate::config::{ImportConfig, Sentinels, SourcePaths};
use crate::entity::{Location, PollutionReading, Station, Tree, TreeType};
use crate::loader::{load_batch, ErrorPolicy, LoadError, LoadReport, StatementSink};
use crate::readers::{
    read_locations, read_pollution, read_stations, read_timeseries, read_tree_types, read_trees,
};
use crate::report::{ReadReport, SkippedRow};
use crate::serialization::{export_batches, NdjsonWriter, SerializationError};
use crate::statement::{Batch, Domain, KeyRegistry, Schema};
use crate::table::{SourceError, Table, Workbook};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// File listing every skipped row of a records export.
pub const SKIPPED_FILE: &str = "skipped_rows.ndjson";

/// Source data held in memory. Absent sources produce no batches.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub pollution: Option<Workbook>,
    pub timeseries: Vec<Table>,
    pub tree_types: Option<Table>,
    pub trees: Option<Workbook>,
}

impl Sources {
    /// Read every configured source file.
    pub fn open(paths: &SourcePaths) -> Result<Self, SourceError> {
        let pollution = paths.pollution_workbook.as_ref().map(Workbook::open).transpose()?;
        let timeseries = paths
            .timeseries
            .iter()
            .map(|path| Table::read_csv(path, true))
            .collect::<Result<Vec<_>, _>>()?;
        let tree_types = paths
            .tree_types
            .as_ref()
            .map(|path| Table::read_csv(path, false))
            .transpose()?;
        let trees = paths.trees_workbook.as_ref().map(Workbook::open).transpose()?;

        Ok(Self {
            pollution,
            timeseries,
            tree_types,
            trees,
        })
    }
}

/// Every reader's report for one run.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub stations: Option<ReadReport<Station>>,
    pub tree_types: Option<ReadReport<TreeType>>,
    pub locations: Option<ReadReport<Location>>,
    pub pollution: Option<ReadReport<PollutionReading>>,
    pub timeseries: Vec<ReadReport<PollutionReading>>,
    pub trees: Option<ReadReport<Tree>>,
}

impl Extraction {
    /// Statement batches in dependency order.
    pub fn batches(&self) -> Vec<Batch> {
        let mut batches = Vec::new();
        if let Some(report) = &self.stations {
            batches.push(Batch::from_records(Domain::Stations, &report.records));
        }
        if let Some(report) = &self.tree_types {
            batches.push(Batch::from_records(Domain::TreeTypes, &report.records));
        }
        if let Some(report) = &self.locations {
            batches.push(Batch::from_records(Domain::Locations, &report.records));
        }
        if let Some(report) = &self.pollution {
            batches.push(Batch::from_records(Domain::Pollution, &report.records));
        }
        for (n, report) in self.timeseries.iter().enumerate() {
            batches.push(Batch::from_records(Domain::Timeseries(n), &report.records));
        }
        if let Some(report) = &self.trees {
            batches.push(Batch::from_records(Domain::Trees, &report.records));
        }
        batches
    }

    /// Every skipped row across all readers.
    pub fn skipped(&self) -> Vec<&SkippedRow> {
        fn rows<T>(report: &Option<ReadReport<T>>) -> impl Iterator<Item = &SkippedRow> {
            report.iter().flat_map(|r| r.skipped.iter())
        }

        rows(&self.stations)
            .chain(rows(&self.tree_types))
            .chain(rows(&self.locations))
            .chain(rows(&self.pollution))
            .chain(self.timeseries.iter().flat_map(|r| r.skipped.iter()))
            .chain(rows(&self.trees))
            .collect()
    }
}

/// Outcome of loading every batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub batches: Vec<LoadReport>,
    /// Entities whose generated id was registered
    pub registered: usize,
    pub aborted: bool,
}

impl RunReport {
    pub fn applied(&self) -> usize {
        self.batches.iter().map(|b| b.applied).sum()
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().map(|b| b.failures.len()).sum()
    }
}

pub struct Pipeline {
    schema: Schema,
    sentinels: Sentinels,
}

impl Pipeline {
    pub fn new(schema: Schema, sentinels: Sentinels) -> Self {
        Self { schema, sentinels }
    }

    pub fn from_config(config: &ImportConfig) -> Self {
        Self::new(Schema::new(config.schema.clone()), config.sentinels.clone())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Run every reader whose source is present.
    ///
    /// The timeseries sentinel station is added to the stations batch only
    /// when there are timeseries sources to attribute to it.
    pub fn extract(&self, sources: &Sources) -> Result<Extraction, SourceError> {
        let sentinel = (!sources.timeseries.is_empty())
            .then_some(self.sentinels.timeseries_station.as_str());

        let stations = match (&sources.pollution, sentinel) {
            (Some(workbook), _) => Some(read_stations(workbook, sentinel)),
            (None, Some(_)) => Some(read_stations(&Workbook::default(), sentinel)),
            (None, None) => None,
        };
        let pollution = sources.pollution.as_ref().map(read_pollution);

        let timeseries = sources
            .timeseries
            .iter()
            .map(|table| read_timeseries(table, &self.sentinels.timeseries_station))
            .collect::<Result<Vec<_>, _>>()?;

        let tree_types = sources.tree_types.as_ref().map(read_tree_types);

        let (locations, trees) = match &sources.trees {
            Some(workbook) => {
                let sheet = workbook.first_sheet()?;
                (
                    Some(read_locations(sheet)),
                    Some(read_trees(sheet, &self.sentinels.unknown_species)),
                )
            }
            None => (None, None),
        };

        let extraction = Extraction {
            stations,
            tree_types,
            locations,
            pollution,
            timeseries,
            trees,
        };
        tracing::info!(
            "Extraction finished: {} batches, {} skipped rows",
            extraction.batches().len(),
            extraction.skipped().len()
        );
        Ok(extraction)
    }

    /// Write one statement file per batch into `dir`, plus the combined file.
    pub fn export(
        &self,
        extraction: &Extraction,
        dir: &Path,
        combined: bool,
    ) -> Result<Vec<PathBuf>, SerializationError> {
        export_batches(&extraction.batches(), &self.schema, dir, combined)
    }

    /// Write normalized records as NDJSON, one file per batch, plus every
    /// skipped row.
    pub fn export_records(
        &self,
        extraction: &Extraction,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, SerializationError> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        if let Some(report) = &extraction.stations {
            written.push(write_records(dir, Domain::Stations, &report.records)?);
        }
        if let Some(report) = &extraction.tree_types {
            written.push(write_records(dir, Domain::TreeTypes, &report.records)?);
        }
        if let Some(report) = &extraction.locations {
            written.push(write_records(dir, Domain::Locations, &report.records)?);
        }
        if let Some(report) = &extraction.pollution {
            written.push(write_records(dir, Domain::Pollution, &report.records)?);
        }
        for (n, report) in extraction.timeseries.iter().enumerate() {
            written.push(write_records(dir, Domain::Timeseries(n), &report.records)?);
        }
        if let Some(report) = &extraction.trees {
            written.push(write_records(dir, Domain::Trees, &report.records)?);
        }

        let skipped = dir.join(SKIPPED_FILE);
        write_ndjson(&skipped, &extraction.skipped())?;
        written.push(skipped);

        Ok(written)
    }

    /// Apply every batch in order through `sink`.
    ///
    /// Ids generated for stations, tree types and locations are registered as
    /// their batches are applied and inlined into the batches that refer to
    /// them.
    pub fn load<S: StatementSink + ?Sized>(
        &self,
        extraction: &Extraction,
        sink: &mut S,
        policy: ErrorPolicy,
    ) -> Result<RunReport, LoadError> {
        let mut registry = KeyRegistry::new();
        let mut run = RunReport::default();

        for batch in extraction.batches() {
            let report = load_batch(sink, &batch, &self.schema, &mut registry, policy)?;
            let aborted = report.aborted;
            run.batches.push(report);
            if aborted {
                tracing::warn!("Stopping after failure in {}", batch.domain);
                run.aborted = true;
                break;
            }
        }

        run.registered = registry.len();
        tracing::info!(
            "Load finished: {} units applied, {} failed",
            run.applied(),
            run.failed()
        );
        Ok(run)
    }
}

fn write_records<T: Serialize>(
    dir: &Path,
    domain: Domain,
    records: &[T],
) -> Result<PathBuf, SerializationError> {
    let path = dir.join(domain.file_name()).with_extension("ndjson");
    write_ndjson(&path, records)?;
    tracing::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(path)
}

fn write_ndjson<T: Serialize>(path: &Path, records: &[T]) -> Result<(), SerializationError> {
    let mut writer = NdjsonWriter::new(BufWriter::new(File::create(path)?));
    writer.write_all(records)?;
    writer.flush()
}
