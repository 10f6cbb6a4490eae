//! Integration tests for a full import run: sources on disk, export and
//! dry-run loading.

use dendro::{
    Cell, DryRunSink, ErrorPolicy, ImportConfig, LoadError, Pipeline, Sources, StatementSink,
    Table, Workbook,
};
use dendro::statement::RenderedUnit;
use std::fs;
use std::path::Path;

const CATALOG: &str = "\
id,name,latin,md1,md2,md3,md4,md5,md6,total,area,crown,avg_crown
1,Πλάτανος,Platanus orientalis,1,2,3,0,0,0,6,10,20,3.3
2,Μουριά,Morus alba,0,0,7,0,0,0,7,10,20,2.8
99,_ΑΓΝΩΣΤΟ ΕΙΔΟΣ_,,0,0,0,0,0,0,0,0,0,0
";

const TIMESERIES: &str = "\
time,so2_conc,no2_conc,o3_conc,co_conc,no_conc
2022-01-01 00:00:00,2.5,14,40.5,220,3
2022-01-01 01:00:00,,15,41,221,
";

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn pollution_workbook() -> Workbook {
    let legend = Table::new("Legend", vec![vec![Cell::from("Μετρήσεις")]]);
    let kentro = Table::new(
        "2024",
        vec![
            vec![Cell::from("Kentro")],
            vec![
                Cell::Empty,
                Cell::Int(1),
                Cell::from("15/03/24"),
                Cell::from("Fri"),
                Cell::Float(12.3),
                Cell::from(" "),
                Cell::Float(8.1),
            ],
            vec![],
            vec![
                Cell::Empty,
                Cell::Int(2),
                Cell::from("31/02/24"),
                Cell::Empty,
                Cell::Float(1.0),
            ],
        ],
    );
    Workbook::new("Polution.xlsx", vec![legend, kentro])
}

fn trees_workbook() -> Workbook {
    let header = vec![
        Cell::from("aa"),
        Cell::from("tk"),
        Cell::from("odos_id"),
        Cell::from("onoma"),
        Cell::from("arithmos"),
        Cell::from("dd"),
        Cell::from("eidos"),
        Cell::from("koino_onoma"),
        Cell::from("x"),
        Cell::from("y"),
        Cell::from("lat"),
        Cell::from("lon"),
    ];
    let tree = |street_id: i64, street: &str, number: Cell, name: &str| {
        vec![
            Cell::Int(1),
            Cell::Float(54622.0),
            Cell::Int(street_id),
            Cell::from(street),
            number,
            Cell::Int(2),
            Cell::Empty,
            Cell::from(name),
            Cell::Float(410000.5),
            Cell::Float(4500000.0),
            Cell::Float(40.63),
            Cell::Float(22.94),
        ]
    };
    Workbook::new(
        "trees.xlsx",
        vec![Table::new(
            "Sheet1",
            vec![
                header,
                tree(12, "Egnatia", Cell::from("10"), "Πλάτανος"),
                tree(12, "Egnatia", Cell::from("10"), "Κάτι άγνωστο"),
                tree(7, "Tsimiski", Cell::Empty, "Μουριά"),
            ],
        )],
    )
}

fn sources(dir: &Path) -> Sources {
    let config = ImportConfig::from_yaml_str(&format!(
        "sources:\n  tree_types: {}\n  timeseries:\n    - {}\n",
        write(dir, "trees_thess.csv", CATALOG).display(),
        write(dir, "copernicus_2022.csv", TIMESERIES).display(),
    ))
    .unwrap();

    let mut sources = Sources::open(&config.sources).unwrap();
    sources.pollution = Some(pollution_workbook());
    sources.trees = Some(trees_workbook());
    sources
}

#[test]
fn test_export_writes_one_file_per_batch() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("insert_db");
    let pipeline = Pipeline::from_config(&ImportConfig::default());
    let extraction = pipeline.extract(&sources(dir.path())).unwrap();

    let written = pipeline.export(&extraction, &out, true).unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "meteo_stations_data.sql",
            "tree_types_data.sql",
            "locations_data.sql",
            "pollution_data.sql",
            "pollution_timeseries_data.sql",
            "trees_data.sql",
            "import_data.sql",
        ]
    );

    let stations = fs::read_to_string(out.join("meteo_stations_data.sql")).unwrap();
    assert_eq!(
        stations,
        "INSERT INTO tree_db.meteo_station (name) VALUES ('Kentro');\n\
         INSERT INTO tree_db.meteo_station (name) VALUES ('Copernicus');\n"
    );

    let pollution = fs::read_to_string(out.join("pollution_data.sql")).unwrap();
    assert_eq!(pollution.lines().count(), 1);
    assert!(pollution.contains("'2024-03-15', '2024-03-15 00:00:00', 'Fri', 2024, 12.3, NULL, 8.1,"));

    let timeseries = fs::read_to_string(out.join("pollution_timeseries_data.sql")).unwrap();
    let lines: Vec<&str> = timeseries.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("WHERE name = 'Copernicus' LIMIT 1"));
    assert!(lines[1].contains("VALUES (2, @station_id, '2022-01-01', '2022-01-01 01:00:00', 'Sat', 2022, NULL,"));

    let locations = fs::read_to_string(out.join("locations_data.sql")).unwrap();
    assert_eq!(locations.lines().count(), 2);
    assert!(locations.contains("VALUES ('54622', '7', 'Tsimiski', NULL, 2);"));

    let combined = fs::read_to_string(out.join("import_data.sql")).unwrap();
    assert_eq!(combined.lines().count(), 2 + 3 + 2 + 1 + 2 + 3);
    assert!(combined.starts_with(&stations));
}

#[test]
fn test_skipped_rows_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::from_config(&ImportConfig::default());
    let extraction = pipeline.extract(&sources(dir.path())).unwrap();

    let skipped = extraction.skipped();

    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].source, "2024");
    assert_eq!(skipped[0].row, 3);
}

#[test]
fn test_dry_run_resolves_unknown_species_to_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::from_config(&ImportConfig::default());
    let extraction = pipeline.extract(&sources(dir.path())).unwrap();
    let mut sink = DryRunSink::new();

    let run = pipeline
        .load(&extraction, &mut sink, ErrorPolicy::Continue)
        .unwrap();

    assert_eq!(run.failed(), 0);
    assert!(run.batches.iter().all(|b| b.unresolved == 0));

    let trees: Vec<&String> = sink
        .executed()
        .iter()
        .filter(|s| s.starts_with("INSERT INTO tree_db.tree "))
        .collect();
    assert_eq!(trees.len(), 3);
    // catalog ids follow catalog order; Egnatia 10 is location 1, Tsimiski 2
    assert!(trees[0].contains("VALUES (1, 'Πλάτανος',"));
    assert!(trees[1].contains("VALUES (3, 'Κάτι άγνωστο',"));
    assert!(trees[1].ends_with(", 1);"));
    assert!(trees[2].contains("VALUES (2, 'Μουριά',"));
    assert!(trees[2].ends_with(", 2);"));
}

/// Fails every pollution insert.
struct FlakySink {
    inner: DryRunSink,
}

impl StatementSink for FlakySink {
    fn execute_unit(&mut self, unit: &RenderedUnit) -> Result<Option<i64>, LoadError> {
        if unit.table == "polution" {
            return Err(LoadError::Statement {
                statement: unit.insert().to_string(),
                message: "Incorrect datetime value".to_string(),
            });
        }
        self.inner.execute_unit(unit)
    }
}

#[test]
fn test_abort_policy_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::from_config(&ImportConfig::default());
    let extraction = pipeline.extract(&sources(dir.path())).unwrap();
    let mut sink = FlakySink {
        inner: DryRunSink::new(),
    };

    let run = pipeline
        .load(&extraction, &mut sink, ErrorPolicy::Abort)
        .unwrap();

    assert!(run.aborted);
    assert_eq!(run.batches.len(), 4);
    assert_eq!(run.failed(), 1);
    assert!(sink
        .inner
        .executed()
        .iter()
        .all(|s| !s.starts_with("INSERT INTO tree_db.tree ")));
}

#[test]
fn test_continue_policy_loads_everything_else() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::from_config(&ImportConfig::default());
    let extraction = pipeline.extract(&sources(dir.path())).unwrap();
    let mut sink = FlakySink {
        inner: DryRunSink::new(),
    };

    let run = pipeline
        .load(&extraction, &mut sink, ErrorPolicy::Continue)
        .unwrap();

    assert!(!run.aborted);
    assert_eq!(run.batches.len(), 6);
    assert_eq!(run.failed(), 3);
    assert_eq!(run.applied(), 2 + 3 + 2 + 3);
}

#[test]
fn test_missing_source_file_is_fatal() {
    let config = ImportConfig::from_yaml_str("sources:\n  tree_types: /nonexistent/trees.csv\n")
        .unwrap();

    let result = Sources::open(&config.sources);
    assert!(matches!(result, Err(dendro::SourceError::Csv { .. })));
}
