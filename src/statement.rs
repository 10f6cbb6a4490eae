//! Insert statement generation.
//!
//! Records become [`StatementUnit`]s: one insert whose foreign references are
//! still natural-key [`Reference`]s. A unit is rendered in one of two ways:
//!
//! - [`Resolution::Subquery`]: every reference becomes a
//!   `SET @var = (SELECT id ... LIMIT 1);` assignment ahead of the insert. This
//!   is the flat-file format and needs the assignment and the insert to run in
//!   the same session.
//! - [`Resolution::Resolved`]: every reference is replaced by the id recorded
//!   in a [`KeyRegistry`] when the referenced entity was inserted earlier in
//!   the run. No session state is involved.
//!
//! Text literals are escaped for MySQL (`'` doubled, `\` doubled).

use crate::coerce::Numeric;
use crate::entity::{
    Entity, Location, LocationKey, PollutionReading, SpeciesRef, Station, StationKey, Tree,
    TreeType,
};
use std::collections::HashMap;
use std::fmt;

pub const STATION_TABLE: &str = "meteo_station";
pub const POLLUTION_TABLE: &str = "polution";
pub const TREE_TYPE_TABLE: &str = "tree_type";
pub const LOCATION_TABLE: &str = "location";
pub const TREE_TABLE: &str = "tree";

/// Database schema that qualifies table names. Empty means unqualified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema(String);

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Schema(name.into())
    }

    pub fn table(&self, table: &str) -> String {
        if self.0.is_empty() {
            table.to_string()
        } else {
            format!("{}.{}", self.0, table)
        }
    }
}

/// Key under which an inserted entity's generated id is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    Station(StationKey),
    TreeType(String),
    Location(LocationKey),
}

impl NaturalKey {
    /// The key as the tables' collation compares it: text case-insensitively.
    fn folded(self) -> Self {
        match self {
            NaturalKey::Station(key) => NaturalKey::Station(key),
            NaturalKey::TreeType(name) => NaturalKey::TreeType(name.to_lowercase()),
            NaturalKey::Location(key) => NaturalKey::Location(LocationKey {
                tax_code: key.tax_code.to_lowercase(),
                street_id: key.street_id.to_lowercase(),
                street_name: key.street_name.to_lowercase(),
                street_number: key.street_number.map(|n| n.to_lowercase()),
            }),
        }
    }
}

/// Foreign reference by natural key, resolved at most to one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Station(StationKey),
    TreeType(SpeciesRef),
    Location(LocationKey),
}

impl Reference {
    /// Session variable used for this reference in subquery rendering.
    pub fn variable(&self) -> &'static str {
        match self {
            Reference::Station(_) => "station_id",
            Reference::TreeType(_) => "type_id",
            Reference::Location(_) => "location_id",
        }
    }

    /// Scalar subquery selecting the referenced row's id.
    pub fn subquery(&self, schema: &Schema) -> String {
        match self {
            Reference::Station(key) => format!(
                "SELECT id FROM {} WHERE name = {} LIMIT 1",
                schema.table(STATION_TABLE),
                quote(key.name())
            ),
            Reference::TreeType(species) => {
                let by_name = |name: &str| {
                    format!(
                        "(SELECT tt.id FROM {} tt WHERE tt.greek_name = {} LIMIT 1)",
                        schema.table(TREE_TYPE_TABLE),
                        quote(name)
                    )
                };
                format!(
                    "SELECT COALESCE({}, {})",
                    by_name(&species.name),
                    by_name(&species.fallback)
                )
            }
            Reference::Location(key) => {
                let number = match &key.street_number {
                    Some(number) => format!("l.street_number = {}", quote(number)),
                    None => "l.street_number IS NULL".to_string(),
                };
                format!(
                    "SELECT l.id FROM {} l WHERE l.tax_code = {} AND l.street_id = {} \
                     AND l.street_name = {} AND {} LIMIT 1",
                    schema.table(LOCATION_TABLE),
                    quote(&key.tax_code),
                    quote(&key.street_id),
                    quote(&key.street_name),
                    number
                )
            }
        }
    }

    /// Id of the referenced entity, if it was inserted earlier in the run.
    pub fn resolve(&self, registry: &KeyRegistry) -> Option<i64> {
        match self {
            Reference::Station(key) => registry.get(&NaturalKey::Station(key.clone())),
            Reference::TreeType(species) => registry
                .get(&NaturalKey::TreeType(species.name.clone()))
                .or_else(|| registry.get(&NaturalKey::TreeType(species.fallback.clone()))),
            Reference::Location(key) => registry.get(&NaturalKey::Location(key.clone())),
        }
    }
}

/// Natural key to generated id, filled in as independent batches are applied
/// and read when rendering the batches that depend on them. Keys match
/// case-insensitively, like the `WHERE` lookups of the subquery form.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    ids: HashMap<NaturalKey, i64>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id. The first id registered for a key is kept, matching
    /// `LIMIT 1` over rows in insertion order.
    pub fn register(&mut self, key: NaturalKey, id: i64) {
        self.ids.entry(key.folded()).or_insert(id);
    }

    pub fn get(&self, key: &NaturalKey) -> Option<i64> {
        self.ids.get(&key.clone().folded()).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A value in an insert's VALUES list.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Number(Numeric),
    Null,
    Ref(Reference),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Numeric> for SqlValue {
    fn from(value: Numeric) -> Self {
        SqlValue::Number(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Number(Numeric::Int(value))
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl From<Reference> for SqlValue {
    fn from(value: Reference) -> Self {
        SqlValue::Ref(value)
    }
}

/// Quote a text literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// How references are rendered.
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    Subquery,
    Resolved(&'a KeyRegistry),
}

/// One insert with its references still symbolic.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementUnit {
    pub table: &'static str,
    pub columns: Vec<&'static str>,
    pub values: Vec<SqlValue>,
    /// Natural key of the row this insert creates, if others refer to it.
    pub creates: Option<NaturalKey>,
}

impl StatementUnit {
    pub fn render(&self, schema: &Schema, resolution: Resolution<'_>) -> RenderedUnit {
        let mut statements = Vec::new();
        let mut unresolved = 0;

        let values: Vec<String> = self
            .values
            .iter()
            .map(|value| match value {
                SqlValue::Text(text) => quote(text),
                SqlValue::Number(number) => number.to_string(),
                SqlValue::Null => "NULL".to_string(),
                SqlValue::Ref(reference) => match resolution {
                    Resolution::Subquery => {
                        statements.push(format!(
                            "SET @{} = ({});",
                            reference.variable(),
                            reference.subquery(schema)
                        ));
                        format!("@{}", reference.variable())
                    }
                    Resolution::Resolved(registry) => match reference.resolve(registry) {
                        Some(id) => id.to_string(),
                        None => {
                            unresolved += 1;
                            "NULL".to_string()
                        }
                    },
                },
            })
            .collect();

        statements.push(format!(
            "INSERT INTO {} ({}) VALUES ({});",
            schema.table(self.table),
            self.columns.join(", "),
            values.join(", ")
        ));

        RenderedUnit {
            table: self.table,
            statements,
            creates: self.creates.clone(),
            unresolved,
        }
    }
}

/// Lookup assignments followed by exactly one insert; executed as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedUnit {
    pub table: &'static str,
    pub statements: Vec<String>,
    pub creates: Option<NaturalKey>,
    /// References rendered as NULL because nothing was registered for them
    pub unresolved: usize,
}

impl RenderedUnit {
    /// The insert, always the last statement.
    pub fn insert(&self) -> &str {
        self.statements.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for RenderedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.statements.join(" "))
    }
}

/// Records that become insert statements.
pub trait Insertable: Entity {
    fn to_unit(&self) -> StatementUnit;
}

impl Insertable for Station {
    fn to_unit(&self) -> StatementUnit {
        StatementUnit {
            table: STATION_TABLE,
            columns: vec!["name"],
            values: vec![self.name.as_str().into()],
            creates: Some(NaturalKey::Station(self.key())),
        }
    }
}

impl Insertable for PollutionReading {
    fn to_unit(&self) -> StatementUnit {
        let m = &self.measurements;
        StatementUnit {
            table: POLLUTION_TABLE,
            columns: vec![
                "number",
                "station_id",
                "date",
                "datetime",
                "day",
                "year",
                "so2",
                "pm10",
                "pm25",
                "co",
                "no",
                "no2",
                "o3",
                "temperature",
                "humidity",
            ],
            values: vec![
                self.number.into(),
                Reference::Station(self.station.clone()).into(),
                self.date.format("%Y-%m-%d").to_string().into(),
                self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().into(),
                self.day.into(),
                i64::from(self.year).into(),
                m.so2.into(),
                m.pm10.into(),
                m.pm25.into(),
                m.co.into(),
                m.no.into(),
                m.no2.into(),
                m.o3.into(),
                m.temperature.into(),
                m.humidity.into(),
            ],
            creates: None,
        }
    }
}

impl Insertable for TreeType {
    fn to_unit(&self) -> StatementUnit {
        StatementUnit {
            table: TREE_TYPE_TABLE,
            columns: vec!["type_id", "greek_name", "scientific_name", "amount"],
            values: vec![
                self.type_id.into(),
                self.greek_name.as_str().into(),
                self.scientific_name.as_str().into(),
                self.amount.into(),
            ],
            creates: Some(NaturalKey::TreeType(self.greek_name.clone())),
        }
    }
}

impl Insertable for Location {
    fn to_unit(&self) -> StatementUnit {
        let key = &self.key;
        StatementUnit {
            table: LOCATION_TABLE,
            columns: vec![
                "tax_code",
                "street_id",
                "street_name",
                "street_number",
                "area_id",
            ],
            values: vec![
                key.tax_code.as_str().into(),
                key.street_id.as_str().into(),
                key.street_name.as_str().into(),
                key.street_number.clone().into(),
                self.area_id.into(),
            ],
            creates: Some(NaturalKey::Location(key.clone())),
        }
    }
}

impl Insertable for Tree {
    fn to_unit(&self) -> StatementUnit {
        StatementUnit {
            table: TREE_TABLE,
            columns: vec![
                "type_code",
                "name",
                "absolute_position_x",
                "absolute_position_y",
                "lat",
                "lon",
                "location_id",
            ],
            values: vec![
                Reference::TreeType(self.species.clone()).into(),
                self.common_name.as_str().into(),
                self.position_x.into(),
                self.position_y.into(),
                self.lat.into(),
                self.lon.into(),
                Reference::Location(self.location.clone()).into(),
            ],
            creates: None,
        }
    }
}

/// The kind of records a batch holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Stations,
    TreeTypes,
    Locations,
    Pollution,
    /// Nth timeseries source (zero-based)
    Timeseries(usize),
    Trees,
}

impl Domain {
    /// File a batch is exported to.
    pub fn file_name(&self) -> String {
        match self {
            Domain::Stations => "meteo_stations_data.sql".to_string(),
            Domain::TreeTypes => "tree_types_data.sql".to_string(),
            Domain::Locations => "locations_data.sql".to_string(),
            Domain::Pollution => "pollution_data.sql".to_string(),
            Domain::Timeseries(0) => "pollution_timeseries_data.sql".to_string(),
            Domain::Timeseries(n) => format!("pollution_timeseries_data{}.sql", n + 1),
            Domain::Trees => "trees_data.sql".to_string(),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Stations => write!(f, "stations"),
            Domain::TreeTypes => write!(f, "tree types"),
            Domain::Locations => write!(f, "locations"),
            Domain::Pollution => write!(f, "pollution"),
            Domain::Timeseries(n) => write!(f, "timeseries #{}", n + 1),
            Domain::Trees => write!(f, "trees"),
        }
    }
}

/// Ordered statement units of one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub domain: Domain,
    pub units: Vec<StatementUnit>,
}

impl Batch {
    pub fn from_records<T: Insertable>(domain: Domain, records: &[T]) -> Self {
        Self {
            domain,
            units: records.iter().map(Insertable::to_unit).collect(),
        }
    }

    /// One line per unit, subquery rendering.
    pub fn lines(&self, schema: &Schema) -> Vec<String> {
        self.units
            .iter()
            .map(|unit| unit.render(schema, Resolution::Subquery).to_string().trim().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Measurements;
    use chrono::NaiveDate;

    fn schema() -> Schema {
        Schema::new("tree_db")
    }

    fn egnatia(number: Option<&str>) -> LocationKey {
        LocationKey {
            tax_code: "54622".to_string(),
            street_id: "12".to_string(),
            street_name: "Egnatia".to_string(),
            street_number: number.map(str::to_string),
        }
    }

    fn reading() -> PollutionReading {
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        PollutionReading::new(
            1,
            StationKey::new("Kentro"),
            timestamp,
            Measurements {
                so2: Some(Numeric::Float(12.3)),
                ..Measurements::default()
            },
        )
    }

    fn tree() -> Tree {
        Tree {
            species: SpeciesRef {
                name: "Μουριά".to_string(),
                fallback: "_ΑΓΝΩΣΤΟ ΕΙΔΟΣ_".to_string(),
            },
            common_name: "Μουριά".to_string(),
            position_x: Some(Numeric::Float(1.5)),
            position_y: None,
            lat: Some(Numeric::Float(40.6)),
            lon: Some(Numeric::Float(22.9)),
            location: egnatia(None),
        }
    }

    #[test]
    fn test_station_insert() {
        let station = Station {
            name: "Kentro".to_string(),
        };

        let unit = station.to_unit().render(&schema(), Resolution::Subquery);

        assert_eq!(
            unit.statements,
            vec!["INSERT INTO tree_db.meteo_station (name) VALUES ('Kentro');"]
        );
        assert_eq!(
            unit.creates,
            Some(NaturalKey::Station(StationKey::new("kentro")))
        );
    }

    #[test]
    fn test_pollution_subquery_rendering() {
        let unit = reading().to_unit().render(&schema(), Resolution::Subquery);

        assert_eq!(unit.statements.len(), 2);
        assert_eq!(
            unit.statements[0],
            "SET @station_id = (SELECT id FROM tree_db.meteo_station WHERE name = 'Kentro' LIMIT 1);"
        );
        assert_eq!(
            unit.insert(),
            "INSERT INTO tree_db.polution (number, station_id, date, datetime, day, year, \
             so2, pm10, pm25, co, no, no2, o3, temperature, humidity) VALUES (1, @station_id, \
             '2024-03-15', '2024-03-15 00:00:00', 'Fri', 2024, 12.3, NULL, NULL, NULL, NULL, \
             NULL, NULL, NULL, NULL);"
        );
    }

    #[test]
    fn test_resolved_rendering_uses_registry() {
        let mut registry = KeyRegistry::new();
        registry.register(NaturalKey::Station(StationKey::new("KENTRO")), 7);

        let unit = reading()
            .to_unit()
            .render(&schema(), Resolution::Resolved(&registry));

        assert_eq!(unit.statements.len(), 1);
        assert!(unit.insert().contains("VALUES (1, 7, '2024-03-15'"));
        assert_eq!(unit.unresolved, 0);
    }

    #[test]
    fn test_unresolved_reference_is_null() {
        let registry = KeyRegistry::new();

        let unit = reading()
            .to_unit()
            .render(&schema(), Resolution::Resolved(&registry));

        assert!(unit.insert().contains("VALUES (1, NULL, '2024-03-15'"));
        assert_eq!(unit.unresolved, 1);
    }

    #[test]
    fn test_tree_lookups_with_species_fallback() {
        let unit = tree().to_unit().render(&schema(), Resolution::Subquery);

        assert_eq!(unit.statements.len(), 3);
        assert_eq!(
            unit.statements[0],
            "SET @type_id = (SELECT COALESCE(\
             (SELECT tt.id FROM tree_db.tree_type tt WHERE tt.greek_name = 'Μουριά' LIMIT 1), \
             (SELECT tt.id FROM tree_db.tree_type tt WHERE tt.greek_name = '_ΑΓΝΩΣΤΟ ΕΙΔΟΣ_' LIMIT 1)));"
        );
        assert_eq!(
            unit.statements[1],
            "SET @location_id = (SELECT l.id FROM tree_db.location l WHERE l.tax_code = '54622' \
             AND l.street_id = '12' AND l.street_name = 'Egnatia' AND l.street_number IS NULL LIMIT 1);"
        );
        assert_eq!(
            unit.insert(),
            "INSERT INTO tree_db.tree (type_code, name, absolute_position_x, absolute_position_y, \
             lat, lon, location_id) VALUES (@type_id, 'Μουριά', 1.5, NULL, 40.6, 22.9, @location_id);"
        );
    }

    #[test]
    fn test_unknown_species_resolves_to_sentinel() {
        let mut registry = KeyRegistry::new();
        registry.register(NaturalKey::TreeType("_ΑΓΝΩΣΤΟ ΕΙΔΟΣ_".to_string()), 99);
        registry.register(NaturalKey::Location(egnatia(None)), 4);

        let unit = tree()
            .to_unit()
            .render(&schema(), Resolution::Resolved(&registry));

        assert!(unit.insert().ends_with("VALUES (99, 'Μουριά', 1.5, NULL, 40.6, 22.9, 4);"));
        assert_eq!(unit.unresolved, 0);
    }

    #[test]
    fn test_location_with_number() {
        let location = Location {
            key: egnatia(Some("10")),
            area_id: 3,
        };

        let unit = location.to_unit().render(&schema(), Resolution::Subquery);

        assert_eq!(
            unit.insert(),
            "INSERT INTO tree_db.location (tax_code, street_id, street_name, street_number, area_id) \
             VALUES ('54622', '12', 'Egnatia', '10', 3);"
        );
        let lookup = Reference::Location(egnatia(Some("10"))).subquery(&schema());
        assert!(lookup.contains("l.street_number = '10'"));
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(quote("Agios Dimitrios"), "'Agios Dimitrios'");
        assert_eq!(quote("O'Neil"), "'O''Neil'");
        assert_eq!(quote(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_registry_keeps_first_id() {
        let mut registry = KeyRegistry::new();
        registry.register(NaturalKey::TreeType("Μουριά".to_string()), 1);
        registry.register(NaturalKey::TreeType("Μουριά".to_string()), 2);

        assert_eq!(registry.get(&NaturalKey::TreeType("Μουριά".to_string())), Some(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_ignores_case() {
        let egnatia = |name: &str| LocationKey {
            tax_code: "54622".to_string(),
            street_id: "12".to_string(),
            street_name: name.to_string(),
            street_number: Some("10Α".to_string()),
        };
        let mut registry = KeyRegistry::new();
        registry.register(NaturalKey::TreeType("Μουριά".to_string()), 1);
        registry.register(NaturalKey::Location(egnatia("Egnatia")), 4);

        let species = Reference::TreeType(SpeciesRef {
            name: "ΜΟΥΡΙΆ".to_string(),
            fallback: "_ΑΓΝΩΣΤΟ ΕΙΔΟΣ_".to_string(),
        });
        assert_eq!(species.resolve(&registry), Some(1));
        let mut location = egnatia("EGNATIA");
        location.street_number = Some("10α".to_string());
        assert_eq!(Reference::Location(location).resolve(&registry), Some(4));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unqualified_schema() {
        assert_eq!(Schema::default().table(TREE_TABLE), "tree");
        assert_eq!(schema().table(TREE_TABLE), "tree_db.tree");
    }

    #[test]
    fn test_batch_lines_and_file_names() {
        let batch = Batch::from_records(
            Domain::Stations,
            &[Station {
                name: "Kentro".to_string(),
            }],
        );

        assert_eq!(
            batch.lines(&Schema::default()),
            vec!["INSERT INTO meteo_station (name) VALUES ('Kentro');"]
        );
        assert_eq!(Domain::Timeseries(0).file_name(), "pollution_timeseries_data.sql");
        assert_eq!(Domain::Timeseries(2).file_name(), "pollution_timeseries_data3.sql");
    }
}
