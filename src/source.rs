//! Data source contract and the explicit source-type registry (§6, §9, §11.4).
//!
//! The original discovers data source classes by reflecting over loaded modules. Design Notes §9
//! replaces that with an explicit, statically-populated registry: every supported `TYPE:` prefix
//! is registered once, by name, at startup.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::value::{Record, Value};
use crate::errinput;

/// A record source. An implementor provides at least one of [`DataSource::batch`] or
/// [`DataSource::stream`] (the default of each is built from the other); `success` reports
/// whether the source's own health check passed, independent of how many records it produced.
pub trait DataSource {
    /// Materializes every record up front.
    fn batch(&mut self) -> Result<Vec<Record>> {
        self.stream()?.collect()
    }

    /// Produces records lazily. The default collects [`DataSource::batch`] into an iterator,
    /// which defeats streaming's memory benefit — sources that can genuinely stream should
    /// override this instead.
    fn stream(&mut self) -> Result<Box<dyn Iterator<Item = Result<Record>>>> {
        Ok(Box::new(self.batch()?.into_iter().map(Ok)))
    }

    /// Whether the source is healthy. Most sources are unconditionally healthy once constructed;
    /// this exists for sources backed by a remote call that can fail independently of iteration.
    fn success(&self) -> bool {
        true
    }
}

/// Builds a [`DataSource`] from a URI's location part, an optional opaque filter string, and a
/// source-specific config block.
pub trait DataSourceFactory: Send + Sync {
    fn build(
        &self,
        location: &str,
        filter: Option<&str>,
        config: Option<&serde_json::Value>,
    ) -> Result<Box<dyn DataSource>>;
}

impl<F> DataSourceFactory for F
where
    F: Fn(&str, Option<&str>, Option<&serde_json::Value>) -> Result<Box<dyn DataSource>>
        + Send
        + Sync,
{
    fn build(
        &self,
        location: &str,
        filter: Option<&str>,
        config: Option<&serde_json::Value>,
    ) -> Result<Box<dyn DataSource>> {
        self(location, filter, config)
    }
}

/// The explicit replacement for reflection-based discovery: a sorted map from source-type ident
/// to its factory, so "unknown type" errors can list known types deterministically.
pub struct SourceRegistry {
    factories: BTreeMap<String, Box<dyn DataSourceFactory>>,
    memory_tables: Arc<Mutex<BTreeMap<String, Vec<Record>>>>,
}

impl SourceRegistry {
    /// A registry populated with the built-in `memory:`, `jsonl:`, `json:`, and `csv:` factories.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
            memory_tables: Arc::new(Mutex::new(BTreeMap::new())),
        };

        let memory_tables = Arc::clone(&registry.memory_tables);
        registry.register("memory", move |location, filter, _config| {
            if filter.is_some() {
                return Err(errinput!(
                    "the memory data source type does not support #filter"
                ));
            }
            let tables = memory_tables.lock().unwrap();
            let records = tables.get(location).ok_or_else(|| {
                errinput!("no memory table named '{location}' has been registered")
            })?;
            Ok(Box::new(MemorySource {
                records: records.clone(),
            }) as Box<dyn DataSource>)
        });

        registry.register("jsonl", |location, filter, config| {
            if filter.is_some() {
                return Err(errinput!(
                    "the jsonl data source type does not support #filter"
                ));
            }
            if config.is_some() {
                return Err(errinput!(
                    "the jsonl data source type does not accept configuration parameters"
                ));
            }
            Ok(Box::new(JsonLinesSource {
                path: location.to_string(),
            }) as Box<dyn DataSource>)
        });

        registry.register("json", |location, filter, config| {
            if filter.is_some() {
                return Err(errinput!(
                    "the json data source type does not support #filter"
                ));
            }
            if config.is_some() {
                return Err(errinput!(
                    "the json data source type does not accept configuration parameters"
                ));
            }
            Ok(Box::new(JsonSource {
                path: location.to_string(),
            }) as Box<dyn DataSource>)
        });

        registry.register("csv", |location, filter, config| {
            if filter.is_some() {
                return Err(errinput!(
                    "the csv data source type does not support #filter"
                ));
            }
            let first_row_field_names = config
                .and_then(|c| c.get("first_row_contains_field_names"))
                .and_then(|v| v.as_bool())
                .ok_or_else(|| {
                    errinput!(
                        "the csv data source type requires a \
                         'first_row_contains_field_names' boolean configuration parameter"
                    )
                })?;
            Ok(Box::new(CsvSource {
                path: location.to_string(),
                first_row_field_names,
            }) as Box<dyn DataSource>)
        });

        registry
    }

    /// Registers a factory under `ident`. Re-registering an ident replaces the previous factory.
    pub fn register(&mut self, ident: impl Into<String>, factory: impl DataSourceFactory + 'static) {
        self.factories.insert(ident.into(), Box::new(factory));
    }

    /// Makes `records` available to the `memory:` factory under `name`.
    pub fn register_memory_table(&self, name: impl Into<String>, records: Vec<Record>) {
        self.memory_tables
            .lock()
            .unwrap()
            .insert(name.into(), records);
    }

    /// Parses `TYPE:LOCATION`, looks up `TYPE`'s factory, and builds the source.
    pub fn build(
        &self,
        uri: &str,
        filter: Option<&str>,
        config: Option<&serde_json::Value>,
    ) -> Result<Box<dyn DataSource>> {
        let Some((source_type, location)) = uri.split_once(':') else {
            return Err(errinput!(
                "a data source type must be specified in the format '<type>:<location>', \
                 for example json_lines:/path/to/file"
            ));
        };
        let source_type = source_type.to_lowercase();
        let factory = self.factories.get(&source_type).ok_or_else(|| {
            let known = self.factories.keys().cloned().collect::<Vec<_>>().join(", ");
            errinput!("unknown data source type '{source_type}'. Valid types are: {known}")
        })?;
        factory.build(location, filter, config)
    }
}

struct MemorySource {
    records: Vec<Record>,
}

impl DataSource for MemorySource {
    fn batch(&mut self) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }
}

struct JsonLinesSource {
    path: String,
}

impl DataSource for JsonLinesSource {
    fn stream(&mut self) -> Result<Box<dyn Iterator<Item = Result<Record>>>> {
        let file = File::open(&self.path)?;
        let lines = BufReader::new(file).lines();
        Ok(Box::new(lines.map(|line| {
            let line = line?;
            let json: serde_json::Value = serde_json::from_str(&line)?;
            match Value::from(json) {
                Value::Object(record) => Ok(record),
                _ => Err(Error::DataSourceError(
                    "jsonl record must be a JSON object".to_string(),
                )),
            }
        })))
    }
}

struct JsonSource {
    path: String,
}

impl DataSource for JsonSource {
    fn batch(&mut self) -> Result<Vec<Record>> {
        let file = File::open(&self.path)?;
        let json: serde_json::Value = serde_json::from_reader(file)?;
        let serde_json::Value::Array(items) = json else {
            return Err(Error::DataSourceError(
                "the json data source requires that JSON documents contain a list as their root \
                 element"
                    .to_string(),
            ));
        };
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match Value::from(item) {
                Value::Object(record) => records.push(record),
                other => log::debug!("skipping non-object element of json source: {other}"),
            }
        }
        Ok(records)
    }
}

struct CsvSource {
    path: String,
    first_row_field_names: bool,
}

impl DataSource for CsvSource {
    fn batch(&mut self) -> Result<Vec<Record>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.first_row_field_names)
            .from_path(&self.path)?;

        let field_names: Vec<String> = if self.first_row_field_names {
            reader.headers()?.iter().map(str::to_string).collect()
        } else {
            Vec::new()
        };

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut record = Record::new();
            for (index, column) in row.iter().enumerate() {
                let name = field_names
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", index + 1));
                record.insert(name, Value::String(column.to_string()));
            }
            records.push(record);
        }
        Ok(records)
    }
}
