//! A single pipeline stage: its source, its kind, and the conditions that relate it to the
//! previous stage (§4.6, §4.7).

use crate::relation::Conjunctions;
use crate::source::DataSource;

/// Options attached to a JOIN stage (§4.5, §4.7).
#[derive(Clone, Debug, Default)]
pub struct JoinOptions {
    /// Field under which matches are attached; defaults to `"joined_data"`.
    pub field_name: Option<String>,
    /// Attach matches as a list rather than a single value (first match wins).
    pub as_array: bool,
    /// Drop records for which no match was attached.
    pub exclude_empty: bool,
}

impl JoinOptions {
    /// The field name matches are attached under, resolving the default.
    pub fn field_name(&self) -> &str {
        self.field_name.as_deref().unwrap_or("joined_data")
    }
}

/// What kind of stage this is, and any kind-specific configuration.
#[derive(Clone, Debug)]
pub enum StageKind {
    /// The pipeline's first stage. Every record is passed through unconditionally.
    Seed,
    /// Keeps matching records; no enrichment.
    Pivot,
    /// Keeps matching records and attaches matched previous-stage records.
    Join(JoinOptions),
}

/// One stage of a compiled pipeline.
pub struct Stage {
    pub kind: StageKind,
    pub source: Box<dyn DataSource>,
    /// This stage's own records are matched against the *previous* stage using these conditions
    /// (empty for SEED). Set by the builder when the *next* stage is appended (§4.7).
    pub filter_conditions: Conjunctions,
}

impl Stage {
    pub fn seed(source: Box<dyn DataSource>) -> Self {
        Self {
            kind: StageKind::Seed,
            source,
            filter_conditions: Conjunctions::new(),
        }
    }

    pub fn pivot(source: Box<dyn DataSource>) -> Self {
        Self {
            kind: StageKind::Pivot,
            source,
            filter_conditions: Conjunctions::new(),
        }
    }

    pub fn join(source: Box<dyn DataSource>, options: JoinOptions) -> Self {
        Self {
            kind: StageKind::Join(options),
            source,
            filter_conditions: Conjunctions::new(),
        }
    }
}
