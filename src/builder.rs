//! The fluent query builder (§4.7): `seed(...).pivot_to(...).join_to(...).execute(...)`.

use std::sync::Arc;

use crate::engine::executor::StageExecutor;
use crate::engine::stage::{JoinOptions, Stage};
use crate::error::Result;
use crate::logging::{default_logger, Logger};
use crate::relation::{to_dnf, Relation};
use crate::result::{ResultHandler, StdoutHandler};
use crate::source::DataSource;

/// Builds a pipeline one stage at a time. Each `pivot_to`/`join_to` call converts its relation to
/// DNF and attaches that DNF to the *newly appended* stage; the executor uses it both as "what the
/// previous stage's index is keyed on" and as "what this stage's own records are filtered against"
/// (§4.7).
pub struct Builder {
    stages: Vec<Stage>,
    result_handler: Option<Box<dyn ResultHandler>>,
    logger: Arc<dyn Logger>,
}

/// Starts a pipeline from its seed source. The seed stage's records are passed through
/// unconditionally; only `pivot_to`/`join_to` calls introduce filtering.
pub fn seed(source: Box<dyn DataSource>) -> Builder {
    Builder {
        stages: vec![Stage::seed(source)],
        result_handler: None,
        logger: default_logger(),
    }
}

impl Builder {
    /// Appends a PIVOT stage: right-hand records from `source` are kept when `relation` (matched
    /// against the previous stage) is satisfied; no enrichment.
    pub fn pivot_to(mut self, source: Box<dyn DataSource>, relation: Relation) -> Self {
        let mut stage = Stage::pivot(source);
        stage.filter_conditions = to_dnf(relation);
        self.stages.push(stage);
        self
    }

    /// Appends a JOIN stage: like `pivot_to`, but matching previous-stage records are attached
    /// under `options.field_name()` (default `"joined_data"`).
    pub fn join_to(mut self, source: Box<dyn DataSource>, relation: Relation, options: JoinOptions) -> Self {
        let mut stage = Stage::join(source, options);
        stage.filter_conditions = to_dnf(relation);
        self.stages.push(stage);
        self
    }

    /// Sets the terminal result handler. Defaults to [`StdoutHandler`] if never called.
    pub fn result_handler(mut self, handler: Box<dyn ResultHandler>) -> Self {
        self.result_handler = Some(handler);
        self
    }

    /// Overrides the logger injected into the index, match engine, and executor. Defaults to the
    /// `log`-crate-forwarding logger.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Runs the pipeline. `stream` selects whether each stage materializes (`false`) or iterates
    /// lazily (`true`); both must produce identical results.
    pub fn execute(self, stream: bool) -> Result<()> {
        let mut handler = self
            .result_handler
            .unwrap_or_else(|| Box::new(StdoutHandler::default()));
        StageExecutor::new(self.logger).execute(self.stages, stream, handler.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::field;
    use crate::relation::eq;
    use crate::value::{Record, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct VecSource(Vec<Record>);

    impl DataSource for VecSource {
        fn batch(&mut self) -> Result<Vec<Record>> {
            Ok(self.0.clone())
        }
    }

    /// Hands emitted records to a shared sink, so a test can assert on them after `execute`
    /// consumes the handler passed into the builder.
    struct SharedCollectHandler(Rc<RefCell<Vec<Record>>>);

    impl ResultHandler for SharedCollectHandler {
        fn emit(&mut self, record: &Record) -> Result<()> {
            self.0.borrow_mut().push(record.clone());
            Ok(())
        }

        fn success(&self) -> bool {
            true
        }
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn fluent_pivot_pipeline_collects_matches() {
        let left = vec![
            record(&[("id", Value::Int(1))]),
            record(&[("id", Value::Int(2))]),
        ];
        let right = vec![
            record(&[("nid", Value::Int(1)), ("c", Value::Int(10))]),
            record(&[("nid", Value::Int(9)), ("c", Value::Int(11))]),
        ];

        let sink = Rc::new(RefCell::new(Vec::new()));

        seed(Box::new(VecSource(left)))
            .pivot_to(
                Box::new(VecSource(right)),
                eq(field("id", None), field("nid", None)).unwrap(),
            )
            .result_handler(Box::new(SharedCollectHandler(Rc::clone(&sink))))
            .execute(false)
            .unwrap();

        assert_eq!(sink.borrow().len(), 1);
    }
}
