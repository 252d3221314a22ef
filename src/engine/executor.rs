//! Sequences a compiled pipeline's stages (§4.6).

use std::rc::Rc;
use std::sync::Arc;

use crate::engine::filter;
use crate::engine::stage::Stage;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::logging::Logger;
use crate::result::ResultHandler;
use crate::value::Record;

/// Runs stages in order, handing each stage's output forward either as the index the next stage
/// filters against, or — for the last stage — as input to the terminal [`ResultHandler`].
///
/// The executor never holds more than two stages' worth of records live: the [`Index`] built from
/// the stage just finished, and the one being built from the stage currently running. Once a
/// PIVOT/JOIN stage finishes consuming the previous index, that index is dropped before the next
/// stage starts (§4.6 point 4).
pub struct StageExecutor {
    logger: Arc<dyn Logger>,
}

impl StageExecutor {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Executes `stages` in order. `stream` selects batch vs. streaming record production per
    /// stage; both modes must yield identical results. Returns `Ok(())` if the pipeline and the
    /// terminal handler both reported success, `Err` otherwise — per the original semantics, a
    /// stage whose index finds zero possibly-related records aborts the whole pipeline, not just
    /// that stage.
    pub fn execute(
        &self,
        mut stages: Vec<Stage>,
        stream: bool,
        result_handler: &mut dyn ResultHandler,
    ) -> Result<()> {
        if stages.is_empty() {
            return Err(Error::DataSourceError("a pipeline has no stages".to_string()));
        }

        let last = stages.len() - 1;
        let mut prev_index: Option<Index> = None;

        for i in 0..stages.len() {
            let is_last = i == last;
            let kind = stages[i].kind.clone();

            let records = Self::produce(&mut stages[i], stream)?;

            if i == 0 {
                // SEED: every record is emitted unconditionally, straight into whatever the next
                // stage needs (or the terminal handler, for a single-stage pipeline).
                if is_last {
                    for record in records {
                        result_handler.emit(&record?)?;
                    }
                    if !result_handler.success() {
                        return Err(Error::DataSourceError(
                            "terminal result handler reported failure".to_string(),
                        ));
                    }
                } else {
                    let mut next_index =
                        Index::new(stages[i + 1].filter_conditions.clone(), Arc::clone(&self.logger));
                    for record in records {
                        next_index.insert(Rc::new(record?));
                    }
                    if !next_index.succeeded() {
                        return Err(Error::DataSourceError(
                            "seed stage produced no records related to the next stage's join \
                             conditions"
                                .to_string(),
                        ));
                    }
                    prev_index = Some(next_index);
                }
                continue;
            }

            let index = prev_index
                .take()
                .expect("non-seed stage always has a previous index");

            if is_last {
                filter::process(
                    &kind,
                    &stages[i].filter_conditions,
                    &index,
                    records,
                    &self.logger,
                    |record| result_handler.emit(&record),
                )?;
                if !result_handler.success() {
                    return Err(Error::DataSourceError(
                        "terminal result handler reported failure".to_string(),
                    ));
                }
            } else {
                let mut next_index =
                    Index::new(stages[i + 1].filter_conditions.clone(), Arc::clone(&self.logger));
                filter::process(
                    &kind,
                    &stages[i].filter_conditions,
                    &index,
                    records,
                    &self.logger,
                    |record| {
                        next_index.insert(Rc::new(record));
                        Ok(())
                    },
                )?;
                if !next_index.succeeded() {
                    return Err(Error::DataSourceError(format!(
                        "stage {i} produced no records related to the next stage's join conditions"
                    )));
                }
                prev_index = Some(next_index);
            }

            // `index` (the previous stage's buffer) is dropped here, at the end of the loop body,
            // once this stage is done consuming it — satisfying the "at most two buffers live"
            // bound without any explicit free call.
        }

        Ok(())
    }

    fn produce(stage: &mut Stage, stream: bool) -> Result<Box<dyn Iterator<Item = Result<Record>>>> {
        if !stage.source.success() {
            return Err(Error::DataSourceError(
                "data source reported failure before producing any records".to_string(),
            ));
        }
        if stream {
            stage.source.stream()
        } else {
            Ok(Box::new(stage.source.batch()?.into_iter().map(Ok)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stage::JoinOptions;
    use crate::field::field;
    use crate::logging::RecordingLogger;
    use crate::relation::eq;
    use crate::result::CollectHandler;
    use crate::source::DataSource;
    use crate::value::Value;

    struct VecSource(Vec<Record>);

    impl DataSource for VecSource {
        fn batch(&mut self) -> Result<Vec<Record>> {
            Ok(self.0.clone())
        }
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn executor() -> StageExecutor {
        StageExecutor::new(Arc::new(RecordingLogger::default()))
    }

    #[test]
    fn two_stage_eq_pivot_end_to_end() {
        let seed = Stage::seed(Box::new(VecSource(vec![
            record(&[("id", Value::Int(1))]),
            record(&[("id", Value::Int(2))]),
        ])));
        let mut pivot = Stage::pivot(Box::new(VecSource(vec![
            record(&[("nid", Value::Int(1)), ("c", Value::Int(10))]),
            record(&[("nid", Value::Int(6)), ("c", Value::Int(11))]),
        ])));
        pivot.filter_conditions =
            crate::relation::to_dnf(eq(field("id", None), field("nid", None)).unwrap());

        let mut handler = CollectHandler::default();
        executor()
            .execute(vec![seed, pivot], false, &mut handler)
            .unwrap();

        assert_eq!(handler.records.len(), 1);
        assert_eq!(handler.records[0].get("nid"), Some(&Value::Int(1)));
    }

    #[test]
    fn three_stage_pivot_then_join_releases_seed_buffer() {
        let seed = Stage::seed(Box::new(VecSource(vec![
            record(&[("id", Value::Int(1)), ("n", Value::String("a".into()))]),
            record(&[("id", Value::Int(2)), ("n", Value::String("b".into()))]),
        ])));

        let mut pivot = Stage::pivot(Box::new(VecSource(vec![
            record(&[("nid", Value::Int(1)), ("l", Value::String("a".into()))]),
        ])));
        pivot.filter_conditions =
            crate::relation::to_dnf(eq(field("id", None), field("nid", None)).unwrap());

        let mut join = Stage::join(
            Box::new(VecSource(vec![record(&[(
                "jid",
                Value::String("a".into()),
            )])])),
            JoinOptions {
                field_name: Some("match".to_string()),
                as_array: false,
                exclude_empty: false,
            },
        );
        join.filter_conditions =
            crate::relation::to_dnf(eq(field("l", None), field("jid", None)).unwrap());

        let mut handler = CollectHandler::default();
        executor()
            .execute(vec![seed, pivot, join], false, &mut handler)
            .unwrap();

        assert_eq!(handler.records.len(), 1);
        assert!(handler.records[0].contains_key("match"));
    }

    #[test]
    fn seed_stage_with_unrelated_next_conditions_aborts() {
        let seed = Stage::seed(Box::new(VecSource(vec![record(&[(
            "other",
            Value::Int(1),
        )])])));
        let mut pivot = Stage::pivot(Box::new(VecSource(vec![record(&[(
            "nid",
            Value::Int(1),
        )])])));
        pivot.filter_conditions =
            crate::relation::to_dnf(eq(field("id", None), field("nid", None)).unwrap());

        let mut handler = CollectHandler::default();
        let result = executor().execute(vec![seed, pivot], false, &mut handler);
        assert!(result.is_err());
    }
}
