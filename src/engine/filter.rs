//! The match & filter engine: decides, for each right-hand record, whether it's kept and (for
//! JOIN stages) what gets attached to it (§4.4, §4.5).

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use crate::accessor;
use crate::engine::stage::{JoinOptions, StageKind};
use crate::error::Result;
use crate::index::{EqKey, Index, NeKey};
use crate::logging::Logger;
use crate::relation::{Conjunctions, Op};
use crate::value::{Record, Value};

/// Builds this record's filter keys for one condition group, against the group's right-hand
/// fields. Condition positions are shared across EQ and NE (matching [`crate::index::Index`]'s
/// left-hand key construction), so `None` is returned — abandoning the whole group — the moment
/// any condition's field is absent, same as the index side.
fn filter_keys(
    group: &crate::relation::ConditionGroup,
    record: &Record,
    logger: &Arc<dyn Logger>,
) -> Option<(EqKey, Vec<NeKey>)> {
    let mut eq_key = EqKey::new();
    let mut ne_keys = Vec::new();

    for (position, condition) in group.iter().enumerate() {
        let Some(value) = accessor::value(record, &condition.right_field) else {
            logger.debug(&format!(
                "field {} absent from right-hand record - abandoning condition group",
                condition.right_field
            ));
            return None;
        };
        let proxied = (condition.right_proxy)(&condition.right_field, value);
        match condition.op {
            Op::Eq => eq_key.push((position, proxied)),
            Op::Ne => ne_keys.push((position, proxied)),
        }
    }

    Some((eq_key, ne_keys))
}

/// The previous-stage records that match one condition group, for the join-mode match set rule
/// (§4.4).
fn match_set(index: &Index, group_index: usize, eq_key: &EqKey, ne_keys: &[NeKey]) -> Vec<Rc<Record>> {
    let eq_matches = index.eq_matches(group_index, eq_key);
    match (eq_key.is_empty(), ne_keys.is_empty()) {
        (false, true) => eq_matches.to_vec(),
        (true, false) => {
            let excluded: HashSet<*const Record> = ne_keys
                .iter()
                .flat_map(|key| index.ne_matches(group_index, key))
                .map(|rc| Rc::as_ptr(rc))
                .collect();
            index
                .ne_groups(group_index)
                .flat_map(|(_, records)| records.iter())
                .filter(|rc| !excluded.contains(&Rc::as_ptr(rc)))
                .cloned()
                .collect()
        }
        (false, false) => {
            let excluded: HashSet<*const Record> = ne_keys
                .iter()
                .flat_map(|key| index.ne_matches(group_index, key))
                .map(|rc| Rc::as_ptr(rc))
                .collect();
            eq_matches
                .iter()
                .filter(|rc| !excluded.contains(&Rc::as_ptr(rc)))
                .cloned()
                .collect()
        }
        (true, true) => Vec::new(),
    }
}

/// Whether a pivot-mode group is satisfied: present NE keys must have no matches, present EQ keys
/// must have at least one.
fn pivot_group_satisfied(index: &Index, group_index: usize, eq_key: &EqKey, ne_keys: &[NeKey]) -> bool {
    let ne_ok = ne_keys
        .iter()
        .all(|key| index.ne_matches(group_index, key).is_empty());
    let eq_ok = eq_key.is_empty() || !index.eq_matches(group_index, eq_key).is_empty();
    ne_ok && eq_ok
}

/// Attaches a matched previous-stage record `m` onto `record`, per the join callback rule (§4.5).
fn join_callback(record: &mut Record, options: &JoinOptions, matched: &Rc<Record>, logger: &Arc<dyn Logger>) {
    let name = options.field_name();
    let attached = Value::Object((**matched).clone());

    if options.as_array {
        match record.get_mut(name) {
            None => {
                record.insert(name.to_string(), Value::List(vec![attached]));
            }
            Some(Value::List(items)) => items.push(attached),
            Some(_) => logger.warn(&format!(
                "couldn't join record because a non-array field called '{name}' already exists"
            )),
        }
    } else if record.contains_key(name) {
        logger.warn(&format!(
            "couldn't join record because a field called '{name}' already exists"
        ));
    } else {
        record.insert(name.to_string(), attached);
    }
}

/// Runs the match & filter pass over `records`, calling `emit` for each record kept (after, for
/// JOIN stages, any matches have been attached).
///
/// `filter_conditions` is this stage's own DNF, already keyed into `prev_index`. An empty DNF
/// (no `#where` at all) passes every record through unconditionally, matching §4.4's "zero
/// groups" rule.
pub fn process(
    kind: &StageKind,
    filter_conditions: &Conjunctions,
    prev_index: &Index,
    records: impl Iterator<Item = Result<Record>>,
    logger: &Arc<dyn Logger>,
    mut emit: impl FnMut(Record) -> Result<()>,
) -> Result<()> {
    for record in records {
        let mut record = record?;

        if filter_conditions.is_empty() {
            emit(record)?;
            continue;
        }

        let mut satisfied = false;
        for (group_index, group) in filter_conditions.iter().enumerate() {
            let Some((eq_key, ne_keys)) = filter_keys(group, &record, logger) else {
                continue;
            };

            satisfied = match kind {
                StageKind::Join(options) => {
                    let matches = match_set(prev_index, group_index, &eq_key, &ne_keys);
                    let fired = matches.len();
                    for matched in &matches {
                        join_callback(&mut record, options, matched, logger);
                    }
                    !options.exclude_empty || fired > 0
                }
                StageKind::Pivot | StageKind::Seed => {
                    pivot_group_satisfied(prev_index, group_index, &eq_key, &ne_keys)
                }
            };

            if satisfied {
                break;
            }
        }

        if satisfied {
            emit(record)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::field;
    use crate::logging::RecordingLogger;
    use crate::relation::{and, eq, ne, or, to_dnf};

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn logger() -> Arc<dyn Logger> {
        Arc::new(RecordingLogger::default())
    }

    fn index_of(records: &[Record], conditions: &Conjunctions, logger: &Arc<dyn Logger>) -> Index {
        let mut index = Index::new(conditions.clone(), Arc::clone(logger));
        for r in records {
            index.insert(Rc::new(r.clone()));
        }
        index
    }

    #[test]
    fn eq_pivot_one_to_one() {
        let logger = logger();
        let left = vec![
            record(&[("id", Value::Int(1))]),
            record(&[("id", Value::Int(2))]),
        ];
        let conditions = to_dnf(eq(field("id", None), field("nid", None)).unwrap());
        let index = index_of(&left, &conditions, &logger);

        let right = vec![
            record(&[("nid", Value::Int(1)), ("c", Value::Int(10))]),
            record(&[("nid", Value::Int(6)), ("c", Value::Int(11))]),
        ];
        let mut kept = Vec::new();
        process(
            &StageKind::Pivot,
            &conditions,
            &index,
            right.into_iter().map(Ok),
            &logger,
            |r| {
                kept.push(r);
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].get("nid"), Some(&Value::Int(1)));
    }

    #[test]
    fn ne_pivot_keeps_unmatched_only() {
        let logger = logger();
        let left = vec![
            record(&[("id", Value::Int(1))]),
            record(&[("id", Value::Int(2))]),
            record(&[("id", Value::Int(3))]),
            record(&[("id", Value::Int(4))]),
        ];
        let conditions = to_dnf(ne(field("id", None), field("nid", None)).unwrap());
        let index = index_of(&left, &conditions, &logger);

        let right = vec![
            record(&[("nid", Value::Int(1))]),
            record(&[("nid", Value::Int(5))]),
            record(&[("nid", Value::Int(3))]),
        ];
        let mut kept = Vec::new();
        process(
            &StageKind::Pivot,
            &conditions,
            &index,
            right.into_iter().map(Ok),
            &logger,
            |r| {
                kept.push(r);
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].get("nid"), Some(&Value::Int(5)));
    }

    #[test]
    fn mixed_ne_eq_join_with_array() {
        let logger = logger();
        let left = vec![
            record(&[("id", Value::Int(1)), ("n", Value::String("a".into()))]),
            record(&[("id", Value::Int(2)), ("n", Value::String("a".into()))]),
            record(&[("id", Value::Int(3)), ("n", Value::String("a".into()))]),
            record(&[("id", Value::Int(4)), ("n", Value::String("b".into()))]),
        ];
        let rel = and(
            ne(field("id", None), field("nid", None)).unwrap(),
            eq(field("n", None), field("t", None)).unwrap(),
        );
        let conditions = to_dnf(rel);
        let index = index_of(&left, &conditions, &logger);

        let right = vec![record(&[
            ("nid", Value::Int(1)),
            ("t", Value::String("a".into())),
        ])];

        let options = JoinOptions {
            field_name: Some("x".to_string()),
            as_array: true,
            exclude_empty: false,
        };
        let mut kept = Vec::new();
        process(
            &StageKind::Join(options),
            &conditions,
            &index,
            right.into_iter().map(Ok),
            &logger,
            |r| {
                kept.push(r);
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(kept.len(), 1);
        let Value::List(joined) = &kept[0]["x"] else {
            panic!("expected list");
        };
        let ids: std::collections::BTreeSet<i64> = joined
            .iter()
            .map(|v| match &v {
                Value::Object(o) => match o.get("id") {
                    Some(Value::Int(i)) => *i,
                    _ => panic!("expected id"),
                },
                _ => panic!("expected object"),
            })
            .collect();
        assert_eq!(ids, [2, 3].into_iter().collect());
    }

    #[test]
    fn pivot_or_keeps_either_group() {
        let logger = logger();
        let left = vec![
            record(&[("id", Value::Int(1)), ("tc", Value::Int(100))]),
            record(&[("id", Value::Int(9)), ("tc", Value::Int(7))]),
        ];
        let rel = or(
            eq(field("id", None), field("nid", None)).unwrap(),
            eq(field("tc", None), field("c", None)).unwrap(),
        );
        let conditions = to_dnf(rel);
        let index = index_of(&left, &conditions, &logger);

        let right = vec![
            record(&[("nid", Value::Int(1)), ("c", Value::Int(0))]),
            record(&[("nid", Value::Int(0)), ("c", Value::Int(7))]),
            record(&[("nid", Value::Int(0)), ("c", Value::Int(0))]),
        ];
        let mut kept = Vec::new();
        process(
            &StageKind::Pivot,
            &conditions,
            &index,
            right.into_iter().map(Ok),
            &logger,
            |r| {
                kept.push(r);
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(kept.len(), 2);
    }
}
