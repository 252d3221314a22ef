//! Per-stage equality/inequality index over the previous stage's records (§4.3).
//!
//! Builds `eq_map`/`ne_map` tables keyed on the left-hand side of each condition group, so the
//! match & filter engine ([`crate::engine::filter`]) can look up matches for the current stage's
//! records without a linear scan against the previous stage's full result set.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::accessor;
use crate::logging::Logger;
use crate::relation::{ConditionGroup, Conjunctions, Op};
use crate::value::{Record, Value};

/// The key an equality group indexes on: the ordered `(position, proxied value)` pairs for every
/// equality condition in the group that had a value present. Positions are condition-within-group
/// indices, not proxied values alone, so two groups that happen to produce the same values in a
/// different condition order don't collide.
pub type EqKey = Vec<(usize, Value)>;

/// The key a single inequality condition indexes on.
pub type NeKey = (usize, Value);

/// One condition group's index: an equality table keyed on the full equality key, and an
/// inequality table keyed per-condition (mirroring the source semantics, where each inequality
/// match is checked independently rather than as a combined tuple).
#[derive(Default)]
struct GroupIndex {
    eq: HashMap<EqKey, Vec<Rc<Record>>>,
    ne: HashMap<NeKey, Vec<Rc<Record>>>,
}

/// Indexes the previous stage's records against a PIVOT/JOIN stage's condition groups.
///
/// One [`GroupIndex`] is built per group in the stage's [`Conjunctions`]; a record that's missing
/// a field named by some condition in a group simply isn't indexed under that group (it may still
/// be indexed under others).
pub struct Index {
    conditions: Conjunctions,
    groups: Vec<GroupIndex>,
    hit_group_count: usize,
    logger: Arc<dyn Logger>,
}

impl Index {
    pub fn new(conditions: Conjunctions, logger: Arc<dyn Logger>) -> Self {
        logger.debug(&format!("{} index condition group(s)", conditions.len()));
        let groups = conditions.iter().map(|_| GroupIndex::default()).collect();
        Self {
            conditions,
            groups,
            hit_group_count: 0,
            logger,
        }
    }

    /// Indexes one previous-stage record against every condition group. A group is skipped
    /// (neither indexed nor counted) if any of its conditions names a field absent from `record`.
    ///
    /// Takes `Rc<Record>` rather than a borrowed or owned `Record`: the match & filter engine's
    /// set-complement path (§4.4, NE-only join) distinguishes matches by identity, which requires
    /// every stored reference to the same source record to share one allocation.
    pub fn insert(&mut self, record: Rc<Record>) {
        for (group_index, group) in self.conditions.iter().enumerate() {
            let Some((eq_key, ne_keys)) = self.index_keys(group, &record) else {
                continue;
            };

            self.hit_group_count += 1;
            let bucket = &mut self.groups[group_index];

            if !eq_key.is_empty() {
                bucket.eq.entry(eq_key).or_default().push(Rc::clone(&record));
            }
            for ne_key in ne_keys {
                bucket.ne.entry(ne_key).or_default().push(Rc::clone(&record));
            }
        }
    }

    /// Builds the equality and inequality keys for one group against `record`, or `None` if a
    /// condition's left-hand field is absent.
    fn index_keys(&self, group: &ConditionGroup, record: &Record) -> Option<(EqKey, Vec<NeKey>)> {
        let mut eq_key = EqKey::new();
        let mut ne_keys = Vec::new();

        for (position, condition) in group.iter().enumerate() {
            let Some(value) = accessor::value(record, &condition.left_field) else {
                self.logger.debug(&format!(
                    "field {} absent from record - skipping indexing of condition group",
                    condition.left_field
                ));
                return None;
            };
            let proxied = (condition.left_proxy)(&condition.left_field, value);
            match condition.op {
                Op::Eq => eq_key.push((position, proxied)),
                Op::Ne => ne_keys.push((position, proxied)),
            }
        }

        Some((eq_key, ne_keys))
    }

    /// Records previously indexed under `group_index`'s equality table for exactly `key`.
    pub fn eq_matches(&self, group_index: usize, key: &EqKey) -> &[Rc<Record>] {
        self.groups[group_index]
            .eq
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Records previously indexed under `group_index`'s inequality table for exactly `key`.
    pub fn ne_matches(&self, group_index: usize, key: &NeKey) -> &[Rc<Record>] {
        self.groups[group_index]
            .ne
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every `(key, records)` pair indexed under `group_index`'s inequality table. Used by the
    /// NE-only match path, which needs the complement of a set of excluded keys rather than a
    /// single lookup.
    pub fn ne_groups(
        &self,
        group_index: usize,
    ) -> impl Iterator<Item = (&NeKey, &Vec<Rc<Record>>)> {
        self.groups[group_index].ne.iter()
    }

    /// Number of condition groups in this index (parallel to the stage's filter conditions).
    pub fn group_count(&self) -> usize {
        self.conditions.len()
    }

    /// True if at least one previous-stage record satisfied at least one group's field
    /// dependencies. A successful index is a precondition for the stage to run its filter pass;
    /// an index with zero hits means the stage can short-circuit to an empty result.
    pub fn succeeded(&self) -> bool {
        self.logger.debug(&format!(
            "{} possibly-related field value(s)",
            self.hit_group_count
        ));
        self.hit_group_count > 0
    }
}
