//! Nested-field access over dotted paths (§4.2).

use crate::value::{Record, Value};
use std::cell::RefCell;

/// Does `path` resolve to a value in `record`? Missing keys or non-object intermediates yield
/// `false`.
pub fn exists(record: &Record, path: &str) -> bool {
    value(record, path).is_some()
}

/// Resolves a dotted path against `record`, walking nested objects one key at a time. Returns
/// `None` ("missing") on a missing key or a non-object intermediate.
pub fn value<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut current: Option<&Value> = None;
    for (i, segment) in path.split('.').enumerate() {
        current = match (i, &current) {
            (0, _) => record.get(segment),
            (_, Some(Value::Object(nested))) => nested.get(segment),
            _ => return None,
        };
        current.as_ref()?;
    }
    current
}

/// A reusable, optionally-caching accessor for a single dotted path.
///
/// Caching is a pure optimization for repeated lookups of the same path against the same record;
/// correctness never depends on it (call [`Accessor::clear_cache`] whenever the underlying record
/// may have mutated since the last resolve).
pub struct Accessor {
    path: String,
    cache: RefCell<Option<Option<Value>>>,
}

impl Accessor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cache: RefCell::new(None),
        }
    }

    pub fn exists(&self, record: &Record) -> bool {
        self.resolve(record).is_some()
    }

    pub fn value(&self, record: &Record) -> Option<Value> {
        self.resolve(record)
    }

    fn resolve(&self, record: &Record) -> Option<Value> {
        if let Some(cached) = self.cache.borrow().as_ref() {
            return cached.clone();
        }
        let resolved = value(record, &self.path).cloned();
        *self.cache.borrow_mut() = Some(resolved.clone());
        resolved
    }

    /// Drops any cached value, forcing the next lookup to re-resolve against the record passed.
    pub fn clear_cache(&self) {
        *self.cache.borrow_mut() = None;
    }
}
