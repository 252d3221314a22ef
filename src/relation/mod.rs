//! Field & relation algebra (§4.1): leaf predicates, AND/OR combinators, and DNF reduction.

mod dnf;
mod tree;

pub use dnf::{to_dnf, ConditionGroup, Conjunctions};
pub use tree::{Condition, Op, Relation};

use crate::error::{Error, Result};
use tree::Operand;

/// Builds an equality leaf predicate `lhs == rhs`. Both operands must be bare field references
/// ([`crate::field::F`]); passing an already-built [`Relation`] on either side fails with
/// [`Error::RelationMalformed`] — this mirrors the precedence pitfall that motivates requiring
/// parentheses around compound sub-expressions in the surface syntax (§4.8).
pub fn eq(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Relation> {
    leaf(Op::Eq, lhs, rhs)
}

/// Builds an inequality leaf predicate `lhs != rhs`. See [`eq`] for operand constraints.
pub fn ne(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Relation> {
    leaf(Op::Ne, lhs, rhs)
}

fn leaf(op: Op, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Relation> {
    let lhs = lhs.into().into_field().map_err(|()| {
        Error::RelationMalformed(
            "left-hand side of a leaf predicate must be a bare field reference, not a compound \
             relation — wrap compound sub-expressions in parentheses"
                .to_string(),
        )
    })?;
    let rhs = rhs.into().into_field().map_err(|()| {
        Error::RelationMalformed(
            "right-hand side of a leaf predicate must be a bare field reference, not a compound \
             relation — wrap compound sub-expressions in parentheses"
                .to_string(),
        )
    })?;
    Ok(Relation::Leaf(Condition {
        left_field: lhs.name().to_string(),
        op,
        right_field: rhs.name().to_string(),
        left_proxy: lhs.proxy(),
        right_proxy: rhs.proxy(),
    }))
}

/// ANDs two relations together: `and(a, b)` is satisfied only when both `a` and `b` are.
pub fn and(lhs: Relation, rhs: Relation) -> Relation {
    Relation::And(Box::new(lhs), Box::new(rhs))
}

/// ORs two relations together: `or(a, b)` is satisfied when either `a` or `b` is.
pub fn or(lhs: Relation, rhs: Relation) -> Relation {
    Relation::Or(Box::new(lhs), Box::new(rhs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::field;

    fn f(name: &str) -> crate::field::F {
        field(name, None)
    }

    #[test]
    fn leaf_requires_bare_fields() {
        let compound = and(eq(f("a"), f("b")).unwrap(), eq(f("c"), f("d")).unwrap());
        let err = eq(compound, f("e")).unwrap_err();
        assert!(matches!(err, Error::RelationMalformed(_)));
    }

    #[test]
    fn and_or_build_without_error() {
        let rel = or(
            and(eq(f("a"), f("b")).unwrap(), eq(f("c"), f("d")).unwrap()),
            eq(f("e"), f("f")).unwrap(),
        );
        let dnf = to_dnf(rel);
        assert_eq!(dnf.len(), 2);
    }
}
