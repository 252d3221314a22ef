//! Reduction of a condition tree to disjunctive normal form (§4.1).

use itertools::iproduct;

use super::tree::{Condition, Relation};

/// One AND-group: an ordered sequence of conditions, all of which must hold.
pub type ConditionGroup = Vec<Condition>;

/// The OR of all groups: a relation in DNF.
pub type Conjunctions = Vec<ConditionGroup>;

/// Reduces a condition tree to DNF.
///
/// `to_dnf(Leaf(c))` is the single group `[[c]]`. `to_dnf(Or(a, b))` is `to_dnf(a)` followed by
/// `to_dnf(b)` — one group per disjunct, a's groups first. `to_dnf(And(a, b))` is the cartesian
/// concatenation of `a`'s groups with `b`'s groups, `a`'s conditions preceding `b`'s conditions
/// within each resulting group — this matches the leaf-to-root walk order the original condition
/// tree produces when `&` splices a copy of the left tree beneath every leaf of the right tree.
pub fn to_dnf(relation: Relation) -> Conjunctions {
    match relation {
        Relation::Leaf(condition) => vec![vec![condition]],
        Relation::Or(lhs, rhs) => {
            let mut groups = to_dnf(*lhs);
            groups.extend(to_dnf(*rhs));
            groups
        }
        Relation::And(lhs, rhs) => {
            let left_groups = to_dnf(*lhs);
            let right_groups = to_dnf(*rhs);
            iproduct!(left_groups.iter(), right_groups.iter())
                .map(|(left, right)| {
                    let mut group = left.clone();
                    group.extend(right.iter().cloned());
                    group
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::field;
    use crate::relation::{and, eq, or};

    fn f(name: &str) -> crate::field::F {
        field(name, None)
    }

    fn names(group: &ConditionGroup) -> Vec<(&str, &str)> {
        group
            .iter()
            .map(|c| (c.left_field.as_str(), c.right_field.as_str()))
            .collect()
    }

    #[test]
    fn and_then_or_matches_law() {
        // (A and B) or C == {{A,B},{C}}
        let a = eq(f("a1"), f("a2")).unwrap();
        let b = eq(f("b1"), f("b2")).unwrap();
        let c = eq(f("c1"), f("c2")).unwrap();
        let dnf = to_dnf(or(and(a, b), c));
        assert_eq!(dnf.len(), 2);
        assert_eq!(names(&dnf[0]), vec![("a1", "a2"), ("b1", "b2")]);
        assert_eq!(names(&dnf[1]), vec![("c1", "c2")]);
    }

    #[test]
    fn and_distributes_over_or() {
        // A and (B or C) == {{A,B},{A,C}}
        let a = eq(f("a1"), f("a2")).unwrap();
        let b = eq(f("b1"), f("b2")).unwrap();
        let c = eq(f("c1"), f("c2")).unwrap();
        let dnf = to_dnf(and(a, or(b, c)));
        assert_eq!(dnf.len(), 2);
        assert_eq!(names(&dnf[0]), vec![("a1", "a2"), ("b1", "b2")]);
        assert_eq!(names(&dnf[1]), vec![("a1", "a2"), ("c1", "c2")]);
    }

    #[test]
    fn single_leaf_is_one_group_one_condition() {
        let dnf = to_dnf(eq(f("x"), f("y")).unwrap());
        assert_eq!(dnf.len(), 1);
        assert_eq!(names(&dnf[0]), vec![("x", "y")]);
    }
}
