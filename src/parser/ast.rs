//! The pre-DNF parse tree: a `#where` expression, and one parsed clause per pipeline stage
//! (§4.8).

/// A leaf/operator field expression, built straight from the token stream, before alias
/// resolution or operand reorientation.
#[derive(Clone, Debug)]
pub enum Expr {
    Term {
        left: String,
        op: TermOp,
        right: String,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TermOp {
    Eq,
    Ne,
}

/// Options collected from a JOIN clause's trailing `#field-name`/`#exclude-empty`/`#array`
/// modifiers.
#[derive(Clone, Debug, Default)]
pub struct JoinClauseOptions {
    pub field_name: Option<String>,
    pub exclude_empty: bool,
    pub as_array: bool,
}

/// What kind of step a parsed clause produces.
#[derive(Clone, Debug)]
pub enum StepKind {
    Seed,
    Pivot,
    Join(JoinClauseOptions),
}

/// One parsed clause: `#from`/`#pivot-to`/`#join-to`, its source spec, and (for process clauses)
/// its `#where` expression.
#[derive(Clone, Debug)]
pub struct Step {
    pub kind: StepKind,
    pub source_uri: String,
    pub source_alias: String,
    pub filter_string: Option<String>,
    pub where_expr: Option<Expr>,
}
