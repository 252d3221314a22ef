//! Compiles tokenized surface syntax into a [`Builder`] (§4.8).
//!
//! Parsing produces a flat [`Step`] list with each `#where` expression left in its raw,
//! alias-qualified form; a second pass resolves aliases, reorients operands so the left side
//! always names the previous stage, and converts each step's expression straight to
//! [`crate::relation::Relation`] (skipping an intermediate DNF-agnostic tree — the relation
//! algebra already knows how to reduce itself).

use std::collections::HashMap;

use super::ast::{Expr, JoinClauseOptions, Step, StepKind, TermOp};
use super::lexer::{tokenize, Spanned, Token};
use crate::builder::{self, Builder};
use crate::engine::stage::JoinOptions;
use crate::error::{Error, Result};
use crate::field::field;
use crate::relation::{self, Relation};
use crate::config::DriverConfig;
use crate::source::SourceRegistry;

struct Cursor<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn column(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.column)
            .unwrap_or_else(|| self.tokens.last().map(|s| s.column + 1).unwrap_or(1))
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        match self.bump() {
            Some(Token::Keyword(k)) if k == keyword => Ok(()),
            other => Err(self.unexpected(&format!("expected '{keyword}'"), other)),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Keyword(k)) if k == keyword)
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.bump() {
            Some(Token::Ident(s)) => Ok(s),
            other => Err(self.unexpected("expected an identifier", other)),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.bump() {
            Some(Token::StringLit(s)) => Ok(s),
            other => Err(self.unexpected("expected a string literal", other)),
        }
    }

    fn expect_filter(&mut self) -> Result<String> {
        match self.bump() {
            Some(Token::FilterLit(s)) => Ok(s),
            other => Err(self.unexpected("expected a filter literal", other)),
        }
    }

    fn unexpected(&self, context: &str, found: Option<Token>) -> Error {
        Error::TextQueryCompileError(format!(
            "{context} at column {}, found {:?}",
            self.column(),
            found
        ))
    }
}

fn parse_source_spec(cur: &mut Cursor) -> Result<(String, String, Option<String>)> {
    let uri = cur.expect_string()?;
    cur.expect_keyword("#as")?;
    let alias = cur.expect_ident()?;
    let filter = if cur.peek_keyword("#filter") {
        cur.bump();
        Some(cur.expect_filter()?)
    } else {
        None
    };
    Ok((uri, alias, filter))
}

fn parse_term(cur: &mut Cursor) -> Result<Expr> {
    let left = cur.expect_ident()?;
    let op = match cur.bump() {
        Some(Token::Eq) => TermOp::Eq,
        Some(Token::Ne) => TermOp::Ne,
        other => return Err(cur.unexpected("expected '=' or '!='", other)),
    };
    let right = cur.expect_ident()?;
    Ok(Expr::Term { left, op, right })
}

fn parse_atom(cur: &mut Cursor) -> Result<Expr> {
    if matches!(cur.peek(), Some(Token::LParen)) {
        cur.bump();
        let expr = parse_or(cur)?;
        match cur.bump() {
            Some(Token::RParen) => Ok(expr),
            other => Err(cur.unexpected("expected ')'", other)),
        }
    } else {
        parse_term(cur)
    }
}

/// `and` binds tighter than `or` (§4.8).
fn parse_and(cur: &mut Cursor) -> Result<Expr> {
    let mut lhs = parse_atom(cur)?;
    while matches!(cur.peek(), Some(Token::And)) {
        cur.bump();
        let rhs = parse_atom(cur)?;
        lhs = Expr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_or(cur: &mut Cursor) -> Result<Expr> {
    let mut lhs = parse_and(cur)?;
    while matches!(cur.peek(), Some(Token::Or)) {
        cur.bump();
        let rhs = parse_and(cur)?;
        lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_where_clause(cur: &mut Cursor) -> Result<Expr> {
    cur.expect_keyword("#where")?;
    parse_or(cur)
}

fn parse_seed(cur: &mut Cursor) -> Result<Step> {
    cur.expect_keyword("#from")?;
    let (source_uri, source_alias, filter_string) = parse_source_spec(cur)?;
    Ok(Step {
        kind: StepKind::Seed,
        source_uri,
        source_alias,
        filter_string,
        where_expr: None,
    })
}

fn parse_process(cur: &mut Cursor) -> Result<Step> {
    let is_join = if cur.peek_keyword("#pivot-to") {
        cur.bump();
        false
    } else if cur.peek_keyword("#join-to") {
        cur.bump();
        true
    } else {
        return Err(cur.unexpected("expected '#pivot-to' or '#join-to'", cur.peek().cloned()));
    };

    let (source_uri, source_alias, filter_string) = parse_source_spec(cur)?;
    let where_expr = Some(parse_where_clause(cur)?);

    let kind = if is_join {
        let mut options = JoinClauseOptions::default();
        loop {
            if cur.peek_keyword("#field-name") {
                cur.bump();
                options.field_name = Some(cur.expect_ident()?);
            } else if cur.peek_keyword("#exclude-empty") {
                cur.bump();
                options.exclude_empty = true;
            } else if cur.peek_keyword("#array") {
                cur.bump();
                options.as_array = true;
            } else {
                break;
            }
        }
        StepKind::Join(options)
    } else {
        StepKind::Pivot
    };

    Ok(Step {
        kind,
        source_uri,
        source_alias,
        filter_string,
        where_expr,
    })
}

fn parse_steps(tokens: &[Spanned]) -> Result<Vec<Step>> {
    let mut cur = Cursor::new(tokens);
    let mut steps = vec![parse_seed(&mut cur)?];

    if cur.peek().is_none() {
        return Err(Error::TextQueryCompileError(
            "a query must have at least one #pivot-to or #join-to clause after #from".to_string(),
        ));
    }
    while cur.peek().is_some() {
        steps.push(parse_process(&mut cur)?);
    }
    Ok(steps)
}

fn split_alias(qualified: &str) -> Result<(&str, &str)> {
    qualified.split_once('.').ok_or_else(|| {
        Error::TextQueryCompileError(format!(
            "'{qualified}' is not a qualified field reference (expected alias.field)"
        ))
    })
}

/// Resolves `left`/`right`'s aliases against `current`'s position, and reorders them so the
/// result's first field always names the previous stage and the second names the current stage
/// (§4.8).
fn order_operands(
    alias_index: &HashMap<String, usize>,
    current: usize,
    left: &str,
    right: &str,
) -> Result<(String, String)> {
    let (left_alias, left_field) = split_alias(left)?;
    let (right_alias, right_field) = split_alias(right)?;

    let left_idx = *alias_index
        .get(left_alias)
        .ok_or_else(|| Error::TextQueryCompileError(format!("the alias {left_alias} is not assigned to a source")))?;
    let right_idx = *alias_index
        .get(right_alias)
        .ok_or_else(|| Error::TextQueryCompileError(format!("the alias {right_alias} is not assigned to a source")))?;

    if left_idx == current {
        if right_idx != current - 1 {
            return Err(Error::TextQueryCompileError(format!(
                "the alias {right_alias} is out of scope"
            )));
        }
        Ok((right_field.to_string(), left_field.to_string()))
    } else if left_idx != current - 1 {
        Err(Error::TextQueryCompileError(format!(
            "the alias {left_alias} is out of scope"
        )))
    } else if right_idx != current {
        Err(Error::TextQueryCompileError(format!(
            "the alias {right_alias} is out of scope"
        )))
    } else {
        Ok((left_field.to_string(), right_field.to_string()))
    }
}

fn expr_to_relation(expr: &Expr, alias_index: &HashMap<String, usize>, current: usize) -> Result<Relation> {
    match expr {
        Expr::Term { left, op, right } => {
            let (lf, rf) = order_operands(alias_index, current, left, right)?;
            match op {
                TermOp::Eq => relation::eq(field(lf, None), field(rf, None)),
                TermOp::Ne => relation::ne(field(lf, None), field(rf, None)),
            }
        }
        Expr::And(l, r) => Ok(relation::and(
            expr_to_relation(l, alias_index, current)?,
            expr_to_relation(r, alias_index, current)?,
        )),
        Expr::Or(l, r) => Ok(relation::or(
            expr_to_relation(l, alias_index, current)?,
            expr_to_relation(r, alias_index, current)?,
        )),
    }
}

/// Compiles `text` into a ready-to-configure [`Builder`], building each step's data source via
/// `registry` (using `config`'s per-type option blocks, if supplied).
pub fn compile_query(text: &str, registry: &SourceRegistry, config: Option<&DriverConfig>) -> Result<Builder> {
    let tokens = tokenize(text)?;
    let steps = parse_steps(&tokens)?;

    let alias_index: HashMap<String, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.source_alias.clone(), i))
        .collect();

    let mut steps = steps.into_iter().enumerate();
    let (_, seed_step) = steps.next().expect("parse_steps always yields a seed step");
    let seed_source = build_source(&seed_step.source_uri, seed_step.filter_string.as_deref(), registry, config)?;
    let mut pipeline = builder::seed(seed_source);

    for (index, step) in steps {
        let source = build_source(&step.source_uri, step.filter_string.as_deref(), registry, config)?;
        let relation = expr_to_relation(
            step.where_expr
                .as_ref()
                .expect("process steps always carry a #where expression"),
            &alias_index,
            index,
        )?;

        pipeline = match step.kind {
            StepKind::Seed => {
                return Err(Error::TextQueryCompileError(
                    "unexpected #from clause out of sequence".to_string(),
                ))
            }
            StepKind::Pivot => pipeline.pivot_to(source, relation),
            StepKind::Join(options) => pipeline.join_to(
                source,
                relation,
                JoinOptions {
                    field_name: options.field_name,
                    as_array: options.as_array,
                    exclude_empty: options.exclude_empty,
                },
            ),
        };
    }

    Ok(pipeline)
}

fn build_source(
    uri: &str,
    filter: Option<&str>,
    registry: &SourceRegistry,
    config: Option<&DriverConfig>,
) -> Result<Box<dyn crate::source::DataSource>> {
    let source_type = uri.split_once(':').map(|(t, _)| t.to_lowercase());
    let source_config = source_type
        .as_deref()
        .and_then(|t| config.and_then(|c| c.source_config(t)));
    registry
        .build(uri, filter, source_config)
        .map_err(|e| Error::TextQueryCompileError(format!("failed to build data source for '{uri}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ResultHandler;
    use crate::value::{Record, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

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

    #[test]
    fn compiles_two_stage_eq_pivot() {
        let mut registry = SourceRegistry::with_builtins();
        let mut src1 = Record::new();
        src1.insert("id".to_string(), Value::Int(1));
        let mut src2 = Record::new();
        src2.insert("nid".to_string(), Value::Int(1));
        registry.register_memory_table("src1", vec![src1]);
        registry.register_memory_table("src2", vec![src2]);

        let query = r#"#from "memory:src1" #as a #pivot-to "memory:src2" #as b #where a.id = b.nid"#;
        let builder = compile_query(query, &registry, None).unwrap();

        let sink = Rc::new(RefCell::new(Vec::new()));
        builder
            .result_handler(Box::new(SharedCollectHandler(Rc::clone(&sink))))
            .execute(false)
            .unwrap();

        assert_eq!(sink.borrow().len(), 1);
    }

    #[test]
    fn rejects_alias_out_of_scope() {
        let mut registry = SourceRegistry::with_builtins();
        registry.register_memory_table("s1", vec![]);
        registry.register_memory_table("s2", vec![]);
        registry.register_memory_table("s3", vec![]);

        let query = r#"#from "memory:s1" #as a #pivot-to "memory:s2" #as b #where a.id = b.nid #join-to "memory:s3" #as c #where a.id = c.nid"#;
        let err = compile_query(query, &registry, None).unwrap_err();
        assert!(matches!(err, Error::TextQueryCompileError(_)));
    }

    #[test]
    fn reorders_operands_to_previous_then_current() {
        let mut alias_index = HashMap::new();
        alias_index.insert("a".to_string(), 0);
        alias_index.insert("b".to_string(), 1);
        let (lf, rf) = order_operands(&alias_index, 1, "b.nid", "a.id").unwrap();
        assert_eq!((lf.as_str(), rf.as_str()), ("id", "nid"));
    }
}
