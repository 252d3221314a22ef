//! Tokenizer for the surface query syntax (§4.8).

use crate::error::{Error, Result};

/// Identifier charset: alphanumeric plus `_ . @ $ ?`.
fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '$' | '?')
}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// A `#`-prefixed keyword, verbatim (e.g. `"#pivot-to"`).
    Keyword(String),
    And,
    Or,
    Ident(String),
    StringLit(String),
    FilterLit(String),
    Eq,
    Ne,
    LParen,
    RParen,
}

/// A token together with the 1-based column it started at, for error reporting.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub column: usize,
}

/// Tokenizes `input`. Whitespace is insignificant outside of quoted/piped literals.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '(' => {
                tokens.push(Spanned {
                    token: Token::LParen,
                    column,
                });
                i += 1;
            }
            ')' => {
                tokens.push(Spanned {
                    token: Token::RParen,
                    column,
                });
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Spanned {
                    token: Token::Ne,
                    column,
                });
                i += 2;
            }
            '=' => {
                tokens.push(Spanned {
                    token: Token::Eq,
                    column,
                });
                i += 1;
            }
            '#' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(Spanned {
                    token: Token::Keyword(word),
                    column,
                });
            }
            '"' => {
                let (literal, next) = read_escaped(&chars, i + 1, '"', column)?;
                tokens.push(Spanned {
                    token: Token::StringLit(literal),
                    column,
                });
                i = next;
            }
            '|' => {
                let (literal, next) = read_escaped(&chars, i + 1, '|', column)?;
                tokens.push(Spanned {
                    token: Token::FilterLit(literal),
                    column,
                });
                i = next;
            }
            _ if is_ident_char(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Ident(word),
                };
                tokens.push(Spanned { token, column });
            }
            other => {
                return Err(Error::TextQueryCompileError(format!(
                    "unexpected character '{other}' at column {column}"
                )))
            }
        }
    }

    Ok(tokens)
}

/// Reads a `quote`-delimited literal starting just after the opening quote, honoring `\quote` and
/// `\\` escapes. Returns the decoded literal and the index just past the closing quote.
fn read_escaped(chars: &[char], mut i: usize, quote: char, start_column: usize) -> Result<(String, usize)> {
    let mut out = String::new();
    while i < chars.len() {
        match chars[i] {
            '\\' if chars.get(i + 1) == Some(&quote) => {
                out.push(quote);
                i += 2;
            }
            '\\' if chars.get(i + 1) == Some(&'\\') => {
                out.push('\\');
                i += 2;
            }
            c if c == quote => {
                return Ok((out, i + 1));
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(Error::TextQueryCompileError(format!(
        "unterminated literal starting at column {start_column}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_of(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn tokenizes_seed_clause() {
        let tokens = tokens_of(r#"#from "src1" #as a"#);
        assert_eq!(
            tokens,
            vec![
                Token::Keyword("#from".to_string()),
                Token::StringLit("src1".to_string()),
                Token::Keyword("#as".to_string()),
                Token::Ident("a".to_string()),
            ]
        );
    }

    #[test]
    fn string_literal_handles_escapes() {
        let tokens = tokens_of(r#""a \"quoted\" b""#);
        assert_eq!(tokens, vec![Token::StringLit(r#"a "quoted" b"#.to_string())]);
    }

    #[test]
    fn filter_literal_handles_pipe_escape() {
        let tokens = tokens_of(r"|a \| b|");
        assert_eq!(tokens, vec![Token::FilterLit("a | b".to_string())]);
    }

    #[test]
    fn where_expr_tokenizes_operators_and_keywords() {
        let tokens = tokens_of("#where a.id = b.nid and a.n != b.l");
        assert_eq!(
            tokens,
            vec![
                Token::Keyword("#where".to_string()),
                Token::Ident("a.id".to_string()),
                Token::Eq,
                Token::Ident("b.nid".to_string()),
                Token::And,
                Token::Ident("a.n".to_string()),
                Token::Ne,
                Token::Ident("b.l".to_string()),
            ]
        );
    }
}
