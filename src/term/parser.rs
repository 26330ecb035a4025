/*!
Parser for the textual term form `f(x,g(y,z))`.

The parser is a small shift-reduce loop over a token stream: an
identifier followed by `(` opens an application frame, `,` and `)`
attach completed subterms, and a bare identifier is a variable. No
recursion, so input depth is unbounded.
*/

use std::sync::Arc;

use crate::alg::op::OperationSymbol;
use crate::error::{CalcError, CalcResult};

use super::Term;

#[derive(Debug, PartialEq)]
enum Token {
    Ident(String),
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> CalcResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_alphanumeric() || c == '_' || c == '\'' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '\'' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(input[start..end].to_string()));
            }
            other => {
                return Err(CalcError::invalid_argument(format!(
                    "unexpected character '{}' at byte {} in term",
                    other, start
                )));
            }
        }
    }
    Ok(tokens)
}

pub fn parse(input: &str) -> CalcResult<Term> {
    let tokens = tokenize(input)?;
    let mut frames: Vec<(String, Vec<Arc<Term>>)> = Vec::new();
    let mut pending: Option<Arc<Term>> = None;
    let mut iter = tokens.into_iter().peekable();

    let attach = |frames: &mut Vec<(String, Vec<Arc<Term>>)>,
                  pending: &mut Option<Arc<Term>>,
                  context: &str|
     -> CalcResult<()> {
        let term = pending
            .take()
            .ok_or_else(|| CalcError::invalid_argument(format!("expected a term before '{}'", context)))?;
        match frames.last_mut() {
            Some((_, children)) => {
                children.push(term);
                Ok(())
            }
            None => Err(CalcError::invalid_argument(format!(
                "'{}' outside of an application",
                context
            ))),
        }
    };

    while let Some(token) = iter.next() {
        match token {
            Token::Ident(name) => {
                if pending.is_some() {
                    return Err(CalcError::invalid_argument(
                        "two terms in a row; expected ',' or ')'",
                    ));
                }
                if matches!(iter.peek(), Some(Token::LParen)) {
                    iter.next();
                    frames.push((name, Vec::new()));
                } else {
                    pending = Some(Arc::new(Term::Variable(name)));
                }
            }
            Token::Comma => attach(&mut frames, &mut pending, ",")?,
            Token::RParen => {
                // `f()` closes an empty application without a pending term
                if pending.is_some() {
                    attach(&mut frames, &mut pending, ")")?;
                }
                let (name, children) = frames.pop().ok_or_else(|| {
                    CalcError::invalid_argument("unmatched ')' in term")
                })?;
                let symbol = OperationSymbol::new(name, children.len());
                pending = Some(Arc::new(Term::application_shared(symbol, children)?));
            }
            Token::LParen => {
                return Err(CalcError::invalid_argument(
                    "'(' must follow an operation name",
                ));
            }
        }
    }

    if !frames.is_empty() {
        return Err(CalcError::invalid_argument("unclosed '(' in term"));
    }
    match pending {
        Some(term) => Ok(Arc::try_unwrap(term).unwrap_or_else(|arc| (*arc).clone())),
        None => Err(CalcError::invalid_argument("empty term")),
    }
}
