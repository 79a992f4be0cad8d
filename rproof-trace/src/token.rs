//! Whitespace tokenization and literal parsing for trace lines.
//!
//! A trace line is ASCII, whitespace-delimited, command token first
//! (`spec.md` §6). Literals are a decimal variable number with an optional
//! leading `~` for negation and no terminating `0` sentinel — the one place
//! this crate's numbering diverges from DIMACS, since the trace format is
//! bespoke to this tool rather than CNF.
use thiserror::Error;

use rproof_formula::Lit;

/// Malformed input at the tokenizer level (`spec.md` §6 "literal parsing
/// must reject malformed inputs").
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected a {expected} token, found end of line")]
    UnexpectedEof { expected: &'static str },
    #[error("expected a literal, found '{found}'")]
    InvalidLiteral { found: String },
    #[error("expected an integer, found '{found}'")]
    InvalidInteger { found: String },
    #[error("unknown trace command '{command}'")]
    UnknownCommand { command: String },
}

/// A trace line split into whitespace-delimited tokens, consumed
/// front-to-back by the dispatcher as it decodes a command's arguments.
pub struct Tokens<'a> {
    rest: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    pub fn new(line: &'a str) -> Tokens<'a> {
        Tokens {
            rest: line.split_whitespace(),
        }
    }

    pub fn command(&mut self) -> Option<&'a str> {
        self.rest.next()
    }

    fn next_token(&mut self, expected: &'static str) -> Result<&'a str, ParseError> {
        self.rest
            .next()
            .ok_or(ParseError::UnexpectedEof { expected })
    }

    pub fn integer(&mut self, expected: &'static str) -> Result<i64, ParseError> {
        let token = self.next_token(expected)?;
        token
            .parse()
            .map_err(|_| ParseError::InvalidInteger { found: token.to_string() })
    }

    pub fn count(&mut self, expected: &'static str) -> Result<usize, ParseError> {
        let token = self.next_token(expected)?;
        token
            .parse()
            .map_err(|_| ParseError::InvalidInteger { found: token.to_string() })
    }

    pub fn literal(&mut self) -> Result<Lit, ParseError> {
        let token = self.next_token("literal")?;
        parse_literal(token)
    }

    pub fn literals(&mut self, count: usize) -> Result<Vec<Lit>, ParseError> {
        (0..count).map(|_| self.literal()).collect()
    }
}

/// Parses one literal token: `~n` for a negative literal, `n` for positive.
pub fn parse_literal(token: &str) -> Result<Lit, ParseError> {
    let (negative, digits) = match token.strip_prefix('~') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidLiteral {
            found: token.to_string(),
        });
    }

    let index: usize = digits.parse().map_err(|_| ParseError::InvalidLiteral {
        found: token.to_string(),
    })?;

    Ok(Lit::from_index(index, !negative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rproof_formula::lit;

    #[test]
    fn parses_positive_and_negative_literals() {
        assert_eq!(parse_literal("3").unwrap(), lit!(3));
        assert_eq!(parse_literal("~3").unwrap(), lit!(-3));
    }

    #[test]
    fn rejects_malformed_literals() {
        assert!(parse_literal("").is_err());
        assert!(parse_literal("~").is_err());
        assert!(parse_literal("3a").is_err());
        assert!(parse_literal("-3").is_err());
    }

    #[test]
    fn tokens_reads_command_then_arguments() {
        let mut t = Tokens::new("I 5 2 ~1 3");
        assert_eq!(t.command(), Some("I"));
        assert_eq!(t.integer("cref").unwrap(), 5);
        let k = t.count("count").unwrap();
        assert_eq!(k, 2);
        assert_eq!(t.literals(k).unwrap(), vec![lit!(-1), lit!(3)]);
    }
}
