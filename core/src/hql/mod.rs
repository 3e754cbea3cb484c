//! # HQL front end
//!
//! Lexer, parser and parse tree for the HQL/JPQL query language. The
//! semantic builder consumes [`tree::Statement`] values produced here.

mod error;
mod lexer;
mod parser;
pub mod tree;

pub use error::{Diagnostic, ParseResult, Severity, Span, Suggestion};
pub use lexer::{Token, TokenKind, is_keyword, lex};
pub use parser::Parser;

use crate::error::{HqlError, HqlResult};

/// Parse a single HQL statement.
pub fn parse(query: &str) -> HqlResult<tree::Statement> {
    let tokens = lex(query);

    if let Some(bad) = tokens.iter().find(|t| t.kind == TokenKind::Error) {
        let text = &query[bad.span.as_range()];
        let diagnostic = if text.starts_with(['\'', '"', '`']) {
            Diagnostic::error("unterminated literal", bad.span)
        } else {
            Diagnostic::error(format!("unexpected character '{}'", text), bad.span)
        };
        return Err(HqlError::Syntax(diagnostic));
    }

    let statement = Parser::new(&tokens, query)
        .parse_statement()
        .map_err(HqlError::Syntax)?;
    tracing::trace!(query, "parsed statement");
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_reports_lexer_errors() {
        let err = parse("select a from Animal a where a.name = 'open").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.to_string().contains("unterminated literal"));

        let err = parse("select a # b from Animal a").unwrap_err();
        assert!(err.to_string().contains("unexpected character '#'"));
    }

    #[test]
    fn test_parse_accepts_trailing_semicolon() {
        assert!(parse("from Animal a;").is_ok());
        assert!(parse("from Animal a; from Animal b").is_err());
    }
}
