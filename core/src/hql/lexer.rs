//! # Lexer
//!
//! Tokenizes HQL source text into a stream of tokens.

use std::collections::HashMap;

use lazy_static::lazy_static;

use super::error::Span;

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Words
    /// Structural keyword, never a bare identifier.
    Keyword,
    /// Keyword that may also be used where an identifier is expected.
    SoftKeyword,
    Identifier,
    /// `` `name` ``
    QuotedIdentifier,

    // Literals
    StringLiteral,
    IntegerLiteral,
    LongLiteral,
    BigIntegerLiteral,
    FloatLiteral,
    DoubleLiteral,
    BigDecimalLiteral,
    HexLiteral,
    /// `X'0A1B'`
    BinaryLiteral,

    // Parameters
    NamedParam,      // :name
    PositionalParam, // ?1 or a bare ?

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Colon,
    Semicolon,

    // Operators
    Equals,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PipePipe,

    // Special
    /// Unrecognized character or unterminated literal.
    Error,
    Eof,
}

impl TokenKind {
    pub fn is_word(self) -> bool {
        matches!(
            self,
            TokenKind::Keyword
                | TokenKind::SoftKeyword
                | TokenKind::Identifier
                | TokenKind::QuotedIdentifier
        )
    }
}

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut map = HashMap::new();
        for word in [
            "all", "and", "as", "between", "by", "case", "cross", "delete", "distinct", "else",
            "empty", "end", "except", "exists", "false", "fetch", "from", "full", "group",
            "having", "ilike", "in", "inner", "insert", "intersect", "into", "is", "join",
            "left", "like", "limit", "member", "new", "not", "null", "of", "offset", "on",
            "or", "order", "outer", "right", "select", "set", "then", "true", "union",
            "update", "values", "when", "where", "with",
        ] {
            map.insert(word, TokenKind::Keyword);
        }
        for word in [
            "any", "asc", "avg", "both", "cast", "collate", "count", "cube", "desc", "element",
            "elements", "entry", "escape", "every", "extract", "filter", "first", "format",
            "id", "index", "key", "last", "leading", "list", "map", "max", "maxelement",
            "maxindex", "min", "minelement", "minindex", "naturalid", "next", "nulls",
            "object", "only", "pad", "percent", "position", "rollup", "row", "rows", "size",
            "some", "sum", "ties", "trailing", "treat", "trim", "type", "value", "version",
            "versioned",
        ] {
            map.insert(word, TokenKind::SoftKeyword);
        }
        map
    };
}

/// Whether `word` is one of the lexer's keywords, reserved or soft.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains_key(word.to_ascii_lowercase().as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    source: &'a [u8],
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            tokens: Vec::with_capacity(64),
            pos: 0,
        }
    }

    pub fn lex(mut self) -> Vec<Token> {
        while self.pos < self.source.len() {
            let byte = self.source[self.pos];
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'x' | b'X' if self.peek_byte(1) == Some(b'\'') => self.scan_binary(),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => self.scan_identifier_or_keyword(),
                b'0'..=b'9' => self.scan_number(),
                b'.' if self.peek_byte(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.scan_number()
                }
                b'\'' | b'"' => self.scan_string(byte),
                b'`' => self.scan_quoted_identifier(),
                b'?' => self.scan_positional_param(),
                b':' if self
                    .peek_byte(1)
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == b'_') =>
                {
                    self.scan_named_param()
                }
                _ => self.scan_operator_or_delimiter(),
            }
        }

        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(self.pos as u32, self.pos as u32),
        });
        self.tokens
    }

    #[inline]
    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start as u32, self.pos as u32),
        });
    }

    fn take_while(&mut self, predicate: impl Fn(u8) -> bool) -> usize {
        let len = self.source[self.pos..]
            .iter()
            .take_while(|&&c| predicate(c))
            .count();
        self.pos += len;
        len
    }

    fn scan_identifier_or_keyword(&mut self) {
        let start = self.pos;
        self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'$');

        let text = String::from_utf8_lossy(&self.source[start..self.pos]).to_ascii_lowercase();
        let kind = KEYWORDS
            .get(text.as_str())
            .copied()
            .unwrap_or(TokenKind::Identifier);
        self.push(kind, start);
    }

    fn scan_quoted_identifier(&mut self) {
        let start = self.pos;
        self.pos += 1;
        match self.source[self.pos..].iter().position(|&c| c == b'`') {
            Some(len) => {
                self.pos += len + 1;
                self.push(TokenKind::QuotedIdentifier, start);
            }
            None => {
                self.pos = self.source.len();
                self.push(TokenKind::Error, start);
            }
        }
    }

    fn scan_named_param(&mut self) {
        let start = self.pos;
        self.pos += 1; // ':'
        self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        self.push(TokenKind::NamedParam, start);
    }

    fn scan_positional_param(&mut self) {
        let start = self.pos;
        self.pos += 1; // '?'
        self.take_while(|c| c.is_ascii_digit());
        self.push(TokenKind::PositionalParam, start);
    }

    fn scan_number(&mut self) {
        let start = self.pos;

        if self.source[self.pos] == b'0' && matches!(self.peek_byte(1), Some(b'x' | b'X')) {
            self.pos += 2;
            self.take_while(|c| c.is_ascii_hexdigit());
            if matches!(self.peek_byte(0), Some(b'l' | b'L')) {
                self.pos += 1;
            }
            self.push(TokenKind::HexLiteral, start);
            return;
        }

        self.take_while(|c| c.is_ascii_digit());
        let mut fractional = false;
        if self.peek_byte(0) == Some(b'.') && self.peek_byte(1).is_some_and(|c| c.is_ascii_digit())
        {
            fractional = true;
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek_byte(0), Some(b'e' | b'E')) {
            let digits_at = match self.peek_byte(1) {
                Some(b'+' | b'-') => 2,
                _ => 1,
            };
            if self.peek_byte(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                fractional = true;
                self.pos += digits_at;
                self.take_while(|c| c.is_ascii_digit());
            }
        }

        let suffix = [self.peek_byte(0), self.peek_byte(1)];
        let kind = match suffix {
            [Some(b'b' | b'B'), Some(b'i' | b'I')] if !fractional => {
                self.pos += 2;
                TokenKind::BigIntegerLiteral
            }
            [Some(b'b' | b'B'), Some(b'd' | b'D')] => {
                self.pos += 2;
                TokenKind::BigDecimalLiteral
            }
            [Some(b'l' | b'L'), _] if !fractional => {
                self.pos += 1;
                TokenKind::LongLiteral
            }
            [Some(b'f' | b'F'), _] => {
                self.pos += 1;
                TokenKind::FloatLiteral
            }
            [Some(b'd' | b'D'), _] => {
                self.pos += 1;
                TokenKind::DoubleLiteral
            }
            _ if fractional => TokenKind::FloatLiteral,
            _ => TokenKind::IntegerLiteral,
        };
        self.push(kind, start);
    }

    /// Scans a quoted string; a doubled quote escapes the quote character.
    fn scan_string(&mut self, quote: u8) {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek_byte(0) {
                Some(c) if c == quote => {
                    if self.peek_byte(1) == Some(quote) {
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        self.push(TokenKind::StringLiteral, start);
                        return;
                    }
                }
                Some(_) => self.pos += 1,
                None => {
                    self.push(TokenKind::Error, start);
                    return;
                }
            }
        }
    }

    fn scan_binary(&mut self) {
        let start = self.pos;
        self.pos += 2; // X'
        self.take_while(|c| c.is_ascii_hexdigit());
        if self.peek_byte(0) == Some(b'\'') {
            self.pos += 1;
            self.push(TokenKind::BinaryLiteral, start);
        } else {
            self.push(TokenKind::Error, start);
        }
    }

    fn scan_operator_or_delimiter(&mut self) {
        let start = self.pos;
        let next = self.peek_byte(1);

        let (kind, len) = match self.source[self.pos] {
            b'(' => (TokenKind::LeftParen, 1),
            b')' => (TokenKind::RightParen, 1),
            b'[' => (TokenKind::LeftBracket, 1),
            b']' => (TokenKind::RightBracket, 1),
            b'{' => (TokenKind::LeftBrace, 1),
            b'}' => (TokenKind::RightBrace, 1),
            b',' => (TokenKind::Comma, 1),
            b'.' => (TokenKind::Dot, 1),
            b':' => (TokenKind::Colon, 1),
            b';' => (TokenKind::Semicolon, 1),
            b'+' => (TokenKind::Plus, 1),
            b'-' => (TokenKind::Minus, 1),
            b'*' => (TokenKind::Star, 1),
            b'/' => (TokenKind::Slash, 1),
            b'%' => (TokenKind::Percent, 1),
            b'=' => (TokenKind::Equals, 1),
            b'<' => match next {
                Some(b'=') => (TokenKind::LessEqual, 2),
                Some(b'>') => (TokenKind::NotEqual, 2),
                _ => (TokenKind::LessThan, 1),
            },
            b'>' => match next {
                Some(b'=') => (TokenKind::GreaterEqual, 2),
                _ => (TokenKind::GreaterThan, 1),
            },
            b'!' | b'^' if next == Some(b'=') => (TokenKind::NotEqual, 2),
            b'|' if next == Some(b'|') => (TokenKind::PipePipe, 2),
            _ => {
                // Consume a whole UTF-8 character so spans stay on char boundaries
                let width = match self.source[self.pos] {
                    0xC0..=0xDF => 2,
                    0xE0..=0xEF => 3,
                    0xF0..=0xF7 => 4,
                    _ => 1,
                };
                (TokenKind::Error, width)
            }
        };

        self.pos = (self.pos + len).min(self.source.len());
        self.push(kind, start);
    }
}

/// Tokenize source text.
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).lex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_select() {
        assert_eq!(
            kinds("select a from Animal a"),
            vec![
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("SELECT Count FROM"),
            vec![
                TokenKind::Keyword,
                TokenKind::SoftKeyword,
                TokenKind::Keyword,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_numeric_suffixes() {
        assert_eq!(
            kinds("1 2L 3BI 1.5 2.5F 3.5D 4.5BD 0xFF 0xFFL 1e10"),
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::LongLiteral,
                TokenKind::BigIntegerLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::DoubleLiteral,
                TokenKind::BigDecimalLiteral,
                TokenKind::HexLiteral,
                TokenKind::HexLiteral,
                TokenKind::FloatLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_parameters() {
        let source = "where a.id = :id or a.id = ?1 or a.id = ?";
        let tokens = lex(source);
        let params: Vec<&str> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::NamedParam | TokenKind::PositionalParam))
            .map(|t| &source[t.span.as_range()])
            .collect();
        assert_eq!(params, vec![":id", "?1", "?"]);
    }

    #[test]
    fn test_strings_and_binary() {
        let source = "'it''s' X'0A1B' \"dq\"";
        let tokens = lex(source);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(&source[tokens[0].span.as_range()], "'it''s'");
        assert_eq!(tokens[1].kind, TokenKind::BinaryLiteral);
        assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
    }

    #[test]
    fn test_unterminated_string_is_error_token() {
        assert_eq!(kinds("'abc"), vec![TokenKind::Error, TokenKind::Eof]);
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            kinds("= <> != < <= > >= ||"),
            vec![
                TokenKind::Equals,
                TokenKind::NotEqual,
                TokenKind::NotEqual,
                TokenKind::LessThan,
                TokenKind::LessEqual,
                TokenKind::GreaterThan,
                TokenKind::GreaterEqual,
                TokenKind::PipePipe,
                TokenKind::Eof,
            ]
        );
    }
}
