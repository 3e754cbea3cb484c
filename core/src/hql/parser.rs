//! # Parser
//!
//! Recursive descent parser for HQL statements.

use smallvec::SmallVec;

use super::error::{Diagnostic, ParseResult, Span};
use super::lexer::{Token, TokenKind};
use super::tree::{
    Alias, Argument, Assignment, CastTargetSyntax, CollectionFunctionKind, ComparisonSymbol,
    DeleteStatement, DottedName, EntityReferenceFunction, EntityReferenceSyntax,
    EntityTypeArgument, Expression, FetchClause, FromClause, FromSpace, FunctionArguments,
    FunctionCallSyntax, GroupByItem, Ident, InListSyntax, InsertSource, InsertStatement,
    Instantiation, InstantiationArgumentSyntax, InstantiationTargetSyntax, ItemKey,
    JdbcEscapeKind, Join, JoinKind, Literal, NullsSyntax, OrderedQuery, ParameterSyntax, Path,
    Predicate, QualifiedJoin, QueryExpression, QueryOrder, QuerySpec, SelectClause, Selectable,
    SelectionItem, SetOperatorKind, SetOperatorSyntax, SortDirectionSyntax, SortItem, Statement,
    SummarizationSyntax, TailClause, Terminal, TrimSpec, UpdateStatement,
};

/// Words that turn a preceding expression into a duration, e.g. `2 day`.
const DURATION_UNITS: &[&str] = &[
    "year",
    "quarter",
    "month",
    "week",
    "day",
    "hour",
    "minute",
    "second",
    "nanosecond",
];

/// Functions that may be written without parentheses.
const NILADIC_FUNCTIONS: &[&str] = &[
    "current_date",
    "current_time",
    "current_timestamp",
    "instant",
    "local_date",
    "local_time",
    "local_datetime",
    "offset_datetime",
];

/// Recursive descent parser
pub struct Parser<'a> {
    tokens: &'a [Token],
    source: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], source: &'a str) -> Self {
        Self {
            tokens,
            source,
            pos: 0,
        }
    }

    // Token management

    #[inline]
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    #[inline]
    fn current_span(&self) -> Span {
        self.current()
            .map(|t| t.span)
            .unwrap_or(Span::new(self.source.len() as u32, self.source.len() as u32))
    }

    /// Span of the most recently consumed token.
    #[inline]
    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or_default()
    }

    #[inline]
    fn peek(&self) -> Option<TokenKind> {
        self.current().map(|t| t.kind)
    }

    #[inline]
    fn peek_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    #[inline]
    fn advance(&mut self) -> Token {
        let token = self.tokens.get(self.pos).copied().unwrap_or(Token {
            kind: TokenKind::Eof,
            span: self.current_span(),
        });
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Some(TokenKind::Eof) | None)
    }

    #[inline]
    fn check(&self, kind: TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    #[inline]
    fn token_text(&self, token: &Token) -> &'a str {
        &self.source[token.span.as_range()]
    }

    fn keyword_at(&self, offset: usize, keyword: &str) -> bool {
        match self.tokens.get(self.pos + offset) {
            Some(token) if matches!(token.kind, TokenKind::Keyword | TokenKind::SoftKeyword) => {
                self.token_text(token).eq_ignore_ascii_case(keyword)
            }
            _ => false,
        }
    }

    #[inline]
    fn check_keyword(&self, keyword: &str) -> bool {
        self.keyword_at(0, keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Whether the current token is any word spelled `word`.
    fn check_word(&self, word: &str) -> bool {
        match self.current() {
            Some(token) if token.kind.is_word() => self.token_text(token).eq_ignore_ascii_case(word),
            _ => false,
        }
    }

    /// Whether the current token starts a query (`select` or `from`).
    fn at_query_start(&self, offset: usize) -> bool {
        self.keyword_at(offset, "select") || self.keyword_at(offset, "from")
    }

    fn error(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(message, self.current_span())
    }

    fn describe_current(&self) -> String {
        match self.current() {
            Some(token) if token.kind == TokenKind::Eof => "end of input".to_string(),
            Some(token) => format!("'{}'", self.token_text(token)),
            None => "end of input".to_string(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {:?}, found {}",
                kind,
                self.describe_current()
            )))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected keyword '{}', found {}",
                keyword,
                self.describe_current()
            )))
        }
    }

    fn ident_from(&self, token: &Token) -> Ident {
        let raw = self.token_text(token);
        let text = if token.kind == TokenKind::QuotedIdentifier {
            raw.trim_matches('`').to_string()
        } else {
            raw.to_string()
        };
        Ident {
            text,
            span: token.span,
            keyword: matches!(token.kind, TokenKind::Keyword | TokenKind::SoftKeyword),
        }
    }

    /// An identifier; soft keywords are allowed, reserved keywords are not.
    fn expect_identifier(&mut self) -> ParseResult<Ident> {
        match self.current().copied() {
            Some(token)
                if matches!(
                    token.kind,
                    TokenKind::Identifier | TokenKind::QuotedIdentifier | TokenKind::SoftKeyword
                ) =>
            {
                self.advance();
                Ok(self.ident_from(&token))
            }
            Some(token) if token.kind == TokenKind::Keyword => {
                let text = self.token_text(&token);
                Err(self
                    .error(format!("cannot use keyword '{}' as identifier", text))
                    .with_suggestion("quote it", format!("`{}`", text)))
            }
            _ => Err(self.error(format!(
                "expected identifier, found {}",
                self.describe_current()
            ))),
        }
    }

    /// Any word, including reserved keywords.
    fn expect_any_word(&mut self) -> ParseResult<Ident> {
        match self.current().copied() {
            Some(token) if token.kind.is_word() => {
                self.advance();
                Ok(self.ident_from(&token))
            }
            _ => Err(self.error(format!(
                "expected identifier, found {}",
                self.describe_current()
            ))),
        }
    }

    fn terminal(&self, token: &Token) -> Terminal {
        Terminal {
            kind: token.kind,
            text: self.token_text(token).to_string(),
            span: token.span,
        }
    }

    fn string_terminal(&self, token: &Token) -> Terminal {
        Terminal {
            kind: token.kind,
            text: unquote(self.token_text(token)),
            span: token.span,
        }
    }

    fn expect_string(&mut self) -> ParseResult<Terminal> {
        let token = self.expect(TokenKind::StringLiteral)?;
        Ok(self.string_terminal(&token))
    }

    // Names

    /// `ident (. word)*`
    fn parse_dotted_name(&mut self) -> ParseResult<DottedName> {
        let mut parts: SmallVec<[Ident; 4]> = SmallVec::new();
        parts.push(self.expect_identifier()?);
        self.parse_dotted_tail(&mut parts)?;
        Ok(DottedName { parts })
    }

    fn parse_dotted_tail(&mut self, parts: &mut SmallVec<[Ident; 4]>) -> ParseResult<()> {
        while self.check(TokenKind::Dot) && self.peek_at(1).is_some_and(TokenKind::is_word) {
            self.advance();
            parts.push(self.expect_any_word()?);
        }
        Ok(())
    }

    fn parse_continuation(&mut self) -> ParseResult<Option<DottedName>> {
        if self.check(TokenKind::Dot) {
            self.advance();
            let mut parts: SmallVec<[Ident; 4]> = SmallVec::new();
            parts.push(self.expect_any_word()?);
            self.parse_dotted_tail(&mut parts)?;
            Ok(Some(DottedName { parts }))
        } else {
            Ok(None)
        }
    }

    /// `AS word` or a naked plain identifier.
    fn parse_alias(&mut self) -> ParseResult<Option<Alias>> {
        if self.eat_keyword("as") {
            let ident = self.expect_any_word()?;
            return Ok(Some(Alias {
                ident,
                explicit: true,
            }));
        }
        match self.current().copied() {
            Some(token)
                if matches!(
                    token.kind,
                    TokenKind::Identifier | TokenKind::QuotedIdentifier
                ) && !self.is_niladic_function_token(&token) =>
            {
                self.advance();
                Ok(Some(Alias {
                    ident: self.ident_from(&token),
                    explicit: false,
                }))
            }
            _ => Ok(None),
        }
    }

    fn is_niladic_function_token(&self, token: &Token) -> bool {
        let text = self.token_text(token);
        NILADIC_FUNCTIONS
            .iter()
            .any(|name| name.eq_ignore_ascii_case(text))
    }

    // Statements

    pub fn parse_statement(&mut self) -> ParseResult<Statement> {
        let statement = if self.check_keyword("insert") {
            Statement::Insert(self.parse_insert()?)
        } else if self.check_keyword("update") {
            Statement::Update(self.parse_update()?)
        } else if self.check_keyword("delete") {
            Statement::Delete(self.parse_delete()?)
        } else if self.at_query_start(0) || self.check(TokenKind::LeftParen) {
            Statement::Select(self.parse_query_expression()?)
        } else {
            return Err(self
                .error(format!(
                    "expected a statement, found {}",
                    self.describe_current()
                ))
                .with_note("statements start with select, from, insert, update or delete"));
        };

        self.eat(TokenKind::Semicolon);
        if !self.is_at_end() {
            return Err(self.error(format!(
                "unexpected {} after end of statement",
                self.describe_current()
            )));
        }
        Ok(statement)
    }

    fn parse_insert(&mut self) -> ParseResult<InsertStatement> {
        self.expect_keyword("insert")?;
        self.eat_keyword("into");
        let target = self.parse_dotted_name()?;

        self.expect(TokenKind::LeftParen)?;
        let mut target_fields = vec![self.parse_dotted_name()?];
        while self.eat(TokenKind::Comma) {
            target_fields.push(self.parse_dotted_name()?);
        }
        self.expect(TokenKind::RightParen)?;

        let source = if self.eat_keyword("values") {
            let mut rows = vec![self.parse_values_row()?];
            while self.eat(TokenKind::Comma) {
                rows.push(self.parse_values_row()?);
            }
            InsertSource::Values(rows)
        } else {
            InsertSource::Query(self.parse_query_expression()?)
        };

        Ok(InsertStatement {
            target,
            target_fields,
            source,
        })
    }

    fn parse_values_row(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect(TokenKind::LeftParen)?;
        let mut values = vec![self.parse_expression()?];
        while self.eat(TokenKind::Comma) {
            values.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RightParen)?;
        Ok(values)
    }

    fn parse_update(&mut self) -> ParseResult<UpdateStatement> {
        self.expect_keyword("update")?;
        let versioned = self.eat_keyword("versioned");
        let target = self.parse_dotted_name()?;
        let alias = self.parse_alias()?;
        self.expect_keyword("set")?;

        let mut assignments = vec![self.parse_assignment()?];
        while self.eat(TokenKind::Comma) {
            assignments.push(self.parse_assignment()?);
        }

        let where_clause = self.parse_where()?;
        Ok(UpdateStatement {
            versioned,
            target,
            alias,
            assignments,
            where_clause,
        })
    }

    fn parse_assignment(&mut self) -> ParseResult<Assignment> {
        let path = self.parse_dotted_name()?;
        self.expect(TokenKind::Equals)?;
        let value = self.parse_expression()?;
        Ok(Assignment { path, value })
    }

    fn parse_delete(&mut self) -> ParseResult<DeleteStatement> {
        self.expect_keyword("delete")?;
        self.eat_keyword("from");
        let target = self.parse_dotted_name()?;
        let alias = self.parse_alias()?;
        let where_clause = self.parse_where()?;
        Ok(DeleteStatement {
            target,
            alias,
            where_clause,
        })
    }

    fn parse_where(&mut self) -> ParseResult<Option<Predicate>> {
        if self.eat_keyword("where") {
            Ok(Some(self.parse_predicate()?))
        } else {
            Ok(None)
        }
    }

    // Queries

    pub fn parse_query_expression(&mut self) -> ParseResult<QueryExpression> {
        let first = self.parse_ordered_query()?;
        let mut rest = Vec::new();
        while let Some(operator) = self.parse_set_operator() {
            rest.push((operator, self.parse_ordered_query()?));
        }
        Ok(QueryExpression { first, rest })
    }

    fn parse_set_operator(&mut self) -> Option<SetOperatorSyntax> {
        let kind = if self.check_keyword("union") {
            SetOperatorKind::Union
        } else if self.check_keyword("intersect") {
            SetOperatorKind::Intersect
        } else if self.check_keyword("except") {
            SetOperatorKind::Except
        } else {
            return None;
        };
        self.advance();
        let all = self.eat_keyword("all");
        Some(SetOperatorSyntax { kind, all })
    }

    fn parse_ordered_query(&mut self) -> ParseResult<OrderedQuery> {
        if self.check(TokenKind::LeftParen) {
            self.advance();
            let expression = self.parse_query_expression()?;
            self.expect(TokenKind::RightParen)?;
            let order = self.parse_query_order()?;
            return Ok(OrderedQuery::Nested {
                expression: Box::new(expression),
                order,
            });
        }

        let query = self.parse_query_spec()?;
        let order = self.parse_query_order()?;
        Ok(OrderedQuery::Spec {
            query: Box::new(query),
            order,
        })
    }

    fn parse_query_spec(&mut self) -> ParseResult<QuerySpec> {
        let start = self.current_span();

        let mut select = None;
        if self.check_keyword("select") {
            select = Some(self.parse_select_clause()?);
        }
        if !self.check_keyword("from") {
            return Err(self
                .error(format!(
                    "expected keyword 'from', found {}",
                    self.describe_current()
                ))
                .with_note("every query needs a from clause"));
        }
        let from = self.parse_from_clause()?;
        let where_clause = self.parse_where()?;

        let mut group_by = Vec::new();
        let mut having = None;
        if self.check_keyword("group") {
            self.advance();
            self.expect_keyword("by")?;
            group_by.push(self.parse_group_by_item()?);
            while self.eat(TokenKind::Comma) {
                group_by.push(self.parse_group_by_item()?);
            }
            if self.eat_keyword("having") {
                having = Some(self.parse_predicate()?);
            }
        }

        if select.is_none() && self.check_keyword("select") {
            select = Some(self.parse_select_clause()?);
        }

        Ok(QuerySpec {
            select,
            from,
            where_clause,
            group_by,
            having,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_select_clause(&mut self) -> ParseResult<SelectClause> {
        self.expect_keyword("select")?;
        let distinct = self.eat_keyword("distinct");
        let mut selections = vec![self.parse_selection()?];
        while self.eat(TokenKind::Comma) {
            selections.push(self.parse_selection()?);
        }
        Ok(SelectClause {
            distinct,
            selections,
        })
    }

    fn parse_selection(&mut self) -> ParseResult<SelectionItem> {
        let selectable = self.parse_selectable()?;
        let alias = self.parse_alias()?;
        Ok(SelectionItem { selectable, alias })
    }

    fn parse_selectable(&mut self) -> ParseResult<Selectable> {
        if self.check_keyword("new") {
            return Ok(Selectable::Instantiation(self.parse_instantiation()?));
        }
        if self.check_keyword("object") && self.peek_at(1) == Some(TokenKind::LeftParen) {
            self.advance();
            self.advance();
            let alias = self.expect_identifier()?;
            self.expect(TokenKind::RightParen)?;
            return Ok(Selectable::Object(alias));
        }
        if self.check_keyword("entry") && self.peek_at(1) == Some(TokenKind::LeftParen) {
            self.advance();
            self.advance();
            let path = self.parse_path()?;
            self.expect(TokenKind::RightParen)?;
            return Ok(Selectable::MapEntry(path));
        }
        Ok(Selectable::Expression(self.parse_expression()?))
    }

    fn parse_instantiation(&mut self) -> ParseResult<Instantiation> {
        let start = self.current_span();
        self.expect_keyword("new")?;

        let target = if (self.check_keyword("list") || self.check_keyword("map"))
            && self.peek_at(1) == Some(TokenKind::LeftParen)
        {
            let token = self.advance();
            if self.token_text(&token).eq_ignore_ascii_case("list") {
                InstantiationTargetSyntax::List
            } else {
                InstantiationTargetSyntax::Map
            }
        } else {
            InstantiationTargetSyntax::Class(self.parse_dotted_name()?)
        };

        self.expect(TokenKind::LeftParen)?;
        let mut arguments = vec![self.parse_instantiation_argument()?];
        while self.eat(TokenKind::Comma) {
            arguments.push(self.parse_instantiation_argument()?);
        }
        self.expect(TokenKind::RightParen)?;

        Ok(Instantiation {
            target,
            arguments,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_instantiation_argument(&mut self) -> ParseResult<InstantiationArgumentSyntax> {
        let selectable = if self.check_keyword("new") {
            Selectable::Instantiation(self.parse_instantiation()?)
        } else {
            Selectable::Expression(self.parse_expression()?)
        };
        let alias = self.parse_alias()?;
        Ok(InstantiationArgumentSyntax { selectable, alias })
    }

    fn parse_from_clause(&mut self) -> ParseResult<FromClause> {
        self.expect_keyword("from")?;
        let mut spaces = vec![self.parse_from_space()?];
        while self.eat(TokenKind::Comma) {
            spaces.push(self.parse_from_space()?);
        }
        Ok(FromClause { spaces })
    }

    fn parse_entity_reference(&mut self) -> ParseResult<EntityReferenceSyntax> {
        let name = self.parse_dotted_name()?;
        let alias = self.parse_alias()?;
        Ok(EntityReferenceSyntax { name, alias })
    }

    fn parse_from_space(&mut self) -> ParseResult<FromSpace> {
        let root = self.parse_entity_reference()?;
        let mut joins = Vec::new();

        loop {
            if self.check(TokenKind::Comma) && self.keyword_at(1, "in") {
                self.advance();
                self.advance();
                self.expect(TokenKind::LeftParen)?;
                let path = self.parse_path()?;
                self.expect(TokenKind::RightParen)?;
                let alias = self.parse_alias()?;
                joins.push(Join::JpaCollection { path, alias });
            } else if self.check_keyword("cross") {
                self.advance();
                self.expect_keyword("join")?;
                joins.push(Join::Cross(self.parse_entity_reference()?));
            } else if let Some(kind) = self.parse_join_kind()? {
                joins.push(Join::Qualified(self.parse_qualified_join(kind)?));
            } else {
                break;
            }
        }

        Ok(FromSpace { root, joins })
    }

    /// Consumes the join-type prefix and `JOIN`, if present.
    fn parse_join_kind(&mut self) -> ParseResult<Option<JoinKind>> {
        let kind = if self.check_keyword("join") {
            JoinKind::Inner
        } else if self.eat_keyword("inner") {
            JoinKind::Inner
        } else if self.eat_keyword("left") {
            self.eat_keyword("outer");
            JoinKind::Left
        } else if self.eat_keyword("right") {
            self.eat_keyword("outer");
            JoinKind::Right
        } else if self.eat_keyword("full") {
            self.eat_keyword("outer");
            JoinKind::Full
        } else if self.eat_keyword("outer") {
            JoinKind::Left
        } else {
            return Ok(None);
        };
        self.expect_keyword("join")?;
        Ok(Some(kind))
    }

    fn parse_qualified_join(&mut self, kind: JoinKind) -> ParseResult<QualifiedJoin> {
        let fetch = self.eat_keyword("fetch");
        let target = self.parse_path()?;
        let alias = self.parse_alias()?;
        let predicate = if self.eat_keyword("on") || self.eat_keyword("with") {
            Some(self.parse_predicate()?)
        } else {
            None
        };
        Ok(QualifiedJoin {
            kind,
            fetch,
            target,
            alias,
            predicate,
        })
    }

    fn parse_group_by_item(&mut self) -> ParseResult<GroupByItem> {
        let key = self.parse_item_key()?;
        let collation = self.parse_collation()?;
        Ok(GroupByItem { key, collation })
    }

    /// Positions and bare identifiers are recognised only when nothing
    /// extends them into a larger expression.
    fn parse_item_key(&mut self) -> ParseResult<ItemKey> {
        let extends = |kind: Option<TokenKind>| {
            matches!(
                kind,
                Some(
                    TokenKind::Dot
                        | TokenKind::LeftParen
                        | TokenKind::LeftBracket
                        | TokenKind::Plus
                        | TokenKind::Minus
                        | TokenKind::Star
                        | TokenKind::Slash
                        | TokenKind::Percent
                        | TokenKind::PipePipe
                )
            )
        };

        if self.check(TokenKind::IntegerLiteral) && !extends(self.peek_at(1)) {
            let token = self.advance();
            return Ok(ItemKey::Position(self.terminal(&token)));
        }
        if let Some(token) = self.current().copied()
            && matches!(
                token.kind,
                TokenKind::Identifier | TokenKind::QuotedIdentifier | TokenKind::SoftKeyword
            )
            && !extends(self.peek_at(1))
            && !self.is_niladic_function_token(&token)
        {
            self.advance();
            return Ok(ItemKey::Identifier(self.ident_from(&token)));
        }
        Ok(ItemKey::Expression(self.parse_expression()?))
    }

    fn parse_collation(&mut self) -> ParseResult<Option<DottedName>> {
        if !self.eat_keyword("collate") {
            return Ok(None);
        }
        if self.check(TokenKind::StringLiteral) {
            let token = self.advance();
            let mut parts: SmallVec<[Ident; 4]> = SmallVec::new();
            parts.push(Ident {
                text: unquote(self.token_text(&token)),
                span: token.span,
                keyword: false,
            });
            return Ok(Some(DottedName { parts }));
        }
        Ok(Some(self.parse_dotted_name()?))
    }

    fn parse_query_order(&mut self) -> ParseResult<Option<QueryOrder>> {
        let mut clauses = Vec::new();

        if self.check_keyword("order") {
            self.advance();
            self.expect_keyword("by")?;
            let mut items = vec![self.parse_sort_item()?];
            while self.eat(TokenKind::Comma) {
                items.push(self.parse_sort_item()?);
            }
            clauses.push(TailClause::OrderBy(items));
        }
        if self.eat_keyword("limit") {
            clauses.push(TailClause::Limit(self.parse_expression()?));
        }
        if self.eat_keyword("offset") {
            clauses.push(TailClause::Offset(self.parse_expression()?));
            if !self.eat_keyword("rows") {
                self.eat_keyword("row");
            }
        }
        if self.check_keyword("fetch") {
            clauses.push(TailClause::Fetch(self.parse_fetch_clause()?));
        }

        if clauses.is_empty() {
            Ok(None)
        } else {
            Ok(Some(QueryOrder { clauses }))
        }
    }

    fn parse_sort_item(&mut self) -> ParseResult<SortItem> {
        let key = self.parse_item_key()?;
        let collation = self.parse_collation()?;
        let direction = if self.eat_keyword("asc") {
            Some(SortDirectionSyntax::Asc)
        } else if self.eat_keyword("desc") {
            Some(SortDirectionSyntax::Desc)
        } else {
            None
        };
        let nulls = if self.eat_keyword("nulls") {
            if self.eat_keyword("first") {
                Some(NullsSyntax::First)
            } else {
                self.expect_keyword("last")?;
                Some(NullsSyntax::Last)
            }
        } else {
            None
        };
        Ok(SortItem {
            key,
            collation,
            direction,
            nulls,
        })
    }

    fn parse_fetch_clause(&mut self) -> ParseResult<FetchClause> {
        let start = self.current_span();
        self.expect_keyword("fetch")?;
        if !self.eat_keyword("first") {
            self.expect_keyword("next")?;
        }
        let count = self.parse_expression()?;
        let percent = self.eat_keyword("percent");
        if !self.eat_keyword("rows") {
            self.expect_keyword("row")?;
        }
        let with_ties = if self.eat_keyword("with") {
            self.expect_keyword("ties")?;
            true
        } else {
            self.expect_keyword("only")?;
            false
        };
        Ok(FetchClause {
            count,
            percent,
            with_ties,
            span: start.merge(self.previous_span()),
        })
    }

    // Paths

    fn parse_path(&mut self) -> ParseResult<Path> {
        let start = self.current_span();
        let opens_call = self.peek_at(1) == Some(TokenKind::LeftParen);

        if opens_call && self.check_keyword("treat") {
            self.advance();
            self.advance();
            let base = self.parse_path()?;
            self.expect_keyword("as")?;
            let target = self.parse_dotted_name()?;
            self.expect(TokenKind::RightParen)?;
            let continuation = self.parse_continuation()?;
            return Ok(Path::Treated {
                base: Box::new(base),
                target,
                continuation,
                span: start.merge(self.previous_span()),
            });
        }

        if opens_call
            && (self.check_keyword("value")
                || self.check_keyword("element")
                || self.check_keyword("elements"))
        {
            self.advance();
            self.advance();
            let base = self.parse_path()?;
            self.expect(TokenKind::RightParen)?;
            let continuation = self.parse_continuation()?;
            return Ok(Path::CollectionValue {
                base: Box::new(base),
                continuation,
                span: start.merge(self.previous_span()),
            });
        }

        if opens_call && self.check_keyword("key") {
            self.advance();
            self.advance();
            let base = self.parse_path()?;
            self.expect(TokenKind::RightParen)?;
            let continuation = self.parse_continuation()?;
            return Ok(Path::MapKey {
                base: Box::new(base),
                continuation,
                span: start.merge(self.previous_span()),
            });
        }

        let name = self.parse_dotted_name()?;
        if self.eat(TokenKind::LeftBracket) {
            let index = self.parse_expression()?;
            self.expect(TokenKind::RightBracket)?;
            let continuation = self.parse_continuation()?;
            return Ok(Path::Indexed {
                base: name,
                index: Box::new(index),
                continuation,
                span: start.merge(self.previous_span()),
            });
        }
        Ok(Path::Simple(name))
    }

    // Predicates

    pub fn parse_predicate(&mut self) -> ParseResult<Predicate> {
        self.parse_or_predicate()
    }

    fn parse_or_predicate(&mut self) -> ParseResult<Predicate> {
        let mut lhs = self.parse_and_predicate()?;
        while self.eat_keyword("or") {
            let rhs = self.parse_and_predicate()?;
            lhs = Predicate::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and_predicate(&mut self) -> ParseResult<Predicate> {
        let mut lhs = self.parse_not_predicate()?;
        while self.eat_keyword("and") {
            let rhs = self.parse_not_predicate()?;
            lhs = Predicate::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not_predicate(&mut self) -> ParseResult<Predicate> {
        if self.eat_keyword("not") {
            let inner = self.parse_not_predicate()?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        self.parse_primary_predicate()
    }

    /// Whether the current token continues an expression or starts a
    /// predicate suffix, so a parenthesized group must be an expression.
    fn continues_expression(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                TokenKind::Plus
                    | TokenKind::Minus
                    | TokenKind::Star
                    | TokenKind::Slash
                    | TokenKind::Percent
                    | TokenKind::PipePipe
                    | TokenKind::Equals
                    | TokenKind::NotEqual
                    | TokenKind::LessThan
                    | TokenKind::LessEqual
                    | TokenKind::GreaterThan
                    | TokenKind::GreaterEqual
            )
        ) || ["is", "in", "between", "like", "ilike", "member", "collate", "by"]
            .iter()
            .any(|kw| self.check_keyword(kw))
            || (self.check_keyword("not")
                && ["in", "between", "like", "ilike", "member"]
                    .iter()
                    .any(|kw| self.keyword_at(1, kw)))
            || DURATION_UNITS.iter().any(|unit| self.check_word(unit))
    }

    fn parse_primary_predicate(&mut self) -> ParseResult<Predicate> {
        if self.eat_keyword("exists") {
            let expression = self.parse_expression()?;
            return Ok(Predicate::Exists {
                expression,
                negated: false,
            });
        }

        if self.check(TokenKind::LeftParen) && !self.at_query_start(1) {
            let saved = self.pos;
            self.advance();
            if let Ok(inner) = self.parse_predicate()
                && !matches!(inner, Predicate::Expression(_))
                && self.eat(TokenKind::RightParen)
                && !self.continues_expression()
            {
                return Ok(Predicate::Grouped(Box::new(inner)));
            }
            self.pos = saved;
        }

        let lhs = self.parse_expression()?;
        self.parse_predicate_suffix(lhs)
    }

    fn parse_predicate_suffix(&mut self, lhs: Expression) -> ParseResult<Predicate> {
        let start = self.current_span();

        if self.eat_keyword("is") {
            let negated = self.eat_keyword("not");
            if self.eat_keyword("null") {
                return Ok(Predicate::IsNull {
                    expression: lhs,
                    negated,
                });
            }
            if self.eat_keyword("empty") {
                return Ok(Predicate::IsEmpty {
                    expression: lhs,
                    negated,
                });
            }
            if self.eat_keyword("distinct") {
                self.expect_keyword("from")?;
                let rhs = self.parse_expression()?;
                return Ok(Predicate::Comparison {
                    lhs,
                    operator: if negated {
                        ComparisonSymbol::IsNotDistinctFrom
                    } else {
                        ComparisonSymbol::IsDistinctFrom
                    },
                    rhs,
                    span: start.merge(self.previous_span()),
                });
            }
            return Err(self.error(format!(
                "expected null, empty or distinct from after 'is', found {}",
                self.describe_current()
            )));
        }

        let negated = if self.check_keyword("not")
            && ["between", "like", "ilike", "in", "member"]
                .iter()
                .any(|kw| self.keyword_at(1, kw))
        {
            self.advance();
            true
        } else {
            false
        };

        if self.eat_keyword("between") {
            let lower = self.parse_expression()?;
            self.expect_keyword("and")?;
            let upper = self.parse_expression()?;
            return Ok(Predicate::Between {
                expression: lhs,
                lower,
                upper,
                negated,
            });
        }

        if self.check_keyword("like") || self.check_keyword("ilike") {
            let case_insensitive = self.check_keyword("ilike");
            self.advance();
            let pattern = self.parse_expression()?;
            let escape = if self.eat_keyword("escape") {
                Some(self.parse_expression()?)
            } else {
                None
            };
            return Ok(Predicate::Like {
                matched: lhs,
                pattern,
                escape,
                negated,
                case_insensitive,
            });
        }

        if self.eat_keyword("in") {
            let list = self.parse_in_list()?;
            return Ok(Predicate::In {
                test: lhs,
                list,
                negated,
            });
        }

        if self.eat_keyword("member") {
            self.eat_keyword("of");
            let path = self.parse_path()?;
            return Ok(Predicate::MemberOf {
                expression: lhs,
                path,
                negated,
            });
        }

        let symbol = match self.peek() {
            Some(
                kind @ (TokenKind::Equals
                | TokenKind::NotEqual
                | TokenKind::LessThan
                | TokenKind::LessEqual
                | TokenKind::GreaterThan
                | TokenKind::GreaterEqual),
            ) => Some(ComparisonSymbol::Token(kind)),
            _ => None,
        };
        if let Some(operator) = symbol {
            self.advance();
            let rhs = self.parse_expression()?;
            return Ok(Predicate::Comparison {
                lhs,
                operator,
                rhs,
                span: start.merge(self.previous_span()),
            });
        }

        Ok(Predicate::Expression(lhs))
    }

    fn parse_in_list(&mut self) -> ParseResult<InListSyntax> {
        if let Some(parameter) = self.parse_parameter() {
            return Ok(InListSyntax::Parameter(parameter));
        }
        self.expect(TokenKind::LeftParen)?;
        if self.at_query_start(0) {
            let query = self.parse_query_expression()?;
            self.expect(TokenKind::RightParen)?;
            return Ok(InListSyntax::Subquery(Box::new(query)));
        }
        let mut items = vec![self.parse_expression()?];
        while self.eat(TokenKind::Comma) {
            items.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RightParen)?;
        Ok(InListSyntax::Explicit(items))
    }

    // Expressions

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_concat()
    }

    fn parse_concat(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_additive()?;
        while self.eat(TokenKind::PipePipe) {
            let rhs = self.parse_additive()?;
            lhs = Expression::Concat(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_multiplicative()?;
        while matches!(self.peek(), Some(TokenKind::Plus | TokenKind::Minus)) {
            let token = self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expression::Binary {
                lhs: Box::new(lhs),
                operator: self.terminal(&token),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_duration()?;
        while matches!(
            self.peek(),
            Some(TokenKind::Star | TokenKind::Slash | TokenKind::Percent)
        ) {
            let token = self.advance();
            let rhs = self.parse_duration()?;
            lhs = Expression::Binary {
                lhs: Box::new(lhs),
                operator: self.terminal(&token),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_duration(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_unary()?;
        loop {
            if DURATION_UNITS.iter().any(|unit| self.check_word(unit)) {
                let unit = self.expect_any_word()?;
                expression = Expression::ToDuration {
                    magnitude: Box::new(expression),
                    unit,
                };
            } else if self.check_keyword("by") && self.peek_at(1).is_some_and(TokenKind::is_word) {
                self.advance();
                let unit = self.expect_any_word()?;
                expression = Expression::FromDuration {
                    duration: Box::new(expression),
                    unit,
                };
            } else {
                return Ok(expression);
            }
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        if matches!(self.peek(), Some(TokenKind::Plus | TokenKind::Minus)) {
            let token = self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expression::Unary {
                operator: self.terminal(&token),
                operand: Box::new(operand),
            });
        }
        let primary = self.parse_primary()?;
        if let Some(collation) = self.parse_collation()? {
            return Ok(Expression::Collate {
                expression: Box::new(primary),
                collation,
            });
        }
        Ok(primary)
    }

    fn parse_parameter(&mut self) -> Option<ParameterSyntax> {
        let token = *self.current()?;
        let text = self.token_text(&token);
        match token.kind {
            TokenKind::NamedParam => {
                self.advance();
                Some(ParameterSyntax::Named {
                    name: text[1..].to_string(),
                    span: token.span,
                })
            }
            TokenKind::PositionalParam => {
                self.advance();
                Some(ParameterSyntax::Positional {
                    position: (text.len() > 1).then(|| text[1..].to_string()),
                    span: token.span,
                })
            }
            _ => None,
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        if let Some(parameter) = self.parse_parameter() {
            return Ok(Expression::Parameter(parameter));
        }

        let Some(token) = self.current().copied() else {
            return Err(self.error("expected expression, but reached end of input"));
        };

        match token.kind {
            TokenKind::LeftParen => self.parse_parenthesized(),
            TokenKind::LeftBrace => Ok(Expression::Literal(self.parse_brace_literal()?)),
            TokenKind::StringLiteral => {
                self.advance();
                Ok(Expression::Literal(Literal::String(
                    self.string_terminal(&token),
                )))
            }
            TokenKind::IntegerLiteral
            | TokenKind::LongLiteral
            | TokenKind::BigIntegerLiteral
            | TokenKind::FloatLiteral
            | TokenKind::DoubleLiteral
            | TokenKind::BigDecimalLiteral
            | TokenKind::HexLiteral => {
                self.advance();
                Ok(Expression::Literal(Literal::Numeric(self.terminal(&token))))
            }
            TokenKind::BinaryLiteral => {
                self.advance();
                let raw = self.token_text(&token);
                Ok(Expression::Literal(Literal::BinaryHex(Terminal {
                    kind: token.kind,
                    text: raw[2..raw.len() - 1].to_string(),
                    span: token.span,
                })))
            }
            TokenKind::Keyword => self.parse_keyword_primary(token),
            TokenKind::SoftKeyword | TokenKind::Identifier | TokenKind::QuotedIdentifier => {
                self.parse_word_primary(token)
            }
            TokenKind::Error => Err(self.error(format!(
                "unrecognized input {}",
                self.describe_current()
            ))),
            _ => Err(self.error(format!(
                "expected expression, found {}",
                self.describe_current()
            ))),
        }
    }

    fn parse_keyword_primary(&mut self, token: Token) -> ParseResult<Expression> {
        let text = self.token_text(&token).to_ascii_lowercase();
        match text.as_str() {
            "null" => {
                self.advance();
                Ok(Expression::Literal(Literal::Null(token.span)))
            }
            "true" | "false" => {
                self.advance();
                Ok(Expression::Literal(Literal::Boolean(
                    text == "true",
                    token.span,
                )))
            }
            "case" => self.parse_case(),
            "all" if self.peek_at(1) == Some(TokenKind::LeftParen) => {
                self.parse_function_call()
            }
            _ => Err(self.error(format!(
                "expected expression, found keyword '{}'",
                self.token_text(&token)
            ))),
        }
    }

    fn parse_word_primary(&mut self, token: Token) -> ParseResult<Expression> {
        let name = self.token_text(&token).to_ascii_lowercase();
        let opens_call = self.peek_at(1) == Some(TokenKind::LeftParen);

        if !opens_call {
            if NILADIC_FUNCTIONS.contains(&name.as_str())
                && self.peek_at(1) != Some(TokenKind::Dot)
            {
                self.advance();
                return Ok(Expression::Function(FunctionCallSyntax {
                    name: self.ident_from(&token),
                    distinct: false,
                    arguments: FunctionArguments::List(Vec::new()),
                    filter: None,
                    span: token.span,
                }));
            }
            return Ok(Expression::Path(self.parse_path()?));
        }

        if token.kind == TokenKind::SoftKeyword {
            match name.as_str() {
                "treat" | "key" | "value" | "element" | "elements" => {
                    return Ok(Expression::Path(self.parse_path()?));
                }
                "cast" => return self.parse_cast(),
                "extract" => return self.parse_extract(),
                "format" => return self.parse_format(),
                "trim" => return self.parse_trim(),
                "pad" => return self.parse_pad(),
                "position" => return self.parse_position(),
                "type" => return self.parse_entity_type(),
                "id" => return self.parse_entity_reference_function(EntityReferenceFunction::Id),
                "version" => {
                    return self.parse_entity_reference_function(EntityReferenceFunction::Version);
                }
                "naturalid" => {
                    return self
                        .parse_entity_reference_function(EntityReferenceFunction::NaturalId);
                }
                "size" => return self.parse_collection_function(CollectionFunctionKind::Size),
                "index" => return self.parse_collection_function(CollectionFunctionKind::Index),
                "maxelement" => {
                    return self.parse_collection_function(CollectionFunctionKind::MaxElement);
                }
                "minelement" => {
                    return self.parse_collection_function(CollectionFunctionKind::MinElement);
                }
                "maxindex" => {
                    return self.parse_collection_function(CollectionFunctionKind::MaxIndex);
                }
                "minindex" => {
                    return self.parse_collection_function(CollectionFunctionKind::MinIndex);
                }
                "cube" => return self.parse_summarization(SummarizationSyntax::Cube),
                "rollup" => return self.parse_summarization(SummarizationSyntax::Rollup),
                _ => {}
            }
        }

        if name == "function" && self.peek_at(2) == Some(TokenKind::StringLiteral) {
            return self.parse_jpa_function();
        }

        self.parse_function_call()
    }

    fn parse_parenthesized(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        self.expect(TokenKind::LeftParen)?;

        if self.at_query_start(0) {
            let query = self.parse_query_expression()?;
            self.expect(TokenKind::RightParen)?;
            return Ok(Expression::Subquery(
                Box::new(query),
                start.merge(self.previous_span()),
            ));
        }

        let first = self.parse_expression()?;
        if self.check(TokenKind::Comma) {
            let mut items = vec![first];
            while self.eat(TokenKind::Comma) {
                items.push(self.parse_expression()?);
            }
            self.expect(TokenKind::RightParen)?;
            return Ok(Expression::Tuple(items, start.merge(self.previous_span())));
        }
        self.expect(TokenKind::RightParen)?;
        Ok(Expression::Grouped(Box::new(first)))
    }

    fn parse_case(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        self.expect_keyword("case")?;

        if self.check_keyword("when") {
            let mut whens = Vec::new();
            while self.eat_keyword("when") {
                let predicate = self.parse_predicate()?;
                self.expect_keyword("then")?;
                let result = self.parse_expression()?;
                whens.push((predicate, result));
            }
            let otherwise = self.parse_case_else()?;
            return Ok(Expression::SearchedCase {
                whens,
                otherwise,
                span: start.merge(self.previous_span()),
            });
        }

        let operand = self.parse_expression()?;
        let mut whens = Vec::new();
        while self.eat_keyword("when") {
            let value = self.parse_expression()?;
            self.expect_keyword("then")?;
            let result = self.parse_expression()?;
            whens.push((value, result));
        }
        if whens.is_empty() {
            return Err(self.error("expected at least one 'when' branch in case expression"));
        }
        let otherwise = self.parse_case_else()?;
        Ok(Expression::SimpleCase {
            operand: Box::new(operand),
            whens,
            otherwise,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_case_else(&mut self) -> ParseResult<Option<Box<Expression>>> {
        let otherwise = if self.eat_keyword("else") {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect_keyword("end")?;
        Ok(otherwise)
    }

    fn parse_function_call(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        let name_token = self.advance();
        let name = self.ident_from(&name_token);
        self.expect(TokenKind::LeftParen)?;

        let mut distinct = false;
        let arguments = if self.eat(TokenKind::Star) {
            FunctionArguments::Star
        } else if self.check(TokenKind::RightParen) {
            FunctionArguments::List(Vec::new())
        } else {
            distinct = self.eat_keyword("distinct");
            let mut arguments = vec![self.parse_argument()?];
            while self.eat(TokenKind::Comma) {
                arguments.push(self.parse_argument()?);
            }
            FunctionArguments::List(arguments)
        };
        self.expect(TokenKind::RightParen)?;

        let filter = if self.check_keyword("filter") && self.peek_at(1) == Some(TokenKind::LeftParen)
        {
            self.advance();
            self.advance();
            self.expect_keyword("where")?;
            let predicate = self.parse_predicate()?;
            self.expect(TokenKind::RightParen)?;
            Some(Box::new(predicate))
        } else {
            None
        };

        Ok(Expression::Function(FunctionCallSyntax {
            name,
            distinct,
            arguments,
            filter,
            span: start.merge(self.previous_span()),
        }))
    }

    fn parse_argument(&mut self) -> ParseResult<Argument> {
        if self.at_query_start(0) {
            let start = self.current_span();
            let query = self.parse_query_expression()?;
            return Ok(Argument::Expression(Expression::Subquery(
                Box::new(query),
                start.merge(self.previous_span()),
            )));
        }
        match self.parse_predicate()? {
            Predicate::Expression(expression) => Ok(Argument::Expression(expression)),
            predicate => Ok(Argument::Predicate(predicate)),
        }
    }

    fn parse_jpa_function(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance(); // function
        self.expect(TokenKind::LeftParen)?;
        let name = self.expect_string()?;
        let mut arguments = Vec::new();
        while self.eat(TokenKind::Comma) {
            arguments.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RightParen)?;
        Ok(Expression::JpaFunction {
            name,
            arguments,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_cast(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let expression = self.parse_expression()?;
        self.expect_keyword("as")?;

        let mut name = self.expect_any_word()?;
        while self.check(TokenKind::Dot) {
            self.advance();
            let part = self.expect_any_word()?;
            name.text.push('.');
            name.text.push_str(&part.text);
            name.span = name.span.merge(part.span);
        }

        let mut parameters = Vec::new();
        if self.eat(TokenKind::LeftParen) {
            let token = self.expect(TokenKind::IntegerLiteral)?;
            parameters.push(self.terminal(&token));
            if self.eat(TokenKind::Comma) {
                let token = self.expect(TokenKind::IntegerLiteral)?;
                parameters.push(self.terminal(&token));
            }
            self.expect(TokenKind::RightParen)?;
        }
        self.expect(TokenKind::RightParen)?;

        Ok(Expression::Cast {
            expression: Box::new(expression),
            target: CastTargetSyntax { name, parameters },
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_extract(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen)?;

        let mut field = self.expect_any_word()?;
        // `day of week`, `week of year` ...
        if self.eat_keyword("of") {
            let of = self.expect_any_word()?;
            field.text = format!("{}_of_{}", field.text, of.text);
            field.span = field.span.merge(of.span);
        }
        self.expect_keyword("from")?;
        let argument = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;

        Ok(Expression::Extract {
            field,
            argument: Box::new(argument),
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_format(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let expression = self.parse_expression()?;
        self.expect_keyword("as")?;
        let pattern = self.expect_string()?;
        self.expect(TokenKind::RightParen)?;
        Ok(Expression::Format {
            expression: Box::new(expression),
            pattern,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_trim_spec(&mut self) -> Option<TrimSpec> {
        if self.eat_keyword("leading") {
            Some(TrimSpec::Leading)
        } else if self.eat_keyword("trailing") {
            Some(TrimSpec::Trailing)
        } else if self.eat_keyword("both") {
            Some(TrimSpec::Both)
        } else {
            None
        }
    }

    fn parse_trim(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen)?;

        let specification = self.parse_trim_spec();
        let character = if self.check(TokenKind::StringLiteral)
            && (specification.is_some() || self.keyword_at(1, "from"))
        {
            Some(self.expect_string()?)
        } else {
            None
        };
        if specification.is_some() || character.is_some() {
            self.expect_keyword("from")?;
        } else {
            self.eat_keyword("from");
        }
        let argument = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;

        Ok(Expression::Trim {
            specification,
            character,
            argument: Box::new(argument),
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_pad(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let argument = self.parse_expression()?;
        self.expect_keyword("with")?;
        let length = self.parse_expression()?;
        let specification = match self.parse_trim_spec() {
            Some(spec @ (TrimSpec::Leading | TrimSpec::Trailing)) => spec,
            _ => return Err(self.error("expected 'leading' or 'trailing' in pad function")),
        };
        let character = if self.check(TokenKind::StringLiteral) {
            Some(self.expect_string()?)
        } else {
            None
        };
        self.expect(TokenKind::RightParen)?;

        Ok(Expression::Pad {
            argument: Box::new(argument),
            length: Box::new(length),
            specification,
            character,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_position(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let pattern = self.parse_expression()?;
        self.expect_keyword("in")?;
        let string = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;
        Ok(Expression::Position {
            pattern: Box::new(pattern),
            string: Box::new(string),
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_entity_type(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let argument = match self.parse_parameter() {
            Some(parameter) => EntityTypeArgument::Parameter(parameter),
            None => EntityTypeArgument::Path(self.parse_path()?),
        };
        self.expect(TokenKind::RightParen)?;
        Ok(Expression::EntityType(
            argument,
            start.merge(self.previous_span()),
        ))
    }

    fn parse_entity_reference_function(
        &mut self,
        function: EntityReferenceFunction,
    ) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let path = self.parse_path()?;
        self.expect(TokenKind::RightParen)?;
        let continuation = self.parse_continuation()?;
        Ok(Expression::EntityReference {
            function,
            path,
            continuation,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_collection_function(&mut self, kind: CollectionFunctionKind) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let path = self.parse_path()?;
        self.expect(TokenKind::RightParen)?;
        Ok(Expression::CollectionFunction {
            kind,
            path,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_summarization(&mut self, kind: SummarizationSyntax) -> ParseResult<Expression> {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let mut expressions = vec![self.parse_expression()?];
        while self.eat(TokenKind::Comma) {
            expressions.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RightParen)?;
        Ok(Expression::Summarization {
            kind,
            expressions,
            span: start.merge(self.previous_span()),
        })
    }

    // Brace literals

    fn parse_brace_literal(&mut self) -> ParseResult<Literal> {
        let start = self.current_span();
        self.expect(TokenKind::LeftBrace)?;

        // {d '..'} / {t '..'} / {ts '..'}
        if self.check(TokenKind::Identifier) && self.peek_at(1) == Some(TokenKind::StringLiteral) {
            let marker = self.advance();
            let kind = match self.token_text(&marker).to_ascii_lowercase().as_str() {
                "d" => JdbcEscapeKind::Date,
                "t" => JdbcEscapeKind::Time,
                "ts" => JdbcEscapeKind::Timestamp,
                other => {
                    return Err(Diagnostic::error(
                        format!("unknown escape '{}', expected d, t or ts", other),
                        marker.span,
                    ));
                }
            };
            let text = self.expect_string()?;
            self.expect(TokenKind::RightBrace)?;
            return Ok(Literal::JdbcEscape { kind, text });
        }

        // {0x0A, 0x1B, ..}
        if self.check(TokenKind::HexLiteral) {
            let mut bytes = Vec::new();
            loop {
                let token = self.expect(TokenKind::HexLiteral)?;
                bytes.push(self.terminal(&token));
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RightBrace)?;
            return Ok(Literal::BinaryBytes(bytes, start.merge(self.previous_span())));
        }

        let date = if self.peek_at(1) == Some(TokenKind::Minus) {
            Some(self.parse_date_text()?)
        } else {
            None
        };
        let time = if self.check(TokenKind::IntegerLiteral) && self.peek_at(1) == Some(TokenKind::Colon)
        {
            Some(self.parse_time_text()?)
        } else {
            None
        };
        if date.is_none() && time.is_none() {
            return Err(self
                .error(format!(
                    "expected a date, time or escape literal, found {}",
                    self.describe_current()
                ))
                .with_note("date literals look like {2020-01-31}, times like {12:30:00}"));
        }

        let zone = if time.is_some() && !self.check(TokenKind::RightBrace) {
            let zone_start = self.current_span().start as usize;
            while !self.check(TokenKind::RightBrace) {
                if self.is_at_end() {
                    return Err(self.error("unterminated date-time literal, expected '}'"));
                }
                self.advance();
            }
            let zone_end = self.previous_span().end as usize;
            Some(self.source[zone_start..zone_end].trim().to_string())
        } else {
            None
        };
        self.expect(TokenKind::RightBrace)?;

        Ok(Literal::Temporal {
            date,
            time,
            zone,
            span: start.merge(self.previous_span()),
        })
    }

    /// `yyyy-mm-dd`
    fn parse_date_text(&mut self) -> ParseResult<String> {
        let start = self.expect(TokenKind::IntegerLiteral)?.span;
        self.expect(TokenKind::Minus)?;
        self.expect(TokenKind::IntegerLiteral)?;
        self.expect(TokenKind::Minus)?;
        let end = self.expect(TokenKind::IntegerLiteral)?.span;
        Ok(self.source[start.merge(end).as_range()].to_string())
    }

    /// `hh:mm[:ss[.fff]]`
    fn parse_time_text(&mut self) -> ParseResult<String> {
        let start = self.expect(TokenKind::IntegerLiteral)?.span;
        self.expect(TokenKind::Colon)?;
        let mut end = self.expect(TokenKind::IntegerLiteral)?.span;
        if self.eat(TokenKind::Colon) {
            end = match self.peek() {
                Some(TokenKind::IntegerLiteral | TokenKind::FloatLiteral) => self.advance().span,
                _ => {
                    return Err(self.error(format!(
                        "expected seconds, found {}",
                        self.describe_current()
                    )));
                }
            };
        }
        Ok(self.source[start.merge(end).as_range()].to_string())
    }
}

/// Strips the quotes of a string literal and collapses doubled quotes.
fn unquote(raw: &str) -> String {
    let Some(quote) = raw.chars().next() else {
        return String::new();
    };
    let inner = raw
        .strip_prefix(quote)
        .and_then(|rest| rest.strip_suffix(quote))
        .unwrap_or(raw);
    inner.replace(&format!("{quote}{quote}"), &quote.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hql::lexer::lex;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> ParseResult<Statement> {
        let tokens = lex(source);
        Parser::new(&tokens, source).parse_statement()
    }

    fn parse_query_spec(source: &str) -> QuerySpec {
        match parse(source).unwrap() {
            Statement::Select(QueryExpression {
                first: OrderedQuery::Spec { query, .. },
                ..
            }) => *query,
            other => panic!("Expected simple select, got {:?}", other),
        }
    }

    fn parse_where(source: &str) -> Predicate {
        parse_query_spec(source).where_clause.unwrap()
    }

    #[test]
    fn test_simple_select() {
        let spec = parse_query_spec("select a from Animal a");
        let select = spec.select.unwrap();
        assert_eq!(select.selections.len(), 1);
        assert_eq!(spec.from.spaces.len(), 1);
        let root = &spec.from.spaces[0].root;
        assert_eq!(root.name.text(), "Animal");
        assert_eq!(root.alias.as_ref().unwrap().ident.text, "a");
        assert!(!root.alias.as_ref().unwrap().explicit);
    }

    #[test]
    fn test_from_first_with_trailing_select() {
        let spec = parse_query_spec("from Animal a where a.weight > 1 select a.name");
        assert!(spec.select.is_some());
        assert!(spec.where_clause.is_some());
    }

    #[test]
    fn test_implicit_select() {
        let spec = parse_query_spec("from Animal");
        assert!(spec.select.is_none());
        assert!(spec.from.spaces[0].root.alias.is_none());
    }

    #[test]
    fn test_joins() {
        let spec = parse_query_spec(
            "select a from Animal a left join fetch a.mother m inner join a.offspring o \
             with o.weight > 1 cross join Person p, in(a.offspring) c",
        );
        let joins = &spec.from.spaces[0].joins;
        assert_eq!(joins.len(), 4);
        match &joins[0] {
            Join::Qualified(join) => {
                assert_eq!(join.kind, JoinKind::Left);
                assert!(join.fetch);
                assert_eq!(join.alias.as_ref().unwrap().ident.text, "m");
            }
            other => panic!("Expected qualified join, got {:?}", other),
        }
        assert!(matches!(&joins[1], Join::Qualified(join) if join.predicate.is_some()));
        assert!(matches!(&joins[2], Join::Cross(_)));
        assert!(matches!(&joins[3], Join::JpaCollection { .. }));
    }

    #[test]
    fn test_reserved_alias_requires_as() {
        let spec = parse_query_spec("select a from Animal as order");
        let alias = spec.from.spaces[0].root.alias.clone().unwrap();
        assert!(alias.explicit);
        assert!(alias.ident.keyword);
    }

    #[test]
    fn test_comparison_and_null() {
        match parse_where("from Animal a where a.weight >= 10") {
            Predicate::Comparison { operator, .. } => {
                assert_eq!(operator, ComparisonSymbol::Token(TokenKind::GreaterEqual))
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
        assert!(matches!(
            parse_where("from Animal a where a.name is not null"),
            Predicate::IsNull { negated: true, .. }
        ));
        assert!(matches!(
            parse_where("from Animal a where a.name is not distinct from 'x'"),
            Predicate::Comparison {
                operator: ComparisonSymbol::IsNotDistinctFrom,
                ..
            }
        ));
    }

    #[test]
    fn test_predicate_precedence() {
        match parse_where("from Animal a where a.x = 1 or a.y = 2 and not a.z = 3") {
            Predicate::Or(_, rhs) => match *rhs {
                Predicate::And(_, not) => assert!(matches!(*not, Predicate::Not(_))),
                other => panic!("Expected and, got {:?}", other),
            },
            other => panic!("Expected or, got {:?}", other),
        }
    }

    #[test]
    fn test_grouped_predicate_vs_grouped_expression() {
        assert!(matches!(
            parse_where("from Animal a where (a.x = 1 or a.y = 2) and a.z = 3"),
            Predicate::And(lhs, _) if matches!(*lhs, Predicate::Grouped(_))
        ));
        match parse_where("from Animal a where (a.x + 1) * 2 > 3") {
            Predicate::Comparison { lhs, .. } => {
                assert!(matches!(lhs, Expression::Binary { .. }))
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_in_forms() {
        assert!(matches!(
            parse_where("from Animal a where a.id in (1, 2, 3)"),
            Predicate::In { list: InListSyntax::Explicit(items), negated: false, .. } if items.len() == 3
        ));
        assert!(matches!(
            parse_where("from Animal a where a.id not in :ids"),
            Predicate::In {
                list: InListSyntax::Parameter(_),
                negated: true,
                ..
            }
        ));
        assert!(matches!(
            parse_where("from Animal a where a.id in (select b.id from Animal b)"),
            Predicate::In {
                list: InListSyntax::Subquery(_),
                ..
            }
        ));
    }

    #[test]
    fn test_between_like_member() {
        assert!(matches!(
            parse_where("from Animal a where a.weight between 1 and 10"),
            Predicate::Between { negated: false, .. }
        ));
        assert!(matches!(
            parse_where("from Animal a where a.name not like 'F%' escape '!'"),
            Predicate::Like { negated: true, escape: Some(_), .. }
        ));
        assert!(matches!(
            parse_where("from Animal a where :kid member of a.offspring"),
            Predicate::MemberOf { .. }
        ));
    }

    #[test]
    fn test_query_order_tail() {
        let statement =
            parse("select a from Animal a order by a.name desc nulls last, 2 limit 10 offset 5")
                .unwrap();
        let Statement::Select(QueryExpression {
            first: OrderedQuery::Spec { order, .. },
            ..
        }) = statement
        else {
            panic!("Expected select");
        };
        let clauses = order.unwrap().clauses;
        assert_eq!(clauses.len(), 3);
        match &clauses[0] {
            TailClause::OrderBy(items) => {
                assert_eq!(items[0].direction, Some(SortDirectionSyntax::Desc));
                assert_eq!(items[0].nulls, Some(NullsSyntax::Last));
                assert!(matches!(items[1].key, ItemKey::Position(_)));
            }
            other => panic!("Expected order by, got {:?}", other),
        }
        assert!(matches!(clauses[1], TailClause::Limit(_)));
        assert!(matches!(clauses[2], TailClause::Offset(_)));
    }

    #[test]
    fn test_fetch_clause_flags() {
        let statement =
            parse("select a from Animal a order by 1 fetch first 10 percent rows with ties").unwrap();
        let Statement::Select(QueryExpression {
            first: OrderedQuery::Spec { order, .. },
            ..
        }) = statement
        else {
            panic!("Expected select");
        };
        match order.unwrap().clauses.pop() {
            Some(TailClause::Fetch(fetch)) => {
                assert!(fetch.percent);
                assert!(fetch.with_ties);
            }
            other => panic!("Expected fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_set_operations() {
        let statement =
            parse("select a.id from Animal a union all select p.id from Person p except select 1 from Animal x")
                .unwrap();
        let Statement::Select(expression) = statement else {
            panic!("Expected select");
        };
        assert_eq!(expression.rest.len(), 2);
        assert_eq!(
            expression.rest[0].0,
            SetOperatorSyntax {
                kind: SetOperatorKind::Union,
                all: true
            }
        );
        assert_eq!(expression.rest[1].0.kind, SetOperatorKind::Except);
    }

    #[test]
    fn test_paths() {
        let spec = parse_query_spec(
            "select treat(a.mother as Dog).name, key(p.addresses), a.offspring[0].name from Animal a, Person p",
        );
        let selections = spec.select.unwrap().selections;
        assert!(matches!(
            &selections[0].selectable,
            Selectable::Expression(Expression::Path(Path::Treated { continuation: Some(_), .. }))
        ));
        assert!(matches!(
            &selections[1].selectable,
            Selectable::Expression(Expression::Path(Path::MapKey { .. }))
        ));
        assert!(matches!(
            &selections[2].selectable,
            Selectable::Expression(Expression::Path(Path::Indexed { continuation: Some(_), .. }))
        ));
    }

    #[test]
    fn test_functions() {
        let spec = parse_query_spec(
            "select count(distinct a.name), count(*), sum(a.weight) filter (where a.weight > 1), \
             extract(day of week from a.birthdate), cast(a.weight as decimal(10, 2)), \
             trim(leading 'x' from a.name), function('soundex', a.name) from Animal a",
        );
        let selections = spec.select.unwrap().selections;
        assert!(matches!(
            &selections[0].selectable,
            Selectable::Expression(Expression::Function(call)) if call.distinct
        ));
        assert!(matches!(
            &selections[1].selectable,
            Selectable::Expression(Expression::Function(FunctionCallSyntax {
                arguments: FunctionArguments::Star,
                ..
            }))
        ));
        assert!(matches!(
            &selections[2].selectable,
            Selectable::Expression(Expression::Function(call)) if call.filter.is_some()
        ));
        assert!(matches!(
            &selections[3].selectable,
            Selectable::Expression(Expression::Extract { field, .. }) if field.text == "day_of_week"
        ));
        assert!(matches!(
            &selections[4].selectable,
            Selectable::Expression(Expression::Cast { target, .. }) if target.parameters.len() == 2
        ));
        assert!(matches!(
            &selections[5].selectable,
            Selectable::Expression(Expression::Trim {
                specification: Some(TrimSpec::Leading),
                character: Some(_),
                ..
            })
        ));
        assert!(matches!(
            &selections[6].selectable,
            Selectable::Expression(Expression::JpaFunction { name, .. }) if name.text == "soundex"
        ));
    }

    #[test]
    fn test_dynamic_instantiation() {
        let spec = parse_query_spec(
            "select new com.acme.Summary(a.name as n, new list(a.weight)) from Animal a",
        );
        match &spec.select.unwrap().selections[0].selectable {
            Selectable::Instantiation(instantiation) => {
                assert!(matches!(
                    &instantiation.target,
                    InstantiationTargetSyntax::Class(name) if name.text() == "com.acme.Summary"
                ));
                assert_eq!(instantiation.arguments.len(), 2);
                assert!(instantiation.arguments[0].alias.is_some());
                assert!(matches!(
                    instantiation.arguments[1].selectable,
                    Selectable::Instantiation(_)
                ));
            }
            other => panic!("Expected instantiation, got {:?}", other),
        }
    }

    #[test]
    fn test_temporal_and_binary_literals() {
        let spec = parse_query_spec(
            "select {2020-01-31}, {12:30:15}, {2020-01-31 12:30:15 +02:00}, \
             {2020-01-31 12:30 Europe/Paris}, {ts '2020-01-31 12:30:00'}, {0x0A, 0xFF}, X'0AFF' \
             from Animal a",
        );
        let literals: Vec<Literal> = spec
            .select
            .unwrap()
            .selections
            .into_iter()
            .map(|s| match s.selectable {
                Selectable::Expression(Expression::Literal(literal)) => literal,
                other => panic!("Expected literal, got {:?}", other),
            })
            .collect();
        assert!(matches!(
            &literals[0],
            Literal::Temporal { date: Some(d), time: None, .. } if d == "2020-01-31"
        ));
        assert!(matches!(
            &literals[1],
            Literal::Temporal { date: None, time: Some(t), .. } if t == "12:30:15"
        ));
        assert!(matches!(
            &literals[2],
            Literal::Temporal { zone: Some(z), .. } if z == "+02:00"
        ));
        assert!(matches!(
            &literals[3],
            Literal::Temporal { zone: Some(z), .. } if z == "Europe/Paris"
        ));
        assert!(matches!(
            &literals[4],
            Literal::JdbcEscape { kind: JdbcEscapeKind::Timestamp, .. }
        ));
        assert!(matches!(&literals[5], Literal::BinaryBytes(bytes, _) if bytes.len() == 2));
        assert!(matches!(&literals[6], Literal::BinaryHex(t) if t.text == "0AFF"));
    }

    #[test]
    fn test_dml_statements() {
        assert!(matches!(
            parse("update versioned Animal a set a.name = 'x', a.weight = 1 where a.id = 1").unwrap(),
            Statement::Update(UpdateStatement { versioned: true, ref assignments, .. }) if assignments.len() == 2
        ));
        assert!(matches!(
            parse("delete from Animal a where a.id = 1").unwrap(),
            Statement::Delete(DeleteStatement { where_clause: Some(_), .. })
        ));
        assert!(matches!(
            parse("insert into Animal (id, name) values (1, 'a'), (2, 'b')").unwrap(),
            Statement::Insert(InsertStatement { source: InsertSource::Values(ref rows), .. }) if rows.len() == 2
        ));
        assert!(matches!(
            parse("insert Animal (id, name) select p.id, p.name from Person p").unwrap(),
            Statement::Insert(InsertStatement { source: InsertSource::Query(_), .. })
        ));
    }

    #[test]
    fn test_string_unquoting() {
        assert_eq!(unquote("'it''s'"), "it's");
        assert_eq!(unquote("\"dq\""), "dq");
        assert_eq!(unquote("''"), "");
    }

    #[test]
    fn test_errors_carry_spans() {
        let err = parse("select a from").unwrap_err();
        assert_eq!(err.span.start, 13);
        assert!(err.message.contains("expected identifier"));

        let err = parse("select a from Animal a where").unwrap_err();
        assert!(err.message.contains("end of input"));

        let err = parse("select from Animal a").unwrap_err();
        assert!(err.message.contains("keyword 'from'"));
    }
}
