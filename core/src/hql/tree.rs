//! # Parse tree
//!
//! Typed HQL parse tree. Nodes keep the spans and raw text of their terminals;
//! nothing here is resolved against the domain model.

use smallvec::SmallVec;

use super::error::Span;
use super::lexer::TokenKind;

/// A single identifier as written.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub text: String,
    pub span: Span,
    /// Lexed as a keyword rather than a plain identifier.
    pub keyword: bool,
}

/// `a.b.c`
#[derive(Debug, Clone, PartialEq)]
pub struct DottedName {
    pub parts: SmallVec<[Ident; 4]>,
}

impl DottedName {
    pub fn text(&self) -> String {
        let mut text = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                text.push('.');
            }
            text.push_str(&part.text);
        }
        text
    }

    pub fn span(&self) -> Span {
        match (self.parts.first(), self.parts.last()) {
            (Some(first), Some(last)) => first.span.merge(last.span),
            _ => Span::default(),
        }
    }

    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1
    }
}

/// An identification variable or result alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub ident: Ident,
    /// Introduced with `AS`.
    pub explicit: bool,
}

/// A terminal token with its text.
#[derive(Debug, Clone, PartialEq)]
pub struct Terminal {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

// Statements

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(QueryExpression),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub target: DottedName,
    pub target_fields: Vec<DottedName>,
    pub source: InsertSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Query(QueryExpression),
    Values(Vec<Vec<Expression>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub versioned: bool,
    pub target: DottedName,
    pub alias: Option<Alias>,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub path: DottedName,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub target: DottedName,
    pub alias: Option<Alias>,
    pub where_clause: Option<Predicate>,
}

// Queries

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperatorKind {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOperatorSyntax {
    pub kind: SetOperatorKind,
    pub all: bool,
}

/// `ordered (op ordered)*`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpression {
    pub first: OrderedQuery,
    pub rest: Vec<(SetOperatorSyntax, OrderedQuery)>,
}

impl QueryExpression {
    pub fn is_set_operation(&self) -> bool {
        !self.rest.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderedQuery {
    Spec {
        query: Box<QuerySpec>,
        order: Option<QueryOrder>,
    },
    /// `( queryExpression ) queryOrder?`
    Nested {
        expression: Box<QueryExpression>,
        order: Option<QueryOrder>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub select: Option<SelectClause>,
    pub from: FromClause,
    pub where_clause: Option<Predicate>,
    pub group_by: Vec<GroupByItem>,
    pub having: Option<Predicate>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub selections: Vec<SelectionItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionItem {
    pub selectable: Selectable,
    pub alias: Option<Alias>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selectable {
    Expression(Expression),
    Instantiation(Instantiation),
    /// `OBJECT(alias)`
    Object(Ident),
    /// `ENTRY(path)`
    MapEntry(Path),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstantiationTargetSyntax {
    List,
    Map,
    Class(DottedName),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instantiation {
    pub target: InstantiationTargetSyntax,
    pub arguments: Vec<InstantiationArgumentSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstantiationArgumentSyntax {
    pub selectable: Selectable,
    pub alias: Option<Alias>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub spaces: Vec<FromSpace>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromSpace {
    pub root: EntityReferenceSyntax,
    pub joins: Vec<Join>,
}

/// `EntityName alias?`
#[derive(Debug, Clone, PartialEq)]
pub struct EntityReferenceSyntax {
    pub name: DottedName,
    pub alias: Option<Alias>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Join {
    Cross(EntityReferenceSyntax),
    Qualified(QualifiedJoin),
    /// `, IN(path) alias`
    JpaCollection { path: Path, alias: Option<Alias> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedJoin {
    pub kind: JoinKind,
    pub fetch: bool,
    pub target: Path,
    pub alias: Option<Alias>,
    /// `ON` / `WITH` predicate.
    pub predicate: Option<Predicate>,
}

/// Group-by and sort keys have special forms for positions and aliases.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKey {
    /// A bare integer literal referencing a selection.
    Position(Terminal),
    /// A bare single identifier.
    Identifier(Ident),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupByItem {
    pub key: ItemKey,
    pub collation: Option<DottedName>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirectionSyntax {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsSyntax {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    pub key: ItemKey,
    pub collation: Option<DottedName>,
    pub direction: Option<SortDirectionSyntax>,
    pub nulls: Option<NullsSyntax>,
}

/// `FETCH FIRST|NEXT n PERCENT? ROW|ROWS ONLY|WITH TIES`
#[derive(Debug, Clone, PartialEq)]
pub struct FetchClause {
    pub count: Expression,
    pub percent: bool,
    pub with_ties: bool,
    pub span: Span,
}

/// One clause of the ordering tail.
#[derive(Debug, Clone, PartialEq)]
pub enum TailClause {
    OrderBy(Vec<SortItem>),
    Limit(Expression),
    Offset(Expression),
    Fetch(FetchClause),
}

/// The ordering tail, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOrder {
    pub clauses: Vec<TailClause>,
}

// Paths

#[derive(Debug, Clone, PartialEq)]
pub enum Path {
    /// `a.b.c`
    Simple(DottedName),
    /// `TREAT(path AS Entity).continuation`
    Treated {
        base: Box<Path>,
        target: DottedName,
        continuation: Option<DottedName>,
        span: Span,
    },
    /// `VALUE(path)` / `ELEMENTS(path)`
    CollectionValue {
        base: Box<Path>,
        continuation: Option<DottedName>,
        span: Span,
    },
    /// `KEY(path)`
    MapKey {
        base: Box<Path>,
        continuation: Option<DottedName>,
        span: Span,
    },
    /// `path[index].continuation`
    Indexed {
        base: DottedName,
        index: Box<Expression>,
        continuation: Option<DottedName>,
        span: Span,
    },
}

impl Path {
    pub fn span(&self) -> Span {
        match self {
            Path::Simple(name) => name.span(),
            Path::Treated { span, .. }
            | Path::CollectionValue { span, .. }
            | Path::MapKey { span, .. }
            | Path::Indexed { span, .. } => *span,
        }
    }

    /// A rough rendering for messages.
    pub fn text(&self) -> String {
        let with_continuation = |head: String, continuation: &Option<DottedName>| match continuation
        {
            Some(rest) => format!("{}.{}", head, rest.text()),
            None => head,
        };
        match self {
            Path::Simple(name) => name.text(),
            Path::Treated {
                base,
                target,
                continuation,
                ..
            } => with_continuation(
                format!("treat({} as {})", base.text(), target.text()),
                continuation,
            ),
            Path::CollectionValue {
                base, continuation, ..
            } => with_continuation(format!("value({})", base.text()), continuation),
            Path::MapKey {
                base, continuation, ..
            } => with_continuation(format!("key({})", base.text()), continuation),
            Path::Indexed {
                base, continuation, ..
            } => with_continuation(format!("{}[..]", base.text()), continuation),
        }
    }
}

// Literals and parameters

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JdbcEscapeKind {
    Date,
    Time,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null(Span),
    Boolean(bool, Span),
    String(Terminal),
    /// Integer, long, big-integer, float, double, big-decimal or hex literal.
    Numeric(Terminal),
    /// `X'0A1B'`
    BinaryHex(Terminal),
    /// `{0x0A, 0x1B}`
    BinaryBytes(Vec<Terminal>, Span),
    /// `{yyyy-mm-dd}`, `{hh:mm:ss}` or `{yyyy-mm-dd hh:mm:ss [zone|offset]}`.
    Temporal {
        date: Option<String>,
        time: Option<String>,
        zone: Option<String>,
        span: Span,
    },
    /// `{d '..'}`, `{t '..'}`, `{ts '..'}`
    JdbcEscape {
        kind: JdbcEscapeKind,
        text: Terminal,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSyntax {
    Named { name: String, span: Span },
    Positional { position: Option<String>, span: Span },
}

impl ParameterSyntax {
    pub fn span(&self) -> Span {
        match self {
            ParameterSyntax::Named { span, .. } | ParameterSyntax::Positional { span, .. } => *span,
        }
    }
}

// Expressions

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityReferenceFunction {
    Id,
    Version,
    NaturalId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionFunctionKind {
    Size,
    Index,
    MaxElement,
    MinElement,
    MaxIndex,
    MinIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizationSyntax {
    Cube,
    Rollup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimSpec {
    Leading,
    Trailing,
    Both,
}

/// Function argument that may be a plain expression or a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Expression(Expression),
    Predicate(Predicate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArguments {
    /// `count(*)`
    Star,
    List(Vec<Argument>),
}

/// `name([DISTINCT] args) [FILTER (WHERE predicate)]`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallSyntax {
    pub name: Ident,
    pub distinct: bool,
    pub arguments: FunctionArguments,
    pub filter: Option<Box<Predicate>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastTargetSyntax {
    pub name: Ident,
    /// `(length)` or `(precision, scale)`
    pub parameters: Vec<Terminal>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityTypeArgument {
    Path(Path),
    Parameter(ParameterSyntax),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Path(Path),
    Literal(Literal),
    Parameter(ParameterSyntax),
    /// `( expr )`
    Grouped(Box<Expression>),
    /// `( a, b, .. )`
    Tuple(Vec<Expression>, Span),
    Subquery(Box<QueryExpression>, Span),
    /// `a || b`
    Concat(Box<Expression>, Box<Expression>),
    /// `+ - * / %`, carried as the operator token.
    Binary {
        lhs: Box<Expression>,
        operator: Terminal,
        rhs: Box<Expression>,
    },
    /// Unary sign.
    Unary {
        operator: Terminal,
        operand: Box<Expression>,
    },
    /// `expr unit`
    ToDuration {
        magnitude: Box<Expression>,
        unit: Ident,
    },
    /// `expr BY unit`
    FromDuration {
        duration: Box<Expression>,
        unit: Ident,
    },
    Collate {
        expression: Box<Expression>,
        collation: DottedName,
    },
    SimpleCase {
        operand: Box<Expression>,
        whens: Vec<(Expression, Expression)>,
        otherwise: Option<Box<Expression>>,
        span: Span,
    },
    SearchedCase {
        whens: Vec<(Predicate, Expression)>,
        otherwise: Option<Box<Expression>>,
        span: Span,
    },
    Function(FunctionCallSyntax),
    /// `function('name', args..)`
    JpaFunction {
        name: Terminal,
        arguments: Vec<Expression>,
        span: Span,
    },
    Cast {
        expression: Box<Expression>,
        target: CastTargetSyntax,
        span: Span,
    },
    Extract {
        field: Ident,
        argument: Box<Expression>,
        span: Span,
    },
    /// `format(expr AS 'pattern')`
    Format {
        expression: Box<Expression>,
        pattern: Terminal,
        span: Span,
    },
    Trim {
        specification: Option<TrimSpec>,
        character: Option<Terminal>,
        argument: Box<Expression>,
        span: Span,
    },
    /// `pad(expr WITH length LEADING|TRAILING ['c'])`
    Pad {
        argument: Box<Expression>,
        length: Box<Expression>,
        specification: TrimSpec,
        character: Option<Terminal>,
        span: Span,
    },
    /// `position(pattern IN string)`
    Position {
        pattern: Box<Expression>,
        string: Box<Expression>,
        span: Span,
    },
    /// `TYPE(path)` or `TYPE(:param)`
    EntityType(EntityTypeArgument, Span),
    /// `id(path)`, `version(path)`, `naturalid(path)`
    EntityReference {
        function: EntityReferenceFunction,
        path: Path,
        continuation: Option<DottedName>,
        span: Span,
    },
    CollectionFunction {
        kind: CollectionFunctionKind,
        path: Path,
        span: Span,
    },
    Summarization {
        kind: SummarizationSyntax,
        expressions: Vec<Expression>,
        span: Span,
    },
}

impl Expression {
    /// The dotted name of a bare simple path, if this is one.
    pub fn as_dotted_name(&self) -> Option<&DottedName> {
        match self {
            Expression::Path(Path::Simple(name)) => Some(name),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParameterSyntax> {
        match self {
            Expression::Parameter(parameter) => Some(parameter),
            _ => None,
        }
    }

    pub fn as_subquery(&self) -> Option<&QueryExpression> {
        match self {
            Expression::Subquery(query, _) => Some(query),
            _ => None,
        }
    }
}

// Predicates

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonSymbol {
    /// `= <> != ^= < <= > >=`
    Token(TokenKind),
    IsDistinctFrom,
    IsNotDistinctFrom,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InListSyntax {
    /// `IN (a, b, ..)`
    Explicit(Vec<Expression>),
    /// `IN :param`
    Parameter(ParameterSyntax),
    /// `IN (select ..)`
    Subquery(Box<QueryExpression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Grouped(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    Comparison {
        lhs: Expression,
        operator: ComparisonSymbol,
        rhs: Expression,
        span: Span,
    },
    Between {
        expression: Expression,
        lower: Expression,
        upper: Expression,
        negated: bool,
    },
    Like {
        matched: Expression,
        pattern: Expression,
        escape: Option<Expression>,
        negated: bool,
        case_insensitive: bool,
    },
    In {
        test: Expression,
        list: InListSyntax,
        negated: bool,
    },
    MemberOf {
        expression: Expression,
        path: Path,
        negated: bool,
    },
    IsNull {
        expression: Expression,
        negated: bool,
    },
    IsEmpty {
        expression: Expression,
        negated: bool,
    },
    Exists {
        expression: Expression,
        negated: bool,
    },
    /// An expression in predicate position.
    Expression(Expression),
}
