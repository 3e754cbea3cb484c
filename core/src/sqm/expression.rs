use std::sync::Arc;

use super::literal::LiteralValue;
use super::parameter::Parameter;
use super::path::Path;
use super::predicate::Predicate;
use super::query::QueryPart;
use crate::domain::{BasicType, EntityType, EnumConstant, SemanticType};

/// A typed expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub ty: SemanticType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Literal(LiteralValue),
    Null,
    EnumLiteral(EnumConstant),
    EntityTypeLiteral(Arc<EntityType>),
    Parameter(Parameter),
    Path(Path),
    BinaryArithmetic {
        operator: ArithmeticOperator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    UnaryArithmetic {
        operator: UnaryArithmeticOperator,
        operand: Box<Expression>,
    },
    Function(FunctionCall),
    /// `every(subquery)`
    Every(Box<SubQuery>),
    /// `any(subquery)`
    Any(Box<SubQuery>),
    SimpleCase(SimpleCase),
    SearchedCase(SearchedCase),
    Tuple(Vec<Expression>),
    SubQuery(Box<SubQuery>),
    /// A predicate in expression position, e.g. the argument of `every(..)`.
    Predicate(Box<Predicate>),
    Collate {
        expression: Box<Expression>,
        collation: Arc<str>,
    },
    ToDuration {
        magnitude: Box<Expression>,
        unit: TemporalUnit,
    },
    FromDuration {
        duration: Box<Expression>,
        unit: TemporalUnit,
    },
    Distinct(Box<Expression>),
    Star,
    CastTarget(CastTarget),
    ExtractUnit(TemporalUnit),
    DurationUnit(TemporalUnit),
    TrimSpecification(TrimSpecification),
    Format(Arc<str>),
    Summarization {
        kind: SummarizationKind,
        groupings: Vec<Expression>,
    },
    /// Reference to a selection by its 1-based position.
    AliasedNodeReference {
        position: usize,
    },
    CollectionSize(Path),
    /// `type(path)`
    EntityTypeOf(Path),
    /// `type(:param)`
    ParameterizedEntityType(Parameter),
    MapEntry(Path),
}

impl Expression {
    pub fn new(kind: ExpressionKind, ty: SemanticType) -> Self {
        Expression { kind, ty }
    }

    pub fn literal(value: LiteralValue) -> Self {
        let ty = SemanticType::Basic(value.basic_type());
        Expression {
            kind: ExpressionKind::Literal(value),
            ty,
        }
    }

    pub fn null() -> Self {
        Expression {
            kind: ExpressionKind::Null,
            ty: SemanticType::Unknown,
        }
    }

    pub fn path(path: Path) -> Self {
        let ty = path.semantic_type();
        Expression {
            kind: ExpressionKind::Path(path),
            ty,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match &self.kind {
            ExpressionKind::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ExpressionKind::Null)
    }

    /// Literals and parameters, which sort every row the same way.
    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Literal(_)
                | ExpressionKind::Null
                | ExpressionKind::EnumLiteral(_)
                | ExpressionKind::Parameter(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl ArithmeticOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "/",
            ArithmeticOperator::Modulo => "%",
        }
    }

    /// Result type of applying this operator to operands of the given types.
    pub fn result_type(self, lhs: &SemanticType, rhs: &SemanticType) -> SemanticType {
        match (lhs, rhs) {
            (SemanticType::Unknown, other) | (other, SemanticType::Unknown) => other.clone(),
            (SemanticType::Basic(left), SemanticType::Basic(right)) => {
                SemanticType::Basic(self.basic_result_type(*left, *right))
            }
            (left, _) => left.clone(),
        }
    }

    fn basic_result_type(self, left: BasicType, right: BasicType) -> BasicType {
        if left.is_temporal() && right.is_temporal() && self == ArithmeticOperator::Subtract {
            return BasicType::Duration;
        }
        if left.is_temporal() && right == BasicType::Duration {
            return left;
        }
        if left == BasicType::Duration && right.is_temporal() && self == ArithmeticOperator::Add {
            return right;
        }
        match (left.numeric_rank(), right.numeric_rank()) {
            (Some(l), Some(r)) if l >= r => left,
            (Some(_), Some(_)) => right,
            _ => left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryArithmeticOperator {
    Plus,
    Minus,
}

/// A function invocation produced by a function descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: Arc<str>,
    pub arguments: Vec<Expression>,
    pub filter: Option<Box<Predicate>>,
    pub aggregate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleCase {
    pub operand: Box<Expression>,
    pub whens: Vec<(Expression, Expression)>,
    pub otherwise: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchedCase {
    pub whens: Vec<(Predicate, Expression)>,
    pub otherwise: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub query_part: QueryPart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastTarget {
    pub target: BasicType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalUnit {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Nanosecond,
    DayOfWeek,
    DayOfMonth,
    DayOfYear,
    WeekOfMonth,
    WeekOfYear,
    Date,
    Time,
    Offset,
    TimezoneHour,
    TimezoneMinute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrimSpecification {
    Leading,
    Trailing,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummarizationKind {
    Cube,
    Rollup,
}
