use std::sync::Arc;

use super::expression::Expression;
use super::from::FromId;
use super::predicate::Predicate;
use crate::domain::SemanticType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

/// A single query block or a set-operation group of them.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPart {
    Spec(Box<QuerySpec>),
    Group(QueryGroup),
}

impl QueryPart {
    pub fn order(&self) -> &QueryOrder {
        match self {
            QueryPart::Spec(spec) => &spec.order,
            QueryPart::Group(group) => &group.order,
        }
    }

    pub fn order_mut(&mut self) -> &mut QueryOrder {
        match self {
            QueryPart::Spec(spec) => &mut spec.order,
            QueryPart::Group(group) => &mut group.order,
        }
    }

    /// The left-most query spec, whose select clause shapes the result.
    pub fn first_spec(&self) -> &QuerySpec {
        match self {
            QueryPart::Spec(spec) => spec,
            QueryPart::Group(group) => group.parts[0].first_spec(),
        }
    }

    pub fn as_spec(&self) -> Option<&QuerySpec> {
        match self {
            QueryPart::Spec(spec) => Some(spec),
            QueryPart::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&QueryGroup> {
        match self {
            QueryPart::Group(group) => Some(group),
            QueryPart::Spec(_) => None,
        }
    }
}

/// Query parts combined by one set operator.
///
/// A group never mixes operators: appending a part with a different operator
/// nests the existing group as the first part of a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryGroup {
    pub operator: Option<SetOperator>,
    pub parts: Vec<QueryPart>,
    pub order: QueryOrder,
}

impl QueryGroup {
    pub fn new(first: QueryPart) -> Self {
        QueryGroup {
            operator: None,
            parts: vec![first],
            order: QueryOrder::default(),
        }
    }

    pub fn append(mut self, operator: SetOperator, part: QueryPart) -> QueryGroup {
        match self.operator {
            None => {
                self.operator = Some(operator);
                self.parts.push(part);
                self
            }
            Some(current) if current == operator => {
                self.parts.push(part);
                self
            }
            Some(_) => QueryGroup {
                operator: Some(operator),
                parts: vec![QueryPart::Group(self), part],
                order: QueryOrder::default(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub from: FromClause,
    pub select: SelectClause,
    pub where_clause: Option<Predicate>,
    pub group_by: Vec<Expression>,
    pub having: Option<Predicate>,
    pub order: QueryOrder,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FromClause {
    pub roots: Vec<FromId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub selectable: Selectable,
    pub alias: Option<Arc<str>>,
}

impl Selection {
    pub fn semantic_type(&self) -> SemanticType {
        self.selectable.semantic_type()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selectable {
    Expression(Expression),
    DynamicInstantiation(DynamicInstantiation),
}

impl Selectable {
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            Selectable::Expression(expression) => expression.ty.clone(),
            Selectable::DynamicInstantiation(instantiation) => instantiation.target.semantic_type(),
        }
    }

    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            Selectable::Expression(expression) => Some(expression),
            Selectable::DynamicInstantiation(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstantiationTarget {
    Class(Arc<str>),
    List,
    Map,
}

impl InstantiationTarget {
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            InstantiationTarget::Class(name) => SemanticType::Class(name.clone()),
            InstantiationTarget::List => SemanticType::List,
            InstantiationTarget::Map => SemanticType::Map,
        }
    }
}

/// `new Foo(..)`, `new list(..)` or `new map(..)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicInstantiation {
    pub target: InstantiationTarget,
    pub arguments: Vec<InstantiationArgument>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstantiationArgument {
    pub selectable: Selectable,
    pub alias: Option<Arc<str>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullPrecedence {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpecification {
    pub expression: Expression,
    pub direction: SortDirection,
    pub nulls: Option<NullPrecedence>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FetchClauseType {
    #[default]
    RowsOnly,
    RowsWithTies,
    PercentOnly,
    PercentWithTies,
}

impl FetchClauseType {
    pub fn from_flags(percent: bool, with_ties: bool) -> Self {
        match (percent, with_ties) {
            (false, false) => FetchClauseType::RowsOnly,
            (false, true) => FetchClauseType::RowsWithTies,
            (true, false) => FetchClauseType::PercentOnly,
            (true, true) => FetchClauseType::PercentWithTies,
        }
    }
}

/// ORDER BY and the row-limiting tail of a query part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOrder {
    pub order_by: Vec<SortSpecification>,
    pub offset: Option<Expression>,
    /// Row limit; `limit n` is stored here as a rows-only fetch.
    pub fetch: Option<Expression>,
    pub fetch_type: FetchClauseType,
}

impl QueryOrder {
    pub fn is_empty(&self) -> bool {
        self.order_by.is_empty() && self.offset.is_none() && self.fetch.is_none()
    }
}
