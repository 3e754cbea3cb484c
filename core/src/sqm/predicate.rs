use super::expression::{Expression, SubQuery};
use super::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    DistinctFrom,
    NotDistinctFrom,
}

impl ComparisonOperator {
    pub fn negated(self) -> Self {
        match self {
            ComparisonOperator::Equal => ComparisonOperator::NotEqual,
            ComparisonOperator::NotEqual => ComparisonOperator::Equal,
            ComparisonOperator::LessThan => ComparisonOperator::GreaterThanOrEqual,
            ComparisonOperator::LessThanOrEqual => ComparisonOperator::GreaterThan,
            ComparisonOperator::GreaterThan => ComparisonOperator::LessThanOrEqual,
            ComparisonOperator::GreaterThanOrEqual => ComparisonOperator::LessThan,
            ComparisonOperator::DistinctFrom => ComparisonOperator::NotDistinctFrom,
            ComparisonOperator::NotDistinctFrom => ComparisonOperator::DistinctFrom,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "<>",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::DistinctFrom => "is distinct from",
            ComparisonOperator::NotDistinctFrom => "is not distinct from",
        }
    }
}

/// A boolean-valued node.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Grouped(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    /// Negation of a predicate that has no negated form of its own.
    Negated(Box<Predicate>),
    Comparison {
        lhs: Expression,
        operator: ComparisonOperator,
        rhs: Expression,
    },
    Between {
        expression: Expression,
        lower: Expression,
        upper: Expression,
        negated: bool,
    },
    Nullness {
        expression: Expression,
        negated: bool,
    },
    Emptiness {
        path: Path,
        negated: bool,
    },
    Like {
        matched: Expression,
        pattern: Expression,
        escape: Option<Expression>,
        negated: bool,
        /// `ILIKE`
        case_insensitive: bool,
    },
    MemberOf {
        expression: Expression,
        path: Path,
        negated: bool,
    },
    InList {
        test: Expression,
        list: Vec<Expression>,
        negated: bool,
    },
    InSubQuery {
        test: Expression,
        subquery: Box<SubQuery>,
        negated: bool,
    },
    Exists {
        expression: Expression,
        negated: bool,
    },
    BooleanExpression(Expression),
}

impl Predicate {
    /// Negates in place where the predicate has a negated form, otherwise wraps.
    pub fn negate(self) -> Predicate {
        match self {
            Predicate::Comparison { lhs, operator, rhs } => Predicate::Comparison {
                lhs,
                operator: operator.negated(),
                rhs,
            },
            Predicate::Between {
                expression,
                lower,
                upper,
                negated,
            } => Predicate::Between {
                expression,
                lower,
                upper,
                negated: !negated,
            },
            Predicate::Nullness {
                expression,
                negated,
            } => Predicate::Nullness {
                expression,
                negated: !negated,
            },
            Predicate::Emptiness { path, negated } => Predicate::Emptiness {
                path,
                negated: !negated,
            },
            Predicate::Like {
                matched,
                pattern,
                escape,
                negated,
                case_insensitive,
            } => Predicate::Like {
                matched,
                pattern,
                escape,
                negated: !negated,
                case_insensitive,
            },
            Predicate::MemberOf {
                expression,
                path,
                negated,
            } => Predicate::MemberOf {
                expression,
                path,
                negated: !negated,
            },
            Predicate::InList {
                test,
                list,
                negated,
            } => Predicate::InList {
                test,
                list,
                negated: !negated,
            },
            Predicate::InSubQuery {
                test,
                subquery,
                negated,
            } => Predicate::InSubQuery {
                test,
                subquery,
                negated: !negated,
            },
            Predicate::Exists {
                expression,
                negated,
            } => Predicate::Exists {
                expression,
                negated: !negated,
            },
            other => Predicate::Negated(Box::new(other)),
        }
    }

    pub fn is_negatable(&self) -> bool {
        !matches!(
            self,
            Predicate::Grouped(_)
                | Predicate::And(..)
                | Predicate::Or(..)
                | Predicate::Negated(_)
                | Predicate::BooleanExpression(_)
        )
    }
}
