//! # Semantic query model
//!
//! The resolved, typed statement tree produced by the semantic builder.

mod expression;
mod from;
mod literal;
mod parameter;
mod path;
mod predicate;
mod query;
mod statement;

pub use expression::{
    ArithmeticOperator, CastTarget, Expression, ExpressionKind, FunctionCall, SearchedCase,
    SimpleCase, SubQuery, SummarizationKind, TemporalUnit, TrimSpecification,
    UnaryArithmeticOperator,
};
pub use from::{FromArena, FromElement, FromId, FromKind, JoinType, NavigablePath};
pub use literal::LiteralValue;
pub use parameter::{Parameter, ParameterKind};
pub use path::{Path, PathKind, PathSource};
pub use predicate::{ComparisonOperator, Predicate};
pub use query::{
    DynamicInstantiation, FetchClauseType, FromClause, InstantiationArgument,
    InstantiationTarget, NullPrecedence, QueryGroup, QueryOrder, QueryPart, QuerySpec,
    Selectable, SelectClause, Selection, SetOperator, SortDirection, SortSpecification,
};
pub use statement::{
    Assignment, DeleteStatement, InsertSelectStatement, InsertValuesStatement, SelectStatement,
    Statement, StatementKind, UpdateStatement,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BasicType, SemanticType};
    use pretty_assertions::assert_eq;

    fn spec_part(marker: i32) -> QueryPart {
        QueryPart::Spec(Box::new(QuerySpec {
            from: FromClause::default(),
            select: SelectClause {
                distinct: false,
                selections: vec![Selection {
                    selectable: Selectable::Expression(Expression::literal(
                        LiteralValue::Integer(marker),
                    )),
                    alias: None,
                }],
            },
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order: QueryOrder::default(),
        }))
    }

    #[test]
    fn same_operator_extends_group() {
        let group = QueryGroup::new(spec_part(1))
            .append(SetOperator::Union, spec_part(2))
            .append(SetOperator::Union, spec_part(3));
        assert_eq!(group.operator, Some(SetOperator::Union));
        assert_eq!(group.parts.len(), 3);
    }

    #[test]
    fn switching_operator_nests_group() {
        let group = QueryGroup::new(spec_part(1))
            .append(SetOperator::Union, spec_part(2))
            .append(SetOperator::Except, spec_part(3));
        assert_eq!(group.operator, Some(SetOperator::Except));
        assert_eq!(group.parts.len(), 2);
        let nested = group.parts[0].as_group().unwrap();
        assert_eq!(nested.operator, Some(SetOperator::Union));
        assert_eq!(nested.parts.len(), 2);
        assert_eq!(group.parts[1], spec_part(3));
    }

    #[test]
    fn negation_flips_operator_in_place() {
        let predicate = Predicate::Comparison {
            lhs: Expression::literal(LiteralValue::Integer(1)),
            operator: ComparisonOperator::LessThan,
            rhs: Expression::literal(LiteralValue::Integer(2)),
        };
        match predicate.negate() {
            Predicate::Comparison { operator, .. } => {
                assert_eq!(operator, ComparisonOperator::GreaterThanOrEqual)
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn negation_wraps_junctions() {
        let junction = Predicate::And(
            Box::new(Predicate::BooleanExpression(Expression::literal(
                LiteralValue::Boolean(true),
            ))),
            Box::new(Predicate::BooleanExpression(Expression::literal(
                LiteralValue::Boolean(false),
            ))),
        );
        assert!(matches!(junction.negate(), Predicate::Negated(_)));
    }

    #[test]
    fn arithmetic_promotes_to_wider_numeric_type() {
        let int = SemanticType::Basic(BasicType::Integer);
        let double = SemanticType::Basic(BasicType::Double);
        assert_eq!(ArithmeticOperator::Add.result_type(&int, &double), double);
        assert_eq!(
            ArithmeticOperator::Multiply.result_type(&SemanticType::Unknown, &int),
            int
        );
        let date = SemanticType::Basic(BasicType::LocalDate);
        assert_eq!(
            ArithmeticOperator::Subtract.result_type(&date, &date),
            SemanticType::Basic(BasicType::Duration)
        );
    }

    #[test]
    fn fetch_type_covers_all_flag_combinations() {
        assert_eq!(FetchClauseType::from_flags(false, false), FetchClauseType::RowsOnly);
        assert_eq!(FetchClauseType::from_flags(false, true), FetchClauseType::RowsWithTies);
        assert_eq!(FetchClauseType::from_flags(true, false), FetchClauseType::PercentOnly);
        assert_eq!(FetchClauseType::from_flags(true, true), FetchClauseType::PercentWithTies);
    }
}
