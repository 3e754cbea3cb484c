//! ORDER BY and the LIMIT/OFFSET/FETCH tail, plus the sort and group-by
//! key forms they share.

use tracing::debug;

use super::builder::SemanticQueryBuilder;
use super::compliance::ComplianceViolation;
use super::expression::{collate, path_part_expression};
use crate::domain::{BasicType, SemanticType};
use crate::error::{HqlError, HqlResult};
use crate::hql::tree;
use crate::sqm::{
    Expression, ExpressionKind, FetchClauseType, NullPrecedence, QueryPart, SortDirection,
    SortSpecification,
};

/// Which tail clause was consumed last. Clauses must appear in the order
/// `order by`, `limit`, `offset`, `fetch`, each at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailState {
    None,
    OrderSeen,
    LimitSeen,
    OffsetSeen,
    FetchSeen,
}

impl TailState {
    fn advance(self, clause: &tree::TailClause) -> HqlResult<TailState> {
        let next = match clause {
            tree::TailClause::OrderBy(_) => TailState::OrderSeen,
            tree::TailClause::Limit(_) => TailState::LimitSeen,
            tree::TailClause::Offset(_) => TailState::OffsetSeen,
            tree::TailClause::Fetch(_) => TailState::FetchSeen,
        };
        if next.rank() <= self.rank() {
            return Err(HqlError::Parsing(format!(
                "Unexpected {} clause after {}",
                next.clause_name(),
                self.clause_name()
            )));
        }
        Ok(next)
    }

    fn rank(self) -> u8 {
        match self {
            TailState::None => 0,
            TailState::OrderSeen => 1,
            TailState::LimitSeen => 2,
            TailState::OffsetSeen => 3,
            TailState::FetchSeen => 4,
        }
    }

    fn clause_name(self) -> &'static str {
        match self {
            TailState::None => "query",
            TailState::OrderSeen => "order by",
            TailState::LimitSeen => "limit",
            TailState::OffsetSeen => "offset",
            TailState::FetchSeen => "fetch",
        }
    }
}

#[derive(Default)]
struct Tail<'t> {
    order_by: Option<&'t [tree::SortItem]>,
    limit: Option<&'t tree::Expression>,
    offset: Option<&'t tree::Expression>,
    fetch: Option<&'t tree::FetchClause>,
}

impl SemanticQueryBuilder<'_> {
    pub(super) fn visit_query_order(
        &mut self,
        part: &mut QueryPart,
        order: &tree::QueryOrder,
    ) -> HqlResult<()> {
        let mut state = TailState::None;
        let mut tail = Tail::default();
        for clause in &order.clauses {
            state = state.advance(clause)?;
            match clause {
                tree::TailClause::OrderBy(items) => tail.order_by = Some(items.as_slice()),
                tree::TailClause::Limit(limit) => tail.limit = Some(limit),
                tree::TailClause::Offset(offset) => tail.offset = Some(offset),
                tree::TailClause::Fetch(fetch) => tail.fetch = Some(fetch),
            }
        }

        if let Some(items) = tail.order_by {
            if self.depth() > 1 {
                self.compliance.check(ComplianceViolation::SubqueryOrderBy)?;
            }
            let mut order_by = Vec::with_capacity(items.len());
            for item in items {
                order_by.push(self.visit_sort_item(item)?);
            }
            part.order_mut().order_by = order_by;
        }

        if tail.limit.is_none() && tail.offset.is_none() && tail.fetch.is_none() {
            return Ok(());
        }
        if tail.limit.is_some() && tail.fetch.is_some() {
            return Err(HqlError::Semantic(
                "Can't use both, limit and fetch clause!".to_string(),
            ));
        }
        self.compliance.check(ComplianceViolation::LimitOffsetClause)?;
        if self.depth() > 1 && tail.order_by.is_none() {
            return Err(HqlError::Semantic(
                "limit, offset and fetch clause require an order-by clause when used in sub-query"
                    .to_string(),
            ));
        }

        let offset = tail
            .offset
            .map(|offset| self.visit_expression(offset))
            .transpose()?;
        let (fetch, fetch_type) = match (tail.limit, tail.fetch) {
            (Some(limit), _) => (Some(self.visit_expression(limit)?), FetchClauseType::RowsOnly),
            (None, Some(fetch)) => (
                Some(self.visit_expression(&fetch.count)?),
                FetchClauseType::from_flags(fetch.percent, fetch.with_ties),
            ),
            (None, None) => (None, FetchClauseType::RowsOnly),
        };
        let target = part.order_mut();
        target.offset = offset;
        target.fetch = fetch;
        target.fetch_type = fetch_type;
        Ok(())
    }

    fn visit_sort_item(&mut self, item: &tree::SortItem) -> HqlResult<SortSpecification> {
        let expression = self.visit_item_key(&item.key, item.collation.as_ref(), "order-by")?;
        if expression.is_constant() {
            debug!(ty = %expression.ty, "questionable sorting by constant value");
        }
        Ok(SortSpecification {
            expression,
            direction: match item.direction {
                Some(tree::SortDirectionSyntax::Desc) => SortDirection::Descending,
                Some(tree::SortDirectionSyntax::Asc) | None => SortDirection::Ascending,
            },
            nulls: item.nulls.map(|nulls| match nulls {
                tree::NullsSyntax::First => NullPrecedence::First,
                tree::NullsSyntax::Last => NullPrecedence::Last,
            }),
        })
    }

    /// Resolves a group-by or sort key: a select-item position, a selection
    /// or from alias, or an ordinary expression.
    pub(super) fn visit_item_key(
        &mut self,
        key: &tree::ItemKey,
        collation: Option<&tree::DottedName>,
        clause: &str,
    ) -> HqlResult<Expression> {
        match key {
            tree::ItemKey::Position(terminal) => {
                if collation.is_some() {
                    return Err(HqlError::Parsing(
                        "COLLATE is not allowed for position based order-by or group-by items"
                            .to_string(),
                    ));
                }
                let position = terminal.text.parse::<usize>().map_err(|_| {
                    HqlError::Parsing(format!("Invalid select-item position `{}`", terminal.text))
                })?;
                let registered = self
                    .states
                    .last()
                    .and_then(|state| state.registry.find_aliased_node_by_position(position));
                if registered.is_none() {
                    return Err(HqlError::Parsing(format!(
                        "Numeric literal `{}` used in {} does not match a registered select-item",
                        position, clause
                    )));
                }
                Ok(aliased_node_reference(position))
            }
            tree::ItemKey::Identifier(ident) => {
                let alias = self.normalize_alias(&ident.text);
                let (position, from) = match self.states.last() {
                    Some(state) => (
                        state.registry.find_aliased_node_position(&ident.text),
                        state.registry.find_from_by_alias(&alias),
                    ),
                    None => (None, None),
                };
                if let Some(position) = position {
                    reject_alias_collation(collation)?;
                    return Ok(aliased_node_reference(position));
                }
                if let Some(from) = from {
                    reject_alias_collation(collation)?;
                    return Ok(Expression::path(self.from_path(from)));
                }
                self.consume_identifier(&ident.text, true, true)?;
                let expression = path_part_expression(self.consumed_part()?)?;
                self.collated(expression, collation)
            }
            tree::ItemKey::Expression(expression) => {
                let expression = self.visit_expression(expression)?;
                self.collated(expression, collation)
            }
        }
    }

    fn collated(
        &self,
        expression: Expression,
        collation: Option<&tree::DottedName>,
    ) -> HqlResult<Expression> {
        match collation {
            Some(collation) => {
                self.check_compliance(ComplianceViolation::Collations, || {
                    format!("collate({})", collation.text())
                })?;
                Ok(collate(expression, collation))
            }
            None => Ok(expression),
        }
    }
}

fn reject_alias_collation(collation: Option<&tree::DottedName>) -> HqlResult<()> {
    if collation.is_some() {
        return Err(HqlError::Parsing(
            "COLLATE is not allowed for alias based order-by or group-by items".to_string(),
        ));
    }
    Ok(())
}

fn aliased_node_reference(position: usize) -> Expression {
    Expression::new(
        ExpressionKind::AliasedNodeReference { position },
        SemanticType::Basic(BasicType::Integer),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn limit() -> tree::TailClause {
        tree::TailClause::Limit(tree::Expression::Literal(tree::Literal::Null(
            Default::default(),
        )))
    }

    fn offset() -> tree::TailClause {
        tree::TailClause::Offset(tree::Expression::Literal(tree::Literal::Null(
            Default::default(),
        )))
    }

    #[test]
    fn test_tail_clauses_in_grammar_order() {
        let state = TailState::None
            .advance(&tree::TailClause::OrderBy(Vec::new()))
            .and_then(|state| state.advance(&limit()))
            .and_then(|state| state.advance(&offset()))
            .unwrap();
        assert_eq!(state, TailState::OffsetSeen);
    }

    #[test]
    fn test_offset_before_limit_is_rejected() {
        let err = TailState::None
            .advance(&offset())
            .and_then(|state| state.advance(&limit()))
            .unwrap_err();
        match err {
            HqlError::Parsing(message) => {
                assert_eq!(message, "Unexpected limit clause after offset")
            }
            other => panic!("Expected parsing error, got {:?}", other),
        }
    }

    #[test]
    fn test_repeated_clause_is_rejected() {
        assert!(TailState::LimitSeen.advance(&limit()).is_err());
    }
}
