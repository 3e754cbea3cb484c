//! Predicate visitors.

use crate::domain::{BasicType, SemanticType};
use crate::error::{HqlError, HqlResult};
use crate::hql::TokenKind;
use crate::hql::tree;
use crate::sqm::{ComparisonOperator, Expression, ExpressionKind, Predicate};

use super::builder::SemanticQueryBuilder;

impl SemanticQueryBuilder<'_> {
    pub(super) fn visit_predicate(&mut self, predicate: &tree::Predicate) -> HqlResult<Predicate> {
        match predicate {
            tree::Predicate::Grouped(inner) => {
                Ok(Predicate::Grouped(Box::new(self.visit_predicate(inner)?)))
            }
            tree::Predicate::And(lhs, rhs) => Ok(Predicate::And(
                Box::new(self.visit_predicate(lhs)?),
                Box::new(self.visit_predicate(rhs)?),
            )),
            tree::Predicate::Or(lhs, rhs) => Ok(Predicate::Or(
                Box::new(self.visit_predicate(lhs)?),
                Box::new(self.visit_predicate(rhs)?),
            )),
            tree::Predicate::Not(inner) => Ok(self.visit_predicate(inner)?.negate()),
            tree::Predicate::Comparison {
                lhs, operator, rhs, ..
            } => self.visit_comparison(lhs, *operator, rhs),
            tree::Predicate::Between {
                expression,
                lower,
                upper,
                negated,
            } => Ok(Predicate::Between {
                expression: self.visit_expression(expression)?,
                lower: self.visit_expression(lower)?,
                upper: self.visit_expression(upper)?,
                negated: *negated,
            }),
            tree::Predicate::Like {
                matched,
                pattern,
                escape,
                negated,
                case_insensitive,
            } => Ok(Predicate::Like {
                matched: self.visit_expression(matched)?,
                pattern: self.visit_expression(pattern)?,
                escape: escape
                    .as_ref()
                    .map(|escape| self.visit_expression(escape))
                    .transpose()?,
                negated: *negated,
                case_insensitive: *case_insensitive,
            }),
            tree::Predicate::In {
                test,
                list,
                negated,
            } => self.visit_in(test, list, *negated),
            tree::Predicate::MemberOf {
                expression,
                path,
                negated,
            } => {
                let expression = self.visit_expression(expression)?;
                let path = self.visit_domain_path(path)?;
                if self.plural_of(&path).is_none() {
                    return Err(HqlError::Semantic(format!(
                        "Path argument to MEMBER OF must be a plural attribute : {}",
                        path.navigable_path
                    )));
                }
                Ok(Predicate::MemberOf {
                    expression,
                    path,
                    negated: *negated,
                })
            }
            tree::Predicate::IsNull {
                expression,
                negated,
            } => Ok(Predicate::Nullness {
                expression: self.visit_expression(expression)?,
                negated: *negated,
            }),
            tree::Predicate::IsEmpty {
                expression,
                negated,
            } => {
                let expression = self.visit_expression(expression)?;
                match expression.kind {
                    ExpressionKind::Path(path) if self.plural_of(&path).is_some() => {
                        Ok(Predicate::Emptiness {
                            path,
                            negated: *negated,
                        })
                    }
                    _ => Err(HqlError::Semantic(
                        "Operand of IS EMPTY must be a plural path".to_string(),
                    )),
                }
            }
            tree::Predicate::Exists {
                expression,
                negated,
            } => Ok(Predicate::Exists {
                expression: self.visit_expression(expression)?,
                negated: *negated,
            }),
            tree::Predicate::Expression(expression) => {
                let expression = self.visit_expression(expression)?;
                let ty = &expression.ty;
                if !ty.is_boolean()
                    && !ty.is_unknown()
                    && *ty != SemanticType::Basic(BasicType::Object)
                {
                    return Err(HqlError::Semantic(format!(
                        "Non-boolean expression used in predicate context: {}",
                        describe(&expression)
                    )));
                }
                Ok(Predicate::BooleanExpression(expression))
            }
        }
    }

    fn visit_comparison(
        &mut self,
        lhs: &tree::Expression,
        symbol: tree::ComparisonSymbol,
        rhs: &tree::Expression,
    ) -> HqlResult<Predicate> {
        let operator = comparison_operator(symbol)?;
        let (lhs, rhs) = self.visit_comparison_operands(lhs, rhs)?;

        if matches!(
            operator,
            ComparisonOperator::Equal
                | ComparisonOperator::NotEqual
                | ComparisonOperator::DistinctFrom
                | ComparisonOperator::NotDistinctFrom
        ) {
            let negated = matches!(
                operator,
                ComparisonOperator::NotEqual | ComparisonOperator::DistinctFrom
            );
            if rhs.is_null() {
                return Ok(Predicate::Nullness {
                    expression: lhs,
                    negated,
                });
            }
            if lhs.is_null() {
                return Ok(Predicate::Nullness {
                    expression: rhs,
                    negated,
                });
            }
        }
        Ok(Predicate::Comparison { lhs, operator, rhs })
    }

    /// Visits both sides, letting either one be an unqualified constant of
    /// an enum typed by the other.
    fn visit_comparison_operands(
        &mut self,
        lhs: &tree::Expression,
        rhs: &tree::Expression,
    ) -> HqlResult<(Expression, Expression)> {
        if let Some(text) = self.enum_shorthand_candidate(lhs)? {
            let right = self.visit_expression(rhs)?;
            let left = match self.enum_constant(text, &right.ty) {
                Some(constant) => constant,
                None => self.visit_expression(lhs)?,
            };
            return Ok((left, right));
        }
        let left = self.visit_expression(lhs)?;
        let right = match self.enum_shorthand_for(rhs, &left.ty)? {
            Some(constant) => constant,
            None => self.visit_expression(rhs)?,
        };
        Ok((left, right))
    }

    fn visit_in(
        &mut self,
        test: &tree::Expression,
        list: &tree::InListSyntax,
        negated: bool,
    ) -> HqlResult<Predicate> {
        let test = self.visit_expression(test)?;
        match list {
            tree::InListSyntax::Explicit(elements) => {
                let list = self.with_parameter_context(elements.len() == 1, |builder| {
                    let mut list = Vec::with_capacity(elements.len());
                    for element in elements {
                        let element = match builder.enum_shorthand_for(element, &test.ty)? {
                            Some(constant) => constant,
                            None => builder.visit_expression(element)?,
                        };
                        list.push(element);
                    }
                    Ok(list)
                })?;
                Ok(Predicate::InList {
                    test,
                    list,
                    negated,
                })
            }
            tree::InListSyntax::Parameter(parameter) => {
                let parameter = self
                    .with_parameter_context(true, |builder| builder.visit_parameter(parameter))?;
                Ok(Predicate::InList {
                    test,
                    list: vec![Expression::new(
                        ExpressionKind::Parameter(parameter),
                        SemanticType::Unknown,
                    )],
                    negated,
                })
            }
            tree::InListSyntax::Subquery(query) => Ok(Predicate::InSubQuery {
                test,
                subquery: Box::new(self.visit_subquery(query)?),
                negated,
            }),
        }
    }
}

fn comparison_operator(symbol: tree::ComparisonSymbol) -> HqlResult<ComparisonOperator> {
    match symbol {
        tree::ComparisonSymbol::IsDistinctFrom => Ok(ComparisonOperator::DistinctFrom),
        tree::ComparisonSymbol::IsNotDistinctFrom => Ok(ComparisonOperator::NotDistinctFrom),
        tree::ComparisonSymbol::Token(kind) => match kind {
            TokenKind::Equals => Ok(ComparisonOperator::Equal),
            TokenKind::NotEqual => Ok(ComparisonOperator::NotEqual),
            TokenKind::LessThan => Ok(ComparisonOperator::LessThan),
            TokenKind::LessEqual => Ok(ComparisonOperator::LessThanOrEqual),
            TokenKind::GreaterThan => Ok(ComparisonOperator::GreaterThan),
            TokenKind::GreaterEqual => Ok(ComparisonOperator::GreaterThanOrEqual),
            other => Err(HqlError::Parsing(format!(
                "Unexpected comparison operator {:?}",
                other
            ))),
        },
    }
}

fn describe(expression: &Expression) -> String {
    match &expression.kind {
        ExpressionKind::Path(path) => format!("{} ({})", path.navigable_path, expression.ty),
        ExpressionKind::Literal(value) => format!("{} ({})", value, expression.ty),
        _ => format!("expression of type {}", expression.ty),
    }
}
