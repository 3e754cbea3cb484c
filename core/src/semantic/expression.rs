//! Expression visitors.

use std::sync::Arc;

use tracing::debug;

use super::builder::SemanticQueryBuilder;
use super::compliance::ComplianceViolation;
use super::consumer::{PathConsumer, PathPart};
use super::literal;
use super::state::StateKind;
use crate::domain::{BasicType, CollectionClassification, EntityType, SemanticType};
use crate::error::{HqlError, HqlResult};
use crate::hql::TokenKind;
use crate::hql::tree;
use crate::sqm::{
    ArithmeticOperator, Expression, ExpressionKind, LiteralValue, Parameter, ParameterKind, Path,
    PathKind, PathSource, SearchedCase, SimpleCase, SubQuery, SummarizationKind, TemporalUnit,
    UnaryArithmeticOperator,
};

impl SemanticQueryBuilder<'_> {
    pub(super) fn visit_expression(&mut self, expression: &tree::Expression) -> HqlResult<Expression> {
        match expression {
            tree::Expression::Path(path) => {
                let part = self.visit_path(path)?;
                path_part_expression(part)
            }
            tree::Expression::Literal(literal) => self.visit_literal(literal),
            tree::Expression::Parameter(parameter) => {
                let parameter = self.visit_parameter(parameter)?;
                Ok(Expression::new(
                    ExpressionKind::Parameter(parameter),
                    SemanticType::Unknown,
                ))
            }
            tree::Expression::Grouped(inner) => self.visit_expression(inner),
            tree::Expression::Tuple(elements, _) => {
                self.compliance.check(ComplianceViolation::Tuples)?;
                let elements = self.visit_expressions(elements)?;
                let ty = SemanticType::Tuple(elements.iter().map(|e| e.ty.clone()).collect());
                Ok(Expression::new(ExpressionKind::Tuple(elements), ty))
            }
            tree::Expression::Subquery(query, _) => {
                let subquery = self.visit_subquery(query)?;
                let ty = subquery_type(&subquery);
                Ok(Expression::new(
                    ExpressionKind::SubQuery(Box::new(subquery)),
                    ty,
                ))
            }
            tree::Expression::Concat(lhs, rhs) => {
                let arguments = vec![self.visit_expression(lhs)?, self.visit_expression(rhs)?];
                self.generate_function(
                    "concat",
                    arguments,
                    Some(&SemanticType::Basic(BasicType::String)),
                )
            }
            tree::Expression::Binary { lhs, operator, rhs } => {
                self.visit_binary(lhs, operator, rhs)
            }
            tree::Expression::Unary { operator, operand } => {
                let operator = match operator.kind {
                    TokenKind::Plus => UnaryArithmeticOperator::Plus,
                    TokenKind::Minus => UnaryArithmeticOperator::Minus,
                    other => {
                        return Err(HqlError::Parsing(format!(
                            "Unexpected unary operator [{}] of kind {:?}",
                            operator.text, other
                        )));
                    }
                };
                let operand = self.visit_expression(operand)?;
                let ty = operand.ty.clone();
                Ok(Expression::new(
                    ExpressionKind::UnaryArithmetic {
                        operator,
                        operand: Box::new(operand),
                    },
                    ty,
                ))
            }
            tree::Expression::ToDuration { magnitude, unit } => {
                let magnitude = self.visit_expression(magnitude)?;
                Ok(Expression::new(
                    ExpressionKind::ToDuration {
                        magnitude: Box::new(magnitude),
                        unit: duration_unit(unit)?,
                    },
                    SemanticType::Basic(BasicType::Duration),
                ))
            }
            tree::Expression::FromDuration { duration, unit } => {
                let duration = self.visit_expression(duration)?;
                Ok(Expression::new(
                    ExpressionKind::FromDuration {
                        duration: Box::new(duration),
                        unit: duration_unit(unit)?,
                    },
                    SemanticType::Basic(BasicType::Long),
                ))
            }
            tree::Expression::Collate {
                expression,
                collation,
            } => {
                self.compliance.check(ComplianceViolation::Collations)?;
                let expression = self.visit_expression(expression)?;
                Ok(collate(expression, collation))
            }
            tree::Expression::SimpleCase {
                operand,
                whens,
                otherwise,
                ..
            } => self.visit_simple_case(operand, whens, otherwise.as_deref()),
            tree::Expression::SearchedCase {
                whens, otherwise, ..
            } => self.visit_searched_case(whens, otherwise.as_deref()),
            tree::Expression::Function(call) => self.visit_function_call(call),
            tree::Expression::JpaFunction {
                name, arguments, ..
            } => self.visit_jpa_function(name, arguments),
            tree::Expression::Cast {
                expression, target, ..
            } => self.visit_cast(expression, target),
            tree::Expression::Extract {
                field, argument, ..
            } => self.visit_extract(field, argument),
            tree::Expression::Format {
                expression,
                pattern,
                ..
            } => self.visit_format(expression, pattern),
            tree::Expression::Trim {
                specification,
                character,
                argument,
                ..
            } => self.visit_trim(*specification, character.as_ref(), argument),
            tree::Expression::Pad {
                argument,
                length,
                specification,
                character,
                ..
            } => self.visit_pad(argument, length, *specification, character.as_ref()),
            tree::Expression::Position {
                pattern, string, ..
            } => {
                let arguments = vec![self.visit_expression(pattern)?, self.visit_expression(string)?];
                self.generate_function("position", arguments, None)
            }
            tree::Expression::EntityType(argument, _) => self.visit_entity_type(argument),
            tree::Expression::EntityReference {
                function,
                path,
                continuation,
                ..
            } => self.visit_entity_reference(*function, path, continuation.as_ref()),
            tree::Expression::CollectionFunction { kind, path, .. } => {
                self.visit_collection_function(*kind, path)
            }
            tree::Expression::Summarization {
                kind, expressions, ..
            } => {
                let kind = match kind {
                    tree::SummarizationSyntax::Cube => SummarizationKind::Cube,
                    tree::SummarizationSyntax::Rollup => SummarizationKind::Rollup,
                };
                let groupings = self.visit_expressions(expressions)?;
                Ok(Expression::new(
                    ExpressionKind::Summarization { kind, groupings },
                    SemanticType::Unknown,
                ))
            }
        }
    }

    pub(super) fn visit_expressions(
        &mut self,
        expressions: &[tree::Expression],
    ) -> HqlResult<Vec<Expression>> {
        expressions
            .iter()
            .map(|expression| self.visit_expression(expression))
            .collect()
    }

    fn visit_literal(&mut self, literal: &tree::Literal) -> HqlResult<Expression> {
        let value = match literal {
            tree::Literal::Null(_) => return Ok(Expression::null()),
            tree::Literal::Boolean(value, _) => LiteralValue::Boolean(*value),
            tree::Literal::String(terminal) => literal::string_literal(&terminal.text),
            tree::Literal::Numeric(terminal) => {
                literal::numeric_literal(terminal.kind, &terminal.text)?
            }
            tree::Literal::BinaryHex(terminal) => literal::binary_literal(&terminal.text)?,
            tree::Literal::BinaryBytes(bytes, _) => {
                literal::binary_bytes_literal(bytes.iter().map(|byte| byte.text.as_str()))?
            }
            tree::Literal::Temporal {
                date, time, zone, ..
            } => literal::temporal_literal(date.as_deref(), time.as_deref(), zone.as_deref())?,
            tree::Literal::JdbcEscape { kind, text } => {
                literal::jdbc_escape_literal(*kind, &text.text)?
            }
        };
        Ok(Expression::literal(value))
    }

    pub(super) fn visit_parameter(
        &mut self,
        parameter: &tree::ParameterSyntax,
    ) -> HqlResult<Parameter> {
        let kind = match parameter {
            tree::ParameterSyntax::Named { name, .. } => ParameterKind::Named(Arc::from(name.as_str())),
            tree::ParameterSyntax::Positional { position: None, .. } => {
                return Err(HqlError::Semantic(
                    "Encountered positional parameter which did not declare position (? instead of, e.g., ?1)"
                        .to_string(),
                ));
            }
            tree::ParameterSyntax::Positional {
                position: Some(position),
                ..
            } => ParameterKind::Positional(
                position
                    .parse::<u32>()
                    .map_err(|_| HqlError::numeric_format(position.as_str(), BasicType::Integer))?,
            ),
        };
        let parameter = Parameter {
            kind,
            allow_multi_valued_binding: self.allows_multi_valued_binding(),
        };
        self.parameters.push(parameter.clone());
        Ok(parameter)
    }

    fn visit_binary(
        &mut self,
        lhs: &tree::Expression,
        operator: &tree::Terminal,
        rhs: &tree::Expression,
    ) -> HqlResult<Expression> {
        let operator = match operator.kind {
            TokenKind::Plus => ArithmeticOperator::Add,
            TokenKind::Minus => ArithmeticOperator::Subtract,
            TokenKind::Star => ArithmeticOperator::Multiply,
            TokenKind::Slash => ArithmeticOperator::Divide,
            TokenKind::Percent => {
                let lhs = self.visit_expression(lhs)?;
                let rhs = self.visit_expression(rhs)?;
                let expected = lhs.ty.clone();
                return self.generate_function("mod", vec![lhs, rhs], Some(&expected));
            }
            other => {
                return Err(HqlError::Parsing(format!(
                    "Unexpected arithmetic operator [{}] of kind {:?}",
                    operator.text, other
                )));
            }
        };
        let lhs = self.visit_expression(lhs)?;
        let rhs = self.visit_expression(rhs)?;
        let ty = operator.result_type(&lhs.ty, &rhs.ty);
        Ok(Expression::new(
            ExpressionKind::BinaryArithmetic {
                operator,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        ))
    }

    fn visit_simple_case(
        &mut self,
        operand: &tree::Expression,
        whens: &[(tree::Expression, tree::Expression)],
        otherwise: Option<&tree::Expression>,
    ) -> HqlResult<Expression> {
        let operand = self.visit_expression(operand)?;
        let mut resolved = Vec::with_capacity(whens.len());
        for (test, result) in whens {
            let test = match self.enum_shorthand_for(test, &operand.ty)? {
                Some(constant) => constant,
                None => self.visit_expression(test)?,
            };
            resolved.push((test, self.visit_expression(result)?));
        }
        let otherwise = otherwise
            .map(|expression| self.visit_expression(expression))
            .transpose()?;
        let ty = case_type(
            resolved.iter().map(|(_, result)| result),
            otherwise.as_ref(),
        );
        Ok(Expression::new(
            ExpressionKind::SimpleCase(SimpleCase {
                operand: Box::new(operand),
                whens: resolved,
                otherwise: otherwise.map(Box::new),
            }),
            ty,
        ))
    }

    fn visit_searched_case(
        &mut self,
        whens: &[(tree::Predicate, tree::Expression)],
        otherwise: Option<&tree::Expression>,
    ) -> HqlResult<Expression> {
        let mut resolved = Vec::with_capacity(whens.len());
        for (predicate, result) in whens {
            let predicate = self.visit_predicate(predicate)?;
            resolved.push((predicate, self.visit_expression(result)?));
        }
        let otherwise = otherwise
            .map(|expression| self.visit_expression(expression))
            .transpose()?;
        let ty = case_type(
            resolved.iter().map(|(_, result)| result),
            otherwise.as_ref(),
        );
        Ok(Expression::new(
            ExpressionKind::SearchedCase(SearchedCase {
                whens: resolved,
                otherwise: otherwise.map(Box::new),
            }),
            ty,
        ))
    }

    fn visit_entity_type(&mut self, argument: &tree::EntityTypeArgument) -> HqlResult<Expression> {
        match argument {
            tree::EntityTypeArgument::Parameter(parameter) => {
                let parameter = self.visit_parameter(parameter)?;
                Ok(Expression::new(
                    ExpressionKind::ParameterizedEntityType(parameter),
                    SemanticType::Unknown,
                ))
            }
            tree::EntityTypeArgument::Path(path) => {
                let path = self.visit_domain_path(path)?;
                let name = match &path.source {
                    PathSource::Entity(entity) => entity.name.clone(),
                    PathSource::Polymorphic { name, .. } => name.clone(),
                    other => {
                        return Err(HqlError::Semantic(format!(
                            "Argument of type() must be an entity-valued path, but [{}] is a {}",
                            path.navigable_path,
                            other.describe()
                        )));
                    }
                };
                Ok(Expression::new(
                    ExpressionKind::EntityTypeOf(path),
                    SemanticType::EntityType(name),
                ))
            }
        }
    }

    fn visit_entity_reference(
        &mut self,
        function: tree::EntityReferenceFunction,
        path: &tree::Path,
        continuation: Option<&tree::DottedName>,
    ) -> HqlResult<Expression> {
        if function == tree::EntityReferenceFunction::NaturalId {
            return Err(HqlError::NotYetImplemented(
                "Support for HQL natural-id references not yet implemented".to_string(),
            ));
        }
        let path = self.visit_domain_path(path)?;
        let Some(entity) = path.source.entity().cloned() else {
            return Err(HqlError::Semantic(format!(
                "Path does not reference an identifiable-type : {}",
                path.navigable_path
            )));
        };

        let attribute = match function {
            tree::EntityReferenceFunction::Id => {
                let id = self.inherited(&entity, |e| e.id_attribute.clone()).ok_or_else(|| {
                    HqlError::Semantic(format!(
                        "Entity `{}` does not declare an identifier attribute",
                        entity.name
                    ))
                })?;
                if continuation.is_some() {
                    return Err(HqlError::NotYetImplemented(
                        "Path continuation from `id()` reference not yet implemented".to_string(),
                    ));
                }
                id
            }
            _ => self
                .inherited(&entity, |e| e.version_attribute.clone())
                .ok_or_else(|| {
                    HqlError::Semantic(format!(
                        "`{}` resolved to an identifiable-type (`{}`) which does not define a version",
                        path.navigable_path, entity.name
                    ))
                })?,
        };

        let reference = self.navigate(&path, &attribute)?;
        let part = match continuation {
            Some(rest) => self.with_consumer(PathConsumer::continuing(reference), |builder| {
                builder.consume_dotted_name(rest)
            })?,
            None => PathPart::Path(reference),
        };
        path_part_expression(part)
    }

    /// Looks a property up on an entity and its supertypes.
    fn inherited(
        &self,
        entity: &Arc<EntityType>,
        property: impl Fn(&EntityType) -> Option<Arc<str>>,
    ) -> Option<Arc<str>> {
        let mut current = Some(entity.clone());
        while let Some(entity) = current {
            if let Some(value) = property(entity.as_ref()) {
                return Some(value);
            }
            current = entity
                .supertype
                .as_deref()
                .and_then(|supertype| self.model.entity(supertype));
        }
        None
    }

    fn visit_collection_function(
        &mut self,
        kind: tree::CollectionFunctionKind,
        path: &tree::Path,
    ) -> HqlResult<Expression> {
        use tree::CollectionFunctionKind as Kind;

        match kind {
            Kind::Size => {
                let collection = self.visit_domain_path(path)?;
                self.plural_of(&collection).ok_or_else(|| {
                    HqlError::Semantic(format!(
                        "size() function can only be applied to plural paths; specified path [{}] is not plural",
                        collection.navigable_path
                    ))
                })?;
                Ok(Expression::new(
                    ExpressionKind::CollectionSize(collection),
                    SemanticType::Basic(BasicType::Integer),
                ))
            }
            Kind::Index => self.visit_index_function(path),
            Kind::MaxElement | Kind::MinElement | Kind::MaxIndex | Kind::MinIndex => {
                let function = match kind {
                    Kind::MaxElement => "maxelement",
                    Kind::MinElement => "minelement",
                    Kind::MaxIndex => "maxindex",
                    _ => "minindex",
                };
                self.check_compliance(ComplianceViolation::HqlCollectionFunction, || {
                    format!("use of HQL collection function {}()", function)
                })?;
                let collection = self.visit_domain_path(path)?;
                let plural = self.plural_of(&collection).ok_or_else(|| {
                    HqlError::Semantic(format!(
                        "{}() function can only be applied to plural paths; specified path [{}] is not plural",
                        function, collection.navigable_path
                    ))
                })?;
                let indexed = matches!(kind, Kind::MaxIndex | Kind::MinIndex);
                let source = if indexed {
                    if !plural.classification.is_indexed() {
                        return Err(HqlError::Semantic(format!(
                            "{}() function can only be applied to path expressions which resolve to an indexed collection (list,map); specified path [{}] resolved to {:?}",
                            function, collection.navigable_path, plural.classification
                        )));
                    }
                    match &plural.index {
                        Some(index) => self.value_source(index)?,
                        None => PathSource::Basic(SemanticType::Basic(BasicType::Integer)),
                    }
                } else {
                    self.value_source(&plural.element)?
                };
                let navigable_path = collection.navigable_path.wrap(function);
                let collection = Box::new(collection);
                let kind = match kind {
                    Kind::MaxElement => PathKind::MaxElement { collection },
                    Kind::MinElement => PathKind::MinElement { collection },
                    Kind::MaxIndex => PathKind::MaxIndex { collection },
                    _ => PathKind::MinIndex { collection },
                };
                Ok(Expression::path(Path {
                    kind,
                    navigable_path,
                    source,
                }))
            }
        }
    }

    /// `index(alias)` of a list or map join.
    fn visit_index_function(&mut self, path: &tree::Path) -> HqlResult<Expression> {
        let alias = match path {
            tree::Path::Simple(name) if name.is_simple() => name.text(),
            other => {
                return Err(HqlError::Parsing(format!(
                    "index() expects an identification variable, but found : {}",
                    other.text()
                )));
            }
        };
        let id = self.find_from_by_alias(&alias).ok_or_else(|| {
            HqlError::Parsing(format!(
                "Could not resolve identification variable [{}] to SqmFrom",
                alias
            ))
        })?;
        let join = self.from_path(id);
        let plural = self.plural_of(&join).ok_or_else(|| {
            HqlError::Parsing(format!(
                "Could not resolve identification variable [{}] as plural-attribute",
                alias
            ))
        })?;
        if plural.classification != CollectionClassification::List
            && plural.classification != CollectionClassification::Map
        {
            return Err(HqlError::Semantic(format!(
                "index() function can only be applied to identification variables which resolve to an indexed collection (list,map); [{}] resolved to {:?}",
                alias, plural.classification
            )));
        }
        Ok(Expression::path(self.collection_index_path(join, &plural)?))
    }

    pub(super) fn visit_subquery(&mut self, query: &tree::QueryExpression) -> HqlResult<SubQuery> {
        let query_part = self.with_processing_state(StateKind::SubQuery, |builder| {
            builder.with_consumer(PathConsumer::basic(), |builder| {
                builder.visit_query_expression(query)
            })
        })?;
        Ok(SubQuery { query_part })
    }

    // Enum shorthand

    /// A bare identifier that is neither an alias nor an exposed attribute
    /// may name a constant of the enum on the other side of a comparison.
    pub(super) fn enum_shorthand_candidate<'e>(
        &self,
        expression: &'e tree::Expression,
    ) -> HqlResult<Option<&'e str>> {
        let Some(name) = expression.as_dotted_name() else {
            return Ok(None);
        };
        if !name.is_simple() {
            return Ok(None);
        }
        let text = name.parts[0].text.as_str();
        if self.find_from_by_alias(text).is_some() || self.find_from_exposing(text)?.is_some() {
            return Ok(None);
        }
        Ok(Some(text))
    }

    pub(super) fn enum_constant(&self, text: &str, ty: &SemanticType) -> Option<Expression> {
        let SemanticType::Enum(enum_type) = ty else {
            return None;
        };
        let constant = self
            .model
            .allowed_enum_literal_texts()
            .get(text)?
            .get(enum_type)?
            .clone();
        debug!(constant = text, %enum_type, "resolved enum shorthand");
        Some(Expression::new(
            ExpressionKind::EnumLiteral(constant),
            SemanticType::Enum(enum_type.clone()),
        ))
    }

    /// Resolves `expression` as a constant of the enum typed `ty`, if it is one.
    pub(super) fn enum_shorthand_for(
        &self,
        expression: &tree::Expression,
        ty: &SemanticType,
    ) -> HqlResult<Option<Expression>> {
        if !matches!(ty, SemanticType::Enum(_)) {
            return Ok(None);
        }
        Ok(self
            .enum_shorthand_candidate(expression)?
            .and_then(|text| self.enum_constant(text, ty)))
    }
}

pub(super) fn path_part_expression(part: PathPart) -> HqlResult<Expression> {
    match part {
        PathPart::Path(path) => Ok(Expression::path(path)),
        PathPart::EnumLiteral(constant) => {
            let ty = SemanticType::Enum(constant.enum_type.clone());
            Ok(Expression::new(ExpressionKind::EnumLiteral(constant), ty))
        }
        PathPart::EntityTypeLiteral(entity) => {
            let ty = SemanticType::EntityType(entity.name.clone());
            Ok(Expression::new(ExpressionKind::EntityTypeLiteral(entity), ty))
        }
        PathPart::Pending(text) => Err(HqlError::Resolution(format!(
            "Could not interpret path expression '{}'",
            text
        ))),
    }
}

pub(super) fn collate(expression: Expression, collation: &tree::DottedName) -> Expression {
    let ty = expression.ty.clone();
    Expression::new(
        ExpressionKind::Collate {
            expression: Box::new(expression),
            collation: Arc::from(collation.text()),
        },
        ty,
    )
}

/// A subquery with a single selection has that selection's type.
pub(super) fn subquery_type(subquery: &SubQuery) -> SemanticType {
    match subquery.query_part.first_spec().select.selections.as_slice() {
        [selection] => selection.semantic_type(),
        _ => SemanticType::Unknown,
    }
}

/// The first result with a known type.
fn case_type<'e>(
    results: impl Iterator<Item = &'e Expression>,
    otherwise: Option<&'e Expression>,
) -> SemanticType {
    results
        .chain(otherwise)
        .map(|expression| &expression.ty)
        .find(|ty| !ty.is_unknown())
        .cloned()
        .unwrap_or(SemanticType::Unknown)
}

fn duration_unit(unit: &tree::Ident) -> HqlResult<TemporalUnit> {
    match unit.text.to_ascii_lowercase().as_str() {
        "year" => Ok(TemporalUnit::Year),
        "quarter" => Ok(TemporalUnit::Quarter),
        "month" => Ok(TemporalUnit::Month),
        "week" => Ok(TemporalUnit::Week),
        "day" => Ok(TemporalUnit::Day),
        "hour" => Ok(TemporalUnit::Hour),
        "minute" => Ok(TemporalUnit::Minute),
        "second" => Ok(TemporalUnit::Second),
        "nanosecond" => Ok(TemporalUnit::Nanosecond),
        other => Err(HqlError::Parsing(format!(
            "Unsupported duration unit [{}]",
            other
        ))),
    }
}
