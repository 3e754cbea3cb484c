//! Path resolution.
//!
//! Dotted identifier sequences are fed one identifier at a time to the path
//! consumer on top of the builder's consumer stack. What a consumer does with
//! them depends on where the path appears:
//!
//! - [`PathConsumer::Basic`] resolves aliases, attributes, entity names and
//!   enum constants for ordinary expressions.
//! - [`PathConsumer::QualifiedJoin`] creates the joins named by a join target.
//! - [`PathConsumer::JoinPredicate`] resolves like `Basic` but only accepts
//!   from-elements rooted in the join's own root.

use std::sync::Arc;

use tracing::trace;

use super::builder::{SemanticQueryBuilder, TreatHandler};
use super::compliance::ComplianceViolation;
use crate::domain::{
    BasicType, CollectionClassification, EntityReference, EntityType, EnumConstant, ManagedType,
    PluralAttribute, SemanticType,
};
use crate::error::{HqlError, HqlResult};
use crate::hql::tree;
use crate::sqm::{
    ComparisonOperator, Expression, FromId, FromKind, JoinType, NavigablePath, Path, PathKind,
    PathSource, Predicate,
};

/// The result of consuming (part of) a path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PathPart {
    Path(Path),
    EnumLiteral(EnumConstant),
    EntityTypeLiteral(Arc<EntityType>),
    /// A dotted prefix that did not resolve yet, e.g. `zoo` of `zoo.Status.ACTIVE`.
    Pending(String),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BasicConsumer {
    /// Fixed base for continuations such as `treat(..).x` or `value(..).y`.
    start: Option<PathPart>,
    current: Option<PathPart>,
}

#[derive(Debug, Clone)]
pub(crate) struct QualifiedJoinConsumer {
    /// Root of the from-space the join belongs to.
    root: FromId,
    join_type: JoinType,
    fetch: bool,
    alias: Option<Arc<str>>,
    current: Option<JoinPart>,
}

#[derive(Debug, Clone)]
enum JoinPart {
    From(FromId),
    EntityName(String),
}

#[derive(Debug, Clone)]
pub(crate) struct JoinPredicateConsumer {
    join: FromId,
    basic: BasicConsumer,
}

#[derive(Debug, Clone)]
pub(crate) enum PathConsumer {
    Basic(BasicConsumer),
    QualifiedJoin(QualifiedJoinConsumer),
    JoinPredicate(JoinPredicateConsumer),
}

impl PathConsumer {
    pub fn basic() -> Self {
        PathConsumer::Basic(BasicConsumer::default())
    }

    /// A basic consumer whose first identifier navigates from `base`.
    pub fn continuing(base: Path) -> Self {
        PathConsumer::Basic(BasicConsumer {
            start: Some(PathPart::Path(base)),
            current: None,
        })
    }

    pub fn qualified_join(
        root: FromId,
        join_type: JoinType,
        fetch: bool,
        alias: Option<Arc<str>>,
    ) -> Self {
        PathConsumer::QualifiedJoin(QualifiedJoinConsumer {
            root,
            join_type,
            fetch,
            alias,
            current: None,
        })
    }

    /// A join consumer that continues from an existing from-element.
    pub fn qualified_join_from(lhs: FromId, root: FromId, alias: Option<Arc<str>>) -> Self {
        PathConsumer::QualifiedJoin(QualifiedJoinConsumer {
            root,
            join_type: JoinType::Inner,
            fetch: false,
            alias,
            current: Some(JoinPart::From(lhs)),
        })
    }

    pub fn join_predicate(join: FromId) -> Self {
        PathConsumer::JoinPredicate(JoinPredicateConsumer {
            join,
            basic: BasicConsumer::default(),
        })
    }
}

impl SemanticQueryBuilder<'_> {
    // Consumer protocol

    pub(super) fn consume_identifier(
        &mut self,
        identifier: &str,
        is_base: bool,
        is_terminal: bool,
    ) -> HqlResult<()> {
        let mut consumer = self
            .consumers
            .pop()
            .ok_or_else(|| HqlError::Parsing("No path consumer is active".to_string()))?;
        trace!(identifier, is_base, is_terminal, "consuming path identifier");
        let result = match &mut consumer {
            PathConsumer::Basic(basic) => {
                self.consume_basic(basic, identifier, is_base, is_terminal, None)
            }
            PathConsumer::JoinPredicate(predicate) => {
                let join = predicate.join;
                self.consume_basic(&mut predicate.basic, identifier, is_base, is_terminal, Some(join))
            }
            PathConsumer::QualifiedJoin(join) => {
                self.consume_join_identifier(join, identifier, is_base, is_terminal)
            }
        };
        self.consumers.push(consumer);
        result
    }

    pub(super) fn consumed_part(&self) -> HqlResult<PathPart> {
        let missing = || HqlError::Parsing("Path consumer produced no path".to_string());
        match self.consumers.last().ok_or_else(missing)? {
            PathConsumer::Basic(basic) => basic.current.clone().ok_or_else(missing),
            PathConsumer::JoinPredicate(predicate) => {
                predicate.basic.current.clone().ok_or_else(missing)
            }
            PathConsumer::QualifiedJoin(join) => match &join.current {
                Some(JoinPart::From(id)) => Ok(PathPart::Path(self.from_path(*id))),
                Some(JoinPart::EntityName(name)) => Err(HqlError::Resolution(format!(
                    "Could not resolve join path - {}",
                    name
                ))),
                None => Err(missing()),
            },
        }
    }

    /// Feeds every part of `name` to the current consumer.
    pub(super) fn consume_dotted_name(&mut self, name: &tree::DottedName) -> HqlResult<PathPart> {
        let last = name.parts.len().saturating_sub(1);
        for (index, part) in name.parts.iter().enumerate() {
            self.consume_identifier(&part.text, index == 0, index == last)?;
        }
        self.consumed_part()
    }

    fn consume_basic(
        &mut self,
        consumer: &mut BasicConsumer,
        identifier: &str,
        is_base: bool,
        is_terminal: bool,
        join_root_of: Option<FromId>,
    ) -> HqlResult<()> {
        let current = if is_base {
            consumer.current = None;
            consumer.start.clone()
        } else {
            consumer.current.take()
        };
        let next = match current {
            Some(part) => self.resolve_path_part(part, identifier)?,
            None if is_base => self.resolve_base_identifier(identifier, join_root_of)?,
            None => {
                return Err(HqlError::Parsing(format!(
                    "Path continuation [{}] without a base",
                    identifier
                )));
            }
        };
        consumer.current = Some(if is_terminal {
            self.resolve_terminal(next)?
        } else {
            next
        });
        Ok(())
    }

    fn resolve_base_identifier(
        &mut self,
        identifier: &str,
        join_root_of: Option<FromId>,
    ) -> HqlResult<PathPart> {
        if let Some(id) = self.find_from_by_alias(identifier) {
            if let Some(join) = join_root_of {
                self.validate_join_predicate_root(id, join)?;
            }
            return Ok(PathPart::Path(self.from_path(id)));
        }
        if let Some(id) = self.find_from_exposing(identifier)? {
            if let Some(join) = join_root_of {
                self.validate_join_predicate_root(id, join)?;
            }
            let base = self.from_path(id);
            return Ok(PathPart::Path(self.navigate(&base, identifier)?));
        }
        Ok(PathPart::Pending(identifier.to_string()))
    }

    fn validate_join_predicate_root(&self, id: FromId, join: FromId) -> HqlResult<()> {
        let referenced = self.froms.get(id);
        let join_element = self.froms.get(join);
        if referenced.root != join_element.root {
            return Err(HqlError::Semantic(format!(
                "Qualified join predicate referred to from-element [{}] not rooted in the join's root [{}]",
                referenced.navigable_path,
                self.froms.get(join_element.root).navigable_path
            )));
        }
        Ok(())
    }

    fn resolve_path_part(&mut self, part: PathPart, identifier: &str) -> HqlResult<PathPart> {
        match part {
            PathPart::Path(path) => Ok(PathPart::Path(self.navigate(&path, identifier)?)),
            PathPart::Pending(prefix) => Ok(PathPart::Pending(format!("{}.{}", prefix, identifier))),
            PathPart::EnumLiteral(constant) => Err(HqlError::Semantic(format!(
                "Enum literal [{}.{}] cannot be dereferenced : {}",
                constant.enum_type, constant.name, identifier
            ))),
            PathPart::EntityTypeLiteral(entity) => Err(HqlError::Semantic(format!(
                "Entity type literal [{}] cannot be dereferenced : {}",
                entity.name, identifier
            ))),
        }
    }

    /// A pending name at the end of a path must be an entity name or an enum constant.
    fn resolve_terminal(&self, part: PathPart) -> HqlResult<PathPart> {
        let PathPart::Pending(text) = part else {
            return Ok(part);
        };
        if let Some(EntityReference::Entity(entity)) = self.model.resolve_entity(&text) {
            return Ok(PathPart::EntityTypeLiteral(entity));
        }
        if text.contains('.')
            && let Some(candidates) = self.model.allowed_enum_literal_texts().get(&text)
            && candidates.len() == 1
            && let Some(constant) = candidates.values().next()
        {
            return Ok(PathPart::EnumLiteral(constant.clone()));
        }
        Err(HqlError::Resolution(format!(
            "Could not interpret path expression '{}'",
            text
        )))
    }

    /// Attribute navigation from an already resolved path.
    pub(super) fn navigate(&self, base: &Path, name: &str) -> HqlResult<Path> {
        let owner = match &base.source {
            PathSource::Entity(entity) => ManagedType::Entity(entity.clone()),
            PathSource::Embeddable(embeddable) => ManagedType::Embeddable(embeddable.clone()),
            PathSource::Polymorphic {
                name: polymorphic,
                implementors,
            } => {
                return self.navigate_polymorphic(base, polymorphic, implementors, name);
            }
            PathSource::Plural(_) => {
                return Err(HqlError::Semantic(format!(
                    "Plural path `{}` may not be dereferenced directly; use element() or an explicit join",
                    base.navigable_path
                )));
            }
            PathSource::Basic(ty) => {
                return Err(HqlError::Semantic(format!(
                    "Basic-valued path `{}` of type {} cannot be dereferenced : {}",
                    base.navigable_path, ty, name
                )));
            }
        };
        let attribute = self.model.find_attribute(&owner, name).ok_or_else(|| {
            HqlError::Resolution(format!(
                "Could not resolve attribute '{}' of '{}'",
                name,
                owner.name()
            ))
        })?;
        Ok(Path {
            source: self.attribute_source(&attribute)?,
            navigable_path: base.navigable_path.append(name),
            kind: PathKind::Attribute {
                lhs: Box::new(base.clone()),
                attribute: attribute.name.clone(),
            },
        })
    }

    /// Attributes of an unmapped polymorphic reference must exist on every implementor.
    fn navigate_polymorphic(
        &self,
        base: &Path,
        polymorphic: &str,
        implementors: &[Arc<EntityType>],
        name: &str,
    ) -> HqlResult<Path> {
        let mut found = None;
        for implementor in implementors {
            let owner = ManagedType::Entity(implementor.clone());
            match self.model.find_attribute(&owner, name) {
                Some(attribute) => found = found.or(Some(attribute)),
                None => {
                    return Err(HqlError::Resolution(format!(
                        "Could not resolve attribute '{}' of '{}'",
                        name, polymorphic
                    )));
                }
            }
        }
        let attribute = found.ok_or_else(|| {
            HqlError::Resolution(format!(
                "Could not resolve attribute '{}' of '{}'",
                name, polymorphic
            ))
        })?;
        Ok(Path {
            source: self.attribute_source(&attribute)?,
            navigable_path: base.navigable_path.append(name),
            kind: PathKind::Attribute {
                lhs: Box::new(base.clone()),
                attribute: attribute.name.clone(),
            },
        })
    }

    // Joins

    fn consume_join_identifier(
        &mut self,
        consumer: &mut QualifiedJoinConsumer,
        identifier: &str,
        is_base: bool,
        is_terminal: bool,
    ) -> HqlResult<()> {
        let alias = if is_terminal { consumer.alias.clone() } else { None };
        let fetch = consumer.fetch && is_terminal;
        let current = if is_base { None } else { consumer.current.take() };

        let next = match current {
            None => {
                if let Some(id) = self.find_from_by_alias(identifier) {
                    if is_terminal {
                        return Err(HqlError::Semantic(format!(
                            "Cannot join to identification variable [{}]",
                            identifier
                        )));
                    }
                    JoinPart::From(id)
                } else if let Some(id) = self.find_from_exposing(identifier)? {
                    JoinPart::From(self.create_attribute_join(
                        id,
                        identifier,
                        consumer.join_type,
                        alias.clone(),
                        fetch,
                        !is_terminal,
                    )?)
                } else {
                    JoinPart::EntityName(identifier.to_string())
                }
            }
            Some(JoinPart::From(lhs)) => JoinPart::From(self.create_attribute_join(
                lhs,
                identifier,
                consumer.join_type,
                alias.clone(),
                fetch,
                !is_terminal,
            )?),
            Some(JoinPart::EntityName(prefix)) => {
                JoinPart::EntityName(format!("{}.{}", prefix, identifier))
            }
        };

        consumer.current = Some(match next {
            JoinPart::EntityName(name) if is_terminal => {
                JoinPart::From(self.create_entity_join(consumer, &name, alias)?)
            }
            other => other,
        });
        Ok(())
    }

    fn create_entity_join(
        &mut self,
        consumer: &QualifiedJoinConsumer,
        name: &str,
        alias: Option<Arc<str>>,
    ) -> HqlResult<FromId> {
        let entity = match self.model.resolve_entity(name) {
            Some(EntityReference::Entity(entity)) => entity,
            Some(EntityReference::Polymorphic { .. }) => {
                return Err(HqlError::Semantic(format!(
                    "Unmapped polymorphic reference cannot be used as a join target : {}",
                    name
                )));
            }
            None => {
                return Err(HqlError::Resolution(format!(
                    "Could not resolve join path - {}",
                    name
                )));
            }
        };
        let navigable_alias = self.navigable_alias(alias.as_ref());
        self.add_from_element(
            FromKind::EntityJoin {
                join_type: consumer.join_type,
            },
            alias,
            NavigablePath::root(&entity.name, &navigable_alias),
            PathSource::Entity(entity),
            Some(consumer.root),
        )
    }

    pub(super) fn create_attribute_join(
        &mut self,
        lhs: FromId,
        name: &str,
        join_type: JoinType,
        alias: Option<Arc<str>>,
        fetched: bool,
        implicit: bool,
    ) -> HqlResult<FromId> {
        let lhs_element = self.froms.get(lhs);
        let owner = lhs_element.source.managed_type().ok_or_else(|| {
            HqlError::Semantic(format!(
                "Cannot join from non-managed path [{}] : {}",
                lhs_element.navigable_path, name
            ))
        })?;
        let attribute = self.model.find_attribute(&owner, name).ok_or_else(|| {
            HqlError::Resolution(format!(
                "Could not resolve attribute '{}' of '{}'",
                name,
                owner.name()
            ))
        })?;
        if !attribute.is_joinable() {
            return Err(HqlError::Semantic(format!(
                "Cannot join to attribute of basic type: {}",
                lhs_element.navigable_path.append(name)
            )));
        }
        let navigable_path = match &alias {
            Some(alias) => lhs_element.navigable_path.append_aliased(name, alias),
            None => lhs_element.navigable_path.append(name),
        };
        let source = match attribute.plural() {
            Some(plural) => self.value_source(&plural.element)?,
            None => self.attribute_source(&attribute)?,
        };
        self.add_from_element(
            FromKind::AttributeJoin {
                attribute,
                join_type,
                fetched,
                implicit,
            },
            alias,
            navigable_path,
            source,
            Some(lhs),
        )
    }

    /// Resolves a qualified join target under the current join consumer.
    pub(super) fn visit_join_target(&mut self, target: &tree::Path) -> HqlResult<FromId> {
        match target {
            tree::Path::Simple(name) => match self.consume_dotted_name(name)? {
                PathPart::Path(Path {
                    kind: PathKind::From(id),
                    ..
                }) => Ok(id),
                _ => Err(HqlError::Semantic(format!(
                    "Could not resolve join path - {}",
                    name.text()
                ))),
            },
            tree::Path::Treated {
                base,
                target: treat_target,
                continuation: None,
                ..
            } => {
                let joined = self.visit_join_target(base)?;
                let base_path = self.from_path(joined);
                self.apply_treat(base_path, treat_target)?;
                Ok(joined)
            }
            other => Err(HqlError::Semantic(format!(
                "Unsupported join target : {}",
                other.text()
            ))),
        }
    }

    // Path syntax

    pub(super) fn visit_path(&mut self, path: &tree::Path) -> HqlResult<PathPart> {
        match path {
            tree::Path::Simple(name) => self.consume_dotted_name(name),
            tree::Path::Treated {
                base,
                target,
                continuation,
                ..
            } => {
                let base = self.visit_domain_path(base)?;
                let treated = self.apply_treat(base, target)?;
                self.continue_path(treated, continuation.as_ref())
            }
            tree::Path::CollectionValue {
                base, continuation, ..
            } => {
                let collection = self.visit_domain_path(base)?;
                let element = self.collection_value_path(collection)?;
                self.continue_path(element, continuation.as_ref())
            }
            tree::Path::MapKey {
                base, continuation, ..
            } => {
                let collection = self.visit_domain_path(base)?;
                let key = self.map_key_path(collection)?;
                self.continue_path(key, continuation.as_ref())
            }
            tree::Path::Indexed {
                base,
                index,
                continuation,
                ..
            } => {
                let indexed = self.visit_indexed_path(base, index)?;
                self.continue_path(indexed, continuation.as_ref())
            }
        }
    }

    /// Like [`visit_path`](Self::visit_path), but requires a domain path.
    pub(super) fn visit_domain_path(&mut self, path: &tree::Path) -> HqlResult<Path> {
        match self.visit_path(path)? {
            PathPart::Path(resolved) => Ok(resolved),
            _ => Err(HqlError::Semantic(format!(
                "Expecting domain-model path, but found : {}",
                path.text()
            ))),
        }
    }

    fn continue_path(
        &mut self,
        base: Path,
        continuation: Option<&tree::DottedName>,
    ) -> HqlResult<PathPart> {
        match continuation {
            Some(rest) => self.with_consumer(PathConsumer::continuing(base), |builder| {
                builder.consume_dotted_name(rest)
            }),
            None => Ok(PathPart::Path(base)),
        }
    }

    pub(super) fn apply_treat(&mut self, base: Path, target: &tree::DottedName) -> HqlResult<Path> {
        let base_entity = match &base.source {
            PathSource::Entity(entity) => Some(entity.clone()),
            PathSource::Polymorphic { .. } => None,
            other => {
                return Err(HqlError::Semantic(format!(
                    "Expecting ManagedType valued path [{}], but found : {}",
                    base.navigable_path,
                    other.describe()
                )));
            }
        };
        let target_name = self.model.qualify_importable_name(&target.text());
        let treated = self.model.entity(&target_name).ok_or_else(|| {
            HqlError::Resolution(format!(
                "Could not resolve treat target entity [{}]",
                target.text()
            ))
        })?;
        if let Some(base_entity) = &base_entity
            && !self.model.is_subtype(&treated, base_entity)
        {
            return Err(HqlError::Semantic(format!(
                "Treat target [{}] is not a subtype of [{}]",
                treated.name, base_entity.name
            )));
        }
        if self.treat_handler() == TreatHandler::FromClause
            && let PathKind::From(id) = base.kind
        {
            self.froms.get_mut(id).treated_as = Some(treated.clone());
        }
        Ok(Path {
            navigable_path: base.navigable_path.treat_as(&treated.name),
            source: PathSource::Entity(treated.clone()),
            kind: PathKind::Treated {
                base: Box::new(base),
                target: treated,
            },
        })
    }

    fn require_plural(&self, path: &Path) -> HqlResult<PluralAttribute> {
        self.plural_of(path).ok_or_else(|| {
            HqlError::Semantic(format!(
                "Illegal attempt to treat non-plural path as a plural path : {}",
                path.navigable_path
            ))
        })
    }

    /// `value(p)` / `elements(p)`
    pub(super) fn collection_value_path(&mut self, collection: Path) -> HqlResult<Path> {
        let plural = self.require_plural(&collection)?;
        if plural.classification != CollectionClassification::Map {
            self.check_compliance(ComplianceViolation::ValueFunctionOnNonMap, || {
                format!(
                    "value() applied to non-map path [{}]",
                    collection.navigable_path
                )
            })?;
        }
        Ok(Path {
            source: self.value_source(&plural.element)?,
            navigable_path: collection.navigable_path.wrap("value"),
            kind: PathKind::Element {
                collection: Box::new(collection),
            },
        })
    }

    /// `key(p)`
    pub(super) fn map_key_path(&mut self, collection: Path) -> HqlResult<Path> {
        let plural = self.require_plural(&collection)?;
        let index = match (&plural.classification, &plural.index) {
            (CollectionClassification::Map, Some(index)) => index,
            _ => {
                return Err(HqlError::Semantic(format!(
                    "Path argument to key() must be a map-valued path : {}",
                    collection.navigable_path
                )));
            }
        };
        Ok(Path {
            source: self.value_source(index)?,
            navigable_path: collection.navigable_path.wrap("key"),
            kind: PathKind::MapKey {
                collection: Box::new(collection),
            },
        })
    }

    /// The index of a list or the key of a map, for joins and plural paths.
    pub(super) fn collection_index_path(
        &self,
        collection: Path,
        plural: &PluralAttribute,
    ) -> HqlResult<Path> {
        match plural.classification {
            CollectionClassification::List => Ok(Path {
                source: PathSource::Basic(plural
                    .index_type()
                    .unwrap_or(SemanticType::Basic(BasicType::Integer))),
                navigable_path: collection.navigable_path.wrap("index"),
                kind: PathKind::ListIndex {
                    collection: Box::new(collection),
                },
            }),
            CollectionClassification::Map => {
                let index = plural.index.as_ref().ok_or_else(|| {
                    HqlError::Semantic(format!(
                        "Map path [{}] has no key type",
                        collection.navigable_path
                    ))
                })?;
                Ok(Path {
                    source: self.value_source(index)?,
                    navigable_path: collection.navigable_path.wrap("key"),
                    kind: PathKind::MapKey {
                        collection: Box::new(collection),
                    },
                })
            }
            other => Err(HqlError::Semantic(format!(
                "Index access is only supported on list or map attributes: {} is a {:?}",
                collection.navigable_path, other
            ))),
        }
    }

    /// `base[index]`: joins the collection and restricts the join to the index.
    fn visit_indexed_path(
        &mut self,
        base: &tree::DottedName,
        index: &tree::Expression,
    ) -> HqlResult<Path> {
        let collection = match self.consume_dotted_name(base)? {
            PathPart::Path(path) => path,
            _ => {
                return Err(HqlError::Semantic(format!(
                    "Expecting domain-model path, but found : {}",
                    base.text()
                )));
            }
        };
        let plural = self.require_plural(&collection)?;
        if !plural.classification.is_indexed() {
            return Err(HqlError::Semantic(format!(
                "Index access is only supported on list or map attributes: {}",
                collection.navigable_path
            )));
        }
        let (lhs, name) = match &collection.kind {
            PathKind::Attribute { lhs, attribute } => match lhs.kind {
                PathKind::From(id) => (id, attribute.clone()),
                _ => {
                    return Err(HqlError::Semantic(format!(
                        "Index access requires a collection attribute of a from-element: {}",
                        collection.navigable_path
                    )));
                }
            },
            _ => {
                return Err(HqlError::Semantic(format!(
                    "Index access requires a collection attribute of a from-element: {}",
                    collection.navigable_path
                )));
            }
        };

        let index = self.visit_expression(index)?;
        let join = self.create_attribute_join(lhs, &name, JoinType::Inner, None, false, true)?;
        let join_path = self.from_path(join);
        let index_path = self.collection_index_path(join_path, &plural)?;
        self.froms.get_mut(join).join_predicate = Some(Predicate::Comparison {
            lhs: Expression::path(index_path),
            operator: ComparisonOperator::Equal,
            rhs: index.clone(),
        });

        let join_element = self.froms.get(join);
        Ok(Path {
            navigable_path: join_element.navigable_path.wrap("indexed"),
            source: join_element.source.clone(),
            kind: PathKind::IndexedAccess {
                join,
                index: Box::new(index),
            },
        })
    }
}
