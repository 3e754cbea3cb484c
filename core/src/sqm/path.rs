use std::sync::Arc;

use super::expression::Expression;
use super::from::{FromId, NavigablePath};
use crate::domain::{
    CollectionClassification, EmbeddableType, EntityType, ManagedType, PluralAttribute,
    SemanticType,
};

/// What a path refers to in the domain model.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSource {
    Entity(Arc<EntityType>),
    /// Unmapped name implemented by several entities.
    Polymorphic {
        name: Arc<str>,
        implementors: Vec<Arc<EntityType>>,
    },
    Embeddable(Arc<EmbeddableType>),
    Basic(SemanticType),
    Plural(PluralAttribute),
}

impl PathSource {
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            PathSource::Entity(entity) => SemanticType::Entity(entity.name.clone()),
            PathSource::Polymorphic { name, .. } => SemanticType::Entity(name.clone()),
            PathSource::Embeddable(embeddable) => SemanticType::Embeddable(embeddable.name.clone()),
            PathSource::Basic(ty) => ty.clone(),
            PathSource::Plural(plural) => {
                SemanticType::Collection(Box::new(plural.element.semantic_type()))
            }
        }
    }

    pub fn managed_type(&self) -> Option<ManagedType> {
        match self {
            PathSource::Entity(entity) => Some(ManagedType::Entity(entity.clone())),
            PathSource::Embeddable(embeddable) => Some(ManagedType::Embeddable(embeddable.clone())),
            _ => None,
        }
    }

    pub fn entity(&self) -> Option<&Arc<EntityType>> {
        match self {
            PathSource::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn plural(&self) -> Option<&PluralAttribute> {
        match self {
            PathSource::Plural(plural) => Some(plural),
            _ => None,
        }
    }

    pub fn is_plural(&self) -> bool {
        self.plural().is_some()
    }

    /// A short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            PathSource::Entity(entity) => format!("entity {}", entity.name),
            PathSource::Polymorphic { name, .. } => format!("polymorphic reference {}", name),
            PathSource::Embeddable(embeddable) => format!("embeddable {}", embeddable.name),
            PathSource::Basic(ty) => format!("basic value of type {}", ty),
            PathSource::Plural(plural) => format!(
                "{:?} collection of {}",
                plural.classification,
                plural.element.semantic_type()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathKind {
    /// A root, join or correlation itself.
    From(FromId),
    Attribute {
        lhs: Box<Path>,
        attribute: Arc<str>,
    },
    Treated {
        base: Box<Path>,
        target: Arc<EntityType>,
    },
    /// `value(p)` / `elements(p)`.
    Element {
        collection: Box<Path>,
    },
    /// `key(p)`.
    MapKey {
        collection: Box<Path>,
    },
    /// `index(alias)` of a list join.
    ListIndex {
        collection: Box<Path>,
    },
    /// `p[expr]`, backed by the implicit join it created.
    IndexedAccess {
        join: FromId,
        index: Box<Expression>,
    },
    MaxElement {
        collection: Box<Path>,
    },
    MinElement {
        collection: Box<Path>,
    },
    MaxIndex {
        collection: Box<Path>,
    },
    MinIndex {
        collection: Box<Path>,
    },
}

/// A resolved navigation chain.
///
/// Derived paths own a copy of the path they are layered over and never
/// mutate it. From-elements are referenced by id only; the statement's
/// arena owns them.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub kind: PathKind,
    pub navigable_path: NavigablePath,
    pub source: PathSource,
}

impl Path {
    pub fn from_element(id: FromId, navigable_path: NavigablePath, source: PathSource) -> Self {
        Path {
            kind: PathKind::From(id),
            navigable_path,
            source,
        }
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.source.semantic_type()
    }

    /// The from-element this path is ultimately rooted at.
    pub fn root_from(&self) -> Option<FromId> {
        match &self.kind {
            PathKind::From(id) => Some(*id),
            PathKind::IndexedAccess { join, .. } => Some(*join),
            PathKind::Attribute { lhs: parent, .. }
            | PathKind::Treated { base: parent, .. }
            | PathKind::Element { collection: parent }
            | PathKind::MapKey { collection: parent }
            | PathKind::ListIndex { collection: parent }
            | PathKind::MaxElement { collection: parent }
            | PathKind::MinElement { collection: parent }
            | PathKind::MaxIndex { collection: parent }
            | PathKind::MinIndex { collection: parent } => parent.root_from(),
        }
    }

    /// The path this one was derived from, if any.
    pub fn lhs(&self) -> Option<&Path> {
        match &self.kind {
            PathKind::From(_) | PathKind::IndexedAccess { .. } => None,
            PathKind::Attribute { lhs: parent, .. }
            | PathKind::Treated { base: parent, .. }
            | PathKind::Element { collection: parent }
            | PathKind::MapKey { collection: parent }
            | PathKind::ListIndex { collection: parent }
            | PathKind::MaxElement { collection: parent }
            | PathKind::MinElement { collection: parent }
            | PathKind::MaxIndex { collection: parent }
            | PathKind::MinIndex { collection: parent } => Some(parent),
        }
    }

    pub fn collection_classification(&self) -> Option<CollectionClassification> {
        self.source.plural().map(|plural| plural.classification)
    }
}
