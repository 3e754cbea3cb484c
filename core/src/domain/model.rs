use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::types::{BasicType, SemanticType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionClassification {
    Bag,
    Set,
    List,
    Map,
}

impl CollectionClassification {
    /// Lists and maps can be accessed by index or key.
    pub fn is_indexed(self) -> bool {
        matches!(self, CollectionClassification::List | CollectionClassification::Map)
    }
}

/// The value side of a singular attribute, a collection element or a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Basic(BasicType),
    Enum(Arc<str>),
    Entity(Arc<str>),
    Embeddable(Arc<str>),
}

impl ValueType {
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            ValueType::Basic(basic) => SemanticType::Basic(*basic),
            ValueType::Enum(name) => SemanticType::Enum(name.clone()),
            ValueType::Entity(name) => SemanticType::Entity(name.clone()),
            ValueType::Embeddable(name) => SemanticType::Embeddable(name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluralAttribute {
    pub classification: CollectionClassification,
    pub element: ValueType,
    /// List index or map key type.
    pub index: Option<ValueType>,
}

impl PluralAttribute {
    pub fn index_type(&self) -> Option<SemanticType> {
        match (&self.index, self.classification) {
            (Some(index), _) => Some(index.semantic_type()),
            (None, CollectionClassification::List) => Some(SemanticType::Basic(BasicType::Integer)),
            (None, _) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Singular(ValueType),
    Plural(PluralAttribute),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: Arc<str>,
    pub declaring_type: Arc<str>,
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn plural(&self) -> Option<&PluralAttribute> {
        match &self.kind {
            AttributeKind::Plural(plural) => Some(plural),
            AttributeKind::Singular(_) => None,
        }
    }

    pub fn is_plural(&self) -> bool {
        self.plural().is_some()
    }

    /// Entity, embeddable and plural attributes can be joined.
    pub fn is_joinable(&self) -> bool {
        match &self.kind {
            AttributeKind::Singular(ValueType::Entity(_))
            | AttributeKind::Singular(ValueType::Embeddable(_))
            | AttributeKind::Plural(_) => true,
            AttributeKind::Singular(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    /// Entity name, as used in queries.
    pub name: Arc<str>,
    /// Fully qualified class name.
    pub class_name: Arc<str>,
    pub supertype: Option<Arc<str>>,
    pub id_attribute: Option<Arc<str>>,
    pub version_attribute: Option<Arc<str>>,
    pub attributes: Vec<Attribute>,
}

impl EntityType {
    /// Looks up an attribute declared directly on this entity.
    pub fn declared_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| &*attr.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddableType {
    pub name: Arc<str>,
    pub attributes: Vec<Attribute>,
}

impl EmbeddableType {
    pub fn declared_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| &*attr.name == name)
    }
}

/// A type that exposes attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedType {
    Entity(Arc<EntityType>),
    Embeddable(Arc<EmbeddableType>),
}

impl ManagedType {
    pub fn name(&self) -> &str {
        match self {
            ManagedType::Entity(entity) => &entity.name,
            ManagedType::Embeddable(embeddable) => &embeddable.name,
        }
    }
}

/// A constant of a mapped enum type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumConstant {
    /// Fully qualified enum class name.
    pub enum_type: Arc<str>,
    pub name: Arc<str>,
    pub ordinal: u32,
}

/// Result of resolving an entity name in a FROM clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityReference {
    Entity(Arc<EntityType>),
    /// An unmapped name implemented by several entities.
    Polymorphic {
        name: Arc<str>,
        implementors: Vec<Arc<EntityType>>,
    },
}

/// A class made available for dynamic instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedClass {
    pub name: Arc<str>,
}
