//! # Domain model
//!
//! The read-only view of the persistence metamodel the query compiler resolves
//! names against.

mod model;
mod static_model;
mod types;

use std::collections::HashMap;
use std::sync::Arc;

pub use model::{
    Attribute, AttributeKind, CollectionClassification, EmbeddableType, EntityReference,
    EntityType, EnumConstant, LoadedClass, ManagedType, PluralAttribute, ValueType,
};
pub use static_model::{
    AttributeDefinition, EmbeddableDefinition, EntityDefinition, EnumDefinition,
    ModelDefinition, StaticDomainModel,
};
pub use types::{BasicType, SemanticType};

/// Enum literal texts: text -> (enum class name -> constant).
pub type EnumLiteralTexts = HashMap<String, HashMap<Arc<str>, EnumConstant>>;

/// Lookup interface into the domain metamodel.
///
/// Implementations must be safe to share between independent compilations.
pub trait DomainModel: Send + Sync {
    /// Resolves an entity name as written in a FROM clause. This covers import
    /// names, fully qualified names and unmapped polymorphic names.
    fn resolve_entity(&self, name: &str) -> Option<EntityReference>;

    /// Maps an importable (short) name to its qualified name, or returns the
    /// input unchanged.
    fn qualify_importable_name(&self, name: &str) -> String;

    /// Looks up an entity by entity name or class name.
    fn entity(&self, qualified_name: &str) -> Option<Arc<EntityType>>;

    fn embeddable(&self, name: &str) -> Option<Arc<EmbeddableType>>;

    /// Finds an attribute on a managed type, including inherited attributes.
    fn find_attribute(&self, owner: &ManagedType, name: &str) -> Option<Attribute>;

    fn allowed_enum_literal_texts(&self) -> &EnumLiteralTexts;

    fn load_class(&self, name: &str) -> Option<LoadedClass>;

    fn standard_type_for_java_type(&self, java_type: &str) -> Option<SemanticType> {
        match java_type {
            "java.util.List" | "list" => return Some(SemanticType::List),
            "java.util.Map" | "map" => return Some(SemanticType::Map),
            _ => {}
        }
        BasicType::ALL
            .iter()
            .find(|basic| basic.java_type_name() == java_type)
            .map(|basic| SemanticType::Basic(*basic))
    }

    fn resolve_cast_target_type(&self, name: &str) -> Option<BasicType> {
        let basic = match name.to_ascii_lowercase().as_str() {
            "string" | "varchar" | "char" | "text" => BasicType::String,
            "character" => BasicType::Character,
            "integer" | "int" => BasicType::Integer,
            "long" | "bigint" => BasicType::Long,
            "big_integer" | "biginteger" => BasicType::BigInteger,
            "float" | "real" => BasicType::Float,
            "double" => BasicType::Double,
            "big_decimal" | "bigdecimal" | "decimal" | "numeric" => BasicType::BigDecimal,
            "boolean" => BasicType::Boolean,
            "binary" | "varbinary" => BasicType::Binary,
            "date" | "localdate" => BasicType::LocalDate,
            "time" | "localtime" => BasicType::LocalTime,
            "timestamp" | "localdatetime" => BasicType::LocalDateTime,
            "offsetdatetime" => BasicType::OffsetDateTime,
            "zoneddatetime" => BasicType::ZonedDateTime,
            "instant" => BasicType::Instant,
            "duration" => BasicType::Duration,
            _ => {
                return self
                    .standard_type_for_java_type(name)
                    .and_then(|ty| ty.basic());
            }
        };
        Some(basic)
    }

    /// Whether `sub` is `sup` or one of its subtypes.
    fn is_subtype(&self, sub: &EntityType, sup: &EntityType) -> bool {
        let mut current = Some(sub.name.clone());
        while let Some(name) = current {
            if name == sup.name {
                return true;
            }
            current = self.entity(&name).and_then(|entity| entity.supertype.clone());
        }
        false
    }
}
