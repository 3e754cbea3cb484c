use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{
    Attribute, AttributeKind, CollectionClassification, EmbeddableType, EntityReference,
    EntityType, EnumConstant, LoadedClass, ManagedType, PluralAttribute, ValueType,
};
use super::{DomainModel, EnumLiteralTexts};
use crate::error::{HqlError, HqlResult};

// Definitions

/// Serializable description of a domain model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
    #[serde(default)]
    pub embeddables: Vec<EmbeddableDefinition>,
    #[serde(default)]
    pub enums: Vec<EnumDefinition>,
    /// Importable short names for non-entity classes.
    #[serde(default)]
    pub imports: HashMap<String, String>,
    /// Classes available for dynamic instantiation.
    #[serde(default)]
    pub classes: Vec<String>,
    /// Unmapped names and the entities implementing them.
    #[serde(default)]
    pub polymorphic: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(default)]
    pub supertype: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddableDefinition {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDefinition {
    /// Fully qualified class name.
    pub name: String,
    pub constants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    /// Singular value type, or the element type of a collection.
    #[serde(rename = "type")]
    pub value: ValueType,
    #[serde(default)]
    pub collection: Option<CollectionClassification>,
    #[serde(default)]
    pub index: Option<ValueType>,
}

// Model

/// In-memory [`DomainModel`] built from a [`ModelDefinition`].
#[derive(Debug, Default)]
pub struct StaticDomainModel {
    entities: HashMap<Arc<str>, Arc<EntityType>>,
    entity_names_by_class: HashMap<Arc<str>, Arc<str>>,
    embeddables: HashMap<Arc<str>, Arc<EmbeddableType>>,
    imports: HashMap<String, String>,
    classes: HashSet<String>,
    polymorphic: HashMap<String, Vec<Arc<str>>>,
    enum_literal_texts: EnumLiteralTexts,
}

impl StaticDomainModel {
    pub fn from_json(json: &str) -> HqlResult<Self> {
        let definition: ModelDefinition = serde_json::from_str(json)?;
        Self::from_definition(definition)
    }

    pub fn from_file(path: impl AsRef<Path>) -> HqlResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| HqlError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Entity names, sorted.
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.keys().map(|name| name.to_string()).collect();
        names.sort();
        names
    }

    pub fn from_definition(definition: ModelDefinition) -> HqlResult<Self> {
        let mut model = StaticDomainModel::default();

        let enum_names: HashSet<&str> = definition.enums.iter().map(|e| e.name.as_str()).collect();
        let entity_names: HashSet<&str> =
            definition.entities.iter().map(|e| e.name.as_str()).collect();
        let embeddable_names: HashSet<&str> =
            definition.embeddables.iter().map(|e| e.name.as_str()).collect();

        let check_value = |owner: &str, value: &ValueType| -> HqlResult<()> {
            let known = match value {
                ValueType::Basic(_) => true,
                ValueType::Enum(name) => enum_names.contains(&**name),
                ValueType::Entity(name) => entity_names.contains(&**name),
                ValueType::Embeddable(name) => embeddable_names.contains(&**name),
            };
            if known {
                Ok(())
            } else {
                Err(HqlError::Config(format!(
                    "Attribute of '{}' references unknown type {:?}",
                    owner, value
                )))
            }
        };

        for definition in &definition.embeddables {
            let attributes = build_attributes(&definition.name, &definition.attributes, &check_value)?;
            let name: Arc<str> = Arc::from(definition.name.as_str());
            model.embeddables.insert(
                name.clone(),
                Arc::new(EmbeddableType { name, attributes }),
            );
        }

        for definition in &definition.entities {
            if let Some(supertype) = &definition.supertype
                && !entity_names.contains(supertype.as_str())
            {
                return Err(HqlError::Config(format!(
                    "Entity '{}' extends unknown entity '{}'",
                    definition.name, supertype
                )));
            }
            let attributes = build_attributes(&definition.name, &definition.attributes, &check_value)?;
            let name: Arc<str> = Arc::from(definition.name.as_str());
            let class_name: Arc<str> = Arc::from(definition.class_name.as_str());
            let entity = EntityType {
                name: name.clone(),
                class_name: class_name.clone(),
                supertype: definition.supertype.as_deref().map(Arc::from),
                id_attribute: definition.id.as_deref().map(Arc::from),
                version_attribute: definition.version.as_deref().map(Arc::from),
                attributes,
            };
            model.entity_names_by_class.insert(class_name, name.clone());
            model.entities.insert(name, Arc::new(entity));
        }

        for (name, implementors) in &definition.polymorphic {
            let mut resolved = Vec::with_capacity(implementors.len());
            for implementor in implementors {
                if !entity_names.contains(implementor.as_str()) {
                    return Err(HqlError::Config(format!(
                        "Polymorphic name '{}' lists unknown entity '{}'",
                        name, implementor
                    )));
                }
                resolved.push(Arc::from(implementor.as_str()));
            }
            model.polymorphic.insert(name.clone(), resolved);
        }

        for definition in &definition.enums {
            let enum_type: Arc<str> = Arc::from(definition.name.as_str());
            let simple_name = definition.name.rsplit('.').next().unwrap_or(&definition.name);
            for (ordinal, constant) in definition.constants.iter().enumerate() {
                let value = EnumConstant {
                    enum_type: enum_type.clone(),
                    name: Arc::from(constant.as_str()),
                    ordinal: ordinal as u32,
                };
                for text in [
                    constant.clone(),
                    format!("{}.{}", simple_name, constant),
                    format!("{}.{}", definition.name, constant),
                ] {
                    model
                        .enum_literal_texts
                        .entry(text)
                        .or_default()
                        .insert(enum_type.clone(), value.clone());
                }
            }
        }

        model.imports = definition.imports;
        model.classes = definition.classes.into_iter().collect();

        debug!(
            entities = model.entities.len(),
            embeddables = model.embeddables.len(),
            "Built static domain model"
        );
        Ok(model)
    }

    fn implementor_entities(&self, names: &[Arc<str>]) -> Vec<Arc<EntityType>> {
        names
            .iter()
            .filter_map(|name| self.entities.get(name).cloned())
            .collect()
    }
}

fn build_attributes(
    owner: &str,
    definitions: &[AttributeDefinition],
    check_value: &impl Fn(&str, &ValueType) -> HqlResult<()>,
) -> HqlResult<Vec<Attribute>> {
    let declaring_type: Arc<str> = Arc::from(owner);
    let mut attributes = Vec::with_capacity(definitions.len());
    for definition in definitions {
        check_value(owner, &definition.value)?;
        let kind = match definition.collection {
            Some(classification) => {
                if let Some(index) = &definition.index {
                    check_value(owner, index)?;
                }
                if classification == CollectionClassification::Map && definition.index.is_none() {
                    return Err(HqlError::Config(format!(
                        "Map attribute '{}.{}' must declare an index type",
                        owner, definition.name
                    )));
                }
                AttributeKind::Plural(PluralAttribute {
                    classification,
                    element: definition.value.clone(),
                    index: definition.index.clone(),
                })
            }
            None => AttributeKind::Singular(definition.value.clone()),
        };
        attributes.push(Attribute {
            name: Arc::from(definition.name.as_str()),
            declaring_type: declaring_type.clone(),
            kind,
        });
    }
    Ok(attributes)
}

impl DomainModel for StaticDomainModel {
    fn resolve_entity(&self, name: &str) -> Option<EntityReference> {
        if let Some(entity) = self.entity(&self.qualify_importable_name(name)) {
            return Some(EntityReference::Entity(entity));
        }
        self.polymorphic
            .get(name)
            .map(|implementors| EntityReference::Polymorphic {
                name: Arc::from(name),
                implementors: self.implementor_entities(implementors),
            })
    }

    fn qualify_importable_name(&self, name: &str) -> String {
        match self.imports.get(name) {
            Some(qualified) => qualified.clone(),
            None => name.to_string(),
        }
    }

    fn entity(&self, qualified_name: &str) -> Option<Arc<EntityType>> {
        if let Some(entity) = self.entities.get(qualified_name) {
            return Some(entity.clone());
        }
        self.entity_names_by_class
            .get(qualified_name)
            .and_then(|name| self.entities.get(name))
            .cloned()
    }

    fn embeddable(&self, name: &str) -> Option<Arc<EmbeddableType>> {
        self.embeddables.get(name).cloned()
    }

    fn find_attribute(&self, owner: &ManagedType, name: &str) -> Option<Attribute> {
        match owner {
            ManagedType::Embeddable(embeddable) => embeddable.declared_attribute(name).cloned(),
            ManagedType::Entity(entity) => {
                let mut current = Some(entity.clone());
                while let Some(entity) = current {
                    if let Some(attribute) = entity.declared_attribute(name) {
                        return Some(attribute.clone());
                    }
                    current = entity.supertype.as_deref().and_then(|sup| self.entity(sup));
                }
                None
            }
        }
    }

    fn allowed_enum_literal_texts(&self) -> &EnumLiteralTexts {
        &self.enum_literal_texts
    }

    fn load_class(&self, name: &str) -> Option<LoadedClass> {
        if self.classes.contains(name) || self.entity_names_by_class.contains_key(name) {
            return Some(LoadedClass {
                name: Arc::from(name),
            });
        }
        self.entity(name).map(|entity| LoadedClass {
            name: entity.class_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BasicType;
    use pretty_assertions::assert_eq;

    const MODEL: &str = r#"{
        "entities": [
            { "name": "Animal", "class": "zoo.Animal", "id": "id",
              "attributes": [
                { "name": "id", "type": { "basic": "Long" } },
                { "name": "status", "type": { "enum": "zoo.Status" } }
              ] },
            { "name": "Dog", "class": "zoo.Dog", "supertype": "Animal",
              "attributes": [ { "name": "breed", "type": { "basic": "String" } } ] }
        ],
        "enums": [ { "name": "zoo.Status", "constants": ["ACTIVE", "RETIRED"] } ],
        "imports": { "Summary": "zoo.Summary" },
        "classes": ["zoo.Summary"],
        "polymorphic": { "Pet": ["Dog"] }
    }"#;

    #[test]
    fn inherited_attributes_are_found() {
        let model = StaticDomainModel::from_json(MODEL).unwrap();
        let dog = model.entity("Dog").unwrap();
        let attribute = model
            .find_attribute(&ManagedType::Entity(dog), "id")
            .unwrap();
        assert_eq!(&*attribute.declaring_type, "Animal");
        assert_eq!(
            attribute.kind,
            AttributeKind::Singular(ValueType::Basic(BasicType::Long))
        );
    }

    #[test]
    fn entities_resolve_by_name_and_class() {
        let model = StaticDomainModel::from_json(MODEL).unwrap();
        assert!(matches!(model.resolve_entity("Animal"), Some(EntityReference::Entity(_))));
        match model.resolve_entity("zoo.Dog") {
            Some(EntityReference::Entity(entity)) => assert_eq!(&*entity.name, "Dog"),
            other => panic!("Expected entity, got {:?}", other),
        }
        assert!(matches!(
            model.resolve_entity("Pet"),
            Some(EntityReference::Polymorphic { .. })
        ));
        assert!(model.resolve_entity("Plant").is_none());
    }

    #[test]
    fn enum_texts_cover_simple_and_qualified_forms() {
        let model = StaticDomainModel::from_json(MODEL).unwrap();
        let texts = model.allowed_enum_literal_texts();
        for text in ["ACTIVE", "Status.ACTIVE", "zoo.Status.ACTIVE"] {
            let candidates = texts.get(text).unwrap();
            assert_eq!(&*candidates[&Arc::<str>::from("zoo.Status")].name, "ACTIVE");
        }
        assert_eq!(texts["RETIRED"][&Arc::<str>::from("zoo.Status")].ordinal, 1);
    }

    #[test]
    fn importable_classes_load() {
        let model = StaticDomainModel::from_json(MODEL).unwrap();
        let qualified = model.qualify_importable_name("Summary");
        assert_eq!(qualified, "zoo.Summary");
        assert!(model.load_class(&qualified).is_some());
        assert!(model.load_class("zoo.Missing").is_none());
    }

    #[test]
    fn unknown_attribute_types_are_rejected() {
        let json = r#"{ "entities": [ { "name": "A", "class": "x.A",
            "attributes": [ { "name": "b", "type": { "entity": "B" } } ] } ] }"#;
        let err = StaticDomainModel::from_json(json).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
