//! Processing states.
//!
//! Each query spec, subquery and DML statement gets its own state with a
//! registry of the from-elements and selections it declared. Alias lookups
//! against a registry are local; walking the enclosing states is the
//! builder's job.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::SemanticType;
use crate::error::{HqlError, HqlResult};
use crate::sqm::FromId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateKind {
    Query,
    SubQuery,
    Dml,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RegisteredSelection {
    pub alias: Option<Arc<str>>,
    pub ty: SemanticType,
}

#[derive(Debug, Default)]
pub(crate) struct PathRegistry {
    froms: Vec<FromId>,
    from_by_alias: HashMap<Arc<str>, FromId>,
    selections: Vec<RegisteredSelection>,
}

impl PathRegistry {
    /// Registers a from-element. Aliases must be unique within the registry.
    pub fn register_from(&mut self, id: FromId, alias: Option<&Arc<str>>) -> HqlResult<()> {
        if let Some(alias) = alias {
            if let Some(existing) = self.from_by_alias.get(alias) {
                return Err(HqlError::Resolution(format!(
                    "Alias [{}] used for multiple from-clause elements : #{}, #{}",
                    alias,
                    existing.index(),
                    id.index()
                )));
            }
            self.from_by_alias.insert(alias.clone(), id);
        }
        self.froms.push(id);
        Ok(())
    }

    pub fn find_from_by_alias(&self, alias: &str) -> Option<FromId> {
        self.from_by_alias.get(alias).copied()
    }

    /// Every from-element registered here, in registration order.
    pub fn froms(&self) -> &[FromId] {
        &self.froms
    }

    /// Registers a selection and returns its 1-based position.
    ///
    /// Result aliases are kept as written; `from_key` is the same alias
    /// spelled the way the from-clause registered its variables.
    pub fn register_selection(
        &mut self,
        alias: Option<Arc<str>>,
        from_key: Option<&str>,
        ty: SemanticType,
    ) -> HqlResult<usize> {
        if let Some(alias) = &alias {
            if let Some(position) = self.find_aliased_node_position(alias) {
                return Err(HqlError::Resolution(format!(
                    "Alias [{}] is already used in same select clause [position={}]",
                    alias, position
                )));
            }
            if self.from_by_alias.contains_key(from_key.unwrap_or(alias)) {
                return Err(HqlError::Resolution(format!(
                    "Alias [{}] used in select-clause is also used in the from-clause",
                    alias
                )));
            }
        }
        self.selections.push(RegisteredSelection { alias, ty });
        Ok(self.selections.len())
    }

    pub fn find_aliased_node_position(&self, alias: &str) -> Option<usize> {
        self.selections
            .iter()
            .position(|selection| selection.alias.as_deref() == Some(alias))
            .map(|index| index + 1)
    }

    pub fn find_aliased_node_by_position(&self, position: usize) -> Option<&RegisteredSelection> {
        position
            .checked_sub(1)
            .and_then(|index| self.selections.get(index))
    }
}

#[derive(Debug)]
pub(crate) struct ProcessingState {
    pub kind: StateKind,
    pub registry: PathRegistry,
}

impl ProcessingState {
    pub fn new(kind: StateKind) -> Self {
        Self {
            kind,
            registry: PathRegistry::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BasicType;
    use pretty_assertions::assert_eq;

    fn alias(text: &str) -> Arc<str> {
        Arc::from(text)
    }

    #[test]
    fn test_duplicate_from_alias() {
        let mut registry = PathRegistry::default();
        registry.register_from(FromId(0), Some(&alias("a"))).unwrap();
        registry.register_from(FromId(1), None).unwrap();
        let err = registry
            .register_from(FromId(2), Some(&alias("a")))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resolution);
        assert_eq!(registry.froms(), &[FromId(0), FromId(1)]);
        assert_eq!(registry.find_from_by_alias("a"), Some(FromId(0)));
    }

    #[test]
    fn test_selection_positions_are_one_based() {
        let mut registry = PathRegistry::default();
        let first = registry
            .register_selection(Some(alias("n")), Some("n"), BasicType::String.into())
            .unwrap();
        let second = registry
            .register_selection(None, None, BasicType::Integer.into())
            .unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(registry.find_aliased_node_position("n"), Some(1));
        assert_eq!(
            registry.find_aliased_node_by_position(2).map(|s| s.ty.clone()),
            Some(SemanticType::Basic(BasicType::Integer))
        );
        assert!(registry.find_aliased_node_by_position(0).is_none());
        assert!(registry.find_aliased_node_by_position(3).is_none());
    }

    #[test]
    fn test_selection_alias_collisions() {
        let mut registry = PathRegistry::default();
        registry.register_from(FromId(0), Some(&alias("a"))).unwrap();
        registry
            .register_selection(Some(alias("x")), Some("x"), SemanticType::Unknown)
            .unwrap();

        let err = registry
            .register_selection(Some(alias("x")), Some("x"), SemanticType::Unknown)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Resolution error: Alias [x] is already used in same select clause [position=1]"
        );

        let err = registry
            .register_selection(Some(alias("A")), Some("a"), SemanticType::Unknown)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resolution);
    }
}
