use std::fmt;
use std::sync::Arc;

use super::path::PathSource;
use super::predicate::Predicate;
use crate::domain::{Attribute, EntityType};

/// Index of a from-element in its statement's [`FromArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FromId(pub(crate) u32);

impl FromId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FromId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    pub fn text(self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left outer",
            JoinType::Right => "right outer",
            JoinType::Full => "full outer",
            JoinType::Cross => "cross",
        }
    }
}

/// Canonical navigation path of a from-element or path, e.g. `Animal(a).owner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NavigablePath(Arc<str>);

impl NavigablePath {
    pub fn root(entity_name: &str, alias: &str) -> Self {
        NavigablePath(Arc::from(format!("{}({})", entity_name, alias)))
    }

    pub fn append(&self, segment: &str) -> Self {
        NavigablePath(Arc::from(format!("{}.{}", self.0, segment)))
    }

    pub fn append_aliased(&self, segment: &str, alias: &str) -> Self {
        NavigablePath(Arc::from(format!("{}.{}({})", self.0, segment, alias)))
    }

    pub fn treat_as(&self, entity_name: &str) -> Self {
        NavigablePath(Arc::from(format!("treat({} as {})", self.0, entity_name)))
    }

    pub fn wrap(&self, function: &str) -> Self {
        NavigablePath(Arc::from(format!("{}({})", function, self.0)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NavigablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromKind {
    Root,
    CrossJoin,
    EntityJoin {
        join_type: JoinType,
    },
    AttributeJoin {
        attribute: Attribute,
        join_type: JoinType,
        fetched: bool,
        /// Created while navigating a join path rather than declared.
        implicit: bool,
    },
    /// A subquery's view of a from-element of an enclosing query.
    Correlation {
        correlated: FromId,
    },
}

/// A root, join or correlation contributing rows to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct FromElement {
    pub id: FromId,
    pub kind: FromKind,
    pub alias: Option<Arc<str>>,
    pub navigable_path: NavigablePath,
    pub source: PathSource,
    /// The element this one was joined from.
    pub lhs: Option<FromId>,
    /// The root of the from-space this element belongs to.
    pub root: FromId,
    pub joins: Vec<FromId>,
    pub join_predicate: Option<Predicate>,
    pub treated_as: Option<Arc<EntityType>>,
}

impl FromElement {
    pub fn is_fetched(&self) -> bool {
        matches!(self.kind, FromKind::AttributeJoin { fetched: true, .. })
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self.kind, FromKind::AttributeJoin { implicit: true, .. })
    }

    /// The joined attribute, for attribute joins.
    pub fn attribute(&self) -> Option<&Attribute> {
        match &self.kind {
            FromKind::AttributeJoin { attribute, .. } => Some(attribute),
            _ => None,
        }
    }

    pub fn join_type(&self) -> Option<JoinType> {
        match &self.kind {
            FromKind::CrossJoin => Some(JoinType::Cross),
            FromKind::EntityJoin { join_type } | FromKind::AttributeJoin { join_type, .. } => {
                Some(*join_type)
            }
            FromKind::Root | FromKind::Correlation { .. } => None,
        }
    }
}

/// Owns every from-element created while compiling one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FromArena {
    elements: Vec<FromElement>,
}

impl FromArena {
    pub(crate) fn next_id(&self) -> FromId {
        FromId(self.elements.len() as u32)
    }

    pub(crate) fn push(&mut self, element: FromElement) -> FromId {
        let id = element.id;
        debug_assert_eq!(id, self.next_id());
        self.elements.push(element);
        id
    }

    pub fn get(&self, id: FromId) -> &FromElement {
        &self.elements[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: FromId) -> &mut FromElement {
        &mut self.elements[id.index()]
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FromElement> {
        self.elements.iter()
    }

    /// Finds an alias among the given root and everything joined beneath it.
    pub fn find_by_alias(&self, root: FromId, alias: &str) -> Option<FromId> {
        let element = self.get(root);
        if element.alias.as_deref() == Some(alias) {
            return Some(root);
        }
        element
            .joins
            .iter()
            .find_map(|join| self.find_by_alias(*join, alias))
    }

    /// Whether any element in the tree below `root` is a fetch join.
    pub fn has_fetch_join(&self, root: FromId) -> bool {
        let element = self.get(root);
        element.is_fetched() || element.joins.iter().any(|join| self.has_fetch_join(*join))
    }
}
