use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Named(Arc<str>),
    Positional(u32),
}

/// A query parameter occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub kind: ParameterKind,
    /// Whether a collection may be bound here, e.g. `in (:ids)`.
    pub allow_multi_valued_binding: bool,
}

impl Parameter {
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            ParameterKind::Named(name) => Some(name),
            ParameterKind::Positional(_) => None,
        }
    }

    pub fn position(&self) -> Option<u32> {
        match self.kind {
            ParameterKind::Positional(position) => Some(position),
            ParameterKind::Named(_) => None,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParameterKind::Named(name) => write!(f, ":{}", name),
            ParameterKind::Positional(position) => write!(f, "?{}", position),
        }
    }
}
