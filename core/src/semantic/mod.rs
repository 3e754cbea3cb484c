//! # Semantic query builder
//!
//! Walks an HQL parse tree and produces a resolved [`Statement`]: every
//! path is bound to a from-element or attribute, every expression carries a
//! [`SemanticType`], and strict JPQL compliance rules are enforced as
//! constructs are encountered.
//!
//! A builder instance compiles exactly one statement and is consumed by
//! [`SemanticQueryBuilder::build_statement`].
//!
//! [`Statement`]: crate::sqm::Statement
//! [`SemanticType`]: crate::domain::SemanticType

mod builder;
mod clause;
mod compliance;
mod consumer;
mod expression;
mod function;
pub mod literal;
mod predicate;
mod query_order;
mod state;

#[cfg(test)]
mod tests;

pub use builder::SemanticQueryBuilder;
pub use compliance::{Compliance, ComplianceViolation};
