//! # Function registry
//!
//! Descriptors that turn resolved arguments into typed function expressions.

mod standard;

pub use standard::{ArgumentsValidator, NamedFunctionDescriptor, ReturnType, StandardFunctionRegistry};

use crate::domain::SemanticType;
use crate::error::HqlResult;
use crate::sqm::{Expression, Predicate};

/// Produces function expressions for one function name.
pub trait FunctionDescriptor: Send + Sync {
    fn name(&self) -> &str;

    /// Builds a scalar function call. `expected` is the type the caller
    /// already knows the result must have, if any.
    fn generate_expression(
        &self,
        arguments: Vec<Expression>,
        expected: Option<&SemanticType>,
    ) -> HqlResult<Expression>;

    /// Builds an aggregate call with an optional `FILTER (WHERE ..)` predicate.
    fn generate_aggregate_expression(
        &self,
        arguments: Vec<Expression>,
        filter: Option<Predicate>,
        expected: Option<&SemanticType>,
    ) -> HqlResult<Expression>;
}

/// Lookup of function descriptors by name.
pub trait FunctionRegistry: Send + Sync {
    /// Names are matched case-insensitively.
    fn find_function_descriptor(&self, name: &str) -> Option<&dyn FunctionDescriptor>;
}
