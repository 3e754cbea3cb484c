//! HQL core - semantic query compiler
//!
//! Parses HQL/JPQL text and compiles it against a domain model into a
//! resolved, typed statement tree.

pub mod config;
pub mod domain;
pub mod error;
pub mod function;
pub mod hql;
pub mod semantic;
pub mod sqm;

pub use config::CompileOptions;
pub use domain::{DomainModel, StaticDomainModel};
pub use error::{ErrorKind, HqlError, HqlResult};
pub use function::{FunctionRegistry, StandardFunctionRegistry};
pub use semantic::{Compliance, ComplianceViolation, SemanticQueryBuilder};
pub use sqm::Statement;

/// Parse and compile a statement with the standard function registry.
pub fn compile(
    query: &str,
    model: &dyn DomainModel,
    options: &CompileOptions,
) -> HqlResult<Statement> {
    let functions = StandardFunctionRegistry::new();
    compile_with_registry(query, model, &functions, options)
}

pub fn compile_with_registry(
    query: &str,
    model: &dyn DomainModel,
    functions: &dyn FunctionRegistry,
    options: &CompileOptions,
) -> HqlResult<Statement> {
    let tree = hql::parse(query)?;
    SemanticQueryBuilder::new(model, functions, options).build_statement(&tree)
}
