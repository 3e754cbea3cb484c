//! Strict JPQL compliance gates.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{HqlError, HqlResult};

/// A construct that strict JPQL mode rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceViolation {
    SetOperations,
    Tuples,
    Collations,
    LimitOffsetClause,
    SubqueryOrderBy,
    AliasedFetchJoin,
    ImplicitSelect,
    FqnEntityName,
    ReservedWordUsedAsAlias,
    HqlCollectionFunction,
    UnmappedPolymorphism,
    FunctionCall,
    ValueFunctionOnNonMap,
}

impl ComplianceViolation {
    pub fn description(self) -> &'static str {
        match self {
            ComplianceViolation::SetOperations => "use of set operations",
            ComplianceViolation::Tuples => "use of tuples/row value constructors",
            ComplianceViolation::Collations => "use of collations",
            ComplianceViolation::LimitOffsetClause => "use of LIMIT/OFFSET/FETCH clause",
            ComplianceViolation::SubqueryOrderBy => "use of ORDER BY clause in subquery",
            ComplianceViolation::AliasedFetchJoin => "aliased fetch join",
            ComplianceViolation::ImplicitSelect => "implicit select clause",
            ComplianceViolation::FqnEntityName => "use of FQN for entity name",
            ComplianceViolation::ReservedWordUsedAsAlias => "use of reserved word as alias",
            ComplianceViolation::HqlCollectionFunction => "use of HQL collection functions",
            ComplianceViolation::UnmappedPolymorphism => "unmapped polymorphic reference",
            ComplianceViolation::FunctionCall => "improper non-standard function call",
            ComplianceViolation::ValueFunctionOnNonMap => "use of value() function for non-Map type",
        }
    }
}

impl fmt::Display for ComplianceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComplianceViolation::SetOperations => "SET_OPERATIONS",
            ComplianceViolation::Tuples => "TUPLES",
            ComplianceViolation::Collations => "COLLATIONS",
            ComplianceViolation::LimitOffsetClause => "LIMIT_OFFSET_CLAUSE",
            ComplianceViolation::SubqueryOrderBy => "SUBQUERY_ORDER_BY",
            ComplianceViolation::AliasedFetchJoin => "ALIASED_FETCH_JOIN",
            ComplianceViolation::ImplicitSelect => "IMPLICIT_SELECT",
            ComplianceViolation::FqnEntityName => "FQN_ENTITY_NAME",
            ComplianceViolation::ReservedWordUsedAsAlias => "RESERVED_WORD_USED_AS_ALIAS",
            ComplianceViolation::HqlCollectionFunction => "HQL_COLLECTION_FUNCTION",
            ComplianceViolation::UnmappedPolymorphism => "UNMAPPED_POLYMORPHISM",
            ComplianceViolation::FunctionCall => "FUNCTION_CALL",
            ComplianceViolation::ValueFunctionOnNonMap => "VALUE_FUNCTION_ON_NON_MAP",
        };
        f.write_str(name)
    }
}

/// The strict/lenient switch consulted at each gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Compliance {
    strict: bool,
}

impl Compliance {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(self) -> bool {
        self.strict
    }

    /// Fails with `violation` in strict mode, passes otherwise.
    pub fn check(self, violation: ComplianceViolation) -> HqlResult<()> {
        if self.strict {
            return Err(HqlError::Compliance {
                violation,
                message: violation.description().to_string(),
            });
        }
        trace!(%violation, "accepted outside strict mode");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lenient_mode_accepts_everything() {
        let lenient = Compliance::new(false);
        assert!(lenient.check(ComplianceViolation::Tuples).is_ok());
        assert!(lenient.check(ComplianceViolation::SetOperations).is_ok());
    }

    #[test]
    fn strict_mode_names_the_rule() {
        let err = Compliance::new(true)
            .check(ComplianceViolation::ImplicitSelect)
            .unwrap_err();
        assert_eq!(err.violation(), Some(ComplianceViolation::ImplicitSelect));
        assert_eq!(
            err.to_string(),
            "Strict JPQL compliance violation [IMPLICIT_SELECT]: implicit select clause"
        );
    }
}
