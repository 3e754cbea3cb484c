use pretty_assertions::assert_eq;

use super::*;
use crate::error::ErrorKind;
use crate::semantic::ComplianceViolation;
use crate::sqm::ExpressionKind;

/// Compiles in lenient mode and fails with `violation` in strict mode.
fn assert_strict_only(query: &str, violation: ComplianceViolation) {
    if let Err(err) = compile(query) {
        panic!("Expected lenient compile of `{}` to pass: {}", query, err);
    }
    match compile_strict(query) {
        Err(err) => assert_eq!(err.violation(), Some(violation), "{}", query),
        Ok(_) => panic!("Expected strict compile of `{}` to fail", query),
    }
}

#[test]
fn test_tuples() {
    assert_strict_only(
        "select a from Animal a where (a.name, a.id) = ('Rex', 1)",
        ComplianceViolation::Tuples,
    );
}

#[test]
fn test_set_operations() {
    assert_strict_only(
        "select a.name from Animal a union select p.name from Person p",
        ComplianceViolation::SetOperations,
    );
}

#[test]
fn test_implicit_select() {
    assert_strict_only("from Animal a", ComplianceViolation::ImplicitSelect);
}

#[test]
fn test_limit_offset() {
    assert_strict_only(
        "select a from Animal a order by a.name limit 5",
        ComplianceViolation::LimitOffsetClause,
    );
    assert_strict_only(
        "select a from Animal a order by a.name offset 5",
        ComplianceViolation::LimitOffsetClause,
    );
}

#[test]
fn test_subquery_order_by() {
    assert_strict_only(
        "select a from Animal a where a.id in (select b.id from Animal b order by b.id)",
        ComplianceViolation::SubqueryOrderBy,
    );
}

#[test]
fn test_collations() {
    assert_strict_only(
        "select a from Animal a order by a.name collate ucs_basic",
        ComplianceViolation::Collations,
    );
    assert_strict_only(
        "select a from Animal a where a.name collate ucs_basic = 'Rex'",
        ComplianceViolation::Collations,
    );
}

#[test]
fn test_reserved_word_alias() {
    assert_strict_only("from Animal as order", ComplianceViolation::ReservedWordUsedAsAlias);
}

#[test]
fn test_fully_qualified_entity_name() {
    assert_strict_only("select a from zoo.Animal a", ComplianceViolation::FqnEntityName);
}

#[test]
fn test_strict_mode_aliases_are_case_insensitive() {
    assert!(compile_strict("select A.name from Animal a").is_ok());

    let err = compile("select A.name from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_strict_mode_keeps_result_alias_case() {
    let statement = compile_strict("select a.name as Nm from Animal A order by Nm").unwrap();
    let spec = query_spec(&statement);
    assert_eq!(spec.select.selections[0].alias.as_deref(), Some("Nm"));
    assert_eq!(element_by_alias(&statement, "a").alias.as_deref(), Some("a"));
    assert_eq!(
        spec.order.order_by[0].expression.kind,
        ExpressionKind::AliasedNodeReference { position: 1 }
    );

    assert!(compile_strict("select a.name as Nm from Animal a order by nm").is_err());

    // Still clashes with the from-clause variable it folds onto.
    let err = compile_strict("select a.name as A from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_compliant_query_passes_strict_mode() {
    let statement = compile_strict(
        "select a.name, count(o) from Animal a left join a.offspring o \
         where a.status = zoo.Status.ACTIVE and a.weight between 1 and :heaviest \
         group by a.name having count(o) > 1 order by a.name",
    )
    .unwrap();
    assert_eq!(query_spec(&statement).select.selections.len(), 2);
}
