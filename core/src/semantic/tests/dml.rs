use pretty_assertions::assert_eq;

use super::*;
use crate::error::ErrorKind;
use crate::semantic::ComplianceViolation;
use crate::sqm::{ExpressionKind, LiteralValue};

#[test]
fn test_update_with_assignments() {
    let statement =
        compile("update versioned Animal a set a.name = 'Rex', weight = 12.5 where a.id = 1")
            .unwrap();
    let StatementKind::Update(update) = &statement.kind else {
        panic!("Expected update statement, got {:?}", statement.kind);
    };
    assert!(update.versioned);
    assert_eq!(update.assignments.len(), 2);
    assert_eq!(
        update.assignments[0].path.navigable_path.to_string(),
        "Animal(a).name"
    );
    assert_eq!(
        update.assignments[1].path.navigable_path.to_string(),
        "Animal(a).weight"
    );
    assert!(update.where_clause.is_some());
    assert_eq!(statement.from_element(update.target).alias.as_deref(), Some("a"));
}

#[test]
fn test_update_assigns_enum_shorthand() {
    let statement = compile("update Animal set status = RETIRED").unwrap();
    let StatementKind::Update(update) = &statement.kind else {
        panic!("Expected update statement, got {:?}", statement.kind);
    };
    match &update.assignments[0].value.kind {
        ExpressionKind::EnumLiteral(constant) => assert_eq!(&*constant.name, "RETIRED"),
        other => panic!("Expected enum literal, got {:?}", other),
    }
}

#[test]
fn test_delete() {
    let statement = compile("delete from Animal a where a.weight < 1").unwrap();
    match &statement.kind {
        StatementKind::Delete(delete) => {
            assert!(delete.where_clause.is_some());
            assert_eq!(
                statement.from_element(delete.target).navigable_path.to_string(),
                "Animal(a)"
            );
        }
        other => panic!("Expected delete statement, got {:?}", other),
    }
}

#[test]
fn test_insert_values() {
    let statement =
        compile("insert into Animal (name, weight) values ('Rex', 10), ('Tom', 4)").unwrap();
    match &statement.kind {
        StatementKind::InsertValues(insert) => {
            assert_eq!(insert.target_paths.len(), 2);
            assert_eq!(insert.values.len(), 2);
            assert_eq!(
                insert.values[1][1].kind,
                ExpressionKind::Literal(LiteralValue::Integer(4))
            );
            assert_eq!(statement.from_element(insert.target).alias, None);
        }
        other => panic!("Expected insert-values statement, got {:?}", other),
    }
}

#[test]
fn test_insert_values_arity_mismatch() {
    let err = compile("insert into Animal (name, weight) values ('Rex')").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
    assert!(
        err.to_string()
            .contains("Expected insert attribute count [2] did not match values count [1]")
    );
}

#[test]
fn test_insert_select() {
    let statement =
        compile("insert into Animal (name, owner) select p.name, p from Person p").unwrap();
    match &statement.kind {
        StatementKind::InsertSelect(insert) => {
            assert_eq!(insert.target_paths.len(), 2);
            assert_eq!(insert.query_part.first_spec().select.selections.len(), 2);
        }
        other => panic!("Expected insert-select statement, got {:?}", other),
    }

    let err = compile("insert into Animal (name) select p.name, p.id from Person p").unwrap_err();
    assert!(
        err.to_string()
            .contains("did not match Query selection count [2]")
    );
}

#[test]
fn test_insert_unknown_field() {
    let err = compile("insert into Animal (color) values ('red')").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_dml_target_resolution() {
    let err = compile("delete from Creature c").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);

    let err = compile("update Plant p set p.name = 'x'").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(err.to_string().contains("Could not resolve entity name [Plant] as DML target"));
}

#[test]
fn test_fully_qualified_dml_target() {
    assert!(compile("delete from zoo.Animal a").is_ok());
    let err = compile_strict("delete from zoo.Animal a").unwrap_err();
    assert_eq!(err.violation(), Some(ComplianceViolation::FqnEntityName));
}
