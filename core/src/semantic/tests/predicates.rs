use pretty_assertions::assert_eq;

use super::*;
use crate::error::ErrorKind;
use crate::sqm::{ComparisonOperator, ExpressionKind};

fn where_of(query: &str) -> Predicate {
    let statement = compile(query).unwrap();
    where_predicate(&statement).clone()
}

#[test]
fn test_equals_null_becomes_nullness() {
    match where_of("select a from Animal a where a.name = null") {
        Predicate::Nullness { negated, .. } => assert!(!negated),
        other => panic!("Expected nullness predicate, got {:?}", other),
    }
    match where_of("select a from Animal a where null <> a.name") {
        Predicate::Nullness { expression, negated } => {
            assert!(negated);
            assert!(expression.as_path().is_some());
        }
        other => panic!("Expected nullness predicate, got {:?}", other),
    }
}

#[test]
fn test_distinct_from_null_becomes_nullness() {
    match where_of("select a from Animal a where a.owner is distinct from null") {
        Predicate::Nullness { negated, .. } => assert!(negated),
        other => panic!("Expected nullness predicate, got {:?}", other),
    }
}

#[test]
fn test_negated_comparison_flips_operator() {
    match where_of("select a from Animal a where not a.weight < 10") {
        Predicate::Comparison { operator, .. } => {
            assert_eq!(operator, ComparisonOperator::GreaterThanOrEqual)
        }
        other => panic!("Expected comparison, got {:?}", other),
    }
}

#[test]
fn test_negated_group_is_wrapped() {
    assert!(matches!(
        where_of("select a from Animal a where not (a.weight < 10 or a.name = 'x')"),
        Predicate::Negated(_)
    ));
}

#[test]
fn test_enum_shorthand_on_either_side() {
    for query in [
        "select a from Animal a where a.status = ACTIVE",
        "select a from Animal a where ACTIVE = a.status",
    ] {
        match where_of(query) {
            Predicate::Comparison { lhs, rhs, .. } => {
                let literal = [lhs, rhs]
                    .into_iter()
                    .find(|side| matches!(side.kind, ExpressionKind::EnumLiteral(_)))
                    .expect("Expected an enum literal operand");
                match literal.kind {
                    ExpressionKind::EnumLiteral(constant) => {
                        assert_eq!(&*constant.name, "ACTIVE")
                    }
                    other => panic!("Expected enum literal, got {:?}", other),
                }
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
    }
}

#[test]
fn test_enum_shorthand_requires_enum_context() {
    let err = compile("select a from Animal a where a.name = ACTIVE").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_in_list_of_enum_constants() {
    match where_of("select a from Animal a where a.status in (ACTIVE, RETIRED)") {
        Predicate::InList { list, negated, .. } => {
            assert!(!negated);
            assert_eq!(list.len(), 2);
            assert!(
                list.iter()
                    .all(|item| matches!(item.kind, ExpressionKind::EnumLiteral(_)))
            );
        }
        other => panic!("Expected in-list predicate, got {:?}", other),
    }
}

#[test]
fn test_multi_valued_parameter_binding() {
    let cases = [
        ("select a from Animal a where a.id in :ids", true),
        ("select a from Animal a where a.id in (:ids)", true),
        ("select a from Animal a where a.id = :ids", false),
    ];
    for (query, allowed) in cases {
        let statement = compile(query).unwrap();
        assert_eq!(statement.parameters.len(), 1);
        assert_eq!(
            statement.parameters[0].allow_multi_valued_binding, allowed,
            "{}",
            query
        );
    }

    let statement = compile("select a from Animal a where a.id in (:first, :second)").unwrap();
    assert!(
        statement
            .parameters
            .iter()
            .all(|parameter| !parameter.allow_multi_valued_binding)
    );
}

#[test]
fn test_in_subquery() {
    assert!(matches!(
        where_of("select a from Animal a where a.owner.id not in (select p.id from Person p)"),
        Predicate::InSubQuery { negated: true, .. }
    ));
}

#[test]
fn test_member_of() {
    match where_of("select a from Animal a, Animal b where b member of a.offspring") {
        Predicate::MemberOf { path, .. } => {
            assert_eq!(path.navigable_path.to_string(), "Animal(a).offspring")
        }
        other => panic!("Expected member-of predicate, got {:?}", other),
    }

    let err = compile("select a from Animal a, Person p where p member of a.owner").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_is_empty() {
    assert!(matches!(
        where_of("select p from Person p where p.pets is not empty"),
        Predicate::Emptiness { negated: true, .. }
    ));

    let err = compile("select p from Person p where p.name is empty").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_between_and_like() {
    assert!(matches!(
        where_of("select a from Animal a where a.weight between 1 and 10"),
        Predicate::Between { negated: false, .. }
    ));
    assert!(matches!(
        where_of("select a from Animal a where a.name not like 'R%' escape '!'"),
        Predicate::Like {
            negated: true,
            escape: Some(_),
            ..
        }
    ));
}

#[test]
fn test_exists_subquery() {
    assert!(matches!(
        where_of("select p from Person p where not exists (select a from Animal a where a.owner = p)"),
        Predicate::Exists { negated: true, .. }
    ));
}

#[test]
fn test_non_boolean_predicate_expression() {
    let err = compile("select a from Animal a where a.name").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_positional_parameter_requires_position() {
    let err = compile("select a from Animal a where a.id = ?").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
    assert!(err.to_string().contains("did not declare position"));
}
