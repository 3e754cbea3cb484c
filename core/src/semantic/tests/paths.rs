use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::domain::{BasicType, SemanticType};
use crate::error::ErrorKind;
use crate::semantic::ComplianceViolation;
use crate::sqm::{ExpressionKind, FromKind, JoinType, PathKind};

fn selected_path(query: &str) -> crate::sqm::Path {
    let statement = compile(query).unwrap();
    match &selection_expression(&statement, 0).kind {
        ExpressionKind::Path(path) => path.clone(),
        other => panic!("Expected path selection, got {:?}", other),
    }
}

#[test]
fn test_attribute_chain() {
    let path = selected_path("select a.owner.name from Animal a");
    assert_eq!(path.navigable_path.to_string(), "Animal(a).owner.name");
    assert_eq!(path.semantic_type(), SemanticType::Basic(BasicType::String));
}

#[test]
fn test_embedded_attribute() {
    let path = selected_path("select p.address.city from Person p");
    assert_eq!(path.navigable_path.to_string(), "Person(p).address.city");
}

#[test]
fn test_unqualified_attribute_uses_exposing_root() {
    let path = selected_path("select name from Animal a");
    assert_eq!(path.navigable_path.to_string(), "Animal(a).name");
}

#[test]
fn test_unqualified_attribute_must_be_unambiguous() {
    let err = compile("select name from Animal a, Person p").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_inherited_attribute_on_subtype_root() {
    let path = selected_path("select d.weight from Dog d");
    assert_eq!(path.semantic_type(), SemanticType::Basic(BasicType::Double));
}

#[test]
fn test_unknown_attribute() {
    let err = compile("select a.color from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(err.to_string().contains("Could not resolve attribute 'color' of 'Animal'"));
}

#[test]
fn test_basic_path_cannot_be_dereferenced() {
    let err = compile("select a.name.length from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_plural_path_cannot_be_dereferenced() {
    let err = compile("select a.offspring.name from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_plural_selection_selects_elements() {
    let path = selected_path("select a.nicknames from Animal a");
    assert!(matches!(path.kind, PathKind::Element { .. }));
    assert_eq!(path.semantic_type(), SemanticType::Basic(BasicType::String));
}

#[test]
fn test_attribute_join() {
    let statement = compile("select o.name from Animal a left join a.offspring o").unwrap();
    let joined = element_by_alias(&statement, "o");
    assert_eq!(joined.join_type(), Some(JoinType::Left));
    assert_eq!(joined.navigable_path.to_string(), "Animal(a).offspring(o)");
    assert_eq!(joined.source.semantic_type(), SemanticType::Entity(Arc::from("Animal")));

    let root = element_by_alias(&statement, "a");
    assert_eq!(root.joins, vec![joined.id]);
}

#[test]
fn test_multi_segment_join_creates_implicit_intermediate() {
    let statement = compile("select x from Animal a join a.owner.pets x").unwrap();
    let owner = statement
        .from_elements
        .iter()
        .find(|element| element.navigable_path.to_string() == "Animal(a).owner")
        .expect("Expected intermediate join");
    assert!(owner.is_implicit());
    assert!(!element_by_alias(&statement, "x").is_implicit());
}

#[test]
fn test_entity_join_with_predicate() {
    let statement =
        compile("select a, p from Animal a join Person p on p.id = a.owner.id").unwrap();
    let joined = element_by_alias(&statement, "p");
    assert!(matches!(joined.kind, FromKind::EntityJoin { join_type: JoinType::Inner }));
    assert!(joined.join_predicate.is_some());
}

#[test]
fn test_join_predicate_must_stay_in_its_from_space() {
    let err = compile("select a from Person p, Animal a join a.owner o on o.name = p.name")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
    assert!(err.to_string().contains("not rooted in the join's root"));
}

#[test]
fn test_jpa_collection_member_join() {
    let statement = compile("select o from Animal a, in(a.offspring) o").unwrap();
    assert_eq!(
        element_by_alias(&statement, "o").join_type(),
        Some(JoinType::Inner)
    );

    let err = compile("select o from Animal a, in(a.owner) o").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_fetch_join_with_alias_is_lenient_only() {
    let statement = compile("select a from Animal a join fetch a.owner o").unwrap();
    assert!(element_by_alias(&statement, "o").is_fetched());

    let err = compile_strict("select a from Animal a join fetch a.owner o").unwrap_err();
    assert_eq!(err.violation(), Some(ComplianceViolation::AliasedFetchJoin));
}

#[test]
fn test_treat_in_from_clause_downcasts_join() {
    let statement = compile("select d.breed from Animal a join treat(a.offspring as Dog) d").unwrap();
    let joined = element_by_alias(&statement, "d");
    assert_eq!(
        joined.treated_as.as_ref().map(|entity| entity.name.clone()),
        Some(Arc::from("Dog"))
    );
}

#[test]
fn test_treat_in_select_clause() {
    let path = selected_path("select treat(a as Dog).breed from Animal a");
    assert_eq!(
        path.navigable_path.to_string(),
        "treat(Animal(a) as Dog).breed"
    );
}

#[test]
fn test_treat_target_must_be_subtype() {
    let err = compile("select treat(a as Person).name from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_map_key_and_value() {
    let statement = compile("select key(p.phones), value(p.phones) from Person p").unwrap();
    assert_eq!(
        selection_expression(&statement, 0).ty,
        SemanticType::Basic(BasicType::String)
    );
    assert!(matches!(
        selection_expression(&statement, 1).as_path().map(|path| &path.kind),
        Some(PathKind::Element { .. })
    ));
}

#[test]
fn test_key_of_list_is_rejected() {
    let err = compile("select key(a.nicknames) from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_value_of_non_map_is_lenient_only() {
    assert!(compile("select value(a.nicknames) from Animal a").is_ok());
    let err = compile_strict("select value(a.nicknames) from Animal a").unwrap_err();
    assert_eq!(err.violation(), Some(ComplianceViolation::ValueFunctionOnNonMap));
}

#[test]
fn test_indexed_access_creates_restricted_join() {
    let statement = compile("select p.aliases[0] from Person p").unwrap();
    let expression = selection_expression(&statement, 0);
    let join = match &expression.kind {
        ExpressionKind::Path(path) => match &path.kind {
            PathKind::IndexedAccess { join, .. } => *join,
            other => panic!("Expected indexed access, got {:?}", other),
        },
        other => panic!("Expected path, got {:?}", other),
    };
    let element = statement.from_element(join);
    assert!(element.is_implicit());
    assert!(matches!(
        element.join_predicate,
        Some(Predicate::Comparison { .. })
    ));
    assert_eq!(expression.ty, SemanticType::Basic(BasicType::String));
}

#[test]
fn test_index_access_on_set_is_rejected() {
    let err = compile("select a.offspring[0] from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_index_function_on_list_join() {
    let statement = compile("select index(n) from Person p join p.aliases n").unwrap();
    assert_eq!(
        selection_expression(&statement, 0).ty,
        SemanticType::Basic(BasicType::Integer)
    );
}

#[test]
fn test_entity_id_and_version_references() {
    let statement = compile("select id(d), version(d) from Dog d").unwrap();
    assert_eq!(
        selection_expression(&statement, 0).ty,
        SemanticType::Basic(BasicType::Long)
    );
    assert_eq!(
        selection_expression(&statement, 1).ty,
        SemanticType::Basic(BasicType::Integer)
    );

    let err = compile("select version(p) from Person p").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_natural_id_is_not_implemented() {
    let err = compile("select naturalid(a) from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotYetImplemented);
}

#[test]
fn test_qualified_enum_literal() {
    let statement = compile("select zoo.Status.RETIRED from Animal a").unwrap();
    assert_eq!(
        selection_expression(&statement, 0).ty,
        SemanticType::Enum(Arc::from("zoo.Status"))
    );
}

#[test]
fn test_unresolvable_path() {
    let err = compile("select nothing.here from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(err.to_string().contains("Could not interpret path expression 'nothing.here'"));
}

#[test]
fn test_polymorphic_root() {
    let statement = compile("select c.name from Creature c").unwrap();
    assert_eq!(
        selection_expression(&statement, 0).ty,
        SemanticType::Basic(BasicType::String)
    );

    let err = compile_strict("select c.name from Creature c").unwrap_err();
    assert_eq!(err.violation(), Some(ComplianceViolation::UnmappedPolymorphism));

    let err = compile("select a from Animal a where a.id in (select c.id from Creature c)")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_polymorphic_attribute_must_exist_on_all_implementors() {
    let err = compile("select c.breed from Creature c").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}
