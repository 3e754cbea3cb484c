use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::domain::{BasicType, SemanticType};
use crate::error::ErrorKind;
use crate::semantic::ComplianceViolation;
use crate::sqm::{ExpressionKind, TrimSpecification};

fn selected_type(query: &str) -> SemanticType {
    let statement = compile(query).unwrap();
    selection_expression(&statement, 0).ty.clone()
}

fn basic(basic: BasicType) -> SemanticType {
    SemanticType::Basic(basic)
}

#[test]
fn test_aggregate_result_types() {
    assert_eq!(selected_type("select count(*) from Animal a"), basic(BasicType::Long));
    assert_eq!(selected_type("select count(a) from Animal a"), basic(BasicType::Long));
    assert_eq!(selected_type("select avg(a.weight) from Animal a"), basic(BasicType::Double));
    assert_eq!(selected_type("select sum(a.weight) from Animal a"), basic(BasicType::Double));
    assert_eq!(selected_type("select max(a.name) from Animal a"), basic(BasicType::String));
}

#[test]
fn test_count_star_argument() {
    let statement = compile("select count(*) from Animal a").unwrap();
    match &selection_expression(&statement, 0).kind {
        ExpressionKind::Function(call) => {
            assert!(call.aggregate);
            assert_eq!(call.arguments[0].kind, ExpressionKind::Star);
        }
        other => panic!("Expected function call, got {:?}", other),
    }

    let err = compile("select sum(*) from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_distinct_wraps_first_aggregate_argument() {
    let statement = compile("select count(distinct a.name) from Animal a").unwrap();
    match &selection_expression(&statement, 0).kind {
        ExpressionKind::Function(call) => {
            assert!(matches!(call.arguments[0].kind, ExpressionKind::Distinct(_)));
            assert_eq!(call.arguments[0].ty, basic(BasicType::String));
        }
        other => panic!("Expected function call, got {:?}", other),
    }

    let err = compile("select upper(distinct a.name) from Animal a").unwrap_err();
    assert!(err.to_string().contains("DISTINCT is only allowed for aggregate functions"));
}

#[test]
fn test_aggregate_filter_clause() {
    let statement =
        compile("select count(a) filter (where a.weight > 10) from Animal a").unwrap();
    match &selection_expression(&statement, 0).kind {
        ExpressionKind::Function(call) => assert!(call.filter.is_some()),
        other => panic!("Expected function call, got {:?}", other),
    }

    let err = compile("select upper(a.name) filter (where a.weight > 10) from Animal a")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_argument_count_is_validated() {
    let err = compile("select upper(a.name, a.name) from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
    assert!(err.to_string().contains("requires exactly 1 arguments"));
}

#[test]
fn test_non_standard_function() {
    assert_eq!(
        selected_type("select soundex(a.name) from Animal a"),
        basic(BasicType::Object)
    );

    let err = compile_strict("select soundex(a.name) from Animal a").unwrap_err();
    assert_eq!(err.violation(), Some(ComplianceViolation::FunctionCall));
}

#[test]
fn test_jpa_function_syntax_is_compliant() {
    let statement = compile_strict("select function('soundex', a.name) from Animal a").unwrap();
    assert_eq!(
        selection_expression(&statement, 0).ty,
        basic(BasicType::Object)
    );
}

#[test]
fn test_size_of_collection() {
    let statement = compile("select size(p.pets) from Person p").unwrap();
    let expression = selection_expression(&statement, 0);
    assert!(matches!(expression.kind, ExpressionKind::CollectionSize(_)));
    assert_eq!(expression.ty, basic(BasicType::Integer));

    let err = compile("select size(p.name) from Person p").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_collection_element_functions() {
    assert_eq!(
        selected_type("select maxelement(a.offspring) from Animal a"),
        SemanticType::Entity(Arc::from("Animal"))
    );
    assert_eq!(
        selected_type("select minindex(p.aliases) from Person p"),
        basic(BasicType::Integer)
    );

    let err = compile_strict("select maxelement(a.offspring) from Animal a").unwrap_err();
    assert_eq!(err.violation(), Some(ComplianceViolation::HqlCollectionFunction));

    let err = compile("select maxindex(a.offspring) from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_cast_uses_target_type() {
    let statement = compile("select cast(a.weight as string(20)) from Animal a").unwrap();
    let expression = selection_expression(&statement, 0);
    assert_eq!(expression.ty, basic(BasicType::String));
    match &expression.kind {
        ExpressionKind::Function(call) => match &call.arguments[1].kind {
            ExpressionKind::CastTarget(target) => assert_eq!(target.length, Some(20)),
            other => panic!("Expected cast target, got {:?}", other),
        },
        other => panic!("Expected function call, got {:?}", other),
    }

    let err = compile("select cast(a.weight as gibberish) from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_extract_shorthand() {
    assert_eq!(
        selected_type("select year(a.birthDate) from Animal a"),
        basic(BasicType::Integer)
    );
}

#[test]
fn test_trim_arguments() {
    let statement = compile("select trim(leading 'x' from a.name) from Animal a").unwrap();
    match &selection_expression(&statement, 0).kind {
        ExpressionKind::Function(call) => {
            assert_eq!(
                call.arguments[0].kind,
                ExpressionKind::TrimSpecification(TrimSpecification::Leading)
            );
            assert_eq!(
                call.arguments[1].kind,
                ExpressionKind::Literal(crate::sqm::LiteralValue::Character('x'))
            );
        }
        other => panic!("Expected function call, got {:?}", other),
    }

    let err = compile("select trim(leading 'xy' from a.name) from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_quantified_subquery() {
    let statement = compile(
        "select a from Animal a where a.weight > all (select b.weight from Animal b)",
    )
    .unwrap();
    match where_predicate(&statement) {
        Predicate::Comparison { rhs, .. } => {
            assert!(matches!(rhs.kind, ExpressionKind::Every(_)));
            assert_eq!(rhs.ty, basic(BasicType::Double));
        }
        other => panic!("Expected comparison, got {:?}", other),
    }
}
