use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::domain::{BasicType, SemanticType};
use crate::error::ErrorKind;
use crate::sqm::{
    ExpressionKind, FetchClauseType, FromKind, InstantiationTarget, LiteralValue, QueryPart,
    SetOperator, SortDirection,
};

#[test]
fn test_simple_select_resolves_root() {
    let statement = compile("select a from Animal a").unwrap();
    let spec = query_spec(&statement);
    assert_eq!(spec.from.roots.len(), 1);

    let root = statement.from_element(spec.from.roots[0]);
    assert_eq!(root.kind, FromKind::Root);
    assert_eq!(root.navigable_path.to_string(), "Animal(a)");
    assert_eq!(
        spec.select.selections[0].semantic_type(),
        SemanticType::Entity(Arc::from("Animal"))
    );
}

#[test]
fn test_order_by_position_references_selection() {
    let statement = compile("select a from Animal a order by 1").unwrap();
    let order = &query_spec(&statement).order;
    assert_eq!(order.order_by.len(), 1);
    assert_eq!(
        order.order_by[0].expression.kind,
        ExpressionKind::AliasedNodeReference { position: 1 }
    );
    assert_eq!(order.order_by[0].direction, SortDirection::Ascending);
}

#[test]
fn test_order_by_unknown_position_fails() {
    let err = compile("select a from Animal a order by 2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    assert!(err.to_string().contains("Numeric literal `2` used in order-by"));
}

#[test]
fn test_order_by_selection_alias() {
    let statement = compile("select a.name as n from Animal a order by n desc nulls last").unwrap();
    let sort = &query_spec(&statement).order.order_by[0];
    assert_eq!(sort.expression.kind, ExpressionKind::AliasedNodeReference { position: 1 });
    assert_eq!(sort.direction, SortDirection::Descending);
    assert!(sort.nulls.is_some());
}

#[test]
fn test_alias_order_by_rejects_collation() {
    let err = compile("select a.name as n from Animal a order by n collate ucs_basic").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
}

#[test]
fn test_group_by_position_and_having() {
    let statement = compile(
        "select a.status, count(a) from Animal a group by 1 having count(a) > 1",
    )
    .unwrap();
    let spec = query_spec(&statement);
    assert_eq!(spec.group_by.len(), 1);
    assert_eq!(
        spec.group_by[0].kind,
        ExpressionKind::AliasedNodeReference { position: 1 }
    );
    assert!(spec.having.is_some());
}

#[test]
fn test_group_by_unknown_position_names_clause() {
    let err = compile("select a.status from Animal a group by 3").unwrap_err();
    assert!(err.to_string().contains("used in group-by"));
}

#[test]
fn test_limit_and_fetch_rejected_in_any_mode() {
    let query = "select a from Animal a order by a.name limit 10 fetch first 5 rows only";
    for result in [compile(query), compile_strict(query)] {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
        assert!(err.to_string().contains("Can't use both, limit and fetch clause!"));
    }
}

#[test]
fn test_limit_becomes_rows_only_fetch() {
    let statement = compile("select a from Animal a limit 10 offset 5").unwrap();
    let order = &query_spec(&statement).order;
    assert_eq!(
        order.fetch.as_ref().map(|fetch| &fetch.kind),
        Some(&ExpressionKind::Literal(LiteralValue::Integer(10)))
    );
    assert_eq!(
        order.offset.as_ref().map(|offset| &offset.kind),
        Some(&ExpressionKind::Literal(LiteralValue::Integer(5)))
    );
    assert_eq!(order.fetch_type, FetchClauseType::RowsOnly);
}

#[test]
fn test_fetch_clause_keeps_flags() {
    let statement =
        compile("select a from Animal a order by a.id fetch first 10 percent rows with ties")
            .unwrap();
    let order = &query_spec(&statement).order;
    assert_eq!(order.fetch_type, FetchClauseType::PercentWithTies);
}

#[test]
fn test_subquery_limit_requires_order_by() {
    let err = compile("select a from Animal a where a.id in (select b.id from Animal b limit 1)")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
    assert!(err.to_string().contains("require an order-by clause"));

    assert!(
        compile(
            "select a from Animal a where a.id in (select b.id from Animal b order by b.id limit 1)"
        )
        .is_ok()
    );
}

#[test]
fn test_implicit_select_selects_roots() {
    let statement = compile("from Animal a").unwrap();
    let select = &query_spec(&statement).select;
    assert_eq!(select.selections.len(), 1);
    assert_eq!(select.selections[0].alias.as_deref(), Some("a"));
}

#[test]
fn test_set_operation_builds_group() {
    let statement =
        compile("select a.name from Animal a union select p.name from Person p").unwrap();
    let StatementKind::Select(select) = &statement.kind else {
        panic!("Expected select statement");
    };
    match &select.query_part {
        QueryPart::Group(group) => {
            assert_eq!(group.operator, Some(SetOperator::Union));
            assert_eq!(group.parts.len(), 2);
        }
        other => panic!("Expected query group, got {:?}", other),
    }
}

#[test]
fn test_mixed_set_operators_nest() {
    let statement = compile(
        "select a.id from Animal a union all select p.id from Person p except select b.id from Animal b",
    )
    .unwrap();
    let group = statement.query_part().and_then(QueryPart::as_group).unwrap();
    assert_eq!(group.operator, Some(SetOperator::Except));
    let nested = group.parts[0].as_group().unwrap();
    assert_eq!(nested.operator, Some(SetOperator::UnionAll));
}

#[test]
fn test_set_operation_branches_have_own_scope() {
    assert!(compile("select a.name from Animal a union select a.name from Animal a").is_ok());
}

#[test]
fn test_set_operation_arity_mismatch() {
    let err = compile("select a.name, a.id from Animal a union select p.name from Person p")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
    assert!(err.to_string().contains("same arity"));
}

#[test]
fn test_set_operation_rejects_fetch_joins() {
    let err = compile("select a from Animal a join fetch a.owner union select b from Animal b")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_dynamic_instantiation_of_imported_class() {
    let statement = compile("select new Summary(a.name, a.weight as w) from Animal a").unwrap();
    match &query_spec(&statement).select.selections[0].selectable {
        Selectable::DynamicInstantiation(instantiation) => {
            assert_eq!(
                instantiation.target,
                InstantiationTarget::Class(Arc::from("zoo.Summary"))
            );
            assert_eq!(instantiation.arguments.len(), 2);
            assert_eq!(instantiation.arguments[1].alias.as_deref(), Some("w"));
        }
        other => panic!("Expected dynamic instantiation, got {:?}", other),
    }
}

#[test]
fn test_dynamic_instantiation_of_unknown_class() {
    let err = compile("select new Missing(a.name) from Animal a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
}

#[test]
fn test_list_instantiation() {
    let statement = compile("select new list(a.name, a.id) from Animal a").unwrap();
    assert_eq!(
        query_spec(&statement).select.selections[0].semantic_type(),
        SemanticType::List
    );
}

#[test]
fn test_duplicate_from_alias() {
    let err = compile("select a from Animal a, Person a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_duplicate_selection_alias() {
    let err = compile("select a.name as x, a.id as x from Animal a").unwrap_err();
    assert!(err.to_string().contains("Alias [x] is already used in same select clause"));
}

#[test]
fn test_unknown_entity() {
    let err = compile("select x from Plant x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(err.to_string().contains("Could not resolve entity reference: Plant"));
}

#[test]
fn test_correlated_subquery_root() {
    let statement =
        compile("select a from Animal a where exists (select o from a.offspring o)").unwrap();
    let correlation = statement
        .from_elements
        .iter()
        .find(|element| matches!(element.kind, FromKind::Correlation { .. }))
        .expect("Expected a correlation");
    assert_eq!(correlation.navigable_path.to_string(), "Animal(a)");

    let offspring = element_by_alias(&statement, "o");
    assert_eq!(offspring.lhs, Some(correlation.id));
    assert_eq!(offspring.navigable_path.to_string(), "Animal(a).offspring(o)");
}

#[test]
fn test_subquery_sees_enclosing_aliases() {
    let statement = compile(
        "select a from Animal a where a.weight > (select avg(b.weight) from Animal b where b.owner = a.owner)",
    )
    .unwrap();
    assert!(matches!(where_predicate(&statement), Predicate::Comparison { .. }));
}

#[test]
fn test_sibling_subqueries_do_not_share_aliases() {
    let err = compile(
        "select a from Animal a where exists (select b from Animal b) \
         and exists (select c from Animal c where c.name = b.name)",
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_subquery_type_is_single_selection_type() {
    let statement =
        compile("select (select max(b.weight) from Animal b) from Animal a").unwrap();
    assert_eq!(
        selection_expression(&statement, 0).ty,
        SemanticType::Basic(BasicType::Double)
    );
}

#[test]
fn test_compilation_is_repeatable() {
    let query = "select a.name, o from Animal a left join a.offspring o where a.weight > :w order by 1";
    assert_eq!(compile(query).unwrap(), compile(query).unwrap());
}

#[test]
fn test_parameters_collected_in_order() {
    let statement =
        compile("select a from Animal a where a.name = :name and a.weight > ?1").unwrap();
    let names: Vec<String> = statement
        .parameters
        .iter()
        .map(|parameter| parameter.to_string())
        .collect();
    assert_eq!(names, vec![":name".to_string(), "?1".to_string()]);
}
