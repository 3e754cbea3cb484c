mod compliance_gates;
mod dml;
mod functions;
mod paths;
mod predicates;
mod scenarios;

use lazy_static::lazy_static;

use crate::config::CompileOptions;
use crate::domain::StaticDomainModel;
use crate::error::HqlResult;
use crate::sqm::{Expression, FromElement, Predicate, QuerySpec, Selectable, Statement, StatementKind};

const ZOO_MODEL: &str = r#"{
    "entities": [
        { "name": "Animal", "class": "zoo.Animal", "id": "id", "version": "version",
          "attributes": [
            { "name": "id", "type": { "basic": "Long" } },
            { "name": "version", "type": { "basic": "Integer" } },
            { "name": "name", "type": { "basic": "String" } },
            { "name": "weight", "type": { "basic": "Double" } },
            { "name": "status", "type": { "enum": "zoo.Status" } },
            { "name": "owner", "type": { "entity": "Person" } },
            { "name": "birthDate", "type": { "basic": "LocalDate" } },
            { "name": "offspring", "type": { "entity": "Animal" }, "collection": "set" },
            { "name": "nicknames", "type": { "basic": "String" }, "collection": "list" }
          ] },
        { "name": "Dog", "class": "zoo.Dog", "supertype": "Animal",
          "attributes": [ { "name": "breed", "type": { "basic": "String" } } ] },
        { "name": "Cat", "class": "zoo.Cat", "supertype": "Animal",
          "attributes": [ { "name": "lives", "type": { "basic": "Integer" } } ] },
        { "name": "Person", "class": "zoo.Person", "id": "id",
          "attributes": [
            { "name": "id", "type": { "basic": "Long" } },
            { "name": "name", "type": { "basic": "String" } },
            { "name": "address", "type": { "embeddable": "Address" } },
            { "name": "pets", "type": { "entity": "Animal" }, "collection": "bag" },
            { "name": "phones", "type": { "basic": "String" }, "collection": "map",
              "index": { "basic": "String" } },
            { "name": "aliases", "type": { "basic": "String" }, "collection": "list" }
          ] }
    ],
    "embeddables": [
        { "name": "Address", "attributes": [
            { "name": "street", "type": { "basic": "String" } },
            { "name": "city", "type": { "basic": "String" } }
        ] }
    ],
    "enums": [ { "name": "zoo.Status", "constants": ["ACTIVE", "RETIRED"] } ],
    "imports": { "Summary": "zoo.Summary" },
    "classes": ["zoo.Summary"],
    "polymorphic": { "Creature": ["Dog", "Cat"] }
}"#;

lazy_static! {
    static ref ZOO: StaticDomainModel =
        StaticDomainModel::from_json(ZOO_MODEL).expect("valid zoo model");
}

fn compile(query: &str) -> HqlResult<Statement> {
    crate::compile(query, &*ZOO, &CompileOptions::default())
}

fn compile_strict(query: &str) -> HqlResult<Statement> {
    crate::compile(query, &*ZOO, &CompileOptions::strict())
}

/// The single query spec of a select statement.
fn query_spec(statement: &Statement) -> &QuerySpec {
    match &statement.kind {
        StatementKind::Select(select) => select
            .query_part
            .as_spec()
            .expect("Expected a single query spec"),
        other => panic!("Expected select statement, got {:?}", other),
    }
}

fn selection_expression(statement: &Statement, index: usize) -> &Expression {
    match &query_spec(statement).select.selections[index].selectable {
        Selectable::Expression(expression) => expression,
        other => panic!("Expected expression selection, got {:?}", other),
    }
}

fn where_predicate(statement: &Statement) -> &Predicate {
    query_spec(statement)
        .where_clause
        .as_ref()
        .expect("Expected a where clause")
}

fn element_by_alias<'s>(statement: &'s Statement, alias: &str) -> &'s FromElement {
    statement
        .from_elements
        .iter()
        .find(|element| element.alias.as_deref() == Some(alias))
        .unwrap_or_else(|| panic!("Expected from-element aliased {}", alias))
}
