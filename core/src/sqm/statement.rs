use super::expression::Expression;
use super::from::{FromArena, FromElement, FromId};
use super::parameter::Parameter;
use super::path::Path;
use super::predicate::Predicate;
use super::query::QueryPart;

/// A fully resolved statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    /// Every root, join and correlation created for this statement.
    pub from_elements: FromArena,
    /// Parameters in order of appearance.
    pub parameters: Vec<Parameter>,
}

impl Statement {
    pub fn from_element(&self, id: FromId) -> &FromElement {
        self.from_elements.get(id)
    }

    pub fn query_part(&self) -> Option<&QueryPart> {
        match &self.kind {
            StatementKind::Select(select) => Some(&select.query_part),
            StatementKind::InsertSelect(insert) => Some(&insert.query_part),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Select(SelectStatement),
    InsertSelect(InsertSelectStatement),
    InsertValues(InsertValuesStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub query_part: QueryPart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertSelectStatement {
    pub target: FromId,
    pub target_paths: Vec<Path>,
    pub query_part: QueryPart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertValuesStatement {
    pub target: FromId,
    pub target_paths: Vec<Path>,
    pub values: Vec<Vec<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub path: Path,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub target: FromId,
    pub versioned: bool,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub target: FromId,
    pub where_clause: Option<Predicate>,
}
