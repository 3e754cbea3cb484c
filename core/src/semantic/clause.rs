//! Statement and clause visitors.

use std::sync::Arc;

use tracing::debug;

use super::builder::{SemanticQueryBuilder, TreatHandler};
use super::compliance::ComplianceViolation;
use super::consumer::{PathConsumer, PathPart};
use super::state::StateKind;
use crate::domain::{CollectionClassification, EntityReference, EntityType, SemanticType};
use crate::error::{HqlError, HqlResult};
use crate::hql::tree;
use crate::sqm::{
    Assignment, DeleteStatement, DynamicInstantiation, Expression, ExpressionKind, FromClause,
    FromId, FromKind, InsertSelectStatement, InsertValuesStatement, InstantiationArgument,
    InstantiationTarget, JoinType, NavigablePath, Path, PathKind, PathSource, QueryGroup, QueryOrder,
    QueryPart, QuerySpec, Selectable, SelectClause, SelectStatement, Selection, SetOperator,
    StatementKind, UpdateStatement,
};

impl SemanticQueryBuilder<'_> {
    // Statements

    pub(super) fn visit_select_statement(
        &mut self,
        query: &tree::QueryExpression,
    ) -> HqlResult<StatementKind> {
        let query_part =
            self.with_processing_state(StateKind::Query, |builder| builder.visit_query_expression(query))?;
        Ok(StatementKind::Select(SelectStatement { query_part }))
    }

    pub(super) fn visit_insert_statement(
        &mut self,
        insert: &tree::InsertStatement,
    ) -> HqlResult<StatementKind> {
        let entity = self.resolve_dml_target(&insert.target)?;
        match &insert.source {
            tree::InsertSource::Query(query) => {
                let query_part = self.with_processing_state(StateKind::Dml, |builder| {
                    builder.visit_query_expression(query)
                })?;
                let (target, target_paths) = self.visit_insert_target(entity, &insert.target_fields)?;
                let selections = query_part.first_spec().select.selections.len();
                if target_paths.len() != selections {
                    return Err(HqlError::Semantic(format!(
                        "Expected insert attribute count [{}] did not match Query selection count [{}]",
                        target_paths.len(),
                        selections
                    )));
                }
                Ok(StatementKind::InsertSelect(InsertSelectStatement {
                    target,
                    target_paths,
                    query_part,
                }))
            }
            tree::InsertSource::Values(rows) => {
                let values = self.with_processing_state(StateKind::Dml, |builder| {
                    rows.iter()
                        .map(|row| builder.visit_expressions(row))
                        .collect::<HqlResult<Vec<_>>>()
                })?;
                let (target, target_paths) = self.visit_insert_target(entity, &insert.target_fields)?;
                if let Some(row) = values.iter().find(|row| row.len() != target_paths.len()) {
                    return Err(HqlError::Semantic(format!(
                        "Expected insert attribute count [{}] did not match values count [{}]",
                        target_paths.len(),
                        row.len()
                    )));
                }
                Ok(StatementKind::InsertValues(InsertValuesStatement {
                    target,
                    target_paths,
                    values,
                }))
            }
        }
    }

    /// Resolves the insert's state fields against an unaliased root.
    fn visit_insert_target(
        &mut self,
        entity: Arc<EntityType>,
        fields: &[tree::DottedName],
    ) -> HqlResult<(FromId, Vec<Path>)> {
        self.with_processing_state(StateKind::Dml, |builder| {
            let target = builder.create_root(PathSource::Entity(entity.clone()), &entity.name, None)?;
            let paths = fields
                .iter()
                .map(|field| builder.visit_state_field(field))
                .collect::<HqlResult<Vec<_>>>()?;
            Ok((target, paths))
        })
    }

    fn visit_state_field(&mut self, field: &tree::DottedName) -> HqlResult<Path> {
        match self.consume_dotted_name(field)? {
            PathPart::Path(path) => Ok(path),
            _ => Err(HqlError::Semantic(format!(
                "Expecting domain-model path, but found : {}",
                field.text()
            ))),
        }
    }

    pub(super) fn visit_update_statement(
        &mut self,
        update: &tree::UpdateStatement,
    ) -> HqlResult<StatementKind> {
        let entity = self.resolve_dml_target(&update.target)?;
        self.with_processing_state(StateKind::Dml, |builder| {
            let alias = builder.identification_variable(update.alias.as_ref())?;
            let target = builder.create_root(PathSource::Entity(entity.clone()), &entity.name, alias)?;
            let mut assignments = Vec::with_capacity(update.assignments.len());
            for assignment in &update.assignments {
                let path = builder.visit_state_field(&assignment.path)?;
                let value = match builder.enum_shorthand_for(&assignment.value, &path.semantic_type())? {
                    Some(constant) => constant,
                    None => builder.visit_expression(&assignment.value)?,
                };
                assignments.push(Assignment { path, value });
            }
            let where_clause = update
                .where_clause
                .as_ref()
                .map(|predicate| builder.visit_predicate(predicate))
                .transpose()?;
            Ok(StatementKind::Update(UpdateStatement {
                target,
                versioned: update.versioned,
                assignments,
                where_clause,
            }))
        })
    }

    pub(super) fn visit_delete_statement(
        &mut self,
        delete: &tree::DeleteStatement,
    ) -> HqlResult<StatementKind> {
        let entity = self.resolve_dml_target(&delete.target)?;
        self.with_processing_state(StateKind::Dml, |builder| {
            let alias = builder.identification_variable(delete.alias.as_ref())?;
            let target = builder.create_root(PathSource::Entity(entity.clone()), &entity.name, alias)?;
            let where_clause = delete
                .where_clause
                .as_ref()
                .map(|predicate| builder.visit_predicate(predicate))
                .transpose()?;
            Ok(StatementKind::Delete(DeleteStatement {
                target,
                where_clause,
            }))
        })
    }

    fn resolve_dml_target(&self, name: &tree::DottedName) -> HqlResult<Arc<EntityType>> {
        let text = name.text();
        match self.model.resolve_entity(&text) {
            Some(EntityReference::Entity(entity)) => {
                self.check_entity_name(&text, &entity)?;
                Ok(entity)
            }
            Some(EntityReference::Polymorphic { .. }) => Err(HqlError::Semantic(format!(
                "Unmapped polymorphic reference cannot be used as a DML target : {}",
                text
            ))),
            None => Err(HqlError::Resolution(format!(
                "Could not resolve entity name [{}] as DML target",
                text
            ))),
        }
    }

    // Query expressions

    pub(super) fn visit_query_expression(
        &mut self,
        query: &tree::QueryExpression,
    ) -> HqlResult<QueryPart> {
        if query.rest.is_empty() {
            return self.visit_ordered_query(&query.first);
        }
        self.compliance.check(ComplianceViolation::SetOperations)?;

        let first = self.visit_ordered_query(&query.first)?;
        // Each branch gets a fresh scope; the first branch's scope is set
        // aside meanwhile and restored afterwards.
        let first_state = self
            .states
            .pop()
            .ok_or_else(|| HqlError::Parsing("No processing state is active".to_string()))?;
        let kind = first_state.kind;
        let group = match first {
            QueryPart::Group(group) if group.order.is_empty() => group,
            part => QueryGroup::new(part),
        };
        let group = self.visit_set_branches(kind, &query.rest, group);
        self.states.push(first_state);
        let group = group?;

        self.validate_query_group(&group)?;
        Ok(QueryPart::Group(group))
    }

    fn visit_set_branches(
        &mut self,
        kind: StateKind,
        branches: &[(tree::SetOperatorSyntax, tree::OrderedQuery)],
        mut group: QueryGroup,
    ) -> HqlResult<QueryGroup> {
        for (operator, branch) in branches {
            let part = self.with_processing_state(kind, |builder| match branch {
                tree::OrderedQuery::Nested { .. } => builder
                    .with_processing_state(kind, |builder| builder.visit_ordered_query(branch)),
                tree::OrderedQuery::Spec { .. } => builder.visit_ordered_query(branch),
            })?;
            group = group.append(set_operator(*operator), part);
        }
        Ok(group)
    }

    /// Set-operation branches must agree on arity and may not fetch.
    fn validate_query_group(&self, group: &QueryGroup) -> HqlResult<()> {
        let mut arity = None;
        for part in &group.parts {
            let spec = part.first_spec();
            let count = spec.select.selections.len();
            match arity {
                None => arity = Some(count),
                Some(expected) if expected != count => {
                    return Err(HqlError::Semantic(
                        "All query parts in a query group must have the same arity".to_string(),
                    ));
                }
                Some(_) => {}
            }
            self.validate_no_fetch_joins(part)?;
        }
        Ok(())
    }

    fn validate_no_fetch_joins(&self, part: &QueryPart) -> HqlResult<()> {
        match part {
            QueryPart::Spec(spec) => {
                if spec.from.roots.iter().any(|root| self.froms.has_fetch_join(*root)) {
                    return Err(HqlError::Semantic(
                        "Fetch joins are not allowed in query parts of a set operation".to_string(),
                    ));
                }
                Ok(())
            }
            QueryPart::Group(group) => group
                .parts
                .iter()
                .try_for_each(|part| self.validate_no_fetch_joins(part)),
        }
    }

    fn visit_ordered_query(&mut self, query: &tree::OrderedQuery) -> HqlResult<QueryPart> {
        match query {
            tree::OrderedQuery::Spec { query, order } => {
                let mut part = QueryPart::Spec(Box::new(self.visit_query_spec(query)?));
                if let Some(order) = order {
                    self.visit_query_order(&mut part, order)?;
                }
                Ok(part)
            }
            tree::OrderedQuery::Nested { expression, order } => {
                let mut part = self.visit_query_expression(expression)?;
                if let Some(order) = order {
                    self.visit_query_order(&mut part, order)?;
                }
                Ok(part)
            }
        }
    }

    fn visit_query_spec(&mut self, spec: &tree::QuerySpec) -> HqlResult<QuerySpec> {
        let from = self.with_treat_handler(TreatHandler::FromClause, |builder| {
            builder.visit_from_clause(&spec.from)
        })?;
        self.with_treat_handler(TreatHandler::Normal, |builder| {
            let select = match &spec.select {
                Some(select) => builder.visit_select_clause(select)?,
                None => builder.implicit_select(&from)?,
            };
            let where_clause = spec
                .where_clause
                .as_ref()
                .map(|predicate| builder.visit_predicate(predicate))
                .transpose()?;
            let group_by = spec
                .group_by
                .iter()
                .map(|item| builder.visit_group_by_item(item))
                .collect::<HqlResult<Vec<_>>>()?;
            let having = spec
                .having
                .as_ref()
                .map(|predicate| builder.visit_predicate(predicate))
                .transpose()?;
            Ok(QuerySpec {
                from,
                select,
                where_clause,
                group_by,
                having,
                order: QueryOrder::default(),
            })
        })
    }

    // FROM

    fn visit_from_clause(&mut self, from: &tree::FromClause) -> HqlResult<FromClause> {
        let mut roots = Vec::with_capacity(from.spaces.len());
        for space in &from.spaces {
            let root = self.visit_path_root(&space.root)?;
            for join in &space.joins {
                self.visit_join(root, join)?;
            }
            roots.push(root);
        }
        Ok(FromClause { roots })
    }

    fn visit_path_root(&mut self, reference: &tree::EntityReferenceSyntax) -> HqlResult<FromId> {
        let name = reference.name.text();
        let alias = self.identification_variable(reference.alias.as_ref())?;
        match self.model.resolve_entity(&name) {
            Some(EntityReference::Entity(entity)) => {
                self.check_entity_name(&name, &entity)?;
                self.create_root(PathSource::Entity(entity.clone()), &entity.name, alias)
            }
            Some(EntityReference::Polymorphic {
                name: polymorphic,
                implementors,
            }) => {
                self.check_compliance(ComplianceViolation::UnmappedPolymorphism, || {
                    format!("unmapped polymorphic reference [{}]", polymorphic)
                })?;
                if self.depth() > 1 {
                    return Err(HqlError::Semantic(format!(
                        "Illegal implicit-polymorphic domain path in sub-query : {}",
                        polymorphic
                    )));
                }
                debug!(%polymorphic, implementors = implementors.len(), "unmapped polymorphic root");
                let entity_name = polymorphic.clone();
                self.create_root(
                    PathSource::Polymorphic {
                        name: polymorphic,
                        implementors,
                    },
                    &entity_name,
                    alias,
                )
            }
            None => {
                if self.depth() > 1
                    && let Some((head, rest)) = reference.name.parts.split_first()
                    && !rest.is_empty()
                    && let Some(correlated) = self.find_from_in_parent_scopes(&head.text)
                {
                    return self.correlate(correlated, rest, alias);
                }
                Err(HqlError::Resolution(format!(
                    "Could not resolve entity reference: {}",
                    name
                )))
            }
        }
    }

    /// `from a.pets p` in a subquery: correlate `a` and join the rest.
    fn correlate(
        &mut self,
        correlated: FromId,
        rest: &[tree::Ident],
        alias: Option<Arc<str>>,
    ) -> HqlResult<FromId> {
        let parent = self.froms.get(correlated);
        let parent_alias = parent.alias.clone();
        let navigable_path = parent.navigable_path.clone();
        let source = parent.source.clone();
        debug!(correlated = %navigable_path, "correlating from-element of enclosing query");
        let correlation = self.add_from_element(
            FromKind::Correlation { correlated },
            parent_alias,
            navigable_path,
            source,
            None,
        )?;
        self.with_consumer(
            PathConsumer::qualified_join_from(correlation, correlation, alias),
            |builder| {
                let last = rest.len() - 1;
                for (index, part) in rest.iter().enumerate() {
                    builder.consume_identifier(&part.text, false, index == last)?;
                }
                builder.consumed_part()
            },
        )?;
        Ok(correlation)
    }

    pub(super) fn create_root(
        &mut self,
        source: PathSource,
        entity_name: &str,
        alias: Option<Arc<str>>,
    ) -> HqlResult<FromId> {
        let navigable_alias = self.navigable_alias(alias.as_ref());
        self.add_from_element(
            FromKind::Root,
            alias,
            NavigablePath::root(entity_name, &navigable_alias),
            source,
            None,
        )
    }

    /// Strict mode wants the entity name, not an import or class name.
    fn check_entity_name(&self, written: &str, entity: &EntityType) -> HqlResult<()> {
        if written != &*entity.name {
            self.check_compliance(ComplianceViolation::FqnEntityName, || {
                format!(
                    "Encountered FQN entity name [{}], but strict JPQL compliance was requested ( [{}] should be used instead )",
                    written, entity.name
                )
            })?;
        }
        Ok(())
    }

    fn visit_join(&mut self, root: FromId, join: &tree::Join) -> HqlResult<()> {
        match join {
            tree::Join::Cross(reference) => self.visit_cross_join(root, reference),
            tree::Join::Qualified(join) => self.visit_qualified_join(root, join),
            tree::Join::JpaCollection { path, alias } => {
                let alias = self.identification_variable(alias.as_ref())?;
                let joined = self.with_consumer(
                    PathConsumer::qualified_join(root, JoinType::Inner, false, alias),
                    |builder| builder.visit_join_target(path),
                )?;
                let element = self.froms.get(joined);
                if !element.attribute().is_some_and(|attribute| attribute.is_plural()) {
                    return Err(HqlError::Semantic(format!(
                        "Path argument to IN() in the FROM clause must be a plural attribute : {}",
                        element.navigable_path
                    )));
                }
                Ok(())
            }
        }
    }

    fn visit_cross_join(
        &mut self,
        root: FromId,
        reference: &tree::EntityReferenceSyntax,
    ) -> HqlResult<()> {
        let name = reference.name.text();
        let entity = match self.model.resolve_entity(&name) {
            Some(EntityReference::Entity(entity)) => entity,
            Some(EntityReference::Polymorphic { .. }) => {
                return Err(HqlError::Semantic(format!(
                    "Unmapped polymorphic references are not supported as cross join targets : {}",
                    name
                )));
            }
            None => {
                return Err(HqlError::Resolution(format!(
                    "Could not resolve entity reference: {}",
                    name
                )));
            }
        };
        self.check_entity_name(&name, &entity)?;
        let alias = self.identification_variable(reference.alias.as_ref())?;
        let navigable_alias = self.navigable_alias(alias.as_ref());
        self.add_from_element(
            FromKind::CrossJoin,
            alias,
            NavigablePath::root(&entity.name, &navigable_alias),
            PathSource::Entity(entity),
            Some(root),
        )?;
        Ok(())
    }

    fn visit_qualified_join(&mut self, root: FromId, join: &tree::QualifiedJoin) -> HqlResult<()> {
        let join_type = match join.kind {
            tree::JoinKind::Inner => JoinType::Inner,
            tree::JoinKind::Left => JoinType::Left,
            tree::JoinKind::Right => JoinType::Right,
            tree::JoinKind::Full => JoinType::Full,
        };
        let alias = self.identification_variable(join.alias.as_ref())?;
        if join.fetch && alias.is_some() {
            self.check_compliance(ComplianceViolation::AliasedFetchJoin, || {
                format!("fetch join [{}] declares an alias", join.target.text())
            })?;
        }
        let joined = self.with_consumer(
            PathConsumer::qualified_join(root, join_type, join.fetch, alias),
            |builder| builder.visit_join_target(&join.target),
        )?;
        if let Some(predicate) = &join.predicate {
            let predicate = self.with_consumer(PathConsumer::join_predicate(joined), |builder| {
                builder.visit_predicate(predicate)
            })?;
            self.froms.get_mut(joined).join_predicate = Some(predicate);
        }
        Ok(())
    }

    // SELECT

    fn implicit_select(&mut self, from: &FromClause) -> HqlResult<SelectClause> {
        self.compliance.check(ComplianceViolation::ImplicitSelect)?;
        debug!(roots = from.roots.len(), "no select clause, selecting the from roots");
        let selections = from
            .roots
            .iter()
            .map(|root| Selection {
                selectable: Selectable::Expression(Expression::path(self.from_path(*root))),
                alias: self.froms.get(*root).alias.clone(),
            })
            .collect();
        Ok(SelectClause {
            distinct: false,
            selections,
        })
    }

    fn visit_select_clause(&mut self, select: &tree::SelectClause) -> HqlResult<SelectClause> {
        let selections = select
            .selections
            .iter()
            .map(|item| self.visit_selection(&item.selectable, item.alias.as_ref()))
            .collect::<HqlResult<Vec<_>>>()?;
        Ok(SelectClause {
            distinct: select.distinct,
            selections,
        })
    }

    fn visit_selection(
        &mut self,
        selectable: &tree::Selectable,
        alias: Option<&tree::Alias>,
    ) -> HqlResult<Selection> {
        let alias = self.result_variable(alias)?;
        let selectable = match selectable {
            tree::Selectable::Instantiation(instantiation) => {
                Selectable::DynamicInstantiation(self.visit_instantiation(instantiation)?)
            }
            other => {
                let expression = self.visit_selectable_expression(other)?;
                let from_key = alias.as_deref().map(|alias| self.normalize_alias(alias));
                self.current_state()?.registry.register_selection(
                    alias.clone(),
                    from_key.as_deref(),
                    expression.ty.clone(),
                )?;
                Selectable::Expression(expression)
            }
        };
        Ok(Selection { selectable, alias })
    }

    fn visit_selectable_expression(&mut self, selectable: &tree::Selectable) -> HqlResult<Expression> {
        match selectable {
            tree::Selectable::Expression(expression) => {
                let expression = self.visit_expression(expression)?;
                match expression.kind {
                    ExpressionKind::Path(path) if path.source.is_plural() => {
                        Ok(Expression::path(self.element_path(path)?))
                    }
                    kind => Ok(Expression::new(kind, expression.ty)),
                }
            }
            tree::Selectable::Object(ident) => {
                let id = self.find_from_by_alias(&ident.text).ok_or_else(|| {
                    HqlError::Semantic(format!(
                        "Unable to resolve alias [{}] in selection [OBJECT({})]",
                        ident.text, ident.text
                    ))
                })?;
                Ok(Expression::path(self.from_path(id)))
            }
            tree::Selectable::MapEntry(path) => {
                let path = self.visit_domain_path(path)?;
                let plural = self
                    .plural_of(&path)
                    .filter(|plural| plural.classification == CollectionClassification::Map)
                    .ok_or_else(|| {
                        HqlError::Semantic(format!(
                            "Path argument to ENTRY() must be a map-valued path : {}",
                            path.navigable_path
                        ))
                    })?;
                let key = plural
                    .index
                    .as_ref()
                    .map(|index| index.semantic_type())
                    .unwrap_or(SemanticType::Unknown);
                let ty = SemanticType::MapEntry {
                    key: Box::new(key),
                    value: Box::new(plural.element.semantic_type()),
                };
                Ok(Expression::new(ExpressionKind::MapEntry(path), ty))
            }
            tree::Selectable::Instantiation(_) => Err(HqlError::Parsing(
                "Dynamic instantiation is not an expression".to_string(),
            )),
        }
    }

    /// Selecting a plural attribute selects its elements.
    fn element_path(&self, collection: Path) -> HqlResult<Path> {
        let Some(plural) = collection.source.plural() else {
            return Ok(collection);
        };
        debug!(path = %collection.navigable_path, "plural path selected as its elements");
        Ok(Path {
            source: self.value_source(&plural.element)?,
            navigable_path: collection.navigable_path.wrap("value"),
            kind: PathKind::Element {
                collection: Box::new(collection),
            },
        })
    }

    fn visit_instantiation(
        &mut self,
        instantiation: &tree::Instantiation,
    ) -> HqlResult<DynamicInstantiation> {
        let target = match &instantiation.target {
            tree::InstantiationTargetSyntax::List => InstantiationTarget::List,
            tree::InstantiationTargetSyntax::Map => InstantiationTarget::Map,
            tree::InstantiationTargetSyntax::Class(name) => {
                let qualified = self.model.qualify_importable_name(&name.text());
                let class = self.model.load_class(&qualified).ok_or_else(|| {
                    HqlError::Semantic(format!(
                        "Unable to resolve class named for dynamic instantiation : {}",
                        name.text()
                    ))
                })?;
                InstantiationTarget::Class(class.name)
            }
        };
        let mut arguments = Vec::with_capacity(instantiation.arguments.len());
        for argument in &instantiation.arguments {
            let selection = self.visit_selection(&argument.selectable, argument.alias.as_ref())?;
            arguments.push(InstantiationArgument {
                selectable: selection.selectable,
                alias: selection.alias,
            });
        }
        Ok(DynamicInstantiation { target, arguments })
    }

    fn visit_group_by_item(&mut self, item: &tree::GroupByItem) -> HqlResult<Expression> {
        self.visit_item_key(&item.key, item.collation.as_ref(), "group-by")
    }
}

fn set_operator(syntax: tree::SetOperatorSyntax) -> SetOperator {
    match (syntax.kind, syntax.all) {
        (tree::SetOperatorKind::Union, false) => SetOperator::Union,
        (tree::SetOperatorKind::Union, true) => SetOperator::UnionAll,
        (tree::SetOperatorKind::Intersect, false) => SetOperator::Intersect,
        (tree::SetOperatorKind::Intersect, true) => SetOperator::IntersectAll,
        (tree::SetOperatorKind::Except, false) => SetOperator::Except,
        (tree::SetOperatorKind::Except, true) => SetOperator::ExceptAll,
    }
}
