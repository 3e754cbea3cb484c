//! The semantic query builder.
//!
//! Walks a parse tree once and produces a [`Statement`]. All state lives on
//! explicit stacks owned by the builder: processing states (one per query
//! scope), path consumers, parameter contexts and treat handlers. Every push
//! goes through one of the scoped `with_*` helpers so the stacks are always
//! restored, on success and on error.

use std::sync::Arc;

use tracing::{debug, debug_span};

use super::compliance::{Compliance, ComplianceViolation};
use super::consumer::PathConsumer;
use super::state::{ProcessingState, StateKind};
use crate::config::CompileOptions;
use crate::domain::{Attribute, AttributeKind, DomainModel, PluralAttribute, ValueType};
use crate::error::{HqlError, HqlResult};
use crate::function::FunctionRegistry;
use crate::hql::tree;
use crate::sqm::{
    FromArena, FromElement, FromId, FromKind, NavigablePath, Parameter, Path, PathSource,
    Statement,
};

/// How `treat(..)` is applied in the current clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TreatHandler {
    /// Treats in the FROM clause downcast the from-element itself.
    FromClause,
    Normal,
}

/// Compiles parse trees into semantic statements.
///
/// A builder compiles exactly one statement; create a new one per query.
pub struct SemanticQueryBuilder<'a> {
    pub(super) model: &'a dyn DomainModel,
    pub(super) functions: &'a dyn FunctionRegistry,
    pub(super) options: &'a CompileOptions,
    pub(super) compliance: Compliance,
    pub(super) states: Vec<ProcessingState>,
    pub(super) consumers: Vec<PathConsumer>,
    pub(super) parameter_contexts: Vec<bool>,
    pub(super) treat_handlers: Vec<TreatHandler>,
    pub(super) froms: FromArena,
    pub(super) parameters: Vec<Parameter>,
    generated_aliases: usize,
}

impl<'a> SemanticQueryBuilder<'a> {
    pub fn new(
        model: &'a dyn DomainModel,
        functions: &'a dyn FunctionRegistry,
        options: &'a CompileOptions,
    ) -> Self {
        Self {
            model,
            functions,
            options,
            compliance: options.compliance(),
            states: Vec::new(),
            consumers: Vec::new(),
            parameter_contexts: Vec::new(),
            treat_handlers: Vec::new(),
            froms: FromArena::default(),
            parameters: Vec::new(),
            generated_aliases: 0,
        }
    }

    pub fn build_statement(mut self, statement: &tree::Statement) -> HqlResult<Statement> {
        let kind = match statement {
            tree::Statement::Select(_) => "select",
            tree::Statement::Insert(_) => "insert",
            tree::Statement::Update(_) => "update",
            tree::Statement::Delete(_) => "delete",
        };
        let span = debug_span!("compile", kind, strict = self.compliance.is_strict());
        let _guard = span.enter();

        let compiled = self.with_consumer(PathConsumer::basic(), |builder| {
            builder.with_treat_handler(TreatHandler::Normal, |builder| {
                builder.with_parameter_context(false, |builder| match statement {
                    tree::Statement::Select(query) => builder.visit_select_statement(query),
                    tree::Statement::Insert(insert) => builder.visit_insert_statement(insert),
                    tree::Statement::Update(update) => builder.visit_update_statement(update),
                    tree::Statement::Delete(delete) => builder.visit_delete_statement(delete),
                })
            })
        })?;

        debug!(
            from_elements = self.froms.len(),
            parameters = self.parameters.len(),
            "statement compiled"
        );
        Ok(Statement {
            kind: compiled,
            from_elements: self.froms,
            parameters: self.parameters,
        })
    }

    // Scoped stacks

    pub(super) fn with_processing_state<T>(
        &mut self,
        kind: StateKind,
        f: impl FnOnce(&mut Self) -> HqlResult<T>,
    ) -> HqlResult<T> {
        self.states.push(ProcessingState::new(kind));
        let result = f(self);
        self.states.pop();
        result
    }

    pub(super) fn with_consumer<T>(
        &mut self,
        consumer: PathConsumer,
        f: impl FnOnce(&mut Self) -> HqlResult<T>,
    ) -> HqlResult<T> {
        self.consumers.push(consumer);
        let result = f(self);
        self.consumers.pop();
        result
    }

    pub(super) fn with_parameter_context<T>(
        &mut self,
        allow_multi_valued: bool,
        f: impl FnOnce(&mut Self) -> HqlResult<T>,
    ) -> HqlResult<T> {
        self.parameter_contexts.push(allow_multi_valued);
        let result = f(self);
        self.parameter_contexts.pop();
        result
    }

    pub(super) fn with_treat_handler<T>(
        &mut self,
        handler: TreatHandler,
        f: impl FnOnce(&mut Self) -> HqlResult<T>,
    ) -> HqlResult<T> {
        self.treat_handlers.push(handler);
        let result = f(self);
        self.treat_handlers.pop();
        result
    }

    /// Number of nested query scopes; 1 for the top-level query.
    pub(super) fn depth(&self) -> usize {
        self.states.len()
    }

    pub(super) fn current_state(&mut self) -> HqlResult<&mut ProcessingState> {
        self.states
            .last_mut()
            .ok_or_else(|| HqlError::Parsing("No processing state is active".to_string()))
    }

    pub(super) fn allows_multi_valued_binding(&self) -> bool {
        self.parameter_contexts.last().copied().unwrap_or(false)
    }

    pub(super) fn treat_handler(&self) -> TreatHandler {
        self.treat_handlers
            .last()
            .copied()
            .unwrap_or(TreatHandler::Normal)
    }

    // Compliance

    /// Fails with a custom message in strict mode.
    pub(super) fn check_compliance(
        &self,
        violation: ComplianceViolation,
        message: impl FnOnce() -> String,
    ) -> HqlResult<()> {
        if self.compliance.is_strict() {
            return Err(HqlError::Compliance {
                violation,
                message: message(),
            });
        }
        Ok(())
    }

    // Aliases

    /// Identification variables are case-insensitive under strict compliance.
    pub(super) fn normalize_alias(&self, text: &str) -> Arc<str> {
        if self.compliance.is_strict() {
            Arc::from(text.to_lowercase())
        } else {
            Arc::from(text)
        }
    }

    /// From-clause variable, normalized like every later lookup of it.
    pub(super) fn identification_variable(
        &self,
        alias: Option<&tree::Alias>,
    ) -> HqlResult<Option<Arc<str>>> {
        let Some(alias) = alias else {
            return Ok(None);
        };
        self.check_alias_word(alias)?;
        Ok(Some(self.normalize_alias(&alias.ident.text)))
    }

    /// Select-clause alias; kept as written in every mode.
    pub(super) fn result_variable(
        &self,
        alias: Option<&tree::Alias>,
    ) -> HqlResult<Option<Arc<str>>> {
        let Some(alias) = alias else {
            return Ok(None);
        };
        self.check_alias_word(alias)?;
        Ok(Some(Arc::from(alias.ident.text.as_str())))
    }

    fn check_alias_word(&self, alias: &tree::Alias) -> HqlResult<()> {
        let text = &alias.ident.text;
        if alias.explicit && self.options.is_reserved_word(text) {
            self.check_compliance(ComplianceViolation::ReservedWordUsedAsAlias, || {
                format!("reserved word [{}] used as alias", text)
            })?;
        }
        Ok(())
    }

    /// Looks up an alias in the current scope, then in each enclosing one.
    pub(super) fn find_from_by_alias(&self, alias: &str) -> Option<FromId> {
        let alias = self.normalize_alias(alias);
        self.states.iter().rev().enumerate().find_map(|(level, state)| {
            let found = state.registry.find_from_by_alias(&alias);
            if found.is_some() && level > 0 {
                debug!(%alias, level, "alias resolved in enclosing scope");
            }
            found
        })
    }

    /// Looks up an alias in the enclosing scopes only.
    pub(super) fn find_from_in_parent_scopes(&self, alias: &str) -> Option<FromId> {
        let alias = self.normalize_alias(alias);
        let parents = self.states.len().saturating_sub(1);
        self.states[..parents]
            .iter()
            .rev()
            .find_map(|state| state.registry.find_from_by_alias(&alias))
    }

    /// Finds the single from-element exposing an unqualified attribute,
    /// searching the current scope before the enclosing ones.
    pub(super) fn find_from_exposing(&self, attribute: &str) -> HqlResult<Option<FromId>> {
        for (level, state) in self.states.iter().rev().enumerate() {
            let mut exposing = state.registry.froms().iter().copied().filter(|id| {
                let element = self.froms.get(*id);
                !element.is_implicit()
                    && element
                        .source
                        .managed_type()
                        .is_some_and(|owner| self.model.find_attribute(&owner, attribute).is_some())
            });
            let Some(first) = exposing.next() else {
                continue;
            };
            if let Some(second) = exposing.next() {
                return Err(HqlError::Resolution(format!(
                    "Unqualified attribute [{}] is exposed by multiple from-clause elements : {}, {}",
                    attribute,
                    self.froms.get(first).navigable_path,
                    self.froms.get(second).navigable_path
                )));
            }
            if level > 0 {
                debug!(attribute, level, "unqualified attribute resolved in enclosing scope");
            }
            return Ok(Some(first));
        }
        Ok(None)
    }

    // From-elements

    pub(super) fn from_path(&self, id: FromId) -> Path {
        let element = self.froms.get(id);
        let source = match &element.treated_as {
            Some(treated) => PathSource::Entity(treated.clone()),
            None => element.source.clone(),
        };
        Path::from_element(id, element.navigable_path.clone(), source)
    }

    /// The alias used in navigable paths; unaliased elements get a generated one.
    pub(super) fn navigable_alias(&mut self, alias: Option<&Arc<str>>) -> String {
        match alias {
            Some(alias) => alias.to_string(),
            None => {
                let generated = format!("<gen:{}>", self.generated_aliases);
                self.generated_aliases += 1;
                generated
            }
        }
    }

    /// Adds an element to the arena, registers it in the current scope and
    /// attaches it to its left-hand side.
    pub(super) fn add_from_element(
        &mut self,
        kind: FromKind,
        alias: Option<Arc<str>>,
        navigable_path: NavigablePath,
        source: PathSource,
        lhs: Option<FromId>,
    ) -> HqlResult<FromId> {
        let id = self.froms.next_id();
        if let Some(alias) = &alias
            && let Some(existing) = self
                .states
                .last()
                .and_then(|state| state.registry.find_from_by_alias(alias))
        {
            return Err(HqlError::Resolution(format!(
                "Alias [{}] used for multiple from-clause elements : {}, {}",
                alias,
                self.froms.get(existing).navigable_path,
                navigable_path
            )));
        }
        self.current_state()?
            .registry
            .register_from(id, alias.as_ref())?;

        let root = lhs.map(|lhs| self.froms.get(lhs).root).unwrap_or(id);
        self.froms.push(FromElement {
            id,
            kind,
            alias,
            navigable_path,
            source,
            lhs,
            root,
            joins: Vec::new(),
            join_predicate: None,
            treated_as: None,
        });
        if let Some(lhs) = lhs {
            self.froms.get_mut(lhs).joins.push(id);
        }
        Ok(id)
    }

    // Domain helpers

    pub(super) fn value_source(&self, value: &ValueType) -> HqlResult<PathSource> {
        match value {
            ValueType::Basic(_) | ValueType::Enum(_) => Ok(PathSource::Basic(value.semantic_type())),
            ValueType::Entity(name) => self.model.entity(name).map(PathSource::Entity).ok_or_else(
                || HqlError::Resolution(format!("Could not resolve entity [{}]", name)),
            ),
            ValueType::Embeddable(name) => self
                .model
                .embeddable(name)
                .map(PathSource::Embeddable)
                .ok_or_else(|| {
                    HqlError::Resolution(format!("Could not resolve embeddable [{}]", name))
                }),
        }
    }

    pub(super) fn attribute_source(&self, attribute: &Attribute) -> HqlResult<PathSource> {
        match &attribute.kind {
            AttributeKind::Singular(value) => self.value_source(value),
            AttributeKind::Plural(plural) => Ok(PathSource::Plural(plural.clone())),
        }
    }

    /// The plural attribute behind a path: either a plural attribute path or
    /// a join over one.
    pub(super) fn plural_of(&self, path: &Path) -> Option<PluralAttribute> {
        if let Some(plural) = path.source.plural() {
            return Some(plural.clone());
        }
        match &path.kind {
            crate::sqm::PathKind::From(id) => self
                .froms
                .get(*id)
                .attribute()
                .and_then(Attribute::plural)
                .cloned(),
            _ => None,
        }
    }
}
