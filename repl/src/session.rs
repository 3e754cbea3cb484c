use std::path::{Path, PathBuf};

use hql_core::{CompileOptions, HqlResult, Statement, StaticDomainModel};
use tracing::{debug, info};

/// The domain model and options queries are compiled against.
pub struct Session {
    model: StaticDomainModel,
    model_path: Option<PathBuf>,
    options: CompileOptions,
}

impl Session {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            model: StaticDomainModel::default(),
            model_path: None,
            options,
        }
    }

    #[cfg(test)]
    pub fn with_model(model: StaticDomainModel, options: CompileOptions) -> Self {
        Self {
            model,
            model_path: None,
            options,
        }
    }

    /// Replaces the current model. Returns the number of entities loaded.
    pub fn load_model(&mut self, path: &Path) -> HqlResult<usize> {
        let model = StaticDomainModel::from_file(path)?;
        let entities = model.entity_names().len();
        info!(path = %path.display(), entities, "loaded domain model");
        self.model = model;
        self.model_path = Some(path.to_path_buf());
        Ok(entities)
    }

    /// Reloads the model from the file it was last loaded from.
    pub fn reload_model(&mut self) -> Option<HqlResult<usize>> {
        let path = self.model_path.clone()?;
        Some(self.load_model(&path))
    }

    pub fn compile(&self, query: &str) -> HqlResult<Statement> {
        debug!(strict = self.options.jpa_compliance, "compiling query");
        hql_core::compile(query, &self.model, &self.options)
    }

    pub fn is_strict(&self) -> bool {
        self.options.jpa_compliance
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.options.jpa_compliance = strict;
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.model.entity_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"{
        "entities": [
            { "name": "Book", "class": "shop.Book", "id": "id",
              "attributes": [
                { "name": "id", "type": { "basic": "Long" } },
                { "name": "title", "type": { "basic": "String" } }
              ] }
        ]
    }"#;

    fn session() -> Session {
        let model = StaticDomainModel::from_json(MODEL).unwrap();
        Session::with_model(model, CompileOptions::default())
    }

    #[test]
    fn test_compiles_against_model() {
        let session = session();
        assert!(session.compile("select b.title from Book b").is_ok());
        assert!(session.compile("select b.author from Book b").is_err());
    }

    #[test]
    fn test_strict_toggle() {
        let mut session = session();
        assert!(session.compile("from Book b").is_ok());
        session.set_strict(true);
        assert!(session.is_strict());
        assert!(session.compile("from Book b").is_err());
    }

    #[test]
    fn test_empty_session_knows_no_entities() {
        let session = Session::new(CompileOptions::default());
        assert!(session.entity_names().is_empty());
        assert!(session.compile("select b from Book b").is_err());
        assert!(session.model_path().is_none());
    }
}
