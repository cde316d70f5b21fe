//! Saved message templates.
//!
//! A template is a named subject/body pair. Two backends implement
//! [`TemplateStore`]: a Google Sheets range (one template per row, columns
//! `A:C`) and a JSON file on disk. Neither offers transactional guarantees and
//! duplicate names are kept as separate entries.

pub mod file;
pub mod sheets;

pub use file::FileTemplateStore;
pub use sheets::SheetsTemplateStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
}

pub type TemplateResult<T> = Result<T, TemplateError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> TemplateResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TemplateError::InvalidTemplate(
                "template name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            name,
            subject: subject.into(),
            body: body.into(),
        })
    }
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// All stored templates, in storage order
    async fn list(&self) -> TemplateResult<Vec<Template>>;

    /// Add a template at the end of the store
    async fn append(&self, template: Template) -> TemplateResult<()>;

    /// First template with the given name
    async fn find(&self, name: &str) -> TemplateResult<Option<Template>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|template| template.name == name))
    }
}
