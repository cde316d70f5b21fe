use crate::templates::{Template, TemplateError, TemplateResult, TemplateStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Templates kept as a JSON array in a single file
#[derive(Debug)]
pub struct FileTemplateStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileTemplateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> TemplateResult<Vec<Template>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            TemplateError::StoreUnavailable(format!("Failed to read {:?}: {}", self.path, e))
        })?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            TemplateError::StoreUnavailable(format!("Failed to parse {:?}: {}", self.path, e))
        })
    }

    async fn write_all(&self, templates: &[Template]) -> TemplateResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TemplateError::StoreUnavailable(format!("Failed to create template directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(templates).map_err(|e| {
            TemplateError::StoreUnavailable(format!("Failed to serialize templates: {}", e))
        })?;

        tokio::fs::write(&self.path, content).await.map_err(|e| {
            TemplateError::StoreUnavailable(format!("Failed to write {:?}: {}", self.path, e))
        })
    }
}

#[async_trait]
impl TemplateStore for FileTemplateStore {
    async fn list(&self) -> TemplateResult<Vec<Template>> {
        let templates = self.read_all().await?;
        Ok(templates
            .into_iter()
            .filter(|t| !t.name.trim().is_empty())
            .collect())
    }

    async fn append(&self, template: Template) -> TemplateResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut templates = self.read_all().await?;
        tracing::info!("Saving template '{}' to {:?}", template.name, self.path);
        templates.push(template);
        self.write_all(&templates).await
    }
}
