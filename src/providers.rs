//! Provider Contracts
//!
//! Read-only data sources consumed by the protocol engine: the parameter
//! catalog, the reference template corpus, and the footer fragment. Each is
//! an async trait so many concurrent sessions can query them independently;
//! the engine snapshots whatever they return at session open.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::ProviderError;
use crate::model::{FooterFragment, ParameterDescriptor, TemplateDescriptor};

/// Supplies the current whitelist of named placeholders.
#[async_trait]
pub trait ParameterCatalogProvider: Send + Sync {
    async fn list(&self) -> Result<Vec<ParameterDescriptor>, ProviderError>;
}

/// Supplies the existing reference templates (name, description, body).
#[async_trait]
pub trait TemplateCorpusProvider: Send + Sync {
    async fn list_all(&self) -> Result<Vec<TemplateDescriptor>, ProviderError>;
}

/// Supplies the single immutable closing fragment.
#[async_trait]
pub trait FooterProvider: Send + Sync {
    async fn get(&self) -> Result<FooterFragment, ProviderError>;
}

/// In-memory parameter catalog, seeded once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticParameterCatalog {
    parameters: Vec<ParameterDescriptor>,
}

impl StaticParameterCatalog {
    pub fn new(parameters: Vec<ParameterDescriptor>) -> Self {
        Self { parameters }
    }

    /// Build from `(name, description)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            parameters: pairs
                .into_iter()
                .map(|(name, description)| ParameterDescriptor::new(name, description))
                .collect(),
        }
    }
}

#[async_trait]
impl ParameterCatalogProvider for StaticParameterCatalog {
    async fn list(&self) -> Result<Vec<ParameterDescriptor>, ProviderError> {
        debug!(count = self.parameters.len(), "listing template parameters");
        Ok(self.parameters.clone())
    }
}

/// Template corpus backed by a folder of template files. The file stem is the
/// template name; the body is the file content.
#[derive(Debug, Clone)]
pub struct FileTemplateCorpus {
    folder: PathBuf,
}

impl FileTemplateCorpus {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// Read the folder location from `TEMPLATES_LOCATION`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let folder = std::env::var("TEMPLATES_LOCATION")
            .map_err(|_| ProviderError::new("TEMPLATES_LOCATION environment variable not set"))?;
        Ok(Self::new(folder))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

#[async_trait]
impl TemplateCorpusProvider for FileTemplateCorpus {
    async fn list_all(&self) -> Result<Vec<TemplateDescriptor>, ProviderError> {
        let mut entries = tokio::fs::read_dir(&self.folder).await.map_err(|e| {
            ProviderError::with_source(
                format!("cannot read templates folder {}", self.folder.display()),
                e,
            )
        })?;

        let mut templates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let body = tokio::fs::read_to_string(&path).await.map_err(|e| {
                ProviderError::with_source(
                    format!("error reading template file {}", path.display()),
                    e,
                )
            })?;
            debug!(template = %name, "loaded reference template");
            templates.push(TemplateDescriptor {
                description: name.replace('_', " "),
                name,
                body,
            });
        }
        // Directory iteration order is platform-dependent.
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }
}

/// Footer provider backed by a single fragment file.
#[derive(Debug, Clone)]
pub struct FileFooterProvider {
    path: PathBuf,
}

impl FileFooterProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the fragment location from `TEMPLATE_FOOTER_LOCATION`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let path = std::env::var("TEMPLATE_FOOTER_LOCATION").map_err(|_| {
            ProviderError::new("TEMPLATE_FOOTER_LOCATION environment variable not set")
        })?;
        Ok(Self::new(path))
    }
}

#[async_trait]
impl FooterProvider for FileFooterProvider {
    async fn get(&self) -> Result<FooterFragment, ProviderError> {
        let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ProviderError::with_source(
                format!("error reading footer file {}", self.path.display()),
                e,
            )
        })?;
        Ok(FooterFragment::new(body))
    }
}
