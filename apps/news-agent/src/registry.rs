use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// A configured scrape target. Created by an operator in the source registry
/// file; read-only here.
#[derive(Deserialize, Debug, Clone)]
pub struct Source {
    pub name: String,
    pub target_url: String,
    pub base_url: String,
    pub selector: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read source registry at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("source registry at {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let data = std::fs::read(path).map_err(|source| RegistryError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let sources = serde_json::from_slice(&data).map_err(|source| RegistryError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { sources })
    }

    /// All active sources, in registry order.
    pub fn active(&self) -> Vec<Source> {
        self.sources.iter().filter(|s| s.active).cloned().collect()
    }

    /// Single active source matched case-insensitively by name.
    pub fn active_named(&self, name: &str) -> Option<Source> {
        self.sources
            .iter()
            .find(|s| s.active && s.name.eq_ignore_ascii_case(name))
            .cloned()
    }
}
