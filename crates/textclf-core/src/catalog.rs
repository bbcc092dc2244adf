//! Model catalog: the set of selectable models and where their artifacts live.
//!
//! ```json
//! {
//!   "models": [
//!     {
//!       "name": "spam",
//!       "model": "assets/spam_classifier_model.onnx",
//!       "preprocessing": "assets/spam_classifier_preprocessing_data.json"
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::classification::DEFAULT_THRESHOLD;

pub const DEFAULT_INPUT_NAME: &str = "float_input";
pub const DEFAULT_OUTPUT_NAME: &str = "output";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("catalog JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

/// Where a resource lives: a local path or an `http(s)://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Location {
    Path(PathBuf),
    Url(String),
}

impl Location {
    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// Join a relative path onto `base`. URLs and absolute paths are unchanged.
    pub fn resolve_against(self, base: &Path) -> Self {
        match self {
            Self::Path(p) if p.is_relative() => Self::Path(base.join(p)),
            other => other,
        }
    }
}

impl From<String> for Location {
    fn from(s: String) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Self::Url(s)
        } else {
            Self::Path(PathBuf::from(s))
        }
    }
}

impl From<&str> for Location {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Location> for String {
    fn from(loc: Location) -> Self {
        match loc {
            Location::Path(p) => p.to_string_lossy().into_owned(),
            Location::Url(u) => u,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Url(u) => f.write_str(u),
        }
    }
}

/// One selectable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    /// ONNX artifact.
    pub model: Location,
    /// Vocabulary/IDF file, or a bundle that also carries the scaler.
    pub preprocessing: Location,
    /// Separate scaler file, when not bundled.
    #[serde(default)]
    pub scaler: Option<Location>,
    #[serde(default = "default_input")]
    pub input: String,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_input() -> String {
    DEFAULT_INPUT_NAME.to_string()
}

fn default_output() -> String {
    DEFAULT_OUTPUT_NAME.to_string()
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

/// Identifies a set of preprocessing tables; two entries with equal keys share tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TablesKey {
    pub preprocessing: Location,
    pub scaler: Option<Location>,
}

impl ModelEntry {
    pub fn tables_key(&self) -> TablesKey {
        TablesKey {
            preprocessing: self.preprocessing.clone(),
            scaler: self.scaler.clone(),
        }
    }

    fn resolve_against(self, base: &Path) -> Self {
        Self {
            model: self.model.resolve_against(base),
            preprocessing: self.preprocessing.resolve_against(base),
            scaler: self.scaler.map(|s| s.resolve_against(base)),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub models: Vec<ModelEntry>,
}

impl Catalog {
    /// Parse a catalog. Relative paths are resolved against `base_dir` when given.
    pub fn from_json(bytes: &[u8], base_dir: Option<&Path>) -> Result<Self, CatalogError> {
        let mut catalog: Catalog = serde_json::from_slice(bytes)?;
        if let Some(base) = base_dir {
            catalog.models = catalog
                .models
                .into_iter()
                .map(|m| m.resolve_against(base))
                .collect();
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read a catalog file; relative paths inside it are relative to the file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let bytes = std::fs::read(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let catalog = Self::from_json(&bytes, Some(base))?;
        debug!(path = %path.display(), models = catalog.models.len(), "loaded model catalog");
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for m in &self.models {
            if m.name.is_empty() {
                return Err(CatalogError::Invalid("model with empty name".into()));
            }
            if !seen.insert(m.name.as_str()) {
                return Err(CatalogError::Invalid(format!("duplicate model name {:?}", m.name)));
            }
            if !(0.0..=1.0).contains(&m.threshold) {
                return Err(CatalogError::Invalid(format!(
                    "model {:?}: threshold {} is outside [0, 1]",
                    m.name, m.threshold
                )));
            }
        }
        Ok(())
    }
}
