use serde::Serialize;
use thiserror::Error;

/// Failures surfaced by the extraction and scoring pipeline.
///
/// Every variant is recoverable at the session boundary: the session records
/// it as an error event and the caller decides whether to re-trigger.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassifyError {
    #[error("missing resource: {0}")]
    MissingResource(String),

    #[error("no model loaded; select a model first")]
    ModelNotReady,

    #[error("model failed to load: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    /// The model selection changed while this operation was in flight.
    #[error("result discarded: model selection changed while the request was in flight")]
    Superseded,
}

/// Stable, machine-readable name for each error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingResource,
    ModelNotReady,
    ModelLoad,
    Inference,
    Superseded,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingResource => "missing_resource",
            Self::ModelNotReady => "model_not_ready",
            Self::ModelLoad => "model_load",
            Self::Inference => "inference",
            Self::Superseded => "superseded",
        }
    }
}

impl ClassifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingResource(_) => ErrorKind::MissingResource,
            Self::ModelNotReady => ErrorKind::ModelNotReady,
            Self::ModelLoad(_) => ErrorKind::ModelLoad,
            Self::Inference(_) => ErrorKind::Inference,
            Self::Superseded => ErrorKind::Superseded,
        }
    }
}
