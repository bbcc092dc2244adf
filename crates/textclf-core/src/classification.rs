//! Classification results, feature vectors, and session history events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClassifyError, ErrorKind};

/// Decision threshold applied to the model's probability by default.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Binary decision derived from a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    /// Strict comparison: a probability equal to the threshold is negative.
    pub fn from_probability(probability: f32, threshold: f32) -> Self {
        if probability > threshold {
            Self::Positive
        } else {
            Self::Negative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of scoring a single text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub probability: f32,
    pub label: Label,
}

impl Classification {
    pub fn from_probability(probability: f32, threshold: f32) -> Self {
        Self {
            probability,
            label: Label::from_probability(probability, threshold),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (score {:.2})", self.label, self.probability)
    }
}

/// Dense, standardized feature vector of exactly N slots.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

/// One entry in a session's result stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEvent {
    pub at: DateTime<Utc>,
    /// Model selected when the event was recorded.
    pub model: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Input { text: String },
    Result { classification: Classification },
    Error { kind: ErrorKind, message: String },
}

impl SessionEvent {
    pub fn input(model: Option<String>, text: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            model,
            kind: EventKind::Input { text: text.into() },
        }
    }

    pub fn result(model: Option<String>, classification: Classification) -> Self {
        Self {
            at: Utc::now(),
            model,
            kind: EventKind::Result { classification },
        }
    }

    pub fn error(model: Option<String>, err: &ClassifyError) -> Self {
        Self {
            at: Utc::now(),
            model,
            kind: EventKind::Error {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }

    /// Short kind tag: `input`, `result`, or `error`.
    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            EventKind::Input { .. } => "input",
            EventKind::Result { .. } => "result",
            EventKind::Error { .. } => "error",
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Input { text } => write!(f, "> {text}"),
            EventKind::Result { classification } => write!(f, "Classification: {classification}"),
            EventKind::Error { message, .. } => write!(f, "Error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict() {
        assert_eq!(Label::from_probability(0.5, DEFAULT_THRESHOLD), Label::Negative);
        assert_eq!(Label::from_probability(0.500_000_1, DEFAULT_THRESHOLD), Label::Positive);
        assert_eq!(Label::from_probability(0.0, DEFAULT_THRESHOLD), Label::Negative);
        assert_eq!(Label::from_probability(1.0, DEFAULT_THRESHOLD), Label::Positive);
    }

    #[test]
    fn custom_threshold() {
        assert_eq!(Label::from_probability(0.3, 0.2), Label::Positive);
        assert_eq!(Label::from_probability(0.7, 0.9), Label::Negative);
    }

    #[test]
    fn classification_json_shape() {
        let c = Classification::from_probability(0.75, DEFAULT_THRESHOLD);
        let json = serde_json::to_value(c).unwrap();
        assert_eq!(json["label"], "positive");
        assert_eq!(json["probability"], 0.75);
    }

    #[test]
    fn error_event_serializes_kind_name() {
        let ev = SessionEvent::error(None, &ClassifyError::ModelNotReady);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "model_not_ready");
        assert!(json["model"].is_null());
    }

    #[test]
    fn event_display_is_user_facing() {
        let ev = SessionEvent::result(
            Some("spam".into()),
            Classification::from_probability(0.25, DEFAULT_THRESHOLD),
        );
        assert_eq!(ev.to_string(), "Classification: negative (score 0.25)");
        assert_eq!(ev.kind_str(), "result");
    }
}
