//! ONNX Runtime scorer for exported binary classifiers.
//!
//! The model takes one `[1, N]` float32 tensor and produces an output whose
//! first element is the positive-class probability. Slot names default to
//! `float_input` / `output`.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use textclf_core::{ClassifyError, FeatureVector};
use tracing::{info, warn};

use crate::scorer::Scorer;

pub struct OnnxScorer {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    dim: Option<usize>,
}

impl OnnxScorer {
    /// Load a model file.
    pub fn load(path: &Path, input: &str, output: &str) -> Result<Self, ClassifyError> {
        let session = open_file(path)
            .map_err(|e| ClassifyError::ModelLoad(format!("{}: {e:#}", path.display())))?;
        Self::from_session(session, input, output)
    }

    /// Load a model from an in-memory artifact (e.g. fetched over HTTP).
    pub fn from_memory(bytes: &[u8], input: &str, output: &str) -> Result<Self, ClassifyError> {
        let session = open_memory(bytes).map_err(|e| ClassifyError::ModelLoad(format!("{e:#}")))?;
        Self::from_session(session, input, output)
    }

    fn from_session(session: Session, input: &str, output: &str) -> Result<Self, ClassifyError> {
        let inputs: Vec<String> = session.inputs().iter().map(|i| i.name().to_string()).collect();
        let outputs: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        let input_name = resolve_slot("input", input, &inputs)?;
        let output_name = resolve_slot("output", output, &outputs)?;

        let dim = session
            .inputs()
            .iter()
            .find(|i| i.name() == input_name)
            .and_then(|i| infer_dim(i.dtype()));

        info!(input = %input_name, output = %output_name, ?dim, "loaded ONNX model");
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            dim,
        })
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

impl Scorer for OnnxScorer {
    fn input_dim(&self) -> Option<usize> {
        self.dim
    }

    fn score(&self, features: &FeatureVector) -> Result<f32, ClassifyError> {
        let shape = [1i64, features.len() as i64];
        let data = features.as_slice().to_vec().into_boxed_slice();
        let tensor = Tensor::from_array((shape, data)).map_err(inference)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ClassifyError::Inference(format!("session lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(inference)?;

        let (_, values) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(inference)?;
        values
            .first()
            .copied()
            .ok_or_else(|| ClassifyError::Inference("model output is empty".into()))
    }
}

fn open_file(path: &Path) -> anyhow::Result<Session> {
    anyhow::ensure!(path.exists(), "model file not found");
    Ok(Session::builder()?.commit_from_file(path)?)
}

fn open_memory(bytes: &[u8]) -> anyhow::Result<Session> {
    Ok(Session::builder()?.commit_from_memory(bytes)?)
}

fn inference(e: impl std::fmt::Display) -> ClassifyError {
    ClassifyError::Inference(e.to_string())
}

/// Pick the slot called `wanted`, or the only slot if the model has exactly one.
fn resolve_slot(kind: &str, wanted: &str, available: &[String]) -> Result<String, ClassifyError> {
    if available.iter().any(|n| n == wanted) {
        return Ok(wanted.to_string());
    }
    match available {
        [only] => {
            warn!(
                kind,
                wanted,
                using = %only,
                "configured slot not found; using the model's only {kind}"
            );
            Ok(only.clone())
        }
        _ => Err(ClassifyError::ModelLoad(format!(
            "model has no {kind} named {wanted:?} (available: {available:?})"
        ))),
    }
}

/// Last dimension of the input tensor, when it is fixed.
fn infer_dim(input_type: &ort::value::ValueType) -> Option<usize> {
    match input_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolve_exact_name() {
        let slots = names(&["float_input", "mask"]);
        assert_eq!(resolve_slot("input", "float_input", &slots).unwrap(), "float_input");
    }

    #[test]
    fn resolve_falls_back_to_sole_slot() {
        let slots = names(&["probabilities"]);
        assert_eq!(resolve_slot("output", "output", &slots).unwrap(), "probabilities");
    }

    #[test]
    fn resolve_ambiguous_fails() {
        let slots = names(&["label", "probabilities"]);
        let err = resolve_slot("output", "output", &slots).unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad(_)));
    }

    #[test]
    fn missing_file_is_model_load_error() {
        let err = OnnxScorer::load(Path::new("/nonexistent/model.onnx"), "float_input", "output")
            .err()
            .unwrap();
        assert!(matches!(err, ClassifyError::ModelLoad(_)));
    }

    #[test]
    fn garbage_bytes_fail_to_load() {
        let err = OnnxScorer::from_memory(b"not an onnx model", "float_input", "output")
            .err()
            .unwrap();
        assert!(matches!(err, ClassifyError::ModelLoad(_)));
    }

    fn model_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("spam_classifier_model.onnx")
    }

    fn require_model() -> PathBuf {
        let path = model_path();
        if !path.exists() {
            panic!(
                "Model not found. Export the spam classifier to ONNX and place it at:\n  {}",
                path.display()
            );
        }
        path
    }

    #[test]
    #[ignore = "requires models/spam_classifier_model.onnx"]
    fn score_is_probability() {
        let scorer = OnnxScorer::load(&require_model(), "float_input", "output").unwrap();
        let dim = scorer.input_dim().unwrap_or(5000);
        let p = scorer.score(&FeatureVector::new(vec![0.0; dim])).unwrap();
        assert!((0.0..=1.0).contains(&p), "score {p} outside [0, 1]");
    }
}
