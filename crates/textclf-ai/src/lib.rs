//! Inference layer: TF-IDF feature extraction, model scoring, and the
//! per-user classification session.

pub mod features;
pub mod pipeline;
pub mod scorer;
pub mod session;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::OnnxScorer;

pub use features::{extract, extract_with};
pub use pipeline::LoadedModel;
pub use scorer::{FnScorer, Scorer, invoke};
pub use session::{ClassifierSession, ModelLoader, SessionState};
