//! Asset layer: reads preprocessing tables and model artifacts from local
//! paths or HTTP, and turns catalog entries into loaded models.

mod client;
mod loader;

pub use client::{AssetClient, AssetError};
pub use loader::{CatalogLoader, ScorerFactory};

#[cfg(feature = "onnx")]
pub use loader::OnnxFactory;
