//! A model handle bundled with the preprocessing tables it was trained with.

use std::sync::Arc;

use textclf_core::{Classification, ClassifyError, FeatureVector, Preprocessing};
use tracing::info;

use crate::features::extract;
use crate::scorer::{Scorer, invoke};

/// Everything needed to classify text with one model.
///
/// Immutable once built; shared across concurrent requests behind an `Arc`.
pub struct LoadedModel {
    name: String,
    scorer: Arc<dyn Scorer>,
    tables: Arc<Preprocessing>,
    threshold: f32,
}

impl LoadedModel {
    /// Pair a scorer with its tables.
    ///
    /// Fails if the tables carry no scaler, or if the model declares an input
    /// width different from the tables' feature dimension.
    pub fn new(
        name: impl Into<String>,
        scorer: Arc<dyn Scorer>,
        tables: Arc<Preprocessing>,
        threshold: f32,
    ) -> Result<Self, ClassifyError> {
        let name = name.into();

        if tables.scaler().is_none() {
            return Err(ClassifyError::MissingResource(format!(
                "model {name:?}: scaler parameters not loaded"
            )));
        }

        if let Some(dim) = scorer.input_dim()
            && dim != tables.dim()
        {
            return Err(ClassifyError::ModelLoad(format!(
                "model {name:?} expects {dim} features but its tables have {}",
                tables.dim()
            )));
        }

        info!(model = %name, dim = tables.dim(), threshold, "model ready");
        Ok(Self {
            name,
            scorer,
            tables,
            threshold,
        })
    }

    /// Text → features → probability → label.
    pub fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        let features = self.features(text)?;
        invoke(self.scorer.as_ref(), &features, self.threshold)
    }

    pub fn features(&self, text: &str) -> Result<FeatureVector, ClassifyError> {
        extract(text, &self.tables)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tables(&self) -> &Arc<Preprocessing> {
        &self.tables
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn dim(&self) -> usize {
        self.tables.dim()
    }
}
