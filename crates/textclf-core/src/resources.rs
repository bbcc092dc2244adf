//! Pre-built preprocessing tables: vocabulary, IDF weights, and scaler parameters.
//!
//! Tables are produced offline alongside the model and are immutable once
//! loaded. Two on-disk layouts are accepted:
//!
//! - a vocabulary file `{ "vocab": {token: index}, "idf": [..] | null }` plus a
//!   scaler file `{ "mean": [..], "scale": [..] }`;
//! - a single bundle carrying `vocabulary`, `idf`, `mean`, `scale` and
//!   `max_features` together.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ClassifyError;

/// Token → feature index mapping.
///
/// Lookups use lowercased tokens, so every key must already be lowercase;
/// [`Vocabulary::validate`] rejects any that are not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vocabulary {
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new(index: HashMap<String, usize>) -> Self {
        Self { index }
    }

    pub fn get(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All `(token, index)` pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.index.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Largest index in the table, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.index.values().copied().max()
    }

    /// Check that every key is lowercase and every index is unique and lies
    /// in `[0, dim)`.
    pub fn validate(&self, dim: usize) -> Result<(), ClassifyError> {
        let mut seen = HashSet::with_capacity(self.index.len());
        for (token, &idx) in &self.index {
            if token.to_lowercase() != *token {
                return Err(ClassifyError::MissingResource(format!(
                    "vocabulary token {token:?} is not lowercase and can never match"
                )));
            }
            if idx >= dim {
                return Err(ClassifyError::MissingResource(format!(
                    "vocabulary index {idx} for token {token:?} is outside [0, {dim})"
                )));
            }
            if !seen.insert(idx) {
                return Err(ClassifyError::MissingResource(format!(
                    "vocabulary index {idx} is assigned to more than one token"
                )));
            }
        }
        Ok(())
    }
}

impl<K: Into<String>> FromIterator<(K, usize)> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = (K, usize)>>(iter: I) -> Self {
        Self {
            index: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Inverse-document-frequency weights, index-aligned with the vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct IdfVector(Vec<f32>);

impl IdfVector {
    pub fn new(weights: Vec<f32>) -> Self {
        Self(weights)
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
}

/// Per-feature standardization parameters.
///
/// A `scale` entry that is zero or non-finite is replaced by `1.0` on
/// construction, so [`ScalerParams::standardize`] never divides by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerParams {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl ScalerParams {
    pub fn new(mean: Vec<f32>, mut scale: Vec<f32>) -> Result<Self, ClassifyError> {
        if mean.len() != scale.len() {
            return Err(ClassifyError::MissingResource(format!(
                "scaler mean has {} entries but scale has {}",
                mean.len(),
                scale.len()
            )));
        }

        let mut patched = 0usize;
        for s in &mut scale {
            if *s == 0.0 || !s.is_finite() {
                *s = 1.0;
                patched += 1;
            }
        }
        if patched > 0 {
            warn!(patched, "scaler has zero or non-finite scale entries; using 1.0");
        }

        Ok(Self { mean, scale })
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn scale(&self) -> &[f32] {
        &self.scale
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// `values[i] = (values[i] - mean[i]) / scale[i]` for every slot.
    pub fn standardize(&self, values: &mut [f32]) {
        for ((v, m), s) in values.iter_mut().zip(&self.mean).zip(&self.scale) {
            *v = (*v - m) / s;
        }
    }
}

/// The full set of tables one model needs for feature extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessing {
    vocab: Vocabulary,
    idf: Option<IdfVector>,
    scaler: Option<ScalerParams>,
    dim: usize,
}

#[derive(Deserialize)]
struct VocabularyFile {
    #[serde(alias = "vocabulary")]
    vocab: HashMap<String, usize>,
    idf: Option<Vec<f32>>,
    max_features: Option<usize>,
    // Present only in the single-file bundle layout.
    mean: Option<Vec<f32>>,
    scale: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct ScalerFile {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl Preprocessing {
    /// Assemble and validate tables.
    ///
    /// The feature dimension is taken from `max_features` when given, else
    /// from the scaler, the IDF vector, or the vocabulary's largest index, in
    /// that order. Every present table must agree with it.
    pub fn new(
        vocab: Vocabulary,
        idf: Option<IdfVector>,
        scaler: Option<ScalerParams>,
        max_features: Option<usize>,
    ) -> Result<Self, ClassifyError> {
        let dim = max_features
            .or_else(|| scaler.as_ref().map(ScalerParams::len))
            .or_else(|| idf.as_ref().map(IdfVector::len))
            .or_else(|| vocab.max_index().map(|i| i + 1))
            .unwrap_or(0);

        if dim == 0 {
            return Err(ClassifyError::MissingResource(
                "cannot determine feature dimension: tables are empty".into(),
            ));
        }

        if let Some(idf) = &idf
            && idf.len() != dim
        {
            return Err(ClassifyError::MissingResource(format!(
                "idf has {} entries, expected {dim}",
                idf.len()
            )));
        }

        if let Some(scaler) = &scaler
            && scaler.len() != dim
        {
            return Err(ClassifyError::MissingResource(format!(
                "scaler has {} entries, expected {dim}",
                scaler.len()
            )));
        }

        vocab.validate(dim)?;

        debug!(
            dim,
            vocab = vocab.len(),
            idf = idf.is_some(),
            scaler = scaler.is_some(),
            "preprocessing tables ready"
        );

        Ok(Self {
            vocab,
            idf,
            scaler,
            dim,
        })
    }

    /// Parse a vocabulary (or bundle) file and an optional separate scaler file.
    ///
    /// When `scaler_json` is `None`, scaler parameters are read from the
    /// vocabulary file itself if it carries both `mean` and `scale`.
    pub fn from_json(
        vocab_json: &[u8],
        scaler_json: Option<&[u8]>,
    ) -> Result<Self, ClassifyError> {
        let file: VocabularyFile = serde_json::from_slice(vocab_json).map_err(|e| {
            ClassifyError::MissingResource(format!("unparseable vocabulary file: {e}"))
        })?;

        let scaler = match scaler_json {
            Some(bytes) => {
                let sf: ScalerFile = serde_json::from_slice(bytes).map_err(|e| {
                    ClassifyError::MissingResource(format!("unparseable scaler file: {e}"))
                })?;
                Some(ScalerParams::new(sf.mean, sf.scale)?)
            }
            None => match (file.mean, file.scale) {
                (Some(mean), Some(scale)) => Some(ScalerParams::new(mean, scale)?),
                _ => None,
            },
        };

        Self::new(
            Vocabulary::new(file.vocab),
            file.idf.map(IdfVector::new),
            scaler,
            file.max_features,
        )
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn idf(&self) -> Option<&IdfVector> {
        self.idf.as_ref()
    }

    pub fn scaler(&self) -> Option<&ScalerParams> {
        self.scaler.as_ref()
    }

    /// Feature dimension N.
    pub fn dim(&self) -> usize {
        self.dim
    }
}
