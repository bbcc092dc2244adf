//! Text → standardized TF-IDF feature vector.
//!
//! Term frequency is counted per query and multiplied by the global IDF
//! weight; there is no length or L2 normalization. Every slot is then
//! standardized with the scaler, including slots no token touched.

use std::collections::HashMap;

use textclf_core::{
    ClassifyError, FeatureVector, IdfVector, Preprocessing, ScalerParams, Vocabulary,
};

/// Lowercase and split on runs of whitespace. Empty tokens never appear.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

/// Occurrences of each distinct lowercase token.
pub fn term_counts(text: &str) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

/// Raw TF-IDF weights before standardization.
///
/// Tokens absent from the vocabulary are ignored. Without an IDF vector the
/// weights are plain term counts.
pub fn tfidf_weights(
    text: &str,
    vocab: &Vocabulary,
    idf: Option<&IdfVector>,
    dim: usize,
) -> Result<Vec<f32>, ClassifyError> {
    if let Some(idf) = idf
        && idf.len() != dim
    {
        return Err(ClassifyError::MissingResource(format!(
            "idf has {} entries, expected {dim}",
            idf.len()
        )));
    }

    let mut values = vec![0.0f32; dim];

    // Vocabulary indices are unique, so each slot is written at most once and
    // the result does not depend on map iteration order.
    for (token, count) in term_counts(text) {
        let Some(idx) = vocab.get(&token) else {
            continue;
        };
        let slot = values.get_mut(idx).ok_or_else(|| {
            ClassifyError::MissingResource(format!(
                "vocabulary index {idx} for token {token:?} is outside [0, {dim})"
            ))
        })?;
        let weight = idf.map_or(1.0, |w| w.as_slice()[idx]);
        *slot += count as f32 * weight;
    }

    Ok(values)
}

/// Extract a feature vector from individual tables.
///
/// Fails with [`ClassifyError::MissingResource`] when the scaler is absent or
/// any table disagrees with `dim`.
pub fn extract_with(
    text: &str,
    vocab: &Vocabulary,
    idf: Option<&IdfVector>,
    scaler: Option<&ScalerParams>,
    dim: usize,
) -> Result<FeatureVector, ClassifyError> {
    let scaler = scaler
        .ok_or_else(|| ClassifyError::MissingResource("scaler parameters not loaded".into()))?;
    if scaler.len() != dim {
        return Err(ClassifyError::MissingResource(format!(
            "scaler has {} entries, expected {dim}",
            scaler.len()
        )));
    }

    let mut values = tfidf_weights(text, vocab, idf, dim)?;
    scaler.standardize(&mut values);
    Ok(FeatureVector::new(values))
}

/// Extract a feature vector using a model's preprocessing tables.
pub fn extract(text: &str, tables: &Preprocessing) -> Result<FeatureVector, ClassifyError> {
    extract_with(text, tables.vocab(), tables.idf(), tables.scaler(), tables.dim())
}
