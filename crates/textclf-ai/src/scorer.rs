//! The opaque model handle and the scoring invoker.

use textclf_core::{Classification, ClassifyError, FeatureVector};
use tracing::debug;

/// A loaded model that maps a feature vector to a probability.
///
/// Implementations must be deterministic for identical input and safe to call
/// from several threads at once.
pub trait Scorer: Send + Sync {
    /// Expected feature width, when the model declares one.
    fn input_dim(&self) -> Option<usize>;

    /// Probability that the input belongs to the positive class.
    fn score(&self, features: &FeatureVector) -> Result<f32, ClassifyError>;
}

/// Score `features` and threshold the probability into a label.
///
/// No retries: a failing model fails the same way on the same input.
pub fn invoke(
    scorer: &dyn Scorer,
    features: &FeatureVector,
    threshold: f32,
) -> Result<Classification, ClassifyError> {
    if let Some(dim) = scorer.input_dim()
        && dim != features.len()
    {
        return Err(ClassifyError::Inference(format!(
            "model expects {dim} features, got {}",
            features.len()
        )));
    }

    let probability = scorer.score(features)?;
    if !probability.is_finite() {
        return Err(ClassifyError::Inference(format!(
            "model returned non-finite score {probability}"
        )));
    }

    let classification = Classification::from_probability(probability, threshold);
    debug!(probability, label = %classification.label, "scored");
    Ok(classification)
}

/// Closure-backed [`Scorer`], for rule-based models and tests.
pub struct FnScorer<F> {
    dim: Option<usize>,
    f: F,
}

impl<F> FnScorer<F>
where
    F: Fn(&FeatureVector) -> Result<f32, ClassifyError> + Send + Sync,
{
    pub fn new(dim: Option<usize>, f: F) -> Self {
        Self { dim, f }
    }
}

impl<F> Scorer for FnScorer<F>
where
    F: Fn(&FeatureVector) -> Result<f32, ClassifyError> + Send + Sync,
{
    fn input_dim(&self) -> Option<usize> {
        self.dim
    }

    fn score(&self, features: &FeatureVector) -> Result<f32, ClassifyError> {
        (self.f)(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textclf_core::{DEFAULT_THRESHOLD, Label};

    fn constant(p: f32) -> FnScorer<impl Fn(&FeatureVector) -> Result<f32, ClassifyError>> {
        FnScorer::new(Some(2), move |_: &FeatureVector| Ok(p))
    }

    #[test]
    fn threshold_boundary() {
        let v = FeatureVector::new(vec![0.0, 0.0]);
        let at = invoke(&constant(0.5), &v, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(at.label, Label::Negative);
        assert_eq!(at.probability, 0.5);

        let above = invoke(&constant(0.500_000_1), &v, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(above.label, Label::Positive);
    }

    #[test]
    fn reads_features() {
        let scorer = FnScorer::new(None, |f: &FeatureVector| Ok(f.as_slice()[0]));
        let c = invoke(&scorer, &FeatureVector::new(vec![0.9]), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(c.label, Label::Positive);
    }

    #[test]
    fn width_mismatch_is_inference_error() {
        let err = invoke(&constant(0.9), &FeatureVector::new(vec![0.0; 3]), 0.5).unwrap_err();
        assert!(matches!(err, ClassifyError::Inference(_)));
    }

    #[test]
    fn model_error_carries_message() {
        let scorer = FnScorer::new(None, |_: &FeatureVector| {
            Err(ClassifyError::Inference("node Gemm failed".into()))
        });
        let err = invoke(&scorer, &FeatureVector::new(vec![1.0]), 0.5).unwrap_err();
        assert_eq!(err, ClassifyError::Inference("node Gemm failed".into()));
    }

    #[test]
    fn nan_score_rejected() {
        let err =
            invoke(&constant(f32::NAN), &FeatureVector::new(vec![0.0, 0.0]), 0.5).unwrap_err();
        assert!(matches!(err, ClassifyError::Inference(_)));
    }

    #[test]
    fn same_input_same_label() {
        let scorer = FnScorer::new(None, |f: &FeatureVector| {
            Ok(1.0 / (1.0 + (-f.as_slice().iter().sum::<f32>()).exp()))
        });
        let v = FeatureVector::new(vec![0.3, -0.1, 0.7]);
        let a = invoke(&scorer, &v, 0.5).unwrap();
        let b = invoke(&scorer, &v, 0.5).unwrap();
        assert_eq!(a, b);
    }
}
