//! Per-user classification session.
//!
//! A session owns at most one loaded model and a result history. Its state
//! is derived from what it holds:
//!
//! ```text
//! Idle --select--> Loading --ok--> Ready --classify--> Scoring --done--> Ready
//!                     |                                   |
//!                     +--err--> Idle          Ready <--err+
//! ```
//!
//! Selecting a model discards the current handle and its tables before the
//! new load starts and bumps a generation counter. A load or scoring result
//! that arrives for an older generation is dropped and reported to its caller
//! as [`ClassifyError::Superseded`]; it never touches session state. Futures
//! dropped mid-flight (timeouts, `select!`) undo their bookkeeping, so the
//! session always settles back into `Idle` or `Ready`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::join_all;
use textclf_core::{Classification, ClassifyError, SessionEvent};
use tracing::{debug, info, warn};

use crate::pipeline::LoadedModel;

/// Resolves a model name to a ready-to-score model and its tables.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, name: &str) -> Result<LoadedModel, ClassifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No model handle.
    Idle,
    Loading,
    Ready,
    /// At least one classification is in flight.
    Scoring,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Scoring => "scoring",
        }
    }
}

#[derive(Default)]
struct Inner {
    generation: u64,
    selected: Option<String>,
    loading: bool,
    model: Option<Arc<LoadedModel>>,
    scoring: usize,
    history: Vec<SessionEvent>,
}

pub struct ClassifierSession {
    loader: Arc<dyn ModelLoader>,
    inner: Mutex<Inner>,
}

impl ClassifierSession {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    pub fn state(&self) -> SessionState {
        let inner = self.lock();
        if inner.loading {
            SessionState::Loading
        } else if inner.model.is_none() {
            SessionState::Idle
        } else if inner.scoring > 0 {
            SessionState::Scoring
        } else {
            SessionState::Ready
        }
    }

    /// Most recently selected model name, loaded or not.
    pub fn selected(&self) -> Option<String> {
        self.lock().selected.clone()
    }

    /// Name of the model currently ready to score.
    pub fn current_model(&self) -> Option<String> {
        self.lock().model.as_ref().map(|m| m.name().to_string())
    }

    pub fn history(&self) -> Vec<SessionEvent> {
        self.lock().history.clone()
    }

    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    /// Switch to `name` and load it.
    ///
    /// The previous handle is discarded immediately, so requests issued
    /// while the load is running fail with [`ClassifyError::ModelNotReady`].
    /// A failed or abandoned load leaves the session idle; a failure is also
    /// recorded in the history.
    pub async fn select_model(&self, name: &str) -> Result<(), ClassifyError> {
        let generation = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.selected = Some(name.to_string());
            inner.loading = true;
            inner.scoring = 0;
            if let Some(prev) = inner.model.take() {
                debug!(model = prev.name(), "discarding previous model handle");
            }
            inner.generation
        };
        let mut pending = PendingLoad {
            inner: &self.inner,
            generation,
            settled: false,
        };

        info!(model = name, generation, "loading model");
        let result = self.loader.load(name).await;

        pending.settled = true;
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(model = name, generation, "load superseded; discarding");
            return Err(ClassifyError::Superseded);
        }
        inner.loading = false;

        match result {
            Ok(model) => {
                inner.model = Some(Arc::new(model));
                Ok(())
            }
            Err(err) => {
                warn!(model = name, error = %err, "model load failed");
                inner.history.push(SessionEvent::error(Some(name.to_string()), &err));
                Err(err)
            }
        }
    }

    /// Classify one text against the loaded model.
    ///
    /// The input, then exactly one outcome event, are appended to the
    /// history. A request overtaken by a model switch, or dropped by its
    /// caller before it finished, is recorded as [`ClassifyError::Superseded`].
    /// Each call extracts into its own feature vector, so concurrent calls
    /// never share scratch state.
    pub async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        let (model, slot) = {
            let mut inner = self.lock();
            let selected = inner.selected.clone();
            inner.history.push(SessionEvent::input(selected.clone(), text));

            let Some(model) = inner.model.clone() else {
                let err = ClassifyError::ModelNotReady;
                inner.history.push(SessionEvent::error(selected, &err));
                return Err(err);
            };
            inner.scoring += 1;
            let slot = ScoringSlot {
                inner: &self.inner,
                generation: inner.generation,
                model: model.name().to_string(),
                settled: false,
            };
            (model, slot)
        };

        let owned = text.to_string();
        let outcome = tokio::task::spawn_blocking(move || model.classify(&owned))
            .await
            .unwrap_or_else(|e| {
                Err(ClassifyError::Inference(format!("scoring task failed: {e}")))
            });

        slot.finish(outcome)
    }

    /// Classify several texts concurrently; results are in input order.
    pub async fn classify_many(
        &self,
        texts: &[&str],
    ) -> Vec<Result<Classification, ClassifyError>> {
        join_all(texts.iter().map(|t| self.classify(t))).await
    }
}

// The lock is only held for short, non-panicking updates, so a poisoned
// mutex still guards consistent data.
fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the loading flag if the `select_model` future is dropped
/// mid-load and no newer selection has taken over.
struct PendingLoad<'a> {
    inner: &'a Mutex<Inner>,
    generation: u64,
    settled: bool,
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = lock(self.inner);
        if inner.generation == self.generation && inner.loading {
            debug!(generation = self.generation, "model load abandoned");
            inner.loading = false;
        }
    }
}

/// One in-flight classification counted in `Inner::scoring`.
///
/// [`ScoringSlot::finish`] records the outcome. Dropping an unfinished slot
/// releases the count and records the input as superseded.
struct ScoringSlot<'a> {
    inner: &'a Mutex<Inner>,
    generation: u64,
    model: String,
    settled: bool,
}

impl ScoringSlot<'_> {
    fn finish(
        mut self,
        outcome: Result<Classification, ClassifyError>,
    ) -> Result<Classification, ClassifyError> {
        self.settled = true;
        let model = std::mem::take(&mut self.model);
        let mut inner = lock(self.inner);

        if inner.generation != self.generation {
            debug!(model = %model, "result arrived after model switch; discarding");
            let err = ClassifyError::Superseded;
            inner.history.push(SessionEvent::error(Some(model), &err));
            return Err(err);
        }
        inner.scoring = inner.scoring.saturating_sub(1);

        match &outcome {
            Ok(c) => {
                debug!(
                    model = %model,
                    probability = c.probability,
                    label = %c.label,
                    "classified"
                );
                inner.history.push(SessionEvent::result(Some(model), *c));
            }
            Err(err) => {
                warn!(model = %model, error = %err, "classification failed");
                inner.history.push(SessionEvent::error(Some(model), err));
            }
        }
        outcome
    }
}

impl Drop for ScoringSlot<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = lock(self.inner);
        // A model switch already reset the counter.
        if inner.generation == self.generation {
            inner.scoring = inner.scoring.saturating_sub(1);
        }
        debug!(model = %self.model, "classification abandoned before completion");
        let model = std::mem::take(&mut self.model);
        inner
            .history
            .push(SessionEvent::error(Some(model), &ClassifyError::Superseded));
    }
}
