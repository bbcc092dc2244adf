//! Catalog-backed [`ModelLoader`].

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use textclf_ai::{LoadedModel, ModelLoader, Scorer};
use textclf_core::{Catalog, ClassifyError, ModelEntry, Preprocessing, TablesKey};
use tracing::{debug, info};

use crate::client::AssetClient;

/// Builds a scorer from a model artifact's bytes.
pub trait ScorerFactory: Send + Sync {
    fn build(
        &self,
        entry: &ModelEntry,
        artifact: Vec<u8>,
    ) -> Result<Arc<dyn Scorer>, ClassifyError>;
}

/// Builds [`textclf_ai::OnnxScorer`]s using the entry's slot names.
#[cfg(feature = "onnx")]
pub struct OnnxFactory;

#[cfg(feature = "onnx")]
impl ScorerFactory for OnnxFactory {
    fn build(
        &self,
        entry: &ModelEntry,
        artifact: Vec<u8>,
    ) -> Result<Arc<dyn Scorer>, ClassifyError> {
        let scorer = textclf_ai::OnnxScorer::from_memory(&artifact, &entry.input, &entry.output)?;
        Ok(Arc::new(scorer))
    }
}

/// Loads catalog models, keeping the most recently used tables in memory.
///
/// Selecting another model that shares the same table locations reuses the
/// cached tables; a model with different tables replaces the cache entry.
pub struct CatalogLoader {
    catalog: Catalog,
    client: AssetClient,
    factory: Arc<dyn ScorerFactory>,
    tables: Mutex<Option<(TablesKey, Arc<Preprocessing>)>>,
}

impl CatalogLoader {
    pub fn new(catalog: Catalog, client: AssetClient, factory: Arc<dyn ScorerFactory>) -> Self {
        Self {
            catalog,
            client,
            factory,
            tables: Mutex::new(None),
        }
    }

    /// Loader that scores with ONNX Runtime.
    #[cfg(feature = "onnx")]
    pub fn onnx(catalog: Catalog, client: AssetClient) -> Self {
        Self::new(catalog, client, Arc::new(OnnxFactory))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Key of the tables currently cached, if any.
    pub fn cached_tables(&self) -> Option<TablesKey> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(k, _)| k.clone())
    }

    async fn tables_for(&self, entry: &ModelEntry) -> Result<Arc<Preprocessing>, ClassifyError> {
        let key = entry.tables_key();
        {
            let cached = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((k, tables)) = cached.as_ref()
                && *k == key
            {
                debug!(model = %entry.name, "reusing cached preprocessing tables");
                return Ok(tables.clone());
            }
        }

        info!(
            model = %entry.name,
            preprocessing = %entry.preprocessing,
            scaler = ?entry.scaler.as_ref().map(ToString::to_string),
            "loading preprocessing tables"
        );
        let tables = Arc::new(
            self.client
                .load_preprocessing(&entry.preprocessing, entry.scaler.as_ref())
                .await?,
        );

        *self.tables.lock().unwrap_or_else(PoisonError::into_inner) = Some((key, tables.clone()));
        Ok(tables)
    }
}

#[async_trait]
impl ModelLoader for CatalogLoader {
    async fn load(&self, name: &str) -> Result<LoadedModel, ClassifyError> {
        let entry = self
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| ClassifyError::ModelLoad(format!("unknown model {name:?}")))?;

        let artifact = self
            .client
            .fetch(&entry.model)
            .await
            .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?;
        debug!(model = %entry.name, bytes = artifact.len(), "fetched model artifact");

        let tables = self.tables_for(&entry).await?;

        let factory = self.factory.clone();
        let build_entry = entry.clone();
        let scorer = tokio::task::spawn_blocking(move || factory.build(&build_entry, artifact))
            .await
            .map_err(|e| ClassifyError::ModelLoad(format!("model build task failed: {e}")))??;

        LoadedModel::new(entry.name, scorer, tables, entry.threshold)
    }
}
