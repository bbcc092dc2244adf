//! Core types shared across textclf: preprocessing tables, classification
//! results, the model catalog, and the Arrow schema for session history.

pub mod catalog;
pub mod classification;
pub mod error;
pub mod resources;
pub mod schema;

pub use catalog::{Catalog, CatalogError, Location, ModelEntry, TablesKey};
pub use classification::{
    Classification, DEFAULT_THRESHOLD, EventKind, FeatureVector, Label, SessionEvent,
};
pub use error::{ClassifyError, ErrorKind};
pub use resources::{IdfVector, Preprocessing, ScalerParams, Vocabulary};
pub use schema::{history_batch, history_schema};
