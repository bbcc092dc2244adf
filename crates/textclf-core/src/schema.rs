//! Arrow schema for a session's result history.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float32Array, StringArray, TimestampNanosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::classification::{EventKind, SessionEvent};

/// Schema for session history: one row per input, result, or error event.
pub fn history_schema() -> Schema {
    Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
            false,
        ),
        Field::new("model", DataType::Utf8, true),
        Field::new("kind", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, true),
        Field::new("probability", DataType::Float32, true),
        Field::new("label", DataType::Utf8, true),
        Field::new("error_kind", DataType::Utf8, true),
        Field::new("message", DataType::Utf8, true),
    ])
}

/// Convert session events into a single RecordBatch.
pub fn history_batch(events: &[SessionEvent]) -> Result<RecordBatch, ArrowError> {
    let n = events.len();
    let mut timestamps = Vec::with_capacity(n);
    let mut models = Vec::with_capacity(n);
    let mut kinds = Vec::with_capacity(n);
    let mut texts = Vec::with_capacity(n);
    let mut probabilities = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    let mut error_kinds = Vec::with_capacity(n);
    let mut messages = Vec::with_capacity(n);

    for ev in events {
        timestamps.push(ev.at.timestamp_nanos_opt().unwrap_or_default());
        models.push(ev.model.as_deref());
        kinds.push(ev.kind_str());

        match &ev.kind {
            EventKind::Input { text } => {
                texts.push(Some(text.as_str()));
                probabilities.push(None);
                labels.push(None);
                error_kinds.push(None);
                messages.push(None);
            }
            EventKind::Result { classification } => {
                texts.push(None);
                probabilities.push(Some(classification.probability));
                labels.push(Some(classification.label.as_str()));
                error_kinds.push(None);
                messages.push(None);
            }
            EventKind::Error { kind, message } => {
                texts.push(None);
                probabilities.push(None);
                labels.push(None);
                error_kinds.push(Some(kind.as_str()));
                messages.push(Some(message.as_str()));
            }
        }
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampNanosecondArray::from(timestamps).with_timezone("UTC")),
        Arc::new(StringArray::from(models)),
        Arc::new(StringArray::from(kinds)),
        Arc::new(StringArray::from(texts)),
        Arc::new(Float32Array::from(probabilities)),
        Arc::new(StringArray::from(labels)),
        Arc::new(StringArray::from(error_kinds)),
        Arc::new(StringArray::from(messages)),
    ];

    RecordBatch::try_new(Arc::new(history_schema()), columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{Classification, DEFAULT_THRESHOLD};
    use crate::error::ClassifyError;
    use arrow::array::Array;

    #[test]
    fn schema_has_expected_fields() {
        let schema = history_schema();
        assert_eq!(schema.fields().len(), 8);
        assert!(schema.field_with_name("probability").is_ok());
        assert!(schema.field_with_name("error_kind").is_ok());
    }

    #[test]
    fn batch_from_mixed_events() {
        let model = Some("spam".to_string());
        let events = vec![
            SessionEvent::input(model.clone(), "win free money"),
            SessionEvent::result(
                model.clone(),
                Classification::from_probability(0.9, DEFAULT_THRESHOLD),
            ),
            SessionEvent::error(None, &ClassifyError::ModelNotReady),
        ];

        let batch = history_batch(&events).unwrap();
        assert_eq!(batch.num_rows(), 3);

        let kinds = batch
            .column_by_name("kind")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(kinds.value(0), "input");
        assert_eq!(kinds.value(1), "result");
        assert_eq!(kinds.value(2), "error");

        let probs = batch
            .column_by_name("probability")
            .unwrap()
            .as_any()
            .downcast_ref::<Float32Array>()
            .unwrap();
        assert!(probs.is_null(0));
        assert!((probs.value(1) - 0.9).abs() < 1e-6);

        let error_kinds = batch
            .column_by_name("error_kind")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(error_kinds.value(2), "model_not_ready");

        let models = batch.column_by_name("model").unwrap();
        assert!(models.is_null(2));
    }

    #[test]
    fn empty_history() {
        let batch = history_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
    }
}
