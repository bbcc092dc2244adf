//! Terminal rendering for catalogs, session history, and feature vectors.

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use arrow::ipc::writer::FileWriter;
use arrow::util::pretty::pretty_format_batches;
use textclf_ai::features::{extract, tfidf_weights};
use textclf_core::{Catalog, Preprocessing, SessionEvent, history_batch};

pub fn print_models(catalog: &Catalog) {
    if catalog.models.is_empty() {
        println!("(no models in catalog)");
        return;
    }
    for m in &catalog.models {
        println!("{}", m.name);
        println!("  model:         {}", m.model);
        println!("  preprocessing: {}", m.preprocessing);
        if let Some(scaler) = &m.scaler {
            println!("  scaler:        {scaler}");
        }
        println!("  slots:         {} -> {}", m.input, m.output);
        println!("  threshold:     {}", m.threshold);
    }
}

pub fn print_history(events: &[SessionEvent]) -> anyhow::Result<()> {
    if events.is_empty() {
        println!("(history is empty)");
        return Ok(());
    }
    let batch = history_batch(events)?;
    println!("{}", pretty_format_batches(&[batch])?);
    Ok(())
}

/// Write the history as a single-batch Arrow IPC file.
pub fn export_history(events: &[SessionEvent], path: &Path) -> anyhow::Result<()> {
    let batch = history_batch(events)?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = FileWriter::try_new(file, &batch.schema())?;
    writer.write(&batch)?;
    writer.finish()?;
    Ok(())
}

/// One row per vocabulary slot the text touched.
pub struct SlotRow {
    pub index: usize,
    pub token: String,
    pub raw: f32,
    pub standardized: f32,
}

/// Slots with nonzero raw weight, heaviest first, at most `top` of them.
pub fn touched_slots(
    text: &str,
    tables: &Preprocessing,
    top: usize,
) -> anyhow::Result<Vec<SlotRow>> {
    let raw = tfidf_weights(text, tables.vocab(), tables.idf(), tables.dim())?;
    let standardized = extract(text, tables)?;

    let mut rows: Vec<SlotRow> = tables
        .vocab()
        .iter()
        .filter(|&(_, idx)| raw[idx] != 0.0)
        .map(|(token, idx)| SlotRow {
            index: idx,
            token: token.to_string(),
            raw: raw[idx],
            standardized: standardized.as_slice()[idx],
        })
        .collect();

    rows.sort_by(|a, b| {
        b.raw
            .abs()
            .partial_cmp(&a.raw.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    rows.truncate(top);
    Ok(rows)
}

pub fn print_features(text: &str, tables: &Preprocessing, top: usize) -> anyhow::Result<()> {
    let vector = extract(text, tables)?;
    let raw = tfidf_weights(text, tables.vocab(), tables.idf(), tables.dim())?;
    let touched = raw.iter().filter(|v| **v != 0.0).count();
    let rows = touched_slots(text, tables, top)?;

    println!("dimension: {}", vector.len());
    println!("idf:       {}", if tables.idf().is_some() { "yes" } else { "no" });
    println!("touched:   {touched} of {} slots", vector.len());

    if rows.is_empty() {
        println!("(no vocabulary tokens in input)");
        return Ok(());
    }
    println!("{:>7}  {:<24} {:>12} {:>14}", "index", "token", "tf-idf", "standardized");
    for r in &rows {
        println!(
            "{:>7}  {:<24} {:>12.4} {:>14.4}",
            r.index, r.token, r.raw, r.standardized
        );
    }
    Ok(())
}
