//! Upsert reconciliation.
//!
//! Each record is keyed by `(date, order number)`. A key that already exists
//! in the store becomes an update, anything else a create. Records without an
//! order number are never matched and always create. Writes go out in batches
//! of [`BATCH_SIZE`], one batch at a time; the first failing batch stops the
//! run after its error has been handed to the diagnostics sink.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::NaiveDate;
use drsync_core::{CanonicalRecord, DiagnosticEvent, DiagnosticSink};
use serde::Serialize;

use crate::error::StoreError;
use crate::store::RecordStore;

/// Maximum records per store write.
pub const BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub created: usize,
    pub updated: usize,
    /// Records dropped before writing: not persistable, or superseded by a
    /// later record with the same key in this run.
    pub skipped: usize,
}

/// Drops unpersistable records and folds repeated keys into one entry that
/// keeps the first position and the last values.
fn collapse(records: &[CanonicalRecord]) -> (Vec<&CanonicalRecord>, usize) {
    let mut pending: Vec<&CanonicalRecord> = Vec::with_capacity(records.len());
    let mut positions: HashMap<(NaiveDate, &str), usize> = HashMap::new();
    let mut skipped = 0;

    for record in records {
        if !record.is_persistable() {
            skipped += 1;
            continue;
        }
        if record.order_number.is_empty() {
            pending.push(record);
            continue;
        }
        match positions.entry((record.date, record.order_number.as_str())) {
            Entry::Occupied(slot) => {
                pending[*slot.get()] = record;
                skipped += 1;
            }
            Entry::Vacant(slot) => {
                slot.insert(pending.len());
                pending.push(record);
            }
        }
    }
    (pending, skipped)
}

async fn write_batch(
    store: &dyn RecordStore,
    batch: &[&CanonicalRecord],
) -> Result<(usize, usize), StoreError> {
    let mut creates: Vec<&CanonicalRecord> = Vec::new();
    let mut updates: Vec<(String, &CanonicalRecord)> = Vec::new();

    for &record in batch {
        if record.order_number.is_empty() {
            creates.push(record);
            continue;
        }
        match store
            .find_record_id(&record.date_string(), &record.order_number)
            .await?
        {
            Some(id) => updates.push((id, record)),
            None => creates.push(record),
        }
    }

    let created = store.create_records(&creates).await?;
    let updated = store.update_records(&updates).await?;
    Ok((created, updated))
}

/// Writes `records` into `store`, creating or updating by key.
///
/// # Errors
///
/// Returns the first [`StoreError`] raised by a lookup or write. Batches
/// before the failing one stay written; the error detail is recorded as a
/// [`DiagnosticEvent::StoreError`] before returning.
pub async fn upsert_records(
    store: &dyn RecordStore,
    records: &[CanonicalRecord],
    sink: &dyn DiagnosticSink,
) -> Result<UpsertSummary, StoreError> {
    let (pending, skipped) = collapse(records);
    let mut summary = UpsertSummary {
        skipped,
        ..UpsertSummary::default()
    };

    for (index, batch) in pending.chunks(BATCH_SIZE).enumerate() {
        match write_batch(store, batch).await {
            Ok((created, updated)) => {
                tracing::info!(batch = index, created, updated, "store batch written");
                summary.created += created;
                summary.updated += updated;
            }
            Err(err) => {
                tracing::error!(
                    store = store.name(),
                    batch = index,
                    records = batch.len(),
                    error = %err,
                    "store batch failed"
                );
                sink.record(DiagnosticEvent::StoreError {
                    store: store.name().to_string(),
                    detail: format!("batch {index} ({} records): {err}", batch.len()),
                })
                .await;
                return Err(err);
            }
        }
    }

    tracing::info!(
        store = store.name(),
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        "upsert complete"
    );
    Ok(summary)
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
