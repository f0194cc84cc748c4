//! Maps scraped rows and JSON records onto [`CanonicalRecord`].
//!
//! Both inputs go through the same policy: for each canonical field, walk its
//! synonyms in order and take the first non-empty value. Table rows may also
//! fall back to a configured column index. Records that name neither a
//! customer, an address nor an order number are dropped.

use std::collections::HashMap;

use chrono::NaiveDate;
use drsync_core::{CanonicalField, CanonicalRecord, FieldMapping};
use serde_json::Value;

use crate::extract::RawRow;

/// Removes one leading `#` and surrounding whitespace.
#[must_use]
pub fn strip_order_hash(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('#')
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn finish(mut record: CanonicalRecord) -> CanonicalRecord {
    record.order_number = strip_order_hash(&record.order_number);
    record
}

/// Maps one table row. Never fails; unmatched fields stay empty.
#[must_use]
pub fn normalize_row(row: &RawRow, mapping: &FieldMapping, date: NaiveDate) -> CanonicalRecord {
    let mut record = CanonicalRecord::new(date);
    for field in CanonicalField::ALL {
        let rule = mapping.rule(field);
        let by_label = rule
            .labels
            .iter()
            .filter_map(|label| row.get(label))
            .find(|v| !v.is_empty());
        let value = by_label.or_else(|| {
            rule.column_index.and_then(|n| {
                row.get(&format!("col{n}"))
                    .or_else(|| row.positional(n))
                    .filter(|v| !v.is_empty())
            })
        });
        if let Some(value) = value {
            record.set(field, value.trim().to_string());
        }
    }
    finish(record)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn flatten_into(value: &Value, prefix: &str, out: &mut HashMap<String, String>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        let key = key.to_lowercase();
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Value::Object(_) = child {
            flatten_into(child, &path, out);
            continue;
        }
        let Some(text) = scalar_text(child) else {
            continue;
        };
        if !prefix.is_empty() {
            out.entry(key).or_insert_with(|| text.clone());
        }
        out.insert(path, text);
    }
}

/// Flattens nested objects into one level keyed by the lowercase dotted path.
/// The bare leaf name is also added when no other entry claimed it. Arrays
/// are leaves and keep their JSON text.
#[must_use]
pub fn flatten_json(value: &Value) -> HashMap<String, String> {
    let mut out = HashMap::new();
    flatten_into(value, "", &mut out);
    out
}

/// Maps one JSON record (any object shape).
#[must_use]
pub fn normalize_json(value: &Value, mapping: &FieldMapping, date: NaiveDate) -> CanonicalRecord {
    let flat = flatten_json(value);
    let mut record = CanonicalRecord::new(date);
    for field in CanonicalField::ALL {
        let found = mapping
            .rule(field)
            .json_keys
            .iter()
            .filter_map(|key| flat.get(&key.to_lowercase()))
            .find(|v| !v.is_empty());
        if let Some(value) = found {
            record.set(field, value.clone());
        }
    }
    finish(record)
}

fn keep_persistable(records: Vec<CanonicalRecord>, source: &str) -> Vec<CanonicalRecord> {
    let total = records.len();
    let kept: Vec<CanonicalRecord> = records
        .into_iter()
        .filter(CanonicalRecord::is_persistable)
        .collect();
    if kept.len() < total {
        tracing::info!(
            source,
            dropped = total - kept.len(),
            kept = kept.len(),
            "dropped records without customer, address or order number"
        );
    }
    kept
}

/// Normalizes table rows and drops non-persistable records.
#[must_use]
pub fn normalize_rows(
    rows: &[RawRow],
    mapping: &FieldMapping,
    date: NaiveDate,
) -> Vec<CanonicalRecord> {
    let records = rows
        .iter()
        .map(|row| normalize_row(row, mapping, date))
        .collect();
    keep_persistable(records, "table")
}

/// Normalizes JSON records and drops non-persistable records.
#[must_use]
pub fn normalize_json_records(
    values: &[Value],
    mapping: &FieldMapping,
    date: NaiveDate,
) -> Vec<CanonicalRecord> {
    let records = values
        .iter()
        .map(|value| normalize_json(value, mapping, date))
        .collect();
    keep_persistable(records, "json")
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
