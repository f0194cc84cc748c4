use serde_json::json;

use super::*;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

fn row(cells: &[(&str, &str)]) -> RawRow {
    RawRow {
        cells: cells
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    }
}

// -----------------------------------------------------------------------
// table rows
// -----------------------------------------------------------------------

#[test]
fn row_with_customer_and_hashed_order() {
    let mapping = FieldMapping::default();
    let record = normalize_row(&row(&[("Customer", "Acme"), ("Order", "#42")]), &mapping, date());
    assert_eq!(record.customer, "Acme");
    assert_eq!(record.order_number, "42");
    assert_eq!(record.date, date());
    assert_eq!(record.status, "");
}

#[test]
fn first_non_empty_synonym_wins() {
    let mapping = FieldMapping::default();
    let record = normalize_row(
        &row(&[("Customer", ""), ("Customer Name", "Jane"), ("Name", "Ignored")]),
        &mapping,
        date(),
    );
    assert_eq!(record.customer, "Jane");
}

#[test]
fn label_match_ignores_case() {
    let mapping = FieldMapping::default();
    let record = normalize_row(&row(&[("DUMPSTER SIZE", "20 yd")]), &mapping, date());
    assert_eq!(record.size, "20 yd");
}

#[test]
fn column_index_reads_synthesized_label() {
    let mapping = FieldMapping::default().with_column_index(CanonicalField::Address, 2);
    let record = normalize_row(
        &row(&[("col1", "42"), ("col2", "1 Main St")]),
        &mapping,
        date(),
    );
    assert_eq!(record.address, "1 Main St");
}

#[test]
fn column_index_falls_back_to_position() {
    let mapping = FieldMapping::default().with_column_index(CanonicalField::Phone, 3);
    let record = normalize_row(
        &row(&[("Ref", "x"), ("Who", "y"), ("Tel", "555-0100")]),
        &mapping,
        date(),
    );
    assert_eq!(record.phone, "555-0100");
}

#[test]
fn synonym_beats_column_index() {
    let mapping = FieldMapping::default().with_column_index(CanonicalField::Customer, 1);
    let record = normalize_row(
        &row(&[("Ref", "R1"), ("Customer", "Acme")]),
        &mapping,
        date(),
    );
    assert_eq!(record.customer, "Acme");
}

#[test]
fn status_only_rows_are_dropped() {
    let mapping = FieldMapping::default();
    let rows = vec![
        row(&[("Status", "Done")]),
        row(&[("Customer", "Acme"), ("Status", "Done")]),
    ];
    let records = normalize_rows(&rows, &mapping, date());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].customer, "Acme");
}

// -----------------------------------------------------------------------
// JSON records
// -----------------------------------------------------------------------

#[test]
fn json_with_capitalised_keys() {
    let mapping = FieldMapping::default();
    let record = normalize_json(&json!({"Customer": "Acme", "Order": "#42"}), &mapping, date());
    assert_eq!(record.customer, "Acme");
    assert_eq!(record.order_number, "42");
}

#[test]
fn relay_payload_record_normalizes() {
    let mapping = FieldMapping::default();
    let record = normalize_json(
        &json!({"order_id": "7", "customer_name": "Jane Doe", "address": "1 Main St"}),
        &mapping,
        date(),
    );
    assert_eq!(record.date_string(), "2025-01-15");
    assert_eq!(record.customer, "Jane Doe");
    assert_eq!(record.address, "1 Main St");
    assert_eq!(record.order_number, "7");
}

#[test]
fn numeric_order_number_is_coerced() {
    let mapping = FieldMapping::default();
    let record = normalize_json(&json!({"id": 1001, "customer": "Acme"}), &mapping, date());
    assert_eq!(record.order_number, "1001");
}

#[test]
fn nested_objects_are_reachable_by_path_and_leaf() {
    let mapping = FieldMapping::default();
    let record = normalize_json(
        &json!({"customer": {"name": "Jane", "phone": "555"}, "number": "#9"}),
        &mapping,
        date(),
    );
    assert_eq!(record.customer, "Jane");
    assert_eq!(record.phone, "555");
    assert_eq!(record.order_number, "9");
}

#[test]
fn flatten_keeps_arrays_as_leaves_and_lowercases() {
    let flat = flatten_json(&json!({"Items": [1, 2], "Site": {"Street": "Main"}, "gone": null}));
    assert_eq!(flat.get("items").map(String::as_str), Some("[1,2]"));
    assert_eq!(flat.get("site.street").map(String::as_str), Some("Main"));
    assert_eq!(flat.get("street").map(String::as_str), Some("Main"));
    assert!(!flat.contains_key("gone"));
}

#[test]
fn top_level_key_wins_over_nested_leaf() {
    let flat = flatten_json(&json!({"customer": {"name": "Nested"}, "name": "Top"}));
    assert_eq!(flat.get("name").map(String::as_str), Some("Top"));
    assert_eq!(flat.get("customer.name").map(String::as_str), Some("Nested"));
}

#[test]
fn json_records_without_identity_are_dropped() {
    let mapping = FieldMapping::default();
    let values = vec![json!({"status": "Done"}), json!({"order_id": 5})];
    let records = normalize_json_records(&values, &mapping, date());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].order_number, "5");
}

#[test]
fn strip_order_hash_removes_only_one() {
    assert_eq!(strip_order_hash(" #42 "), "42");
    assert_eq!(strip_order_hash("##42"), "#42");
    assert_eq!(strip_order_hash("42"), "42");
}

#[test]
fn bare_leaf_goes_to_first_nested_object_in_document_order() {
    let flat = flatten_json(&json!({
        "site": {"name": "Yard 9"},
        "customer": {"name": "Jane Doe"}
    }));
    assert_eq!(flat.get("name").map(String::as_str), Some("Yard 9"));
    assert_eq!(flat.get("customer.name").map(String::as_str), Some("Jane Doe"));
}
