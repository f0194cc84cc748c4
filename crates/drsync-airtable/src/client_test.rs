use chrono::NaiveDate;

use super::*;

fn config(api_url: &str, table: &str) -> StoreConfig {
    StoreConfig {
        api_key: "key-test".to_string(),
        base_id: "appTEST".to_string(),
        table: table.to_string(),
        api_url: api_url.to_string(),
        max_retries: 0,
        backoff_base_ms: 0,
    }
}

fn test_client() -> AirtableClient {
    AirtableClient::new(
        &config("https://api.airtable.com/v0/", "Orders"),
        TargetSchema::default(),
        30,
    )
    .expect("client construction should not fail")
}

#[test]
fn table_url_appends_base_and_table() {
    let client = test_client();
    assert_eq!(
        client.table_url().as_str(),
        "https://api.airtable.com/v0/appTEST/Orders"
    );
}

#[test]
fn table_url_encodes_table_name() {
    let client = AirtableClient::new(
        &config("https://api.airtable.com/v0", "Daily Orders"),
        TargetSchema::default(),
        30,
    )
    .unwrap();
    assert_eq!(
        client.table_url().as_str(),
        "https://api.airtable.com/v0/appTEST/Daily%20Orders"
    );
}

#[test]
fn invalid_api_url_is_rejected() {
    let result = AirtableClient::new(&config("not a url", "Orders"), TargetSchema::default(), 30);
    assert!(matches!(result, Err(StoreError::InvalidBaseUrl { .. })));
}

#[test]
fn key_formula_uses_display_names() {
    let client = test_client();
    assert_eq!(
        client.key_formula("2025-01-15", "7"),
        "AND(DATETIME_FORMAT({Date},'YYYY-MM-DD')='2025-01-15',{Order #}='7')"
    );
}

#[test]
fn key_formula_escapes_quotes() {
    let client = test_client();
    let formula = client.key_formula("2025-01-15", r"O'Neil\1");
    assert!(formula.ends_with(r"{Order #}='O\'Neil\\1')"), "{formula}");
}

#[test]
fn fields_for_skips_empty_values_and_renames() {
    let mut schema = TargetSchema::default();
    schema.set_display_name(CanonicalField::Size, "Container".to_string());
    let client = AirtableClient::new(
        &config("https://api.airtable.com/v0/", "Orders"),
        schema,
        30,
    )
    .unwrap();

    let mut record = CanonicalRecord::new(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
    record.customer = "Acme".to_string();
    record.size = "20 yd".to_string();

    let fields = client.fields_for(&record);
    assert_eq!(fields.len(), 3);
    assert_eq!(fields["Date"], "2025-01-15");
    assert_eq!(fields["Customer"], "Acme");
    assert_eq!(fields["Container"], "20 yd");
    assert!(!fields.contains_key("Phone"));
}
