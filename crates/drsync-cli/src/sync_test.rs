use drsync_airtable::{upsert_records, AirtableClient, UpsertSummary};
use drsync_core::{Environment, FieldMapping, MemorySink, SourceConfig, StoreConfig, TargetSchema};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn jan_15() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

fn test_config(drs: Option<&MockServer>, store: Option<&MockServer>) -> AppConfig {
    AppConfig {
        env: Environment::Test,
        log_level: "debug".to_string(),
        diagnostics_dir: std::env::temp_dir().join("drsync-sync-test"),
        request_timeout_secs: 5,
        user_agent: "drsync-test/0.1".to_string(),
        download_timeout_secs: 2,
        export_prefix: "Orders".to_string(),
        relay_bind_addr: "127.0.0.1:0".parse().unwrap(),
        field_mapping: FieldMapping::default(),
        target_schema: TargetSchema::default(),
        source: drs.map(|server| SourceConfig {
            base_url: server.uri(),
            login_url: None,
            username: "dispatch".to_string(),
            password: "secret".to_string(),
            orders_url: format!("{}/orders", server.uri()),
            api_paths: vec!["/api/orders".to_string()],
            api_token: None,
        }),
        store: store.map(|server| StoreConfig {
            api_key: "key-test".to_string(),
            base_id: "appTEST".to_string(),
            table: "Orders".to_string(),
            api_url: format!("{}/v0/", server.uri()),
            max_retries: 0,
            backoff_base_ms: 0,
        }),
    }
}

#[tokio::test]
async fn relay_orders_are_normalized_and_created() {
    let relay = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("date", "2025-01-15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [{"order_id": "7", "customer_name": "Jane Doe", "address": "1 Main St"}]
        })))
        .mount(&relay)
        .await;

    let airtable = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/appTEST/Orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .mount(&airtable)
        .await;
    Mock::given(method("POST"))
        .and(path("/v0/appTEST/Orders"))
        .and(body_partial_json(json!({"records": [{"fields": {
            "Date": "2025-01-15",
            "Customer": "Jane Doe",
            "Address": "1 Main St",
            "Order #": "7"
        }}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": "rec1", "fields": {}}]
        })))
        .expect(1)
        .mount(&airtable)
        .await;

    let config = test_config(None, Some(&airtable));
    let sink = MemorySink::new();
    let relay_url = relay.uri();
    let records = collect_records(&config, jan_15(), Source::Relay, Some(&relay_url), &sink)
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].customer, "Jane Doe");
    assert_eq!(records[0].order_number, "7");
    assert_eq!(sink.labels(), vec!["orders.json"]);

    let store = AirtableClient::new(
        config.require_store().unwrap(),
        config.target_schema.clone(),
        5,
    )
    .unwrap();
    let summary = upsert_records(&store, &records, &sink).await.unwrap();
    assert_eq!(
        summary,
        UpsertSummary {
            created: 1,
            updated: 0,
            skipped: 0
        }
    );
}

#[tokio::test]
async fn relay_bad_gateway_fails_the_run() {
    let relay = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({"orders": []})))
        .mount(&relay)
        .await;

    let config = test_config(None, None);
    let err = from_relay(&config, Some(relay.uri().as_str()), jan_15())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("502"), "{err}");
}

#[tokio::test]
async fn relay_source_without_url_is_a_configuration_error() {
    let config = test_config(None, None);
    let err = from_relay(&config, None, jan_15()).await.unwrap_err();
    assert!(err.downcast_ref::<ConfigError>().is_some());
}

#[tokio::test]
async fn api_source_uses_upstream_discovery() {
    let drs = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"rows": [{"Customer": "Acme", "Order": "#42", "Status": "Open"}]}
        })))
        .mount(&drs)
        .await;

    let config = test_config(Some(&drs), None);
    let sink = MemorySink::new();
    let records = collect_records(&config, jan_15(), Source::Api, None, &sink)
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].order_number, "42");
    assert_eq!(records[0].status, "Open");
}

#[tokio::test]
async fn api_source_failure_dumps_attempts() {
    let drs = MockServer::start().await;

    let config = test_config(Some(&drs), None);
    let sink = MemorySink::new();
    let result = collect_records(&config, jan_15(), Source::Api, None, &sink).await;

    assert!(result.is_err());
    match sink.events().as_slice() {
        [DiagnosticEvent::Payload { name, body }] => {
            assert_eq!(name, "orders.json");
            assert_eq!(body["attempts"].as_array().map(Vec::len), Some(3));
        }
        other => panic!("expected attempts payload, got {other:?}"),
    }
}

#[tokio::test]
async fn sync_without_store_section_fails_before_scraping() {
    let drs = MockServer::start().await;
    let config = test_config(Some(&drs), None);

    let err = run_sync(&config, jan_15(), Source::Api, None, false)
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<ConfigError>().is_some());
    assert!(drs.received_requests().await.unwrap_or_default().is_empty());
}
