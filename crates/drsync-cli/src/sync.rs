//! `sync` command: one date's orders from the chosen source, normalized and
//! upserted into the record store.
//!
//! Store configuration is checked before any scraping starts so a missing
//! key never costs a login. Every source writes its raw payload to the
//! diagnostics directory as `orders.json`.

use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::ValueEnum;
use drsync_airtable::{upsert_records, AirtableClient};
use drsync_core::{
    AppConfig, CanonicalRecord, ConfigError, DiagnosticEvent, DiagnosticSink, FileDiagnosticSink,
};
use drsync_scraper::{
    normalize_json_records, normalize_rows, DateWindow, Discovery, HttpBrowser, RawRow,
    SessionNavigator, UpstreamClient,
};
use serde_json::Value;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum Source {
    /// Log in and read the report table
    Browser,
    /// Call the DRS JSON endpoints directly
    Api,
    /// Ask a deployed relay
    Relay,
}

const PAYLOAD_NAME: &str = "orders.json";

async fn record_payload(sink: &dyn DiagnosticSink, body: Value) {
    sink.record(DiagnosticEvent::Payload {
        name: PAYLOAD_NAME.to_string(),
        body,
    })
    .await;
}

async fn from_browser(
    config: &AppConfig,
    date: NaiveDate,
    sink: &dyn DiagnosticSink,
) -> anyhow::Result<Vec<CanonicalRecord>> {
    let source = config.require_source()?;
    let browser = HttpBrowser::new(config.request_timeout_secs, &config.user_agent)?;
    let navigator = SessionNavigator::new(
        browser,
        source,
        sink,
        Duration::from_secs(config.download_timeout_secs),
    );
    let table = navigator.scrape_orders(date).await?;

    let rows: Vec<Value> = table.rows.iter().map(RawRow::to_json).collect();
    record_payload(
        sink,
        serde_json::json!({ "headers": table.headers, "rows": rows }),
    )
    .await;
    Ok(normalize_rows(&table.rows, &config.field_mapping, date))
}

async fn from_api(
    config: &AppConfig,
    date: NaiveDate,
    sink: &dyn DiagnosticSink,
) -> anyhow::Result<Vec<Value>> {
    let source = config.require_source()?;
    let client = UpstreamClient::new(source, config.request_timeout_secs, &config.user_agent)?;
    match client.discover(DateWindow::day(date)).await {
        Discovery::Found { orders, .. } => Ok(orders),
        Discovery::NoArray { attempts } => {
            tracing::warn!(
                attempts = attempts.len(),
                "upstream returned JSON without an order array"
            );
            Ok(Vec::new())
        }
        Discovery::Failed { attempts } => {
            record_payload(sink, serde_json::json!({ "attempts": attempts })).await;
            anyhow::bail!("every upstream attempt failed ({} tried)", attempts.len())
        }
    }
}

/// Reads `{orders: [...]}` from a relay, treating 502 as a failed run.
pub(crate) async fn from_relay(
    config: &AppConfig,
    relay_url: Option<&str>,
    date: NaiveDate,
) -> anyhow::Result<Vec<Value>> {
    let relay_url =
        relay_url.ok_or_else(|| ConfigError::MissingEnvVar("RELAY_URL".to_string()))?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("drsync/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let day = date.format("%Y-%m-%d").to_string();
    let response = client
        .get(relay_url)
        .query(&[("date", day.as_str())])
        .send()
        .await
        .with_context(|| format!("relay request to {relay_url} failed"))?;
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .with_context(|| format!("relay answered HTTP {status} with a non-JSON body"))?;
    if !status.is_success() {
        anyhow::bail!("relay answered HTTP {status}: {body}");
    }
    if body.get("source").and_then(Value::as_str) == Some("no-array") {
        tracing::warn!("relay found JSON upstream but no order array");
    }

    match body.get("orders") {
        Some(Value::Array(orders)) => Ok(orders.clone()),
        _ => anyhow::bail!("relay response has no orders array"),
    }
}

/// Pulls and normalizes one day's orders from `source`.
pub(crate) async fn collect_records(
    config: &AppConfig,
    date: NaiveDate,
    source: Source,
    relay_url: Option<&str>,
    sink: &dyn DiagnosticSink,
) -> anyhow::Result<Vec<CanonicalRecord>> {
    let orders = match source {
        Source::Browser => return from_browser(config, date, sink).await,
        Source::Api => from_api(config, date, sink).await?,
        Source::Relay => from_relay(config, relay_url, date).await?,
    };
    record_payload(sink, Value::Array(orders.clone())).await;
    Ok(normalize_json_records(&orders, &config.field_mapping, date))
}

pub(crate) async fn run_sync(
    config: &AppConfig,
    date: NaiveDate,
    source: Source,
    relay_url: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let store = if dry_run {
        None
    } else {
        let store_config = config.require_store()?;
        Some(AirtableClient::new(
            store_config,
            config.target_schema.clone(),
            config.request_timeout_secs,
        )?)
    };
    let sink = FileDiagnosticSink::new(&config.diagnostics_dir);

    tracing::info!(date = %date, source = ?source, dry_run, "sync starting");
    let records = collect_records(config, date, source, relay_url, &sink).await?;
    tracing::info!(records = records.len(), "orders normalized");

    let Some(store) = store else {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    };
    let summary = upsert_records(&store, &records, &sink).await?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
