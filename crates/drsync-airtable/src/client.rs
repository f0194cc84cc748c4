//! HTTP client for the Airtable REST API.
//!
//! Wraps `reqwest` with bearer-token auth, back-off on transient failures and
//! mapping of [`CanonicalRecord`]s onto the table's display column names.

use std::time::Duration;

use async_trait::async_trait;
use drsync_core::{CanonicalField, CanonicalRecord, StoreConfig, TargetSchema};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StoreError;
use crate::retry::retry_with_backoff;
use crate::store::RecordStore;
use crate::types::{Fields, ListResponse, WriteRecord, WriteRequest, WriteResponse};

const STORE_NAME: &str = "airtable";

/// Client for one Airtable table.
pub struct AirtableClient {
    client: Client,
    api_key: String,
    table_url: Url,
    schema: TargetSchema,
    max_retries: u32,
    backoff_base_ms: u64,
}

/// Escapes a value for use inside a single-quoted formula string.
fn escape_formula(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn build_table_url(api_url: &str, base_id: &str, table: &str) -> Result<Url, StoreError> {
    let invalid = |reason: String| StoreError::InvalidBaseUrl {
        url: api_url.to_string(),
        reason,
    };
    let mut url = Url::parse(&format!("{}/", api_url.trim_end_matches('/')))
        .map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("URL cannot be a base".to_string()))?
        .pop_if_empty()
        .push(base_id)
        .push(table);
    Ok(url)
}

impl AirtableClient {
    /// # Errors
    ///
    /// Returns [`StoreError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`StoreError::InvalidBaseUrl`] if the
    /// configured API URL does not parse.
    pub fn new(
        config: &StoreConfig,
        schema: TargetSchema,
        timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("drsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let table_url = build_table_url(&config.api_url, &config.base_id, &config.table)?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            table_url,
            schema,
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
        })
    }

    #[must_use]
    pub fn table_url(&self) -> &Url {
        &self.table_url
    }

    /// `filterByFormula` matching one `(date, order number)` key.
    ///
    /// The date column is compared through `DATETIME_FORMAT` so date-typed
    /// and plain-text columns both match an ISO date.
    #[must_use]
    pub fn key_formula(&self, date: &str, order_number: &str) -> String {
        format!(
            "AND(DATETIME_FORMAT({{{}}},'YYYY-MM-DD')='{}',{{{}}}='{}')",
            self.schema.date,
            escape_formula(date),
            self.schema.order_number,
            escape_formula(order_number),
        )
    }

    /// Column values for `record`. Empty canonical fields are left out so an
    /// update never blanks a column the source had nothing for.
    #[must_use]
    pub fn fields_for(&self, record: &CanonicalRecord) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            self.schema.date.clone(),
            Value::String(record.date_string()),
        );
        for field in CanonicalField::ALL {
            let value = record.get(field);
            if !value.is_empty() {
                fields.insert(
                    self.schema.display_name(field).to_string(),
                    Value::String(value.to_string()),
                );
            }
        }
        fields
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&WriteRequest>,
        context: &str,
    ) -> Result<T, StoreError> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.api_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::RateLimited);
        }
        let text = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|source| StoreError::Deserialize {
            context: context.to_string(),
            source,
        })
    }

    /// `POST` is treated as non-idempotent and only replayed when the store
    /// cannot have processed it.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&WriteRequest>,
        context: &str,
    ) -> Result<T, StoreError> {
        let idempotent = method != Method::POST;
        retry_with_backoff(self.max_retries, self.backoff_base_ms, idempotent, || {
            self.execute(method.clone(), url.clone(), body, context)
        })
        .await
    }
}

#[async_trait]
impl RecordStore for AirtableClient {
    fn name(&self) -> &str {
        STORE_NAME
    }

    async fn find_record_id(
        &self,
        date: &str,
        order_number: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut url = self.table_url.clone();
        url.query_pairs_mut()
            .append_pair("filterByFormula", &self.key_formula(date, order_number))
            .append_pair("maxRecords", "1");

        let list: ListResponse = self
            .send(Method::GET, url, None, "list records by key")
            .await?;
        if list.offset.is_some() {
            tracing::debug!(date, order_number, "key lookup reported further pages");
        }
        Ok(list.records.into_iter().next().map(|r| r.id))
    }

    async fn create_records(&self, records: &[&CanonicalRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let body = WriteRequest {
            records: records
                .iter()
                .map(|r| WriteRecord {
                    id: None,
                    fields: self.fields_for(r),
                })
                .collect(),
            typecast: true,
        };
        let response: WriteResponse = self
            .send(
                Method::POST,
                self.table_url.clone(),
                Some(&body),
                "create records",
            )
            .await?;
        tracing::debug!(requested = records.len(), created = response.records.len(), "created records");
        Ok(response.records.len())
    }

    async fn update_records(
        &self,
        records: &[(String, &CanonicalRecord)],
    ) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let body = WriteRequest {
            records: records
                .iter()
                .map(|(id, r)| WriteRecord {
                    id: Some(id.clone()),
                    fields: self.fields_for(r),
                })
                .collect(),
            typecast: true,
        };
        let response: WriteResponse = self
            .send(
                Method::PATCH,
                self.table_url.clone(),
                Some(&body),
                "update records",
            )
            .await?;
        tracing::debug!(requested = records.len(), updated = response.records.len(), "updated records");
        Ok(response.records.len())
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
