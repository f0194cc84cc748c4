//! Direct access to the DRS JSON endpoints.
//!
//! The endpoint shape is not documented, so the client probes: for each
//! configured path (at most two) it tries a credential form POST, a header
//! POST and a header GET, and the first JSON response holding a non-empty
//! array wins. Every attempt is recorded so callers can explain a miss.

use std::time::Duration;

use chrono::NaiveDate;
use drsync_core::SourceConfig;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::ScraperError;

/// Object keys checked, in order, before falling back to a depth-first search.
pub const ORDER_ARRAY_KEYS: [&str; 9] = [
    "orders", "order", "rows", "data", "results", "baskets", "basket", "list", "items",
];

/// Upper bound on probed endpoint paths.
pub const MAX_PATHS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    /// `POST` with `username` / `password` form fields.
    FormPost,
    /// `POST` with a JSON body and basic-auth / API-key headers.
    HeaderPost,
    /// `GET` with query parameters and basic-auth / API-key headers.
    HeaderGet,
}

impl Transport {
    pub const ALL: [Transport; 3] = [
        Transport::FormPost,
        Transport::HeaderPost,
        Transport::HeaderGet,
    ];
}

/// Inclusive date range sent upstream. A single day has `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    #[must_use]
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let start = self.start.format("%Y-%m-%d").to_string();
        let end = self.end.format("%Y-%m-%d").to_string();
        let mut params = vec![("start", start.clone()), ("end", end.clone())];
        if start == end {
            params.push(("date", start));
        }
        params
    }
}

/// What one upstream call produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub path: String,
    pub transport: Transport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Discovery {
    Found {
        orders: Vec<Value>,
        attempts: Vec<Attempt>,
    },
    /// Some attempt returned JSON, none of it held an order array.
    NoArray { attempts: Vec<Attempt> },
    /// Every attempt failed at the transport, status or parse level.
    Failed { attempts: Vec<Attempt> },
}

impl Discovery {
    #[must_use]
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Discovery::Found { attempts, .. }
            | Discovery::NoArray { attempts }
            | Discovery::Failed { attempts } => attempts,
        }
    }
}

fn non_empty_array(value: &Value) -> Option<&Vec<Value>> {
    value.as_array().filter(|a| !a.is_empty())
}

fn first_object_array(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => {
            if items.iter().any(Value::is_object) {
                return Some(items);
            }
            items.iter().find_map(first_object_array)
        }
        Value::Object(map) => map.values().find_map(first_object_array),
        _ => None,
    }
}

/// Finds the order list in an arbitrary JSON body.
///
/// A top-level array is taken as is. Otherwise the well-known keys are
/// checked in order and any non-empty array under one of them wins. Failing
/// that, a depth-first walk returns the first non-empty array that holds at
/// least one object.
#[must_use]
pub fn find_orders_array(value: &Value) -> Option<&Vec<Value>> {
    if let Some(items) = non_empty_array(value) {
        return Some(items);
    }
    if let Value::Object(map) = value {
        if let Some(items) = ORDER_ARRAY_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(non_empty_array))
        {
            return Some(items);
        }
    }
    first_object_array(value)
}

enum Probe {
    Hit(Vec<Value>),
    NoArray,
    Miss,
}

pub struct UpstreamClient {
    client: Client,
    base_url: String,
    paths: Vec<String>,
    username: String,
    password: String,
    api_token: Option<String>,
}

impl UpstreamClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        source: &SourceConfig,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: source.base_url.trim_end_matches('/').to_string(),
            paths: source.api_paths.iter().take(MAX_PATHS).cloned().collect(),
            username: source.username.clone(),
            password: source.password.clone(),
            api_token: source.api_token.clone(),
        })
    }

    fn request(
        &self,
        url: &str,
        transport: Transport,
        window: DateWindow,
    ) -> reqwest::RequestBuilder {
        let params = window.params();
        let with_headers = |builder: reqwest::RequestBuilder| {
            let builder = builder
                .basic_auth(&self.username, Some(&self.password))
                .header(reqwest::header::ACCEPT, "application/json");
            match &self.api_token {
                Some(token) => builder.header("X-Api-Key", token),
                None => builder,
            }
        };

        match transport {
            Transport::FormPost => {
                let mut form: Vec<(&str, String)> = vec![
                    ("username", self.username.clone()),
                    ("password", self.password.clone()),
                ];
                form.extend(params);
                self.client
                    .post(url)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .form(&form)
            }
            Transport::HeaderPost => {
                let body: serde_json::Map<String, Value> = params
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v)))
                    .collect();
                with_headers(self.client.post(url)).json(&body)
            }
            Transport::HeaderGet => with_headers(self.client.get(url)).query(&params),
        }
    }

    /// Runs one call, records it, and classifies the result.
    async fn attempt(
        &self,
        path: &str,
        transport: Transport,
        window: DateWindow,
        attempts: &mut Vec<Attempt>,
    ) -> Probe {
        let url = format!("{}{}", self.base_url, path);
        let mut record = |status: Option<u16>, outcome: String| {
            tracing::debug!(
                path,
                transport = ?transport,
                status = ?status,
                outcome = %outcome,
                "upstream attempt"
            );
            attempts.push(Attempt {
                path: path.to_string(),
                transport,
                status,
                outcome,
            });
        };

        let response = match self.request(&url, transport, window).send().await {
            Ok(r) => r,
            Err(e) => {
                record(None, format!("transport error: {e}"));
                return Probe::Miss;
            }
        };
        let status = response.status();
        if !status.is_success() {
            record(Some(status.as_u16()), "unexpected status".to_string());
            return Probe::Miss;
        }
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                record(Some(status.as_u16()), format!("body read error: {e}"));
                return Probe::Miss;
            }
        };
        let json: Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(e) => {
                record(Some(status.as_u16()), format!("not json: {e}"));
                return Probe::Miss;
            }
        };
        match find_orders_array(&json) {
            Some(orders) => {
                record(Some(status.as_u16()), format!("found {} orders", orders.len()));
                Probe::Hit(orders.clone())
            }
            None => {
                record(Some(status.as_u16()), "no-array".to_string());
                Probe::NoArray
            }
        }
    }

    /// Probes at most six calls in sequence and stops at the first hit.
    pub async fn discover(&self, window: DateWindow) -> Discovery {
        let mut attempts = Vec::new();
        let mut saw_json = false;

        for path in &self.paths {
            for transport in Transport::ALL {
                match self.attempt(path, transport, window, &mut attempts).await {
                    Probe::Hit(orders) => {
                        tracing::info!(
                            path = %path,
                            transport = ?transport,
                            orders = orders.len(),
                            "upstream orders found"
                        );
                        return Discovery::Found { orders, attempts };
                    }
                    Probe::NoArray => saw_json = true,
                    Probe::Miss => {}
                }
            }
        }

        tracing::warn!(attempts = attempts.len(), saw_json, "no upstream order array found");
        if saw_json {
            Discovery::NoArray { attempts }
        } else {
            Discovery::Failed { attempts }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_orders_found_by_search() {
        let body = json!({"data": {"nested": {"orders": [{"id": 1}]}}});
        assert_eq!(find_orders_array(&body), Some(&vec![json!({"id": 1})]));
    }

    #[test]
    fn search_follows_document_order_not_key_order() {
        let body = json!({
            "payload": {"records": [{"id": 1}]},
            "links": [{"rel": "self"}]
        });
        assert_eq!(find_orders_array(&body), Some(&vec![json!({"id": 1})]));
    }

    #[test]
    fn direct_key_accepts_scalar_arrays() {
        let body = json!({"meta": [{"x": 1}], "rows": [1, 2]});
        assert_eq!(find_orders_array(&body), Some(&vec![json!(1), json!(2)]));
    }

    #[test]
    fn direct_keys_are_checked_in_order() {
        let body = json!({"items": [{"a": 1}], "orders": [{"b": 2}]});
        assert_eq!(find_orders_array(&body), Some(&vec![json!({"b": 2})]));
    }

    #[test]
    fn empty_direct_key_falls_through_to_search() {
        let body = json!({"orders": [], "payload": {"baskets_v2": [{"id": 3}]}});
        assert_eq!(find_orders_array(&body), Some(&vec![json!({"id": 3})]));
    }

    #[test]
    fn top_level_array_is_taken() {
        let body = json!([{"id": 1}]);
        assert_eq!(find_orders_array(&body).map(Vec::len), Some(1));
    }

    #[test]
    fn search_skips_arrays_without_objects() {
        assert_eq!(find_orders_array(&json!({"tags": ["a", "b"]})), None);
        assert_eq!(find_orders_array(&json!({"orders": []})), None);
        assert_eq!(find_orders_array(&json!("text")), None);
    }

    #[test]
    fn single_day_window_adds_date_param() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let params = DateWindow::day(day).params();
        assert!(params.contains(&("date", "2025-01-15".to_string())));

        let range = DateWindow {
            start: day,
            end: NaiveDate::from_ymd_opt(2025, 1, 16).unwrap(),
        };
        assert!(!range.params().iter().any(|(k, _)| *k == "date"));
    }
}
