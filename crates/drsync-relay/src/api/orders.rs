//! `/` handler: forwards one date window to the DRS JSON endpoints and
//! returns whatever order array the upstream discovery finds.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{Local, NaiveDate};
use drsync_scraper::{Attempt, DateWindow, Discovery};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, AppState};
use crate::middleware::RequestId;

/// Accepted from the query string and, for `POST`, from a JSON body. Query
/// values win when both are present.
#[derive(Debug, Default, Deserialize)]
pub(super) struct RelayParams {
    date: Option<String>,
    start: Option<String>,
    end: Option<String>,
    debug: Option<String>,
}

impl RelayParams {
    fn merge(self, fallback: RelayParams) -> RelayParams {
        RelayParams {
            date: self.date.or(fallback.date),
            start: self.start.or(fallback.start),
            end: self.end.or(fallback.end),
            debug: self.debug.or(fallback.debug),
        }
    }

    fn debug(&self) -> bool {
        matches!(self.debug.as_deref(), Some("1" | "true"))
    }
}

#[derive(Debug, Serialize)]
struct RelayResponse {
    orders: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<RelayDiagnostics>,
}

#[derive(Debug, Serialize)]
struct RelayDiagnostics {
    request_id: String,
    start: NaiveDate,
    end: NaiveDate,
    attempts: Vec<Attempt>,
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{name} must be YYYY-MM-DD, got \"{raw}\""))
}

/// `date` selects one day; otherwise `start` and `end` must come together.
/// With neither, the window is today in the relay's local time zone.
pub(super) fn resolve_window(params: &RelayParams) -> Result<DateWindow, String> {
    if let Some(date) = params.date.as_deref() {
        return parse_date("date", date).map(DateWindow::day);
    }
    match (params.start.as_deref(), params.end.as_deref()) {
        (Some(start), Some(end)) => {
            let start = parse_date("start", start)?;
            let end = parse_date("end", end)?;
            if start > end {
                return Err(format!("start {start} is after end {end}"));
            }
            Ok(DateWindow { start, end })
        }
        (None, None) => Ok(DateWindow::day(Local::now().date_naive())),
        _ => Err("start and end must be given together".to_string()),
    }
}

async fn relay(state: AppState, request_id: String, params: RelayParams) -> Response {
    let Some(upstream) = state.upstream.as_ref() else {
        return ApiError::new("not_configured", "relay is missing DRS_BASE_URL / credentials")
            .into_response();
    };
    let window = match resolve_window(&params) {
        Ok(window) => window,
        Err(message) => return ApiError::new("bad_request", message).into_response(),
    };
    let debug = params.debug();

    let discovery = upstream.discover(window).await;
    let (status, orders, source) = match &discovery {
        Discovery::Found { orders, .. } => (StatusCode::OK, orders.clone(), None),
        Discovery::NoArray { .. } => (StatusCode::OK, Vec::new(), Some("no-array")),
        Discovery::Failed { .. } => (StatusCode::BAD_GATEWAY, Vec::new(), None),
    };
    tracing::info!(
        request_id = %request_id,
        start = %window.start,
        end = %window.end,
        status = status.as_u16(),
        orders = orders.len(),
        attempts = discovery.attempts().len(),
        "relay request served"
    );

    let diagnostics = debug.then(|| RelayDiagnostics {
        request_id,
        start: window.start,
        end: window.end,
        attempts: discovery.attempts().to_vec(),
    });
    (
        status,
        Json(RelayResponse {
            orders,
            source,
            diagnostics,
        }),
    )
        .into_response()
}

pub(super) async fn relay_get(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<RelayParams>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(params)) => relay(state, req_id.0, params).await,
        Err(e) => ApiError::new("bad_request", e.body_text()).into_response(),
    }
}

pub(super) async fn relay_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<RelayParams>, QueryRejection>,
    body: Bytes,
) -> Response {
    let Ok(Query(params)) = query else {
        return ApiError::new("bad_request", "malformed query string").into_response();
    };
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        RelayParams::default()
    } else {
        match serde_json::from_slice::<RelayParams>(&body) {
            Ok(p) => p,
            Err(e) => {
                return ApiError::new("bad_request", format!("invalid JSON body: {e}"))
                    .into_response()
            }
        }
    };
    relay(state, req_id.0, params.merge(from_body)).await
}
