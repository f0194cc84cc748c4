//! Drives one browser session from login to the orders report.

use std::time::Duration;

use chrono::NaiveDate;
use drsync_core::{DiagnosticEvent, DiagnosticSink, SourceConfig};
use scraper::{Html, Selector};

use crate::browser::{Browser, Download};
use crate::error::ScraperError;
use crate::extract::{extract_best_table, ExtractedTable};
use crate::locate::{
    find_first, find_first_except, APPLY_FILTER_CHAIN, CSV_EXPORT_CHAIN, DAILY_VIEW_CHAIN,
    END_DATE_CHAIN, PASSWORD_SIGNAL, START_DATE_CHAIN,
};
use crate::login::{resolve_login, LoginOutcome};

/// Tried after the explicit login URL and before the bare base URL.
pub const CONVENTIONAL_LOGIN_PATHS: [&str; 4] =
    ["/login", "/signin", "/users/sign_in", "/account/login"];

/// Login progress for one session. `Failed` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Attempting { index: usize, url: String },
    Authenticated { url: String },
    Failed { attempted: Vec<String> },
}

/// Explicit login URL, then the conventional paths, then the base URL, with
/// duplicates removed.
#[must_use]
pub fn candidate_login_urls(source: &SourceConfig) -> Vec<String> {
    let base = source.base_url.trim_end_matches('/');
    let mut urls: Vec<String> = Vec::new();
    let mut push = |url: String| {
        if !urls.contains(&url) {
            urls.push(url);
        }
    };
    if let Some(explicit) = &source.login_url {
        push(explicit.clone());
    }
    for path in CONVENTIONAL_LOGIN_PATHS {
        push(format!("{base}{path}"));
    }
    push(base.to_string());
    urls
}

pub struct SessionNavigator<'a, B: Browser> {
    browser: B,
    source: &'a SourceConfig,
    sink: &'a dyn DiagnosticSink,
    download_timeout: Duration,
    state: AuthState,
}

impl<'a, B: Browser> SessionNavigator<'a, B> {
    pub fn new(
        browser: B,
        source: &'a SourceConfig,
        sink: &'a dyn DiagnosticSink,
        download_timeout: Duration,
    ) -> Self {
        Self {
            browser,
            source,
            sink,
            download_timeout,
            state: AuthState::Unauthenticated,
        }
    }

    #[must_use]
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    async fn snapshot(&mut self, tag: &str) {
        let screenshot = self.browser.screenshot().await;
        let page_source = self.browser.page_source();
        self.sink
            .record(DiagnosticEvent::Snapshot {
                tag: tag.to_string(),
                screenshot,
                page_source,
            })
            .await;
    }

    /// Walks the candidate login URLs until one yields a logged-in page.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::AuthenticationFailed`] once every candidate
    /// has been tried, after recording a `login-failed` snapshot.
    pub async fn authenticate(&mut self) -> Result<(), ScraperError> {
        match &self.state {
            AuthState::Authenticated { .. } => return Ok(()),
            AuthState::Failed { attempted } => {
                return Err(ScraperError::AuthenticationFailed {
                    attempted: attempted.clone(),
                })
            }
            AuthState::Unauthenticated | AuthState::Attempting { .. } => {}
        }

        let candidates = candidate_login_urls(self.source);
        for (index, url) in candidates.iter().enumerate() {
            self.state = AuthState::Attempting {
                index,
                url: url.clone(),
            };
            tracing::info!(attempt = index + 1, url = %url, "trying login page");

            if let Err(e) = self.browser.navigate(url).await {
                tracing::warn!(url = %url, error = %e, "login page unreachable");
                continue;
            }
            match resolve_login(&mut self.browser, &self.source.username, &self.source.password)
                .await
            {
                Ok(outcome) if outcome.is_authenticated() => {
                    let landed = self.browser.current_url().unwrap_or_else(|| url.clone());
                    tracing::info!(
                        url = %url,
                        landed = %landed,
                        already = outcome == LoginOutcome::AlreadyAuthenticated,
                        "authenticated"
                    );
                    self.state = AuthState::Authenticated { url: landed };
                    return Ok(());
                }
                Ok(outcome) => {
                    tracing::warn!(url = %url, outcome = ?outcome, "login attempt did not succeed");
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "login attempt errored");
                }
            }
        }

        self.state = AuthState::Failed {
            attempted: candidates.clone(),
        };
        self.snapshot("login-failed").await;
        Err(ScraperError::AuthenticationFailed {
            attempted: candidates,
        })
    }

    /// Best effort: missing controls are recorded, never fatal.
    async fn apply_date_filters(&mut self, date: NaiveDate) {
        let value = date.format("%Y-%m-%d").to_string();
        let elements = self.browser.elements();
        let start = find_first(START_DATE_CHAIN, &elements).cloned();
        let exclude: Vec<usize> = start.iter().map(|s| s.id).collect();
        let end = find_first_except(END_DATE_CHAIN, &elements, &exclude).cloned();

        if start.is_none() && end.is_none() {
            tracing::info!("report page has no date filters");
            self.snapshot("date-filters-missing").await;
            return;
        }
        for field in start.iter().chain(end.iter()) {
            if let Err(e) = self.browser.fill(field.id, &value).await {
                tracing::warn!(element = field.id, error = %e, "could not fill date filter");
            }
        }

        match find_first(APPLY_FILTER_CHAIN, &elements) {
            Some(button) => {
                if let Err(e) = self.browser.click(button.id).await {
                    tracing::warn!(error = %e, "filter button click failed");
                }
                self.browser.settle().await;
            }
            None => {
                tracing::info!("report page has no filter button");
                self.snapshot("filter-button-missing").await;
            }
        }
    }

    async fn open_report(&mut self, date: NaiveDate) -> Result<(), ScraperError> {
        self.authenticate().await?;
        let orders_url = self.source.orders_url.clone();
        tracing::info!(url = %orders_url, date = %date, "opening orders report");
        self.browser.navigate(&orders_url).await?;
        if find_first(PASSWORD_SIGNAL, &self.browser.elements()).is_some() {
            tracing::warn!(url = %orders_url, "report page shows a login form");
        }
        self.apply_date_filters(date).await;
        Ok(())
    }

    async fn scrape_inner(&mut self, date: NaiveDate) -> Result<ExtractedTable, ScraperError> {
        self.open_report(date).await?;
        let tables = self.browser.tables();
        let extracted = extract_best_table(&tables);
        if extracted.is_empty() {
            tracing::warn!(tables = tables.len(), "no order rows found");
            self.snapshot("no-rows").await;
        } else {
            tracing::info!(rows = extracted.rows.len(), "order table extracted");
        }
        Ok(extracted)
    }

    async fn export_inner(&mut self, date: NaiveDate) -> Result<Download, ScraperError> {
        self.open_report(date).await?;

        let elements = self.browser.elements();
        if let Some(daily) = find_first(DAILY_VIEW_CHAIN, &elements) {
            self.browser.click(daily.id).await?;
            self.browser.settle().await;
        } else {
            tracing::info!("no daily view control, exporting the current view");
        }

        let elements = self.browser.elements();
        let mut export_error = None;
        if let Some(export) = find_first(CSV_EXPORT_CHAIN, &elements) {
            tracing::info!(caption = export.caption(), "clicking export control");
            match self.browser.click(export.id).await {
                Ok(()) => {
                    if let Some(download) =
                        self.browser.take_download(self.download_timeout).await
                    {
                        return Ok(download);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "export control failed");
                    export_error = Some(e);
                }
            }
        } else {
            tracing::warn!("no CSV export control found");
        }

        if let Some(csv) = inline_csv(&self.browser.page_source()) {
            tracing::info!(bytes = csv.len(), "using inline CSV body");
            return Ok(Download {
                file_name: None,
                content_type: Some("text/csv".to_string()),
                bytes: csv.into_bytes(),
            });
        }

        self.snapshot("download-missing").await;
        Err(export_error.unwrap_or(ScraperError::DownloadMissing {
            timeout_secs: self.download_timeout.as_secs(),
        }))
    }

    /// Logs in, opens the report for `date` and extracts the order table.
    /// The browser is closed before returning, whatever the outcome.
    ///
    /// An empty table is not an error; a `no-rows` snapshot is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::AuthenticationFailed`] when no login page
    /// works, or the driver's error if the report page cannot be loaded.
    pub async fn scrape_orders(mut self, date: NaiveDate) -> Result<ExtractedTable, ScraperError> {
        let result = self.scrape_inner(date).await;
        self.browser.close().await;
        result
    }

    /// Logs in, opens the daily view and captures the CSV export. Falls back
    /// to CSV-looking text on the page when no download arrives.
    /// The browser is closed before returning, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::DownloadMissing`] when neither a download nor
    /// inline CSV shows up, or the export request's own error (for example
    /// [`ScraperError::UnexpectedStatus`]) when it failed and the page held no
    /// inline CSV. Plus everything [`Self::scrape_orders`] can return.
    pub async fn export_csv(mut self, date: NaiveDate) -> Result<Download, ScraperError> {
        let result = self.export_inner(date).await;
        self.browser.close().await;
        result
    }
}

/// CSV-looking text in a `<pre>` block or the page body: at least two
/// non-empty lines, the first two with the same non-zero comma count.
#[must_use]
pub fn inline_csv(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let text = ["pre", "body"].iter().find_map(|css| {
        let sel = Selector::parse(css).ok()?;
        document
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>())
    })?;

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    fn commas(line: &str) -> usize {
        line.matches(',').count()
    }
    match lines.as_slice() {
        [first, second, ..] if commas(first) > 0 && commas(first) == commas(second) => {
            Some(lines.join("\n"))
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "navigator_test.rs"]
mod tests;
