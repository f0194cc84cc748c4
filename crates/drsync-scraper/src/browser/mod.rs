//! The browser-automation seam.
//!
//! Login, navigation and export logic only ever see [`Browser`]. The bundled
//! [`HttpBrowser`] drives the site over plain HTTP with a cookie jar, which is
//! enough for server-rendered pages; a driver for a real browser can implement
//! the same trait.

mod http;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::extract::RawTable;
use crate::locate::{find_first, ElementInfo, Locator};

pub use http::HttpBrowser;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A file the site handed back instead of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait Browser: Send {
    /// Loads `url` as the current page.
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError>;

    fn current_url(&self) -> Option<String>;

    /// Interactive elements of the current page, in document order.
    fn elements(&self) -> Vec<ElementInfo>;

    async fn fill(&mut self, element: usize, text: &str) -> Result<(), ScraperError>;

    async fn click(&mut self, element: usize) -> Result<(), ScraperError>;

    /// Presses the commit key while `element` has focus.
    async fn press_enter(&mut self, element: usize) -> Result<(), ScraperError>;

    /// Tables on the current page as raw cell text.
    fn tables(&self) -> Vec<RawTable>;

    /// PNG of the viewport, when the driver can render one.
    async fn screenshot(&mut self) -> Option<Vec<u8>>;

    fn page_source(&self) -> String;

    /// Waits up to `timeout` for a download triggered by the last action.
    async fn take_download(&mut self, timeout: Duration) -> Option<Download>;

    /// Waits for in-flight navigation and scripts after an action.
    async fn settle(&mut self) {}

    /// Polls the page until `chain` matches something or `timeout` passes.
    async fn wait_for(&mut self, chain: &[Locator], timeout: Duration) -> Option<ElementInfo> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(found) = find_first(chain, &self.elements()) {
                return Some(found.clone());
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Tears down the session. Called once per run, success or not.
    async fn close(&mut self) {}
}
