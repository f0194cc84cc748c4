pub mod browser;
pub mod error;
pub mod extract;
pub mod locate;
pub mod login;
pub mod navigator;
pub mod normalize;
pub mod upstream;

#[cfg(test)]
mod fake;

pub use browser::{Browser, Download, HttpBrowser};
pub use error::ScraperError;
pub use extract::{extract_best_table, extract_from_html, ExtractedTable, RawRow, RawTable};
pub use locate::{ElementInfo, Locator};
pub use login::{resolve_login, LoginOutcome};
pub use navigator::{candidate_login_urls, AuthState, SessionNavigator};
pub use normalize::{normalize_json_records, normalize_rows};
pub use upstream::{find_orders_array, Attempt, DateWindow, Discovery, Transport, UpstreamClient};
