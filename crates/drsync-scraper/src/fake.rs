//! Scripted in-memory [`Browser`] for unit tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{Browser, Download};
use crate::error::ScraperError;
use crate::extract::RawTable;
use crate::locate::ElementInfo;

#[derive(Debug, Clone, Default)]
pub(crate) struct Screen {
    pub elements: Vec<ElementInfo>,
    pub source: String,
    pub tables: Vec<RawTable>,
}

#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Goto(String),
    Download(Download),
    /// Goes to `ok` when the filled password equals `password`, else `fail`.
    Login {
        password: String,
        ok: String,
        fail: String,
    },
}

#[derive(Debug, Default)]
pub(crate) struct FakeBrowser {
    pub screens: HashMap<String, Screen>,
    pub unreachable: HashSet<String>,
    pub on_click: HashMap<(String, usize), Outcome>,
    pub on_enter: HashMap<(String, usize), Outcome>,
    pub current: Option<String>,
    pub fills: Vec<(usize, String)>,
    pub visits: Vec<String>,
    pub clicks: Vec<usize>,
    pub download: Option<Download>,
    pub closed: bool,
}

pub(crate) fn el(id: usize, tag: &str, attrs: &[(&str, &str)], text: &str) -> ElementInfo {
    ElementInfo {
        id,
        tag: tag.to_string(),
        attrs: attrs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        text: text.to_string(),
    }
}

/// Username, password and a "Sign in" button, ids 0..=2.
pub(crate) fn login_screen() -> Screen {
    Screen {
        elements: vec![
            el(0, "input", &[("name", "username")], ""),
            el(1, "input", &[("type", "password"), ("name", "password")], ""),
            el(2, "button", &[("type", "submit")], "Sign in"),
        ],
        source: "<form>login</form>".to_string(),
        tables: Vec::new(),
    }
}

pub(crate) fn dashboard_screen() -> Screen {
    Screen {
        elements: vec![el(0, "a", &[("href", "/logout")], "Log out")],
        source: "<a>Log out</a>".to_string(),
        tables: Vec::new(),
    }
}

impl FakeBrowser {
    pub fn with_screen(mut self, url: &str, screen: Screen) -> Self {
        self.screens.insert(url.to_string(), screen);
        self
    }

    pub fn with_click(mut self, url: &str, element: usize, outcome: Outcome) -> Self {
        self.on_click.insert((url.to_string(), element), outcome);
        self
    }

    pub fn with_enter(mut self, url: &str, element: usize, outcome: Outcome) -> Self {
        self.on_enter.insert((url.to_string(), element), outcome);
        self
    }

    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    fn screen(&self) -> Option<&Screen> {
        self.current.as_ref().and_then(|u| self.screens.get(u))
    }

    fn apply(&mut self, outcome: Option<Outcome>) {
        match outcome {
            Some(Outcome::Goto(url)) => {
                self.fills.clear();
                self.current = Some(url);
            }
            Some(Outcome::Download(d)) => self.download = Some(d),
            Some(Outcome::Login { password, ok, fail }) => {
                let accepted = self.fills.iter().any(|(_, v)| *v == password);
                self.fills.clear();
                self.current = Some(if accepted { ok } else { fail });
            }
            None => {}
        }
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError> {
        self.visits.push(url.to_string());
        if self.unreachable.contains(url) || !self.screens.contains_key(url) {
            return Err(ScraperError::UnexpectedStatus {
                status: 404,
                url: url.to_string(),
            });
        }
        self.fills.clear();
        self.current = Some(url.to_string());
        Ok(())
    }

    fn current_url(&self) -> Option<String> {
        self.current.clone()
    }

    fn elements(&self) -> Vec<ElementInfo> {
        self.screen().map(|s| s.elements.clone()).unwrap_or_default()
    }

    async fn fill(&mut self, element: usize, text: &str) -> Result<(), ScraperError> {
        self.fills.push((element, text.to_string()));
        Ok(())
    }

    async fn click(&mut self, element: usize) -> Result<(), ScraperError> {
        self.clicks.push(element);
        let key = (self.current.clone().unwrap_or_default(), element);
        let outcome = self.on_click.get(&key).cloned();
        self.apply(outcome);
        Ok(())
    }

    async fn press_enter(&mut self, element: usize) -> Result<(), ScraperError> {
        let key = (self.current.clone().unwrap_or_default(), element);
        let outcome = self.on_enter.get(&key).cloned();
        self.apply(outcome);
        Ok(())
    }

    fn tables(&self) -> Vec<RawTable> {
        self.screen().map(|s| s.tables.clone()).unwrap_or_default()
    }

    async fn screenshot(&mut self) -> Option<Vec<u8>> {
        Some(vec![0x89, b'P', b'N', b'G'])
    }

    fn page_source(&self) -> String {
        self.screen().map(|s| s.source.clone()).unwrap_or_default()
    }

    async fn take_download(&mut self, _timeout: Duration) -> Option<Download> {
        self.download.take()
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
