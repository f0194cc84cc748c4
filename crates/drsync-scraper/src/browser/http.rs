use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};

use super::{Browser, Download};
use crate::error::ScraperError;
use crate::extract::{collapse_whitespace, tables_from_html, RawTable};
use crate::locate::{find_first, ElementInfo, Locator};

/// Cookie-holding HTTP client that behaves like a script-less browser:
/// links are followed, forms are submitted with their hidden fields, and any
/// response that is not HTML is kept as a download.
pub struct HttpBrowser {
    client: Client,
    page: Option<Page>,
    fills: HashMap<usize, String>,
    download: Option<Download>,
}

#[derive(Debug)]
struct Form {
    action: Option<String>,
    method: String,
}

#[derive(Debug)]
struct Control {
    form: Option<usize>,
    default_value: Option<String>,
}

#[derive(Debug)]
struct Page {
    url: Url,
    html: String,
    elements: Vec<ElementInfo>,
    controls: Vec<Control>,
    forms: Vec<Form>,
}

impl Page {
    fn parse(url: Url, html: String) -> Self {
        let (elements, controls, forms) = describe(&html);
        Self {
            url,
            html,
            elements,
            controls,
            forms,
        }
    }

    fn resolve(&self, target: &str) -> Result<Url, ScraperError> {
        self.url.join(target).map_err(|e| ScraperError::InvalidUrl {
            url: target.to_string(),
            reason: e.to_string(),
        })
    }
}

fn describe(html: &str) -> (Vec<ElementInfo>, Vec<Control>, Vec<Form>) {
    let document = Html::parse_document(html);
    let (Ok(form_sel), Ok(control_sel), Ok(option_sel)) = (
        Selector::parse("form"),
        Selector::parse("a, button, input, select, textarea"),
        Selector::parse("option"),
    ) else {
        return (Vec::new(), Vec::new(), Vec::new());
    };

    let form_refs: Vec<ElementRef<'_>> = document.select(&form_sel).collect();
    let forms = form_refs
        .iter()
        .map(|f| Form {
            action: f
                .value()
                .attr("action")
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            method: f
                .value()
                .attr("method")
                .unwrap_or("get")
                .to_ascii_uppercase(),
        })
        .collect();

    let mut elements = Vec::new();
    let mut controls = Vec::new();
    for (id, el) in document.select(&control_sel).enumerate() {
        let tag = el.value().name().to_ascii_lowercase();
        let attrs: Vec<(String, String)> = el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();
        let text = collapse_whitespace(&el.text().collect::<String>());

        let form = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find_map(|a| form_refs.iter().position(|f| *f == a));

        let default_value = match tag.as_str() {
            "textarea" => Some(el.text().collect::<String>()),
            "select" => {
                let options: Vec<ElementRef<'_>> = el.select(&option_sel).collect();
                options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| options.first())
                    .map(|o| match o.value().attr("value") {
                        Some(v) => v.to_string(),
                        None => collapse_whitespace(&o.text().collect::<String>()),
                    })
            }
            _ => el.value().attr("value").map(str::to_string),
        };

        elements.push(ElementInfo {
            id,
            tag,
            attrs,
            text,
        });
        controls.push(Control {
            form,
            default_value,
        });
    }

    (elements, controls, forms)
}

static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\*?=(?:[\w-]+'[\w-]*')?"?([^";]+)"?"#).expect("valid regex")
});

/// Reads `filename=` (or the RFC 5987 `filename*=` form) from a
/// `Content-Disposition` header.
fn disposition_file_name(header: &str) -> Option<String> {
    FILENAME_RE
        .captures(header)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ScraperError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

fn is_submitter(el: &ElementInfo) -> bool {
    matches!(el.tag.as_str(), "input" | "button")
        && matches!(el.effective_type().as_deref(), Some("submit" | "image"))
}

impl HttpBrowser {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            page: None,
            fills: HashMap::new(),
            download: None,
        })
    }

    fn page(&self) -> Result<&Page, ScraperError> {
        self.page.as_ref().ok_or(ScraperError::NoPage)
    }

    fn element(&self, id: usize) -> Result<(&ElementInfo, &Control), ScraperError> {
        let page = self.page()?;
        match (page.elements.get(id), page.controls.get(id)) {
            (Some(el), Some(control)) => Ok((el, control)),
            _ => Err(ScraperError::UnknownElement(id)),
        }
    }

    /// Takes a response and either renders it as the new page or keeps it
    /// as a download. Error pages in HTML are rendered (a failed login shows
    /// its form again); any other non-2xx body is an error, never a download.
    async fn absorb(&mut self, response: reqwest::Response) -> Result<(), ScraperError> {
        let url = response.url().clone();
        let status = response.status();
        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(reqwest::header::CONTENT_TYPE);
        let disposition = header(reqwest::header::CONTENT_DISPOSITION);
        let bytes = response.bytes().await?.to_vec();

        let attachment = disposition
            .as_deref()
            .is_some_and(|d| d.to_ascii_lowercase().starts_with("attachment"));
        let html = match content_type.as_deref() {
            Some(ct) => ct.to_ascii_lowercase().contains("html"),
            None => String::from_utf8_lossy(&bytes).trim_start().starts_with('<'),
        };

        if !status.is_success() && (!html || attachment) {
            tracing::warn!(url = %url, status = status.as_u16(), "non-page error response");
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if html && !attachment {
            tracing::debug!(url = %url, status = status.as_u16(), "page loaded");
            let body = String::from_utf8_lossy(&bytes).into_owned();
            self.page = Some(Page::parse(url, body));
            self.fills.clear();
        } else {
            let file_name = disposition
                .as_deref()
                .and_then(disposition_file_name)
                .or_else(|| {
                    url.path_segments()
                        .and_then(|mut s| s.next_back())
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                });
            tracing::info!(
                url = %url,
                bytes = bytes.len(),
                file_name = file_name.as_deref().unwrap_or(""),
                "download captured"
            );
            self.download = Some(Download {
                file_name,
                content_type,
                bytes,
            });
        }
        Ok(())
    }

    async fn submit_form(
        &mut self,
        form_index: usize,
        submitter: Option<usize>,
    ) -> Result<(), ScraperError> {
        let page = self.page()?;
        let form = page
            .forms
            .get(form_index)
            .ok_or(ScraperError::UnknownElement(form_index))?;

        let mut pairs: Vec<(String, String)> = Vec::new();
        for (el, control) in page.elements.iter().zip(&page.controls) {
            if control.form != Some(form_index) {
                continue;
            }
            let Some(name) = el.attr("name").filter(|n| !n.is_empty()) else {
                continue;
            };
            if el.attr("disabled").is_some() {
                continue;
            }
            let filled = self.fills.get(&el.id).cloned();
            let value = match (el.tag.as_str(), el.effective_type().as_deref()) {
                ("a", _) => continue,
                ("button", _) | ("input", Some("submit" | "image" | "button" | "reset")) => {
                    if submitter != Some(el.id) {
                        continue;
                    }
                    control.default_value.clone().unwrap_or_default()
                }
                ("input", Some("checkbox" | "radio")) => {
                    if filled.is_none() && el.attr("checked").is_none() {
                        continue;
                    }
                    control
                        .default_value
                        .clone()
                        .unwrap_or_else(|| "on".to_string())
                }
                ("input", Some("file")) => continue,
                _ => filled
                    .or_else(|| control.default_value.clone())
                    .unwrap_or_default(),
            };
            pairs.push((name.to_string(), value));
        }

        let mut target = match &form.action {
            Some(action) => page.resolve(action)?,
            None => page.url.clone(),
        };
        let method = form.method.clone();
        let field_names: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        tracing::debug!(url = %target, method = %method, fields = ?field_names, "submitting form");

        let request = if method == "POST" {
            self.client.post(target).form(&pairs)
        } else {
            target.query_pairs_mut().clear().extend_pairs(&pairs);
            self.client.get(target)
        };
        let response = request.send().await?;
        self.absorb(response).await
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError> {
        let target = Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let response = ensure_success(self.client.get(target).send().await?)?;
        self.absorb(response).await
    }

    fn current_url(&self) -> Option<String> {
        self.page.as_ref().map(|p| p.url.to_string())
    }

    fn elements(&self) -> Vec<ElementInfo> {
        self.page
            .as_ref()
            .map(|p| p.elements.clone())
            .unwrap_or_default()
    }

    async fn fill(&mut self, element: usize, text: &str) -> Result<(), ScraperError> {
        self.element(element)?;
        self.fills.insert(element, text.to_string());
        Ok(())
    }

    async fn click(&mut self, element: usize) -> Result<(), ScraperError> {
        let (el, control) = self.element(element)?;
        let form = control.form;
        let submits = is_submitter(el);
        let tag = el.tag.clone();
        let href = el
            .attr("href")
            .map(str::trim)
            .filter(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"))
            .map(str::to_string);

        if tag == "a" {
            let Some(href) = href else {
                tracing::debug!(element, "link has no navigable href");
                return Ok(());
            };
            let target = self.page()?.resolve(&href)?;
            let response = ensure_success(self.client.get(target).send().await?)?;
            return self.absorb(response).await;
        }

        match form {
            Some(form) if submits => self.submit_form(form, Some(element)).await,
            _ => {
                tracing::debug!(element, tag = %tag, "control has no HTTP behaviour");
                Ok(())
            }
        }
    }

    async fn press_enter(&mut self, element: usize) -> Result<(), ScraperError> {
        let (_, control) = self.element(element)?;
        let Some(form) = control.form else {
            tracing::debug!(element, "enter pressed outside a form");
            return Ok(());
        };
        // implicit submission uses the form's first submit button
        let page = self.page()?;
        let submitter = page
            .elements
            .iter()
            .zip(&page.controls)
            .find(|(el, c)| c.form == Some(form) && is_submitter(el))
            .map(|(el, _)| el.id);
        self.submit_form(form, submitter).await
    }

    fn tables(&self) -> Vec<RawTable> {
        self.page
            .as_ref()
            .map(|p| tables_from_html(&p.html))
            .unwrap_or_default()
    }

    async fn screenshot(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn page_source(&self) -> String {
        self.page
            .as_ref()
            .map(|p| p.html.clone())
            .unwrap_or_default()
    }

    async fn take_download(&mut self, _timeout: Duration) -> Option<Download> {
        // responses are complete when the triggering action returns
        self.download.take()
    }

    async fn wait_for(&mut self, chain: &[Locator], _timeout: Duration) -> Option<ElementInfo> {
        find_first(chain, &self.elements()).cloned()
    }

    async fn close(&mut self) {
        self.page = None;
        self.fills.clear();
        self.download = None;
    }
}
