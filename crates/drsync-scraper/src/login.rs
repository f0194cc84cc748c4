//! Finds and submits the login form on whatever page the browser is on.

use std::time::Duration;

use scraper::Html;

use crate::browser::Browser;
use crate::error::ScraperError;
use crate::locate::{
    contains_ci, find_first, find_first_except, LOGOUT_CHAIN, PASSWORD_CHAIN, PASSWORD_SIGNAL,
    SUBMIT_CHAIN, USERNAME_CHAIN,
};

const FIELD_WAIT: Duration = Duration::from_secs(5);

const LOGOUT_TEXT: [&str; 3] = ["log out", "logout", "sign out"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// No password field on the page.
    AlreadyAuthenticated,
    Authenticated,
    /// The form was submitted but the page still looks logged out.
    Rejected,
    /// A login form is present but the named field could not be located.
    FieldsNotFound { missing: &'static str },
}

impl LoginOutcome {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            LoginOutcome::AlreadyAuthenticated | LoginOutcome::Authenticated
        )
    }
}

/// Rendered text of `html`: text nodes outside `script`, `style`,
/// `noscript` and `template`. Attribute values never appear.
fn visible_text(html: &str) -> String {
    const HIDDEN: [&str; 4] = ["script", "style", "noscript", "template"];
    let document = Html::parse_document(html);
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text: &str = node.value().as_text()?;
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|el| HIDDEN.contains(&el.name()))
            });
            (!hidden).then(|| text.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Logged-in means the password field is gone or a logout control or text
/// is visible. False positives are possible.
fn looks_logged_in<B: Browser + ?Sized>(browser: &B) -> bool {
    let elements = browser.elements();
    if find_first(PASSWORD_SIGNAL, &elements).is_none() {
        return true;
    }
    if find_first(LOGOUT_CHAIN, &elements).is_some() {
        return true;
    }
    let text = visible_text(&browser.page_source());
    LOGOUT_TEXT.iter().any(|t| contains_ci(&text, t))
}

/// Fills and submits the login form on the current page.
///
/// # Errors
///
/// Returns the driver's error if filling, clicking or submitting fails.
/// Heuristic misses are reported through [`LoginOutcome`], not errors.
pub async fn resolve_login<B: Browser + ?Sized>(
    browser: &mut B,
    username: &str,
    password: &str,
) -> Result<LoginOutcome, ScraperError> {
    let elements = browser.elements();
    if find_first(PASSWORD_SIGNAL, &elements).is_none() {
        tracing::debug!(
            url = browser.current_url().as_deref().unwrap_or(""),
            "no password field, treating session as authenticated"
        );
        return Ok(LoginOutcome::AlreadyAuthenticated);
    }

    let Some(password_el) = browser.wait_for(PASSWORD_CHAIN, FIELD_WAIT).await else {
        return Ok(LoginOutcome::FieldsNotFound { missing: "password" });
    };
    let elements = browser.elements();
    let Some(username_el) = find_first_except(USERNAME_CHAIN, &elements, &[password_el.id]).cloned()
    else {
        return Ok(LoginOutcome::FieldsNotFound { missing: "username" });
    };

    browser.fill(username_el.id, username).await?;
    browser.fill(password_el.id, password).await?;

    match find_first(SUBMIT_CHAIN, &elements) {
        Some(submit) => {
            tracing::debug!(caption = submit.caption(), "clicking submit control");
            browser.click(submit.id).await?;
        }
        None => {
            tracing::debug!("no submit control, pressing enter on password field");
            browser.press_enter(password_el.id).await?;
        }
    }
    browser.settle().await;

    if looks_logged_in(browser) {
        Ok(LoginOutcome::Authenticated)
    } else {
        Ok(LoginOutcome::Rejected)
    }
}

#[cfg(test)]
#[path = "login_test.rs"]
mod tests;
