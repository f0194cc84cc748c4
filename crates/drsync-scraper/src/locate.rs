//! Element discovery as data.
//!
//! Every "find the username box" style lookup is a ranked slice of
//! [`Locator`] predicates evaluated over plain [`ElementInfo`] descriptions.
//! The first predicate with any match wins, and within a predicate the first
//! element in document order wins. Nothing here talks to a browser, so the
//! chains are tested against hand-built element lists.

use serde::Serialize;

/// Driver-independent description of one interactive element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementInfo {
    /// Opaque handle the driver understands.
    pub id: usize,
    /// Lowercase tag name.
    pub tag: String,
    /// Attribute pairs, names lowercased.
    pub attrs: Vec<(String, String)>,
    /// Whitespace-collapsed inner text.
    pub text: String,
}

impl ElementInfo {
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `type` as the browser would report it: inputs default to `text`,
    /// buttons to `submit`, everything else has none.
    #[must_use]
    pub fn effective_type(&self) -> Option<String> {
        let explicit = self.attr("type").map(str::to_ascii_lowercase);
        match self.tag.as_str() {
            "input" => Some(explicit.unwrap_or_else(|| "text".to_string())),
            "button" => Some(explicit.unwrap_or_else(|| "submit".to_string())),
            _ => explicit,
        }
    }

    /// Visible caption: inner text, falling back to `value` for input buttons.
    #[must_use]
    pub fn caption(&self) -> &str {
        if self.text.is_empty() {
            self.attr("value").unwrap_or_default()
        } else {
            &self.text
        }
    }

    fn is_text_entry(&self) -> bool {
        self.tag == "input"
            && matches!(
                self.effective_type().as_deref(),
                Some("text" | "date" | "search" | "datetime-local")
            )
    }

    fn is_clickable(&self) -> bool {
        match self.tag.as_str() {
            "a" | "button" => true,
            "input" => matches!(
                self.effective_type().as_deref(),
                Some("submit" | "button" | "image")
            ),
            _ => self.attr("role") == Some("button"),
        }
    }
}

/// One predicate over an [`ElementInfo`]. String comparisons are ASCII
/// case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// `placeholder` equals the value.
    Placeholder(&'static str),
    /// `name` equals the value.
    Name(&'static str),
    /// `id` equals the value.
    Id(&'static str),
    /// Effective `type` of an `input` or `button` equals the value.
    InputType(&'static str),
    /// A clickable element whose caption contains the value.
    Caption(&'static str),
    /// `name`, `id` or `placeholder` of a text or date input contains the value.
    Hint(&'static str),
}

impl Locator {
    #[must_use]
    pub fn matches(self, el: &ElementInfo) -> bool {
        match self {
            Locator::Placeholder(v) => attr_eq(el, "placeholder", v),
            Locator::Name(v) => attr_eq(el, "name", v),
            Locator::Id(v) => attr_eq(el, "id", v),
            Locator::InputType(v) => {
                matches!(el.tag.as_str(), "input" | "button")
                    && el
                        .effective_type()
                        .is_some_and(|t| t.eq_ignore_ascii_case(v))
            }
            Locator::Caption(v) => el.is_clickable() && contains_ci(el.caption(), v),
            Locator::Hint(v) => {
                el.is_text_entry()
                    && ["name", "id", "placeholder"]
                        .iter()
                        .any(|a| el.attr(a).is_some_and(|s| contains_ci(s, v)))
            }
        }
    }
}

fn attr_eq(el: &ElementInfo, attr: &str, expected: &str) -> bool {
    el.attr(attr).is_some_and(|v| v.eq_ignore_ascii_case(expected))
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

/// Returns the first element matched by the highest-ranked predicate that
/// matches anything.
#[must_use]
pub fn find_first<'a>(chain: &[Locator], elements: &'a [ElementInfo]) -> Option<&'a ElementInfo> {
    chain
        .iter()
        .find_map(|loc| elements.iter().find(|el| loc.matches(el)))
}

/// Like [`find_first`] but skips elements whose handle is in `exclude`.
#[must_use]
pub fn find_first_except<'a>(
    chain: &[Locator],
    elements: &'a [ElementInfo],
    exclude: &[usize],
) -> Option<&'a ElementInfo> {
    chain.iter().find_map(|loc| {
        elements
            .iter()
            .find(|el| !exclude.contains(&el.id) && loc.matches(el))
    })
}

pub const USERNAME_CHAIN: &[Locator] = &[
    Locator::Placeholder("Username"),
    Locator::Name("username"),
    Locator::Id("username"),
    Locator::InputType("text"),
    Locator::InputType("email"),
];

pub const PASSWORD_CHAIN: &[Locator] = &[
    Locator::Placeholder("Password"),
    Locator::Name("password"),
    Locator::Id("password"),
    Locator::InputType("password"),
];

/// The only signal that a login form is on the page.
pub const PASSWORD_SIGNAL: &[Locator] = &[Locator::InputType("password")];

pub const SUBMIT_CHAIN: &[Locator] = &[
    Locator::Caption("Sign in"),
    Locator::Caption("Sign"),
    Locator::Caption("Log"),
    Locator::InputType("submit"),
    Locator::InputType("image"),
];

pub const LOGOUT_CHAIN: &[Locator] = &[
    Locator::Caption("Log out"),
    Locator::Caption("Logout"),
    Locator::Caption("Sign out"),
];

pub const START_DATE_CHAIN: &[Locator] = &[
    Locator::Name("start_date"),
    Locator::Id("start_date"),
    Locator::Hint("start"),
    Locator::Hint("from"),
    Locator::InputType("date"),
];

pub const END_DATE_CHAIN: &[Locator] = &[
    Locator::Name("end_date"),
    Locator::Id("end_date"),
    Locator::Hint("date_to"),
    Locator::Hint("to_date"),
    Locator::Hint("end"),
    Locator::InputType("date"),
];

pub const APPLY_FILTER_CHAIN: &[Locator] = &[
    Locator::Caption("Filter"),
    Locator::Caption("Apply"),
    Locator::Caption("Search"),
    Locator::Caption("Go"),
];

pub const DAILY_VIEW_CHAIN: &[Locator] = &[Locator::Caption("Daily")];

pub const CSV_EXPORT_CHAIN: &[Locator] = &[
    Locator::Caption("CSV"),
    Locator::Caption("Export"),
    Locator::Caption("Download"),
];
