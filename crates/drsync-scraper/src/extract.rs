//! Picks the page table most likely to hold order records and turns it into
//! labelled rows.

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

/// Lowercase keywords a header must contain to count towards a table's score.
pub const SCHEMA_KEYWORDS: [&str; 6] = ["customer", "address", "phone", "size", "order", "status"];

/// A table as read from the DOM, before any header inference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Explicit header cells (`<thead>` or an all-`<th>` first row).
    pub header_cells: Vec<String>,
    /// Body rows, cell text as found.
    pub rows: Vec<Vec<String>>,
}

/// One table row keyed by column label, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawRow {
    pub cells: Vec<(String, String)>,
}

impl RawRow {
    /// Value under `label`, compared ASCII case-insensitively.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(label))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the `index`-th column, 1-based.
    #[must_use]
    pub fn positional(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.cells.get(i))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.cells
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl ExtractedTable {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Collapses runs of whitespace (including non-breaking spaces) and trims.
#[must_use]
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn cell_text(el: &ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// True when the closest `<table>` above `el` is `table` itself, so cells of
/// nested tables are not read twice.
fn owned_by(el: &ElementRef<'_>, table: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
        .is_some_and(|nearest| nearest == *table)
}

/// Reads every `<table>` in `html`, in document order. Each table only sees
/// its own rows and cells.
#[must_use]
pub fn tables_from_html(html: &str) -> Vec<RawTable> {
    let document = Html::parse_document(html);
    let (Some(table_sel), Some(thead_sel), Some(tr_sel), Some(cell_sel)) = (
        selector("table"),
        selector("thead th, thead td"),
        selector("tr"),
        selector("th, td"),
    ) else {
        return Vec::new();
    };

    document
        .select(&table_sel)
        .map(|table| {
            let mut header_cells: Vec<String> = table
                .select(&thead_sel)
                .filter(|c| owned_by(c, &table))
                .map(|c| cell_text(&c))
                .collect();
            let mut rows = Vec::new();

            for tr in table.select(&tr_sel).filter(|tr| owned_by(tr, &table)) {
                let in_thead = tr
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .take_while(|a| *a != table)
                    .any(|a| a.value().name() == "thead");
                if in_thead {
                    continue;
                }
                let cells: Vec<ElementRef<'_>> = tr
                    .select(&cell_sel)
                    .filter(|c| owned_by(c, &table))
                    .collect();
                if cells.is_empty() {
                    continue;
                }
                let all_th = cells.iter().all(|c| c.value().name() == "th");
                if header_cells.is_empty() && rows.is_empty() && all_th {
                    header_cells = cells.iter().map(cell_text).collect();
                    continue;
                }
                rows.push(cells.iter().map(cell_text).collect());
            }

            RawTable { header_cells, rows }
        })
        .collect()
}

fn has_keyword(cell: &str) -> bool {
    let lower = cell.to_lowercase();
    SCHEMA_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// At least half of the non-empty cells, and at least one, carry a keyword.
fn looks_like_header(row: &[String]) -> bool {
    let non_empty: Vec<&String> = row.iter().filter(|c| !c.is_empty()).collect();
    let hits = non_empty.iter().filter(|c| has_keyword(c)).count();
    hits > 0 && hits * 2 >= non_empty.len()
}

/// Uppercases the first letter of each word and lowercases the rest.
#[must_use]
pub fn title_case(label: &str) -> String {
    label
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

struct Candidate {
    headers: Vec<String>,
    rows: Vec<RawRow>,
    score: usize,
}

fn label_for(headers: &[String], index: usize) -> String {
    headers
        .get(index)
        .filter(|h| !h.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("col{}", index + 1))
}

fn build_candidate(table: &RawTable) -> Candidate {
    let clean = |cells: &[String]| -> Vec<String> {
        cells.iter().map(|c| collapse_whitespace(c)).collect()
    };

    let mut body: Vec<Vec<String>> = table.rows.iter().map(|r| clean(r.as_slice())).collect();
    let explicit = clean(table.header_cells.as_slice());

    let headers: Vec<String> = if explicit.iter().any(|h| !h.is_empty()) {
        explicit.iter().map(|h| title_case(h)).collect()
    } else if body.first().is_some_and(|first| looks_like_header(first)) {
        let first = body.remove(0);
        first.iter().map(|h| title_case(h)).collect()
    } else {
        let width = body.iter().map(Vec::len).max().unwrap_or(0);
        (1..=width).map(|i| format!("col{i}")).collect()
    };

    let headers: Vec<String> = (0..headers.len()).map(|i| label_for(&headers, i)).collect();

    let rows: Vec<RawRow> = body
        .into_iter()
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .map(|cells| RawRow {
            cells: cells
                .into_iter()
                .enumerate()
                .map(|(i, v)| (label_for(&headers, i), v))
                .collect(),
        })
        .collect();

    let score = headers.iter().filter(|h| has_keyword(h)).count();
    Candidate {
        headers,
        rows,
        score,
    }
}

/// Scores every table and returns the best one, or an empty result when the
/// page has no tables or the winner has no data rows.
#[must_use]
pub fn extract_best_table(tables: &[RawTable]) -> ExtractedTable {
    let mut candidates: Vec<Candidate> = tables.iter().map(build_candidate).collect();
    // stable: equal keys keep DOM order
    candidates.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.rows.len().cmp(&a.rows.len()))
    });

    match candidates.into_iter().next() {
        Some(best) if !best.rows.is_empty() => {
            tracing::debug!(
                score = best.score,
                rows = best.rows.len(),
                headers = ?best.headers,
                "selected order table"
            );
            ExtractedTable {
                headers: best.headers,
                rows: best.rows,
            }
        }
        _ => ExtractedTable::default(),
    }
}

/// Convenience wrapper: parse `html` and extract in one step.
#[must_use]
pub fn extract_from_html(html: &str) -> ExtractedTable {
    extract_best_table(&tables_from_html(html))
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
