//! Locates the standings table, the results block and the page date in a
//! rendered matchday page.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::PageSelectors;
use crate::error::ConfigError;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}\.\d{2}\.\d{4})").expect("valid date regex"));
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}:\d{2})").expect("valid time regex"));

pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Parsed form of [`PageSelectors`].
#[derive(Debug, Clone)]
pub struct PageQuery {
    standings_table: Selector,
    standings_rows: Selector,
    results_block: Selector,
    results_rows: Selector,
    pub(crate) cells: Selector,
    date_links: Selector,
    pub(crate) link: Selector,
    pub(crate) header_class: String,
}

impl PageQuery {
    pub fn new(selectors: &PageSelectors) -> Result<Self, ConfigError> {
        Ok(Self {
            standings_table: compile(&selectors.standings_table)?,
            standings_rows: compile(&selectors.standings_rows)?,
            results_block: compile(&selectors.results_block)?,
            results_rows: compile(&selectors.results_rows)?,
            cells: compile(&selectors.cells)?,
            date_links: compile(&selectors.date_links)?,
            link: compile("a")?,
            header_class: selectors.header_class.clone(),
        })
    }

    /// Body rows of the first standings table, empty if the table is absent.
    pub fn standings_rows<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&self.standings_table)
            .next()
            .map(|table| table.select(&self.standings_rows).collect())
            .unwrap_or_default()
    }

    /// Rows of the first results block, header rows included, in page order.
    pub fn results_rows<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&self.results_block)
            .next()
            .map(|block| block.select(&self.results_rows).collect())
            .unwrap_or_default()
    }

    /// First `dd.mm.yyyy` date carried by a date link on the page.
    pub fn linked_date(&self, doc: &Html) -> Option<NaiveDate> {
        doc.select(&self.date_links)
            .filter_map(|a| {
                let text = element_text(a);
                DATE_RE
                    .find(&text)
                    .filter(|m| m.start() == 0)
                    .and_then(|m| parse_date(m.as_str()))
            })
            .next()
    }

    pub fn is_header_row(&self, row: ElementRef<'_>) -> bool {
        row.value().classes().any(|c| c == self.header_class)
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|err| ConfigError::Selector {
        selector: selector.to_string(),
        reason: format!("{err:?}"),
    })
}

/// Whitespace-trimmed text of an element, text nodes joined without separator.
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Text nodes joined by single spaces, for pattern matching over a whole row.
pub fn spaced_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn find_date(text: &str) -> Option<String> {
    DATE_RE.captures(text).map(|c| c[1].to_string())
}

pub fn find_time(text: &str) -> Option<String> {
    TIME_RE.captures(text).map(|c| c[1].to_string())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}
