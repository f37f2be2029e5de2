use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

use crate::config::MatchColumns;
use crate::page::{PageQuery, element_text, find_date, find_time, spaced_text};

static RANK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*(\d+)\s*\.?\s*\)").expect("valid rank regex"));
static SCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*:\s*(\d+)$").expect("valid score regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRef {
    pub name: String,
    pub rank: Option<i32>,
}

/// Splits `"Lugano(5.)"` into name and rank. Text without a rank keeps its full name.
pub fn split_team_rank(raw: &str) -> TeamRef {
    let rank = RANK_RE
        .captures(raw)
        .and_then(|c| c[1].parse::<i32>().ok());
    let name = RANK_RE.replace_all(raw, "").trim().to_string();
    TeamRef { name, rank }
}

/// Parses a `"2:1"` result cell. Anything else (e.g. "-:-", "20:30" kickoff) is `None`
/// unless it is a plain pair of counts.
pub fn parse_result(raw: &str) -> Option<(i32, i32)> {
    let caps = SCORE_RE.captures(raw.trim())?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// One data row joined with the date/time of the header above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub row_index: usize,
    pub date: Option<String>,
    pub time: Option<String>,
    pub home: TeamRef,
    pub away: TeamRef,
    pub result: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchScan {
    pub matches: Vec<RawMatch>,
    pub headers: usize,
    /// (row index, cell count) of data rows too short to read.
    pub skipped: Vec<(usize, usize)>,
}

impl MatchScan {
    /// Earliest header date seen, by calendar order.
    pub fn earliest_date(&self) -> Option<chrono::NaiveDate> {
        self.matches
            .iter()
            .filter_map(|m| m.date.as_deref().and_then(crate::page::parse_date))
            .min()
    }
}

/// Stateful scan over the results block. Header rows set the current date and
/// time; data rows inherit whatever was last set.
pub struct MatchParser<'q> {
    query: &'q PageQuery,
    columns: &'q MatchColumns,
    current_date: Option<String>,
    current_time: Option<String>,
}

impl<'q> MatchParser<'q> {
    pub fn new(query: &'q PageQuery, columns: &'q MatchColumns) -> Self {
        Self {
            query,
            columns,
            current_date: None,
            current_time: None,
        }
    }

    pub fn scan(mut self, rows: &[ElementRef<'_>]) -> MatchScan {
        let mut out = MatchScan::default();
        for (row_index, row) in rows.iter().enumerate() {
            if self.query.is_header_row(*row) {
                self.apply_header(*row);
                out.headers += 1;
                continue;
            }
            match self.data_row(row_index, *row) {
                Ok(m) => out.matches.push(m),
                Err(cells) => out.skipped.push((row_index, cells)),
            }
        }
        out
    }

    fn apply_header(&mut self, row: ElementRef<'_>) {
        let text = spaced_text(row);
        if let Some(date) = find_date(&text) {
            self.current_date = Some(date);
        }
        if let Some(time) = find_time(&text) {
            self.current_time = Some(time);
        }
    }

    fn data_row(&self, row_index: usize, row: ElementRef<'_>) -> Result<RawMatch, usize> {
        let cells = row.select(&self.query.cells).collect::<Vec<_>>();
        let cols = self.columns;
        let needed = (cols.home.max(cols.result).max(cols.away) + 1).max(cols.min_cells);
        if cells.len() < needed {
            return Err(cells.len());
        }
        Ok(RawMatch {
            row_index,
            date: self.current_date.clone(),
            time: self.current_time.clone(),
            home: split_team_rank(&element_text(cells[cols.home])),
            away: split_team_rank(&element_text(cells[cols.away])),
            result: element_text(cells[cols.result]),
        })
    }
}
