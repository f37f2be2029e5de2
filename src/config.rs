use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CACHE_DIR: &str = "league_ingest";
const DB_FILE: &str = "league.sqlite";

pub const DEFAULT_URL_TEMPLATE: &str = "https://www.transfermarkt.ch/super-league/spieltagtabelle/wettbewerb/C1?saison_id={season}&spieltag={matchday}";
pub const DEFAULT_SEASON_LENGTH: u32 = 38;
pub const DEFAULT_POINTS_PER_GAME: f64 = 1.2;
const DEFAULT_SEASONS: &[u32] = &[2023, 2024];
const DEFAULT_RELEGATION_RANKS: &[i32] = &[11, 12];
const MAX_WORKERS: usize = 16;

/// CSS selectors locating the two tables and the date links on a matchday page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSelectors {
    pub standings_table: String,
    pub standings_rows: String,
    pub results_block: String,
    pub results_rows: String,
    pub cells: String,
    pub date_links: String,
    /// Class flagging a header row in the results block.
    pub header_class: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            standings_table: "table.items".to_string(),
            standings_rows: "tbody > tr".to_string(),
            results_block: "div.responsive-table table".to_string(),
            results_rows: "tbody > tr".to_string(),
            cells: "td".to_string(),
            date_links: "a[href*=\"datum\"]".to_string(),
            header_class: "bg_blau_20".to_string(),
        }
    }
}

/// Cell index of each standings field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandingsColumns {
    pub rank: usize,
    pub team: usize,
    pub played: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub goals: usize,
    pub goal_diff: usize,
    pub points: usize,
    pub min_cells: usize,
}

impl Default for StandingsColumns {
    fn default() -> Self {
        Self {
            rank: 0,
            team: 2,
            played: 3,
            wins: 4,
            draws: 5,
            losses: 6,
            goals: 7,
            goal_diff: 8,
            points: 9,
            min_cells: 10,
        }
    }
}

/// Cell index of each field in a results data row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchColumns {
    pub home: usize,
    pub result: usize,
    pub away: usize,
    pub min_cells: usize,
}

impl Default for MatchColumns {
    fn default() -> Self {
        Self {
            home: 3,
            result: 6,
            away: 8,
            min_cells: 11,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLayout {
    pub selectors: PageSelectors,
    pub standings_columns: StandingsColumns,
    pub match_columns: MatchColumns,
}

impl PageLayout {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Layout {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|err| ConfigError::Layout {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub webdriver_url: Option<String>,
    pub user_agent: String,
    /// Substring whose presence marks the rendered page as complete.
    pub ready_marker: Option<String>,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36".to_string(),
            ready_marker: Some("responsive-table".to_string()),
            settle_delay: Duration::from_millis(5000),
            poll_interval: Duration::from_millis(250),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub seasons: Vec<u32>,
    pub matchdays: RangeInclusive<u32>,
    pub season_length: u32,
    pub points_per_game: f64,
    pub url_template: String,
    pub db_path: Option<PathBuf>,
    pub layout: PageLayout,
    pub fetch: FetchConfig,
    pub workers: usize,
    pub politeness_delay: Duration,
    pub relegation_ranks: Vec<i32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seasons: DEFAULT_SEASONS.to_vec(),
            matchdays: 1..=DEFAULT_SEASON_LENGTH,
            season_length: DEFAULT_SEASON_LENGTH,
            points_per_game: DEFAULT_POINTS_PER_GAME,
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            db_path: None,
            layout: PageLayout::default(),
            fetch: FetchConfig::default(),
            workers: 1,
            politeness_delay: Duration::from_millis(1000),
            relegation_ranks: DEFAULT_RELEGATION_RANKS.to_vec(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(raw) = get("LEAGUE_SEASONS") {
            cfg.seasons = parse_list("LEAGUE_SEASONS", &raw)?;
        }
        if let Some(raw) = get("LEAGUE_SEASON_LENGTH") {
            cfg.season_length = parse_value("LEAGUE_SEASON_LENGTH", &raw)?;
            cfg.matchdays = 1..=cfg.season_length;
        }
        if let Some(raw) = get("LEAGUE_MATCHDAYS") {
            cfg.matchdays = parse_range("LEAGUE_MATCHDAYS", &raw)?;
        }
        if let Some(raw) = get("LEAGUE_POINTS_PER_GAME") {
            cfg.points_per_game = parse_value("LEAGUE_POINTS_PER_GAME", &raw)?;
        }
        if let Some(raw) = get("LEAGUE_URL_TEMPLATE") {
            cfg.url_template = raw.trim().to_string();
        }
        if let Some(raw) = get("LEAGUE_DB") {
            cfg.db_path = Some(PathBuf::from(raw.trim()));
        }
        if let Some(raw) = get("LEAGUE_WEBDRIVER_URL") {
            cfg.fetch.webdriver_url = Some(raw.trim().trim_end_matches('/').to_string());
        }
        if let Some(raw) = lookup("LEAGUE_READY_MARKER") {
            // An explicitly blank marker switches to the fixed settle delay.
            let marker = raw.trim();
            cfg.fetch.ready_marker = (!marker.is_empty()).then(|| marker.to_string());
        }
        if let Some(raw) = get("LEAGUE_SETTLE_MS") {
            cfg.fetch.settle_delay = Duration::from_millis(parse_value("LEAGUE_SETTLE_MS", &raw)?);
        }
        if let Some(raw) = get("LEAGUE_TIMEOUT_SECS") {
            cfg.fetch.timeout = Duration::from_secs(parse_value("LEAGUE_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = get("LEAGUE_WORKERS") {
            let workers: usize = parse_value("LEAGUE_WORKERS", &raw)?;
            cfg.workers = workers.clamp(1, MAX_WORKERS);
        }
        if let Some(raw) = get("LEAGUE_POLITENESS_MS") {
            cfg.politeness_delay =
                Duration::from_millis(parse_value("LEAGUE_POLITENESS_MS", &raw)?);
        }
        if let Some(raw) = get("LEAGUE_RELEGATION_RANKS") {
            cfg.relegation_ranks = parse_list("LEAGUE_RELEGATION_RANKS", &raw)?;
        }
        if let Some(raw) = get("LEAGUE_LAYOUT") {
            cfg.layout = PageLayout::load(Path::new(raw.trim()))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seasons.is_empty() {
            return Err(ConfigError::NoSeasons);
        }
        let (start, end) = (*self.matchdays.start(), *self.matchdays.end());
        if start == 0 || start > end || end > self.season_length {
            return Err(ConfigError::MatchdayRange {
                start,
                end,
                season_length: self.season_length,
            });
        }
        Ok(())
    }

    pub fn matchday_url(&self, season: u32, matchday: u32) -> String {
        self.url_template
            .replace("{season}", &season.to_string())
            .replace("{matchday}", &matchday.to_string())
    }

    pub fn resolved_db_path(&self) -> Option<PathBuf> {
        self.db_path.clone().or_else(default_db_path)
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

/// Parses "2023,2024" style lists; also accepts `;` and spaces as separators.
pub fn parse_list<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<Vec<T>, ConfigError> {
    let mut out = Vec::new();
    for part in raw.split([',', ';', ' ']).map(str::trim).filter(|p| !p.is_empty()) {
        out.push(parse_value(key, part)?);
    }
    Ok(out)
}

/// Parses "30" or "1-38" into an inclusive range.
pub fn parse_range(key: &'static str, raw: &str) -> Result<RangeInclusive<u32>, ConfigError> {
    let raw = raw.trim();
    match raw.split_once('-') {
        Some((start, end)) => Ok(parse_value(key, start)?..=parse_value(key, end)?),
        None => {
            let day = parse_value(key, raw)?;
            Ok(day..=day)
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_env_empty() {
        let cfg = PipelineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.seasons, vec![2023, 2024]);
        assert_eq!(cfg.matchdays, 1..=38);
        assert_eq!(cfg.workers, 1);
        assert_eq!(cfg.relegation_ranks, vec![11, 12]);
        assert_eq!(cfg.layout.standings_columns.min_cells, 10);
    }

    #[test]
    fn reads_overrides() {
        let cfg = PipelineConfig::from_lookup(lookup(&[
            ("LEAGUE_SEASONS", "2022; 2023"),
            ("LEAGUE_MATCHDAYS", "30-33"),
            ("LEAGUE_WORKERS", "99"),
            ("LEAGUE_READY_MARKER", " "),
            ("LEAGUE_WEBDRIVER_URL", "http://localhost:9515/"),
        ]))
        .unwrap();
        assert_eq!(cfg.seasons, vec![2022, 2023]);
        assert_eq!(cfg.matchdays, 30..=33);
        assert_eq!(cfg.workers, MAX_WORKERS);
        assert_eq!(cfg.fetch.ready_marker, None);
        assert_eq!(
            cfg.fetch.webdriver_url.as_deref(),
            Some("http://localhost:9515")
        );
    }

    #[test]
    fn rejects_matchday_past_season_length() {
        let err = PipelineConfig::from_lookup(lookup(&[
            ("LEAGUE_SEASON_LENGTH", "36"),
            ("LEAGUE_MATCHDAYS", "1-38"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MatchdayRange { end: 38, .. }));

        let err = PipelineConfig::from_lookup(lookup(&[("LEAGUE_MATCHDAYS", "0-3")])).unwrap_err();
        assert!(matches!(err, ConfigError::MatchdayRange { start: 0, .. }));
    }

    #[test]
    fn rejects_garbage_numbers() {
        let err = PipelineConfig::from_lookup(lookup(&[("LEAGUE_SEASONS", "2024,abc")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "LEAGUE_SEASONS",
                ..
            }
        ));
    }

    #[test]
    fn matchday_url_fills_placeholders() {
        let cfg = PipelineConfig::default();
        let url = cfg.matchday_url(2024, 7);
        assert!(url.ends_with("saison_id=2024&spieltag=7"));
    }

    #[test]
    fn layout_file_overrides_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        fs::write(
            &path,
            r#"{"standings_columns": {"team": 1, "min_cells": 9}, "selectors": {"header_class": "day-header"}}"#,
        )
        .unwrap();
        let layout = PageLayout::load(&path).unwrap();
        assert_eq!(layout.standings_columns.team, 1);
        assert_eq!(layout.standings_columns.min_cells, 9);
        assert_eq!(layout.standings_columns.points, 9);
        assert_eq!(layout.selectors.header_class, "day-header");
        assert_eq!(layout.match_columns, MatchColumns::default());
    }
}
