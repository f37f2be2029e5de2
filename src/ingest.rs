use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rayon::prelude::*;
use scraper::Html;
use tracing::{info, warn};

use crate::assemble::RecordAssembler;
use crate::config::{PageLayout, PipelineConfig};
use crate::error::{ConfigError, RetrievalError, StorageError};
use crate::fetch::Fetcher;
use crate::matches::MatchParser;
use crate::model::{MatchRecord, StandingsRow};
use crate::page::{PageQuery, parse_date};
use crate::standings::{RowOutcome, RowParser};
use crate::store::{BatchReport, MergeStore};
use crate::temporal::{Clock, classify};

/// Everything one matchday page produced, ready to merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchdayRecords {
    pub season: u32,
    pub matchday: u32,
    pub page_date: Option<NaiveDate>,
    pub standings: Vec<StandingsRow>,
    pub matches: Vec<MatchRecord>,
    pub malformed_rows: usize,
    pub skipped_match_rows: usize,
    pub coercion_failures: usize,
    /// No date was found for the standings; they were assumed played.
    pub undated: bool,
}

/// Parses a rendered matchday page into typed records.
pub struct MatchdayParser {
    query: PageQuery,
    layout: PageLayout,
    season_length: u32,
    points_per_game: f64,
}

impl MatchdayParser {
    pub fn new(
        layout: PageLayout,
        season_length: u32,
        points_per_game: f64,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            query: PageQuery::new(&layout.selectors)?,
            layout,
            season_length,
            points_per_game,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.layout.clone(),
            config.season_length,
            config.points_per_game,
        )
    }

    pub fn parse(&self, html: &str, season: u32, matchday: u32, today: NaiveDate) -> MatchdayRecords {
        let doc = Html::parse_document(html);
        let mut assembler = RecordAssembler::new(self.season_length, self.points_per_game);
        let mut out = MatchdayRecords {
            season,
            matchday,
            ..MatchdayRecords::default()
        };

        let result_rows = self.query.results_rows(&doc);
        let scan = MatchParser::new(&self.query, &self.layout.match_columns).scan(&result_rows);
        out.page_date = self
            .query
            .linked_date(&doc)
            .or_else(|| scan.earliest_date());

        let class = classify(out.page_date, today);
        out.undated = class.is_defaulted();
        if class.is_future {
            info!(season, matchday, date = ?out.page_date, "matchday lies in the future");
        }

        let row_parser = RowParser::new(&self.query, &self.layout.standings_columns);
        for (row_index, row) in self.query.standings_rows(&doc).into_iter().enumerate() {
            match row_parser.parse(row) {
                RowOutcome::Parsed(raw) => {
                    out.standings
                        .push(assembler.standings(season, matchday, &raw, class));
                }
                RowOutcome::Malformed { cells } => {
                    tracing::debug!(season, matchday, row = row_index, cells, "malformed standings row");
                    out.malformed_rows += 1;
                }
            }
        }

        for (row_index, cells) in &scan.skipped {
            tracing::debug!(season, matchday, row = row_index, cells, "short results row");
        }
        out.skipped_match_rows = scan.skipped.len();
        for raw in &scan.matches {
            let date = raw.date.as_deref().and_then(parse_date).or(out.page_date);
            let match_class = classify(date, today);
            out.matches
                .push(assembler.match_record(season, matchday, raw, match_class));
        }

        out.coercion_failures = assembler.coercion_failures();
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub seasons: Vec<u32>,
    pub matchdays_total: usize,
    pub matchdays_succeeded: usize,
    pub matchdays_skipped: usize,
    pub matchdays_failed: usize,
    pub standings: BatchReport,
    pub matches: BatchReport,
    pub malformed_rows: usize,
    pub skipped_match_rows: usize,
    pub coercion_failures: usize,
    pub undated_matchdays: usize,
    pub errors: Vec<String>,
}

impl IngestSummary {
    pub fn records_written(&self) -> BatchReport {
        BatchReport {
            inserted: self.standings.inserted + self.matches.inserted,
            replaced: self.standings.replaced + self.matches.replaced,
        }
    }
}

enum SliceError {
    Retrieval(RetrievalError),
    Storage(StorageError),
}

/// Wait before the `pos`-th fetch of a pool window, so requests leave one
/// politeness delay apart instead of all at once.
fn staggered_delay(delay: Duration, pos: usize) -> Duration {
    delay.saturating_mul(pos as u32 + 1)
}

/// Drives (season, matchday) pairs through fetch, parse and merge.
pub struct Orchestrator<F, C> {
    config: PipelineConfig,
    parser: MatchdayParser,
    fetcher: F,
    clock: C,
}

impl<F: Fetcher, C: Clock> Orchestrator<F, C> {
    pub fn new(config: PipelineConfig, fetcher: F, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let parser = MatchdayParser::from_config(&config)?;
        Ok(Self {
            config,
            parser,
            fetcher,
            clock,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn slices(&self) -> Vec<(u32, u32)> {
        self.config
            .seasons
            .iter()
            .flat_map(|season| self.config.matchdays.clone().map(move |day| (*season, day)))
            .collect()
    }

    /// Fetches and parses one matchday. `Ok(None)` when the page has no standings table.
    pub fn scrape_matchday(
        &self,
        season: u32,
        matchday: u32,
    ) -> Result<Option<MatchdayRecords>, RetrievalError> {
        let url = self.config.matchday_url(season, matchday);
        let html = self.fetcher.fetch(&url)?;
        let records = self
            .parser
            .parse(&html, season, matchday, self.clock.today());
        if records.standings.is_empty() {
            return Ok(None);
        }
        if records.matches.is_empty() {
            warn!(season, matchday, "no detailed results on page");
        }
        Ok(Some(records))
    }

    pub fn run(&self, store: &mut MergeStore) -> Result<IngestSummary> {
        let slices = self.slices();
        let mut summary = IngestSummary {
            seasons: self.config.seasons.clone(),
            matchdays_total: slices.len(),
            ..IngestSummary::default()
        };
        let run_id = store
            .begin_run(&self.config.seasons, slices.len())
            .context("record ingest run start")?;

        if self.config.workers <= 1 {
            for (idx, &(season, matchday)) in slices.iter().enumerate() {
                if idx > 0 {
                    thread::sleep(self.config.politeness_delay);
                }
                let scraped = self.scrape_matchday(season, matchday);
                self.merge(store, season, matchday, scraped, &mut summary);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.workers)
                .build()
                .context("build fetch pool")?;
            for window in slices.chunks(self.config.workers) {
                let scraped = pool.install(|| {
                    window
                        .par_iter()
                        .enumerate()
                        .map(|(pos, &(season, matchday))| {
                            thread::sleep(staggered_delay(self.config.politeness_delay, pos));
                            self.scrape_matchday(season, matchday)
                        })
                        .collect::<Vec<_>>()
                });
                for (&(season, matchday), result) in window.iter().zip(scraped) {
                    self.merge(store, season, matchday, result, &mut summary);
                }
            }
        }

        store
            .finish_run(
                run_id,
                summary.matchdays_succeeded,
                summary.records_written(),
                &summary.errors,
            )
            .context("record ingest run finish")?;
        Ok(summary)
    }

    fn merge(
        &self,
        store: &mut MergeStore,
        season: u32,
        matchday: u32,
        scraped: Result<Option<MatchdayRecords>, RetrievalError>,
        summary: &mut IngestSummary,
    ) {
        let records = match scraped {
            Ok(Some(records)) => records,
            Ok(None) => {
                warn!(season, matchday, "no standings table on page, skipping matchday");
                summary.matchdays_skipped += 1;
                return;
            }
            Err(err) => {
                self.fail(season, matchday, SliceError::Retrieval(err), summary);
                return;
            }
        };

        summary.malformed_rows += records.malformed_rows;
        summary.skipped_match_rows += records.skipped_match_rows;
        summary.coercion_failures += records.coercion_failures;
        if records.undated {
            warn!(season, matchday, "no date found on page, standings assumed played");
            summary.undated_matchdays += 1;
        }

        let merged = store
            .upsert_all(&records.standings, &mut summary.standings)
            .and_then(|_| store.upsert_all(&records.matches, &mut summary.matches));
        if let Err(err) = merged {
            self.fail(season, matchday, SliceError::Storage(err), summary);
            return;
        }

        summary.matchdays_succeeded += 1;
        info!(
            season,
            matchday,
            standings = records.standings.len(),
            matches = records.matches.len(),
            malformed = records.malformed_rows,
            "matchday merged"
        );
    }

    fn fail(&self, season: u32, matchday: u32, err: SliceError, summary: &mut IngestSummary) {
        let message = match err {
            SliceError::Retrieval(err) => format!("season {season} matchday {matchday}: {err}"),
            SliceError::Storage(err) => {
                format!("season {season} matchday {matchday}: storage: {err}")
            }
        };
        warn!("{message}");
        summary.matchdays_failed += 1;
        summary.errors.push(message);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;

    /// Fails every fetch, remembering when each one started.
    #[derive(Default)]
    struct TimedFetcher {
        started: Mutex<Vec<Instant>>,
    }

    impl Fetcher for TimedFetcher {
        fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
            self.started.lock().unwrap().push(Instant::now());
            Err(RetrievalError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    #[test]
    fn pool_delays_grow_with_position() {
        let delay = Duration::from_millis(200);
        assert_eq!(staggered_delay(delay, 0), delay);
        assert_eq!(staggered_delay(delay, 2), Duration::from_millis(600));
        assert_eq!(staggered_delay(Duration::ZERO, 5), Duration::ZERO);
    }

    #[test]
    fn pool_fetches_are_spaced_by_politeness_delay() {
        let config = PipelineConfig {
            seasons: vec![2024],
            matchdays: 1..=3,
            workers: 3,
            politeness_delay: Duration::from_millis(80),
            ..PipelineConfig::default()
        };
        let orch =
            Orchestrator::new(config, TimedFetcher::default(), crate::temporal::SystemClock).unwrap();
        let mut store = MergeStore::open_in_memory().unwrap();
        let summary = orch.run(&mut store).unwrap();
        assert_eq!(summary.matchdays_failed, 3);

        let mut started = orch.fetcher.started.lock().unwrap().clone();
        started.sort();
        assert_eq!(started.len(), 3);
        for pair in started.windows(2) {
            assert!(
                pair[1] - pair[0] >= Duration::from_millis(40),
                "fetches only {:?} apart",
                pair[1] - pair[0]
            );
        }
    }

    #[test]
    fn slices_walk_seasons_then_matchdays() {
        let config = PipelineConfig {
            seasons: vec![2023, 2024],
            matchdays: 1..=2,
            ..PipelineConfig::default()
        };
        let orch = Orchestrator::new(
            config,
            crate::fetch::StaticFetcher::new(),
            crate::temporal::SystemClock,
        )
        .unwrap();
        assert_eq!(
            orch.slices(),
            vec![(2023, 1), (2023, 2), (2024, 1), (2024, 2)]
        );
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = PipelineConfig {
            seasons: Vec::new(),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Orchestrator::new(
                config,
                crate::fetch::StaticFetcher::new(),
                crate::temporal::SystemClock
            ),
            Err(ConfigError::NoSeasons)
        ));
    }
}
