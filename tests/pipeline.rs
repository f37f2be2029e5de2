use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use league_ingest::{
    FixedClock, MatchRecord, MergeStore, Orchestrator, PipelineConfig, SENTINEL, StandingsRow,
    StaticFetcher,
};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn clock() -> FixedClock {
    FixedClock(NaiveDate::from_ymd_opt(2024, 9, 1).unwrap())
}

fn config(matchdays: std::ops::RangeInclusive<u32>, workers: usize) -> PipelineConfig {
    PipelineConfig {
        seasons: vec![2024],
        matchdays,
        url_template: "https://league.test/{season}/{matchday}".to_string(),
        workers,
        politeness_delay: Duration::ZERO,
        ..PipelineConfig::default()
    }
}

fn fetcher() -> StaticFetcher {
    // Matchday 4 is deliberately absent so it fails with a 404.
    StaticFetcher::new()
        .with_page("https://league.test/2024/3", read_fixture("matchday_played.html"))
        .with_page("https://league.test/2024/5", read_fixture("matchday_no_table.html"))
        .with_page("https://league.test/2024/8", read_fixture("matchday_future.html"))
}

#[test]
fn rerun_replaces_instead_of_duplicating() {
    let mut store = MergeStore::open_in_memory().unwrap();
    let orch = Orchestrator::new(config(3..=3, 1), fetcher(), clock()).unwrap();

    let first = orch.run(&mut store).unwrap();
    assert_eq!(first.matchdays_succeeded, 1);
    assert_eq!(first.standings.inserted, 12);
    assert_eq!(first.matches.inserted, 3);
    assert_eq!(first.malformed_rows, 1);
    assert_eq!(first.skipped_match_rows, 1);

    let second = orch.run(&mut store).unwrap();
    assert_eq!(second.records_written().inserted, 0);
    assert_eq!(second.standings.replaced, 12);
    assert_eq!(second.matches.replaced, 3);

    assert_eq!(store.count::<StandingsRow>().unwrap(), 12);
    assert_eq!(store.count::<MatchRecord>().unwrap(), 3);

    let runs: i64 = store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM ingest_runs WHERE finished_at IS NOT NULL",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(runs, 2);
}

#[test]
fn failed_and_tableless_matchdays_do_not_stop_the_run() {
    let mut store = MergeStore::open_in_memory().unwrap();
    let orch = Orchestrator::new(config(3..=5, 1), fetcher(), clock()).unwrap();

    let summary = orch.run(&mut store).unwrap();
    assert_eq!(summary.matchdays_total, 3);
    assert_eq!(summary.matchdays_succeeded, 1);
    assert_eq!(summary.matchdays_failed, 1);
    assert_eq!(summary.matchdays_skipped, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("matchday 4"), "{}", summary.errors[0]);
    assert!(summary.errors[0].contains("404"), "{}", summary.errors[0]);
    assert_eq!(store.count::<StandingsRow>().unwrap(), 12);
}

#[test]
fn worker_pool_gives_the_same_counts() {
    let mut store = MergeStore::open_in_memory().unwrap();
    let orch = Orchestrator::new(config(3..=5, 2), fetcher(), clock()).unwrap();

    let summary = orch.run(&mut store).unwrap();
    assert_eq!(summary.matchdays_succeeded, 1);
    assert_eq!(summary.matchdays_failed, 1);
    assert_eq!(summary.matchdays_skipped, 1);
    assert_eq!(summary.standings.inserted, 12);
}

#[test]
fn future_matchday_is_stored_with_sentinels() {
    let mut store = MergeStore::open_in_memory().unwrap();
    let orch = Orchestrator::new(config(8..=8, 1), fetcher(), clock()).unwrap();
    let summary = orch.run(&mut store).unwrap();
    assert_eq!(summary.matchdays_succeeded, 1);

    let rows = store.load_all::<StandingsRow>().unwrap();
    assert_eq!(rows.len(), 12);
    assert!(rows.iter().all(|r| r.is_future && r.points == SENTINEL));

    let matches = store.load_all::<MatchRecord>().unwrap();
    assert!(matches.iter().all(|m| !m.result_available && m.home_goals == SENTINEL));
}

#[test]
fn undated_page_is_assumed_played_and_counted() {
    let html = r#"<html><body>
        <table class="items"><tbody>
        <tr><td>1</td><td></td><td><a href="/yb">Young Boys</a></td><td>10</td><td>8</td><td>1</td><td>1</td><td>20</td><td>15</td><td>25</td></tr>
        </tbody></table>
        </body></html>"#;
    let fetcher = StaticFetcher::new().with_page("https://league.test/2024/10", html);
    let mut store = MergeStore::open_in_memory().unwrap();
    let orch = Orchestrator::new(config(10..=10, 1), fetcher, clock()).unwrap();

    let summary = orch.run(&mut store).unwrap();
    assert_eq!(summary.matchdays_succeeded, 1);
    assert_eq!(summary.undated_matchdays, 1);

    let rows = store.load_all::<StandingsRow>().unwrap();
    assert_eq!(rows.len(), 1);
    let yb = &rows[0];
    assert!(!yb.is_future);
    assert_eq!((yb.goals_for, yb.goals_against, yb.goal_diff, yb.points), (20, 5, 15, 25));
    assert_eq!(yb.remaining_matches, 28);
    assert!(store.load_all::<MatchRecord>().unwrap().is_empty());
}

#[test]
fn file_store_keeps_rows_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("league.sqlite");
    {
        let mut store = MergeStore::open(&path).unwrap();
        let orch = Orchestrator::new(config(3..=3, 1), fetcher(), clock()).unwrap();
        orch.run(&mut store).unwrap();
    }
    let store = MergeStore::open(&path).unwrap();
    assert_eq!(store.count::<StandingsRow>().unwrap(), 12);
    assert_eq!(store.count::<MatchRecord>().unwrap(), 3);
}
