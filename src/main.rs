use std::ops::RangeInclusive;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use league_ingest::config::{parse_list, parse_range};
use league_ingest::export::{export_all, export_training};
use league_ingest::{
    Fetcher, HttpFetcher, MergeStore, Orchestrator, PipelineConfig, SystemClock, WebDriverFetcher,
};

#[derive(Debug, Default)]
struct Args {
    db: Option<PathBuf>,
    seasons: Option<Vec<u32>>,
    matchdays: Option<RangeInclusive<u32>>,
    export_dir: Option<PathBuf>,
    training_export: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args(std::env::args().skip(1).collect())?;
    let mut config = PipelineConfig::from_env().context("invalid LEAGUE_* configuration")?;
    if let Some(db) = args.db {
        config.db_path = Some(db);
    }
    if let Some(seasons) = args.seasons {
        config.seasons = seasons;
    }
    if let Some(matchdays) = args.matchdays {
        config.matchdays = matchdays;
    }

    let db_path = config
        .resolved_db_path()
        .context("unable to resolve sqlite path")?;
    let mut store = MergeStore::open(&db_path)
        .with_context(|| format!("open store {}", db_path.display()))?;

    let fetcher: Box<dyn Fetcher> = match config.fetch.webdriver_url.clone() {
        Some(endpoint) => Box::new(
            WebDriverFetcher::new(endpoint, config.fetch.clone()).context("build webdriver client")?,
        ),
        None => Box::new(HttpFetcher::new(config.fetch.clone()).context("build http client")?),
    };
    let relegation_ranks = config.relegation_ranks.clone();
    let orchestrator = Orchestrator::new(config, fetcher, SystemClock)?;
    let summary = orchestrator.run(&mut store)?;

    println!("League ingest complete");
    println!("DB: {}", db_path.display());
    println!(
        "Seasons: {}",
        summary
            .seasons
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "Matchdays: {}/{} ({} skipped, {} failed)",
        summary.matchdays_succeeded,
        summary.matchdays_total,
        summary.matchdays_skipped,
        summary.matchdays_failed
    );
    println!(
        "Standings rows: {} new, {} replaced",
        summary.standings.inserted, summary.standings.replaced
    );
    println!(
        "Match records: {} new, {} replaced",
        summary.matches.inserted, summary.matches.replaced
    );
    if summary.malformed_rows + summary.skipped_match_rows + summary.coercion_failures > 0 {
        println!(
            "Malformed rows: {}, skipped result rows: {}, coercion failures: {}",
            summary.malformed_rows, summary.skipped_match_rows, summary.coercion_failures
        );
    }
    if summary.undated_matchdays > 0 {
        println!("Undated matchdays: {}", summary.undated_matchdays);
    }
    if !summary.errors.is_empty() {
        println!("Errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(8) {
            println!(" - {err}");
        }
    }

    if let Some(dir) = args.export_dir {
        let report = export_all(&store, &dir)?;
        println!(
            "Exported {} standings rows and {} matches to {}",
            report.standings,
            report.matches,
            dir.display()
        );
    }

    if let Some(path) = args.training_export {
        let rows = export_training(&store, &relegation_ranks, &path)?;
        println!(
            "Training rows: {rows} (relegation ranks {:?}) to {}",
            relegation_ranks,
            path.display()
        );
    }

    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Args> {
    let mut out = Args::default();
    let mut idx = 0;
    while idx < args.len() {
        let arg = &args[idx];
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag, Some(value.to_string())),
            None => (arg.as_str(), None),
        };
        let value = match inline {
            Some(value) => value,
            None => {
                idx += 1;
                args.get(idx)
                    .cloned()
                    .with_context(|| format!("{flag} needs a value"))?
            }
        };
        let value = value.trim();
        match flag {
            "--db" if !value.is_empty() => out.db = Some(PathBuf::from(value)),
            "--seasons" => out.seasons = Some(parse_list("--seasons", value)?),
            "--matchdays" => out.matchdays = Some(parse_range("--matchdays", value)?),
            "--export-dir" if !value.is_empty() => out.export_dir = Some(PathBuf::from(value)),
            "--training-export" if !value.is_empty() => {
                out.training_export = Some(PathBuf::from(value))
            }
            "--db" | "--export-dir" | "--training-export" => {}
            other => anyhow::bail!("unknown argument {other}"),
        }
        idx += 1;
    }
    Ok(out)
}
