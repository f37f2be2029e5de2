use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;

use crate::dataset::training_rows;
use crate::model::{MatchRecord, StandingsRow};
use crate::store::MergeStore;

pub const STANDINGS_CSV: &str = "league_tables.csv";
pub const MATCHES_CSV: &str = "matches.csv";
pub const WORKBOOK: &str = "league_data.xlsx";

pub struct ExportReport {
    pub standings: usize,
    pub matches: usize,
    pub files: Vec<PathBuf>,
}

/// Mirrors both collections to CSV files and a two-sheet workbook in `dir`.
pub fn export_all(store: &MergeStore, dir: &Path) -> Result<ExportReport> {
    fs::create_dir_all(dir).with_context(|| format!("create export dir {}", dir.display()))?;
    let standings = store
        .load_all::<StandingsRow>()
        .context("load standings for export")?;
    let matches = store
        .load_all::<MatchRecord>()
        .context("load matches for export")?;

    let standings_csv = dir.join(STANDINGS_CSV);
    let matches_csv = dir.join(MATCHES_CSV);
    let workbook = dir.join(WORKBOOK);
    write_csv(&standings_csv, &standings)?;
    write_csv(&matches_csv, &matches)?;
    write_workbook(&workbook, &standings, &matches)?;

    Ok(ExportReport {
        standings: standings.len(),
        matches: matches.len(),
        files: vec![standings_csv, matches_csv, workbook],
    })
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("open {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

pub fn write_workbook(
    path: &Path,
    standings: &[StandingsRow],
    matches: &[MatchRecord],
) -> Result<()> {
    let mut standings_rows = vec![vec![
        "Season".to_string(),
        "Matchday".to_string(),
        "Future".to_string(),
        "Rank".to_string(),
        "Team".to_string(),
        "Played".to_string(),
        "W".to_string(),
        "D".to_string(),
        "L".to_string(),
        "Goals For".to_string(),
        "Goals Against".to_string(),
        "Goal Diff".to_string(),
        "Points".to_string(),
        "Remaining".to_string(),
        "Est. Extra Points".to_string(),
    ]];
    standings_rows.extend(standings.iter().map(standings_row));

    let mut match_rows = vec![vec![
        "Season".to_string(),
        "Matchday".to_string(),
        "Date".to_string(),
        "Time".to_string(),
        "Home Rank".to_string(),
        "Home".to_string(),
        "Home Goals".to_string(),
        "Away Goals".to_string(),
        "Away Rank".to_string(),
        "Away".to_string(),
        "Result".to_string(),
    ]];
    match_rows.extend(matches.iter().map(match_row));

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("League Tables").context("name standings sheet")?;
    write_rows(sheet, &standings_rows)?;
    let sheet = workbook.add_worksheet();
    sheet.set_name("Matches").context("name matches sheet")?;
    write_rows(sheet, &match_rows)?;
    workbook
        .save(path)
        .with_context(|| format!("save workbook {}", path.display()))?;
    Ok(())
}

const TRAINING_HEADER: [&str; 15] = [
    "season",
    "matchday",
    "rank",
    "team",
    "played",
    "wins",
    "draws",
    "losses",
    "goals_for",
    "goals_against",
    "goal_diff",
    "points",
    "remaining_matches",
    "estimated_extra_points",
    "relegated",
];

/// Played standings rows with a 0/1 relegation label, one CSV row each.
pub fn export_training(store: &MergeStore, relegation_ranks: &[i32], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create export dir {}", parent.display()))?;
    }
    let rows = training_rows(store, relegation_ranks).context("load training rows")?;
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("open {}", path.display()))?;
    writer
        .write_record(TRAINING_HEADER)
        .with_context(|| format!("write header to {}", path.display()))?;
    for t in &rows {
        let r = &t.row;
        writer
            .write_record([
                r.season.to_string(),
                r.matchday.to_string(),
                r.rank.to_string(),
                r.team.clone(),
                r.played.to_string(),
                r.wins.to_string(),
                r.draws.to_string(),
                r.losses.to_string(),
                r.goals_for.to_string(),
                r.goals_against.to_string(),
                r.goal_diff.to_string(),
                r.points.to_string(),
                r.remaining_matches.to_string(),
                r.estimated_extra_points.to_string(),
                u8::from(t.relegated).to_string(),
            ])
            .with_context(|| format!("write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(rows.len())
}

fn standings_row(row: &StandingsRow) -> Vec<String> {
    vec![
        row.season.to_string(),
        row.matchday.to_string(),
        row.is_future.to_string(),
        row.rank.to_string(),
        row.team.clone(),
        row.played.to_string(),
        row.wins.to_string(),
        row.draws.to_string(),
        row.losses.to_string(),
        row.goals_for.to_string(),
        row.goals_against.to_string(),
        row.goal_diff.to_string(),
        row.points.to_string(),
        row.remaining_matches.to_string(),
        format!("{:.1}", row.estimated_extra_points),
    ]
}

fn match_row(m: &MatchRecord) -> Vec<String> {
    vec![
        m.season.to_string(),
        m.matchday.to_string(),
        m.date.clone(),
        m.time.clone(),
        m.home_rank.to_string(),
        m.home_team.clone(),
        m.home_goals.to_string(),
        m.away_goals.to_string(),
        m.away_rank.to_string(),
        m.away_team.clone(),
        m.outcome().map(|c| c.to_string()).unwrap_or_default(),
    ]
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
