//! Read-side views of the standings collection for the model training and
//! serving collaborators. Both only read; neither sees future rows.

use std::collections::BTreeMap;

use rusqlite::params;

use crate::error::StorageError;
use crate::model::StandingsRow;
use crate::store::MergeStore;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub row: StandingsRow,
    pub relegated: bool,
}

pub fn is_relegated(rank: i32, relegation_ranks: &[i32]) -> bool {
    relegation_ranks.contains(&rank)
}

/// All played standings rows with their relegation label.
pub fn training_rows(
    store: &MergeStore,
    relegation_ranks: &[i32],
) -> Result<Vec<TrainingRow>, StorageError> {
    let rows = store.load_where::<StandingsRow, _>("is_future = 0", [])?;
    Ok(rows
        .into_iter()
        .map(|row| TrainingRow {
            relegated: is_relegated(row.rank, relegation_ranks),
            row,
        })
        .collect())
}

/// For each team, its played row with the highest matchday in `season`.
pub fn latest_rows_per_team(
    store: &MergeStore,
    season: u32,
) -> Result<Vec<StandingsRow>, StorageError> {
    let rows = store.load_where::<StandingsRow, _>(
        "season = ?1 AND is_future = 0",
        params![season],
    )?;
    let mut latest: BTreeMap<String, StandingsRow> = BTreeMap::new();
    for row in rows {
        match latest.get(&row.team) {
            Some(current) if current.matchday >= row.matchday => {}
            _ => {
                latest.insert(row.team.clone(), row);
            }
        }
    }
    let mut out = latest.into_values().collect::<Vec<_>>();
    out.sort_by_key(|row| (row.rank < 0, row.rank));
    Ok(out)
}
