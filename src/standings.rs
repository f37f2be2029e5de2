use scraper::ElementRef;

use crate::config::StandingsColumns;
use crate::page::{PageQuery, element_text};

/// Trimmed strings of one standings row, before numeric coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStandings {
    pub rank: String,
    pub team: String,
    pub played: String,
    pub wins: String,
    pub draws: String,
    pub losses: String,
    /// Either "20" or "20:5" (for:against).
    pub goals: String,
    pub goal_diff: String,
    pub points: String,
}

impl RawStandings {
    /// Builds from the nine extracted strings in field order.
    pub fn from_fields(fields: [&str; 9]) -> Self {
        let [rank, team, played, wins, draws, losses, goals, goal_diff, points] =
            fields.map(|f| f.trim().to_string());
        Self {
            rank,
            team,
            played,
            wins,
            draws,
            losses,
            goals,
            goal_diff,
            points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Parsed(RawStandings),
    Malformed { cells: usize },
}

pub struct RowParser<'q> {
    query: &'q PageQuery,
    columns: &'q StandingsColumns,
}

impl<'q> RowParser<'q> {
    pub fn new(query: &'q PageQuery, columns: &'q StandingsColumns) -> Self {
        Self { query, columns }
    }

    pub fn parse(&self, row: ElementRef<'_>) -> RowOutcome {
        let cells = row.select(&self.query.cells).collect::<Vec<_>>();
        let cols = self.columns;
        let needed = [
            cols.rank,
            cols.team,
            cols.played,
            cols.wins,
            cols.draws,
            cols.losses,
            cols.goals,
            cols.goal_diff,
            cols.points,
        ]
        .into_iter()
        .max()
        .map_or(0, |idx| idx + 1)
        .max(cols.min_cells);
        if cells.len() < needed {
            return RowOutcome::Malformed { cells: cells.len() };
        }

        let text = |idx: usize| element_text(cells[idx]);
        RowOutcome::Parsed(RawStandings {
            rank: text(cols.rank),
            team: self.team_name(cells[cols.team]),
            played: text(cols.played),
            wins: text(cols.wins),
            draws: text(cols.draws),
            losses: text(cols.losses),
            goals: text(cols.goals),
            goal_diff: text(cols.goal_diff),
            points: text(cols.points),
        })
    }

    /// Prefers the text of an embedded link over the raw cell text.
    fn team_name(&self, cell: ElementRef<'_>) -> String {
        cell.select(&self.query.link)
            .map(element_text)
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| element_text(cell))
    }
}
