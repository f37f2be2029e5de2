use crate::config::{DEFAULT_POINTS_PER_GAME, DEFAULT_SEASON_LENGTH};
use crate::matches::{RawMatch, parse_result};
use crate::model::{MatchRecord, SENTINEL, StandingsRow};
use crate::standings::RawStandings;
use crate::temporal::Classification;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFeatures {
    pub remaining_matches: i32,
    pub estimated_extra_points: f64,
}

/// Turns parsed strings into typed records. Unparseable numbers become
/// [`SENTINEL`]; the number of such failures is kept for reporting.
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    season_length: u32,
    points_per_game: f64,
    coercion_failures: usize,
}

impl Default for RecordAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SEASON_LENGTH, DEFAULT_POINTS_PER_GAME)
    }
}

impl RecordAssembler {
    pub fn new(season_length: u32, points_per_game: f64) -> Self {
        Self {
            season_length,
            points_per_game,
            coercion_failures: 0,
        }
    }

    pub fn coercion_failures(&self) -> usize {
        self.coercion_failures
    }

    pub fn derived(&self, matchday: u32) -> DerivedFeatures {
        let remaining = self.season_length.saturating_sub(matchday) as i32;
        DerivedFeatures {
            remaining_matches: remaining,
            estimated_extra_points: remaining as f64 * self.points_per_game,
        }
    }

    pub fn standings(
        &mut self,
        season: u32,
        matchday: u32,
        raw: &RawStandings,
        class: Classification,
    ) -> StandingsRow {
        let derived = self.derived(matchday);
        let mut row = StandingsRow {
            season,
            matchday,
            rank: self.coerce(&raw.rank),
            team: raw.team.clone(),
            played: self.coerce(&raw.played),
            wins: self.coerce(&raw.wins),
            draws: self.coerce(&raw.draws),
            losses: self.coerce(&raw.losses),
            goals_for: SENTINEL,
            goals_against: SENTINEL,
            goal_diff: SENTINEL,
            points: SENTINEL,
            is_future: class.is_future,
            remaining_matches: derived.remaining_matches,
            estimated_extra_points: derived.estimated_extra_points,
        };
        if class.is_future {
            return row;
        }

        let goal_diff = self.coerce_opt(&raw.goal_diff);
        row.goal_diff = goal_diff.unwrap_or(SENTINEL);
        row.points = self.coerce(&raw.points);
        match raw.goals.split_once(':') {
            Some((scored, conceded)) => {
                row.goals_for = self.coerce(scored);
                row.goals_against = self.coerce(conceded);
            }
            None => {
                let goals_for = self.coerce_opt(&raw.goals);
                row.goals_for = goals_for.unwrap_or(SENTINEL);
                // -1 is a real goal difference, so test the parse, not the stored value.
                if let (Some(scored), Some(diff)) = (goals_for, goal_diff) {
                    row.goals_against = scored - diff;
                }
            }
        }
        row
    }

    pub fn match_record(
        &mut self,
        season: u32,
        matchday: u32,
        raw: &RawMatch,
        class: Classification,
    ) -> MatchRecord {
        let score = if class.is_future {
            None
        } else {
            parse_result(&raw.result)
        };
        if score.is_none() && !class.is_future && !raw.result.is_empty() {
            tracing::debug!(season, matchday, row = raw.row_index, result = %raw.result, "no score in result cell");
        }
        let (home_goals, away_goals) = score.unwrap_or((SENTINEL, SENTINEL));
        MatchRecord {
            season,
            matchday,
            date: raw.date.clone().unwrap_or_default(),
            time: raw.time.clone().unwrap_or_default(),
            home_team: raw.home.name.clone(),
            away_team: raw.away.name.clone(),
            home_rank: raw.home.rank.unwrap_or(SENTINEL),
            away_rank: raw.away.rank.unwrap_or(SENTINEL),
            home_goals,
            away_goals,
            result_available: score.is_some(),
        }
    }

    fn coerce(&mut self, raw: &str) -> i32 {
        self.coerce_opt(raw).unwrap_or(SENTINEL)
    }

    fn coerce_opt(&mut self, raw: &str) -> Option<i32> {
        let value = coerce_int(raw);
        if value.is_none() && !raw.trim().is_empty() {
            self.coercion_failures += 1;
        }
        value
    }
}

/// Integer from trimmed text, tolerating a leading `+` and a trailing `.`
/// as in "+15" or "5.".
pub fn coerce_int(raw: &str) -> Option<i32> {
    let s = raw.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    let s = s.strip_suffix('.').unwrap_or(s);
    s.parse::<i32>().ok()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::matches::TeamRef;
    use crate::temporal::{Basis, classify};

    fn played() -> Classification {
        classify(NaiveDate::from_ymd_opt(2024, 8, 3), NaiveDate::from_ymd_opt(2024, 9, 1).unwrap())
    }

    fn future() -> Classification {
        classify(NaiveDate::from_ymd_opt(2024, 10, 3), NaiveDate::from_ymd_opt(2024, 9, 1).unwrap())
    }

    #[test]
    fn derived_features_at_matchday_30() {
        let d = RecordAssembler::new(38, 1.2).derived(30);
        assert_eq!(d.remaining_matches, 8);
        assert!((d.estimated_extra_points - 9.6).abs() < 1e-9);
    }

    #[test]
    fn assembles_young_boys_row() {
        let raw = RawStandings::from_fields(["1", "Young Boys", "10", "8", "1", "1", "20", "15", "25"]);
        let mut asm = RecordAssembler::default();
        let row = asm.standings(2024, 10, &raw, played());
        assert_eq!(row.rank, 1);
        assert_eq!(row.team, "Young Boys");
        assert_eq!(row.played, 10);
        assert_eq!(row.wins, 8);
        assert_eq!(row.draws, 1);
        assert_eq!(row.losses, 1);
        assert_eq!(row.goals_for, 20);
        assert_eq!(row.goals_against, 5);
        assert_eq!(row.goal_diff, 15);
        assert_eq!(row.points, 25);
        assert!(!row.is_future);
        assert_eq!(asm.coercion_failures(), 0);
    }

    #[test]
    fn goals_pair_and_signed_diff() {
        let raw = RawStandings::from_fields(["12.", "GCZ", "10", "1", "2", "7", "8:21", "-13", "5"]);
        let row = RecordAssembler::default().standings(2024, 10, &raw, played());
        assert_eq!(row.rank, 12);
        assert_eq!((row.goals_for, row.goals_against), (8, 21));
        assert_eq!(row.goal_diff, -13);
    }

    #[test]
    fn goal_diff_of_minus_one_is_a_value_not_the_sentinel() {
        let raw = RawStandings::from_fields(["8", "Sion", "3", "1", "0", "2", "3", "-1", "3"]);
        let mut asm = RecordAssembler::default();
        let row = asm.standings(2024, 3, &raw, played());
        assert_eq!(row.goals_for, 3);
        assert_eq!(row.goal_diff, -1);
        assert_eq!(row.goals_against, 4);
        assert_eq!(asm.coercion_failures(), 0);
    }

    #[test]
    fn future_rows_never_carry_scores() {
        let raw = RawStandings::from_fields(["1", "Young Boys", "10", "8", "1", "1", "20:5", "15", "25"]);
        let mut asm = RecordAssembler::default();
        let row = asm.standings(2024, 11, &raw, future());
        assert!(row.is_future);
        assert!(row.scores_unavailable());
        assert_eq!(row.played, 10);
    }

    #[test]
    fn coercion_failure_becomes_sentinel_and_is_counted() {
        let raw = RawStandings::from_fields(["1", "Young Boys", "x", "8", "1", "1", "", "15", "n/a"]);
        let mut asm = RecordAssembler::default();
        let row = asm.standings(2024, 10, &raw, played());
        assert_eq!(row.played, SENTINEL);
        assert_eq!(row.points, SENTINEL);
        assert_eq!(row.goals_for, SENTINEL);
        assert_eq!(row.goals_against, SENTINEL);
        // empty goals cell is absence, not a failed coercion
        assert_eq!(asm.coercion_failures(), 2);
    }

    fn raw_match(result: &str) -> RawMatch {
        RawMatch {
            row_index: 1,
            date: Some("03.08.2024".to_string()),
            time: Some("18:00".to_string()),
            home: TeamRef {
                name: "Lugano".to_string(),
                rank: Some(5),
            },
            away: TeamRef {
                name: "GCZ".to_string(),
                rank: None,
            },
            result: result.to_string(),
        }
    }

    #[test]
    fn match_goals_only_when_played() {
        let mut asm = RecordAssembler::default();
        let scored = asm.match_record(2024, 1, &raw_match("2:1"), played());
        assert_eq!((scored.home_goals, scored.away_goals), (2, 1));
        assert!(scored.result_available);
        assert_eq!(scored.away_rank, SENTINEL);

        let ahead = asm.match_record(2024, 1, &raw_match("2:1"), future());
        assert_eq!((ahead.home_goals, ahead.away_goals), (SENTINEL, SENTINEL));
        assert!(!ahead.result_available);

        let pending = asm.match_record(2024, 1, &raw_match("-:-"), played());
        assert!(!pending.result_available);
        assert_eq!(pending.home_goals, SENTINEL);
    }

    #[test]
    fn defaulted_classification_still_parses_scores() {
        let class = Classification {
            is_future: false,
            basis: Basis::Defaulted,
        };
        let rec = RecordAssembler::default().match_record(2024, 1, &raw_match("3:0"), class);
        assert_eq!(rec.home_goals, 3);
    }
}
