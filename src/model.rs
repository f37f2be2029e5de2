use serde::{Deserialize, Serialize};

/// Reserved value for "unavailable or not yet determined".
pub const SENTINEL: i32 = -1;

/// Aggregated per-team statistics as of one matchday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub season: u32,
    pub matchday: u32,
    pub rank: i32,
    pub team: String,
    pub played: i32,
    pub wins: i32,
    pub draws: i32,
    pub losses: i32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub goal_diff: i32,
    pub points: i32,
    pub is_future: bool,
    pub remaining_matches: i32,
    pub estimated_extra_points: f64,
}

impl StandingsRow {
    /// Goal and point fields all hold the sentinel.
    pub fn scores_unavailable(&self) -> bool {
        self.goals_for == SENTINEL
            && self.goals_against == SENTINEL
            && self.goal_diff == SENTINEL
            && self.points == SENTINEL
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub season: u32,
    pub matchday: u32,
    /// `dd.mm.yyyy` as shown on the page; empty when no header row preceded the match.
    pub date: String,
    pub time: String,
    pub home_team: String,
    pub away_team: String,
    pub home_rank: i32,
    pub away_rank: i32,
    pub home_goals: i32,
    pub away_goals: i32,
    pub result_available: bool,
}

impl MatchRecord {
    /// 'H', 'D' or 'A' once a result is known.
    pub fn outcome(&self) -> Option<char> {
        if !self.result_available || self.home_goals < 0 || self.away_goals < 0 {
            return None;
        }
        if self.home_goals > self.away_goals {
            Some('H')
        } else if self.home_goals < self.away_goals {
            Some('A')
        } else {
            Some('D')
        }
    }
}
