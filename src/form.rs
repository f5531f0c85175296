use std::collections::HashMap;

use serde::Serialize;

use crate::season::Season;
use crate::team_history::{FixtureRow, HistoryRow, TeamTable};

/// Spreads at or below this are treated as zero.
const STD_EPSILON: f64 = 1e-12;

/// Mean and sample standard deviation of one round across the teams that
/// reached it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoundSummary {
    pub round: u32,
    pub teams: usize,
    pub mean: f64,
    /// `None` with fewer than two teams.
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonForm {
    pub season: Season,
    pub rounds: Vec<RoundSummary>,
    by_team: HashMap<String, Vec<Option<f64>>>,
}

impl SeasonForm {
    /// Standardised value for `team` at 1-based `round`.
    pub fn z_score(&self, team: &str, round: u32) -> Option<f64> {
        let idx = usize::try_from(round).ok()?.checked_sub(1)?;
        self.by_team.get(team)?.get(idx).copied().flatten()
    }

    pub fn attach<R: FixtureRow>(&self, table: TeamTable<R>) -> TeamTable<FormRow<R>> {
        let team = table.team.clone();
        table.widen(|base| {
            let std_cum_points = self.z_score(&team, base.fixture().round);
            FormRow {
                base,
                std_cum_points,
            }
        })
    }
}

fn summarize(round: u32, values: &[f64]) -> RoundSummary {
    let n = values.len();
    let mean = if n == 0 {
        0.0
    } else {
        values.iter().sum::<f64>() / n as f64
    };
    let std = (n >= 2).then(|| {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    });
    RoundSummary {
        round,
        teams: n,
        mean,
        std,
    }
}

pub fn standardize<R: FixtureRow>(season: Season, tables: &[TeamTable<R>]) -> SeasonForm {
    let max_rounds = tables.iter().map(|t| t.rows.len()).max().unwrap_or(0);

    let rounds = (0..max_rounds)
        .map(|idx| {
            let values = tables
                .iter()
                .filter_map(|t| t.rows.get(idx))
                .map(|r| f64::from(r.rolling().overall.cum_points))
                .collect::<Vec<_>>();
            summarize(idx as u32 + 1, &values)
        })
        .collect::<Vec<_>>();

    let by_team = tables
        .iter()
        .map(|t| {
            let scores = t
                .rows
                .iter()
                .zip(&rounds)
                .map(|(r, summary)| {
                    let std = summary.std.filter(|s| *s > STD_EPSILON)?;
                    Some((f64::from(r.rolling().overall.cum_points) - summary.mean) / std)
                })
                .collect::<Vec<_>>();
            (t.team.clone(), scores)
        })
        .collect();

    SeasonForm {
        season,
        rounds,
        by_team,
    }
}

pub trait HasForm {
    fn std_cum_points(&self) -> Option<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormRow<R> {
    pub base: R,
    /// Trailing; `None` when the round's spread is zero or undefined.
    pub std_cum_points: Option<f64>,
}

impl<R: FixtureRow> FixtureRow for FormRow<R> {
    fn history(&self) -> &HistoryRow {
        self.base.history()
    }
}

impl<R> HasForm for FormRow<R> {
    fn std_cum_points(&self) -> Option<f64> {
        self.std_cum_points
    }
}
