use std::collections::HashMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{FeatureError, Result};
use crate::form::HasForm;
use crate::team_history::{FixtureRow, HistoryRow, RollingFeatureSet, TeamTable};

/// The opponent's trailing features as computed in the opponent's own table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpponentFeatures {
    pub team: String,
    pub round: u32,
    pub rolling: RollingFeatureSet,
    pub std_cum_points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RivalRow<R> {
    pub base: R,
    pub opponent: OpponentFeatures,
}

impl<R: FixtureRow> FixtureRow for RivalRow<R> {
    fn history(&self) -> &HistoryRow {
        self.base.history()
    }
}

impl<R: HasForm> HasForm for RivalRow<R> {
    fn std_cum_points(&self) -> Option<f64> {
        self.base.std_cum_points()
    }
}

fn lookup<R: FixtureRow + HasForm>(
    index: &HashMap<&str, &TeamTable<R>>,
    team: &str,
    opponent: &str,
    date: NaiveDate,
) -> Result<OpponentFeatures> {
    let key = || format!("{team} vs {opponent} on {date}");
    let Some(table) = index.get(opponent) else {
        return Err(FeatureError::AmbiguousJoin {
            context: "rival features",
            key: key(),
            matches: 0,
        });
    };
    let found = table
        .rows_on(date)
        .filter(|r| r.fixture().opponent == team)
        .collect::<Vec<_>>();
    match found.as_slice() {
        [row] => Ok(OpponentFeatures {
            team: opponent.to_string(),
            round: row.fixture().round,
            rolling: row.rolling().clone(),
            std_cum_points: row.std_cum_points(),
        }),
        other => Err(FeatureError::AmbiguousJoin {
            context: "rival features",
            key: key(),
            matches: other.len(),
        }),
    }
}

/// Joins every fixture with the opponent's row for the same date and pairing.
///
/// All tables of the season must be present. Zero or several matching rows
/// for a fixture is an integrity error naming the fixture.
pub fn join_rivals<R>(tables: Vec<TeamTable<R>>) -> Result<Vec<TeamTable<RivalRow<R>>>>
where
    R: FixtureRow + HasForm + Sync,
{
    let opponents = {
        let index = tables
            .iter()
            .map(|t| (t.team.as_str(), t))
            .collect::<HashMap<_, _>>();
        tables
            .par_iter()
            .map(|t| {
                t.rows
                    .iter()
                    .map(|r| lookup(&index, &t.team, &r.fixture().opponent, r.fixture().date))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?
    };

    Ok(tables
        .into_iter()
        .zip(opponents)
        .map(|(table, opps)| TeamTable {
            season: table.season,
            team: table.team,
            rows: table
                .rows
                .into_iter()
                .zip(opps)
                .map(|(base, opponent)| RivalRow { base, opponent })
                .collect(),
        })
        .collect())
}
