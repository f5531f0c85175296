use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};

use crate::season::Season;
use crate::team_history::{FixtureRow, TeamTable, Venue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Top,
    Second,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Top => write!(f, "top"),
            Tier::Second => write!(f, "second"),
        }
    }
}

/// Goals scored and conceded, written `F:A` in league tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GoalPair {
    pub scored: u32,
    pub conceded: u32,
}

impl GoalPair {
    pub fn difference(&self) -> i64 {
        i64::from(self.scored) - i64::from(self.conceded)
    }
}

impl fmt::Display for GoalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scored, self.conceded)
    }
}

impl FromStr for GoalPair {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (scored, conceded) = raw
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("goal pair {raw:?} has no ':'"))?;
        let scored = scored
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("bad goals scored in {raw:?}"))?;
        let conceded = conceded
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("bad goals conceded in {raw:?}"))?;
        Ok(Self { scored, conceded })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VenueRecord {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals: GoalPair,
}

impl VenueRecord {
    fn add(&mut self, points: u32, scored: u32, conceded: u32) {
        match points {
            3 => self.wins += 1,
            1 => self.draws += 1,
            _ => self.losses += 1,
        }
        self.goals.scored += scored;
        self.goals.conceded += conceded;
    }

    pub fn played(&self) -> u32 {
        self.wins + self.draws + self.losses
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueTableRow {
    pub rank: u32,
    pub team: String,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals: GoalPair,
    pub points: u32,
    pub home: VenueRecord,
    pub away: VenueRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeagueTable {
    pub season: Season,
    pub tier: Tier,
    pub rows: Vec<LeagueTableRow>,
}

impl LeagueTable {
    pub fn get(&self, team: &str) -> Option<&LeagueTableRow> {
        self.rows.iter().find(|r| r.team == team)
    }

    pub fn teams(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.team.as_str())
    }
}

/// Ranked by points, then goal difference, goals scored and name.
pub fn from_histories<R: FixtureRow>(
    season: Season,
    tier: Tier,
    tables: &[TeamTable<R>],
) -> LeagueTable {
    let mut rows = tables
        .iter()
        .map(|table| {
            let mut home = VenueRecord::default();
            let mut away = VenueRecord::default();
            for row in &table.rows {
                let f = row.fixture();
                let slot = match f.venue {
                    Venue::Home => &mut home,
                    Venue::Away => &mut away,
                };
                slot.add(f.points, f.goals_for, f.goals_against);
            }
            let wins = home.wins + away.wins;
            let draws = home.draws + away.draws;
            LeagueTableRow {
                rank: 0,
                team: table.team.clone(),
                played: home.played() + away.played(),
                wins,
                draws,
                losses: home.losses + away.losses,
                goals: GoalPair {
                    scored: home.goals.scored + away.goals.scored,
                    conceded: home.goals.conceded + away.goals.conceded,
                },
                points: 3 * wins + draws,
                home,
                away,
            }
        })
        .collect::<Vec<_>>();

    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.goals.difference().cmp(&a.goals.difference()))
            .then(b.goals.scored.cmp(&a.goals.scored))
            .then(a.team.cmp(&b.team))
    });
    for (idx, row) in rows.iter_mut().enumerate() {
        row.rank = idx as u32 + 1;
    }
    LeagueTable { season, tier, rows }
}

/// Name fixes applied to externally sourced tables so they match match-table names.
pub fn default_aliases() -> HashMap<String, String> {
    HashMap::from([("Wolverhampton".to_string(), "Wolves".to_string())])
}

#[derive(Debug, Deserialize)]
struct TableCsvRow {
    #[serde(rename = "Rank")]
    rank: u32,
    #[serde(rename = "Name", alias = "Team")]
    name: String,
    #[serde(rename = "Played", alias = "PlayedMatchs", default)]
    played: Option<u32>,
    #[serde(rename = "Win")]
    win: u32,
    #[serde(rename = "Draw")]
    draw: u32,
    #[serde(rename = "Loss")]
    loss: u32,
    #[serde(rename = "Goals")]
    goals: String,
    #[serde(rename = "Points")]
    points: u32,
    #[serde(rename = "WinHome")]
    win_home: u32,
    #[serde(rename = "DrawHome")]
    draw_home: u32,
    #[serde(rename = "LossHome")]
    loss_home: u32,
    #[serde(rename = "GoalsHome")]
    goals_home: String,
    #[serde(rename = "WinAway")]
    win_away: u32,
    #[serde(rename = "DrawAway")]
    draw_away: u32,
    #[serde(rename = "LossAway")]
    loss_away: u32,
    #[serde(rename = "GoalsAway")]
    goals_away: String,
}

pub fn read_table_csv(
    path: &Path,
    season: Season,
    tier: Tier,
    aliases: &HashMap<String, String>,
) -> anyhow::Result<LeagueTable> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open table csv {}", path.display()))?;
    let mut rows = Vec::new();
    for (idx, rec) in reader.deserialize::<TableCsvRow>().enumerate() {
        let r = rec.with_context(|| format!("decode row {idx} of {}", path.display()))?;
        let parse = |raw: &str| {
            raw.parse::<GoalPair>()
                .map_err(|err| anyhow!("row {idx} of {}: {err}", path.display()))
        };
        let name = r.name.trim();
        let team = aliases.get(name).cloned().unwrap_or_else(|| name.to_string());
        rows.push(LeagueTableRow {
            rank: r.rank,
            team,
            played: r.played.unwrap_or(r.win + r.draw + r.loss),
            wins: r.win,
            draws: r.draw,
            losses: r.loss,
            goals: parse(&r.goals)?,
            points: r.points,
            home: VenueRecord {
                wins: r.win_home,
                draws: r.draw_home,
                losses: r.loss_home,
                goals: parse(&r.goals_home)?,
            },
            away: VenueRecord {
                wins: r.win_away,
                draws: r.draw_away,
                losses: r.loss_away,
                goals: parse(&r.goals_away)?,
            },
        });
    }
    rows.sort_by_key(|r| r.rank);
    Ok(LeagueTable { season, tier, rows })
}

#[cfg(test)]
mod tests {
    use super::GoalPair;

    #[test]
    fn goal_pair_parses() {
        let g: GoalPair = "55:17".parse().unwrap();
        assert_eq!(g, GoalPair { scored: 55, conceded: 17 });
        assert_eq!(g.to_string(), "55:17");
        assert_eq!(g.difference(), 38);
        assert!("55-17".parse::<GoalPair>().is_err());
        assert!(" 3 : x".parse::<GoalPair>().is_err());
    }
}
