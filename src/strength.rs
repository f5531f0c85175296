use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FeatureError, Result};
use crate::league_table::{LeagueTable, Tier};
use crate::season::Season;
use crate::team_history::{FixtureRow, HistoryRow, TeamTable, Venue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSchedule {
    pub teams: u32,
}

impl TierSchedule {
    pub fn season_matches(&self) -> u32 {
        self.teams * self.teams.saturating_sub(1)
    }

    /// Home (or away) matches each team plays.
    pub fn venue_matches(&self) -> u32 {
        self.teams.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrengthConfig {
    pub top: TierSchedule,
    pub second: TierSchedule,
}

impl Default for StrengthConfig {
    fn default() -> Self {
        Self {
            top: TierSchedule { teams: 20 },
            second: TierSchedule { teams: 24 },
        }
    }
}

impl StrengthConfig {
    pub fn schedule(&self, tier: Tier) -> TierSchedule {
        match tier {
            Tier::Top => self.top,
            Tier::Second => self.second,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeagueAverages {
    pub home_scored: f64,
    pub home_conceded: f64,
    pub away_scored: f64,
    pub away_conceded: f64,
}

pub fn league_averages(table: &LeagueTable, schedule: TierSchedule) -> LeagueAverages {
    let matches = f64::from(schedule.season_matches());
    let total = |f: fn(&crate::league_table::LeagueTableRow) -> u32| {
        f64::from(table.rows.iter().map(f).sum::<u32>()) / matches
    };
    LeagueAverages {
        home_scored: total(|r| r.home.goals.scored),
        home_conceded: total(|r| r.home.goals.conceded),
        away_scored: total(|r| r.away.goals.scored),
        away_conceded: total(|r| r.away.goals.conceded),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VenueStrength {
    /// `None` when the league-wide rate is zero.
    pub attack: Option<f64>,
    pub defense: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrengthCoefficient {
    pub team: String,
    pub prior_season: Season,
    pub source_tier: Tier,
    pub rank: u32,
    pub home: VenueStrength,
    pub away: VenueStrength,
}

impl StrengthCoefficient {
    pub fn at(&self, venue: Venue) -> VenueStrength {
        match venue {
            Venue::Home => self.home,
            Venue::Away => self.away,
        }
    }

    pub fn from_second_tier(&self) -> bool {
        self.source_tier == Tier::Second
    }
}

fn ratio(team_avg: f64, league_avg: f64) -> Option<f64> {
    (league_avg > 0.0).then(|| team_avg / league_avg)
}

pub fn tier_strengths(table: &LeagueTable, schedule: TierSchedule) -> Vec<StrengthCoefficient> {
    let league = league_averages(table, schedule);
    let per_venue = f64::from(schedule.venue_matches());
    table
        .rows
        .iter()
        .map(|row| {
            let avg = |goals: u32| f64::from(goals) / per_venue;
            StrengthCoefficient {
                team: row.team.clone(),
                prior_season: table.season,
                source_tier: table.tier,
                rank: row.rank,
                home: VenueStrength {
                    attack: ratio(avg(row.home.goals.scored), league.home_scored),
                    defense: ratio(avg(row.home.goals.conceded), league.home_conceded),
                },
                away: VenueStrength {
                    attack: ratio(avg(row.away.goals.scored), league.away_scored),
                    defense: ratio(avg(row.away.goals.conceded), league.away_conceded),
                },
            }
        })
        .collect()
}

/// Prior tier each team is known to have played in; resolves teams that
/// appear in both prior tables.
pub type LineageHints = HashMap<String, Tier>;

#[derive(Debug, Clone, Default)]
pub struct StrengthSet {
    entries: HashMap<String, Vec<StrengthCoefficient>>,
}

impl StrengthSet {
    /// `top` and `second` must be the tables of `season.previous()`; a
    /// missing table contributes no coefficients.
    pub fn compute(
        season: Season,
        top: Option<&LeagueTable>,
        second: Option<&LeagueTable>,
        config: &StrengthConfig,
    ) -> Result<Self> {
        let mut entries: HashMap<String, Vec<StrengthCoefficient>> = HashMap::new();
        for table in [top, second].into_iter().flatten() {
            if Some(table.season) != season.previous() {
                return Err(FeatureError::MalformedInput {
                    season,
                    record: format!("{} tier table {}", table.tier, table.season),
                    reason: "strength needs the immediately preceding season".to_string(),
                });
            }
            let coefficients = tier_strengths(table, config.schedule(table.tier));
            debug!(%season, tier = %table.tier, teams = coefficients.len(), "tier strengths");
            for c in coefficients {
                entries.entry(c.team.clone()).or_default().push(c);
            }
        }
        Ok(Self { entries })
    }

    pub fn candidates(&self, team: &str) -> &[StrengthCoefficient] {
        self.entries.get(team).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn collisions(&self) -> Vec<&str> {
        let mut out = self
            .entries
            .iter()
            .filter(|(_, v)| v.len() > 1)
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>();
        out.sort_unstable();
        out
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The single coefficient for `team`. A team found in both tiers needs a
    /// lineage hint naming one of them.
    pub fn resolve(
        &self,
        season: Season,
        team: &str,
        hints: &LineageHints,
    ) -> Result<&StrengthCoefficient> {
        match self.candidates(team) {
            [] => Err(FeatureError::MissingPriorSeasonData {
                season,
                team: team.to_string(),
            }),
            [only] => Ok(only),
            many => {
                let hinted = hints.get(team).map(|tier| {
                    many.iter()
                        .filter(|c| c.source_tier == *tier)
                        .collect::<Vec<_>>()
                });
                match hinted.as_deref() {
                    Some([one]) => Ok(*one),
                    _ => Err(FeatureError::AmbiguousJoin {
                        context: "strength lineage",
                        key: format!("{team} ({season})"),
                        matches: many.len(),
                    }),
                }
            }
        }
    }

    /// Missing-coefficient errors for `teams`; ambiguity is not reported here.
    pub fn missing(&self, season: Season, teams: &[String]) -> Vec<FeatureError> {
        teams
            .iter()
            .filter(|t| self.candidates(t).is_empty())
            .map(|t| FeatureError::MissingPriorSeasonData {
                season,
                team: t.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SideStrength {
    pub attack: Option<f64>,
    pub defense: Option<f64>,
    pub from_second_tier: bool,
}

/// Venue-selected coefficients for both sides of a fixture. `None` means the
/// side has no prior-season data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FixtureStrength {
    pub own: Option<SideStrength>,
    pub opponent: Option<SideStrength>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrengthRow {
    pub base: HistoryRow,
    pub strength: FixtureStrength,
}

impl FixtureRow for StrengthRow {
    fn history(&self) -> &HistoryRow {
        &self.base
    }
}

fn side(
    set: &StrengthSet,
    season: Season,
    team: &str,
    venue: Venue,
    hints: &LineageHints,
) -> Result<Option<SideStrength>> {
    match set.resolve(season, team, hints) {
        Ok(c) => {
            let at = c.at(venue);
            Ok(Some(SideStrength {
                attack: at.attack,
                defense: at.defense,
                from_second_tier: c.from_second_tier(),
            }))
        }
        Err(FeatureError::MissingPriorSeasonData { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Attaches own and opponent coefficients to every fixture of `table`.
///
/// The team's coefficients follow its own venue; the opponent's follow the
/// opposite venue.
pub fn attach_strength(
    table: TeamTable<HistoryRow>,
    set: &StrengthSet,
    hints: &LineageHints,
) -> Result<TeamTable<StrengthRow>> {
    let season = table.season;
    let team = table.team.clone();
    let mut warned = false;
    table.try_widen(|base| {
        let own = side(set, season, &team, base.fixture.venue, hints)?;
        let opponent = side(set, season, &base.fixture.opponent, base.fixture.venue.flip(), hints)?;
        if own.is_none() && !warned {
            warn!(%season, team = %team, "no prior-season strength, coefficients left undefined");
            warned = true;
        }
        Ok(StrengthRow {
            base,
            strength: FixtureStrength { own, opponent },
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_constants() {
        let s = TierSchedule { teams: 20 };
        assert_eq!(s.season_matches(), 380);
        assert_eq!(s.venue_matches(), 19);
        let c = TierSchedule { teams: 24 };
        assert_eq!(c.season_matches(), 552);
        assert_eq!(c.venue_matches(), 23);
    }

    #[test]
    fn zero_league_rate_is_undefined() {
        assert_eq!(ratio(1.0, 0.0), None);
        assert_eq!(ratio(1.5, 1.5), Some(1.0));
    }
}
