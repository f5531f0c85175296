use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{FeatureError, Result};
use crate::form::{self, FormRow, SeasonForm};
use crate::league_table::{self, LeagueTable, Tier};
use crate::match_store::SeasonMatches;
use crate::rival::{self, RivalRow};
use crate::season::Season;
use crate::strength::{self, LineageHints, StrengthRow, StrengthSet};
use crate::team_history::{self, HistoryRow, TeamTable};

pub type FeatureRow = RivalRow<FormRow<StrengthRow>>;
pub type FeatureTable = TeamTable<FeatureRow>;

#[derive(Debug, Clone, Copy)]
pub struct SeasonInputs<'a> {
    pub matches: &'a SeasonMatches,
    pub prior_top: Option<&'a LeagueTable>,
    pub prior_second: Option<&'a LeagueTable>,
    pub hints: &'a LineageHints,
}

#[derive(Debug, Clone)]
pub struct SeasonFeatures {
    pub season: Season,
    /// One table per team, sorted by team name.
    pub tables: Vec<FeatureTable>,
    pub league_table: LeagueTable,
    pub form: SeasonForm,
    /// Teams without prior-season strength (coefficients left undefined).
    pub missing_strength: Vec<FeatureError>,
}

/// Final top-tier standings of a season, from its own match table.
pub fn top_tier_table(data: &SeasonMatches, window: usize) -> Result<LeagueTable> {
    let histories = team_history::build_season_histories(data, window)?;
    Ok(league_table::from_histories(data.season, Tier::Top, &histories))
}

pub fn run_season(inputs: SeasonInputs<'_>, config: &PipelineConfig) -> Result<SeasonFeatures> {
    let histories = season_histories(inputs.matches, config)?;
    finish_season(inputs, histories, config)
}

fn season_histories(
    data: &SeasonMatches,
    config: &PipelineConfig,
) -> Result<Vec<TeamTable<HistoryRow>>> {
    if let Some(expected) = config.expected_matches_per_team {
        data.check_schedule(expected)?;
    }
    for (team, date) in data.same_day_collisions() {
        warn!(season = %data.season, team = %team, %date, "team listed twice on one date");
    }
    team_history::build_season_histories(data, config.form_window)
}

fn finish_season(
    inputs: SeasonInputs<'_>,
    histories: Vec<TeamTable<HistoryRow>>,
    config: &PipelineConfig,
) -> Result<SeasonFeatures> {
    let season = inputs.matches.season;
    let table = league_table::from_histories(season, Tier::Top, &histories);
    let teams = histories.iter().map(|t| t.team.clone()).collect::<Vec<_>>();

    let strengths = StrengthSet::compute(
        season,
        inputs.prior_top,
        inputs.prior_second,
        &config.strength,
    )?;
    let missing_strength = strengths.missing(season, &teams);
    for err in &missing_strength {
        warn!(%season, "{err}");
    }

    let with_strength = histories
        .into_par_iter()
        .map(|t| strength::attach_strength(t, &strengths, inputs.hints))
        .collect::<Result<Vec<_>>>()?;

    let form = form::standardize(season, &with_strength);
    let with_form = with_strength
        .into_iter()
        .map(|t| form.attach(t))
        .collect::<Vec<_>>();

    let tables = rival::join_rivals(with_form)?;
    info!(%season, teams = tables.len(), "season features built");

    Ok(SeasonFeatures {
        season,
        tables,
        league_table: table,
        form,
        missing_strength,
    })
}

/// Runs every season of `seasons`. A season's prior top-tier standings come
/// from the previous season, taken from `seasons` or else from `priors`;
/// `priors` only feed standings and produce no output. Second-tier standings
/// come from `second_tier`, keyed by the season they describe.
///
/// A failing season does not stop the others.
pub fn run_seasons(
    seasons: &[SeasonMatches],
    priors: &[SeasonMatches],
    second_tier: &HashMap<Season, LeagueTable>,
    hints: &HashMap<Season, LineageHints>,
    config: &PipelineConfig,
) -> Vec<(Season, Result<SeasonFeatures>)> {
    let prepared = seasons
        .par_iter()
        .map(|data| (data, season_histories(data, config)))
        .collect::<Vec<_>>();

    let mut top_tables = prepared
        .iter()
        .filter_map(|(data, histories)| {
            let histories = histories.as_ref().ok()?;
            Some((
                data.season,
                league_table::from_histories(data.season, Tier::Top, histories),
            ))
        })
        .collect::<HashMap<_, _>>();
    let prior_tables = priors
        .par_iter()
        .filter(|data| !seasons.iter().any(|s| s.season == data.season))
        .filter_map(|data| match top_tier_table(data, config.form_window) {
            Ok(table) => Some((data.season, table)),
            Err(err) => {
                warn!(season = %data.season, "standings unavailable: {err}");
                None
            }
        })
        .collect::<Vec<_>>();
    top_tables.extend(prior_tables);

    let no_hints = LineageHints::new();
    let mut out = prepared
        .into_par_iter()
        .map(|(data, histories)| {
            let prior = data.season.previous();
            let inputs = SeasonInputs {
                matches: data,
                prior_top: prior.and_then(|p| top_tables.get(&p)),
                prior_second: prior.and_then(|p| second_tier.get(&p)),
                hints: hints.get(&data.season).unwrap_or(&no_hints),
            };
            (
                data.season,
                histories.and_then(|h| finish_season(inputs, h, config)),
            )
        })
        .collect::<Vec<_>>();
    out.sort_by_key(|(season, _)| *season);
    out
}
