use thiserror::Error;

use crate::season::Season;

/// Data-level failures surfaced per season/team.
///
/// Undefined statistics (empty windows, zero spread) are not errors: they are
/// carried as `None` in the output columns.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("no prior-season strength entry for {team} (season {season})")]
    MissingPriorSeasonData { season: Season, team: String },

    #[error("{context}: expected exactly one row for {key}, found {matches}")]
    AmbiguousJoin {
        context: &'static str,
        key: String,
        matches: usize,
    },

    #[error("malformed input in season {season}, record {record}: {reason}")]
    MalformedInput {
        season: Season,
        record: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, FeatureError>;
