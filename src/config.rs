use std::env;
use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::strength::{StrengthConfig, TierSchedule};
use crate::team_history::DEFAULT_FORM_WINDOW;

const CACHE_DIR: &str = "league_features";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub db_path: Option<PathBuf>,
    pub out_dir: PathBuf,
    /// Directory of `<season>.csv` second-tier standings.
    pub second_tier_dir: PathBuf,
    pub form_window: usize,
    pub strength: StrengthConfig,
    /// When set, a season whose team match counts differ is rejected.
    pub expected_matches_per_team: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            out_dir: PathBuf::from("team_data"),
            second_tier_dir: PathBuf::from("table/second_tier"),
            form_window: DEFAULT_FORM_WINDOW,
            strength: StrengthConfig::default(),
            expected_matches_per_team: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let form_window = env::var("FORM_WINDOW")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(defaults.form_window)
            .clamp(1, 38);
        let top_teams = env::var("TOP_TIER_TEAMS")
            .ok()
            .and_then(|val| val.trim().parse::<u32>().ok())
            .unwrap_or(defaults.strength.top.teams)
            .clamp(2, 40);
        let second_teams = env::var("SECOND_TIER_TEAMS")
            .ok()
            .and_then(|val| val.trim().parse::<u32>().ok())
            .unwrap_or(defaults.strength.second.teams)
            .clamp(2, 40);
        let expected_matches_per_team = opt_env("EXPECTED_MATCHES_PER_TEAM")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .filter(|n| *n > 0);

        Self {
            db_path: opt_env("FEATURES_DB_PATH").map(PathBuf::from),
            out_dir: opt_env("FEATURES_OUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.out_dir),
            second_tier_dir: opt_env("FEATURES_SECOND_TIER_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.second_tier_dir),
            form_window,
            strength: StrengthConfig {
                top: TierSchedule { teams: top_teams },
                second: TierSchedule { teams: second_teams },
            },
            expected_matches_per_team,
        }
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|val| {
        if val.trim().is_empty() {
            None
        } else {
            Some(val)
        }
    })
}

/// `$XDG_CACHE_HOME/league_features`, falling back to `~/.cache/league_features`.
pub fn app_cache_dir() -> Option<PathBuf> {
    if let Some(base) = opt_env("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = opt_env("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

/// Loads `.env.local` then `.env`, and installs the fmt subscriber.
/// `RUST_LOG` overrides `default_filter`.
pub fn init_runtime(default_filter: &str) {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_target(false))
        .init();
}
