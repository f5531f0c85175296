pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod form;
pub mod league_table;
pub mod match_store;
pub mod pipeline;
pub mod rival;
pub mod season;
pub mod strength;
pub mod team_history;

pub use error::{FeatureError, Result};
pub use season::Season;
