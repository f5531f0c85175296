use std::path::PathBuf;

use league_features::match_store::{self, SeasonMatches};
use league_features::league_table::{self, LeagueTable, Tier};
use league_features::pipeline::top_tier_table;
use league_features::strength::{
    LineageHints, StrengthConfig, StrengthSet, TierSchedule, attach_strength, league_averages,
};
use league_features::team_history::build_team_history;
use league_features::{FeatureError, Season};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn season(code: &str) -> Season {
    code.parse().expect("season code")
}

fn mini(code: &str) -> SeasonMatches {
    match_store::read_clean_csv(&fixture_path("mini_season.csv"), season(code))
        .expect("fixture should parse")
}

fn four_team_config() -> StrengthConfig {
    StrengthConfig {
        top: TierSchedule { teams: 4 },
        second: TierSchedule { teams: 24 },
    }
}

fn prior_top() -> LeagueTable {
    top_tier_table(&mini("1920"), 5).expect("prior standings")
}

fn second_tier() -> LeagueTable {
    league_table::read_table_csv(
        &fixture_path("second_tier_1920.csv"),
        season("1920"),
        Tier::Second,
        &league_table::default_aliases(),
    )
    .expect("second tier fixture should parse")
}

fn close(a: Option<f64>, b: f64) -> bool {
    a.is_some_and(|a| (a - b).abs() < 1e-9)
}

#[test]
fn league_averages_use_schedule_constants() {
    let avg = league_averages(&prior_top(), TierSchedule { teams: 4 });
    assert!((avg.home_scored - 17.0 / 12.0).abs() < 1e-9);
    assert!((avg.away_scored - 13.0 / 12.0).abs() < 1e-9);
    // Home conceded is away scored, seen from the other side.
    assert!((avg.home_conceded - avg.away_scored).abs() < 1e-9);
}

#[test]
fn coefficients_follow_fixture_venue() {
    let top = prior_top();
    let set = StrengthSet::compute(season("2021"), Some(&top), None, &four_team_config())
        .expect("strength set");
    let hints = LineageHints::new();

    let alpha = set.resolve(season("2021"), "Alpha", &hints).expect("alpha");
    assert!(close(alpha.home.attack, 24.0 / 17.0));
    assert!(close(alpha.home.defense, 8.0 / 13.0));
    assert!(close(alpha.away.attack, 28.0 / 13.0));
    assert!(close(alpha.away.defense, 12.0 / 17.0));

    let history = build_team_history(&mini("2021"), "Alpha", 5).expect("history");
    let table = attach_strength(history, &set, &hints).expect("attach");

    // Alpha hosts Beta first: Alpha's home figures against Beta's away figures.
    let first = table.rows[0].strength;
    let own = first.own.expect("own strength");
    let opp = first.opponent.expect("opponent strength");
    assert!(close(own.attack, 24.0 / 17.0));
    assert!(close(opp.attack, 8.0 / 13.0));
    assert!(!own.from_second_tier);

    // Second fixture is away at Delta.
    let second = table.rows[1].strength.own.expect("own strength");
    assert!(close(second.attack, 28.0 / 13.0));
}

#[test]
fn missing_team_is_reported_not_defaulted() {
    let top = prior_top();
    let set = StrengthSet::compute(season("2021"), Some(&top), None, &four_team_config())
        .expect("strength set");
    let err = set
        .resolve(season("2021"), "Epsilon", &LineageHints::new())
        .expect_err("no prior data");
    assert!(matches!(err, FeatureError::MissingPriorSeasonData { .. }));

    let missing = set.missing(season("2021"), &["Alpha".to_string(), "Epsilon".to_string()]);
    assert_eq!(missing.len(), 1);

    let empty = StrengthSet::default();
    let history = build_team_history(&mini("2021"), "Alpha", 5).expect("history");
    let table = attach_strength(history, &empty, &LineageHints::new()).expect("attach");
    assert!(table.rows.iter().all(|r| r.strength.own.is_none()));
    assert!(table.rows.iter().all(|r| r.strength.opponent.is_none()));
}

#[test]
fn team_in_both_tiers_needs_a_hint() {
    let top = prior_top();
    let second = second_tier();
    let set = StrengthSet::compute(season("2021"), Some(&top), Some(&second), &four_team_config())
        .expect("strength set");
    assert_eq!(set.collisions(), vec!["Gamma"]);

    let err = set
        .resolve(season("2021"), "Gamma", &LineageHints::new())
        .expect_err("ambiguous lineage");
    assert!(matches!(err, FeatureError::AmbiguousJoin { matches: 2, .. }));

    let hints = LineageHints::from([("Gamma".to_string(), Tier::Second)]);
    let gamma = set.resolve(season("2021"), "Gamma", &hints).expect("hinted");
    assert!(gamma.from_second_tier());
    assert_eq!(gamma.rank, 2);

    // Unhinted ambiguity surfaces through attachment as an error.
    let history = build_team_history(&mini("2021"), "Gamma", 5).expect("history");
    assert!(attach_strength(history, &set, &LineageHints::new()).is_err());
}

#[test]
fn wrong_prior_season_is_rejected() {
    let top = top_tier_table(&mini("1819"), 5).expect("standings");
    let err = StrengthSet::compute(season("2021"), Some(&top), None, &four_team_config());
    assert!(matches!(err, Err(FeatureError::MalformedInput { .. })));
}

#[test]
fn second_tier_csv_applies_aliases() {
    let table = second_tier();
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.rows[0].team, "Wolves");
    assert_eq!(table.rows[0].played, 46);
    assert_eq!(table.rows[0].goals.scored, 82);
    assert_eq!(table.rows[0].home.goals.conceded, 15);
    assert!(table.get("Wolverhampton").is_none());
}
