use std::fmt;

/// Whether a value includes the fixture it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    /// Includes the fixture itself (its own result, cumulative-through-now).
    AsOf,
    /// Strictly before the fixture.
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Overall,
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Match,
    Cumulative,
    /// The last `n` fixtures of the scope.
    Recent(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Points,
    Goals,
    Conceded,
    /// Points over the maximum obtainable in the same window.
    PointRatio,
    /// Cross-team z-score of cumulative points.
    StandardizedPoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureKey {
    pub timing: Timing,
    pub scope: Scope,
    pub window: Window,
    pub metric: Metric,
}

impl FeatureKey {
    pub const fn trailing(scope: Scope, window: Window, metric: Metric) -> Self {
        Self {
            timing: Timing::Trailing,
            scope,
            window,
            metric,
        }
    }

    pub const fn as_of(window: Window, metric: Metric) -> Self {
        Self {
            timing: Timing::AsOf,
            scope: Scope::Overall,
            window,
            metric,
        }
    }

    /// Flat column name, e.g. `trailing_home_last5_points` or `asof_cum_points`.
    pub fn column_name(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(4);
        parts.push(
            match self.timing {
                Timing::AsOf => "asof",
                Timing::Trailing => "trailing",
            }
            .to_string(),
        );
        match self.scope {
            Scope::Overall => {}
            Scope::Home => parts.push("home".to_string()),
            Scope::Away => parts.push("away".to_string()),
        }
        match self.window {
            Window::Match => {}
            Window::Cumulative => parts.push("cum".to_string()),
            Window::Recent(n) => parts.push(format!("last{n}")),
        }
        parts.push(
            match self.metric {
                Metric::Points => "points",
                Metric::Goals => "goals",
                Metric::Conceded => "conceded",
                Metric::PointRatio => "point_ratio",
                Metric::StandardizedPoints => "std_points",
            }
            .to_string(),
        );
        parts.join("_")
    }

    pub fn opponent_column_name(&self) -> String {
        format!("opponent_{}", self.column_name())
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_are_distinct_by_timing() {
        let trailing = FeatureKey::trailing(Scope::Overall, Window::Cumulative, Metric::Points);
        let as_of = FeatureKey::as_of(Window::Cumulative, Metric::Points);
        assert_eq!(trailing.column_name(), "trailing_cum_points");
        assert_eq!(as_of.column_name(), "asof_cum_points");
        assert_eq!(
            FeatureKey::trailing(Scope::Away, Window::Recent(5), Metric::PointRatio).column_name(),
            "trailing_away_last5_point_ratio"
        );
        assert_eq!(
            FeatureKey::as_of(Window::Match, Metric::Goals).opponent_column_name(),
            "opponent_asof_goals"
        );
    }
}
