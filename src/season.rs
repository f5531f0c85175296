use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A league season keyed by its four-digit code, e.g. `1920` for 2019/20.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Season {
    start: u8,
}

impl Season {
    /// `start` is the two-digit year the season starts in (`19` for 2019/20).
    pub fn new(start: u8) -> Option<Self> {
        if start > 98 {
            return None;
        }
        Some(Self { start })
    }

    pub fn start_year(&self) -> u8 {
        self.start
    }

    /// The immediately preceding season, or `None` before 00/01.
    pub fn previous(&self) -> Option<Season> {
        self.start.checked_sub(1).map(|start| Season { start })
    }

    pub fn next(&self) -> Option<Season> {
        Season::new(self.start + 1)
    }

    pub fn code(&self) -> String {
        format!("{:02}{:02}", self.start, self.start + 1)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.start, self.start + 1)
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        // Accept "1920", "2019/20", "2019-2020".
        let (first, second) = match digits.len() {
            4 => (&digits[0..2], &digits[2..4]),
            6 => (&digits[2..4], &digits[4..6]),
            8 => (&digits[2..4], &digits[6..8]),
            _ => return Err(format!("unrecognised season code {raw:?}")),
        };
        let start = first
            .parse::<u8>()
            .map_err(|_| format!("bad season start in {raw:?}"))?;
        let end = second
            .parse::<u8>()
            .map_err(|_| format!("bad season end in {raw:?}"))?;
        if end != start + 1 {
            return Err(format!("season {raw:?} does not span consecutive years"));
        }
        Season::new(start).ok_or_else(|| format!("season {raw:?} out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::Season;

    #[test]
    fn parses_common_forms() {
        let s: Season = "1920".parse().unwrap();
        assert_eq!(s.start_year(), 19);
        assert_eq!("2019/20".parse::<Season>().unwrap(), s);
        assert_eq!("2019-2020".parse::<Season>().unwrap(), s);
        assert!("1921".parse::<Season>().is_err());
        assert!("abc".parse::<Season>().is_err());
    }

    #[test]
    fn previous_and_display() {
        let s: Season = "1011".parse().unwrap();
        assert_eq!(s.previous().unwrap().to_string(), "0910");
        assert_eq!(s.code(), "1011");
        assert!("0001".parse::<Season>().unwrap().previous().is_none());
    }
}
