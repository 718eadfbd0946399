use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Canonical weekday, serialized as one of the seven lowercase three-letter
/// codes (`sun`..`sat`). Variant order is Sunday-start so that
/// `Weekday::ALL[date.weekday().num_days_from_sunday()]` is the code for a
/// calendar date.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl Weekday {
    /// Sunday-start index-to-code table.
    pub const ALL: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    /// Normalizes an arbitrary day-name spelling. Accepts the usual
    /// abbreviations and full names ("weds", "thur", "Thursday", "MON");
    /// anything else is `None`. No fuzzy matching.
    pub fn parse(s: &str) -> Option<Weekday> {
        match s.trim().to_lowercase().as_str() {
            "sun" | "sunday" => Some(Weekday::Sun),
            "mon" | "monday" => Some(Weekday::Mon),
            "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
            "wed" | "weds" | "wednesday" => Some(Weekday::Wed),
            "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thu),
            "fri" | "friday" => Some(Weekday::Fri),
            "sat" | "saturday" => Some(Weekday::Sat),
            _ => None,
        }
    }

    /// Weekday of a calendar date.
    pub fn of(date: NaiveDate) -> Weekday {
        Self::ALL[date.weekday().num_days_from_sunday() as usize]
    }

    pub fn code(self) -> &'static str {
        match self {
            Weekday::Sun => "sun",
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
        }
    }

    /// Capitalized display form ("Mon"), used in error messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Weekday::Sun => "Sun",
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Builds the allowed-day set for a task from its stored day strings.
/// Entries the normalizer does not recognize are dropped, so a list with
/// only unrecognized entries yields the empty set and every submission
/// against it is rejected.
pub fn allowed_days(days: &[String]) -> BTreeSet<Weekday> {
    days.iter().filter_map(|d| Weekday::parse(d)).collect()
}

/// Renders an allowed-day set in display form: "Mon, Wed, Fri".
pub fn display_days(days: &BTreeSet<Weekday>) -> String {
    days.iter()
        .map(|d| d.display_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strict `YYYY-MM-DD` parser. The input must match the pattern
/// byte-exactly (no whitespace, no short forms) and denote a real calendar
/// date, so "2024-02-30" is rejected rather than normalized forward.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let b = s.as_bytes();
    if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
        return None;
    }
    if !b
        .iter()
        .enumerate()
        .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
    {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[5..7].parse().ok()?;
    let day: u32 = s[8..10].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
