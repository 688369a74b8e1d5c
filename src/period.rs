use chrono::{Duration, NaiveDate};
use serde::Serialize;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive date window. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub const ALL: DateRange = DateRange {
        from: None,
        to: None,
    };

    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |f| date >= f) && self.to.map_or(true, |t| date <= t)
    }

    /// Keeps the dates inside the window, preserving order. An inverted window keeps nothing.
    pub fn filter(&self, dates: &[NaiveDate]) -> Vec<NaiveDate> {
        dates.iter().copied().filter(|d| self.contains(*d)).collect()
    }
}

/// Preset windows offered by the chat menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    All,
    Week,
    Month,
}

impl Period {
    pub fn parse(s: &str) -> Option<Period> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Period::All),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            _ => None,
        }
    }

    pub fn range_ending(self, today: NaiveDate) -> DateRange {
        match self {
            Period::All => DateRange::ALL,
            Period::Week => DateRange::new(Some(today - Duration::days(7)), Some(today)),
            Period::Month => DateRange::new(Some(today - Duration::days(30)), Some(today)),
        }
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// Short day.month label used in chart ticks and sheet headers.
pub fn short_label(date: NaiveDate) -> String {
    date.format("%d.%m").to_string()
}
