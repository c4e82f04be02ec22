// ABOUTME: Formatting capability for dates, times and decimal numbers
// ABOUTME: Provides the Formatter trait and a chrono-based default implementation

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Locale-aware output used by the date, time and round directives.
///
/// Tiers are `short`, `medium`, `long` and `full`; implementations decide
/// what each looks like.
pub trait Formatter: fmt::Debug + Send + Sync {
    fn format_date(&self, timestamp: i64, tier: &str) -> String;

    fn format_time(&self, timestamp: i64, tier: &str) -> String;

    fn format_decimal(&self, value: f64, decimals: usize) -> String;

    /// Unix timestamp for a date-like string, `None` if it is not one
    fn parse_timestamp(&self, text: &str) -> Option<i64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultFormatter {
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
    /// Offset from UTC in minutes applied to every timestamp
    pub utc_offset_minutes: i32,
}

impl Default for DefaultFormatter {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            thousands_separator: Some(','),
            utc_offset_minutes: 0,
        }
    }
}

/// Highest precision `format_decimal` renders; larger requests are clamped
pub const MAX_DECIMALS: usize = 20;

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

impl DefaultFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_separators(mut self, decimal: char, thousands: Option<char>) -> Self {
        self.decimal_separator = decimal;
        self.thousands_separator = thousands;
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    fn localize(&self, timestamp: i64) -> Option<DateTime<FixedOffset>> {
        DateTime::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(&self.offset()))
    }

    fn render(&self, timestamp: i64, pattern: &str) -> String {
        match self.localize(timestamp) {
            Some(datetime) => datetime.format(pattern).to_string(),
            None => timestamp.to_string(),
        }
    }
}

fn date_pattern(tier: &str) -> &str {
    match tier {
        "short" => "%-m/%-d/%y",
        "long" => "%B %-d, %Y",
        "full" => "%A, %B %-d, %Y",
        "medium" | "" => "%b %-d, %Y",
        custom if is_valid_pattern(custom) => custom,
        _ => "%b %-d, %Y",
    }
}

fn time_pattern(tier: &str) -> &str {
    match tier {
        "medium" => "%-I:%M:%S %p",
        "long" | "full" => "%-I:%M:%S %p %:z",
        "short" | "" => "%-I:%M %p",
        custom if is_valid_pattern(custom) => custom,
        _ => "%-I:%M %p",
    }
}

/// Any tier that is not a known name is used as a strftime pattern
fn is_valid_pattern(pattern: &str) -> bool {
    pattern.contains('%') && StrftimeItems::new(pattern).all(|item| !matches!(item, Item::Error))
}

impl Formatter for DefaultFormatter {
    fn format_date(&self, timestamp: i64, tier: &str) -> String {
        self.render(timestamp, date_pattern(tier.trim()))
    }

    fn format_time(&self, timestamp: i64, tier: &str) -> String {
        self.render(timestamp, time_pattern(tier.trim()))
    }

    fn format_decimal(&self, value: f64, decimals: usize) -> String {
        let fixed = format!("{:.*}", decimals.min(MAX_DECIMALS), value.abs());
        let (integer, fraction) = match fixed.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (fixed.as_str(), None),
        };

        let mut grouped = String::new();
        for (index, digit) in integer.chars().enumerate() {
            if index > 0 && (integer.len() - index) % 3 == 0 {
                if let Some(separator) = self.thousands_separator {
                    grouped.push(separator);
                }
            }
            grouped.push(digit);
        }

        let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&grouped);
        if let Some(fraction) = fraction {
            out.push(self.decimal_separator);
            out.push_str(fraction);
        }
        out
    }

    fn parse_timestamp(&self, text: &str) -> Option<i64> {
        let text = text.trim();
        if let Ok(timestamp) = text.parse::<i64>() {
            return Some(timestamp);
        }
        if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
            return Some(datetime.timestamp());
        }

        let offset = self.offset();
        let naive = DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .or_else(|| {
                DATE_FORMATS.iter().find_map(|format| {
                    NaiveDate::parse_from_str(text, format)
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
            })?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(|datetime| datetime.timestamp())
    }
}
