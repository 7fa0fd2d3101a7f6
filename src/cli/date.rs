use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use super::Args;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Turns user input like "yesterday", "2 days ago" or "15/03/2025" into a calendar day relative
/// to `now`. Failures are reported the same way clap reports invalid arguments.
pub fn parse_day(input: &str, now: DateTime<Local>, style: DateStyle) -> Result<NaiveDate> {
    match parse_date_string(input, now, style.into()) {
        Ok(v) => Ok(v.date_naive()),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {input:?}: {e}"),
            )
            .into()),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Local, NaiveDate, TimeZone};

    use super::{parse_day, DateStyle};

    #[test]
    fn relative_days_follow_now() -> Result<()> {
        let now = Local.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        assert_eq!(
            parse_day("yesterday", now, DateStyle::Uk)?,
            NaiveDate::from_ymd_opt(2024, 5, 19).unwrap()
        );
        Ok(())
    }

    #[test]
    fn style_decides_day_and_month_order() -> Result<()> {
        let now = Local.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        assert_eq!(
            parse_day("03/04/2024", now, DateStyle::Uk)?,
            NaiveDate::from_ymd_opt(2024, 4, 3).unwrap()
        );
        assert_eq!(
            parse_day("03/04/2024", now, DateStyle::Us)?,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        let now = Local.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        assert!(parse_day("not a date at all", now, DateStyle::Uk).is_err());
    }
}
