use std::{fmt::Display, str::FromStr};

use anyhow::anyhow;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// This is the standard way of converting a date to a string in dailystreak.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Wall-clock time of day a reminder is due at. Stored and parsed as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReminderTime(NaiveTime);

impl ReminderTime {
    pub fn new_opt(hour: u32, minute: u32) -> Option<ReminderTime> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(ReminderTime)
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    /// Next moment matching this time of day. A time that has already passed today targets
    /// tomorrow, anything else (including exactly now) targets today.
    pub fn next_occurrence(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.0);
        if today < now {
            today + Duration::days(1)
        } else {
            today
        }
    }
}

impl Display for ReminderTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ReminderTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hours, minutes) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| anyhow!("Expected time as HH:MM, got {s}"))?;
        let hours = hours.parse::<u32>()?;
        let minutes = minutes.parse::<u32>()?;
        ReminderTime::new_opt(hours, minutes).ok_or_else(|| anyhow!("{s} is not a valid time of day"))
    }
}

impl Serialize for ReminderTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReminderTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use super::ReminderTime;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            NaiveTime::from_hms_opt(hour, minute, 30).unwrap(),
        )
    }

    #[test]
    fn parses_and_prints_padded() -> Result<()> {
        let time: ReminderTime = "9:05".parse()?;
        assert_eq!(time.to_string(), "09:05");
        assert!("24:00".parse::<ReminderTime>().is_err());
        assert!("0900".parse::<ReminderTime>().is_err());
        Ok(())
    }

    #[test]
    fn earlier_time_targets_tomorrow() -> Result<()> {
        let time: ReminderTime = "08:00".parse()?;
        let next = time.next_occurrence(at(12, 0));
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(next.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        Ok(())
    }

    #[test]
    fn later_time_targets_today() -> Result<()> {
        let time: ReminderTime = "21:15".parse()?;
        let next = time.next_occurrence(at(12, 0));
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(next.time(), NaiveTime::from_hms_opt(21, 15, 0).unwrap());
        Ok(())
    }

    #[test]
    fn same_minute_already_passed_by_seconds_targets_tomorrow() -> Result<()> {
        let time: ReminderTime = "12:00".parse()?;
        let next = time.next_occurrence(at(12, 0));
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        Ok(())
    }

    #[test]
    fn serializes_as_string() -> Result<()> {
        let time: ReminderTime = "07:30".parse()?;
        assert_eq!(serde_json::to_string(&time)?, "\"07:30\"");
        assert_eq!(serde_json::from_str::<ReminderTime>("\"07:30\"")?, time);
        Ok(())
    }
}
