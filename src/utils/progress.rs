use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Deserializer, Serialize};

/// Completion of a habit for a single day, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Progress(u8);

impl Progress {
    pub const COMPLETE: Progress = Progress(100);

    pub fn new_opt(value: u8) -> Option<Progress> {
        if value > 100 {
            None
        } else {
            Some(Progress(value))
        }
    }

    pub fn is_complete(&self) -> bool {
        *self == Self::COMPLETE
    }
}

impl Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl FromStr for Progress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // This means that 100%% also works, but I think I'm fine with that
        let s = s.trim().trim_end_matches("%");
        let v = s.parse::<u8>()?;
        Progress::new_opt(v).ok_or_else(|| anyhow!("Progress has to be between 0 and 100, got {s}"))
    }
}

impl<'de> Deserialize<'de> for Progress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Progress::new_opt(value)
            .ok_or_else(|| serde::de::Error::custom(format!("progress {value} is above 100")))
    }
}

impl Deref for Progress {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::Progress;

    #[test]
    fn parses_with_and_without_percent() -> Result<()> {
        assert_eq!("75".parse::<Progress>()?, Progress::new_opt(75).unwrap());
        assert_eq!("100%".parse::<Progress>()?, Progress::COMPLETE);
        assert!("101".parse::<Progress>().is_err());
        assert!("-5".parse::<Progress>().is_err());
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Progress>("150").is_err());
        assert_eq!(serde_json::from_str::<Progress>("25").ok(), Progress::new_opt(25));
    }
}
