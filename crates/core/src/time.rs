use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidQuery;

/// Zone used to turn stored UTC timestamps into local calendar dates.
///
/// `Local` follows the host zone (including DST); a fixed offset is what
/// deployments pin when the server runs in UTC but users do not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timezone {
    #[default]
    Local,
    FixedOffset {
        minutes: i32,
    },
}

impl Timezone {
    pub fn utc() -> Self {
        Timezone::FixedOffset { minutes: 0 }
    }

    pub fn fixed_hours(hours: i32) -> Self {
        Timezone::FixedOffset {
            minutes: hours * 60,
        }
    }
}

impl FromStr for Timezone {
    type Err = InvalidQuery;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let invalid = || {
            InvalidQuery::new("timezone", "expected \"local\", \"utc\" or an offset like +05:30")
                .with_value(trimmed)
        };
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => return Ok(Timezone::Local),
            "utc" | "z" => return Ok(Timezone::utc()),
            _ => {}
        }
        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
            return Err(invalid());
        }
        Ok(Timezone::FixedOffset {
            minutes: sign * (hours * 60 + minutes),
        })
    }
}

impl TryFrom<String> for Timezone {
    type Error = InvalidQuery;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timezone> for String {
    fn from(value: Timezone) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timezone::Local => f.write_str("local"),
            Timezone::FixedOffset { minutes } => {
                let sign = if *minutes < 0 { '-' } else { '+' };
                let abs = minutes.abs();
                write!(f, "{}{:02}:{:02}", sign, abs / 60, abs % 60)
            }
        }
    }
}
