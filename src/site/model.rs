// src/site/model.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub type SiteId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteStatus {
    #[default]
    Unknown,
    Up,
    Down,
    Blocked,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Unknown => "Unknown",
            SiteStatus::Up => "Up",
            SiteStatus::Down => "Down",
            SiteStatus::Blocked => "Blocked",
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unknown" => Ok(SiteStatus::Unknown),
            "Up" => Ok(SiteStatus::Up),
            "Down" => Ok(SiteStatus::Down),
            "Blocked" => Ok(SiteStatus::Blocked),
            other => Err(format!("unknown site status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub url: String,
    pub status: SiteStatus,
    /// `None` until the first completed check.
    pub last_checked: Option<DateTime<Utc>>,
}

impl Site {
    /// True when the site has never been checked or its last check is at
    /// least `threshold` old. A timestamp ahead of `now` counts as fresh.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match self.last_checked {
            None => true,
            Some(last) => match (now - last).to_std() {
                Ok(age) => age >= threshold,
                Err(_) => false,
            },
        }
    }

    /// Overwrite status and timestamp together. The timestamp never moves
    /// backwards.
    pub fn record_check(&mut self, status: SiteStatus, at: DateTime<Utc>) {
        self.status = status;
        self.last_checked = Some(match self.last_checked {
            Some(previous) if previous > at => previous,
            _ => at,
        });
    }
}

/// Body accepted by `POST /add_site`. Any `status` or `id` sent by the
/// client is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSite {
    pub url: String,
}
