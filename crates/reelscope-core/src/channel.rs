//! Tracked content sources and their fetch cadence.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UnknownVariant;

pub const DEFAULT_PLATFORM: &str = "instagram";

/// Topic bucket assigned to a channel at bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Tech,
    Jobs,
    Study,
    General,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Tech => "Tech",
            Category::Jobs => "Jobs",
            Category::Study => "Study",
            Category::General => "General",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Tech" => Ok(Category::Tech),
            "Jobs" => Ok(Category::Jobs),
            "Study" => Ok(Category::Study),
            "General" => Ok(Category::General),
            other => Err(UnknownVariant {
                kind: "category",
                value: other.to_string(),
            }),
        }
    }
}

/// Profile statistics captured from the source at bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub follower_count: Option<i64>,
    pub media_count: Option<i64>,
    pub biography: Option<String>,
    pub is_verified: bool,
}

/// Output of channel-level scoring: the settings a bootstrap writes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelAssessment {
    pub priority: u8,
    pub category: Category,
    pub fetch_frequency_hours: u32,
    pub posts_to_fetch: u32,
}

/// A tracked source account.
///
/// `last_fetched_shortcode` is only meaningful once `is_bootstrapped` is set;
/// the store enforces that an un-bootstrapped channel has no cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub handle: String,
    pub platform: String,
    pub is_active: bool,
    pub priority: u8,
    pub category: Category,
    pub posts_to_fetch: u32,
    pub max_posts_to_fetch: u32,
    pub fetch_frequency_hours: u32,
    pub is_bootstrapped: bool,
    pub stats: ProfileStats,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_fetched_shortcode: Option<String>,
}

impl Channel {
    /// The incremental-fetch boundary, if the channel has one.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        if self.is_bootstrapped {
            self.last_fetched_shortcode.as_deref()
        } else {
            None
        }
    }
}
