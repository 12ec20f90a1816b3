//! Wire types returned by the source gateway.

use chrono::{DateTime, Utc};
use reelscope_core::{canonical_url, extract_hashtags, ChannelSignals, PostType, ProfileStats};
use serde::{Deserialize, Serialize};

/// Profile metadata for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    #[serde(alias = "username")]
    pub handle: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub follower_count: Option<i64>,
    #[serde(default)]
    pub media_count: Option<i64>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_verified: bool,
}

impl SourceProfile {
    /// Inputs for channel scoring.
    #[must_use]
    pub fn signals(&self) -> ChannelSignals<'_> {
        ChannelSignals {
            handle: &self.handle,
            biography: self.biography.as_deref(),
            is_verified: self.is_verified,
            is_private: self.is_private,
            follower_count: self.follower_count,
            media_count: self.media_count,
        }
    }

    /// The stats persisted on the channel row.
    #[must_use]
    pub fn stats(&self) -> ProfileStats {
        ProfileStats {
            follower_count: self.follower_count,
            media_count: self.media_count,
            biography: self.biography.clone(),
            is_verified: self.is_verified,
        }
    }
}

/// One post as listed by the source, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePost {
    #[serde(alias = "code")]
    pub shortcode: String,
    /// Platform media type; 0 when the gateway leaves it out.
    #[serde(default)]
    pub media_type: u8,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default, alias = "caption_text")]
    pub caption: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub like_count: Option<i64>,
    #[serde(default)]
    pub taken_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "video_duration")]
    pub video_duration_secs: Option<f64>,
    #[serde(default, alias = "url")]
    pub permalink: Option<String>,
}

impl SourcePost {
    /// Classifies by media type, falling back to the permalink's path when
    /// the media type is missing or unrecognised.
    #[must_use]
    pub fn post_type(&self) -> PostType {
        match PostType::from_media_type(self.media_type, self.product_type.as_deref()) {
            PostType::Unknown => self
                .permalink
                .as_deref()
                .map_or(PostType::Unknown, PostType::from_url),
            known => known,
        }
    }

    #[must_use]
    pub fn url(&self) -> String {
        canonical_url(&self.shortcode, self.post_type())
    }

    /// Hashtags from the payload, or parsed from the caption when absent.
    #[must_use]
    pub fn resolved_hashtags(&self) -> Vec<String> {
        if !self.hashtags.is_empty() {
            return self.hashtags.clone();
        }
        self.caption
            .as_deref()
            .map(extract_hashtags)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostsResponse {
    pub posts: Vec<SourcePost>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionResponse {
    pub token: String,
}
