//! Queue entries and the classification of discovered posts.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::UnknownVariant;

/// Lifecycle state of a queued post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "processing" => Ok(ItemStatus::Processing),
            "completed" => Ok(ItemStatus::Completed),
            "failed" => Ok(ItemStatus::Failed),
            other => Err(UnknownVariant {
                kind: "item status",
                value: other.to_string(),
            }),
        }
    }
}

/// Shape of a post's media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Post,
    Reel,
    Video,
    Album,
    Unknown,
}

impl PostType {
    /// Classify from the source's numeric media type and optional product type.
    #[must_use]
    pub fn from_media_type(media_type: u8, product_type: Option<&str>) -> Self {
        match (media_type, product_type) {
            (1, _) => PostType::Post,
            (2, Some("clips")) => PostType::Reel,
            (2, _) => PostType::Video,
            (8, _) => PostType::Album,
            _ => PostType::Unknown,
        }
    }

    /// Classify from a post URL by its path segment.
    ///
    /// Each pattern is matched on its own; a URL that carries none of them is
    /// `Unknown`.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        const PATTERNS: [(&str, PostType); 5] = [
            ("/reel/", PostType::Reel),
            ("/reels/", PostType::Reel),
            ("/tv/", PostType::Video),
            ("/p/", PostType::Post),
            ("/post/", PostType::Post),
        ];
        PATTERNS
            .iter()
            .find(|(pattern, _)| url.contains(pattern))
            .map_or(PostType::Unknown, |(_, kind)| *kind)
    }

    /// Post types whose media is stills rather than video.
    #[must_use]
    pub fn is_image_type(self) -> bool {
        matches!(self, PostType::Post | PostType::Album)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PostType::Post => "post",
            PostType::Reel => "reel",
            PostType::Video => "video",
            PostType::Album => "album",
            PostType::Unknown => "unknown",
        }
    }

    fn url_segment(self) -> &'static str {
        match self {
            PostType::Reel => "reel",
            _ => "p",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(PostType::Post),
            "reel" => Ok(PostType::Reel),
            "video" => Ok(PostType::Video),
            "album" => Ok(PostType::Album),
            "unknown" => Ok(PostType::Unknown),
            other => Err(UnknownVariant {
                kind: "post type",
                value: other.to_string(),
            }),
        }
    }
}

/// Public URL of a post on the platform.
#[must_use]
pub fn canonical_url(shortcode: &str, post_type: PostType) -> String {
    format!(
        "https://www.instagram.com/{}/{shortcode}/",
        post_type.url_segment()
    )
}

/// Hashtag names (without `#`) in order of first appearance.
#[must_use]
pub fn extract_hashtags(caption: &str) -> Vec<String> {
    static HASHTAG: OnceLock<Regex> = OnceLock::new();
    let re = HASHTAG
        .get_or_init(|| Regex::new(r"#([\p{L}\p{N}_]+)").expect("valid hashtag regex"));

    let mut tags: Vec<String> = Vec::new();
    for cap in re.captures_iter(caption) {
        let tag = cap[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// One discovered post: queue entry plus, once processed, its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentItem {
    pub shortcode: String,
    pub source_url: String,
    pub channel_handle: String,
    pub status: ItemStatus,
    pub priority: u8,
    pub post_type: PostType,
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    pub like_count: Option<i64>,
    pub video_duration_secs: Option<f64>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub final_summary_report: Option<String>,
    pub structured_summary: Option<serde_json::Value>,
    pub processing_metadata: Option<serde_json::Value>,
    pub error_message: Option<String>,
}
