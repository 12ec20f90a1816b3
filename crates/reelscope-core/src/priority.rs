//! Priority heuristics for channels and discovered posts.
//!
//! Both scorers are pure: they read a handful of signals and return a score
//! clamped to `1..=10`. Keyword checks are case-insensitive substring matches,
//! so `"ai"` also fires inside longer words.

use crate::channel::{Category, ChannelAssessment};
use crate::content::PostType;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

const TECH_KEYWORDS: &[&str] = &[
    "tech",
    "software",
    "developer",
    "coding",
    "python",
    "react",
    "javascript",
    "data science",
    "ai",
    "ml",
    "artificial intelligence",
    "machine learning",
    "cybersecurity",
    "devops",
    "cloud",
    "programming",
];

const JOB_KEYWORDS: &[&str] = &[
    "jobs",
    "hiring",
    "career",
    "internship",
    "recruiting",
    "job alert",
];

const STUDY_KEYWORDS: &[&str] = &[
    "studygram",
    "learn",
    "education",
    "tutorial",
    "student",
    "university",
    "notes",
];

const NEWS_KEYWORDS: &[&str] = &["news", "updates", "daily", "breaking"];

const URGENT_KEYWORDS: &[&str] = &[
    "breaking",
    "announcement",
    "now hiring",
    "urgent",
    "alert",
    "job alert",
    "new post",
    "important update",
];

const VALUE_KEYWORDS: &[&str] = &[
    "tutorial",
    "guide",
    "roadmap",
    "free resource",
    "deep dive",
    "cheatsheet",
    "interview tips",
];

/// Accounts with fewer posts than this collapse to the minimum priority.
const MIN_MEDIA_COUNT: i64 = 50;

/// Profile signals used to score a channel at bootstrap.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelSignals<'a> {
    pub handle: &'a str,
    pub biography: Option<&'a str>,
    pub is_verified: bool,
    pub is_private: bool,
    pub follower_count: Option<i64>,
    pub media_count: Option<i64>,
}

impl ChannelSignals<'_> {
    /// Private accounts cannot be fetched and are deactivated at bootstrap.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_private
    }
}

/// Post signals used to score a newly discovered item.
#[derive(Debug, Clone, Copy)]
pub struct ItemSignals<'a> {
    pub channel_priority: u8,
    pub caption: Option<&'a str>,
    pub hashtags: &'a [String],
    pub like_count: Option<i64>,
    pub post_type: PostType,
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

fn clamp_priority(score: i64) -> u8 {
    let clamped = score.clamp(i64::from(MIN_PRIORITY), i64::from(MAX_PRIORITY));
    u8::try_from(clamped).unwrap_or(MAX_PRIORITY)
}

/// Score a channel from its profile and derive its fetch cadence.
///
/// Topic keywords in the biography and handle pick the category and base
/// score; news keywords, verification, and audience size adjust it. Accounts
/// with a known post count below 50 drop to the minimum.
#[must_use]
pub fn score_channel(signals: &ChannelSignals<'_>) -> ChannelAssessment {
    let text = format!(
        "{} {}",
        signals.biography.unwrap_or_default(),
        signals.handle
    )
    .to_lowercase();

    let (mut score, category) = if contains_any(&text, TECH_KEYWORDS) {
        (6_i64, Category::Tech)
    } else if contains_any(&text, JOB_KEYWORDS) {
        (5, Category::Jobs)
    } else if contains_any(&text, STUDY_KEYWORDS) {
        (4, Category::Study)
    } else {
        (1, Category::General)
    };

    if contains_any(&text, NEWS_KEYWORDS) {
        score += 2;
    }

    if signals.is_verified {
        score = score * 3 / 2;
    }

    match signals.follower_count {
        Some(n) if n > 500_000 => score += 2,
        Some(n) if n > 100_000 => score += 1,
        _ => {}
    }

    if signals
        .media_count
        .is_some_and(|count| count < MIN_MEDIA_COUNT)
    {
        score = i64::from(MIN_PRIORITY);
    }

    let priority = clamp_priority(score);
    let (fetch_frequency_hours, posts_to_fetch) = if priority >= 8 {
        (2, 20)
    } else if priority >= 5 {
        (6, 10)
    } else {
        (12, 10)
    };

    ChannelAssessment {
        priority,
        category,
        fetch_frequency_hours,
        posts_to_fetch,
    }
}

/// Score a discovered post, starting from its channel's priority.
#[must_use]
pub fn score_item(signals: &ItemSignals<'_>) -> u8 {
    let text = format!(
        "{} {}",
        signals.caption.unwrap_or_default(),
        signals.hashtags.join(" ")
    )
    .to_lowercase();

    let mut score = i64::from(signals.channel_priority);

    if contains_any(&text, URGENT_KEYWORDS) {
        score += 3;
    } else if contains_any(&text, VALUE_KEYWORDS) {
        score += 2;
    }

    match signals.like_count {
        Some(n) if n > 20_000 => score += 2,
        Some(n) if n > 5_000 => score += 1,
        _ => {}
    }

    match signals.post_type {
        PostType::Album => score += 1,
        PostType::Reel => score -= 1,
        _ => {}
    }

    clamp_priority(score)
}
