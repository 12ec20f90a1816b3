//! Fixed instructions sent to the synthesis model, and the aggregate that
//! feeds the final report.

use reelscope_core::{ContentItem, PostType};

pub const IMAGE_ANALYSIS_PROMPT: &str = "\
You are a tech analyst. The following images are from a single social media post, likely an informational carousel.
Analyze all images in the sequence they are provided. Your task is to synthesize the information across all of them into one, single, cohesive summary.
- Transcribe important text, code snippets, or titles from each image.
- Explain any diagrams, charts, or key visual elements.
- Capture the main topic and the key takeaways presented across the entire post.
- Provide a final, well-structured summary.";

pub const VIDEO_FRAMES_PROMPT: &str = "\
You are a technical analyst. The following is a sequence of keyframes from an informational video.
Your task is to create a single, concise summary of the visual content.
- Analyze the frames in order to understand the flow of information.
- Transcribe any important text, code snippets, or commands you see clearly.
- Describe any key diagrams, charts, or user interface elements.
- Synthesize all of this into one coherent summary of what is being shown.";

/// System prompt for the final report. The four `###` sections are what
/// `reelscope_core::parse_report` expects.
pub const REPORT_SYSTEM_PROMPT: &str = "\
You are an expert technology analyst and AI researcher with a deep understanding of software development, artificial intelligence, and emerging tech trends.

You will receive a structured set of data extracted from a single piece of social media content. This data may include a description, an AI-generated summary of its images, audio transcriptions and summaries of its video frames.

Your mission is to act like a human tech analyst: do not just summarize the visible content. Instead, you must synthesize the information, extract hidden value, identify trends, and generate insights specifically for a developer audience.

Follow these core principles for your analysis:

1.  **Synthesize, Don't Repeat:** Integrate information from all provided sources (description, images, transcripts, video) into a cohesive understanding. Find the core message.
2.  **Extract Key Facts:** Identify the specific technology, model, tool, or framework being discussed. What is it, and what does it do?
3.  **Infer and Go Deeper (Think Like a Developer):** Go beyond the provided text to answer:
    - How can a student, engineer, or researcher experiment with this technology?
    - What problem does it solve better than existing solutions?
    - Are there potential APIs, code libraries, or platforms involved?
    - What are its unique advantages or potential limitations?
4.  **Focus on Signal, Not Noise:** Ignore promotional language (\"DM for link,\" \"join our newsletter\") and focus on the technical, meaningful points.
5.  **Provide a Forward-Looking Perspective:** Briefly explain why this development is significant and what it might indicate for future tech trends.

Your final output must be structured exactly as follows, using Markdown for formatting:

### Core Summary
(A 1-2 sentence executive summary capturing the essence of the content.)

### Technical Insights
(Bulleted list of the key technical details, unique features, or what makes the technology special.)

### Developer Perspective
(Bulleted list of practical applications, use-cases, and actionable steps for developers, students, or researchers.)

### Broader Impact
(A brief 1-2 sentence analysis on why this matters for the tech industry or the future.)";

pub const DATA_PREAMBLE: &str = "Here is the data you need to analyze:";

/// Header placed ahead of the caption so the model knows where the post came
/// from.
#[must_use]
pub fn content_metadata(item: &ContentItem) -> String {
    let uploaded = item.uploaded_at.map_or_else(
        || "Unknown".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    let likes = item
        .like_count
        .map_or_else(|| "Unknown".to_string(), group_thousands);
    format!(
        "Instagram Content Metadata\n\
         ==============================\n\n\
         URL: {}\n\
         Channel: @{}\n\
         Upload Date: {uploaded}\n\
         Type: {}\n\
         Likes: {likes}",
        item.source_url,
        item.channel_handle,
        type_label(item.post_type),
    )
}

fn type_label(post_type: PostType) -> &'static str {
    match post_type {
        PostType::Post => "Post",
        PostType::Reel => "Reel",
        PostType::Video => "Video",
        PostType::Album => "Album",
        PostType::Unknown => "Unknown",
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Everything the analysis stages produced for one post.
///
/// Transcripts and frame summaries carry the 1-based index of the video they
/// came from, so a video whose stage failed leaves a gap instead of shifting
/// the labels of the ones after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub metadata: Option<String>,
    pub description: Option<String>,
    pub image_analysis: Option<String>,
    pub transcripts: Vec<(usize, String)>,
    pub frame_summaries: Vec<(usize, String)>,
}

impl Aggregate {
    /// Renders the blocks in a fixed order, skipping empty ones.
    ///
    /// The metadata header is context only: with no caption and no stage
    /// output the result is an empty string.
    #[must_use]
    pub fn render(&self) -> String {
        let caption = non_blank(self.description.as_deref());
        let mut blocks: Vec<String> = Vec::new();

        if let Some(analysis) = non_blank(self.image_analysis.as_deref()) {
            blocks.push(format!("--- IMAGE ANALYSIS ---\n{analysis}"));
        }
        if let Some(section) = numbered("--- AUDIO TRANSCRIPTS ---", "Video", &self.transcripts) {
            blocks.push(section);
        }
        if let Some(section) = numbered(
            "--- VIDEO FRAME SUMMARIES ---",
            "Frame Group",
            &self.frame_summaries,
        ) {
            blocks.push(section);
        }
        if caption.is_none() && blocks.is_empty() {
            return String::new();
        }

        let description = match (non_blank(self.metadata.as_deref()), caption) {
            (Some(meta), Some(caption)) => Some(format!("{meta}\n\nDescription:\n{caption}")),
            (Some(meta), None) => Some(meta.to_string()),
            (None, caption) => caption.map(str::to_string),
        };
        if let Some(description) = description {
            blocks.insert(0, format!("--- DESCRIPTION ---\n{description}"));
        }

        blocks.join("\n\n")
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn numbered(header: &str, label: &str, entries: &[(usize, String)]) -> Option<String> {
    let mut lines = vec![header.to_string()];
    for (index, entry) in entries {
        let entry = entry.trim();
        if !entry.is_empty() {
            lines.push(format!("{label} {index}:\n{entry}"));
        }
    }
    (lines.len() > 1).then(|| lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use reelscope_core::ItemStatus;

    fn item(like_count: Option<i64>) -> ContentItem {
        ContentItem {
            shortcode: "DNV0iKfie8O".to_string(),
            source_url: "https://www.instagram.com/p/DNV0iKfie8O/".to_string(),
            channel_handle: "uncover.ai".to_string(),
            status: ItemStatus::Processing,
            priority: 5,
            post_type: PostType::Post,
            caption: None,
            hashtags: Vec::new(),
            like_count,
            video_duration_secs: None,
            uploaded_at: Utc.with_ymd_and_hms(2025, 8, 14, 15, 45, 0).single(),
            added_at: Utc::now(),
            processed_at: None,
            final_summary_report: None,
            structured_summary: None,
            processing_metadata: None,
            error_message: None,
        }
    }

    #[test]
    fn empty_aggregate_renders_nothing() {
        let aggregate = Aggregate {
            metadata: Some("Instagram Content Metadata".to_string()),
            description: Some("   ".to_string()),
            transcripts: vec![(1, String::new())],
            ..Aggregate::default()
        };
        assert_eq!(aggregate.render(), "");
    }

    #[test]
    fn blocks_render_in_fixed_order() {
        let aggregate = Aggregate {
            metadata: None,
            description: Some("New crate release #rust".to_string()),
            image_analysis: None,
            transcripts: vec![(1, "first talk".to_string()), (2, "second talk".to_string())],
            frame_summaries: vec![(1, "terminal showing cargo".to_string())],
        };
        assert_eq!(
            aggregate.render(),
            "--- DESCRIPTION ---\nNew crate release #rust\n\n\
             --- AUDIO TRANSCRIPTS ---\nVideo 1:\nfirst talk\nVideo 2:\nsecond talk\n\n\
             --- VIDEO FRAME SUMMARIES ---\nFrame Group 1:\nterminal showing cargo"
        );
    }

    #[test]
    fn labels_keep_the_source_video_index() {
        let aggregate = Aggregate {
            transcripts: vec![(2, "second video speaks".to_string())],
            frame_summaries: vec![(3, "third video slides".to_string())],
            ..Aggregate::default()
        };
        assert_eq!(
            aggregate.render(),
            "--- AUDIO TRANSCRIPTS ---\nVideo 2:\nsecond video speaks\n\n\
             --- VIDEO FRAME SUMMARIES ---\nFrame Group 3:\nthird video slides"
        );
    }

    #[test]
    fn metadata_header_precedes_caption() {
        let aggregate = Aggregate {
            metadata: Some(content_metadata(&item(Some(27_236)))),
            description: Some("Build an assistant without code".to_string()),
            ..Aggregate::default()
        };
        assert_eq!(
            aggregate.render(),
            "--- DESCRIPTION ---\n\
             Instagram Content Metadata\n\
             ==============================\n\n\
             URL: https://www.instagram.com/p/DNV0iKfie8O/\n\
             Channel: @uncover.ai\n\
             Upload Date: 2025-08-14 15:45:00\n\
             Type: Post\n\
             Likes: 27,236\n\n\
             Description:\n\
             Build an assistant without code"
        );
    }

    #[test]
    fn metadata_marks_missing_fields_unknown() {
        let mut post = item(None);
        post.uploaded_at = None;
        let header = content_metadata(&post);
        assert!(header.contains("Upload Date: Unknown\n"));
        assert!(header.ends_with("Likes: Unknown"));
    }

    #[test]
    fn thousands_are_grouped() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(-5_000), "-5,000");
    }

    #[test]
    fn report_prompt_names_every_section() {
        for section in [
            "### Core Summary",
            "### Technical Insights",
            "### Developer Perspective",
            "### Broader Impact",
        ] {
            assert!(REPORT_SYSTEM_PROMPT.contains(section), "missing {section}");
        }
    }
}
