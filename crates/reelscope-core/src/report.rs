//! Parsing of the synthesized Markdown report into keyed sections.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Sections whose bodies are bullet lists rather than prose.
const BULLET_SECTIONS: &[&str] = &["Technical Insights", "Developer Perspective"];

/// Body of one `###` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReportSection {
    Text(String),
    Bullets(Vec<String>),
}

/// Report sections keyed by snake-cased header (`"Core Summary"` -> `core_summary`).
pub type StructuredReport = BTreeMap<String, ReportSection>;

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| Regex::new(r"###\s*(.+)").expect("valid header regex"))
}

fn bullet_split_regex() -> &'static Regex {
    static BULLET: OnceLock<Regex> = OnceLock::new();
    BULLET.get_or_init(|| Regex::new(r"\n\s*[*-]\s+").expect("valid bullet regex"))
}

fn leading_bullet_regex() -> &'static Regex {
    static LEADING: OnceLock<Regex> = OnceLock::new();
    LEADING.get_or_init(|| Regex::new(r"^[*-]\s+").expect("valid leading bullet regex"))
}

fn continuation_regex() -> &'static Regex {
    static CONTINUATION: OnceLock<Regex> = OnceLock::new();
    CONTINUATION.get_or_init(|| Regex::new(r"\n\s+").expect("valid continuation regex"))
}

/// Split a Markdown report into its `###` sections.
///
/// Text before the first header is dropped. In bullet sections every `*` or
/// `-` line starts a new item and indented continuation lines are joined onto
/// the item above. Blank or header-less input yields an empty map.
#[must_use]
pub fn parse_report(report: &str) -> StructuredReport {
    let mut sections = StructuredReport::new();
    if report.trim().is_empty() {
        return sections;
    }

    let headers: Vec<_> = header_regex().captures_iter(report).collect();
    for (idx, caps) in headers.iter().enumerate() {
        let (Some(whole), Some(title)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body_end = headers
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map_or(report.len(), |m| m.start());
        let header = title.as_str().trim();
        let body = report[whole.end()..body_end].trim();

        let key = header.to_lowercase().replace(' ', "_");
        let section = if BULLET_SECTIONS.contains(&header) {
            ReportSection::Bullets(split_bullets(body))
        } else {
            ReportSection::Text(body.to_string())
        };
        sections.insert(key, section);
    }

    sections
}

fn split_bullets(body: &str) -> Vec<String> {
    bullet_split_regex()
        .split(body)
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let line = if idx == 0 {
                leading_bullet_regex().replace(line, "")
            } else {
                line.into()
            };
            Some(continuation_regex().replace_all(&line, " ").trim().to_string())
        })
        .collect()
}
