//! Batch segmentation: split one multi-page reply into per-page sections.
//!
//! The model is asked to answer `Page N: [CATEGORY] Description`, but small
//! local models drift: some echo the `--- PAGE N ---` markers from the
//! prompt, some write free prose. Three strategies are tried in order and
//! the first one that finds any page structure wins:
//!
//! 1. [`ParseStrategy::HeaderLines`]: `Page N:` lines open sections
//! 2. [`ParseStrategy::MarkerBlocks`]: `--- PAGE N ---` lines delimit blocks
//! 3. [`ParseStrategy::Flat`]: no structure; the whole reply becomes
//!    one page-1 finding if it mentions anything issue-like
//!
//! Precision is traded for resilience: a reply with any plausible parse
//! never comes back as zero pages.

use crate::output::{Category, PageRef};
use crate::pipeline::segment::{
    is_no_violations, is_substantial, normalise_line_endings, strip_boilerplate, strip_numbering,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Tag tokens in the order they are looked for.
const BRACKET_TAGS: &[(&str, Category)] = &[
    ("[ERROR]", Category::Error),
    ("[WARNING]", Category::Warning),
    ("[SUGGESTION]", Category::Suggestion),
    ("[IDEA]", Category::Idea),
];

/// Keywords that make an untagged marker-block line worth keeping.
const STRONG_ISSUE_KEYWORDS: &[&str] = &[
    "missing",
    "incorrect",
    "wrong",
    "should be",
    "problem",
    "issue",
    "mistake",
    "error",
];

/// Keywords that make an unstructured reply worth keeping as one finding.
const BROAD_ISSUE_KEYWORDS: &[&str] = &[
    "error",
    "violation",
    "problem",
    "issue",
    "incorrect",
    "wrong",
    "missing",
    "warning",
    "suggestion",
    "improvement",
    "idea",
    "recommendation",
];

static RE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[*#\s]*Page\s+([^\s:*]+)\s*:\s*\**\s*(.*)$").unwrap());

static RE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*-{3}[ \t]*PAGE[ \t]+(\d+)[ \t]*-{3}[ \t]*$").unwrap());

static RE_COLON_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(ERROR|WARNING|VIOLATION)\s*:\s*(.+)$").unwrap());

static RE_NARRATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(here\b|here's|below\b|after analyzing|i have\b|i've\b|i found|the following|sure\b|okay\b|certainly\b|let me\b|based on\b|upon review)",
    )
    .unwrap()
});

/// A candidate violation with its bracket tag (if any) already removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub tag: Option<Category>,
}

impl Candidate {
    pub fn untagged(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tag: None,
        }
    }

    pub fn tagged(tag: Category, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tag: Some(tag),
        }
    }

    /// Parse a line that may carry a bracket tag. Text before the first
    /// tag is dropped; a line with several tags yields the first tagged piece.
    pub fn from_line(line: &str) -> Self {
        split_tagged(line)
            .into_iter()
            .next()
            .unwrap_or_else(|| Candidate::untagged(line.trim()))
    }

    /// `[TAG] text`, or just the text when untagged.
    pub fn display(&self) -> String {
        match self.tag.and_then(Category::bracket_tag) {
            Some(tag) => format!("{tag} {}", self.text),
            None => self.text.clone(),
        }
    }
}

/// Which strategy produced a [`BatchParse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    HeaderLines,
    MarkerBlocks,
    Flat,
}

/// Findings attributed to one page of a batch reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSection {
    pub page: PageRef,
    pub candidates: Vec<Candidate>,
}

impl PageSection {
    pub fn new(page: PageRef) -> Self {
        Self {
            page,
            candidates: Vec::new(),
        }
    }

    /// Section re-assembled as `Page N: a; b`, or the clean-page phrase.
    pub fn raw_analysis(&self) -> String {
        if self.candidates.is_empty() {
            format!("Page {}: No TU format violations detected.", self.page)
        } else {
            let joined: Vec<String> = self.candidates.iter().map(Candidate::display).collect();
            format!("Page {}: {}", self.page, joined.join("; "))
        }
    }
}

/// Result of segmenting a batch reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchParse {
    /// `None` when no strategy found anything.
    pub strategy: Option<ParseStrategy>,
    pub sections: Vec<PageSection>,
}

/// Segment a combined multi-page reply.
pub fn parse_batch_reply(reply: &str) -> BatchParse {
    let reply = normalise_line_endings(reply);
    let reply = reply.as_str();
    let sections = parse_header_lines(reply);
    if !sections.is_empty() {
        debug!("Batch reply parsed by page headers: {} sections", sections.len());
        return BatchParse {
            strategy: Some(ParseStrategy::HeaderLines),
            sections,
        };
    }

    warn!("No page headers in batch reply, trying page markers");
    let sections = parse_marker_blocks(reply);
    if !sections.is_empty() {
        return BatchParse {
            strategy: Some(ParseStrategy::MarkerBlocks),
            sections,
        };
    }

    warn!("No page markers in batch reply, falling back to flat parsing");
    match parse_flat(reply) {
        Some(section) => BatchParse {
            strategy: Some(ParseStrategy::Flat),
            sections: vec![section],
        },
        None => BatchParse {
            strategy: None,
            sections: Vec::new(),
        },
    }
}

/// Strategy 1: `Page <id>: <rest>` lines open sections.
pub fn parse_header_lines(reply: &str) -> Vec<PageSection> {
    let mut sections = Vec::new();
    let mut current: Option<PageSection> = None;

    for line in reply.lines().map(str::trim) {
        if let Some(caps) = RE_HEADER.captures(line) {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            let mut section = PageSection::new(PageRef::parse(&caps[1]));
            let rest = caps[2].trim();
            if !rest.is_empty() && !is_no_violations(rest) {
                section.candidates.extend(split_line(rest));
            }
            current = Some(section);
        } else if let Some(section) = current.as_mut() {
            if !line.is_empty() && !is_no_violations(line) && !RE_MARKER.is_match(line) {
                section.candidates.extend(split_line(line));
            }
        }
    }

    if let Some(done) = current {
        sections.push(done);
    }
    sections
}

/// Strategy 2: blocks delimited by `--- PAGE N ---` marker lines.
pub fn parse_marker_blocks(reply: &str) -> Vec<PageSection> {
    let reply = normalise_line_endings(reply);
    let reply = reply.as_str();
    let markers: Vec<(usize, usize, usize)> = RE_MARKER
        .captures_iter(reply)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let page = caps[1].parse::<usize>().ok()?;
            Some((page, whole.start(), whole.end()))
        })
        .collect();

    markers
        .iter()
        .enumerate()
        .map(|(i, &(page, _, body_start))| {
            let body_end = markers.get(i + 1).map(|m| m.1).unwrap_or(reply.len());
            let mut section = PageSection::new(PageRef::Number(page));
            section.candidates = reply[body_start..body_end]
                .lines()
                .filter_map(marker_block_candidate)
                .collect();
            section
        })
        .collect()
}

/// Strategy 3: the whole reply as a single page-1 finding.
pub fn parse_flat(reply: &str) -> Option<PageSection> {
    let lower = reply.to_lowercase();
    if !BROAD_ISSUE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return None;
    }
    let text = strip_boilerplate(reply, 1);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut section = PageSection::new(PageRef::Number(1));
    section.candidates.push(Candidate::untagged(text));
    Some(section)
}

fn marker_block_candidate(line: &str) -> Option<Candidate> {
    let line = line.trim();
    if line.is_empty() || is_no_violations(line) || is_narration(line) {
        return None;
    }
    let item = strip_list_marker(line);

    if let Some(tagged) = tagged_item(item) {
        return Some(tagged);
    }

    let lower = item.to_lowercase();
    let strong = STRONG_ISSUE_KEYWORDS.iter().any(|k| lower.contains(k));
    (strong && is_substantial(item)).then(|| Candidate::untagged(item))
}

fn is_narration(line: &str) -> bool {
    RE_NARRATION.is_match(line) || (line.ends_with(':') && !line.contains('['))
}

/// Drop a leading bullet or `N. ` number.
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();
    strip_numbering(line).trim()
}

/// Candidates from one section line: every bracket-tagged piece, a
/// colon-tagged item, or the whole line untagged.
fn split_line(line: &str) -> Vec<Candidate> {
    let tagged = split_tagged(line);
    if !tagged.is_empty() {
        return tagged;
    }
    let item = strip_list_marker(line);
    if item.is_empty() {
        return Vec::new();
    }
    vec![colon_tagged(item).unwrap_or_else(|| Candidate::untagged(item))]
}

/// A `TAG: text` item or the first bracket-tagged piece of `item`.
fn tagged_item(item: &str) -> Option<Candidate> {
    colon_tagged(item).or_else(|| split_tagged(item).into_iter().next())
}

fn colon_tagged(item: &str) -> Option<Candidate> {
    let caps = RE_COLON_TAG.captures(item)?;
    let tag = if caps[1].eq_ignore_ascii_case("warning") {
        Category::Warning
    } else {
        Category::Error
    };
    let text = caps[2].trim();
    (!text.is_empty()).then(|| Candidate::tagged(tag, text))
}

/// Split a line at every bracket tag. Returns an empty vec when the line
/// has no tag; text before the first tag is dropped.
fn split_tagged(line: &str) -> Vec<Candidate> {
    let mut hits: Vec<(usize, &str, Category)> = BRACKET_TAGS
        .iter()
        .flat_map(|&(tag, category)| {
            line.match_indices(tag).map(move |(pos, _)| (pos, tag, category))
        })
        .collect();
    hits.sort_by_key(|h| h.0);

    hits.iter()
        .enumerate()
        .filter_map(|(i, &(pos, tag, category))| {
            let start = pos + tag.len();
            let end = hits.get(i + 1).map(|h| h.0).unwrap_or(line.len());
            let text = line[start..end].trim().trim_end_matches(';').trim();
            (!text.is_empty()).then(|| Candidate::tagged(category, text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lines_with_tags() {
        let reply = "Here is my review.\n\
                     Page 1: [ERROR] Page number missing on title page.\n\
                     [WARNING] Inconsistent heading capitalisation.\n\
                     Page 2: No TU format violations detected.\n\
                     Page 3: [SUGGESTION] Add a list of figures. [IDEA] Extend to a survey.";
        let parse = parse_batch_reply(reply);
        assert_eq!(parse.strategy, Some(ParseStrategy::HeaderLines));
        assert_eq!(parse.sections.len(), 3);

        let p1 = &parse.sections[0];
        assert_eq!(p1.page, PageRef::Number(1));
        assert_eq!(
            p1.candidates,
            vec![
                Candidate::tagged(Category::Error, "Page number missing on title page."),
                Candidate::tagged(Category::Warning, "Inconsistent heading capitalisation."),
            ]
        );
        assert!(parse.sections[1].candidates.is_empty());
        assert_eq!(parse.sections[2].candidates.len(), 2);
        assert_eq!(parse.sections[2].candidates[1].tag, Some(Category::Idea));
    }

    #[test]
    fn test_header_lines_win_over_marker_blocks() {
        let reply = "--- PAGE 1 ---\nPage 1: [ERROR] Margins are wrong.\n--- PAGE 2 ---\nERROR: Missing caption.";
        let parse = parse_batch_reply(reply);
        assert_eq!(parse.strategy, Some(ParseStrategy::HeaderLines));
        assert_eq!(parse.sections.len(), 1);
        assert_eq!(
            parse.sections[0].candidates,
            vec![
                Candidate::tagged(Category::Error, "Margins are wrong."),
                Candidate::tagged(Category::Error, "Missing caption."),
            ]
        );
    }

    #[test]
    fn test_placeholder_page_identifier_is_kept_as_label() {
        let sections = parse_header_lines("Page X: [WARNING] Grammar slips in the abstract.");
        assert_eq!(sections[0].page, PageRef::Label("X".into()));
    }

    #[test]
    fn test_prose_starting_with_page_is_not_a_header() {
        assert!(parse_header_lines("Page numbering is incorrect: it restarts at 1.").is_empty());
    }

    #[test]
    fn test_marker_blocks_example() {
        let reply = "--- PAGE 1 ---\nERROR: Font is not Times New Roman.\n--- PAGE 2 ---\nNo TU format violations detected.";
        let parse = parse_batch_reply(reply);
        assert_eq!(parse.strategy, Some(ParseStrategy::MarkerBlocks));
        assert_eq!(parse.sections.len(), 2);
        assert_eq!(
            parse.sections[0].candidates,
            vec![Candidate::tagged(Category::Error, "Font is not Times New Roman.")]
        );
        assert_eq!(parse.sections[1].page, PageRef::Number(2));
        assert!(parse.sections[1].candidates.is_empty());
    }

    #[test]
    fn test_marker_blocks_with_crlf_line_endings() {
        let reply = "--- PAGE 1 ---\r\nERROR: Font is not Times New Roman.\r\n--- PAGE 2 ---\r\nNo TU format violations detected.";
        let parse = parse_batch_reply(reply);
        assert_eq!(parse.strategy, Some(ParseStrategy::MarkerBlocks));
        assert_eq!(parse.sections.len(), 2);
        assert_eq!(
            parse.sections[0].candidates,
            vec![Candidate::tagged(Category::Error, "Font is not Times New Roman.")]
        );
        assert!(parse.sections[1].candidates.is_empty());
        assert_eq!(parse_marker_blocks(reply).len(), 2);
    }

    #[test]
    fn test_header_lines_with_crlf_line_endings() {
        let reply = "Page 1: [ERROR] Margins are wrong.\r\nPage 2: [IDEA] Extend to a survey.\r\n";
        let parse = parse_batch_reply(reply);
        assert_eq!(parse.strategy, Some(ParseStrategy::HeaderLines));
        assert_eq!(
            parse.sections[1].candidates,
            vec![Candidate::tagged(Category::Idea, "Extend to a survey.")]
        );
    }

    #[test]
    fn test_marker_blocks_filter_narration_and_weak_lines() {
        let reply = "--- page 4 ---\n\
                     Here are the issues I found on this page:\n\
                     - The reference list is missing DOIs.\n\
                     The page looks nice.\n\
                     VIOLATION: Table caption placed below the table.\n\
                     warning: passive voice overused";
        let sections = parse_marker_blocks(reply);
        assert_eq!(sections.len(), 1);
        assert_eq!(
            sections[0].candidates,
            vec![
                Candidate::untagged("The reference list is missing DOIs."),
                Candidate::tagged(Category::Error, "Table caption placed below the table."),
                Candidate::tagged(Category::Warning, "passive voice overused"),
            ]
        );
    }

    #[test]
    fn test_flat_fallback_keeps_whole_reply() {
        let reply = "The document has an inconsistent citation style and a missing bibliography.";
        let parse = parse_batch_reply(reply);
        assert_eq!(parse.strategy, Some(ParseStrategy::Flat));
        assert_eq!(parse.sections[0].page, PageRef::Number(1));
        assert_eq!(parse.sections[0].candidates[0].text, reply);
    }

    #[test]
    fn test_unstructured_clean_reply_yields_nothing() {
        let parse = parse_batch_reply("Everything looks great.");
        assert_eq!(parse.strategy, None);
        assert!(parse.sections.is_empty());
    }

    #[test]
    fn test_raw_analysis_formats() {
        let mut s = PageSection::new(PageRef::Number(2));
        assert_eq!(s.raw_analysis(), "Page 2: No TU format violations detected.");
        s.candidates.push(Candidate::tagged(Category::Error, "Wrong margins."));
        s.candidates.push(Candidate::untagged("Heading not bold."));
        assert_eq!(s.raw_analysis(), "Page 2: [ERROR] Wrong margins.; Heading not bold.");
    }

    #[test]
    fn test_candidate_from_line_strips_tag() {
        let c = Candidate::from_line("Page X: [ERROR] Citation is not IEEE style");
        assert_eq!(c, Candidate::tagged(Category::Error, "Citation is not IEEE style"));
        assert_eq!(Candidate::from_line("  plain text "), Candidate::untagged("plain text"));
    }
}
