//! Prompt templates for TU-format review.
//!
//! All prompt text lives here so a rubric change touches exactly one place,
//! and tests can inspect the prompts without a running model. The text is
//! held in an explicitly constructed [`PromptTemplates`] value that travels
//! inside [`crate::config::ReviewConfig`]; nothing is loaded into globals.

use crate::output::Page;
use std::path::Path;
use tracing::{debug, warn};

/// File name of the rule text inside a rules directory.
pub const RULES_FILE: &str = "tu_format_rules.txt";
/// File name of the per-page instructions inside a rules directory.
pub const PAGE_INSTRUCTIONS_FILE: &str = "page_instructions.txt";
/// File name of the batch instructions inside a rules directory.
pub const BATCH_INSTRUCTIONS_FILE: &str = "batch_instructions.txt";

/// Substituted when the rule file cannot be read.
pub const RULES_PLACEHOLDER: &str =
    "TU Format Rules not found. Please ensure tu_format_rules.txt exists in the rules directory.";

/// Exact phrase the model is told to answer with when a page is clean.
pub const NO_VIOLATIONS_REPLY: &str = "No TU format violations detected on this page.";

/// Built-in TU formatting checklist.
pub const DEFAULT_RULES: &str = "Check each page for: page numbering, margins, font \
(Times New Roman 12pt), spacing (1.5), headings format, citations (IEEE), grammar, flow, \
and structure.";

/// Built-in per-page rubric: three phases of violations.
pub const DEFAULT_PAGE_INSTRUCTIONS: &str = r#"Check for violations in these categories:

1. STRUCTURE ERRORS (Critical):
   - Page numbering issues
   - Font not Times New Roman 12pt
   - Incorrect margins or spacing
   - Missing section titles in table of contents
   - Wrong positioning of elements
   - Flow problems (wrong order of sections)

2. GRAMMAR/SPELLING ERRORS:
   - Grammar mistakes
   - Spelling errors
   - Punctuation issues
   - Poor sentence structure

3. CONTENT ENHANCEMENT SUGGESTIONS:
   - Ways to improve content
   - Suggestions for better formatting
   - Ideas for adding more details
   - Recommendations for enhancement

For each violation found, specify the category and provide a clear description.
If no violations found, respond: No TU format violations detected on this page."#;

/// Built-in batch rubric: four tagged buckets.
pub const DEFAULT_BATCH_INSTRUCTIONS: &str = r#"Analyze the following pages for TU format violations and provide focused feedback in FOUR categories:

ERROR (Critical issues - use [ERROR] prefix):
- Structure problems (missing sections, wrong order)
- Citation format issues (not IEEE style)
- Alignment problems
- Page numbering issues
- Font/size violations
- Margin violations

WARNING (Important issues - use [WARNING] prefix):
- Grammar mistakes
- Flow problems
- Inconsistent formatting

SUGGESTION (Improvements - use [SUGGESTION] prefix):
- How to improve writing, organization, clarity
- Better ways to present information
- Style improvements

IDEA (Future possibilities - use [IDEA] prefix):
- Related projects you could work on
- Extensions of current work
- Potential applications

IMPORTANT: Provide ONLY the most important feedback:
- List ALL ERRORS found (critical issues)
- List ALL WARNINGS found (grammar/flow issues)
- Provide ONLY 3-5 SUGGESTIONS total (how to improve)
- Provide ONLY 3-5 IDEAS total (future projects)

Format: Page X: [CATEGORY] Description
If no violations: Page X: No TU format violations detected."#;

const BATCH_CLOSING: &str = "Provide ONLY the most critical feedback:
- ALL ERRORS (structure, citations, formatting issues)
- ALL WARNINGS (grammar, flow issues)
- ONLY 3-5 SUGGESTIONS total (how to improve)
- ONLY 3-5 IDEAS total (future projects)

Be concise and focus on the most important issues.

IMPORTANT: Each error/warning/suggestion/idea should be ONE SHORT SENTENCE only.";

/// Rule text and instructions used to build every prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub rules: String,
    pub page_instructions: String,
    pub batch_instructions: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_string(),
            page_instructions: DEFAULT_PAGE_INSTRUCTIONS.to_string(),
            batch_instructions: DEFAULT_BATCH_INSTRUCTIONS.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Load templates from `dir`.
    ///
    /// Never fails: a missing rule file yields [`RULES_PLACEHOLDER`], missing
    /// instruction files fall back to the built-in rubric.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let rules = read_template(dir, RULES_FILE).unwrap_or_else(|| RULES_PLACEHOLDER.to_string());
        let page_instructions = read_template(dir, PAGE_INSTRUCTIONS_FILE)
            .unwrap_or_else(|| DEFAULT_PAGE_INSTRUCTIONS.to_string());
        let batch_instructions = read_template(dir, BATCH_INSTRUCTIONS_FILE)
            .unwrap_or_else(|| DEFAULT_BATCH_INSTRUCTIONS.to_string());
        Self {
            rules,
            page_instructions,
            batch_instructions,
        }
    }

    /// Prompt for a single page.
    pub fn page_prompt(&self, page: &Page, text_limit: usize) -> String {
        let (text, truncated) = truncate_chars(&page.text, text_limit);
        format!(
            "Analyze this page for TU format violations and categorize them:\n\n\
             Page {num} content:\n{text}{ellipsis}\n\n\
             {instructions}\n\n\
             {rules}",
            num = page.number,
            ellipsis = if truncated { "..." } else { "" },
            instructions = self.page_instructions.trim(),
            rules = self.rules.trim(),
        )
    }

    /// One prompt covering every page, each under a `--- PAGE N ---` marker.
    pub fn batch_prompt(&self, pages: &[Page], text_limit: usize) -> String {
        let mut prompt = String::with_capacity(pages.len() * (text_limit + 32) + 2048);
        prompt.push_str(self.batch_instructions.trim());
        prompt.push_str("\n\nPages to analyze:\n");
        for page in pages {
            let (text, truncated) = truncate_chars(&page.text, text_limit);
            prompt.push_str(&format!(
                "--- PAGE {} ---\n{}{}\n\n",
                page.number,
                text,
                if truncated { "..." } else { "" }
            ));
        }
        prompt.push_str(self.rules.trim());
        prompt.push_str("\n\n");
        prompt.push_str(BATCH_CLOSING);
        prompt
    }
}

fn read_template(dir: &Path, name: &str) -> Option<String> {
    let path = dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            debug!("Loaded template {}", path.display());
            Some(text)
        }
        Err(e) => {
            warn!("Failed to load template {}: {}", path.display(), e);
            None
        }
    }
}

/// First `limit` characters of `text`, and whether anything was cut.
fn truncate_chars(text: &str, limit: usize) -> (&str, bool) {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_prompt_truncates_long_text() {
        let templates = PromptTemplates::default();
        let page = Page::new(3, "é".repeat(700));
        let prompt = templates.page_prompt(&page, 600);
        assert!(prompt.contains("Page 3 content:"));
        assert!(prompt.contains(&format!("{}...", "é".repeat(600))));
        assert!(!prompt.contains(&"é".repeat(601)));
        assert!(prompt.contains(NO_VIOLATIONS_REPLY));
    }

    #[test]
    fn page_prompt_short_text_has_no_ellipsis() {
        let prompt = PromptTemplates::default().page_prompt(&Page::new(1, "Introduction"), 600);
        assert!(prompt.contains("Introduction\n"));
        assert!(!prompt.contains("Introduction..."));
    }

    #[test]
    fn batch_prompt_marks_every_page() {
        let pages = vec![Page::new(1, "Abstract"), Page::new(2, "Chapter 1")];
        let prompt = PromptTemplates::default().batch_prompt(&pages, 400);
        assert!(prompt.contains("--- PAGE 1 ---\nAbstract"));
        assert!(prompt.contains("--- PAGE 2 ---\nChapter 1"));
        assert!(prompt.contains("Format: Page X: [CATEGORY] Description"));
        assert!(prompt.ends_with("ONE SHORT SENTENCE only."));
    }

    #[test]
    fn load_missing_dir_degrades_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let t = PromptTemplates::load(dir.path().join("nope"));
        assert_eq!(t.rules, RULES_PLACEHOLDER);
        assert_eq!(t.page_instructions, DEFAULT_PAGE_INSTRUCTIONS);
    }

    #[test]
    fn load_reads_rule_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(RULES_FILE), "Margins: 2.5 cm on all sides.").unwrap();
        let t = PromptTemplates::load(dir.path());
        assert_eq!(t.rules, "Margins: 2.5 cm on all sides.");
        assert_eq!(t.batch_instructions, DEFAULT_BATCH_INSTRUCTIONS);
    }
}
