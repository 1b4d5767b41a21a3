//! Output types: pages, replies, violations and the assembled report.
//!
//! Everything here is created fresh for one analysis request and dropped
//! once the report has been returned; nothing is cached across requests.

use crate::config::AnalysisMode;
use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Extracted text of one PDF page (1-indexed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    pub text: String,
}

impl Page {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// The page a violation or analysis belongs to.
///
/// Batch replies can name pages with identifiers that are not numbers
/// (`Page X:`), and generic backfilled guidance belongs to no page at all;
/// both serialise as plain strings, numbered pages as integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Number(usize),
    Label(String),
}

impl PageRef {
    pub fn general() -> Self {
        PageRef::Label("general".to_string())
    }

    /// Parse a page identifier as written by the model.
    pub fn parse(id: &str) -> Self {
        match id.trim().parse::<usize>() {
            Ok(n) => PageRef::Number(n),
            Err(_) => PageRef::Label(id.trim().to_string()),
        }
    }

    pub fn number(&self) -> Option<usize> {
        match self {
            PageRef::Number(n) => Some(*n),
            PageRef::Label(_) => None,
        }
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRef::Number(n) => write!(f, "{n}"),
            PageRef::Label(s) => f.write_str(s),
        }
    }
}

impl From<usize> for PageRef {
    fn from(n: usize) -> Self {
        PageRef::Number(n)
    }
}

/// One model reply. When `ok` is false, `raw_text` is a human-readable
/// failure description and never a model answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    pub page: PageRef,
    pub raw_text: String,
    pub ok: bool,
}

impl ModelReply {
    pub fn from_outcome(
        page: PageRef,
        outcome: &Result<String, crate::error::ResponderError>,
    ) -> Self {
        match outcome {
            Ok(text) => Self {
                page,
                raw_text: text.clone(),
                ok: true,
            },
            Err(e) => Self {
                page,
                raw_text: e.to_string(),
                ok: false,
            },
        }
    }
}

/// Which category set a report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Taxonomy {
    /// structure → grammar → enhancement (per-page analysis).
    Phases,
    /// error → warning → suggestion → idea (batch analysis).
    Buckets,
}

impl Taxonomy {
    /// Categories in report order.
    pub fn categories(self) -> &'static [Category] {
        match self {
            Taxonomy::Phases => &[Category::Structure, Category::Grammar, Category::Enhancement],
            Taxonomy::Buckets => &[
                Category::Error,
                Category::Warning,
                Category::Suggestion,
                Category::Idea,
            ],
        }
    }
}

/// A bucket in one of the two violation taxonomies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Structure,
    Grammar,
    Enhancement,
    Error,
    Warning,
    Suggestion,
    Idea,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Structure => "structure",
            Category::Grammar => "grammar",
            Category::Enhancement => "enhancement",
            Category::Error => "error",
            Category::Warning => "warning",
            Category::Suggestion => "suggestion",
            Category::Idea => "idea",
        }
    }

    /// Bracket tag the batch prompt asks the model to emit, if any.
    pub fn bracket_tag(self) -> Option<&'static str> {
        match self {
            Category::Error => Some("[ERROR]"),
            Category::Warning => Some("[WARNING]"),
            Category::Suggestion => Some("[SUGGESTION]"),
            Category::Idea => Some("[IDEA]"),
            _ => None,
        }
    }

    pub fn taxonomy(self) -> Taxonomy {
        match self {
            Category::Structure | Category::Grammar | Category::Enhancement => Taxonomy::Phases,
            _ => Taxonomy::Buckets,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classified issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub page: PageRef,
    pub text: String,
    pub category: Category,
}

/// Violations grouped by category.
///
/// Every category of the taxonomy is present as a key, even when empty, so
/// consumers can index the map without checking for missing buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorizedResult {
    buckets: BTreeMap<Category, Vec<Violation>>,
}

impl CategorizedResult {
    pub fn new(taxonomy: Taxonomy) -> Self {
        let buckets = taxonomy
            .categories()
            .iter()
            .map(|c| (*c, Vec::new()))
            .collect();
        Self { buckets }
    }

    pub fn push(&mut self, violation: Violation) {
        self.buckets
            .entry(violation.category)
            .or_default()
            .push(violation);
    }

    pub fn get(&self, category: Category) -> &[Violation] {
        self.buckets
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn get_mut(&mut self, category: Category) -> &mut Vec<Violation> {
        self.buckets.entry(category).or_default()
    }

    pub fn count(&self, category: Category) -> usize {
        self.get(category).len()
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// `(category, violations)` pairs in category order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[Violation])> {
        self.buckets.iter().map(|(c, v)| (*c, v.as_slice()))
    }
}

/// Display metadata and count for one phase of the 3-phase taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub count: usize,
    pub icon: String,
    pub title: String,
    /// Empty when the phase has no violations.
    pub description: String,
}

/// The analysis of one page (or one section of a batch reply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub page: PageRef,
    /// Raw model reply (per-page mode) or the re-assembled section text
    /// (batch mode). Holds the failure description when `ok` is false.
    pub raw_analysis: String,
    pub ok: bool,
    /// Segmented violation lines, before categorisation.
    pub violations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Timing and page counters for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Pages in the document.
    pub document_pages: usize,
    /// Pages sent to the model after selection and the page limit.
    pub pages_selected: usize,
    pub failed_pages: usize,
    pub extract_duration_ms: u64,
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The full result of one document analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub mode: AnalysisMode,
    pub summary_text: String,
    pub total_pages: usize,
    pub total_issues: usize,
    pub categorized: CategorizedResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_summary: Option<BTreeMap<Category, PhaseSummary>>,
    pub per_page_results: Vec<PageAnalysis>,
    #[serde(default)]
    pub stats: AnalysisStats,
}

/// Page counts reported by [`crate::analyze::inspect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Pages whose extracted text is not blank.
    pub pages_with_text: usize,
}

/// Top-level JSON shape: either a report or `{ "error": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewResponse {
    Report(Box<AnalysisReport>),
    Error { error: String },
}

impl ReviewResponse {
    /// Wrap a library result, prefixing fatal errors the way the report
    /// consumer expects (`"Analysis failed: ..."`).
    pub fn from_result(
        mode: AnalysisMode,
        result: Result<AnalysisReport, crate::error::ReviewError>,
    ) -> Self {
        match result {
            Ok(report) => ReviewResponse::Report(Box::new(report)),
            Err(e) => {
                let prefix = match mode {
                    AnalysisMode::PerPage => "Analysis failed",
                    AnalysisMode::Batch => "Batch analysis failed",
                };
                ReviewResponse::Error {
                    error: format!("{prefix}: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(page: usize, text: &str, category: Category) -> Violation {
        Violation {
            page: PageRef::Number(page),
            text: text.to_string(),
            category,
        }
    }

    #[test]
    fn categorized_result_has_every_key() {
        let r = CategorizedResult::new(Taxonomy::Buckets);
        let json = serde_json::to_value(&r).unwrap();
        for key in ["error", "warning", "suggestion", "idea"] {
            assert!(json[key].as_array().unwrap().is_empty(), "missing {key}");
        }
    }

    #[test]
    fn categorized_result_counts() {
        let mut r = CategorizedResult::new(Taxonomy::Phases);
        r.push(violation(1, "Margins are too narrow.", Category::Structure));
        r.push(violation(2, "Spelling error in heading.", Category::Grammar));
        r.push(violation(2, "Font is not Times New Roman.", Category::Structure));
        assert_eq!(r.count(Category::Structure), 2);
        assert_eq!(r.count(Category::Enhancement), 0);
        assert_eq!(r.total(), 3);
        let order: Vec<Category> = r.iter().map(|(c, _)| c).collect();
        assert_eq!(
            order,
            vec![Category::Structure, Category::Grammar, Category::Enhancement]
        );
    }

    #[test]
    fn page_ref_serialises_as_number_or_string() {
        assert_eq!(serde_json::to_string(&PageRef::Number(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&PageRef::general()).unwrap(), "\"general\"");
        assert_eq!(PageRef::parse(" 12 "), PageRef::Number(12));
        assert_eq!(PageRef::parse("X"), PageRef::Label("X".into()));
    }

    #[test]
    fn failed_reply_keeps_error_text() {
        let outcome = Err(crate::error::ResponderError::Provider("connection refused".into()));
        let reply = ModelReply::from_outcome(PageRef::Number(1), &outcome);
        assert!(!reply.ok);
        assert!(reply.raw_text.contains("connection refused"));
    }

    #[test]
    fn error_response_shape() {
        let resp = ReviewResponse::from_result(AnalysisMode::Batch, Err(crate::error::ReviewError::NoPages));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"], "Batch analysis failed: No pages to analyse");
    }
}
