//! Categorisation: assign each candidate violation to one bucket.
//!
//! Classification is an ordered rule table, first match wins, evaluated on
//! the lowercase line. The table is data ([`RulePolicy`]), not a chain of
//! conditionals, so the tie-break order between overlapping keyword sets is
//! a visible contract and tests can walk every rule.
//!
//! Two built-in policies exist:
//!
//! | Policy | Order | Default |
//! |--------|-------|---------|
//! | [`RulePolicy::phases`]  | structure → grammar → enhancement | structure |
//! | [`RulePolicy::buckets`] | error → warning → suggestion → idea (tag or keywords) | error |
//!
//! The "no violations" sentinel is never categorised, under either policy.

use crate::output::{CategorizedResult, Category, PageRef, Taxonomy, Violation};
use crate::pipeline::batch::Candidate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

const SENTINEL_LOWER: &str = "no tu format violations detected";

/// Placeholder fragments the model copies verbatim from the prompt format.
const PLACEHOLDER_FRAGMENTS: &[&str] = &["Page X:", "Page X :"];

static RE_ANY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:ERROR|WARNING|SUGGESTION|IDEA)\]").unwrap());

/// How a rule recognises a line.
#[derive(Clone)]
pub enum Matcher {
    /// The candidate carries this bracket tag, or the raw text contains it.
    Tag(Category),
    /// The lowercase line contains any of these substrings.
    Keywords(Vec<String>),
    /// Any of these regexes matches the lowercase line.
    Patterns(Vec<Regex>),
}

impl Matcher {
    fn matches(&self, candidate: &Candidate, lower: &str) -> bool {
        match self {
            Matcher::Tag(category) => {
                candidate.tag == Some(*category)
                    || category
                        .bracket_tag()
                        .is_some_and(|tag| candidate.text.contains(tag))
            }
            Matcher::Keywords(words) => words.iter().any(|w| lower.contains(w.as_str())),
            Matcher::Patterns(patterns) => patterns.iter().any(|p| p.is_match(lower)),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Tag(c) => write!(f, "Tag({c})"),
            Matcher::Keywords(w) => write!(f, "Keywords({w:?})"),
            Matcher::Patterns(p) => {
                let src: Vec<&str> = p.iter().map(Regex::as_str).collect();
                write!(f, "Patterns({src:?})")
            }
        }
    }
}

/// One `(matcher, category)` entry of a policy.
#[derive(Debug, Clone)]
pub struct Rule {
    pub category: Category,
    pub matcher: Matcher,
}

impl Rule {
    pub fn tag(category: Category) -> Self {
        Self {
            category,
            matcher: Matcher::Tag(category),
        }
    }

    pub fn keywords(category: Category, words: &[&str]) -> Self {
        Self {
            category,
            matcher: Matcher::Keywords(words.iter().map(|w| w.to_lowercase()).collect()),
        }
    }

    pub fn patterns(category: Category, patterns: &[&str]) -> Result<Self, regex::Error> {
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            category,
            matcher: Matcher::Patterns(compiled),
        })
    }

    fn compiled(category: Category, patterns: &[Regex]) -> Self {
        Self {
            category,
            matcher: Matcher::Patterns(patterns.to_vec()),
        }
    }
}

/// Cap and backfill for one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLimit {
    pub category: Category,
    /// Keep at most this many entries.
    pub cap: usize,
    /// When the bucket is empty, add this many entries from `pool`.
    pub backfill: usize,
    pub pool: Vec<String>,
}

/// A versioned, swappable categorisation policy.
#[derive(Debug, Clone)]
pub struct RulePolicy {
    name: String,
    version: u32,
    taxonomy: Taxonomy,
    rules: Vec<Rule>,
    default: Category,
    limits: Vec<BucketLimit>,
}

impl RulePolicy {
    pub fn new(
        name: impl Into<String>,
        version: u32,
        taxonomy: Taxonomy,
        rules: Vec<Rule>,
        default: Category,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            taxonomy,
            rules,
            default,
            limits: Vec::new(),
        }
    }

    pub fn with_limits(mut self, limits: Vec<BucketLimit>) -> Self {
        self.limits = limits;
        self
    }

    /// Structure / grammar / enhancement, for per-page replies.
    pub fn phases() -> Self {
        Self::new(
            "tu-phases",
            1,
            Taxonomy::Phases,
            vec![
                Rule::compiled(Category::Structure, &RE_STRUCTURE),
                Rule::compiled(Category::Grammar, &RE_GRAMMAR),
                Rule::compiled(Category::Enhancement, &RE_ENHANCEMENT),
            ],
            Category::Structure,
        )
    }

    /// Error / warning / suggestion / idea, for batch replies.
    ///
    /// Each bucket matches on its tag or its keywords before the next bucket
    /// is tried, so `[WARNING] Missing comma` is an error.
    pub fn buckets() -> Self {
        Self::new(
            "tu-buckets",
            1,
            Taxonomy::Buckets,
            vec![
                Rule::tag(Category::Error),
                Rule::keywords(Category::Error, ERROR_KEYWORDS),
                Rule::tag(Category::Warning),
                Rule::keywords(Category::Warning, WARNING_KEYWORDS),
                Rule::tag(Category::Suggestion),
                Rule::keywords(Category::Suggestion, SUGGESTION_KEYWORDS),
                Rule::tag(Category::Idea),
                Rule::keywords(Category::Idea, IDEA_KEYWORDS),
            ],
            Category::Error,
        )
        .with_limits(vec![
            BucketLimit {
                category: Category::Suggestion,
                cap: 5,
                backfill: 3,
                pool: GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
            },
            BucketLimit {
                category: Category::Idea,
                cap: 5,
                backfill: 3,
                pool: GENERIC_IDEAS.iter().map(|s| s.to_string()).collect(),
            },
        ])
    }

    /// `name/vN`, as echoed in configuration output.
    pub fn id(&self) -> String {
        format!("{}/v{}", self.name, self.version)
    }

    pub fn taxonomy(&self) -> Taxonomy {
        self.taxonomy
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn default_category(&self) -> Category {
        self.default
    }

    pub fn limits(&self) -> &[BucketLimit] {
        &self.limits
    }

    /// Category for a candidate, or `None` for the "no violations" sentinel.
    pub fn classify(&self, candidate: &Candidate) -> Option<Category> {
        let lower = candidate.text.to_lowercase();
        if lower.contains(SENTINEL_LOWER) {
            return None;
        }
        let category = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(candidate, &lower))
            .map(|rule| rule.category)
            .unwrap_or(self.default);
        Some(category)
    }

    /// Classify and clean a candidate into a [`Violation`].
    pub fn categorize(&self, page: PageRef, candidate: &Candidate) -> Option<Violation> {
        let category = self.classify(candidate)?;
        Some(Violation {
            page,
            text: clean_text(&candidate.text),
            category,
        })
    }

    /// Classify a raw line that may still carry a bracket tag.
    pub fn categorize_line(&self, page: PageRef, line: &str) -> Option<Violation> {
        self.categorize(page, &Candidate::from_line(line))
    }

    /// Categorise every candidate into a fresh result for this taxonomy.
    pub fn categorize_all(
        &self,
        items: impl IntoIterator<Item = (PageRef, Candidate)>,
    ) -> CategorizedResult {
        let mut result = CategorizedResult::new(self.taxonomy);
        for (page, candidate) in items {
            if let Some(v) = self.categorize(page, &candidate) {
                result.push(v);
            }
        }
        result
    }

    /// Truncate capped buckets and backfill empty ones from their pools.
    pub fn apply_limits(&self, result: &mut CategorizedResult) {
        for limit in &self.limits {
            let bucket = result.get_mut(limit.category);
            bucket.truncate(limit.cap);
            if bucket.is_empty() {
                bucket.extend(limit.pool.iter().take(limit.backfill).map(|text| Violation {
                    page: PageRef::general(),
                    text: text.clone(),
                    category: limit.category,
                }));
            }
        }
    }
}

/// Strip bracket tags and copied placeholders from a violation text.
pub fn clean_text(text: &str) -> String {
    let without_tags = RE_ANY_TAG.replace_all(text, "");
    PLACEHOLDER_FRAGMENTS
        .iter()
        .fold(without_tags.into_owned(), |acc, p| acc.replace(p, ""))
        .trim()
        .to_string()
}

// ── Phase rules ──────────────────────────────────────────────────────────

const STRUCTURE_PATTERNS: &[&str] = &[
    r"missing.*section.*title",
    r"incorrect.*page.*numbering",
    r"page.*numbering.*should.*be",
    r"flow.*problem",
    r"alignment.*problem",
    r"not.*aligned.*properly",
    r"wrong.*position",
    r"incorrect.*order",
    r"missing.*table.*of.*contents",
    r"font.*should.*be.*times.*new.*roman",
    r"margin.*should.*be",
    r"spacing.*should.*be.*1\.5",
    r"line.*spacing.*incorrect",
    r"heading.*format.*incorrect",
    r"figure.*caption.*position",
    r"table.*caption.*position",
    r"page.*size.*should.*be.*a4",
    r"citation.*format.*incorrect",
    r"reference.*format.*incorrect",
];

const GRAMMAR_PATTERNS: &[&str] = &[
    r"grammar.*mistake",
    r"grammatical.*error",
    r"spelling.*error",
    r"spelling.*mistake",
    r"grammar.*error",
    r"incorrect.*grammar",
    r"poor.*grammar",
    r"grammatical.*issue",
    r"spelling.*issue",
    r"typo",
    r"misspelled",
    r"grammar.*should.*be",
    r"sentence.*structure",
    r"punctuation.*error",
    r"punctuation.*mistake",
];

const ENHANCEMENT_PATTERNS: &[&str] = &[
    r"consider.*adding",
    r"you.*could.*write",
    r"you.*can.*write",
    r"use.*more.*formal",
    r"use.*bullet.*points",
    r"add.*more.*details",
    r"expand.*this.*section",
    r"include.*more.*information",
    r"provide.*more.*context",
    r"elaborate.*on",
    r"enhance.*the.*content",
    r"improve.*the.*description",
    r"add.*examples",
    r"include.*diagrams",
    r"add.*figures",
    r"consider.*including",
    r"suggestion.*to.*improve",
    r"idea.*for.*enhancement",
    r"recommendation.*for.*better",
    r"could.*be.*improved.*by",
];

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

static RE_STRUCTURE: Lazy<Vec<Regex>> = Lazy::new(|| compile_all(STRUCTURE_PATTERNS));
static RE_GRAMMAR: Lazy<Vec<Regex>> = Lazy::new(|| compile_all(GRAMMAR_PATTERNS));
static RE_ENHANCEMENT: Lazy<Vec<Regex>> = Lazy::new(|| compile_all(ENHANCEMENT_PATTERNS));

// ── Bucket rules ─────────────────────────────────────────────────────────

const ERROR_KEYWORDS: &[&str] = &[
    "error",
    "violation",
    "problem",
    "incorrect",
    "wrong",
    "missing",
    "structure",
    "citation",
    "alignment",
    "page numbering",
    "font",
    "margin",
];

const WARNING_KEYWORDS: &[&str] = &["warning", "grammar", "flow", "formatting", "inconsistent"];

const SUGGESTION_KEYWORDS: &[&str] = &[
    "suggestion",
    "improvement",
    "better",
    "alternative",
    "consider",
    "could",
    "should",
    "recommend",
];

const IDEA_KEYWORDS: &[&str] = &[
    "idea",
    "future",
    "related",
    "extension",
    "similar project",
    "could work on",
    "potential",
    "further",
];

/// Generic guidance used when the model produced no suggestions.
pub const GENERIC_SUGGESTIONS: &[&str] = &[
    "Consider adding more detailed explanations to improve clarity",
    "Review the formatting consistency throughout this section",
    "Add more specific examples to strengthen your arguments",
    "Consider reorganizing content for better flow",
    "Add transitional phrases to improve readability",
];

/// Generic follow-up ideas used when the model produced none.
pub const GENERIC_IDEAS: &[&str] = &[
    "This topic could be extended to include related research areas",
    "Consider developing this into a larger research project",
    "This work could be applied to similar problems in other domains",
    "Future work could explore advanced implementations",
    "This research could be extended to include comparative studies",
];
