//! Configuration types for document review.
//!
//! All analysis behaviour is controlled through [`ReviewConfig`], built via
//! its [`ReviewConfigBuilder`]. Collaborators (model responder, prompt
//! templates, categorisation policies, progress callback) are injected here
//! rather than looked up from process-wide state, so two requests with
//! different rubrics can run side by side.

use crate::error::ReviewError;
use crate::pipeline::categorize::RulePolicy;
use crate::pipeline::llm::ModelResponder;
use crate::progress::ProgressCallback;
use crate::prompts::PromptTemplates;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "llama3.2:3b";

/// Provider used when neither the config nor the environment names one.
pub const DEFAULT_PROVIDER: &str = "ollama";

/// Configuration for one document review.
///
/// # Example
/// ```rust
/// use tu_review::{AnalysisMode, ReviewConfig};
///
/// let config = ReviewConfig::builder()
///     .mode(AnalysisMode::Batch)
///     .max_pages(Some(5))
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReviewConfig {
    /// One model call per page, or one call for the whole document.
    pub mode: AnalysisMode,

    /// Number of concurrent per-page model calls. Default: 3.
    ///
    /// A local inference server serialises most of the work anyway; a small
    /// pool keeps it busy without queueing dozens of requests that would all
    /// hit their timeout.
    pub concurrency: usize,

    /// Analyse at most this many of the selected pages. Default: 10.
    /// `None` analyses every selected page.
    pub max_pages: Option<usize>,

    /// Page selection, applied before `max_pages`. Default: all pages.
    pub pages: PageSelection,

    /// LLM model identifier. If None, uses `EDGEQUAKE_MODEL` or [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name. If None, uses `EDGEQUAKE_LLM_PROVIDER` or [`DEFAULT_PROVIDER`].
    pub provider_name: Option<String>,

    /// Pre-constructed responder. Takes precedence over `provider_name`.
    pub responder: Option<Arc<dyn ModelResponder>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Output token cap for one page's reply. Default: 128.
    pub max_tokens_per_page: usize,

    /// Output token budget per page in batch mode. Default: 80.
    pub batch_tokens_per_page: usize,

    /// Per-call timeout in seconds. Default: 60. Batch calls get twice this.
    pub api_timeout_secs: u64,

    /// Characters of page text included in a per-page prompt. Default: 600.
    pub page_text_limit: usize,

    /// Characters of page text included per page in the batch prompt. Default: 400.
    pub batch_text_limit: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Rule text and instructions used to build prompts.
    pub templates: Arc<PromptTemplates>,

    /// Categorisation policy for per-page mode.
    pub phase_policy: Arc<RulePolicy>,

    /// Categorisation policy for batch mode.
    pub bucket_policy: Arc<RulePolicy>,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::default(),
            concurrency: 3,
            max_pages: Some(10),
            pages: PageSelection::default(),
            model: None,
            provider_name: None,
            responder: None,
            temperature: 0.1,
            max_tokens_per_page: 128,
            batch_tokens_per_page: 80,
            api_timeout_secs: 60,
            page_text_limit: 600,
            batch_text_limit: 400,
            password: None,
            download_timeout_secs: 120,
            templates: Arc::new(PromptTemplates::default()),
            phase_policy: Arc::new(RulePolicy::phases()),
            bucket_policy: Arc::new(RulePolicy::buckets()),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfig")
            .field("mode", &self.mode)
            .field("concurrency", &self.concurrency)
            .field("max_pages", &self.max_pages)
            .field("pages", &self.pages)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("responder", &self.responder.as_ref().map(|_| "<dyn ModelResponder>"))
            .field("temperature", &self.temperature)
            .field("max_tokens_per_page", &self.max_tokens_per_page)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("phase_policy", &self.phase_policy.id())
            .field("bucket_policy", &self.bucket_policy.id())
            .finish()
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }

    /// Timeout for the single batch call.
    pub fn batch_timeout_secs(&self) -> u64 {
        self.api_timeout_secs * 2
    }

    /// Output token budget for a batch covering `pages` pages.
    pub fn batch_max_tokens(&self, pages: usize) -> usize {
        pages.max(1) * self.batch_tokens_per_page
    }

    /// Model name after applying the environment fallback.
    pub fn effective_model(&self) -> String {
        self.model
            .clone()
            .or_else(|| std::env::var("EDGEQUAKE_MODEL").ok().filter(|m| !m.is_empty()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// Static echo of the effective settings.
    pub fn echo(&self) -> ConfigEcho {
        ConfigEcho {
            mode: self.mode,
            timeout_seconds: self.api_timeout_secs,
            max_tokens: self.max_tokens_per_page,
            temperature: self.temperature,
            model: self.effective_model(),
            max_workers: self.concurrency,
            max_pages: self.max_pages,
            phase_policy: self.phase_policy.id(),
            bucket_policy: self.bucket_policy.id(),
        }
    }

    /// Apply the page selection and the page limit to a document of
    /// `total_pages` pages, returning 0-indexed page indices.
    pub fn selected_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices = self.pages.to_indices(total_pages);
        if let Some(limit) = self.max_pages.filter(|&n| n > 0) {
            indices.truncate(limit);
        }
        indices
    }
}

/// Builder for [`ReviewConfig`].
#[derive(Debug)]
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl ReviewConfigBuilder {
    pub fn mode(mut self, mode: AnalysisMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_pages(mut self, n: Option<usize>) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn responder(mut self, responder: Arc<dyn ModelResponder>) -> Self {
        self.config.responder = Some(responder);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens_per_page(mut self, n: usize) -> Self {
        self.config.max_tokens_per_page = n;
        self
    }

    pub fn batch_tokens_per_page(mut self, n: usize) -> Self {
        self.config.batch_tokens_per_page = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn page_text_limit(mut self, chars: usize) -> Self {
        self.config.page_text_limit = chars;
        self
    }

    pub fn batch_text_limit(mut self, chars: usize) -> Self {
        self.config.batch_text_limit = chars;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn templates(mut self, templates: PromptTemplates) -> Self {
        self.config.templates = Arc::new(templates);
        self
    }

    pub fn phase_policy(mut self, policy: RulePolicy) -> Self {
        self.config.phase_policy = Arc::new(policy);
        self
    }

    pub fn bucket_policy(mut self, policy: RulePolicy) -> Self {
        self.config.bucket_policy = Arc::new(policy);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReviewConfig, ReviewError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ReviewError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(ReviewError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if c.phase_policy.taxonomy() != crate::output::Taxonomy::Phases {
            return Err(ReviewError::InvalidConfig(format!(
                "Policy '{}' cannot be used for per-page analysis",
                c.phase_policy.id()
            )));
        }
        if c.bucket_policy.taxonomy() != crate::output::Taxonomy::Buckets {
            return Err(ReviewError::InvalidConfig(format!(
                "Policy '{}' cannot be used for batch analysis",
                c.bucket_policy.id()
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the document is sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// One call per page, categorised into structure / grammar / enhancement.
    #[default]
    PerPage,
    /// One call for all pages, categorised into error / warning / suggestion / idea.
    Batch,
}

/// Specifies which pages of the PDF to analyse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Effective settings, as echoed by `tu-review --show-config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEcho {
    pub mode: AnalysisMode,
    pub timeout_seconds: u64,
    pub max_tokens: usize,
    pub temperature: f32,
    pub model: String,
    pub max_workers: usize,
    pub max_pages: Option<usize>,
    pub phase_policy: String,
    pub bucket_policy: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_settings() {
        let c = ReviewConfig::default();
        assert_eq!(c.concurrency, 3);
        assert_eq!(c.max_pages, Some(10));
        assert_eq!(c.api_timeout_secs, 60);
        assert_eq!(c.batch_timeout_secs(), 120);
        assert_eq!(c.max_tokens_per_page, 128);
        assert_eq!(c.batch_max_tokens(4), 320);
        assert!((c.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn page_limit_applies_after_selection() {
        let c = ReviewConfig::builder()
            .pages(PageSelection::Range(3, 20))
            .max_pages(Some(2))
            .build()
            .unwrap();
        assert_eq!(c.selected_indices(30), vec![2, 3]);
    }

    #[test]
    fn zero_page_limit_means_all() {
        let c = ReviewConfig::builder().max_pages(Some(0)).build().unwrap();
        assert_eq!(c.selected_indices(12).len(), 12);
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Single(4).to_indices(3), Vec::<usize>::new());
        assert_eq!(PageSelection::Set(vec![3, 1, 3]).to_indices(5), vec![0, 2]);
    }

    #[test]
    fn swapped_policies_are_rejected() {
        let err = ReviewConfig::builder()
            .phase_policy(RulePolicy::buckets())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("per-page"), "got: {err}");
    }

    #[test]
    fn echo_reports_model_and_workers() {
        let c = ReviewConfig::builder()
            .model("llama3.1:8b")
            .concurrency(5)
            .build()
            .unwrap();
        let echo = c.echo();
        assert_eq!(echo.model, "llama3.1:8b");
        assert_eq!(echo.max_workers, 5);
        assert_eq!(echo.timeout_seconds, 60);
    }
}
