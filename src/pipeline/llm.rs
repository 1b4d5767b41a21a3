//! Model interaction: send a prompt, get reply text or a tagged failure.
//!
//! The pipeline only sees the [`ModelResponder`] trait. [`LlmResponder`]
//! adapts any `edgequake_llm` provider to it and enforces the per-call
//! timeout; tests substitute scripted responders.
//!
//! There is no retry: a timed-out or failed call becomes a failed
//! [`PageAnalysis`] and the rest of the document carries on.

use crate::config::{ReviewConfig, DEFAULT_PROVIDER};
use crate::error::{PageError, ResponderError, ReviewError};
use crate::output::{ModelReply, Page, PageAnalysis, PageRef};
use crate::pipeline::segment;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sampling parameters and deadline for one model call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRequest {
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

impl ModelRequest {
    /// Request parameters for a single-page call.
    pub fn for_page(config: &ReviewConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens_per_page,
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Request parameters for one call covering `pages` pages.
    pub fn for_batch(config: &ReviewConfig, pages: usize) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.batch_max_tokens(pages),
            timeout_secs: config.batch_timeout_secs(),
        }
    }
}

/// Anything that turns a prompt into reply text.
///
/// Implementations must honour `request.timeout_secs` and report failures
/// as [`ResponderError`], never as reply text.
#[async_trait]
pub trait ModelResponder: Send + Sync {
    async fn respond(&self, prompt: &str, request: &ModelRequest) -> Result<String, ResponderError>;
}

/// [`ModelResponder`] backed by an `edgequake_llm` chat provider.
pub struct LlmResponder {
    provider: Arc<dyn LLMProvider>,
}

impl LlmResponder {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ModelResponder for LlmResponder {
    async fn respond(&self, prompt: &str, request: &ModelRequest) -> Result<String, ResponderError> {
        let messages = vec![ChatMessage::user_with_images(prompt, vec![])];
        let options = build_options(request);

        let call = self.provider.chat(&messages, Some(&options));
        match tokio::time::timeout(Duration::from_secs(request.timeout_secs), call).await {
            Ok(Ok(response)) => {
                debug!(
                    "{} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Ok(Err(e)) => Err(ResponderError::Provider(e.to_string())),
            Err(_) => Err(ResponderError::Timeout {
                secs: request.timeout_secs,
            }),
        }
    }
}

fn build_options(request: &ModelRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

/// Analyse one page: prompt, call, segment.
///
/// Always returns a `PageAnalysis`; a failed call is recorded with
/// `ok = false` and no violations so one bad page never aborts the request.
pub async fn analyze_page(
    responder: &Arc<dyn ModelResponder>,
    page: &Page,
    config: &ReviewConfig,
) -> PageAnalysis {
    let start = Instant::now();
    let prompt = config.templates.page_prompt(page, config.page_text_limit);
    let outcome = responder
        .respond(&prompt, &ModelRequest::for_page(config))
        .await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let reply = ModelReply::from_outcome(PageRef::Number(page.number), &outcome);
    match outcome {
        Ok(text) => {
            let violations = segment::segment_reply(&text, page.number);
            debug!(
                "Page {}: {} violation lines in {}ms",
                page.number,
                violations.len(),
                duration_ms
            );
            PageAnalysis {
                page: reply.page,
                raw_analysis: reply.raw_text,
                ok: true,
                violations,
                error: None,
                duration_ms,
            }
        }
        Err(e) => {
            warn!("Page {}: {}", page.number, e);
            PageAnalysis {
                page: reply.page,
                raw_analysis: reply.raw_text,
                ok: false,
                violations: Vec::new(),
                error: Some(PageError::from_responder(page.number, &e)),
                duration_ms,
            }
        }
    }
}

/// Resolve the model responder, from most-specific to least-specific.
///
/// 1. A pre-built responder in `config.responder`.
/// 2. A named provider (`config.provider_name`) with `config.model`.
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. The local default: [`DEFAULT_PROVIDER`] with the effective model.
pub fn resolve_responder(config: &ReviewConfig) -> Result<Arc<dyn ModelResponder>, ReviewError> {
    if let Some(ref responder) = config.responder {
        return Ok(Arc::clone(responder));
    }

    if let Some(ref name) = config.provider_name {
        return create_responder(name, &config.effective_model());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_responder(&prov, config.model.as_deref().unwrap_or(&model));
        }
    }

    create_responder(DEFAULT_PROVIDER, &config.effective_model())
}

fn create_responder(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn ModelResponder>, ReviewError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ReviewError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    debug!("Using provider '{}' with model '{}'", provider_name, model);
    Ok(Arc::new(LlmResponder::new(provider)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<String, ResponderError>);

    #[async_trait]
    impl ModelResponder for Fixed {
        async fn respond(&self, _: &str, _: &ModelRequest) -> Result<String, ResponderError> {
            self.0.clone()
        }
    }

    fn responder(outcome: Result<String, ResponderError>) -> Arc<dyn ModelResponder> {
        Arc::new(Fixed(outcome))
    }

    #[test]
    fn test_request_parameters_follow_config() {
        let config = ReviewConfig::default();
        let page = ModelRequest::for_page(&config);
        assert_eq!(page.max_tokens, 128);
        assert_eq!(page.timeout_secs, 60);

        let batch = ModelRequest::for_batch(&config, 4);
        assert_eq!(batch.max_tokens, 320);
        assert_eq!(batch.timeout_secs, 120);

        let opts = build_options(&page);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(128));
    }

    #[tokio::test]
    async fn test_successful_reply_is_segmented() {
        let r = responder(Ok("1. Page numbering is incorrect.\n2. No other violations were detected on this page.".into()));
        let analysis = analyze_page(&r, &Page::new(1, "text"), &ReviewConfig::default()).await;
        assert!(analysis.ok);
        assert_eq!(analysis.violations, vec!["Page numbering is incorrect."]);
        assert!(analysis.error.is_none());
    }

    #[tokio::test]
    async fn test_failed_call_yields_no_violations() {
        let r = responder(Err(ResponderError::Provider(
            "Connection error: model is missing".into(),
        )));
        let analysis = analyze_page(&r, &Page::new(3, "text"), &ReviewConfig::default()).await;
        assert!(!analysis.ok);
        assert!(analysis.violations.is_empty());
        assert!(analysis.raw_analysis.starts_with("Error during analysis"));
        assert!(matches!(analysis.error, Some(PageError::LlmFailed { page: 3, .. })));
    }

    #[test]
    fn test_configured_responder_takes_priority() {
        let r = responder(Ok(String::new()));
        let config = ReviewConfig::builder().responder(Arc::clone(&r)).build().unwrap();
        let resolved = resolve_responder(&config).unwrap();
        assert!(Arc::ptr_eq(&resolved, &r));
    }
}
