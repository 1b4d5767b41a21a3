//! CLI binary for tu-review.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReviewConfig` and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use tu_review::pipeline::summary::{format_phase_summary, format_violation_list};
use tu_review::{
    analyze, inspect, write_report, AnalysisMode, AnalysisProgressCallback, AnalysisReport,
    PageSelection, ProgressCallback, PromptTemplates, ReviewConfig, ReviewResponse,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn paint(code: u8, s: &str) -> String {
    format!("\x1b[{code}m{s}\x1b[0m")
}
fn green(s: &str) -> String {
    paint(32, s)
}
fn red(s: &str) -> String {
    paint(31, s)
}
fn dim(s: &str) -> String {
    paint(2, s)
}
fn bold(s: &str) -> String {
    paint(1, s)
}
fn cyan(s: &str) -> String {
    paint(36, s)
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar with one log line per page. Pages may complete
/// out of order in per-page mode.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_analysis_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting text…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Reviewing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reviewing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, violations: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{violations:>3} issues")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_analysis_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages reviewed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages reviewed  ({} failed)",
                if failed == total_pages { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Review the first 10 pages, one model call per page
  tu-review thesis.pdf

  # One combined call; errors / warnings / suggestions / ideas
  tu-review --batch thesis.pdf

  # Every page, custom rules, JSON report to a file
  tu-review --max-pages 0 --rules-dir ./rules --json -o report.json thesis.pdf

  # Review a PDF from a URL with a larger model
  tu-review --model llama3.1:8b https://example.org/thesis.pdf

  # Count pages without calling the model
  tu-review --inspect-only thesis.pdf

  # Show the effective configuration
  tu-review --show-config thesis.pdf

RULES DIRECTORY:
  tu_format_rules.txt       Formatting rules appended to every prompt
  page_instructions.txt     Per-page rubric (defaults to the built-in one)
  batch_instructions.txt    Batch rubric (defaults to the built-in one)

ENVIRONMENT VARIABLES:
  EDGEQUAKE_LLM_PROVIDER  Provider (default: ollama)
  EDGEQUAKE_MODEL         Model ID (default: llama3.2:3b)
  PDFIUM_LIB_PATH         Path to libpdfium; otherwise the system library is used
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Review a thesis PDF against TU formatting rules with a local LLM.
#[derive(Parser, Debug)]
#[command(
    name = "tu-review",
    version,
    about = "Review PDF documents for TU format violations using an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the JSON report to this file instead of printing to stdout.
    #[arg(short, long, env = "TU_REVIEW_OUTPUT")]
    output: Option<PathBuf>,

    /// Analyse all pages in one call (error / warning / suggestion / idea).
    #[arg(long, env = "TU_REVIEW_BATCH")]
    batch: bool,

    /// Analyse at most this many pages; 0 analyses every page.
    #[arg(long, env = "TU_REVIEW_MAX_PAGES", default_value_t = 10)]
    max_pages: usize,

    /// Page selection: all, 5, 3-15, 1,3,5 or 1-3,7. Applied before --max-pages.
    #[arg(long, env = "TU_REVIEW_PAGES", default_value = "all")]
    pages: String,

    /// Number of concurrent per-page model calls.
    #[arg(short, long, env = "TU_REVIEW_MAX_WORKERS", default_value_t = 3)]
    concurrency: usize,

    /// LLM model ID (e.g. llama3.2:3b).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: ollama, openai, anthropic, gemini, ...
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "TU_REVIEW_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-call model timeout in seconds; the batch call gets twice this.
    #[arg(long, env = "TU_REVIEW_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Directory holding tu_format_rules.txt and instruction files.
    #[arg(long, env = "TU_REVIEW_RULES_DIR")]
    rules_dir: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "TU_REVIEW_PASSWORD")]
    password: Option<String>,

    /// Print the JSON report instead of the text summary.
    #[arg(long, env = "TU_REVIEW_JSON")]
    json: bool,

    /// Violations listed per category in the text summary.
    #[arg(long, default_value_t = 10)]
    max_display: usize,

    /// Disable progress bar.
    #[arg(long, env = "TU_REVIEW_NO_PROGRESS")]
    no_progress: bool,

    /// Print page counts only, no model calls.
    #[arg(long)]
    inspect_only: bool,

    /// Print the effective configuration and exit.
    #[arg(long)]
    show_config: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TU_REVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TU_REVIEW_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.show_config;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input).await.context("Failed to inspect PDF")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialise page info")?
            );
        } else {
            println!("File:             {}", cli.input);
            println!("Pages:            {}", info.page_count);
            println!("Pages with text:  {}", info.pages_with_text);
        }
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    if cli.show_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&config.echo()).context("Failed to serialise config")?
        );
        return Ok(());
    }

    // ── Run analysis ─────────────────────────────────────────────────────
    let result = analyze(&cli.input, &config).await;

    if cli.json && cli.output.is_none() {
        let failed = result.is_err();
        let response = ReviewResponse::from_result(config.mode, result);
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to serialise report")?
        );
        if failed {
            std::process::exit(1);
        }
        return Ok(());
    }

    let report = result.context("Analysis failed")?;

    if let Some(ref output_path) = cli.output {
        write_report(&report, output_path)
            .await
            .context("Failed to write report")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} pages  {} issues  {}ms  →  {}",
                if report.stats.failed_pages == 0 { green("✔") } else { cyan("⚠") },
                report.total_pages,
                report.total_issues,
                report.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    print_report(&report, cli.max_display);

    if !cli.quiet && !show_progress {
        eprintln!(
            "Reviewed {} pages in {}ms",
            report.stats.pages_selected, report.stats.total_duration_ms
        );
        if report.stats.failed_pages > 0 {
            eprintln!("  {} pages failed", report.stats.failed_pages);
        }
    }

    Ok(())
}

/// Human-readable report: summary, then each category's violations.
fn print_report(report: &AnalysisReport, max_display: usize) {
    println!("{}\n", report.summary_text);

    for (category, violations) in report.categorized.iter() {
        if violations.is_empty() {
            continue;
        }
        println!("{}", bold(&format!("{} ({})", category.as_str().to_uppercase(), violations.len())));
        println!("{}\n", format_violation_list(violations, max_display));
    }

    if let Some(ref phases) = report.phase_summary {
        println!("{}", format_phase_summary(phases));
    }

    for page in report.per_page_results.iter().filter(|p| !p.ok) {
        println!("{} Page {}: {}", red("✗"), page.page, dim(&page.raw_analysis));
    }
}

/// Map CLI args to `ReviewConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReviewConfig> {
    let pages = parse_pages(&cli.pages)?;
    let templates = cli
        .rules_dir
        .as_ref()
        .map(PromptTemplates::load)
        .unwrap_or_default();

    let mut builder = ReviewConfig::builder()
        .mode(if cli.batch { AnalysisMode::Batch } else { AnalysisMode::PerPage })
        .concurrency(cli.concurrency)
        .max_pages(Some(cli.max_pages))
        .pages(pages)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.timeout)
        .templates(templates);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` into a `PageSelection`.
///
/// A lone page or span maps to `Single` / `Range`; a comma list may mix
/// both (`1-3,7`) and is expanded into a `Set`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();
    if s == "all" {
        return Ok(PageSelection::All);
    }

    let parts: Vec<&str> = s.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [] => anyhow::bail!("Empty page selection"),
        [one] => Ok(match parse_span(one)? {
            (start, end) if start == end => PageSelection::Single(start),
            (start, end) => PageSelection::Range(start, end),
        }),
        many => {
            let mut pages = Vec::new();
            for part in many {
                let (start, end) = parse_span(part)?;
                pages.extend(start..=end);
            }
            Ok(PageSelection::Set(pages))
        }
    }
}

/// `N` or `A-B`, 1-indexed and inclusive.
fn parse_span(part: &str) -> Result<(usize, usize)> {
    let (start, end) = match part.split_once('-') {
        Some((a, b)) => (parse_page(a)?, parse_page(b)?),
        None => {
            let page = parse_page(part)?;
            (page, page)
        }
    };
    if start > end {
        anyhow::bail!("Invalid page range '{}': start must be <= end", part);
    }
    Ok((start, end))
}

fn parse_page(s: &str) -> Result<usize> {
    let page: usize = s
        .trim()
        .parse()
        .with_context(|| format!("Invalid page number: '{}'", s.trim()))?;
    if page == 0 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got 0)");
    }
    Ok(page)
}
