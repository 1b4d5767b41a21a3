//! Summary builder: fixed-template report text from category counts.
//!
//! Every function here is a pure template substitution over a
//! [`CategorizedResult`]; no randomness and no locale handling.

use crate::output::{CategorizedResult, Category, PhaseSummary, Taxonomy, Violation};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Report text for a finished analysis, shaped by the result's taxonomy.
pub fn build_summary(taxonomy: Taxonomy, total_pages: usize, result: &CategorizedResult) -> String {
    match taxonomy {
        Taxonomy::Phases => phases_summary(total_pages, result),
        Taxonomy::Buckets => buckets_summary(total_pages, result),
    }
}

fn phases_summary(total_pages: usize, result: &CategorizedResult) -> String {
    let total = result.total();
    if total == 0 {
        return format!(
            "TU FORMAT ANALYSIS COMPLETE\n\n\
             📊 SUMMARY:\n\
             • Total Pages Analyzed: {total_pages}\n\
             • Total Issues Found: 0\n\
             • Compliance Rate: 100%\n\n\
             ✅ EXCELLENT! No TU format violations detected.\n\n\
             Your document appears to follow TU format standards correctly."
        );
    }

    format!(
        "TU FORMAT ANALYSIS COMPLETE\n\n\
         📊 SUMMARY:\n\
         • Total Pages Analyzed: {total_pages}\n\
         • Total Issues Found: {total}\n\n\
         🔍 PHASE BREAKDOWN:\n\
         • Phase 1 (Structure): {structure} critical issues\n\
         • Phase 2 (Grammar): {grammar} language issues\n\
         • Phase 3 (Enhancement): {enhancement} improvement suggestions\n\n\
         💡 RECOMMENDATIONS:\n\
         • Address Phase 1 issues first (critical structure problems)\n\
         • Fix Phase 2 grammar and spelling errors\n\
         • Consider Phase 3 suggestions for content improvement",
        structure = result.count(Category::Structure),
        grammar = result.count(Category::Grammar),
        enhancement = result.count(Category::Enhancement),
    )
}

fn buckets_summary(total_pages: usize, result: &CategorizedResult) -> String {
    if result.total() == 0 {
        return format!(
            "TU FORMAT ANALYSIS COMPLETE\n\n\
             📊 SUMMARY:\n\
             • Pages Analyzed: {total_pages}\n\
             • Status: ✅ No violations detected\n\n\
             Your document follows TU format standards correctly."
        );
    }

    format!(
        "TU FORMAT ANALYSIS COMPLETE\n\n\
         📊 SUMMARY:\n\
         • Pages Analyzed: {total_pages}\n\
         • Errors: {errors} | Warnings: {warnings} | Suggestions: {suggestions} | Ideas: {ideas}\n\n\
         Focus on fixing ERRORS first, then address WARNINGS.",
        errors = result.count(Category::Error),
        warnings = result.count(Category::Warning),
        suggestions = result.count(Category::Suggestion),
        ideas = result.count(Category::Idea),
    )
}

/// Icon and title for a phase category.
pub fn phase_label(category: Category) -> (&'static str, &'static str) {
    match category {
        Category::Structure => ("🚨", "Structure Errors"),
        Category::Grammar => ("⚠️", "Grammar & Spelling Errors"),
        _ => ("💡", "Content Enhancement Suggestions"),
    }
}

/// Per-phase count, icon, title and first violation text.
///
/// Returns `None` for a bucket-taxonomy result.
pub fn phase_summary(result: &CategorizedResult) -> Option<BTreeMap<Category, PhaseSummary>> {
    let is_phases = result
        .iter()
        .next()
        .is_some_and(|(c, _)| c.taxonomy() == Taxonomy::Phases);
    if !is_phases {
        return None;
    }

    let summary = result
        .iter()
        .map(|(category, violations)| {
            let (icon, title) = phase_label(category);
            let entry = PhaseSummary {
                count: violations.len(),
                icon: icon.to_string(),
                title: title.to_string(),
                description: violations.first().map(|v| v.text.clone()).unwrap_or_default(),
            };
            (category, entry)
        })
        .collect();
    Some(summary)
}

/// Numbered list of at most `max_display` violations, with a tail line
/// counting the rest.
pub fn format_violation_list(violations: &[Violation], max_display: usize) -> String {
    if violations.is_empty() {
        return "No errors found.".to_string();
    }

    let mut lines: Vec<String> = violations
        .iter()
        .take(max_display)
        .enumerate()
        .map(|(i, v)| format!("{}. {}", i + 1, v.text))
        .collect();
    if violations.len() > max_display {
        lines.push(format!("... and {} more issues", violations.len() - max_display));
    }
    lines.join("\n")
}

/// Text block describing each phase of a phase summary.
pub fn format_phase_summary(summary: &BTreeMap<Category, PhaseSummary>) -> String {
    if summary.is_empty() {
        return "No phase summary available.".to_string();
    }

    let mut out = String::from("📋 DETAILED PHASE ANALYSIS:\n\n");
    for (category, phase) in summary {
        let _ = writeln!(out, "🔹 {}:", category.as_str().to_uppercase());
        let _ = writeln!(out, "  • count: {}", phase.count);
        let _ = writeln!(out, "  • icon: {}", phase.icon);
        let _ = writeln!(out, "  • title: {}", phase.title);
        let _ = writeln!(out, "  • description: {}", phase.description);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::PageRef;

    fn violation(category: Category, text: &str) -> Violation {
        Violation {
            page: PageRef::Number(1),
            text: text.to_string(),
            category,
        }
    }

    #[test]
    fn test_clean_phase_report() {
        let result = CategorizedResult::new(Taxonomy::Phases);
        let text = build_summary(Taxonomy::Phases, 4, &result);
        assert!(text.contains("• Total Pages Analyzed: 4"));
        assert!(text.contains("• Total Issues Found: 0"));
        assert!(text.contains("Compliance Rate: 100%"));
        assert!(!text.contains("PHASE BREAKDOWN"));
    }

    #[test]
    fn test_phase_report_with_issues() {
        let mut result = CategorizedResult::new(Taxonomy::Phases);
        result.push(violation(Category::Structure, "Page numbering is incorrect."));
        result.push(violation(Category::Grammar, "Typo in heading."));
        let text = build_summary(Taxonomy::Phases, 2, &result);
        assert!(text.contains("• Total Issues Found: 2"));
        assert!(text.contains("• Phase 1 (Structure): 1 critical issues"));
        assert!(text.contains("• Phase 3 (Enhancement): 0 improvement suggestions"));
        assert!(text.ends_with("Consider Phase 3 suggestions for content improvement"));
    }

    #[test]
    fn test_bucket_reports() {
        let mut result = CategorizedResult::new(Taxonomy::Buckets);
        assert!(build_summary(Taxonomy::Buckets, 3, &result).contains("Status: ✅ No violations detected"));

        result.push(violation(Category::Error, "Font is not Times New Roman."));
        let text = build_summary(Taxonomy::Buckets, 3, &result);
        assert!(text.contains("• Errors: 1 | Warnings: 0 | Suggestions: 0 | Ideas: 0"));
        assert!(text.ends_with("Focus on fixing ERRORS first, then address WARNINGS."));
    }

    #[test]
    fn test_phase_summary_uses_first_violation() {
        let mut result = CategorizedResult::new(Taxonomy::Phases);
        result.push(violation(Category::Grammar, "Spelling error in abstract."));
        result.push(violation(Category::Grammar, "Missing comma."));
        let summary = phase_summary(&result).unwrap();

        assert_eq!(summary.len(), 3);
        let grammar = &summary[&Category::Grammar];
        assert_eq!(grammar.count, 2);
        assert_eq!(grammar.title, "Grammar & Spelling Errors");
        assert_eq!(grammar.description, "Spelling error in abstract.");
        assert_eq!(summary[&Category::Structure].description, "");
        assert_eq!(summary[&Category::Structure].icon, "🚨");
    }

    #[test]
    fn test_phase_summary_absent_for_buckets() {
        assert!(phase_summary(&CategorizedResult::new(Taxonomy::Buckets)).is_none());
    }

    #[test]
    fn test_violation_list_is_capped() {
        let items: Vec<Violation> = (1..=4)
            .map(|i| violation(Category::Error, &format!("Issue {i}")))
            .collect();
        assert_eq!(
            format_violation_list(&items, 2),
            "1. Issue 1\n2. Issue 2\n... and 2 more issues"
        );
        assert_eq!(format_violation_list(&[], 10), "No errors found.");
    }

    #[test]
    fn test_phase_summary_block() {
        let mut result = CategorizedResult::new(Taxonomy::Phases);
        result.push(violation(Category::Enhancement, "Consider adding figures."));
        let block = format_phase_summary(&phase_summary(&result).unwrap());
        assert!(block.starts_with("📋 DETAILED PHASE ANALYSIS:"));
        assert!(block.contains("🔹 ENHANCEMENT:\n  • count: 1"));
        assert_eq!(format_phase_summary(&BTreeMap::new()), "No phase summary available.");
    }
}
