//! Response segmentation: turn one page's free-text reply into violation lines.
//!
//! The model answers in loosely numbered prose wrapped in boilerplate
//! ("After analyzing page 3 ... I found the following violations ...").
//! Segmentation removes the known boilerplate, splits on line breaks, drops
//! bullets and residual "no violations" phrasing, strips `N. ` numbering
//! and keeps only lines long enough to be a real finding.

use once_cell::sync::Lazy;
use regex::Regex;

/// Phrase meaning "this page is clean". Case- and punctuation-sensitive.
pub const NO_VIOLATIONS_SENTINEL: &str = "No TU format violations detected";

/// Lines must be longer than this many characters to count as a violation.
pub const MIN_VIOLATION_CHARS: usize = 10;

/// Line prefixes that mark a bullet; such lines are discarded.
pub const BULLET_MARKERS: &[char] = &['*', '•', '-'];

/// Introductory and closing phrases that never carry a finding.
const FIXED_BOILERPLATE: &[&str] = &[
    "I have identified the following violations of TU format standards:",
    "I found the following violations of TU format standards:",
    "the following TU format standard violations were found:",
    "Violations found:",
    "No other violations were detected on this page.",
    "No other violations of TU format standards were detected on this page.",
    "No TU format violations detected on this page.",
];

static RE_NUMBERING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+").unwrap());

/// Convert `\r\n` and lone `\r` line endings to `\n`.
pub fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Whether a reply carries the "no violations" sentinel.
pub fn is_no_violations(reply: &str) -> bool {
    reply.contains(NO_VIOLATIONS_SENTINEL)
}

/// Boilerplate phrases for `page`, page-specific ones first.
pub fn boilerplate_phrases(page: usize) -> Vec<String> {
    let mut phrases = vec![
        format!("After analyzing page {page}"),
        format!("After analyzing the content of page {page}"),
        format!("After analyzing the provided content for Page {page}"),
    ];
    phrases.extend(FIXED_BOILERPLATE.iter().map(|p| p.to_string()));
    phrases
}

/// Remove every boilerplate phrase (exact substring match).
pub fn strip_boilerplate(text: &str, page: usize) -> String {
    boilerplate_phrases(page)
        .iter()
        .fold(text.to_string(), |acc, phrase| acc.replace(phrase.as_str(), ""))
}

/// Strip a leading `N. ` list number, if present.
pub fn strip_numbering(line: &str) -> &str {
    match RE_NUMBERING.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Whether a trimmed line is long enough to be a finding.
pub fn is_substantial(line: &str) -> bool {
    line.chars().count() > MIN_VIOLATION_CHARS
}

/// Split one page's reply into violation lines, in reply order.
///
/// A reply containing [`NO_VIOLATIONS_SENTINEL`] yields no lines at all.
pub fn segment_reply(reply: &str, page: usize) -> Vec<String> {
    if is_no_violations(reply) {
        return Vec::new();
    }

    let reply = normalise_line_endings(reply);
    let cleaned = strip_boilerplate(reply.trim(), page);

    cleaned
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with(BULLET_MARKERS)
                && !line.starts_with("No other")
                && !line.starts_with("No TU")
        })
        .map(|line| strip_numbering(line).trim())
        .filter(|line| is_substantial(line))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_reply_yields_nothing() {
        assert!(segment_reply("No TU format violations detected on this page.", 4).is_empty());
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_crlf_reply_splits_like_lf() {
        let reply = "1. Page numbering is incorrect.\r\n2. Heading format incorrect in 2.1.\r\n";
        assert_eq!(
            segment_reply(reply, 1),
            vec!["Page numbering is incorrect.", "Heading format incorrect in 2.1."]
        );
        let old_mac = "1. Page numbering is incorrect.\r2. Margin should be 2.5 cm.";
        assert_eq!(segment_reply(old_mac, 1).len(), 2);
    }

    #[test]
    fn test_numbered_reply_with_trailing_boilerplate() {
        let reply = "1. Page numbering is incorrect.\n2. No other violations were detected on this page.";
        assert_eq!(segment_reply(reply, 1), vec!["Page numbering is incorrect."]);
    }

    #[test]
    fn test_keeps_order_and_strips_numbers() {
        let reply = "After analyzing page 7, I found the following violations of TU format standards:\n\
                     1. The font is not Times New Roman 12pt.\n\
                     2. Line spacing should be 1.5 throughout.\n\
                     3. Spelling error in the second paragraph.";
        assert_eq!(
            segment_reply(reply, 7),
            vec![
                "The font is not Times New Roman 12pt.",
                "Line spacing should be 1.5 throughout.",
                "Spelling error in the second paragraph.",
            ]
        );
    }

    #[test]
    fn test_bullets_and_short_fragments_are_dropped() {
        let reply = "* Structure\n- Grammar\n1. Margins are narrower than 2.5 cm.\nOK.\n\n• Enhancement";
        assert_eq!(segment_reply(reply, 2), vec!["Margins are narrower than 2.5 cm."]);
    }

    #[test]
    fn test_boilerplate_only_reply_yields_nothing() {
        let reply = "After analyzing page 5\nViolations found:\nNo other violations of TU format standards were detected on this page.";
        assert!(segment_reply(reply, 5).is_empty());
    }

    #[test]
    fn test_page_specific_boilerplate_only_matches_its_page() {
        let stripped = strip_boilerplate("After analyzing page 3, fine.", 4);
        assert_eq!(stripped, "After analyzing page 3, fine.");
        assert_eq!(strip_boilerplate("After analyzing page 3, fine.", 3), ", fine.");
    }

    #[test]
    fn test_numbering_requires_dot_space() {
        assert_eq!(strip_numbering("12. Heading format incorrect"), "Heading format incorrect");
        assert_eq!(strip_numbering("1.5 spacing is required"), "1.5 spacing is required");
    }
}
