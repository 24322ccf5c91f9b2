use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// Number of whitespace-delimited words in rich-text `html`, after dropping
/// every markup tag (tag names and attributes never count).
pub fn word_count(html: &str) -> usize {
    if html.is_empty() {
        return 0;
    }
    TAG.replace_all(html, " ").split_whitespace().count()
}

/// Plain text of `html` with tags removed and whitespace collapsed.
pub fn strip_markup(html: &str) -> String {
    TAG.replace_all(html, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
