//! HTML to markdown for LLM consumption.

/// Convert captured markup, tidy it, and cap its length.
#[must_use]
pub fn render(html: &str, limit: usize) -> String {
    truncate(&clean(&html_to_markdown(html)), limit)
}

#[must_use]
pub fn html_to_markdown(html: &str) -> String {
    quick_html2md::html_to_markdown(html)
}

/// Collapse blank-line runs to a single blank line and normalize bullets to
/// `- `. Applying it twice gives the same result as applying it once.
#[must_use]
pub fn clean(markdown: &str) -> String {
    let mut text = markdown.trim().to_string();
    while text.contains("\n\n\n") {
        text = text.replace("\n\n\n", "\n\n");
    }

    let lines: Vec<String> = text
        .split('\n')
        .map(|line| {
            match line.strip_prefix("* ").or_else(|| line.strip_prefix("- ")) {
                Some(rest) => format!("- {}", rest.trim_start()),
                None => line.to_string(),
            }
        })
        .collect();

    lines.join("\n").trim().to_string()
}

/// Cut `text` to `limit` characters and say so. Counts are in chars, never
/// splitting a code point.
#[must_use]
pub fn truncate(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .nth(limit)
        .map_or(text.len(), |(idx, _)| idx);
    format!(
        "{}\n\n... (output truncated after {limit} chars, full content was {total} chars)",
        &text[..cut]
    )
}
