//! Message rendering for Telegram's HTML parse mode.
//!
//! HTML mode needs only `&`, `<` and `>` escaped in text (plus `"` inside
//! attribute values), which is why every alert uses it.

use std::borrow::Cow;

use crate::ingest::types::Item;

/// Escape vendor text for an HTML-mode message body.
pub fn escape_text(s: &str) -> Cow<'_, str> {
    html_escape::encode_text(s)
}

pub fn bold(s: &str) -> String {
    format!("<b>{}</b>", escape_text(s))
}

pub fn link(href: &str, label: &str) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        html_escape::encode_double_quoted_attribute(href),
        escape_text(label)
    )
}

/// `1. <line>`, `2. <line>`, ... in the given order.
pub fn numbered<F>(items: &[Item], line: F) -> Vec<String>
where
    F: Fn(&Item) -> String,
{
    items
        .iter()
        .enumerate()
        .map(|(i, it)| format!("{}. {}", i + 1, line(it)))
        .collect()
}

/// Plain-text body reporting a failed run.
pub fn failure_report(source: &str, err: &dyn std::fmt::Display) -> String {
    format!("{source} check failed: {err}")
}

/// `29900` → `29,900`.
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
