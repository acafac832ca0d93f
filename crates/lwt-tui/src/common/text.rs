//! Text helpers for rendering paths, branch names and diff lines.

use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Truncates the end of `text` with `…` so it fits `max_width` columns.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width <= 1 {
        return "…".to_string();
    }
    let mut truncated = String::new();
    let mut width = 0;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width + 1 > max_width {
            break;
        }
        width += ch_width;
        truncated.push(ch);
    }
    truncated.push('…');
    truncated
}

/// Truncates the start of `text`, keeping the tail (useful for paths).
pub fn truncate_start_with_ellipsis(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width <= 1 {
        return "…".to_string();
    }
    let mut tail: Vec<char> = Vec::new();
    let mut width = 0;
    for ch in text.chars().rev() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width + 1 > max_width {
            break;
        }
        width += ch_width;
        tail.push(ch);
    }
    let mut out = String::from("…");
    out.extend(tail.into_iter().rev());
    out
}

/// Expands tabs to four spaces and strips other control characters.
pub fn sanitize_for_display(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c.is_control()) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\t' => out.push_str("    "),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Compact relative age ("3m", "2h", "5d") for a unix timestamp.
pub fn relative_age(ts: i64, now: i64) -> String {
    if ts <= 0 {
        return "-".to_string();
    }
    let secs = (now - ts).max(0);
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3600),
        s if s < 86_400 * 30 => format!("{}d", s / 86_400),
        s if s < 86_400 * 365 => format!("{}mo", s / (86_400 * 30)),
        s => format!("{}y", s / (86_400 * 365)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("feature", 10), "feature");
        assert_eq!(truncate_with_ellipsis("feature-branch", 8), "feature…");
        assert_eq!(truncate_with_ellipsis("abc", 1), "…");
    }

    #[test]
    fn test_truncate_start_keeps_tail() {
        assert_eq!(
            truncate_start_with_ellipsis("/home/me/worktrees/app", 10),
            "…trees/app"
        );
    }

    #[test]
    fn test_sanitize_expands_tabs() {
        assert_eq!(sanitize_for_display("a\tb"), "a    b");
        assert!(matches!(sanitize_for_display("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_relative_age() {
        assert_eq!(relative_age(0, 100), "-");
        assert_eq!(relative_age(100, 130), "30s");
        assert_eq!(relative_age(1, 7201), "2h");
        assert_eq!(relative_age(1, 1 + 86_400 * 3), "3d");
    }
}
