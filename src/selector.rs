//! Commentary selection with cross-run dedup.

use std::collections::HashSet;

use crate::fingerprint::normalize_fingerprint;

#[derive(Debug, Clone)]
pub struct LineRules {
    pub max_chars: usize,
    pub terminal_marker: String,
}

impl Default for LineRules {
    fn default() -> Self {
        Self {
            max_chars: 60,
            terminal_marker: "。".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub line: Option<String>,
    pub fingerprint: Option<String>,
    /// True when every candidate was already seen and the first one was reused.
    pub repeated: bool,
}

const WRAPPING_QUOTES: &[(char, char)] = &[('「', '」'), ('『', '』'), ('"', '"'), ('“', '”')];

fn strip_wrapping_quotes(s: &str) -> &str {
    for (open, close) in WRAPPING_QUOTES {
        if let Some(inner) = s
            .strip_prefix(*open)
            .and_then(|rest| rest.strip_suffix(*close))
        {
            return inner.trim();
        }
    }
    s
}

/// Single line, collapsed whitespace, at most `max_chars` characters, ending in the marker.
pub fn canonicalize_line(raw: &str, rules: &LineRules) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let line = strip_wrapping_quotes(&collapsed);
    if line.is_empty() {
        return String::new();
    }

    let marker = rules.terminal_marker.as_str();
    let marker_len = marker.chars().count();
    if line.ends_with(marker) && line.chars().count() <= rules.max_chars {
        return line.to_string();
    }

    let stem = line.strip_suffix(marker).unwrap_or(line);
    let budget = rules.max_chars.saturating_sub(marker_len);
    let mut out: String = stem.chars().take(budget).collect();
    out = out.trim_end().to_string();
    out.push_str(marker);
    out
}

/// First candidate whose fingerprint is unseen; else the first candidate again.
pub fn select(candidates: &[String], seen: &HashSet<String>, rules: &LineRules) -> Selection {
    let canonical: Vec<(String, String)> = candidates
        .iter()
        .map(|c| canonicalize_line(c, rules))
        .filter(|c| !c.is_empty())
        .map(|c| {
            let fp = normalize_fingerprint(&c);
            (c, fp)
        })
        .filter(|(_, fp)| !fp.is_empty())
        .collect();

    if let Some((line, fp)) = canonical.iter().find(|(_, fp)| !seen.contains(fp)) {
        return Selection {
            line: Some(line.clone()),
            fingerprint: Some(fp.clone()),
            repeated: false,
        };
    }

    match canonical.into_iter().next() {
        Some((line, fp)) => Selection {
            line: Some(line),
            fingerprint: Some(fp),
            repeated: true,
        },
        None => Selection::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_enforces_marker_and_length() {
        let rules = LineRules {
            max_chars: 6,
            terminal_marker: "。".into(),
        };
        assert_eq!(canonicalize_line("  やばい\n すごい ", &rules), "やばい す。");
        assert_eq!(canonicalize_line("「短い」", &rules), "短い。");
        assert_eq!(canonicalize_line("完了。", &rules), "完了。");
        assert_eq!(canonicalize_line("   ", &rules), "");
    }

    #[test]
    fn marker_is_not_doubled() {
        let rules = LineRules::default();
        assert_eq!(canonicalize_line("いいね。", &rules), "いいね。");
        assert_eq!(canonicalize_line("いいね", &rules), "いいね。");
    }
}
