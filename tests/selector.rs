// tests/selector.rs
use rss_hugo_ai::fingerprint::normalize_fingerprint;
use rss_hugo_ai::selector::{canonicalize_line, select, LineRules};
use std::collections::HashSet;

fn cands(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn first_unseen_candidate_wins() {
    let rules = LineRules::default();
    let seen: HashSet<String> = [normalize_fingerprint("Aです。")].into_iter().collect();
    let s = select(&cands(&["Aです", "Bです", "Cです"]), &seen, &rules);
    assert_eq!(s.line.as_deref(), Some("Bです。"));
    assert_eq!(s.fingerprint.as_deref(), Some("Bです"));
    assert!(!s.repeated);
}

#[test]
fn all_seen_falls_back_to_first() {
    let rules = LineRules::default();
    let seen: HashSet<String> = ["Aです", "Bです"]
        .iter()
        .map(|s| normalize_fingerprint(s))
        .collect();
    let s = select(&cands(&["Aです", "Bです"]), &seen, &rules);
    assert_eq!(s.line.as_deref(), Some("Aです。"));
    assert!(s.repeated);
}

#[test]
fn no_candidates_selects_nothing() {
    let s = select(&[], &HashSet::new(), &LineRules::default());
    assert!(s.line.is_none());
    assert!(s.fingerprint.is_none());
    let s = select(&cands(&["   ", "「」"]), &HashSet::new(), &LineRules::default());
    assert!(s.line.is_none());
}

#[test]
fn punctuation_and_spacing_variants_share_a_fingerprint() {
    let a = normalize_fingerprint("すごい！ 楽しみ。");
    let b = normalize_fingerprint("すごい　楽しみ!!");
    assert_eq!(a, b);
    assert_eq!(normalize_fingerprint(&a), a);
}

#[test]
fn canonical_line_is_bounded_and_terminated() {
    let rules = LineRules {
        max_chars: 10,
        terminal_marker: "。".into(),
    };
    let line = canonicalize_line(&"あ".repeat(30), &rules);
    assert_eq!(line.chars().count(), 10);
    assert!(line.ends_with('。'));
    assert_eq!(canonicalize_line("「いいね」", &rules), "いいね。");
    assert_eq!(canonicalize_line("いいね。", &rules), "いいね。");
    assert_eq!(canonicalize_line(&line, &rules), line);
}
