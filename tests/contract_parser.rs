// tests/contract_parser.rs
use rss_hugo_ai::contract::{parse, ParseStage};

#[test]
fn payload_embedded_in_prose_is_recovered() {
    let raw = "intro text {\"article_md\":\"x\",\"mike_candidates\":[],\"tags\":[]} trailing";
    let p = parse(raw).unwrap();
    assert_eq!(p.body, "x");
    assert!(p.commentary_candidates.is_empty());
    assert!(p.tags.is_empty());
    assert_eq!(p.stage, ParseStage::BraceBounded);
}

#[test]
fn strict_json_is_preferred() {
    let raw = r##"{"article_md":"本文","mike_candidates":["一言"],"tags":["#芸能","芸能"," 音楽 "],"image_prompt":"舞台"}"##;
    let p = parse(raw).unwrap();
    assert_eq!(p.stage, ParseStage::Strict);
    assert_eq!(p.commentary_candidates, vec!["一言".to_string()]);
    assert_eq!(p.tags, vec!["芸能".to_string(), "音楽".to_string()]);
    assert_eq!(p.image_prompt.as_deref(), Some("舞台"));
}

#[test]
fn code_fenced_payload_is_recovered() {
    let raw = "```json\n{\"article_md\":\"a {b} c\",\"tags\":[]}\n```";
    let p = parse(raw).unwrap();
    assert_eq!(p.body, "a {b} c");
}

#[test]
fn missing_or_blank_body_is_malformed() {
    assert!(parse("no json here").is_err());
    assert!(parse(r#"{"tags":["a"]}"#).is_err());
    assert!(parse(r#"{"article_md":"   "}"#).is_err());
    assert!(parse("} backwards {").is_err());
}
