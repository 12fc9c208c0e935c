//! Response contract: recover the article payload from free-form model output.
//!
//! Fallback policy, in order:
//! 1. [`ParseStage::Strict`]: the whole text is the JSON object.
//! 2. [`ParseStage::BraceBounded`]: the slice from the first `{` to the last `}`,
//!    for output wrapped in prose or code fences.
//!
//! If neither yields a payload with a non-blank article body the response is
//! malformed. An empty article is never substituted.

use serde::Deserialize;

/// Which stage of the fallback policy produced the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Strict,
    BraceBounded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub body: String,
    /// Model order, may be empty.
    pub commentary_candidates: Vec<String>,
    /// Deduplicated, first occurrence wins.
    pub tags: Vec<String>,
    pub image_prompt: Option<String>,
    /// Model-proposed headline; only used when headline rewriting is enabled.
    pub title: Option<String>,
    pub stage: ParseStage,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct MalformedResponse {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(alias = "article")]
    article_md: String,
    #[serde(default, alias = "mike")]
    mike_candidates: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    image_prompt: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

fn brace_bounded(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().trim_start_matches(['#', '＃']).trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn parse(raw: &str) -> Result<ParsedArticle, MalformedResponse> {
    let (payload, stage) = match serde_json::from_str::<Payload>(raw.trim()) {
        Ok(p) => (p, ParseStage::Strict),
        Err(strict_err) => {
            let slice = brace_bounded(raw).ok_or_else(|| MalformedResponse {
                reason: format!("no JSON object in response ({strict_err})"),
            })?;
            let p = serde_json::from_str::<Payload>(slice).map_err(|e| MalformedResponse {
                reason: format!("embedded JSON unusable: {e}"),
            })?;
            (p, ParseStage::BraceBounded)
        }
    };

    let body = payload.article_md.trim().to_string();
    if body.is_empty() {
        return Err(MalformedResponse {
            reason: "article_md is blank".to_string(),
        });
    }

    Ok(ParsedArticle {
        body,
        commentary_candidates: payload
            .mike_candidates
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        tags: clean_tags(payload.tags),
        image_prompt: non_blank(payload.image_prompt),
        title: non_blank(payload.title),
        stage,
    })
}
