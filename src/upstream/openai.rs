// src/upstream/openai.rs
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;

use super::client::UpstreamClient;
use super::{ContentGenerator, UpstreamError};
use crate::config::PipelineConfig;
use crate::ingest::types::FeedEntry;

const SYSTEM_PROMPT: &str = "\
あなたは報道記者です。以下のRSS記事をもとに、
1. 見出しと本文をMarkdownで整理し、
2. 記事冒頭に1段落のリード文を挿入し、
3. 300〜500語程度でニュース記事として要約してください。
事実に基づかない推測や誇張は書かないでください。";

/// Chat Completions + Images API, OpenAI-compatible.
pub struct OpenAiGenerator {
    client: UpstreamClient,
    llm_model: String,
    img_model: String,
    img_size: String,
    rewrite_headline: bool,
    max_completion_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(client: UpstreamClient, cfg: &PipelineConfig) -> Self {
        Self {
            client,
            llm_model: cfg.llm_model.clone(),
            img_model: cfg.img_model.clone(),
            img_size: cfg.img_size.clone(),
            rewrite_headline: cfg.rewrite_headline,
            max_completion_tokens: 1_600,
        }
    }

    fn user_prompt(&self, entry: &FeedEntry) -> String {
        let summary = if entry.summary.is_empty() {
            "（要約はありません）"
        } else {
            entry.summary.as_str()
        };
        let title_field = if self.rewrite_headline {
            r#""title": "記事内容に即した新しい見出し", "#
        } else {
            ""
        };
        format!(
            "タイトル: {title}\n\
             リンク: {link}\n\
             要約: {summary}\n\n\
             次のキーを持つJSONオブジェクトだけを返してください。\n\
             - article_md: Markdownの記事本文\n\
             - mike_candidates: 記事に添える一言コメント（30文字以内）を3案、配列で\n\
             - tags: 記事に関連するタグを最大5個、配列で\n\
             - image_prompt: 記事内容を端的に描写する日本語の画像プロンプト\n\
             フォーマット: {{{title_field}\"article_md\": \"...\", \"mike_candidates\": [\"...\"], \"tags\": [\"...\"], \"image_prompt\": \"...\"}}",
            title = entry.title,
            link = entry.link,
        )
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    async fn generate_article(&self, entry: &FeedEntry) -> Result<String, UpstreamError> {
        let payload = json!({
            "model": self.llm_model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": self.user_prompt(entry) },
            ],
            "temperature": 0.7,
            "max_completion_tokens": self.max_completion_tokens,
        });

        let resp = self.client.call("chat/completions", &payload).await?;
        let body: ChatResponse = serde_json::from_slice(&resp.body)
            .map_err(|e| UpstreamError::Decode(format!("chat completion body: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                UpstreamError::Decode("response did not include article content".into())
            })
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, UpstreamError> {
        let mut payload = json!({
            "model": self.img_model,
            "prompt": prompt,
            "size": self.img_size,
            "n": 1,
        });
        // gpt-image-* always answers with base64; dall-e needs to be asked.
        if self.img_model.starts_with("dall-e") {
            payload["response_format"] = json!("b64_json");
        }

        let resp = self.client.call("images/generations", &payload).await?;
        let body: ImageResponse = serde_json::from_slice(&resp.body)
            .map_err(|e| UpstreamError::Decode(format!("image body: {e}")))?;
        let datum = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::Decode("image response has no data".into()))?;

        match (datum.b64_json, datum.url) {
            (Some(b64), _) => BASE64
                .decode(b64.trim())
                .map_err(|e| UpstreamError::Decode(format!("image base64: {e}"))),
            (None, Some(url)) => {
                let img = self.client.download(&url).await?;
                if img.body.is_empty() {
                    return Err(UpstreamError::Decode("downloaded image is empty".into()));
                }
                Ok(img.body)
            }
            (None, None) => Err(UpstreamError::Decode(
                "image response has neither b64_json nor url".into(),
            )),
        }
    }
}
