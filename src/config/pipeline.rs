// src/config/pipeline.rs
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Env var naming an optional TOML file with base settings. Env vars still win.
pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";

const DEFAULT_FEED_URL: &str = "https://news.yahoo.co.jp/rss/topics/entertainment.xml";
const DEFAULT_POSTS_DIR: &str = "content/posts";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_IMG_MODEL: &str = "gpt-image-1";
const DEFAULT_IMG_SIZE: &str = "1024x1024";
const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_STATE_DIR: &str = "state";
const DEFAULT_MARKER: &str = "。";

/// Everything one run needs. Built once in `main` and passed by reference.
#[derive(Clone)]
pub struct PipelineConfig {
    pub feed_url: String,
    pub posts_dir: PathBuf,
    pub category: Option<String>,
    pub llm_model: String,
    pub img_model: String,
    pub img_size: String,
    /// No trailing slash.
    pub api_base: String,
    pub api_key: String,
    pub max_posts_per_run: usize,
    pub skip_image: bool,
    pub rewrite_headline: bool,
    pub state_dir: PathBuf,
    pub mike_keep_last: usize,
    pub mike_max_chars: usize,
    pub mike_terminal_marker: String,
    pub pace: Duration,
    pub retry_max_attempts: u32,
    pub http_timeout: Duration,
    pub metrics_textfile: Option<PathBuf>,
}

// Keeps the key out of logs; only its length is shown.
impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("feed_url", &self.feed_url)
            .field("posts_dir", &self.posts_dir)
            .field("category", &self.category)
            .field("llm_model", &self.llm_model)
            .field("img_model", &self.img_model)
            .field("img_size", &self.img_size)
            .field("api_base", &self.api_base)
            .field("api_key_len", &self.api_key.len())
            .field("max_posts_per_run", &self.max_posts_per_run)
            .field("skip_image", &self.skip_image)
            .field("rewrite_headline", &self.rewrite_headline)
            .field("state_dir", &self.state_dir)
            .field("mike_keep_last", &self.mike_keep_last)
            .field("mike_max_chars", &self.mike_max_chars)
            .field("pace", &self.pace)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("http_timeout", &self.http_timeout)
            .finish_non_exhaustive()
    }
}

/// Optional TOML base layer. Keys are the lowercase env names.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    feed_url: Option<String>,
    hugo_posts_dir: Option<String>,
    category: Option<String>,
    llm_model: Option<String>,
    img_model: Option<String>,
    img_size: Option<String>,
    openai_base: Option<String>,
    max_posts_per_run: Option<usize>,
    skip_image: Option<bool>,
    rewrite_headline: Option<bool>,
    state_dir: Option<String>,
    mike_keep_last: Option<usize>,
    mike_max_chars: Option<usize>,
    mike_terminal_marker: Option<String>,
    pace_secs: Option<u64>,
    retry_max_attempts: Option<u32>,
    http_timeout_secs: Option<u64>,
    metrics_textfile: Option<String>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Env-over-file resolution. Blank env values count as unset.
struct Layer<'a, F: Fn(&str) -> Option<String>> {
    get: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Layer<'_, F> {
    fn env(&self, key: &str) -> Option<String> {
        (self.get)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, file: Option<String>, default: &str) -> String {
        self.env(key)
            .or(file.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
            .unwrap_or_else(|| default.to_string())
    }

    fn optional(&self, key: &str, file: Option<String>) -> Option<String> {
        self.env(key)
            .or(file.map(|v| v.trim().to_string()))
            .filter(|v| !v.is_empty())
    }

    fn number<T>(&self, key: &'static str, file: Option<T>, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.env(key) {
            Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
            None => Ok(file.unwrap_or(default)),
        }
    }

    fn flag(&self, key: &'static str, file: Option<bool>, default: bool) -> Result<bool, ConfigError> {
        match self.env(key) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: "expected one of 1/0/true/false/yes/no/on/off".to_string(),
            }),
            None => Ok(file.unwrap_or(default)),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Strip surrounding whitespace/newlines and validate the result.
///
/// A key with a trailing newline is the usual cause of "invalid header value"
/// failures in CI secrets, so it is trimmed rather than rejected.
pub fn sanitize_api_key(raw: Option<&str>) -> Result<String, ConfigError> {
    let raw = raw.unwrap_or_default();
    let stripped = raw.trim();
    if stripped.is_empty() {
        return Err(ConfigError::MissingApiKey);
    }
    if stripped
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ConfigError::MalformedApiKey);
    }
    if stripped.len() != raw.len() {
        tracing::info!("trimmed surrounding whitespace in OPENAI_API_KEY");
    }
    Ok(stripped.to_string())
}

impl PipelineConfig {
    /// Load from the process environment (plus the optional TOML file).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup; tests pass a map instead of touching env.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let layer = Layer { get: &get };

        let file = match layer.env(ENV_CONFIG_PATH) {
            Some(p) => FileConfig::load(Path::new(&p))?,
            None => FileConfig::default(),
        };

        // Validate the credential first so a bad key aborts before anything else.
        let api_key = sanitize_api_key(get("OPENAI_API_KEY").as_deref())?;

        let api_base = layer
            .string("OPENAI_BASE", file.openai_base, DEFAULT_OPENAI_BASE)
            .trim_end_matches('/')
            .to_string();

        let max_posts_per_run = layer.number("MAX_POSTS_PER_RUN", file.max_posts_per_run, 3)?;

        let mike_max_chars = layer.number("MIKE_MAX_CHARS", file.mike_max_chars, 60)?;
        if mike_max_chars == 0 {
            return Err(ConfigError::Invalid {
                key: "MIKE_MAX_CHARS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let retry_max_attempts = layer.number("RETRY_MAX_ATTEMPTS", file.retry_max_attempts, 5)?;
        if retry_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "RETRY_MAX_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            feed_url: layer.string("FEED_URL", file.feed_url, DEFAULT_FEED_URL),
            posts_dir: PathBuf::from(layer.string(
                "HUGO_POSTS_DIR",
                file.hugo_posts_dir,
                DEFAULT_POSTS_DIR,
            )),
            category: layer.optional("CATEGORY", file.category),
            llm_model: layer.string("LLM_MODEL", file.llm_model, DEFAULT_LLM_MODEL),
            img_model: layer.string("IMG_MODEL", file.img_model, DEFAULT_IMG_MODEL),
            img_size: layer.string("IMG_SIZE", file.img_size, DEFAULT_IMG_SIZE),
            api_base,
            api_key,
            max_posts_per_run,
            skip_image: layer.flag("SKIP_IMAGE", file.skip_image, false)?,
            rewrite_headline: layer.flag("REWRITE_HEADLINE", file.rewrite_headline, false)?,
            state_dir: PathBuf::from(layer.string("STATE_DIR", file.state_dir, DEFAULT_STATE_DIR)),
            mike_keep_last: layer.number("MIKE_KEEP_LAST", file.mike_keep_last, 500)?,
            mike_max_chars,
            mike_terminal_marker: layer.string(
                "MIKE_TERMINAL_MARKER",
                file.mike_terminal_marker,
                DEFAULT_MARKER,
            ),
            pace: Duration::from_secs(layer.number("PACE_SECS", file.pace_secs, 2)?),
            retry_max_attempts,
            http_timeout: Duration::from_secs(layer.number(
                "HTTP_TIMEOUT_SECS",
                file.http_timeout_secs,
                60,
            )?),
            metrics_textfile: layer
                .optional("METRICS_TEXTFILE", file.metrics_textfile)
                .map(PathBuf::from),
        })
    }

    pub fn seen_ids_path(&self) -> PathBuf {
        self.state_dir.join("seen_ids.json")
    }

    pub fn seen_mike_path(&self) -> PathBuf {
        self.state_dir.join("seen_mike.json")
    }
}
