//! Hugo page bundle output: `<posts_dir>/<slug>/index.md` plus optional `cover.png`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub const COVER_FILE: &str = "cover.png";
pub const INDEX_FILE: &str = "index.md";
const DESCRIPTION_CHARS: usize = 160;

/// Everything written for one accepted entry. Written once, never updated.
#[derive(Debug, Clone)]
pub struct ContentPackage {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub commentary: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub source_link: String,
    pub description: String,
    pub image: Option<Vec<u8>>,
    /// When the news happened (feed timestamp).
    pub event_time: DateTime<Utc>,
    /// When this package was generated.
    pub publish_time: DateTime<Utc>,
}

#[derive(Serialize)]
struct Cover<'a> {
    image: &'a str,
    alt: &'a str,
    relative: bool,
    hidden: bool,
}

// Field order is the rendered order; the cover table must stay last.
#[derive(Serialize)]
struct FrontMatter<'a> {
    title: &'a str,
    date: String,
    #[serde(rename = "publishDate")]
    publish_date: String,
    draft: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    categories: Vec<&'a str>,
    tags: &'a [String],
    #[serde(rename = "canonicalURL")]
    canonical_url: &'a str,
    description: &'a str,
    #[serde(rename = "summaryLength")]
    summary_length: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    mike: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cover: Option<Cover<'a>>,
}

fn rfc3339(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `YYYYMMDD-<ascii title slug or "post">-<8 hex of sha256(id)>`.
///
/// Built from the entry's own timestamp so the same entry maps to the same
/// directory on every run.
pub fn slugify(title: &str, id: &str, published: &DateTime<Utc>) -> String {
    static RE_NON_ALNUM: once_cell::sync::OnceCell<regex::Regex> =
        once_cell::sync::OnceCell::new();
    let re = RE_NON_ALNUM.get_or_init(|| regex::Regex::new(r"[^0-9a-zA-Z]+").unwrap());

    let ascii = re.replace_all(title, "-").to_lowercase();
    let short: String = ascii.trim_matches('-').chars().take(32).collect();
    let short = short.trim_end_matches('-');
    let name = if short.is_empty() { "post" } else { short };

    let digest = Sha256::digest(id.as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();

    format!("{}-{}-{}", published.format("%Y%m%d"), name, hex)
}

/// Single-line excerpt, ellipsized past `DESCRIPTION_CHARS`.
pub fn description_from(summary: &str, body: &str) -> String {
    if !summary.trim().is_empty() {
        return summary.trim().to_string();
    }
    let plain = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if plain.chars().count() > DESCRIPTION_CHARS {
        let head: String = plain.chars().take(DESCRIPTION_CHARS - 3).collect();
        format!("{head}...")
    } else {
        plain
    }
}

impl ContentPackage {
    pub fn render_index(&self) -> Result<String, toml::ser::Error> {
        let fm = FrontMatter {
            title: &self.title,
            date: rfc3339(&self.event_time),
            publish_date: rfc3339(&self.publish_time),
            draft: false,
            categories: self.category.as_deref().into_iter().collect(),
            tags: &self.tags,
            canonical_url: &self.source_link,
            description: &self.description,
            summary_length: 30,
            mike: self.commentary.as_deref(),
            cover: self.image.as_ref().map(|_| Cover {
                image: COVER_FILE,
                alt: &self.title,
                relative: true,
                hidden: false,
            }),
        };
        let front = toml::to_string(&fm)?;

        let mut out = String::with_capacity(front.len() + self.body.len() + 256);
        out.push_str("+++\n");
        out.push_str(&front);
        if !front.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("+++\n\n");
        out.push_str(self.body.trim_end());
        out.push_str("\n\n");
        if let Some(line) = &self.commentary {
            out.push_str(&format!("**ひとこと**　{line}\n\n"));
        }
        out.push_str(&format!("> [引用元]({})\n", self.source_link));
        Ok(out)
    }
}

#[async_trait]
pub trait PackageSink: Send + Sync {
    async fn exists(&self, slug: &str) -> bool;

    /// All-or-nothing: on error nothing for `pkg.slug` is left behind.
    async fn write(&self, pkg: &ContentPackage) -> io::Result<PathBuf>;
}

pub struct FsPackageSink {
    root: PathBuf,
}

impl FsPackageSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_files(dir: &Path, pkg: &ContentPackage, index: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        if let Some(bytes) = &pkg.image {
            tokio::fs::write(dir.join(COVER_FILE), bytes).await?;
        }
        let tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        tokio::fs::write(&tmp, index.as_bytes()).await?;
        tokio::fs::rename(&tmp, dir.join(INDEX_FILE)).await?;
        Ok(())
    }
}

#[async_trait]
impl PackageSink for FsPackageSink {
    async fn exists(&self, slug: &str) -> bool {
        tokio::fs::try_exists(self.root.join(slug))
            .await
            .unwrap_or(false)
    }

    async fn write(&self, pkg: &ContentPackage) -> io::Result<PathBuf> {
        let index = pkg
            .render_index()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let dir = self.root.join(&pkg.slug);
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("bundle {} already exists", dir.display()),
            ));
        }

        if let Err(e) = Self::write_files(&dir, pkg, &index).await {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&dir).await {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %cleanup,
                    "could not remove partial bundle"
                );
            }
            return Err(e);
        }
        Ok(dir.join(INDEX_FILE))
    }
}
