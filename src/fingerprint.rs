//! Persisted dedup state: seen feed-entry ids and recent commentary fingerprints.
//!
//! Both files are plain JSON arrays of strings, read once at the start of a run
//! and rewritten once at the end. A missing or corrupt file loads as empty.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Punctuation, quotes and brackets ignored when fingerprinting (ASCII + full-width).
const IGNORED_CHARS: &[char] = &[
    '.', ',', '!', '?', '\'', '"', '`', '(', ')', '[', ']', '{', '}', '<', '>', ':', ';', '~',
    '-', '…', '‥', '。', '、', '，', '．', '！', '？', '＂', '＇', '「', '」', '『', '』', '（',
    '）', '【', '】', '〔', '〕', '［', '］', '｛', '｝', '〈', '〉', '《', '》', '“', '”', '‘',
    '’', '・', '：', '；', '～', '〜',
];

/// Fingerprint of a short line: all whitespace and [`IGNORED_CHARS`] removed.
/// Idempotent.
pub fn normalize_fingerprint(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && !IGNORED_CHARS.contains(c))
        .collect()
}

/// Write via a sibling temp file + rename so readers see old or new, never half.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

fn read_string_list(path: &Path) -> Vec<String> {
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "state file unreadable; starting empty"
            );
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<String>>(&s) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "state file corrupt; starting empty"
            );
            Vec::new()
        }
    }
}

fn write_string_list<'a>(path: &Path, items: impl Iterator<Item = &'a String>) -> io::Result<()> {
    let v: Vec<&String> = items.collect();
    let json = serde_json::to_vec_pretty(&v)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_atomic(path, &json)
}

// ------------------------------------------------------------
// Seen entry ids
// ------------------------------------------------------------

pub struct SeenIdStore {
    path: PathBuf,
}

impl SeenIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> BTreeSet<String> {
        read_string_list(&self.path).into_iter().collect()
    }

    /// Sorted output keeps diffs of the state file reproducible.
    pub fn save(&self, ids: &BTreeSet<String>) -> io::Result<()> {
        write_string_list(&self.path, ids.iter())
    }
}

// ------------------------------------------------------------
// Commentary fingerprints (bounded, most recent kept)
// ------------------------------------------------------------

/// Insertion-ordered set that keeps only the newest `keep_last` items.
#[derive(Debug, Clone, Default)]
pub struct RecentSet {
    order: VecDeque<String>,
    index: HashSet<String>,
    keep_last: usize,
}

impl RecentSet {
    pub fn new(keep_last: usize) -> Self {
        Self {
            order: VecDeque::new(),
            index: HashSet::new(),
            keep_last,
        }
    }

    pub fn contains(&self, fp: &str) -> bool {
        self.index.contains(fp)
    }

    /// Insert as newest. An existing item is moved to the newest position.
    pub fn insert(&mut self, fp: String) {
        if self.index.contains(&fp) {
            self.order.retain(|x| x != &fp);
        } else {
            self.index.insert(fp.clone());
        }
        self.order.push_back(fp);
        while self.order.len() > self.keep_last {
            if let Some(old) = self.order.pop_front() {
                self.index.remove(&old);
            }
        }
    }

    pub fn as_set(&self) -> &HashSet<String> {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }
}

pub struct FingerprintStore {
    path: PathBuf,
    keep_last: usize,
}

impl FingerprintStore {
    pub fn new(path: impl Into<PathBuf>, keep_last: usize) -> Self {
        Self {
            path: path.into(),
            keep_last,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> RecentSet {
        let mut set = RecentSet::new(self.keep_last);
        for fp in read_string_list(&self.path) {
            // Stored values may predate a normalization change.
            let fp = normalize_fingerprint(&fp);
            if !fp.is_empty() {
                set.insert(fp);
            }
        }
        set
    }

    pub fn save(&self, set: &RecentSet) -> io::Result<()> {
        let skip = set.len().saturating_sub(self.keep_last);
        write_string_list(&self.path, set.iter().skip(skip))
    }
}
