//! Document source.
//!
//! Walks the vault root recursively and turns note files into plain-text
//! [`Document`]s: frontmatter title (or file stem), heading markers and
//! wiki-link brackets stripped, blank-line runs collapsed.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use gray_matter::engine::YAML;
use gray_matter::Matter;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::CorpusError;

/// Number of characters shown in a note preview.
pub const PREVIEW_CHARS: usize = 200;

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#+ ").unwrap());
static WIKI_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

/// A parsed note. Transient: chunked and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: PathBuf,
    pub title: String,
    /// Plain-text body with markup stripped
    pub body: String,
    /// Seconds since the Unix epoch
    pub modified: f64,
}

impl Document {
    /// File name component of the path, used in chunk headers.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// First [`PREVIEW_CHARS`] characters of the body, with `...` if cut.
    pub fn preview(&self) -> String {
        let mut chars = self.body.chars();
        let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

/// Summary row for the "latest notes" listing.
#[derive(Debug, Clone)]
pub struct NoteSummary {
    pub title: String,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub preview: String,
}

#[derive(Debug, Default, Deserialize)]
struct NoteFrontmatter {
    #[serde(default)]
    title: Option<String>,
}

/// Parse raw note content into a [`Document`].
pub fn parse_document(path: &Path, raw: &str, modified: f64) -> Document {
    let (title, content) = match Matter::<YAML>::new().parse::<NoteFrontmatter>(raw) {
        Ok(parsed) => (parsed.data.and_then(|fm| fm.title), parsed.content),
        Err(e) => {
            debug!(path = ?path, error = %e, "Ignoring unreadable frontmatter");
            (None, raw.to_string())
        }
    };

    let title = title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    Document {
        path: path.to_path_buf(),
        title,
        body: clean_markup(&content),
        modified,
    }
}

/// Strip heading markers and wiki-link brackets, collapse blank-line runs.
pub fn clean_markup(content: &str) -> String {
    let text = HEADING.replace_all(content, "");
    let text = WIKI_LINK.replace_all(&text, "$1");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Modification time of `path` in seconds since the Unix epoch.
pub fn modified_secs(path: &Path) -> std::io::Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default())
}

/// Recursive view over the note vault.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DocumentSource {
    /// `extensions` are matched against the file extension without the dot.
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    pub fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|want| want == ext))
    }

    /// All document paths under the root, sorted.
    ///
    /// Entries the walker cannot read are logged and skipped.
    pub fn paths(&self) -> Result<Vec<PathBuf>, CorpusError> {
        if !self.is_available() {
            return Err(CorpusError::RootMissing(self.root.clone()));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable corpus entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && self.is_document(entry.path()) {
                paths.push(entry.into_path());
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Read and parse one document.
    pub fn load(&self, path: &Path) -> Result<Document, CorpusError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
        let modified = modified_secs(path).map_err(|e| CorpusError::io(path, e))?;
        Ok(parse_document(path, &raw, modified))
    }

    /// Every readable document under the root, in path order.
    pub fn documents(&self) -> Result<Vec<Document>, CorpusError> {
        let mut documents = Vec::new();
        for path in self.paths()? {
            match self.load(&path) {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!(error = %e, "Skipping unreadable document"),
            }
        }
        Ok(documents)
    }

    /// The `limit` most recently modified notes, newest first.
    pub fn latest(&self, limit: usize) -> Result<Vec<NoteSummary>, CorpusError> {
        let mut dated: Vec<(PathBuf, f64)> = self
            .paths()?
            .into_iter()
            .filter_map(|path| modified_secs(&path).ok().map(|m| (path, m)))
            .collect();
        dated.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut notes = Vec::new();
        for (path, _) in dated.into_iter().take(limit) {
            match self.load(&path) {
                Ok(doc) => notes.push(NoteSummary {
                    preview: doc.preview(),
                    modified: to_datetime(doc.modified),
                    title: doc.title,
                    path: doc.path,
                }),
                Err(e) => warn!(error = %e, "Skipping unreadable document"),
            }
        }
        Ok(notes)
    }

    /// Notes whose title contains `query`, case-insensitively.
    pub fn find_by_title(&self, query: &str) -> Result<Vec<Document>, CorpusError> {
        let needle = query.to_lowercase();
        Ok(self
            .documents()?
            .into_iter()
            .filter(|doc| doc.title.to_lowercase().contains(&needle))
            .collect())
    }
}

fn to_datetime(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis((secs * 1000.0) as i64).unwrap_or_default()
}
