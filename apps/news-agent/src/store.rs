use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::validator::ArticleCandidate;

const SLUG_MAX_CHARS: usize = 60;

/// The listing page that owns all article pages. Read-only to the agent;
/// exactly one live listing must exist for a run to proceed.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ListingPage {
    pub title: String,
    pub slug: String,
    pub live: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ArticlePage {
    pub title: String,
    pub summary: String,
    pub source_url: String,
    pub publication_date: NaiveDate,
    pub slug: String,
    pub parent: String,
}

/// On-disk shape of the content store: one JSON document, loaded at run
/// start and rewritten after every persisted mutation.
#[derive(Serialize, Deserialize, Debug, Default)]
struct SiteDoc {
    #[serde(default)]
    listing_pages: Vec<ListingPage>,
    #[serde(default)]
    article_pages: Vec<ArticlePage>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read content store at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("content store at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write content store at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize content store: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

pub struct SiteStore {
    path: PathBuf,
    doc: SiteDoc,
}

impl SiteStore {
    /// Open the content store. A missing file is treated as an empty store;
    /// the run will then fail the live-listing check rather than here.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let doc = match std::fs::read(path) {
            Ok(data) => serde_json::from_slice(&data).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No existing content store, starting empty");
                SiteDoc::default()
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    /// First live listing page, if any.
    pub fn live_listing(&self) -> Option<&ListingPage> {
        self.doc.listing_pages.iter().find(|p| p.live)
    }

    pub fn find_article(&self, source_url: &str) -> Option<&ArticlePage> {
        self.doc
            .article_pages
            .iter()
            .find(|p| p.source_url == source_url)
    }

    pub fn article_count(&self) -> usize {
        self.doc.article_pages.len()
    }

    /// Create-or-update keyed by the candidate's canonical source URL.
    /// Updates touch title and summary only; creates attach a new page under
    /// `listing_slug` dated today.
    pub fn upsert(
        &mut self,
        candidate: &ArticleCandidate,
        listing_slug: &str,
    ) -> Result<UpsertOutcome, StoreError> {
        let key = candidate.source_url.as_str();

        if let Some(page) = self
            .doc
            .article_pages
            .iter_mut()
            .find(|p| p.source_url == key)
        {
            page.title = candidate.title.clone();
            page.summary = candidate.summary.clone();
            self.persist()?;
            return Ok(UpsertOutcome::Updated);
        }

        self.doc.article_pages.push(ArticlePage {
            title: candidate.title.clone(),
            summary: candidate.summary.clone(),
            source_url: key.to_string(),
            publication_date: Local::now().date_naive(),
            slug: article_slug(&candidate.title, key),
            parent: listing_slug.to_string(),
        });
        self.persist()?;
        Ok(UpsertOutcome::Created)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.doc)?;
        std::fs::write(&self.path, json).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Slug from the normalized title plus a stable collision suffix taken from
/// the source URL's digest. Stable across runs, distinct across URLs.
pub fn article_slug(title: &str, source_url: &str) -> String {
    let mut base = String::new();
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            base.push(c);
        } else if !base.is_empty() && !base.ends_with('-') {
            base.push('-');
        }
    }
    let base: String = base.chars().take(SLUG_MAX_CHARS).collect();
    let base = base.trim_matches('-');

    let digest = format!("{:x}", Sha256::digest(source_url.as_bytes()));
    if base.is_empty() {
        format!("article-{}", &digest[..8])
    } else {
        format!("{}-{}", base, &digest[..8])
    }
}
