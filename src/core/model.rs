//! Data model shared across the publishing pipeline

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::time::Instant;

/// An article handed to the pipeline by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub author: String,
    /// HTML body produced by the content generator
    pub content: String,
    /// Teaser text shown in the platform feed
    pub digest: Option<String>,
    /// Media id of an already-hosted cover image
    pub cover_reference: Option<String>,
    /// Image file uploaded as the cover; relative paths resolve against the
    /// article directory
    pub cover_path: Option<PathBuf>,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            content: content.into(),
            digest: None,
            cover_reference: None,
            cover_path: None,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    pub fn with_cover(mut self, media_id: impl Into<String>) -> Self {
        self.cover_reference = Some(media_id.into());
        self
    }

    pub fn with_cover_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cover_path = Some(path.into());
        self
    }

    /// Media id given by the caller, if not blank
    pub fn explicit_cover(&self) -> Option<&str> {
        self.cover_reference
            .as_deref()
            .map(str::trim)
            .filter(|cover| !cover.is_empty())
    }

    /// Cover file to upload; an explicit media id takes precedence
    pub fn cover_file(&self) -> Option<&Path> {
        match self.explicit_cover() {
            Some(_) => None,
            None => self.cover_path.as_deref(),
        }
    }
}

/// Where an `<img>` source points to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Filesystem path, relative to the article directory or absolute
    LocalFile,
    /// http(s) URL on a host the platform does not serve
    ExternalUrl,
    /// Already served by the platform's image CDN
    PlatformHosted,
    /// `data:` URI
    Embedded,
}

/// One image source extracted from the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// The `src` value exactly as written in the document
    pub original_path: String,
    pub kind: ReferenceKind,
    /// Identity used for deduplication: the normalized absolute path for
    /// local files, the URL otherwise
    pub key: String,
}

impl ImageReference {
    /// Whether the image has to be uploaded before publishing
    pub fn is_local(&self) -> bool {
        matches!(
            self.kind,
            ReferenceKind::LocalFile | ReferenceKind::ExternalUrl
        )
    }
}

/// An image after it has been hosted on the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub original_path: String,
    pub remote_url: String,
    pub media_id: String,
}

/// Uploaded assets keyed by normalized reference, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMap {
    entries: Vec<(String, MediaAsset)>,
    index: HashMap<String, usize>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an asset; the first insertion for a key wins
    pub fn insert(&mut self, key: impl Into<String>, asset: MediaAsset) {
        let key = key.into();
        if self.index.contains_key(&key) {
            return;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, asset));
    }

    pub fn get(&self, key: &str) -> Option<&MediaAsset> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Asset of the first uploaded image in document order
    pub fn first(&self) -> Option<&MediaAsset> {
        self.entries.first().map(|(_, asset)| asset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MediaAsset)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Cached platform access token
pub struct AccessToken {
    value: SecretString,
    expires_at: Instant,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Instant) -> Self {
        let value: String = value.into();
        Self {
            value: SecretString::new(value.into()),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }

    /// Whether both tokens carry the same value
    pub fn same_value(&self, other: &AccessToken) -> bool {
        self.value.expose_secret() == other.value.expose_secret()
    }
}

impl Clone for AccessToken {
    fn clone(&self) -> Self {
        Self::new(self.value.expose_secret().to_owned(), self.expires_at)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
