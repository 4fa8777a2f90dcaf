//! Draft Publisher - Builds the draft payload and submits it
//!
//! Picks the cover image, enforces the platform's field limits and creates
//! the draft with one resubmission after a token rejection.

use crate::core::config::{DraftOptions, PublisherConfig};
use crate::core::error::PublishError;
use crate::core::model::{Article, AssetMap};
use crate::core::retry::RetryManager;
use crate::core::traits::{DraftArticle, PlatformApi};
use crate::security::CredentialManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Maximum title length in characters
pub const MAX_TITLE_CHARS: usize = 64;
/// Maximum title length in UTF-8 bytes
pub const MAX_TITLE_BYTES: usize = 192;
/// Maximum author length in UTF-8 bytes
pub const MAX_AUTHOR_BYTES: usize = 20;
/// Maximum digest length in UTF-8 bytes
pub const MAX_DIGEST_BYTES: usize = 120;
/// Length of the digest derived from the title
pub const DEFAULT_DIGEST_BYTES: usize = 54;

/// Identifiers of a created draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftReceipt {
    pub draft_id: String,
    pub cover_media_id: String,
    /// Title as submitted, after truncation
    pub title: String,
}

pub struct DraftPublisher {
    api: Arc<dyn PlatformApi>,
    credentials: Arc<CredentialManager>,
    retry: RetryManager,
    default_author: Option<String>,
    default_cover_path: PathBuf,
    options: DraftOptions,
    default_cover: OnceCell<String>,
}

impl DraftPublisher {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        credentials: Arc<CredentialManager>,
        config: &PublisherConfig,
    ) -> Self {
        Self {
            api,
            credentials,
            retry: RetryManager::default(),
            default_author: config.default_author.clone(),
            default_cover_path: config.default_cover_path.clone(),
            options: config.draft.clone(),
            default_cover: OnceCell::new(),
        }
    }

    /// Create a draft from `article` with its rewritten `content`
    ///
    /// The cover is the article's explicit media id, else its cover file,
    /// else the first uploaded image, else the configured default cover.
    pub async fn publish(
        &self,
        article: &Article,
        content: &str,
        assets: &AssetMap,
    ) -> Result<DraftReceipt, PublishError> {
        let cover_media_id = self.resolve_cover(article, assets).await?;
        let draft = self.build_draft(article, content, &cover_media_id);

        info!(title = %draft.title, cover = %cover_media_id, "Submitting draft");

        let draft_id = self
            .retry
            .run_authenticated(
                &self.credentials,
                |token| {
                    let api = Arc::clone(&self.api);
                    let draft = &draft;
                    async move { api.create_draft(&token, draft).await }
                },
                |e| {
                    let (code, message) = e.into_parts();
                    PublishError::DraftRejected {
                        code: code.unwrap_or(-1),
                        message,
                    }
                },
            )
            .await?;

        info!(draft_id = %draft_id, "Draft created");

        Ok(DraftReceipt {
            draft_id,
            cover_media_id,
            title: draft.title,
        })
    }

    async fn resolve_cover(&self, article: &Article, assets: &AssetMap) -> Result<String, PublishError> {
        if let Some(cover) = article.explicit_cover() {
            debug!(cover = %cover, "Using explicit cover");
            return Ok(cover.to_string());
        }

        if let Some(path) = article.cover_file() {
            return self.upload_cover(path).await;
        }

        if let Some(asset) = assets.first() {
            debug!(image = %asset.original_path, "Using first article image as cover");
            return Ok(asset.media_id.clone());
        }

        self.default_cover
            .get_or_try_init(|| self.upload_cover(&self.default_cover_path))
            .await
            .cloned()
    }

    async fn upload_cover(&self, cover_path: &Path) -> Result<String, PublishError> {
        let path = cover_path.display().to_string();
        let upload_error = |message: String| PublishError::AssetUpload {
            path: path.clone(),
            message,
        };

        let bytes = tokio::fs::read(cover_path)
            .await
            .map_err(|e| upload_error(format!("cannot read cover: {}", e)))?;
        if bytes.is_empty() {
            return Err(upload_error("cover file is empty".to_string()));
        }

        let file_name = cover_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cover.png".to_string());

        info!(path = %path, "Uploading cover");
        let media = self
            .retry
            .run_authenticated(
                &self.credentials,
                |token| {
                    let api = Arc::clone(&self.api);
                    let file_name = file_name.clone();
                    let bytes = bytes.clone();
                    async move { api.upload_media(&token, &file_name, bytes).await }
                },
                |e| upload_error(e.to_string()),
            )
            .await?;

        Ok(media.media_id)
    }

    fn build_draft(&self, article: &Article, content: &str, cover_media_id: &str) -> DraftArticle {
        let title = limit_title(&article.title);
        if title != article.title {
            warn!(original = %article.title, title = %title, "Title too long, truncated");
        }

        let author = match article.author.trim() {
            "" => self.default_author.clone().unwrap_or_default(),
            author => author.to_string(),
        };
        let limited_author = truncate_to_bytes(&author, MAX_AUTHOR_BYTES);
        if limited_author.len() != author.len() {
            warn!(original = %author, author = %limited_author, "Author too long, truncated");
        }

        let digest = match article.digest.as_deref().map(str::trim) {
            Some(digest) if !digest.is_empty() => digest.to_string(),
            _ => truncate_to_bytes(&title, DEFAULT_DIGEST_BYTES).to_string(),
        };
        let limited_digest = truncate_to_bytes(&digest, MAX_DIGEST_BYTES);
        if limited_digest.len() != digest.len() {
            warn!(bytes = digest.len(), "Digest too long, truncated");
        }

        DraftArticle {
            author: limited_author.to_string(),
            digest: limited_digest.to_string(),
            content: content.to_string(),
            content_source_url: self.options.content_source_url.clone().unwrap_or_default(),
            thumb_media_id: cover_media_id.to_string(),
            show_cover_pic: u8::from(self.options.show_cover_pic),
            need_open_comment: u8::from(self.options.open_comment),
            only_fans_can_comment: u8::from(self.options.fans_only_comment),
            title,
        }
    }
}

/// Longest prefix of `value` within `max_bytes`, cut on a character boundary
pub fn truncate_to_bytes(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }

    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Title within both the character and the byte limit
pub fn limit_title(title: &str) -> String {
    let by_chars: String = title.chars().take(MAX_TITLE_CHARS).collect();
    truncate_to_bytes(&by_chars, MAX_TITLE_BYTES).to_string()
}
