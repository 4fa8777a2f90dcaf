//! Article Publisher - Main orchestrator for draft publishing
//!
//! Manages the complete publishing workflow:
//! - Cover image removal and HTML sanitizing
//! - Image upload and reference rewriting
//! - Cover selection and draft submission
//! - Stage tracking and working file cleanup

use crate::content::{ImageResolver, remove_cover_image, sanitize};
use crate::core::config::PublisherConfig;
use crate::core::config_loader::{ConfigLoadOptions, ConfigLoader};
use crate::core::error::PublishError;
use crate::core::model::Article;
use crate::core::state_machine::{PipelineStage, PipelineTracker, StageTransition};
use crate::core::traits::PlatformApi;
use crate::orchestration::draft_publisher::DraftPublisher;
use crate::platform::WeChatApi;
use crate::security::{CredentialManager, TokenInfo};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Publish an article stored in a transient working file
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// HTML file produced by the content generator; removed after the run
    pub content_path: PathBuf,
    pub title: String,
    pub author: String,
    pub digest: Option<String>,
    /// Media id of an already-hosted cover
    pub cover_reference: Option<String>,
    /// Image file uploaded as the cover
    pub cover_path: Option<PathBuf>,
    /// Directory relative image paths resolve against (defaults to the
    /// directory of `content_path`)
    pub base_dir: Option<PathBuf>,
}

impl PublishRequest {
    pub fn new(
        content_path: impl Into<PathBuf>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            content_path: content_path.into(),
            title: title.into(),
            author: author.into(),
            digest: None,
            cover_reference: None,
            cover_path: None,
            base_dir: None,
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

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }
}

/// Publishing report returned after a successful run
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub draft_id: String,
    /// Title as submitted
    pub title: String,
    pub cover_media_id: String,
    /// Number of distinct images uploaded for the body
    pub uploaded_images: usize,
    pub duration_ms: i64,
    pub published_at: chrono::DateTime<chrono::Utc>,
    pub stages: Vec<StageTransition>,
}

/// Main draft publishing orchestrator
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use wechat_draft_publisher::core::{Article, ConfigLoadOptions};
/// use wechat_draft_publisher::orchestration::ArticlePublisher;
///
/// # async fn run() -> Result<(), wechat_draft_publisher::core::PublishError> {
/// let publisher = ArticlePublisher::load(ConfigLoadOptions::from_process_env()).await?;
///
/// let article = Article::new("Weekly notes", "Editor", "<p>Hello</p><img src=\"chart.png\">");
/// let report = publisher.publish(&article, Path::new("./drafts")).await?;
/// println!("draft {} created", report.draft_id);
/// # Ok(())
/// # }
/// ```
pub struct ArticlePublisher {
    credentials: Arc<CredentialManager>,
    resolver: ImageResolver,
    drafts: DraftPublisher,
    last_run: Mutex<Option<PipelineTracker>>,
}

impl ArticlePublisher {
    /// Create a publisher talking to `api`
    pub fn new(config: &PublisherConfig, api: Arc<dyn PlatformApi>) -> Self {
        let credentials = Arc::new(CredentialManager::from_config(Arc::clone(&api), config));

        Self {
            resolver: ImageResolver::new(Arc::clone(&api), Arc::clone(&credentials), config),
            drafts: DraftPublisher::new(api, Arc::clone(&credentials), config),
            credentials,
            last_run: Mutex::new(None),
        }
    }

    /// Create a publisher talking to the WeChat HTTP API
    pub fn from_config(config: &PublisherConfig) -> Result<Self, PublishError> {
        let api = WeChatApi::new(config)?;
        Ok(Self::new(config, Arc::new(api)))
    }

    /// Load configuration from file and environment, then create a publisher
    pub async fn load(options: ConfigLoadOptions) -> Result<Self, PublishError> {
        let config = ConfigLoader::load(options).await?;
        Self::from_config(&config)
    }

    /// Publish an article
    ///
    /// Relative image and cover file paths resolve against `base_dir`. When
    /// the cover comes from its own file, its copy in the body is removed.
    /// The first failure halts the run and is returned unchanged.
    pub async fn publish(&self, article: &Article, base_dir: &Path) -> Result<PublishReport, PublishError> {
        let mut tracker = PipelineTracker::new();
        let result = self.run(article, base_dir, &mut tracker).await;

        match &result {
            Ok(report) => {
                info!(
                    draft_id = %report.draft_id,
                    images = report.uploaded_images,
                    duration_ms = report.duration_ms,
                    "Article published as draft"
                );
            }
            Err(error) => {
                tracker.fail(error.to_string());
                warn!(
                    stage = ?tracker.failed_stage(),
                    code = error.code(),
                    "Publishing failed: {}",
                    error
                );
            }
        }

        debug!("Pipeline history:\n{}", tracker.history());
        *self.last_run.lock().await = Some(tracker);
        result
    }

    /// Publish the HTML stored in a working file, then remove the file
    ///
    /// The file is removed whether publishing succeeds or fails.
    pub async fn publish_file(&self, request: PublishRequest) -> Result<PublishReport, PublishError> {
        let _working_file = WorkingFile::new(request.content_path.clone());

        let content = tokio::fs::read_to_string(&request.content_path)
            .await
            .map_err(|e| PublishError::Io {
                path: request.content_path.display().to_string(),
                message: e.to_string(),
            })?;

        let base_dir = request.base_dir.clone().unwrap_or_else(|| {
            request
                .content_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let article = Article {
            title: request.title,
            author: request.author,
            content,
            digest: request.digest,
            cover_reference: request.cover_reference,
            cover_path: request.cover_path,
        };

        self.publish(&article, &base_dir).await
    }

    /// Stage record of the most recent run
    pub async fn last_run(&self) -> Option<PipelineTracker> {
        self.last_run.lock().await.clone()
    }

    /// Masked view of the cached access token
    pub async fn token_info(&self) -> Option<TokenInfo> {
        self.credentials.token_info().await
    }

    async fn run(
        &self,
        article: &Article,
        base_dir: &Path,
        tracker: &mut PipelineTracker,
    ) -> Result<PublishReport, PublishError> {
        let mut article = article.clone();
        article.cover_path = article.cover_path.map(|path| base_dir.join(path));

        // 1. Sanitize
        tracker.transition(PipelineStage::Sanitizing, None);
        let sanitized = match article.cover_file() {
            Some(_) => sanitize(&remove_cover_image(&article.content)),
            None => sanitize(&article.content),
        };

        // 2. Upload images
        tracker.transition(PipelineStage::ResolvingImages, None);
        let resolved = self.resolver.resolve(&sanitized, base_dir).await?;

        // 3. Submit draft
        tracker.transition(
            PipelineStage::SubmittingDraft,
            Some(format!("{} images uploaded", resolved.assets.len())),
        );
        let receipt = self
            .drafts
            .publish(&article, &resolved.html, &resolved.assets)
            .await?;

        tracker.transition(PipelineStage::Success, Some(receipt.draft_id.clone()));

        Ok(PublishReport {
            draft_id: receipt.draft_id,
            title: receipt.title,
            cover_media_id: receipt.cover_media_id,
            uploaded_images: resolved.assets.len(),
            duration_ms: tracker.elapsed_ms(),
            published_at: chrono::Utc::now(),
            stages: tracker.transitions().to_vec(),
        })
    }
}

/// Removes the working file when dropped
struct WorkingFile {
    path: PathBuf,
}

impl WorkingFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for WorkingFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Working file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove working file: {}", e),
        }
    }
}
