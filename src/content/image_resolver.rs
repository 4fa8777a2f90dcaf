//! Image Resolver - Re-hosts article images on the platform
//!
//! Features:
//! - Extraction of `<img src>` references in document order
//! - Deduplication by normalized path, so each file is uploaded once
//! - Bounded parallel uploads with a barrier before the rewrite
//! - First failure in document order wins, remaining uploads are aborted

use super::html::{self, Element, Node};
use crate::core::config::PublisherConfig;
use crate::core::error::PublishError;
use crate::core::model::{AssetMap, ImageReference, MediaAsset, ReferenceKind};
use crate::core::retry::RetryManager;
use crate::core::traits::PlatformApi;
use crate::security::CredentialManager;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// HTML whose images all point at the platform
#[derive(Debug, Clone)]
pub struct ResolvedContent {
    pub html: String,
    /// Uploaded images in document order of first occurrence
    pub assets: AssetMap,
    /// Every image reference found, duplicates included
    pub references: Vec<ImageReference>,
}

/// Uploads local and third-party images and rewrites their references
pub struct ImageResolver {
    api: Arc<dyn PlatformApi>,
    credentials: Arc<CredentialManager>,
    retry: RetryManager,
    platform_hosts: Vec<String>,
    max_concurrent_uploads: usize,
}

impl ImageResolver {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        credentials: Arc<CredentialManager>,
        config: &PublisherConfig,
    ) -> Self {
        Self {
            api,
            credentials,
            retry: RetryManager::default(),
            platform_hosts: config.platform_hosts.clone(),
            max_concurrent_uploads: config.max_concurrent_uploads.max(1),
        }
    }

    /// Upload every distinct non-platform image and rewrite `html`
    ///
    /// Relative paths are resolved against `base_dir`. Platform-hosted and
    /// `data:` images are left untouched.
    pub async fn resolve(&self, html: &str, base_dir: &Path) -> Result<ResolvedContent, PublishError> {
        let mut nodes = html::parse(html);

        let mut references = Vec::new();
        visit_images(&nodes, &mut |img| {
            if let Some(reference) = img
                .attr("src")
                .and_then(|src| classify_reference(src, base_dir, &self.platform_hosts))
            {
                references.push(reference);
            }
        });

        let mut seen = HashSet::new();
        let pending: Vec<ImageReference> = references
            .iter()
            .filter(|r| r.is_local() && seen.insert(r.key.clone()))
            .cloned()
            .collect();

        if pending.is_empty() {
            debug!(images = references.len(), "No images need uploading");
            return Ok(ResolvedContent {
                html: html.to_string(),
                assets: AssetMap::new(),
                references,
            });
        }

        info!(
            images = references.len(),
            distinct = pending.len(),
            "Uploading article images"
        );
        let assets = self.upload_all(pending).await?;

        visit_images_mut(&mut nodes, &mut |img| {
            let key = img
                .attr("src")
                .and_then(|src| classify_reference(src, base_dir, &self.platform_hosts))
                .map(|r| r.key);

            if let Some(asset) = key.as_deref().and_then(|k| assets.get(k)) {
                for (name, value) in img.attrs.iter_mut() {
                    if name == "src" {
                        *value = asset.remote_url.clone();
                    }
                }
            }
        });

        Ok(ResolvedContent {
            html: html::serialize(&nodes),
            assets,
            references,
        })
    }

    /// Upload references in parallel, bounded by the configured limit
    async fn upload_all(&self, pending: Vec<ImageReference>) -> Result<AssetMap, PublishError> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_uploads));
        let mut tasks = Vec::with_capacity(pending.len());

        for reference in pending {
            let semaphore = Arc::clone(&semaphore);
            let api = Arc::clone(&self.api);
            let credentials = Arc::clone(&self.credentials);
            let retry = self.retry.clone();
            let reference_for_task = reference.clone();

            let task = tokio::spawn(async move {
                let _permit = semaphore.acquire().await.map_err(|e| PublishError::AssetUpload {
                    path: reference_for_task.original_path.clone(),
                    message: e.to_string(),
                })?;
                upload_reference(api, &credentials, &retry, &reference_for_task).await
            });

            tasks.push((reference, task));
        }

        // Barrier: every task is awaited before anything is rewritten
        let mut assets = AssetMap::new();
        let mut tasks = tasks.into_iter();

        while let Some((reference, task)) = tasks.next() {
            let outcome = match task.await {
                Ok(result) => result,
                Err(e) => Err(PublishError::AssetUpload {
                    path: reference.original_path.clone(),
                    message: format!("upload task failed: {}", e),
                }),
            };

            match outcome {
                Ok(asset) => assets.insert(reference.key, asset),
                Err(error) => {
                    let remaining: Vec<_> = tasks.by_ref().collect();
                    if !remaining.is_empty() {
                        warn!(aborted = remaining.len(), "Aborting remaining image uploads");
                    }
                    for (_, task) in remaining {
                        task.abort();
                    }
                    return Err(error);
                }
            }
        }

        info!(uploaded = assets.len(), "Article images uploaded");
        Ok(assets)
    }
}

async fn upload_reference(
    api: Arc<dyn PlatformApi>,
    credentials: &CredentialManager,
    retry: &RetryManager,
    reference: &ImageReference,
) -> Result<MediaAsset, PublishError> {
    let upload_error = |message: String| PublishError::AssetUpload {
        path: reference.original_path.clone(),
        message,
    };

    let bytes = match reference.kind {
        ReferenceKind::ExternalUrl => api
            .fetch_external(&reference.key)
            .await
            .map_err(|e| upload_error(format!("cannot download {}: {}", reference.key, e)))?,
        _ => tokio::fs::read(&reference.key)
            .await
            .map_err(|e| upload_error(format!("cannot read {}: {}", reference.key, e)))?,
    };

    if bytes.is_empty() {
        return Err(upload_error(format!("{} is empty", reference.key)));
    }

    let file_name = upload_file_name(reference);
    debug!(file = %file_name, bytes = bytes.len(), "Uploading image");

    let media = retry
        .run_authenticated(
            credentials,
            |token| {
                let api = Arc::clone(&api);
                let file_name = file_name.clone();
                let bytes = bytes.clone();
                async move { api.upload_media(&token, &file_name, bytes).await }
            },
            |e| upload_error(e.to_string()),
        )
        .await?;

    if media.url.is_empty() {
        return Err(upload_error(format!(
            "platform returned no URL for media {}",
            media.media_id
        )));
    }

    debug!(file = %file_name, media_id = %media.media_id, "Image uploaded");
    Ok(MediaAsset {
        original_path: reference.original_path.clone(),
        remote_url: media.url,
        media_id: media.media_id,
    })
}

/// File name sent with the upload; the platform checks the extension
fn upload_file_name(reference: &ImageReference) -> String {
    let last_segment = match reference.kind {
        ReferenceKind::ExternalUrl => url::Url::parse(&reference.key)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .unwrap_or_default(),
        _ => Path::new(&reference.key)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    if last_segment.is_empty() {
        "image.jpg".to_string()
    } else if Path::new(&last_segment).extension().is_none() {
        format!("{}.jpg", last_segment)
    } else {
        last_segment
    }
}

/// Classify an `<img src>` value; empty sources yield nothing
pub fn classify_reference(
    src: &str,
    base_dir: &Path,
    platform_hosts: &[String],
) -> Option<ImageReference> {
    let original = src.to_string();
    let src = src.trim().to_string();
    if src.is_empty() {
        return None;
    }

    let lower = src.to_ascii_lowercase();
    let reference = |kind, key: String| ImageReference {
        original_path: original.clone(),
        kind,
        key,
    };

    if lower.starts_with("data:") {
        return Some(reference(ReferenceKind::Embedded, src));
    }

    if lower.starts_with("file:") {
        let path = url::Url::parse(&src)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .unwrap_or_else(|| PathBuf::from(src.trim_start_matches("file://")));
        return Some(reference(ReferenceKind::LocalFile, local_key(&path, base_dir)));
    }

    let absolute = if src.starts_with("//") {
        format!("https:{}", src)
    } else {
        src.clone()
    };

    if let Ok(url) = url::Url::parse(&absolute) {
        // Single-letter schemes are Windows drive letters
        if url.scheme().len() > 1 {
            let hosted = url
                .host_str()
                .is_some_and(|host| is_platform_host(host, platform_hosts));
            let kind = if hosted {
                ReferenceKind::PlatformHosted
            } else {
                ReferenceKind::ExternalUrl
            };
            return Some(reference(kind, src));
        }
    }

    Some(reference(
        ReferenceKind::LocalFile,
        local_key(Path::new(&src), base_dir),
    ))
}

fn is_platform_host(host: &str, platform_hosts: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    platform_hosts
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
}

fn local_key(path: &Path, base_dir: &Path) -> String {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    normalize_path(&joined).to_string_lossy().into_owned()
}

/// Lexically remove `.` and `..` components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal =
                    matches!(normalized.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    normalized
}

fn visit_images(nodes: &[Node], f: &mut impl FnMut(&Element)) {
    for node in nodes {
        if let Node::Element(element) = node {
            if element.name == "img" {
                f(element);
            }
            visit_images(&element.children, f);
        }
    }
}

fn visit_images_mut(nodes: &mut [Node], f: &mut impl FnMut(&mut Element)) {
    for node in nodes {
        if let Node::Element(element) = node {
            if element.name == "img" {
                f(element);
            }
            visit_images_mut(&mut element.children, f);
        }
    }
}
