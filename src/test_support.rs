//! Shared test helpers: a recording in-memory platform and fixture builders

use crate::core::config::PublisherConfig;
use crate::core::error::ApiError;
use crate::core::traits::{AccessGrant, DraftArticle, PlatformApi, UploadedMedia};
use crate::security::CredentialManager;
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_APP_ID: &str = "wx1234567890abcdef";
pub const TEST_APP_SECRET: &str = "0123456789abcdef0123456789abcdef";

/// One call to `upload_media`
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub access_token: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// One call to `create_draft`
#[derive(Debug, Clone)]
pub struct RecordedDraft {
    pub access_token: String,
    pub article: DraftArticle,
}

/// In-memory `PlatformApi` that records every call
///
/// Uploads succeed with media id `M{n}` and url `U{n}`, numbered from 1 in
/// the order the calls arrive. Drafts succeed with id `DRAFT{n}`.
#[derive(Default)]
pub struct MockPlatform {
    token_ttl: u64,
    fetch_delay: Duration,
    upload_delay: Duration,

    token_fetches: AtomicUsize,
    token_failure: Mutex<Option<ApiError>>,

    upload_seq: AtomicUsize,
    uploads: Mutex<Vec<RecordedUpload>>,
    upload_failures: Mutex<HashMap<String, ApiError>>,
    upload_errors: Mutex<VecDeque<ApiError>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,

    drafts: Mutex<Vec<RecordedDraft>>,
    draft_errors: Mutex<VecDeque<ApiError>>,

    external: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            token_ttl: 7200,
            ..Default::default()
        }
    }

    pub fn with_token_ttl(mut self, secs: u64) -> Self {
        self.token_ttl = secs;
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    /// Every token fetch fails with this platform error
    pub fn fail_token_fetch(&self, code: i64, message: &str) {
        *self.token_failure.lock().unwrap() = Some(ApiError::Remote {
            code,
            message: message.to_string(),
        });
    }

    /// Uploads of `file_name` fail with this platform error
    pub fn fail_upload(&self, file_name: &str, code: i64, message: &str) {
        self.upload_failures.lock().unwrap().insert(
            file_name.to_string(),
            ApiError::Remote {
                code,
                message: message.to_string(),
            },
        );
    }

    /// The next upload call fails with `error`
    pub fn push_upload_error(&self, error: ApiError) {
        self.upload_errors.lock().unwrap().push_back(error);
    }

    /// The next draft call fails with `error`
    pub fn push_draft_error(&self, error: ApiError) {
        self.draft_errors.lock().unwrap().push_back(error);
    }

    /// Serve `bytes` for an external image URL
    pub fn serve_external(&self, url: &str, bytes: &[u8]) {
        self.external
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }

    pub fn token_fetches(&self) -> usize {
        self.token_fetches.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn drafts(&self) -> Vec<RecordedDraft> {
        self.drafts.lock().unwrap().clone()
    }

    /// Highest number of uploads observed running at the same time
    pub fn max_concurrent_uploads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformApi for MockPlatform {
    async fn fetch_token(
        &self,
        _app_id: &str,
        _app_secret: &SecretString,
    ) -> Result<AccessGrant, ApiError> {
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        let failure = self.token_failure.lock().unwrap().clone();
        if let Some(error) = failure {
            return Err(error);
        }

        let n = self.token_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessGrant {
            access_token: format!("ACCESS_TOKEN_{:04}_abcdefghij", n),
            expires_in: self.token_ttl,
        })
    }

    async fn upload_media(
        &self,
        access_token: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedMedia, ApiError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let queued = self.upload_errors.lock().unwrap().pop_front();
        if let Some(error) = queued {
            return Err(error);
        }
        let failure = self.upload_failures.lock().unwrap().get(file_name).cloned();
        if let Some(error) = failure {
            return Err(error);
        }

        self.uploads.lock().unwrap().push(RecordedUpload {
            access_token: access_token.to_string(),
            file_name: file_name.to_string(),
            bytes,
        });

        let n = self.upload_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(UploadedMedia {
            media_id: format!("M{}", n),
            url: format!("U{}", n),
        })
    }

    async fn create_draft(
        &self,
        access_token: &str,
        article: &DraftArticle,
    ) -> Result<String, ApiError> {
        self.drafts.lock().unwrap().push(RecordedDraft {
            access_token: access_token.to_string(),
            article: article.clone(),
        });

        let queued = self.draft_errors.lock().unwrap().pop_front();
        if let Some(error) = queued {
            return Err(error);
        }

        Ok(format!("DRAFT{}", self.drafts.lock().unwrap().len()))
    }

    async fn fetch_external(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        self.external
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ApiError::Transport {
                message: format!("404 Not Found: {}", url),
            })
    }
}

/// CredentialManager backed by `platform` with the default 300 s margin
pub fn credentials_for(platform: Arc<MockPlatform>) -> CredentialManager {
    CredentialManager::new(
        platform,
        TEST_APP_ID,
        SecretString::new(TEST_APP_SECRET.into()),
        Duration::from_secs(300),
    )
}

/// Configuration whose default cover lives inside `dir`
pub fn test_config(dir: &Path) -> PublisherConfig {
    PublisherConfig::new(TEST_APP_ID, TEST_APP_SECRET)
        .with_default_author("Default Author")
        .with_default_cover(dir.join("default_cover.png"))
}

/// Write a small non-empty image fixture
pub fn write_image(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"\x89PNG\r\n\x1a\nfixture").unwrap();
}
