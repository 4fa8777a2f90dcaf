//! Core traits and wire types for the remote platform
//!
//! This module defines the boundary between the pipeline and the content
//! platform: token exchange, media hosting and draft creation.

use crate::core::error::ApiError;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ============================================================================
// Authentication
// ============================================================================

/// Result of exchanging the application identity for an access token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    /// Lifetime in seconds
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    7200
}

// ============================================================================
// Media
// ============================================================================

/// A binary hosted by the platform
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedMedia {
    pub media_id: String,
    #[serde(default)]
    pub url: String,
}

// ============================================================================
// Drafts
// ============================================================================

/// One article entry of a draft-creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftArticle {
    pub title: String,
    pub author: String,
    pub digest: String,
    pub content: String,
    pub content_source_url: String,
    pub thumb_media_id: String,
    pub show_cover_pic: u8,
    pub need_open_comment: u8,
    pub only_fans_can_comment: u8,
}

/// Draft-creation request body
#[derive(Debug, Clone, Serialize)]
pub struct DraftRequest<'a> {
    pub articles: [&'a DraftArticle; 1],
}

/// Draft-creation response body
#[derive(Debug, Clone, Deserialize)]
pub struct DraftCreated {
    pub media_id: String,
}

// ============================================================================
// Platform API Trait
// ============================================================================

/// Remote operations the pipeline needs from the content platform
///
/// The HTTP implementation lives in [`crate::platform::WeChatApi`]; tests
/// substitute a recording double. Every method maps a platform-level error
/// object to [`ApiError::Remote`] with the code and message untouched.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Exchange application identity and secret for an access token
    async fn fetch_token(
        &self,
        app_id: &str,
        app_secret: &SecretString,
    ) -> Result<AccessGrant, ApiError>;

    /// Upload one image binary
    async fn upload_media(
        &self,
        access_token: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedMedia, ApiError>;

    /// Create a draft and return the platform-assigned identifier
    async fn create_draft(
        &self,
        access_token: &str,
        article: &DraftArticle,
    ) -> Result<String, ApiError>;

    /// Download an image hosted outside the platform so it can be re-hosted
    async fn fetch_external(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}
