//! Publish generated HTML articles as drafts on a WeChat official account
//!
//! The pipeline sanitizes the article HTML for the platform editor, uploads
//! local and third-party images, rewrites their references and submits the
//! result to the draft box.

pub mod content;
pub mod core;
pub mod orchestration;
pub mod platform;
pub mod security;

#[cfg(test)]
pub(crate) mod test_support;

pub use content::{ImageResolver, ResolvedContent, remove_cover_image, sanitize};
pub use crate::core::*;
pub use orchestration::{ArticlePublisher, DraftPublisher, DraftReceipt, PublishReport, PublishRequest};
pub use platform::WeChatApi;
pub use security::{CredentialManager, CredentialValidator, TokenInfo, mask_token};
