//! Orchestration layer for draft publishing
//!
//! This module sequences sanitizing, image hosting and draft submission
//! into a single publish call.

pub mod article_publisher;
pub mod draft_publisher;

// Re-export main types for convenience
pub use article_publisher::{ArticlePublisher, PublishReport, PublishRequest};
pub use draft_publisher::{DraftPublisher, DraftReceipt};
