//! Stage tracking for one run of the publishing pipeline
//!
//! The tracker lives in memory only. It feeds the stage history of the
//! publish report and tells the orchestrator which stage a failure came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Initial,
    Sanitizing,
    ResolvingImages,
    SubmittingDraft,
    Success,
    Failed,
}

impl PipelineStage {
    /// Whether no further transition is expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Stage transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageTransition {
    /// From stage
    pub from: PipelineStage,

    /// To stage
    pub to: PipelineStage,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Short note, e.g. the number of uploaded images or the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Records the stages one publish run goes through
#[derive(Debug, Clone)]
pub struct PipelineTracker {
    current_stage: PipelineStage,
    transitions: Vec<StageTransition>,
    started_at: DateTime<Utc>,
    failed_stage: Option<PipelineStage>,
    error: Option<String>,
}

impl Default for PipelineTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineTracker {
    /// Create a tracker in the initial stage
    pub fn new() -> Self {
        Self {
            current_stage: PipelineStage::Initial,
            transitions: Vec::new(),
            started_at: Utc::now(),
            failed_stage: None,
            error: None,
        }
    }

    /// Transition to a new stage
    pub fn transition(&mut self, to: PipelineStage, detail: Option<String>) {
        self.transitions.push(StageTransition {
            from: self.current_stage,
            to,
            timestamp: Utc::now(),
            detail,
        });
        self.current_stage = to;
    }

    /// Record a failure of the current stage
    pub fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.failed_stage = Some(self.current_stage);
        self.error = Some(error.clone());
        self.transition(PipelineStage::Failed, Some(error));
    }

    /// Get current stage
    pub fn stage(&self) -> PipelineStage {
        self.current_stage
    }

    /// Stage that was active when the run failed
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        self.failed_stage
    }

    /// Get last error
    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    /// Milliseconds since the tracker was created
    pub fn elapsed_ms(&self) -> i64 {
        let end = self
            .transitions
            .last()
            .filter(|_| self.current_stage.is_terminal())
            .map(|t| t.timestamp)
            .unwrap_or_else(Utc::now);

        (end - self.started_at).num_milliseconds().max(0)
    }

    /// Get transition history as human-readable string
    pub fn history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                let time = t.timestamp.to_rfc3339();
                let detail = t
                    .detail
                    .as_ref()
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default();
                format!("{}: {:?} -> {:?}{}", time, t.from, t.to, detail)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
