//! Adapter interfaces for external collaborators.
//!
//! Adapters provide a unified interface for the pieces this crate does not
//! own: rendering a frame out of a video, and showing a message to the user.

pub mod ffmpeg;
pub mod notify;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ffmpeg::FfmpegExtractor;
pub use notify::LogNotifier;

/// Renders a single JPEG frame from a video.
///
/// Cancellation is signalled by dropping the returned future; implementations
/// must not leave work running after that (e.g. spawn children with
/// `kill_on_drop`).
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Human-readable extractor name
    fn name(&self) -> &str;

    /// Write a JPEG for `video_path` to `output_path`
    async fn extract(
        &self,
        video_path: &Path,
        output_path: &Path,
        duration: Option<Duration>,
    ) -> Result<()>;
}

/// What a user-facing notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationScenario {
    ImportSuccess,
    ImportError,
    RemoveSuccess,
    RemoveError,
    DefaultVideoSet,
    DefaultVideoError,
}

/// How prominently a notification should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A single user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub scenario: NotificationScenario,
    pub severity: Severity,
}

impl Notification {
    pub fn new(message: impl Into<String>, scenario: NotificationScenario, severity: Severity) -> Self {
        Self {
            message: message.into(),
            scenario,
            severity,
        }
    }
}

/// Receives user-facing notifications; rendering is the sink's business
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}
