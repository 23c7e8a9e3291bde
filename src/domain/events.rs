//! Change events and import progress events.
//!
//! Library change events are raised by the orchestrator after a successful
//! mutation. Import progress events are streamed by the import coordinator
//! while a batch is running.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::media::{MediaId, MediaItem};

/// A change to the library, delivered to every subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LibraryEvent {
    /// One or more videos were added
    Imported { items: Vec<MediaItem> },

    /// A video was removed (explicitly or by orphan reconciliation)
    Removed { id: MediaId, name: String },

    /// The default video pointer now references this video
    DefaultChanged { id: MediaId, name: String },
}

/// Why an import path was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Missing, unsupported extension, or unreadable
    Invalid,

    /// Source path already cataloged
    Duplicate,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Invalid => write!(f, "Invalid file"),
            SkipReason::Duplicate => write!(f, "Duplicate"),
        }
    }
}

/// Stage reported by an import progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "detail", rename_all = "snake_case")]
pub enum ImportStage {
    /// Batch accepted, nothing processed yet
    Starting,

    /// About to process `current_path`
    Processing,

    /// Item copied and cataloged
    Imported,

    /// Item rejected without side effects
    Skipped(SkipReason),

    /// Item aborted (I/O failure)
    Failed(String),

    /// All paths processed; waiting for the thumbnail barrier
    GeneratingThumbnails,

    /// Batch finished, thumbnails settled
    Completed,
}

impl ImportStage {
    /// Whether this stage ends an individual item
    pub fn is_item_terminal(&self) -> bool {
        matches!(
            self,
            ImportStage::Imported | ImportStage::Skipped(_) | ImportStage::Failed(_)
        )
    }
}

/// A single progress update for an import batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportProgress {
    /// Number of paths in the batch
    pub total: usize,

    /// Number of paths that reached a terminal item stage
    pub processed: usize,

    /// Path the event refers to (absent for batch-level stages)
    pub current_path: Option<PathBuf>,

    /// Current stage
    pub stage: ImportStage,
}

impl ImportProgress {
    /// Status line suitable for a progress bar label
    pub fn message(&self) -> String {
        let name = self
            .current_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match &self.stage {
            ImportStage::Starting => format!("Importing {} file(s)...", self.total),
            ImportStage::Processing => format!("Processing {}", name),
            ImportStage::Imported => format!("Imported {}", name),
            ImportStage::Skipped(reason) => format!("Skipped {}: {}", name, reason),
            ImportStage::Failed(error) => format!("Failed {}: {}", name, error),
            ImportStage::GeneratingThumbnails => "Generating thumbnails...".to_string(),
            ImportStage::Completed => "Completed".to_string(),
        }
    }
}

/// Per-item lifecycle inside the import pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Validating,
    Copying,
    Copied,
    ThumbnailEnqueued,
    Imported,
    Skipped,
    Failed,
}

impl ItemState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: ItemState) -> bool {
        use ItemState::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, Skipped)
                | (Validating, Failed)
                | (Validating, Copying)
                | (Copying, Failed)
                | (Copying, Copied)
                | (Copied, ThumbnailEnqueued)
                | (ThumbnailEnqueued, Imported)
                | (ThumbnailEnqueued, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Imported | ItemState::Skipped | ItemState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_messages() {
        assert_eq!(SkipReason::Invalid.to_string(), "Invalid file");
        assert_eq!(SkipReason::Duplicate.to_string(), "Duplicate");
    }

    #[test]
    fn test_progress_message() {
        let progress = ImportProgress {
            total: 3,
            processed: 1,
            current_path: Some(PathBuf::from("/in/notes.txt")),
            stage: ImportStage::Skipped(SkipReason::Invalid),
        };
        assert_eq!(progress.message(), "Skipped notes.txt: Invalid file");

        let done = ImportProgress {
            current_path: None,
            stage: ImportStage::GeneratingThumbnails,
            ..progress
        };
        assert_eq!(done.message(), "Generating thumbnails...");
    }

    #[test]
    fn test_item_state_machine() {
        use ItemState::*;

        assert!(Pending.can_transition_to(Validating));
        assert!(Validating.can_transition_to(Skipped));
        assert!(Copying.can_transition_to(Failed));
        assert!(ThumbnailEnqueued.can_transition_to(Imported));

        assert!(!Pending.can_transition_to(Imported));
        assert!(!Skipped.can_transition_to(Copying));
        assert!(!Copied.can_transition_to(Failed));

        assert!(Imported.is_terminal());
        assert!(!Copied.is_terminal());
    }

    #[test]
    fn test_library_event_serialization() {
        let event = LibraryEvent::Removed {
            id: MediaId::from("abc"),
            name: "clip".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "removed");
        assert_eq!(json["id"], "abc");

        let parsed: LibraryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_item_terminal_stages() {
        assert!(ImportStage::Imported.is_item_terminal());
        assert!(ImportStage::Skipped(SkipReason::Duplicate).is_item_terminal());
        assert!(!ImportStage::GeneratingThumbnails.is_item_terminal());
    }
}
