//! Import pipeline.
//!
//! Source files flow through the import coordinator into the managed media
//! folder and the catalog; thumbnails are produced by a background queue.
//!
//! # Architecture
//!
//! ```text
//! paths → ImportCoordinator → copy → CatalogStore
//!                  │                      ▲
//!                  └─► ThumbnailQueue ────┘ (ThumbnailPath after barrier)
//!                         │
//!                   FrameExtractor
//! ```

pub mod importer;
pub mod thumbnails;

// Re-export key types
pub use importer::{is_valid_for_import, unique_destination, ImportCoordinator, ImportError};
pub use thumbnails::{
    QueueStats, ThumbnailError, ThumbnailJob, ThumbnailOutcome, ThumbnailQueue, ThumbnailTicket,
};
