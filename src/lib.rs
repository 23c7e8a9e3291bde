//! vidshelf - managed video library with background thumbnails
//!
//! Keeps a SQLite catalog of imported videos in sync with a managed media
//! folder, and renders preview thumbnails on a bounded background queue.
//!
//! # Architecture
//!
//! ```text
//! caller → LibraryOrchestrator ─┬─► ImportCoordinator ─► ThumbnailQueue ─► FrameExtractor
//!                               │          │
//!                               └─► CatalogStore ◄─────┘
//!                               │
//!                               └─► LibraryEvent subscribers, NotificationSink
//! ```
//!
//! # Modules
//!
//! - `adapters`: Frame extraction (ffmpeg) and notification sinks
//! - `core`: The library orchestrator
//! - `domain`: Data structures (MediaItem, LibraryEvent, ImportProgress)
//! - `ingest`: Import coordinator and thumbnail queue
//! - `library`: Catalog store and settings
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Import videos
//! vidshelf import ~/Downloads/*.mp4
//!
//! # List the library
//! vidshelf list
//!
//! # Choose the default video
//! vidshelf set-default <id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{FfmpegExtractor, FrameExtractor, LogNotifier, Notification, NotificationSink};
pub use core::LibraryOrchestrator;
pub use domain::{ImportProgress, ImportStage, LibraryEvent, MediaId, MediaItem};
pub use ingest::{ThumbnailJob, ThumbnailOutcome, ThumbnailQueue};
pub use library::{CatalogStore, JsonFileSettings, MemorySettings, SettingsStore};
