//! Domain types for the video library.
//!
//! This module contains the core data structures:
//! - Media: Cataloged videos and their identifiers
//! - Events: Library change events and import progress

pub mod events;
pub mod media;

// Re-export commonly used types
pub use events::{ImportProgress, ImportStage, ItemState, LibraryEvent, SkipReason};
pub use media::{MediaId, MediaItem};
