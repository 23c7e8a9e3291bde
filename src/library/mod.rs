//! Video library persistence.
//!
//! The catalog lives in SQLite; the default video pointer lives in the
//! settings store.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.vidshelf/
//! ├── library.db                # Media table
//! ├── settings.json             # DefaultVideoId and other settings
//! └── media/
//!     ├── <name>.mp4            # Managed copies
//!     └── .thumbnails/
//!         └── <media_id>.jpg
//! ```

pub mod catalog;
pub mod settings;

pub use catalog::{delete_file_best_effort, CatalogError, CatalogStore};
pub use settings::{JsonFileSettings, MemorySettings, SettingsStore, DEFAULT_VIDEO_KEY};
