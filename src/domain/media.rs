//! Cataloged media items.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, immutable identifier of a cataloged video (UUID v4 string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for MediaId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MediaId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single video in the library catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Unique identifier
    pub id: MediaId,

    /// Human-readable name (source file stem)
    pub display_name: String,

    /// Absolute source path at import time (dedup key)
    pub original_source_path: PathBuf,

    /// Absolute path of the managed copy
    pub stored_path: PathBuf,

    /// When the item was cataloged
    pub date_added: DateTime<Utc>,

    /// Thumbnail location; `None` until generation succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,
}

impl MediaItem {
    /// Create a new item with a fresh id, added now, without a thumbnail
    pub fn new(
        display_name: impl Into<String>,
        original_source_path: impl Into<PathBuf>,
        stored_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: MediaId::new(),
            display_name: display_name.into(),
            original_source_path: original_source_path.into(),
            stored_path: stored_path.into(),
            // Matches the precision the catalog stores
            date_added: Utc::now().trunc_subsecs(6),
            thumbnail_path: None,
        }
    }

    /// Thumbnail path, only if the file actually exists on disk.
    ///
    /// A recorded path whose file never materialized is treated as
    /// "no thumbnail".
    pub fn thumbnail(&self) -> Option<&Path> {
        self.thumbnail_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty() && p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_media_ids_are_unique() {
        let a = MediaId::new();
        let b = MediaId::new();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_thumbnail_requires_existing_file() {
        let temp = TempDir::new().unwrap();
        let mut item = MediaItem::new("clip", "/src/clip.mp4", temp.path().join("clip.mp4"));
        assert!(item.thumbnail().is_none());

        let thumb = temp.path().join("thumb.jpg");
        item.thumbnail_path = Some(thumb.clone());
        assert!(item.thumbnail().is_none());

        std::fs::write(&thumb, b"jpeg").unwrap();
        assert_eq!(item.thumbnail(), Some(thumb.as_path()));
    }

    #[test]
    fn test_media_item_json_shape() {
        let item = MediaItem::new("clip", "/src/clip.mp4", "/media/clip.mp4");
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["id"], item.id.as_str());
        assert_eq!(json["display_name"], "clip");
        assert!(json.get("thumbnail_path").is_none());
    }
}
