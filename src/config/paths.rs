//! Layout of the managed media folder.
//!
//! Single source of truth - import this instead of hardcoding paths.
//!
//! ```text
//! <media>/
//! ├── clip.mp4
//! ├── clip (1).mp4
//! └── .thumbnails/
//!     └── <media_id>.jpg
//! ```

use std::path::{Path, PathBuf};

use crate::domain::MediaId;

/// Thumbnail subdirectory name inside the media folder
pub const THUMBNAILS_DIR: &str = ".thumbnails";

/// Video file extensions accepted for import (lowercase, no dot)
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "webm"];

/// `<media>/.thumbnails`
pub fn thumbnails_dir(media_root: &Path) -> PathBuf {
    media_root.join(THUMBNAILS_DIR)
}

/// Deterministic thumbnail location for a media id
pub fn thumbnail_path(media_root: &Path, id: &MediaId) -> PathBuf {
    thumbnails_dir(media_root).join(format!("{}.jpg", id))
}

/// Whether `path` carries a supported video extension (case-insensitive)
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_path_is_deterministic() {
        let id = MediaId::from("1234");
        let media = Path::new("/media");

        assert_eq!(
            thumbnail_path(media, &id),
            PathBuf::from("/media/.thumbnails/1234.jpg")
        );
        assert_eq!(thumbnail_path(media, &id), thumbnail_path(media, &id));
    }

    #[test]
    fn test_supported_extensions_case_insensitive() {
        assert!(has_supported_extension(Path::new("/a/clip.mp4")));
        assert!(has_supported_extension(Path::new("/a/CLIP.MKV")));
        assert!(has_supported_extension(Path::new("/a/clip.WebM")));
        assert!(!has_supported_extension(Path::new("/a/notes.txt")));
        assert!(!has_supported_extension(Path::new("/a/noextension")));
    }
}
