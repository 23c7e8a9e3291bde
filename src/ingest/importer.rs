//! Import coordinator.
//!
//! Validates, copies, and catalogs source files one at a time. Thumbnails are
//! handed to the background queue as soon as a copy lands, so extraction of
//! earlier files overlaps with copying of later ones. The batch only reports
//! `Completed` after the queue's completion barrier.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::thumbnails::{ThumbnailJob, ThumbnailOutcome, ThumbnailQueue, ThumbnailTicket};
use crate::config::paths;
use crate::domain::{ImportProgress, ImportStage, ItemState, MediaItem, SkipReason};
use crate::library::{delete_file_best_effort, CatalogStore};

/// Numbered names tried before falling back to a random suffix
const MAX_NUMBERED_ATTEMPTS: u32 = 999;

/// Buffered progress events per subscriber
const PROGRESS_CAPACITY: usize = 1024;

/// Errors that abort a whole batch. Only raised before any item is
/// processed; per-item problems become `Skipped`/`Failed` stages.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to prepare media folder: {0}")]
    MediaFolder(#[from] io::Error),
}

/// Result of running one path through the pipeline
enum ItemResult {
    Imported(MediaItem, Option<ThumbnailTicket>),
    Skipped(SkipReason),
    /// The ticket belongs to a job enqueued for a copy that was then discarded
    Failed(String, Option<ThumbnailTicket>),
}

/// Tracks one path through the item state machine
struct ItemTracker<'a> {
    source: &'a Path,
    state: ItemState,
}

impl<'a> ItemTracker<'a> {
    fn new(source: &'a Path) -> Self {
        Self {
            source,
            state: ItemState::Pending,
        }
    }

    fn advance(&mut self, next: ItemState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal import transition {:?} -> {:?}",
            self.state,
            next
        );
        if next.is_terminal() {
            debug!(source = %self.source.display(), state = ?next, "Import item finished");
        } else {
            debug!(source = %self.source.display(), from = ?self.state, to = ?next, "Import item state");
        }
        self.state = next;
    }
}

/// Runs import batches against the catalog and thumbnail queue
pub struct ImportCoordinator {
    catalog: Arc<CatalogStore>,
    thumbnails: Arc<ThumbnailQueue>,
    media_root: PathBuf,
    progress: broadcast::Sender<ImportProgress>,
}

impl ImportCoordinator {
    pub fn new(
        catalog: Arc<CatalogStore>,
        thumbnails: Arc<ThumbnailQueue>,
        media_root: impl Into<PathBuf>,
    ) -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CAPACITY);
        Self {
            catalog,
            thumbnails,
            media_root: media_root.into(),
            progress,
        }
    }

    /// Receive progress for batches started after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ImportProgress> {
        self.progress.subscribe()
    }

    /// Import `sources` sequentially and return the items actually cataloged.
    ///
    /// Per-item problems, catalog errors included, are reported through
    /// progress events and never fail the batch.
    #[instrument(skip(self, sources), fields(count = sources.len()))]
    pub(crate) async fn import(&self, sources: &[PathBuf]) -> Result<Vec<MediaItem>, ImportError> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let total = sources.len();
        let mut processed = 0usize;
        self.emit(total, processed, None, ImportStage::Starting);

        fs::create_dir_all(&self.media_root).await?;
        fs::create_dir_all(paths::thumbnails_dir(&self.media_root)).await?;

        let mut imported: Vec<(MediaItem, Option<ThumbnailTicket>)> = Vec::new();
        let mut discarded: Vec<ThumbnailTicket> = Vec::new();

        for source in sources {
            self.emit(total, processed, Some(source), ImportStage::Processing);

            let stage = match self.import_one(source).await {
                ItemResult::Imported(item, ticket) => {
                    info!(id = %item.id, name = %item.display_name, "Imported video");
                    imported.push((item, ticket));
                    ImportStage::Imported
                }
                ItemResult::Skipped(reason) => {
                    debug!(source = %source.display(), %reason, "Skipped import");
                    ImportStage::Skipped(reason)
                }
                ItemResult::Failed(message, ticket) => {
                    warn!(source = %source.display(), error = %message, "Import failed");
                    discarded.extend(ticket);
                    ImportStage::Failed(message)
                }
            };

            processed += 1;
            self.emit(total, processed, Some(source), stage);
        }

        self.emit(total, processed, None, ImportStage::GeneratingThumbnails);
        self.thumbnails.wait_for_completion().await;

        let mut items = Vec::with_capacity(imported.len());
        for (mut item, ticket) in imported {
            if let Some(ticket) = ticket {
                self.apply_thumbnail(&mut item, ticket).await;
            }
            items.push(item);
        }
        for ticket in discarded {
            discard_thumbnail(ticket).await;
        }

        self.emit(total, processed, None, ImportStage::Completed);
        Ok(items)
    }

    /// Validate → dedup → copy → enqueue thumbnail → persist
    async fn import_one(&self, source: &Path) -> ItemResult {
        let mut tracker = ItemTracker::new(source);

        tracker.advance(ItemState::Validating);
        if !is_valid_for_import(source).await {
            tracker.advance(ItemState::Skipped);
            return ItemResult::Skipped(SkipReason::Invalid);
        }

        match self.catalog.get_by_original_path(source) {
            Ok(Some(_)) => {
                tracker.advance(ItemState::Skipped);
                return ItemResult::Skipped(SkipReason::Duplicate);
            }
            Ok(None) => {}
            Err(e) => {
                tracker.advance(ItemState::Failed);
                return ItemResult::Failed(e.to_string(), None);
            }
        }

        tracker.advance(ItemState::Copying);
        let Some(file_name) = source.file_name() else {
            tracker.advance(ItemState::Failed);
            return ItemResult::Failed("Source has no file name".to_string(), None);
        };

        // A row may still claim a path whose file is gone
        let destination = unique_destination(&self.media_root, file_name, |candidate| {
            self.catalog
                .is_stored_path_taken(candidate)
                .unwrap_or_else(|e| {
                    warn!(path = %candidate.display(), error = %e, "Stored path lookup failed");
                    false
                })
        });
        if let Err(e) = copy_no_overwrite(source, &destination).await {
            tracker.advance(ItemState::Failed);
            return ItemResult::Failed(e.to_string(), None);
        }
        tracker.advance(ItemState::Copied);

        let display_name = source
            .file_stem()
            .unwrap_or(file_name)
            .to_string_lossy()
            .into_owned();
        let item = MediaItem::new(display_name, source, &destination);

        let thumbnail_path = paths::thumbnail_path(&self.media_root, &item.id);
        let ticket = match self
            .thumbnails
            .enqueue(ThumbnailJob::new(&destination, &thumbnail_path))
        {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                warn!(id = %item.id, error = %e, "Could not enqueue thumbnail, continuing without");
                None
            }
        };
        tracker.advance(ItemState::ThumbnailEnqueued);

        if let Err(e) = self.catalog.add(&item) {
            // Keep the media folder free of untracked copies
            log_cleanup(&destination, delete_file_best_effort(&destination));
            tracker.advance(ItemState::Failed);
            return ItemResult::Failed(e.to_string(), ticket);
        }
        tracker.advance(ItemState::Imported);

        ItemResult::Imported(item, ticket)
    }

    /// Record the thumbnail on the row and item if generation succeeded
    async fn apply_thumbnail(&self, item: &mut MediaItem, ticket: ThumbnailTicket) {
        let Some(outcome) = ticket.outcome().await else {
            return;
        };

        if let ThumbnailOutcome::Generated { output_path, .. } = outcome {
            match self.catalog.set_thumbnail(&item.id, &output_path) {
                Ok(true) => item.thumbnail_path = Some(output_path),
                Ok(false) => debug!(id = %item.id, "Item removed before thumbnail was recorded"),
                Err(e) => warn!(id = %item.id, error = %e, "Could not record thumbnail"),
            }
        }
    }

    fn emit(&self, total: usize, processed: usize, current: Option<&Path>, stage: ImportStage) {
        // No subscribers is fine
        let _ = self.progress.send(ImportProgress {
            total,
            processed,
            current_path: current.map(Path::to_path_buf),
            stage,
        });
    }
}

/// Remove a thumbnail generated for an item that was never cataloged
async fn discard_thumbnail(ticket: ThumbnailTicket) {
    if let Some(ThumbnailOutcome::Generated { output_path, .. }) = ticket.outcome().await {
        log_cleanup(&output_path, delete_file_best_effort(&output_path));
    }
}

fn log_cleanup(path: &Path, result: io::Result<bool>) {
    match result {
        Ok(true) => debug!(path = %path.display(), "Deleted discarded file"),
        Ok(false) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not delete discarded file"),
    }
}

/// Exists, has a supported extension, and can be opened for reading
pub async fn is_valid_for_import(path: &Path) -> bool {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return false,
    }

    if !paths::has_supported_extension(path) {
        return false;
    }

    match File::open(path).await {
        Ok(_) => true,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Source not readable");
            false
        }
    }
}

/// First free name among `name`, `name (1)`, … `name (999)`, then
/// `name_<8 random hex>`. A name is free when nothing exists on disk and
/// `reserved` does not claim it.
pub fn unique_destination(
    dir: &Path,
    file_name: &OsStr,
    reserved: impl Fn(&Path) -> bool,
) -> PathBuf {
    let is_free = |candidate: &Path| !candidate.exists() && !reserved(candidate);

    let candidate = dir.join(file_name);
    if is_free(&candidate) {
        return candidate;
    }

    let original = Path::new(file_name);
    let stem = original.file_stem().unwrap_or(file_name);
    let extension = original.extension();

    let with_suffix = |suffix: &str| -> PathBuf {
        let mut name = OsString::from(stem);
        name.push(suffix);
        if let Some(ext) = extension {
            name.push(".");
            name.push(ext);
        }
        dir.join(name)
    };

    for counter in 1..=MAX_NUMBERED_ATTEMPTS {
        let candidate = with_suffix(&format!(" ({counter})"));
        if is_free(&candidate) {
            return candidate;
        }
    }

    let random = Uuid::new_v4().simple().to_string();
    with_suffix(&format!("_{}", &random[..8]))
}

/// Copy `source` to a new file at `destination`; never overwrites.
/// A partially written destination is removed on failure.
async fn copy_no_overwrite(source: &Path, destination: &Path) -> io::Result<u64> {
    let mut reader = File::open(source).await?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .await?;

    let copied = async {
        let bytes = tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await?;
        writer.sync_all().await?;
        Ok::<_, io::Error>(bytes)
    }
    .await;

    match copied {
        Ok(bytes) => {
            debug!(from = %source.display(), to = %destination.display(), bytes, "Copied file");
            Ok(bytes)
        }
        Err(e) => {
            drop(writer);
            log_cleanup(destination, delete_file_best_effort(destination));
            Err(e)
        }
    }
}
