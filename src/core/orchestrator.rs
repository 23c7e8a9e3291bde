//! Library orchestrator.
//!
//! The only mutation path for the library. Each operation delegates to the
//! catalog or the import coordinator, publishes a change event on success, and
//! sends exactly one notification describing the outcome. Errors from lower
//! layers end here: they are logged and turned into error notifications.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{
    FrameExtractor, Notification, NotificationScenario, NotificationSink, Severity,
};
use crate::config::ResolvedConfig;
use crate::domain::{ImportProgress, LibraryEvent, MediaId, MediaItem};
use crate::ingest::{ImportCoordinator, ThumbnailQueue};
use crate::library::{CatalogStore, SettingsStore};

/// Buffered change events per subscriber
const EVENT_CAPACITY: usize = 256;

/// Single entry point for importing, removing and choosing the default video
pub struct LibraryOrchestrator {
    catalog: Arc<CatalogStore>,
    importer: ImportCoordinator,
    thumbnails: Arc<ThumbnailQueue>,
    notifier: Arc<dyn NotificationSink>,
    events: broadcast::Sender<LibraryEvent>,
}

impl LibraryOrchestrator {
    /// Assemble an orchestrator from already-built parts
    pub fn new(
        catalog: Arc<CatalogStore>,
        thumbnails: Arc<ThumbnailQueue>,
        notifier: Arc<dyn NotificationSink>,
        media_root: impl Into<PathBuf>,
    ) -> Self {
        let importer = ImportCoordinator::new(catalog.clone(), thumbnails.clone(), media_root);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            catalog,
            importer,
            thumbnails,
            notifier,
            events,
        }
    }

    /// Open the on-disk catalog described by `config` and start the
    /// thumbnail worker. Must be called inside a Tokio runtime.
    pub fn open(
        config: &ResolvedConfig,
        extractor: Arc<dyn FrameExtractor>,
        notifier: Arc<dyn NotificationSink>,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self> {
        let db_path = config.database_path();
        let catalog = CatalogStore::open(&db_path, settings)
            .with_context(|| format!("Failed to open catalog: {}", db_path.display()))?;
        let thumbnails = ThumbnailQueue::new(extractor, config.thumbnails.clone());

        info!(db = %db_path.display(), media = %config.media.display(), "Library opened");
        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(thumbnails),
            notifier,
            &config.media,
        ))
    }

    /// Receive change events raised after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// Receive import progress for batches started after this call
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ImportProgress> {
        self.importer.subscribe()
    }

    /// Thumbnail queue backing imports
    pub fn thumbnails(&self) -> &ThumbnailQueue {
        &self.thumbnails
    }

    /// Import a batch of source files. Returns only the items cataloged.
    #[instrument(skip(self, sources), fields(count = sources.len()))]
    pub async fn import_videos(&self, sources: &[PathBuf]) -> Vec<MediaItem> {
        info!("Import {} file(s)", sources.len());

        match self.importer.import(sources).await {
            Ok(items) if !items.is_empty() => {
                let message = format!("Imported {} video(s)", items.len());
                info!("{}", message);

                self.publish(LibraryEvent::Imported {
                    items: items.clone(),
                });
                self.send(
                    message,
                    NotificationScenario::ImportSuccess,
                    Severity::Success,
                )
                .await;
                items
            }
            Ok(items) => {
                warn!("No videos imported (invalid or duplicate)");
                self.send(
                    "No videos were imported (invalid or duplicate)",
                    NotificationScenario::ImportError,
                    Severity::Warning,
                )
                .await;
                items
            }
            Err(e) => {
                error!(error = %e, "Import failed");
                self.send(
                    format!("Import failed: {}", e),
                    NotificationScenario::ImportError,
                    Severity::Error,
                )
                .await;
                Vec::new()
            }
        }
    }

    /// Remove a video, its files, and its catalog row
    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn remove_video(&self, id: &MediaId) -> Option<MediaItem> {
        info!("Remove video");

        let removed = match self.catalog.get_by_id(id) {
            Ok(Some(_)) => self.catalog.remove(id),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        match removed {
            Ok(Some(item)) => {
                info!(name = %item.display_name, "Removed");
                self.publish(LibraryEvent::Removed {
                    id: item.id.clone(),
                    name: item.display_name.clone(),
                });
                self.send(
                    format!("Removed: {}", item.display_name),
                    NotificationScenario::RemoveSuccess,
                    Severity::Success,
                )
                .await;
                Some(item)
            }
            Ok(None) => {
                warn!("Video not found");
                self.send(
                    "Video not found",
                    NotificationScenario::RemoveError,
                    Severity::Error,
                )
                .await;
                None
            }
            Err(e) => {
                error!(error = %e, "Remove failed");
                self.send(
                    format!("Failed to remove: {}", e),
                    NotificationScenario::RemoveError,
                    Severity::Error,
                )
                .await;
                None
            }
        }
    }

    /// Point the default video at `id`
    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn set_default_video(&self, id: &MediaId) -> Option<MediaItem> {
        info!("Set default video");

        let video = match self.catalog.get_by_id(id) {
            Ok(Some(video)) => video,
            Ok(None) => {
                warn!("Video not found");
                self.send(
                    "Video not found",
                    NotificationScenario::DefaultVideoError,
                    Severity::Error,
                )
                .await;
                return None;
            }
            Err(e) => {
                self.default_failed(e).await;
                return None;
            }
        };

        if let Err(e) = self.catalog.set_default(Some(&video.id)) {
            self.default_failed(e).await;
            return None;
        }

        info!(name = %video.display_name, "Default set");
        self.publish(LibraryEvent::DefaultChanged {
            id: video.id.clone(),
            name: video.display_name.clone(),
        });
        self.send(
            format!("Default set: {}", video.display_name),
            NotificationScenario::DefaultVideoSet,
            Severity::Success,
        )
        .await;
        Some(video)
    }

    /// Drop rows whose stored file has disappeared. Raises a `Removed` event
    /// per row; sends no notification.
    #[instrument(skip(self))]
    pub async fn cleanup_orphaned(&self) -> Vec<MediaItem> {
        match self.catalog.cleanup_orphaned() {
            Ok(orphans) => {
                if !orphans.is_empty() {
                    info!(count = orphans.len(), "Removed orphaned catalog rows");
                }
                for item in &orphans {
                    self.publish(LibraryEvent::Removed {
                        id: item.id.clone(),
                        name: item.display_name.clone(),
                    });
                }
                orphans
            }
            Err(e) => {
                error!(error = %e, "Orphan cleanup failed");
                Vec::new()
            }
        }
    }

    /// All videos, newest first
    pub fn list_videos(&self) -> Vec<MediaItem> {
        self.catalog.get_all().unwrap_or_else(|e| {
            error!(error = %e, "Failed to list videos");
            Vec::new()
        })
    }

    pub fn get_video(&self, id: &MediaId) -> Option<MediaItem> {
        self.catalog.get_by_id(id).unwrap_or_else(|e| {
            error!(%id, error = %e, "Failed to load video");
            None
        })
    }

    /// The video the default pointer references, if any
    pub fn default_video(&self) -> Option<MediaItem> {
        self.catalog.get_default().unwrap_or_else(|e| {
            error!(error = %e, "Failed to load default video");
            None
        })
    }

    async fn default_failed(&self, e: impl std::fmt::Display) {
        error!(error = %e, "Set default failed");
        self.send(
            format!("Failed to set default: {}", e),
            NotificationScenario::DefaultVideoError,
            Severity::Error,
        )
        .await;
    }

    fn publish(&self, event: LibraryEvent) {
        if self.events.send(event).is_err() {
            debug!("No library event subscribers");
        }
    }

    async fn send(
        &self,
        message: impl Into<String>,
        scenario: NotificationScenario,
        severity: Severity,
    ) {
        self.notifier
            .notify(Notification::new(message, scenario, severity))
            .await;
    }
}
