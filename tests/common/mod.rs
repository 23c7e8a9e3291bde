//! Shared stubs and fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use vidshelf::adapters::{FrameExtractor, Notification, NotificationSink};
use vidshelf::config::{ResolvedConfig, ThumbnailSettings};
use vidshelf::library::{MemorySettings, SettingsStore};
use vidshelf::LibraryOrchestrator;

/// Millisecond-scale thumbnail policy
pub fn fast_settings() -> ThumbnailSettings {
    ThumbnailSettings {
        timeout_ms: 500,
        max_attempts: 2,
        retry_delay_ms: 10,
        poll_interval_ms: 5,
    }
}

/// Writes a fake JPEG, records call order, and tracks how many calls overlap
#[derive(Default)]
pub struct RecordingExtractor {
    pub delay: Duration,
    pub calls: Mutex<Vec<PathBuf>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl RecordingExtractor {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameExtractor for RecordingExtractor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn extract(&self, video: &Path, output: &Path, _: Option<Duration>) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(video.to_path_buf());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, b"\xFF\xD8\xFF\xD9")?;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails every call
#[derive(Default)]
pub struct FailingExtractor {
    pub calls: AtomicU32,
}

impl FailingExtractor {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameExtractor for FailingExtractor {
    fn name(&self) -> &str {
        "failing"
    }

    async fn extract(&self, _: &Path, _: &Path, _: Option<Duration>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("decoder exploded")
    }
}

/// Never finishes on its own
#[derive(Default)]
pub struct HangingExtractor {
    pub calls: AtomicU32,
}

#[async_trait]
impl FrameExtractor for HangingExtractor {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn extract(&self, _: &Path, _: &Path, _: Option<Duration>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Keeps every notification it receives
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

/// A library rooted in a temp dir plus a directory of source files
pub struct Fixture {
    pub temp: TempDir,
    pub config: ResolvedConfig,
    pub settings: Arc<MemorySettings>,
    pub notifier: Arc<RecordingNotifier>,
    pub library: LibraryOrchestrator,
}

impl Fixture {
    pub fn new(extractor: Arc<dyn FrameExtractor>) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = ResolvedConfig::with_home(temp.path().join("home"));
        config.thumbnails = fast_settings();

        let settings = Arc::new(MemorySettings::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let library = LibraryOrchestrator::open(
            &config,
            extractor,
            notifier.clone(),
            settings.clone() as Arc<dyn SettingsStore>,
        )
        .unwrap();

        Self {
            temp,
            config,
            settings,
            notifier,
            library,
        }
    }

    /// Write a source file at `<temp>/sources/<relative>`
    pub fn source(&self, relative: &str) -> PathBuf {
        let path = self.temp.path().join("sources").join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, format!("video data for {}", relative)).unwrap();
        path
    }

    pub fn media(&self) -> &Path {
        &self.config.media
    }
}

/// Panics on the first `panics` calls, then writes a fake JPEG
#[derive(Default)]
pub struct PanickingExtractor {
    pub panics: u32,
    pub calls: AtomicU32,
}

#[async_trait]
impl FrameExtractor for PanickingExtractor {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn extract(&self, _: &Path, output: &Path, _: Option<Duration>) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.panics {
            panic!("extractor bug on call {}", call + 1);
        }
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, b"\xFF\xD8\xFF\xD9")?;
        Ok(())
    }
}
