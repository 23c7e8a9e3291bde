//! FFmpeg frame extractor.
//!
//! Shells out to the `ffmpeg` CLI (and `ffprobe` when the duration is not
//! known). Children are spawned with `kill_on_drop`, so the queue's timeout
//! cancels a hung extraction.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::FrameExtractor;
use crate::config::FfmpegSettings;

/// Fraction of the video to seek into before grabbing a frame
const SEEK_FRACTION: f64 = 0.05;

/// Earliest capture point when the duration allows it
const MIN_SEEK: Duration = Duration::from_secs(1);

/// Frame extractor backed by the ffmpeg binaries
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    settings: FfmpegSettings,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new(FfmpegSettings::default())
    }
}

impl FfmpegExtractor {
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }

    /// Ask ffprobe for the container duration
    async fn query_duration(&self, video_path: &Path) -> Result<Duration> {
        let output = Command::new(&self.settings.ffprobe_path)
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(video_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run ffprobe on {}", video_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffprobe failed: {}", stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let seconds: f64 = stdout
            .trim()
            .parse()
            .with_context(|| format!("Unexpected ffprobe duration: {:?}", stdout.trim()))?;

        Duration::try_from_secs_f64(seconds).context("ffprobe reported an invalid duration")
    }

    /// Grab one frame at `at` and write it as a scaled JPEG
    async fn capture(&self, video_path: &Path, output_path: &Path, at: Duration) -> Result<()> {
        let scale = format!("scale={}:{}", self.settings.width, self.settings.height);

        let output = Command::new(&self.settings.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-ss")
            .arg(format!("{:.3}", at.as_secs_f64()))
            .arg("-i")
            .arg(video_path)
            .args(["-frames:v", "1", "-vf", &scale, "-q:v", "3"])
            .arg(output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn ffmpeg for {}", video_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!("ffmpeg exited with code {}: {}", exit_code, stderr.trim());
        }

        if !output_path.exists() {
            anyhow::bail!("ffmpeg produced no frame at {:?}", at);
        }

        Ok(())
    }
}

/// Capture point: 5% into the video, at least 1s, never past the end
pub fn seek_offset(duration: Option<Duration>) -> Duration {
    match duration {
        Some(d) if !d.is_zero() => d.mul_f64(SEEK_FRACTION).max(MIN_SEEK).min(d),
        _ => MIN_SEEK,
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn extract(
        &self,
        video_path: &Path,
        output_path: &Path,
        duration: Option<Duration>,
    ) -> Result<()> {
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let duration = match duration {
            Some(d) if !d.is_zero() => Some(d),
            _ => match self.query_duration(video_path).await {
                Ok(d) => Some(d),
                Err(e) => {
                    debug!(error = %e, "Duration probe failed, using default offset");
                    None
                }
            },
        };

        let primary = seek_offset(duration);
        let mut last_error = match self.capture(video_path, output_path, primary).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        // Short or oddly muxed files often fail at the computed offset
        for fallback in [MIN_SEEK, Duration::ZERO] {
            if fallback == primary {
                continue;
            }
            warn!(
                video = %video_path.display(),
                at_ms = fallback.as_millis() as u64,
                error = %last_error,
                "Frame capture failed, trying fallback offset"
            );
            match self.capture(video_path, output_path, fallback).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e,
            }
        }

        Err(last_error.context(format!(
            "Failed to extract a frame from {}",
            video_path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_offset_uses_five_percent() {
        assert_eq!(
            seek_offset(Some(Duration::from_secs(200))),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_seek_offset_minimum_one_second() {
        assert_eq!(seek_offset(Some(Duration::from_secs(10))), MIN_SEEK);
        assert_eq!(seek_offset(None), MIN_SEEK);
        assert_eq!(seek_offset(Some(Duration::ZERO)), MIN_SEEK);
    }

    #[test]
    fn test_seek_offset_never_past_end() {
        let short = Duration::from_millis(400);
        assert_eq!(seek_offset(Some(short)), short);
    }

    #[tokio::test]
    async fn test_missing_binary_fails() {
        let extractor = FfmpegExtractor::new(FfmpegSettings {
            ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
            ffprobe_path: "/nonexistent/ffprobe".to_string(),
            ..Default::default()
        });
        let temp = tempfile::TempDir::new().unwrap();

        let result = extractor
            .extract(
                &temp.path().join("in.mp4"),
                &temp.path().join("thumbs").join("out.jpg"),
                None,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(extractor.name(), "ffmpeg");
    }
}
