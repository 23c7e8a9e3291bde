//! Command-line interface for vidshelf.
//!
//! Provides commands for importing and removing videos, listing the library,
//! and managing the default video. Every command that touches the library
//! reconciles the catalog with the media folder first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{FfmpegExtractor, LogNotifier};
use crate::config::{self, ResolvedConfig};
use crate::core::LibraryOrchestrator;
use crate::domain::{ImportProgress, ImportStage, MediaId, MediaItem};
use crate::library::JsonFileSettings;

/// vidshelf - managed video library with background thumbnails
#[derive(Parser, Debug)]
#[command(name = "vidshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import video files into the library
    Import {
        /// Video files to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List videos in the library
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a video and its files
    Remove {
        /// Video ID
        id: String,
    },

    /// Make a video the default
    SetDefault {
        /// Video ID
        id: String,
    },

    /// Show the default video
    Default,

    /// Drop catalog entries whose file has disappeared
    Cleanup,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        if let Commands::Config = self.command {
            return show_config();
        }

        let cfg = config::config()?;
        let library = open_library(cfg)?;
        let orphans = library.cleanup_orphaned().await;

        match self.command {
            Commands::Import { paths } => import(&library, paths).await,
            Commands::List { json } => list(&library, json),
            Commands::Remove { id } => remove(&library, &id).await,
            Commands::SetDefault { id } => set_default(&library, &id).await,
            Commands::Default => show_default(&library),
            Commands::Cleanup => {
                report_cleanup(&orphans);
                Ok(())
            }
            Commands::Config => Ok(()),
        }
    }
}

/// Open the library with the ffmpeg extractor and log notifications
fn open_library(cfg: &ResolvedConfig) -> Result<LibraryOrchestrator> {
    let settings = JsonFileSettings::open(cfg.settings_path())?;

    LibraryOrchestrator::open(
        cfg,
        Arc::new(FfmpegExtractor::new(cfg.ffmpeg.clone())),
        Arc::new(LogNotifier::new()),
        Arc::new(settings),
    )
}

/// Import files, printing progress as it arrives
async fn import(library: &LibraryOrchestrator, paths: Vec<PathBuf>) -> Result<()> {
    let sources = paths
        .iter()
        .map(|p| absolute_path(p))
        .collect::<Result<Vec<_>>>()?;

    let mut progress = library.subscribe_progress();
    let batch = library.import_videos(&sources);
    tokio::pin!(batch);

    let items = loop {
        tokio::select! {
            items = &mut batch => break items,
            update = progress.recv() => {
                if let Ok(update) = update {
                    print_progress(&update);
                }
            }
        }
    };
    while let Ok(update) = progress.try_recv() {
        print_progress(&update);
    }

    if items.is_empty() {
        std::process::exit(1);
    }

    println!();
    for item in &items {
        let thumb = if item.thumbnail().is_some() { "" } else { " (no thumbnail)" };
        println!("{}  {}{}", item.id, item.display_name, thumb);
    }

    Ok(())
}

fn print_progress(update: &ImportProgress) {
    if update.stage.is_item_terminal() {
        eprintln!("[{}/{}] {}", update.processed, update.total, update.message());
    } else if matches!(update.stage, ImportStage::GeneratingThumbnails) {
        eprintln!("{}", update.message());
    }
}

/// List the library, newest first
fn list(library: &LibraryOrchestrator, json: bool) -> Result<()> {
    let items = library.list_videos();

    if json {
        let out = serde_json::to_string_pretty(&items).context("Failed to serialize library")?;
        println!("{}", out);
        return Ok(());
    }

    if items.is_empty() {
        println!("Library is empty. Use 'vidshelf import <file>' to add videos.");
        return Ok(());
    }

    let default_id = library.default_video().map(|item| item.id);

    println!("{:<38} {:<17} {:<6} {:<40}", "ID", "ADDED", "THUMB", "NAME");
    println!("{}", "-".repeat(100));

    for item in &items {
        let marker = if default_id.as_ref() == Some(&item.id) { " *" } else { "" };
        let name = truncate(&item.display_name, 37);
        println!(
            "{:<38} {:<17} {:<6} {}{}",
            item.id.as_str(),
            item.date_added.format("%Y-%m-%d %H:%M"),
            if item.thumbnail().is_some() { "yes" } else { "no" },
            name,
            marker
        );
    }

    println!("\nTotal: {} videos", items.len());

    Ok(())
}

async fn remove(library: &LibraryOrchestrator, id: &str) -> Result<()> {
    match library.remove_video(&MediaId::from(id)).await {
        Some(item) => {
            println!("Removed {} ({})", item.display_name, item.id);
            Ok(())
        }
        None => std::process::exit(1),
    }
}

async fn set_default(library: &LibraryOrchestrator, id: &str) -> Result<()> {
    match library.set_default_video(&MediaId::from(id)).await {
        Some(item) => {
            println!("Default video: {} ({})", item.display_name, item.id);
            Ok(())
        }
        None => std::process::exit(1),
    }
}

fn show_default(library: &LibraryOrchestrator) -> Result<()> {
    match library.default_video() {
        Some(item) => print_item(&item),
        None => println!("No default video set"),
    }
    Ok(())
}

fn report_cleanup(orphans: &[MediaItem]) {
    if orphans.is_empty() {
        println!("Catalog is consistent, nothing to clean up");
        return;
    }

    for item in orphans {
        println!("Removed orphan: {} ({})", item.display_name, item.stored_path.display());
    }
    println!("\nRemoved {} orphaned entries", orphans.len());
}

fn print_item(item: &MediaItem) {
    println!("ID:        {}", item.id);
    println!("Name:      {}", item.display_name);
    println!("Added:     {}", item.date_added);
    println!("Source:    {}", item.original_source_path.display());
    println!("Stored:    {}", item.stored_path.display());
    match item.thumbnail() {
        Some(path) => println!("Thumbnail: {}", path.display()),
        None => println!("Thumbnail: (none)"),
    }
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("vidshelf configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Media:     {}", cfg.media.display());
    println!("  Catalog:   {}", cfg.database_path().display());
    println!("  Settings:  {}", cfg.settings_path().display());
    println!();
    println!("Thumbnails:");
    println!("  Timeout:       {}ms", cfg.thumbnails.timeout_ms);
    println!("  Max attempts:  {}", cfg.thumbnails.max_attempts);
    println!("  Retry delay:   {}ms", cfg.thumbnails.retry_delay_ms);
    println!("  Size:          {}x{}", cfg.ffmpeg.width, cfg.ffmpeg.height);
    println!("  ffmpeg:        {}", cfg.ffmpeg.ffmpeg_path);

    Ok(())
}

/// Resolve relative paths against the working directory without requiring
/// the file to exist (missing files are reported by the importer)
fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    Ok(cwd.join(path))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
