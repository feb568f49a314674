use anyhow::{anyhow, Context, Result};
use clap::{ArgGroup, Parser};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zh_video_processor::config::Config;
use zh_video_processor::manifest::{ManifestStore, VideoEntry, VideoStatus};
use zh_video_processor::video::VideoProcessor;

#[derive(Parser)]
#[command(name = "add-videos")]
#[command(about = "Add videos to the processing manifest")]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .args(["video", "videos", "status", "retry_failed"])
))]
struct Cli {
    /// Playlist ID/name
    #[arg(long, required_unless_present = "status")]
    playlist: Option<String>,

    /// Playlist display title (defaults to the playlist ID)
    #[arg(long)]
    title: Option<String>,

    /// Single video URL
    #[arg(long)]
    video: Option<String>,

    /// Video URLs or text files with one URL per line
    #[arg(long, num_args = 1..)]
    videos: Vec<String>,

    /// Show current manifest status
    #[arg(long)]
    status: bool,

    /// Put failed videos in the playlist back in the queue
    #[arg(long)]
    retry_failed: bool,

    /// Project directory holding manifest.json
    #[arg(long)]
    base_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Some(path) = Config::locate() {
        info!("📄 Loaded configuration from: {}", path.display());
    }
    let mut config = Config::load()?;
    if let Some(base_dir) = cli.base_dir.clone() {
        config.output.base_dir = base_dir;
    }
    let store = ManifestStore::new(&config.output.base_dir);

    if cli.status {
        return show_status(&store).await;
    }

    let playlist_id = cli
        .playlist
        .as_deref()
        .ok_or_else(|| anyhow!("--playlist is required"))?;

    if cli.retry_failed {
        let reset = store.reset_failed(Some(playlist_id)).await?;
        info!("🔄 Reset {} failed videos in '{}' to pending", reset, playlist_id);
        return Ok(());
    }

    let playlist_title = cli
        .title
        .clone()
        .unwrap_or_else(|| default_title(playlist_id));

    let sources: Vec<String> = match cli.video {
        Some(video) => vec![video],
        None => cli.videos,
    };

    let processor = VideoProcessor::new(config.download.clone());
    let mut entries = Vec::new();

    for source in &sources {
        let path = Path::new(source);
        if path.is_file() {
            info!("📄 Reading videos from: {}", source);
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", source))?;
            for url in urls_in(&content) {
                entries.push(new_entry(&processor, url, config.split.default_splits).await);
            }
        } else if url::Url::parse(source).is_ok() {
            entries.push(new_entry(&processor, source, config.split.default_splits).await);
        } else {
            warn!("⚠️ Skipping {}: not a file or a URL", source);
        }
    }

    let total = store.add_videos(playlist_id, &playlist_title, entries).await?;

    info!("✅ Playlist '{}' now has {} videos", playlist_title, total);
    info!("💡 Next step: zh-video-processor process 2  # Process 2 videos");
    Ok(())
}

async fn new_entry(processor: &VideoProcessor, url: &str, splits: u32) -> VideoEntry {
    let title = processor.fetch_title(url).await;
    info!("✅ Added: {}", title);
    VideoEntry::new(url, title, splits)
}

async fn show_status(store: &ManifestStore) -> Result<()> {
    let manifest = store.load().await?;

    if manifest.playlists.is_empty() {
        info!("📋 No playlists in manifest");
        return Ok(());
    }

    info!("📋 Current Manifest Status:");
    for summary in manifest.status_summary() {
        info!("📁 {} ({})", summary.title, summary.playlist_id);
        for status in VideoStatus::ALL {
            if let Some(count) = summary.counts.get(&status) {
                info!("   {} {}: {}", status.emoji(), status, count);
            }
        }
        info!("   📊 Total: {} videos", summary.total);
    }

    Ok(())
}

/// `hsk_level_1` -> `Hsk Level 1`
fn default_title(playlist_id: &str) -> String {
    let mut title = String::with_capacity(playlist_id.len());
    let mut previous_is_letter = false;

    for c in playlist_id.replace('_', " ").chars() {
        if previous_is_letter {
            title.extend(c.to_lowercase());
        } else {
            title.extend(c.to_uppercase());
        }
        previous_is_letter = c.is_alphabetic();
    }

    title
}

/// URLs listed one per line, skipping blanks and `#` comments
fn urls_in(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_title() {
        assert_eq!(default_title("hsk_level_1"), "Hsk Level 1");
        assert_eq!(default_title("CHINESE_grammar"), "Chinese Grammar");
        assert_eq!(default_title("中文_basics"), "中文 Basics");
    }

    #[test]
    fn test_urls_in_skips_comments_and_blanks() {
        let content = "# lesson list\nhttps://youtu.be/aaaaaaaaaaa\n\n  https://youtu.be/bbbbbbbbbbb  \n#https://youtu.be/ccccccccccc\n";
        assert_eq!(
            urls_in(content),
            vec!["https://youtu.be/aaaaaaaaaaa", "https://youtu.be/bbbbbbbbbbb"]
        );
    }

    #[test]
    fn test_input_sources_are_exclusive() {
        let result = Cli::try_parse_from([
            "add-videos",
            "--playlist",
            "hsk1",
            "--video",
            "https://youtu.be/aaaaaaaaaaa",
            "--status",
        ]);
        assert!(result.is_err());

        let result = Cli::try_parse_from(["add-videos", "--status"]);
        assert!(result.is_ok());
    }
}
