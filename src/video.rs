use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::DownloadConfig;
use crate::tools;

/// Downloads, probes and cuts videos using yt-dlp and FFmpeg
#[derive(Debug, Clone)]
pub struct VideoProcessor {
    config: DownloadConfig,
}

impl VideoProcessor {
    pub fn new(config: DownloadConfig) -> Self {
        Self { config }
    }

    /// Download a low-resolution copy of the video, keeping the best audio track
    pub async fn download_video(&self, url: &str, output_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir).await?;

        info!("📥 Downloading: {}", url);

        let mut command = Command::new("yt-dlp");
        command
            .args(["--format", self.config.video_format.as_str()])
            .args(["--merge-output-format", self.config.merge_format.as_str()])
            .arg("--output")
            .arg(output_dir.join("%(title)s.%(ext)s"))
            .arg("--concurrent-fragments")
            .arg(self.config.concurrent_fragments.to_string())
            .arg(url);

        tools::run(&mut command, "yt-dlp video download").await?;

        let video_path = tools::newest_with_extension(output_dir, &self.config.merge_format)
            .ok_or_else(|| anyhow!("yt-dlp finished but no .{} file appeared in {}", self.config.merge_format, output_dir.display()))?;

        info!("✅ Downloaded: {}", file_name(&video_path));
        Ok(video_path)
    }

    /// Media duration as reported by ffprobe
    pub async fn get_duration(&self, video_path: &Path) -> Result<Duration> {
        let mut command = Command::new("ffprobe");
        command
            .args(["-v", "quiet", "-show_entries", "format=duration", "-of", "csv=p=0"])
            .arg(video_path);

        let output = tools::run(&mut command, "ffprobe").await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let seconds: f64 = stdout
            .trim()
            .parse()
            .with_context(|| format!("ffprobe returned no duration for {}", video_path.display()))?;

        Duration::try_from_secs_f64(seconds)
            .with_context(|| format!("ffprobe returned an invalid duration: {}", seconds))
    }

    /// Cut `[start, end]` out of `video_path` into `output_path`.
    ///
    /// By default streams are copied, so the clip starts at the keyframe at or
    /// before `start` and subtitles timed from `start` can lead the picture by up
    /// to one GOP. `accurate_cuts` re-encodes to start on the exact frame.
    pub async fn extract_clip(
        &self,
        video_path: &Path,
        start: Duration,
        end: Duration,
        output_path: &Path,
    ) -> Result<PathBuf> {
        if end <= start {
            return Err(anyhow!(
                "Clip range is empty: {:.3}s -> {:.3}s",
                start.as_secs_f64(),
                end.as_secs_f64()
            ));
        }

        let mut command = self.clip_command(video_path, start, end, output_path);
        tools::run(&mut command, "ffmpeg clip extraction").await?;

        info!("✅ Created: {}", file_name(output_path));
        Ok(output_path.to_path_buf())
    }

    fn clip_command(&self, video_path: &Path, start: Duration, end: Duration, output_path: &Path) -> Command {
        let mut command = Command::new("ffmpeg");
        command
            .args(["-v", "error", "-y"])
            .arg("-ss")
            .arg(format!("{:.3}", start.as_secs_f64()))
            .arg("-i")
            .arg(video_path)
            .arg("-t")
            .arg(format!("{:.3}", (end - start).as_secs_f64()));

        if self.config.accurate_cuts {
            command.args(["-c:v", "libx264", "-preset", "veryfast", "-c:a", "aac"]);
        } else {
            command.args(["-c", "copy", "-avoid_negative_ts", "make_zero"]);
        }

        command.arg(output_path);
        command
    }

    /// Video title from yt-dlp, or a placeholder derived from the URL
    pub async fn fetch_title(&self, url: &str) -> String {
        let mut command = Command::new("yt-dlp");
        command.args(["--print", "title", url]);

        match tools::run(&mut command, "yt-dlp title lookup").await {
            Ok(output) => {
                let title = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !title.is_empty() {
                    return title;
                }
                fallback_title(url)
            }
            Err(e) => {
                warn!("⚠️ Failed to get title for {}: {}", url, e);
                fallback_title(url)
            }
        }
    }
}

/// Extract the 11 character YouTube id from watch, short and embed URLs
pub fn extract_video_id(url: &str) -> Option<String> {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([a-zA-Z0-9_-]{11})").expect("valid regex"),
            Regex::new(r"youtube\.com/embed/([a-zA-Z0-9_-]{11})").expect("valid regex"),
        ]
    });

    patterns
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .map(|captures| captures[1].to_string())
}

fn fallback_title(url: &str) -> String {
    match extract_video_id(url) {
        Some(id) => format!("Video {}", id),
        None => "Unknown Video".to_string(),
    }
}

/// File name without extension, used to name the split parts
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
