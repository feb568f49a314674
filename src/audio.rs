use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

use crate::config::TranscriptionConfig;
use crate::tools;

/// A piece of audio to upload, and where it starts in the full recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioChunk {
    pub path: PathBuf,
    pub offset: Duration,
}

/// Fetches the audio track for transcription and splits it to fit the API upload limit
#[derive(Debug, Clone)]
pub struct AudioPreparer {
    /// Largest file uploaded without splitting
    pub max_upload_bytes: u64,
    /// Length of each chunk when splitting
    pub chunk_duration: Duration,
}

impl AudioPreparer {
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            max_upload_bytes: config.max_upload_mb * 1024 * 1024,
            chunk_duration: Duration::from_secs(config.chunk_secs),
        }
    }

    /// Download the best available audio track as MP3
    pub async fn download_audio(&self, url: &str, output_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir).await?;

        info!("🎧 Downloading audio for transcription...");

        let mut command = Command::new("yt-dlp");
        command
            .args(["--extract-audio", "--audio-format", "mp3", "--audio-quality", "0"])
            .args(["--format", "bestaudio"])
            .arg("--output")
            .arg(output_dir.join("%(title)s.%(ext)s"))
            .arg(url);

        tools::run(&mut command, "yt-dlp audio download").await?;

        tools::newest_with_extension(output_dir, "mp3")
            .ok_or_else(|| anyhow!("yt-dlp finished but no .mp3 file appeared in {}", output_dir.display()))
    }

    /// Return the file as a single chunk, or split it with FFmpeg when it is too large to upload
    pub async fn split_if_needed(&self, audio_path: &Path) -> Result<Vec<AudioChunk>> {
        let file_size = tokio::fs::metadata(audio_path).await?.len();
        info!("📊 Audio size: {:.1}MB", file_size as f64 / (1024.0 * 1024.0));

        if file_size <= self.max_upload_bytes {
            info!("🎯 Direct transcription (small file)");
            return Ok(vec![AudioChunk {
                path: audio_path.to_path_buf(),
                offset: Duration::ZERO,
            }]);
        }

        info!("📏 Splitting large audio file...");
        let chunk_dir = audio_path
            .parent()
            .unwrap_or(Path::new("."))
            .join("chunks");
        tokio::fs::create_dir_all(&chunk_dir).await?;

        let mut command = Command::new("ffmpeg");
        command
            .args(["-v", "error", "-y", "-i"])
            .arg(audio_path)
            .args(["-f", "segment", "-segment_time"])
            .arg(self.chunk_duration.as_secs().to_string())
            .args(["-c", "copy"])
            .arg(chunk_dir.join("chunk_%03d.mp3"));

        tools::run(&mut command, "ffmpeg audio split").await?;

        let chunks = self.chunks_in(&chunk_dir);
        if chunks.is_empty() {
            return Err(anyhow!("ffmpeg produced no audio chunks in {}", chunk_dir.display()));
        }

        info!("✂️ Created {} audio chunks", chunks.len());
        Ok(chunks)
    }

    /// Chunk files in name order, each offset by its position times the chunk length
    fn chunks_in(&self, chunk_dir: &Path) -> Vec<AudioChunk> {
        tools::files_with_extension(chunk_dir, "mp3")
            .into_iter()
            .enumerate()
            .map(|(i, path)| AudioChunk {
                path,
                offset: self.chunk_duration * i as u32,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_small_file_is_single_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let audio_path = temp_dir.path().join("lesson.mp3");
        tokio::fs::write(&audio_path, vec![0u8; 1024]).await.unwrap();

        let preparer = AudioPreparer::new(&TranscriptionConfig::default());
        let chunks = preparer.split_if_needed(&audio_path).await.unwrap();

        assert_eq!(chunks, vec![AudioChunk { path: audio_path, offset: Duration::ZERO }]);
    }

    #[test]
    fn test_chunk_offsets_follow_name_order() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["chunk_001.mp3", "chunk_000.mp3", "chunk_002.mp3"] {
            std::fs::write(temp_dir.path().join(name), b"x").unwrap();
        }

        let preparer = AudioPreparer::new(&TranscriptionConfig::default());
        let chunks = preparer.chunks_in(temp_dir.path());

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].path.ends_with("chunk_000.mp3"));
        assert_eq!(chunks[0].offset, Duration::ZERO);
        assert_eq!(chunks[2].offset, Duration::from_secs(600));
    }
}
