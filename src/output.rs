use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::manifest::ProcessedFile;
use crate::planner::Segment;
use crate::transcription::SRTGenerator;
use crate::video::VideoProcessor;

/// Files produced for one planned segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrittenSegment {
    pub index: usize,
    pub video: PathBuf,
    pub srt: PathBuf,
    pub range_start: f64,
    pub range_end: f64,
}

impl WrittenSegment {
    /// Manifest record with paths relative to `base_dir`
    pub fn to_processed_file(&self, base_dir: &Path) -> ProcessedFile {
        ProcessedFile {
            video: relative_to(&self.video, base_dir),
            srt: relative_to(&self.srt, base_dir),
            range_start: self.range_start,
            range_end: self.range_end,
        }
    }
}

/// Writes one video clip and one subtitle file per planned segment
#[derive(Debug, Clone)]
pub struct SegmentWriter {
    video_processor: VideoProcessor,
}

impl SegmentWriter {
    pub fn new(video_processor: VideoProcessor) -> Self {
        Self { video_processor }
    }

    /// Cut every segment out of `video_path` into `output_dir` as `<stem>_part<N>.mp4/.srt`
    pub async fn write_segments(
        &self,
        video_path: &Path,
        segments: &[Segment],
        output_dir: &Path,
        stem: &str,
    ) -> Result<Vec<WrittenSegment>> {
        tokio::fs::create_dir_all(output_dir).await?;

        let extension = video_path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp4");

        info!("✂️ Splitting video into {} parts", segments.len());

        let mut written = Vec::with_capacity(segments.len());
        for segment in segments {
            if segment.range_duration().is_zero() {
                warn!("⚠️ Part {} has no media to cut, skipping", segment.index);
                continue;
            }

            let clip_path = output_dir.join(format!("{}_part{}.{}", stem, segment.index, extension));
            self.video_processor
                .extract_clip(video_path, segment.range_start, segment.range_end, &clip_path)
                .await
                .with_context(|| format!("Failed to cut part {}", segment.index))?;

            let srt_path = output_dir.join(format!("{}_part{}.srt", stem, segment.index));
            write_subtitles(segment, &srt_path).await?;

            written.push(WrittenSegment {
                index: segment.index,
                video: clip_path,
                srt: srt_path,
                range_start: segment.range_start.as_secs_f64(),
                range_end: segment.range_end.as_secs_f64(),
            });
        }

        Ok(written)
    }
}

/// Write the segment's re-timed cues as an SRT file
pub async fn write_subtitles(segment: &Segment, srt_path: &Path) -> Result<()> {
    let generator = SRTGenerator::from_cues(&segment.cues);
    for issue in generator.validate() {
        warn!("⚠️ {}: {}", srt_path.display(), issue);
    }

    generator
        .save_to_file(srt_path)
        .await
        .with_context(|| format!("Failed to write {}", srt_path.display()))?;

    info!("📄 Generated SRT: {} ({} lines)", srt_path.display(), generator.len());
    Ok(())
}

fn relative_to(path: &Path, base_dir: &Path) -> PathBuf {
    path.strip_prefix(base_dir).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Cue;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_subtitles_uses_segment_relative_times() {
        let temp_dir = TempDir::new().unwrap();
        let srt_path = temp_dir.path().join("lesson_part2.srt");

        let segment = Segment {
            index: 2,
            core_start: Duration::from_secs(295),
            core_end: Duration::from_secs(595),
            range_start: Duration::from_secs(280),
            range_end: Duration::from_secs(610),
            cues: vec![Cue::new(Duration::from_secs(15), Duration::from_secs(25), "你好")],
        };

        write_subtitles(&segment, &srt_path).await.unwrap();
        let content = tokio::fs::read_to_string(&srt_path).await.unwrap();

        assert_eq!(content, "1\n00:00:15,000 --> 00:00:25,000\n你好\n\n");
    }

    #[tokio::test]
    async fn test_empty_ranges_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let writer = SegmentWriter::new(VideoProcessor::new(Default::default()));

        // A zero-length range never reaches FFmpeg
        let segment = Segment {
            index: 1,
            core_start: Duration::ZERO,
            core_end: Duration::ZERO,
            range_start: Duration::ZERO,
            range_end: Duration::ZERO,
            cues: Vec::new(),
        };

        let written = writer
            .write_segments(Path::new("missing.mp4"), &[segment], temp_dir.path(), "lesson")
            .await
            .unwrap();

        assert!(written.is_empty());
        assert!(!temp_dir.path().join("lesson_part1.srt").exists());
    }

    #[test]
    fn test_processed_file_paths_are_relative() {
        let base = Path::new("/project");
        let written = WrittenSegment {
            index: 1,
            video: PathBuf::from("/project/playlists/p/processed/a_part1.mp4"),
            srt: PathBuf::from("/elsewhere/a_part1.srt"),
            range_start: 0.0,
            range_end: 310.0,
        };

        let file = written.to_processed_file(base);
        assert_eq!(file.video, PathBuf::from("playlists/p/processed/a_part1.mp4"));
        assert_eq!(file.srt, PathBuf::from("/elsewhere/a_part1.srt"));
        assert_eq!(file.range_end, 310.0);
    }
}
