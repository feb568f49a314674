use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::audio::AudioPreparer;
use crate::config::Config;
use crate::manifest::{ManifestStore, PendingVideo, ProcessedFile, VideoStatus};
use crate::output::{SegmentWriter, WrittenSegment};
use crate::planner::{self, Cue, PlanError, Segment, SplitPlan, Timeline};
use crate::tools;
use crate::transcription::{normalize_cues, SRTParser, Transcriber, WhisperApiTranscriber};
use crate::video::{self, VideoProcessor};

/// Outcome of one `process` run over the manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Pending videos found when the run started
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    /// Pending videos left for a later run
    pub remaining: usize,
    pub total_time: Duration,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// Download, transcribe and split every pending manifest video, one at a time
pub struct VideoPipeline {
    config: Config,
    store: ManifestStore,
    video_processor: VideoProcessor,
    audio_preparer: AudioPreparer,
    writer: SegmentWriter,
    transcriber: Box<dyn Transcriber>,
}

impl VideoPipeline {
    /// Pipeline backed by the Whisper API; needs an API key in the config
    pub fn new(config: Config) -> Result<Self> {
        let transcriber = WhisperApiTranscriber::new(config.transcription.clone())?;
        Ok(Self::with_transcriber(config, Box::new(transcriber)))
    }

    pub fn with_transcriber(config: Config, transcriber: Box<dyn Transcriber>) -> Self {
        let video_processor = VideoProcessor::new(config.download.clone());
        Self {
            store: ManifestStore::new(&config.output.base_dir),
            audio_preparer: AudioPreparer::new(&config.transcription),
            writer: SegmentWriter::new(video_processor.clone()),
            video_processor,
            transcriber,
            config,
        }
    }

    /// Process up to `max_videos` pending videos (all of them when `None`)
    pub async fn run(&self, max_videos: Option<usize>) -> Result<RunSummary> {
        let start_time = Instant::now();

        let manifest = self
            .store
            .load_existing()
            .await
            .context("No manifest found. Use add-videos to create one")?;

        let pending = manifest.pending();
        if pending.is_empty() {
            info!("✅ No pending videos to process!");
            return Ok(RunSummary {
                total_time: start_time.elapsed(),
                ..RunSummary::default()
            });
        }

        let to_process = max_videos.map_or(pending.len(), |max| max.min(pending.len()));
        info!("📊 Found {} pending videos", pending.len());
        info!("🚀 Processing next {} videos...", to_process);

        tools::ensure_available(&tools::REQUIRED_TOOLS).await?;

        let mut summary = RunSummary {
            pending: pending.len(),
            ..RunSummary::default()
        };

        for (n, item) in pending.iter().take(to_process).enumerate() {
            info!("[{}/{}] {} #{}", n + 1, to_process, item.playlist_id, item.index + 1);
            if self.process_video(item).await? {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
        }

        summary.remaining = pending.len() - summary.processed();
        summary.total_time = start_time.elapsed();

        info!(
            "🎉 Session complete: {} processed ({} failed) in {:.1}s",
            summary.processed(),
            summary.failed,
            summary.total_time.as_secs_f64()
        );
        if summary.remaining > 0 {
            info!("📋 {} videos still pending", summary.remaining);
        }

        Ok(summary)
    }

    /// Run one video through the pipeline and record the outcome in the manifest.
    /// Returns whether it completed. Only manifest I/O errors are propagated.
    async fn process_video(&self, item: &PendingVideo) -> Result<bool> {
        info!("🎬 Processing: {}", item.video.title);
        info!("📋 Splits: {}", item.video.splits);

        self.store
            .transition(&item.playlist_id, item.index, VideoStatus::Processing, None, None)
            .await?;

        let playlist_dir = self
            .config
            .output
            .base_dir
            .join("playlists")
            .join(&item.playlist_id);
        let temp_dir = playlist_dir.join("temp");

        let started = Instant::now();
        let outcome = self.download_and_split(item, &playlist_dir, &temp_dir).await;

        if tokio::fs::try_exists(&temp_dir).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::remove_dir_all(&temp_dir).await {
                warn!("Failed to clean up {}: {}", temp_dir.display(), e);
            }
        }

        match outcome {
            Ok(files) => {
                info!(
                    "✅ Completed: {} parts ready in {:.1}s",
                    files.len(),
                    started.elapsed().as_secs_f64()
                );
                self.store
                    .transition(
                        &item.playlist_id,
                        item.index,
                        VideoStatus::Completed,
                        None,
                        Some(files),
                    )
                    .await?;
                Ok(true)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("❌ Failed: {}", message);
                self.store
                    .transition(
                        &item.playlist_id,
                        item.index,
                        VideoStatus::Failed,
                        Some(message),
                        None,
                    )
                    .await?;
                Ok(false)
            }
        }
    }

    async fn download_and_split(
        &self,
        item: &PendingVideo,
        playlist_dir: &Path,
        temp_dir: &Path,
    ) -> Result<Vec<ProcessedFile>> {
        let url = item.video.url.as_str();
        let videos_dir = playlist_dir.join("videos");
        let processed_dir = playlist_dir.join("processed");
        for dir in [videos_dir.as_path(), processed_dir.as_path(), temp_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }

        let video_path = self.video_processor.download_video(url, &videos_dir).await?;
        let media_duration = self.video_processor.get_duration(&video_path).await?;

        let audio_dir = tempfile::Builder::new()
            .prefix(&format!("audio_{:x}_", md5::compute(url.as_bytes())))
            .tempdir_in(temp_dir)?;
        let audio_path = self.audio_preparer.download_audio(url, audio_dir.path()).await?;
        let chunks = self.audio_preparer.split_if_needed(&audio_path).await?;
        let cues = normalize_cues(self.transcriber.transcribe_chunks(&chunks).await?);
        audio_dir.close()?;

        let segments = plan_segments(
            media_duration,
            &cues,
            item.video.splits,
            self.config.split.overlap_secs,
        )
        .with_context(|| format!("Could not plan {} parts", item.video.splits))?;

        let stem = video::file_stem(&video_path);
        let written = self
            .writer
            .write_segments(&video_path, &segments, &processed_dir, &stem)
            .await?;

        Ok(written
            .iter()
            .map(|segment| segment.to_processed_file(&self.config.output.base_dir))
            .collect())
    }
}

/// Plan `parts` segments over a recording, stretching the timeline to cover every cue
pub fn plan_segments(
    media_duration: Duration,
    cues: &[Cue],
    parts: u32,
    overlap_secs: f64,
) -> std::result::Result<Vec<Segment>, PlanError> {
    let timeline = Timeline::covering(media_duration, cues);
    let split = SplitPlan::from_secs(parts, overlap_secs)?;
    debug!(
        "Planning {} parts over {:.1}s with {:.1}s overlap",
        parts,
        timeline.duration().as_secs_f64(),
        overlap_secs
    );
    planner::plan(&timeline, cues, &split)
}

/// Split a local video using an existing subtitle file, without touching the manifest
pub async fn split_local(
    config: &Config,
    video_path: &Path,
    srt_path: &Path,
    parts: u32,
    overlap_secs: f64,
    output_dir: Option<PathBuf>,
) -> Result<Vec<WrittenSegment>> {
    tools::ensure_available(&["ffmpeg", "ffprobe"]).await?;

    let video_processor = VideoProcessor::new(config.download.clone());
    let media_duration = video_processor.get_duration(video_path).await?;

    let subtitles = SRTParser::parse_file(srt_path)
        .await
        .with_context(|| format!("Failed to read subtitles from {}", srt_path.display()))?;
    let cues = normalize_cues(subtitles.to_cues());
    info!("📄 Loaded {} cues from {}", cues.len(), srt_path.display());

    let segments = plan_segments(media_duration, &cues, parts, overlap_secs)?;

    let output_dir = output_dir.unwrap_or_else(|| {
        video_path
            .parent()
            .unwrap_or(Path::new("."))
            .join("processed")
    });
    let stem = video::file_stem(video_path);

    SegmentWriter::new(video_processor)
        .write_segments(video_path, &segments, &output_dir, &stem)
        .await
}
