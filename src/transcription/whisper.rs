use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::audio::AudioChunk;
use crate::config::TranscriptionConfig;
use crate::planner::Cue;
use crate::transcription::SRTFormatter;

/// Transcription segment as returned by the Whisper API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    /// Segment ID
    #[serde(default)]
    pub id: u32,
    /// Start time in seconds, relative to the uploaded file
    pub start: f64,
    /// End time in seconds, relative to the uploaded file
    pub end: f64,
    /// Transcribed text
    pub text: String,
    /// Average log probability
    #[serde(default)]
    pub avg_logprob: Option<f64>,
    /// No speech probability
    #[serde(default)]
    pub no_speech_prob: Option<f64>,
}

/// `verbose_json` transcription response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Full transcription text
    #[serde(default)]
    pub text: String,
    /// Detected language
    #[serde(default)]
    pub language: Option<String>,
    /// Audio duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    /// Individual segments with timestamps
    #[serde(default)]
    pub segments: Vec<TranscriptionSegment>,
}

impl TranscriptionResult {
    /// Segments as cues on the full recording's timeline
    pub fn to_cues(&self, offset: Duration) -> Result<Vec<Cue>> {
        self.segments
            .iter()
            .map(|segment| {
                let cue = Cue::from_secs(segment.start, segment.end, SRTFormatter::clean_text(&segment.text))
                    .with_context(|| format!("Bad timestamps in transcription segment {}", segment.id))?;
                Ok(Cue::new(cue.start + offset, cue.end + offset, cue.text))
            })
            .collect()
    }
}

/// Turns audio chunks into cues covering the whole recording
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe_chunks(&self, chunks: &[AudioChunk]) -> Result<Vec<Cue>>;
}

/// OpenAI Whisper API client
#[derive(Debug, Clone)]
pub struct WhisperApiTranscriber {
    config: TranscriptionConfig,
    api_key: String,
    client: reqwest::Client,
}

impl WhisperApiTranscriber {
    pub fn new(config: TranscriptionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.config.api_base.trim_end_matches('/'))
    }

    /// Upload one audio file and return the parsed response
    pub async fn transcribe_file(&self, audio_path: &Path) -> Result<TranscriptionResult> {
        let bytes = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("Failed to read audio file {}", audio_path.display()))?;

        let file_name = audio_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(audio_path))?;

        let form = Form::new()
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Whisper API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Whisper API returned {}: {}", status, body));
        }

        let result: TranscriptionResult = response
            .json()
            .await
            .context("Failed to decode Whisper API response")?;

        debug!("Whisper returned {} segments", result.segments.len());
        Ok(result)
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    async fn transcribe_chunks(&self, chunks: &[AudioChunk]) -> Result<Vec<Cue>> {
        let start_time = Instant::now();
        let mut cues = Vec::new();

        for (i, chunk) in chunks.iter().enumerate() {
            info!("🗣️ Transcribing chunk {}/{}", i + 1, chunks.len());
            let result = self.transcribe_file(&chunk.path).await?;
            cues.extend(result.to_cues(chunk.offset)?);
        }

        info!(
            "🎉 Transcription completed in {:.1}s: {} cues",
            start_time.elapsed().as_secs_f64(),
            cues.len()
        );
        Ok(cues)
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "task": "transcribe",
        "language": "chinese",
        "duration": 12.5,
        "text": "大家好。今天我们学习中文。",
        "segments": [
            {"id": 0, "seek": 0, "start": 0.0, "end": 4.2, "text": " 大家好。", "avg_logprob": -0.2, "no_speech_prob": 0.01},
            {"id": 1, "seek": 0, "start": 4.2, "end": 9.8, "text": "今天我们学习中文。 Today  we\nlearn Chinese."}
        ]
    }"#;

    #[test]
    fn test_parse_verbose_json() {
        let result: TranscriptionResult = serde_json::from_str(RESPONSE).unwrap();

        assert_eq!(result.language.as_deref(), Some("chinese"));
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[1].avg_logprob, None);
    }

    #[test]
    fn test_cues_are_offset_by_chunk_start() {
        let result: TranscriptionResult = serde_json::from_str(RESPONSE).unwrap();
        let cues = result.to_cues(Duration::from_secs(300)).unwrap();

        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "大家好。");
        assert_eq!(cues[1].text, "今天我们学习中文。 Today we learn Chinese.");
        assert_eq!(cues[0].start, Duration::from_secs(300));
        assert_eq!(cues[1].end, Duration::from_secs(300) + Duration::from_secs_f64(9.8));
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let config = TranscriptionConfig {
            api_key: None,
            ..TranscriptionConfig::default()
        };
        assert!(WhisperApiTranscriber::new(config).is_err());
    }

    #[test]
    fn test_endpoint_and_mime() {
        let config = TranscriptionConfig {
            api_key: Some("sk-test".to_string()),
            api_base: "http://localhost:8080/v1/".to_string(),
            ..TranscriptionConfig::default()
        };
        let transcriber = WhisperApiTranscriber::new(config).unwrap();

        assert_eq!(transcriber.endpoint(), "http://localhost:8080/v1/audio/transcriptions");
        assert_eq!(mime_for(Path::new("a.MP3")), "audio/mpeg");
        assert_eq!(mime_for(Path::new("a.bin")), "application/octet-stream");
    }
}
