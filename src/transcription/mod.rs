pub mod whisper;
pub mod srt;

pub use whisper::{Transcriber, TranscriptionResult, TranscriptionSegment, WhisperApiTranscriber};
pub use srt::{normalize_cues, SRTEntry, SRTFormatter, SRTGenerator, SRTParser, SubtitleError};
