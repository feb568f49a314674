/// Chinese Video Processor
///
/// Downloads Chinese-language lesson videos, transcribes them with the Whisper API
/// and splits each one into overlapping parts whose boundaries never cut a sentence.
/// Progress is tracked per video in a JSON manifest.

pub mod audio;
pub mod config;
pub mod manifest;
pub mod output;
pub mod planner;
pub mod processing;
pub mod tools;
pub mod transcription;
pub mod video;

// Re-export main types for easy access
pub use crate::config::Config;
pub use crate::manifest::{Manifest, ManifestStore, VideoEntry, VideoStatus};
pub use crate::planner::{plan, Cue, PlanError, Segment, SplitPlan, Timeline};
pub use crate::processing::{plan_segments, split_local, RunSummary, VideoPipeline};
pub use crate::transcription::{SRTGenerator, SRTParser, Transcriber, WhisperApiTranscriber};
pub use crate::video::VideoProcessor;
