use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{PlanError, Result};

/// A timed subtitle line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    /// Start offset from the beginning of the media
    pub start: Duration,
    /// End offset from the beginning of the media
    pub end: Duration,
    /// Subtitle text
    pub text: String,
}

impl Cue {
    pub fn new(start: Duration, end: Duration, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Build a cue from floating point seconds, as reported by transcription APIs
    pub fn from_secs(start: f64, end: f64, text: impl Into<String>) -> Result<Self> {
        Ok(Self::new(secs_to_duration(start)?, secs_to_duration(end)?, text))
    }

    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    /// True when `t` falls strictly between the cue's edges
    pub fn contains(&self, t: Duration) -> bool {
        self.start < t && t < self.end
    }

    /// Copy of this cue with both edges moved back by `offset`
    pub(crate) fn retimed(&self, offset: Duration) -> Self {
        Self {
            start: self.start.saturating_sub(offset),
            end: self.end.saturating_sub(offset),
            text: self.text.clone(),
        }
    }
}

/// Full media timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    duration: Duration,
}

impl Timeline {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Timeline from a probed duration in seconds
    pub fn from_secs(secs: f64) -> Result<Self> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(PlanError::DegenerateInput(format!(
                "timeline duration must be a positive number of seconds, got {}",
                secs
            )));
        }
        Ok(Self::new(secs_to_duration(secs)?))
    }

    /// Timeline long enough for both the media and its last cue
    pub fn covering(media_duration: Duration, cues: &[Cue]) -> Self {
        let last_cue_end = cues.iter().map(|cue| cue.end).max().unwrap_or_default();
        Self::new(media_duration.max(last_cue_end))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// How a timeline should be split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    /// Number of segments to produce
    pub count: u32,
    /// Margin added on both sides of every core window
    pub overlap: Duration,
}

impl SplitPlan {
    pub fn new(count: u32, overlap: Duration) -> Self {
        Self { count, overlap }
    }

    /// Split plan from an overlap given in seconds
    pub fn from_secs(count: u32, overlap_secs: f64) -> Result<Self> {
        if count < 1 {
            return Err(PlanError::InvalidConfig(
                "segment count must be at least 1".to_string(),
            ));
        }
        if !overlap_secs.is_finite() || overlap_secs < 0.0 {
            return Err(PlanError::InvalidConfig(format!(
                "overlap must be a non-negative number of seconds, got {}",
                overlap_secs
            )));
        }
        Ok(Self::new(count, Duration::from_secs_f64(overlap_secs)))
    }
}

/// One planned output segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based position in the plan
    pub index: usize,
    /// Start of the non-overlapping core window
    pub core_start: Duration,
    /// End of the non-overlapping core window
    pub core_end: Duration,
    /// Start of the range to cut from the media
    pub range_start: Duration,
    /// End of the range to cut from the media
    pub range_end: Duration,
    /// Cues inside the range, relative to `range_start`
    pub cues: Vec<Cue>,
}

impl Segment {
    pub fn range_duration(&self) -> Duration {
        self.range_end - self.range_start
    }

    pub fn core_duration(&self) -> Duration {
        self.core_end - self.core_start
    }
}

fn secs_to_duration(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| {
        PlanError::DegenerateInput(format!("invalid timestamp {}: {}", secs, e))
    })
}
