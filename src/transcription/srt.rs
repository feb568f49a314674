use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::planner::Cue;

/// Result type for subtitle operations
pub type Result<T> = std::result::Result<T, SubtitleError>;

/// Error types for subtitle operations
#[derive(thiserror::Error, Debug)]
pub enum SubtitleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(String),

    #[error("Malformed SRT block {block}: {reason}")]
    Parse { block: usize, reason: String },
}

/// SRT (SubRip Subtitle) entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SRTEntry {
    /// Sequential number
    pub index: u32,
    /// Start timestamp
    pub start: Duration,
    /// End timestamp
    pub end: Duration,
    /// Subtitle text
    pub text: String,
}

impl SRTEntry {
    /// Create a new SRT entry
    pub fn new(index: u32, start: Duration, end: Duration, text: String) -> Self {
        Self {
            index,
            start,
            end,
            text: text.trim().to_string(),
        }
    }
}

impl From<&SRTEntry> for Cue {
    fn from(entry: &SRTEntry) -> Self {
        Cue::new(entry.start, entry.end, entry.text.clone())
    }
}

impl fmt::Display for SRTEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n",
            self.index,
            format_duration(self.start),
            format_duration(self.end),
            self.text
        )
    }
}

/// SRT file generator
#[derive(Debug, Clone, Default)]
pub struct SRTGenerator {
    entries: Vec<SRTEntry>,
}

impl SRTGenerator {
    /// Create a new SRT generator
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build a subtitle file from planner cues, numbered from 1
    pub fn from_cues(cues: &[Cue]) -> Self {
        let entries = cues
            .iter()
            .enumerate()
            .map(|(i, cue)| SRTEntry::new((i + 1) as u32, cue.start, cue.end, cue.text.clone()))
            .collect();
        Self { entries }
    }

    /// Add an entry to the SRT file
    pub fn add_entry(&mut self, entry: SRTEntry) {
        self.entries.push(entry);
    }

    /// Generate SRT content as string
    pub fn generate(&self) -> String {
        let mut srt_content = String::new();

        for entry in &self.entries {
            srt_content.push_str(&entry.to_string());
            srt_content.push('\n');
        }

        srt_content
    }

    /// Save SRT to file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        tokio::fs::write(path.as_ref(), self.generate()).await?;
        Ok(())
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries as planner cues
    pub fn to_cues(&self) -> Vec<Cue> {
        self.entries.iter().map(Cue::from).collect()
    }

    /// Validate SRT entries for common issues
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.end <= entry.start {
                issues.push(format!("Entry {}: End time is not after start time", i + 1));
            }

            if entry.text.trim().is_empty() {
                issues.push(format!("Entry {}: Empty text", i + 1));
            }
        }

        for i in 0..self.entries.len().saturating_sub(1) {
            if self.entries[i].end > self.entries[i + 1].start {
                issues.push(format!(
                    "Entries {} and {}: Overlapping timestamps",
                    i + 1,
                    i + 2
                ));
            }
        }

        issues
    }
}

/// SRT text parser
pub struct SRTParser;

impl SRTParser {
    /// Parse SRT content into entries
    pub fn parse(content: &str) -> Result<SRTGenerator> {
        let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
        let mut generator = SRTGenerator::new();

        let blocks = content
            .split("\n\n")
            .map(str::trim)
            .filter(|block| !block.is_empty());

        for (block_number, block) in blocks.enumerate() {
            let block_number = block_number + 1;
            let mut lines = block.lines();

            let first = lines.next().unwrap_or_default().trim();
            // The counter line is optional in the wild
            let (index, timing) = match first.parse::<u32>() {
                Ok(index) => (index, lines.next().unwrap_or_default().trim()),
                Err(_) => (block_number as u32, first),
            };

            let (start, end) = timing.split_once("-->").ok_or_else(|| SubtitleError::Parse {
                block: block_number,
                reason: format!("missing '-->' in timing line '{}'", timing),
            })?;

            let start = parse_single_timestamp(start.trim()).map_err(|e| SubtitleError::Parse {
                block: block_number,
                reason: e.to_string(),
            })?;
            // Positioning hints may follow the end timestamp
            let end = end.split_whitespace().next().unwrap_or_default();
            let end = parse_single_timestamp(end).map_err(|e| SubtitleError::Parse {
                block: block_number,
                reason: e.to_string(),
            })?;

            let text = lines.map(str::trim).collect::<Vec<_>>().join("\n");
            generator.add_entry(SRTEntry::new(index, start, end, text));
        }

        Ok(generator)
    }

    /// Read and parse an SRT file
    pub async fn parse_file<P: AsRef<Path>>(path: P) -> Result<SRTGenerator> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::parse(&content)
    }
}

/// SRT formatting utilities
pub struct SRTFormatter;

impl SRTFormatter {
    /// Parse SRT timestamp to Duration
    pub fn parse_timestamp(timestamp: &str) -> Result<Duration> {
        parse_single_timestamp(timestamp.trim())
    }

    /// Clean text for SRT display
    pub fn clean_text(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Bring transcription output in line with what the planner accepts.
///
/// Text is trimmed, empty or zero-length cues are dropped, cues are sorted by
/// start, and each start is pulled forward to the previous cue's end.
pub fn normalize_cues(mut cues: Vec<Cue>) -> Vec<Cue> {
    cues.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let mut normalized: Vec<Cue> = Vec::with_capacity(cues.len());
    for mut cue in cues {
        cue.text = cue.text.trim().to_string();
        if let Some(previous) = normalized.last() {
            cue.start = cue.start.max(previous.end);
        }
        if cue.text.is_empty() || cue.end <= cue.start {
            continue;
        }
        normalized.push(cue);
    }

    normalized
}

/// Format duration as SRT timestamp (HH:MM:SS,mmm)
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let milliseconds = duration.subsec_millis();

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, milliseconds)
}

/// Parse a single timestamp (HH:MM:SS,mmm or HH:MM:SS.mmm)
fn parse_single_timestamp(timestamp: &str) -> Result<Duration> {
    let invalid = || SubtitleError::Timestamp(timestamp.to_string());

    let (hms, millis) = timestamp
        .split_once([',', '.'])
        .ok_or_else(invalid)?;

    let hms_parts: Vec<&str> = hms.split(':').collect();
    if hms_parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = hms_parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = hms_parts[1].parse().map_err(|_| invalid())?;
    let seconds: u64 = hms_parts[2].parse().map_err(|_| invalid())?;
    let milliseconds: u64 = millis.parse().map_err(|_| invalid())?;

    if minutes >= 60 || seconds >= 60 || milliseconds >= 1000 {
        return Err(invalid());
    }

    let total_seconds = hours * 3600 + minutes * 60 + seconds;
    Ok(Duration::from_millis(total_seconds * 1000 + milliseconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srt_entry_display() {
        let entry = SRTEntry::new(
            1,
            Duration::from_secs(10),
            Duration::from_secs(15),
            "  我们今天学习中文  ".to_string(),
        );

        let output = entry.to_string();
        assert_eq!(output, "1\n00:00:10,000 --> 00:00:15,000\n我们今天学习中文\n");
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(format_duration(Duration::from_secs(3661)), "01:01:01,000");
        assert_eq!(format_duration(Duration::from_millis(1500)), "00:00:01,500");
        assert_eq!(format_duration(Duration::from_secs(0)), "00:00:00,000");
    }

    #[test]
    fn test_timestamp_parsing() {
        assert_eq!(
            SRTFormatter::parse_timestamp("01:01:01,250").unwrap(),
            Duration::from_millis(3_661_250)
        );
        assert_eq!(
            SRTFormatter::parse_timestamp("00:00:02.500").unwrap(),
            Duration::from_millis(2500)
        );
        assert!(SRTFormatter::parse_timestamp("00:61:00,000").is_err());
        assert!(SRTFormatter::parse_timestamp("garbage").is_err());
    }

    #[test]
    fn test_generator_from_cues() {
        let cues = vec![
            Cue::new(Duration::from_secs(0), Duration::from_secs(5), "第一句"),
            Cue::new(Duration::from_secs(5), Duration::from_millis(9_500), "第二句"),
        ];

        let generator = SRTGenerator::from_cues(&cues);
        let content = generator.generate();

        assert_eq!(generator.len(), 2);
        assert!(content.starts_with("1\n00:00:00,000 --> 00:00:05,000\n第一句\n\n"));
        assert!(content.contains("2\n00:00:05,000 --> 00:00:09,500\n第二句\n"));
    }

    #[test]
    fn test_parse_srt_with_crlf_and_bom() {
        let content = "\u{feff}1\r\n00:00:01,000 --> 00:00:03,000\r\n你好\r\n世界\r\n\r\n2\r\n00:00:04,000 --> 00:00:06,000 X1:10\r\n再见\r\n";
        let generator = SRTParser::parse(content).unwrap();
        let entries = generator.to_cues();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "你好\n世界");
        assert_eq!(entries[1].start, Duration::from_secs(4));
        assert_eq!(entries[1].end, Duration::from_secs(6));
    }

    #[test]
    fn test_parse_reports_bad_block() {
        let content = "1\n00:00:01,000 --> 00:00:03,000\nok\n\n2\nnot a timing line\ntext\n";
        match SRTParser::parse(content) {
            Err(SubtitleError::Parse { block, .. }) => assert_eq!(block, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_matches_generate() {
        let cues = vec![
            Cue::new(Duration::from_millis(120), Duration::from_millis(2_340), "一"),
            Cue::new(Duration::from_millis(2_340), Duration::from_millis(7_001), "二"),
        ];
        let content = SRTGenerator::from_cues(&cues).generate();
        let parsed = SRTParser::parse(&content).unwrap();

        assert_eq!(parsed.to_cues(), cues);
    }

    #[test]
    fn test_normalize_cues() {
        let cues = vec![
            Cue::new(Duration::from_millis(5_000), Duration::from_millis(8_000), " 后 "),
            Cue::new(Duration::from_millis(0), Duration::from_millis(5_200), "前"),
            Cue::new(Duration::from_millis(8_000), Duration::from_millis(9_000), "   "),
            Cue::new(Duration::from_millis(9_000), Duration::from_millis(9_000), "零"),
        ];

        let normalized = normalize_cues(cues);

        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].text, "前");
        assert_eq!(normalized[1].text, "后");
        assert_eq!(normalized[1].start, Duration::from_millis(5_200));
        assert!(SRTGenerator::from_cues(&normalized).validate().is_empty());
    }

    #[test]
    fn test_validation() {
        let mut generator = SRTGenerator::new();
        generator.add_entry(SRTEntry::new(1, Duration::from_secs(10), Duration::from_secs(5), "Invalid".to_string()));
        generator.add_entry(SRTEntry::new(2, Duration::from_secs(15), Duration::from_secs(20), "".to_string()));

        let issues = generator.validate();
        assert!(issues.iter().any(|issue| issue.contains("End time is not after start time")));
        assert!(issues.iter().any(|issue| issue.contains("Empty text")));
    }
}
