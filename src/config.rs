use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the Chinese video processor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// yt-dlp download settings
    pub download: DownloadConfig,

    /// Transcription API settings
    pub transcription: TranscriptionConfig,

    /// Segment planning settings
    pub split: SplitConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// yt-dlp format selector for the video that gets split
    pub video_format: String,

    /// Container to merge the downloaded streams into
    pub merge_format: String,

    /// Parallel fragment downloads passed to yt-dlp
    pub concurrent_fragments: usize,

    /// Re-encode clips so they start exactly at the range start instead of the previous keyframe
    pub accurate_cuts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// API key (falls back to OPENAI_API_KEY)
    pub api_key: Option<String>,

    /// Model to use for transcription
    pub model: String,

    /// Spoken language hint
    pub language: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Largest audio file the API accepts in one upload (MB)
    pub max_upload_mb: u64,

    /// Length of each audio chunk when a file has to be split (seconds)
    pub chunk_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Segments per video when the manifest entry does not say
    pub default_splits: u32,

    /// Overlap margin between neighbouring segments (seconds)
    pub overlap_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Project directory holding manifest.json and playlists/
    pub base_dir: PathBuf,

    /// Log level used when --verbose is not given
    pub log_level: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            video_format: "worst[height<=480]+bestaudio/worst".to_string(),
            merge_format: "mp4".to_string(),
            concurrent_fragments: num_cpus::get().min(8),
            accurate_cuts: false,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            language: "zh".to_string(),
            timeout_secs: 600,
            max_upload_mb: 25,
            chunk_secs: 300, // 5 minutes
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            default_splits: 3,
            overlap_secs: 15.0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config = match Self::locate() {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// First config file present in the working directory
    pub fn locate() -> Option<PathBuf> {
        ["zh-video-processor.toml", "config/zh-video-processor.toml"]
            .into_iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Load configuration from a specific TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.trim().is_empty() {
                self.transcription.api_key = Some(api_key);
            }
        }

        if let Ok(api_base) = std::env::var("ZHVP_API_BASE") {
            self.transcription.api_base = api_base;
        }

        if let Ok(overlap) = std::env::var("ZHVP_OVERLAP_SECS") {
            match overlap.parse() {
                Ok(secs) => self.split.overlap_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid ZHVP_OVERLAP_SECS: {}", overlap),
            }
        }

        if let Ok(fragments) = std::env::var("ZHVP_CONCURRENT_FRAGMENTS") {
            match fragments.parse() {
                Ok(n) => self.download.concurrent_fragments = n,
                Err(_) => tracing::warn!("Ignoring invalid ZHVP_CONCURRENT_FRAGMENTS: {}", fragments),
            }
        }

        if let Ok(log_level) = std::env::var("ZHVP_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        self
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.split.default_splits == 0 {
            return Err(anyhow!("default_splits must be greater than 0"));
        }

        if !self.split.overlap_secs.is_finite() || self.split.overlap_secs < 0.0 {
            return Err(anyhow!("overlap_secs must be a non-negative number"));
        }

        if self.transcription.chunk_secs == 0 {
            return Err(anyhow!("chunk_secs must be greater than 0"));
        }

        if self.transcription.max_upload_mb == 0 {
            return Err(anyhow!("max_upload_mb must be greater than 0"));
        }

        if self.download.concurrent_fragments == 0 {
            return Err(anyhow!("concurrent_fragments must be greater than 0"));
        }

        url::Url::parse(&self.transcription.api_base)
            .with_context(|| format!("api_base is not a valid URL: {}", self.transcription.api_base))?;

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Processor Configuration:\n\
            - Base Directory: {}\n\
            - Transcription Model: {} ({})\n\
            - API Key Set: {}\n\
            - Default Splits: {}\n\
            - Overlap: {:.1}s\n\
            - Concurrent Fragments: {}",
            self.output.base_dir.display(),
            self.transcription.model,
            self.transcription.language,
            self.transcription.api_key.is_some(),
            self.split.default_splits,
            self.split.overlap_secs,
            self.download.concurrent_fragments
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.base_dir = dir;
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.transcription.api_key = Some(api_key);
        self
    }

    pub fn with_overlap_secs(mut self, overlap_secs: f64) -> Self {
        self.config.split.overlap_secs = overlap_secs;
        self
    }

    pub fn with_default_splits(mut self, splits: u32) -> Self {
        self.config.split.default_splits = splits;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.split.default_splits, 3);
        assert_eq!(config.split.overlap_secs, 15.0);
        assert_eq!(config.transcription.model, "whisper-1");
        assert_eq!(config.transcription.language, "zh");
        assert!(config.download.concurrent_fragments >= 1);
        assert!(config.download.concurrent_fragments <= 8);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_default_splits(5)
            .with_overlap_secs(20.0)
            .with_api_key("sk-test".to_string())
            .build();

        assert_eq!(config.split.default_splits, 5);
        assert_eq!(config.split.overlap_secs, 20.0);
        assert_eq!(config.transcription.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let config = ConfigBuilder::new().with_overlap_secs(-1.0).build();
        assert!(config.validate().is_err());

        let config = ConfigBuilder::new().with_default_splits(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[split]\noverlap_secs = 30.0\n").unwrap();
        assert_eq!(config.split.overlap_secs, 30.0);
        assert_eq!(config.split.default_splits, 3);
        assert_eq!(config.transcription.chunk_secs, 300);
    }

    #[test]
    fn test_summary_lists_key_settings() {
        let summary = ConfigBuilder::new()
            .with_default_splits(4)
            .with_overlap_secs(12.5)
            .build()
            .summary();

        assert!(summary.contains("Default Splits: 4"));
        assert!(summary.contains("Overlap: 12.5s"));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = ConfigBuilder::new().with_default_splits(4).build();
        config.save(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.split.default_splits, 4);
        assert_eq!(reloaded.transcription.api_base, config.transcription.api_base);
    }
}
