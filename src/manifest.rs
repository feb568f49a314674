use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, ManifestError>;

/// Error types for manifest operations
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Manifest file not found: {0}")]
    NotFound(PathBuf),

    #[error("No video {index} in playlist '{playlist}'")]
    UnknownVideo { playlist: String, index: usize },

    #[error("Cannot move a video from {from} to {to}")]
    InvalidTransition { from: VideoStatus, to: VideoStatus },
}

/// Processing status of a single video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub const ALL: [VideoStatus; 4] = [
        VideoStatus::Pending,
        VideoStatus::Processing,
        VideoStatus::Completed,
        VideoStatus::Failed,
    ];

    /// Whether a video in this status may move to `next`
    pub fn can_transition_to(self, next: VideoStatus) -> bool {
        use VideoStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Processing)
                | (Failed, Pending)
                | (Completed, Pending)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            VideoStatus::Pending => "⏳",
            VideoStatus::Processing => "🔄",
            VideoStatus::Completed => "✅",
            VideoStatus::Failed => "❌",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One segment written for a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedFile {
    /// Video clip, relative to the project directory
    pub video: PathBuf,
    /// Subtitle file, relative to the project directory
    pub srt: PathBuf,
    /// Clip start in the source video (seconds)
    #[serde(default)]
    pub range_start: f64,
    /// Clip end in the source video (seconds)
    #[serde(default)]
    pub range_end: f64,
}

fn default_splits() -> u32 {
    3
}

/// A queued video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub url: String,
    pub title: String,
    #[serde(default = "default_splits")]
    pub splits: u32,
    #[serde(default)]
    pub status: VideoStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub processed_files: Vec<ProcessedFile>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl VideoEntry {
    pub fn new(url: impl Into<String>, title: impl Into<String>, splits: u32) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            splits,
            status: VideoStatus::Pending,
            error: None,
            processed_files: Vec::new(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub videos: Vec<VideoEntry>,
}

/// The whole processing queue. Playlists keep the order they appear in the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub playlists: IndexMap<String, Playlist>,
}

/// A pending video and where it lives in the manifest
#[derive(Debug, Clone)]
pub struct PendingVideo {
    pub playlist_id: String,
    pub index: usize,
    pub video: VideoEntry,
}

/// Per-playlist status counts
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistSummary {
    pub playlist_id: String,
    pub title: String,
    pub counts: BTreeMap<VideoStatus, usize>,
    pub total: usize,
}

impl Manifest {
    /// Pending videos in manifest order
    pub fn pending(&self) -> Vec<PendingVideo> {
        self.playlists
            .iter()
            .flat_map(|(playlist_id, playlist)| {
                playlist
                    .videos
                    .iter()
                    .enumerate()
                    .filter(|(_, video)| video.status == VideoStatus::Pending)
                    .map(move |(index, video)| PendingVideo {
                        playlist_id: playlist_id.clone(),
                        index,
                        video: video.clone(),
                    })
            })
            .collect()
    }

    pub fn status_summary(&self) -> Vec<PlaylistSummary> {
        self.playlists
            .iter()
            .map(|(playlist_id, playlist)| {
                let mut counts = BTreeMap::new();
                for video in &playlist.videos {
                    *counts.entry(video.status).or_insert(0) += 1;
                }
                PlaylistSummary {
                    playlist_id: playlist_id.clone(),
                    title: playlist.title.clone(),
                    counts,
                    total: playlist.videos.len(),
                }
            })
            .collect()
    }

    pub fn video_mut(&mut self, playlist_id: &str, index: usize) -> Result<&mut VideoEntry> {
        self.playlists
            .get_mut(playlist_id)
            .and_then(|playlist| playlist.videos.get_mut(index))
            .ok_or_else(|| ManifestError::UnknownVideo {
                playlist: playlist_id.to_string(),
                index,
            })
    }
}

/// Reads and writes manifest.json, reloading before every change
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    /// Store for `manifest.json` inside `base_dir`
    pub fn new(base_dir: &Path) -> Self {
        Self {
            path: base_dir.join("manifest.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest, starting empty when the file does not exist yet
    pub async fn load(&self) -> Result<Manifest> {
        match self.load_existing().await {
            Err(ManifestError::NotFound(_)) => Ok(Manifest::default()),
            other => other,
        }
    }

    /// Load the manifest, failing when it does not exist
    pub async fn load_existing(&self) -> Result<Manifest> {
        if !fs::try_exists(&self.path).await? {
            return Err(ManifestError::NotFound(self.path.clone()));
        }
        let content = fs::read_to_string(&self.path).await?;
        let manifest: Manifest = serde_json::from_str(&content)?;
        debug!("📋 Loaded manifest with {} playlists", manifest.playlists.len());
        Ok(manifest)
    }

    /// Write the manifest through a temporary file so readers never see half a file
    pub async fn save(&self, manifest: &Manifest) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json_content = serde_json::to_string_pretty(manifest)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json_content).await?;
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Append videos to a playlist, creating it if needed. Returns the playlist size.
    pub async fn add_videos(
        &self,
        playlist_id: &str,
        title: &str,
        videos: Vec<VideoEntry>,
    ) -> Result<usize> {
        let mut manifest = self.load().await?;
        let playlist = manifest
            .playlists
            .entry(playlist_id.to_string())
            .or_insert_with(|| Playlist {
                title: title.to_string(),
                url: None,
                videos: Vec::new(),
            });

        playlist.videos.extend(videos);
        let total = playlist.videos.len();
        self.save(&manifest).await?;
        Ok(total)
    }

    /// Move a video to `status`, recording an error or the produced files
    pub async fn transition(
        &self,
        playlist_id: &str,
        index: usize,
        status: VideoStatus,
        error: Option<String>,
        processed_files: Option<Vec<ProcessedFile>>,
    ) -> Result<VideoEntry> {
        let mut manifest = self.load_existing().await?;
        let video = manifest.video_mut(playlist_id, index)?;

        if !video.status.can_transition_to(status) {
            return Err(ManifestError::InvalidTransition {
                from: video.status,
                to: status,
            });
        }

        video.status = status;
        if status == VideoStatus::Completed {
            video.error = None;
        }
        if let Some(error) = error {
            video.error = Some(error);
        }
        if let Some(files) = processed_files {
            video.processed_files = files;
        }
        video.updated_at = Some(Utc::now());

        let updated = video.clone();
        self.save(&manifest).await?;

        info!("📝 Updated status: {}", status);
        Ok(updated)
    }

    /// Put failed videos back in the queue. Returns how many were reset.
    pub async fn reset_failed(&self, playlist_id: Option<&str>) -> Result<usize> {
        let mut manifest = self.load_existing().await?;
        let mut reset = 0;

        for (id, playlist) in manifest.playlists.iter_mut() {
            if playlist_id.map_or(false, |wanted| wanted != id) {
                continue;
            }
            for video in playlist.videos.iter_mut() {
                if video.status == VideoStatus::Failed {
                    video.status = VideoStatus::Pending;
                    video.updated_at = Some(Utc::now());
                    reset += 1;
                }
            }
        }

        if reset > 0 {
            self.save(&manifest).await?;
        }
        Ok(reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_transitions() {
        use VideoStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Processing));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&VideoStatus::Completed).unwrap(), "\"completed\"");
        let status: VideoStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(status, VideoStatus::Failed);
    }

    #[test]
    fn test_legacy_entry_defaults() {
        let json = r#"{"playlists": {"hsk1": {"title": "HSK 1", "url": null, "videos": [
            {"url": "https://youtu.be/abcdefghijk", "title": "第一课", "status": "pending",
             "error": null, "processed_files": [{"video": "a.mp4", "srt": "a.srt"}]}
        ]}}}"#;

        let manifest: Manifest = serde_json::from_str(json).unwrap();
        let video = &manifest.playlists["hsk1"].videos[0];

        assert_eq!(video.splits, 3);
        assert_eq!(video.processed_files[0].range_end, 0.0);
        assert!(video.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_add_and_transition() {
        let temp_dir = TempDir::new().unwrap();
        let store = ManifestStore::new(temp_dir.path());

        assert!(matches!(store.load_existing().await, Err(ManifestError::NotFound(_))));

        let total = store
            .add_videos("hsk1", "HSK 1", vec![
                VideoEntry::new("https://youtu.be/aaaaaaaaaaa", "一", 3),
                VideoEntry::new("https://youtu.be/bbbbbbbbbbb", "二", 2),
            ])
            .await
            .unwrap();
        assert_eq!(total, 2);

        let pending = store.load().await.unwrap().pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].video.title, "二");

        store.transition("hsk1", 0, VideoStatus::Processing, None, None).await.unwrap();
        let files = vec![ProcessedFile {
            video: PathBuf::from("playlists/hsk1/processed/一_part1.mp4"),
            srt: PathBuf::from("playlists/hsk1/processed/一_part1.srt"),
            range_start: 0.0,
            range_end: 310.0,
        }];
        let video = store
            .transition("hsk1", 0, VideoStatus::Completed, None, Some(files.clone()))
            .await
            .unwrap();

        assert_eq!(video.status, VideoStatus::Completed);
        assert_eq!(video.processed_files, files);
        assert!(video.updated_at.is_some());

        let err = store
            .transition("hsk1", 1, VideoStatus::Completed, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::InvalidTransition { .. }));

        let err = store
            .transition("hsk1", 7, VideoStatus::Processing, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::UnknownVideo { .. }));

        let manifest = store.load().await.unwrap();
        assert_eq!(manifest.pending().len(), 1);

        let content = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert!(content.contains("\"title\": \"一\""));
    }

    #[tokio::test]
    async fn test_playlists_keep_file_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = ManifestStore::new(temp_dir.path());

        let json = r#"{"playlists": {
            "zz_beginner": {"title": "Beginner", "videos": [
                {"url": "https://youtu.be/aaaaaaaaaaa", "title": "first", "status": "pending"}
            ]},
            "advanced": {"title": "Advanced", "videos": [
                {"url": "https://youtu.be/bbbbbbbbbbb", "title": "second", "status": "pending"}
            ]}
        }}"#;
        tokio::fs::write(store.path(), json).await.unwrap();

        let manifest = store.load_existing().await.unwrap();
        let titles: Vec<_> = manifest.pending().into_iter().map(|p| p.video.title).collect();
        assert_eq!(titles, vec!["first", "second"]);

        store.save(&manifest).await.unwrap();
        let content = tokio::fs::read_to_string(store.path()).await.unwrap();
        let beginner = content.find("zz_beginner").unwrap();
        let advanced = content.find("advanced").unwrap();
        assert!(beginner < advanced);

        store
            .add_videos("hsk1", "HSK 1", vec![VideoEntry::new("https://youtu.be/ccccccccccc", "third", 3)])
            .await
            .unwrap();
        let ids: Vec<_> = store.load().await.unwrap().playlists.keys().cloned().collect();
        assert_eq!(ids, vec!["zz_beginner", "advanced", "hsk1"]);
    }

    #[tokio::test]
    async fn test_reset_failed() {
        let temp_dir = TempDir::new().unwrap();
        let store = ManifestStore::new(temp_dir.path());

        store
            .add_videos("p", "P", vec![VideoEntry::new("https://youtu.be/ccccccccccc", "三", 3)])
            .await
            .unwrap();
        store.transition("p", 0, VideoStatus::Processing, None, None).await.unwrap();
        store
            .transition("p", 0, VideoStatus::Failed, Some("Download failed".to_string()), None)
            .await
            .unwrap();

        let summary = store.load().await.unwrap().status_summary();
        assert_eq!(summary[0].counts.get(&VideoStatus::Failed), Some(&1));

        assert_eq!(store.reset_failed(Some("other")).await.unwrap(), 0);
        assert_eq!(store.reset_failed(None).await.unwrap(), 1);

        let manifest = store.load().await.unwrap();
        let video = &manifest.playlists["p"].videos[0];
        assert_eq!(video.status, VideoStatus::Pending);
        assert_eq!(video.error.as_deref(), Some("Download failed"));
    }
}
