//! Thin wrappers for running the external command line tools (yt-dlp, ffmpeg, ffprobe)

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::SystemTime;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Tools the pipeline shells out to
pub const REQUIRED_TOOLS: [&str; 3] = ["yt-dlp", "ffmpeg", "ffprobe"];

/// Run a command to completion, failing with its stderr when it exits non-zero
pub async fn run(command: &mut Command, description: &str) -> Result<Output> {
    debug!("Running {}: {:?}", description, command.as_std());

    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("Failed to launch {}", description))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "{} failed ({}): {}",
            description,
            output.status,
            last_lines(&stderr, 5)
        ));
    }

    Ok(output)
}

/// Check whether a tool can be launched at all
pub async fn is_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok()
}

/// Fail early with a clear message when a required tool is missing
pub async fn ensure_available(programs: &[&str]) -> Result<()> {
    for program in programs {
        if !is_available(program).await {
            return Err(anyhow!("Required tool not found on PATH: {}", program));
        }
        info!("✅ Found {}", program);
    }
    Ok(())
}

/// Files directly inside `dir` with the given extension, sorted by name
pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
        })
        .collect();

    files.sort();
    files
}

/// Most recently modified file in `dir` with the given extension
pub fn newest_with_extension(dir: &Path, extension: &str) -> Option<PathBuf> {
    files_with_extension(dir, extension)
        .into_iter()
        .max_by_key(|path| {
            std::fs::metadata(path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
