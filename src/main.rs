use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zh_video_processor::config::Config;
use zh_video_processor::processing::{plan_segments, split_local, VideoPipeline};
use zh_video_processor::transcription::{normalize_cues, SRTFormatter, SRTParser};

#[derive(Parser)]
#[command(name = "zh-video-processor")]
#[command(version, author = "TigreRoll")]
#[command(about = "Download, transcribe and split Chinese lesson videos at sentence boundaries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory holding manifest.json and playlists/
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Process pending videos from the manifest
    Process {
        /// Number of videos to process (default: all pending)
        count: Option<usize>,

        /// Same as the positional COUNT
        #[arg(long = "count", value_name = "N")]
        count_flag: Option<usize>,
    },
    /// Split a local video using an existing SRT file
    Split {
        video: PathBuf,
        srt: PathBuf,

        /// Number of parts
        #[arg(long)]
        parts: Option<u32>,

        /// Overlap in seconds added on each side of a cut
        #[arg(long)]
        overlap: Option<f64>,

        /// Output directory (default: processed/ next to the video)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the split plan for an SRT file without touching any media
    Plan {
        srt: PathBuf,

        /// Recording length as seconds or HH:MM:SS,mmm (default: end of the last cue)
        #[arg(long, value_parser = parse_duration_arg)]
        duration: Option<Duration>,

        #[arg(long)]
        parts: Option<u32>,

        #[arg(long)]
        overlap: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(base_dir) = cli.base_dir {
        config.output.base_dir = base_dir;
    }

    init_logging(cli.verbose, &config.output.log_level);
    if let Some(path) = Config::locate() {
        info!("📄 Loaded configuration from: {}", path.display());
    }
    config.validate()?;

    match cli.command {
        Commands::Process { count, count_flag } => {
            info!("🚀 Chinese Video Processor starting...");
            info!("{}", config.summary());

            let pipeline = VideoPipeline::new(config)?;
            let summary = pipeline.run(count_flag.or(count)).await?;

            if summary.failed > 0 {
                warn!("⚠️ {} videos failed, see manifest.json for details", summary.failed);
            }
        }
        Commands::Split {
            video,
            srt,
            parts,
            overlap,
            output,
        } => {
            let parts = parts.unwrap_or(config.split.default_splits);
            let overlap = overlap.unwrap_or(config.split.overlap_secs);

            let written = split_local(&config, &video, &srt, parts, overlap, output).await?;

            info!("🎉 Created {} parts", written.len());
            for part in &written {
                info!(
                    "  Part {}: {:.1}s - {:.1}s -> {}",
                    part.index,
                    part.range_start,
                    part.range_end,
                    part.video.display()
                );
            }
        }
        Commands::Plan {
            srt,
            duration,
            parts,
            overlap,
        } => {
            let parts = parts.unwrap_or(config.split.default_splits);
            let overlap = overlap.unwrap_or(config.split.overlap_secs);

            let cues = normalize_cues(SRTParser::parse_file(&srt).await?.to_cues());
            let media_duration = duration.unwrap_or_default();

            let segments = plan_segments(media_duration, &cues, parts, overlap)?;

            println!(
                "{:>4}  {:>10}  {:>10}  {:>8}  {:>10}  {:>10}  {:>8}  {:>5}",
                "part", "core", "", "length", "range", "", "length", "cues"
            );
            for segment in &segments {
                println!(
                    "{:>4}  {:>10.3}  {:>10.3}  {:>8.3}  {:>10.3}  {:>10.3}  {:>8.3}  {:>5}",
                    segment.index,
                    segment.core_start.as_secs_f64(),
                    segment.core_end.as_secs_f64(),
                    segment.core_duration().as_secs_f64(),
                    segment.range_start.as_secs_f64(),
                    segment.range_end.as_secs_f64(),
                    segment.range_duration().as_secs_f64(),
                    segment.cues.len()
                );
            }
        }
    }

    Ok(())
}

/// Seconds (`754.2`) or an SRT-style timestamp (`00:12:34,200`)
fn parse_duration_arg(value: &str) -> std::result::Result<Duration, String> {
    if value.contains(':') {
        return SRTFormatter::parse_timestamp(value).map_err(|e| e.to_string());
    }
    value
        .parse::<f64>()
        .map_err(|e| e.to_string())
        .and_then(|secs| Duration::try_from_secs_f64(secs).map_err(|e| e.to_string()))
}

fn init_logging(verbose: bool, default_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
