//! Main entry point for dlmux CLI

use anyhow::{anyhow, Context};
use clap::Parser;
use dlmux::cli::{Args, DownloadDisplay, OutputFormatter};
use dlmux::core::{select_audio, select_video, Manifest, MergeOutcome, MergePipeline};
use dlmux::decipher::{self, DecipherRoutine};
use dlmux::download::ChunkScheduler;
use dlmux::merge::FfmpegMerger;
use dlmux::utils::{ext_from_mime, to_safe_filename};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let args = Args::parse();
    debug!("starting dlmux with args: {:?}", args);
    let formatter = OutputFormatter::new(args.verbosity_level());

    match run(&args, &formatter).await {
        Ok(()) => Ok(()),
        Err(err) => {
            formatter.error(&format!("{err:#}"));
            std::process::exit(1);
        }
    }
}

async fn run(args: &Args, formatter: &OutputFormatter) -> anyhow::Result<()> {
    let manifest_text = std::fs::read_to_string(&args.manifest)
        .with_context(|| format!("failed to read manifest {}", args.manifest.display()))?;
    let manifest = Manifest::parse(&manifest_text)?;

    if args.list {
        formatter.print_stream_list(&manifest);
        return Ok(());
    }

    manifest.ensure_downloadable()?;

    let video = select_video(manifest.adaptive_streams())?;
    let audio = select_audio(manifest.adaptive_streams())?;
    info!(
        video = video.quality_label.as_deref().unwrap_or("?"),
        audio = %audio.mime_type,
        "selected streams"
    );

    let routine = if video.needs_descrambling() || audio.needs_descrambling() {
        Some(load_routine(args.player.as_deref()).await?)
    } else {
        None
    };

    let scheduler = ChunkScheduler::new(reqwest::Client::new())
        .with_chunk_size(args.chunk_size)
        .with_concurrency(args.concurrency);
    let pipeline = MergePipeline::new(FfmpegMerger::new(&args.ffmpeg))
        .with_scheduler(scheduler)
        .with_merge_deadline(args.merge_deadline());

    formatter.info(&format!("downloading \"{}\"", manifest.title));
    let display = DownloadDisplay::new(
        video.content_length,
        audio.content_length,
        !args.show_progress(),
    );
    let outcome = pipeline
        .run(video, audio, routine.as_ref(), |track, snapshot| {
            display.update(track, snapshot)
        })
        .await?;
    display.finish();

    let out_dir = args.output.clone().unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(&out_dir).await?;

    match outcome {
        MergeOutcome::Merged(bytes) => {
            let path = out_dir.join(to_safe_filename(&manifest.title, "", "mp4"));
            tokio::fs::write(&path, &bytes).await?;
            formatter.success(&format!("saved {}", path.display()));
        }
        MergeOutcome::Unmerged {
            video: video_bytes,
            audio: audio_bytes,
        } => {
            // Merge failure is never fatal: deliver both raw tracks.
            formatter.warning("merging failed or timed out, saving separate video and audio tracks");
            let video_path = out_dir.join(to_safe_filename(
                &manifest.title,
                "-videoonly",
                ext_from_mime(&video.mime_type),
            ));
            let audio_path = out_dir.join(to_safe_filename(
                &manifest.title,
                "-audioonly",
                ext_from_mime(&audio.mime_type),
            ));
            tokio::fs::write(&video_path, &video_bytes).await?;
            tokio::fs::write(&audio_path, &audio_bytes).await?;
            formatter.success(&format!(
                "saved {} and {}",
                video_path.display(),
                audio_path.display()
            ));
        }
    }

    Ok(())
}

/// Load the player script and compile the descrambling routine from it.
async fn load_routine(player: Option<&str>) -> anyhow::Result<DecipherRoutine> {
    let spec = player.ok_or_else(|| {
        anyhow!("selected streams require signature descrambling; pass --player <PATH_OR_URL>")
    })?;

    let source = if spec.starts_with("http://") || spec.starts_with("https://") {
        reqwest::get(spec)
            .await?
            .error_for_status()?
            .text()
            .await
            .with_context(|| format!("failed to fetch player script from {spec}"))?
    } else {
        std::fs::read_to_string(spec)
            .with_context(|| format!("failed to read player script {spec}"))?
    };

    let extraction = decipher::extract(&source)?;
    let routine = decipher::compile(&extraction)?;
    info!(steps = routine.len(), "compiled descrambling routine");
    Ok(routine)
}

/// Initialize logging system
fn init_logging() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();

    Ok(())
}
