mod api;
mod assets;
mod config;
mod error;
mod layout;
mod pipeline;
mod report;
mod scene;
mod video;

use anyhow::Context;
use clap::Parser;
use config::{Config, ProviderKind};
use pipeline::{Pipeline, RunOptions, VideoStage};
use report::write_preview;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use video::{check_ffmpeg, FfmpegEncoder};

#[derive(Parser, Debug)]
#[command(name = "auto-anime")]
#[command(about = "Turn a novel into an illustrated, narrated anime slideshow", long_about = None)]
struct Args {
    /// Input text for generation
    #[arg(short, long)]
    text: Option<String>,

    /// Input novel text file path
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Output root (defaults to OUTPUT_DIR or ./output); each run gets its own subdirectory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Name of the run subdirectory (generated from the current time when omitted)
    #[arg(long)]
    run_name: Option<String>,

    /// Skip image generation
    #[arg(long)]
    no_images: bool,

    /// Skip narration audio generation
    #[arg(long)]
    no_audio: bool,

    /// Skip video composition
    #[arg(long)]
    no_video: bool,

    /// Skip writing preview.html
    #[arg(long)]
    no_preview: bool,

    /// Frame rate of the silent slideshow
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// Generation service: openai or dashscope
    #[arg(long)]
    provider: Option<String>,

    /// API key for the selected service
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    // 加载环境变量
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(provider) = &args.provider {
        let kind: ProviderKind = provider.parse()?;
        config.select_provider(kind);
    }
    if let Some(key) = args.api_key.clone() {
        config.api_key = Some(key);
    }
    if let Some(dir) = args.output_dir.clone() {
        config.output_dir = dir;
    }
    config.run_name = args.run_name.clone();

    // 获取输入文本
    let input_text = if let Some(text) = args.text.clone() {
        text
    } else if let Some(file_path) = &args.file {
        tokio::fs::read_to_string(file_path)
            .await
            .with_context(|| format!("Failed to read file: {}", file_path.display()))?
    } else {
        eprintln!("Error: Either --text or --file must be provided");
        std::process::exit(1);
    };

    if input_text.trim().is_empty() {
        eprintln!("Error: input text is empty");
        std::process::exit(1);
    }

    // 缺少 ffmpeg 只影响视频，图片和音频照常生成
    match check_ffmpeg() {
        Ok(path) => info!("Using FFmpeg at {}", path.display()),
        Err(_) if !args.no_video => {
            warn!("FFmpeg not found in PATH; install it to enable video generation (e.g. apt-get install ffmpeg / brew install ffmpeg)")
        }
        Err(_) => {}
    }

    info!("Starting anime generation...");
    info!("Input text length: {} characters", input_text.chars().count());

    let pipeline = Pipeline::from_config(&config, Arc::new(FfmpegEncoder))?;
    info!("Output directory: {}", pipeline.layout().root().display());

    let options = RunOptions {
        generate_images: !args.no_images,
        generate_audio: !args.no_audio,
        generate_video: !args.no_video,
        fps: args.fps,
    };

    let report = match pipeline.run(&input_text, &options).await {
        Ok(report) => report,
        Err(e) => {
            error!("Anime generation failed: {}", e);
            std::process::exit(1);
        }
    };

    if !args.no_preview {
        write_preview(&report.metadata, pipeline.layout())
            .await
            .context("Failed to write preview page")?;
    }

    println!("\nSummary:");
    println!("  - Characters: {}", report.metadata.characters.len());
    println!("  - Scenes: {}", report.metadata.total_scenes);
    if options.generate_images {
        println!("  - Character references: {}", report.metadata.character_references.len());
    }
    match &report.video {
        VideoStage::Finished(outcome) => match outcome.path() {
            Some(path) => println!("  - Video: {}", path.display()),
            None => println!("  - Video: not produced ({:?})", outcome),
        },
        VideoStage::Failed(reason) => println!("  - Video: failed ({})", reason),
        VideoStage::Skipped => {}
    }
    println!("  - Metadata: {}", report.metadata_path.display());

    info!("Anime generation completed!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_fps_is_rejected_at_parse_time() {
        assert!(Args::try_parse_from(["auto-anime", "--text", "x", "--fps", "0"]).is_err());
        let args = Args::try_parse_from(["auto-anime", "--text", "x", "--fps", "2"]).unwrap();
        assert_eq!(args.fps, 2);
        assert_eq!(Args::try_parse_from(["auto-anime", "--text", "x"]).unwrap().fps, 1);
    }
}
