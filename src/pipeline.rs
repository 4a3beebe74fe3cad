use crate::api::{GenerationBackend, OpenAiClient, QwenClient};
use crate::assets::{AssetProvider, RemoteAssetProvider, UnconfiguredProvider};
use crate::config::{Config, ProviderKind};
use crate::error::{Result, VideoError};
use crate::layout::RunLayout;
use crate::report::RunMetadata;
use crate::scene::analyzer::{HeuristicAnalyzer, LlmAnalyzer, TextAnalyzer};
use crate::scene::assembler::{AssemblyOptions, SceneAssembler};
use crate::scene::character::CharacterManager;
use crate::video::{Encoder, VideoGenerator, VideoOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const VIDEO_FILENAME: &str = "anime_output.mp4";

/// 各阶段开关，互相独立
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub generate_images: bool,
    pub generate_audio: bool,
    pub generate_video: bool,
    /// 无声幻灯片的帧率
    pub fps: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            generate_images: true,
            generate_audio: true,
            generate_video: true,
            fps: 1,
        }
    }
}

/// 视频阶段的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoStage {
    Skipped,
    Finished(VideoOutcome),
    /// 编码或拼接失败；图片、音频和元数据保留
    Failed(String),
}

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub metadata_path: PathBuf,
    pub video: VideoStage,
}

pub struct Pipeline {
    analyzer: Box<dyn TextAnalyzer>,
    assets: Arc<dyn AssetProvider>,
    encoder: Arc<dyn Encoder>,
    layout: RunLayout,
}

impl Pipeline {
    pub fn new(
        analyzer: Box<dyn TextAnalyzer>,
        assets: Arc<dyn AssetProvider>,
        encoder: Arc<dyn Encoder>,
        layout: RunLayout,
    ) -> Self {
        Self {
            analyzer,
            assets,
            encoder,
            layout,
        }
    }

    /// 按配置选择远程服务或本地降级实现；每个 Pipeline 使用自己的运行目录
    pub fn from_config(config: &Config, encoder: Arc<dyn Encoder>) -> Result<Self> {
        let (analyzer, assets) = providers_from_config(config)?;
        let layout = RunLayout::for_run(&config.output_dir, config.run_name.as_deref());
        Ok(Self::new(analyzer, assets, encoder, layout))
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub async fn run(&self, text: &str, options: &RunOptions) -> Result<RunReport> {
        if text.trim().is_empty() {
            return Err(VideoError::SceneError("input text is empty".to_string()));
        }
        self.layout.create_dirs().await?;

        info!("Step 1/5: Extracting characters...");
        let characters = self.analyzer.extract_characters(text).await?;
        for character in &characters {
            info!("  - {}: {}", character.name, character.description);
        }
        let manager = CharacterManager::new(&characters);

        info!("Step 2/5: Splitting scenes...");
        let scenes = self.analyzer.split_into_scenes(text, &characters).await?;
        if scenes.is_empty() {
            return Err(VideoError::SceneError("text analysis produced no scenes".to_string()));
        }
        info!("Split into {} scenes", scenes.len());

        let assembler = SceneAssembler::new(
            self.assets.clone(),
            &manager,
            &self.layout,
            AssemblyOptions {
                generate_images: options.generate_images,
                generate_audio: options.generate_audio,
            },
        );

        info!("Step 3/5: Generating character references...");
        let character_references = assembler.character_references(&characters).await?;

        info!("Step 4/5: Generating scene assets...");
        let records = assembler.assemble(&scenes).await?;

        let mut metadata = RunMetadata::new(characters, character_references, records);
        let metadata_path = self.layout.metadata_path();
        metadata.write(&metadata_path).await?;

        let video = if options.generate_video {
            info!("Step 5/5: Generating video...");
            self.composite(&mut metadata, options).await
        } else {
            info!("Step 5/5: Skipped video generation");
            VideoStage::Skipped
        };

        if metadata.video_path.is_some() {
            metadata.write(&metadata_path).await?;
        }

        Ok(RunReport {
            metadata,
            metadata_path,
            video,
        })
    }

    async fn composite(&self, metadata: &mut RunMetadata, options: &RunOptions) -> VideoStage {
        let generator = VideoGenerator::new(
            self.layout.videos_dir(),
            self.layout.segments_dir(),
            self.encoder.clone(),
        );

        match generator
            .generate_video(&metadata.scenes, options.fps, options.generate_audio, VIDEO_FILENAME)
            .await
        {
            Ok(outcome) => {
                match &outcome {
                    VideoOutcome::Produced(path) => metadata.video_path = Some(path.clone()),
                    VideoOutcome::NotProduced(reason) => warn!(?reason, "Video not produced"),
                }
                VideoStage::Finished(outcome)
            }
            Err(e) => {
                error!(error = %e, "Video generation failed");
                VideoStage::Failed(e.to_string())
            }
        }
    }
}

fn providers_from_config(config: &Config) -> Result<(Box<dyn TextAnalyzer>, Arc<dyn AssetProvider>)> {
    let Some(api_key) = config.api_key.clone() else {
        warn!("No API key configured: using paragraph-based scenes, images and audio will be skipped");
        return Ok((Box::new(HeuristicAnalyzer), Arc::new(UnconfiguredProvider)));
    };

    let backend: Arc<dyn GenerationBackend> = match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(config, api_key)?),
        ProviderKind::DashScope => Arc::new(QwenClient::new(api_key)?),
    };

    Ok((
        Box::new(LlmAnalyzer::new(backend.clone())),
        Arc::new(RemoteAssetProvider::new(backend)),
    ))
}
