use crate::error::{Result, VideoError};
use crate::scene::SceneRecord;
use crate::video::ffmpeg::{concat_entry, Encoder, FfmpegCommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 所有画面统一缩放并居中补边到的正方形边长
pub const FRAME_SIZE: u32 = 1024;
/// 无配音场景的固定时长（秒）
pub const SILENT_SEGMENT_SECS: f64 = 3.0;
/// 分段输出的帧率，所有片段一致才能直接拼接
pub const SEGMENT_FPS: u32 = 30;

/// 缩放到框内再居中补边
pub fn scale_pad_filter() -> String {
    format!(
        "scale={s}:{s}:force_original_aspect_ratio=decrease,pad={s}:{s}:(ow-iw)/2:(oh-ih)/2",
        s = FRAME_SIZE
    )
}

/// 合成策略，在入口处确定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeStrategy {
    /// 无声幻灯片，每张图 1/fps 秒
    SilentSlideshow { fps: u32 },
    /// 每个场景单独编码（配音决定时长）后拼接
    SegmentedWithAudio,
}

impl CompositeStrategy {
    pub fn select(records: &[SceneRecord], audio_enabled: bool, fps: u32) -> Self {
        if audio_enabled && records.iter().any(|r| r.audio_path.is_some()) {
            CompositeStrategy::SegmentedWithAudio
        } else {
            CompositeStrategy::SilentSlideshow { fps }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoVideoReason {
    /// 没有任何场景有图片
    NoImages,
    /// 所有片段都编码失败
    NoSegments,
}

/// 合成结果；未生成视频是正常结果，调用方需要检查
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutcome {
    Produced(PathBuf),
    NotProduced(NoVideoReason),
}

impl VideoOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            VideoOutcome::Produced(path) => Some(path),
            VideoOutcome::NotProduced(_) => None,
        }
    }
}

/// 参与合成的场景：有图片且文件存在
struct Eligible<'a> {
    record: &'a SceneRecord,
    image: PathBuf,
}

pub struct VideoGenerator {
    output_dir: PathBuf,
    segments_dir: PathBuf,
    encoder: Arc<dyn Encoder>,
}

impl VideoGenerator {
    pub fn new(output_dir: impl Into<PathBuf>, segments_dir: impl Into<PathBuf>, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            output_dir: output_dir.into(),
            segments_dir: segments_dir.into(),
            encoder,
        }
    }

    /// 合成最终视频。场景记录只读
    pub async fn generate_video(
        &self,
        records: &[SceneRecord],
        fps: u32,
        audio_enabled: bool,
        output_filename: &str,
    ) -> Result<VideoOutcome> {
        if fps == 0 {
            return Err(VideoError::ConfigError("fps must be non-zero".to_string()));
        }

        let eligible = eligible_records(records).await?;
        if eligible.is_empty() {
            warn!("No scene images found, skipping video generation");
            return Ok(VideoOutcome::NotProduced(NoVideoReason::NoImages));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output_path = self.output_dir.join(output_filename);

        match CompositeStrategy::select(records, audio_enabled, fps) {
            CompositeStrategy::SilentSlideshow { fps } => {
                info!("Generating silent slideshow from {} images at {} fps", eligible.len(), fps);
                self.silent_slideshow(&eligible, fps, &output_path).await
            }
            CompositeStrategy::SegmentedWithAudio => {
                info!("Generating audio-synced video from {} scenes", eligible.len());
                self.segmented_with_audio(&eligible, &output_path).await
            }
        }
    }

    async fn silent_slideshow(&self, eligible: &[Eligible<'_>], fps: u32, output_path: &Path) -> Result<VideoOutcome> {
        let concat_file = self.output_dir.join("concat_list.txt");
        let frame_secs = 1.0 / f64::from(fps);

        let mut concat_content = String::new();
        for item in eligible {
            concat_content.push_str(&concat_entry(&item.image, Some(frame_secs)));
        }
        // 最后一帧再写一次（不带时长），避免编码收尾时被截掉
        if let Some(last) = eligible.last() {
            concat_content.push_str(&concat_entry(&last.image, None));
        }
        tokio::fs::write(&concat_file, concat_content).await?;

        let cmd = FfmpegCommand::new(output_path)
            .concat_list(&concat_file)
            .video_filter(scale_pad_filter())
            .video_codec("libx264")
            .pixel_format("yuv420p")
            .no_audio();

        self.encoder.run(&cmd).await.inspect_err(|e| {
            error!(error = %e, "Slideshow encoding failed");
        })?;

        tokio::fs::remove_file(&concat_file).await.ok();
        info!("Video saved to: {}", output_path.display());
        Ok(VideoOutcome::Produced(output_path.to_path_buf()))
    }

    async fn segmented_with_audio(&self, eligible: &[Eligible<'_>], output_path: &Path) -> Result<VideoOutcome> {
        tokio::fs::create_dir_all(&self.segments_dir).await?;

        let mut segment_paths = Vec::new();
        for item in eligible {
            let scene_number = item.record.scene_number;
            let segment_path = self.segments_dir.join(format!("segment_{:03}.mp4", scene_number));
            let cmd = self.segment_command(item, &segment_path).await;

            // 单个片段失败只丢弃该片段，最终视频中留空
            match self.encoder.run(&cmd).await {
                Ok(()) => {
                    info!("Created segment for scene {}: {}", scene_number, segment_path.display());
                    segment_paths.push(segment_path);
                }
                Err(e) => {
                    warn!(scene = scene_number, error = %e, "Segment encoding failed, dropping scene from video");
                }
            }
        }

        if segment_paths.is_empty() {
            error!("No video segments were produced");
            return Ok(VideoOutcome::NotProduced(NoVideoReason::NoSegments));
        }

        let concat_file = self.segments_dir.join("segments_concat.txt");
        let mut concat_content = String::new();
        for segment in &segment_paths {
            let abs_segment = tokio::fs::canonicalize(segment).await?;
            concat_content.push_str(&concat_entry(&abs_segment, None));
        }
        tokio::fs::write(&concat_file, concat_content).await?;

        info!("Concatenating {} video segments...", segment_paths.len());
        let cmd = FfmpegCommand::new(output_path).concat_list(&concat_file).stream_copy();
        // 拼接失败时保留片段，便于排查
        self.encoder.run(&cmd).await.inspect_err(|e| {
            error!(
                error = %e,
                segments_dir = %self.segments_dir.display(),
                "Concatenation failed, keeping segments"
            );
        })?;

        for segment in &segment_paths {
            tokio::fs::remove_file(segment).await.ok();
        }
        tokio::fs::remove_file(&concat_file).await.ok();

        info!("Video saved to: {}", output_path.display());
        Ok(VideoOutcome::Produced(output_path.to_path_buf()))
    }

    /// 所有片段共用同一套缩放、像素格式和帧率
    async fn segment_command(&self, item: &Eligible<'_>, segment_path: &Path) -> FfmpegCommand {
        let base = FfmpegCommand::new(segment_path).input_with(["-loop", "1"], &item.image);

        match usable_audio(item.record).await {
            Some(audio) => {
                let duration = match self.encoder.probe_duration(&audio).await {
                    Ok(d) => Some(d),
                    Err(e) => {
                        warn!(scene = item.record.scene_number, error = %e, "Could not probe audio duration, relying on -shortest");
                        None
                    }
                };

                let cmd = base
                    .input(&audio)
                    .video_filter(scale_pad_filter())
                    .video_codec("libx264")
                    .tune("stillimage")
                    .audio_codec("aac")
                    .audio_bitrate("192k")
                    .pixel_format("yuv420p")
                    .frame_rate(SEGMENT_FPS);
                let cmd = match duration {
                    Some(d) => cmd.duration(d),
                    None => cmd,
                };
                cmd.shortest()
            }
            None => base
                .video_filter(scale_pad_filter())
                .video_codec("libx264")
                .tune("stillimage")
                .pixel_format("yuv420p")
                .frame_rate(SEGMENT_FPS)
                .duration(SILENT_SEGMENT_SECS)
                .no_audio(),
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

async fn usable_audio(record: &SceneRecord) -> Option<PathBuf> {
    let audio = record.audio_path.as_ref()?;
    if !exists(audio).await {
        warn!(scene = record.scene_number, "Audio file missing: {}", audio.display());
        return None;
    }
    tokio::fs::canonicalize(audio).await.ok()
}

/// 有图片的场景，按场景序号升序
async fn eligible_records(records: &[SceneRecord]) -> Result<Vec<Eligible<'_>>> {
    let mut eligible = Vec::new();
    for record in records {
        let Some(image) = &record.image_path else {
            continue;
        };
        if !exists(image).await {
            warn!(scene = record.scene_number, "Image file missing: {}", image.display());
            continue;
        }
        eligible.push(Eligible {
            record,
            image: tokio::fs::canonicalize(image).await?,
        });
    }
    eligible.sort_by_key(|e| e.record.scene_number);
    Ok(eligible)
}
