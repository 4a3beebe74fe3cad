//! FFmpeg 命令构建与调用

use crate::error::{Result, VideoError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// FFmpeg 命令构建器，支持多个输入
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// （`-i` 之前的参数, 输入路径）
    inputs: Vec<(Vec<String>, PathBuf)>,
    output_args: Vec<String>,
    output: PathBuf,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
            log_level: "error".to_string(),
        }
    }

    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(Vec::<String>::new(), path)
    }

    /// 带输入选项的输入（如 `-loop 1`）
    pub fn input_with<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push((
            args.into_iter().map(Into::into).collect(),
            path.as_ref().to_path_buf(),
        ));
        self
    }

    /// concat demuxer 输入，读取 `file '...'` 列表
    pub fn concat_list(self, list: impl AsRef<Path>) -> Self {
        self.input_with(["-f", "concat", "-safe", "0"], list)
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    pub fn tune(self, tune: impl Into<String>) -> Self {
        self.output_arg("-tune").output_arg(tune)
    }

    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    pub fn frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// 输出时长上限
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// 最短的输入流结束时停止
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// 不重新编码，直接复制所有流
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), self.log_level.clone()];

        for (input_args, path) in &self.inputs {
            args.extend(input_args.iter().cloned());
            args.push("-i".to_string());
            args.push(path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// 外部编码器；每次调用等待进程退出
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn run(&self, cmd: &FfmpegCommand) -> Result<()>;

    /// 媒体时长（秒）
    async fn probe_duration(&self, path: &Path) -> Result<f64>;
}

#[derive(Debug, Default, Clone)]
pub struct FfmpegEncoder;

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn run(&self, cmd: &FfmpegCommand) -> Result<()> {
        let ffmpeg = check_ffmpeg()?;
        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let result = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| VideoError::ffmpeg(format!("Failed to run FFmpeg: {}", e), None, None))?;

        if !result.status.success() {
            return Err(VideoError::ffmpeg(
                format!("FFmpeg failed to write {}", cmd.output().display()),
                Some(String::from_utf8_lossy(&result.stderr).to_string()),
                result.status.code(),
            ));
        }
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let ffprobe = which::which("ffprobe")
            .map_err(|_| VideoError::ffmpeg("FFprobe not found in PATH", None, None))?;

        let output = Command::new(ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(VideoError::ffmpeg(
                "FFprobe failed",
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
                output.status.code(),
            ));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_duration(stdout: &str) -> Result<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| VideoError::ffmpeg(format!("Unexpected duration output: {:?}", stdout.trim()), None, None))
}

/// 检查 FFmpeg 是否可用
pub fn check_ffmpeg() -> Result<PathBuf> {
    which::which("ffmpeg").map_err(|_| VideoError::ffmpeg("FFmpeg not found in PATH", None, None))
}

/// concat 列表中的一条
pub fn concat_entry(path: &Path, duration: Option<f64>) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    match duration {
        Some(d) => format!("file '{}'\nduration {}\n", escaped, d),
        None => format!("file '{}'\n", escaped),
    }
}
