pub mod ffmpeg;
pub mod generator;

pub use ffmpeg::{check_ffmpeg, Encoder, FfmpegEncoder};
pub use generator::{VideoGenerator, VideoOutcome};
