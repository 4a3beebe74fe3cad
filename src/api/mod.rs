pub mod openai;
pub mod qwen;
pub mod retry;

pub use openai::OpenAiClient;
pub use qwen::QwenClient;

use crate::error::{Result, VideoError};
use async_trait::async_trait;
use reqwest::Client;

/// 远程生成服务：文本、图片、语音
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// 对话补全，返回模型输出的原始文本
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// 生成一张方形图片；seed 用于同一角色多张图的画风一致
    async fn generate_image(&self, prompt: &str, seed: Option<u64>) -> Result<Vec<u8>>;

    /// 文本转语音
    async fn generate_speech(&self, text: &str) -> Result<Vec<u8>>;
}

/// 下载远程文件（图片 / 音频 URL）
pub(crate) async fn download(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(VideoError::ApiStatus {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(VideoError::MalformedResponse(format!("empty download from {}", url)));
    }
    Ok(bytes.to_vec())
}

/// 去掉模型输出外层的 markdown 代码块标记
pub fn strip_code_fence(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fences() {
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("  [1]  "), "[1]");
    }
}
