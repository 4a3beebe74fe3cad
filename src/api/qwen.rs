use crate::api::retry::{with_backoff, RetryPolicy};
use crate::api::{download, GenerationBackend};
use crate::error::{Result, VideoError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

const QWEN_TEXT_API: &str = "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";
const QWEN_IMAGE_API: &str = "https://dashscope.aliyuncs.com/api/v1/services/aigc/text2image/image-synthesis";
const QWEN_TTS_API: &str = "https://dashscope.aliyuncs.com/api/v1/services/aigc/text2speech/speech-synthesis";
const QWEN_TASK_API: &str = "https://dashscope.aliyuncs.com/api/v1/tasks";

/// DashScope 默认模型
const TEXT_MODEL: &str = "qwen-plus";
const IMAGE_MODEL: &str = "wanx-v1";
const TTS_MODEL: &str = "cosyvoice-v1";
const TTS_VOICE: &str = "longxiaochun";

#[derive(Debug, Clone)]
pub struct QwenClient {
    api_key: String,
    client: Client,
    retry: RetryPolicy,
    poll_interval: Duration,
    max_polls: u32,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    output: ImageOutput,
}

#[derive(Debug, Deserialize)]
struct ImageOutput {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct ImageTaskResponse {
    output: ImageTaskOutput,
}

#[derive(Debug, Deserialize)]
struct ImageTaskOutput {
    task_status: String,
    results: Option<Vec<ImageResult>>,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    url: String,
}

impl QwenClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| VideoError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(5),
            // 最多等待 5 分钟
            max_polls: 60,
        })
    }

    async fn post(&self, url: &str, body: &Value, async_task: bool) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if async_task {
            request = request.header("X-DashScope-Async", "enable");
        }

        let response = request.json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VideoError::ApiStatus {
                status: status.as_u16(),
                body: error_text,
            });
        }
        Ok(response)
    }

    async fn complete_once(&self, system: &str, user: &str) -> Result<String> {
        let request_body = json!({
            "model": TEXT_MODEL,
            "input": {
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user }
                ]
            },
            "parameters": {
                "result_format": "message"
            }
        });

        let response_json: Value = self.post(QWEN_TEXT_API, &request_body, false).await?.json().await?;

        response_json["output"]["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| VideoError::MalformedResponse("Failed to extract generated text".to_string()))
    }

    async fn submit_image_task(&self, prompt: &str, seed: Option<u64>) -> Result<String> {
        let request_body = image_task_body(prompt, seed);

        let task_response: ImageGenerationResponse = self
            .post(QWEN_IMAGE_API, &request_body, true)
            .await?
            .json()
            .await?;

        info!("Image generation task submitted: {}", task_response.output.task_id);
        Ok(task_response.output.task_id)
    }

    async fn wait_for_image_task(&self, task_id: &str) -> Result<String> {
        let get_url = format!("{}/{}", QWEN_TASK_API, task_id);

        for i in 0..self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(&get_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                warn!("Failed to get task status (HTTP {}): {}", status, error_text);
                continue;
            }

            let response_text = response.text().await?;
            let task_result: ImageTaskResponse = serde_json::from_str(&response_text)
                .map_err(|e| VideoError::MalformedResponse(format!("Failed to parse task response: {}", e)))?;

            match task_result.output.task_status.as_str() {
                "SUCCEEDED" => {
                    return task_result
                        .output
                        .results
                        .and_then(|results| results.into_iter().next())
                        .map(|r| r.url)
                        .ok_or_else(|| VideoError::MalformedResponse("No image URL in response".to_string()));
                }
                "FAILED" => {
                    return Err(VideoError::ApiError("Image generation failed".to_string()));
                }
                other => {
                    info!("Task status: {} (poll {}/{})", other, i + 1, self.max_polls);
                }
            }
        }

        // 可重试：外层退避会重新提交任务
        Err(VideoError::Timeout(format!("image task {} still pending after {} polls", task_id, self.max_polls)))
    }

    async fn image_once(&self, prompt: &str, seed: Option<u64>) -> Result<Vec<u8>> {
        let task_id = self.submit_image_task(prompt, seed).await?;
        let image_url = self.wait_for_image_task(&task_id).await?;

        info!("Downloading image from: {}", image_url);
        download(&self.client, &image_url).await
    }

    async fn speech_once(&self, text: &str) -> Result<Vec<u8>> {
        let request_body = json!({
            "model": TTS_MODEL,
            "input": {
                "text": text
            },
            "parameters": {
                "voice": TTS_VOICE,
                "format": "mp3"
            }
        });

        let response = self.post(QWEN_TTS_API, &request_body, false).await?;
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));

        // 千问 TTS 可能直接返回音频，也可能返回音频 URL
        if is_json {
            let body: Value = response.json().await?;
            let audio_url = body["output"]["audio_url"]
                .as_str()
                .ok_or_else(|| VideoError::MalformedResponse("TTS response has no audio_url".to_string()))?;
            return download(&self.client, audio_url).await;
        }

        let audio_data = response.bytes().await?;
        if audio_data.is_empty() {
            return Err(VideoError::MalformedResponse("empty audio body".to_string()));
        }
        Ok(audio_data.to_vec())
    }
}

#[async_trait]
impl GenerationBackend for QwenClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        info!("Generating text using Qwen...");
        with_backoff(&self.retry, "qwen text", || self.complete_once(system, user)).await
    }

    async fn generate_image(&self, prompt: &str, seed: Option<u64>) -> Result<Vec<u8>> {
        info!("Generating image for prompt: {}", prompt);
        with_backoff(&self.retry, "qwen image", || self.image_once(prompt, seed)).await
    }

    async fn generate_speech(&self, text: &str) -> Result<Vec<u8>> {
        info!("Generating speech for text: {}", text);
        with_backoff(&self.retry, "qwen speech", || self.speech_once(text)).await
    }
}

fn image_task_body(prompt: &str, seed: Option<u64>) -> Value {
    let mut body = json!({
        "model": IMAGE_MODEL,
        "input": {
            "prompt": prompt
        },
        "parameters": {
            "size": "1024*1024",
            "n": 1
        }
    });
    if let Some(seed) = seed {
        body["parameters"]["seed"] = json!(seed);
    }
    body
}
