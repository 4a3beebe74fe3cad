use crate::api::retry::{with_fallback, RetryPolicy};
use crate::api::{download, GenerationBackend};
use crate::config::Config;
use crate::error::{Result, VideoError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

pub const IMAGE_SIZE: &str = "1024x1024";

/// OpenAI 兼容接口客户端，支持主备两个 base URL
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    endpoints: Vec<String>,
    client: Client,
    text_model: String,
    image_model: String,
    tts_model: String,
    voice: String,
    retry: RetryPolicy,
}

/// 图片接口返回的两种形式
#[derive(Debug, PartialEq, Eq)]
enum ImagePayload {
    Inline(Vec<u8>),
    Url(String),
}

impl OpenAiClient {
    pub fn new(config: &Config, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| VideoError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let mut endpoints = vec![config.base_url.trim_end_matches('/').to_string()];
        if let Some(backup) = &config.backup_url {
            let backup = backup.trim_end_matches('/').to_string();
            if !endpoints.contains(&backup) {
                endpoints.push(backup);
            }
        }

        Ok(Self {
            api_key,
            endpoints,
            client,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            tts_model: config.tts_model.clone(),
            voice: config.tts_voice.clone(),
            retry: RetryPolicy::default(),
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Response> {
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VideoError::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn chat_once(&self, base: String, system: &str, user: &str) -> Result<String> {
        let request_body = json!({
            "model": self.text_model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": 0.7
        });

        let response: Value = self
            .post_json(&format!("{}/chat/completions", base), &request_body)
            .await?
            .json()
            .await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| VideoError::MalformedResponse("missing choices[0].message.content".to_string()))
    }

    fn image_request(&self, prompt: &str, seed: Option<u64>) -> Value {
        let mut body = json!({
            "model": self.image_model,
            "prompt": prompt,
            "size": IMAGE_SIZE,
            "n": 1,
            "response_format": "b64_json"
        });
        if let Some(seed) = seed {
            body["seed"] = json!(seed);
        }
        body
    }

    async fn image_once(&self, base: String, prompt: &str, seed: Option<u64>) -> Result<Vec<u8>> {
        let request_body = self.image_request(prompt, seed);

        let response: Value = self
            .post_json(&format!("{}/images/generations", base), &request_body)
            .await?
            .json()
            .await?;

        match parse_image_payload(&response)? {
            ImagePayload::Inline(bytes) => Ok(bytes),
            ImagePayload::Url(url) => {
                info!("Downloading image from: {}", url);
                download(&self.client, &url).await
            }
        }
    }

    async fn speech_once(&self, base: String, text: &str) -> Result<Vec<u8>> {
        let request_body = json!({
            "model": self.tts_model,
            "input": text,
            "voice": self.voice,
            "response_format": "mp3"
        });

        let response = self
            .post_json(&format!("{}/audio/speech", base), &request_body)
            .await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        decode_speech_body(content_type.as_deref(), &body)
    }
}

#[async_trait]
impl GenerationBackend for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        with_fallback(&self.endpoints, &self.retry, "chat completion", |base| {
            self.chat_once(base, system, user)
        })
        .await
    }

    async fn generate_image(&self, prompt: &str, seed: Option<u64>) -> Result<Vec<u8>> {
        with_fallback(&self.endpoints, &self.retry, "image generation", |base| {
            self.image_once(base, prompt, seed)
        })
        .await
    }

    async fn generate_speech(&self, text: &str) -> Result<Vec<u8>> {
        with_fallback(&self.endpoints, &self.retry, "speech generation", |base| {
            self.speech_once(base, text)
        })
        .await
    }
}

fn parse_image_payload(response: &Value) -> Result<ImagePayload> {
    let first = &response["data"][0];

    if let Some(encoded) = first["b64_json"].as_str() {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| VideoError::MalformedResponse(format!("invalid base64 image: {}", e)))?;
        return Ok(ImagePayload::Inline(bytes));
    }
    if let Some(url) = first["url"].as_str() {
        return Ok(ImagePayload::Url(url.to_string()));
    }

    Err(VideoError::MalformedResponse(
        "image response has neither b64_json nor url".to_string(),
    ))
}

/// 语音接口可能直接返回音频，也可能返回带 base64 的 JSON
fn decode_speech_body(content_type: Option<&str>, body: &[u8]) -> Result<Vec<u8>> {
    let is_json = content_type.is_some_and(|ct| ct.contains("json"));

    if !is_json {
        if body.is_empty() {
            return Err(VideoError::MalformedResponse("empty audio body".to_string()));
        }
        return Ok(body.to_vec());
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| VideoError::MalformedResponse(format!("invalid speech JSON: {}", e)))?;
    let encoded = value["data"]
        .as_str()
        .or_else(|| value["audio"].as_str())
        .ok_or_else(|| VideoError::MalformedResponse("speech JSON has no audio data".to_string()))?;
    let audio = BASE64
        .decode(encoded.trim())
        .map_err(|e| VideoError::MalformedResponse(format!("invalid base64 audio: {}", e)))?;
    if audio.is_empty() {
        return Err(VideoError::MalformedResponse("empty audio body".to_string()));
    }
    Ok(audio)
}
