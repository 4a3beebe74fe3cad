use crate::api::GenerationBackend;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait AssetProvider: Send + Sync {
    /// 图片字节；无法生成时返回 None
    async fn image_for(&self, prompt: &str, seed: Option<u64>) -> Option<Vec<u8>>;

    /// 配音字节；文本为空或无法生成时返回 None
    async fn speech_for(&self, text: &str) -> Option<Vec<u8>>;
}

/// 未配置凭据时使用，所有请求都返回 None
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredProvider;

#[async_trait]
impl AssetProvider for UnconfiguredProvider {
    async fn image_for(&self, _prompt: &str, _seed: Option<u64>) -> Option<Vec<u8>> {
        info!("No API key configured, skipping image generation");
        None
    }

    async fn speech_for(&self, _text: &str) -> Option<Vec<u8>> {
        info!("No API key configured, skipping speech generation");
        None
    }
}

/// 远程服务；重试由后端完成，这里把最终失败降级为 None
pub struct RemoteAssetProvider {
    backend: Arc<dyn GenerationBackend>,
}

impl RemoteAssetProvider {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AssetProvider for RemoteAssetProvider {
    async fn image_for(&self, prompt: &str, seed: Option<u64>) -> Option<Vec<u8>> {
        if prompt.trim().is_empty() {
            return None;
        }
        match self.backend.generate_image(prompt, seed).await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => {
                warn!("Image provider returned an empty body");
                None
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "Image unavailable");
                None
            }
        }
    }

    async fn speech_for(&self, text: &str) -> Option<Vec<u8>> {
        if text.trim().is_empty() {
            return None;
        }
        match self.backend.generate_speech(text).await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => {
                warn!("Speech provider returned an empty body");
                None
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "Speech unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, VideoError};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingBackend {
        calls: AtomicU32,
    }

    #[async_trait]
    impl GenerationBackend for FailingBackend {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Err(VideoError::ApiError("down".into()))
        }

        async fn generate_image(&self, _prompt: &str, _seed: Option<u64>) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(VideoError::ApiStatus {
                status: 503,
                body: "unavailable".into(),
            })
        }

        async fn generate_speech(&self, _text: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(VideoError::MalformedResponse("bad".into()))
        }
    }

    #[tokio::test]
    async fn unconfigured_never_produces_assets() {
        let provider = UnconfiguredProvider;
        assert!(provider.image_for("a castle", None).await.is_none());
        assert!(provider.speech_for("hello").await.is_none());
    }

    #[tokio::test]
    async fn remote_failures_degrade_to_no_asset() {
        let backend = Arc::new(FailingBackend {
            calls: AtomicU32::new(0),
        });
        let provider = RemoteAssetProvider::new(backend.clone());
        assert!(provider.image_for("a castle", None).await.is_none());
        assert!(provider.speech_for("hello").await.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_text_skips_the_call() {
        let backend = Arc::new(FailingBackend {
            calls: AtomicU32::new(0),
        });
        let provider = RemoteAssetProvider::new(backend.clone());
        assert!(provider.speech_for("   ").await.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
