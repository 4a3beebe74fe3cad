//! 远程调用的指数退避重试，以及主备地址切换

use crate::error::{Result, VideoError};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 每个地址的总尝试次数（含第一次）
    pub max_attempts: u32,
    /// 第二次尝试前的等待，之后每次翻倍
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次（从 1 开始）失败后的等待时间
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, operation, "Request succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    operation,
                    "Request failed, retrying..."
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    error!(attempts = attempt, error = %e, operation, "Request failed after all retry attempts");
                } else {
                    error!(error = %e, operation, "Request failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// 按顺序尝试各地址，一个地址重试用尽后再换下一个；不可重试的错误立即返回
pub async fn with_fallback<T, F, Fut>(
    endpoints: &[String],
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for (idx, endpoint) in endpoints.iter().enumerate() {
        match with_backoff(policy, operation, || op(endpoint.clone())).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if idx + 1 < endpoints.len() {
                    warn!(endpoint = %endpoint, operation, "Endpoint exhausted, switching to backup");
                }
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| VideoError::ConfigError("no endpoints configured".to_string())))
}
