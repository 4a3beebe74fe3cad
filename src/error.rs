use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("API returned HTTP {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Scene processing error: {0}")]
    SceneError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("FFmpeg error: {message}")]
    FfmpegError {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },
}

impl VideoError {
    pub fn ffmpeg(message: impl Into<String>, stderr: Option<String>, exit_code: Option<i32>) -> Self {
        Self::FfmpegError {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// 是否属于可重试的临时故障（超时、限流、5xx）
    pub fn is_retryable(&self) -> bool {
        match self {
            VideoError::ApiStatus { status, .. } => is_transient_status(*status),
            VideoError::Timeout(_) => true,
            VideoError::HttpError(e) => {
                if let Some(status) = e.status() {
                    return is_transient_status(status.as_u16());
                }
                e.is_timeout() || e.is_connect() || e.is_request()
            }
            _ => false,
        }
    }
}

/// 408 / 429 / 5xx 视为临时故障
pub fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

pub type Result<T> = std::result::Result<T, VideoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(503));
        assert!(is_transient_status(408));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(401));
        assert!(!is_transient_status(404));
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        let rate_limited = VideoError::ApiStatus {
            status: 429,
            body: "slow down".into(),
        };
        let bad_request = VideoError::ApiStatus {
            status: 400,
            body: "bad prompt".into(),
        };
        assert!(rate_limited.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!VideoError::MalformedResponse("no data".into()).is_retryable());
        assert!(!VideoError::ffmpeg("boom", None, Some(1)).is_retryable());
    }

    #[test]
    fn timeouts_are_retryable() {
        assert!(VideoError::Timeout("image task".into()).is_retryable());
    }
}
