use crate::error::{Result, VideoError};
use std::path::PathBuf;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://openai.qiniu.com/v1";
pub const DEFAULT_OPENAI_BACKUP_URL: &str = "https://api.qnaigc.com/v1";

/// 后端服务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI 兼容接口（七牛等）
    OpenAi,
    /// 阿里云 DashScope（千问）
    DashScope,
}

impl ProviderKind {
    /// 该服务凭据对应的环境变量
    pub fn key_var(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::DashScope => "DASHSCOPE_API_KEY",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "dashscope" | "qwen" => Ok(ProviderKind::DashScope),
            other => Err(VideoError::ConfigError(format!("unknown provider: {}", other))),
        }
    }
}

/// 进程级配置，启动后只读
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: String,
    pub backup_url: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub output_dir: PathBuf,
    /// 运行目录名；为空时每次运行自动生成
    pub run_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            backup_url: Some(DEFAULT_OPENAI_BACKUP_URL.to_string()),
            text_model: "gpt-3.5-turbo".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            tts_model: "tts".to_string(),
            tts_voice: "qiniu_zh_female_wwxkjx".to_string(),
            output_dir: PathBuf::from("output"),
            run_name: None,
        }
    }
}

impl Config {
    /// 从环境变量读取配置（调用前应先执行 dotenvy::dotenv）
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let provider = match get("AUTO_ANIME_PROVIDER") {
            Some(value) => value.parse()?,
            None => defaults.provider,
        };

        let api_key = get(provider.key_var());

        Ok(Self {
            provider,
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            backup_url: get("OPENAI_BACKUP_URL").or(defaults.backup_url),
            text_model: get("TEXT_MODEL").unwrap_or(defaults.text_model),
            image_model: get("IMAGE_MODEL").unwrap_or(defaults.image_model),
            tts_model: get("TTS_MODEL").unwrap_or(defaults.tts_model),
            tts_voice: get("TTS_VOICE").unwrap_or(defaults.tts_voice),
            output_dir: get("OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            run_name: None,
        })
    }

    /// 切换服务，并从环境变量重新读取对应凭据
    pub fn select_provider(&mut self, provider: ProviderKind) {
        self.provider = provider;
        self.api_key = std::env::var(provider.key_var())
            .ok()
            .filter(|v| !v.trim().is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.backup_url.as_deref(), Some(DEFAULT_OPENAI_BACKUP_URL));
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn picks_key_for_selected_provider() {
        let config = Config::from_lookup(lookup(&[
            ("AUTO_ANIME_PROVIDER", "dashscope"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("DASHSCOPE_API_KEY", "sk-dash"),
        ]))
        .unwrap();
        assert_eq!(config.provider, ProviderKind::DashScope);
        assert_eq!(config.api_key.as_deref(), Some("sk-dash"));
    }

    #[test]
    fn blank_key_counts_as_absent() {
        let config = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn rejects_unknown_provider() {
        assert!(Config::from_lookup(lookup(&[("AUTO_ANIME_PROVIDER", "nope")])).is_err());
    }
}
