use crate::api::{strip_code_fence, GenerationBackend};
use crate::error::{Result, VideoError};
use crate::scene::prompt::truncate_chars;
use crate::scene::{Character, DialogueLine, Scene};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// 启发式分镜最多取的段落数
pub const MAX_FALLBACK_SCENES: usize = 5;
/// 启发式分镜旁白最大字符数
pub const MAX_FALLBACK_NARRATION_CHARS: usize = 200;

/// 文本分析：提取角色、拆分场景
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn extract_characters(&self, text: &str) -> Result<Vec<Character>>;

    async fn split_into_scenes(&self, text: &str, characters: &[Character]) -> Result<Vec<Scene>>;
}

/// 未配置模型时使用的简单规则
#[derive(Debug, Default, Clone)]
pub struct HeuristicAnalyzer;

#[async_trait]
impl TextAnalyzer for HeuristicAnalyzer {
    async fn extract_characters(&self, _text: &str) -> Result<Vec<Character>> {
        Ok(vec![placeholder_character()])
    }

    async fn split_into_scenes(&self, text: &str, characters: &[Character]) -> Result<Vec<Scene>> {
        Ok(split_paragraphs(text, characters))
    }
}

fn placeholder_character() -> Character {
    Character {
        name: "示例角色".to_string(),
        description: "这是一个示例角色".to_string(),
        appearance: "年轻女性，长黑发，穿着校服，大眼睛".to_string(),
        personality: "开朗活泼，善良友好".to_string(),
    }
}

/// 按空行切分段落，取前 5 段各生成一个场景
fn split_paragraphs(text: &str, characters: &[Character]) -> Vec<Scene> {
    let cast: Vec<String> = characters.first().map(|c| c.name.clone()).into_iter().collect();

    paragraphs(text)
        .into_iter()
        .take(MAX_FALLBACK_SCENES)
        .enumerate()
        .map(|(i, para)| Scene {
            scene_number: i as u32 + 1,
            characters: cast.clone(),
            setting: "场景设置".to_string(),
            narration: truncate_chars(&para, MAX_FALLBACK_NARRATION_CHARS),
            dialogue: Vec::new(),
            image_prompt: format!("anime style scene {}, character in a setting", i + 1),
        })
        .collect()
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                result.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        result.push(current.join("\n"));
    }
    result
}

/// 通过大模型分析文本
pub struct LlmAnalyzer {
    backend: Arc<dyn GenerationBackend>,
}

#[derive(Debug, Deserialize)]
struct RawScene {
    #[serde(default)]
    characters: Vec<String>,
    #[serde(default)]
    setting: String,
    #[serde(default)]
    narration: String,
    #[serde(default)]
    dialogue: Vec<DialogueLine>,
    #[serde(default)]
    image_prompt: String,
}

impl LlmAnalyzer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TextAnalyzer for LlmAnalyzer {
    async fn extract_characters(&self, text: &str) -> Result<Vec<Character>> {
        info!("Extracting characters using LLM...");
        let prompt = format!(
            r#"分析以下小说文本，提取所有主要角色的信息。对于每个角色，提供：
1. 角色名字
2. 角色描述（背景、职业等）
3. 外貌特征（详细描述，用于图像生成）
4. 性格特点

小说文本：
{}

请以JSON格式返回，格式如下：
[
  {{
    "name": "角色名",
    "description": "角色描述",
    "appearance": "外貌特征（详细、具体，适合用于AI图像生成）",
    "personality": "性格特点"
  }}
]

直接返回JSON数组，不要其他说明文字。"#,
            text
        );

        let response = self.backend.complete("你是一个专业的小说分析助手。", &prompt).await?;
        let characters = parse_characters(&response)?;

        if characters.is_empty() {
            warn!("LLM returned no characters, using placeholder");
            return Ok(vec![placeholder_character()]);
        }
        info!("Extracted {} characters", characters.len());
        Ok(characters)
    }

    async fn split_into_scenes(&self, text: &str, characters: &[Character]) -> Result<Vec<Scene>> {
        info!("Splitting text into scenes using LLM...");
        let names: Vec<&str> = characters.iter().map(|c| c.name.as_str()).collect();
        let prompt = format!(
            r#"将以下小说分解成多个场景，每个场景应该：
1. 包含明确的时间和地点
2. 列出场景中出现的角色
3. 提供场景描述和旁白
4. 提取对话
5. 生成适合用于AI图像生成的详细视觉提示词

已知角色：{}

小说文本：
{}

请以JSON格式返回，格式如下：
[
  {{
    "scene_number": 1,
    "characters": ["角色1", "角色2"],
    "setting": "场景地点和时间",
    "narration": "场景旁白描述",
    "dialogue": [
      {{"speaker": "角色1", "text": "对话内容"}},
      {{"speaker": "角色2", "text": "对话内容"}}
    ],
    "image_prompt": "详细的英文图像生成提示词，描述场景、角色位置、动作、氛围等"
  }}
]

直接返回JSON数组，不要其他说明文字。"#,
            names.join(", "),
            text
        );

        let response = self.backend.complete("你是一个专业的小说场景分析师。", &prompt).await?;
        let scenes = parse_scenes(&response)?;

        if scenes.is_empty() {
            warn!("LLM returned no scenes, splitting by paragraphs instead");
            return Ok(split_paragraphs(text, characters));
        }
        info!("Split text into {} scenes", scenes.len());
        Ok(scenes)
    }
}

fn parse_characters(response: &str) -> Result<Vec<Character>> {
    let parsed: Vec<Character> = serde_json::from_str(strip_code_fence(response))
        .map_err(|e| VideoError::MalformedResponse(format!("Failed to parse characters JSON: {}", e)))?;

    // 角色名在一次运行中唯一，保留首次出现
    let mut seen = HashSet::new();
    Ok(parsed
        .into_iter()
        .filter(|c| seen.insert(c.name.clone()))
        .collect())
}

/// 场景按返回顺序重新编号为 1..N
fn parse_scenes(response: &str) -> Result<Vec<Scene>> {
    let parsed: Vec<RawScene> = serde_json::from_str(strip_code_fence(response))
        .map_err(|e| VideoError::MalformedResponse(format!("Failed to parse scenes JSON: {}", e)))?;

    Ok(parsed
        .into_iter()
        .enumerate()
        .map(|(i, raw)| Scene {
            scene_number: i as u32 + 1,
            characters: raw.characters,
            setting: raw.setting,
            narration: raw.narration,
            dialogue: raw.dialogue,
            image_prompt: raw.image_prompt,
        })
        .collect())
}
