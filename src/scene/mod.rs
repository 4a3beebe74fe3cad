pub mod analyzer;
pub mod assembler;
pub mod character;
pub mod prompt;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 小说中的角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 外貌特征，用作图片生成提示词
    #[serde(default)]
    pub appearance: String,
    #[serde(default)]
    pub personality: String,
}

/// 一句对白
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub text: String,
}

/// 表示一个场景/分镜
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// 场景序号，从 1 开始
    pub scene_number: u32,
    /// 出场角色名
    #[serde(default)]
    pub characters: Vec<String>,
    /// 地点与时间
    #[serde(default)]
    pub setting: String,
    #[serde(default)]
    pub narration: String,
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
    /// 用于生成图片的描述
    #[serde(default)]
    pub image_prompt: String,
}

impl Scene {
    /// 文件名中使用的三位序号，例如 `scene_007`
    pub fn file_stem(&self) -> String {
        format!("scene_{:03}", self.scene_number)
    }
}

/// 场景及其生成的素材路径
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub scene_number: u32,
    pub characters: Vec<String>,
    pub setting: String,
    pub narration: String,
    pub dialogue: Vec<DialogueLine>,
    pub image_prompt: String,
    pub image_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
}

impl SceneRecord {
    pub fn new(scene: &Scene) -> Self {
        Self {
            scene_number: scene.scene_number,
            characters: scene.characters.clone(),
            setting: scene.setting.clone(),
            narration: scene.narration.clone(),
            dialogue: scene.dialogue.clone(),
            image_prompt: scene.image_prompt.clone(),
            image_path: None,
            audio_path: None,
        }
    }
}
