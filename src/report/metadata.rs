use crate::error::Result;
use crate::scene::{Character, SceneRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// 一次运行的元数据，预览页面据此渲染
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub characters: Vec<Character>,
    /// 角色名 -> 参考图路径
    pub character_references: BTreeMap<String, PathBuf>,
    pub scenes: Vec<SceneRecord>,
    pub total_scenes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,
}

impl RunMetadata {
    pub fn new(
        characters: Vec<Character>,
        character_references: BTreeMap<String, PathBuf>,
        scenes: Vec<SceneRecord>,
    ) -> Self {
        let total_scenes = scenes.len();
        Self {
            characters,
            character_references,
            scenes,
            total_scenes,
            video_path: None,
        }
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        info!("Metadata saved to: {}", path.display());
        Ok(())
    }

    #[cfg(test)]
    pub async fn read(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    #[tokio::test]
    async fn writes_expected_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("anime_metadata.json");
        let scene = Scene {
            scene_number: 1,
            characters: vec!["Lin".into()],
            setting: "roof".into(),
            narration: "wind".into(),
            dialogue: Vec::new(),
            image_prompt: "p".into(),
        };
        let mut record = SceneRecord::new(&scene);
        record.image_path = Some(PathBuf::from("images/scene_001.png"));

        let mut metadata = RunMetadata::new(
            Vec::new(),
            BTreeMap::from([("Lin".to_string(), PathBuf::from("images/character_ref_Lin.png"))]),
            vec![record],
        );
        metadata.write(&path).await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total_scenes"], 1);
        assert_eq!(value["scenes"][0]["image_path"], "images/scene_001.png");
        assert!(value["scenes"][0]["audio_path"].is_null());
        assert_eq!(value["character_references"]["Lin"], "images/character_ref_Lin.png");
        assert!(value.get("video_path").is_none());

        metadata.video_path = Some(PathBuf::from("videos/anime_output.mp4"));
        metadata.write(&path).await.unwrap();
        assert_eq!(RunMetadata::read(&path).await.unwrap(), metadata);
    }
}
