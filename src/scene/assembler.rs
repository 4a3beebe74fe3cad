use crate::assets::AssetProvider;
use crate::error::Result;
use crate::layout::RunLayout;
use crate::scene::character::CharacterManager;
use crate::scene::prompt::{build_narration_text, build_scene_prompt};
use crate::scene::{Character, Scene, SceneRecord};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// 各素材阶段的开关，互不影响
#[derive(Debug, Clone, Copy)]
pub struct AssemblyOptions {
    pub generate_images: bool,
    pub generate_audio: bool,
}

/// 为角色和场景拉取素材并落盘，生成 SceneRecord 列表
pub struct SceneAssembler<'a> {
    assets: Arc<dyn AssetProvider>,
    characters: &'a CharacterManager,
    layout: &'a RunLayout,
    options: AssemblyOptions,
}

impl<'a> SceneAssembler<'a> {
    pub fn new(
        assets: Arc<dyn AssetProvider>,
        characters: &'a CharacterManager,
        layout: &'a RunLayout,
        options: AssemblyOptions,
    ) -> Self {
        Self {
            assets,
            characters,
            layout,
            options,
        }
    }

    /// 角色参考图，返回 角色名 -> 图片路径（只包含成功生成的）
    pub async fn character_references(&self, characters: &[Character]) -> Result<BTreeMap<String, PathBuf>> {
        let mut refs = BTreeMap::new();
        if !self.options.generate_images {
            info!("Skipped character reference images");
            return Ok(refs);
        }

        for character in characters {
            let Some(profile) = self.characters.profile(&character.name) else {
                continue;
            };
            info!("Generating reference image for {}", character.name);
            if let Some(bytes) = self
                .assets
                .image_for(&profile.reference_prompt, Some(profile.seed))
                .await
            {
                let path = self
                    .layout
                    .images_dir()
                    .join(format!("character_ref_{}.png", file_safe(&character.name)));
                save(&path, &bytes).await?;
                refs.insert(character.name.clone(), path);
            }
        }
        Ok(refs)
    }

    /// 按顺序处理每个场景；单个素材缺失不影响后续场景
    pub async fn assemble(&self, scenes: &[Scene]) -> Result<Vec<SceneRecord>> {
        let mut records = Vec::with_capacity(scenes.len());
        let total = scenes.len();

        for (idx, scene) in scenes.iter().enumerate() {
            info!("Scene {} ({}/{}): {}", scene.scene_number, idx + 1, total, scene.setting);
            let mut record = SceneRecord::new(scene);

            if self.options.generate_images {
                let prompt = build_scene_prompt(scene, self.characters);
                let seed = self.characters.scene_seed(scene);
                if let Some(bytes) = self.assets.image_for(&prompt, seed).await {
                    let path = self.layout.images_dir().join(format!("{}.png", scene.file_stem()));
                    save(&path, &bytes).await?;
                    record.image_path = Some(path);
                }
            }

            if self.options.generate_audio {
                if let Some(text) = build_narration_text(scene) {
                    if let Some(bytes) = self.assets.speech_for(&text).await {
                        let path = self.layout.audio_dir().join(format!("{}.mp3", scene.file_stem()));
                        save(&path, &bytes).await?;
                        record.audio_path = Some(path);
                    }
                }
            }

            records.push(record);
        }

        Ok(records)
    }
}

async fn save(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    info!("Saved: {}", path.display());
    Ok(())
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::UnconfiguredProvider;
    use crate::scene::DialogueLine;
    use crate::scene::character::seed_for;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 按提示词决定是否返回素材
    struct SelectiveProvider {
        image_calls: Mutex<Vec<(String, Option<u64>)>>,
    }

    #[async_trait]
    impl AssetProvider for SelectiveProvider {
        async fn image_for(&self, prompt: &str, seed: Option<u64>) -> Option<Vec<u8>> {
            self.image_calls.lock().unwrap().push((prompt.to_string(), seed));
            if prompt.contains("broken") {
                None
            } else {
                Some(b"png".to_vec())
            }
        }

        async fn speech_for(&self, text: &str) -> Option<Vec<u8>> {
            text.contains("speak").then(|| b"mp3".to_vec())
        }
    }

    fn character() -> Character {
        Character {
            name: "Lin/Li".into(),
            description: String::new(),
            appearance: "silver hair".into(),
            personality: String::new(),
        }
    }

    fn scene(n: u32, prompt: &str, line: &str) -> Scene {
        Scene {
            scene_number: n,
            characters: vec!["Lin/Li".into()],
            setting: String::new(),
            narration: String::new(),
            dialogue: vec![DialogueLine {
                speaker: "Lin/Li".into(),
                text: line.into(),
            }],
            image_prompt: prompt.into(),
        }
    }

    #[tokio::test]
    async fn partial_failures_leave_paths_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(tmp.path());
        let manager = CharacterManager::new(&[character()]);
        let provider = Arc::new(SelectiveProvider {
            image_calls: Mutex::new(Vec::new()),
        });
        let assembler = SceneAssembler::new(
            provider.clone(),
            &manager,
            &layout,
            AssemblyOptions {
                generate_images: true,
                generate_audio: true,
            },
        );

        let scenes = vec![
            scene(1, "a meadow", "speak now"),
            scene(2, "broken prompt", "silence"),
            scene(3, "a harbor", ""),
        ];
        let records = assembler.assemble(&scenes).await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].image_path, Some(layout.images_dir().join("scene_001.png")));
        assert_eq!(records[0].audio_path, Some(layout.audio_dir().join("scene_001.mp3")));
        assert!(records[1].image_path.is_none());
        assert!(records[1].audio_path.is_none());
        assert!(records[2].image_path.is_some());
        assert!(records[2].audio_path.is_none());
        assert!(layout.images_dir().join("scene_003.png").exists());

        let refs = assembler.character_references(&[character()]).await.unwrap();
        assert_eq!(refs["Lin/Li"], layout.images_dir().join("character_ref_Lin_Li.png"));
        assert!(refs["Lin/Li"].exists());
    }

    #[tokio::test]
    async fn disabled_stages_make_no_calls() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(tmp.path());
        let manager = CharacterManager::new(&[character()]);
        let provider = Arc::new(SelectiveProvider {
            image_calls: Mutex::new(Vec::new()),
        });
        let assembler = SceneAssembler::new(
            provider.clone(),
            &manager,
            &layout,
            AssemblyOptions {
                generate_images: false,
                generate_audio: true,
            },
        );

        let records = assembler.assemble(&[scene(1, "a meadow", "speak")]).await.unwrap();
        let refs = assembler.character_references(&[character()]).await.unwrap();

        assert!(refs.is_empty());
        assert!(provider.image_calls.lock().unwrap().is_empty());
        assert!(records[0].image_path.is_none());
        assert!(records[0].audio_path.is_some());
    }

    #[tokio::test]
    async fn unconfigured_provider_yields_empty_records() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(tmp.path());
        let manager = CharacterManager::new(&[character()]);
        let assembler = SceneAssembler::new(
            Arc::new(UnconfiguredProvider),
            &manager,
            &layout,
            AssemblyOptions {
                generate_images: true,
                generate_audio: true,
            },
        );

        let records = assembler.assemble(&[scene(1, "x", "speak")]).await.unwrap();
        assert!(records[0].image_path.is_none());
        assert!(records[0].audio_path.is_none());
    }

    #[tokio::test]
    async fn character_seed_reaches_image_requests() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(tmp.path());
        let manager = CharacterManager::new(&[character()]);
        let provider = Arc::new(SelectiveProvider {
            image_calls: Mutex::new(Vec::new()),
        });
        let assembler = SceneAssembler::new(
            provider.clone(),
            &manager,
            &layout,
            AssemblyOptions {
                generate_images: true,
                generate_audio: false,
            },
        );

        assembler.character_references(&[character()]).await.unwrap();
        let mut lonely = scene(2, "an empty street", "");
        lonely.characters.clear();
        assembler.assemble(&[scene(1, "a meadow", ""), lonely]).await.unwrap();

        let expected = Some(seed_for("Lin/Li"));
        let calls = provider.image_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].1, expected);
        assert_eq!(calls[1].1, expected);
        assert_eq!(calls[2].1, None);
    }
}
