use crate::scene::{Character, Scene};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// 种子取值范围
pub const SEED_RANGE: u64 = 1_000_000;

/// 角色的视觉档案，保证同名角色在一次运行内画风一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterVisualProfile {
    pub reference_prompt: String,
    pub seed: u64,
}

impl CharacterVisualProfile {
    pub fn new(character: &Character) -> Self {
        Self {
            reference_prompt: reference_prompt(character),
            seed: seed_for(&character.name),
        }
    }
}

/// 由角色名得到稳定的种子（与进程无关）
pub fn seed_for(name: &str) -> u64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes) % SEED_RANGE
}

fn reference_prompt(character: &Character) -> String {
    format!(
        "anime style character portrait, {}, consistent character design, detailed features, \
         professional anime art style, full body reference sheet, character turnaround",
        character.appearance.trim()
    )
}

pub struct CharacterManager {
    characters: HashMap<String, Character>,
    profiles: HashMap<String, CharacterVisualProfile>,
}

impl CharacterManager {
    pub fn new(characters: &[Character]) -> Self {
        let characters: HashMap<String, Character> = characters
            .iter()
            .map(|c| (c.name.clone(), c.clone()))
            .collect();
        let profiles = characters
            .iter()
            .map(|(name, c)| (name.clone(), CharacterVisualProfile::new(c)))
            .collect();

        Self {
            characters,
            profiles,
        }
    }

    pub fn profile(&self, name: &str) -> Option<&CharacterVisualProfile> {
        self.profiles.get(name)
    }

    /// 场景图沿用第一个出场角色的种子；该角色未知或无角色时不指定
    pub fn scene_seed(&self, scene: &Scene) -> Option<u64> {
        let first = scene.characters.first()?;
        self.profile(first).map(|p| p.seed)
    }

    /// 场景图中该角色的描述片段；未知角色返回 None
    pub fn prompt_for_scene(&self, name: &str, scene_context: &str) -> Option<String> {
        let character = self.characters.get(name)?;
        Some(format!(
            "{}, anime style, {}, consistent with character design, detailed and expressive",
            character.appearance.trim(),
            scene_context.trim()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(name: &str) -> Character {
        Character {
            name: name.to_string(),
            description: "student".to_string(),
            appearance: "short silver hair, red scarf".to_string(),
            personality: "quiet".to_string(),
        }
    }

    #[test]
    fn seed_is_deterministic_and_bounded() {
        assert_eq!(seed_for("Lin"), seed_for("Lin"));
        assert!(seed_for("Lin") < SEED_RANGE);
        assert_ne!(seed_for("Lin"), seed_for("Mei"));
    }

    #[test]
    fn same_name_yields_same_profile() {
        let first = CharacterManager::new(&[character("Lin")]);
        let second = CharacterManager::new(&[character("Lin")]);
        assert_eq!(first.profile("Lin"), second.profile("Lin"));
        let profile = first.profile("Lin").unwrap();
        assert!(profile.reference_prompt.contains("short silver hair, red scarf"));
        assert!(profile.reference_prompt.starts_with("anime style character portrait"));
    }

    #[test]
    fn scene_prompt_for_unknown_character_is_none() {
        let manager = CharacterManager::new(&[character("Lin")]);
        assert!(manager.prompt_for_scene("Nobody", "rooftop").is_none());
        let prompt = manager.prompt_for_scene("Lin", "rooftop at dusk").unwrap();
        assert!(prompt.contains("rooftop at dusk"));
    }

    #[test]
    fn scene_seed_follows_first_character() {
        let manager = CharacterManager::new(&[character("Lin"), character("Mei")]);
        let mut scene = Scene {
            scene_number: 1,
            characters: vec!["Mei".into(), "Lin".into()],
            setting: String::new(),
            narration: String::new(),
            dialogue: Vec::new(),
            image_prompt: String::new(),
        };
        assert_eq!(manager.scene_seed(&scene), Some(seed_for("Mei")));

        scene.characters = vec!["Stranger".into()];
        assert_eq!(manager.scene_seed(&scene), None);
        scene.characters.clear();
        assert_eq!(manager.scene_seed(&scene), None);
    }
}
