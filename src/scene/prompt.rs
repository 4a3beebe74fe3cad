//! 图片提示词与配音文本的拼装

use crate::scene::character::CharacterManager;
use crate::scene::Scene;

/// 图片提示词最大长度（字符数）
pub const MAX_IMAGE_PROMPT_CHARS: usize = 1000;

const STYLE_PREAMBLE: &str = "anime style scene,";
const STYLE_POSTAMBLE: &str =
    "high quality anime art style, consistent character design, detailed background, cinematic composition";

/// 场景图片提示词，超长时按字符截断
pub fn build_scene_prompt(scene: &Scene, characters: &CharacterManager) -> String {
    let fragments: Vec<String> = scene
        .characters
        .iter()
        .filter_map(|name| {
            characters
                .prompt_for_scene(name, &scene.setting)
                .map(|prompt| format!("{}: {}", name, prompt))
        })
        .collect();

    let mut parts = vec![
        STYLE_PREAMBLE.to_string(),
        scene.image_prompt.trim().to_string(),
        format!("setting: {}", scene.setting.trim()),
    ];
    if !fragments.is_empty() {
        parts.push(format!("characters: {}", fragments.join("; ")));
    }
    parts.push(STYLE_POSTAMBLE.to_string());

    truncate_chars(&parts.join(" "), MAX_IMAGE_PROMPT_CHARS)
}

/// 配音文本：场景设定 + 每句对白（不念说话人）。为空时返回 None
pub fn build_narration_text(scene: &Scene) -> Option<String> {
    let parts: Vec<&str> = std::iter::once(scene.setting.as_str())
        .chain(scene.dialogue.iter().map(|d| d.text.as_str()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Character, DialogueLine};

    fn scene() -> Scene {
        Scene {
            scene_number: 1,
            characters: vec!["Lin".into(), "Ghost".into()],
            setting: "school rooftop, dusk".into(),
            narration: "The wind picks up.".into(),
            dialogue: vec![
                DialogueLine {
                    speaker: "Lin".into(),
                    text: "You came.".into(),
                },
                DialogueLine {
                    speaker: "Mei".into(),
                    text: "Of course.".into(),
                },
            ],
            image_prompt: "two students facing each other".into(),
        }
    }

    fn manager() -> CharacterManager {
        CharacterManager::new(&[Character {
            name: "Lin".into(),
            description: String::new(),
            appearance: "silver hair".into(),
            personality: String::new(),
        }])
    }

    #[test]
    fn scene_prompt_orders_parts() {
        let prompt = build_scene_prompt(&scene(), &manager());
        assert!(prompt.starts_with("anime style scene, two students facing each other setting: school rooftop, dusk"));
        assert!(prompt.contains("characters: Lin: silver hair, anime style, school rooftop, dusk"));
        assert!(!prompt.contains("Ghost:"));
        assert!(prompt.ends_with("cinematic composition"));
    }

    #[test]
    fn scene_prompt_is_capped() {
        let mut long = scene();
        long.image_prompt = "雨".repeat(3000);
        let prompt = build_scene_prompt(&long, &manager());
        assert_eq!(prompt.chars().count(), MAX_IMAGE_PROMPT_CHARS);
    }

    #[test]
    fn narration_strips_speakers() {
        let text = build_narration_text(&scene()).unwrap();
        assert_eq!(text, "school rooftop, dusk You came. Of course.");
        assert!(!text.contains("Mei"));
    }

    #[test]
    fn empty_narration_is_none() {
        let mut empty = scene();
        empty.setting = "  ".into();
        empty.dialogue.clear();
        assert!(build_narration_text(&empty).is_none());
    }
}
