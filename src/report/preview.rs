use crate::error::Result;
use crate::layout::RunLayout;
use crate::report::RunMetadata;
use crate::scene::{Character, SceneRecord};
use std::path::{Path, PathBuf};
use tracing::info;

const STYLE: &str = r#"
        body { font-family: "Microsoft YaHei", Arial, sans-serif; max-width: 1200px; margin: 0 auto; padding: 20px; background-color: #f5f5f5; }
        h1 { color: #333; text-align: center; }
        .characters { display: flex; flex-wrap: wrap; gap: 20px; margin-bottom: 40px; }
        .character-card { background: white; padding: 15px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); flex: 1; min-width: 250px; }
        .character-card h3 { margin-top: 0; color: #2c3e50; }
        .character-card img, .scene img { max-width: 100%; border-radius: 4px; }
        .scene { background: white; padding: 20px; margin-bottom: 30px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        .scene h2 { color: #2c3e50; margin-top: 0; }
        .scene-setting { background: #ecf0f1; padding: 10px; border-left: 4px solid #3498db; margin: 10px 0; }
        .narration { line-height: 1.8; color: #555; margin: 15px 0; }
        .dialogue { margin: 10px 0; padding: 10px; background: #fff9e6; border-left: 3px solid #f39c12; }
        .dialogue strong { color: #e67e22; }
        audio { width: 100%; margin: 10px 0; }
        .video-container { background: white; padding: 20px; margin-bottom: 30px; border-radius: 8px; text-align: center; }
        .video-container video { max-width: 100%; border-radius: 4px; }
"#;

/// 生成 preview.html 并返回其路径
pub async fn write_preview(metadata: &RunMetadata, layout: &RunLayout) -> Result<PathBuf> {
    let html = render_preview(metadata, layout);
    let path = layout.preview_path();
    tokio::fs::write(&path, html).await?;
    info!("Preview page saved to: {}", path.display());
    Ok(path)
}

pub fn render_preview(metadata: &RunMetadata, layout: &RunLayout) -> String {
    let src = |path: &Path| escape(&layout.relative(path).to_string_lossy());
    let mut html = format!(
        "<!DOCTYPE html>\n<html lang=\"zh-CN\">\n<head>\n    <meta charset=\"UTF-8\">\n    \
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n    \
         <title>动漫预览</title>\n    <style>{}    </style>\n</head>\n<body>\n    <h1>动漫预览</h1>\n",
        STYLE
    );

    if let Some(video) = &metadata.video_path {
        html.push_str(&format!(
            "    <div class=\"video-container\">\n        <h2>完整视频</h2>\n        <video controls>\n            \
             <source src=\"{}\" type=\"video/mp4\">\n        </video>\n    </div>\n",
            src(video)
        ));
    }

    html.push_str("    <h2>角色介绍</h2>\n    <div class=\"characters\">\n");
    for character in &metadata.characters {
        let reference = metadata.character_references.get(&character.name).map(|p| src(p));
        html.push_str(&character_card(character, reference.as_deref()));
    }
    html.push_str("    </div>\n\n    <h2>场景</h2>\n");

    for scene in &metadata.scenes {
        html.push_str(&scene_block(scene, &src));
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn character_card(character: &Character, reference_src: Option<&str>) -> String {
    let image = reference_src
        .map(|src| format!("            <img src=\"{}\" alt=\"{}\">\n", src, escape(&character.name)))
        .unwrap_or_default();
    format!(
        "        <div class=\"character-card\">\n            <h3>{}</h3>\n            \
         <p><strong>描述：</strong>{}</p>\n            <p><strong>外貌：</strong>{}</p>\n            \
         <p><strong>性格：</strong>{}</p>\n{}        </div>\n",
        escape(&character.name),
        escape(&character.description),
        escape(&character.appearance),
        escape(&character.personality),
        image
    )
}

fn scene_block(scene: &SceneRecord, src: &dyn Fn(&Path) -> String) -> String {
    let mut block = format!(
        "    <div class=\"scene\">\n        <h2>场景 {}</h2>\n        \
         <div class=\"scene-setting\"><strong>场景：</strong>{}</div>\n",
        scene.scene_number,
        escape(&scene.setting)
    );
    if let Some(image) = &scene.image_path {
        block.push_str(&format!(
            "        <img src=\"{}\" alt=\"场景 {}\">\n",
            src(image),
            scene.scene_number
        ));
    }
    block.push_str(&format!("        <div class=\"narration\">{}</div>\n", escape(&scene.narration)));
    if let Some(audio) = &scene.audio_path {
        block.push_str(&format!(
            "        <audio controls><source src=\"{}\" type=\"audio/mpeg\"></audio>\n",
            src(audio)
        ));
    }
    if !scene.dialogue.is_empty() {
        block.push_str("        <div class=\"dialogues\">\n");
        for line in &scene.dialogue {
            block.push_str(&format!(
                "            <div class=\"dialogue\"><strong>{}：</strong>{}</div>\n",
                escape(&line.speaker),
                escape(&line.text)
            ));
        }
        block.push_str("        </div>\n");
    }
    block.push_str("    </div>\n");
    block
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::DialogueLine;
    use std::collections::BTreeMap;

    fn metadata(layout: &RunLayout) -> RunMetadata {
        let record = SceneRecord {
            scene_number: 1,
            characters: vec!["Lin".into()],
            setting: "roof <night>".into(),
            narration: "Tom & Jerry".into(),
            dialogue: vec![DialogueLine {
                speaker: "Lin".into(),
                text: "\"hello\"".into(),
            }],
            image_prompt: String::new(),
            image_path: Some(layout.images_dir().join("scene_001.png")),
            audio_path: None,
        };
        RunMetadata::new(
            vec![Character {
                name: "Lin".into(),
                description: "d".into(),
                appearance: "a".into(),
                personality: "p".into(),
            }],
            BTreeMap::from([("Lin".to_string(), layout.images_dir().join("character_ref_Lin.png"))]),
            vec![record],
        )
    }

    #[test]
    fn escapes_text_and_uses_relative_paths() {
        let layout = RunLayout::new("/srv/out");
        let html = render_preview(&metadata(&layout), &layout);

        assert!(html.contains("roof &lt;night&gt;"));
        assert!(html.contains("Tom &amp; Jerry"));
        assert!(html.contains("&quot;hello&quot;"));
        assert!(html.contains("src=\"images/scene_001.png\""));
        assert!(html.contains("src=\"images/character_ref_Lin.png\""));
        assert!(!html.contains("<video"));
        assert!(!html.contains("<audio"));
    }

    #[test]
    fn video_shown_when_present() {
        let layout = RunLayout::new("/srv/out");
        let mut metadata = metadata(&layout);
        metadata.video_path = Some(layout.videos_dir().join("anime_output.mp4"));
        let html = render_preview(&metadata, &layout);
        assert!(html.contains("<source src=\"videos/anime_output.mp4\" type=\"video/mp4\">"));
    }

    #[tokio::test]
    async fn writes_preview_file() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(tmp.path());
        let path = write_preview(&metadata(&layout), &layout).await.unwrap();
        assert_eq!(path, layout.preview_path());
        assert!(std::fs::read_to_string(path).unwrap().contains("<h1>动漫预览</h1>"));
    }
}
