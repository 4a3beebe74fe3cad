use crate::error::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const METADATA_FILE: &str = "anime_metadata.json";
pub const PREVIEW_FILE: &str = "preview.html";

/// 一次运行的输出目录结构：images/ audio/ videos/ videos/temp/
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 输出根目录下的独立运行目录；未指定名称时生成一个
    pub fn for_run(output_root: &Path, run_name: Option<&str>) -> Self {
        let name = match run_name {
            Some(name) => name.to_string(),
            None => new_run_id(),
        };
        Self::new(output_root.join(name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join("videos")
    }

    /// 视频片段的临时目录
    pub fn segments_dir(&self) -> PathBuf {
        self.videos_dir().join("temp")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn preview_path(&self) -> PathBuf {
        self.root.join(PREVIEW_FILE)
    }

    pub async fn create_dirs(&self) -> Result<()> {
        for dir in [self.images_dir(), self.audio_dir(), self.videos_dir()] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// 相对于输出根目录的路径，用于预览页面
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// 时间戳加随机后缀，同一秒内启动的运行也不会冲突
pub fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_inside_root() {
        let layout = RunLayout::new("output/run1");
        let image = layout.images_dir().join("scene_001.png");
        assert_eq!(layout.relative(&image), PathBuf::from("images/scene_001.png"));
        assert_eq!(layout.relative(Path::new("/elsewhere/a.png")), PathBuf::from("/elsewhere/a.png"));
    }

    #[tokio::test]
    async fn creates_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(tmp.path().join("run"));
        layout.create_dirs().await.unwrap();
        assert!(layout.images_dir().is_dir());
        assert!(layout.audio_dir().is_dir());
        assert!(layout.videos_dir().is_dir());
    }

    #[test]
    fn runs_get_distinct_directories() {
        let root = Path::new("output");
        let first = RunLayout::for_run(root, None);
        let second = RunLayout::for_run(root, None);
        assert_ne!(first.root(), second.root());
        assert!(first.root().starts_with(root));
        assert_ne!(first.segments_dir(), second.segments_dir());

        let named = RunLayout::for_run(root, Some("chapter1"));
        assert_eq!(named.root(), Path::new("output/chapter1"));
    }
}
