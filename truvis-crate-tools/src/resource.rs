use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let config = TruvisPath::config_path("renderer.toml");   // config/renderer.toml
/// let shot = TruvisPath::screenshots_path("frame.png");    // target/screenshots/frame.png
/// ```
pub struct TruvisPath {}
// 核心路径
impl TruvisPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }
}
// 根目录下
impl TruvisPath {
    /// 获取 `config/` 目录下的文件路径
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("config").join(filename)
    }

    /// 截图输出目录：`target/screenshots/`
    pub fn screenshots_path(filename: &str) -> PathBuf {
        Self::target_path().join("screenshots").join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_under_workspace() {
        let root = TruvisPath::workspace_path();
        assert!(TruvisPath::config_path("renderer.toml").starts_with(&root));
        assert!(TruvisPath::screenshots_path("a.png").starts_with(TruvisPath::target_path()));
    }
}
