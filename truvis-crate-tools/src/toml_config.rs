use anyhow::Context;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// 从 TOML 文件加载配置
pub fn load_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> anyhow::Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("读取配置文件失败: {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("解析 TOML 配置失败: {:?}", path))
}

/// 加载配置，文件不存在时使用默认值
///
/// 文件存在但解析失败仍然返回错误，避免悄悄吞掉写错的配置。
pub fn load_toml_or_default<T: DeserializeOwned + Default, P: AsRef<Path>>(path: P) -> anyhow::Result<T> {
    let path = path.as_ref();
    if !path.exists() {
        log::warn!("config {:?} not found, using defaults", path);
        return Ok(T::default());
    }
    load_toml(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Default, Debug, PartialEq)]
    struct Sample {
        #[serde(default)]
        width: u32,
        #[serde(default)]
        name: String,
    }

    #[test]
    fn test_missing_file_uses_default() {
        let path = std::env::temp_dir().join("truvis_crate_tools_missing.toml");
        let _ = fs::remove_file(&path);
        let sample: Sample = load_toml_or_default(&path).unwrap();
        assert_eq!(sample, Sample::default());
    }

    #[test]
    fn test_load_and_reject_malformed() {
        let dir = std::env::temp_dir();
        let good = dir.join("truvis_crate_tools_good.toml");
        fs::write(&good, "width = 1920\nname = \"main\"\n").unwrap();
        let sample: Sample = load_toml(&good).unwrap();
        assert_eq!(sample.width, 1920);
        assert_eq!(sample.name, "main");

        let bad = dir.join("truvis_crate_tools_bad.toml");
        fs::write(&bad, "width = \"wide\"").unwrap();
        assert!(load_toml_or_default::<Sample, _>(&bad).is_err());
    }
}
