//! Truvis 工具集
//!
//! 提供日志初始化、TOML 配置加载、资源路径管理等通用工具。
//!
//! # TruvisPath
//! 基于工作区根目录的统一路径管理，避免硬编码相对路径。
//!
//! # 配置
//! 所有配置文件都是 TOML，通过 [`toml_config::load_toml`] 读取。

pub mod init_log;
pub mod resource;
pub mod toml_config;
