use std::collections::BTreeMap;
use std::path::Path;

use ash::vk;
use serde::{Deserialize, Serialize};
use truvis_render_interface::bindless_manager::BindlessManager;
use truvis_render_interface::device::DeviceCapabilities;
use truvis_render_interface::frame_counter::ResourceLifetime;

/// headless 设备的能力，真实设备忽略这一项
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub hdr_display: bool,
    pub variable_rate_shading: bool,
    pub max_texture_2d_dimension: u32,
    pub hdr_max_nits: f32,
}
impl Default for DeviceConfig {
    fn default() -> Self {
        let caps = DeviceCapabilities::default();
        Self {
            hdr_display: caps.hdr_display,
            variable_rate_shading: caps.variable_rate_shading,
            max_texture_2d_dimension: caps.max_texture_2d_dimension,
            hdr_max_nits: caps.hdr_max_nits,
        }
    }
}
impl From<DeviceConfig> for DeviceCapabilities {
    fn from(config: DeviceConfig) -> Self {
        Self {
            hdr_display: config.hdr_display,
            variable_rate_shading: config.variable_rate_shading,
            max_texture_2d_dimension: config.max_texture_2d_dimension,
            hdr_max_nits: config.hdr_max_nits,
        }
    }
}

/// 渲染器配置，对应 `config/renderer.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub render_resolution: [u32; 2],
    pub output_resolution: [u32; 2],
    pub viewport: [f32; 2],
    /// 动态 buffer 与延迟删除资源的生命周期（帧）
    pub resource_lifetime: u32,
    pub bindless_texture_capacity: usize,
    pub bindless_light_capacity: usize,
    pub texture_loader_threads: usize,
    pub shader_compile_threads: usize,
    pub frame_limit: f32,
    pub log_level: String,
    pub device: DeviceConfig,
    /// 以选项名为 key，在默认值之后依次应用
    pub options: BTreeMap<String, f32>,
}
impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            render_resolution: [1920, 1080],
            output_resolution: [1920, 1080],
            viewport: [1920.0, 1080.0],
            resource_lifetime: ResourceLifetime::DEFAULT_LIFETIME,
            bindless_texture_capacity: BindlessManager::DEFAULT_TEXTURE_CAPACITY,
            bindless_light_capacity: BindlessManager::DEFAULT_LIGHT_CAPACITY,
            texture_loader_threads: 2,
            shader_compile_threads: 4,
            frame_limit: 60.0,
            log_level: "info".to_string(),
            device: DeviceConfig::default(),
            options: BTreeMap::new(),
        }
    }
}
impl RendererConfig {
    /// 文件不存在时使用默认配置
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        truvis_crate_tools::toml_config::load_toml_or_default(path)
    }

    #[inline]
    pub fn render_extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.render_resolution[0],
            height: self.render_resolution[1],
        }
    }

    #[inline]
    pub fn output_extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.output_resolution[0],
            height: self.output_resolution[1],
        }
    }
}
