use std::collections::HashMap;

use crate::command_recorder::{CommandList, RecordedCommand};
use crate::pipeline_settings::PresentSettings;
use crate::texture::TexturePool;

/// 设备与显示器的能力
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceCapabilities {
    pub hdr_display: bool,
    pub variable_rate_shading: bool,
    pub max_texture_2d_dimension: u32,
    pub hdr_max_nits: f32,
}
impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            hdr_display: false,
            variable_rate_shading: false,
            max_texture_2d_dimension: 16384,
            hdr_max_nits: 1000.0,
        }
    }
}

/// 渲染器看到的设备
///
/// 图形 API 层实现这个 trait；测试和 headless app 使用 [`HeadlessDevice`]。
pub trait RenderDevice {
    fn capabilities(&self) -> DeviceCapabilities;

    fn is_valid_resolution(&self, width: u32, height: u32) -> bool {
        let max = self.capabilities().max_texture_2d_dimension;
        width > 0 && height > 0 && width <= max && height <= max
    }

    /// 等待所有队列空闲
    fn wait_all_queues(&mut self);

    /// 提交一帧的命令
    fn submit(&mut self, cmd: CommandList, textures: &TexturePool);

    /// 上一帧测得的 GPU 时间
    fn gpu_frame_time_ms(&self) -> f32;

    /// 上一次提交解析出的遮挡查询结果
    fn occlusion_results(&self) -> HashMap<u64, bool>;

    fn present_settings(&self) -> PresentSettings;
    fn set_swapchain_hdr(&mut self, enabled: bool);
    fn set_swapchain_vsync(&mut self, enabled: bool);
}

/// 没有 GPU 的设备
///
/// 在 CPU 上执行 clear / copy / blit，记录每次提交，GPU 时间和遮挡结果可由外部设定。
#[derive(Default)]
pub struct HeadlessDevice {
    capabilities: DeviceCapabilities,
    present: PresentSettings,

    gpu_frame_time_ms: f32,
    /// 被 GPU 判定为遮挡的查询 id
    occluded_queries: HashMap<u64, bool>,
    resolved_queries: HashMap<u64, bool>,

    last_submission: Vec<RecordedCommand>,
    submit_count: u64,
    wait_count: u64,
}
// new & init
impl HeadlessDevice {
    pub fn new(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            gpu_frame_time_ms: 16.0,
            ..Default::default()
        }
    }
}
// getters
impl HeadlessDevice {
    #[inline]
    pub fn last_submission(&self) -> &[RecordedCommand] {
        &self.last_submission
    }
    #[inline]
    pub fn submit_count(&self) -> u64 {
        self.submit_count
    }
    #[inline]
    pub fn wait_count(&self) -> u64 {
        self.wait_count
    }
}
// update
impl HeadlessDevice {
    #[inline]
    pub fn set_gpu_frame_time_ms(&mut self, ms: f32) {
        self.gpu_frame_time_ms = ms;
    }

    /// 设定下一次提交时某个查询的结果
    #[inline]
    pub fn set_query_occluded(&mut self, id: u64, occluded: bool) {
        self.occluded_queries.insert(id, occluded);
    }
}
impl RenderDevice for HeadlessDevice {
    #[inline]
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn wait_all_queues(&mut self) {
        self.wait_count += 1;
    }

    fn submit(&mut self, cmd: CommandList, textures: &TexturePool) {
        let _span = tracy_client::span!("HeadlessDevice::submit");

        self.resolved_queries.clear();
        let commands = cmd.into_commands();
        for command in &commands {
            match command {
                RecordedCommand::ClearTexture { texture, color } => {
                    if let Some(texture) = textures.get(*texture) {
                        texture.fill(*color);
                    }
                }
                RecordedCommand::Copy { src, dst } | RecordedCommand::Blit { src, dst } => {
                    if let (Some(src), Some(dst)) = (textures.get(*src), textures.get(*dst)) {
                        dst.copy_from(src);
                    }
                }
                RecordedCommand::EndOcclusionQuery(id) => {
                    let occluded = self.occluded_queries.get(id).copied().unwrap_or(false);
                    self.resolved_queries.insert(*id, occluded);
                }
                _ => {}
            }
        }

        self.last_submission = commands;
        self.submit_count += 1;
    }

    #[inline]
    fn gpu_frame_time_ms(&self) -> f32 {
        self.gpu_frame_time_ms
    }

    fn occlusion_results(&self) -> HashMap<u64, bool> {
        self.resolved_queries.clone()
    }

    #[inline]
    fn present_settings(&self) -> PresentSettings {
        self.present
    }

    fn set_swapchain_hdr(&mut self, enabled: bool) {
        log::info!("Swapchain HDR {}", if enabled { "enabled" } else { "disabled" });
        self.present.hdr = enabled;
    }

    fn set_swapchain_vsync(&mut self, enabled: bool) {
        log::info!("Swapchain vsync {}", if enabled { "enabled" } else { "disabled" });
        self.present.vsync = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_recorder::CommandRecorder;
    use crate::texture::{TextureDesc, TextureUsage};
    use ash::vk;

    #[test]
    fn test_resolution_validation() {
        let device = HeadlessDevice::new(DeviceCapabilities {
            max_texture_2d_dimension: 4096,
            ..Default::default()
        });
        assert!(device.is_valid_resolution(1920, 1080));
        assert!(!device.is_valid_resolution(0, 1080));
        assert!(!device.is_valid_resolution(8192, 1080));
    }

    #[test]
    fn test_submit_executes_clears_and_resolves_queries() {
        tracy_client::Client::start();
        let mut pool = TexturePool::new();
        let output = pool.create_render_target(TextureDesc::new_2d(
            "output",
            2,
            2,
            vk::Format::R8G8B8A8_UNORM,
            TextureUsage::RENDER_TARGET | TextureUsage::READBACK,
        ));

        let mut device = HeadlessDevice::new(DeviceCapabilities::default());
        device.set_query_occluded(3, true);

        let mut cmd = CommandList::new();
        cmd.clear_texture(output, [0.0, 1.0, 0.0, 1.0]);
        cmd.begin_occlusion_query(3);
        cmd.end_occlusion_query(3);
        cmd.begin_occlusion_query(4);
        cmd.end_occlusion_query(4);
        device.submit(cmd, &pool);

        assert_eq!(device.submit_count(), 1);
        assert_eq!(&pool.get(output).unwrap().mip_data(0).unwrap()[..4], &[0, 255, 0, 255]);
        let results = device.occlusion_results();
        assert_eq!(results.get(&3), Some(&true));
        assert_eq!(results.get(&4), Some(&false));
    }
}
