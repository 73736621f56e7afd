use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context;
use ash::vk;
use bitflags::bitflags;
use slotmap::SlotMap;

use crate::command_recorder::CommandRecorder;
use crate::handles::TextureHandle;

/// 纹理的 GPU 准备状态机
///
/// 状态流转: Unprepared -> PreparingForGpu -> PreparedForGpu
///                              \-> Unprepared (失败)
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ResourceState {
    /// 初始状态，CPU 数据可能还不完整
    Unprepared = 0,
    /// 加载线程正在生成 mip、计算内存占用
    PreparingForGpu = 1,
    /// 可以被任何 pass 使用
    PreparedForGpu = 2,
}
impl ResourceState {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::PreparingForGpu,
            2 => Self::PreparedForGpu,
            _ => Self::Unprepared,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextureUsage: u32 {
        const SRV = 1 << 0;
        const UAV = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const DEPTH_STENCIL = 1 << 3;
        /// 保留 CPU 侧像素，用于截图和 headless 回读
        const READBACK = 1 << 4;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_layers: u32,
    pub mip_levels: u32,
    pub format: vk::Format,
    pub bits_per_channel: u32,
    pub channel_count: u32,
    pub usage: TextureUsage,
}
impl TextureDesc {
    pub fn new_2d(name: impl Into<String>, width: u32, height: u32, format: vk::Format, usage: TextureUsage) -> Self {
        let (bits_per_channel, channel_count) = format_channels(format);
        Self {
            name: name.into(),
            width,
            height,
            depth: 1,
            array_layers: 1,
            mip_levels: 1,
            format,
            bits_per_channel,
            channel_count,
            usage,
        }
    }

    #[inline]
    pub fn with_mips(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }

    #[inline]
    pub fn with_array_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers.max(1);
        self
    }

    /// 可以容纳的最大 mip 数量
    #[inline]
    pub fn max_mip_count(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }
}

/// 非压缩格式的 (每通道 bit 数, 通道数)
pub fn format_channels(format: vk::Format) -> (u32, u32) {
    match format {
        vk::Format::R8_UNORM => (8, 1),
        vk::Format::R8G8_UNORM => (8, 2),
        vk::Format::R8G8B8A8_UNORM | vk::Format::R8G8B8A8_SRGB | vk::Format::B8G8R8A8_UNORM => (8, 4),
        vk::Format::R16_SFLOAT => (16, 1),
        vk::Format::R16G16_SFLOAT => (16, 2),
        vk::Format::R16G16B16A16_SFLOAT => (16, 4),
        vk::Format::R32_SFLOAT | vk::Format::D32_SFLOAT => (32, 1),
        vk::Format::R32G32_SFLOAT => (32, 2),
        vk::Format::R32G32B32A32_SFLOAT => (32, 4),
        _ => (8, 4),
    }
}

/// 块压缩格式的块大小（字节），每块 4x4 像素
pub fn compressed_block_size(format: vk::Format) -> Option<u32> {
    match format {
        vk::Format::BC1_RGB_UNORM_BLOCK
        | vk::Format::BC1_RGB_SRGB_BLOCK
        | vk::Format::BC1_RGBA_UNORM_BLOCK
        | vk::Format::BC1_RGBA_SRGB_BLOCK => Some(8),
        vk::Format::BC3_UNORM_BLOCK
        | vk::Format::BC3_SRGB_BLOCK
        | vk::Format::BC5_UNORM_BLOCK
        | vk::Format::BC5_SNORM_BLOCK
        | vk::Format::BC7_UNORM_BLOCK
        | vk::Format::BC7_SRGB_BLOCK
        | vk::Format::ASTC_4X4_UNORM_BLOCK
        | vk::Format::ASTC_4X4_SRGB_BLOCK => Some(16),
        _ => None,
    }
}

/// 计算一个 mip 的字节数
pub fn calculate_mip_size(
    width: u32,
    height: u32,
    depth: u32,
    format: vk::Format,
    bits_per_channel: u32,
    channel_count: u32,
) -> usize {
    assert!(width > 0 && height > 0 && depth > 0, "mip dimensions must be non-zero");

    if let Some(block_size) = compressed_block_size(format) {
        let blocks_x = width.div_ceil(4) as usize;
        let blocks_y = height.div_ceil(4) as usize;
        return blocks_x * blocks_y * depth as usize * block_size as usize;
    }

    width as usize * height as usize * depth as usize * channel_count as usize * (bits_per_channel / 8) as usize
}

pub struct RenderTexture {
    handle: TextureHandle,
    desc: TextureDesc,
    state: AtomicU8,

    /// 每个 mip 当前的 layout
    layouts: Mutex<Vec<vk::ImageLayout>>,
    /// CPU 侧数据，每个 mip 一项；render target 只有 READBACK 时才有
    mips: Mutex<Vec<Vec<u8>>>,
    memory_usage: AtomicUsize,
}
// new & init
impl RenderTexture {
    const PREPARE_POLL: Duration = Duration::from_millis(16);

    /// GPU 端直接写入的纹理，创建即可用
    pub fn render_target(handle: TextureHandle, desc: TextureDesc) -> Self {
        let mip_count = desc.mip_levels.min(desc.max_mip_count()) as usize;
        let mips = if desc.usage.contains(TextureUsage::READBACK) {
            vec![vec![0u8; calculate_mip_size(desc.width, desc.height, desc.depth, desc.format, desc.bits_per_channel, desc.channel_count)]]
        } else {
            Vec::new()
        };
        let memory_usage = Self::total_size(&desc);
        Self {
            handle,
            state: AtomicU8::new(ResourceState::PreparedForGpu as u8),
            layouts: Mutex::new(vec![vk::ImageLayout::UNDEFINED; mip_count]),
            mips: Mutex::new(mips),
            memory_usage: AtomicUsize::new(memory_usage),
            desc,
        }
    }

    /// 带有 CPU 数据的素材纹理，需要经过 `prepare_for_gpu`
    pub fn from_data(handle: TextureHandle, desc: TextureDesc, data: Vec<u8>) -> Self {
        let mip_count = desc.mip_levels.min(desc.max_mip_count()) as usize;
        Self {
            handle,
            state: AtomicU8::new(ResourceState::Unprepared as u8),
            layouts: Mutex::new(vec![vk::ImageLayout::UNDEFINED; mip_count]),
            mips: Mutex::new(vec![data]),
            memory_usage: AtomicUsize::new(0),
            desc,
        }
    }

    fn total_size(desc: &TextureDesc) -> usize {
        let mip_count = desc.mip_levels.min(desc.max_mip_count());
        (0..mip_count)
            .map(|mip| {
                calculate_mip_size(
                    (desc.width >> mip).max(1),
                    (desc.height >> mip).max(1),
                    desc.depth,
                    desc.format,
                    desc.bits_per_channel,
                    desc.channel_count,
                )
            })
            .sum::<usize>()
            * desc.array_layers as usize
    }
}
// getters
impl RenderTexture {
    #[inline]
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }
    #[inline]
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }
    #[inline]
    pub fn name(&self) -> &str {
        &self.desc.name
    }
    #[inline]
    pub fn state(&self) -> ResourceState {
        ResourceState::from_u8(self.state.load(Ordering::Acquire))
    }
    #[inline]
    pub fn is_prepared_for_gpu(&self) -> bool {
        self.state() == ResourceState::PreparedForGpu
    }
    #[inline]
    pub fn memory_usage(&self) -> usize {
        self.memory_usage.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn mip_count(&self) -> u32 {
        lock(&self.layouts).len() as u32
    }

    pub fn layout(&self, mip: u32) -> vk::ImageLayout {
        lock(&self.layouts)
            .get(mip as usize)
            .copied()
            .unwrap_or(vk::ImageLayout::UNDEFINED)
    }

    /// CPU 侧 mip 数据的拷贝
    pub fn mip_data(&self, mip: u32) -> Option<Vec<u8>> {
        lock(&self.mips).get(mip as usize).cloned()
    }
}
// tools
impl RenderTexture {
    /// 将指定 mip（`None` 表示全部）转换到新的 layout
    ///
    /// 只为第一个 layout 不同的 mip 开始的范围插入一个 barrier。
    /// 纹理仍在加载线程上准备时，这里会阻塞等待。
    pub fn set_layout(&self, cmd: &mut dyn CommandRecorder, new_layout: vk::ImageLayout, mip: Option<u32>) {
        let _span = tracy_client::span!("RenderTexture::set_layout");

        let mut polls: u32 = 0;
        while self.state() == ResourceState::PreparingForGpu {
            if polls % 60 == 0 {
                log::info!("Waiting for texture \"{}\" to finish preparing for the GPU", self.desc.name);
            }
            std::thread::sleep(Self::PREPARE_POLL);
            polls += 1;
        }

        let mut layouts = lock(&self.layouts);
        let mip_range = match mip {
            Some(mip) => {
                assert!((mip as usize) < layouts.len(), "mip {mip} out of range for \"{}\"", self.desc.name);
                mip as usize..mip as usize + 1
            }
            None => 0..layouts.len(),
        };

        let Some(first) = mip_range.clone().find(|&i| layouts[i] != new_layout) else {
            return;
        };
        let old_layout = layouts[first];
        let mip_count = (mip_range.end - first) as u32;
        cmd.insert_image_barrier(self.handle, first as u32, mip_count, old_layout, new_layout);

        for layout in &mut layouts[first..mip_range.end] {
            *layout = new_layout;
        }
    }

    /// 生成 mip 链并计算内存占用
    ///
    /// 只能从 `Unprepared` 开始；失败时回到 `Unprepared`。
    pub fn prepare_for_gpu(&self) -> anyhow::Result<()> {
        let _span = tracy_client::span!("RenderTexture::prepare_for_gpu");

        let transition = self.state.compare_exchange(
            ResourceState::Unprepared as u8,
            ResourceState::PreparingForGpu as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        assert!(transition.is_ok(), "texture \"{}\" is not in the unprepared state", self.desc.name);

        match self.generate_mips() {
            Ok(()) => {
                self.memory_usage.store(Self::total_size(&self.desc), Ordering::Relaxed);
                self.state.store(ResourceState::PreparedForGpu as u8, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                self.state.store(ResourceState::Unprepared as u8, Ordering::Release);
                Err(e)
            }
        }
    }

    fn generate_mips(&self) -> anyhow::Result<()> {
        let desc = &self.desc;
        let mut mips = lock(&self.mips);
        let Some(base) = mips.first() else {
            anyhow::bail!("texture \"{}\" has no data to prepare", desc.name);
        };

        let expected = calculate_mip_size(
            desc.width,
            desc.height,
            desc.depth,
            desc.format,
            desc.bits_per_channel,
            desc.channel_count,
        ) * desc.array_layers as usize;
        anyhow::ensure!(
            base.len() == expected,
            "texture \"{}\" has {} bytes, expected {}",
            desc.name,
            base.len(),
            expected
        );

        // 压缩格式的 mip 由导入器提供
        if compressed_block_size(desc.format).is_some() || desc.bits_per_channel != 8 {
            return Ok(());
        }

        let mip_count = desc.mip_levels.min(desc.max_mip_count());
        mips.truncate(1);
        let channels = desc.channel_count as usize;
        let (mut width, mut height) = (desc.width as usize, desc.height as usize);
        for _ in 1..mip_count {
            let src = &mips[mips.len() - 1];
            let (dst_width, dst_height) = ((width / 2).max(1), (height / 2).max(1));
            let mut dst = vec![0u8; dst_width * dst_height * channels];
            for y in 0..dst_height {
                for x in 0..dst_width {
                    let (x0, y0) = ((x * 2).min(width - 1), (y * 2).min(height - 1));
                    let (x1, y1) = ((x * 2 + 1).min(width - 1), (y * 2 + 1).min(height - 1));
                    for c in 0..channels {
                        let sum = src[(y0 * width + x0) * channels + c] as u32
                            + src[(y0 * width + x1) * channels + c] as u32
                            + src[(y1 * width + x0) * channels + c] as u32
                            + src[(y1 * width + x1) * channels + c] as u32;
                        dst[(y * dst_width + x) * channels + c] = ((sum + 2) / 4) as u8;
                    }
                }
            }
            mips.push(dst);
            width = dst_width;
            height = dst_height;
        }
        Ok(())
    }

    /// 以纯色填充 mip 0 的 CPU 数据（headless 设备执行 clear 时使用）
    pub fn fill(&self, color: [f32; 4]) {
        let mut mips = lock(&self.mips);
        let Some(data) = mips.first_mut() else {
            return;
        };
        match (self.desc.bits_per_channel, self.desc.channel_count) {
            (8, channels) => {
                let pixel: Vec<u8> = color[..channels as usize]
                    .iter()
                    .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
                    .collect();
                data.chunks_exact_mut(pixel.len()).for_each(|texel| texel.copy_from_slice(&pixel));
            }
            (32, channels) => {
                let pixel: &[u8] = bytemuck::cast_slice(&color[..channels as usize]);
                data.chunks_exact_mut(pixel.len()).for_each(|texel| texel.copy_from_slice(pixel));
            }
            _ => log::debug!("fill is not supported for the format of \"{}\"", self.desc.name),
        }
    }

    /// 从另一张纹理复制 mip 0 的 CPU 数据，尺寸不同时使用最近点采样
    pub fn copy_from(&self, src: &RenderTexture) {
        let Some(src_data) = src.mip_data(0) else {
            return;
        };
        if src.desc.format != self.desc.format {
            log::debug!("skip cpu copy \"{}\" -> \"{}\": format mismatch", src.name(), self.name());
            return;
        }
        let mut mips = lock(&self.mips);
        let Some(dst) = mips.first_mut() else {
            return;
        };
        let texel = (self.desc.channel_count * self.desc.bits_per_channel / 8) as usize;
        let (dst_w, dst_h) = (self.desc.width as usize, self.desc.height as usize);
        let (src_w, src_h) = (src.desc.width as usize, src.desc.height as usize);
        for y in 0..dst_h {
            let sy = y * src_h / dst_h;
            for x in 0..dst_w {
                let sx = x * src_w / dst_w;
                let s = (sy * src_w + sx) * texel;
                let d = (y * dst_w + x) * texel;
                dst[d..d + texel].copy_from_slice(&src_data[s..s + texel]);
            }
        }
    }

    /// 将 mip 0 写入图片文件，编码交给 image crate
    pub fn save_as_image(&self, path: &Path) -> anyhow::Result<()> {
        let data = self
            .mip_data(0)
            .with_context(|| format!("texture \"{}\" has no cpu readback data", self.desc.name))?;
        anyhow::ensure!(
            self.desc.bits_per_channel == 8 && self.desc.channel_count == 4,
            "texture \"{}\" is not an 8-bit RGBA texture",
            self.desc.name
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("failed to create {:?}", parent))?;
        }
        image::save_buffer(path, &data, self.desc.width, self.desc.height, image::ColorType::Rgba8)
            .with_context(|| format!("failed to save \"{}\" to {:?}", self.desc.name, path))?;
        log::info!("Saved texture \"{}\" to {:?}", self.desc.name, path);
        Ok(())
    }
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 所有纹理的拥有者，handle 带代际检查
#[derive(Default)]
pub struct TexturePool {
    textures: SlotMap<TextureHandle, Arc<RenderTexture>>,
}
// new & init
impl TexturePool {
    pub fn new() -> Self {
        Self::default()
    }
}
// tools
impl TexturePool {
    pub fn create_render_target(&mut self, desc: TextureDesc) -> TextureHandle {
        self.textures
            .insert_with_key(|handle| Arc::new(RenderTexture::render_target(handle, desc)))
    }

    pub fn create_from_data(&mut self, desc: TextureDesc, data: Vec<u8>) -> TextureHandle {
        self.textures
            .insert_with_key(|handle| Arc::new(RenderTexture::from_data(handle, desc, data)))
    }

    #[inline]
    pub fn get(&self, handle: TextureHandle) -> Option<&Arc<RenderTexture>> {
        self.textures.get(handle)
    }

    #[inline]
    pub fn remove(&mut self, handle: TextureHandle) -> Option<Arc<RenderTexture>> {
        self.textures.remove(handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        self.textures.values().map(|t| t.memory_usage()).sum()
    }
}
impl Drop for TexturePool {
    fn drop(&mut self) {
        log::info!("Dropping TexturePool");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_recorder::{CommandList, RecordedCommand};

    #[test]
    fn test_mip_size_compressed_and_uncompressed() {
        assert_eq!(calculate_mip_size(256, 256, 1, vk::Format::BC7_UNORM_BLOCK, 8, 4), (256 / 4) * (256 / 4) * 16);
        assert_eq!(calculate_mip_size(256, 256, 1, vk::Format::R8G8B8A8_UNORM, 8, 4), 256 * 256 * 4);
        assert_eq!(calculate_mip_size(256, 256, 1, vk::Format::BC1_RGBA_UNORM_BLOCK, 8, 4), 64 * 64 * 8);
        // 不足一个块时向上取整
        assert_eq!(calculate_mip_size(2, 2, 1, vk::Format::BC3_UNORM_BLOCK, 8, 4), 16);
    }

    #[test]
    fn test_prepare_generates_box_filtered_mips() {
        tracy_client::Client::start();
        let mut pool = TexturePool::new();
        let desc = TextureDesc::new_2d("checker", 2, 2, vk::Format::R8G8B8A8_UNORM, TextureUsage::SRV).with_mips(4);
        let data = [0u8, 0, 0, 255, 255, 255, 255, 255, 255, 255, 255, 255, 0, 0, 0, 255].to_vec();
        let handle = pool.create_from_data(desc, data);
        let texture = pool.get(handle).unwrap();

        assert_eq!(texture.state(), ResourceState::Unprepared);
        texture.prepare_for_gpu().unwrap();
        assert_eq!(texture.state(), ResourceState::PreparedForGpu);
        // 2x2 只能有 2 个 mip
        assert_eq!(texture.mip_count(), 2);
        assert_eq!(texture.mip_data(1).unwrap(), vec![128, 128, 128, 255]);
        assert_eq!(texture.memory_usage(), 16 + 4);
    }

    #[test]
    fn test_prepare_failure_returns_to_unprepared() {
        tracy_client::Client::start();
        let mut pool = TexturePool::new();
        let desc = TextureDesc::new_2d("broken", 4, 4, vk::Format::R8G8B8A8_UNORM, TextureUsage::SRV);
        let handle = pool.create_from_data(desc, vec![0u8; 3]);
        let texture = pool.get(handle).unwrap();
        assert!(texture.prepare_for_gpu().is_err());
        assert_eq!(texture.state(), ResourceState::Unprepared);
    }

    #[test]
    #[should_panic]
    fn test_prepare_twice_panics() {
        tracy_client::Client::start();
        let mut pool = TexturePool::new();
        let desc = TextureDesc::new_2d("once", 1, 1, vk::Format::R8G8B8A8_UNORM, TextureUsage::SRV);
        let handle = pool.create_from_data(desc, vec![0u8; 4]);
        let texture = pool.get(handle).unwrap();
        texture.prepare_for_gpu().unwrap();
        let _ = texture.prepare_for_gpu();
    }

    #[test]
    fn test_set_layout_barrier_starts_at_first_differing_mip() {
        tracy_client::Client::start();
        let mut pool = TexturePool::new();
        let desc = TextureDesc::new_2d("chain", 8, 8, vk::Format::R16G16B16A16_SFLOAT, TextureUsage::UAV).with_mips(4);
        let handle = pool.create_render_target(desc);
        let texture = pool.get(handle).unwrap();
        let mut cmd = CommandList::new();

        texture.set_layout(&mut cmd, vk::ImageLayout::GENERAL, Some(0));
        texture.set_layout(&mut cmd, vk::ImageLayout::GENERAL, None);
        // 已经一致时不再插入 barrier
        texture.set_layout(&mut cmd, vk::ImageLayout::GENERAL, None);

        assert_eq!(
            cmd.commands(),
            &[
                RecordedCommand::ImageBarrier {
                    texture: handle,
                    mip_start: 0,
                    mip_count: 1,
                    old_layout: vk::ImageLayout::UNDEFINED,
                    new_layout: vk::ImageLayout::GENERAL,
                },
                RecordedCommand::ImageBarrier {
                    texture: handle,
                    mip_start: 1,
                    mip_count: 3,
                    old_layout: vk::ImageLayout::UNDEFINED,
                    new_layout: vk::ImageLayout::GENERAL,
                },
            ]
        );
        assert_eq!(texture.layout(3), vk::ImageLayout::GENERAL);
    }

    #[test]
    fn test_fill_and_save_readback_texture() {
        let mut pool = TexturePool::new();
        let desc = TextureDesc::new_2d(
            "output",
            4,
            2,
            vk::Format::R8G8B8A8_UNORM,
            TextureUsage::RENDER_TARGET | TextureUsage::READBACK,
        );
        let handle = pool.create_render_target(desc);
        let texture = pool.get(handle).unwrap();
        texture.fill([1.0, 0.0, 0.0, 1.0]);
        assert_eq!(&texture.mip_data(0).unwrap()[..4], &[255, 0, 0, 255]);

        let path = std::env::temp_dir().join("truvis_render_interface_fill.png");
        texture.save_as_image(&path).unwrap();
        assert!(path.exists());
    }
}
