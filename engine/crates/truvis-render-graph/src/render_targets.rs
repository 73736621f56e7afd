use ash::vk;
use truvis_render_interface::deletion_queue::DeletionQueue;
use truvis_render_interface::handles::TextureHandle;
use truvis_render_interface::pipeline_settings::DefaultRendererSettings;
use truvis_render_interface::texture::{TextureDesc, TexturePool, TextureUsage};

/// 渲染器使用的所有 render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    // g-buffer，render 分辨率
    GBufferColor,
    GBufferNormal,
    GBufferMaterial,
    GBufferVelocity,
    GBufferDepth,
    GBufferDepthBackface,

    // 光照，render 分辨率
    LightDiffuse,
    LightSpecular,
    LightVolumetric,
    Ssao,
    Ssr,
    Sss,
    Gi,
    ShadingRate,
    FrameRender,
    /// 不透明物体光照后的拷贝，带 mip，透明物体采样它模拟折射
    FrameRenderOpaque,

    // output 分辨率
    OutputDepth,
    TransparentColor,
    TransparentNormal,
    TransparentMaterial,
    TransparentVelocity,
    TransparentLightDiffuse,
    TransparentLightSpecular,
    TransparentLightVolumetric,
    /// 透明物体光照合成的结果，叠加到 FrameOutput 上
    FrameTransparent,
    FrameOutput,
    FrameOutput2,

    // 固定尺寸
    Skysphere,
    BrdfSpecularLut,
}

/// render target 尺寸跟随哪个分辨率
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetScale {
    Render,
    Output,
    Fixed(u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTargetExtents {
    pub render: vk::Extent2D,
    pub output: vk::Extent2D,
    /// GI 相对 render 分辨率的比例
    pub gi_scale: f32,
}

impl RenderTarget {
    pub const ALL: [RenderTarget; 29] = [
        Self::GBufferColor,
        Self::GBufferNormal,
        Self::GBufferMaterial,
        Self::GBufferVelocity,
        Self::GBufferDepth,
        Self::GBufferDepthBackface,
        Self::LightDiffuse,
        Self::LightSpecular,
        Self::LightVolumetric,
        Self::Ssao,
        Self::Ssr,
        Self::Sss,
        Self::Gi,
        Self::ShadingRate,
        Self::FrameRender,
        Self::FrameRenderOpaque,
        Self::OutputDepth,
        Self::TransparentColor,
        Self::TransparentNormal,
        Self::TransparentMaterial,
        Self::TransparentVelocity,
        Self::TransparentLightDiffuse,
        Self::TransparentLightSpecular,
        Self::TransparentLightVolumetric,
        Self::FrameTransparent,
        Self::FrameOutput,
        Self::FrameOutput2,
        Self::Skysphere,
        Self::BrdfSpecularLut,
    ];

    const SHADING_RATE_TILE: u32 = 4;

    fn scale(self) -> TargetScale {
        match self {
            Self::OutputDepth
            | Self::TransparentColor
            | Self::TransparentNormal
            | Self::TransparentMaterial
            | Self::TransparentVelocity
            | Self::TransparentLightDiffuse
            | Self::TransparentLightSpecular
            | Self::TransparentLightVolumetric
            | Self::FrameTransparent
            | Self::FrameOutput
            | Self::FrameOutput2 => TargetScale::Output,
            Self::Skysphere => TargetScale::Fixed(4096, 2048),
            Self::BrdfSpecularLut => TargetScale::Fixed(512, 512),
            _ => TargetScale::Render,
        }
    }

    fn format(self) -> vk::Format {
        match self {
            Self::GBufferDepth | Self::GBufferDepthBackface | Self::OutputDepth => DefaultRendererSettings::DEPTH_FORMAT,
            Self::GBufferColor | Self::TransparentColor | Self::FrameOutput | Self::FrameOutput2 => {
                DefaultRendererSettings::OUTPUT_FORMAT
            }
            Self::GBufferVelocity | Self::TransparentVelocity | Self::BrdfSpecularLut => vk::Format::R16G16_SFLOAT,
            Self::Ssao | Self::Sss | Self::ShadingRate => vk::Format::R8_UNORM,
            _ => DefaultRendererSettings::HDR_FORMAT,
        }
    }

    fn usage(self) -> TextureUsage {
        match self {
            Self::GBufferDepth | Self::GBufferDepthBackface | Self::OutputDepth => {
                TextureUsage::DEPTH_STENCIL | TextureUsage::SRV
            }
            Self::GBufferColor
            | Self::GBufferNormal
            | Self::GBufferMaterial
            | Self::GBufferVelocity
            | Self::TransparentColor
            | Self::TransparentNormal
            | Self::TransparentMaterial
            | Self::TransparentVelocity => TextureUsage::RENDER_TARGET | TextureUsage::SRV,
            Self::FrameOutput | Self::FrameOutput2 => {
                TextureUsage::RENDER_TARGET | TextureUsage::UAV | TextureUsage::SRV | TextureUsage::READBACK
            }
            Self::FrameTransparent => TextureUsage::RENDER_TARGET | TextureUsage::UAV | TextureUsage::SRV,
            _ => TextureUsage::UAV | TextureUsage::SRV,
        }
    }

    fn mip_levels(self) -> u32 {
        match self {
            Self::FrameRenderOpaque | Self::Skysphere => u32::MAX,
            _ => 1,
        }
    }

    pub fn desc(self, extents: &RenderTargetExtents) -> TextureDesc {
        let (width, height) = match self.scale() {
            TargetScale::Render if self == Self::Gi => (
                (extents.render.width as f32 * extents.gi_scale).max(1.0) as u32,
                (extents.render.height as f32 * extents.gi_scale).max(1.0) as u32,
            ),
            TargetScale::Render if self == Self::ShadingRate => (
                extents.render.width.div_ceil(Self::SHADING_RATE_TILE),
                extents.render.height.div_ceil(Self::SHADING_RATE_TILE),
            ),
            TargetScale::Render => (extents.render.width, extents.render.height),
            TargetScale::Output => (extents.output.width, extents.output.height),
            TargetScale::Fixed(w, h) => (w, h),
        };
        let desc = TextureDesc::new_2d(format!("{self:?}"), width.max(1), height.max(1), self.format(), self.usage());
        let mips = self.mip_levels().min(desc.max_mip_count());
        desc.with_mips(mips)
    }
}

/// g-buffer、光照和合成使用的一组 target
///
/// 不透明物体在 render 分辨率着色，透明物体在放大之后以 output 分辨率再走一遍同样的流程，
/// 结果写入 FrameTransparent。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadingTargets {
    pub color: RenderTarget,
    pub normal: RenderTarget,
    pub material: RenderTarget,
    pub velocity: RenderTarget,
    pub depth: RenderTarget,
    pub light_diffuse: RenderTarget,
    pub light_specular: RenderTarget,
    pub light_volumetric: RenderTarget,
    /// 光照合成与 IBL 的输出
    pub frame: RenderTarget,
}
impl ShadingTargets {
    pub const OPAQUE: Self = Self {
        color: RenderTarget::GBufferColor,
        normal: RenderTarget::GBufferNormal,
        material: RenderTarget::GBufferMaterial,
        velocity: RenderTarget::GBufferVelocity,
        depth: RenderTarget::GBufferDepth,
        light_diffuse: RenderTarget::LightDiffuse,
        light_specular: RenderTarget::LightSpecular,
        light_volumetric: RenderTarget::LightVolumetric,
        frame: RenderTarget::FrameRender,
    };

    /// 深度使用从 g-buffer 放大而来的 OutputDepth
    pub const TRANSPARENT: Self = Self {
        color: RenderTarget::TransparentColor,
        normal: RenderTarget::TransparentNormal,
        material: RenderTarget::TransparentMaterial,
        velocity: RenderTarget::TransparentVelocity,
        depth: RenderTarget::OutputDepth,
        light_diffuse: RenderTarget::TransparentLightDiffuse,
        light_specular: RenderTarget::TransparentLightSpecular,
        light_volumetric: RenderTarget::TransparentLightVolumetric,
        frame: RenderTarget::FrameTransparent,
    };

    #[inline]
    pub const fn of(transparent: bool) -> Self {
        if transparent { Self::TRANSPARENT } else { Self::OPAQUE }
    }

    /// g-buffer 的四个颜色 attachment，顺序与管线状态一致
    #[inline]
    pub const fn gbuffer(&self) -> [RenderTarget; 4] {
        [self.color, self.normal, self.material, self.velocity]
    }

    /// 光照 pass 读取的 g-buffer，包含深度
    #[inline]
    pub const fn gbuffer_with_depth(&self) -> [RenderTarget; 5] {
        [self.color, self.normal, self.material, self.velocity, self.depth]
    }

    #[inline]
    pub const fn lights(&self) -> [RenderTarget; 3] {
        [self.light_diffuse, self.light_specular, self.light_volumetric]
    }
}

/// 按 [`RenderTarget`] 索引的 render target 表
pub struct RenderTargets {
    handles: [TextureHandle; RenderTarget::ALL.len()],
    extents: RenderTargetExtents,
}
// new & init
impl RenderTargets {
    pub fn new(pool: &mut TexturePool, extents: RenderTargetExtents) -> Self {
        let handles = RenderTarget::ALL.map(|target| pool.create_render_target(target.desc(&extents)));
        log::info!(
            "Created {} render targets, render {}x{}, output {}x{}",
            handles.len(),
            extents.render.width,
            extents.render.height,
            extents.output.width,
            extents.output.height
        );
        Self { handles, extents }
    }
}
// getters
impl RenderTargets {
    #[inline]
    pub fn get(&self, target: RenderTarget) -> TextureHandle {
        self.handles[target as usize]
    }

    #[inline]
    pub fn extents(&self) -> &RenderTargetExtents {
        &self.extents
    }
}
// update
impl RenderTargets {
    /// 重建尺寸发生变化的 render target，旧的交给 deletion queue
    ///
    /// 返回重建的数量。
    pub fn recreate(
        &mut self,
        pool: &mut TexturePool,
        extents: RenderTargetExtents,
        deletion_queue: &mut DeletionQueue,
    ) -> usize {
        let _span = tracy_client::span!("RenderTargets::recreate");

        let mut recreated = 0;
        for target in RenderTarget::ALL {
            let old_desc = target.desc(&self.extents);
            let new_desc = target.desc(&extents);
            if old_desc.width == new_desc.width && old_desc.height == new_desc.height {
                continue;
            }
            deletion_queue.push_texture(self.handles[target as usize]);
            self.handles[target as usize] = pool.create_render_target(new_desc);
            recreated += 1;
        }
        self.extents = extents;

        if recreated > 0 {
            log::info!("Recreated {recreated} render targets");
        }
        recreated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extents(render: u32, output: u32) -> RenderTargetExtents {
        RenderTargetExtents {
            render: vk::Extent2D {
                width: render,
                height: render / 2,
            },
            output: vk::Extent2D {
                width: output,
                height: output / 2,
            },
            gi_scale: 0.5,
        }
    }

    #[test]
    fn test_targets_follow_their_resolution() {
        let mut pool = TexturePool::new();
        let targets = RenderTargets::new(&mut pool, extents(800, 1600));

        let desc = |t| pool.get(targets.get(t)).unwrap().desc().clone();
        assert_eq!(desc(RenderTarget::GBufferColor).width, 800);
        assert_eq!(desc(RenderTarget::FrameOutput).width, 1600);
        assert_eq!(desc(RenderTarget::TransparentNormal).width, 1600);
        assert_eq!(desc(RenderTarget::TransparentLightDiffuse).width, 1600);
        assert_eq!(
            desc(RenderTarget::TransparentVelocity).format,
            desc(RenderTarget::GBufferVelocity).format
        );
        assert_eq!(desc(RenderTarget::Gi).width, 400);
        assert_eq!(desc(RenderTarget::ShadingRate).width, 200);
        assert_eq!(desc(RenderTarget::Skysphere).width, 4096);
        assert!(desc(RenderTarget::FrameRenderOpaque).mip_levels > 1);
        assert!(desc(RenderTarget::FrameOutput).usage.contains(TextureUsage::READBACK));
    }

    #[test]
    fn test_recreate_only_resized_targets() {
        tracy_client::Client::start();
        let mut pool = TexturePool::new();
        let mut queue = DeletionQueue::new();
        let mut targets = RenderTargets::new(&mut pool, extents(800, 1600));
        let output = targets.get(RenderTarget::FrameOutput);
        let gbuffer = targets.get(RenderTarget::GBufferColor);
        let sky = targets.get(RenderTarget::Skysphere);

        let recreated = targets.recreate(&mut pool, extents(400, 1600), &mut queue);
        // 所有 render 分辨率的 target
        assert_eq!(recreated, 16);
        assert_eq!(queue.len(), 16);
        assert_eq!(targets.get(RenderTarget::FrameOutput), output);
        assert_eq!(targets.get(RenderTarget::Skysphere), sky);
        assert_ne!(targets.get(RenderTarget::GBufferColor), gbuffer);

        assert_eq!(queue.parse(&mut pool), 16);
        assert!(pool.get(gbuffer).is_none());
        assert_eq!(pool.len(), RenderTarget::ALL.len());
    }
}
