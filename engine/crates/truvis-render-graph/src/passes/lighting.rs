use truvis_render_interface::handles::GpuBuffer;
use truvis_render_interface::resource_state::ImageState;
use truvis_scene::components::light::{Light, LightFlags};
use truvis_scene::guid_new_type::LightHandle;

use crate::pass::{FrameResources, PassBuilder, PassContext, RenderPass};
use crate::pass_constants::PassConstants;
use crate::passes::compute::ComputePass;
use crate::pipeline_states;
use crate::render_targets::{RenderTarget, ShadingTargets};
use crate::shader_library::ShaderId;

fn with_gbuffer(pass: ComputePass) -> ComputePass {
    with_targets(pass, &ShadingTargets::OPAQUE)
}

fn with_targets(mut pass: ComputePass, targets: &ShadingTargets) -> ComputePass {
    for target in targets.gbuffer_with_depth() {
        pass = pass.read(target);
    }
    pass
}

/// 已经上传到 bindless 表的光源
fn uploaded_lights<'a>(frame: &'a FrameResources<'a>) -> impl Iterator<Item = (LightHandle, &'a Light, u32)> {
    frame.lights.iter().filter_map(move |&entity| {
        let handle = frame.scene.entity_light(entity)?;
        let light = frame.scene.light(handle)?;
        let index = frame.bindless.light_index(handle)?;
        Some((handle, light, index))
    })
}

/// 根据上一帧的输出和运动向量生成 shading rate 图像
pub fn variable_rate_shading() -> ComputePass {
    ComputePass::new("variable_rate_shading", &[ShaderId::VariableRateShadingC])
        .read(RenderTarget::FrameOutput)
        .read(RenderTarget::GBufferVelocity)
        .write(RenderTarget::ShadingRate)
}

pub fn ssao() -> ComputePass {
    ComputePass::new("ssao", &[ShaderId::SsaoC])
        .read(RenderTarget::GBufferNormal)
        .read(RenderTarget::GBufferDepth)
        .write(RenderTarget::Ssao)
}

/// 采样上一帧的 FrameRender
pub fn ssr() -> ComputePass {
    with_gbuffer(ComputePass::new("ssr", &[ShaderId::SsrC]))
        .read(RenderTarget::FrameRender)
        .write(RenderTarget::Ssr)
}

pub fn global_illumination(intensity: f32) -> ComputePass {
    with_gbuffer(ComputePass::new("global_illumination", &[ShaderId::GiC]))
        .read(RenderTarget::LightDiffuse)
        .write(RenderTarget::Gi)
        .with_values([intensity, 0.0, 0.0, 0.0])
}

/// 合成漫反射、高光、体积光和环境
///
/// 透明物体在 output 分辨率合成到 FrameTransparent，采样不透明结果的 mip 链模拟折射。
pub fn light_composition(fog: f32, transparent: bool) -> ComputePass {
    let targets = ShadingTargets::of(transparent);
    let (name, source) = if transparent {
        ("light_composition_transparent", RenderTarget::FrameRenderOpaque)
    } else {
        ("light_composition", RenderTarget::Ssr)
    };
    let mut pass = with_targets(ComputePass::new(name, &[ShaderId::LightCompositionC]), &targets)
        .read(targets.light_diffuse)
        .read(targets.light_specular)
        .read(targets.light_volumetric)
        .read(source);
    if !transparent {
        pass = pass.read(RenderTarget::Gi);
    }
    pass.read(RenderTarget::Skysphere)
        .write(targets.frame)
        .with_values([fog, 0.0, 0.0, 0.0])
        .with_transparent(transparent)
}

/// 在合成结果上叠加基于环境贴图的高光
pub fn image_based_lighting(transparent: bool) -> ComputePass {
    let targets = ShadingTargets::of(transparent);
    let name = if transparent { "light_image_based_transparent" } else { "light_image_based" };
    with_targets(ComputePass::new(name, &[ShaderId::LightImageBasedC]), &targets)
        .read(RenderTarget::Ssao)
        .read(RenderTarget::Skysphere)
        .read(RenderTarget::BrdfSpecularLut)
        .read_write(targets.frame)
        .with_transparent(transparent)
}

/// Bend 屏幕空间阴影，每个开启该特性的光源一次 dispatch
pub struct ScreenSpaceShadowPass;
impl RenderPass for ScreenSpaceShadowPass {
    fn name(&self) -> &'static str {
        "screen_space_shadows"
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::SssBendC]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        builder
            .read(RenderTarget::GBufferDepth, ImageState::SHADER_READ_COMPUTE)
            .write(RenderTarget::Sss, ImageState::STORAGE_READ_WRITE_COMPUTE);
    }

    fn execute(&self, ctx: &mut PassContext) {
        let frame = ctx.frame;
        let sss = ctx.target(RenderTarget::Sss);
        let depth = ctx.target(RenderTarget::GBufferDepth);
        let extent = ctx.target_extent(RenderTarget::Sss);

        ctx.cmd.clear_texture(sss, [1.0; 4]);
        ctx.cmd.set_pipeline_state(&pipeline_states::compute("screen_space_shadows"));
        ctx.cmd.set_buffer(0, GpuBuffer::Lights);
        ctx.cmd.set_texture(0, depth, None);
        ctx.cmd.set_texture(ComputePass::OUTPUT_SLOT, sss, None);

        for (_, light, light_index) in uploaded_lights(frame) {
            if !light.flags.contains(LightFlags::SHADOWS_SCREEN_SPACE) || !light.is_emitting() {
                continue;
            }
            let constants = PassConstants {
                light_index,
                ..Default::default()
            }
            .with_resolution(extent.width, extent.height);
            ctx.push_constants(&constants);
            ctx.dispatch_for(RenderTarget::Sss, 0);
        }
    }
}

/// 逐光源累加漫反射、高光和体积光
///
/// 透明物体的版本读取 output 分辨率的 g-buffer，写入对应的光照 target。
pub struct LightPass {
    transparent: bool,
}
impl LightPass {
    pub fn opaque() -> Self {
        Self { transparent: false }
    }

    pub fn transparent() -> Self {
        Self { transparent: true }
    }

    #[inline]
    fn targets(&self) -> ShadingTargets {
        ShadingTargets::of(self.transparent)
    }
}
impl RenderPass for LightPass {
    fn name(&self) -> &'static str {
        if self.transparent { "light_transparent" } else { "light" }
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::LightC]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        let targets = self.targets();
        for target in targets.gbuffer_with_depth() {
            builder.read(target, ImageState::SHADER_READ_COMPUTE);
        }
        builder
            .read(RenderTarget::Ssao, ImageState::SHADER_READ_COMPUTE)
            .read(RenderTarget::Sss, ImageState::SHADER_READ_COMPUTE);
        if !self.transparent {
            builder.read(RenderTarget::GBufferDepthBackface, ImageState::SHADER_READ_COMPUTE);
        }
        for (_, light, _) in uploaded_lights(builder.frame()) {
            if let Some(depth) = light.shadow_maps.depth {
                builder.texture(depth, ImageState::SHADER_READ_COMPUTE, None);
            }
            if let Some(color) = light.shadow_maps.color {
                builder.texture(color, ImageState::SHADER_READ_COMPUTE, None);
            }
        }
        for target in targets.lights() {
            builder.write(target, ImageState::STORAGE_READ_WRITE_COMPUTE);
        }
    }

    fn execute(&self, ctx: &mut PassContext) {
        let frame = ctx.frame;
        let targets = self.targets();
        for (slot, target) in targets.lights().into_iter().enumerate() {
            let texture = ctx.target(target);
            ctx.cmd.clear_texture(texture, [0.0; 4]);
            ctx.cmd.set_texture(ComputePass::OUTPUT_SLOT + slot as u32, texture, None);
        }
        ctx.cmd.set_pipeline_state(&pipeline_states::compute("light"));
        ctx.cmd.set_buffer(0, GpuBuffer::FrameConstants);
        ctx.cmd.set_buffer(1, GpuBuffer::Materials);
        ctx.cmd.set_buffer(2, GpuBuffer::Lights);

        let extent = ctx.target_extent(targets.light_diffuse);
        let fog = frame.settings.fog;
        for (_, light, light_index) in uploaded_lights(frame) {
            let constants = PassConstants {
                light_index,
                flags: light.flags.bits(),
                ..Default::default()
            }
            .with_resolution(extent.width, extent.height)
            .with_values([fog, 0.0, 0.0, 0.0])
            .with_transparent(self.transparent);
            ctx.push_constants(&constants);
            ctx.dispatch_for(targets.light_diffuse, 0);
        }
    }
}
