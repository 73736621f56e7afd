use truvis_render_interface::resource_state::ImageState;

use crate::pass::{PassBuilder, PassContext, RenderPass};
use crate::passes::draw::{OcclusionMode, draw_meshes};
use crate::pipeline_states;
use crate::render_targets::{RenderTarget, ShadingTargets};
use crate::shader_library::ShaderId;

/// 不透明物体的深度预渲染
///
/// 正面 pass 在开启遮挡剔除时读取上一帧的查询结果并发起新的查询；
/// 背面 pass 保留最远的背面深度，供 SSS 估算厚度。
pub struct DepthPrepass {
    backface: bool,
}
impl DepthPrepass {
    pub fn front() -> Self {
        Self { backface: false }
    }

    pub fn backface() -> Self {
        Self { backface: true }
    }

    fn depth_target(&self) -> RenderTarget {
        if self.backface { RenderTarget::GBufferDepthBackface } else { RenderTarget::GBufferDepth }
    }
}
impl RenderPass for DepthPrepass {
    fn name(&self) -> &'static str {
        if self.backface { "depth_prepass_backface" } else { "depth_prepass" }
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::DepthPrepassV, ShaderId::DepthPrepassP]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        builder.write(self.depth_target(), ImageState::DEPTH_ATTACHMENT_WRITE);
    }

    fn execute(&self, ctx: &mut PassContext) {
        let depth = ctx.target(self.depth_target());
        let clear = if self.backface { 0.0 } else { 1.0 };
        ctx.cmd.clear_texture(depth, [clear, 0.0, 0.0, 0.0]);
        ctx.cmd.set_pipeline_state(&pipeline_states::depth_prepass(self.backface));

        let occlusion = if !self.backface && ctx.frame.settings.occlusion_culling {
            OcclusionMode::Query
        } else {
            OcclusionMode::Ignore
        };
        let range = ctx.visibility.mesh_range(false, ctx.frame.meshes.len());
        draw_meshes(ctx, range, occlusion);
    }
}

/// g-buffer
///
/// 不透明物体在 render 分辨率绘制；透明物体在放大之后以 output 分辨率绘制，
/// 深度测试使用 OutputDepth，写入 [`ShadingTargets::TRANSPARENT`]。
pub struct GBufferPass {
    transparent: bool,
}
impl GBufferPass {
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
impl RenderPass for GBufferPass {
    fn name(&self) -> &'static str {
        if self.transparent { "gbuffer_transparent" } else { "gbuffer" }
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::GBufferV, ShaderId::GBufferP]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        let targets = self.targets();
        for target in targets.gbuffer() {
            builder.write(target, ImageState::COLOR_ATTACHMENT_WRITE);
        }
        if self.transparent {
            builder.write(targets.depth, ImageState::DEPTH_ATTACHMENT_WRITE);
        } else {
            builder.read(targets.depth, ImageState::DEPTH_ATTACHMENT_READ);
            if builder.frame().settings.variable_rate_shading {
                builder.read(RenderTarget::ShadingRate, ImageState::SHADER_READ_FRAGMENT);
            }
        }
    }

    fn execute(&self, ctx: &mut PassContext) {
        for target in self.targets().gbuffer() {
            let texture = ctx.target(target);
            ctx.cmd.clear_texture(texture, [0.0; 4]);
        }
        ctx.cmd.set_pipeline_state(&pipeline_states::gbuffer(ctx.frame.settings, self.transparent));

        let occlusion = if ctx.frame.settings.occlusion_culling {
            OcclusionMode::Respect
        } else {
            OcclusionMode::Ignore
        };
        let range = ctx.visibility.mesh_range(self.transparent, ctx.frame.meshes.len());
        draw_meshes(ctx, range, occlusion);
    }
}
