use truvis_render_interface::pipeline_settings::UpsamplingMode;
use truvis_render_interface::resource_state::ImageState;

use crate::pass::{PassBuilder, PassContext, RenderPass};
use crate::pass_constants::PassConstants;
use crate::passes::compute::ComputePass;
use crate::pipeline_states;
use crate::render_targets::RenderTarget;
use crate::shader_library::ShaderId;

/// 从 render 分辨率放大到 output 分辨率
///
/// `Linear` 直接 blit；`Fsr3` 是 temporal upscaler，需要深度、运动向量和本帧的 jitter。
pub struct UpscalePass {
    mode: UpsamplingMode,
}
impl UpscalePass {
    pub fn new(mode: UpsamplingMode) -> Self {
        Self { mode }
    }
}
impl RenderPass for UpscalePass {
    fn name(&self) -> &'static str {
        match self.mode {
            UpsamplingMode::Linear => "upscale_linear",
            UpsamplingMode::Fsr3 => "upscale_fsr3",
        }
    }

    fn shaders(&self) -> &'static [ShaderId] {
        match self.mode {
            UpsamplingMode::Linear => &[],
            UpsamplingMode::Fsr3 => &[ShaderId::UpscaleFsr3C],
        }
    }

    fn setup(&self, builder: &mut PassBuilder) {
        match self.mode {
            UpsamplingMode::Linear => {
                builder
                    .read(RenderTarget::FrameRender, ImageState::TRANSFER_SRC)
                    .write(RenderTarget::FrameOutput, ImageState::TRANSFER_DST);
            }
            UpsamplingMode::Fsr3 => {
                builder
                    .read(RenderTarget::FrameRender, ImageState::SHADER_READ_COMPUTE)
                    .read(RenderTarget::GBufferDepth, ImageState::SHADER_READ_COMPUTE)
                    .read(RenderTarget::GBufferVelocity, ImageState::SHADER_READ_COMPUTE)
                    .write(RenderTarget::FrameOutput, ImageState::STORAGE_WRITE_COMPUTE);
            }
        }
    }

    fn execute(&self, ctx: &mut PassContext) {
        let render = ctx.target(RenderTarget::FrameRender);
        let output = ctx.target(RenderTarget::FrameOutput);
        if self.mode == UpsamplingMode::Linear {
            ctx.cmd.blit(render, output);
            return;
        }

        let depth = ctx.target(RenderTarget::GBufferDepth);
        let velocity = ctx.target(RenderTarget::GBufferVelocity);
        ctx.cmd.set_pipeline_state(&pipeline_states::compute("upscale_fsr3"));
        ctx.cmd.set_texture(0, render, None);
        ctx.cmd.set_texture(1, depth, None);
        ctx.cmd.set_texture(2, velocity, None);
        ctx.cmd.set_texture(ComputePass::OUTPUT_SLOT, output, None);

        let frame = ctx.frame;
        let extent = ctx.target_extent(RenderTarget::FrameOutput);
        let reset = if frame.reset_history { 1.0 } else { 0.0 };
        let constants = PassConstants::default()
            .with_resolution(extent.width, extent.height)
            .with_values([frame.jitter.x, frame.jitter.y, reset, frame.settings.sharpness]);
        ctx.push_constants(&constants);
        ctx.dispatch_for(RenderTarget::FrameOutput, 0);
    }
}
