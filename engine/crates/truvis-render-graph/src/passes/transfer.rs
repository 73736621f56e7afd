use truvis_render_interface::resource_state::ImageState;

use crate::pass::{PassBuilder, PassContext, RenderPass};
use crate::pass_constants::PassConstants;
use crate::pipeline_states;
use crate::render_targets::RenderTarget;
use crate::shader_library::ShaderId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferOp {
    Clear(RenderTarget, [f32; 4]),
    /// 尺寸相同的拷贝
    Copy(RenderTarget, RenderTarget),
    /// 允许缩放
    Blit(RenderTarget, RenderTarget),
}

/// 不需要 shader 的拷贝、清除
pub struct TransferPass {
    name: &'static str,
    op: TransferOp,
}
impl TransferPass {
    pub fn new(name: &'static str, op: TransferOp) -> Self {
        Self { name, op }
    }
}
impl RenderPass for TransferPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        match self.op {
            TransferOp::Clear(target, _) => {
                builder.write(target, ImageState::TRANSFER_DST);
            }
            TransferOp::Copy(src, dst) | TransferOp::Blit(src, dst) => {
                builder
                    .read(src, ImageState::TRANSFER_SRC)
                    .write(dst, ImageState::TRANSFER_DST);
            }
        }
    }

    fn execute(&self, ctx: &mut PassContext) {
        match self.op {
            TransferOp::Clear(target, color) => {
                let texture = ctx.target(target);
                ctx.cmd.clear_texture(texture, color);
            }
            TransferOp::Copy(src, dst) => {
                let (src, dst) = (ctx.target(src), ctx.target(dst));
                ctx.cmd.copy(src, dst);
            }
            TransferOp::Blit(src, dst) => {
                let (src, dst) = (ctx.target(src), ctx.target(dst));
                ctx.cmd.blit(src, dst);
            }
        }
    }
}

/// 逐级 downsample 生成 mip 链
pub struct MipChainPass {
    target: RenderTarget,
}
impl MipChainPass {
    pub fn new(target: RenderTarget) -> Self {
        Self { target }
    }
}
impl RenderPass for MipChainPass {
    fn name(&self) -> &'static str {
        "mip_generation"
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::MipGenerationC]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        builder.mip(self.target, 0, ImageState::SHADER_READ_COMPUTE);
    }

    fn execute(&self, ctx: &mut PassContext) {
        let handle = ctx.target(self.target);
        let Some(texture) = ctx.texture(handle).cloned() else {
            return;
        };

        ctx.cmd.set_pipeline_state(&pipeline_states::compute("mip_generation"));
        for mip in 1..texture.mip_count() {
            texture.set_layout(ctx.cmd, ImageState::SHADER_READ_COMPUTE.layout, Some(mip - 1));
            texture.set_layout(ctx.cmd, ImageState::STORAGE_WRITE_COMPUTE.layout, Some(mip));
            ctx.cmd.set_texture(0, handle, Some(mip - 1));
            ctx.cmd.set_texture(1, handle, Some(mip));
            let width = (texture.desc().width >> mip).max(1);
            let height = (texture.desc().height >> mip).max(1);
            ctx.push_constants(&PassConstants::default().with_resolution(width, height));
            ctx.cmd.dispatch(width.div_ceil(8), height.div_ceil(8), 1);
        }
        texture.set_layout(ctx.cmd, ImageState::SHADER_READ_COMPUTE.layout, None);
    }
}
