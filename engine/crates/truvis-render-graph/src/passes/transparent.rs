//! 透明物体
//!
//! 不透明物体放大到 output 分辨率之后，透明物体以 output 分辨率再走一遍
//! g-buffer -> 光照 -> 合成 -> IBL，结果在 FrameTransparent 中，最后叠加到 FrameOutput。
//! 折射采样的是 render 分辨率的不透明结果，放在放大之后可以避开 TAA/FSR 的 jitter。

use crate::pass::PassRunner;
use crate::passes::compute::ComputePass;
use crate::passes::geometry::GBufferPass;
use crate::passes::lighting::{self, LightPass};
use crate::passes::transfer::{TransferOp, TransferPass};
use crate::render_targets::RenderTarget;
use crate::shader_library::ShaderId;

/// 把透明物体的结果叠加到 FrameOutput
pub fn additive_transparent() -> ComputePass {
    ComputePass::new("additive_transparent", &[ShaderId::AdditiveTransparentC])
        .read(RenderTarget::FrameTransparent)
        .read_write(RenderTarget::FrameOutput)
}

/// 执行透明物体的所有 pass，返回是否叠加到了 FrameOutput
///
/// 没有可见的透明物体时什么都不做。
pub fn run_transparent(runner: &mut PassRunner) -> bool {
    let _span = tracy_client::span!("run_transparent");

    let frame = runner.frame();
    let transparent = runner.context().visibility.mesh_range(true, frame.meshes.len());
    if transparent.is_empty() {
        return false;
    }

    runner.run(&TransferPass::new(
        "upscale_depth",
        TransferOp::Blit(RenderTarget::GBufferDepth, RenderTarget::OutputDepth),
    ));
    runner.run(&GBufferPass::transparent());
    runner.run(&LightPass::transparent());
    runner.run(&lighting::light_composition(frame.settings.fog, true));
    runner.run(&lighting::image_based_lighting(true));
    runner.run(&additive_transparent())
}
