use truvis_render_interface::resource_state::ImageState;

use crate::pass::{PassBuilder, PassContext, RenderPass};
use crate::pass_constants::PassConstants;
use crate::pipeline_states;
use crate::render_targets::RenderTarget;
use crate::shader_library::ShaderId;

/// 覆盖整个输出 target 的 compute pass
///
/// 读取的 target 从 slot 0 开始绑定，写入的从 [`ComputePass::OUTPUT_SLOT`] 开始。
#[derive(Debug, Clone)]
pub struct ComputePass {
    name: &'static str,
    shaders: &'static [ShaderId],
    reads: Vec<(RenderTarget, Option<u32>)>,
    writes: Vec<(RenderTarget, Option<u32>, ImageState)>,
    values: [f32; 4],
    transparent: bool,
}
// new & init
impl ComputePass {
    pub const OUTPUT_SLOT: u32 = 16;

    pub fn new(name: &'static str, shaders: &'static [ShaderId]) -> Self {
        Self {
            name,
            shaders,
            reads: Vec::new(),
            writes: Vec::new(),
            values: [0.0; 4],
            transparent: false,
        }
    }

    #[inline]
    pub fn read(mut self, target: RenderTarget) -> Self {
        self.reads.push((target, None));
        self
    }

    #[inline]
    pub fn read_mip(mut self, target: RenderTarget, mip: u32) -> Self {
        self.reads.push((target, Some(mip)));
        self
    }

    #[inline]
    pub fn write(mut self, target: RenderTarget) -> Self {
        self.writes.push((target, None, ImageState::STORAGE_WRITE_COMPUTE));
        self
    }

    /// 在已有内容上累加
    #[inline]
    pub fn read_write(mut self, target: RenderTarget) -> Self {
        self.writes.push((target, None, ImageState::STORAGE_READ_WRITE_COMPUTE));
        self
    }

    #[inline]
    pub fn write_mip(mut self, target: RenderTarget, mip: u32) -> Self {
        self.writes.push((target, Some(mip), ImageState::STORAGE_WRITE_COMPUTE));
        self
    }

    #[inline]
    pub fn with_values(mut self, values: [f32; 4]) -> Self {
        self.values = values;
        self
    }

    /// 在 push constant 中标记透明物体的 pass
    #[inline]
    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }
}
// getters
impl ComputePass {
    #[inline]
    pub fn values(&self) -> [f32; 4] {
        self.values
    }

    /// 第一个写入的 target，dispatch 的尺寸由它决定
    #[inline]
    pub fn output(&self) -> Option<RenderTarget> {
        self.writes.first().map(|(target, _, _)| *target)
    }
}
impl RenderPass for ComputePass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn shaders(&self) -> &'static [ShaderId] {
        self.shaders
    }

    fn setup(&self, builder: &mut PassBuilder) {
        for (target, mip) in &self.reads {
            match mip {
                Some(mip) => builder.mip(*target, *mip, ImageState::SHADER_READ_COMPUTE),
                None => builder.read(*target, ImageState::SHADER_READ_COMPUTE),
            };
        }
        for (target, mip, state) in &self.writes {
            match mip {
                Some(mip) => builder.mip(*target, *mip, *state),
                None => builder.write(*target, *state),
            };
        }
    }

    fn execute(&self, ctx: &mut PassContext) {
        let Some(&(output, output_mip, _)) = self.writes.first() else {
            return;
        };

        ctx.cmd.set_pipeline_state(&pipeline_states::compute(self.name));
        for (slot, (target, mip)) in self.reads.iter().enumerate() {
            let texture = ctx.target(*target);
            ctx.cmd.set_texture(slot as u32, texture, *mip);
        }
        for (slot, (target, mip, _)) in self.writes.iter().enumerate() {
            let texture = ctx.target(*target);
            ctx.cmd.set_texture(Self::OUTPUT_SLOT + slot as u32, texture, *mip);
        }

        let extent = ctx.target_extent(output);
        let mip = output_mip.unwrap_or(0);
        let constants = PassConstants::default()
            .with_resolution((extent.width >> mip).max(1), (extent.height >> mip).max(1))
            .with_values(self.values)
            .with_transparent(self.transparent);
        ctx.push_constants(&constants);
        ctx.dispatch_for(output, mip);
    }
}
