//! Pass 定义、资源声明与执行
//!
//! 每个 pass 实现 [`RenderPass`]：在 `setup` 中声明读写的纹理和期望的状态，
//! 执行器据此在 pass 之前插入 layout 转换，然后调用 `execute` 录制命令。
//! pass 的顺序由 [`crate::orchestrator`] 固定，不做依赖分析。

use std::sync::Arc;

use ash::vk;
use truvis_render_interface::bindless_manager::BindlessManager;
use truvis_render_interface::command_recorder::CommandRecorder;
use truvis_render_interface::handles::TextureHandle;
use truvis_render_interface::pipeline_settings::PipelineSettings;
use truvis_render_interface::resource_state::ImageState;
use truvis_render_interface::texture::{RenderTexture, TexturePool};
use truvis_scene::components::camera::CameraView;
use truvis_scene::guid_new_type::EntityHandle;
use truvis_scene::scene_manager::SceneManager;
use truvis_scene::visibility::VisibilityEngine;

use crate::pass_constants::{LineVertex, PassConstants, TextEntry};
use crate::render_targets::{RenderTarget, RenderTargets};
use crate::shader_library::{ShaderId, ShaderLibrary};

/// 一帧内所有 pass 共享的只读数据
pub struct FrameResources<'a> {
    pub scene: &'a SceneManager,
    /// 已经按可见性排序的 Mesh bucket
    pub meshes: &'a [EntityHandle],
    pub lights: &'a [EntityHandle],
    pub camera: Option<&'a CameraView>,
    pub targets: &'a RenderTargets,
    pub textures: &'a TexturePool,
    pub shaders: &'a ShaderLibrary,
    pub bindless: &'a BindlessManager,
    pub settings: &'a PipelineSettings,
    pub lines: &'a [LineVertex],
    /// 本帧线段在 Lines 动态 buffer 中的 offset，`None` 表示没有分配到空间
    pub lines_offset: Option<usize>,
    pub texts: &'a [TextEntry],
    pub selected: Option<EntityHandle>,
    /// 在 temporal upscaler 中丢弃历史
    pub reset_history: bool,
    pub jitter: glam::Vec2,
}

/// Pass 执行时的上下文
pub struct PassContext<'a> {
    pub cmd: &'a mut dyn CommandRecorder,
    /// depth prepass 会用遮挡查询结果更新它
    pub visibility: &'a mut VisibilityEngine,
    pub frame: &'a FrameResources<'a>,
}
impl PassContext<'_> {
    #[inline]
    pub fn target(&self, target: RenderTarget) -> TextureHandle {
        self.frame.targets.get(target)
    }

    #[inline]
    pub fn texture(&self, handle: TextureHandle) -> Option<&Arc<RenderTexture>> {
        self.frame.textures.get(handle)
    }

    /// render target 的尺寸
    pub fn target_extent(&self, target: RenderTarget) -> vk::Extent2D {
        self.texture(self.target(target))
            .map(|t| vk::Extent2D {
                width: t.desc().width,
                height: t.desc().height,
            })
            .unwrap_or_default()
    }

    #[inline]
    pub fn push_constants(&mut self, constants: &PassConstants) {
        self.cmd.push_constants(constants.as_bytes());
    }

    /// 以 8x8 的线程组覆盖整个 target
    pub fn dispatch_for(&mut self, target: RenderTarget, mip: u32) {
        let extent = self.target_extent(target);
        let width = (extent.width >> mip).max(1);
        let height = (extent.height >> mip).max(1);
        self.cmd.dispatch(width.div_ceil(8), height.div_ceil(8), 1);
    }
}

/// 纹理访问声明
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureAccess {
    pub texture: TextureHandle,
    pub state: ImageState,
    /// `None` 表示所有 mip
    pub mip: Option<u32>,
}

/// 在 `RenderPass::setup` 中声明 pass 的资源依赖
pub struct PassBuilder<'a> {
    frame: &'a FrameResources<'a>,
    accesses: Vec<TextureAccess>,
}
impl<'a> PassBuilder<'a> {
    fn new(frame: &'a FrameResources<'a>) -> Self {
        Self {
            frame,
            accesses: Vec::new(),
        }
    }

    #[inline]
    pub fn frame(&self) -> &'a FrameResources<'a> {
        self.frame
    }

    /// 读取 render target
    #[inline]
    pub fn read(&mut self, target: RenderTarget, state: ImageState) -> &mut Self {
        self.texture(self.frame.targets.get(target), state, None)
    }

    /// 写入 render target
    #[inline]
    pub fn write(&mut self, target: RenderTarget, state: ImageState) -> &mut Self {
        debug_assert!(state.is_write(), "write declared with read-only state");
        self.texture(self.frame.targets.get(target), state, None)
    }

    #[inline]
    pub fn mip(&mut self, target: RenderTarget, mip: u32, state: ImageState) -> &mut Self {
        self.texture(self.frame.targets.get(target), state, Some(mip))
    }

    /// 非 render target 的纹理，例如 shadow map
    pub fn texture(&mut self, texture: TextureHandle, state: ImageState, mip: Option<u32>) -> &mut Self {
        self.accesses.push(TextureAccess { texture, state, mip });
        self
    }

    #[inline]
    pub fn accesses(&self) -> &[TextureAccess] {
        &self.accesses
    }
}

/// 渲染 pass
///
/// `shaders` 中任何一个还没有编译完成时，这一帧直接跳过该 pass。
pub trait RenderPass {
    fn name(&self) -> &'static str;

    fn shaders(&self) -> &'static [ShaderId];

    /// 声明读写的纹理
    fn setup(&self, builder: &mut PassBuilder);

    fn execute(&self, ctx: &mut PassContext);
}

/// 一帧的执行统计
#[derive(Debug, Default, Clone)]
pub struct FrameStats {
    pub executed: Vec<&'static str>,
    /// shader 未就绪而跳过的 pass
    pub skipped: Vec<&'static str>,
}

/// 按调用顺序立即执行 pass
pub struct PassRunner<'a> {
    ctx: PassContext<'a>,
    stats: FrameStats,
}
// new & init
impl<'a> PassRunner<'a> {
    pub fn new(cmd: &'a mut dyn CommandRecorder, visibility: &'a mut VisibilityEngine, frame: &'a FrameResources<'a>) -> Self {
        Self {
            ctx: PassContext { cmd, visibility, frame },
            stats: FrameStats::default(),
        }
    }
}
// tools
impl<'a> PassRunner<'a> {
    /// 执行一个 pass，返回是否真正执行
    pub fn run(&mut self, pass: &dyn RenderPass) -> bool {
        let name = pass.name();
        if !self.ctx.frame.shaders.are_compiled(pass.shaders()) {
            log::debug!("skip pass {name}: shaders not compiled");
            self.stats.skipped.push(name);
            return false;
        }

        let mut builder = PassBuilder::new(self.ctx.frame);
        pass.setup(&mut builder);

        self.ctx.cmd.begin_marker(name);
        self.ctx.cmd.begin_timeblock(name);
        for access in builder.accesses() {
            if let Some(texture) = self.ctx.frame.textures.get(access.texture) {
                texture.set_layout(self.ctx.cmd, access.state.layout, access.mip);
            }
        }
        pass.execute(&mut self.ctx);
        self.ctx.cmd.end_timeblock();
        self.ctx.cmd.end_marker();

        self.stats.executed.push(name);
        true
    }

    #[inline]
    pub fn context(&mut self) -> &mut PassContext<'a> {
        &mut self.ctx
    }

    #[inline]
    pub fn frame(&self) -> &'a FrameResources<'a> {
        self.ctx.frame
    }

    pub fn finish(self) -> FrameStats {
        self.stats
    }
}
