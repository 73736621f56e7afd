use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_utils::sync::WaitGroup;

/// 渲染器使用的所有 shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderId {
    DepthPrepassV,
    DepthPrepassP,
    ShadowDepthV,
    ShadowDepthP,
    ShadowColorP,
    GBufferV,
    GBufferP,
    VariableRateShadingC,
    SkysphereC,
    BrdfSpecularLutC,
    EnvironmentFilterC,
    MipGenerationC,
    SsaoC,
    SsrC,
    SssBendC,
    LightC,
    GiC,
    LightCompositionC,
    LightImageBasedC,
    UpscaleFsr3C,
    AdditiveTransparentC,
    DepthOfFieldC,
    MotionBlurC,
    BloomC,
    TonemapC,
    SharpeningC,
    FxaaC,
    ChromaticAberrationC,
    FilmGrainC,
    GridV,
    GridP,
    LinesV,
    LinesP,
    OutlineV,
    OutlineP,
    IconV,
    IconP,
    FontV,
    FontP,
}
impl ShaderId {
    pub const COUNT: usize = 39;
    pub const ALL: [ShaderId; Self::COUNT] = [
        Self::DepthPrepassV,
        Self::DepthPrepassP,
        Self::ShadowDepthV,
        Self::ShadowDepthP,
        Self::ShadowColorP,
        Self::GBufferV,
        Self::GBufferP,
        Self::VariableRateShadingC,
        Self::SkysphereC,
        Self::BrdfSpecularLutC,
        Self::EnvironmentFilterC,
        Self::MipGenerationC,
        Self::SsaoC,
        Self::SsrC,
        Self::SssBendC,
        Self::LightC,
        Self::GiC,
        Self::LightCompositionC,
        Self::LightImageBasedC,
        Self::UpscaleFsr3C,
        Self::AdditiveTransparentC,
        Self::DepthOfFieldC,
        Self::MotionBlurC,
        Self::BloomC,
        Self::TonemapC,
        Self::SharpeningC,
        Self::FxaaC,
        Self::ChromaticAberrationC,
        Self::FilmGrainC,
        Self::GridV,
        Self::GridP,
        Self::LinesV,
        Self::LinesP,
        Self::OutlineV,
        Self::OutlineP,
        Self::IconV,
        Self::IconP,
        Self::FontV,
        Self::FontP,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// 编译单个 shader 的后端
///
/// 真正的编译器（slang/hlsl/glsl）在外部实现，这里只关心结果。
pub trait ShaderCompiler: Send + Sync {
    fn compile(&self, shader: ShaderId) -> anyhow::Result<()>;
}

/// 什么都不做的编译器，headless 运行时使用
pub struct NullShaderCompiler;
impl ShaderCompiler for NullShaderCompiler {
    fn compile(&self, _shader: ShaderId) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 所有 shader 的编译状态
///
/// 编译在后台线程池中进行，完成一个就置位一个；pass 在执行前检查自己需要的 shader。
pub struct ShaderLibrary {
    compiled: Arc<[AtomicBool; ShaderId::COUNT]>,
    failed: Arc<AtomicUsize>,
    wait_group: Option<WaitGroup>,
}
// new & init
impl ShaderLibrary {
    pub fn new() -> Self {
        Self {
            compiled: Arc::new(std::array::from_fn(|_| AtomicBool::new(false))),
            failed: Arc::new(AtomicUsize::new(0)),
            wait_group: None,
        }
    }

    /// 在线程池中编译所有 shader，不阻塞调用者
    pub fn compile_all(&mut self, compiler: Arc<dyn ShaderCompiler>, pool: &rayon::ThreadPool) {
        let wait_group = WaitGroup::new();
        for shader in ShaderId::ALL {
            let compiler = compiler.clone();
            let compiled = self.compiled.clone();
            let failed = self.failed.clone();
            let wg = wait_group.clone();
            pool.spawn(move || {
                let _span = tracy_client::span!("ShaderLibrary::compile");
                match compiler.compile(shader) {
                    Ok(()) => compiled[shader.index()].store(true, Ordering::Release),
                    Err(e) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        log::error!("Failed to compile shader {:?}: {:#}", shader, e);
                    }
                }
                drop(wg);
            });
        }
        self.wait_group = Some(wait_group);
    }

    /// 阻塞直到所有已提交的编译任务结束
    pub fn wait(&mut self) {
        if let Some(wait_group) = self.wait_group.take() {
            wait_group.wait();
            log::info!(
                "Shader compilation finished: {} compiled, {} failed",
                self.compiled_count(),
                self.failed.load(Ordering::Relaxed)
            );
        }
    }

    /// 直接标记编译结果
    #[inline]
    pub fn set_compiled(&self, shader: ShaderId, compiled: bool) {
        self.compiled[shader.index()].store(compiled, Ordering::Release);
    }
}
impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}
impl Drop for ShaderLibrary {
    fn drop(&mut self) {
        log::info!("Dropping ShaderLibrary");
        self.wait();
    }
}
// getters
impl ShaderLibrary {
    #[inline]
    pub fn is_compiled(&self, shader: ShaderId) -> bool {
        self.compiled[shader.index()].load(Ordering::Acquire)
    }

    #[inline]
    pub fn are_compiled(&self, shaders: &[ShaderId]) -> bool {
        shaders.iter().all(|s| self.is_compiled(*s))
    }

    pub fn compiled_count(&self) -> usize {
        self.compiled.iter().filter(|c| c.load(Ordering::Acquire)).count()
    }

    #[inline]
    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingCompiler(ShaderId);
    impl ShaderCompiler for FailingCompiler {
        fn compile(&self, shader: ShaderId) -> anyhow::Result<()> {
            anyhow::ensure!(shader != self.0, "syntax error");
            Ok(())
        }
    }

    #[test]
    fn test_background_compilation_sets_flags() {
        tracy_client::Client::start();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let mut library = ShaderLibrary::new();
        assert!(!library.is_compiled(ShaderId::TonemapC));

        library.compile_all(Arc::new(FailingCompiler(ShaderId::BloomC)), &pool);
        library.wait();

        assert_eq!(library.compiled_count(), ShaderId::COUNT - 1);
        assert_eq!(library.failed_count(), 1);
        assert!(library.are_compiled(&[ShaderId::TonemapC, ShaderId::FxaaC]));
        assert!(!library.are_compiled(&[ShaderId::TonemapC, ShaderId::BloomC]));
    }

    #[test]
    fn test_shader_index_matches_table() {
        for (i, shader) in ShaderId::ALL.iter().enumerate() {
            assert_eq!(shader.index(), i);
        }
    }
}
