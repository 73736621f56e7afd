//! output 分辨率上的后处理链
//!
//! 每个阶段读取上一个阶段的结果、写入另一张 target，两张 target 交替使用。
//! 阶段被跳过（未开启或 shader 未就绪）时不交换，链条结束后结果可能停留在任意一张上。

use truvis_render_interface::pipeline_settings::{PipelineSettings, UpsamplingMode};

use crate::pass::PassRunner;
use crate::passes::compute::ComputePass;
use crate::render_targets::RenderTarget;
use crate::shader_library::ShaderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessStage {
    DepthOfField,
    MotionBlur,
    Bloom,
    Tonemap,
    Sharpening,
    Fxaa,
    ChromaticAberration,
    FilmGrain,
}
impl PostProcessStage {
    /// 执行顺序
    pub const ALL: [PostProcessStage; 8] = [
        Self::DepthOfField,
        Self::MotionBlur,
        Self::Bloom,
        Self::Tonemap,
        Self::Sharpening,
        Self::Fxaa,
        Self::ChromaticAberration,
        Self::FilmGrain,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::DepthOfField => "depth_of_field",
            Self::MotionBlur => "motion_blur",
            Self::Bloom => "bloom",
            Self::Tonemap => "tonemap",
            Self::Sharpening => "sharpening",
            Self::Fxaa => "fxaa",
            Self::ChromaticAberration => "chromatic_aberration",
            Self::FilmGrain => "film_grain",
        }
    }

    pub fn shaders(self) -> &'static [ShaderId] {
        match self {
            Self::DepthOfField => &[ShaderId::DepthOfFieldC],
            Self::MotionBlur => &[ShaderId::MotionBlurC],
            Self::Bloom => &[ShaderId::BloomC],
            Self::Tonemap => &[ShaderId::TonemapC],
            Self::Sharpening => &[ShaderId::SharpeningC],
            Self::Fxaa => &[ShaderId::FxaaC],
            Self::ChromaticAberration => &[ShaderId::ChromaticAberrationC],
            Self::FilmGrain => &[ShaderId::FilmGrainC],
        }
    }

    pub fn is_enabled(self, settings: &PipelineSettings) -> bool {
        match self {
            Self::DepthOfField => settings.depth_of_field,
            Self::MotionBlur => settings.motion_blur,
            Self::Bloom => settings.bloom > 0.0,
            Self::Tonemap => true,
            // FSR3 自带锐化
            Self::Sharpening => settings.sharpness != 0.0 && settings.upsampling != UpsamplingMode::Fsr3,
            Self::Fxaa => settings.antialiasing.uses_fxaa(),
            Self::ChromaticAberration => settings.chromatic_aberration,
            Self::FilmGrain => settings.film_grain,
        }
    }

    fn values(self, settings: &PipelineSettings) -> [f32; 4] {
        match self {
            Self::Bloom => [settings.bloom, 0.0, 0.0, 0.0],
            Self::Tonemap => [settings.exposure, settings.tonemapping.as_f32(), 0.0, 0.0],
            Self::Sharpening => [settings.sharpness, 0.0, 0.0, 0.0],
            _ => [0.0; 4],
        }
    }

    pub fn pass(self, settings: &PipelineSettings, src: RenderTarget, dst: RenderTarget) -> ComputePass {
        let pass = ComputePass::new(self.name(), self.shaders()).read(src);
        let pass = match self {
            Self::DepthOfField => pass.read(RenderTarget::OutputDepth),
            Self::MotionBlur => pass.read(RenderTarget::GBufferVelocity).read(RenderTarget::GBufferDepth),
            _ => pass,
        };
        pass.write(dst).with_values(self.values(settings))
    }
}

/// FrameOutput 与 FrameOutput2 的交替
#[derive(Debug, Default, Clone, Copy)]
pub struct PingPong {
    swapped: bool,
}
impl PingPong {
    #[inline]
    pub fn src(&self) -> RenderTarget {
        if self.swapped { RenderTarget::FrameOutput2 } else { RenderTarget::FrameOutput }
    }

    #[inline]
    pub fn dst(&self) -> RenderTarget {
        if self.swapped { RenderTarget::FrameOutput } else { RenderTarget::FrameOutput2 }
    }

    #[inline]
    pub fn swap(&mut self) {
        self.swapped = !self.swapped;
    }
}

/// 执行整条后处理链，返回最终结果所在的 target
pub fn run_post_process(runner: &mut PassRunner) -> RenderTarget {
    let _span = tracy_client::span!("run_post_process");

    let settings = runner.frame().settings;
    let mut ping_pong = PingPong::default();
    for stage in PostProcessStage::ALL {
        if !stage.is_enabled(settings) {
            continue;
        }
        if runner.run(&stage.pass(settings, ping_pong.src(), ping_pong.dst())) {
            ping_pong.swap();
        }
    }
    ping_pong.src()
}

#[cfg(test)]
mod tests {
    use super::*;
    use truvis_render_interface::pipeline_settings::AntialiasingMode;

    #[test]
    fn test_stage_enablement() {
        let mut settings = PipelineSettings::default();
        let enabled = |s: &PipelineSettings| {
            PostProcessStage::ALL
                .into_iter()
                .filter(|stage| stage.is_enabled(s))
                .collect::<Vec<_>>()
        };
        assert_eq!(enabled(&settings), vec![PostProcessStage::Tonemap]);

        settings.bloom = 0.5;
        settings.sharpness = 0.5;
        settings.antialiasing = AntialiasingMode::TaaFxaa;
        assert_eq!(
            enabled(&settings),
            vec![PostProcessStage::Bloom, PostProcessStage::Tonemap, PostProcessStage::Sharpening, PostProcessStage::Fxaa]
        );

        settings.upsampling = UpsamplingMode::Fsr3;
        assert!(!PostProcessStage::Sharpening.is_enabled(&settings));
    }

    #[test]
    fn test_ping_pong_alternates() {
        let mut ping_pong = PingPong::default();
        assert_eq!(ping_pong.src(), RenderTarget::FrameOutput);
        assert_eq!(ping_pong.dst(), RenderTarget::FrameOutput2);
        ping_pong.swap();
        assert_eq!(ping_pong.src(), RenderTarget::FrameOutput2);
        assert_eq!(ping_pong.dst(), RenderTarget::FrameOutput);

        let pass = PostProcessStage::Tonemap.pass(&PipelineSettings::default(), ping_pong.src(), ping_pong.dst());
        assert_eq!(pass.output(), Some(RenderTarget::FrameOutput));
    }
}
