//! 各个 pass 的管线状态选择

use ash::vk;
use truvis_render_interface::pipeline_settings::{DefaultRendererSettings, PipelineSettings};
use truvis_render_interface::pipeline_state::{BlendMode, CullMode, DepthTest, PipelineStateDesc};

/// 正面深度写入；`backface` 时剔除正面、保留最远的背面深度，用于 SSS 厚度近似
pub fn depth_prepass(backface: bool) -> PipelineStateDesc {
    if backface {
        PipelineStateDesc::graphics("depth_prepass_backface")
            .with_cull(CullMode::Front)
            .with_depth(DepthTest::GreaterEqual, true, DefaultRendererSettings::DEPTH_FORMAT)
    } else {
        PipelineStateDesc::graphics("depth_prepass")
            .with_cull(CullMode::Back)
            .with_depth(DepthTest::LessEqual, true, DefaultRendererSettings::DEPTH_FORMAT)
    }
}

/// shadow map：透明物体写入彩色 shadow map，不写深度
pub fn shadow(transparent: bool) -> PipelineStateDesc {
    if transparent {
        PipelineStateDesc::graphics("shadow_color")
            .with_cull(CullMode::None)
            .with_depth(DepthTest::LessEqual, false, DefaultRendererSettings::SHADOW_DEPTH_FORMAT)
            .with_color(DefaultRendererSettings::SHADOW_COLOR_FORMAT)
            .with_blend(BlendMode::Alpha)
    } else {
        PipelineStateDesc::graphics("shadow_depth")
            .with_cull(CullMode::None)
            .with_depth(DepthTest::LessEqual, true, DefaultRendererSettings::SHADOW_DEPTH_FORMAT)
    }
}

/// 不透明 g-buffer 在 depth prepass 之后用相等测试，避免 overdraw；
/// 透明物体没有预渲染的深度，正常测试并写入 OutputDepth
pub fn gbuffer(settings: &PipelineSettings, transparent: bool) -> PipelineStateDesc {
    let desc = if transparent {
        PipelineStateDesc::graphics("gbuffer_transparent").with_depth(
            DepthTest::LessEqual,
            true,
            DefaultRendererSettings::DEPTH_FORMAT,
        )
    } else {
        PipelineStateDesc::graphics("gbuffer").with_depth(DepthTest::Equal, false, DefaultRendererSettings::DEPTH_FORMAT)
    };
    desc.with_cull(if settings.wireframe { CullMode::None } else { CullMode::Back })
        .with_color(DefaultRendererSettings::OUTPUT_FORMAT)
        .with_color(DefaultRendererSettings::HDR_FORMAT)
        .with_color(DefaultRendererSettings::HDR_FORMAT)
        .with_color(vk::Format::R16G16_SFLOAT)
        .with_wireframe(settings.wireframe)
        .with_vrs(settings.variable_rate_shading && !transparent)
}

/// 叠加在 output 上的调试图元
pub fn overlay(name: &'static str, depth_tested: bool) -> PipelineStateDesc {
    let desc = PipelineStateDesc::graphics(name)
        .with_cull(CullMode::None)
        .with_color(DefaultRendererSettings::OUTPUT_FORMAT)
        .with_blend(BlendMode::Alpha);
    if depth_tested {
        desc.with_depth(DepthTest::LessEqual, false, DefaultRendererSettings::DEPTH_FORMAT)
    } else {
        desc
    }
}

#[inline]
pub fn compute(name: &'static str) -> PipelineStateDesc {
    PipelineStateDesc::compute(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gbuffer_state_follows_options() {
        let mut settings = PipelineSettings::default();
        let solid = gbuffer(&settings, false);
        assert_eq!(solid.depth_test, DepthTest::Equal);
        assert!(!solid.depth_write);
        assert_eq!(solid.cull_mode, CullMode::Back);
        assert_eq!(solid.color_formats.len(), 4);

        settings.wireframe = true;
        settings.variable_rate_shading = true;
        let wire = gbuffer(&settings, false);
        assert!(wire.wireframe && wire.vrs);
        assert_eq!(wire.cull_mode, CullMode::None);

        // shading rate 图像是 render 分辨率，透明 g-buffer 不使用
        let transparent = gbuffer(&settings, true);
        assert_eq!(transparent.depth_test, DepthTest::LessEqual);
        assert!(transparent.depth_write && !transparent.vrs);
    }

    #[test]
    fn test_backface_depth_keeps_farthest() {
        let back = depth_prepass(true);
        assert_eq!(back.cull_mode, CullMode::Front);
        assert_eq!(back.depth_test, DepthTest::GreaterEqual);
        assert!(shadow(true).color_formats.len() == 1 && !shadow(true).depth_write);
    }
}
