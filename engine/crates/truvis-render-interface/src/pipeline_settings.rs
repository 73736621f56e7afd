use std::{fmt::Display, ops::Deref};

use ash::vk;

/// 渲染器默认配置
pub struct DefaultRendererSettings;
impl DefaultRendererSettings {
    pub const OUTPUT_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
    pub const HDR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
    pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
    pub const SHADOW_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
    pub const SHADOW_COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
}

/// 帧级渲染配置
///
/// render 分辨率是内部计算的分辨率，output 分辨率是最终呈现的分辨率，
/// 两者不同时由 upscale pass 负责衔接。
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameSettings {
    pub render_extent: vk::Extent2D,
    pub output_extent: vk::Extent2D,
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
}
impl Default for FrameSettings {
    fn default() -> Self {
        let extent = vk::Extent2D {
            width: 1920,
            height: 1080,
        };
        Self {
            render_extent: extent,
            output_extent: extent,
            color_format: DefaultRendererSettings::HDR_FORMAT,
            depth_format: DefaultRendererSettings::DEPTH_FORMAT,
        }
    }
}

/// 呈现配置
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PresentSettings {
    pub hdr: bool,
    pub vsync: bool,
}
impl PresentSettings {
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        if self.vsync {
            vk::PresentModeKHR::FIFO
        } else {
            vk::PresentModeKHR::IMMEDIATE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AntialiasingMode {
    #[default]
    Disabled,
    Fxaa,
    Taa,
    TaaFxaa,
}
impl AntialiasingMode {
    pub fn from_f32(value: f32) -> Self {
        match value as u32 {
            1 => Self::Fxaa,
            2 => Self::Taa,
            3 => Self::TaaFxaa,
            _ => Self::Disabled,
        }
    }
    #[inline]
    pub fn as_f32(self) -> f32 {
        self as u32 as f32
    }
    #[inline]
    pub fn uses_taa(self) -> bool {
        matches!(self, Self::Taa | Self::TaaFxaa)
    }
    #[inline]
    pub fn uses_fxaa(self) -> bool {
        matches!(self, Self::Fxaa | Self::TaaFxaa)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsamplingMode {
    #[default]
    Linear,
    Fsr3,
}
impl UpsamplingMode {
    pub fn from_f32(value: f32) -> Self {
        match value as u32 {
            1 => Self::Fsr3,
            _ => Self::Linear,
        }
    }
    #[inline]
    pub fn as_f32(self) -> f32 {
        self as u32 as f32
    }
}

/// 色调映射曲线，`Passthrough` 不施加任何曲线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TonemappingMode {
    Amd,
    Aces,
    Reinhard,
    Uncharted2,
    Matrix,
    Realistic,
    #[default]
    Passthrough,
}
impl TonemappingMode {
    pub fn from_f32(value: f32) -> Self {
        match value as u32 {
            0 => Self::Amd,
            1 => Self::Aces,
            2 => Self::Reinhard,
            3 => Self::Uncharted2,
            4 => Self::Matrix,
            5 => Self::Realistic,
            _ => Self::Passthrough,
        }
    }
    #[inline]
    pub fn as_f32(self) -> f32 {
        self as u32 as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenspaceShadowMode {
    #[default]
    Disabled,
    Bend,
}
impl ScreenspaceShadowMode {
    #[inline]
    pub fn as_f32(self) -> f32 {
        self as u32 as f32
    }
}

/// 管线级配置
///
/// 每帧由 option store 生成一次，pass 只读取这里的值。
#[derive(Copy, Clone, Debug, Default)]
pub struct PipelineSettings {
    pub variable_rate_shading: bool,
    pub ssao: bool,
    pub ssr: bool,
    pub screen_space_shadows: bool,
    /// 0 表示关闭，非 0 表示相对 render 分辨率的比例
    pub global_illumination: f32,
    pub depth_of_field: bool,
    pub motion_blur: bool,
    pub bloom: f32,
    pub sharpness: f32,
    pub fog: f32,
    pub fog_volumetric: bool,
    pub exposure: f32,
    pub antialiasing: AntialiasingMode,
    pub upsampling: UpsamplingMode,
    pub tonemapping: TonemappingMode,
    pub wireframe: bool,
    pub chromatic_aberration: bool,
    pub film_grain: bool,
    pub grid: bool,
    pub selection_outline: bool,
    pub transform_handle: bool,
    pub lights: bool,
    pub physics: bool,
    pub performance_metrics: bool,
    pub occlusion_culling: bool,
}

/// 帧标签（A/B/C）
///
/// 表示当前处于 Frames in Flight 的哪一帧。
/// 通过 `Deref` 转换为索引 0/1/2。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLabel {
    A,
    B,
    C,
}
impl Deref for FrameLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
            Self::C => &Self::INDEX[2],
        }
    }
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}
impl FrameLabel {
    const INDEX: [usize; 3] = [0, 1, 2];

    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx {
            0 => Self::A,
            1 => Self::B,
            2 => Self::C,
            _ => panic!("Invalid frame index: {idx}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_float_encoding() {
        assert_eq!(AntialiasingMode::from_f32(AntialiasingMode::TaaFxaa.as_f32()), AntialiasingMode::TaaFxaa);
        assert_eq!(UpsamplingMode::from_f32(1.0), UpsamplingMode::Fsr3);
        assert_eq!(TonemappingMode::from_f32(6.0), TonemappingMode::Passthrough);
        assert!(AntialiasingMode::TaaFxaa.uses_taa());
        assert!(AntialiasingMode::TaaFxaa.uses_fxaa());
        assert!(!AntialiasingMode::Fxaa.uses_taa());
    }

    #[test]
    fn test_present_mode_follows_vsync() {
        let mut present = PresentSettings::default();
        assert_eq!(present.present_mode(), vk::PresentModeKHR::IMMEDIATE);
        present.vsync = true;
        assert_eq!(present.present_mode(), vk::PresentModeKHR::FIFO);
    }
}
