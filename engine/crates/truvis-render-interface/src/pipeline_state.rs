use ash::vk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthTest {
    #[default]
    Disabled,
    /// reverse-z 之外的普通写入测试
    LessEqual,
    /// depth prepass 之后的 g-buffer 使用，避免 overdraw
    Equal,
    /// 背面深度（用于 SSS 厚度近似）
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Disabled,
    Alpha,
    Additive,
}

/// 管线状态描述
///
/// 命令录制只关心这组固定功能状态和 shader 组合的名字，
/// 真正的 pipeline 对象由图形 API 层按描述缓存。
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStateDesc {
    pub name: &'static str,
    pub compute: bool,
    pub cull_mode: CullMode,
    pub depth_test: DepthTest,
    pub depth_write: bool,
    pub blend: BlendMode,
    pub wireframe: bool,
    pub color_formats: Vec<vk::Format>,
    pub depth_format: vk::Format,
    pub vrs: bool,
}
impl PipelineStateDesc {
    pub fn compute(name: &'static str) -> Self {
        Self {
            name,
            compute: true,
            cull_mode: CullMode::None,
            depth_test: DepthTest::Disabled,
            depth_write: false,
            blend: BlendMode::Disabled,
            wireframe: false,
            color_formats: Vec::new(),
            depth_format: vk::Format::UNDEFINED,
            vrs: false,
        }
    }

    pub fn graphics(name: &'static str) -> Self {
        Self {
            compute: false,
            cull_mode: CullMode::Back,
            ..Self::compute(name)
        }
    }

    #[inline]
    pub fn with_cull(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    #[inline]
    pub fn with_depth(mut self, depth_test: DepthTest, depth_write: bool, format: vk::Format) -> Self {
        self.depth_test = depth_test;
        self.depth_write = depth_write;
        self.depth_format = format;
        self
    }

    #[inline]
    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    #[inline]
    pub fn with_color(mut self, format: vk::Format) -> Self {
        self.color_formats.push(format);
        self
    }

    #[inline]
    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }

    #[inline]
    pub fn with_vrs(mut self, vrs: bool) -> Self {
        self.vrs = vrs;
        self
    }
}
