use bytemuck::{Pod, Zeroable};

/// 每次 draw/dispatch 前 push 的常量
///
/// 布局与 shader 中的 push constant block 一致。
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PassConstants {
    pub transform: [f32; 16],
    pub transform_previous: [f32; 16],
    pub material_index: u32,
    pub light_index: u32,
    pub slice: u32,
    pub flags: u32,
    /// 各个 pass 自定义的参数
    pub values: [f32; 4],
    pub resolution: [f32; 2],
    pub _padding: [f32; 2],
}
impl Default for PassConstants {
    fn default() -> Self {
        Self {
            transform: glam::Mat4::IDENTITY.to_cols_array(),
            transform_previous: glam::Mat4::IDENTITY.to_cols_array(),
            ..Zeroable::zeroed()
        }
    }
}
impl PassConstants {
    /// `flags` 的最高位：透明物体的着色 pass
    pub const TRANSPARENT_FLAG: u32 = 1 << 31;

    #[inline]
    pub fn with_transparent(mut self, transparent: bool) -> Self {
        if transparent {
            self.flags |= Self::TRANSPARENT_FLAG;
        }
        self
    }

    #[inline]
    pub fn with_transform(mut self, current: glam::Mat4, previous: glam::Mat4) -> Self {
        self.transform = current.to_cols_array();
        self.transform_previous = previous.to_cols_array();
        self
    }

    #[inline]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = [width as f32, height as f32];
        self
    }

    #[inline]
    pub fn with_values(mut self, values: [f32; 4]) -> Self {
        self.values = values;
        self
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// 调试线段的顶点
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}
impl LineVertex {
    #[inline]
    pub fn new(position: glam::Vec3, color: glam::Vec4) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
        }
    }
}

/// 等待 text pass 绘制的一行文字
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntry {
    pub text: String,
    /// 屏幕像素坐标
    pub position: glam::Vec2,
    pub color: glam::Vec4,
}
