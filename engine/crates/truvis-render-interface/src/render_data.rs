use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::handles::{LightHandle, MaterialHandle, TextureHandle};

/// 材质贴图的类型，每种类型有 [`MaterialTextureType::SLOTS`] 个槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialTextureType {
    Color,
    Roughness,
    Metalness,
    Normal,
    Occlusion,
    Emission,
    Height,
    AlphaMask,
}
impl MaterialTextureType {
    pub const COUNT: usize = 8;
    pub const SLOTS: usize = 4;
    /// 一个材质在 bindless 纹理数组中占用的连续槽位数
    pub const STRIDE: usize = Self::COUNT * Self::SLOTS;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Color,
        Self::Roughness,
        Self::Metalness,
        Self::Normal,
        Self::Occlusion,
        Self::Emission,
        Self::Height,
        Self::AlphaMask,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// 材质的贴图表，按 `[类型][槽位]` 索引
pub type MaterialTextures = [[Option<TextureHandle>; MaterialTextureType::SLOTS]; MaterialTextureType::COUNT];

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MaterialRecordFlags: u32 {
        const HEIGHT = 1 << 0;
        const NORMAL = 1 << 1;
        const COLOR = 1 << 2;
        const ROUGHNESS = 1 << 3;
        const METALNESS = 1 << 4;
        const ALPHA_MASK = 1 << 5;
        const EMISSION = 1 << 6;
        const OCCLUSION = 1 << 7;
        const SLOPE_TEXTURING = 1 << 8;
        const WIND_ANIMATION = 1 << 9;
        const WATER_ANIMATION = 1 << 10;
        const TESSELLATED = 1 << 11;
    }
}
impl MaterialRecordFlags {
    /// 某一类贴图存在时对应的标记位
    pub fn for_texture_type(ty: MaterialTextureType) -> Self {
        match ty {
            MaterialTextureType::Color => Self::COLOR,
            MaterialTextureType::Roughness => Self::ROUGHNESS,
            MaterialTextureType::Metalness => Self::METALNESS,
            MaterialTextureType::Normal => Self::NORMAL,
            MaterialTextureType::Occlusion => Self::OCCLUSION,
            MaterialTextureType::Emission => Self::EMISSION,
            MaterialTextureType::Height => Self::HEIGHT,
            MaterialTextureType::AlphaMask => Self::ALPHA_MASK,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LightRecordFlags: u32 {
        const DIRECTIONAL = 1 << 0;
        const POINT = 1 << 1;
        const SPOT = 1 << 2;
        const SHADOWS = 1 << 3;
        const SHADOWS_TRANSPARENT = 1 << 4;
        const SHADOWS_SCREEN_SPACE = 1 << 5;
        const VOLUMETRIC = 1 << 6;
    }
}

/// GPU 端的材质属性，布局与着色器一致
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct MaterialRecord {
    pub color: [f32; 4],
    pub tiling: [f32; 2],
    pub offset: [f32; 2],
    pub roughness: f32,
    pub metalness: f32,
    pub normal: f32,
    pub height: f32,
    pub anisotropic: f32,
    pub anisotropic_rotation: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    pub sheen: f32,
    pub sheen_tint: f32,
    pub subsurface_scattering: f32,
    pub ior: f32,
    pub world_space_height: f32,
    pub flags: u32,
    pub _padding: [u32; 2],
}

/// GPU 端的光源属性
///
/// 点光源的 `view_projection` 只存 view，抛物面投影在顶点着色器中完成。
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct LightRecord {
    pub view_projection: [[f32; 16]; 2],
    pub position: [f32; 3],
    pub range: f32,
    pub direction: [f32; 3],
    pub angle: f32,
    pub color: [f32; 3],
    pub intensity: f32,
    pub flags: u32,
    pub slice_count: u32,
    pub _padding: [u32; 2],
}

/// 用于渲染的材质数据（只读快照）
#[derive(Clone)]
pub struct MaterialRenderData {
    pub handle: MaterialHandle,
    pub record: MaterialRecord,
    pub textures: MaterialTextures,
}

/// 用于渲染的光源数据（只读快照）
#[derive(Clone)]
pub struct LightRenderData {
    pub handle: LightHandle,
    pub record: LightRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes_match_shader_layout() {
        assert_eq!(size_of::<MaterialRecord>(), 96);
        assert_eq!(size_of::<LightRecord>(), 192);
        assert_eq!(MaterialTextureType::STRIDE, 32);
    }

    #[test]
    fn test_texture_type_flags() {
        assert_eq!(MaterialRecordFlags::for_texture_type(MaterialTextureType::Height).bits(), 1);
        assert_eq!(MaterialRecordFlags::for_texture_type(MaterialTextureType::AlphaMask).bits(), 1 << 5);
        assert_eq!(LightRecordFlags::VOLUMETRIC.bits(), 1 << 6);
    }
}
