use truvis_render_interface::handles::TextureHandle;
use truvis_render_interface::render_data::{MaterialRecord, MaterialRecordFlags, MaterialTextureType, MaterialTextures};

/// CPU 侧的材质数据
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    /// 不可见的材质不会进入 Mesh bucket
    pub visible: bool,

    pub color: glam::Vec4,
    pub tiling: glam::Vec2,
    pub offset: glam::Vec2,
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

    pub slope_texturing: bool,
    pub wind_animation: bool,
    pub water_animation: bool,
    pub tessellated: bool,

    pub textures: MaterialTextures,
}
impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            visible: true,
            color: glam::Vec4::ONE,
            tiling: glam::Vec2::ONE,
            offset: glam::Vec2::ZERO,
            roughness: 1.0,
            metalness: 0.0,
            normal: 0.0,
            height: 0.0,
            anisotropic: 0.0,
            anisotropic_rotation: 0.0,
            clearcoat: 0.0,
            clearcoat_roughness: 0.0,
            sheen: 0.0,
            sheen_tint: 0.0,
            subsurface_scattering: 0.0,
            ior: 1.5,
            world_space_height: 1.0,
            slope_texturing: false,
            wind_animation: false,
            water_animation: false,
            tessellated: false,
            textures: Default::default(),
        }
    }
}
impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// alpha 小于 1 的材质走透明路径
    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.color.w < 1.0
    }

    #[inline]
    pub fn set_texture(&mut self, ty: MaterialTextureType, slot: usize, texture: Option<TextureHandle>) {
        self.textures[ty.index()][slot] = texture;
    }

    #[inline]
    pub fn has_texture(&self, ty: MaterialTextureType) -> bool {
        self.textures[ty.index()].iter().any(Option::is_some)
    }

    pub fn flags(&self) -> MaterialRecordFlags {
        let mut flags = MaterialTextureType::ALL
            .into_iter()
            .filter(|ty| self.has_texture(*ty))
            .fold(MaterialRecordFlags::empty(), |acc, ty| acc | MaterialRecordFlags::for_texture_type(ty));
        flags.set(MaterialRecordFlags::SLOPE_TEXTURING, self.slope_texturing);
        flags.set(MaterialRecordFlags::WIND_ANIMATION, self.wind_animation);
        flags.set(MaterialRecordFlags::WATER_ANIMATION, self.water_animation);
        flags.set(MaterialRecordFlags::TESSELLATED, self.tessellated);
        flags
    }

    pub fn to_record(&self) -> MaterialRecord {
        MaterialRecord {
            color: self.color.to_array(),
            tiling: self.tiling.to_array(),
            offset: self.offset.to_array(),
            roughness: self.roughness,
            metalness: self.metalness,
            normal: self.normal,
            height: self.height,
            anisotropic: self.anisotropic,
            anisotropic_rotation: self.anisotropic_rotation,
            clearcoat: self.clearcoat,
            clearcoat_roughness: self.clearcoat_roughness,
            sheen: self.sheen,
            sheen_tint: self.sheen_tint,
            subsurface_scattering: self.subsurface_scattering,
            ior: self.ior,
            world_space_height: self.world_space_height,
            flags: self.flags().bits(),
            _padding: [0; 2],
        }
    }
}
