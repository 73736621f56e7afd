use bitflags::bitflags;
use truvis_render_interface::handles::TextureHandle;
use truvis_render_interface::render_data::{LightRecord, LightRecordFlags};

use crate::bounds::{Aabb, Frustum};
use crate::components::transform::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional,
    Point,
    Spot,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LightFlags: u32 {
        const SHADOWS = 1 << 0;
        const SHADOWS_TRANSPARENT = 1 << 1;
        const SHADOWS_SCREEN_SPACE = 1 << 2;
        const VOLUMETRIC = 1 << 3;
    }
}

/// 光源的 shadow map（2D array，每个 slice 一层）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowMaps {
    pub depth: Option<TextureHandle>,
    pub color: Option<TextureHandle>,
    pub resolution: u32,
}

/// 光源组件
///
/// slice 数量：spot 1，directional 2（级联），point 2（前后两个抛物面）。
#[derive(Debug, Clone)]
pub struct Light {
    pub light_type: LightType,
    pub flags: LightFlags,
    pub color: glam::Vec3,
    pub intensity_lumens: f32,
    pub range: f32,
    pub angle_rad: f32,
    pub shadow_maps: ShadowMaps,

    views: [glam::Mat4; 2],
    projections: [glam::Mat4; 2],
    frustums: [Frustum; 2],
}
// new & init
impl Light {
    const NEAR_PLANE: f32 = 0.01;
    const CASCADE_EXTENTS: [f32; 2] = [16.0, 128.0];

    pub fn new(light_type: LightType) -> Self {
        let range = match light_type {
            LightType::Directional => f32::MAX,
            LightType::Point => 15.0,
            LightType::Spot => 30.0,
        };
        Self {
            light_type,
            flags: LightFlags::SHADOWS | LightFlags::SHADOWS_SCREEN_SPACE | LightFlags::VOLUMETRIC,
            color: glam::Vec3::ONE,
            intensity_lumens: 2600.0,
            range,
            angle_rad: 30f32.to_radians(),
            shadow_maps: ShadowMaps {
                depth: None,
                color: None,
                resolution: 0,
            },
            views: [glam::Mat4::IDENTITY; 2],
            projections: [glam::Mat4::IDENTITY; 2],
            frustums: [Frustum::default(); 2],
        }
    }
}
// getters
impl Light {
    #[inline]
    pub fn slice_count(&self) -> u32 {
        match self.light_type {
            LightType::Spot => 1,
            LightType::Directional | LightType::Point => 2,
        }
    }
    #[inline]
    pub fn view(&self, slice: usize) -> glam::Mat4 {
        self.views[slice]
    }
    #[inline]
    pub fn projection(&self, slice: usize) -> glam::Mat4 {
        self.projections[slice]
    }
    #[inline]
    pub fn has_shadows(&self) -> bool {
        self.flags.contains(LightFlags::SHADOWS)
    }
    #[inline]
    pub fn has_transparent_shadows(&self) -> bool {
        self.flags.contains(LightFlags::SHADOWS_TRANSPARENT)
    }

    /// 光强为 0 的光源不渲染阴影
    #[inline]
    pub fn is_emitting(&self) -> bool {
        self.intensity_lumens > 0.0
    }

    /// 物理光强，单位瓦特
    pub fn intensity_watts(&self, exposure: f32) -> f32 {
        let mut watts = self.intensity_lumens / 683.0 * 150.0;
        if self.light_type == LightType::Directional {
            watts *= 0.015;
        }
        watts * exposure
    }
}
// update
impl Light {
    /// 重新计算每个 slice 的 view / projection / frustum
    ///
    /// 方向光以相机位置为目标，从 `world_depth * 1.5` 远处看过去。
    pub fn update_matrices(&mut self, transform: &Transform, camera_position: Option<glam::Vec3>, world_depth: f32) {
        let forward = transform.forward();
        let position = transform.position;

        match self.light_type {
            LightType::Directional => {
                let target = camera_position.unwrap_or(glam::Vec3::ZERO);
                let eye = target - forward * world_depth * 1.5;
                let view = glam::Mat4::look_at_rh(eye, target, safe_up(forward));
                let far_plane = (world_depth * 4.0).max(Self::NEAR_PLANE * 2.0);
                for slice in 0..2 {
                    let extent = Self::CASCADE_EXTENTS[slice];
                    self.views[slice] = view;
                    self.projections[slice] =
                        glam::Mat4::orthographic_rh(-extent, extent, -extent, extent, Self::NEAR_PLANE, far_plane);
                    self.frustums[slice] = Frustum::from_view_projection(self.projections[slice] * view);
                }
            }
            LightType::Spot => {
                self.views[0] = glam::Mat4::look_to_rh(position, forward, safe_up(forward));
                self.projections[0] =
                    glam::Mat4::perspective_rh(self.angle_rad * 2.0, 1.0, Self::NEAR_PLANE, self.range.max(Self::NEAR_PLANE * 2.0));
                self.frustums[0] = Frustum::from_view_projection(self.projections[0] * self.views[0]);
            }
            LightType::Point => {
                // 抛物面投影在着色器中完成，这里只需要前后两个 view
                self.views[0] = glam::Mat4::look_to_rh(position, forward, safe_up(forward));
                self.views[1] = glam::Mat4::look_to_rh(position, -forward, safe_up(forward));
                self.projections = [glam::Mat4::IDENTITY; 2];
            }
        }
    }

    /// 包围盒是否出现在某个 slice 中
    ///
    /// 点光源检查是否有角点位于该 slice 的半球内。
    pub fn is_in_view(&self, transform: &Transform, aabb: &Aabb, slice: usize) -> bool {
        match self.light_type {
            LightType::Directional => self.frustums[slice].is_visible(aabb, true),
            LightType::Spot => self.frustums[slice].is_visible(aabb, false),
            LightType::Point => {
                let sign = if slice == 0 { 1.0 } else { -1.0 };
                let axis = transform.forward() * sign;
                aabb.corners()
                    .iter()
                    .any(|corner| (*corner - transform.position).dot(axis) >= 0.0)
            }
        }
    }

    /// 生成 GPU 光源记录
    pub fn to_record(
        &self,
        transform: &Transform,
        exposure: f32,
        screen_space_shadows: bool,
        volumetric_fog: bool,
    ) -> LightRecord {
        let mut view_projection = [[0.0f32; 16]; 2];
        for (slice, matrix) in view_projection.iter_mut().enumerate() {
            let m = if self.light_type == LightType::Point {
                self.views[slice]
            } else {
                self.projections[slice] * self.views[slice]
            };
            *matrix = m.to_cols_array();
        }

        let mut flags = match self.light_type {
            LightType::Directional => LightRecordFlags::DIRECTIONAL,
            LightType::Point => LightRecordFlags::POINT,
            LightType::Spot => LightRecordFlags::SPOT,
        };
        flags.set(LightRecordFlags::SHADOWS, self.flags.contains(LightFlags::SHADOWS));
        flags.set(LightRecordFlags::SHADOWS_TRANSPARENT, self.flags.contains(LightFlags::SHADOWS_TRANSPARENT));
        flags.set(
            LightRecordFlags::SHADOWS_SCREEN_SPACE,
            self.flags.contains(LightFlags::SHADOWS_SCREEN_SPACE) && screen_space_shadows,
        );
        flags.set(LightRecordFlags::VOLUMETRIC, self.flags.contains(LightFlags::VOLUMETRIC) && volumetric_fog);

        LightRecord {
            view_projection,
            position: transform.position.to_array(),
            range: self.range,
            direction: transform.forward().to_array(),
            angle: self.angle_rad,
            color: self.color.to_array(),
            intensity: self.intensity_watts(exposure),
            flags: flags.bits(),
            slice_count: self.slice_count(),
            _padding: [0; 2],
        }
    }
}

#[inline]
fn safe_up(forward: glam::Vec3) -> glam::Vec3 {
    if forward.abs().abs_diff_eq(glam::Vec3::Y, 1e-4) {
        glam::Vec3::Z
    } else {
        glam::Vec3::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_conversion() {
        let mut light = Light::new(LightType::Point);
        light.intensity_lumens = 683.0;
        assert!((light.intensity_watts(1.0) - 150.0).abs() < 1e-3);
        assert!((light.intensity_watts(2.0) - 300.0).abs() < 1e-3);

        light.light_type = LightType::Directional;
        assert!((light.intensity_watts(1.0) - 2.25).abs() < 1e-3);

        assert!(light.is_emitting());
        light.intensity_lumens = 0.0;
        assert!(!light.is_emitting());
    }

    #[test]
    fn test_point_light_hemisphere_test() {
        let mut light = Light::new(LightType::Point);
        let transform = Transform::default();
        light.update_matrices(&transform, None, 100.0);

        // forward 是 -Z
        let front = Aabb::from_center_extents(glam::vec3(0.0, 0.0, -5.0), glam::Vec3::ONE);
        assert!(light.is_in_view(&transform, &front, 0));
        assert!(!light.is_in_view(&transform, &front, 1));
    }

    #[test]
    fn test_record_flags_respect_options() {
        let mut light = Light::new(LightType::Spot);
        let transform = Transform::default();
        light.update_matrices(&transform, None, 100.0);

        let record = light.to_record(&transform, 1.0, false, true);
        let flags = LightRecordFlags::from_bits_truncate(record.flags);
        assert!(flags.contains(LightRecordFlags::SPOT | LightRecordFlags::SHADOWS | LightRecordFlags::VOLUMETRIC));
        assert!(!flags.contains(LightRecordFlags::SHADOWS_SCREEN_SPACE));
        assert_eq!(record.slice_count, 1);
    }

    #[test]
    fn test_directional_cascades_follow_camera() {
        let mut light = Light::new(LightType::Directional);
        let transform = Transform::looking_at(glam::Vec3::ZERO, glam::vec3(0.3, -1.0, 0.2));
        light.update_matrices(&transform, Some(glam::vec3(100.0, 0.0, 0.0)), 50.0);

        let near_box = Aabb::from_center_extents(glam::vec3(100.0, 0.0, 0.0), glam::Vec3::ONE);
        let far_box = Aabb::from_center_extents(glam::vec3(160.0, 0.0, 0.0), glam::Vec3::ONE);
        assert!(light.is_in_view(&transform, &near_box, 0));
        assert!(light.is_in_view(&transform, &far_box, 1));
        assert!(!light.is_in_view(&transform, &far_box, 0));
    }
}
