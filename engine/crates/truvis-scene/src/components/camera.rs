use crate::bounds::{Aabb, Frustum, Rect};
use crate::components::transform::Transform;

/// 透视相机组件
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub fov_y_rad: f32,
    pub near: f32,
    pub far: f32,
    pub exposure: f32,
}
impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_y_rad: 60f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            exposure: 1.0,
        }
    }
}
impl Camera {
    /// 生成本帧的相机快照
    pub fn view_of(&self, transform: &Transform, aspect: f32) -> CameraView {
        let forward = transform.forward();
        let up = if forward.abs().abs_diff_eq(glam::Vec3::Y, 1e-4) {
            glam::Vec3::Z
        } else {
            glam::Vec3::Y
        };
        let view = glam::Mat4::look_to_rh(transform.position, forward, up);
        let projection = glam::Mat4::perspective_rh(self.fov_y_rad, aspect.max(f32::EPSILON), self.near, self.far);
        let view_projection = projection * view;

        CameraView {
            position: transform.position,
            forward,
            view,
            projection,
            view_projection,
            frustum: Frustum::from_view_projection(view_projection),
            near: self.near,
            far: self.far,
            fov_y_rad: self.fov_y_rad,
            exposure: self.exposure,
        }
    }
}

/// 一帧内不变的相机数据
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub position: glam::Vec3,
    pub forward: glam::Vec3,
    pub view: glam::Mat4,
    pub projection: glam::Mat4,
    pub view_projection: glam::Mat4,
    pub frustum: Frustum,
    pub near: f32,
    pub far: f32,
    pub fov_y_rad: f32,
    pub exposure: f32,
}
impl CameraView {
    #[inline]
    pub fn is_in_view(&self, aabb: &Aabb) -> bool {
        self.frustum.is_visible(aabb, false)
    }

    /// 包围盒投影到屏幕后的矩形
    ///
    /// 任何角点位于相机平面之后时投影不可靠，直接返回整个视口。
    pub fn world_to_screen_rect(&self, aabb: &Aabb, viewport: glam::Vec2) -> Rect {
        let mut min = glam::Vec2::splat(f32::INFINITY);
        let mut max = glam::Vec2::splat(f32::NEG_INFINITY);

        for corner in aabb.corners() {
            let clip = self.view_projection * corner.extend(1.0);
            if clip.w <= 0.0 {
                return Rect::full(viewport.x, viewport.y);
            }
            let ndc = clip.truncate() / clip.w;
            let screen = glam::vec2((ndc.x * 0.5 + 0.5) * viewport.x, (0.5 - ndc.y * 0.5) * viewport.y);
            min = min.min(screen);
            max = max.max(screen);
        }

        Rect::new(min.x, min.y, max.x, max.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_at_origin() -> CameraView {
        Camera::default().view_of(&Transform::default(), 1.0)
    }

    #[test]
    fn test_screen_rect_of_centered_box() {
        let view = camera_at_origin();
        let aabb = Aabb::from_center_extents(glam::vec3(0.0, 0.0, -10.0), glam::Vec3::splat(0.5));
        let rect = view.world_to_screen_rect(&aabb, glam::vec2(1000.0, 1000.0));
        // 对称地落在屏幕中心附近
        assert!((rect.left + rect.right - 1000.0).abs() < 1e-2);
        assert!((rect.top + rect.bottom - 1000.0).abs() < 1e-2);
        assert!(rect.area() > 0.0 && rect.area() < 1000.0 * 1000.0);
    }

    #[test]
    fn test_box_crossing_camera_plane_covers_viewport() {
        let view = camera_at_origin();
        let aabb = Aabb::from_center_extents(glam::Vec3::ZERO, glam::Vec3::splat(2.0));
        assert_eq!(view.world_to_screen_rect(&aabb, glam::vec2(640.0, 480.0)), Rect::full(640.0, 480.0));
    }
}
