/// 轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: glam::Vec3,
    pub max: glam::Vec3,
}
impl Aabb {
    /// 空包围盒，与任何包围盒 merge 都得到对方
    pub const UNDEFINED: Self = Self {
        min: glam::Vec3::splat(f32::INFINITY),
        max: glam::Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub fn new(min: glam::Vec3, max: glam::Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_center_extents(center: glam::Vec3, extents: glam::Vec3) -> Self {
        Self::new(center - extents, center + extents)
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    #[inline]
    pub fn center(&self) -> glam::Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extents(&self) -> glam::Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn corners(&self) -> [glam::Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            glam::vec3(min.x, min.y, min.z),
            glam::vec3(max.x, min.y, min.z),
            glam::vec3(min.x, max.y, min.z),
            glam::vec3(max.x, max.y, min.z),
            glam::vec3(min.x, min.y, max.z),
            glam::vec3(max.x, min.y, max.z),
            glam::vec3(min.x, max.y, max.z),
            glam::vec3(max.x, max.y, max.z),
        ]
    }

    #[inline]
    pub fn contains_point(&self, point: glam::Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// 变换 8 个角点后重新求包围盒
    pub fn transformed(&self, transform: glam::Mat4) -> Aabb {
        if !self.is_defined() {
            return *self;
        }
        self.corners().iter().fold(Aabb::UNDEFINED, |acc, corner| {
            let p = transform.transform_point3(*corner);
            Aabb::new(acc.min.min(p), acc.max.max(p))
        })
    }
}
impl Default for Aabb {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

/// 屏幕空间矩形，单位是像素，y 向下
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}
impl Rect {
    #[inline]
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[inline]
    pub fn full(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// `other` 是否完全落在这个矩形内
    #[inline]
    pub fn contains(&self, other: &Rect) -> bool {
        other.left >= self.left && other.top >= self.top && other.right <= self.right && other.bottom <= self.bottom
    }
}

/// 视锥体，6 个平面的法线朝内
///
/// 从 view-projection 矩阵中提取（clip 空间 z 范围 [0, w]）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [glam::Vec4; 6],
}
impl Frustum {
    const LEFT: usize = 0;
    const RIGHT: usize = 1;
    const BOTTOM: usize = 2;
    const TOP: usize = 3;
    const NEAR: usize = 4;
    const FAR: usize = 5;

    pub fn from_view_projection(view_projection: glam::Mat4) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);

        let mut planes = [glam::Vec4::ZERO; 6];
        planes[Self::LEFT] = r3 + r0;
        planes[Self::RIGHT] = r3 - r0;
        planes[Self::BOTTOM] = r3 + r1;
        planes[Self::TOP] = r3 - r1;
        planes[Self::NEAR] = r2;
        planes[Self::FAR] = r3 - r2;

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }
        Self { planes }
    }

    /// 包围盒是否与视锥相交
    ///
    /// `ignore_depth` 跳过 near/far 平面，用于正交投影的方向光。
    pub fn is_visible(&self, aabb: &Aabb, ignore_depth: bool) -> bool {
        for (i, plane) in self.planes.iter().enumerate() {
            if ignore_depth && (i == Self::NEAR || i == Self::FAR) {
                continue;
            }
            let normal = plane.truncate();
            // 沿法线方向最远的角点
            let positive = glam::Vec3::select(normal.cmpge(glam::Vec3::ZERO), aabb.max, aabb.min);
            if normal.dot(positive) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}
impl Default for Frustum {
    fn default() -> Self {
        Self::from_view_projection(glam::Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_transform_and_contains() {
        let aabb = Aabb::from_center_extents(glam::Vec3::ZERO, glam::Vec3::ONE);
        let moved = aabb.transformed(glam::Mat4::from_translation(glam::vec3(10.0, 0.0, 0.0)));
        assert_eq!(moved.center(), glam::vec3(10.0, 0.0, 0.0));
        assert!(moved.contains_point(glam::vec3(10.5, 0.5, -0.5)));
        assert!(!moved.contains_point(glam::Vec3::ZERO));
        assert_eq!(Aabb::UNDEFINED.merge(&aabb), aabb);
    }

    #[test]
    fn test_rect_containment() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains(&Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!outer.contains(&Rect::new(90.0, 10.0, 120.0, 20.0)));
        assert_eq!(outer.area(), 10000.0);
    }

    #[test]
    fn test_frustum_culls_boxes_behind_camera() {
        let view = glam::Mat4::look_to_rh(glam::Vec3::ZERO, glam::Vec3::NEG_Z, glam::Vec3::Y);
        let projection = glam::Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        let frustum = Frustum::from_view_projection(projection * view);

        let front = Aabb::from_center_extents(glam::vec3(0.0, 0.0, -10.0), glam::Vec3::ONE);
        let behind = Aabb::from_center_extents(glam::vec3(0.0, 0.0, 10.0), glam::Vec3::ONE);
        let too_far = Aabb::from_center_extents(glam::vec3(0.0, 0.0, -500.0), glam::Vec3::ONE);
        assert!(frustum.is_visible(&front, false));
        assert!(!frustum.is_visible(&behind, false));
        assert!(!frustum.is_visible(&too_far, false));
        assert!(frustum.is_visible(&too_far, true));
    }
}
