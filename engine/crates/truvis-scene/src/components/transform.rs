/// 坐标系：RightHand, X-Right, Y-Up，没有旋转时朝向 -Z
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: glam::Vec3,
    pub rotation: glam::Quat,
    pub scale: glam::Vec3,
}
impl Default for Transform {
    fn default() -> Self {
        Self {
            position: glam::Vec3::ZERO,
            rotation: glam::Quat::IDENTITY,
            scale: glam::Vec3::ONE,
        }
    }
}
impl Transform {
    const FORWARD: glam::Vec3 = glam::Vec3::NEG_Z;

    #[inline]
    pub fn from_position(position: glam::Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// 从 `position` 看向 `target`
    pub fn looking_at(position: glam::Vec3, target: glam::Vec3) -> Self {
        let dir = (target - position).normalize_or_zero();
        let rotation = if dir == glam::Vec3::ZERO {
            glam::Quat::IDENTITY
        } else {
            glam::Quat::from_rotation_arc(Self::FORWARD, dir)
        };
        Self {
            position,
            rotation,
            scale: glam::Vec3::ONE,
        }
    }

    #[inline]
    pub fn matrix(&self) -> glam::Mat4 {
        glam::Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    #[inline]
    pub fn forward(&self) -> glam::Vec3 {
        self.rotation * Self::FORWARD
    }

    #[inline]
    pub fn up(&self) -> glam::Vec3 {
        self.rotation * glam::Vec3::Y
    }
}

/// 场景中的实体
///
/// 组件不放在实体上，而是放在 `SceneManager` 的 secondary map 中按 handle 查询。
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub active: bool,
    pub transform: Transform,
    /// 上一帧的世界矩阵，用于运动向量
    pub matrix_previous: glam::Mat4,
}
impl Entity {
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            active: true,
            matrix_previous: transform.matrix(),
            transform,
        }
    }

    /// 本帧相对上一帧是否移动过
    #[inline]
    pub fn has_moved(&self) -> bool {
        self.matrix_previous != self.transform.matrix()
    }
}
