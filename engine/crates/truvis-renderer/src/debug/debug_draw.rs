use truvis_render_graph::pass_constants::{LineVertex, TextEntry};
use truvis_scene::bounds::Aabb;

/// 与单位向量 `n` 正交的两个单位向量
fn orthonormal_pair(n: glam::Vec3) -> (glam::Vec3, glam::Vec3) {
    let helper = if n.x.abs() < 0.9 { glam::Vec3::X } else { glam::Vec3::Y };
    let u = n.cross(helper).normalize_or_zero();
    (u, n.cross(u))
}

/// 本帧累积的调试图元，lines pass 和 text pass 消费之后清空
#[derive(Default)]
pub struct DebugDraw {
    lines: Vec<LineVertex>,
    texts: Vec<TextEntry>,
}
// new & init
impl DebugDraw {
    pub const DEFAULT_LINE_COLOR: glam::Vec4 = glam::Vec4::new(0.41, 0.86, 1.0, 1.0);
    pub const DEFAULT_TEXT_COLOR: glam::Vec4 = glam::Vec4::ONE;

    pub fn new() -> Self {
        Self::default()
    }
}
// getters
impl DebugDraw {
    #[inline]
    pub fn lines(&self) -> &[LineVertex] {
        &self.lines
    }

    #[inline]
    pub fn texts(&self) -> &[TextEntry] {
        &self.texts
    }
}
// update
impl DebugDraw {
    pub fn clear(&mut self) {
        self.lines.clear();
        self.texts.clear();
    }

    pub fn draw_line(&mut self, from: glam::Vec3, to: glam::Vec3, color_from: glam::Vec4, color_to: glam::Vec4) {
        self.lines.push(LineVertex::new(from, color_from));
        self.lines.push(LineVertex::new(to, color_to));
    }

    pub fn draw_triangle(&mut self, v0: glam::Vec3, v1: glam::Vec3, v2: glam::Vec3, color: glam::Vec4) {
        self.draw_line(v0, v1, color, color);
        self.draw_line(v1, v2, color, color);
        self.draw_line(v2, v0, color, color);
    }

    /// 包围盒的 12 条棱
    pub fn draw_box(&mut self, aabb: &Aabb, color: glam::Vec4) {
        let (min, max) = (aabb.min, aabb.max);
        let corner = |x: bool, y: bool, z: bool| {
            glam::vec3(
                if x { max.x } else { min.x },
                if y { max.y } else { min.y },
                if z { max.z } else { min.z },
            )
        };
        for a in [false, true] {
            for b in [false, true] {
                self.draw_line(corner(false, a, b), corner(true, a, b), color, color);
                self.draw_line(corner(a, false, b), corner(a, true, b), color, color);
                self.draw_line(corner(a, b, false), corner(a, b, true), color, color);
            }
        }
    }

    /// 垂直于 `axis` 的圆
    pub fn draw_circle(&mut self, center: glam::Vec3, axis: glam::Vec3, radius: f32, segment_count: u32, color: glam::Vec4) {
        if segment_count < 3 {
            return;
        }
        let (u, v) = orthonormal_pair(axis.normalize_or_zero());
        let point = |i: u32| {
            let angle = i as f32 / segment_count as f32 * std::f32::consts::TAU;
            center + (u * angle.cos() + v * angle.sin()) * radius
        };
        for i in 0..segment_count {
            self.draw_line(point(i), point(i + 1), color, color);
        }
    }

    /// 三个正交的大圆
    pub fn draw_sphere(&mut self, center: glam::Vec3, radius: f32, segment_count: u32, color: glam::Vec4) {
        for axis in [glam::Vec3::X, glam::Vec3::Y, glam::Vec3::Z] {
            self.draw_circle(center, axis, radius, segment_count, color);
        }
    }

    /// 从 `start` 指向 `end` 的箭头，箭头尖是一个四棱锥
    pub fn draw_directional_arrow(&mut self, start: glam::Vec3, end: glam::Vec3, arrow_size: f32, color: glam::Vec4) {
        self.draw_line(start, end, color, color);

        let direction = (end - start).normalize_or_zero();
        if direction == glam::Vec3::ZERO {
            return;
        }
        let (u, v) = orthonormal_pair(direction);
        let base = end - direction * arrow_size;
        for side in [u, -u, v, -v] {
            self.draw_line(end, base + side * arrow_size * 0.5, color, color);
        }
    }

    /// `position` 为屏幕像素坐标
    pub fn draw_string(&mut self, text: impl Into<String>, position: glam::Vec2, color: glam::Vec4) {
        self.texts.push(TextEntry {
            text: text.into(),
            position,
            color,
        });
    }
}
