use truvis_scene::components::light::LightType;

use crate::pass::FrameResources;
use crate::passes::compute::ComputePass;
use crate::render_targets::RenderTarget;
use crate::shader_library::ShaderId;

/// 第一个 directional light 的照射方向
pub fn sun_direction(frame: &FrameResources) -> Option<glam::Vec3> {
    frame.lights.iter().find_map(|&entity| {
        let light = frame.scene.light(frame.scene.entity_light(entity)?)?;
        if light.light_type != LightType::Directional {
            return None;
        }
        Some(frame.scene.entity(entity)?.transform.forward())
    })
}

/// 按太阳方向绘制天空球的 mip 0
pub fn skysphere(sun_direction: glam::Vec3) -> ComputePass {
    ComputePass::new("skysphere", &[ShaderId::SkysphereC])
        .write(RenderTarget::Skysphere)
        .with_values([sun_direction.x, sun_direction.y, sun_direction.z, 0.0])
}

/// 只需要生成一次
pub fn brdf_specular_lut() -> ComputePass {
    ComputePass::new("brdf_specular_lut", &[ShaderId::BrdfSpecularLutC]).write(RenderTarget::BrdfSpecularLut)
}

/// 预过滤天空球的一级 mip，粗糙度随 mip 线性增长
pub fn environment_filter(mip: u32, mip_count: u32) -> ComputePass {
    let roughness = mip as f32 / (mip_count.max(2) - 1) as f32;
    ComputePass::new("environment_filter", &[ShaderId::EnvironmentFilterC])
        .read_mip(RenderTarget::Skysphere, 0)
        .write_mip(RenderTarget::Skysphere, mip)
        .with_values([roughness, mip as f32, 0.0, 0.0])
}

/// 天空球预过滤的调度
///
/// 太阳移动后要静止一段时间才开始过滤，之后每帧过滤一级 mip，直到整条 mip 链完成。
#[derive(Debug, Default)]
pub struct EnvironmentFilterSchedule {
    last_direction: Option<glam::Vec3>,
    moved_at: f32,
    next_mip: Option<u32>,
}
// new & init
impl EnvironmentFilterSchedule {
    /// 太阳静止多久之后开始过滤，单位秒
    pub const SETTLE_TIME: f32 = 2.0;
    const DIRECTION_EPSILON: f32 = 1e-4;

    pub fn new() -> Self {
        Self::default()
    }
}
// update
impl EnvironmentFilterSchedule {
    /// 记录本帧的太阳方向，返回本帧需要过滤的 mip
    pub fn update(&mut self, direction: glam::Vec3, time: f32, mip_count: u32) -> Option<u32> {
        let moved = self
            .last_direction
            .is_none_or(|last| last.distance_squared(direction) > Self::DIRECTION_EPSILON);
        if moved {
            self.last_direction = Some(direction);
            self.moved_at = time;
            self.next_mip = Some(1);
            return None;
        }

        if time - self.moved_at < Self::SETTLE_TIME {
            return None;
        }
        self.next_mip.filter(|mip| *mip < mip_count)
    }

    /// 当前 mip 已经过滤完成
    pub fn advance(&mut self) {
        if let Some(mip) = self.next_mip.as_mut() {
            *mip += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_waits_until_sun_settles() {
        let mut schedule = EnvironmentFilterSchedule::new();
        let sun = glam::Vec3::NEG_Y;

        assert_eq!(schedule.update(sun, 0.0, 4), None);
        assert_eq!(schedule.update(sun, 1.0, 4), None);

        assert_eq!(schedule.update(sun, 2.5, 4), Some(1));
        schedule.advance();
        assert_eq!(schedule.update(sun, 2.6, 4), Some(2));
        schedule.advance();
        assert_eq!(schedule.update(sun, 2.7, 4), Some(3));
        schedule.advance();
        assert_eq!(schedule.update(sun, 2.8, 4), None);

        // 太阳再次移动后重新计时，从 mip 1 开始
        let moved = glam::vec3(0.0, -1.0, 0.5).normalize();
        assert_eq!(schedule.update(moved, 3.0, 4), None);
        assert_eq!(schedule.update(moved, 4.0, 4), None);
        assert_eq!(schedule.update(moved, 5.0, 4), Some(1));
    }

    #[test]
    fn test_filter_roughness_spans_mip_chain() {
        assert_eq!(environment_filter(1, 5).values()[0], 0.25);
        assert_eq!(environment_filter(4, 5).values()[0], 1.0);
        // 只有一级 mip 时不能除零
        assert!(environment_filter(0, 1).values()[0].is_finite());
    }
}
