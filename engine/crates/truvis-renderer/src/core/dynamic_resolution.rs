/// 根据上一帧的 GPU 时间调整 ResolutionScale 的比例控制器
///
/// 低于目标时间就放大比例，高于就缩小，步长与偏差和帧间隔成正比。
/// 没有积分项，GPU 时间抖动时比例也会跟着抖动。
pub struct DynamicResolution;
impl DynamicResolution {
    /// 60 FPS
    pub const GPU_TIME_TARGET_MS: f32 = 16.67;
    pub const GAIN: f32 = 0.05;
    pub const SCALE_MIN: f32 = 0.5;
    pub const SCALE_MAX: f32 = 1.0;

    pub fn next_scale(scale: f32, gpu_time_ms: f32, delta_time_s: f32) -> f32 {
        let adjustment = Self::GAIN * delta_time_s;
        let scale = if gpu_time_ms < Self::GPU_TIME_TARGET_MS {
            scale + adjustment * (Self::GPU_TIME_TARGET_MS - gpu_time_ms)
        } else {
            scale - adjustment * (gpu_time_ms - Self::GPU_TIME_TARGET_MS)
        };
        scale.clamp(Self::SCALE_MIN, Self::SCALE_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(gpu_time_ms: f32, start: f32, frames: usize) -> Vec<f32> {
        let mut scale = start;
        (0..frames)
            .map(|_| {
                scale = DynamicResolution::next_scale(scale, gpu_time_ms, 0.1);
                scale
            })
            .collect()
    }

    #[test]
    fn test_over_budget_decreases_to_floor() {
        let scales = run(30.0, 1.0, 50);
        assert!(scales.windows(2).all(|w| w[1] <= w[0]));
        assert!(scales[0] < 1.0);
        assert_eq!(*scales.last().unwrap(), 0.5);
    }

    #[test]
    fn test_under_budget_increases_to_ceiling() {
        let scales = run(8.0, 0.5, 50);
        assert!(scales.windows(2).all(|w| w[1] >= w[0]));
        assert!(scales[0] > 0.5);
        assert_eq!(*scales.last().unwrap(), 1.0);
    }

    #[test]
    fn test_step_is_proportional() {
        let small = DynamicResolution::next_scale(0.75, 18.67, 1.0);
        let large = DynamicResolution::next_scale(0.75, 20.67, 1.0);
        assert!((0.75 - small - 0.1).abs() < 1e-4);
        assert!((0.75 - large - 0.2).abs() < 1e-4);
    }
}
