use std::time::{Duration, Instant};

/// 帧计时
///
/// 实时运行时用 [`Timer::tick`] 读取墙钟；headless 运行时用 [`Timer::advance`]
/// 推进固定步长，保证结果可复现。
#[derive(Debug)]
pub struct Timer {
    last_tick: Instant,

    delta_time: Duration,
    total_time: Duration,
}
impl Default for Timer {
    fn default() -> Self {
        Self {
            last_tick: Instant::now(),
            delta_time: Duration::ZERO,
            total_time: Duration::ZERO,
        }
    }
}
// update
impl Timer {
    /// 每帧开始的时候调用
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.advance(now.duration_since(self.last_tick));
        self.last_tick = now;
    }

    /// 以给定的帧间隔推进
    pub fn advance(&mut self, delta: Duration) {
        self.delta_time = delta;
        self.total_time += delta;
    }

    /// 距离上一次 tick 经过的时间，用于统计 CPU 帧耗时
    #[inline]
    pub fn elapsed_since_tick(&self) -> Duration {
        self.last_tick.elapsed()
    }
}
// getters
impl Timer {
    #[inline]
    pub fn delta_time(&self) -> Duration {
        self.delta_time
    }

    /// 上一帧的时间（毫秒）
    #[inline]
    pub fn delta_time_ms(&self) -> f32 {
        self.delta_time.as_secs_f32() * 1000.0
    }

    /// 上一帧的时间（秒）
    #[inline]
    pub fn delta_time_s(&self) -> f32 {
        self.delta_time.as_secs_f32()
    }

    /// 当前帧率，第一帧之前为 0
    #[inline]
    pub fn fps(&self) -> f32 {
        let s = self.delta_time.as_secs_f32();
        if s > 0.0 { 1.0 / s } else { 0.0 }
    }

    /// 总运行时间
    #[inline]
    pub fn total_time_s(&self) -> f32 {
        self.total_time.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates() {
        let mut timer = Timer::default();
        assert_eq!(timer.fps(), 0.0);
        timer.advance(Duration::from_millis(20));
        timer.advance(Duration::from_millis(30));
        assert_eq!(timer.delta_time_ms(), 30.0);
        assert!((timer.total_time_s() - 0.05).abs() < 1e-6);
        assert!((timer.fps() - 33.333).abs() < 0.01);
    }
}
