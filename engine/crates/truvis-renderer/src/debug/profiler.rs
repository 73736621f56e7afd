/// 帧耗时统计
///
/// 保存最近一帧的 CPU/GPU 时间以及清空以来的平均值，
/// 开启 PerformanceMetrics 时每帧生成一行文字给 text pass。
#[derive(Debug, Default)]
pub struct Profiler {
    cpu_time_last_ms: f32,
    gpu_time_last_ms: f32,

    cpu_time_sum_ms: f64,
    gpu_time_sum_ms: f64,
    sample_count: u64,
}
// getters
impl Profiler {
    #[inline]
    pub fn cpu_time_last_ms(&self) -> f32 {
        self.cpu_time_last_ms
    }

    #[inline]
    pub fn gpu_time_last_ms(&self) -> f32 {
        self.gpu_time_last_ms
    }

    #[inline]
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn cpu_time_avg_ms(&self) -> f32 {
        if self.sample_count == 0 {
            return 0.0;
        }
        (self.cpu_time_sum_ms / self.sample_count as f64) as f32
    }

    pub fn gpu_time_avg_ms(&self) -> f32 {
        if self.sample_count == 0 {
            return 0.0;
        }
        (self.gpu_time_sum_ms / self.sample_count as f64) as f32
    }

    pub fn metrics_text(&self, fps: f32) -> String {
        format!(
            "FPS {:.1} | CPU {:.2} ms (avg {:.2}) | GPU {:.2} ms (avg {:.2})",
            fps,
            self.cpu_time_last_ms,
            self.cpu_time_avg_ms(),
            self.gpu_time_last_ms,
            self.gpu_time_avg_ms()
        )
    }
}
// update
impl Profiler {
    pub fn record_frame(&mut self, cpu_time_ms: f32, gpu_time_ms: f32) {
        self.cpu_time_last_ms = cpu_time_ms;
        self.gpu_time_last_ms = gpu_time_ms;
        self.cpu_time_sum_ms += cpu_time_ms as f64;
        self.gpu_time_sum_ms += gpu_time_ms as f64;
        self.sample_count += 1;
    }

    /// 清空平均值，最近一帧的时间保留
    pub fn clear_metrics(&mut self) {
        self.cpu_time_sum_ms = 0.0;
        self.gpu_time_sum_ms = 0.0;
        self.sample_count = 0;
    }
}
