use crate::pipeline_settings::FrameLabel;

pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
    frame_limit: f32,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64, frame_limit: f32) -> Self {
        Self {
            frame_id: init_frame_id,
            frame_limit,
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    const FIF_COUNT: usize = 3;
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn frame_limit(&self) -> f32 {
        self.frame_limit
    }
    #[inline]
    pub const fn fif_count() -> usize {
        Self::FIF_COUNT
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::from_usize(self.frame_id as usize % Self::fif_count())
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

/// 动态 buffer 和延迟删除资源的生命周期计数
///
/// 每帧 `advance` 一次；计数达到 `lifetime` 时回绕到 0，
/// 这一帧就是同步点：GPU 上不可能再有引用旧 offset 的帧在执行。
pub struct ResourceLifetime {
    resource_index: u32,
    lifetime: u32,
}
// new & init
impl ResourceLifetime {
    pub const DEFAULT_LIFETIME: u32 = 10;

    pub fn new(lifetime: u32) -> Self {
        assert!(lifetime > 0, "resource lifetime must be at least one frame");
        Self {
            resource_index: 0,
            lifetime,
        }
    }
}
impl Default for ResourceLifetime {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIFETIME)
    }
}
// update
impl ResourceLifetime {
    /// 进入下一帧，返回这一帧是否为同步点
    pub fn advance(&mut self) -> bool {
        self.resource_index += 1;
        if self.resource_index >= self.lifetime {
            self.resource_index = 0;
            return true;
        }
        false
    }
}
// getters
impl ResourceLifetime {
    #[inline]
    pub fn resource_index(&self) -> u32 {
        self.resource_index
    }
    #[inline]
    pub fn lifetime(&self) -> u32 {
        self.lifetime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_label_cycles() {
        let mut counter = FrameCounter::new(0, 60.0);
        let labels: Vec<usize> = (0..6)
            .map(|_| {
                let label = *counter.frame_label();
                counter.next_frame();
                label
            })
            .collect();
        assert_eq!(labels, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(counter.frame_name(), "[F6A]");
    }

    #[test]
    fn test_sync_point_every_lifetime_frames() {
        let mut lifetime = ResourceLifetime::new(3);
        let sync: Vec<bool> = (0..7).map(|_| lifetime.advance()).collect();
        assert_eq!(sync, vec![false, false, true, false, false, true, false]);
        assert_eq!(lifetime.resource_index(), 1);
    }
}
