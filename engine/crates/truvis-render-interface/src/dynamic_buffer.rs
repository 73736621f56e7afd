use crate::command_recorder::CommandRecorder;
use crate::handles::GpuBuffer;

/// 每帧写入新 offset 的动态 buffer
///
/// 在途的帧还可能在读旧 offset 上的数据，所以每次写入都向后推进 offset，
/// 直到 [`crate::frame_counter::ResourceLifetime`] 的同步点才 [`Self::reset_offset`]。
/// 容量按 `每帧大小 x lifetime` 计算，两个同步点之间不会回绕。
pub struct DynamicBuffer {
    buffer: GpuBuffer,
    /// 对齐之后的每帧大小
    stride: usize,
    capacity: usize,
    offset: usize,
}
// new & init
impl DynamicBuffer {
    /// 动态 offset 的对齐要求（minUniformBufferOffsetAlignment 的常见上限）
    pub const ALIGNMENT: usize = 256;

    pub fn new(buffer: GpuBuffer, bytes_per_frame: usize, lifetime: u32) -> Self {
        let stride = bytes_per_frame.max(1).next_multiple_of(Self::ALIGNMENT);
        Self {
            buffer,
            stride,
            capacity: stride * lifetime.max(1) as usize,
            offset: 0,
        }
    }
}
// getters
impl DynamicBuffer {
    #[inline]
    pub fn buffer(&self) -> GpuBuffer {
        self.buffer
    }
    /// 下一次写入的 offset
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
// update
impl DynamicBuffer {
    /// 分配 `size` 字节，返回起始 offset；放不下时返回 `None`
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        let aligned = size.max(1).next_multiple_of(Self::ALIGNMENT);
        if self.offset + aligned > self.capacity {
            log::warn!(
                "Dynamic buffer {:?} is full: {} + {} > {} bytes",
                self.buffer,
                self.offset,
                aligned,
                self.capacity
            );
            return None;
        }
        let offset = self.offset;
        self.offset += aligned;
        Some(offset)
    }

    /// 分配并录制上传
    pub fn write(&mut self, cmd: &mut dyn CommandRecorder, bytes: &[u8]) -> Option<usize> {
        let offset = self.allocate(bytes.len())?;
        cmd.update_buffer(self.buffer, offset, bytes);
        Some(offset)
    }

    /// 只能在同步点调用
    #[inline]
    pub fn reset_offset(&mut self) {
        self.offset = 0;
    }
}

/// 渲染器持有的所有动态 buffer
pub struct DynamicBuffers {
    pub frame_constants: DynamicBuffer,
    pub lines: DynamicBuffer,
}
// new & init
impl DynamicBuffers {
    pub fn new(frame_constants_size: usize, lines_size: usize, lifetime: u32) -> Self {
        Self {
            frame_constants: DynamicBuffer::new(GpuBuffer::FrameConstants, frame_constants_size, lifetime),
            lines: DynamicBuffer::new(GpuBuffer::Lines, lines_size, lifetime),
        }
    }
}
// update
impl DynamicBuffers {
    pub fn reset_offsets(&mut self) {
        self.frame_constants.reset_offset();
        self.lines.reset_offset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_recorder::{CommandList, RecordedCommand};

    #[test]
    fn test_offsets_advance_until_reset() {
        let mut buffer = DynamicBuffer::new(GpuBuffer::FrameConstants, 300, 3);
        assert_eq!(buffer.stride(), 512);
        assert_eq!(buffer.capacity(), 1536);

        let mut cmd = CommandList::new();
        let offsets: Vec<_> = (0..3).map(|_| buffer.write(&mut cmd, &[0u8; 300])).collect();
        assert_eq!(offsets, vec![Some(0), Some(512), Some(1024)]);
        assert!(matches!(
            &cmd.commands()[2],
            RecordedCommand::UpdateBuffer { buffer: GpuBuffer::FrameConstants, offset: 1024, .. }
        ));

        assert_eq!(buffer.write(&mut cmd, &[0u8; 300]), None);
        assert_eq!(cmd.len(), 3);

        buffer.reset_offset();
        assert_eq!(buffer.allocate(16), Some(0));
    }

    #[test]
    fn test_small_writes_share_one_frame_stride() {
        let mut buffers = DynamicBuffers::new(64, 1024, 2);
        assert_eq!(buffers.lines.allocate(100), Some(0));
        assert_eq!(buffers.lines.allocate(100), Some(256));
        assert_eq!(buffers.frame_constants.allocate(64), Some(0));

        buffers.reset_offsets();
        assert_eq!(buffers.lines.offset(), 0);
        assert_eq!(buffers.frame_constants.offset(), 0);
    }
}
