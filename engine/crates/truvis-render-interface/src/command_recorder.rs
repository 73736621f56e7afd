use std::collections::HashMap;

use ash::vk;

use crate::handles::{GeometryHandle, GpuBuffer, TextureHandle};
use crate::pipeline_state::{CullMode, PipelineStateDesc};

/// 录制到命令序列中的一条命令
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginMarker(String),
    EndMarker,
    BeginTimeblock(String),
    EndTimeblock,
    SetPipelineState(&'static str),
    SetCullMode(CullMode),
    SetTexture {
        slot: u32,
        texture: TextureHandle,
        mip: Option<u32>,
    },
    SetBuffer {
        slot: u32,
        buffer: GpuBuffer,
    },
    PushConstants(Vec<u8>),
    Draw {
        vertex_count: u32,
    },
    DrawIndexed {
        geometry: GeometryHandle,
        index_count: u32,
        index_offset: u32,
        instance_start: u32,
        instance_count: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    ClearTexture {
        texture: TextureHandle,
        color: [f32; 4],
    },
    Blit {
        src: TextureHandle,
        dst: TextureHandle,
    },
    Copy {
        src: TextureHandle,
        dst: TextureHandle,
    },
    ImageBarrier {
        texture: TextureHandle,
        mip_start: u32,
        mip_count: u32,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    },
    UpdateBuffer {
        buffer: GpuBuffer,
        offset: usize,
        bytes: Vec<u8>,
    },
    BeginOcclusionQuery(u64),
    EndOcclusionQuery(u64),
}

/// 命令录制接口
///
/// 对 orchestrator 来说命令序列只能追加，之后由队列提交统一消费。
pub trait CommandRecorder {
    fn begin_marker(&mut self, name: &str);
    fn end_marker(&mut self);
    fn begin_timeblock(&mut self, name: &str);
    fn end_timeblock(&mut self);

    fn set_pipeline_state(&mut self, pso: &PipelineStateDesc);
    fn set_cull_mode(&mut self, cull_mode: CullMode);
    fn set_texture(&mut self, slot: u32, texture: TextureHandle, mip: Option<u32>);
    fn set_buffer(&mut self, slot: u32, buffer: GpuBuffer);
    fn push_constants(&mut self, bytes: &[u8]);

    fn draw(&mut self, vertex_count: u32);
    fn draw_indexed(
        &mut self,
        geometry: GeometryHandle,
        index_count: u32,
        index_offset: u32,
        instance_start: u32,
        instance_count: u32,
    );
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    fn clear_texture(&mut self, texture: TextureHandle, color: [f32; 4]);
    fn blit(&mut self, src: TextureHandle, dst: TextureHandle);
    fn copy(&mut self, src: TextureHandle, dst: TextureHandle);
    fn insert_image_barrier(
        &mut self,
        texture: TextureHandle,
        mip_start: u32,
        mip_count: u32,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    );
    fn update_buffer(&mut self, buffer: GpuBuffer, offset: usize, bytes: &[u8]);

    fn begin_occlusion_query(&mut self, id: u64);
    fn end_occlusion_query(&mut self, id: u64);
    /// 上一次提交解析出的查询结果，`Some(true)` 表示被遮挡
    fn occlusion_query_result(&self, id: u64) -> Option<bool>;
}

/// 只追加的命令列表
#[derive(Default)]
pub struct CommandList {
    commands: Vec<RecordedCommand>,
    marker_depth: u32,
    occlusion_results: HashMap<u64, bool>,
}
// new & init
impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带着上一帧解析出的遮挡查询结果开始新的一帧
    pub fn with_occlusion_results(occlusion_results: HashMap<u64, bool>) -> Self {
        Self {
            occlusion_results,
            ..Self::default()
        }
    }
}
// getters
impl CommandList {
    #[inline]
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
    #[inline]
    pub fn marker_depth(&self) -> u32 {
        self.marker_depth
    }

    /// 所有 marker 的名字，按录制顺序
    pub fn marker_names(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::BeginMarker(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&RecordedCommand) -> bool) -> usize {
        self.commands.iter().filter(|cmd| predicate(cmd)).count()
    }

    pub fn into_commands(self) -> Vec<RecordedCommand> {
        self.commands
    }
}
impl CommandRecorder for CommandList {
    fn begin_marker(&mut self, name: &str) {
        self.marker_depth += 1;
        self.commands.push(RecordedCommand::BeginMarker(name.to_string()));
    }

    fn end_marker(&mut self) {
        debug_assert!(self.marker_depth > 0, "end_marker without begin_marker");
        self.marker_depth = self.marker_depth.saturating_sub(1);
        self.commands.push(RecordedCommand::EndMarker);
    }

    fn begin_timeblock(&mut self, name: &str) {
        self.commands.push(RecordedCommand::BeginTimeblock(name.to_string()));
    }

    fn end_timeblock(&mut self) {
        self.commands.push(RecordedCommand::EndTimeblock);
    }

    fn set_pipeline_state(&mut self, pso: &PipelineStateDesc) {
        self.commands.push(RecordedCommand::SetPipelineState(pso.name));
    }

    fn set_cull_mode(&mut self, cull_mode: CullMode) {
        self.commands.push(RecordedCommand::SetCullMode(cull_mode));
    }

    fn set_texture(&mut self, slot: u32, texture: TextureHandle, mip: Option<u32>) {
        self.commands.push(RecordedCommand::SetTexture { slot, texture, mip });
    }

    fn set_buffer(&mut self, slot: u32, buffer: GpuBuffer) {
        self.commands.push(RecordedCommand::SetBuffer { slot, buffer });
    }

    fn push_constants(&mut self, bytes: &[u8]) {
        self.commands.push(RecordedCommand::PushConstants(bytes.to_vec()));
    }

    fn draw(&mut self, vertex_count: u32) {
        self.commands.push(RecordedCommand::Draw { vertex_count });
    }

    fn draw_indexed(
        &mut self,
        geometry: GeometryHandle,
        index_count: u32,
        index_offset: u32,
        instance_start: u32,
        instance_count: u32,
    ) {
        self.commands.push(RecordedCommand::DrawIndexed {
            geometry,
            index_count,
            index_offset,
            instance_start,
            instance_count,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(RecordedCommand::Dispatch { x, y, z });
    }

    fn clear_texture(&mut self, texture: TextureHandle, color: [f32; 4]) {
        self.commands.push(RecordedCommand::ClearTexture { texture, color });
    }

    fn blit(&mut self, src: TextureHandle, dst: TextureHandle) {
        self.commands.push(RecordedCommand::Blit { src, dst });
    }

    fn copy(&mut self, src: TextureHandle, dst: TextureHandle) {
        self.commands.push(RecordedCommand::Copy { src, dst });
    }

    fn insert_image_barrier(
        &mut self,
        texture: TextureHandle,
        mip_start: u32,
        mip_count: u32,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) {
        self.commands.push(RecordedCommand::ImageBarrier {
            texture,
            mip_start,
            mip_count,
            old_layout,
            new_layout,
        });
    }

    fn update_buffer(&mut self, buffer: GpuBuffer, offset: usize, bytes: &[u8]) {
        self.commands.push(RecordedCommand::UpdateBuffer {
            buffer,
            offset,
            bytes: bytes.to_vec(),
        });
    }

    fn begin_occlusion_query(&mut self, id: u64) {
        self.commands.push(RecordedCommand::BeginOcclusionQuery(id));
    }

    fn end_occlusion_query(&mut self, id: u64) {
        self.commands.push(RecordedCommand::EndOcclusionQuery(id));
    }

    fn occlusion_query_result(&self, id: u64) -> Option<bool> {
        self.occlusion_results.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_are_appended_in_order() {
        let mut cmd = CommandList::new();
        cmd.begin_marker("shadows");
        cmd.dispatch(8, 8, 1);
        cmd.end_marker();
        cmd.begin_marker("gbuffer");
        cmd.end_marker();

        assert_eq!(cmd.len(), 5);
        assert_eq!(cmd.marker_names(), vec!["shadows", "gbuffer"]);
        assert_eq!(cmd.marker_depth(), 0);
        assert_eq!(cmd.commands()[1], RecordedCommand::Dispatch { x: 8, y: 8, z: 1 });
    }

    #[test]
    fn test_occlusion_results_come_from_previous_submission() {
        let results = HashMap::from([(7u64, true), (9u64, false)]);
        let cmd = CommandList::with_occlusion_results(results);
        assert_eq!(cmd.occlusion_query_result(7), Some(true));
        assert_eq!(cmd.occlusion_query_result(9), Some(false));
        assert_eq!(cmd.occlusion_query_result(1), None);
    }
}
