//! GPU 边界层
//!
//! 渲染器通过这里定义的接口与 GPU 交互：
//! - [`command_recorder::CommandRecorder`]：只追加的命令序列
//! - [`device::RenderDevice`]：设备能力、队列同步、提交
//! - [`texture::RenderTexture`]：带有准备状态机的纹理
//! - [`bindless_manager::BindlessManager`]：材质、光源的 Bindless 表
//! - [`dynamic_buffer::DynamicBuffer`]：每帧推进 offset、同步点重置的动态 buffer

pub mod bindless_manager;
pub mod command_recorder;
pub mod deletion_queue;
pub mod device;
pub mod dynamic_buffer;
pub mod frame_counter;
pub mod handles;
pub mod pipeline_settings;
pub mod pipeline_state;
pub mod render_data;
pub mod resource_state;
pub mod texture;
pub mod texture_loader;
