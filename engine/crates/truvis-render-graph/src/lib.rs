//! 每帧固定顺序执行的 pass 序列
//!
//! - [`render_targets`]：按名字索引的 render target，分辨率变化时重建
//! - [`shader_library`]：后台编译的 shader，未编译完成的 pass 直接跳过
//! - [`pass`]：pass trait、资源声明和执行器
//! - [`passes`]：所有具体的 pass
//! - [`orchestrator`]：`produce_frame`，决定 pass 的顺序

pub mod orchestrator;
pub mod pass;
pub mod pass_constants;
pub mod passes;
pub mod pipeline_states;
pub mod render_targets;
pub mod shader_library;
