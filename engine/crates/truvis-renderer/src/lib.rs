//! 渲染器的帧循环
//!
//! - [`core::renderer_context`]：`RendererContext`，每帧 tick 的入口
//! - [`core::options`]：渲染选项及其级联规则
//! - [`core::frame_constants`]：每帧上传的常量块和 TAA jitter
//! - [`core::dynamic_resolution`]：根据 GPU 时间调整 resolution scale
//! - [`debug`]：调试线条、文字和帧耗时统计
//! - [`config`]：`config/renderer.toml`

pub mod config;
pub mod core;
pub mod debug;
pub mod platform;
