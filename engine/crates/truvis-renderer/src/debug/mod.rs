pub mod debug_draw;
pub mod profiler;
