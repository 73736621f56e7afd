pub mod dynamic_resolution;
pub mod frame_constants;
pub mod options;
pub mod renderer_context;
pub mod shadow_maps;
