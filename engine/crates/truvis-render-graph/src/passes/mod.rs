pub mod compute;
pub mod draw;
pub mod environment;
pub mod geometry;
pub mod lighting;
pub mod overlay;
pub mod post_process;
pub mod shadow;
pub mod transfer;
pub mod transparent;
pub mod upscale;
