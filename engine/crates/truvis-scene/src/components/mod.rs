pub mod camera;
pub mod light;
pub mod material;
pub mod renderable;
pub mod transform;

/// 音频源，渲染器只负责分类，不读取内容
#[derive(Debug, Clone, Default)]
pub struct AudioSource {
    pub clip: String,
    pub volume: f32,
}
