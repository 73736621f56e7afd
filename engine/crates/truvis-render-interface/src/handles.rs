use slotmap::new_key_type;

new_key_type! { pub struct TextureHandle; }
new_key_type! { pub struct MaterialHandle; }
new_key_type! { pub struct LightHandle; }
new_key_type! { pub struct GeometryHandle; }

/// 命令流中引用的 GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuBuffer {
    Materials,
    Lights,
    FrameConstants,
    Lines,
}
