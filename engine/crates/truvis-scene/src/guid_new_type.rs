use slotmap::new_key_type;

pub use truvis_render_interface::handles::{GeometryHandle, LightHandle, MaterialHandle};

new_key_type! { pub struct EntityHandle; }

/// 作为遮挡查询 id 等跨边界的 u64 标识
#[inline]
pub fn entity_id(handle: EntityHandle) -> u64 {
    slotmap::Key::data(&handle).as_ffi()
}
