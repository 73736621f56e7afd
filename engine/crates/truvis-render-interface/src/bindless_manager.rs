use bytemuck::Zeroable;
use slotmap::SecondaryMap;

use crate::command_recorder::CommandRecorder;
use crate::handles::{GpuBuffer, LightHandle, MaterialHandle, TextureHandle};
use crate::render_data::{LightRecord, LightRenderData, MaterialRecord, MaterialRenderData, MaterialTextureType};

/// Bindless 材质表和光源表
///
/// # 材质表
/// - 每个材质占用 `类型数 x 槽位数` 个连续的纹理槽位，起始槽位就是材质的 index
/// - 材质属性存放在属性数组的同一个 index 上
/// - 着色器通过 `material_index + type * SLOTS + slot` 访问贴图
///
/// # 光源表
/// - 每个可见光源一个 index，记录每个 slice 的矩阵和光照参数
///
/// 两张表都只在 dirty 时整体重建，index 在两次重建之间保持不变。
/// 超出容量是编程错误，直接 panic。
pub struct BindlessManager {
    texture_capacity: usize,
    light_capacity: usize,

    materials_dirty: bool,
    lights_dirty: bool,

    material_indices: SecondaryMap<MaterialHandle, u32>,
    /// 与纹理数组等长
    material_records: Vec<MaterialRecord>,
    material_textures: Vec<Option<TextureHandle>>,
    material_slots_used: usize,

    light_indices: SecondaryMap<LightHandle, u32>,
    light_records: Vec<LightRecord>,
}

// new & init
impl BindlessManager {
    pub const DEFAULT_TEXTURE_CAPACITY: usize = 16384;
    pub const DEFAULT_LIGHT_CAPACITY: usize = 1024;

    pub fn new(texture_capacity: usize, light_capacity: usize) -> Self {
        assert!(
            texture_capacity >= MaterialTextureType::STRIDE,
            "bindless texture capacity must hold at least one material"
        );
        Self {
            texture_capacity,
            light_capacity,
            materials_dirty: true,
            lights_dirty: true,
            material_indices: SecondaryMap::new(),
            material_records: vec![MaterialRecord::zeroed(); texture_capacity],
            material_textures: vec![None; texture_capacity],
            material_slots_used: 0,
            light_indices: SecondaryMap::new(),
            light_records: Vec::with_capacity(light_capacity),
        }
    }
}
impl Default for BindlessManager {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TEXTURE_CAPACITY, Self::DEFAULT_LIGHT_CAPACITY)
    }
}

// destroy
impl Drop for BindlessManager {
    fn drop(&mut self) {
        log::info!("Dropping BindlessManager");
    }
}

// getters
impl BindlessManager {
    #[inline]
    pub fn material_index(&self, handle: MaterialHandle) -> Option<u32> {
        self.material_indices.get(handle).copied()
    }
    #[inline]
    pub fn light_index(&self, handle: LightHandle) -> Option<u32> {
        self.light_indices.get(handle).copied()
    }
    #[inline]
    pub fn material_count(&self) -> usize {
        self.material_indices.len()
    }
    #[inline]
    pub fn light_count(&self) -> usize {
        self.light_indices.len()
    }
    #[inline]
    pub fn materials_dirty(&self) -> bool {
        self.materials_dirty
    }
    #[inline]
    pub fn lights_dirty(&self) -> bool {
        self.lights_dirty
    }
    #[inline]
    pub fn material_record(&self, index: u32) -> Option<&MaterialRecord> {
        self.material_records.get(index as usize)
    }
    #[inline]
    pub fn light_record(&self, index: u32) -> Option<&LightRecord> {
        self.light_records.get(index as usize)
    }
    /// 当前使用中的 bindless 纹理槽位
    #[inline]
    pub fn material_textures(&self) -> &[Option<TextureHandle>] {
        &self.material_textures[..self.material_slots_used]
    }
}

// update
impl BindlessManager {
    #[inline]
    pub fn mark_materials_dirty(&mut self) {
        self.materials_dirty = true;
    }
    #[inline]
    pub fn mark_lights_dirty(&mut self) {
        self.lights_dirty = true;
    }

    /// # Phase: Before Render
    ///
    /// 重建材质表并上传。异步加载进行中时推迟重建（保留 dirty 标记）。
    /// 返回是否真的重建了。
    pub fn update_materials(
        &mut self,
        materials: &[MaterialRenderData],
        is_loading: bool,
        cmd: &mut dyn CommandRecorder,
    ) -> bool {
        if !self.materials_dirty || is_loading {
            return false;
        }
        let _span = tracy_client::span!("BindlessManager::update_materials");

        self.material_indices.clear();
        self.material_records[..self.material_slots_used].fill(MaterialRecord::zeroed());
        self.material_textures[..self.material_slots_used].fill(None);

        let mut next_index = 0;
        for material in materials {
            if self.material_indices.contains_key(material.handle) {
                continue;
            }
            if next_index + MaterialTextureType::STRIDE > self.texture_capacity {
                panic!(
                    "bindless material capacity exceeded: {} texture slots, {} materials",
                    self.texture_capacity,
                    self.material_indices.len() + 1
                );
            }

            self.material_indices.insert(material.handle, next_index as u32);
            self.material_records[next_index] = material.record;
            for ty in MaterialTextureType::ALL {
                for slot in 0..MaterialTextureType::SLOTS {
                    self.material_textures[next_index + ty.index() * MaterialTextureType::SLOTS + slot] =
                        material.textures[ty.index()][slot];
                }
            }
            next_index += MaterialTextureType::STRIDE;
        }
        self.material_slots_used = next_index;

        if next_index * 10 > self.texture_capacity * 9 {
            log::warn!("Bindless texture slots at {}/{}", next_index, self.texture_capacity);
        }

        cmd.update_buffer(GpuBuffer::Materials, 0, bytemuck::cast_slice(&self.material_records[..next_index]));
        self.materials_dirty = false;
        true
    }

    /// # Phase: Before Render
    ///
    /// 重建光源表并上传。与材质表一样，异步加载进行中时推迟（保留 dirty 标记）。
    /// 返回是否真的重建了。
    pub fn update_lights(
        &mut self,
        lights: &[LightRenderData],
        is_loading: bool,
        cmd: &mut dyn CommandRecorder,
    ) -> bool {
        if !self.lights_dirty || is_loading {
            return false;
        }
        let _span = tracy_client::span!("BindlessManager::update_lights");

        assert!(
            lights.len() <= self.light_capacity,
            "bindless light capacity exceeded: {} lights, capacity {}",
            lights.len(),
            self.light_capacity
        );

        self.light_indices.clear();
        self.light_records.clear();
        for light in lights {
            if self.light_indices.contains_key(light.handle) {
                continue;
            }
            self.light_indices.insert(light.handle, self.light_records.len() as u32);
            self.light_records.push(light.record);
        }

        cmd.update_buffer(GpuBuffer::Lights, 0, bytemuck::cast_slice(&self.light_records));
        self.lights_dirty = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_recorder::{CommandList, RecordedCommand};
    use slotmap::SlotMap;

    fn material(handle: MaterialHandle, roughness: f32) -> MaterialRenderData {
        MaterialRenderData {
            handle,
            record: MaterialRecord {
                roughness,
                ..MaterialRecord::zeroed()
            },
            textures: Default::default(),
        }
    }

    #[test]
    fn test_materials_are_deduplicated_and_indexed_by_slot_block() {
        tracy_client::Client::start();
        let mut keys: SlotMap<MaterialHandle, ()> = SlotMap::with_key();
        let (a, b) = (keys.insert(()), keys.insert(()));
        let mut textures: SlotMap<TextureHandle, ()> = SlotMap::with_key();
        let albedo = textures.insert(());

        let mut with_texture = material(b, 0.2);
        with_texture.textures[MaterialTextureType::Normal.index()][1] = Some(albedo);

        let mut bindless = BindlessManager::new(256, 8);
        let mut cmd = CommandList::new();
        assert!(bindless.update_materials(&[material(a, 0.5), with_texture.clone(), material(a, 0.5)], false, &mut cmd));

        assert_eq!(bindless.material_count(), 2);
        assert_eq!(bindless.material_index(a), Some(0));
        assert_eq!(bindless.material_index(b), Some(32));
        assert_eq!(bindless.material_record(32).unwrap().roughness, 0.2);
        assert_eq!(bindless.material_textures()[32 + 3 * 4 + 1], Some(albedo));
        assert!(matches!(
            &cmd.commands()[0],
            RecordedCommand::UpdateBuffer { buffer: GpuBuffer::Materials, bytes, .. } if bytes.len() == 64 * 96
        ));
    }

    #[test]
    fn test_indices_stable_while_clean_and_deferred_while_loading() {
        tracy_client::Client::start();
        let mut keys: SlotMap<MaterialHandle, ()> = SlotMap::with_key();
        let (a, b) = (keys.insert(()), keys.insert(()));
        let mut bindless = BindlessManager::new(256, 8);
        let mut cmd = CommandList::new();

        bindless.update_materials(&[material(a, 0.0), material(b, 0.0)], false, &mut cmd);
        // 不 dirty 时顺序变化也不会影响 index
        assert!(!bindless.update_materials(&[material(b, 0.0), material(a, 0.0)], false, &mut cmd));
        assert_eq!(bindless.material_index(a), Some(0));

        bindless.mark_materials_dirty();
        assert!(!bindless.update_materials(&[material(b, 0.0)], true, &mut cmd));
        assert!(bindless.materials_dirty());
        assert_eq!(bindless.material_index(a), Some(0));

        assert!(bindless.update_materials(&[material(b, 0.0)], false, &mut cmd));
        assert_eq!(bindless.material_index(a), None);
        assert_eq!(bindless.material_index(b), Some(0));
    }

    #[test]
    #[should_panic(expected = "bindless material capacity exceeded")]
    fn test_material_overflow_panics() {
        tracy_client::Client::start();
        let mut keys: SlotMap<MaterialHandle, ()> = SlotMap::with_key();
        let materials: Vec<_> = (0..3).map(|_| material(keys.insert(()), 0.0)).collect();
        let mut bindless = BindlessManager::new(64, 8);
        bindless.update_materials(&materials, false, &mut CommandList::new());
    }

    #[test]
    fn test_lights_rebuild_only_when_dirty() {
        tracy_client::Client::start();
        let mut keys: SlotMap<LightHandle, ()> = SlotMap::with_key();
        let light = LightRenderData {
            handle: keys.insert(()),
            record: LightRecord {
                intensity: 3.0,
                ..LightRecord::zeroed()
            },
        };
        let mut bindless = BindlessManager::new(64, 4);
        let mut cmd = CommandList::new();

        assert!(bindless.update_lights(std::slice::from_ref(&light), false, &mut cmd));
        assert!(!bindless.update_lights(std::slice::from_ref(&light), false, &mut cmd));
        assert_eq!(bindless.light_index(light.handle), Some(0));
        assert_eq!(bindless.light_record(0).unwrap().intensity, 3.0);
        assert_eq!(cmd.len(), 1);
    }

    #[test]
    fn test_lights_deferred_while_loading() {
        tracy_client::Client::start();
        let mut keys: SlotMap<LightHandle, ()> = SlotMap::with_key();
        let light = LightRenderData {
            handle: keys.insert(()),
            record: LightRecord::zeroed(),
        };
        let mut bindless = BindlessManager::new(64, 4);
        let mut cmd = CommandList::new();

        assert!(!bindless.update_lights(std::slice::from_ref(&light), true, &mut cmd));
        assert!(bindless.lights_dirty());
        assert_eq!(bindless.light_index(light.handle), None);
        assert!(cmd.is_empty());

        assert!(bindless.update_lights(std::slice::from_ref(&light), false, &mut cmd));
        assert!(!bindless.lights_dirty());
        assert_eq!(bindless.light_index(light.handle), Some(0));
    }
}
