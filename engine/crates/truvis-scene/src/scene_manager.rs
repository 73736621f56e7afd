use indexmap::IndexMap;
use slotmap::{SecondaryMap, SlotMap};
use truvis_render_interface::render_data::{LightRenderData, MaterialRenderData};

use crate::bounds::Aabb;
use crate::components::AudioSource;
use crate::components::camera::Camera;
use crate::components::light::Light;
use crate::components::material::Material;
use crate::components::renderable::Renderable;
use crate::components::transform::{Entity, Transform};
use crate::guid_new_type::{EntityHandle, LightHandle, MaterialHandle};

/// 在 CPU 侧管理场景数据
///
/// 组件以 entity handle 为 key 存放在 secondary map 中，按能力查询；
/// 光源额外有自己的 handle，用作 bindless 光源表的 key，
/// 并通过带代际检查的 entity handle 指回所属实体。
#[derive(Default)]
pub struct SceneManager {
    entities: SlotMap<EntityHandle, Entity>,
    renderables: SecondaryMap<EntityHandle, Renderable>,
    cameras: SecondaryMap<EntityHandle, Camera>,
    audio_sources: SecondaryMap<EntityHandle, AudioSource>,
    entity_lights: SecondaryMap<EntityHandle, LightHandle>,

    lights: SlotMap<LightHandle, Light>,
    light_owners: SecondaryMap<LightHandle, EntityHandle>,
    materials: SlotMap<MaterialHandle, Material>,

    /// 结构或材质变化时递增，渲染器据此重新分类
    revision: u64,
}
// new & init
impl SceneManager {
    pub fn new() -> Self {
        Self::default()
    }
}
// getters
impl SceneManager {
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }
    #[inline]
    pub fn entity(&self, handle: EntityHandle) -> Option<&Entity> {
        self.entities.get(handle)
    }
    #[inline]
    pub fn entities(&self) -> impl Iterator<Item = (EntityHandle, &Entity)> {
        self.entities.iter()
    }
    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
    #[inline]
    pub fn renderable(&self, handle: EntityHandle) -> Option<&Renderable> {
        self.renderables.get(handle)
    }
    #[inline]
    pub fn camera(&self, handle: EntityHandle) -> Option<&Camera> {
        self.cameras.get(handle)
    }
    #[inline]
    pub fn audio_source(&self, handle: EntityHandle) -> Option<&AudioSource> {
        self.audio_sources.get(handle)
    }
    #[inline]
    pub fn entity_light(&self, handle: EntityHandle) -> Option<LightHandle> {
        self.entity_lights.get(handle).copied()
    }
    #[inline]
    pub fn light(&self, handle: LightHandle) -> Option<&Light> {
        self.lights.get(handle)
    }
    /// 光源所属的实体，实体已被删除时返回 `None`
    #[inline]
    pub fn light_entity(&self, handle: LightHandle) -> Option<EntityHandle> {
        self.light_owners
            .get(handle)
            .copied()
            .filter(|entity| self.entities.contains_key(*entity))
    }
    #[inline]
    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle)
    }

    /// 一个 mesh 实体绘制所需的全部数据，缺任何一项都返回 `None`
    pub fn mesh_parts(&self, handle: EntityHandle) -> Option<(&Entity, &Renderable, &Material)> {
        let entity = self.entities.get(handle)?;
        let renderable = self.renderables.get(handle)?;
        let material = self.materials.get(renderable.material?)?;
        Some((entity, renderable, material))
    }

    /// 所有可渲染物的世界包围盒
    pub fn world_bounding_box(&self) -> Aabb {
        self.renderables
            .iter()
            .filter_map(|(handle, renderable)| {
                let entity = self.entities.get(handle)?;
                Some(renderable.world_aabb(entity.transform.matrix()))
            })
            .fold(Aabb::UNDEFINED, |acc, aabb| acc.merge(&aabb))
    }

    /// 场景深度，用于方向光的正交投影范围
    pub fn world_depth(&self) -> f32 {
        let aabb = self.world_bounding_box();
        if !aabb.is_defined() {
            return 1.0;
        }
        (aabb.extents().abs().max_element() * 2.0).max(1.0)
    }
}
// update
impl SceneManager {
    pub fn add_entity(&mut self, name: impl Into<String>, transform: Transform) -> EntityHandle {
        self.revision += 1;
        self.entities.insert(Entity::new(name, transform))
    }

    pub fn remove_entity(&mut self, handle: EntityHandle) -> Option<Entity> {
        let entity = self.entities.remove(handle)?;
        self.renderables.remove(handle);
        self.cameras.remove(handle);
        self.audio_sources.remove(handle);
        if let Some(light) = self.entity_lights.remove(handle) {
            self.lights.remove(light);
            self.light_owners.remove(light);
        }
        self.revision += 1;
        Some(entity)
    }

    /// 只改变 transform 不影响分类，不递增 revision
    #[inline]
    pub fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.entities.get_mut(handle)
    }

    pub fn set_entity_active(&mut self, handle: EntityHandle, active: bool) {
        if let Some(entity) = self.entities.get_mut(handle)
            && entity.active != active
        {
            entity.active = active;
            self.revision += 1;
        }
    }

    pub fn add_renderable(&mut self, handle: EntityHandle, renderable: Renderable) {
        if self.entities.contains_key(handle) {
            self.renderables.insert(handle, renderable);
            self.revision += 1;
        }
    }

    /// 几何体加载完成、材质替换等都需要重新分类
    pub fn renderable_mut(&mut self, handle: EntityHandle) -> Option<&mut Renderable> {
        self.revision += 1;
        self.renderables.get_mut(handle)
    }

    pub fn add_camera(&mut self, handle: EntityHandle, camera: Camera) {
        if self.entities.contains_key(handle) {
            self.cameras.insert(handle, camera);
            self.revision += 1;
        }
    }

    pub fn add_audio_source(&mut self, handle: EntityHandle, audio_source: AudioSource) {
        if self.entities.contains_key(handle) {
            self.audio_sources.insert(handle, audio_source);
            self.revision += 1;
        }
    }

    pub fn add_light(&mut self, handle: EntityHandle, light: Light) -> Option<LightHandle> {
        if !self.entities.contains_key(handle) {
            return None;
        }
        if let Some(old) = self.entity_lights.remove(handle) {
            self.lights.remove(old);
            self.light_owners.remove(old);
        }
        let light_handle = self.lights.insert(light);
        self.light_owners.insert(light_handle, handle);
        self.entity_lights.insert(handle, light_handle);
        self.revision += 1;
        Some(light_handle)
    }

    #[inline]
    pub fn light_mut(&mut self, handle: LightHandle) -> Option<&mut Light> {
        self.lights.get_mut(handle)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        self.revision += 1;
        self.materials.insert(material)
    }

    /// 材质属性变化需要重建 bindless 材质表
    pub fn material_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.revision += 1;
        self.materials.get_mut(handle)
    }

    /// 重新计算所有光源的矩阵
    pub fn update_light_matrices(&mut self, camera_position: Option<glam::Vec3>) {
        let _span = tracy_client::span!("SceneManager::update_light_matrices");
        let world_depth = self.world_depth();
        for (light_handle, light) in self.lights.iter_mut() {
            let Some(entity) = self.light_owners.get(light_handle).and_then(|e| self.entities.get(*e)) else {
                continue;
            };
            light.update_matrices(&entity.transform, camera_position, world_depth);
        }
    }

    /// 帧末调用，记录本帧的世界矩阵
    pub fn update_previous_transforms(&mut self) {
        for (_, entity) in self.entities.iter_mut() {
            entity.matrix_previous = entity.transform.matrix();
        }
    }
}
// render data
impl SceneManager {
    /// 按首次出现的顺序收集 mesh bucket 中的材质，同一材质只出现一次
    pub fn prepare_material_data(&self, meshes: &[EntityHandle]) -> Vec<MaterialRenderData> {
        let _span = tracy_client::span!("SceneManager::prepare_material_data");

        let mut unique: IndexMap<MaterialHandle, &Material> = IndexMap::new();
        for handle in meshes {
            let Some(material_handle) = self.renderables.get(*handle).and_then(|r| r.material) else {
                continue;
            };
            if let Some(material) = self.materials.get(material_handle) {
                unique.entry(material_handle).or_insert(material);
            }
        }

        unique
            .into_iter()
            .map(|(handle, material)| MaterialRenderData {
                handle,
                record: material.to_record(),
                textures: material.textures,
            })
            .collect()
    }

    pub fn prepare_light_data(
        &self,
        lights: &[EntityHandle],
        exposure: f32,
        screen_space_shadows: bool,
        volumetric_fog: bool,
    ) -> Vec<LightRenderData> {
        let _span = tracy_client::span!("SceneManager::prepare_light_data");

        lights
            .iter()
            .filter_map(|entity_handle| {
                let light_handle = self.entity_lights.get(*entity_handle).copied()?;
                let light = self.lights.get(light_handle)?;
                let entity = self.entities.get(*entity_handle)?;
                Some(LightRenderData {
                    handle: light_handle,
                    record: light.to_record(&entity.transform, exposure, screen_space_shadows, volumetric_fog),
                })
            })
            .collect()
    }
}
impl Drop for SceneManager {
    fn drop(&mut self) {
        log::info!("Dropping SceneManager");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::light::LightType;

    #[test]
    fn test_removed_entity_invalidates_light_owner() {
        let mut scene = SceneManager::new();
        let sun = scene.add_entity("sun", Transform::default());
        let light = scene.add_light(sun, Light::new(LightType::Directional)).unwrap();
        assert_eq!(scene.light_entity(light), Some(sun));

        let revision = scene.revision();
        scene.remove_entity(sun);
        assert!(scene.revision() > revision);
        assert!(scene.light(light).is_none());
        assert!(scene.light_entity(light).is_none());
        // 旧 handle 不会访问到新实体
        let other = scene.add_entity("other", Transform::default());
        assert!(scene.entity(sun).is_none());
        assert!(scene.entity(other).is_some());
    }

    #[test]
    fn test_material_data_is_deduplicated_in_first_seen_order() {
        tracy_client::Client::start();
        let mut scene = SceneManager::new();
        let red = scene.add_material(Material::new("red"));
        let blue = scene.add_material(Material::new("blue"));

        let mut meshes = Vec::new();
        for material in [blue, red, blue] {
            let e = scene.add_entity("mesh", Transform::default());
            scene.add_renderable(e, Renderable::new(None, 3, Aabb::from_center_extents(glam::Vec3::ZERO, glam::Vec3::ONE)).with_material(material));
            meshes.push(e);
        }

        let data = scene.prepare_material_data(&meshes);
        let handles: Vec<_> = data.iter().map(|m| m.handle).collect();
        assert_eq!(handles, vec![blue, red]);
    }

    #[test]
    fn test_world_depth_from_bounding_box() {
        let mut scene = SceneManager::new();
        assert_eq!(scene.world_depth(), 1.0);
        let e = scene.add_entity("box", Transform::from_position(glam::vec3(0.0, 0.0, 0.0)));
        scene.add_renderable(e, Renderable::new(None, 3, Aabb::new(glam::vec3(-10.0, 0.0, 0.0), glam::vec3(10.0, 2.0, 4.0))));
        assert_eq!(scene.world_depth(), 20.0);
    }
}
