use crate::guid_new_type::EntityHandle;
use crate::scene_manager::SceneManager;

/// 渲染器关心的实体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderableKind {
    Mesh,
    Light,
    Camera,
    AudioSource,
}
impl RenderableKind {
    pub const COUNT: usize = 4;
    pub const ALL: [RenderableKind; Self::COUNT] = [Self::Mesh, Self::Light, Self::Camera, Self::AudioSource];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// 每帧按类别分好的实体列表
///
/// 只有分类步骤会整体重写；Mesh bucket 的顺序每帧由可见性排序覆盖。
/// 渲染器以 `Arc<Mutex<RenderBuckets>>` 共享它。
#[derive(Debug, Default)]
pub struct RenderBuckets {
    buckets: [Vec<EntityHandle>; RenderableKind::COUNT],
    generation: u64,
}
// getters
impl RenderBuckets {
    #[inline]
    pub fn get(&self, kind: RenderableKind) -> &[EntityHandle] {
        &self.buckets[kind.index()]
    }

    /// 给可见性排序使用
    #[inline]
    pub fn get_mut(&mut self, kind: RenderableKind) -> &mut Vec<EntityHandle> {
        &mut self.buckets[kind.index()]
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 第一个相机即当前使用的相机
    #[inline]
    pub fn active_camera(&self) -> Option<EntityHandle> {
        self.get(RenderableKind::Camera).first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }
}
// update
impl RenderBuckets {
    /// 清空所有 bucket 后重新遍历场景分类
    ///
    /// mesh 只有在材质存在且可见、几何数据已经就绪时才进入 Mesh bucket，
    /// 加载中的 mesh 会在之后某次分类时出现。
    pub fn classify(&mut self, scene: &SceneManager) {
        let _span = tracy_client::span!("RenderBuckets::classify");

        for bucket in &mut self.buckets {
            bucket.clear();
        }

        for (handle, entity) in scene.entities() {
            if !entity.active {
                continue;
            }

            if let Some(renderable) = scene.renderable(handle) {
                let material_visible = renderable
                    .material
                    .and_then(|material| scene.material(material))
                    .is_some_and(|material| material.visible);
                if material_visible && renderable.has_geometry() {
                    self.buckets[RenderableKind::Mesh.index()].push(handle);
                }
            }
            if scene.entity_light(handle).is_some() {
                self.buckets[RenderableKind::Light.index()].push(handle);
            }
            if scene.camera(handle).is_some() {
                self.buckets[RenderableKind::Camera.index()].push(handle);
            }
            if scene.audio_source(handle).is_some() {
                self.buckets[RenderableKind::AudioSource.index()].push(handle);
            }
        }

        self.generation += 1;
        log::debug!(
            "classified entities: {} meshes, {} lights, {} cameras, {} audio sources",
            self.get(RenderableKind::Mesh).len(),
            self.get(RenderableKind::Light).len(),
            self.get(RenderableKind::Camera).len(),
            self.get(RenderableKind::AudioSource).len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Aabb;
    use crate::components::camera::Camera;
    use crate::components::light::{Light, LightType};
    use crate::components::material::Material;
    use crate::components::renderable::Renderable;
    use crate::components::transform::Transform;
    use truvis_render_interface::handles::GeometryHandle;

    #[test]
    fn test_classify_skips_loading_and_hidden_meshes() {
        tracy_client::Client::start();
        let mut geometry_keys = slotmap::SlotMap::<GeometryHandle, ()>::with_key();
        let geometry = geometry_keys.insert(());

        let mut scene = SceneManager::new();
        let material = scene.add_material(Material::new("default"));
        let mut hidden = Material::new("hidden");
        hidden.visible = false;
        let hidden = scene.add_material(hidden);
        let aabb = Aabb::from_center_extents(glam::Vec3::ZERO, glam::Vec3::ONE);

        let ready = scene.add_entity("ready", Transform::default());
        scene.add_renderable(ready, Renderable::new(Some(geometry), 36, aabb).with_material(material));
        let loading = scene.add_entity("loading", Transform::default());
        scene.add_renderable(loading, Renderable::new(None, 36, aabb).with_material(material));
        let invisible = scene.add_entity("invisible", Transform::default());
        scene.add_renderable(invisible, Renderable::new(Some(geometry), 36, aabb).with_material(hidden));
        let inactive = scene.add_entity("inactive", Transform::default());
        scene.add_renderable(inactive, Renderable::new(Some(geometry), 36, aabb).with_material(material));
        scene.set_entity_active(inactive, false);

        let camera = scene.add_entity("camera", Transform::default());
        scene.add_camera(camera, Camera::default());
        let sun = scene.add_entity("sun", Transform::default());
        scene.add_light(sun, Light::new(LightType::Directional));

        let mut buckets = RenderBuckets::default();
        buckets.classify(&scene);

        assert_eq!(buckets.get(RenderableKind::Mesh), &[ready]);
        assert_eq!(buckets.get(RenderableKind::Light), &[sun]);
        assert_eq!(buckets.active_camera(), Some(camera));
        assert!(buckets.get(RenderableKind::AudioSource).is_empty());
        assert_eq!(buckets.generation(), 1);

        // 重新分类会清空之前的内容
        scene.remove_entity(ready);
        buckets.classify(&scene);
        assert!(buckets.get(RenderableKind::Mesh).is_empty());
        assert_eq!(buckets.generation(), 2);
    }
}
