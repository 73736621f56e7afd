use std::cmp::Ordering;
use std::ops::Range;

use slotmap::SecondaryMap;

use crate::bounds::{Aabb, Rect};
use crate::components::camera::CameraView;
use crate::guid_new_type::EntityHandle;
use crate::scene_manager::SceneManager;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VisibilityFlags: u32 {
        /// 视锥剔除
        const OCCLUDED_CPU = 1 << 0;
        /// 上一帧的遮挡查询结果
        const OCCLUDED_GPU = 1 << 1;
        const OCCLUDER = 1 << 2;
    }
}

/// 每个 mesh 实体一帧的可见性数据
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityRecord {
    pub distance_squared: f32,
    pub aabb: Aabb,
    /// 只有在挑选遮挡物时才会计算
    pub rect: Rect,
    pub transparent: bool,
    pub instanced: bool,
    pub flags: VisibilityFlags,
}
impl VisibilityRecord {
    #[inline]
    pub fn is_visible(&self) -> bool {
        !self.flags.intersects(VisibilityFlags::OCCLUDED_CPU | VisibilityFlags::OCCLUDED_GPU)
    }
}

/// 视锥剔除、排序以及 CPU 辅助的遮挡剔除
///
/// 排序后的 Mesh bucket 分为两段：不透明 `[0, transparent_start)` 与透明
/// `[transparent_start, len)`；透明段内 instancing 的实体在前。
/// 后续所有 pass 都通过 [`VisibilityEngine::mesh_range`] 切片，不再重新过滤。
#[derive(Default)]
pub struct VisibilityEngine {
    records: SecondaryMap<EntityHandle, VisibilityRecord>,
    /// 按选中顺序
    occluders: Vec<EntityHandle>,
    transparent_start: Option<usize>,
    non_instanced_transparent_start: Option<usize>,
}
// new & init
impl VisibilityEngine {
    /// 屏幕矩形面积超过该值（像素²）才能成为遮挡物
    pub const OCCLUDER_MIN_AREA: f32 = 65536.0;
    pub const MAX_OCCLUDERS: usize = 32;
    /// GPU 报告被遮挡时，最多用这么多个遮挡物复核
    pub const MAX_OCCLUDER_CHECKS: usize = 4;

    pub fn new() -> Self {
        Self::default()
    }
}
// getters
impl VisibilityEngine {
    #[inline]
    pub fn record(&self, entity: EntityHandle) -> Option<&VisibilityRecord> {
        self.records.get(entity)
    }

    #[inline]
    pub fn is_visible(&self, entity: EntityHandle) -> bool {
        self.records.get(entity).is_some_and(VisibilityRecord::is_visible)
    }

    #[inline]
    pub fn is_frustum_culled(&self, entity: EntityHandle) -> bool {
        self.records
            .get(entity)
            .is_none_or(|r| r.flags.contains(VisibilityFlags::OCCLUDED_CPU))
    }

    #[inline]
    pub fn occluders(&self) -> &[EntityHandle] {
        &self.occluders
    }

    #[inline]
    pub fn transparent_start(&self) -> Option<usize> {
        self.transparent_start
    }

    #[inline]
    pub fn non_instanced_transparent_start(&self) -> Option<usize> {
        self.non_instanced_transparent_start
    }

    /// 排序后 Mesh bucket 中不透明或透明部分的范围
    pub fn mesh_range(&self, transparent: bool, len: usize) -> Range<usize> {
        let split = self.transparent_start.unwrap_or(len).min(len);
        if transparent { split..len } else { 0..split }
    }
}
// update
impl VisibilityEngine {
    pub fn clear(&mut self) {
        self.records.clear();
        self.occluders.clear();
        self.transparent_start = None;
        self.non_instanced_transparent_start = None;
    }

    /// 视锥剔除并排序 Mesh bucket
    ///
    /// 缺少 renderable 或材质的实体会被移出 bucket（资源可能还在加载）。
    /// 排序键依次为：是否透明、是否不使用 instancing、是否被剔除、到相机的距离（由近到远）。
    /// 排序是稳定的。
    pub fn frustum_cull_and_sort(&mut self, meshes: &mut Vec<EntityHandle>, scene: &SceneManager, camera: &CameraView) {
        let _span = tracy_client::span!("VisibilityEngine::frustum_cull_and_sort");

        self.clear();

        meshes.retain(|&handle| {
            let Some((entity, renderable, material)) = scene.mesh_parts(handle) else {
                return false;
            };
            let aabb = renderable.world_aabb(entity.transform.matrix());
            let mut flags = VisibilityFlags::empty();
            if !camera.is_in_view(&aabb) {
                flags |= VisibilityFlags::OCCLUDED_CPU;
            }
            self.records.insert(
                handle,
                VisibilityRecord {
                    distance_squared: camera.position.distance_squared(aabb.center()),
                    aabb,
                    rect: Rect::default(),
                    transparent: material.is_transparent(),
                    instanced: renderable.has_instancing(),
                    flags,
                },
            );
            true
        });

        let records = &self.records;
        meshes.sort_by(|a, b| {
            let (ra, rb) = (&records[*a], &records[*b]);
            ra.transparent
                .cmp(&rb.transparent)
                .then_with(|| (!ra.instanced).cmp(&!rb.instanced))
                .then_with(|| {
                    let culled_a = ra.flags.contains(VisibilityFlags::OCCLUDED_CPU);
                    let culled_b = rb.flags.contains(VisibilityFlags::OCCLUDED_CPU);
                    culled_a.cmp(&culled_b)
                })
                .then_with(|| ra.distance_squared.partial_cmp(&rb.distance_squared).unwrap_or(Ordering::Equal))
        });

        self.transparent_start = meshes.iter().position(|e| records[*e].transparent);
        self.non_instanced_transparent_start = self.transparent_start.and_then(|start| {
            meshes[start..]
                .iter()
                .position(|e| !records[*e].instanced)
                .map(|offset| start + offset)
        });
    }

    /// 挑选遮挡物：屏幕面积足够大、包围盒不包含相机的实体，按 bucket 顺序先到先得
    pub fn determine_occluders(&mut self, meshes: &[EntityHandle], camera: &CameraView, viewport: glam::Vec2) {
        let _span = tracy_client::span!("VisibilityEngine::determine_occluders");

        self.occluders.clear();
        for &handle in meshes {
            let Some(record) = self.records.get_mut(handle) else {
                continue;
            };
            if record.flags.contains(VisibilityFlags::OCCLUDED_CPU) {
                continue;
            }

            record.rect = camera.world_to_screen_rect(&record.aabb, viewport);
            let is_occluder = record.rect.area() >= Self::OCCLUDER_MIN_AREA
                && !record.aabb.contains_point(camera.position)
                && self.occluders.len() < Self::MAX_OCCLUDERS;
            if is_occluder {
                record.flags |= VisibilityFlags::OCCLUDER;
                self.occluders.push(handle);
            }
        }
    }

    /// 用上一帧的遮挡查询结果更新实体
    ///
    /// 查询结果晚一帧，GPU 认为被遮挡时用遮挡物的屏幕矩形复核，
    /// 没有任何遮挡物完全包住它就当作误判清除。视锥剔除的实体不做处理。
    pub fn reconcile_gpu_occlusion(&mut self, entity: EntityHandle, gpu_occluded: bool) {
        let Some(record) = self.records.get(entity) else {
            return;
        };
        if record.flags.contains(VisibilityFlags::OCCLUDED_CPU) {
            return;
        }

        let occluded = gpu_occluded && {
            let rect = record.rect;
            self.occluders
                .iter()
                .filter(|occluder| **occluder != entity)
                .take(Self::MAX_OCCLUDER_CHECKS)
                .filter_map(|occluder| self.records.get(*occluder))
                .any(|occluder| occluder.rect.contains(&rect))
        };

        if let Some(record) = self.records.get_mut(entity) {
            record.flags.set(VisibilityFlags::OCCLUDED_GPU, occluded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::camera::Camera;
    use crate::components::material::Material;
    use crate::components::renderable::Renderable;
    use crate::components::transform::Transform;
    use truvis_render_interface::handles::GeometryHandle;

    struct TestScene {
        scene: SceneManager,
        meshes: Vec<EntityHandle>,
        geometry: GeometryHandle,
        opaque: crate::guid_new_type::MaterialHandle,
        glass: crate::guid_new_type::MaterialHandle,
    }
    impl TestScene {
        fn new() -> Self {
            let mut keys = slotmap::SlotMap::<GeometryHandle, ()>::with_key();
            let mut scene = SceneManager::new();
            let opaque = scene.add_material(Material::new("opaque"));
            let mut glass = Material::new("glass");
            glass.color.w = 0.5;
            let glass = scene.add_material(glass);
            Self {
                scene,
                meshes: Vec::new(),
                geometry: keys.insert(()),
                opaque,
                glass,
            }
        }

        fn add(&mut self, position: glam::Vec3, half: f32, transparent: bool, instanced: bool) -> EntityHandle {
            let material = if transparent { self.glass } else { self.opaque };
            let e = self.scene.add_entity("mesh", Transform::from_position(position));
            let mut renderable =
                Renderable::new(Some(self.geometry), 36, Aabb::from_center_extents(glam::Vec3::ZERO, glam::Vec3::splat(half)))
                    .with_material(material);
            if instanced {
                renderable.set_instances(vec![glam::Mat4::from_translation(position); 2], 1);
            }
            self.scene.add_renderable(e, renderable);
            self.meshes.push(e);
            e
        }
    }

    fn camera() -> CameraView {
        Camera::default().view_of(&Transform::default(), 1.0)
    }

    #[test]
    fn test_sort_partitions_transparent_and_orders_by_distance() {
        tracy_client::Client::start();
        let mut s = TestScene::new();
        let far_glass = s.add(glam::vec3(0.0, 0.0, -40.0), 1.0, true, false);
        let near_opaque = s.add(glam::vec3(0.0, 0.0, -5.0), 1.0, false, false);
        let behind = s.add(glam::vec3(0.0, 0.0, 30.0), 1.0, false, false);
        let instanced_glass = s.add(glam::vec3(0.0, 0.0, -60.0), 1.0, true, true);
        let far_opaque = s.add(glam::vec3(0.0, 0.0, -20.0), 1.0, false, false);
        let near_glass = s.add(glam::vec3(0.0, 0.0, -8.0), 1.0, true, false);

        let mut engine = VisibilityEngine::new();
        let mut meshes = s.meshes.clone();
        engine.frustum_cull_and_sort(&mut meshes, &s.scene, &camera());

        assert_eq!(meshes, vec![near_opaque, far_opaque, behind, instanced_glass, near_glass, far_glass]);
        assert_eq!(engine.transparent_start(), Some(3));
        assert_eq!(engine.non_instanced_transparent_start(), Some(4));
        assert!(engine.is_frustum_culled(behind));
        assert!(!engine.is_visible(behind));

        let split = engine.transparent_start().unwrap();
        for (i, e) in meshes.iter().enumerate() {
            assert_eq!(engine.record(*e).unwrap().transparent, i >= split);
        }
        assert_eq!(engine.mesh_range(false, meshes.len()), 0..3);
        assert_eq!(engine.mesh_range(true, meshes.len()), 3..6);
    }

    #[test]
    fn test_sort_without_transparents_and_missing_components() {
        tracy_client::Client::start();
        let mut s = TestScene::new();
        let a = s.add(glam::vec3(0.0, 0.0, -5.0), 1.0, false, false);
        let orphan = s.scene.add_entity("no renderable", Transform::default());

        let mut engine = VisibilityEngine::new();
        let mut meshes = vec![orphan, a];
        engine.frustum_cull_and_sort(&mut meshes, &s.scene, &camera());

        assert_eq!(meshes, vec![a]);
        assert_eq!(engine.transparent_start(), None);
        assert_eq!(engine.non_instanced_transparent_start(), None);
        assert_eq!(engine.mesh_range(true, meshes.len()), 1..1);
    }

    #[test]
    fn test_occluder_selection_and_gpu_reconciliation() {
        tracy_client::Client::start();
        let mut s = TestScene::new();
        let wall = s.add(glam::vec3(0.0, 0.0, -5.0), 1.0, false, false);
        let hidden = s.add(glam::vec3(0.0, 0.0, -30.0), 0.5, false, false);
        let beside = s.add(glam::vec3(12.0, 0.0, -30.0), 0.5, false, false);
        let around_camera = s.add(glam::Vec3::ZERO, 3.0, false, false);

        let view = camera();
        let viewport = glam::vec2(1920.0, 1080.0);
        let mut engine = VisibilityEngine::new();
        let mut meshes = s.meshes.clone();
        engine.frustum_cull_and_sort(&mut meshes, &s.scene, &view);
        engine.determine_occluders(&meshes, &view, viewport);

        assert_eq!(engine.occluders(), &[wall]);
        assert!(engine.record(wall).unwrap().flags.contains(VisibilityFlags::OCCLUDER));
        assert!(!engine.record(around_camera).unwrap().flags.contains(VisibilityFlags::OCCLUDER));

        engine.reconcile_gpu_occlusion(hidden, true);
        assert!(!engine.is_visible(hidden));

        // 没有遮挡物包住它，GPU 结果被当作误判
        engine.reconcile_gpu_occlusion(beside, true);
        assert!(engine.is_visible(beside));

        engine.reconcile_gpu_occlusion(hidden, false);
        assert!(engine.is_visible(hidden));
    }

    #[test]
    fn test_reconciliation_never_clears_frustum_culled() {
        tracy_client::Client::start();
        let mut s = TestScene::new();
        let behind = s.add(glam::vec3(0.0, 0.0, 30.0), 1.0, false, false);

        let view = camera();
        let mut engine = VisibilityEngine::new();
        let mut meshes = s.meshes.clone();
        engine.frustum_cull_and_sort(&mut meshes, &s.scene, &view);
        engine.determine_occluders(&meshes, &view, glam::vec2(1920.0, 1080.0));

        for gpu_occluded in [true, false] {
            engine.reconcile_gpu_occlusion(behind, gpu_occluded);
            let record = engine.record(behind).unwrap();
            assert!(record.flags.contains(VisibilityFlags::OCCLUDED_CPU));
            assert!(!record.is_visible());
        }
    }

    #[test]
    fn test_occluder_cap() {
        tracy_client::Client::start();
        let mut s = TestScene::new();
        for i in 0..40 {
            s.add(glam::vec3((i % 5) as f32 - 2.0, 0.0, -4.0 - i as f32 * 0.01), 2.0, false, false);
        }
        let view = camera();
        let mut engine = VisibilityEngine::new();
        let mut meshes = s.meshes.clone();
        engine.frustum_cull_and_sort(&mut meshes, &s.scene, &view);
        engine.determine_occluders(&meshes, &view, glam::vec2(1920.0, 1080.0));
        assert_eq!(engine.occluders().len(), VisibilityEngine::MAX_OCCLUDERS);
        assert_eq!(engine.occluders(), &meshes[..VisibilityEngine::MAX_OCCLUDERS]);
    }
}
