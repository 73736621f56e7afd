use truvis_render_interface::handles::{GeometryHandle, MaterialHandle};

use crate::bounds::Aabb;

/// 一组连续的实例，整体做视锥剔除
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceGroup {
    /// 在 `instances` 中的结束位置（不含）
    pub end: u32,
    /// 世界空间包围盒
    pub aabb: Aabb,
}

/// 可渲染组件
#[derive(Debug, Clone)]
pub struct Renderable {
    /// mesh 还在加载时为 `None`
    pub geometry: Option<GeometryHandle>,
    pub index_count: u32,
    pub index_offset: u32,
    pub local_aabb: Aabb,
    pub material: Option<MaterialHandle>,
    pub casts_shadows: bool,

    /// 世界空间的实例变换，为空表示不使用 instancing
    instances: Vec<glam::Mat4>,
    instance_groups: Vec<InstanceGroup>,
}
// new & init
impl Renderable {
    pub fn new(geometry: Option<GeometryHandle>, index_count: u32, local_aabb: Aabb) -> Self {
        Self {
            geometry,
            index_count,
            index_offset: 0,
            local_aabb,
            material: None,
            casts_shadows: true,
            instances: Vec::new(),
            instance_groups: Vec::new(),
        }
    }

    #[inline]
    pub fn with_material(mut self, material: MaterialHandle) -> Self {
        self.material = Some(material);
        self
    }
}
// getters
impl Renderable {
    #[inline]
    pub fn has_instancing(&self) -> bool {
        !self.instances.is_empty()
    }
    #[inline]
    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some() && self.index_count > 0
    }
    #[inline]
    pub fn instances(&self) -> &[glam::Mat4] {
        &self.instances
    }
    #[inline]
    pub fn instance_groups(&self) -> &[InstanceGroup] {
        &self.instance_groups
    }

    /// 世界空间包围盒；instancing 时是所有实例组的合并
    pub fn world_aabb(&self, world: glam::Mat4) -> Aabb {
        if self.has_instancing() {
            return self
                .instance_groups
                .iter()
                .fold(Aabb::UNDEFINED, |acc, group| acc.merge(&group.aabb));
        }
        self.local_aabb.transformed(world)
    }
}
// update
impl Renderable {
    /// 设置实例，每 `group_size` 个实例一组
    pub fn set_instances(&mut self, instances: Vec<glam::Mat4>, group_size: usize) {
        let group_size = group_size.max(1);
        self.instance_groups = instances
            .chunks(group_size)
            .enumerate()
            .map(|(i, chunk)| InstanceGroup {
                end: (i * group_size + chunk.len()) as u32,
                aabb: chunk
                    .iter()
                    .fold(Aabb::UNDEFINED, |acc, m| acc.merge(&self.local_aabb.transformed(*m))),
            })
            .collect();
        self.instances = instances;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_groups_cover_all_instances() {
        let mut renderable = Renderable::new(None, 36, Aabb::from_center_extents(glam::Vec3::ZERO, glam::Vec3::ONE));
        let instances: Vec<_> = (0..5)
            .map(|i| glam::Mat4::from_translation(glam::vec3(i as f32 * 10.0, 0.0, 0.0)))
            .collect();
        renderable.set_instances(instances, 2);

        assert!(renderable.has_instancing());
        let ends: Vec<u32> = renderable.instance_groups().iter().map(|g| g.end).collect();
        assert_eq!(ends, vec![2, 4, 5]);
        assert_eq!(renderable.instance_groups()[2].aabb.center(), glam::vec3(40.0, 0.0, 0.0));

        let world = renderable.world_aabb(glam::Mat4::IDENTITY);
        assert_eq!(world.min.x, -1.0);
        assert_eq!(world.max.x, 41.0);
        assert!(!renderable.has_geometry());
    }
}
