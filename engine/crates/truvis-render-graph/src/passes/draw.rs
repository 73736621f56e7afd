use std::ops::Range;

use itertools::Itertools;
use truvis_render_interface::command_recorder::CommandRecorder;
use truvis_render_interface::handles::GeometryHandle;
use truvis_scene::bounds::Aabb;
use truvis_scene::components::renderable::Renderable;
use truvis_scene::guid_new_type::entity_id;

use crate::pass::PassContext;
use crate::pass_constants::PassConstants;

/// 绘制 mesh 时如何处理遮挡
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcclusionMode {
    /// 只做视锥剔除
    Ignore,
    /// 跳过 GPU 认为被遮挡的实体
    Respect,
    /// 读取上一帧的查询结果更新可见性，并为本帧的 draw 发起新的查询
    Query,
}

/// 绘制一个 renderable
///
/// instancing 时只绘制 `is_visible` 通过的实例组，相邻的可见组合并为一次 draw。
/// 返回 draw call 数量。
pub fn draw_renderable(
    cmd: &mut dyn CommandRecorder,
    geometry: GeometryHandle,
    renderable: &Renderable,
    is_visible: impl Fn(&Aabb) -> bool,
) -> u32 {
    if !renderable.has_instancing() {
        cmd.draw_indexed(geometry, renderable.index_count, renderable.index_offset, 0, 1);
        return 1;
    }

    let mut draws = 0;
    renderable
        .instance_groups()
        .iter()
        .scan(0u32, |start, group| {
            let range = *start..group.end;
            *start = group.end;
            Some((range, is_visible(&group.aabb)))
        })
        .filter_map(|(range, visible)| visible.then_some(range))
        .coalesce(|a, b| if a.end == b.start { Ok(a.start..b.end) } else { Err((a, b)) })
        .for_each(|run| {
            cmd.draw_indexed(geometry, renderable.index_count, renderable.index_offset, run.start, run.end - run.start);
            draws += 1;
        });
    draws
}

/// 用相机视锥绘制排序后 Mesh bucket 的一段
pub fn draw_meshes(ctx: &mut PassContext, range: Range<usize>, occlusion: OcclusionMode) -> u32 {
    let _span = tracy_client::span!("draw_meshes");

    let frame = ctx.frame;
    let Some(camera) = frame.camera else {
        return 0;
    };
    let Some(meshes) = frame.meshes.get(range) else {
        return 0;
    };

    let mut draws = 0;
    for &entity in meshes {
        if ctx.visibility.is_frustum_culled(entity) {
            continue;
        }
        let id = entity_id(entity);
        match occlusion {
            OcclusionMode::Ignore => {}
            OcclusionMode::Respect => {
                if !ctx.visibility.is_visible(entity) {
                    continue;
                }
            }
            OcclusionMode::Query => {
                let gpu_occluded = ctx.cmd.occlusion_query_result(id).unwrap_or(false);
                ctx.visibility.reconcile_gpu_occlusion(entity, gpu_occluded);
            }
        }

        let Some((object, renderable, _)) = frame.scene.mesh_parts(entity) else {
            continue;
        };
        let Some(geometry) = renderable.geometry else {
            continue;
        };
        // 材质还没有上传到 bindless 表时不能读取它的索引
        let Some(material_index) = renderable.material.and_then(|m| frame.bindless.material_index(m)) else {
            continue;
        };

        let constants = PassConstants {
            material_index,
            ..Default::default()
        }
        .with_transform(object.transform.matrix(), object.matrix_previous);
        ctx.push_constants(&constants);

        if occlusion == OcclusionMode::Query {
            ctx.cmd.begin_occlusion_query(id);
        }
        draws += draw_renderable(ctx.cmd, geometry, renderable, |aabb| camera.is_in_view(aabb));
        if occlusion == OcclusionMode::Query {
            ctx.cmd.end_occlusion_query(id);
        }
    }
    draws
}

#[cfg(test)]
mod tests {
    use super::*;
    use truvis_render_interface::command_recorder::{CommandList, RecordedCommand};

    #[test]
    fn test_visible_instance_groups_are_merged() {
        let mut keys = slotmap::SlotMap::<GeometryHandle, ()>::with_key();
        let geometry = keys.insert(());
        let mut renderable = Renderable::new(Some(geometry), 36, Aabb::from_center_extents(glam::Vec3::ZERO, glam::Vec3::ONE));
        let instances = (0..5)
            .map(|i| glam::Mat4::from_translation(glam::vec3(i as f32 * 10.0, 0.0, 0.0)))
            .collect();
        renderable.set_instances(instances, 1);

        // 第 3 组不可见：[0, 2) 与 [3, 5) 两次 draw
        let mut cmd = CommandList::new();
        let draws = draw_renderable(&mut cmd, geometry, &renderable, |aabb| aabb.center().x != 20.0);
        assert_eq!(draws, 2);
        let ranges: Vec<(u32, u32)> = cmd
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::DrawIndexed {
                    instance_start,
                    instance_count,
                    ..
                } => Some((*instance_start, *instance_count)),
                _ => None,
            })
            .collect();
        assert_eq!(ranges, vec![(0, 2), (3, 2)]);

        // 最后一组可见时也要提交
        let mut cmd = CommandList::new();
        assert_eq!(draw_renderable(&mut cmd, geometry, &renderable, |aabb| aabb.center().x >= 40.0), 1);
        let mut cmd = CommandList::new();
        assert_eq!(draw_renderable(&mut cmd, geometry, &renderable, |_| false), 0);
        assert!(cmd.is_empty());
    }
}
