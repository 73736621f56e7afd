use truvis_render_interface::resource_state::ImageState;
use truvis_scene::components::light::Light;
use truvis_scene::components::transform::Transform;
use truvis_scene::guid_new_type::EntityHandle;

use crate::pass::{FrameResources, PassBuilder, PassContext, RenderPass};
use crate::pass_constants::PassConstants;
use crate::passes::draw::draw_renderable;
use crate::pipeline_states;
use crate::shader_library::ShaderId;

/// 为每个投射阴影的光源渲染所有 slice 的 shadow map
///
/// 不使用相机的可见性结果：相机之外的物体仍然可能投下阴影。光强为 0 的光源跳过。
pub struct ShadowPass;
impl ShadowPass {
    fn shadow_lights<'a>(frame: &'a FrameResources<'a>) -> impl Iterator<Item = (EntityHandle, &'a Light, &'a Transform)> {
        frame.lights.iter().filter_map(move |&entity| {
            let light = frame.scene.light(frame.scene.entity_light(entity)?)?;
            let transform = &frame.scene.entity(entity)?.transform;
            (light.has_shadows() && light.is_emitting() && light.shadow_maps.depth.is_some())
                .then_some((entity, light, transform))
        })
    }
}
impl RenderPass for ShadowPass {
    fn name(&self) -> &'static str {
        "shadow_maps"
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::ShadowDepthV, ShaderId::ShadowDepthP, ShaderId::ShadowColorP]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        for (_, light, _) in Self::shadow_lights(builder.frame()) {
            if let Some(depth) = light.shadow_maps.depth {
                builder.texture(depth, ImageState::DEPTH_ATTACHMENT_WRITE, None);
            }
            if let Some(color) = light.shadow_maps.color
                && light.has_transparent_shadows()
            {
                builder.texture(color, ImageState::COLOR_ATTACHMENT_WRITE, None);
            }
        }
    }

    fn execute(&self, ctx: &mut PassContext) {
        let frame = ctx.frame;
        let opaque = ctx.visibility.mesh_range(false, frame.meshes.len());
        let transparent = ctx.visibility.mesh_range(true, frame.meshes.len());

        for (entity, light, light_transform) in Self::shadow_lights(frame) {
            let Some(light_handle) = frame.scene.entity_light(entity) else {
                continue;
            };
            let Some(light_index) = frame.bindless.light_index(light_handle) else {
                continue;
            };
            let Some(depth) = light.shadow_maps.depth else {
                continue;
            };
            let color = light.shadow_maps.color.filter(|_| light.has_transparent_shadows());

            ctx.cmd.clear_texture(depth, [1.0, 0.0, 0.0, 0.0]);
            if let Some(color) = color {
                ctx.cmd.clear_texture(color, [1.0; 4]);
            }

            for slice in 0..light.slice_count() {
                let passes = [(false, opaque.clone()), (true, transparent.clone())];
                for (is_transparent, range) in passes {
                    if is_transparent && color.is_none() {
                        continue;
                    }
                    ctx.cmd.set_pipeline_state(&pipeline_states::shadow(is_transparent));

                    for &mesh in &frame.meshes[range] {
                        let Some((object, renderable, _)) = frame.scene.mesh_parts(mesh) else {
                            continue;
                        };
                        let Some(geometry) = renderable.geometry else {
                            continue;
                        };
                        if !renderable.casts_shadows {
                            continue;
                        }
                        let world = object.transform.matrix();
                        let aabb = renderable.world_aabb(world);
                        if !light.is_in_view(light_transform, &aabb, slice as usize) {
                            continue;
                        }

                        let Some(material_index) = renderable.material.and_then(|m| frame.bindless.material_index(m))
                        else {
                            continue;
                        };
                        let constants = PassConstants {
                            light_index,
                            slice,
                            material_index,
                            ..Default::default()
                        }
                        .with_transform(world, object.matrix_previous);
                        ctx.push_constants(&constants);
                        draw_renderable(ctx.cmd, geometry, renderable, |aabb| {
                            light.is_in_view(light_transform, aabb, slice as usize)
                        });
                    }
                }
            }
        }
    }
}
