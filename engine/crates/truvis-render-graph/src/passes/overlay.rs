//! 叠加在最终输出上的编辑器图元：网格、调试线段、选中描边、光源图标和文字

use truvis_render_interface::handles::GpuBuffer;
use truvis_render_interface::resource_state::ImageState;
use truvis_scene::bounds::Aabb;

use crate::pass::{PassBuilder, PassContext, RenderPass};
use crate::pass_constants::PassConstants;
use crate::passes::draw::draw_renderable;
use crate::pipeline_states;
use crate::render_targets::RenderTarget;
use crate::shader_library::ShaderId;

fn overlay_targets(builder: &mut PassBuilder, depth_tested: bool) {
    builder.write(RenderTarget::FrameOutput, ImageState::COLOR_ATTACHMENT_READ_WRITE);
    if depth_tested {
        builder.read(RenderTarget::OutputDepth, ImageState::DEPTH_ATTACHMENT_READ);
    }
}

/// 跟随相机的地面网格
pub struct GridPass;
impl GridPass {
    /// 网格跟随相机移动的步长，避免网格线滑动
    const SNAP: f32 = 10.0;
    const EXTENT: f32 = 1000.0;
}
impl RenderPass for GridPass {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::GridV, ShaderId::GridP]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        overlay_targets(builder, true);
    }

    fn execute(&self, ctx: &mut PassContext) {
        let Some(camera) = ctx.frame.camera else {
            return;
        };
        let snapped = (camera.position / Self::SNAP).floor() * Self::SNAP;
        let transform = glam::Mat4::from_scale_rotation_translation(
            glam::Vec3::splat(Self::EXTENT),
            glam::Quat::IDENTITY,
            glam::vec3(snapped.x, 0.0, snapped.z),
        );

        ctx.cmd.set_pipeline_state(&pipeline_states::overlay("grid", true));
        ctx.push_constants(&PassConstants::default().with_transform(transform, transform));
        ctx.cmd.draw(6);
    }
}

/// 本帧提交的调试线段
pub struct LinesPass;
impl RenderPass for LinesPass {
    fn name(&self) -> &'static str {
        "lines"
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::LinesV, ShaderId::LinesP]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        overlay_targets(builder, true);
    }

    fn execute(&self, ctx: &mut PassContext) {
        let lines = ctx.frame.lines;
        let Some(offset) = ctx.frame.lines_offset.filter(|_| !lines.is_empty()) else {
            return;
        };
        ctx.cmd.update_buffer(GpuBuffer::Lines, offset, bytemuck::cast_slice(lines));
        ctx.cmd.set_pipeline_state(&pipeline_states::overlay("lines", true));
        ctx.cmd.set_buffer(0, GpuBuffer::Lines);
        ctx.cmd.draw(lines.len() as u32);
    }
}

/// 选中实体的描边
pub struct OutlinePass;
impl OutlinePass {
    const COLOR: [f32; 4] = [1.0, 0.6, 0.1, 1.0];
}
impl RenderPass for OutlinePass {
    fn name(&self) -> &'static str {
        "selection_outline"
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::OutlineV, ShaderId::OutlineP]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        overlay_targets(builder, false);
    }

    fn execute(&self, ctx: &mut PassContext) {
        let frame = ctx.frame;
        let (Some(camera), Some(selected)) = (frame.camera, frame.selected) else {
            return;
        };
        let Some((object, renderable, _)) = frame.scene.mesh_parts(selected) else {
            return;
        };
        let Some(geometry) = renderable.geometry else {
            return;
        };

        ctx.cmd.set_pipeline_state(&pipeline_states::overlay("selection_outline", false));
        let constants = PassConstants::default()
            .with_transform(object.transform.matrix(), object.matrix_previous)
            .with_values(Self::COLOR);
        ctx.push_constants(&constants);
        draw_renderable(ctx.cmd, geometry, renderable, |aabb| camera.is_in_view(aabb));
    }
}

/// 光源位置的 billboard 图标
pub struct LightIconsPass;
impl LightIconsPass {
    const ICON_SIZE: f32 = 0.5;
}
impl RenderPass for LightIconsPass {
    fn name(&self) -> &'static str {
        "light_icons"
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::IconV, ShaderId::IconP]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        overlay_targets(builder, false);
    }

    fn execute(&self, ctx: &mut PassContext) {
        let frame = ctx.frame;
        let Some(camera) = frame.camera else {
            return;
        };
        ctx.cmd.set_pipeline_state(&pipeline_states::overlay("light_icons", false));

        for &entity in frame.lights {
            let Some(light) = frame.scene.entity_light(entity).and_then(|h| frame.scene.light(h)) else {
                continue;
            };
            let Some(object) = frame.scene.entity(entity) else {
                continue;
            };
            let position = object.transform.position;
            let bounds = Aabb::from_center_extents(position, glam::Vec3::splat(Self::ICON_SIZE));
            if !camera.is_in_view(&bounds) {
                continue;
            }

            let transform = glam::Mat4::from_translation(position);
            let constants = PassConstants::default()
                .with_transform(transform, transform)
                .with_values([light.color.x, light.color.y, light.color.z, light.light_type as u32 as f32]);
            ctx.push_constants(&constants);
            ctx.cmd.draw(6);
        }
    }
}

/// RGBA8，R 在最低位
fn pack_rgba8(color: glam::Vec4) -> u32 {
    let c = (color.clamp(glam::Vec4::ZERO, glam::Vec4::ONE) * 255.0).round();
    u32::from_le_bytes([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
}

/// 屏幕空间文字，每个可见字符一个 quad
pub struct TextPass;
impl RenderPass for TextPass {
    fn name(&self) -> &'static str {
        "text"
    }

    fn shaders(&self) -> &'static [ShaderId] {
        &[ShaderId::FontV, ShaderId::FontP]
    }

    fn setup(&self, builder: &mut PassBuilder) {
        overlay_targets(builder, false);
    }

    fn execute(&self, ctx: &mut PassContext) {
        let texts = ctx.frame.texts;
        if texts.is_empty() {
            return;
        }
        let extent = ctx.target_extent(RenderTarget::FrameOutput);
        ctx.cmd.set_pipeline_state(&pipeline_states::overlay("text", false));

        for entry in texts {
            let glyphs = entry.text.chars().filter(|c| !c.is_whitespace()).count() as u32;
            if glyphs == 0 {
                continue;
            }
            let constants = PassConstants {
                flags: pack_rgba8(entry.color),
                ..Default::default()
            }
            .with_resolution(extent.width, extent.height)
            .with_values([entry.position.x, entry.position.y, 0.0, 0.0]);
            ctx.push_constants(&constants);
            ctx.cmd.draw(glyphs * 6);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_text_color() {
        assert_eq!(pack_rgba8(glam::vec4(1.0, 0.0, 0.0, 1.0)), 0xff0000ff);
        assert_eq!(pack_rgba8(glam::vec4(2.0, -1.0, 0.0, 0.0)), 0x000000ff);
    }
}
