//! 一帧的 pass 顺序
//!
//! VRS、天空和环境光照的预计算总是执行；没有相机时之后只清空输出并绘制文字，否则依次执行：
//! 阴影 -> 深度预渲染 -> g-buffer -> 屏幕空间效果 -> 光照 -> 合成
//! -> 放大到 output 分辨率 -> 透明物体（output 分辨率的 g-buffer、光照、合成）
//! -> 后处理链 -> 编辑器叠加层。

use truvis_render_interface::command_recorder::CommandRecorder;
use truvis_scene::visibility::VisibilityEngine;

use crate::pass::{FrameResources, FrameStats, PassRunner};
use crate::passes::environment::{self, EnvironmentFilterSchedule};
use crate::passes::geometry::{DepthPrepass, GBufferPass};
use crate::passes::lighting::{self, LightPass, ScreenSpaceShadowPass};
use crate::passes::overlay::{GridPass, LightIconsPass, LinesPass, OutlinePass, TextPass};
use crate::passes::post_process::run_post_process;
use crate::passes::shadow::ShadowPass;
use crate::passes::transfer::{MipChainPass, TransferOp, TransferPass};
use crate::passes::transparent::run_transparent;
use crate::passes::upscale::UpscalePass;
use crate::render_targets::RenderTarget;

/// 跨帧保存的 pass 状态
#[derive(Debug, Default)]
pub struct FramePipeline {
    brdf_lut_ready: bool,
    environment: EnvironmentFilterSchedule,
}
// new & init
impl FramePipeline {
    /// 没有相机时输出的颜色
    pub const NO_CAMERA_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

    pub fn new() -> Self {
        Self::default()
    }
}
// getters
impl FramePipeline {
    #[inline]
    pub fn is_brdf_lut_ready(&self) -> bool {
        self.brdf_lut_ready
    }
}
// update
impl FramePipeline {
    /// 录制一帧的所有 pass
    ///
    /// `frame.meshes` 必须已经由 `visibility` 排序，`time` 是渲染器启动以来的秒数。
    pub fn produce_frame<'a>(
        &mut self,
        cmd: &'a mut dyn CommandRecorder,
        visibility: &'a mut VisibilityEngine,
        frame: &'a FrameResources<'a>,
        time: f32,
    ) -> FrameStats {
        let _span = tracy_client::span!("FramePipeline::produce_frame");

        let mut runner = PassRunner::new(cmd, visibility, frame);
        let settings = frame.settings;

        // 上一帧的输出决定本帧的 shading rate
        if settings.variable_rate_shading {
            runner.run(&lighting::variable_rate_shading());
        }
        // 环境贴图和 LUT 与相机无关
        self.environment_passes(&mut runner, time);

        if frame.camera.is_none() {
            runner.run(&TransferPass::new(
                "clear_output",
                TransferOp::Clear(RenderTarget::FrameOutput, Self::NO_CAMERA_CLEAR_COLOR),
            ));
            runner.run(&TextPass);
            return runner.finish();
        }

        runner.run(&ShadowPass);

        runner.run(&DepthPrepass::front());
        runner.run(&DepthPrepass::backface());
        runner.run(&GBufferPass::opaque());

        if settings.ssao {
            runner.run(&lighting::ssao());
        }
        if settings.ssr {
            runner.run(&lighting::ssr());
        }
        if settings.screen_space_shadows {
            runner.run(&ScreenSpaceShadowPass);
        }
        runner.run(&LightPass::opaque());
        if settings.global_illumination > 0.0 {
            runner.run(&lighting::global_illumination(settings.global_illumination));
        }
        runner.run(&lighting::light_composition(settings.fog, false));
        runner.run(&lighting::image_based_lighting(false));

        runner.run(&TransferPass::new(
            "copy_opaque",
            TransferOp::Copy(RenderTarget::FrameRender, RenderTarget::FrameRenderOpaque),
        ));
        runner.run(&MipChainPass::new(RenderTarget::FrameRenderOpaque));

        runner.run(&UpscalePass::new(settings.upsampling));
        run_transparent(&mut runner);

        let result = run_post_process(&mut runner);
        if result != RenderTarget::FrameOutput {
            runner.run(&TransferPass::new(
                "copy_to_output",
                TransferOp::Copy(result, RenderTarget::FrameOutput),
            ));
        }

        if settings.grid {
            runner.run(&GridPass);
        }
        if !frame.lines.is_empty() {
            runner.run(&LinesPass);
        }
        if settings.selection_outline && frame.selected.is_some() {
            runner.run(&OutlinePass);
        }
        if settings.lights {
            runner.run(&LightIconsPass);
        }
        runner.run(&TextPass);

        runner.finish()
    }

    fn environment_passes(&mut self, runner: &mut PassRunner, time: f32) {
        let frame = runner.frame();
        if let Some(sun) = environment::sun_direction(frame) {
            runner.run(&environment::skysphere(sun));
            runner.run(&MipChainPass::new(RenderTarget::Skysphere));

            let mip_count = frame
                .textures
                .get(frame.targets.get(RenderTarget::Skysphere))
                .map_or(1, |t| t.mip_count());
            if let Some(mip) = self.environment.update(sun, time, mip_count)
                && runner.run(&environment::environment_filter(mip, mip_count))
            {
                self.environment.advance();
            }
        }

        if !self.brdf_lut_ready {
            self.brdf_lut_ready = runner.run(&environment::brdf_specular_lut());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use truvis_render_interface::bindless_manager::BindlessManager;
    use truvis_render_interface::command_recorder::{CommandList, RecordedCommand};
    use truvis_render_interface::device::{HeadlessDevice, RenderDevice};
    use truvis_render_interface::handles::GeometryHandle;
    use truvis_render_interface::pipeline_settings::PipelineSettings;
    use truvis_render_interface::texture::TexturePool;
    use truvis_scene::bounds::Aabb;
    use truvis_scene::components::camera::{Camera, CameraView};
    use truvis_scene::components::light::{Light, LightType};
    use truvis_scene::components::material::Material;
    use truvis_scene::components::renderable::Renderable;
    use truvis_scene::components::transform::Transform;
    use truvis_scene::render_buckets::{RenderBuckets, RenderableKind};
    use truvis_scene::scene_manager::SceneManager;

    use crate::render_targets::{RenderTargetExtents, RenderTargets};
    use crate::shader_library::{ShaderId, ShaderLibrary};

    struct Fixture {
        scene: SceneManager,
        buckets: RenderBuckets,
        pool: TexturePool,
        targets: RenderTargets,
        shaders: ShaderLibrary,
        bindless: BindlessManager,
        settings: PipelineSettings,
        view: CameraView,
    }
    impl Fixture {
        fn new() -> Self {
            let mut keys = slotmap::SlotMap::<GeometryHandle, ()>::with_key();
            let geometry = keys.insert(());
            let mut scene = SceneManager::new();

            let camera = scene.add_entity("camera", Transform::default());
            scene.add_camera(camera, Camera::default());
            let sun = scene.add_entity(
                "sun",
                Transform::looking_at(glam::vec3(0.0, 10.0, 0.0), glam::vec3(0.0, 0.0, -1.0)),
            );
            scene.add_light(sun, Light::new(LightType::Directional));

            let opaque = scene.add_material(Material::new("opaque"));
            let mut glass = Material::new("glass");
            glass.color.w = 0.3;
            let glass = scene.add_material(glass);
            for (z, material) in [(-5.0, opaque), (-10.0, glass)] {
                let e = scene.add_entity("mesh", Transform::from_position(glam::vec3(0.0, 0.0, z)));
                let unit = Aabb::from_center_extents(glam::Vec3::ZERO, glam::Vec3::ONE);
                scene.add_renderable(e, Renderable::new(Some(geometry), 36, unit).with_material(material));
            }

            let mut buckets = RenderBuckets::default();
            buckets.classify(&scene);

            let mut bindless = BindlessManager::default();
            let mut upload = CommandList::new();
            let materials = scene.prepare_material_data(buckets.get(RenderableKind::Mesh));
            bindless.update_materials(&materials, false, &mut upload);
            let lights = scene.prepare_light_data(buckets.get(RenderableKind::Light), 1.0, false, false);
            bindless.update_lights(&lights, false, &mut upload);

            let extent = vk::Extent2D { width: 64, height: 32 };
            let mut pool = TexturePool::new();
            let targets = RenderTargets::new(
                &mut pool,
                RenderTargetExtents {
                    render: extent,
                    output: extent,
                    gi_scale: 0.5,
                },
            );

            let shaders = ShaderLibrary::new();
            for shader in ShaderId::ALL {
                shaders.set_compiled(shader, true);
            }

            let view = Camera::default().view_of(&Transform::default(), 2.0);
            Self {
                scene,
                buckets,
                pool,
                targets,
                shaders,
                bindless,
                settings: PipelineSettings::default(),
                view,
            }
        }

        fn sorted_meshes(&self, visibility: &mut VisibilityEngine) -> Vec<truvis_scene::guid_new_type::EntityHandle> {
            let mut meshes = self.buckets.get(RenderableKind::Mesh).to_vec();
            visibility.frustum_cull_and_sort(&mut meshes, &self.scene, &self.view);
            meshes
        }

        fn frame<'a>(
            &'a self,
            meshes: &'a [truvis_scene::guid_new_type::EntityHandle],
            camera: Option<&'a CameraView>,
        ) -> FrameResources<'a> {
            FrameResources {
                scene: &self.scene,
                meshes,
                lights: self.buckets.get(RenderableKind::Light),
                camera,
                targets: &self.targets,
                textures: &self.pool,
                shaders: &self.shaders,
                bindless: &self.bindless,
                settings: &self.settings,
                lines: &[],
                lines_offset: None,
                texts: &[],
                selected: None,
                reset_history: false,
                jitter: glam::Vec2::ZERO,
            }
        }
    }

    fn position(stats: &FrameStats, name: &str) -> usize {
        stats
            .executed
            .iter()
            .position(|n| *n == name)
            .unwrap_or_else(|| panic!("pass {name} did not run: {:?}", stats.executed))
    }

    #[test]
    fn test_frame_runs_passes_in_fixed_order() {
        tracy_client::Client::start();
        let fixture = Fixture::new();
        let mut visibility = VisibilityEngine::new();
        let meshes = fixture.sorted_meshes(&mut visibility);
        let frame = fixture.frame(&meshes, Some(&fixture.view));

        let mut pipeline = FramePipeline::new();
        let mut cmd = CommandList::new();
        let stats = pipeline.produce_frame(&mut cmd, &mut visibility, &frame, 0.0);

        assert!(stats.skipped.is_empty());
        let order = [
            "skysphere",
            "brdf_specular_lut",
            "shadow_maps",
            "depth_prepass",
            "depth_prepass_backface",
            "gbuffer",
            "light",
            "light_composition",
            "light_image_based",
            "copy_opaque",
            "upscale_linear",
            "upscale_depth",
            "gbuffer_transparent",
            "light_transparent",
            "light_composition_transparent",
            "light_image_based_transparent",
            "additive_transparent",
            "tonemap",
            "copy_to_output",
            "text",
        ];
        let positions: Vec<usize> = order.iter().map(|name| position(&stats, name)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", stats.executed);
        assert_eq!(cmd.marker_depth(), 0);
        assert!(pipeline.is_brdf_lut_ready());

        // 一个不透明 mesh 画两次深度加一次 g-buffer，透明 mesh 只进入透明 g-buffer
        assert_eq!(cmd.count(|c| matches!(c, RecordedCommand::DrawIndexed { .. })), 4);

        // LUT 只生成一次
        let mut cmd = CommandList::new();
        let stats = pipeline.produce_frame(&mut cmd, &mut visibility, &frame, 0.1);
        assert!(!stats.executed.contains(&"brdf_specular_lut"));
    }

    #[test]
    fn test_uncompiled_shaders_skip_passes() {
        tracy_client::Client::start();
        let fixture = Fixture::new();
        fixture.shaders.set_compiled(ShaderId::TonemapC, false);
        fixture.shaders.set_compiled(ShaderId::BrdfSpecularLutC, false);
        let mut visibility = VisibilityEngine::new();
        let meshes = fixture.sorted_meshes(&mut visibility);
        let frame = fixture.frame(&meshes, Some(&fixture.view));

        let mut pipeline = FramePipeline::new();
        let mut cmd = CommandList::new();
        let stats = pipeline.produce_frame(&mut cmd, &mut visibility, &frame, 0.0);

        assert!(stats.skipped.contains(&"tonemap"));
        assert!(stats.skipped.contains(&"brdf_specular_lut"));
        assert!(!stats.executed.contains(&"tonemap"));
        // 没有阶段写入 FrameOutput2，结果仍在 FrameOutput
        assert!(!stats.executed.contains(&"copy_to_output"));
        assert!(!pipeline.is_brdf_lut_ready());

        // 编译完成后的下一帧补上
        fixture.shaders.set_compiled(ShaderId::BrdfSpecularLutC, true);
        let mut cmd = CommandList::new();
        let stats = pipeline.produce_frame(&mut cmd, &mut visibility, &frame, 0.1);
        assert!(stats.executed.contains(&"brdf_specular_lut"));
        assert!(pipeline.is_brdf_lut_ready());
    }

    #[test]
    fn test_no_camera_clears_output() {
        tracy_client::Client::start();
        let fixture = Fixture::new();
        let mut visibility = VisibilityEngine::new();
        let frame = fixture.frame(&[], None);

        let mut pipeline = FramePipeline::new();
        let mut cmd = CommandList::new();
        let stats = pipeline.produce_frame(&mut cmd, &mut visibility, &frame, 0.0);
        assert!(stats.executed.ends_with(&["clear_output", "text"]), "{:?}", stats.executed);
        // 环境相关的 pass 与相机无关
        assert!(stats.executed.contains(&"skysphere"));
        assert!(stats.executed.contains(&"brdf_specular_lut"));
        assert!(pipeline.is_brdf_lut_ready());
        assert!(!stats.executed.contains(&"shadow_maps"));
        assert!(!stats.executed.contains(&"gbuffer"));

        let mut device = HeadlessDevice::default();
        device.submit(cmd, &fixture.pool);
        let output = fixture.pool.get(fixture.targets.get(RenderTarget::FrameOutput)).unwrap();
        let pixels = output.mip_data(0).unwrap();
        assert!(pixels.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }
}
