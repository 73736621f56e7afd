//! 没有窗口的渲染器驱动
//!
//! 用法：`truvis-headless [帧数] [--screenshot <文件名>]`
//!
//! 配置读取 `config/renderer.toml`，截图写到 `target/screenshots/`。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use truvis_crate_tools::init_log::{init_log_with_level, parse_level};
use truvis_crate_tools::resource::TruvisPath;
use truvis_render_graph::shader_library::NullShaderCompiler;
use truvis_render_interface::device::HeadlessDevice;
use truvis_render_interface::handles::GeometryHandle;
use truvis_renderer::config::RendererConfig;
use truvis_renderer::core::renderer_context::RendererContext;
use truvis_renderer::debug::debug_draw::DebugDraw;
use truvis_scene::bounds::Aabb;
use truvis_scene::components::camera::Camera;
use truvis_scene::components::light::{Light, LightType};
use truvis_scene::components::material::Material;
use truvis_scene::components::renderable::Renderable;
use truvis_scene::components::transform::Transform;
use truvis_scene::guid_new_type::EntityHandle;
use truvis_scene::scene_manager::SceneManager;

const FRAME_DELTA: Duration = Duration::from_micros(16_667);

struct Args {
    frames: u32,
    screenshot: Option<String>,
}
impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut args = Args {
            frames: 120,
            screenshot: None,
        };
        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            if arg == "--screenshot" {
                args.screenshot = Some(iter.next().context("--screenshot needs a file name")?);
            } else {
                args.frames = arg.parse().with_context(|| format!("invalid frame count \"{}\"", arg))?;
            }
        }
        Ok(args)
    }
}

/// 演示场景：一排不透明方块、几个透明方块、一个绕圈移动的方块
struct DemoScene {
    scene: SceneManager,
    orbiter: EntityHandle,
    _geometries: slotmap::SlotMap<GeometryHandle, ()>,
}
impl DemoScene {
    fn new() -> Self {
        let mut geometries = slotmap::SlotMap::<GeometryHandle, ()>::with_key();
        let cube = geometries.insert(());
        let unit = Aabb::from_center_extents(glam::Vec3::ZERO, glam::Vec3::splat(0.5));
        let mut scene = SceneManager::new();

        let camera = scene.add_entity(
            "camera",
            Transform::looking_at(glam::vec3(0.0, 4.0, 12.0), glam::Vec3::ZERO),
        );
        scene.add_camera(camera, Camera::default());

        let sun = scene.add_entity(
            "sun",
            Transform::looking_at(glam::vec3(5.0, 20.0, 5.0), glam::Vec3::ZERO),
        );
        scene.add_light(sun, Light::new(LightType::Directional));
        let lamp = scene.add_entity("lamp", Transform::from_position(glam::vec3(-3.0, 2.0, 0.0)));
        scene.add_light(lamp, Light::new(LightType::Point));
        let spot = scene.add_entity(
            "spot",
            Transform::looking_at(glam::vec3(3.0, 5.0, 3.0), glam::vec3(3.0, 0.0, 0.0)),
        );
        scene.add_light(spot, Light::new(LightType::Spot));

        let stone = scene.add_material(Material::new("stone"));
        let mut glass = Material::new("glass");
        glass.color = glam::vec4(0.6, 0.8, 1.0, 0.4);
        let glass = scene.add_material(glass);

        for x in -3..=3 {
            for z in -3..=3 {
                let material = if (x + z) % 4 == 0 { glass } else { stone };
                let entity = scene.add_entity(
                    format!("cube_{}_{}", x, z),
                    Transform::from_position(glam::vec3(x as f32 * 1.5, 0.0, z as f32 * 1.5)),
                );
                scene.add_renderable(entity, Renderable::new(Some(cube), 36, unit).with_material(material));
            }
        }

        let orbiter = scene.add_entity("orbiter", Transform::from_position(glam::vec3(0.0, 2.0, 0.0)));
        scene.add_renderable(orbiter, Renderable::new(Some(cube), 36, unit).with_material(stone));

        Self {
            scene,
            orbiter,
            _geometries: geometries,
        }
    }

    fn update(&mut self, time_s: f32) {
        if let Some(entity) = self.scene.entity_mut(self.orbiter) {
            entity.transform.position = glam::vec3(time_s.cos() * 4.0, 2.0, time_s.sin() * 4.0);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = RendererConfig::load(TruvisPath::config_path("renderer.toml"))?;
    init_log_with_level(parse_level(&config.log_level));
    tracy_client::Client::start();

    let args = Args::parse()?;
    let mut demo = DemoScene::new();

    let device = HeadlessDevice::new(config.device.into());
    let mut renderer = RendererContext::new(&config, device, Arc::new(NullShaderCompiler))?;
    renderer.wait_for_shaders();
    renderer.set_selected(Some(demo.orbiter));

    for frame in 0..args.frames {
        demo.update(frame as f32 * FRAME_DELTA.as_secs_f32());

        let orbiter_position = demo.scene.entity(demo.orbiter).map(|e| e.transform.position);
        if let Some(position) = orbiter_position {
            renderer.debug_draw().draw_directional_arrow(
                position + glam::Vec3::Y,
                position,
                0.2,
                DebugDraw::DEFAULT_LINE_COLOR,
            );
        }

        let report = renderer.tick_with_delta(&mut demo.scene, FRAME_DELTA);
        if report.frame_id % 30 == 0 {
            log::info!(
                "frame {}: {} passes, {} skipped, {} visible meshes, {} commands",
                report.frame_id,
                report.stats.executed.len(),
                report.stats.skipped.len(),
                report.visible_meshes,
                report.command_count
            );
        }
    }

    let profiler = renderer.profiler();
    log::info!(
        "{} frames, cpu avg {:.3} ms, gpu avg {:.3} ms",
        profiler.sample_count(),
        profiler.cpu_time_avg_ms(),
        profiler.gpu_time_avg_ms()
    );
    log::info!("options: {}", renderer.options().to_json()?);

    if let Some(name) = args.screenshot {
        renderer.screenshot(TruvisPath::screenshots_path(&name))?;
    }

    renderer.shutdown();
    Ok(())
}
