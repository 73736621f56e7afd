use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context;
use ash::vk;
use truvis_render_graph::orchestrator::FramePipeline;
use truvis_render_graph::pass::{FrameResources, FrameStats};
use truvis_render_graph::pass_constants::LineVertex;
use truvis_render_graph::render_targets::{RenderTarget, RenderTargetExtents, RenderTargets};
use truvis_render_graph::shader_library::{ShaderCompiler, ShaderId, ShaderLibrary};
use truvis_render_interface::bindless_manager::BindlessManager;
use truvis_render_interface::command_recorder::{CommandList, CommandRecorder};
use truvis_render_interface::deletion_queue::DeletionQueue;
use truvis_render_interface::device::{DeviceCapabilities, RenderDevice};
use truvis_render_interface::dynamic_buffer::DynamicBuffers;
use truvis_render_interface::frame_counter::{FrameCounter, ResourceLifetime};
use truvis_render_interface::handles::TextureHandle;
use truvis_render_interface::pipeline_settings::PipelineSettings;
use truvis_render_interface::texture::{TextureDesc, TexturePool};
use truvis_render_interface::texture_loader::{TextureEvent, TextureLoadRequest, TextureLoader};
use truvis_scene::components::camera::CameraView;
use truvis_scene::components::light::LightType;
use truvis_scene::guid_new_type::EntityHandle;
use truvis_scene::render_buckets::{RenderBuckets, RenderableKind};
use truvis_scene::scene_manager::SceneManager;
use truvis_scene::visibility::VisibilityEngine;

use crate::config::RendererConfig;
use crate::core::dynamic_resolution::DynamicResolution;
use crate::core::frame_constants::{FrameConstants, FrameConstantsState, FrameInputs};
use crate::core::options::{OptionEffects, OptionStore, RendererOption, SetOptionResult};
use crate::core::shadow_maps::ensure_shadow_maps;
use crate::debug::debug_draw::DebugDraw;
use crate::debug::profiler::Profiler;
use crate::platform::timer::Timer;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 一帧 tick 的摘要
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame_id: u64,
    pub stats: FrameStats,
    pub visible_meshes: usize,
    pub command_count: usize,
    pub materials_uploaded: bool,
    pub lights_uploaded: bool,
    /// 本帧是否为资源同步点
    pub sync_point: bool,
}

/// 进入全屏前的分辨率，退出时恢复
#[derive(Debug, Clone, Copy)]
struct WindowedState {
    viewport: glam::Vec2,
    output: vk::Extent2D,
}

/// 渲染器的所有状态
///
/// # 每帧流程
/// 1. 动态分辨率、资源同步点、纹理加载事件
/// 2. 场景变化时重新分类 bucket，bucket 变化时标记 bindless 表
/// 3. 相机、光源矩阵、shadow map
/// 4. 上传材质表、光源表、frame constants
/// 5. 视锥剔除与排序，然后 [`FramePipeline::produce_frame`]
/// 6. 提交，记录耗时，清空调试图元
///
/// bucket 放在 `Arc<Mutex<_>>` 中，场景加载线程可以直接调用 [`Self::set_entities`] 的同名逻辑。
pub struct RendererContext<D: RenderDevice> {
    device: D,
    capabilities: DeviceCapabilities,

    options: OptionStore,
    timer: Timer,
    frame_counter: FrameCounter,
    lifetime: ResourceLifetime,
    /// FrameConstants 和调试线段每帧写在新的 offset 上
    dynamic_buffers: DynamicBuffers,
    profiler: Profiler,

    pool: TexturePool,
    deletion_queue: DeletionQueue,
    texture_loader: TextureLoader,
    shaders: ShaderLibrary,
    /// shader 编译线程池
    worker_pool: rayon::ThreadPool,

    targets: RenderTargets,
    bindless: BindlessManager,
    pipeline: FramePipeline,
    visibility: VisibilityEngine,
    frame_constants: FrameConstantsState,
    debug_draw: DebugDraw,

    buckets: Arc<Mutex<RenderBuckets>>,
    classified_revision: Option<u64>,
    bucket_generation: u64,

    render_extent: vk::Extent2D,
    output_extent: vk::Extent2D,
    viewport: glam::Vec2,
    windowed: Option<WindowedState>,
    is_full_screen: bool,

    selected: Option<EntityHandle>,
    last_camera_position: Option<glam::Vec3>,
    shadow_maps_dirty: bool,
    reset_history: bool,
    is_shutdown: bool,
}
// new & init
impl<D: RenderDevice> RendererContext<D> {
    /// 每帧最多上传的调试线段顶点数
    pub const MAX_LINE_VERTICES_PER_FRAME: usize = 1 << 16;

    pub fn new(config: &RendererConfig, device: D, compiler: Arc<dyn ShaderCompiler>) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("RendererContext::new");

        let capabilities = device.capabilities();
        let render_extent = config.render_extent();
        let output_extent = config.output_extent();
        anyhow::ensure!(
            device.is_valid_resolution(render_extent.width, render_extent.height),
            "invalid render resolution {}x{}",
            render_extent.width,
            render_extent.height
        );
        anyhow::ensure!(
            device.is_valid_resolution(output_extent.width, output_extent.height),
            "invalid output resolution {}x{}",
            output_extent.width,
            output_extent.height
        );
        anyhow::ensure!(
            config.viewport[0] > 0.0 && config.viewport[1] > 0.0,
            "invalid viewport {}x{}",
            config.viewport[0],
            config.viewport[1]
        );

        let (options, default_effects) = OptionStore::with_defaults(capabilities.hdr_display, &capabilities);

        let worker_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.shader_compile_threads.max(1))
            .thread_name(|index| format!("Shader-Compiler-{}", index))
            .build()
            .context("failed to create shader compile thread pool")?;
        let mut shaders = ShaderLibrary::new();
        shaders.compile_all(compiler, &worker_pool);

        let mut pool = TexturePool::new();
        let targets = RenderTargets::new(
            &mut pool,
            RenderTargetExtents {
                render: render_extent,
                output: output_extent,
                gi_scale: options.get(RendererOption::GlobalIllumination),
            },
        );

        let mut context = Self {
            device,
            capabilities,

            options,
            timer: Timer::default(),
            frame_counter: FrameCounter::new(0, config.frame_limit),
            lifetime: ResourceLifetime::new(config.resource_lifetime),
            dynamic_buffers: DynamicBuffers::new(
                size_of::<FrameConstants>(),
                Self::MAX_LINE_VERTICES_PER_FRAME * size_of::<LineVertex>(),
                config.resource_lifetime,
            ),
            profiler: Profiler::default(),

            pool,
            deletion_queue: DeletionQueue::new(),
            texture_loader: TextureLoader::new(config.texture_loader_threads.max(1))?,
            shaders,
            worker_pool,

            targets,
            bindless: BindlessManager::new(config.bindless_texture_capacity, config.bindless_light_capacity),
            pipeline: FramePipeline::new(),
            visibility: VisibilityEngine::new(),
            frame_constants: FrameConstantsState::new(),
            debug_draw: DebugDraw::new(),

            buckets: Arc::new(Mutex::new(RenderBuckets::default())),
            classified_revision: None,
            bucket_generation: 0,

            render_extent,
            output_extent,
            viewport: glam::vec2(config.viewport[0], config.viewport[1]),
            windowed: None,
            is_full_screen: false,

            selected: None,
            last_camera_position: None,
            shadow_maps_dirty: true,
            reset_history: true,
            is_shutdown: false,
        };

        context.apply_effects(default_effects);
        for (option, value) in OptionStore::parse_named(&config.options) {
            context.set_option(option, value);
        }

        log::info!(
            "Renderer initialized: render {}x{}, output {}x{}, {} render targets",
            render_extent.width,
            render_extent.height,
            output_extent.width,
            output_extent.height,
            RenderTarget::ALL.len()
        );
        Ok(context)
    }

    /// 阻塞到所有 shader 编译完成
    pub fn wait_for_shaders(&mut self) {
        self.shaders.wait();
    }

    /// 重新编译所有 shader，编译完成之前相关 pass 跳过
    pub fn recompile_shaders(&mut self, compiler: Arc<dyn ShaderCompiler>) {
        self.shaders.wait();
        for shader in ShaderId::ALL {
            self.shaders.set_compiled(shader, false);
        }
        self.shaders.compile_all(compiler, &self.worker_pool);
    }
}
// getters
impl<D: RenderDevice> RendererContext<D> {
    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }
    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
    #[inline]
    pub fn options(&self) -> &OptionStore {
        &self.options
    }
    #[inline]
    pub fn get_option(&self, option: RendererOption) -> f32 {
        self.options.get(option)
    }
    #[inline]
    pub fn settings(&self) -> PipelineSettings {
        self.options.settings()
    }
    #[inline]
    pub fn render_extent(&self) -> vk::Extent2D {
        self.render_extent
    }
    #[inline]
    pub fn output_extent(&self) -> vk::Extent2D {
        self.output_extent
    }
    #[inline]
    pub fn viewport(&self) -> glam::Vec2 {
        self.viewport
    }
    #[inline]
    pub fn is_full_screen(&self) -> bool {
        self.is_full_screen
    }
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_counter.frame_id()
    }
    #[inline]
    pub fn timer(&self) -> &Timer {
        &self.timer
    }
    #[inline]
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }
    #[inline]
    pub fn texture_pool(&self) -> &TexturePool {
        &self.pool
    }
    #[inline]
    pub fn deletion_queue(&self) -> &DeletionQueue {
        &self.deletion_queue
    }
    #[inline]
    pub fn render_targets(&self) -> &RenderTargets {
        &self.targets
    }
    #[inline]
    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }
    #[inline]
    pub fn bindless(&self) -> &BindlessManager {
        &self.bindless
    }
    #[inline]
    pub fn visibility(&self) -> &VisibilityEngine {
        &self.visibility
    }
    #[inline]
    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }
    #[inline]
    pub fn dynamic_buffers(&self) -> &DynamicBuffers {
        &self.dynamic_buffers
    }
    #[inline]
    pub fn frame_constants(&self) -> &FrameConstants {
        self.frame_constants.constants()
    }
    #[inline]
    pub fn texture_loader(&self) -> &TextureLoader {
        &self.texture_loader
    }
    #[inline]
    pub fn selected(&self) -> Option<EntityHandle> {
        self.selected
    }

    /// 其他线程可以持有这个句柄读取或重建 bucket
    #[inline]
    pub fn buckets(&self) -> Arc<Mutex<RenderBuckets>> {
        self.buckets.clone()
    }

    /// 选项表的快照，key 为选项名
    pub fn options_snapshot(&self) -> BTreeMap<String, f32> {
        self.options.snapshot()
    }
}
// update
impl<D: RenderDevice> RendererContext<D> {
    /// 用真实时间推进一帧
    pub fn tick(&mut self, scene: &mut SceneManager) -> FrameReport {
        self.timer.tick();
        self.render_frame(scene)
    }

    /// 用固定的帧间隔推进一帧
    pub fn tick_with_delta(&mut self, scene: &mut SceneManager, delta: Duration) -> FrameReport {
        self.timer.advance(delta);
        self.render_frame(scene)
    }

    /// 写入一个选项并执行它的副作用
    pub fn set_option(&mut self, option: RendererOption, value: f32) -> SetOptionResult {
        let result = self.options.set(option, value, &self.capabilities);
        if let SetOptionResult::Applied(effects) = result {
            self.apply_effects(effects);
        }
        result
    }

    /// 整体替换选项表，例如从编辑器恢复
    ///
    /// 不执行 clamp 和级联，只同步设备状态。
    pub fn set_options(&mut self, options: &BTreeMap<String, f32>) {
        let parsed = OptionStore::parse_named(options);
        self.options.replace(parsed);
        self.apply_effects(OptionEffects::all() - OptionEffects::CLEAR_PROFILER);
    }

    /// 重新分类场景中的实体
    pub fn set_entities(&mut self, scene: &SceneManager) {
        lock(&self.buckets).classify(scene);
        self.classified_revision = Some(scene.revision());
    }

    #[inline]
    pub fn set_selected(&mut self, selected: Option<EntityHandle>) {
        self.selected = selected;
    }

    /// 光源参数被外部修改后调用
    pub fn mark_lights_dirty(&mut self) {
        self.bindless.mark_lights_dirty();
        self.shadow_maps_dirty = true;
    }

    /// 材质参数被外部修改后调用
    pub fn mark_materials_dirty(&mut self) {
        self.bindless.mark_materials_dirty();
    }

    pub fn set_render_resolution(&mut self, width: u32, height: u32) {
        if !self.device.is_valid_resolution(width, height) {
            log::warn!("Can't set {}x{} as it's an invalid resolution", width, height);
            return;
        }
        let extent = vk::Extent2D { width, height };
        if self.render_extent == extent {
            return;
        }
        self.render_extent = extent;
        self.recreate_render_targets();
        log::info!("Render resolution has been set to {}x{}", width, height);
    }

    pub fn set_output_resolution(&mut self, width: u32, height: u32) {
        if !self.device.is_valid_resolution(width, height) {
            log::warn!("Can't set {}x{} as it's an invalid resolution", width, height);
            return;
        }
        let extent = vk::Extent2D { width, height };
        if self.output_extent == extent {
            return;
        }
        self.output_extent = extent;
        self.recreate_render_targets();
        log::info!("Output resolution has been set to {}x{}", width, height);
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        assert!(width > 0.0 && height > 0.0, "viewport must not be zero sized: {}x{}", width, height);
        let viewport = glam::vec2(width, height);
        if self.viewport == viewport {
            return;
        }
        self.viewport = viewport;
        self.frame_constants.mark_ortho_dirty();
    }

    /// 进入全屏时 viewport 和 output 跟随窗口，退出时恢复
    pub fn on_full_screen_toggled(&mut self, is_full_screen: bool, window_width: u32, window_height: u32) {
        if self.is_full_screen == is_full_screen {
            return;
        }
        self.is_full_screen = is_full_screen;

        if is_full_screen {
            self.windowed = Some(WindowedState {
                viewport: self.viewport,
                output: self.output_extent,
            });
            self.set_viewport(window_width as f32, window_height as f32);
            self.set_output_resolution(window_width, window_height);
        } else if let Some(windowed) = self.windowed.take() {
            self.set_viewport(windowed.viewport.x, windowed.viewport.y);
            self.set_output_resolution(windowed.output.width, windowed.output.height);
        }
    }

    /// 纹理数据交给后台生成 mip，完成之前材质表不重建
    pub fn load_texture(&mut self, desc: TextureDesc, data: Vec<u8>) -> TextureHandle {
        let handle = self.pool.create_from_data(desc, data);
        if let Some(texture) = self.pool.get(handle) {
            self.texture_loader.request(TextureLoadRequest {
                texture: texture.clone(),
            });
        }
        handle
    }

    /// 调试线条、形状都画在这里，下一帧开始前清空
    #[inline]
    pub fn debug_draw(&mut self) -> &mut DebugDraw {
        &mut self.debug_draw
    }

    /// `position` 为相对 viewport 的比例，(0, 0) 为左上角
    pub fn draw_string(&mut self, text: impl Into<String>, position_screen_percentage: glam::Vec2) {
        let position = position_screen_percentage * self.viewport;
        self.debug_draw.draw_string(text, position, DebugDraw::DEFAULT_TEXT_COLOR);
    }

    /// 把上一次提交后的 FrameOutput 保存为图片
    pub fn screenshot(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let output = self
            .pool
            .get(self.targets.get(RenderTarget::FrameOutput))
            .context("frame output texture is missing")?;
        output.save_as_image(path)
    }

    /// 等待 GPU 和所有后台任务，释放延迟删除的资源
    pub fn shutdown(&mut self) {
        if self.is_shutdown {
            return;
        }
        self.is_shutdown = true;

        self.device.wait_all_queues();
        self.texture_loader.join();
        self.shaders.wait();
        let released = self.deletion_queue.parse(&mut self.pool);
        log::info!("Renderer shut down, released {} deferred resources", released);
    }
}
// tools
impl<D: RenderDevice> RendererContext<D> {
    fn render_frame(&mut self, scene: &mut SceneManager) -> FrameReport {
        let _span = tracy_client::span!("RendererContext::render_frame");
        let cpu_start = Instant::now();

        self.update_dynamic_resolution();
        let sync_point = self.reclaim_resources();
        self.drain_texture_events();

        if self.classified_revision != Some(scene.revision()) {
            self.set_entities(scene);
        }
        let buckets = self.buckets.clone();
        let mut buckets = lock(&buckets);
        if buckets.generation() != self.bucket_generation {
            self.bucket_generation = buckets.generation();
            self.bindless.mark_materials_dirty();
            self.mark_lights_dirty();
        }

        let settings = self.options.settings();
        let aspect = self.viewport.x / self.viewport.y;
        let camera = buckets.active_camera().and_then(|handle| {
            let camera = scene.camera(handle)?;
            let entity = scene.entity(handle)?;
            Some(camera.view_of(&entity.transform, aspect))
        });
        let exposure = camera.as_ref().map_or(1.0, |c| c.exposure);

        self.update_lights(scene, buckets.get(RenderableKind::Light), camera.as_ref());

        let mut cmd = CommandList::with_occlusion_results(self.device.occlusion_results());

        let materials = if self.bindless.materials_dirty() {
            scene.prepare_material_data(buckets.get(RenderableKind::Mesh))
        } else {
            Vec::new()
        };
        let materials_uploaded =
            self.bindless.update_materials(&materials, self.texture_loader.is_loading(), &mut cmd);
        let lights = if self.bindless.lights_dirty() {
            scene.prepare_light_data(
                buckets.get(RenderableKind::Light),
                exposure,
                settings.screen_space_shadows,
                settings.fog_volumetric,
            )
        } else {
            Vec::new()
        };
        let lights_uploaded = self.bindless.update_lights(&lights, self.texture_loader.is_loading(), &mut cmd);

        let directional_light_intensity = buckets
            .get(RenderableKind::Light)
            .iter()
            .filter_map(|e| scene.entity_light(*e).and_then(|h| scene.light(h)))
            .find(|light| light.light_type == LightType::Directional)
            .map_or(0.0, |light| light.intensity_watts(exposure));
        let inputs = FrameInputs {
            camera: camera.as_ref(),
            settings: &settings,
            render_resolution: self.render_extent,
            output_resolution: self.output_extent,
            viewport: self.viewport,
            time_s: self.timer.total_time_s(),
            delta_time_s: self.timer.delta_time_s(),
            frame: self.frame_counter.frame_id(),
            resolution_scale: self.options.get(RendererOption::ResolutionScale),
            hdr_enabled: self.options.get_bool(RendererOption::Hdr),
            hdr_max_nits: self.capabilities.hdr_max_nits,
            hdr_white_point: self.options.get(RendererOption::WhitePoint),
            directional_light_intensity,
        };
        let constants = self.frame_constants.update(&inputs);
        self.dynamic_buffers.frame_constants.write(&mut cmd, constants.as_bytes());

        {
            let meshes = buckets.get_mut(RenderableKind::Mesh);
            match &camera {
                Some(view) => {
                    self.visibility.frustum_cull_and_sort(meshes, scene, view);
                    if settings.occlusion_culling {
                        self.visibility.determine_occluders(meshes, view, self.viewport);
                    }
                }
                None => self.visibility.clear(),
            }
        }
        let visible_meshes = buckets
            .get(RenderableKind::Mesh)
            .iter()
            .filter(|e| self.visibility.is_visible(**e))
            .count();

        if settings.performance_metrics {
            let text = self.profiler.metrics_text(self.timer.fps());
            self.draw_string(text, glam::vec2(0.01, 0.01));
        }

        let lines = self.debug_draw.lines();
        let lines_offset = if lines.is_empty() {
            None
        } else {
            self.dynamic_buffers.lines.allocate(size_of_val(lines))
        };

        let stats = {
            let frame = FrameResources {
                scene: &*scene,
                meshes: buckets.get(RenderableKind::Mesh),
                lights: buckets.get(RenderableKind::Light),
                camera: camera.as_ref(),
                targets: &self.targets,
                textures: &self.pool,
                shaders: &self.shaders,
                bindless: &self.bindless,
                settings: &settings,
                lines,
                lines_offset,
                texts: self.debug_draw.texts(),
                selected: self.selected,
                reset_history: self.reset_history,
                jitter: self.frame_constants.jitter(),
            };
            self.pipeline.produce_frame(&mut cmd, &mut self.visibility, &frame, self.timer.total_time_s())
        };
        drop(buckets);

        let command_count = cmd.len();
        self.device.submit(cmd, &self.pool);

        let cpu_time_ms = cpu_start.elapsed().as_secs_f32() * 1000.0;
        self.profiler.record_frame(cpu_time_ms, self.device.gpu_frame_time_ms());

        let report = FrameReport {
            frame_id: self.frame_counter.frame_id(),
            stats,
            visible_meshes,
            command_count,
            materials_uploaded,
            lights_uploaded,
            sync_point,
        };

        self.debug_draw.clear();
        scene.update_previous_transforms();
        self.frame_counter.next_frame();
        self.reset_history = false;

        report
    }

    fn update_dynamic_resolution(&mut self) {
        if !self.options.get_bool(RendererOption::DynamicResolution) {
            return;
        }
        let scale = DynamicResolution::next_scale(
            self.options.get(RendererOption::ResolutionScale),
            self.profiler.gpu_time_last_ms(),
            self.timer.delta_time_s(),
        );
        self.set_option(RendererOption::ResolutionScale, scale);
    }

    /// 到达同步点时重置动态 buffer 的 offset，等待 GPU 并释放 deletion queue 中的资源
    fn reclaim_resources(&mut self) -> bool {
        let sync_point = self.lifetime.advance();
        if !sync_point {
            return false;
        }
        if !self.deletion_queue.is_empty() {
            self.device.wait_all_queues();
            let released = self.deletion_queue.parse(&mut self.pool);
            log::debug!("Released {} deferred resources", released);
        }
        self.dynamic_buffers.reset_offsets();
        true
    }

    fn drain_texture_events(&mut self) {
        let mut any_ready = false;
        for event in self.texture_loader.drain_events() {
            match event {
                TextureEvent::Ready(handle) => {
                    log::debug!("Texture {:?} is ready", handle);
                    any_ready = true;
                }
                TextureEvent::Failed(handle, _) => log::warn!("Texture {:?} will not be available", handle),
            }
        }
        if any_ready {
            self.bindless.mark_materials_dirty();
        }
    }

    fn update_lights(&mut self, scene: &mut SceneManager, lights: &[EntityHandle], camera: Option<&CameraView>) {
        let _span = tracy_client::span!("RendererContext::update_lights");

        let camera_position = camera.map(|c| c.position);
        let light_moved = lights.iter().any(|e| scene.entity(*e).is_some_and(|entity| entity.has_moved()));
        if camera_position != self.last_camera_position || light_moved {
            self.bindless.mark_lights_dirty();
        }
        self.last_camera_position = camera_position;
        scene.update_light_matrices(camera_position);

        if self.shadow_maps_dirty {
            let resolution = self.options.get(RendererOption::ShadowResolution) as u32;
            let recreated = ensure_shadow_maps(scene, lights, resolution, &mut self.pool, &mut self.deletion_queue);
            if recreated > 0 {
                self.bindless.mark_lights_dirty();
            }
            self.shadow_maps_dirty = false;
        }
    }

    fn recreate_render_targets(&mut self) {
        let extents = RenderTargetExtents {
            render: self.render_extent,
            output: self.output_extent,
            gi_scale: self.options.get(RendererOption::GlobalIllumination),
        };
        self.targets.recreate(&mut self.pool, extents, &mut self.deletion_queue);
        self.reset_history = true;
    }

    fn apply_effects(&mut self, effects: OptionEffects) {
        if effects.intersects(OptionEffects::RESET_TEMPORAL_HISTORY | OptionEffects::SHUTDOWN_UPSCALER) {
            self.reset_history = true;
        }
        if effects.contains(OptionEffects::SHUTDOWN_UPSCALER) {
            log::info!("Temporal upscaler shut down");
        }
        if effects.contains(OptionEffects::SET_SWAPCHAIN_HDR) {
            self.device.set_swapchain_hdr(self.options.get_bool(RendererOption::Hdr));
        }
        if effects.contains(OptionEffects::SET_SWAPCHAIN_VSYNC) {
            self.device.set_swapchain_vsync(self.options.get_bool(RendererOption::Vsync));
        }
        if effects.contains(OptionEffects::MARK_LIGHTS_DIRTY) {
            self.bindless.mark_lights_dirty();
        }
        if effects.contains(OptionEffects::CLEAR_PROFILER) {
            self.profiler.clear_metrics();
        }
        if effects.contains(OptionEffects::RECREATE_SHADOW_MAPS) {
            self.shadow_maps_dirty = true;
        }
        if effects.contains(OptionEffects::RECREATE_RENDER_TARGETS) {
            self.recreate_render_targets();
        }
    }
}
impl<D: RenderDevice> Drop for RendererContext<D> {
    fn drop(&mut self) {
        log::info!("Dropping RendererContext");
        self.shutdown();
    }
}
