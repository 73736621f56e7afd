//! 每帧上传一次的常量块
//!
//! 包含相机矩阵（当前、上一帧、逆矩阵）、TAA 抖动、时间、分辨率、HDR 参数和特性开关。

use ash::vk;
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use truvis_render_interface::pipeline_settings::{PipelineSettings, UpsamplingMode};
use truvis_scene::components::camera::CameraView;

bitflags! {
    /// 与 shader 中读取的位一致
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameFeatureFlags: u32 {
        const SSR = 1 << 0;
        const SSAO = 1 << 1;
        const FOG = 1 << 2;
    }
}

/// 布局与 shader 中的 frame constant buffer 一致
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameConstants {
    pub view: [f32; 16],
    pub view_previous: [f32; 16],
    pub view_inv: [f32; 16],
    pub projection: [f32; 16],
    pub projection_previous: [f32; 16],
    pub projection_inv: [f32; 16],
    pub view_projection: [f32; 16],
    pub view_projection_previous: [f32; 16],
    pub view_projection_inv: [f32; 16],
    pub view_projection_unjittered: [f32; 16],
    pub view_projection_previous_unjittered: [f32; 16],
    /// 屏幕空间叠加层使用
    pub view_projection_ortho: [f32; 16],

    pub camera_position: [f32; 3],
    pub camera_near: f32,
    pub camera_direction: [f32; 3],
    pub camera_far: f32,
    pub camera_position_previous: [f32; 3],
    pub camera_last_movement_time: f32,

    pub resolution_render: [f32; 2],
    pub resolution_output: [f32; 2],
    pub taa_jitter_current: [f32; 2],
    pub taa_jitter_previous: [f32; 2],

    pub time: f32,
    pub delta_time: f32,
    pub frame: u32,
    pub resolution_scale: f32,

    pub hdr_enabled: f32,
    pub hdr_max_nits: f32,
    pub hdr_white_point: f32,
    pub directional_light_intensity: f32,

    pub options: u32,
    pub _padding: [u32; 3],
}
impl FrameConstants {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    #[inline]
    pub fn feature_flags(&self) -> FrameFeatureFlags {
        FrameFeatureFlags::from_bits_truncate(self.options)
    }
}

/// Halton(2, 3) 抖动序列，用于 temporal upscaler
pub struct HaltonJitter;
impl HaltonJitter {
    fn halton(mut index: u32, base: u32) -> f32 {
        let mut f = 1.0;
        let mut result = 0.0;
        while index > 0 {
            f /= base as f32;
            result += f * (index % base) as f32;
            index /= base;
        }
        result
    }

    /// 序列长度随放大倍数增长
    pub fn phase_count(render_width: u32, output_width: u32) -> u32 {
        let ratio = output_width as f32 / render_width.max(1) as f32;
        ((8.0 * ratio * ratio) as u32).max(1)
    }

    /// 像素单位的抖动，范围 [-0.5, 0.5)
    pub fn sample(frame: u64, render_width: u32, output_width: u32) -> glam::Vec2 {
        let index = (frame % Self::phase_count(render_width, output_width) as u64) as u32 + 1;
        glam::vec2(Self::halton(index, 2) - 0.5, Self::halton(index, 3) - 0.5)
    }
}

/// 本帧构建常量块需要的输入
pub struct FrameInputs<'a> {
    pub camera: Option<&'a CameraView>,
    pub settings: &'a PipelineSettings,
    pub render_resolution: vk::Extent2D,
    pub output_resolution: vk::Extent2D,
    pub viewport: glam::Vec2,
    pub time_s: f32,
    pub delta_time_s: f32,
    pub frame: u64,
    pub resolution_scale: f32,
    pub hdr_enabled: bool,
    pub hdr_max_nits: f32,
    pub hdr_white_point: f32,
    /// 第一个方向光的光强，单位瓦特，已乘相机曝光
    pub directional_light_intensity: f32,
}

/// 跨帧保存的常量块状态，上一帧的矩阵和抖动从这里取
pub struct FrameConstantsState {
    constants: FrameConstants,
    jitter: glam::Vec2,

    near: f32,
    far: f32,
    viewport: glam::Vec2,
    ortho_dirty: bool,
}
// new & init
impl FrameConstantsState {
    pub fn new() -> Self {
        let identity = glam::Mat4::IDENTITY.to_cols_array();
        Self {
            constants: FrameConstants {
                view: identity,
                projection: identity,
                view_projection: identity,
                view_projection_unjittered: identity,
                ..Zeroable::zeroed()
            },
            jitter: glam::Vec2::ZERO,
            near: 0.0,
            far: 1.0,
            viewport: glam::Vec2::ZERO,
            ortho_dirty: true,
        }
    }
}
impl Default for FrameConstantsState {
    fn default() -> Self {
        Self::new()
    }
}
// getters
impl FrameConstantsState {
    #[inline]
    pub fn constants(&self) -> &FrameConstants {
        &self.constants
    }

    /// 本帧的抖动，投影空间单位
    #[inline]
    pub fn jitter(&self) -> glam::Vec2 {
        self.jitter
    }
}
// update
impl FrameConstantsState {
    /// 视口或相机 near/far 变化之后需要重建正交投影
    #[inline]
    pub fn mark_ortho_dirty(&mut self) {
        self.ortho_dirty = true;
    }

    pub fn update(&mut self, inputs: &FrameInputs) -> &FrameConstants {
        let _span = tracy_client::span!("FrameConstantsState::update");

        let cb = &mut self.constants;
        let mut projection = glam::Mat4::from_cols_array(&cb.projection);
        let mut view = glam::Mat4::from_cols_array(&cb.view);
        let mut unjittered_projection = projection;

        if let Some(camera) = inputs.camera {
            if self.near != camera.near || self.far != camera.far {
                self.near = camera.near;
                self.far = camera.far;
                self.ortho_dirty = true;
            }
            cb.view_previous = cb.view;
            cb.projection_previous = cb.projection;
            view = camera.view;
            projection = camera.projection;
            unjittered_projection = camera.projection;
        }
        if self.viewport != inputs.viewport {
            self.viewport = inputs.viewport;
            self.ortho_dirty = true;
        }

        if self.ortho_dirty {
            // 正交投影中 near 不影响精度，用 0 避免矩阵退化
            let (w, h) = (self.viewport.x * 0.5, self.viewport.y * 0.5);
            let ortho = glam::Mat4::orthographic_rh(-w, w, -h, h, 0.0, self.far);
            let eye = glam::vec3(0.0, 0.0, self.near);
            let look = glam::Mat4::look_at_rh(eye, eye + glam::Vec3::NEG_Z, glam::Vec3::Y);
            cb.view_projection_ortho = (ortho * look).to_cols_array();
            self.ortho_dirty = false;
        }

        let temporal = inputs.settings.upsampling == UpsamplingMode::Fsr3 || inputs.settings.antialiasing.uses_taa();
        self.jitter = if temporal {
            let render = inputs.render_resolution;
            let pixel = HaltonJitter::sample(inputs.frame, render.width, inputs.output_resolution.width);
            glam::vec2(
                2.0 * pixel.x / render.width.max(1) as f32,
                -2.0 * pixel.y / render.height.max(1) as f32,
            )
        } else {
            glam::Vec2::ZERO
        };
        projection = glam::Mat4::from_translation(self.jitter.extend(0.0)) * projection;

        cb.view = view.to_cols_array();
        cb.view_inv = view.inverse().to_cols_array();
        cb.projection = projection.to_cols_array();
        cb.projection_inv = projection.inverse().to_cols_array();

        let view_projection = projection * view;
        cb.view_projection_previous = cb.view_projection;
        cb.view_projection = view_projection.to_cols_array();
        cb.view_projection_inv = view_projection.inverse().to_cols_array();

        if let Some(camera) = inputs.camera {
            cb.view_projection_previous_unjittered = cb.view_projection_unjittered;
            cb.view_projection_unjittered = (unjittered_projection * view).to_cols_array();
            cb.camera_near = camera.near;
            cb.camera_far = camera.far;
            cb.camera_position_previous = cb.camera_position;
            cb.camera_position = camera.position.to_array();
            cb.camera_direction = camera.forward.to_array();
            let moved = glam::Vec3::from_array(cb.camera_position)
                .distance_squared(glam::Vec3::from_array(cb.camera_position_previous))
                != 0.0;
            if moved {
                cb.camera_last_movement_time = inputs.time_s;
            }
        }

        cb.resolution_render = [inputs.render_resolution.width as f32, inputs.render_resolution.height as f32];
        cb.resolution_output = [inputs.output_resolution.width as f32, inputs.output_resolution.height as f32];
        cb.taa_jitter_previous = cb.taa_jitter_current;
        cb.taa_jitter_current = self.jitter.to_array();
        cb.time = inputs.time_s;
        cb.delta_time = inputs.delta_time_s;
        cb.frame = inputs.frame as u32;
        cb.resolution_scale = inputs.resolution_scale;
        cb.hdr_enabled = if inputs.hdr_enabled { 1.0 } else { 0.0 };
        cb.hdr_max_nits = inputs.hdr_max_nits;
        cb.hdr_white_point = inputs.hdr_white_point;
        cb.directional_light_intensity = inputs.directional_light_intensity;

        let mut flags = FrameFeatureFlags::empty();
        flags.set(FrameFeatureFlags::SSR, inputs.settings.ssr);
        flags.set(FrameFeatureFlags::SSAO, inputs.settings.ssao);
        flags.set(FrameFeatureFlags::FOG, inputs.settings.fog != 0.0);
        cb.options = flags.bits();

        &self.constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use truvis_render_interface::pipeline_settings::AntialiasingMode;
    use truvis_scene::components::camera::Camera;
    use truvis_scene::components::transform::Transform;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn inputs<'a>(camera: Option<&'a CameraView>, settings: &'a PipelineSettings, frame: u64) -> FrameInputs<'a> {
        FrameInputs {
            camera,
            settings,
            render_resolution: extent(960, 540),
            output_resolution: extent(1920, 1080),
            viewport: glam::vec2(1920.0, 1080.0),
            time_s: frame as f32 * 0.016,
            delta_time_s: 0.016,
            frame,
            resolution_scale: 1.0,
            hdr_enabled: false,
            hdr_max_nits: 1000.0,
            hdr_white_point: 350.0,
            directional_light_intensity: 0.0,
        }
    }

    #[test]
    fn test_layout() {
        assert_eq!(size_of::<FrameConstants>(), 12 * 64 + 8 * 16);
    }

    #[test]
    fn test_halton_sequence() {
        assert_eq!(HaltonJitter::phase_count(960, 1920), 32);
        assert_eq!(HaltonJitter::phase_count(1920, 1920), 8);
        let first = HaltonJitter::sample(0, 1920, 1920);
        assert_eq!(first, glam::vec2(0.0, 1.0 / 3.0 - 0.5));
        // 序列按 phase count 循环
        assert_eq!(HaltonJitter::sample(8, 1920, 1920), first);
    }

    #[test]
    fn test_jitter_only_with_temporal_upsampling() {
        tracy_client::Client::start();
        let camera = Camera::default().view_of(&Transform::default(), 16.0 / 9.0);
        let mut state = FrameConstantsState::new();

        let settings = PipelineSettings::default();
        state.update(&inputs(Some(&camera), &settings, 1));
        assert_eq!(state.jitter(), glam::Vec2::ZERO);

        let settings = PipelineSettings {
            antialiasing: AntialiasingMode::Taa,
            ssao: true,
            fog: 1.0,
            ..Default::default()
        };
        let cb = *state.update(&inputs(Some(&camera), &settings, 2));
        assert_ne!(state.jitter(), glam::Vec2::ZERO);
        assert_eq!(cb.taa_jitter_previous, [0.0, 0.0]);
        assert_eq!(cb.feature_flags(), FrameFeatureFlags::SSAO | FrameFeatureFlags::FOG);
        // 未抖动的矩阵保持干净
        let unjittered = camera.projection * camera.view;
        assert_eq!(cb.view_projection_unjittered, unjittered.to_cols_array());
        assert_ne!(cb.view_projection, cb.view_projection_unjittered);
    }

    #[test]
    fn test_camera_movement_time() {
        tracy_client::Client::start();
        let settings = PipelineSettings::default();
        let mut state = FrameConstantsState::new();

        let still = Camera::default().view_of(&Transform::from_position(glam::vec3(0.0, 1.0, 0.0)), 1.0);
        state.update(&inputs(Some(&still), &settings, 1));
        let moved_at = state.constants().camera_last_movement_time;
        state.update(&inputs(Some(&still), &settings, 5));
        assert_eq!(state.constants().camera_last_movement_time, moved_at);

        let moved = Camera::default().view_of(&Transform::from_position(glam::vec3(0.0, 2.0, 0.0)), 1.0);
        state.update(&inputs(Some(&moved), &settings, 9));
        assert_eq!(state.constants().camera_last_movement_time, 9.0 * 0.016);
        assert_eq!(state.constants().camera_position_previous, [0.0, 1.0, 0.0]);
    }
}
