//! 渲染器选项
//!
//! 每个选项都是一个 f32，开关用 0/1，枚举用其序号。
//! [`OptionStore::set`] 依次执行：clamp、相同值直接返回、能力检查、写入、级联。
//! 级联只执行一层：被级联修改的选项不会再触发它自己的级联。

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use truvis_render_interface::device::DeviceCapabilities;
use truvis_render_interface::pipeline_settings::{
    AntialiasingMode, PipelineSettings, ScreenspaceShadowMode, TonemappingMode, UpsamplingMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RendererOption {
    Hdr,
    Vsync,
    Bloom,
    MotionBlur,
    DepthOfField,
    ScreenSpaceAmbientOcclusion,
    ScreenSpaceShadows,
    ScreenSpaceReflections,
    GlobalIllumination,
    Anisotropy,
    ShadowResolution,
    Exposure,
    Sharpness,
    Fog,
    FogVolumetric,
    Antialiasing,
    Upsampling,
    ResolutionScale,
    VariableRateShading,
    TransformHandle,
    SelectionOutline,
    Grid,
    Lights,
    Physics,
    PerformanceMetrics,
    OcclusionCulling,
    WhitePoint,
    Tonemapping,
    DynamicResolution,
    Wireframe,
    ChromaticAberration,
    FilmGrain,
}
impl RendererOption {
    pub const ALL: [RendererOption; 32] = [
        Self::Hdr,
        Self::Vsync,
        Self::Bloom,
        Self::MotionBlur,
        Self::DepthOfField,
        Self::ScreenSpaceAmbientOcclusion,
        Self::ScreenSpaceShadows,
        Self::ScreenSpaceReflections,
        Self::GlobalIllumination,
        Self::Anisotropy,
        Self::ShadowResolution,
        Self::Exposure,
        Self::Sharpness,
        Self::Fog,
        Self::FogVolumetric,
        Self::Antialiasing,
        Self::Upsampling,
        Self::ResolutionScale,
        Self::VariableRateShading,
        Self::TransformHandle,
        Self::SelectionOutline,
        Self::Grid,
        Self::Lights,
        Self::Physics,
        Self::PerformanceMetrics,
        Self::OcclusionCulling,
        Self::WhitePoint,
        Self::Tonemapping,
        Self::DynamicResolution,
        Self::Wireframe,
        Self::ChromaticAberration,
        Self::FilmGrain,
    ];

    /// 配置文件和快照中使用的名字，与变体名相同
    pub fn name(self) -> String {
        format!("{self:?}")
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|option| option.name() == name)
    }
}

bitflags! {
    /// 选项变化之后渲染器需要执行的动作
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OptionEffects: u32 {
        /// 丢弃 temporal upscaler 的历史
        const RESET_TEMPORAL_HISTORY = 1 << 0;
        const SHUTDOWN_UPSCALER = 1 << 1;
        const SET_SWAPCHAIN_HDR = 1 << 2;
        const SET_SWAPCHAIN_VSYNC = 1 << 3;
        const MARK_LIGHTS_DIRTY = 1 << 4;
        const CLEAR_PROFILER = 1 << 5;
        const RECREATE_SHADOW_MAPS = 1 << 6;
        /// GI 分辨率比例变化
        const RECREATE_RENDER_TARGETS = 1 << 7;
    }
}

/// [`OptionStore::set`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOptionResult {
    /// clamp 之后与当前值相同
    Unchanged,
    /// 设备不支持，没有写入
    Rejected,
    Applied(OptionEffects),
}

pub struct OptionStore {
    values: BTreeMap<RendererOption, f32>,
    /// 上一次 PerformanceMetrics 的开关状态，从关到开时清空统计
    metrics_enabled: bool,
}
// new & init
impl OptionStore {
    pub const SHADOW_RESOLUTION_MIN: f32 = 128.0;

    /// 空的选项表，所有选项读出 0
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            metrics_enabled: false,
        }
    }

    /// 按初始化顺序写入默认值，返回累积的副作用
    pub fn with_defaults(hdr: bool, caps: &DeviceCapabilities) -> (Self, OptionEffects) {
        let mut store = Self::new();
        let mut effects = OptionEffects::empty();
        for (option, value) in Self::defaults(hdr) {
            if let SetOptionResult::Applied(e) = store.set(option, value, caps) {
                effects |= e;
            }
        }
        (store, effects)
    }

    fn defaults(hdr: bool) -> [(RendererOption, f32); 31] {
        use RendererOption as O;
        [
            (O::Hdr, if hdr { 1.0 } else { 0.0 }),
            (O::WhitePoint, 350.0),
            (O::Tonemapping, TonemappingMode::Passthrough.as_f32()),
            (O::Bloom, 1.0),
            (O::MotionBlur, 1.0),
            (O::DepthOfField, 1.0),
            (O::ScreenSpaceAmbientOcclusion, 1.0),
            (O::ScreenSpaceShadows, ScreenspaceShadowMode::Bend.as_f32()),
            (O::ScreenSpaceReflections, 1.0),
            // render 分辨率的比例
            (O::GlobalIllumination, 0.5),
            (O::Anisotropy, 16.0),
            (O::ShadowResolution, 4096.0),
            (O::Exposure, 1.0),
            (O::Sharpness, 0.0),
            (O::Fog, 1.0),
            (O::FogVolumetric, 1.0),
            (O::Antialiasing, AntialiasingMode::Taa.as_f32()),
            (O::Upsampling, UpsamplingMode::Fsr3.as_f32()),
            (O::ResolutionScale, 1.0),
            (O::VariableRateShading, 0.0),
            (O::Vsync, 0.0),
            (O::TransformHandle, 1.0),
            (O::SelectionOutline, 1.0),
            (O::Grid, 1.0),
            (O::Lights, 1.0),
            (O::Physics, 0.0),
            (O::PerformanceMetrics, 1.0),
            // 查询结果晚一帧，默认关闭
            (O::OcclusionCulling, 0.0),
            (O::Wireframe, 0.0),
            (O::ChromaticAberration, 0.0),
            (O::FilmGrain, 0.0),
        ]
    }
}
impl Default for OptionStore {
    fn default() -> Self {
        Self::new()
    }
}
// getters
impl OptionStore {
    #[inline]
    pub fn get(&self, option: RendererOption) -> f32 {
        self.values.get(&option).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn get_bool(&self, option: RendererOption) -> bool {
        self.get(option) != 0.0
    }

    #[inline]
    pub fn antialiasing(&self) -> AntialiasingMode {
        AntialiasingMode::from_f32(self.get(RendererOption::Antialiasing))
    }

    #[inline]
    pub fn upsampling(&self) -> UpsamplingMode {
        UpsamplingMode::from_f32(self.get(RendererOption::Upsampling))
    }

    /// 本帧 pass 读取的配置
    pub fn settings(&self) -> PipelineSettings {
        use RendererOption as O;
        PipelineSettings {
            variable_rate_shading: self.get_bool(O::VariableRateShading),
            ssao: self.get_bool(O::ScreenSpaceAmbientOcclusion),
            ssr: self.get_bool(O::ScreenSpaceReflections),
            screen_space_shadows: self.get_bool(O::ScreenSpaceShadows),
            global_illumination: self.get(O::GlobalIllumination),
            depth_of_field: self.get_bool(O::DepthOfField),
            motion_blur: self.get_bool(O::MotionBlur),
            bloom: self.get(O::Bloom),
            sharpness: self.get(O::Sharpness),
            fog: self.get(O::Fog),
            fog_volumetric: self.get_bool(O::FogVolumetric),
            exposure: self.get(O::Exposure),
            antialiasing: self.antialiasing(),
            upsampling: self.upsampling(),
            tonemapping: TonemappingMode::from_f32(self.get(O::Tonemapping)),
            wireframe: self.get_bool(O::Wireframe),
            chromatic_aberration: self.get_bool(O::ChromaticAberration),
            film_grain: self.get_bool(O::FilmGrain),
            grid: self.get_bool(O::Grid),
            selection_outline: self.get_bool(O::SelectionOutline),
            transform_handle: self.get_bool(O::TransformHandle),
            lights: self.get_bool(O::Lights),
            physics: self.get_bool(O::Physics),
            performance_metrics: self.get_bool(O::PerformanceMetrics),
            occlusion_culling: self.get_bool(O::OcclusionCulling),
        }
    }
}
// update
impl OptionStore {
    pub fn set(&mut self, option: RendererOption, value: f32, caps: &DeviceCapabilities) -> SetOptionResult {
        use RendererOption as O;

        let value = match option {
            O::Anisotropy => value.clamp(0.0, 16.0),
            O::ShadowResolution => value.clamp(Self::SHADOW_RESOLUTION_MIN, caps.max_texture_2d_dimension as f32),
            O::ResolutionScale => value.clamp(0.5, 1.0),
            _ => value,
        };

        if self.values.get(&option) == Some(&value) {
            return SetOptionResult::Unchanged;
        }

        if value == 1.0 {
            if option == O::Hdr && !caps.hdr_display {
                log::info!("This display doesn't support HDR");
                return SetOptionResult::Rejected;
            }
            if option == O::VariableRateShading && !caps.variable_rate_shading {
                log::info!("This GPU doesn't support variable rate shading");
                return SetOptionResult::Rejected;
            }
        }

        self.values.insert(option, value);
        SetOptionResult::Applied(self.cascade(option, value))
    }

    /// 直接修改关联选项，不递归
    fn cascade(&mut self, option: RendererOption, value: f32) -> OptionEffects {
        use RendererOption as O;

        let mut effects = OptionEffects::empty();
        match option {
            O::Antialiasing => {
                let fsr_enabled = self.upsampling() == UpsamplingMode::Fsr3;
                if AntialiasingMode::from_f32(value).uses_taa() {
                    if !fsr_enabled {
                        self.values.insert(O::Upsampling, UpsamplingMode::Fsr3.as_f32());
                        effects |= OptionEffects::RESET_TEMPORAL_HISTORY;
                    }
                } else if fsr_enabled {
                    // FSR 同时负责 TAA，关闭 TAA 就退回线性放大
                    self.values.insert(O::Upsampling, UpsamplingMode::Linear.as_f32());
                }
            }
            O::Upsampling => {
                let antialiasing = self.antialiasing();
                match UpsamplingMode::from_f32(value) {
                    UpsamplingMode::Linear => {
                        if antialiasing.uses_taa() {
                            let fallback = if antialiasing.uses_fxaa() {
                                AntialiasingMode::Fxaa
                            } else {
                                AntialiasingMode::Disabled
                            };
                            self.values.insert(O::Antialiasing, fallback.as_f32());
                        }
                        effects |= OptionEffects::SHUTDOWN_UPSCALER;
                    }
                    UpsamplingMode::Fsr3 => {
                        if !antialiasing.uses_taa() {
                            let taa = if antialiasing.uses_fxaa() {
                                AntialiasingMode::TaaFxaa
                            } else {
                                AntialiasingMode::Taa
                            };
                            self.values.insert(O::Antialiasing, taa.as_f32());
                            effects |= OptionEffects::RESET_TEMPORAL_HISTORY;
                        }
                    }
                }
            }
            O::Hdr => effects |= OptionEffects::SET_SWAPCHAIN_HDR,
            O::Vsync => effects |= OptionEffects::SET_SWAPCHAIN_VSYNC,
            O::FogVolumetric | O::ScreenSpaceShadows => effects |= OptionEffects::MARK_LIGHTS_DIRTY,
            O::PerformanceMetrics => {
                if !self.metrics_enabled && value == 1.0 {
                    effects |= OptionEffects::CLEAR_PROFILER;
                }
                self.metrics_enabled = value != 0.0;
            }
            O::ShadowResolution => effects |= OptionEffects::RECREATE_SHADOW_MAPS,
            O::GlobalIllumination => effects |= OptionEffects::RECREATE_RENDER_TARGETS,
            _ => {}
        }
        effects
    }

    /// 整体替换选项表，不执行 clamp 和级联
    pub fn replace(&mut self, values: BTreeMap<RendererOption, f32>) {
        self.metrics_enabled = values.get(&RendererOption::PerformanceMetrics).is_some_and(|v| *v != 0.0);
        self.values = values;
    }
}
// persistence
impl OptionStore {
    /// 以名字为 key 的快照
    pub fn snapshot(&self) -> BTreeMap<String, f32> {
        self.values.iter().map(|(option, value)| (option.name(), *value)).collect()
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// 解析名字，未知的名字打印警告后忽略
    pub fn parse_named(named: &BTreeMap<String, f32>) -> BTreeMap<RendererOption, f32> {
        named
            .iter()
            .filter_map(|(name, value)| match RendererOption::from_name(name) {
                Some(option) => Some((option, *value)),
                None => {
                    log::warn!("Unknown renderer option \"{}\"", name);
                    None
                }
            })
            .collect()
    }

    pub fn parse_json(json: &str) -> anyhow::Result<BTreeMap<RendererOption, f32>> {
        let named: BTreeMap<String, f32> = serde_json::from_str(json)?;
        Ok(Self::parse_named(&named))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> DeviceCapabilities {
        DeviceCapabilities {
            max_texture_2d_dimension: 8192,
            ..Default::default()
        }
    }

    fn defaults() -> OptionStore {
        OptionStore::with_defaults(false, &caps()).0
    }

    #[test]
    fn test_defaults() {
        let (store, effects) = OptionStore::with_defaults(false, &caps());
        assert_eq!(store.antialiasing(), AntialiasingMode::Taa);
        assert_eq!(store.upsampling(), UpsamplingMode::Fsr3);
        assert_eq!(store.get(RendererOption::ShadowResolution), 4096.0);
        assert_eq!(store.get(RendererOption::WhitePoint), 350.0);
        assert!(!store.get_bool(RendererOption::OcclusionCulling));
        assert!(effects.contains(OptionEffects::CLEAR_PROFILER));

        let settings = store.settings();
        assert!(settings.ssao && settings.ssr && settings.screen_space_shadows);
        assert_eq!(settings.tonemapping, TonemappingMode::Passthrough);
        assert_eq!(settings.global_illumination, 0.5);
    }

    #[test]
    fn test_clamp_and_early_exit() {
        let mut store = defaults();
        for input in [0.1, 0.75, 3.0] {
            store.set(RendererOption::ResolutionScale, input, &caps());
            let scale = store.get(RendererOption::ResolutionScale);
            assert!((0.5..=1.0).contains(&scale));
            assert_eq!(store.set(RendererOption::ResolutionScale, input, &caps()), SetOptionResult::Unchanged);
        }

        store.set(RendererOption::ShadowResolution, 16.0, &caps());
        assert_eq!(store.get(RendererOption::ShadowResolution), 128.0);
        store.set(RendererOption::ShadowResolution, 1.0e6, &caps());
        assert_eq!(store.get(RendererOption::ShadowResolution), 8192.0);
        store.set(RendererOption::Anisotropy, -4.0, &caps());
        assert_eq!(store.get(RendererOption::Anisotropy), 0.0);
    }

    #[test]
    fn test_reject_unsupported_capabilities() {
        let mut store = defaults();
        assert_eq!(store.set(RendererOption::Hdr, 1.0, &caps()), SetOptionResult::Rejected);
        assert!(!store.get_bool(RendererOption::Hdr));
        assert_eq!(store.set(RendererOption::VariableRateShading, 1.0, &caps()), SetOptionResult::Rejected);

        let hdr_caps = DeviceCapabilities {
            hdr_display: true,
            ..caps()
        };
        assert_eq!(
            store.set(RendererOption::Hdr, 1.0, &hdr_caps),
            SetOptionResult::Applied(OptionEffects::SET_SWAPCHAIN_HDR)
        );
    }

    #[test]
    fn test_taa_forces_fsr() {
        let mut store = defaults();
        store.set(RendererOption::Upsampling, UpsamplingMode::Linear.as_f32(), &caps());
        assert_eq!(store.antialiasing(), AntialiasingMode::Disabled);

        let result = store.set(RendererOption::Antialiasing, AntialiasingMode::Taa.as_f32(), &caps());
        assert_eq!(result, SetOptionResult::Applied(OptionEffects::RESET_TEMPORAL_HISTORY));
        assert_eq!(store.upsampling(), UpsamplingMode::Fsr3);

        store.set(RendererOption::Antialiasing, AntialiasingMode::Fxaa.as_f32(), &caps());
        assert_eq!(store.upsampling(), UpsamplingMode::Linear);
    }

    #[test]
    fn test_linear_upsampling_disables_taa() {
        let mut store = defaults();
        let result = store.set(RendererOption::Upsampling, UpsamplingMode::Linear.as_f32(), &caps());
        assert_eq!(result, SetOptionResult::Applied(OptionEffects::SHUTDOWN_UPSCALER));
        assert_eq!(store.antialiasing(), AntialiasingMode::Disabled);

        store.set(RendererOption::Antialiasing, AntialiasingMode::TaaFxaa.as_f32(), &caps());
        store.set(RendererOption::Upsampling, UpsamplingMode::Linear.as_f32(), &caps());
        assert_eq!(store.antialiasing(), AntialiasingMode::Fxaa);

        let result = store.set(RendererOption::Upsampling, UpsamplingMode::Fsr3.as_f32(), &caps());
        assert_eq!(result, SetOptionResult::Applied(OptionEffects::RESET_TEMPORAL_HISTORY));
        assert_eq!(store.antialiasing(), AntialiasingMode::TaaFxaa);
    }

    #[test]
    fn test_side_effects() {
        let mut store = defaults();
        let applied = |r: SetOptionResult| match r {
            SetOptionResult::Applied(e) => e,
            other => panic!("expected applied, got {other:?}"),
        };
        assert_eq!(applied(store.set(RendererOption::FogVolumetric, 0.0, &caps())), OptionEffects::MARK_LIGHTS_DIRTY);
        assert_eq!(applied(store.set(RendererOption::Vsync, 1.0, &caps())), OptionEffects::SET_SWAPCHAIN_VSYNC);
        assert_eq!(
            applied(store.set(RendererOption::ShadowResolution, 2048.0, &caps())),
            OptionEffects::RECREATE_SHADOW_MAPS
        );

        // 只有从关到开才清空统计
        assert_eq!(applied(store.set(RendererOption::PerformanceMetrics, 0.0, &caps())), OptionEffects::empty());
        assert_eq!(applied(store.set(RendererOption::PerformanceMetrics, 1.0, &caps())), OptionEffects::CLEAR_PROFILER);
        assert_eq!(applied(store.set(RendererOption::PerformanceMetrics, 2.0, &caps())), OptionEffects::empty());
    }

    #[test]
    fn test_snapshot_roundtrip_through_names() {
        let store = defaults();
        let json = store.to_json().unwrap();
        let parsed = OptionStore::parse_json(&json).unwrap();
        assert_eq!(parsed.len(), 31);
        assert_eq!(parsed[&RendererOption::Antialiasing], AntialiasingMode::Taa.as_f32());

        let mut named = BTreeMap::new();
        named.insert("Bloom".to_string(), 0.25);
        named.insert("NotAnOption".to_string(), 1.0);
        let parsed = OptionStore::parse_named(&named);
        assert_eq!(parsed.len(), 1);
        assert_eq!(RendererOption::from_name("FilmGrain"), Some(RendererOption::FilmGrain));
    }
}
