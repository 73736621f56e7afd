use truvis_render_interface::deletion_queue::DeletionQueue;
use truvis_render_interface::pipeline_settings::DefaultRendererSettings;
use truvis_render_interface::texture::{TextureDesc, TexturePool, TextureUsage};
use truvis_scene::components::light::{Light, ShadowMaps};
use truvis_scene::guid_new_type::EntityHandle;
use truvis_scene::scene_manager::SceneManager;

/// 光源需要的 shadow map 与现有的不一致时重建
///
/// 分辨率变化、阴影开关或透明阴影开关变化都会触发重建，旧纹理进入 deletion queue。
/// 返回重建的光源数量。
pub fn ensure_shadow_maps(
    scene: &mut SceneManager,
    lights: &[EntityHandle],
    resolution: u32,
    pool: &mut TexturePool,
    deletion_queue: &mut DeletionQueue,
) -> usize {
    let _span = tracy_client::span!("ensure_shadow_maps");

    let mut recreated = 0;
    for &entity in lights {
        let Some(light) = scene.entity_light(entity).and_then(|h| scene.light_mut(h)) else {
            continue;
        };
        if is_up_to_date(light, resolution) {
            continue;
        }

        let old = light.shadow_maps;
        for texture in [old.depth, old.color].into_iter().flatten() {
            deletion_queue.push_texture(texture);
        }
        light.shadow_maps = create(light, resolution, pool);
        recreated += 1;
    }

    if recreated > 0 {
        log::info!("Recreated shadow maps for {} lights at {}x{}", recreated, resolution, resolution);
    }
    recreated
}

fn is_up_to_date(light: &Light, resolution: u32) -> bool {
    let maps = &light.shadow_maps;
    if !light.has_shadows() {
        return maps.depth.is_none() && maps.color.is_none();
    }
    maps.resolution == resolution
        && maps.depth.is_some()
        && maps.color.is_some() == light.has_transparent_shadows()
}

fn create(light: &Light, resolution: u32, pool: &mut TexturePool) -> ShadowMaps {
    if !light.has_shadows() {
        return ShadowMaps {
            depth: None,
            color: None,
            resolution: 0,
        };
    }

    let slices = light.slice_count();
    let depth = TextureDesc::new_2d(
        "shadow_depth",
        resolution,
        resolution,
        DefaultRendererSettings::SHADOW_DEPTH_FORMAT,
        TextureUsage::DEPTH_STENCIL | TextureUsage::SRV,
    )
    .with_array_layers(slices);
    let color = light.has_transparent_shadows().then(|| {
        TextureDesc::new_2d(
            "shadow_color",
            resolution,
            resolution,
            DefaultRendererSettings::SHADOW_COLOR_FORMAT,
            TextureUsage::RENDER_TARGET | TextureUsage::SRV,
        )
        .with_array_layers(slices)
    });

    ShadowMaps {
        depth: Some(pool.create_render_target(depth)),
        color: color.map(|desc| pool.create_render_target(desc)),
        resolution,
    }
}
