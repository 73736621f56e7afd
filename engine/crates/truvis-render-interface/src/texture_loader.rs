use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender};
use crossbeam_utils::sync::WaitGroup;

use crate::handles::TextureHandle;
use crate::texture::RenderTexture;

/// 导入器已经解码好的纹理，等待生成 mip
pub struct TextureLoadRequest {
    pub texture: Arc<RenderTexture>,
}

/// 加载线程发回渲染线程的 "asset ready" 事件
#[derive(Debug)]
pub enum TextureEvent {
    Ready(TextureHandle),
    Failed(TextureHandle, String),
}

/// 后台纹理准备
///
/// ## 架构
/// - rayon 提供 worker 线程池，执行 `prepare_for_gpu`
/// - crossbeam channel 把完成事件送回渲染线程，每次 tick 统一取出
/// - `WaitGroup` 在 join 时等待所有未完成的任务
pub struct TextureLoader {
    pool: rayon::ThreadPool,
    event_sender: Sender<TextureEvent>,
    event_receiver: Receiver<TextureEvent>,

    in_flight: Arc<AtomicUsize>,
    wait_group: Option<WaitGroup>,
}
// new & init
impl TextureLoader {
    pub fn new(thread_count: usize) -> anyhow::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|index| format!("Texture-Loader-{}", index))
            .build()?;
        let (event_sender, event_receiver) = crossbeam_channel::unbounded();

        Ok(Self {
            pool,
            event_sender,
            event_receiver,
            in_flight: Arc::new(AtomicUsize::new(0)),
            wait_group: Some(WaitGroup::new()),
        })
    }
}
// getters
impl TextureLoader {
    /// 是否有纹理正在后台准备
    #[inline]
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}
// update
impl TextureLoader {
    pub fn request(&self, req: TextureLoadRequest) {
        let Some(wait_group) = self.wait_group.as_ref() else {
            log::error!("TextureLoader already joined, dropping request for \"{}\"", req.texture.name());
            return;
        };
        let wg_task = wait_group.clone();
        let sender = self.event_sender.clone();
        let in_flight = self.in_flight.clone();
        in_flight.fetch_add(1, Ordering::AcqRel);

        self.pool.spawn(move || {
            let event = prepare_texture_task(req);
            if let TextureEvent::Failed(_, reason) = &event {
                log::error!("Texture preparation failed: {}", reason);
            }
            in_flight.fetch_sub(1, Ordering::AcqRel);
            let _ = sender.send(event);

            drop(wg_task);
        });
    }

    /// 取出所有已完成的事件
    pub fn drain_events(&self) -> Vec<TextureEvent> {
        self.event_receiver.try_iter().collect()
    }

    /// 等待所有任务完成
    pub fn join(&mut self) {
        if let Some(wait_group) = self.wait_group.take() {
            wait_group.wait();
        }
    }
}
impl Drop for TextureLoader {
    fn drop(&mut self) {
        log::info!("Dropping TextureLoader, waiting for {} tasks", self.in_flight());
        self.join();
    }
}

/// 运行在 rayon 线程池中：生成 mip -> 标记可用
fn prepare_texture_task(req: TextureLoadRequest) -> TextureEvent {
    let _span = tracy_client::span!("prepare_texture_task");
    let texture = req.texture;
    log::debug!("Preparing texture \"{}\"", texture.name());

    match texture.prepare_for_gpu() {
        Ok(()) => TextureEvent::Ready(texture.handle()),
        Err(e) => TextureEvent::Failed(texture.handle(), format!("{:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{ResourceState, TextureDesc, TexturePool, TextureUsage};
    use ash::vk;

    #[test]
    fn test_events_are_delivered_after_join() {
        tracy_client::Client::start();
        let mut pool = TexturePool::new();
        let good = pool.create_from_data(
            TextureDesc::new_2d("good", 4, 4, vk::Format::R8G8B8A8_UNORM, TextureUsage::SRV).with_mips(3),
            vec![64u8; 4 * 4 * 4],
        );
        let bad = pool.create_from_data(
            TextureDesc::new_2d("bad", 4, 4, vk::Format::R8G8B8A8_UNORM, TextureUsage::SRV),
            vec![0u8; 5],
        );

        let mut loader = TextureLoader::new(2).unwrap();
        for handle in [good, bad] {
            loader.request(TextureLoadRequest {
                texture: pool.get(handle).unwrap().clone(),
            });
        }
        loader.join();

        assert!(!loader.is_loading());
        let events = loader.drain_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| matches!(e, TextureEvent::Ready(h) if *h == good)));
        assert!(events.iter().any(|e| matches!(e, TextureEvent::Failed(h, _) if *h == bad)));
        assert_eq!(pool.get(good).unwrap().state(), ResourceState::PreparedForGpu);
        assert_eq!(pool.get(good).unwrap().mip_count(), 3);
    }
}
