use crate::handles::TextureHandle;
use crate::texture::TexturePool;

/// 延迟删除的 GPU 资源
///
/// 被替换的资源可能还被在途的帧引用，只有在同步点等待所有队列之后才能真正释放。
#[derive(Default)]
pub struct DeletionQueue {
    textures: Vec<TextureHandle>,
}
impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push_texture(&mut self, handle: TextureHandle) {
        self.textures.push(handle);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// 释放所有排队的资源，调用前必须已经等待 GPU 空闲
    pub fn parse(&mut self, pool: &mut TexturePool) -> usize {
        let _span = tracy_client::span!("DeletionQueue::parse");
        let count = self.textures.len();
        for handle in self.textures.drain(..) {
            if pool.remove(handle).is_none() {
                log::warn!("Deletion queue held a stale texture handle {:?}", handle);
            }
        }
        log::debug!("Released {} deferred textures", count);
        count
    }
}
