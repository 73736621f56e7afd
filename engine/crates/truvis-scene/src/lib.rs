//! 场景层
//!
//! 实体和组件存放在带代际检查的 slotmap 中；渲染器每帧把实体分类到
//! [`render_buckets::RenderBuckets`]，再由 [`visibility::VisibilityEngine`]
//! 完成视锥剔除、排序和遮挡判定。

pub mod bounds;
pub mod components;
pub mod guid_new_type;
pub mod render_buckets;
pub mod scene_manager;
pub mod visibility;
