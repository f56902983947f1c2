//! 渲染系统 (Rendering System)
//!
//! 每帧产出两张图像:
//! - Annotator:     整帧标注视图 (边框/ID标签/状态栏)
//! - FocusRenderer: 选中目标的聚焦增强视图 (固定尺寸)
pub mod annotator;
pub mod enhance;
pub mod focus;

pub use annotator::Annotator;
pub use focus::FocusRenderer;
