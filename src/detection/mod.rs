//! 检测与追踪系统 (Detection & Tracking System)
//!
//! 两个窄接口隔离外部能力:
//! - DetectionSource: 单帧目标检测 (内置ONNX Runtime实现)
//! - Tracker:         跨帧身份关联 (内置IOU贪心实现)
pub mod detector;
pub mod tracker;
pub mod types;

pub use detector::{non_max_suppression, DetectionSource, YoloDetector};
pub use tracker::{IouTracker, KalmanBoxFilter, Tracker};
pub use types::{active_ids, BBox, Detection, Track};
