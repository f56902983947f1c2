//! 视频输入系统 (Video Input System)
//!
//! - GrabFilter:  FFmpeg解码回调, YUV→RGB后推入有界通道
//! - VideoSource: 拉取式读取接口, 码流结束返回None
pub mod decode_filter;
pub mod source;

pub use decode_filter::{GrabFilter, VideoFrame};
pub use source::VideoSource;
