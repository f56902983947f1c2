//! FFmpeg抓帧过滤器
//! Frame grab filter: decoded YUV420P → RGB → bounded channel
//!
//! 通道满时 `send` 阻塞, 解码速度由处理循环反向牵引 (背压);
//! 接收端关闭时返回错误使FFmpeg停止解码

use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};

/// 解码产出的一帧 (紧凑RGB24)
pub struct VideoFrame {
    pub rgb_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// 抓帧过滤器
pub struct GrabFilter {
    tx: Sender<VideoFrame>,
    total_frames: u64,
    dropped_frames: u64,
}

impl GrabFilter {
    pub fn new(tx: Sender<VideoFrame>) -> Self {
        Self {
            tx,
            total_frames: 0,
            dropped_frames: 0,
        }
    }
}

impl FrameFilter for GrabFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        println!("🎬 解码启动");
        Ok(())
    }

    fn filter_frame(&mut self, frame: Frame, _ctx: &FrameFilterContext) -> Result<Option<Frame>, String> {
        unsafe {
            self.total_frames += 1;

            // 空帧/损坏帧直接丢弃
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 || w > 8192 || h > 8192 {
                self.dropped_frames += 1;
                return Ok(None);
            }

            // YUV420P平面指针
            let y_plane = (*frame.as_ptr()).data[0];
            let u_plane = (*frame.as_ptr()).data[1];
            let v_plane = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;

            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.dropped_frames += 1;
                return Ok(None);
            }
            if y_stride < w as usize || uv_stride < (w as usize).div_ceil(2) {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let mut rgb_data = vec![0u8; (w * h * 3) as usize];
            yuv420p_to_rgb(
                y_plane,
                u_plane,
                v_plane,
                y_stride,
                uv_stride,
                &mut rgb_data,
                w as usize,
                h as usize,
            );

            // 接收端关闭 (退出键) 时终止解码
            let packet = VideoFrame {
                rgb_data,
                width: w,
                height: h,
            };
            if self.tx.send(packet).is_err() {
                return Err("frame receiver closed".to_string());
            }

            Ok(Some(frame))
        }
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        println!(
            "🎬 解码结束: 共{}帧, 丢弃{}帧",
            self.total_frames, self.dropped_frames
        );
    }
}

/// YUV420P → RGB24 (BT.601整数近似)
unsafe fn yuv420p_to_rgb(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    buffer: &mut [u8],
    width: usize,
    height: usize,
) {
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
}
