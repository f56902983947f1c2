//! 视频输入源
//! Pull-style video source backed by an FFmpeg decode worker
//!
//! FFmpeg回调式解码在独立线程运行, 帧经有界通道转为拉取式读取,
//! 处理循环保持单线程同步语义; 输入句柄启动时获取一次,
//! 所有退出路径 (正常结束/退出键/读取失败) 都恰好释放一次

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use std::thread::JoinHandle;

use super::decode_filter::{GrabFilter, VideoFrame};

/// 帧通道容量: 解码最多超前处理循环的帧数
const FRAME_QUEUE_DEPTH: usize = 4;

pub struct VideoSource {
    rx: Option<Receiver<VideoFrame>>,
    worker: Option<JoinHandle<()>>,
}

impl VideoSource {
    /// 打开视频并启动解码
    ///
    /// 输入无法打开是启动期致命错误, 直接返回Err而不进入处理循环;
    /// 打开成功后码流耗尽由 `next_frame` 返回None表示, 属正常结束
    pub fn open(path: &str) -> Result<Self> {
        let (tx, rx) = bounded(FRAME_QUEUE_DEPTH);
        let (status_tx, status_rx) = bounded::<Result<(), String>>(1);
        let source = path.to_string();

        let worker = std::thread::spawn(move || {
            let filter = GrabFilter::new(tx);
            let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
            let pipe = pipe.filter("grab", Box::new(filter));
            let out = create_null_output().add_frame_pipeline(pipe);

            let ctx = match FfmpegContext::builder()
                .input(Input::new(source.as_str()))
                .filter_descs(["format=yuv420p"].into())
                .output(out)
                .build()
            {
                Ok(ctx) => ctx,
                Err(e) => {
                    let _ = status_tx.send(Err(format!("构建解码上下文失败: {}", e)));
                    return;
                }
            };

            let scheduler = match ctx.start() {
                Ok(s) => s,
                Err(e) => {
                    let _ = status_tx.send(Err(format!("启动解码失败: {}", e)));
                    return;
                }
            };

            let _ = status_tx.send(Ok(()));
            let _ = scheduler.wait();
        });

        match status_rx.recv() {
            Ok(Ok(())) => {
                println!("📹 视频已打开: {}", path);
                Ok(Self {
                    rx: Some(rx),
                    worker: Some(worker),
                })
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(anyhow!(e)).with_context(|| format!("无法打开视频: {}", path))
            }
            Err(_) => {
                let _ = worker.join();
                Err(anyhow!("解码线程异常退出")).with_context(|| format!("无法打开视频: {}", path))
            }
        }
    }

    /// 阻塞读取下一帧; 码流结束返回None
    pub fn next_frame(&self) -> Option<VideoFrame> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        // 先关闭接收端: 解码过滤器的下一次send失败, FFmpeg随之停止
        self.rx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
