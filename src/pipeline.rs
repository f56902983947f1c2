//! 逐帧处理流水线
//! Per-frame pipeline: detect → track → consume keys → tick → render
//!
//! 单线程同步执行, 每帧一次迭代; 所有可变状态 (选择状态/轨迹) 都
//! 显式存放在流水线对象内, 不经由全局变量传递

use anyhow::Result;
use image::RgbImage;
use std::collections::BTreeSet;

use crate::detection::{active_ids, DetectionSource, Tracker};
use crate::render::{Annotator, FocusRenderer};
use crate::selection::{KeyEvent, SelectionState, Transition};

/// 单帧处理产出: 两路渲染图像 + 控制信息
pub struct FrameOutput {
    /// 整帧标注视图
    pub annotated: RgbImage,
    /// 聚焦视图 (固定尺寸)
    pub focus: RgbImage,
    /// 当前帧的活跃ID集合
    pub active: BTreeSet<u32>,
    /// 退出键已按下, 调用方应在本帧渲染完成后结束循环
    pub quit: bool,
}

/// 聚焦追踪流水线
pub struct FocusPipeline<D, T> {
    detector: D,
    tracker: T,
    selection: SelectionState,
    annotator: Annotator,
    focus_renderer: FocusRenderer,
    /// 仅此类别的检测框进入追踪
    target_class: u32,
}

impl<D: DetectionSource, T: Tracker> FocusPipeline<D, T> {
    pub fn new(
        detector: D,
        tracker: T,
        annotator: Annotator,
        focus_renderer: FocusRenderer,
        target_class: u32,
    ) -> Self {
        Self {
            detector,
            tracker,
            selection: SelectionState::new(),
            annotator,
            focus_renderer,
            target_class,
        }
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// 处理一帧
    ///
    /// `keys` 为本帧采集到的键盘事件, 按到达顺序排列; 事件全部消费
    /// 之后执行一次帧尾节拍, 再渲染两路输出
    pub fn process_frame(&mut self, frame: &RgbImage, keys: &[KeyEvent]) -> Result<FrameOutput> {
        // 1. 检测并过滤目标类别
        let detections: Vec<_> = self
            .detector
            .detect(frame)?
            .into_iter()
            .filter(|d| d.class_id == self.target_class)
            .collect();

        // 2. 追踪更新 (每帧恰好一次, 按时间顺序)
        let tracks = self.tracker.update(&detections);
        let active = active_ids(&tracks);

        // 3. 键盘事件按到达顺序消费
        let mut quit = false;
        for &key in keys {
            match self.selection.apply_key(key, &active) {
                Transition::Selected(id) => println!("🎯 选中目标 ID: {}", id),
                Transition::Rejected(id) => println!("⚠️  目标ID {} 不在当前帧", id),
                Transition::RejectedUnparseable(text) => println!("⚠️  无效的目标ID: {}", text),
                Transition::SelectionCleared => println!("🧹 已清除选中目标与输入缓冲"),
                Transition::QuitRequested => quit = true,
                Transition::Buffered | Transition::BufferCleared | Transition::None => {}
            }
        }

        // 4. 帧尾节拍: 缓冲超时递减
        if self.selection.tick() {
            println!("⏱️  输入超时, 放弃缓冲内容");
        }

        // 5. 渲染两路输出
        let annotated = self.annotator.annotate(frame, &tracks, &self.selection);
        let focus = self
            .focus_renderer
            .render(frame, &tracks, self.selection.selected());

        Ok(FrameOutput {
            annotated,
            focus,
            active,
            quit,
        })
    }
}
