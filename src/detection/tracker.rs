//! 多目标追踪适配器
//! Multi-object tracking behind a narrow per-frame interface
//!
//! 核心只依赖接口契约: 同一物体跨帧保持同一整数ID, 离场的ID被回收
//! 淘汰且不复用。内置实现为 IOU贪心关联 + 恒速卡尔曼平滑, 不追求
//! 复刻任何特定论文算法的数值行为

use crate::config::FocusConfig;
use crate::detection::types::{BBox, Detection, Track};

// ========== 追踪器统一接口 ==========

/// 多目标追踪器
///
/// `update` 每帧恰好调用一次, 且必须按严格时间顺序喂入;
/// 乱序或跳帧会降低ID稳定性, 上层不做补救
pub trait Tracker {
    /// 输入当前帧的检测框, 返回当前帧的轨迹集合 (整体替换上一帧)
    fn update(&mut self, detections: &[Detection]) -> Vec<Track>;

    /// 清除所有轨迹
    fn reset(&mut self);

    /// 当前维护的轨迹数量 (含暂时丢失的)
    fn track_count(&self) -> usize;
}

// ========== 卡尔曼滤波器 ==========

/// 边界框恒速卡尔曼滤波器 (对角协方差简化)
///
/// 状态向量: [cx, cy, w, h, vcx, vcy, vw, vh]
#[derive(Clone, Debug)]
pub struct KalmanBoxFilter {
    state: [f32; 8],
    p: [f32; 8],
    /// 过程噪声
    q: f32,
    /// 观测噪声
    r: f32,
}

impl KalmanBoxFilter {
    pub fn new(bbox: &BBox, q: f32, r: f32) -> Self {
        let (cx, cy) = bbox.center();
        Self {
            state: [cx, cy, bbox.width(), bbox.height(), 0.0, 0.0, 0.0, 0.0],
            p: [10.0; 8],
            q,
            r,
        }
    }

    /// 预测下一帧: 位置按速度外推
    pub fn predict(&mut self) {
        self.state[0] += self.state[4];
        self.state[1] += self.state[5];
        self.state[2] += self.state[6];
        self.state[3] += self.state[7];
        for p in self.p.iter_mut() {
            *p += self.q;
        }
    }

    /// 融合观测值
    pub fn update(&mut self, bbox: &BBox) {
        let (cx, cy) = bbox.center();
        let residual = [
            cx - self.state[0],
            cy - self.state[1],
            bbox.width() - self.state[2],
            bbox.height() - self.state[3],
        ];

        for i in 0..4 {
            let k_pos = self.p[i] / (self.p[i] + self.r);
            // 速度分量观测间接, 增益相应压低
            let k_vel = self.p[i + 4] / (self.p[i + 4] + self.r * 10.0);
            self.state[i] += k_pos * residual[i];
            self.state[i + 4] += k_vel * residual[i];
            self.p[i] *= 1.0 - k_pos;
            self.p[i + 4] *= 1.0 - k_vel;
        }
    }

    /// 当前平滑后的边界框
    pub fn state_bbox(&self) -> BBox {
        let [cx, cy, w, h, ..] = self.state;
        let w = w.max(1.0);
        let h = h.max(1.0);
        BBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    /// 外推一帧后的边界框 (用于关联匹配)
    pub fn predicted_bbox(&self) -> BBox {
        let cx = self.state[0] + self.state[4];
        let cy = self.state[1] + self.state[5];
        let w = (self.state[2] + self.state[6]).max(1.0);
        let h = (self.state[3] + self.state[7]).max(1.0);
        BBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }
}

// ========== IOU追踪器 ==========

struct TrackEntry {
    id: u32,
    kalman: KalmanBoxFilter,
    hits: u32,
    frames_lost: u32,
}

/// IOU贪心关联追踪器
pub struct IouTracker {
    tracks: Vec<TrackEntry>,
    /// 下一个分配的ID (单调递增, 不复用)
    next_id: u32,
    /// 轨迹保留的最大连续丢失帧数
    max_lost_frames: u32,
    /// 关联匹配的最低IOU
    iou_threshold: f32,
    /// 新建轨迹的最低检测置信度
    activation_conf: f32,
}

impl IouTracker {
    pub fn new(max_lost_frames: u32, iou_threshold: f32, activation_conf: f32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_lost_frames,
            iou_threshold,
            activation_conf,
        }
    }

    pub fn from_config(config: &FocusConfig) -> Self {
        Self::new(
            config.tracker_max_lost_frames,
            config.tracker_iou_threshold,
            config.tracker_activation_conf,
        )
    }

    /// 贪心匹配: 按 1-IOU 代价升序逐对占用
    fn associate(&self, detections: &[Detection]) -> Vec<(usize, usize)> {
        let mut candidates = Vec::new();
        for (det_idx, det) in detections.iter().enumerate() {
            for (track_idx, track) in self.tracks.iter().enumerate() {
                let iou = det.bbox.iou(&track.kalman.predicted_bbox());
                if iou >= self.iou_threshold {
                    candidates.push((1.0 - iou, det_idx, track_idx));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut assignments = Vec::new();
        let mut used_det = vec![false; detections.len()];
        let mut used_track = vec![false; self.tracks.len()];
        for (_, det_idx, track_idx) in candidates {
            if !used_det[det_idx] && !used_track[track_idx] {
                assignments.push((det_idx, track_idx));
                used_det[det_idx] = true;
                used_track[track_idx] = true;
            }
        }
        assignments
    }
}

impl Tracker for IouTracker {
    fn update(&mut self, detections: &[Detection]) -> Vec<Track> {
        // 1. 所有轨迹先预测
        for track in &mut self.tracks {
            track.kalman.predict();
        }

        // 2. 检测框与轨迹关联
        let assignments = self.associate(detections);
        let mut matched_det = vec![false; detections.len()];
        let mut matched_track = vec![false; self.tracks.len()];
        for (det_idx, track_idx) in assignments {
            matched_det[det_idx] = true;
            matched_track[track_idx] = true;
            let entry = &mut self.tracks[track_idx];
            entry.kalman.update(&detections[det_idx].bbox);
            entry.hits += 1;
            entry.frames_lost = 0;
        }

        // 3. 未匹配轨迹标记丢失
        for (track_idx, matched) in matched_track.iter().enumerate() {
            if !matched {
                self.tracks[track_idx].frames_lost += 1;
            }
        }

        // 4. 高置信度的未匹配检测新建轨迹
        for (det_idx, det) in detections.iter().enumerate() {
            if !matched_det[det_idx] && det.confidence >= self.activation_conf {
                self.tracks.push(TrackEntry {
                    id: self.next_id,
                    kalman: KalmanBoxFilter::new(&det.bbox, 0.1, 0.5),
                    hits: 1,
                    frames_lost: 0,
                });
                self.next_id += 1;
            }
        }

        // 5. 淘汰丢失过久的轨迹
        let max_lost = self.max_lost_frames;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        self.tracks
            .iter()
            .map(|t| Track {
                id: t.id,
                bbox: t.kalman.state_bbox(),
                hits: t.hits,
                frames_lost: t.frames_lost,
            })
            .collect()
    }

    fn reset(&mut self) {
        // ID保持单调, 重置后也不回收旧ID
        self.tracks.clear();
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }
}
