//! 检测与追踪数据结构定义
//! Data structures shared by the detection and tracking stages

use std::collections::BTreeSet;

// ========== 数据结构 ==========

/// 边界框 (帧像素坐标, x1<x2, y1<y2)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// 中心点
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// 宽高为零或为负的退化框
    pub fn is_empty(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// 按宽高比例对称外扩
    pub fn expand(&self, ratio: f32) -> Self {
        let pad_x = self.width() * ratio;
        let pad_y = self.height() * ratio;
        Self {
            x1: self.x1 - pad_x,
            y1: self.y1 - pad_y,
            x2: self.x2 + pad_x,
            y2: self.y2 + pad_y,
        }
    }

    /// 裁剪到帧边界内
    pub fn clamp(&self, frame_w: u32, frame_h: u32) -> Self {
        Self {
            x1: self.x1.max(0.0),
            y1: self.y1.max(0.0),
            x2: self.x2.min(frame_w as f32),
            y2: self.y2.min(frame_h as f32),
        }
    }

    pub fn intersection_area(&self, other: &BBox) -> f32 {
        let l = self.x1.max(other.x1);
        let r = self.x2.min(other.x2);
        let t = self.y1.max(other.y1);
        let b = self.y2.min(other.y2);
        (r - l).max(0.0) * (b - t).max(0.0)
    }

    /// IOU (Intersection over Union)
    pub fn iou(&self, other: &BBox) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }
}

/// 单帧检测结果 (每帧重新生成, 不跨帧保留)
#[derive(Clone, Debug)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class_id: u32,
}

impl Detection {
    pub fn new(bbox: BBox, confidence: f32, class_id: u32) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }
}

/// 追踪对象 (带持久化ID)
///
/// 同一物体跨帧保持同一ID; ID在物体活跃期间不会被复用
#[derive(Clone, Debug)]
pub struct Track {
    /// 唯一追踪ID
    pub id: u32,

    /// 当前边界框 (滤波平滑后)
    pub bbox: BBox,

    /// 连续命中帧数
    pub hits: u32,

    /// 连续丢失帧数 (0 = 本帧可见)
    pub frames_lost: u32,
}

/// 当前帧的活跃ID集合 (有序, 便于状态栏升序显示)
pub fn active_ids(tracks: &[Track]) -> BTreeSet<u32> {
    tracks
        .iter()
        .filter(|t| t.frames_lost == 0)
        .map(|t| t.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_dimensions() {
        let b = BBox::new(10.0, 20.0, 50.0, 80.0);
        assert_eq!(b.width(), 40.0);
        assert_eq!(b.height(), 60.0);
        assert_eq!(b.area(), 2400.0);
        assert!(!b.is_empty());
    }

    #[test]
    fn test_bbox_empty() {
        assert!(BBox::new(10.0, 10.0, 10.0, 30.0).is_empty());
        assert!(BBox::new(10.0, 10.0, 5.0, 30.0).is_empty());
        assert_eq!(BBox::new(10.0, 10.0, 5.0, 30.0).area(), 0.0);
    }

    #[test]
    fn test_bbox_expand_and_clamp() {
        let b = BBox::new(100.0, 100.0, 200.0, 300.0);
        let e = b.expand(0.5);
        assert_eq!(e.x1, 50.0);
        assert_eq!(e.y1, 0.0);
        assert_eq!(e.x2, 250.0);
        assert_eq!(e.y2, 400.0);

        let c = e.clamp(240, 350);
        assert_eq!(c.x1, 50.0);
        assert_eq!(c.y1, 0.0);
        assert_eq!(c.x2, 240.0);
        assert_eq!(c.y2, 350.0);
    }

    #[test]
    fn test_bbox_clamp_can_empty() {
        // 完全在帧外的框裁剪后变为退化框
        let b = BBox::new(-50.0, -50.0, -10.0, -10.0);
        let c = b.clamp(640, 480);
        assert!(c.is_empty());
    }

    #[test]
    fn test_iou_identical() {
        let b = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(b.iou(&a), 0.0);
    }

    #[test]
    fn test_iou_symmetry() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 15.0, 15.0);
        assert!((a.iou(&b) - b.iou(&a)).abs() < 1e-6);
        assert!(a.iou(&b) > 0.0 && a.iou(&b) < 1.0);
    }

    #[test]
    fn test_active_ids_excludes_coasting() {
        let tracks = vec![
            Track {
                id: 3,
                bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
                hits: 5,
                frames_lost: 0,
            },
            Track {
                id: 7,
                bbox: BBox::new(20.0, 20.0, 30.0, 30.0),
                hits: 2,
                frames_lost: 1,
            },
            Track {
                id: 1,
                bbox: BBox::new(40.0, 40.0, 50.0, 50.0),
                hits: 9,
                frames_lost: 0,
            },
        ];
        let ids = active_ids(&tracks);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }
}
