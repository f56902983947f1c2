//! 目标检测适配器
//! Detection adapter: ONNX Runtime backed YOLO inference
//!
//! 核心只消费 `DetectionSource` 接口: 一帧进, 一组带类别/置信度的
//! 检测框出。满足该契约的任何实现均可替换, 包括测试用的确定性桩

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{s, Array, Axis, IxDyn};
use ort::{GraphOptimizationLevel, Session};

use crate::detection::types::{BBox, Detection};

// ========== 检测源接口 ==========

/// 单帧目标检测
pub trait DetectionSource {
    /// 对一帧图像执行检测, 返回未按类别过滤的检测框
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>>;
}

// ========== NMS ==========

/// 非极大值抑制: 按置信度降序贪心保留
pub fn non_max_suppression(detections: &mut Vec<Detection>, iou_threshold: f32) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = 0;
    for index in 0..detections.len() {
        let mut drop = false;
        for prev in 0..keep {
            if detections[prev].bbox.iou(&detections[index].bbox) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            detections.swap(keep, index);
            keep += 1;
        }
    }
    detections.truncate(keep);
}

/// 保持宽高比的缩放比例与目标尺寸
fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

// ========== YOLO检测器 ==========

/// 基于ONNX Runtime的YOLO检测器 (CPU推理)
pub struct YoloDetector {
    session: Session,
    input_name: String,
    output_name: String,
    /// 模型方形输入边长
    input_size: u32,
    conf_threshold: f32,
    iou_threshold: f32,
}

impl YoloDetector {
    pub fn new(model_path: &str, input_size: u32, conf_threshold: f32, iou_threshold: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .with_context(|| format!("加载检测模型失败: {}", model_path))?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("模型没有输入张量定义")?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .context("模型没有输出张量定义")?;

        println!("✅ 检测模型加载成功: {} (输入 {}x{}px)", model_path, input_size, input_size);

        Ok(Self {
            session,
            input_name,
            output_name,
            input_size,
            conf_threshold,
            iou_threshold,
        })
    }

    /// 预处理: 保持宽高比缩放 + 灰边填充 → NCHW归一化张量
    fn preprocess(&self, frame: &RgbImage) -> Array<f32, IxDyn> {
        let size = self.input_size;
        let img = DynamicImage::ImageRgb8(frame.clone());
        let (w0, h0) = img.dimensions();
        let (_, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, size as f32, size as f32);
        let resized = img.resize_exact(w_new as u32, h_new as u32, image::imageops::FilterType::Triangle);

        let mut input = Array::ones((1, 3, size as usize, size as usize)).into_dyn();
        input.fill(144.0 / 255.0);
        for (x, y, rgb) in resized.pixels() {
            let x = x as usize;
            let y = y as usize;
            let [r, g, b, _] = rgb.0;
            input[[0, 0, y, x]] = (r as f32) / 255.0;
            input[[0, 1, y, x]] = (g as f32) / 255.0;
            input[[0, 2, y, x]] = (b as f32) / 255.0;
        }
        input
    }

    /// 后处理: (1, 4+nc, anchors) → 帧坐标检测框
    fn postprocess(&self, output: &Array<f32, IxDyn>, frame_w: u32, frame_h: u32) -> Vec<Detection> {
        const CXYWH_OFFSET: usize = 4;
        let nc = output.shape()[1].saturating_sub(CXYWH_OFFSET);
        let ratio = (self.input_size as f32 / frame_w as f32).min(self.input_size as f32 / frame_h as f32);

        let mut detections = Vec::new();
        for anchor in output.axis_iter(Axis(0)) {
            for pred in anchor.axis_iter(Axis(1)) {
                let bbox = pred.slice(s![0..CXYWH_OFFSET]);
                let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

                let Some((class_id, &confidence)) = clss
                    .into_iter()
                    .enumerate()
                    .reduce(|max, x| if x.1 > max.1 { x } else { max })
                else {
                    continue;
                };
                if confidence < self.conf_threshold {
                    continue;
                }

                let cx = bbox[0] / ratio;
                let cy = bbox[1] / ratio;
                let w = bbox[2] / ratio;
                let h = bbox[3] / ratio;
                let x1 = (cx - w / 2.0).clamp(0.0, frame_w as f32);
                let y1 = (cy - h / 2.0).clamp(0.0, frame_h as f32);
                let x2 = (cx + w / 2.0).clamp(0.0, frame_w as f32);
                let y2 = (cy + h / 2.0).clamp(0.0, frame_h as f32);

                detections.push(Detection::new(
                    BBox::new(x1, y1, x2, y2),
                    confidence,
                    class_id as u32,
                ));
            }
        }

        non_max_suppression(&mut detections, self.iou_threshold);
        detections
    }
}

impl DetectionSource for YoloDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let input = self.preprocess(frame);
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input.view()]?)
            .context("模型推理失败")?;
        let output = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .context("提取模型输出失败")?
            .to_owned();
        Ok(self.postprocess(&output, frame.width(), frame.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, conf: f32) -> Detection {
        Detection::new(BBox::new(x1, y1, x2, y2), conf, 0)
    }

    #[test]
    fn test_nms_keeps_highest_confidence() {
        let mut dets = vec![
            det(0.0, 0.0, 100.0, 100.0, 0.6),
            det(5.0, 5.0, 105.0, 105.0, 0.9),
            det(2.0, 2.0, 102.0, 102.0, 0.7),
        ];
        non_max_suppression(&mut dets, 0.45);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_disjoint_boxes() {
        let mut dets = vec![
            det(0.0, 0.0, 50.0, 50.0, 0.9),
            det(200.0, 200.0, 250.0, 250.0, 0.8),
            det(400.0, 0.0, 450.0, 50.0, 0.7),
        ];
        non_max_suppression(&mut dets, 0.45);
        assert_eq!(dets.len(), 3);
    }

    #[test]
    fn test_nms_empty_input() {
        let mut dets: Vec<Detection> = Vec::new();
        non_max_suppression(&mut dets, 0.45);
        assert!(dets.is_empty());
    }

    #[test]
    fn test_scale_wh_keeps_aspect() {
        let (r, w, h) = scale_wh(1280.0, 720.0, 640.0, 640.0);
        assert!((r - 0.5).abs() < 1e-6);
        assert_eq!(w, 640.0);
        assert_eq!(h, 360.0);
    }
}
