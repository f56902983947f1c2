//! 聚焦视图渲染器
//! Focus renderer: zoomed, enhanced view of the selected track
//!
//! 每帧根据选中ID输出一张固定尺寸的聚焦图:
//! - 选中且在场: 外扩裁剪该目标区域, 走全强度增强管线
//! - 未选中/不在场/区域退化: 回退到整帧, 走轻量增强管线
//!
//! 选中ID离场不会被此模块清除, 仅影响当帧的取景

use crate::config::FocusConfig;
use crate::detection::types::{BBox, Track};
use crate::render::enhance::{
    adjust_contrast, bilateral_filter, equalize_luminance, sharpen_3x3, unsharp_mask,
    SHARPEN_LIGHT, SHARPEN_STRONG,
};
use fast_image_resize as fir;
use image::{imageops, RgbImage};

pub struct FocusRenderer {
    config: FocusConfig,
}

impl FocusRenderer {
    pub fn new(config: FocusConfig) -> Self {
        Self { config }
    }

    /// 渲染聚焦视图, 输出恒为 output_size × output_size
    pub fn render(&self, frame: &RgbImage, tracks: &[Track], selected: Option<u32>) -> RgbImage {
        match self.select_roi(frame, tracks, selected) {
            Some(roi) => {
                let region = self.crop(frame, &roi);
                let resized = self.resize_square(&region);
                self.enhance_focus(&resized)
            }
            None => {
                let resized = self.resize_square(frame);
                self.enhance_overview(&resized)
            }
        }
    }

    /// 取景: 选中ID在当前帧在场时返回外扩裁剪后的ROI
    ///
    /// 退化区域 (零面积) 不报错, 静默回退整帧
    fn select_roi(&self, frame: &RgbImage, tracks: &[Track], selected: Option<u32>) -> Option<BBox> {
        let id = selected?;
        let track = tracks.iter().find(|t| t.frames_lost == 0 && t.id == id)?;
        let roi = track
            .bbox
            .expand(self.config.padding_ratio)
            .clamp(frame.width(), frame.height());
        if roi.is_empty() {
            return None;
        }
        Some(roi)
    }

    fn crop(&self, frame: &RgbImage, roi: &BBox) -> RgbImage {
        let x = roi.x1.floor().max(0.0) as u32;
        let y = roi.y1.floor().max(0.0) as u32;
        let w = (roi.x2.ceil() as u32).saturating_sub(x).max(1);
        let h = (roi.y2.ceil() as u32).saturating_sub(y).max(1);
        imageops::crop_imm(frame, x, y, w, h).to_image()
    }

    /// Catmull-Rom卷积缩放到固定输出尺寸
    fn resize_square(&self, img: &RgbImage) -> RgbImage {
        let size = self.config.output_size;
        let fallback = || imageops::resize(img, size, size, imageops::FilterType::CatmullRom);

        let src = match fir::images::Image::from_vec_u8(
            img.width(),
            img.height(),
            img.as_raw().clone(),
            fir::PixelType::U8x3,
        ) {
            Ok(src) => src,
            Err(_) => return fallback(),
        };
        let mut dst = fir::images::Image::new(size, size, fir::PixelType::U8x3);
        let options = fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
        if fir::Resizer::new().resize(&src, &mut dst, &options).is_err() {
            return fallback();
        }
        RgbImage::from_raw(size, size, dst.into_vec()).unwrap_or_else(fallback)
    }

    /// 轻量增强: 降噪 + 亮度均衡 + 轻度锐化
    fn enhance_overview(&self, img: &RgbImage) -> RgbImage {
        let c = &self.config;
        let img = bilateral_filter(
            img,
            c.overview_bilateral_diameter,
            c.overview_bilateral_sigma,
            c.overview_bilateral_sigma,
        );
        let img = equalize_luminance(&img, c.overview_clahe_clip, c.clahe_grid());
        sharpen_3x3(&img, &SHARPEN_LIGHT)
    }

    /// 全强度增强: 降噪 + 亮度均衡 + 反锐化 + 强锐化 + 线性调整
    fn enhance_focus(&self, img: &RgbImage) -> RgbImage {
        let c = &self.config;
        let img = bilateral_filter(
            img,
            c.focus_bilateral_diameter,
            c.focus_bilateral_sigma,
            c.focus_bilateral_sigma,
        );
        let img = equalize_luminance(&img, c.focus_clahe_clip, c.clahe_grid());
        let img = unsharp_mask(&img, c.unsharp_sigma, c.unsharp_base_weight, c.unsharp_mask_weight);
        let img = sharpen_3x3(&img, &SHARPEN_STRONG);
        adjust_contrast(&img, c.final_alpha, c.final_beta)
    }
}
