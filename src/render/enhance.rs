//! 图像增强基元
//! Enhancement primitives for the focus view
//!
//! 对应聚焦渲染管线的各个阶段:
//! - 双边滤波降噪 (保边)
//! - 亮度通道局部直方图均衡 (CLAHE)
//! - 反锐化掩模
//! - 3x3锐化卷积
//! - 线性对比度/亮度调整

use image::{imageops, DynamicImage, Rgb, RgbImage};

// ========== 锐化卷积核 ==========

/// 轻度锐化 (全景视图)
pub const SHARPEN_LIGHT: [f32; 9] = [0.0, -0.5, 0.0, -0.5, 3.0, -0.5, 0.0, -0.5, 0.0];

/// 强锐化 (选中目标视图)
pub const SHARPEN_STRONG: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

// ========== 双边滤波 ==========

/// 保边降噪: 空间高斯 × 颜色高斯加权平均
///
/// `diameter` 为邻域直径 (奇数), `sigma_color`/`sigma_space` 对应
/// 颜色域与空间域的高斯标准差; 颜色距离取三通道绝对差之和
pub fn bilateral_filter(img: &RgbImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let radius = (diameter / 2) as i32;

    // 空间权重 (窗口内固定)
    let side = (2 * radius + 1) as usize;
    let mut space_weight = vec![0.0f32; side * side];
    let space_coeff = -0.5 / (sigma_space * sigma_space);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let idx = ((dy + radius) as usize) * side + (dx + radius) as usize;
            space_weight[idx] = ((dx * dx + dy * dy) as f32 * space_coeff).exp();
        }
    }

    // 颜色权重查找表 (L1距离 0..=765)
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let color_weight: Vec<f32> = (0..=255 * 3)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut out = RgbImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let center = img.get_pixel(x as u32, y as u32).0;
            let mut sum = [0.0f32; 3];
            let mut norm = 0.0f32;

            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let nx = (x + dx).clamp(0, w as i32 - 1) as u32;
                    let ny = (y + dy).clamp(0, h as i32 - 1) as u32;
                    let p = img.get_pixel(nx, ny).0;

                    let dist = (p[0] as i32 - center[0] as i32).unsigned_abs()
                        + (p[1] as i32 - center[1] as i32).unsigned_abs()
                        + (p[2] as i32 - center[2] as i32).unsigned_abs();
                    let sw = space_weight[((dy + radius) as usize) * side + (dx + radius) as usize];
                    let weight = sw * color_weight[dist as usize];

                    sum[0] += p[0] as f32 * weight;
                    sum[1] += p[1] as f32 * weight;
                    sum[2] += p[2] as f32 * weight;
                    norm += weight;
                }
            }

            out.put_pixel(
                x as u32,
                y as u32,
                Rgb([
                    (sum[0] / norm).round().clamp(0.0, 255.0) as u8,
                    (sum[1] / norm).round().clamp(0.0, 255.0) as u8,
                    (sum[2] / norm).round().clamp(0.0, 255.0) as u8,
                ]),
            );
        }
    }
    out
}

// ========== 亮度通道CLAHE ==========

/// 亮度通道局部对比度均衡, 色度保持不变
///
/// RGB → YCbCr 后仅对Y通道做限幅自适应直方图均衡 (CLAHE):
/// 分块统计直方图, 按 `clip_limit` 限幅并均匀回填,
/// 相邻块查找表双线性插值消除块边界
pub fn equalize_luminance(img: &RgbImage, clip_limit: f32, grid: (u32, u32)) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let tile_w = w.div_ceil(grid.0.max(1)).max(1);
    let tile_h = h.div_ceil(grid.1.max(1)).max(1);
    // 实际分块数: 小图下少于请求的网格, 保证每块非空
    let gx = w.div_ceil(tile_w);
    let gy = h.div_ceil(tile_h);

    // 提取亮度/色度平面
    let n_pixels = (w * h) as usize;
    let mut luma = vec![0u8; n_pixels];
    let mut cb = vec![0.0f32; n_pixels];
    let mut cr = vec![0.0f32; n_pixels];
    for (i, p) in img.pixels().enumerate() {
        let [r, g, b] = p.0;
        let (r, g, b) = (r as f32, g as f32, b as f32);
        luma[i] = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
        cb[i] = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
        cr[i] = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    }

    // 每块一张限幅均衡查找表
    let mut luts = vec![[0u8; 256]; (gx * gy) as usize];
    for ty in 0..gy {
        for tx in 0..gx {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[luma[(y * w + x) as usize] as usize] += 1;
                }
            }
            let count = (x1 - x0) * (y1 - y0);

            // 限幅并均匀回填超出部分
            let threshold = ((clip_limit * count as f32 / 256.0).round() as u32).max(1);
            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > threshold {
                    excess += *bin - threshold;
                    *bin = threshold;
                }
            }
            let bonus = excess / 256;
            let rem = (excess % 256) as usize;
            for (v, bin) in hist.iter_mut().enumerate() {
                *bin += bonus + u32::from(v < rem);
            }

            let lut = &mut luts[(ty * gx + tx) as usize];
            let mut cdf = 0u32;
            for v in 0..256 {
                cdf += hist[v];
                lut[v] = ((cdf as f32 * 255.0 / count as f32).round()).clamp(0.0, 255.0) as u8;
            }
        }
    }

    // 按块中心双线性插值查表
    let mut out = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let fx = ((x as f32 + 0.5) / tile_w as f32 - 0.5).clamp(0.0, (gx - 1) as f32);
            let fy = ((y as f32 + 0.5) / tile_h as f32 - 0.5).clamp(0.0, (gy - 1) as f32);
            let tx0 = fx.floor() as u32;
            let ty0 = fy.floor() as u32;
            let tx1 = (tx0 + 1).min(gx - 1);
            let ty1 = (ty0 + 1).min(gy - 1);
            let wx = fx - tx0 as f32;
            let wy = fy - ty0 as f32;

            let v = luma[(y * w + x) as usize] as usize;
            let v00 = luts[(ty0 * gx + tx0) as usize][v] as f32;
            let v01 = luts[(ty0 * gx + tx1) as usize][v] as f32;
            let v10 = luts[(ty1 * gx + tx0) as usize][v] as f32;
            let v11 = luts[(ty1 * gx + tx1) as usize][v] as f32;
            let new_y = v00 * (1.0 - wx) * (1.0 - wy)
                + v01 * wx * (1.0 - wy)
                + v10 * (1.0 - wx) * wy
                + v11 * wx * wy;

            let i = (y * w + x) as usize;
            let (pcb, pcr) = (cb[i] - 128.0, cr[i] - 128.0);
            out.put_pixel(
                x,
                y,
                Rgb([
                    (new_y + 1.402 * pcr).round().clamp(0.0, 255.0) as u8,
                    (new_y - 0.344_136 * pcb - 0.714_136 * pcr).round().clamp(0.0, 255.0) as u8,
                    (new_y + 1.772 * pcb).round().clamp(0.0, 255.0) as u8,
                ]),
            );
        }
    }
    out
}

// ========== 反锐化掩模 ==========

/// 反锐化: 原图减高斯模糊得到掩模, 加权叠加回原图
///
/// out = clamp(base_weight·img + mask_weight·max(img − blur(img, sigma), 0))
pub fn unsharp_mask(img: &RgbImage, sigma: f32, base_weight: f32, mask_weight: f32) -> RgbImage {
    let blurred = imageops::blur(img, sigma);
    let (w, h) = img.dimensions();
    let mut out = RgbImage::new(w, h);
    for (x, y, p) in img.enumerate_pixels() {
        let b = blurred.get_pixel(x, y).0;
        let mut px = [0u8; 3];
        for c in 0..3 {
            let mask = p.0[c].saturating_sub(b[c]) as f32;
            px[c] = (p.0[c] as f32 * base_weight + mask * mask_weight)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
        out.put_pixel(x, y, Rgb(px));
    }
    out
}

// ========== 卷积锐化与线性调整 ==========

/// 3x3锐化卷积
pub fn sharpen_3x3(img: &RgbImage, kernel: &[f32; 9]) -> RgbImage {
    DynamicImage::ImageRgb8(img.clone()).filter3x3(kernel).into_rgb8()
}

/// 线性对比度/亮度调整: out = clamp(alpha·v + beta)
pub fn adjust_contrast(img: &RgbImage, alpha: f32, beta: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut out = RgbImage::new(w, h);
    for (x, y, p) in img.enumerate_pixels() {
        let px = [
            (p.0[0] as f32 * alpha + beta).round().clamp(0.0, 255.0) as u8,
            (p.0[1] as f32 * alpha + beta).round().clamp(0.0, 255.0) as u8,
            (p.0[2] as f32 * alpha + beta).round().clamp(0.0, 255.0) as u8,
        ];
        out.put_pixel(x, y, Rgb(px));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_image(w: u32, h: u32, v: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    fn gradient_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let v = ((x * 7 + y * 13) % 256) as u8;
            Rgb([v, v.wrapping_add(40), v.wrapping_add(90)])
        })
    }

    #[test]
    fn test_bilateral_preserves_dimensions() {
        let img = gradient_image(32, 24);
        let out = bilateral_filter(&img, 7, 40.0, 40.0);
        assert_eq!(out.dimensions(), (32, 24));
    }

    #[test]
    fn test_bilateral_flat_image_unchanged() {
        let img = flat_image(16, 16, 120);
        let out = bilateral_filter(&img, 9, 50.0, 50.0);
        assert_eq!(out, img);
    }

    #[test]
    fn test_equalize_preserves_dimensions() {
        let img = gradient_image(64, 48);
        let out = equalize_luminance(&img, 2.0, (8, 8));
        assert_eq!(out.dimensions(), (64, 48));
    }

    #[test]
    fn test_equalize_flat_image_stays_close() {
        // 限幅回填后均匀图像近似恒等映射
        let img = flat_image(128, 128, 100);
        let out = equalize_luminance(&img, 2.0, (8, 8));
        for p in out.pixels() {
            for c in 0..3 {
                assert!((p.0[c] as i32 - 100).abs() <= 8, "channel drifted: {}", p.0[c]);
            }
        }
    }

    #[test]
    fn test_equalize_smaller_than_grid() {
        let img = gradient_image(5, 3);
        let out = equalize_luminance(&img, 1.5, (8, 8));
        assert_eq!(out.dimensions(), (5, 3));
    }

    #[test]
    fn test_unsharp_flat_image_scales_by_base_weight() {
        // 平坦区域掩模为零, 仅按基础权重放大
        let img = flat_image(20, 20, 100);
        let out = unsharp_mask(&img, 3.0, 1.3, 0.3);
        assert_eq!(out.get_pixel(10, 10).0, [130, 130, 130]);
    }

    #[test]
    fn test_sharpen_preserves_dimensions() {
        let img = gradient_image(30, 30);
        assert_eq!(sharpen_3x3(&img, &SHARPEN_LIGHT).dimensions(), (30, 30));
        assert_eq!(sharpen_3x3(&img, &SHARPEN_STRONG).dimensions(), (30, 30));
    }

    #[test]
    fn test_adjust_contrast_values() {
        let img = flat_image(4, 4, 100);
        let out = adjust_contrast(&img, 1.1, 2.0);
        assert_eq!(out.get_pixel(0, 0).0, [112, 112, 112]);

        // 饱和裁剪
        let bright = flat_image(4, 4, 250);
        let out = adjust_contrast(&bright, 1.1, 2.0);
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_enhancement_is_deterministic() {
        let img = gradient_image(40, 40);
        let a = equalize_luminance(&bilateral_filter(&img, 7, 40.0, 40.0), 1.5, (8, 8));
        let b = equalize_luminance(&bilateral_filter(&img, 7, 40.0, 40.0), 1.5, (8, 8));
        assert_eq!(a, b);
    }
}
