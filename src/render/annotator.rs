//! 帧标注器
//! Frame annotator: per-track markers + status overlay
//!
//! 在整帧上绘制每个追踪目标的边框与ID标签, 选中目标用醒目样式;
//! 顶部两行状态: 活跃ID列表(升序, 超长截断) 与待确认的输入缓冲区

use crate::detection::types::{active_ids, Track};
use crate::selection::SelectionState;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

// ========== 绘制样式 ==========

/// 选中目标: 红框加粗
const SELECTED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const SELECTED_THICKNESS: i32 = 3;

/// 普通目标: 绿框
const DEFAULT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const DEFAULT_THICKNESS: i32 = 2;

const STATUS_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BUFFER_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// 状态栏最多列出的活跃ID个数, 其余折叠为计数
const MAX_LISTED_IDS: usize = 15;

const LABEL_SCALE: f32 = 18.0;
const STATUS_SCALE: f32 = 20.0;

pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// 加载标注字体; 字体缺失时降级为只画框
    pub fn new(font_path: &Path) -> Self {
        let font = match std::fs::read(font_path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => Some(font),
                Err(e) => {
                    eprintln!("⚠️  字体解析失败: {}, 标注将不含文字", e);
                    None
                }
            },
            Err(_) => {
                eprintln!("⚠️  未找到字体文件: {}, 标注将不含文字", font_path.display());
                None
            }
        };
        Self { font }
    }

    /// 生成标注帧 (输入帧不被修改)
    pub fn annotate(&self, frame: &RgbImage, tracks: &[Track], selection: &SelectionState) -> RgbImage {
        let mut canvas = frame.clone();

        for track in tracks.iter().filter(|t| t.frames_lost == 0) {
            let (color, thickness) = if selection.selected() == Some(track.id) {
                (SELECTED_COLOR, SELECTED_THICKNESS)
            } else {
                (DEFAULT_COLOR, DEFAULT_THICKNESS)
            };

            let x = track.bbox.x1.round() as i32;
            let y = track.bbox.y1.round() as i32;
            let w = track.bbox.width().round().max(1.0) as u32;
            let h = track.bbox.height().round().max(1.0) as u32;
            draw_thick_rect(&mut canvas, x, y, w, h, thickness, color);

            // ID标签绘制在框左上角上方
            self.draw_text(
                &mut canvas,
                color,
                x,
                (y - 24).max(0),
                LABEL_SCALE,
                &format!("ID: {}", track.id),
            );
        }

        self.draw_text(&mut canvas, STATUS_COLOR, 10, 30, STATUS_SCALE, &status_line(tracks));

        if !selection.buffer().is_empty() {
            let text = format!("Enter ID: {}_", selection.buffer());
            self.draw_text(&mut canvas, BUFFER_COLOR, 10, 60, STATUS_SCALE, &text);
        }

        canvas
    }

    fn draw_text(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, scale: f32, text: &str) {
        if let Some(font) = &self.font {
            draw_text_mut(canvas, color, x, y, PxScale::from(scale), font, text);
        }
    }
}

/// 多像素线宽: 向内收缩逐圈绘制空心矩形
fn draw_thick_rect(canvas: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, thickness: i32, color: Rgb<u8>) {
    for t in 0..thickness {
        let inset = 2 * t as u32;
        if w <= inset || h <= inset {
            break;
        }
        let rect = Rect::at(x + t, y + t).of_size(w - inset, h - inset);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// 状态栏文本: 升序ID列表 (截断后附加剩余计数) + 总数
fn status_line(tracks: &[Track]) -> String {
    let ids = active_ids(tracks);
    let total = ids.len();
    let listed: Vec<String> = ids.iter().take(MAX_LISTED_IDS).map(|id| id.to_string()).collect();
    let mut text = format!("Active IDs: {}", listed.join(", "));
    if total > MAX_LISTED_IDS {
        text.push_str(&format!(" ... (+{} more)", total - MAX_LISTED_IDS));
    }
    text.push_str(&format!(" | Total Objects: {}", total));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BBox;
    use crate::selection::KeyEvent;
    use std::collections::BTreeSet;

    fn annotator() -> Annotator {
        // 测试环境不依赖字体文件, 文字绘制自动跳过
        Annotator::new(Path::new("/nonexistent/font.ttf"))
    }

    fn track(id: u32, bbox: BBox) -> Track {
        Track {
            id,
            bbox,
            hits: 1,
            frames_lost: 0,
        }
    }

    fn gray_frame(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([50, 50, 50]))
    }

    #[test]
    fn test_annotate_preserves_dimensions_and_input() {
        let frame = gray_frame(64, 48);
        let tracks = vec![track(1, BBox::new(10.0, 10.0, 30.0, 40.0))];
        let out = annotator().annotate(&frame, &tracks, &SelectionState::new());
        assert_eq!(out.dimensions(), (64, 48));
        // 输入帧未被修改
        assert_eq!(*frame.get_pixel(15, 10), Rgb([50, 50, 50]));
    }

    #[test]
    fn test_unselected_track_drawn_green() {
        let frame = gray_frame(64, 48);
        let tracks = vec![track(1, BBox::new(10.0, 10.0, 30.0, 40.0))];
        let out = annotator().annotate(&frame, &tracks, &SelectionState::new());
        assert_eq!(*out.get_pixel(15, 10), DEFAULT_COLOR);
    }

    #[test]
    fn test_selected_track_drawn_red_and_thick() {
        let frame = gray_frame(64, 48);
        let tracks = vec![track(7, BBox::new(10.0, 10.0, 30.0, 40.0))];

        let mut selection = SelectionState::new();
        let active: BTreeSet<u32> = [7].into_iter().collect();
        selection.apply_key(KeyEvent::Digit(7), &active);
        selection.apply_key(KeyEvent::Confirm, &active);

        let out = annotator().annotate(&frame, &tracks, &selection);
        assert_eq!(*out.get_pixel(15, 10), SELECTED_COLOR);
        // 线宽3: 第二圈也是红色
        assert_eq!(*out.get_pixel(15, 11), SELECTED_COLOR);
    }

    #[test]
    fn test_coasting_track_not_drawn() {
        let frame = gray_frame(64, 48);
        let mut t = track(1, BBox::new(10.0, 10.0, 30.0, 40.0));
        t.frames_lost = 2;
        let out = annotator().annotate(&frame, &[t], &SelectionState::new());
        assert_eq!(*out.get_pixel(15, 10), Rgb([50, 50, 50]));
    }

    #[test]
    fn test_status_line_ascending_and_capped() {
        let tracks: Vec<Track> = (1..=20)
            .rev()
            .map(|id| track(id, BBox::new(0.0, 0.0, 5.0, 5.0)))
            .collect();
        let line = status_line(&tracks);
        assert!(line.starts_with("Active IDs: 1, 2, 3"));
        assert!(line.contains("(+5 more)"));
        assert!(line.ends_with("| Total Objects: 20"));
    }

    #[test]
    fn test_status_line_short_list_has_no_remainder() {
        let tracks = vec![
            track(9, BBox::new(0.0, 0.0, 5.0, 5.0)),
            track(3, BBox::new(10.0, 0.0, 15.0, 5.0)),
        ];
        let line = status_line(&tracks);
        assert_eq!(line, "Active IDs: 3, 9 | Total Objects: 2");
    }
}
