//! 渲染结果落盘
//! Optional frame sink: annotated frame + focus view as an image sequence

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// 本地时间戳字符串, 用于会话目录命名
fn gen_time_string(delimiter: &str) -> String {
    let fmt = format!("%Y{}%m{}%d{}%H{}%M{}%S", delimiter, delimiter, delimiter, delimiter, delimiter);
    chrono::Local::now().format(&fmt).to_string()
}

/// 图像序列写出器
///
/// 启动时创建一次会话目录, 随流水线每帧写出两张图;
/// 与输入句柄一样在所有退出路径上随作用域释放
pub struct FrameSink {
    dir: PathBuf,
    frame_index: u64,
}

impl FrameSink {
    pub fn create(base: &Path) -> Result<Self> {
        let dir = base.join(format!("session_{}", gen_time_string("-")));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("创建输出目录失败: {}", dir.display()))?;
        println!("💾 渲染结果保存到: {}", dir.display());
        Ok(Self {
            dir,
            frame_index: 0,
        })
    }

    /// 写出一帧的两路输出
    pub fn write(&mut self, annotated: &RgbImage, focus: &RgbImage) -> Result<()> {
        let frame_path = self.dir.join(format!("frame_{:06}.png", self.frame_index));
        let focus_path = self.dir.join(format!("focus_{:06}.png", self.frame_index));
        annotated
            .save(&frame_path)
            .with_context(|| format!("保存标注帧失败: {}", frame_path.display()))?;
        focus
            .save(&focus_path)
            .with_context(|| format!("保存聚焦帧失败: {}", focus_path.display()))?;
        self.frame_index += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frame_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_sink_writes_numbered_pairs() {
        let base = std::env::temp_dir().join(format!("focustrack_sink_test_{}", std::process::id()));
        let mut sink = FrameSink::create(&base).unwrap();

        let annotated = RgbImage::from_pixel(32, 24, Rgb([10, 20, 30]));
        let focus = RgbImage::from_pixel(16, 16, Rgb([40, 50, 60]));
        sink.write(&annotated, &focus).unwrap();
        sink.write(&annotated, &focus).unwrap();

        assert_eq!(sink.frames_written(), 2);
        assert!(sink.dir.join("frame_000000.png").exists());
        assert!(sink.dir.join("focus_000001.png").exists());

        std::fs::remove_dir_all(&base).unwrap();
    }
}
