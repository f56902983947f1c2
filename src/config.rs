//! 运行参数与可调配置 - 命令行参数 + JSON文件

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// 目标聚焦命令行参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "目标聚焦 - 交互式多目标追踪查看器", long_about = None)]
pub struct Args {
    /// 输入视频路径
    #[arg(short, long)]
    pub source: String,

    /// 检测模型路径 (ONNX)
    #[arg(short, long, default_value = "models/yolov8m-det.onnx")]
    pub model: String,

    /// 目标类别ID (COCO, 0=person)
    #[arg(long, default_value_t = 0)]
    pub class: u32,

    /// 检测置信度阈值
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// NMS IOU阈值
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// 标注字体文件 (TTF, 缺失时仅画框不绘字)
    #[arg(long, default_value = "assets/font/DejaVuSans.ttf")]
    pub font: String,

    /// 渲染结果保存目录 (不指定则不落盘)
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// 增强/追踪参数配置文件 (JSON)
    #[arg(long, default_value = "focustrack.json")]
    pub config: String,

    /// 打印每帧处理耗时
    #[arg(long)]
    pub profile: bool,
}

/// 聚焦渲染与追踪参数 - 通过JSON文件调整
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FocusConfig {
    // === 聚焦视图 ===
    pub output_size: u32,   // 聚焦视图边长 (固定方形输出)
    pub padding_ratio: f32, // ROI按宽高对称外扩的比例

    // === 全景视图增强 (未选中) ===
    pub overview_bilateral_diameter: u32, // 双边滤波邻域直径
    pub overview_bilateral_sigma: f32,    // 双边滤波颜色/空间sigma
    pub overview_clahe_clip: f32,         // CLAHE限幅系数

    // === 选中目标增强 ===
    pub focus_bilateral_diameter: u32,
    pub focus_bilateral_sigma: f32,
    pub focus_clahe_clip: f32,
    pub unsharp_sigma: f32,       // 反锐化高斯sigma
    pub unsharp_base_weight: f32, // 反锐化原图权重
    pub unsharp_mask_weight: f32, // 反锐化掩模权重
    pub final_alpha: f32,         // 末级线性对比度
    pub final_beta: f32,          // 末级亮度偏移

    // === CLAHE分块 ===
    pub clahe_grid_x: u32,
    pub clahe_grid_y: u32,

    // === 追踪参数 ===
    pub tracker_max_lost_frames: u32, // 轨迹保留的最大丢失帧数
    pub tracker_iou_threshold: f32,   // 关联匹配IOU阈值
    pub tracker_activation_conf: f32, // 新建轨迹的最低置信度
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            // 聚焦视图
            output_size: 400,
            padding_ratio: 0.5,

            // 全景增强
            overview_bilateral_diameter: 7,
            overview_bilateral_sigma: 40.0,
            overview_clahe_clip: 1.5,

            // 选中目标增强
            focus_bilateral_diameter: 9,
            focus_bilateral_sigma: 50.0,
            focus_clahe_clip: 2.0,
            unsharp_sigma: 3.0,
            unsharp_base_weight: 1.3,
            unsharp_mask_weight: 0.3,
            final_alpha: 1.1,
            final_beta: 2.0,

            // CLAHE分块
            clahe_grid_x: 8,
            clahe_grid_y: 8,

            // 追踪
            tracker_max_lost_frames: 30,
            tracker_iou_threshold: 0.3,
            tracker_activation_conf: 0.4,
        }
    }
}

impl FocusConfig {
    /// 从JSON文件加载配置, 不存在则写出默认配置
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    println!("✅ 配置已从 {} 加载", path);
                    config
                }
                Err(e) => {
                    eprintln!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                println!("📝 配置文件不存在, 写出默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    eprintln!("❌ 保存配置失败: {}", e);
                } else {
                    println!("💾 配置已保存到 {}", path);
                }
            }
            Err(e) => eprintln!("❌ 序列化配置失败: {}", e),
        }
    }

    pub fn clahe_grid(&self) -> (u32, u32) {
        (self.clahe_grid_x, self.clahe_grid_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roundtrips_through_json() {
        let config = FocusConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: FocusConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.output_size, 400);
        assert_eq!(back.padding_ratio, 0.5);
        assert_eq!(back.clahe_grid(), (8, 8));
    }
}
