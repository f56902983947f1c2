//! 目标聚焦查看器 (FocusTrack Viewer)
//!
//! 主窗口左侧为标注全景, 右侧为选中目标的聚焦视图
//!
//! 按键:
//! - 数字0-9: 输入目标ID (多位数字缓冲)
//! - 回车:    确认选中
//! - 退格/ESC: 放弃输入
//! - C:       清除选中
//! - Q:       退出

use std::path::Path;
use std::time::Instant;

use clap::Parser;
use image::RgbImage;
use macroquad::prelude::*;
use mimalloc::MiMalloc;

use focustrack_rs::class_name;
use focustrack_rs::config::{Args, FocusConfig};
use focustrack_rs::detection::{IouTracker, YoloDetector};
use focustrack_rs::input::VideoSource;
use focustrack_rs::output::FrameSink;
use focustrack_rs::pipeline::FocusPipeline;
use focustrack_rs::render::{Annotator, FocusRenderer};
use focustrack_rs::selection::KeyEvent;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 检测模型推理输入尺寸
const INF_SIZE: u32 = 640;

/// 聚焦视图在窗口右侧占用的宽度
const FOCUS_PANEL_WIDTH: f32 = 420.0;

fn window_conf() -> Conf {
    Conf {
        window_title: "目标聚焦".to_owned(),
        window_width: 1200,
        window_height: 700,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = FocusConfig::load(&args.config);

    println!("🚀 目标聚焦启动");
    println!("📦 检测模型: {}", args.model);
    println!("🏷️  目标类别: {} ({})", args.class, class_name(args.class));
    println!("📹 输入视频: {}", args.source);
    println!("⌨️  按键: 数字=输入ID  回车=确认  退格/ESC=取消  C=清除选中  Q=退出");
    println!();

    // 输入无法打开属启动期致命错误, 在进入主循环前直接退出
    let source = VideoSource::open(&args.source)?;
    let detector = YoloDetector::new(&args.model, INF_SIZE, args.conf, args.iou)?;
    let tracker = IouTracker::from_config(&config);
    let annotator = Annotator::new(Path::new(&args.font));
    let focus_renderer = FocusRenderer::new(config.clone());
    let mut pipeline = FocusPipeline::new(detector, tracker, annotator, focus_renderer, args.class);

    let mut sink = match &args.save_dir {
        Some(dir) => Some(FrameSink::create(dir)?),
        None => None,
    };

    let mut frame_texture: Option<Texture2D> = None;
    let mut focus_texture: Option<Texture2D> = None;
    let mut frame_count: u64 = 0;

    loop {
        // 1. 读取下一帧 (码流结束属正常退出)
        let Some(video_frame) = source.next_frame() else {
            println!("🏁 视频结束");
            break;
        };
        let Some(frame) =
            RgbImage::from_raw(video_frame.width, video_frame.height, video_frame.rgb_data)
        else {
            eprintln!("❌ 帧数据与分辨率不符, 停止处理");
            break;
        };

        // 2. 采集本帧键盘事件
        let keys = collect_key_events();

        // 3. 流水线处理
        let t_start = Instant::now();
        let output = pipeline.process_frame(&frame, &keys)?;
        if args.profile {
            println!(
                "⏱️  帧 {} 处理耗时 {:.1}ms, 活跃目标 {}",
                frame_count,
                t_start.elapsed().as_secs_f64() * 1000.0,
                output.active.len()
            );
        }

        // 4. 可选落盘
        if let Some(sink) = &mut sink {
            sink.write(&output.annotated, &output.focus)?;
        }

        // 5. 上传纹理并绘制
        upload_texture(&mut frame_texture, &output.annotated);
        upload_texture(&mut focus_texture, &output.focus);

        clear_background(Color::from_rgba(20, 20, 30, 255));
        if let Some(texture) = &frame_texture {
            draw_fit_left(texture);
        }
        if let Some(texture) = &focus_texture {
            let x = screen_width() - FOCUS_PANEL_WIDTH + 10.0;
            draw_texture_ex(
                texture,
                x,
                10.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(400.0, 400.0)),
                    ..Default::default()
                },
            );
        }

        frame_count += 1;
        let quit_requested = output.quit;

        // 帧渲染呈现后再退出, 不在渲染中途中断
        next_frame().await;
        if quit_requested {
            println!("👋 收到退出指令");
            break;
        }
    }

    if let Some(sink) = &sink {
        println!("💾 共落盘 {} 帧", sink.frames_written());
    }
    println!("✅ 处理结束, 共 {} 帧", frame_count);
    Ok(())
}

/// 采集本帧键盘事件
///
/// 数字/字母经字符队列读取以保持到达顺序, 功能键单独查询
fn collect_key_events() -> Vec<KeyEvent> {
    let mut keys = Vec::new();
    while let Some(ch) = get_char_pressed() {
        match ch {
            '0'..='9' => keys.push(KeyEvent::Digit(ch as u8 - b'0')),
            'c' | 'C' => keys.push(KeyEvent::ClearSelection),
            'q' | 'Q' => keys.push(KeyEvent::Quit),
            _ => {}
        }
    }
    if is_key_pressed(KeyCode::Enter) {
        keys.push(KeyEvent::Confirm);
    }
    if is_key_pressed(KeyCode::Backspace) || is_key_pressed(KeyCode::Escape) {
        keys.push(KeyEvent::Cancel);
    }
    keys
}

/// 更新纹理: 分辨率不变时只刷新像素数据, 避免重新分配显存
fn upload_texture(texture: &mut Option<Texture2D>, img: &RgbImage) {
    let rgba = rgb_to_rgba(img);
    let needs_rebuild = match texture {
        Some(t) => t.width() != img.width() as f32 || t.height() != img.height() as f32,
        None => true,
    };

    if needs_rebuild {
        let t = Texture2D::from_rgba8(img.width() as u16, img.height() as u16, &rgba);
        t.set_filter(FilterMode::Linear);
        *texture = Some(t);
    } else if let Some(t) = texture {
        t.update(&Image {
            bytes: rgba,
            width: img.width() as u16,
            height: img.height() as u16,
        });
    }
}

fn rgb_to_rgba(img: &RgbImage) -> Vec<u8> {
    let mut rgba = Vec::with_capacity((img.width() * img.height() * 4) as usize);
    for p in img.pixels() {
        rgba.extend_from_slice(&[p.0[0], p.0[1], p.0[2], 255]);
    }
    rgba
}

/// 标注全景等比缩放绘制在窗口左侧区域
fn draw_fit_left(texture: &Texture2D) {
    let area_w = (screen_width() - FOCUS_PANEL_WIDTH).max(1.0);
    let area_h = screen_height();
    let scale = (area_w / texture.width()).min(area_h / texture.height());
    let w = texture.width() * scale;
    let h = texture.height() * scale;
    draw_texture_ex(
        texture,
        (area_w - w) / 2.0,
        (area_h - h) / 2.0,
        WHITE,
        DrawTextureParams {
            dest_size: Some(vec2(w, h)),
            ..Default::default()
        },
    );
}
