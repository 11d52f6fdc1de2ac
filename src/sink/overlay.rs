// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 叠加绘制 (Overlay)
//!
//! 计数线 + 外接框 + 质心轨迹 + ID/HUD 文字, 每帧保存为PNG。
//! 文字需要TTF字体, 未提供时只绘制几何图形。

use super::TickSink;
use crate::error::{CounterError, Result};
use crate::pipeline::{ObjectSnapshot, TickResult};
use crate::detection::TrackState;
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use log::info;
use std::path::{Path, PathBuf};

const LINE_COLOR: Rgb<u8> = Rgb([255, 220, 0]);
/// 本帧有新计数时计数线高亮
const LINE_FLASH_COLOR: Rgb<u8> = Rgb([255, 64, 64]);
const STALE_COLOR: Rgb<u8> = Rgb([128, 128, 128]);
const HUD_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

pub struct OverlayRenderer {
    output_dir: PathBuf,
    line_y: f32,
    font: Option<FontArc>,
    /// 每 N 帧保存一张
    every: u64,
    saved: u64,
}

impl OverlayRenderer {
    pub fn new<P: AsRef<Path>>(output_dir: P, line_y: f32) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;
        info!("🖼️  叠加输出目录: {}", output_dir.display());
        Ok(Self {
            output_dir,
            line_y,
            font: None,
            every: 1,
            saved: 0,
        })
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// 从TTF/OTF文件加载字体
    pub fn with_font_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| {
            CounterError::InvalidConfiguration(format!(
                "无法加载字体 {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(self.with_font(font))
    }

    pub fn with_every(mut self, every: u64) -> Self {
        self.every = every.max(1);
        self
    }

    pub fn saved(&self) -> u64 {
        self.saved
    }

    pub fn frame_path(&self, frame_seq: u64) -> PathBuf {
        self.output_dir.join(format!("frame_{:06}.png", frame_seq))
    }

    /// 在帧上绘制叠加层
    pub fn render(&self, result: &TickResult) -> RgbImage {
        let mut img = result.frame.to_rgb_image();
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return img;
        }

        // 计数线 (3px)
        let line_color = if result.new_crossings.is_empty() {
            LINE_COLOR
        } else {
            LINE_FLASH_COLOR
        };
        for dy in [-1.0f32, 0.0, 1.0] {
            let y = self.line_y + dy;
            draw_line_segment_mut(&mut img, (0.0, y), (w as f32, y), line_color);
        }

        for obj in &result.objects {
            self.draw_object(&mut img, obj);
        }

        if let Some(font) = &self.font {
            let text = format!(
                "Count: {} | Tracks: {} | Frame: {}",
                result.total_count,
                result.objects.len(),
                result.frame_seq
            );
            draw_text_mut(&mut img, HUD_COLOR, 10, 10, PxScale::from(20.0), font, &text);
        }

        img
    }

    fn draw_object(&self, img: &mut RgbImage, obj: &ObjectSnapshot) {
        let color = match obj.state {
            TrackState::Stale => STALE_COLOR,
            _ => Rgb([obj.color.0, obj.color.1, obj.color.2]),
        };

        let rect = Rect::at(obj.bbox.x1 as i32, obj.bbox.y1 as i32)
            .of_size(obj.bbox.width(), obj.bbox.height());
        draw_hollow_rect_mut(img, rect, color);
        if obj.counted {
            // 已计数对象加粗外框
            if obj.bbox.width() > 2 && obj.bbox.height() > 2 {
                let inner = Rect::at(obj.bbox.x1 as i32 + 1, obj.bbox.y1 as i32 + 1)
                    .of_size(obj.bbox.width() - 2, obj.bbox.height() - 2);
                draw_hollow_rect_mut(img, inner, color);
            }
        }

        // 轨迹
        for pair in obj.trail.windows(2) {
            draw_line_segment_mut(img, (pair[0].x, pair[0].y), (pair[1].x, pair[1].y), color);
        }
        draw_filled_circle_mut(
            img,
            (obj.centroid.x.round() as i32, obj.centroid.y.round() as i32),
            3,
            color,
        );

        if let Some(font) = &self.font {
            let label = format!("ID:{}", obj.id);
            let y = (obj.bbox.y1 as i32 - 18).max(0);
            draw_text_mut(img, color, obj.bbox.x1 as i32, y, PxScale::from(16.0), font, &label);
        }
    }
}

impl TickSink for OverlayRenderer {
    fn on_tick(&mut self, result: &TickResult) -> Result<()> {
        if result.frame.is_empty() || result.frame_seq % self.every != 0 {
            return Ok(());
        }
        let path = self.frame_path(result.frame_seq);
        self.render(result).save(&path)?;
        self.saved += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!(
            "🖼️  已保存 {} 张叠加图像到 {}",
            self.saved,
            self.output_dir.display()
        );
        Ok(())
    }
}
