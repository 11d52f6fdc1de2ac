// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 合成场景帧源
//! Constant background with moving rectangles and optional uniform noise

use super::FrameSource;
use crate::error::Result;
use crate::frame::Frame;
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;

/// 匀速运动的矩形
///
/// 位置按帧序号计算: 左上角 = (x + vx·t, y + vy·t)
#[derive(Clone, Debug)]
pub struct MovingRect {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: u32,
    pub height: u32,
    pub color: [u8; 3],
    /// 出现的帧范围
    pub visible: Range<u64>,
    /// 被遮挡 (不绘制) 的帧范围
    pub occluded: Option<Range<u64>>,
}

impl MovingRect {
    pub fn new(x: f32, y: f32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            width,
            height,
            color: [230, 230, 230],
            visible: 0..u64::MAX,
            occluded: None,
        }
    }

    pub fn with_velocity(mut self, vx: f32, vy: f32) -> Self {
        self.vx = vx;
        self.vy = vy;
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_visible(mut self, visible: Range<u64>) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_occlusion(mut self, occluded: Range<u64>) -> Self {
        self.occluded = Some(occluded);
        self
    }

    fn is_drawn(&self, t: u64) -> bool {
        self.visible.contains(&t) && !self.occluded.as_ref().is_some_and(|r| r.contains(&t))
    }

    /// 第 t 帧的几何中心
    pub fn center_at(&self, t: u64) -> (f32, f32) {
        (
            self.x + self.vx * t as f32 + self.width as f32 / 2.0,
            self.y + self.vy * t as f32 + self.height as f32 / 2.0,
        )
    }

    fn draw(&self, img: &mut RgbImage, t: u64) {
        let x0 = (self.x + self.vx * t as f32).round() as i64;
        let y0 = (self.y + self.vy * t as f32).round() as i64;
        let (w, h) = (img.width() as i64, img.height() as i64);

        for y in y0.max(0)..(y0 + self.height as i64).min(h) {
            for x in x0.max(0)..(x0 + self.width as i64).min(w) {
                img.put_pixel(x as u32, y as u32, Rgb(self.color));
            }
        }
    }
}

pub struct SyntheticScene {
    width: u32,
    height: u32,
    background: [u8; 3],
    rects: Vec<MovingRect>,
    frames: u64,
    next: u64,
    noise: u8,
    rng: StdRng,
}

impl SyntheticScene {
    pub fn new(width: u32, height: u32, frames: u64) -> Self {
        Self {
            width,
            height,
            background: [40, 40, 40],
            rects: Vec::new(),
            frames,
            next: 0,
            noise: 0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// 演示场景: 两个目标自上而下穿过画面中线, 第三个反向运动
    pub fn demo(width: u32, height: u32, frames: u64) -> Self {
        let h = height as f32;
        let w = width as f32;
        let speed = h / frames.max(1) as f32 * 1.5;
        Self::new(width, height, frames)
            .with_rect(
                MovingRect::new(w * 0.2, -h * 0.1, 40, 60)
                    .with_velocity(0.0, speed)
                    .with_color([220, 80, 80]),
            )
            .with_rect(
                MovingRect::new(w * 0.6, -h * 0.3, 50, 50)
                    .with_velocity(0.5, speed)
                    .with_color([80, 220, 80]),
            )
            .with_rect(
                MovingRect::new(w * 0.4, h * 0.9, 45, 45)
                    .with_velocity(0.0, -speed * 0.8)
                    .with_color([80, 80, 230]),
            )
            .with_noise(6, 42)
    }

    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.background = background;
        self
    }

    pub fn with_rect(mut self, rect: MovingRect) -> Self {
        self.rects.push(rect);
        self
    }

    /// 每像素叠加 [-amplitude, amplitude] 的均匀噪声 (固定种子, 可复现)
    pub fn with_noise(mut self, amplitude: u8, seed: u64) -> Self {
        self.noise = amplitude;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn rects(&self) -> &[MovingRect] {
        &self.rects
    }

    /// 渲染第 t 帧
    pub fn render(&mut self, t: u64) -> RgbImage {
        let mut img = RgbImage::from_pixel(self.width, self.height, Rgb(self.background));
        for rect in self.rects.iter().filter(|r| r.is_drawn(t)) {
            rect.draw(&mut img, t);
        }

        if self.noise > 0 {
            let amplitude = self.noise as i16;
            for px in img.pixels_mut() {
                let delta: i16 = self.rng.gen_range(-amplitude..=amplitude);
                for c in px.0.iter_mut() {
                    *c = (*c as i16 + delta).clamp(0, 255) as u8;
                }
            }
        }
        img
    }
}

impl FrameSource for SyntheticScene {
    fn next_frame(&mut self) -> Option<Result<Frame>> {
        if self.next >= self.frames {
            return None;
        }
        let t = self.next;
        self.next += 1;
        Some(Ok(Frame::from_rgb(t, self.render(t))))
    }

    fn describe(&self) -> String {
        format!(
            "synthetic {}x{} ({} objects, {} frames)",
            self.width,
            self.height,
            self.rects.len(),
            self.frames
        )
    }
}
