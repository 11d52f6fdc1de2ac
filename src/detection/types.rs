// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 运动检测数据结构定义
/// Data structures for the motion counting core
use image::{GrayImage, Luma};
use serde::Serialize;

/// 前景像素值
pub const FOREGROUND: u8 = 255;
/// 背景像素值
pub const BACKGROUND: u8 = 0;

#[derive(Debug, PartialEq, Clone, Copy, Default, Serialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// 相对计数线的位置 (y 轴向下)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSide {
    Above,
    On,
    Below,
}

/// 轴对齐外接框 (像素坐标, 包含两端)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1 + 1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1 + 1
    }

    pub fn area(&self) -> u32 {
        self.width() * self.height()
    }

    /// 宽高比 (w / h)
    pub fn aspect_ratio(&self) -> f32 {
        self.width() as f32 / self.height() as f32
    }

    /// 扩展以包含像素 (x, y)
    pub fn include(&mut self, x: u32, y: u32) {
        self.x1 = self.x1.min(x);
        self.y1 = self.y1.min(y);
        self.x2 = self.x2.max(x);
        self.y2 = self.y2.max(y);
    }
}

/// 单帧前景连通区域
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blob {
    /// 面积加权质心
    pub centroid: Point2,
    pub bbox: BoundingBox,
    /// 像素面积
    pub area: u32,
}

/// 二值前景掩码, 与输入帧同尺寸 (255 = 运动像素)
#[derive(Clone, Debug)]
pub struct ForegroundMask {
    image: GrayImage,
}

impl ForegroundMask {
    /// 全背景掩码
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, Luma([BACKGROUND])),
        }
    }

    /// 从灰度图构建, 非零视为前景
    pub fn from_image(mut image: GrayImage) -> Self {
        for p in image.pixels_mut() {
            p.0[0] = if p.0[0] != BACKGROUND { FOREGROUND } else { BACKGROUND };
        }
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y)[0] == FOREGROUND
    }

    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        let value = if foreground { FOREGROUND } else { BACKGROUND };
        self.image.put_pixel(x, y, Luma([value]));
    }

    /// 前景像素数
    pub fn count(&self) -> usize {
        self.image.pixels().filter(|p| p.0[0] == FOREGROUND).count()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }
}
