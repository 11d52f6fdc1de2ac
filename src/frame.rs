// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 视频帧 (Frame)
//!
//! 外部解码后交给流水线的只读像素网格, 附带单调递增的帧序号。

use crate::error::{CounterError, FrameShape, Result};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// 一帧图像 (交错存储, 每像素 `channels` 个字节)
#[derive(Clone, Debug)]
pub struct Frame {
    seq: u64,
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Frame {
    /// 创建帧, 校验缓冲区长度
    ///
    /// 支持 1 (灰度) / 3 (RGB) / 4 (RGBA) 通道。
    pub fn new(seq: u64, width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(CounterError::UnsupportedChannels(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(CounterError::FrameBuffer {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            seq,
            width,
            height,
            channels,
            data,
        })
    }

    pub fn from_gray(seq: u64, image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            seq,
            width,
            height,
            channels: 1,
            data: image.into_raw(),
        }
    }

    pub fn from_rgb(seq: u64, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            seq,
            width,
            height,
            channels: 3,
            data: image.into_raw(),
        }
    }

    /// 任意格式图像 → 帧 (灰度保持单通道, 其余转RGB)
    pub fn from_dynamic(seq: u64, image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::from_gray(seq, gray),
            other => Self::from_rgb(seq, other.to_rgb8()),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn shape(&self) -> FrameShape {
        (self.width, self.height, self.channels)
    }

    /// 零面积帧 (视为无运动)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// 亮度通道 (BT.601 整数近似)
    pub fn to_luma(&self) -> GrayImage {
        let c = self.channels as usize;
        let w = self.width as usize;
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let idx = (y as usize * w + x as usize) * c;
            let value = if c == 1 {
                self.data[idx]
            } else {
                let r = self.data[idx] as u32;
                let g = self.data[idx + 1] as u32;
                let b = self.data[idx + 2] as u32;
                ((77 * r + 150 * g + 29 * b) >> 8) as u8
            };
            Luma([value])
        })
    }

    /// 转为RGB图像 (用于叠加绘制)
    pub fn to_rgb_image(&self) -> RgbImage {
        let c = self.channels as usize;
        let w = self.width as usize;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let idx = (y as usize * w + x as usize) * c;
            if c == 1 {
                let v = self.data[idx];
                Rgb([v, v, v])
            } else {
                Rgb([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
            }
        })
    }
}
