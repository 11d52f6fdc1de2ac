// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 运动分割 (背景建模 + 阈值 + 形态学)
//! Motion segmentation: running-average background, absolute difference, open/close

use super::types::{ForegroundMask, BACKGROUND, FOREGROUND};
use crate::config::CounterConfig;
use crate::error::{CounterError, FrameShape, Result};
use crate::frame::Frame;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use log::{debug, trace};

/// 背景估计 (亮度的指数滑动平均)
struct Background {
    shape: FrameShape,
    mean: Vec<f32>,
}

pub struct MotionSegmenter {
    /// 差分阈值, 严格大于才算前景
    threshold: u8,
    /// 背景更新速率 (0, 1]
    learning_rate: f32,
    /// 开运算半径, 0 = 关闭
    open_radius: u8,
    /// 闭运算半径, 0 = 关闭
    close_radius: u8,
    background: Option<Background>,
}

impl MotionSegmenter {
    pub fn new(threshold: u8, learning_rate: f32, open_radius: u8, close_radius: u8) -> Self {
        Self {
            threshold,
            learning_rate,
            open_radius,
            close_radius,
            background: None,
        }
    }

    pub fn from_config(config: &CounterConfig) -> Self {
        Self::new(
            config.motion_threshold,
            config.learning_rate,
            config.open_radius,
            config.close_radius,
        )
    }

    /// 当前背景模型对应的帧形状 (尚未初始化时为 None)
    pub fn background_shape(&self) -> Option<FrameShape> {
        self.background.as_ref().map(|bg| bg.shape)
    }

    /// 丢弃背景模型, 下一帧重新建模 (尺寸变化后恢复用)
    pub fn reinitialize(&mut self) {
        debug!("🔄 背景模型重新初始化");
        self.background = None;
    }

    /// 单帧分割: 帧 → 前景掩码, 同时更新背景
    pub fn segment(&mut self, frame: &Frame) -> Result<ForegroundMask> {
        if frame.is_empty() {
            return Ok(ForegroundMask::empty(frame.width(), frame.height()));
        }

        if let Some(bg) = &self.background {
            if bg.shape != frame.shape() {
                return Err(CounterError::DimensionMismatch {
                    expected: bg.shape,
                    actual: frame.shape(),
                });
            }
        }

        let luma = frame.to_luma();
        let bg = match self.background.as_mut() {
            Some(bg) => bg,
            None => {
                // 首帧只建模, 不产生前景
                debug!(
                    "🖼️ 背景模型建立 {}x{}x{}",
                    frame.width(),
                    frame.height(),
                    frame.channels()
                );
                self.background = Some(Background {
                    shape: frame.shape(),
                    mean: luma.pixels().map(|p| p.0[0] as f32).collect(),
                });
                return Ok(ForegroundMask::empty(frame.width(), frame.height()));
            }
        };

        let threshold = self.threshold as f32;
        let rate = self.learning_rate;
        let mut raw = GrayImage::new(frame.width(), frame.height());
        for ((pixel, mean), out) in luma
            .pixels()
            .zip(bg.mean.iter_mut())
            .zip(raw.pixels_mut())
        {
            let value = pixel.0[0] as f32;
            let diff = value - *mean;
            *out = Luma([if diff.abs() > threshold { FOREGROUND } else { BACKGROUND }]);
            // 有界漂移更新
            *mean += rate * diff;
        }

        let mut mask = raw;
        if self.open_radius > 0 {
            mask = morphology::open(&mask, Norm::LInf, self.open_radius);
        }
        if self.close_radius > 0 {
            mask = morphology::close(&mask, Norm::LInf, self.close_radius);
        }

        let mask = ForegroundMask::from_image(mask);
        trace!("前景像素: {}", mask.count());
        Ok(mask)
    }
}
