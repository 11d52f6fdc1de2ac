// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型
//! Error types for the counting core

use thiserror::Error;

pub type Result<T, E = CounterError> = std::result::Result<T, E>;

/// 帧形状 (宽, 高, 通道数)
pub type FrameShape = (u32, u32, u8);

#[derive(Debug, Error)]
pub enum CounterError {
    /// 帧尺寸与已建立的背景模型不一致 (可通过重新初始化分割器恢复)
    #[error("frame shape {actual:?} does not match background model {expected:?}")]
    DimensionMismatch {
        expected: FrameShape,
        actual: FrameShape,
    },

    /// 配置参数不合理 (启动时致命)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// 像素缓冲区长度与声明的尺寸不符
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    FrameBuffer { expected: usize, actual: usize },

    /// 仅支持 1 / 3 / 4 通道
    #[error("unsupported channel count {0}, expected 1, 3 or 4")]
    UnsupportedChannels(u8),

    /// 帧序号必须严格递增
    #[error("frame sequence {got} is not after {last}")]
    NonMonotonicFrame { last: u64, got: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl CounterError {
    /// 仅影响当前帧、可继续处理下一帧的错误
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CounterError::DimensionMismatch { .. }
                | CounterError::FrameBuffer { .. }
                | CounterError::UnsupportedChannels(_)
                | CounterError::NonMonotonicFrame { .. }
        )
    }
}
