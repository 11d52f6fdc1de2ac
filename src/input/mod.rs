// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输入 (Frame Sources)
///
/// 解码不在本库范围内, 帧源只负责按顺序产出带序号的帧
/// - ImageSequence: 目录中的图像序列 (按文件名排序)
/// - SyntheticScene: 合成场景 (运动矩形 + 可选噪声), 用于演示与测试
pub mod image_sequence;
pub mod synthetic;

pub use image_sequence::ImageSequence;
pub use synthetic::{MovingRect, SyntheticScene};

use crate::error::Result;
use crate::frame::Frame;

/// 帧源: `None` 表示流结束
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<Result<Frame>>;

    /// 源描述 (日志用)
    fn describe(&self) -> String;
}
