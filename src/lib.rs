#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 运动目标越线计数
//!
//! 帧 → 前景掩码 → 连通域 → 质心跟踪 → 越线计数
pub mod config; // 计数参数
pub mod detection; // 运动检测与计数核心
pub mod error; // 错误类型
pub mod frame; // 视频帧
pub mod input; // 帧源
pub mod pipeline; // 计数流水线
pub mod sink; // 结果输出
pub mod utils; // 工具函数

pub use crate::config::{CounterConfig, CrossingDirection};
pub use crate::detection::{
    Blob, BlobExtractor, BoundingBox, CentroidTracker, CountState, CrossingEvent,
    ForegroundMask, Heading, LineCounter, MotionSegmenter, Point2, TrackId, TrackState,
    TrackedObject, Tracker,
};
pub use crate::error::{CounterError, Result};
pub use crate::frame::Frame;
pub use crate::pipeline::{ObjectSnapshot, Pipeline, TickResult};
pub use crate::utils::gen_time_string;
