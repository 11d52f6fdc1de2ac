/// 运动检测与计数 (Motion Detection & Counting)
///
/// 每帧依次执行:
/// - Segmenter: 背景建模, 帧 → 前景掩码
/// - Blob:      连通域提取与过滤
/// - Tracker:   质心跟踪, 维持对象ID
/// - Counter:   越线计数
pub mod blob;
pub mod counter;
pub mod segmenter;
pub mod tracker;
pub mod types;

pub use blob::BlobExtractor;
pub use counter::{CountState, CrossingEvent, Heading, LineCounter};
pub use segmenter::MotionSegmenter;
pub use tracker::{CentroidSample, CentroidTracker, TrackId, TrackState, TrackedObject, Tracker};
pub use types::{Blob, BoundingBox, ForegroundMask, LineSide, Point2};
