// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 计数流水线 (Motion-to-Count Pipeline)
///
/// 单线程同步处理, 每次 `tick` 完整执行一帧:
/// 帧 → 前景掩码 → 连通域 → 跟踪更新 → 越线检查 → 计数
///
/// - worker: 可选的独立处理线程, 通过有界队列接收帧
pub mod worker;

use crate::config::CounterConfig;
use crate::detection::{
    BlobExtractor, BoundingBox, CentroidTracker, CountState, CrossingEvent, LineCounter,
    MotionSegmenter, Point2, TrackId, TrackState, TrackedObject, Tracker,
};
use crate::error::{CounterError, Result};
use crate::frame::Frame;
use log::{info, trace};
use serde::Serialize;
use std::time::Instant;

pub use worker::{spawn, ControlMessage, WorkerEvent, WorkerHandle, WorkerSummary};

/// 对象快照 (渲染/日志用, 不反馈到流水线)
#[derive(Clone, Debug, Serialize)]
pub struct ObjectSnapshot {
    pub id: TrackId,
    pub centroid: Point2,
    pub bbox: BoundingBox,
    pub state: TrackState,
    pub counted: bool,
    pub color: (u8, u8, u8),
    /// 轨迹 (旧 → 新)
    pub trail: Vec<Point2>,
}

impl From<&TrackedObject> for ObjectSnapshot {
    fn from(obj: &TrackedObject) -> Self {
        Self {
            id: obj.id,
            centroid: obj.centroid(),
            bbox: obj.bbox,
            state: obj.state,
            counted: obj.counted(),
            color: obj.color,
            trail: obj.centroid_history.iter().map(|s| s.point()).collect(),
        }
    }
}

/// 单帧处理结果
#[derive(Clone, Debug)]
pub struct TickResult {
    pub frame_seq: u64,
    /// 处理完的帧 (交还给渲染端)
    pub frame: Frame,
    /// 本帧新增越线
    pub new_crossings: Vec<CrossingEvent>,
    pub total_count: u64,
    /// 存活对象 (ACTIVE + STALE)
    pub objects: Vec<ObjectSnapshot>,
    pub blob_count: usize,
    pub foreground_pixels: usize,
    pub processing_ms: f64,
}

pub struct Pipeline {
    config: CounterConfig,
    segmenter: MotionSegmenter,
    extractor: BlobExtractor,
    tracker: CentroidTracker,
    counter: LineCounter,
    count: CountState,
    last_seq: Option<u64>,
    frames_processed: u64,
}

impl Pipeline {
    /// 创建流水线, 配置不合法时直接失败
    pub fn new(config: CounterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            segmenter: MotionSegmenter::from_config(&config),
            extractor: BlobExtractor::from_config(&config),
            tracker: CentroidTracker::from_config(&config),
            counter: LineCounter::from_config(&config),
            count: CountState::new(),
            last_seq: None,
            frames_processed: 0,
            config,
        })
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    pub fn total_count(&self) -> u64 {
        self.count.total_count()
    }

    pub fn count_state(&self) -> CountState {
        self.count
    }

    /// 当前存活对象
    pub fn active_objects(&self) -> &[TrackedObject] {
        self.tracker.objects()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// 处理一帧
    ///
    /// 出错时本帧作废, 跟踪状态与计数保持不变。
    pub fn tick(&mut self, frame: Frame) -> Result<TickResult> {
        let start = Instant::now();
        let frame_seq = frame.seq();

        if let Some(last) = self.last_seq {
            if frame_seq <= last {
                return Err(CounterError::NonMonotonicFrame {
                    last,
                    got: frame_seq,
                });
            }
        }

        // 1. 运动分割
        let mask = self.segmenter.segment(&frame)?;
        let foreground_pixels = mask.count();

        // 2. 连通域
        let blobs = self.extractor.extract(&mask);

        // 3. 跟踪
        let objects = self.tracker.update(frame_seq, &blobs);

        // 4. 越线计数
        let new_crossings = self.counter.evaluate(objects, &mut self.count);

        self.last_seq = Some(frame_seq);
        self.frames_processed += 1;

        let objects: Vec<ObjectSnapshot> =
            self.tracker.objects().iter().map(ObjectSnapshot::from).collect();
        let processing_ms = start.elapsed().as_secs_f64() * 1000.0;

        trace!(
            "帧 {} | 前景 {} | 连通域 {} | {} | 总数 {} | {:.2}ms",
            frame_seq,
            foreground_pixels,
            blobs.len(),
            self.tracker.get_stats(),
            self.count.total_count(),
            processing_ms
        );

        Ok(TickResult {
            frame_seq,
            frame,
            new_crossings,
            total_count: self.count.total_count(),
            objects,
            blob_count: blobs.len(),
            foreground_pixels,
            processing_ms,
        })
    }

    /// 重置计数与跟踪 (不影响背景模型, 无需重启视频源)
    pub fn reset(&mut self) {
        info!(
            "🔄 计数器已重置 (重置前总数: {})",
            self.count.total_count()
        );
        self.tracker.reset();
        self.count = CountState::new();
        self.last_seq = None;
    }

    /// 丢弃背景模型 (帧尺寸变化后调用)
    pub fn reinitialize_background(&mut self) {
        self.segmenter.reinitialize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrossingDirection;
    use image::{GrayImage, Luma};

    fn config() -> CounterConfig {
        CounterConfig {
            line_y: 60.0,
            crossing_direction: CrossingDirection::Down,
            min_blob_area: 50,
            max_blob_area: 2000,
            max_match_distance: 30.0,
            max_missed_frames: 3,
            learning_rate: 0.05,
            ..Default::default()
        }
    }

    /// 灰色背景上一个亮色方块, 中心在 (cx, cy)
    fn square_frame(seq: u64, cx: u32, cy: u32) -> Frame {
        let mut img = GrayImage::from_pixel(120, 120, Luma([30]));
        for y in cy - 6..cy + 6 {
            for x in cx - 6..cx + 6 {
                img.put_pixel(x, y, Luma([220]));
            }
        }
        Frame::from_gray(seq, img)
    }

    /// 13x13 方块, 质心正好落在 (cx, cy)
    fn odd_square_frame(seq: u64, cx: u32, cy: u32) -> Frame {
        let mut img = GrayImage::from_pixel(120, 120, Luma([30]));
        for y in cy - 6..=cy + 6 {
            for x in cx - 6..=cx + 6 {
                img.put_pixel(x, y, Luma([220]));
            }
        }
        Frame::from_gray(seq, img)
    }

    fn background(seq: u64) -> Frame {
        Frame::from_gray(seq, GrayImage::from_pixel(120, 120, Luma([30])))
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = CounterConfig {
            min_blob_area: 10,
            max_blob_area: 5,
            ..Default::default()
        };
        assert!(matches!(
            Pipeline::new(bad),
            Err(CounterError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_square_crossing_line_counted() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.tick(background(0)).unwrap();

        let mut per_tick = Vec::new();
        for (i, cy) in [30u32, 40, 50, 70, 80, 90].into_iter().enumerate() {
            let result = pipeline.tick(square_frame(i as u64 + 1, 60, cy)).unwrap();
            per_tick.push(result.new_crossings.len());
            assert_eq!(result.objects.len(), 1);
            assert_eq!(result.objects[0].id, 1);
        }
        assert_eq!(per_tick, vec![0, 0, 0, 1, 0, 0]);
        assert_eq!(pipeline.total_count(), 1);
    }

    #[test]
    fn test_centroid_on_line_still_counted() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.tick(background(0)).unwrap();

        let mut per_tick = Vec::new();
        for (i, cy) in [40u32, 50, 60, 70, 80, 90].into_iter().enumerate() {
            let result = pipeline
                .tick(odd_square_frame(i as u64 + 1, 60, cy))
                .unwrap();
            assert_eq!(result.objects.len(), 1);
            assert_eq!(result.objects[0].centroid.y, cy as f32);
            per_tick.push(result.new_crossings.len());
        }
        // 质心在 60 处压线, 到 70 时离开才计数
        assert_eq!(per_tick, vec![0, 0, 0, 1, 0, 0]);
        assert_eq!(pipeline.total_count(), 1);
    }

    #[test]
    fn test_dimension_mismatch_leaves_state_untouched() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.tick(background(0)).unwrap();
        pipeline.tick(square_frame(1, 60, 40)).unwrap();
        let before: Vec<TrackId> = pipeline.active_objects().iter().map(|o| o.id).collect();

        let small = Frame::from_gray(2, GrayImage::new(10, 10));
        assert!(matches!(
            pipeline.tick(small),
            Err(CounterError::DimensionMismatch { .. })
        ));
        let after: Vec<TrackId> = pipeline.active_objects().iter().map(|o| o.id).collect();
        assert_eq!(before, after);
        assert_eq!(pipeline.active_objects()[0].missed_frames, 0);
        assert_eq!(pipeline.frames_processed(), 2);

        // 恢复: 重建背景后可接收新尺寸
        pipeline.reinitialize_background();
        assert!(pipeline.tick(Frame::from_gray(3, GrayImage::new(10, 10))).is_ok());
    }

    #[test]
    fn test_non_monotonic_sequence_rejected() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.tick(background(5)).unwrap();
        assert!(matches!(
            pipeline.tick(background(5)),
            Err(CounterError::NonMonotonicFrame { last: 5, got: 5 })
        ));
        assert!(pipeline.tick(background(6)).is_ok());
    }

    #[test]
    fn test_empty_frames_are_quiet() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        for seq in 0..5 {
            let result = pipeline
                .tick(Frame::new(seq, 0, 0, 1, Vec::new()).unwrap())
                .unwrap();
            assert!(result.objects.is_empty());
            assert_eq!(result.total_count, 0);
        }
    }

    #[test]
    fn test_reset_clears_count_and_tracks() {
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.tick(background(0)).unwrap();
        pipeline.tick(square_frame(1, 60, 50)).unwrap();
        pipeline.tick(square_frame(2, 60, 70)).unwrap();
        assert_eq!(pipeline.total_count(), 1);

        pipeline.reset();
        assert_eq!(pipeline.total_count(), 0);
        assert!(pipeline.active_objects().is_empty());

        // 重置后新对象获得新ID
        let result = pipeline.tick(square_frame(3, 60, 80)).unwrap();
        assert_eq!(result.objects[0].id, 2);
    }
}
