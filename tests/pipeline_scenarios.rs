// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 计数场景测试: 跟踪 + 越线计数, 以及合成视频端到端

use motion_counter::input::{FrameSource, MovingRect, SyntheticScene};
use motion_counter::{
    Blob, BoundingBox, CentroidTracker, CountState, CounterConfig, CrossingDirection,
    LineCounter, Pipeline, Point2, TrackId, Tracker,
};
use std::collections::BTreeSet;

fn blob_at(x: f32, y: f32) -> Blob {
    Blob {
        centroid: Point2::new(x, y),
        bbox: BoundingBox::new(x as u32, y as u32, x as u32 + 10, y as u32 + 10),
        area: 121,
    }
}

/// 逐帧驱动跟踪器与计数器, 返回每帧的总数
struct Harness {
    tracker: CentroidTracker,
    counter: LineCounter,
    state: CountState,
    seq: u64,
}

impl Harness {
    fn new(direction: CrossingDirection, max_missed: u32) -> Self {
        Self {
            tracker: CentroidTracker::new(50.0, max_missed, 16),
            counter: LineCounter::new(300.0, direction),
            state: CountState::new(),
            seq: 0,
        }
    }

    fn step(&mut self, blobs: &[Blob]) -> usize {
        self.seq += 1;
        let objects = self.tracker.update(self.seq, blobs);
        self.counter.evaluate(objects, &mut self.state).len()
    }

    fn ids(&self) -> Vec<TrackId> {
        self.tracker.objects().iter().map(|o| o.id).collect()
    }
}

#[test]
fn single_object_crossing_down() {
    let mut h = Harness::new(CrossingDirection::Down, 15);
    let per_tick: Vec<usize> = [290.0, 310.0, 330.0]
        .iter()
        .map(|&y| h.step(&[blob_at(100.0, y)]))
        .collect();
    assert_eq!(per_tick, vec![0, 1, 0]);
    assert_eq!(h.state.total_count(), 1);
}

#[test]
fn count_is_monotonic_and_at_most_once() {
    let mut h = Harness::new(CrossingDirection::Either, 15);
    let ys = [280.0, 295.0, 305.0, 298.0, 310.0, 290.0, 320.0, 340.0];
    let mut last = 0;
    for y in ys {
        h.step(&[blob_at(100.0, y)]);
        assert!(h.state.total_count() >= last);
        last = h.state.total_count();
    }
    assert_eq!(h.state.total_count(), 1);
    assert!(h.tracker.objects()[0].counted());
}

#[test]
fn crossing_through_line_position_counted_once() {
    let mut h = Harness::new(CrossingDirection::Down, 15);
    let per_tick: Vec<usize> = [280.0, 290.0, 300.0, 310.0, 320.0]
        .iter()
        .map(|&y| h.step(&[blob_at(100.0, y)]))
        .collect();
    assert_eq!(per_tick, vec![0, 0, 0, 1, 0]);

    // 压线后折返不计数
    let mut h = Harness::new(CrossingDirection::Either, 15);
    for y in [290.0, 300.0, 290.0, 280.0] {
        h.step(&[blob_at(100.0, y)]);
    }
    assert_eq!(h.state.total_count(), 0);
}

#[test]
fn object_appearing_past_line_is_not_counted() {
    let mut h = Harness::new(CrossingDirection::Down, 15);
    for y in [305.0, 320.0, 340.0] {
        h.step(&[blob_at(100.0, y)]);
    }
    assert_eq!(h.state.total_count(), 0);
}

#[test]
fn short_occlusion_keeps_identity_and_counts() {
    let mut h = Harness::new(CrossingDirection::Down, 3);
    h.step(&[blob_at(100.0, 280.0)]);
    let id = h.ids()[0];

    // 两帧丢失 (< max_missed_frames)
    h.step(&[]);
    h.step(&[]);
    assert_eq!(h.ids(), vec![id]);

    assert_eq!(h.step(&[blob_at(100.0, 320.0)]), 1);
    assert_eq!(h.ids(), vec![id]);
    assert_eq!(h.state.total_count(), 1);
}

#[test]
fn long_occlusion_retires_and_reissues_id() {
    let mut h = Harness::new(CrossingDirection::Down, 3);
    h.step(&[blob_at(100.0, 280.0)]);
    let id = h.ids()[0];

    for _ in 0..3 {
        h.step(&[]);
    }
    assert!(h.ids().is_empty());

    // 重新出现 → 新ID, 首个轨迹点已在线下, 不计数
    assert_eq!(h.step(&[blob_at(100.0, 320.0)]), 0);
    let ids = h.ids();
    assert_eq!(ids.len(), 1);
    assert!(ids[0] > id);
    assert_eq!(h.state.total_count(), 0);
}

#[test]
fn two_objects_from_opposite_sides() {
    let mut h = Harness::new(CrossingDirection::Either, 15);
    h.step(&[blob_at(100.0, 290.0), blob_at(400.0, 310.0)]);
    let crossed = h.step(&[blob_at(100.0, 310.0), blob_at(400.0, 290.0)]);
    assert_eq!(crossed, 2);
    assert_eq!(h.state.total_count(), 2);
    assert_eq!(h.ids(), vec![1, 2]);
}

#[test]
fn empty_masks_never_count() {
    let mut h = Harness::new(CrossingDirection::Either, 2);
    h.step(&[blob_at(100.0, 290.0)]);
    for _ in 0..10 {
        assert_eq!(h.step(&[]), 0);
    }
    assert!(h.ids().is_empty());
    assert_eq!(h.state.total_count(), 0);
}

// ---------------------------------------------------------------------------
// 端到端: 合成帧 → Pipeline
// ---------------------------------------------------------------------------

fn e2e_config(direction: CrossingDirection) -> CounterConfig {
    CounterConfig {
        line_y: 60.0,
        crossing_direction: direction,
        min_blob_area: 100,
        max_blob_area: 5000,
        max_match_distance: 30.0,
        max_missed_frames: 5,
        ..Default::default()
    }
}

/// 跑完整个场景, 返回 (总数, 出现过的ID)
fn run_scene(config: CounterConfig, mut scene: SyntheticScene) -> (u64, BTreeSet<TrackId>) {
    let mut pipeline = Pipeline::new(config).unwrap();
    let mut ids = BTreeSet::new();
    while let Some(frame) = scene.next_frame() {
        let result = pipeline.tick(frame.unwrap()).unwrap();
        ids.extend(result.objects.iter().map(|o| o.id));
    }
    (pipeline.total_count(), ids)
}

/// 16x16 方块从顶部向下移动 (第0帧为纯背景)
fn falling_rect(x: f32) -> MovingRect {
    MovingRect::new(x, 0.0, 16, 16)
        .with_velocity(0.0, 3.0)
        .with_visible(1..u64::MAX)
}

#[test]
fn synthetic_single_object_counted_once() {
    let scene = SyntheticScene::new(160, 120, 40).with_rect(falling_rect(40.0));
    let (total, ids) = run_scene(e2e_config(CrossingDirection::Down), scene);
    assert_eq!(total, 1);
    assert_eq!(ids.len(), 1);
}

#[test]
fn synthetic_wrong_direction_not_counted() {
    let scene = SyntheticScene::new(160, 120, 40).with_rect(falling_rect(40.0));
    let (total, _) = run_scene(e2e_config(CrossingDirection::Up), scene);
    assert_eq!(total, 0);
}

#[test]
fn synthetic_occlusion_across_line() {
    // 质心 y = 3t + 7.5, 在第 17~18 帧之间越线; 这两帧被遮挡
    let scene = SyntheticScene::new(160, 120, 40)
        .with_rect(falling_rect(40.0).with_occlusion(17..19));
    let (total, ids) = run_scene(e2e_config(CrossingDirection::Down), scene);
    assert_eq!(total, 1);
    assert_eq!(ids.len(), 1);
}

#[test]
fn synthetic_two_objects_opposite_directions() {
    let scene = SyntheticScene::new(160, 120, 40)
        .with_rect(falling_rect(20.0))
        .with_rect(
            MovingRect::new(110.0, 100.0, 16, 16)
                .with_velocity(0.0, -3.0)
                .with_visible(1..u64::MAX),
        );
    let (total, ids) = run_scene(e2e_config(CrossingDirection::Either), scene);
    assert_eq!(total, 2);
    assert_eq!(ids.len(), 2);
}

#[test]
fn synthetic_noise_below_threshold_is_ignored() {
    let scene = SyntheticScene::new(160, 120, 30).with_noise(8, 3);
    let (total, ids) = run_scene(e2e_config(CrossingDirection::Either), scene);
    assert_eq!(total, 0);
    assert!(ids.is_empty());
}
