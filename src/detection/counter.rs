// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 越线计数
//! Line-crossing counter with at-most-once counting per object

use super::tracker::{TrackId, TrackedObject};
use super::types::{LineSide, Point2};
use crate::config::{CounterConfig, CrossingDirection};
use log::debug;
use serde::Serialize;

/// 计数状态 (整个运行期间单调不减)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountState {
    total_count: u64,
}

impl CountState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    fn increment(&mut self) -> u64 {
        self.total_count += 1;
        self.total_count
    }
}

/// 实际越线方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Heading {
    Down,
    Up,
}

/// 一次越线事件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossingEvent {
    pub object_id: TrackId,
    pub frame_seq: u64,
    /// 越线后的质心
    pub centroid: Point2,
    pub heading: Heading,
    /// 本次计数后的总数
    pub total_count: u64,
}

pub struct LineCounter {
    line_y: f32,
    direction: CrossingDirection,
    /// 压线 (y == line_y) 是否算作到达另一侧
    inclusive: bool,
}

impl LineCounter {
    pub fn new(line_y: f32, direction: CrossingDirection) -> Self {
        Self {
            line_y,
            direction,
            inclusive: false,
        }
    }

    pub fn from_config(config: &CounterConfig) -> Self {
        Self::new(config.line_y, config.crossing_direction).with_inclusive(config.inclusive_line)
    }

    pub fn with_inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = inclusive;
        self
    }

    pub fn line_y(&self) -> f32 {
        self.line_y
    }

    pub fn direction(&self) -> CrossingDirection {
        self.direction
    }

    fn side(&self, y: f32) -> LineSide {
        if y < self.line_y {
            LineSide::Above
        } else if y > self.line_y {
            LineSide::Below
        } else {
            LineSide::On
        }
    }

    /// 从上一次离线位置到当前位置的越线方向 (不符合配置方向时为 None)
    fn crossing(&self, last: LineSide, current: LineSide) -> Option<Heading> {
        let heading = match (last, current) {
            (LineSide::Above, LineSide::Below) => Heading::Down,
            (LineSide::Below, LineSide::Above) => Heading::Up,
            (LineSide::Above, LineSide::On) if self.inclusive => Heading::Down,
            (LineSide::Below, LineSide::On) if self.inclusive => Heading::Up,
            _ => return None,
        };
        match (self.direction, heading) {
            (CrossingDirection::Either, _)
            | (CrossingDirection::Down, Heading::Down)
            | (CrossingDirection::Up, Heading::Up) => Some(heading),
            _ => None,
        }
    }

    /// 检查所有对象, 返回本帧新增的越线事件
    ///
    /// 当前轨迹点与上一次严格离线的位置比较, 压线的点不改变所在侧。
    /// 首个轨迹点只记录所在侧; 已计数对象跳过, 因此每个对象最多贡献一次。
    pub fn evaluate(
        &self,
        objects: &mut [TrackedObject],
        state: &mut CountState,
    ) -> Vec<CrossingEvent> {
        let mut events = Vec::new();

        for obj in objects.iter_mut().filter(|o| !o.counted()) {
            let Some(cur) = obj.centroid_history.back().copied() else {
                continue;
            };
            let side = self.side(cur.y);
            let previous = obj.line_side();
            obj.set_line_side(side);

            let Some(heading) = previous.and_then(|last| self.crossing(last, side)) else {
                continue;
            };

            if obj.mark_counted() {
                let total_count = state.increment();
                debug!(
                    "对象 #{} 越线 ({:?}) 帧 {} | 总数: {}",
                    obj.id, heading, cur.frame_seq, total_count
                );
                events.push(CrossingEvent {
                    object_id: obj.id,
                    frame_seq: cur.frame_seq,
                    centroid: cur.point(),
                    heading,
                    total_count,
                });
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::tracker::{CentroidTracker, Tracker};
    use crate::detection::types::{Blob, BoundingBox};

    fn blob_at(x: f32, y: f32) -> Blob {
        Blob {
            centroid: Point2::new(x, y),
            bbox: BoundingBox::new(0, 0, 1, 1),
            area: 4,
        }
    }

    /// 单目标按给定 y 序列运动, 返回每帧新增计数
    fn run(counter: &LineCounter, ys: &[f32]) -> (Vec<usize>, CountState) {
        let mut tracker = CentroidTracker::new(100.0, 5, 16);
        let mut state = CountState::new();
        let mut per_tick = Vec::new();
        for (i, &y) in ys.iter().enumerate() {
            let objects = tracker.update(i as u64 + 1, &[blob_at(100.0, y)]);
            per_tick.push(counter.evaluate(objects, &mut state).len());
        }
        (per_tick, state)
    }

    #[test]
    fn test_downward_crossing_counted_once() {
        let counter = LineCounter::new(300.0, CrossingDirection::Down);
        let (per_tick, state) = run(&counter, &[290.0, 310.0, 330.0]);
        assert_eq!(per_tick, vec![0, 1, 0]);
        assert_eq!(state.total_count(), 1);
    }

    #[test]
    fn test_direction_filter() {
        let down = LineCounter::new(300.0, CrossingDirection::Down);
        let (_, state) = run(&down, &[320.0, 290.0, 280.0]);
        assert_eq!(state.total_count(), 0);

        let up = LineCounter::new(300.0, CrossingDirection::Up);
        let (per_tick, state) = run(&up, &[320.0, 290.0, 280.0]);
        assert_eq!(per_tick, vec![0, 1, 0]);
        assert_eq!(state.total_count(), 1);
    }

    #[test]
    fn test_oscillation_counts_once() {
        let counter = LineCounter::new(300.0, CrossingDirection::Either);
        let (per_tick, state) = run(&counter, &[295.0, 305.0, 295.0, 305.0, 295.0]);
        assert_eq!(per_tick.iter().sum::<usize>(), 1);
        assert_eq!(state.total_count(), 1);
    }

    #[test]
    fn test_first_sample_past_line_not_counted() {
        let counter = LineCounter::new(300.0, CrossingDirection::Down);
        let (_, state) = run(&counter, &[320.0, 340.0, 360.0]);
        assert_eq!(state.total_count(), 0);
    }

    #[test]
    fn test_passing_through_line_counts_after_leaving_it() {
        // 290 → 300 → 310: 压线不算越线, 离开到另一侧时计数
        let strict = LineCounter::new(300.0, CrossingDirection::Down);
        let (per_tick, state) = run(&strict, &[290.0, 300.0, 310.0]);
        assert_eq!(per_tick, vec![0, 0, 1]);
        assert_eq!(state.total_count(), 1);

        // 压线后返回原侧: 不计数
        let (_, state) = run(&strict, &[290.0, 300.0, 290.0]);
        assert_eq!(state.total_count(), 0);

        // 多帧停留在线上
        let (per_tick, _) = run(&strict, &[290.0, 300.0, 300.0, 300.0, 320.0]);
        assert_eq!(per_tick, vec![0, 0, 0, 0, 1]);

        let inclusive = LineCounter::new(300.0, CrossingDirection::Down).with_inclusive(true);
        let (per_tick, state) = run(&inclusive, &[290.0, 300.0, 310.0]);
        assert_eq!(per_tick, vec![0, 1, 0]);
        assert_eq!(state.total_count(), 1);
    }

    #[test]
    fn test_first_sample_on_line_not_counted() {
        let counter = LineCounter::new(300.0, CrossingDirection::Either);
        let (_, state) = run(&counter, &[300.0, 310.0, 320.0]);
        assert_eq!(state.total_count(), 0);
    }

    #[test]
    fn test_stale_object_not_recounted() {
        let counter = LineCounter::new(300.0, CrossingDirection::Up);
        let mut tracker = CentroidTracker::new(100.0, 5, 16);
        let mut state = CountState::new();
        counter.evaluate(tracker.update(1, &[blob_at(100.0, 290.0)]), &mut state);
        // 向下越线被方向过滤, 之后丢失数帧 (同一轨迹点被重复检查)
        counter.evaluate(tracker.update(2, &[blob_at(100.0, 310.0)]), &mut state);
        for seq in 3..6 {
            counter.evaluate(tracker.update(seq, &[]), &mut state);
        }
        assert_eq!(state.total_count(), 0);
        assert_eq!(tracker.objects()[0].line_side(), Some(LineSide::Below));
    }

    #[test]
    fn test_event_payload() {
        let counter = LineCounter::new(50.0, CrossingDirection::Either);
        let mut tracker = CentroidTracker::new(100.0, 5, 16);
        let mut state = CountState::new();
        counter.evaluate(tracker.update(7, &[blob_at(10.0, 40.0)]), &mut state);
        let events = counter.evaluate(tracker.update(8, &[blob_at(12.0, 60.0)]), &mut state);
        assert_eq!(
            events,
            vec![CrossingEvent {
                object_id: 1,
                frame_seq: 8,
                centroid: Point2::new(12.0, 60.0),
                heading: Heading::Down,
                total_count: 1,
            }]
        );
        assert!(tracker.objects()[0].counted());
    }
}
