// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 多目标跟踪 (贪心最近质心匹配)
//! Frame-to-frame identity tracking by greedy nearest-centroid association
//!
//! 状态机:
//! - ACTIVE ⇄ ACTIVE: 本帧重新匹配
//! - ACTIVE → STALE:  本帧未匹配
//! - STALE → ACTIVE:  宽限期内重新匹配
//! - STALE → RETIRED: 连续丢失达到 `max_missed_frames`, 从活跃集合删除, ID 永不复用

use super::types::{Blob, BoundingBox, LineSide, Point2};
use crate::config::CounterConfig;
use log::debug;
use serde::Serialize;
use std::collections::VecDeque;

// ========== 公共数据结构 ==========

/// 跟踪ID (单调分配, 不复用)
pub type TrackId = u64;

/// 轨迹点
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CentroidSample {
    pub frame_seq: u64,
    pub x: f32,
    pub y: f32,
}

impl CentroidSample {
    pub fn point(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// 跟踪对象生命周期
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Active,
    Stale,
    Retired,
}

/// 跟踪对象
#[derive(Clone, Debug)]
pub struct TrackedObject {
    /// 唯一跟踪ID
    pub id: TrackId,

    /// 历史轨迹 (frame_seq 严格递增, 超长时丢弃最旧)
    pub centroid_history: VecDeque<CentroidSample>,

    /// 最近一次匹配的外接框
    pub bbox: BoundingBox,

    /// 最近一次匹配的面积
    pub area: u32,

    /// 最近一次匹配的帧序号
    pub last_seen_frame: u64,

    /// 连续丢失帧数
    pub missed_frames: u32,

    /// 是否已计数 (只会 false → true, 仅由 `mark_counted` 修改)
    counted: bool,

    /// 最近一次严格位于计数线某一侧的位置 (压线的点不更新)
    line_side: Option<LineSide>,

    pub state: TrackState,

    /// 显示颜色 (每个ID不同颜色)
    pub color: (u8, u8, u8),
}

impl TrackedObject {
    fn new(id: TrackId, frame_seq: u64, blob: &Blob) -> Self {
        let mut centroid_history = VecDeque::new();
        centroid_history.push_back(CentroidSample {
            frame_seq,
            x: blob.centroid.x,
            y: blob.centroid.y,
        });
        Self {
            id,
            centroid_history,
            bbox: blob.bbox,
            area: blob.area,
            last_seen_frame: frame_seq,
            missed_frames: 0,
            counted: false,
            line_side: None,
            state: TrackState::Active,
            color: id_to_color(id),
        }
    }

    /// 当前质心 (最近一次观测)
    pub fn centroid(&self) -> Point2 {
        self.centroid_history
            .back()
            .map(CentroidSample::point)
            .unwrap_or_default()
    }

    pub fn counted(&self) -> bool {
        self.counted
    }

    pub fn line_side(&self) -> Option<LineSide> {
        self.line_side
    }

    /// 记录对象所在一侧, `On` 不覆盖之前的记录
    pub(crate) fn set_line_side(&mut self, side: LineSide) {
        if side != LineSide::On {
            self.line_side = Some(side);
        }
    }

    /// 标记已计数, 返回是否为首次标记
    pub fn mark_counted(&mut self) -> bool {
        let first = !self.counted;
        self.counted = true;
        first
    }

    fn observe(&mut self, frame_seq: u64, blob: &Blob, history_len: usize) {
        debug_assert!(
            self.centroid_history
                .back()
                .map_or(true, |s| s.frame_seq < frame_seq),
            "frame_seq must increase"
        );
        self.centroid_history.push_back(CentroidSample {
            frame_seq,
            x: blob.centroid.x,
            y: blob.centroid.y,
        });
        // 限制轨迹长度
        while self.centroid_history.len() > history_len {
            self.centroid_history.pop_front();
        }
        self.bbox = blob.bbox;
        self.area = blob.area;
        self.last_seen_frame = frame_seq;
        self.missed_frames = 0;
        self.state = TrackState::Active;
    }

    fn mark_missed(&mut self, max_missed_frames: u32) {
        self.missed_frames += 1;
        self.state = if self.missed_frames >= max_missed_frames {
            TrackState::Retired
        } else {
            TrackState::Stale
        };
    }
}

// ========== 跟踪器统一接口 ==========

/// 多目标跟踪器 Trait
pub trait Tracker {
    /// 更新跟踪器
    ///
    /// # 参数
    /// - `frame_seq`: 当前帧序号 (严格递增)
    /// - `blobs`: 当前帧的连通域
    ///
    /// # 返回
    /// 当前所有存活的跟踪对象 (ACTIVE + STALE, 按ID升序)
    fn update(&mut self, frame_seq: u64, blobs: &[Blob]) -> &mut [TrackedObject];

    /// 重置跟踪器 (清除所有跟踪, ID 计数继续)
    fn reset(&mut self);

    /// 获取当前跟踪数量
    fn track_count(&self) -> usize;
}

/// 质心跟踪器
pub struct CentroidTracker {
    /// 当前存活的对象
    objects: Vec<TrackedObject>,

    /// 下一个分配的ID
    next_id: TrackId,

    /// 质心匹配距离上限 (严格小于)
    max_match_distance: f32,

    /// 最大允许连续丢失帧数
    max_missed_frames: u32,

    /// 轨迹长度
    history_len: usize,
}

impl CentroidTracker {
    pub fn new(max_match_distance: f32, max_missed_frames: u32, history_len: usize) -> Self {
        Self {
            objects: Vec::new(),
            next_id: 1,
            max_match_distance,
            max_missed_frames,
            history_len: history_len.max(2),
        }
    }

    pub fn from_config(config: &CounterConfig) -> Self {
        Self::new(
            config.max_match_distance,
            config.max_missed_frames,
            config.history_len,
        )
    }

    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    /// 已分配的ID总数
    pub fn ids_allocated(&self) -> u64 {
        self.next_id - 1
    }

    /// 贪心匹配: 返回 (blob下标, 对象下标)
    ///
    /// 候选对按 (距离, blob发现顺序, 对象创建顺序) 升序排序, 结果可复现。
    fn associate(&self, blobs: &[Blob]) -> Vec<(usize, usize)> {
        if blobs.is_empty() || self.objects.is_empty() {
            return Vec::new();
        }

        // 计算距离代价
        let mut candidates = Vec::new();
        for (blob_idx, blob) in blobs.iter().enumerate() {
            for (obj_idx, obj) in self.objects.iter().enumerate() {
                let distance = blob.centroid.distance(&obj.centroid());
                if distance < self.max_match_distance {
                    candidates.push((distance, blob_idx, obj_idx));
                }
            }
        }

        // 贪心匹配: 按代价排序
        candidates.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut assignments = Vec::new();
        let mut used_blob = vec![false; blobs.len()];
        let mut used_obj = vec![false; self.objects.len()];

        for (_, blob_idx, obj_idx) in candidates {
            if !used_blob[blob_idx] && !used_obj[obj_idx] {
                assignments.push((blob_idx, obj_idx));
                used_blob[blob_idx] = true;
                used_obj[obj_idx] = true;
            }
        }

        assignments
    }

    /// 获取跟踪统计信息
    pub fn get_stats(&self) -> String {
        let stale = self
            .objects
            .iter()
            .filter(|o| o.state == TrackState::Stale)
            .count();
        format!(
            "跟踪: {} 个 (丢失中 {}) | 总ID: {}",
            self.objects.len(),
            stale,
            self.ids_allocated()
        )
    }
}

impl Tracker for CentroidTracker {
    fn update(&mut self, frame_seq: u64, blobs: &[Blob]) -> &mut [TrackedObject] {
        // 1-2. 距离匹配
        let assignments = self.associate(blobs);

        let mut matched_blob = vec![false; blobs.len()];
        let mut matched_obj = vec![false; self.objects.len()];

        // 3. 匹配成功 → 追加轨迹点
        for (blob_idx, obj_idx) in assignments {
            matched_blob[blob_idx] = true;
            matched_obj[obj_idx] = true;
            self.objects[obj_idx].observe(frame_seq, &blobs[blob_idx], self.history_len);
        }

        // 5. 未匹配的对象 → 标记丢失
        for (obj_idx, &matched) in matched_obj.iter().enumerate() {
            if !matched {
                self.objects[obj_idx].mark_missed(self.max_missed_frames);
            }
        }

        // 删除丢失太久的对象
        self.objects.retain(|o| {
            if o.state == TrackState::Retired {
                debug!(
                    "🗑️ 对象 #{} 退役 (最后出现帧 {}, 已计数 {})",
                    o.id, o.last_seen_frame, o.counted
                );
                false
            } else {
                true
            }
        });

        // 4. 未匹配的连通域 → 新建对象
        for (blob_idx, &matched) in matched_blob.iter().enumerate() {
            if !matched {
                let obj = TrackedObject::new(self.next_id, frame_seq, &blobs[blob_idx]);
                debug!(
                    "🆕 对象 #{} 出现于 ({:.1}, {:.1}) 帧 {}",
                    obj.id, obj.centroid().x, obj.centroid().y, frame_seq
                );
                self.objects.push(obj);
                self.next_id += 1;
            }
        }

        &mut self.objects
    }

    fn reset(&mut self) {
        self.objects.clear();
    }

    fn track_count(&self) -> usize {
        self.objects.len()
    }
}

// ========== 工具函数 ==========

/// 根据ID生成不同颜色
pub fn id_to_color(id: TrackId) -> (u8, u8, u8) {
    let hue = (id as f32 * 137.508) % 360.0; // 黄金角度采样
    hsv_to_rgb(hue, 0.8, 0.9)
}

/// HSV转RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}
