// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 结果输出 (Sinks)
///
/// 流水线结果的只读消费者, 不会反馈到计数状态
/// - LogSink:        日志输出
/// - JsonLinesSink:  越线事件日志 (每行一条JSON)
/// - OverlayRenderer: 叠加绘制并保存PNG
pub mod events;
pub mod overlay;

pub use events::JsonLinesSink;
pub use overlay::OverlayRenderer;

use crate::error::Result;
use crate::pipeline::TickResult;
use log::info;

pub trait TickSink: Send {
    fn on_tick(&mut self, result: &TickResult) -> Result<()>;

    /// 流结束时调用
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// 日志输出: 每次越线一行, 并定期打印状态
pub struct LogSink {
    status_interval: u64,
    ticks: u64,
}

impl LogSink {
    /// `status_interval` 为 0 时不打印状态行
    pub fn new(status_interval: u64) -> Self {
        Self {
            status_interval,
            ticks: 0,
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(100)
    }
}

impl TickSink for LogSink {
    fn on_tick(&mut self, result: &TickResult) -> Result<()> {
        self.ticks += 1;

        for event in &result.new_crossings {
            info!(
                "✅ 计数 +1: 对象 #{} ({:?}) 帧 {} 位置 ({:.1}, {:.1}) | 总数: {}",
                event.object_id,
                event.heading,
                event.frame_seq,
                event.centroid.x,
                event.centroid.y,
                event.total_count
            );
        }

        if self.status_interval > 0 && self.ticks % self.status_interval == 0 {
            info!(
                "📊 帧 {} | 跟踪对象 {} | 连通域 {} | 总数 {}",
                result.frame_seq,
                result.objects.len(),
                result.blob_count,
                result.total_count
            );
        }
        Ok(())
    }
}
