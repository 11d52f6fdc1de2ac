// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 处理线程 (Worker)
//!
//! 帧源 → [有界队列] → 处理线程 (Pipeline::tick) → 结果通道
//!
//! 只有处理线程修改跟踪/计数状态; 控制消息在两帧之间生效。

use super::{Pipeline, TickResult};
use crate::detection::CountState;
use crate::error::CounterError;
use crate::frame::Frame;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use log::{info, trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// FPS 统计间隔 (帧)
const STATS_INTERVAL: u64 = 30;

/// 系统控制
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    /// 清空计数与跟踪
    Reset,
    /// 丢弃背景模型, 下一帧重新建模 (可换分辨率)
    ReinitializeBackground,
    /// 立即停止, 丢弃队列中剩余帧
    Shutdown,
}

/// 处理线程输出
#[derive(Debug)]
pub enum WorkerEvent {
    Tick(Box<TickResult>),
    /// 本帧被拒绝, 状态未变
    Error { frame_seq: u64, error: CounterError },
}

/// 处理线程退出时的最终快照
#[derive(Clone, Debug, Default)]
pub struct WorkerSummary {
    pub frames_processed: u64,
    pub frames_rejected: u64,
    pub dropped_frames: u64,
    pub resets: u64,
    /// 背景重建次数 (手动 + 尺寸变化自动)
    pub background_reinits: u64,
    pub count: CountState,
}

pub struct WorkerHandle {
    frame_tx: Option<Sender<Frame>>,
    control_tx: Sender<ControlMessage>,
    results_rx: Receiver<WorkerEvent>,
    dropped: Arc<AtomicU64>,
    thread: Option<JoinHandle<WorkerSummary>>,
}

/// 启动处理线程, `capacity` 为帧队列长度 (至少为 1)
pub fn spawn(pipeline: Pipeline, capacity: usize) -> WorkerHandle {
    let (frame_tx, frame_rx) = bounded::<Frame>(capacity.max(1));
    let (control_tx, control_rx) = bounded::<ControlMessage>(8);
    // 结果通道不限长, 消费端慢时不会反压处理线程
    let (results_tx, results_rx) = unbounded::<WorkerEvent>();
    let dropped = Arc::new(AtomicU64::new(0));

    let worker_dropped = Arc::clone(&dropped);
    let thread = thread::spawn(move || {
        run(pipeline, frame_rx, control_rx, results_tx, worker_dropped)
    });

    WorkerHandle {
        frame_tx: Some(frame_tx),
        control_tx,
        results_rx,
        dropped,
        thread: Some(thread),
    }
}

impl WorkerHandle {
    /// 非阻塞投递, 队列满时丢帧并返回 false
    pub fn offer(&self, frame: Frame) -> bool {
        let Some(tx) = &self.frame_tx else {
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!("队列已满, 丢弃帧 {} (累计丢帧 {})", frame.seq(), total);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// 阻塞投递, 处理线程已退出时返回 false
    pub fn submit(&self, frame: Frame) -> bool {
        match &self.frame_tx {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    pub fn control(&self, msg: ControlMessage) -> bool {
        self.control_tx.send(msg).is_ok()
    }

    /// 控制通道的发送端 (供输入线程使用)
    pub fn controller(&self) -> Sender<ControlMessage> {
        self.control_tx.clone()
    }

    pub fn results(&self) -> Receiver<WorkerEvent> {
        self.results_rx.clone()
    }

    /// 处理线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 关闭帧队列, 等待处理线程处理完剩余帧后退出
    pub fn join(mut self) -> thread::Result<WorkerSummary> {
        self.frame_tx = None;
        match self.thread.take() {
            Some(handle) => handle.join(),
            None => Ok(WorkerSummary::default()),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.control_tx.try_send(ControlMessage::Shutdown);
        }
    }
}

fn run(
    mut pipeline: Pipeline,
    frame_rx: Receiver<Frame>,
    control_rx: Receiver<ControlMessage>,
    results_tx: Sender<WorkerEvent>,
    dropped: Arc<AtomicU64>,
) -> WorkerSummary {
    info!("🔍 处理线程启动");

    let mut summary = WorkerSummary::default();
    let mut count = 0u64;
    let mut busy_ms = 0.0f64;
    let mut last = Instant::now();

    'outer: loop {
        select! {
            recv(control_rx) -> msg => match msg {
                Ok(msg) => {
                    if !handle_control(&mut pipeline, msg, &mut summary) {
                        break 'outer;
                    }
                }
                Err(_) => break 'outer,
            },
            recv(frame_rx) -> frame => {
                let Ok(frame) = frame else {
                    // 输入端关闭且队列已清空
                    break 'outer;
                };
                // 先于本帧发出的控制消息优先生效
                while let Ok(msg) = control_rx.try_recv() {
                    if !handle_control(&mut pipeline, msg, &mut summary) {
                        break 'outer;
                    }
                }
                let frame_seq = frame.seq();
                let event = match pipeline.tick(frame) {
                    Ok(result) => {
                        count += 1;
                        busy_ms += result.processing_ms;
                        WorkerEvent::Tick(Box::new(result))
                    }
                    Err(error) => {
                        warn!("⚠️  帧 {} 被拒绝: {}", frame_seq, error);
                        summary.frames_rejected += 1;
                        // 分辨率变化: 重建背景, 下一帧按新尺寸建模
                        if matches!(error, CounterError::DimensionMismatch { .. }) {
                            info!("🔧 帧尺寸变化, 重建背景模型");
                            pipeline.reinitialize_background();
                            summary.background_reinits += 1;
                        }
                        WorkerEvent::Error { frame_seq, error }
                    }
                };
                if results_tx.send(event).is_err() {
                    trace!("结果通道已关闭");
                }

                if count > 0 && count % STATS_INTERVAL == 0 {
                    let elapsed = last.elapsed().as_secs_f64();
                    info!(
                        "📊 处理统计: {}帧 | 实际{:.1}fps | 每帧{:.2}ms | 总数 {}",
                        STATS_INTERVAL,
                        STATS_INTERVAL as f64 / elapsed.max(f64::EPSILON),
                        busy_ms / STATS_INTERVAL as f64,
                        pipeline.total_count()
                    );
                    busy_ms = 0.0;
                    last = Instant::now();
                }
            }
        }
    }

    summary.frames_processed = pipeline.frames_processed();
    summary.dropped_frames = dropped.load(Ordering::Relaxed);
    summary.count = pipeline.count_state();
    info!(
        "🛑 处理线程退出: 处理 {} 帧 | 拒绝 {} | 丢弃 {} | 背景重建 {} | 总数 {}",
        summary.frames_processed,
        summary.frames_rejected,
        summary.dropped_frames,
        summary.background_reinits,
        summary.count.total_count()
    );
    summary
}

/// 返回 false 表示退出
fn handle_control(pipeline: &mut Pipeline, msg: ControlMessage, summary: &mut WorkerSummary) -> bool {
    match msg {
        ControlMessage::Reset => {
            pipeline.reset();
            summary.resets += 1;
            true
        }
        ControlMessage::ReinitializeBackground => {
            info!("🔧 重建背景模型");
            pipeline.reinitialize_background();
            summary.background_reinits += 1;
            true
        }
        ControlMessage::Shutdown => {
            info!("收到停止信号");
            false
        }
    }
}
