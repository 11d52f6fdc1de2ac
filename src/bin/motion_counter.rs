// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 运动目标越线计数 - 命令行入口
///
/// 直接运行: cargo run --bin motion-counter --release -- --synthetic
///
/// 线程划分:
/// - 主线程:   读取帧源 → 投递到处理线程
/// - 处理线程: Pipeline::tick
/// - 输出线程: 日志 / 事件日志 / 叠加图像
/// - 输入线程: 标准输入 r(重置) / b(重建背景) / q(退出)
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::Sender;
use log::{error, info, warn};
use motion_counter::input::{FrameSource, ImageSequence, SyntheticScene};
use motion_counter::pipeline::{self, ControlMessage, WorkerEvent};
use motion_counter::sink::{JsonLinesSink, LogSink, OverlayRenderer, TickSink};
use motion_counter::{gen_time_string, CounterConfig, CounterError, CrossingDirection, Pipeline};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 运动目标越线计数
#[derive(Parser, Debug)]
#[command(author, version, about = "运动目标越线计数", long_about = None)]
struct Args {
    /// 图像序列目录 (按文件名排序)
    #[arg(short, long, conflicts_with = "synthetic")]
    input: Option<PathBuf>,

    /// 使用内置合成场景
    #[arg(long)]
    synthetic: bool,

    /// 合成场景帧数
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// 合成场景宽度
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// 合成场景高度
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// 配置文件 (JSON, 不存在时写入默认值)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 计数线 y 坐标
    #[arg(long)]
    line_y: Option<f32>,

    /// 计数方向: down / up / either
    #[arg(long)]
    direction: Option<String>,

    /// 压线即计数
    #[arg(long)]
    inclusive: bool,

    /// 最小连通域面积
    #[arg(long)]
    min_area: Option<u32>,

    /// 最大连通域面积
    #[arg(long)]
    max_area: Option<u32>,

    /// 最大匹配距离 (像素)
    #[arg(long)]
    max_distance: Option<f32>,

    /// 最大连续丢失帧数
    #[arg(long)]
    max_missed: Option<u32>,

    /// 运动阈值 (0-254)
    #[arg(long)]
    threshold: Option<u8>,

    /// 叠加图像输出目录 (默认 runs/<时间>)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// 不保存叠加图像
    #[arg(long)]
    no_overlay: bool,

    /// 每 N 帧保存一张叠加图像
    #[arg(long, default_value_t = 1)]
    save_every: u64,

    /// 越线事件日志 (JSON Lines)
    #[arg(short, long)]
    events: Option<PathBuf>,

    /// 叠加文字使用的TTF字体
    #[arg(long)]
    font: Option<PathBuf>,

    /// 帧队列长度
    #[arg(long, default_value_t = 8)]
    queue: usize,

    /// 实时模式: 按该帧率投递, 队列满时丢帧
    #[arg(long)]
    fps: Option<f64>,
}

impl Args {
    /// 命令行参数覆盖配置文件
    fn apply_overrides(&self, config: &mut CounterConfig) -> Result<()> {
        if let Some(v) = self.line_y {
            config.line_y = v;
        }
        if let Some(dir) = &self.direction {
            config.crossing_direction = dir.parse::<CrossingDirection>()?;
        }
        if self.inclusive {
            config.inclusive_line = true;
        }
        if let Some(v) = self.min_area {
            config.min_blob_area = v;
        }
        if let Some(v) = self.max_area {
            config.max_blob_area = v;
        }
        if let Some(v) = self.max_distance {
            config.max_match_distance = v;
        }
        if let Some(v) = self.max_missed {
            config.max_missed_frames = v;
        }
        if let Some(v) = self.threshold {
            config.motion_threshold = v;
        }
        Ok(())
    }

    fn open_source(&self) -> Result<Box<dyn FrameSource>> {
        match (&self.input, self.synthetic) {
            (Some(dir), _) => {
                let seq = ImageSequence::open(dir)
                    .with_context(|| format!("无法打开图像序列 {}", dir.display()))?;
                Ok(Box::new(seq))
            }
            (None, true) => Ok(Box::new(SyntheticScene::demo(
                self.width,
                self.height,
                self.frames,
            ))),
            (None, false) => Err(anyhow!("请指定 --input <目录> 或 --synthetic")),
        }
    }

    fn build_sinks(&self, config: &CounterConfig) -> Result<Vec<Box<dyn TickSink>>> {
        let mut sinks: Vec<Box<dyn TickSink>> = vec![Box::new(LogSink::default())];

        if let Some(path) = &self.events {
            let sink = JsonLinesSink::create(path)
                .with_context(|| format!("无法创建事件日志 {}", path.display()))?;
            sinks.push(Box::new(sink));
        }

        if !self.no_overlay {
            let dir = self
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("runs").join(gen_time_string("-")));
            let mut overlay = OverlayRenderer::new(&dir, config.line_y)
                .with_context(|| format!("无法创建输出目录 {}", dir.display()))?
                .with_every(self.save_every);
            if let Some(font) = &self.font {
                overlay = overlay.with_font_file(font)?;
            }
            sinks.push(Box::new(overlay));
        }

        Ok(sinks)
    }
}

/// 标准输入控制: r 重置计数, b 重建背景, q 退出
fn spawn_stdin_control(control: Sender<ControlMessage>, quit: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "r" | "R" => {
                    info!("⌨️  重置计数");
                    if control.send(ControlMessage::Reset).is_err() {
                        break;
                    }
                }
                "b" | "B" => {
                    info!("⌨️  重建背景");
                    if control.send(ControlMessage::ReinitializeBackground).is_err() {
                        break;
                    }
                }
                "q" | "Q" => {
                    info!("⌨️  退出");
                    quit.store(true, Ordering::Relaxed);
                    let _ = control.send(ControlMessage::Shutdown);
                    break;
                }
                "" => {}
                other => warn!("未知命令: {} (r=重置, b=重建背景, q=退出)", other),
            }
        }
    });
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // 1. 配置
    let mut config = match &args.config {
        Some(path) => CounterConfig::load(path)
            .with_context(|| format!("无法加载配置 {}", path.display()))?,
        None => CounterConfig::default(),
    };
    args.apply_overrides(&mut config)?;
    config.log_summary();

    let pipeline = Pipeline::new(config.clone()).context("配置无效")?;

    // 2. 帧源与输出
    let mut source = args.open_source()?;
    info!("🎬 帧源: {}", source.describe());
    let mut sinks = args.build_sinks(&config)?;

    // 3. 处理线程
    let worker = pipeline::spawn(pipeline, args.queue);
    let quit = Arc::new(AtomicBool::new(false));
    spawn_stdin_control(worker.controller(), Arc::clone(&quit));

    let results = worker.results();
    let output = std::thread::spawn(move || {
        let mut ticks = 0u64;
        for event in results.iter() {
            match event {
                WorkerEvent::Tick(result) => {
                    ticks += 1;
                    for sink in sinks.iter_mut() {
                        if let Err(e) = sink.on_tick(&result) {
                            warn!("⚠️  输出失败 (帧 {}): {}", result.frame_seq, e);
                        }
                    }
                }
                WorkerEvent::Error { frame_seq, error } => match error {
                    // 处理线程已重建背景, 后续帧按新尺寸处理
                    CounterError::DimensionMismatch { actual, .. } => {
                        info!("🔧 帧 {} 尺寸变为 {:?}, 从下一帧恢复处理", frame_seq, actual);
                    }
                    error if !error.is_recoverable() => {
                        error!("❌ 帧 {} 处理失败: {}", frame_seq, error);
                    }
                    _ => {}
                },
            }
        }
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.finish() {
                warn!("⚠️  输出收尾失败: {}", e);
            }
        }
        ticks
    });

    // 4. 投递帧
    let start = Instant::now();
    let interval = args.fps.filter(|f| *f > 0.0).map(|f| Duration::from_secs_f64(1.0 / f));
    let mut read_frames = 0u64;
    while let Some(frame) = source.next_frame() {
        if quit.load(Ordering::Relaxed) {
            break;
        }
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("⚠️  读取帧失败, 跳过: {}", e);
                continue;
            }
        };
        read_frames += 1;

        let delivered = match interval {
            Some(interval) => {
                worker.offer(frame);
                std::thread::sleep(interval);
                worker.is_running()
            }
            None => worker.submit(frame),
        };
        if !delivered {
            // 处理线程已退出
            break;
        }
    }

    // 5. 收尾
    let summary = worker
        .join()
        .map_err(|_| anyhow!("处理线程异常退出"))?;
    let rendered = output
        .join()
        .map_err(|_| anyhow!("输出线程异常退出"))?;

    let elapsed = start.elapsed().as_secs_f64();
    info!("================ 计数结果 ================");
    info!("读取帧数:   {}", read_frames);
    info!("处理帧数:   {}", summary.frames_processed);
    info!("输出帧数:   {}", rendered);
    info!("拒绝帧数:   {}", summary.frames_rejected);
    info!("丢弃帧数:   {}", summary.dropped_frames);
    info!("重置次数:   {}", summary.resets);
    info!("背景重建:   {}", summary.background_reinits);
    info!("总计数:     {}", summary.count.total_count());
    info!(
        "耗时:       {:.2}s ({:.1} fps)",
        elapsed,
        summary.frames_processed as f64 / elapsed.max(f64::EPSILON)
    );
    Ok(())
}
