// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 计数器配置 - 通过JSON文件调整参数
//! Counter configuration, read once at start

use crate::error::{CounterError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 计数方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossingDirection {
    /// 从上往下 (y 增大)
    Down,
    /// 从下往上 (y 减小)
    Up,
    /// 任意方向
    Either,
}

impl CrossingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Up => "up",
            Self::Either => "either",
        }
    }
}

impl std::str::FromStr for CrossingDirection {
    type Err = CounterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "down" => Ok(Self::Down),
            "up" => Ok(Self::Up),
            "either" | "both" => Ok(Self::Either),
            other => Err(CounterError::InvalidConfiguration(format!(
                "unknown crossing direction '{}'",
                other
            ))),
        }
    }
}

/// 计数系统参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    // === 计数线 ===
    pub line_y: f32,                          // 计数线Y坐标
    pub crossing_direction: CrossingDirection, // 计数方向
    pub inclusive_line: bool,                 // 压线是否视为越线

    // === 目标过滤 ===
    pub min_blob_area: u32,                     // 最小目标面积 (过滤噪点)
    pub max_blob_area: u32,                     // 最大目标面积 (过滤光照突变)
    pub aspect_ratio_range: Option<(f32, f32)>, // 宽高比范围 (箱形目标)
    pub min_fill_ratio: Option<f32>,            // 面积/外接框面积 下限

    // === 跟踪参数 ===
    pub max_match_distance: f32, // 质心匹配最大距离(像素)
    pub max_missed_frames: u32,  // 最大连续丢失帧数
    pub history_len: usize,      // 轨迹长度

    // === 背景建模 ===
    pub motion_threshold: u8, // 前景差分阈值
    pub learning_rate: f32,   // 背景更新速率
    pub open_radius: u8,      // 开运算半径 (去噪点)
    pub close_radius: u8,     // 闭运算半径 (合并碎片)
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            line_y: 250.0,
            crossing_direction: CrossingDirection::Either,
            inclusive_line: false,

            min_blob_area: 1000,
            max_blob_area: 50000,
            aspect_ratio_range: None,
            min_fill_ratio: None,

            max_match_distance: 50.0,
            max_missed_frames: 15,
            history_len: 32,

            motion_threshold: 25,
            learning_rate: 0.02,
            open_radius: 1,
            close_radius: 3,
        }
    }
}

impl CounterConfig {
    /// 从JSON文件加载配置, 文件不存在时写出默认配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => {
                let config: Self = serde_json::from_str(&json)?;
                info!("✅ 配置已从 {} 加载", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("📝 配置文件 {} 不存在,创建默认配置...", path.display());
                let config = Self::default();
                config.save(path)?;
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 保存配置到JSON文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("💾 配置已保存到 {}", path.as_ref().display());
        Ok(())
    }

    /// 检查参数合法性
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CounterError::InvalidConfiguration(msg));

        if !self.line_y.is_finite() {
            return invalid(format!("line_y must be finite, got {}", self.line_y));
        }
        if self.max_blob_area == 0 {
            return invalid("max_blob_area must be positive".into());
        }
        if self.min_blob_area > self.max_blob_area {
            return invalid(format!(
                "min_blob_area ({}) exceeds max_blob_area ({})",
                self.min_blob_area, self.max_blob_area
            ));
        }
        if let Some((lo, hi)) = self.aspect_ratio_range {
            if !(lo > 0.0 && lo <= hi && hi.is_finite()) {
                return invalid(format!("aspect_ratio_range ({}, {}) is not a valid range", lo, hi));
            }
        }
        if let Some(fill) = self.min_fill_ratio {
            if !(0.0..=1.0).contains(&fill) {
                return invalid(format!("min_fill_ratio must lie in [0, 1], got {}", fill));
            }
        }
        if !(self.max_match_distance.is_finite() && self.max_match_distance > 0.0) {
            return invalid(format!(
                "max_match_distance must be positive, got {}",
                self.max_match_distance
            ));
        }
        if self.max_missed_frames == 0 {
            return invalid("max_missed_frames must be at least 1".into());
        }
        if self.history_len < 2 {
            return invalid(format!(
                "history_len must keep at least 2 samples, got {}",
                self.history_len
            ));
        }
        if self.motion_threshold == u8::MAX {
            return invalid("motion_threshold of 255 can never be exceeded".into());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return invalid(format!(
                "learning_rate must lie in (0, 1], got {}",
                self.learning_rate
            ));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!("🎛️  当前计数配置:");
        info!(
            "  计数线: y={} 方向={} 压线计数={}",
            self.line_y,
            self.crossing_direction.as_str(),
            self.inclusive_line
        );
        info!("  目标面积: {}..={}", self.min_blob_area, self.max_blob_area);
        info!(
            "  匹配距离: {:.1}px 最大丢失帧: {}",
            self.max_match_distance, self.max_missed_frames
        );
        info!(
            "  前景阈值: {} 背景速率: {:.3}",
            self.motion_threshold, self.learning_rate
        );
    }
}
