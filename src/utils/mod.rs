// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 工具函数
/// Utility helpers

/// 本地时间字符串, 各字段之间以 `delimiter` 分隔 (用于输出目录命名)
pub fn gen_time_string(delimiter: &str) -> String {
    let fmt = format!(
        "%Y{d}%m{d}%d{d}%H{d}%M{d}%S{d}%3f",
        d = delimiter
    );
    chrono::Local::now().format(&fmt).to_string()
}
