/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use chrono::{DateTime, Local, Utc};
use tracing::info;

use crate::config::Config;
use crate::models::CaptureRecord;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 电路状态采集");
    info!("🌐 浏览器调试端口: {}", config.browser_debug_port);
    info!("🔒 消息白名单: {}", config.allowed_origins.join(", "));
    info!(
        "⏱️ 轮询间隔: {:?} | 备份有效期: {:?}",
        config.poll_interval, config.backup_ttl
    );
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 电路状态预览，换行压成空格
pub fn preview(blob: &str) -> String {
    truncate_text(&blob.split_whitespace().collect::<Vec<_>>().join(" "), 40)
}

/// "上次采集" 的展示文本
pub fn describe_record(record: &CaptureRecord, now: DateTime<Utc>) -> String {
    let age = record.age_at(now);
    let local: DateTime<Local> = record.captured_at.with_timezone(&Local);
    format!(
        "{} | {} ({} 秒前) | {}",
        record.method,
        local.format("%Y-%m-%d %H:%M:%S"),
        age.num_seconds().max(0),
        preview(&record.state_blob)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaptureMethod;
    use chrono::Duration;

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_text("电阻电容电感", 2), "电阻...");
        assert_eq!(truncate_text("R1", 5), "R1");
    }

    #[test]
    fn preview_flattens_newlines() {
        assert_eq!(preview("R1 5k;\nC1 10uF"), "R1 5k; C1 10uF");
    }

    #[test]
    fn describe_shows_method_and_age() {
        let now = Utc::now();
        let record = CaptureRecord::new("R1 5k", None, CaptureMethod::UrlPoll)
            .with_captured_at(now - Duration::seconds(42));
        let text = describe_record(&record, now);
        assert!(text.starts_with("url_poll"));
        assert!(text.contains("42 秒前"));
    }
}
