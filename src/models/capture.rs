use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 采集渠道标签
///
/// 标明一条记录是由哪条通道产生的，一路带到评分请求里用于审计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    /// 操作员粘贴的导出文本
    ManualExport,
    /// 操作员粘贴的分享地址
    UrlInput,
    /// 消息通道推送的带状态地址
    MessageUrl,
    /// 轮询读取到的 iframe 地址
    UrlPoll,
    /// 消息通道推送的结构化状态
    MessagePush,
    /// 从本地备份恢复
    BackupRestore,
    /// 兜底扫描得到
    FallbackAny,
}

impl CaptureMethod {
    /// 读取路径使用的优先级，数值越大越优先
    ///
    /// 备份和兜底只在没有实时记录时使用，所以排在最后。
    pub fn priority(self) -> u8 {
        match self {
            CaptureMethod::ManualExport => 5,
            CaptureMethod::UrlInput => 4,
            CaptureMethod::MessageUrl => 3,
            CaptureMethod::UrlPoll => 2,
            CaptureMethod::MessagePush => 1,
            CaptureMethod::BackupRestore | CaptureMethod::FallbackAny => 0,
        }
    }

    /// 是否来自实时通道（非备份、非兜底）
    pub fn is_live(self) -> bool {
        self.priority() > 0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaptureMethod::ManualExport => "manual_export",
            CaptureMethod::UrlInput => "url_input",
            CaptureMethod::MessageUrl => "message_url",
            CaptureMethod::UrlPoll => "url_poll",
            CaptureMethod::MessagePush => "message_push",
            CaptureMethod::BackupRestore => "backup_restore",
            CaptureMethod::FallbackAny => "fallback_any",
        }
    }
}

impl fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单道题的电路状态快照
///
/// `state_blob` 是模拟器自定义的编码，宿主只保存和转发，从不解析。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRecord {
    pub state_blob: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub method: CaptureMethod,
    pub captured_at: DateTime<Utc>,
}

impl CaptureRecord {
    /// 以当前时间创建记录
    pub fn new(state_blob: impl Into<String>, source_url: Option<String>, method: CaptureMethod) -> Self {
        Self {
            state_blob: state_blob.into(),
            source_url,
            method,
            captured_at: Utc::now(),
        }
    }

    /// 指定采集时间（恢复备份、测试时使用）
    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// 换一个渠道标签返回副本，原记录不变
    pub fn retagged(&self, method: CaptureMethod) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }

    /// trim 之后是否为空
    pub fn is_blank(&self) -> bool {
        self.state_blob.trim().is_empty()
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.captured_at
    }

    /// 两条记录内容是否一致（只比较 state_blob）
    pub fn same_content(&self, other: &CaptureRecord) -> bool {
        self.state_blob == other.state_blob
    }
}
