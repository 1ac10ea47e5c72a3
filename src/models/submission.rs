use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::capture::{CaptureMethod, CaptureRecord};
use super::message::Measurements;

/// 提交流水线命中的兜底层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTier {
    /// 第 1 层：强制刷新采集
    FreshCapture,
    /// 第 2 层：仲裁器当前记录
    Arbitrator,
    /// 第 3 层：有效期内的备份
    Backup,
    /// 第 4 层：不限新鲜度的兜底扫描
    AnyAvailable,
}

impl FallbackTier {
    pub fn level(self) -> u8 {
        match self {
            FallbackTier::FreshCapture => 1,
            FallbackTier::Arbitrator => 2,
            FallbackTier::Backup => 3,
            FallbackTier::AnyAvailable => 4,
        }
    }
}

impl fmt::Display for FallbackTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FallbackTier::FreshCapture => "强制刷新采集",
            FallbackTier::Arbitrator => "仲裁器记录",
            FallbackTier::Backup => "本地备份",
            FallbackTier::AnyAvailable => "兜底扫描",
        };
        write!(f, "第{}层({})", self.level(), name)
    }
}

/// 发给评分 / 模拟 / 校验服务的请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingPayload {
    pub question_id: String,
    pub state_blob: String,
    pub source_url: Option<String>,
    pub measurements: Option<Measurements>,
    pub method: CaptureMethod,
    pub captured_at: DateTime<Utc>,
}

impl GradingPayload {
    pub fn from_record(
        question_id: &str,
        record: &CaptureRecord,
        measurements: Option<Measurements>,
    ) -> Self {
        Self {
            question_id: question_id.to_string(),
            state_blob: record.state_blob.clone(),
            source_url: record.source_url.clone(),
            measurements,
            method: record.method,
            captured_at: record.captured_at,
        }
    }
}

/// 流水线准备好的提交内容
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub tier: FallbackTier,
    pub record: CaptureRecord,
    pub payload: GradingPayload,
}
