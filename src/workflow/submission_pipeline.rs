//! 提交流水线 - 流程层
//!
//! 按固定顺序逐层兜底，拿到第一个非空状态就停：
//! 1. 强制刷新采集
//! 2. 仲裁器当前记录
//! 3. 有效期内的本地备份
//! 4. 不限新鲜度的兜底扫描
//!
//! 四层全空时不提交占位内容，直接报不可恢复错误，由调用方打开手动录入。

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AppResult, CaptureError};
use crate::models::{CaptureMethod, CaptureRecord, FallbackTier, GradingPayload, Submission};
use crate::services::{AssessmentService, CaptureSink};
use crate::utils::logging::preview;
use crate::workflow::capture_orchestrator::CaptureOrchestrator;
use crate::workflow::retry_policy::RetryPolicy;

/// 评分服务已受理的提交
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub submission: Submission,
    pub response: JsonValue,
}

pub struct SubmissionPipeline {
    orchestrator: Arc<CaptureOrchestrator>,
    sink: CaptureSink,
    service: Arc<dyn AssessmentService>,
    policy: RetryPolicy,
}

impl SubmissionPipeline {
    pub fn new(
        orchestrator: Arc<CaptureOrchestrator>,
        sink: CaptureSink,
        service: Arc<dyn AssessmentService>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            orchestrator,
            sink,
            service,
            policy,
        }
    }

    /// 走完兜底链，选定记录并在网络调用前重新写入备份
    ///
    /// 只回写实时通道产生的记录，且保留原渠道标签；
    /// `backup_restore` / `fallback_any` 只出现在提交内容里，不落进存储。
    pub async fn prepare(&self, question_id: &str) -> AppResult<Submission> {
        let Some(selected) = self.select(question_id).await else {
            error!("[题目 {}] ❌ 四层兜底全部落空，中止提交", question_id);
            return Err(CaptureError::Unrecoverable {
                question_id: question_id.to_string(),
            }
            .into());
        };
        let Selected {
            tier,
            source,
            record,
        } = selected;

        info!(
            "[题目 {}] ✓ 命中{} ({} ← {}): {}",
            question_id,
            tier,
            record.method,
            source.method,
            preview(&record.state_blob)
        );
        if source.method.is_live() {
            self.sink.backup().save(question_id, &source).await;
        }

        let measurements = self.sink.arbitrator().measurements(question_id);
        let payload = GradingPayload::from_record(question_id, &record, measurements);
        Ok(Submission {
            tier,
            record,
            payload,
        })
    }

    /// 准备并发送评分请求
    pub async fn submit(&self, question_id: &str) -> AppResult<SubmissionReceipt> {
        let submission = self.prepare(question_id).await?;
        info!("[题目 {}] 📤 正在提交评分...", question_id);
        match self.service.grade(&submission.payload).await {
            Ok(response) => {
                info!("[题目 {}] ✓ 评分提交成功", question_id);
                Ok(SubmissionReceipt {
                    submission,
                    response,
                })
            }
            Err(e) => {
                // 备份已写入，重试提交不会丢状态
                warn!("[题目 {}] ⚠️ 评分提交失败: {}", question_id, e);
                Err(e)
            }
        }
    }

    async fn select(&self, question_id: &str) -> Option<Selected> {
        let fresh = self
            .orchestrator
            .capture_with_retry(question_id, true, &self.policy)
            .await;
        if let Some(record) = non_blank(fresh) {
            // 主动采集自己退回到了备份，按第三层记
            let tier = if record.method == CaptureMethod::BackupRestore {
                FallbackTier::Backup
            } else {
                FallbackTier::FreshCapture
            };
            return Some(Selected::as_is(tier, record));
        }

        if let Some(record) = non_blank(self.sink.arbitrator().current(question_id)) {
            return Some(Selected::as_is(FallbackTier::Arbitrator, record));
        }

        if let Some(record) = non_blank(self.sink.backup().load(question_id).await) {
            return Some(Selected::tagged(
                FallbackTier::Backup,
                record,
                CaptureMethod::BackupRestore,
            ));
        }

        self.scan_any(question_id).await.map(|record| {
            Selected::tagged(FallbackTier::AnyAvailable, record, CaptureMethod::FallbackAny)
        })
    }

    /// 最后一搏：不管新鲜度和有效期，任何非空状态都行
    ///
    /// 仲裁器和备份都有时取渠道优先级高的，相同时仲裁器优先。
    async fn scan_any(&self, question_id: &str) -> Option<CaptureRecord> {
        warn!("[题目 {}] ⚠️ 进入兜底扫描", question_id);
        let held = non_blank(self.sink.arbitrator().current(question_id));
        let stored = non_blank(self.sink.backup().load_any(question_id).await);
        let best = match (held, stored) {
            (Some(held), Some(stored)) if stored.method.priority() > held.method.priority() => {
                Some(stored)
            }
            (Some(held), _) => Some(held),
            (None, stored) => stored,
        };
        if best.is_some() {
            return best;
        }
        non_blank(self.orchestrator.read_address_once(question_id).await)
    }
}

/// 选中的记录：`source` 是原样的记录，`record` 带着本次提交使用的渠道标签
struct Selected {
    tier: FallbackTier,
    source: CaptureRecord,
    record: CaptureRecord,
}

impl Selected {
    fn as_is(tier: FallbackTier, record: CaptureRecord) -> Self {
        Self {
            tier,
            source: record.clone(),
            record,
        }
    }

    fn tagged(tier: FallbackTier, source: CaptureRecord, method: CaptureMethod) -> Self {
        Self {
            tier,
            record: source.retagged(method),
            source,
        }
    }
}

fn non_blank(record: Option<CaptureRecord>) -> Option<CaptureRecord> {
    record.filter(|r| !r.is_blank())
}
