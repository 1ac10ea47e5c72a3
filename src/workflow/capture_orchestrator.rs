//! 主动采集 - 流程层
//!
//! 需要"尽量新鲜"的状态时，发请求、等回应、反复重读，有上限地重试。
//!
//! 流程顺序：
//! 1. 已有记录且不强制刷新 → 直接返回
//! 2. 直接读一次地址
//! 3. 广播采集请求，按重试策略等待并重读地址 / 重查仲裁器
//! 4. 仍然没有 → 有效期内的本地备份
//! 5. 全部落空 → None

use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::infrastructure::{MessagePort, SurfaceAddress};
use crate::models::{CaptureMethod, CaptureRecord, CaptureRequest};
use crate::services::{CaptureSink, StateTokenParser};
use crate::workflow::retry_policy::RetryPolicy;

pub struct CaptureOrchestrator {
    address: Arc<dyn SurfaceAddress>,
    port: Arc<dyn MessagePort>,
    parser: Arc<StateTokenParser>,
    sink: CaptureSink,
}

impl CaptureOrchestrator {
    pub fn new(
        address: Arc<dyn SurfaceAddress>,
        port: Arc<dyn MessagePort>,
        parser: Arc<StateTokenParser>,
        sink: CaptureSink,
    ) -> Self {
        Self {
            address,
            port,
            parser,
            sink,
        }
    }

    pub async fn capture_with_retry(
        &self,
        question_id: &str,
        force_fresh: bool,
        policy: &RetryPolicy,
    ) -> Option<CaptureRecord> {
        if !force_fresh {
            if let Some(current) = self.current(question_id) {
                trace!("[题目 {}] 使用已有记录 ({})", question_id, current.method);
                return Some(current);
            }
        }

        if let Some(record) = self.read_address_once(question_id).await {
            return Some(record);
        }

        let delivered = self.request_capture().await;
        debug!(
            "[题目 {}] 📨 已发送 {} 条采集请求，最多等待 {} 次 (共 {:?})",
            question_id,
            delivered,
            policy.max_attempts,
            policy.total_budget()
        );

        for attempt in 1..=policy.max_attempts {
            sleep(policy.delay_for(attempt)).await;

            if let Some(record) = self.read_address_once(question_id).await {
                return Some(record);
            }
            if let Some(current) = self.current(question_id) {
                debug!(
                    "[题目 {}] ✓ 第 {}/{} 次尝试拿到状态 ({})",
                    question_id, attempt, policy.max_attempts, current.method
                );
                return Some(current);
            }
            debug!(
                "[题目 {}] 第 {}/{} 次尝试未获取到状态",
                question_id, attempt, policy.max_attempts
            );
        }

        info!("[题目 {}] 重试用尽，尝试本地备份", question_id);
        match self.sink.backup().load(question_id).await {
            Some(record) => {
                info!(
                    "[题目 {}] 💾 使用本地备份 (原渠道 {})",
                    question_id, record.method
                );
                Some(record.retagged(CaptureMethod::BackupRestore))
            }
            None => {
                warn!("[题目 {}] ⚠️ 没有可用的电路状态", question_id);
                None
            }
        }
    }

    /// 直接读一次地址，读到状态则交给仲裁器并返回当前记录
    pub async fn read_address_once(&self, question_id: &str) -> Option<CaptureRecord> {
        let href = match self.address.read_address().await {
            Ok(href) => href,
            Err(e) => {
                trace!("[题目 {}] 直接读取地址失败: {}", question_id, e);
                return None;
            }
        };
        let token = self.parser.extract(&href)?;
        let record = CaptureRecord::new(token.value, Some(href), CaptureMethod::UrlPoll);
        self.sink.offer(question_id, record.clone()).await;
        Some(self.current(question_id).unwrap_or(record))
    }

    /// 用所有形态广播采集请求，返回成功发出的条数
    pub async fn request_capture(&self) -> usize {
        let mut delivered = 0;
        for request in CaptureRequest::all_shapes() {
            match self.port.post(&request).await {
                Ok(()) => delivered += 1,
                Err(e) => trace!("采集请求未送达: {}", e),
            }
        }
        delivered
    }

    /// 挂载题目时用有效期内的备份初始化仲裁器（不重复写备份）
    pub async fn initial_load(&self, question_id: &str) -> Option<CaptureRecord> {
        if let Some(current) = self.current(question_id) {
            return Some(current);
        }
        let record = self.sink.backup().load(question_id).await?;
        let restored = record.retagged(CaptureMethod::BackupRestore);
        self.sink
            .arbitrator()
            .accept(question_id, restored.clone());
        info!(
            "[题目 {}] 💾 已从本地备份恢复 ({})",
            question_id,
            restored.captured_at.format("%H:%M:%S")
        );
        Some(restored)
    }

    fn current(&self, question_id: &str) -> Option<CaptureRecord> {
        self.sink
            .arbitrator()
            .current(question_id)
            .filter(|r| !r.is_blank())
    }
}
