//! 手动录入 - 业务能力层

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::{Channel, ChannelObserver};
use crate::error::{AppError, AppResult, CaptureError};
use crate::models::{CaptureMethod, CaptureRecord};
use crate::services::capture_sink::CaptureSink;
use crate::services::state_token::StateTokenParser;

/// 手动录入的两种形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualKind {
    /// 完整的分享地址
    Address,
    /// 模拟器导出的文本
    Transcript,
}

/// 操作员提交的一条录入，处理结果通过 `reply` 返回
#[derive(Debug)]
pub struct ManualEntry {
    pub kind: ManualKind,
    pub text: String,
    pub reply: oneshot::Sender<Result<bool, CaptureError>>,
}

/// 手动录入
///
/// 提交流水线彻底失败时会"打开"对应题目的录入，录入成功后关闭。
pub struct ManualIntake {
    parser: Arc<StateTokenParser>,
    sink: CaptureSink,
    open: Mutex<HashSet<String>>,
}

impl ManualIntake {
    pub fn new(parser: Arc<StateTokenParser>, sink: CaptureSink) -> Self {
        Self {
            parser,
            sink,
            open: Mutex::new(HashSet::new()),
        }
    }

    /// 粘贴分享地址，按地址轮询同样的规则解析
    pub async fn submit_address(&self, question_id: &str, text: &str) -> Result<bool, CaptureError> {
        let address = text.trim();
        if address.is_empty() {
            return Err(CaptureError::EmptyInput { field: "分享地址" });
        }
        let token = self
            .parser
            .extract(address)
            .ok_or_else(|| CaptureError::MissingStateToken {
                input: address.to_string(),
            })?;
        let record = CaptureRecord::new(token.value, Some(address.to_string()), CaptureMethod::UrlInput);
        Ok(self.commit(question_id, record).await)
    }

    /// 粘贴导出文本，原样保存
    pub async fn submit_transcript(&self, question_id: &str, text: &str) -> Result<bool, CaptureError> {
        if text.trim().is_empty() {
            return Err(CaptureError::EmptyInput { field: "导出文本" });
        }
        let record = CaptureRecord::new(text, None, CaptureMethod::ManualExport);
        Ok(self.commit(question_id, record).await)
    }

    pub async fn submit(&self, question_id: &str, kind: ManualKind, text: &str) -> Result<bool, CaptureError> {
        match kind {
            ManualKind::Address => self.submit_address(question_id, text).await,
            ManualKind::Transcript => self.submit_transcript(question_id, text).await,
        }
    }

    async fn commit(&self, question_id: &str, record: CaptureRecord) -> bool {
        let method = record.method;
        let accepted = self.sink.offer(question_id, record).await;
        // 内容与当前记录相同也算录入成功
        self.close(question_id);
        info!(
            "[题目 {}] ✍️ 手动录入完成 ({}){}",
            question_id,
            method,
            if accepted { "" } else { "，内容与当前记录一致" }
        );
        accepted
    }

    /// 打开录入界面（提交彻底失败时调用）
    pub fn open(&self, question_id: &str) {
        self.open_set().insert(question_id.to_string());
    }

    pub fn close(&self, question_id: &str) {
        self.open_set().remove(question_id);
    }

    pub fn is_open(&self, question_id: &str) -> bool {
        self.open_set().contains(question_id)
    }

    fn open_set(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 为某道题创建录入通道：操作员一侧拿 `IntakeHandle`，观察一侧交给会话启动
    pub fn attach(self: &Arc<Self>, question_id: impl Into<String>) -> (IntakeHandle, IntakeObserver) {
        let question_id = question_id.into();
        let (tx, rx) = mpsc::channel(16);
        (
            IntakeHandle {
                question_id: question_id.clone(),
                entries: tx,
            },
            IntakeObserver {
                question_id,
                intake: Arc::clone(self),
                entries: rx,
            },
        )
    }
}

/// 操作员一侧的录入入口
#[derive(Clone)]
pub struct IntakeHandle {
    question_id: String,
    entries: mpsc::Sender<ManualEntry>,
}

impl IntakeHandle {
    pub fn question_id(&self) -> &str {
        &self.question_id
    }

    pub async fn submit(&self, kind: ManualKind, text: impl Into<String>) -> AppResult<bool> {
        let (reply, response) = oneshot::channel();
        let entry = ManualEntry {
            kind,
            text: text.into(),
            reply,
        };
        let detached = || AppError::Other(format!("题目 {} 的录入通道已关闭", self.question_id));
        self.entries.send(entry).await.map_err(|_| detached())?;
        let result = response.await.map_err(|_| detached())?;
        Ok(result?)
    }
}

/// 手动录入的观察通道，逐条处理操作员提交
pub struct IntakeObserver {
    question_id: String,
    intake: Arc<ManualIntake>,
    entries: mpsc::Receiver<ManualEntry>,
}

#[async_trait]
impl ChannelObserver for IntakeObserver {
    fn channel(&self) -> Channel {
        Channel::ManualInput
    }

    fn question_id(&self) -> &str {
        &self.question_id
    }

    async fn run(self: Box<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut observer = *self;
        loop {
            tokio::select! {
                entry = observer.entries.recv() => {
                    let Some(entry) = entry else { break };
                    let result = observer
                        .intake
                        .submit(&observer.question_id, entry.kind, &entry.text)
                        .await;
                    if let Err(e) = &result {
                        warn!("[题目 {}] {}", observer.question_id, e.operator_prompt());
                    }
                    let _ = entry.reply.send(result);
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("[题目 {}] 手动录入通道已关闭", observer.question_id);
    }
}
