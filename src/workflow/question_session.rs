//! 题目会话 - 流程层
//!
//! 核心职责：一道题从打开到离开的完整生命周期
//!
//! - 打开：有效期内的备份 → 仲裁器；启动地址轮询、消息监听、手动录入
//! - 模拟 / 校验：平缓重试采集后调用远程服务
//! - 提交：走提交流水线，彻底失败时打开手动录入
//! - 离开：停止观察通道（进行中的重试不取消）

use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::{CaptureRecord, GradingPayload};
use crate::services::observers::{
    spawn_observer, ChannelObserver, IntakeHandle, ManualKind, MessageListener, UrlPoller,
};
use crate::utils::logging::describe_record;
use crate::workflow::question_ctx::QuestionCtx;
use crate::workflow::runtime::CaptureRuntime;
use crate::workflow::submission_pipeline::SubmissionReceipt;

/// 模拟 / 校验的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOutcome {
    /// 服务已返回
    Completed(JsonValue),
    /// 还没有任何可用的电路状态
    NothingCaptured,
}

/// 供展示的会话状态
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub question_id: String,
    pub current: Option<CaptureRecord>,
    pub backup: Option<CaptureRecord>,
    pub has_measurements: bool,
    pub intake_open: bool,
}

impl SessionStatus {
    pub fn lines(&self) -> Vec<String> {
        let now = Utc::now();
        let describe = |record: &Option<CaptureRecord>| match record {
            Some(record) => describe_record(record, now),
            None => "无".to_string(),
        };
        vec![
            format!("题目: {}", self.question_id),
            format!("当前状态: {}", describe(&self.current)),
            format!("本地备份: {}", describe(&self.backup)),
            format!("测量数据: {}", if self.has_measurements { "有" } else { "无" }),
            format!("手动录入: {}", if self.intake_open { "等待录入" } else { "未打开" }),
        ]
    }
}

pub struct QuestionSession {
    ctx: QuestionCtx,
    runtime: Arc<CaptureRuntime>,
    intake: IntakeHandle,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl QuestionSession {
    pub(crate) async fn start(runtime: Arc<CaptureRuntime>, ctx: QuestionCtx) -> Self {
        let question_id = ctx.question_id.clone();
        info!("{} 📂 打开题目", ctx);

        runtime.orchestrator.initial_load(&question_id).await;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (intake, intake_observer) = runtime.intake.attach(question_id.as_str());

        let observers: Vec<Box<dyn ChannelObserver>> = vec![
            Box::new(UrlPoller::new(
                question_id.as_str(),
                runtime.address.clone(),
                runtime.parser.clone(),
                runtime.sink.clone(),
                runtime.config.poll_interval,
            )),
            Box::new(MessageListener::new(
                question_id.as_str(),
                runtime.config.allowed_origins.clone(),
                runtime.parser.clone(),
                runtime.sink.clone(),
                runtime.port.subscribe(),
            )),
            Box::new(intake_observer),
        ];
        let tasks = observers
            .into_iter()
            .map(|observer| spawn_observer(observer, shutdown_rx.clone()))
            .collect();

        Self {
            ctx,
            runtime,
            intake,
            shutdown,
            tasks,
        }
    }

    pub fn ctx(&self) -> &QuestionCtx {
        &self.ctx
    }

    pub fn question_id(&self) -> &str {
        &self.ctx.question_id
    }

    /// 操作员手动录入
    pub async fn manual(&self, kind: ManualKind, text: &str) -> AppResult<bool> {
        self.intake.submit(kind, text).await
    }

    pub async fn simulate(&self) -> AppResult<ServiceOutcome> {
        let Some(payload) = self.interactive_payload("模拟").await else {
            return Ok(ServiceOutcome::NothingCaptured);
        };
        let response = self.runtime.service.simulate(&payload).await?;
        info!("{} ✓ 模拟完成", self.ctx);
        Ok(ServiceOutcome::Completed(response))
    }

    pub async fn validate(&self) -> AppResult<ServiceOutcome> {
        let Some(payload) = self.interactive_payload("校验").await else {
            return Ok(ServiceOutcome::NothingCaptured);
        };
        let response = self.runtime.service.validate(&payload).await?;
        info!("{} ✓ 校验完成", self.ctx);
        Ok(ServiceOutcome::Completed(response))
    }

    /// 提交评分；状态彻底拿不到时打开手动录入并中止
    pub async fn submit(&self) -> AppResult<SubmissionReceipt> {
        match self.runtime.pipeline.submit(self.question_id()).await {
            Err(e) if e.is_unrecoverable_capture() => {
                self.runtime.intake.open(self.question_id());
                warn!("{} ✍️ 已打开手动录入", self.ctx);
                Err(e)
            }
            other => other,
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let question_id = self.question_id();
        SessionStatus {
            question_id: question_id.to_string(),
            current: self.runtime.arbitrator().current(question_id),
            backup: self.runtime.backup().load(question_id).await,
            has_measurements: self.runtime.arbitrator().measurements(question_id).is_some(),
            intake_open: self.runtime.intake.is_open(question_id),
        }
    }

    /// 离开题目：停止本题的观察通道
    pub async fn unmount(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("{} 观察任务异常退出: {}", self.ctx, e);
            }
        }
        info!("{} 📁 已离开题目", self.ctx);
    }

    async fn interactive_payload(&self, action: &str) -> Option<GradingPayload> {
        let question_id = self.question_id();
        let record = self
            .runtime
            .orchestrator
            .capture_with_retry(question_id, true, &self.runtime.config.interactive_retry)
            .await;
        match record {
            Some(record) => {
                let measurements = self.runtime.arbitrator().measurements(question_id);
                Some(GradingPayload::from_record(question_id, &record, measurements))
            }
            None => {
                warn!("{} ⚠️ 还没有采集到电路状态，无法{}", self.ctx, action);
                None
            }
        }
    }
}
