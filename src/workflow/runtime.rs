//! 采集运行时 - 流程层
//!
//! 把通道、仲裁器、备份、主动采集、提交流水线装配到一起，
//! 并负责按题目挂载会话。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{KeyValueStore, MessagePort, SurfaceAddress};
use crate::services::observers::ManualIntake;
use crate::services::{Arbitrator, AssessmentService, BackupStore, CaptureSink, StateTokenParser};
use crate::workflow::capture_orchestrator::CaptureOrchestrator;
use crate::workflow::question_ctx::QuestionCtx;
use crate::workflow::question_session::QuestionSession;
use crate::workflow::submission_pipeline::SubmissionPipeline;

pub struct CaptureRuntime {
    pub(crate) config: Config,
    pub(crate) address: Arc<dyn SurfaceAddress>,
    pub(crate) port: Arc<dyn MessagePort>,
    pub(crate) parser: Arc<StateTokenParser>,
    pub(crate) sink: CaptureSink,
    pub(crate) intake: Arc<ManualIntake>,
    pub(crate) orchestrator: Arc<CaptureOrchestrator>,
    pub(crate) pipeline: SubmissionPipeline,
    pub(crate) service: Arc<dyn AssessmentService>,
    mounts: AtomicUsize,
}

impl CaptureRuntime {
    pub fn new(
        config: Config,
        address: Arc<dyn SurfaceAddress>,
        port: Arc<dyn MessagePort>,
        store: Arc<dyn KeyValueStore>,
        service: Arc<dyn AssessmentService>,
    ) -> AppResult<Arc<Self>> {
        let parser = Arc::new(StateTokenParser::new(config.state_params.as_slice())?);
        let sink = CaptureSink::new(
            Arc::new(Arbitrator::new()),
            Arc::new(BackupStore::new(store, config.backup_ttl)),
        );
        let intake = Arc::new(ManualIntake::new(parser.clone(), sink.clone()));
        let orchestrator = Arc::new(CaptureOrchestrator::new(
            address.clone(),
            port.clone(),
            parser.clone(),
            sink.clone(),
        ));
        let pipeline = SubmissionPipeline::new(
            orchestrator.clone(),
            sink.clone(),
            service.clone(),
            config.submission_retry,
        );

        Ok(Arc::new(Self {
            config,
            address,
            port,
            parser,
            sink,
            intake,
            orchestrator,
            pipeline,
            service,
            mounts: AtomicUsize::new(0),
        }))
    }

    /// 打开一道题：从备份初始化并启动三个观察通道
    pub async fn mount(self: &Arc<Self>, question_id: &str) -> QuestionSession {
        let mount_index = self.mounts.fetch_add(1, Ordering::SeqCst) + 1;
        let ctx = QuestionCtx::new(question_id, mount_index);
        QuestionSession::start(Arc::clone(self), ctx).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn arbitrator(&self) -> &Arc<Arbitrator> {
        self.sink.arbitrator()
    }

    pub fn backup(&self) -> &Arc<BackupStore> {
        self.sink.backup()
    }

    pub fn intake(&self) -> &Arc<ManualIntake> {
        &self.intake
    }

    pub fn orchestrator(&self) -> &Arc<CaptureOrchestrator> {
        &self.orchestrator
    }

    pub fn pipeline(&self) -> &SubmissionPipeline {
        &self.pipeline
    }
}
