//! 采集汇聚点 - 业务能力层
//!
//! 观察通道 → 仲裁器 → 本地备份。所有通道都通过这里落地。

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{CaptureRecord, Measurements};
use crate::services::arbitrator::Arbitrator;
use crate::services::backup_store::BackupStore;

#[derive(Clone)]
pub struct CaptureSink {
    arbitrator: Arc<Arbitrator>,
    backup: Arc<BackupStore>,
    /// 仲裁和写备份在同一把锁里完成，备份写入顺序与接受顺序一致
    commit: Arc<Mutex<()>>,
}

impl CaptureSink {
    pub fn new(arbitrator: Arc<Arbitrator>, backup: Arc<BackupStore>) -> Self {
        Self {
            arbitrator,
            backup,
            commit: Arc::new(Mutex::new(())),
        }
    }

    pub fn arbitrator(&self) -> &Arc<Arbitrator> {
        &self.arbitrator
    }

    pub fn backup(&self) -> &Arc<BackupStore> {
        &self.backup
    }

    /// 提交一条候选记录；被接受时同步写备份
    pub async fn offer(&self, question_id: &str, candidate: CaptureRecord) -> bool {
        let _commit = self.commit.lock().await;
        let accepted = self.arbitrator.accept(question_id, candidate.clone());
        if accepted {
            self.backup.save(question_id, &candidate).await;
        }
        accepted
    }

    pub fn record_measurements(&self, question_id: &str, measurements: Measurements) {
        self.arbitrator.set_measurements(question_id, measurements);
    }
}
