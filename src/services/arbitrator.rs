//! 状态仲裁器 - 业务能力层
//!
//! 每道题只保留一条"当前"记录。三个观察通道的并发观测都在这里串行化，
//! 这是整个采集协议唯一的同步点。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::models::{CaptureRecord, Measurements};
use crate::utils::logging::preview;

/// 单道题的状态
#[derive(Debug, Default)]
struct QuestionState {
    current: Option<CaptureRecord>,
    measurements: Option<Measurements>,
}

#[derive(Debug, Default)]
pub struct Arbitrator {
    questions: Mutex<HashMap<String, QuestionState>>,
}

impl Arbitrator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, QuestionState>> {
        // 临界区内没有会 panic 的逻辑，锁中毒时直接沿用数据
        self.questions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 候选记录与当前记录内容不同（或当前没有记录）时接受并替换
    ///
    /// 不看渠道优先级；空状态一律拒绝。
    pub fn accept(&self, question_id: &str, candidate: CaptureRecord) -> bool {
        if candidate.is_blank() {
            debug!("[题目 {}] 拒绝空状态 ({})", question_id, candidate.method);
            return false;
        }
        let mut questions = self.lock();
        let state = questions.entry(question_id.to_string()).or_default();
        if let Some(current) = &state.current {
            if current.same_content(&candidate) {
                debug!(
                    "[题目 {}] 内容未变化，忽略 {} 观测",
                    question_id, candidate.method
                );
                return false;
            }
        }
        info!(
            "[题目 {}] ✓ 接受新状态 ({}): {}",
            question_id,
            candidate.method,
            preview(&candidate.state_blob)
        );
        state.current = Some(candidate);
        true
    }

    pub fn current(&self, question_id: &str) -> Option<CaptureRecord> {
        self.lock()
            .get(question_id)
            .and_then(|state| state.current.clone())
    }

    /// 测量数据不参与仲裁，最后一次为准
    pub fn set_measurements(&self, question_id: &str, measurements: Measurements) {
        let mut questions = self.lock();
        questions.entry(question_id.to_string()).or_default().measurements = Some(measurements);
    }

    pub fn measurements(&self, question_id: &str) -> Option<Measurements> {
        self.lock()
            .get(question_id)
            .and_then(|state| state.measurements.clone())
    }
}
