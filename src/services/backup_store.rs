//! 本地备份服务 - 业务能力层
//!
//! 以题目 ID 为键，把最近一次成功采集的记录写进浏览器本地存储。
//! 备份丢失只是服务降级，所以写入永远不向调用方报错。

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::infrastructure::KeyValueStore;
use crate::models::CaptureRecord;
use crate::utils::logging::preview;

pub const KEY_PREFIX: &str = "circuit_state_";

pub struct BackupStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl BackupStore {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: std::time::Duration) -> Self {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::hours(1));
        Self { store, ttl }
    }

    pub fn key_for(question_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, question_id)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 保存备份，空状态跳过，失败只记日志
    pub async fn save(&self, question_id: &str, record: &CaptureRecord) {
        if record.is_blank() {
            debug!("[题目 {}] 状态为空，跳过备份", question_id);
            return;
        }
        let key = Self::key_for(question_id);
        let value = match serde_json::to_string(record) {
            Ok(value) => value,
            Err(e) => {
                warn!("[题目 {}] ⚠️ 备份序列化失败: {}", question_id, e);
                return;
            }
        };
        match self.store.set_item(&key, &value).await {
            Ok(()) => debug!(
                "[题目 {}] 💾 已备份 ({}): {}",
                question_id,
                record.method,
                preview(&record.state_blob)
            ),
            Err(e) => warn!("[题目 {}] ⚠️ 备份写入失败，继续运行: {}", question_id, e),
        }
    }

    /// 读取有效期内的备份
    pub async fn load(&self, question_id: &str) -> Option<CaptureRecord> {
        self.load_at(question_id, Utc::now()).await
    }

    /// 以指定时间判断有效期；过期记录视为不存在，但不删除
    pub async fn load_at(&self, question_id: &str, now: DateTime<Utc>) -> Option<CaptureRecord> {
        let record = self.load_any(question_id).await?;
        let age = record.age_at(now);
        if age > self.ttl {
            debug!(
                "[题目 {}] 备份已过期 ({} 分钟前)",
                question_id,
                age.num_minutes()
            );
            return None;
        }
        Some(record)
    }

    /// 读取备份，不检查有效期（兜底扫描使用）
    pub async fn load_any(&self, question_id: &str) -> Option<CaptureRecord> {
        match self.read(question_id).await {
            Ok(record) => record.filter(|r| !r.is_blank()),
            Err(e) => {
                debug!("[题目 {}] 读取备份失败: {}", question_id, e);
                None
            }
        }
    }

    async fn read(&self, question_id: &str) -> Result<Option<CaptureRecord>, StorageError> {
        let key = Self::key_for(question_id);
        let Some(raw) = self.store.get_item(&key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key,
                source: Box::new(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryStore;
    use crate::models::CaptureMethod;
    use async_trait::async_trait;

    struct QuotaExceededStore;

    #[async_trait]
    impl KeyValueStore for QuotaExceededStore {
        async fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable {
                reason: "SecurityError".into(),
            })
        }

        async fn set_item(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "QuotaExceededError".into(),
            })
        }
    }

    fn backup(store: Arc<dyn KeyValueStore>) -> BackupStore {
        BackupStore::new(store, std::time::Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn saves_under_question_key() {
        let store = Arc::new(MemoryStore::new());
        let backup = backup(store.clone());
        let record = CaptureRecord::new("R1 5k", None, CaptureMethod::UrlPoll);
        backup.save("q1", &record).await;

        let raw = store.get_item("circuit_state_q1").await.unwrap().unwrap();
        assert!(raw.contains("\"stateBlob\":\"R1 5k\""));
        assert_eq!(backup.load("q1").await, Some(record));
    }

    #[tokio::test]
    async fn blank_records_are_never_persisted() {
        let store = Arc::new(MemoryStore::new());
        let backup = backup(store.clone());
        backup
            .save("q1", &CaptureRecord::new("   ", None, CaptureMethod::MessagePush))
            .await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expired_records_are_absent_but_kept() {
        let store = Arc::new(MemoryStore::new());
        let backup = backup(store.clone());
        let now = Utc::now();
        let old = CaptureRecord::new("old", None, CaptureMethod::UrlPoll)
            .with_captured_at(now - Duration::minutes(90));
        backup.save("q1", &old).await;

        assert_eq!(backup.load_at("q1", now).await, None);
        assert_eq!(backup.load_any("q1").await, Some(old));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn storage_failures_are_swallowed() {
        let backup = backup(Arc::new(QuotaExceededStore));
        backup
            .save("q1", &CaptureRecord::new("R1", None, CaptureMethod::UrlPoll))
            .await;
        assert_eq!(backup.load("q1").await, None);
    }

    #[tokio::test]
    async fn corrupt_entries_read_as_missing() {
        let store = Arc::new(MemoryStore::new());
        store.set_item("circuit_state_q1", "{not json").await.unwrap();
        assert_eq!(backup(store).load_any("q1").await, None);
    }
}
