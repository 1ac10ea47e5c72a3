//! 消息通道监听 - 业务能力层
//!
//! 只接收白名单 origin 的消息：带状态参数的地址字符串、带 `state` / `url` /
//! `measurements` 字段的对象，或者序列化成字符串的同样对象。

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::{Channel, ChannelObserver};
use crate::models::{CaptureMethod, CaptureRecord, InboundMessage};
use crate::services::capture_sink::CaptureSink;
use crate::services::state_token::StateTokenParser;

/// 一条消息的处理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Disposition {
    /// origin 在白名单内
    pub origin_allowed: bool,
    /// 产生了被仲裁器接受的记录
    pub state_accepted: bool,
    /// 更新了测量数据
    pub measurements_updated: bool,
}

/// 消息通道监听
///
/// 挂载题目时订阅一次。白名单之外的消息直接丢弃，这是安全边界，不算采集失败。
pub struct MessageListener {
    question_id: String,
    allowed_origins: Vec<String>,
    parser: Arc<StateTokenParser>,
    sink: CaptureSink,
    inbox: broadcast::Receiver<InboundMessage>,
}

impl MessageListener {
    pub fn new(
        question_id: impl Into<String>,
        allowed_origins: Vec<String>,
        parser: Arc<StateTokenParser>,
        sink: CaptureSink,
        inbox: broadcast::Receiver<InboundMessage>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            allowed_origins: allowed_origins
                .iter()
                .map(|o| normalize_origin(o))
                .collect(),
            parser,
            sink,
            inbox,
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        let origin = normalize_origin(origin);
        self.allowed_origins.iter().any(|allowed| *allowed == origin)
    }

    pub async fn handle(&self, message: InboundMessage) -> Disposition {
        let mut disposition = Disposition::default();
        if !self.is_allowed(&message.origin) {
            return disposition;
        }
        disposition.origin_allowed = true;

        match message.data {
            JsonValue::String(text) => {
                // 有的模拟器把对象序列化成字符串再发
                match serde_json::from_str::<JsonValue>(&text) {
                    Ok(JsonValue::Object(map)) => {
                        self.handle_object(&JsonValue::Object(map), &mut disposition).await
                    }
                    _ => {
                        disposition.state_accepted = self.handle_text(&text).await;
                    }
                }
            }
            object @ JsonValue::Object(_) => self.handle_object(&object, &mut disposition).await,
            _ => {}
        }
        disposition
    }

    /// 纯文本：带状态参数的地址
    async fn handle_text(&self, text: &str) -> bool {
        let Some(token) = self.parser.extract(text) else {
            return false;
        };
        let record = CaptureRecord::new(
            token.value,
            Some(text.trim().to_string()),
            CaptureMethod::MessageUrl,
        );
        self.sink.offer(&self.question_id, record).await
    }

    /// 结构化消息：`state` / `url` / `measurements` 字段
    async fn handle_object(&self, object: &JsonValue, disposition: &mut Disposition) {
        let url = object
            .get("url")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if let Some(state) = object
            .get("state")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
        {
            let record = CaptureRecord::new(state, url, CaptureMethod::MessagePush);
            disposition.state_accepted = self.sink.offer(&self.question_id, record).await;
        } else if let Some(url) = url {
            disposition.state_accepted = self.handle_text(&url).await;
        }

        if let Some(measurements) = object.get("measurements").filter(|v| !v.is_null()) {
            self.sink
                .record_measurements(&self.question_id, measurements.clone());
            disposition.measurements_updated = true;
        }
    }
}

#[async_trait]
impl ChannelObserver for MessageListener {
    fn channel(&self) -> Channel {
        Channel::MessagePush
    }

    fn question_id(&self) -> &str {
        &self.question_id
    }

    async fn run(self: Box<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut listener = *self;
        loop {
            tokio::select! {
                received = listener.inbox.recv() => match received {
                    Ok(message) => {
                        let origin = message.origin.clone();
                        let disposition = listener.handle(message).await;
                        if !disposition.origin_allowed {
                            debug!("[题目 {}] 丢弃非白名单消息: {}", listener.question_id, origin);
                        }
                        if disposition.state_accepted {
                            debug!("[题目 {}] 📨 消息通道更新了电路状态", listener.question_id);
                        }
                        if disposition.measurements_updated {
                            debug!("[题目 {}] 📏 测量数据已更新", listener.question_id);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("[题目 {}] ⚠️ 消息处理过慢，跳过 {} 条", listener.question_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        debug!("[题目 {}] 消息监听已停止", listener.question_id);
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryStore;
    use crate::services::arbitrator::Arbitrator;
    use crate::services::backup_store::BackupStore;
    use serde_json::json;
    use std::time::Duration;

    const SIM: &str = "https://www.falstad.com";

    fn listener() -> (MessageListener, Arc<Arbitrator>) {
        let arbitrator = Arc::new(Arbitrator::new());
        let backup = Arc::new(BackupStore::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(3600),
        ));
        let (_tx, rx) = broadcast::channel(8);
        let listener = MessageListener::new(
            "q1",
            vec![format!("{}/", SIM)],
            Arc::new(StateTokenParser::new(&["ctz", "cct"]).unwrap()),
            CaptureSink::new(arbitrator.clone(), backup),
            rx,
        );
        (listener, arbitrator)
    }

    #[tokio::test]
    async fn foreign_origin_is_discarded() {
        let (listener, arbitrator) = listener();
        let outcome = listener
            .handle(InboundMessage::new("https://evil.example", json!({"state": "X"})))
            .await;
        assert!(!outcome.origin_allowed);
        assert!(arbitrator.current("q1").is_none());
    }

    #[tokio::test]
    async fn bare_string_with_token_is_message_url() {
        let (listener, arbitrator) = listener();
        let outcome = listener
            .handle(InboundMessage::new(SIM, json!("https://www.falstad.com/circuit/?ctz=ABC")))
            .await;
        assert!(outcome.state_accepted);
        let current = arbitrator.current("q1").unwrap();
        assert_eq!(current.method, CaptureMethod::MessageUrl);
        assert_eq!(current.state_blob, "ABC");
    }

    #[tokio::test]
    async fn structured_state_is_message_push() {
        let (listener, arbitrator) = listener();
        listener
            .handle(InboundMessage::new(SIM, json!({"type": "circuit", "state": "$ 1 0.000005\nr 1 2 5000"})))
            .await;
        let current = arbitrator.current("q1").unwrap();
        assert_eq!(current.method, CaptureMethod::MessagePush);
        assert_eq!(current.state_blob, "$ 1 0.000005\nr 1 2 5000");
        assert!(current.source_url.is_none());
    }

    #[tokio::test]
    async fn measurements_update_independently() {
        let (listener, arbitrator) = listener();
        let outcome = listener
            .handle(InboundMessage::new(SIM, json!({"measurements": {"V(R1)": 2.5}})))
            .await;
        assert!(outcome.measurements_updated);
        assert!(!outcome.state_accepted);
        assert!(arbitrator.current("q1").is_none());
        assert_eq!(arbitrator.measurements("q1"), Some(json!({"V(R1)": 2.5})));
    }

    #[tokio::test]
    async fn object_with_only_url_goes_through_address_parsing() {
        let (listener, arbitrator) = listener();
        let outcome = listener
            .handle(InboundMessage::new(
                SIM,
                json!({"type": "share", "url": " https://www.falstad.com/circuit/?cct=$ 1 0.000005&running=1 "}),
            ))
            .await;
        assert!(outcome.state_accepted);
        let current = arbitrator.current("q1").unwrap();
        assert_eq!(current.method, CaptureMethod::MessageUrl);
        assert_eq!(current.state_blob, "$ 1 0.000005");
        assert_eq!(
            current.source_url.as_deref(),
            Some("https://www.falstad.com/circuit/?cct=$ 1 0.000005&running=1")
        );

        let outcome = listener
            .handle(InboundMessage::new(SIM, json!({"url": "https://www.falstad.com/circuit/"})))
            .await;
        assert!(!outcome.state_accepted);
        assert_eq!(arbitrator.current("q1").unwrap().state_blob, "$ 1 0.000005");
    }

    #[tokio::test]
    async fn json_encoded_string_is_treated_as_object() {
        let (listener, arbitrator) = listener();
        listener
            .handle(InboundMessage::new(SIM, json!(r#"{"state":"ENC","measurements":[1,2]}"#)))
            .await;
        assert_eq!(arbitrator.current("q1").unwrap().state_blob, "ENC");
        assert_eq!(arbitrator.measurements("q1"), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn unrelated_payloads_are_ignored() {
        let (listener, arbitrator) = listener();
        for data in [json!("ready"), json!(42), json!({"state": "  "}), JsonValue::Null] {
            let outcome = listener.handle(InboundMessage::new(SIM, data)).await;
            assert!(outcome.origin_allowed);
            assert!(!outcome.state_accepted);
        }
        assert!(arbitrator.current("q1").is_none());
    }
}
