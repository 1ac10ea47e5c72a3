//! 页面桥接 - 基础设施层
//!
//! 在考试页面里执行脚本，实现三种能力：
//! - 读取模拟器 iframe 的地址（同源才可读）
//! - 收发 postMessage（页面里挂监听器排队，Rust 侧定时抽取）
//! - 读写 localStorage

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{AppResult, ChannelError, StorageError};
use crate::infrastructure::js_executor::{js_literal, JsExecutor};
use crate::infrastructure::storage::KeyValueStore;
use crate::infrastructure::surface::{MessagePort, SurfaceAddress};
use crate::models::{CaptureRequest, InboundMessage};

/// 页面里最多缓存的未读消息数，超出丢最旧的
const INBOX_LIMIT: usize = 500;

/// 页面脚本的统一返回格式
#[derive(Debug, Deserialize)]
struct ScriptOutcome<T> {
    ok: bool,
    value: Option<T>,
    reason: Option<String>,
}

pub struct PageBridge {
    executor: JsExecutor,
    frame_selector: String,
    target_origin: String,
    inbound: broadcast::Sender<InboundMessage>,
}

impl PageBridge {
    pub fn new(executor: JsExecutor, frame_selector: impl Into<String>, target_origin: impl Into<String>) -> Self {
        let (inbound, _) = broadcast::channel(256);
        Self {
            executor,
            frame_selector: frame_selector.into(),
            target_origin: target_origin.into(),
            inbound,
        }
    }

    /// 在页面里挂 message 监听器，已挂过则跳过
    pub async fn install(&self) -> AppResult<()> {
        let js_code = format!(
            r#"
            (() => {{
                if (window.__circuitCapture) return true;
                const inbox = [];
                window.__circuitCapture = {{ inbox }};
                window.addEventListener("message", (event) => {{
                    let data = event.data;
                    try {{
                        JSON.stringify(data);
                    }} catch (e) {{
                        data = String(data);
                    }}
                    inbox.push({{ origin: event.origin, data: data === undefined ? null : data }});
                    if (inbox.length > {limit}) inbox.shift();
                }});
                return true;
            }})()
            "#,
            limit = INBOX_LIMIT
        );
        self.executor.eval(js_code).await?;
        debug!("✓ 页面消息监听器已就绪");
        Ok(())
    }

    /// 取出页面里排队的消息
    ///
    /// 页面刷新后监听器会丢失，此时重新安装并返回空列表。
    pub async fn drain_inbox(&self) -> AppResult<Vec<InboundMessage>> {
        let js_code = r#"
            (() => {
                const capture = window.__circuitCapture;
                if (!capture) return null;
                return capture.inbox.splice(0, capture.inbox.length);
            })()
        "#;
        let drained: Option<Vec<InboundMessage>> = self.executor.eval_as(js_code).await?;
        match drained {
            Some(messages) => Ok(messages),
            None => {
                debug!("页面监听器丢失，重新安装");
                self.install().await?;
                Ok(Vec::new())
            }
        }
    }

    /// 后台定时抽取页面消息并广播给订阅者
    pub fn spawn_pump(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }
                match self.drain_inbox().await {
                    Ok(messages) => {
                        for message in messages {
                            trace!("收到页面消息: origin={}", message.origin);
                            // 没有订阅者时 send 会失败，属于正常情况
                            let _ = self.inbound.send(message);
                        }
                    }
                    Err(e) => warn!("⚠️ 抽取页面消息失败: {}", e),
                }
            }
            debug!("页面消息泵已停止");
        })
    }
}

#[async_trait]
impl SurfaceAddress for PageBridge {
    async fn read_address(&self) -> Result<String, ChannelError> {
        let selector = js_literal(&self.frame_selector)
            .map_err(|e| ChannelError::unavailable("address", e.to_string()))?;
        let js_code = format!(
            r#"
            (() => {{
                const frame = document.querySelector({selector});
                if (!frame || !frame.contentWindow) return {{ ok: false, reason: "frame-missing" }};
                try {{
                    return {{ ok: true, value: frame.contentWindow.location.href }};
                }} catch (e) {{
                    return {{ ok: false, reason: String((e && e.name) || e) }};
                }}
            }})()
            "#
        );
        let outcome: ScriptOutcome<String> = self
            .executor
            .eval_as(js_code)
            .await
            .map_err(|e| ChannelError::unavailable("address", e.to_string()))?;
        match (outcome.ok, outcome.value) {
            (true, Some(href)) => Ok(href),
            _ => Err(ChannelError::unavailable(
                "address",
                outcome.reason.unwrap_or_else(|| "unknown".to_string()),
            )),
        }
    }
}

#[async_trait]
impl MessagePort for PageBridge {
    async fn post(&self, request: &CaptureRequest) -> Result<(), ChannelError> {
        let send_failed = |e: crate::error::AppError| ChannelError::SendFailed {
            reason: e.to_string(),
        };
        let selector = js_literal(&self.frame_selector).map_err(send_failed)?;
        let origin = js_literal(&self.target_origin).map_err(send_failed)?;
        let payload = js_literal(&request.payload).map_err(send_failed)?;
        let js_code = format!(
            r#"
            (() => {{
                const frame = document.querySelector({selector});
                if (!frame || !frame.contentWindow) return false;
                frame.contentWindow.postMessage({payload}, {origin});
                return true;
            }})()
            "#
        );
        let delivered: bool = self.executor.eval_as(js_code).await.map_err(send_failed)?;
        if delivered {
            Ok(())
        } else {
            Err(ChannelError::unavailable("message", "frame-missing"))
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.inbound.subscribe()
    }
}

#[async_trait]
impl KeyValueStore for PageBridge {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key_lit = js_literal(key).map_err(|e| StorageError::Unavailable { reason: e.to_string() })?;
        let js_code = format!(
            r#"
            (() => {{
                try {{
                    return {{ ok: true, value: window.localStorage.getItem({key_lit}) }};
                }} catch (e) {{
                    return {{ ok: false, reason: String(e) }};
                }}
            }})()
            "#
        );
        let outcome: ScriptOutcome<String> = self
            .executor
            .eval_as(js_code)
            .await
            .map_err(|e| StorageError::Unavailable { reason: e.to_string() })?;
        if outcome.ok {
            Ok(outcome.value)
        } else {
            Err(StorageError::Unavailable {
                reason: outcome.reason.unwrap_or_default(),
            })
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_failed = |reason: String| StorageError::WriteFailed {
            key: key.to_string(),
            reason,
        };
        let key_lit = js_literal(key).map_err(|e| write_failed(e.to_string()))?;
        let value_lit = js_literal(value).map_err(|e| write_failed(e.to_string()))?;
        let js_code = format!(
            r#"
            (() => {{
                try {{
                    window.localStorage.setItem({key_lit}, {value_lit});
                    return {{ ok: true }};
                }} catch (e) {{
                    return {{ ok: false, reason: String(e) }};
                }}
            }})()
            "#
        );
        let outcome: ScriptOutcome<()> = self
            .executor
            .eval_as(js_code)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
        if outcome.ok {
            Ok(())
        } else {
            Err(write_failed(outcome.reason.unwrap_or_default()))
        }
    }
}
