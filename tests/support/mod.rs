//! 集成测试用的假通道和假评分服务

#![allow(dead_code)]

use async_trait::async_trait;
use circuit_capture::config::Config;
use circuit_capture::error::{AppResult, ChannelError};
use circuit_capture::infrastructure::{KeyValueStore, MemoryStore, MessagePort, SurfaceAddress};
use circuit_capture::models::{CaptureRequest, GradingPayload, InboundMessage};
use circuit_capture::services::AssessmentService;
use circuit_capture::workflow::{CaptureRuntime, Growth, RetryPolicy};
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const SIMULATOR_ORIGIN: &str = "https://www.falstad.com";

/// 地址通道：`None` 表示跨域被拦截
#[derive(Default)]
pub struct ScriptedAddress {
    href: Mutex<Option<String>>,
}

impl ScriptedAddress {
    pub fn blocked() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn showing(href: &str) -> Arc<Self> {
        let address = Self::default();
        address.set(href);
        Arc::new(address)
    }

    pub fn set(&self, href: &str) {
        *self.href.lock().unwrap() = Some(href.to_string());
    }
}

#[async_trait]
impl SurfaceAddress for ScriptedAddress {
    async fn read_address(&self) -> Result<String, ChannelError> {
        self.href
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ChannelError::unavailable("address", "SecurityError: cross-origin frame"))
    }
}

/// 消息通道：记录发出的请求，可选地在收到请求后推送一条回复
pub struct ScriptedPort {
    inbound: broadcast::Sender<InboundMessage>,
    posts: AtomicUsize,
    reply: Mutex<Option<InboundMessage>>,
}

impl ScriptedPort {
    /// 模拟器从不回应
    pub fn silent() -> Arc<Self> {
        let (inbound, _) = broadcast::channel(64);
        Arc::new(Self {
            inbound,
            posts: AtomicUsize::new(0),
            reply: Mutex::new(None),
        })
    }

    /// 第一次收到采集请求时推送 `reply`
    pub fn replying(reply: InboundMessage) -> Arc<Self> {
        let port = Self::silent();
        *port.reply.lock().unwrap() = Some(reply);
        port
    }

    /// 模拟器主动推送
    pub fn push(&self, message: InboundMessage) {
        let _ = self.inbound.send(message);
    }

    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagePort for ScriptedPort {
    async fn post(&self, _request: &CaptureRequest) -> Result<(), ChannelError> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        if let Some(reply) = self.reply.lock().unwrap().take() {
            self.push(reply);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.inbound.subscribe()
    }
}

/// 记录每次调用的评分服务
#[derive(Default)]
pub struct RecordingService {
    pub simulated: Mutex<Vec<GradingPayload>>,
    pub validated: Mutex<Vec<GradingPayload>>,
    pub graded: Mutex<Vec<GradingPayload>>,
}

impl RecordingService {
    pub fn graded(&self) -> Vec<GradingPayload> {
        self.graded.lock().unwrap().clone()
    }

    pub fn simulated(&self) -> Vec<GradingPayload> {
        self.simulated.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssessmentService for RecordingService {
    async fn simulate(&self, payload: &GradingPayload) -> AppResult<JsonValue> {
        self.simulated.lock().unwrap().push(payload.clone());
        Ok(json!({ "code": 200, "waveform": [] }))
    }

    async fn validate(&self, payload: &GradingPayload) -> AppResult<JsonValue> {
        self.validated.lock().unwrap().push(payload.clone());
        Ok(json!({ "code": 200, "valid": true }))
    }

    async fn grade(&self, payload: &GradingPayload) -> AppResult<JsonValue> {
        self.graded.lock().unwrap().push(payload.clone());
        Ok(json!({ "code": 200, "score": 10 }))
    }
}

/// 重试间隔缩到毫秒级的配置
pub fn fast_config() -> Config {
    Config {
        allowed_origins: vec![SIMULATOR_ORIGIN.to_string()],
        poll_interval: Duration::from_millis(10),
        interactive_retry: RetryPolicy::new(5, Duration::from_millis(20), Growth::Fixed),
        submission_retry: RetryPolicy::new(3, Duration::from_millis(5), Growth::Exponential),
        ..Config::default()
    }
}

pub struct Harness {
    pub runtime: Arc<CaptureRuntime>,
    pub address: Arc<ScriptedAddress>,
    pub port: Arc<ScriptedPort>,
    pub store: Arc<MemoryStore>,
    pub service: Arc<RecordingService>,
}

impl Harness {
    pub fn new(address: Arc<ScriptedAddress>, port: Arc<ScriptedPort>) -> Self {
        Self::with_store(address, port, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(address: Arc<ScriptedAddress>, port: Arc<ScriptedPort>, store: Arc<MemoryStore>) -> Self {
        let service = Arc::new(RecordingService::default());
        let runtime = CaptureRuntime::new(
            fast_config(),
            address.clone() as Arc<dyn SurfaceAddress>,
            port.clone() as Arc<dyn MessagePort>,
            store.clone() as Arc<dyn KeyValueStore>,
            service.clone() as Arc<dyn AssessmentService>,
        )
        .expect("测试配置应当有效");
        Self {
            runtime,
            address,
            port,
            store,
            service,
        }
    }

    /// 所有实时通道都不可用
    pub fn offline() -> Self {
        Self::new(ScriptedAddress::blocked(), ScriptedPort::silent())
    }
}

/// 等待条件成立，最多约 1 秒
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
