//! 地址轮询 - 业务能力层
//!
//! 定时读 iframe 地址，状态参数变化时才产出 `url_poll` 记录。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

use super::{Channel, ChannelObserver};
use crate::infrastructure::SurfaceAddress;
use crate::models::{CaptureMethod, CaptureRecord};
use crate::services::capture_sink::CaptureSink;
use crate::services::state_token::StateTokenParser;

/// 地址轮询
///
/// 跨域时读地址必然失败，这只说明通道不可用，静默跳过。
pub struct UrlPoller {
    question_id: String,
    address: Arc<dyn SurfaceAddress>,
    parser: Arc<StateTokenParser>,
    sink: CaptureSink,
    interval: Duration,
    last_token: Option<String>,
}

impl UrlPoller {
    pub fn new(
        question_id: impl Into<String>,
        address: Arc<dyn SurfaceAddress>,
        parser: Arc<StateTokenParser>,
        sink: CaptureSink,
        interval: Duration,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            address,
            parser,
            sink,
            interval,
            last_token: None,
        }
    }

    /// 轮询一次，返回是否产生了被接受的记录
    pub async fn tick(&mut self) -> bool {
        let href = match self.address.read_address().await {
            Ok(href) => href,
            Err(e) => {
                trace!("[题目 {}] 地址不可读: {}", self.question_id, e);
                return false;
            }
        };
        let Some(token) = self.parser.extract(&href) else {
            return false;
        };
        if self.last_token.as_deref() == Some(token.value.as_str()) {
            return false;
        }
        debug!(
            "[题目 {}] 🔗 地址中发现新状态 ({})",
            self.question_id, token.param
        );
        self.last_token = Some(token.value.clone());
        let record = CaptureRecord::new(token.value, Some(href), CaptureMethod::UrlPoll);
        self.sink.offer(&self.question_id, record).await
    }
}

#[async_trait]
impl ChannelObserver for UrlPoller {
    fn channel(&self) -> Channel {
        Channel::AddressPoll
    }

    fn question_id(&self) -> &str {
        &self.question_id
    }

    async fn run(self: Box<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut poller = *self;
        let mut ticker = tokio::time::interval(poller.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    poller.tick().await;
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("[题目 {}] 地址轮询已停止", poller.question_id);
    }
}
