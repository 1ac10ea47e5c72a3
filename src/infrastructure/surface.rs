//! 嵌入模拟器的通道抽象
//!
//! 模拟器是跨域的黑盒，只能通过"读地址"和"收发消息"两条不可靠通道接触。

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::ChannelError;
use crate::models::{CaptureRequest, InboundMessage};

/// 地址通道：读取嵌入页面当前的地址
#[async_trait]
pub trait SurfaceAddress: Send + Sync {
    /// 跨域拦截时返回 `ChannelError::Unavailable`
    async fn read_address(&self) -> Result<String, ChannelError>;
}

/// 消息通道：向模拟器发请求，订阅它推送的消息
#[async_trait]
pub trait MessagePort: Send + Sync {
    async fn post(&self, request: &CaptureRequest) -> Result<(), ChannelError>;

    /// 每个订阅者都收到之后的全部消息
    fn subscribe(&self) -> broadcast::Receiver<InboundMessage>;
}
