//! 观察通道 - 业务能力层
//!
//! 三个相互独立、同时运行的采集通道，都只产出候选记录交给 `CaptureSink`，
//! 没有哪个通道单独说了算。
//!
//! - `UrlPoller`：定时读取 iframe 地址
//! - `MessageListener`：接收模拟器推送的消息
//! - `ManualIntake`：操作员手动粘贴

pub mod manual_intake;
pub mod message_listener;
pub mod url_poller;

use async_trait::async_trait;
use std::fmt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

pub use manual_intake::{IntakeHandle, ManualEntry, ManualIntake, ManualKind};
pub use message_listener::{Disposition, MessageListener};
pub use url_poller::UrlPoller;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    AddressPoll,
    MessagePush,
    ManualInput,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::AddressPoll => "地址轮询",
            Channel::MessagePush => "消息通道",
            Channel::ManualInput => "手动录入",
        };
        f.write_str(name)
    }
}

/// 观察通道
///
/// 每个实例绑定一道题，`run` 一直运行到收到停止信号。
#[async_trait]
pub trait ChannelObserver: Send {
    fn channel(&self) -> Channel;

    fn question_id(&self) -> &str;

    async fn run(self: Box<Self>, shutdown: watch::Receiver<bool>);
}

/// 在后台启动一个观察通道
pub fn spawn_observer(observer: Box<dyn ChannelObserver>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    debug!(
        "[题目 {}] 启动{}观察",
        observer.question_id(),
        observer.channel()
    );
    tokio::spawn(observer.run(shutdown))
}
