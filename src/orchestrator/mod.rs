//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层持有浏览器资源，把操作员指令分派到题目会话。
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 连接浏览器、安装页面桥接、启动消息抽取
//! - 装配 `CaptureRuntime`
//! - 读取标准输入的指令循环
//!
//! ### `console` - 操作员指令
//! - 解析 open / url / export / simulate / validate / submit / status
//! - 把采集错误翻译成给操作员看的提示
//!
//! ## 层次关系
//!
//! ```text
//! app (Browser + PageBridge)
//!     ↓
//! console (一次一道题)
//!     ↓
//! workflow::QuestionSession
//!     ↓
//! services (仲裁 / 备份 / 观察通道 / 评分接口)
//!     ↓
//! infrastructure (JsExecutor / PageBridge)
//! ```

pub mod app;
pub mod console;

pub use app::App;
pub use console::{Command, Console, Flow, Reply};
