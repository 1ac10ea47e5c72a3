//! # Circuit Capture
//!
//! 在考试页面里采集嵌入式电路模拟器的电路状态，并可靠地提交评分
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `PageBridge` - 读取 iframe 地址、收发 postMessage、读写 localStorage
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单道题
//! - `Arbitrator` - 每道题唯一的当前电路状态
//! - `BackupStore` - 带有效期的本地备份
//! - `observers` - 地址轮询 / 消息监听 / 手动录入三个观察通道
//! - `HttpAssessmentClient` - 模拟、校验、评分接口
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整处理流程
//! - `CaptureOrchestrator` - 主动采集与重试
//! - `SubmissionPipeline` - 四级兜底的提交流水线
//! - `QuestionSession` - 打开 → 模拟 / 校验 / 提交 → 离开
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用生命周期与指令循环
//! - `orchestrator/console` - 操作员指令
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::connect_to_assessment_page;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{JsExecutor, PageBridge};
pub use models::{CaptureMethod, CaptureRecord, FallbackTier, GradingPayload, Submission};
pub use orchestrator::{App, Console};
pub use workflow::{CaptureRuntime, QuestionCtx, QuestionSession, RetryPolicy};
