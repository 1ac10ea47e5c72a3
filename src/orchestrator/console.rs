//! 操作员控制台
//!
//! 一行一条指令。手动录入的两个入口（分享地址、导出文本）也在这里，
//! 空输入会给出可见提示而不是静默忽略。

use std::sync::Arc;

use crate::error::AppError;
use crate::services::observers::ManualKind;
use crate::workflow::{CaptureRuntime, QuestionSession, ServiceOutcome};

pub const HELP: &str = "指令: open <题目ID> | url <分享地址> | export <导出文本，\\n 表示换行> | simulate | validate | submit | status | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(String),
    Url(String),
    Export(String),
    Simulate,
    Validate,
    Submit,
    Status,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim_start();
        let (head, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim_start()),
            None => (line, ""),
        };
        match head.to_ascii_lowercase().as_str() {
            "" => Command::Empty,
            "open" => Command::Open(rest.trim().to_string()),
            "url" => Command::Url(rest.to_string()),
            "export" => Command::Export(rest.replace("\\n", "\n")),
            "simulate" => Command::Simulate,
            "validate" => Command::Validate,
            "submit" => Command::Submit,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// 一条指令的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub flow: Flow,
    pub lines: Vec<String>,
}

impl Reply {
    fn lines(lines: Vec<String>) -> Self {
        Self {
            flow: Flow::Continue,
            lines,
        }
    }

    fn line(line: impl Into<String>) -> Self {
        Self::lines(vec![line.into()])
    }
}

pub struct Console {
    runtime: Arc<CaptureRuntime>,
    session: Option<QuestionSession>,
}

impl Console {
    pub fn new(runtime: Arc<CaptureRuntime>) -> Self {
        Self {
            runtime,
            session: None,
        }
    }

    pub fn current_question(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.question_id())
    }

    pub async fn execute(&mut self, command: Command) -> Reply {
        match command {
            Command::Empty => Reply::lines(Vec::new()),
            Command::Help => Reply::line(HELP),
            Command::Quit => {
                self.shutdown().await;
                Reply {
                    flow: Flow::Quit,
                    lines: vec!["👋 已退出".to_string()],
                }
            }
            Command::Unknown(head) => Reply::line(format!("未知指令: {}\n{}", head, HELP)),
            Command::Open(question_id) => self.open(&question_id).await,
            other => {
                let Some(session) = self.session.as_ref() else {
                    return Reply::line("⚠️ 请先用 `open <题目ID>` 打开题目");
                };
                Self::run_on_session(session, other).await
            }
        }
    }

    async fn open(&mut self, question_id: &str) -> Reply {
        if question_id.is_empty() {
            return Reply::line("⚠️ 题目ID不能为空");
        }
        if let Some(previous) = self.session.take() {
            previous.unmount().await;
        }
        let session = self.runtime.mount(question_id).await;
        let mut lines = vec![format!("📂 已打开题目 {}", question_id)];
        lines.extend(session.status().await.lines());
        self.session = Some(session);
        Reply::lines(lines)
    }

    async fn run_on_session(session: &QuestionSession, command: Command) -> Reply {
        match command {
            Command::Url(text) => Self::manual(session, ManualKind::Address, &text).await,
            Command::Export(text) => Self::manual(session, ManualKind::Transcript, &text).await,
            Command::Simulate => Self::service_reply("模拟", session.simulate().await),
            Command::Validate => Self::service_reply("校验", session.validate().await),
            Command::Submit => match session.submit().await {
                Ok(receipt) => Reply::lines(vec![
                    format!(
                        "✅ 提交成功: {}，渠道 {}",
                        receipt.submission.tier, receipt.submission.record.method
                    ),
                    format!("评分服务响应: {}", receipt.response),
                ]),
                Err(e) => Reply::line(Self::error_line(&e)),
            },
            Command::Status => Reply::lines(session.status().await.lines()),
            _ => Reply::line(HELP),
        }
    }

    async fn manual(session: &QuestionSession, kind: ManualKind, text: &str) -> Reply {
        match session.manual(kind, text).await {
            Ok(true) => Reply::line("✓ 已录入电路状态"),
            Ok(false) => Reply::line("✓ 已录入（与当前状态一致）"),
            Err(e) => Reply::line(Self::error_line(&e)),
        }
    }

    fn service_reply(action: &str, result: Result<ServiceOutcome, AppError>) -> Reply {
        match result {
            Ok(ServiceOutcome::Completed(response)) => {
                Reply::line(format!("✓ {}完成: {}", action, response))
            }
            Ok(ServiceOutcome::NothingCaptured) => Reply::line(format!(
                "⚠️ 还没有采集到电路状态，暂时无法{}；可以稍后重试或手动录入",
                action
            )),
            Err(e) => Reply::line(Self::error_line(&e)),
        }
    }

    fn error_line(error: &AppError) -> String {
        match error.as_capture() {
            Some(capture) => capture.operator_prompt(),
            None => format!("❌ {}", error),
        }
    }

    /// 离开当前题目
    pub async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.unmount().await;
        }
    }
}
