//! 题目上下文
//!
//! 封装"我正在处理哪一轮的哪道题"这一信息

use std::fmt::Display;

/// 题目上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionCtx {
    /// 题目ID（也是备份键的一部分）
    pub question_id: String,

    /// 本次运行中第几次打开题目（仅用于日志显示）
    pub mount_index: usize,
}

impl QuestionCtx {
    pub fn new(question_id: impl Into<String>, mount_index: usize) -> Self {
        Self {
            question_id: question_id.into(),
            mount_index,
        }
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[题目 {} #{}]", self.question_id, self.mount_index)
    }
}
