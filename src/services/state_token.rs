//! 电路状态参数提取 - 业务能力层
//!
//! 只从地址中把状态参数原样切出来，不解码、不解析。
//! 导出格式本身以空格分隔，所以参数值一直取到下一个 `&` / `#` 或结尾，
//! 只去掉末尾空白。

use regex::Regex;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct StateTokenParser {
    pattern: Regex,
}

/// 从地址中提取到的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateToken {
    /// 参数名，例如 `ctz`
    pub param: String,
    /// 参数值，原样保留
    pub value: String,
}

impl StateTokenParser {
    /// `params` 为候选参数名，按出现位置取第一个
    pub fn new<S: AsRef<str>>(params: &[S]) -> AppResult<Self> {
        if params.is_empty() {
            return Err(AppError::Other("状态参数名列表不能为空".to_string()));
        }
        let alternatives = params
            .iter()
            .map(|p| regex::escape(p.as_ref()))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"[?&#]({})=([^&#]+)", alternatives))
            .map_err(|e| AppError::Other(format!("状态参数正则无效: {}", e)))?;
        Ok(Self { pattern })
    }

    /// 提取状态参数，没有或为空时返回 None
    pub fn extract(&self, address: &str) -> Option<StateToken> {
        self.pattern.captures_iter(address.trim()).find_map(|caps| {
            let value = caps.get(2)?.as_str().trim_end();
            if value.trim_start().is_empty() {
                return None;
            }
            Some(StateToken {
                param: caps.get(1)?.as_str().to_string(),
                value: value.to_string(),
            })
        })
    }
}
