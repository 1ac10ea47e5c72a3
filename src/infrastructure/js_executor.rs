//! JS 执行器 - 基础设施层
//!
//! 持有考试页面这一唯一的 Page 资源，只暴露"在页面里执行 JS"的能力。
//! iframe 地址、postMessage、localStorage 都通过它完成。

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::trace;

use crate::error::AppResult;

/// JS 执行器
///
/// 职责：
/// - 持有 Page
/// - 暴露 eval() 能力
/// - 不认识题目、不认识电路状态
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// 脚本必须返回可序列化的值（返回 undefined 会导致解析失败）。
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let js_code = js_code.into();
        trace!("执行页面脚本: {} 字符", js_code.len());
        let result = self.page.evaluate(js_code).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }
}

/// 把 Rust 值编码成可以直接拼进脚本的 JS 字面量
pub fn js_literal<T: Serialize + ?Sized>(value: &T) -> AppResult<String> {
    Ok(serde_json::to_string(value)?)
}
