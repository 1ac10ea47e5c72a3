//! 远程评测服务 - 业务能力层
//!
//! 模拟、校验、评分三个接口都当作不透明的请求/响应调用。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::GradingPayload;

#[async_trait]
pub trait AssessmentService: Send + Sync {
    async fn simulate(&self, payload: &GradingPayload) -> AppResult<JsonValue>;
    async fn validate(&self, payload: &GradingPayload) -> AppResult<JsonValue>;
    async fn grade(&self, payload: &GradingPayload) -> AppResult<JsonValue>;
}

/// 基于 HTTP 的评测服务客户端
pub struct HttpAssessmentClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpAssessmentClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: config.grading_api_base_url.trim_end_matches('/').to_string(),
            token: config.grading_token.clone(),
        })
    }

    async fn post(&self, endpoint: &str, payload: &GradingPayload) -> AppResult<JsonValue> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(
            "POST {} (题目 {}, 渠道 {})",
            url, payload.question_id, payload.method
        );

        let mut request = self.client.post(&url).json(payload);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = request.send().await?;
        let status = response.status();
        let body: JsonValue = response.json().await.unwrap_or(JsonValue::Null);

        if !status.is_success() {
            return Err(AppError::bad_response(
                url,
                Some(status.as_u16()),
                body.get("message").and_then(|v| v.as_str()).map(String::from),
            ));
        }
        if !Self::is_success_response(&body) {
            return Err(AppError::bad_response(
                url,
                Self::reported_code(&body),
                body.get("message").and_then(|v| v.as_str()).map(String::from),
            ));
        }
        Ok(body)
    }

    /// 响应体里的 `code`，超出 u16 范围时不报
    fn reported_code(body: &JsonValue) -> Option<u16> {
        body.get("code")
            .and_then(|v| v.as_u64())
            .and_then(|c| u16::try_from(c).ok())
    }

    /// 响应体里带 `code` 时必须是 200
    fn is_success_response(body: &JsonValue) -> bool {
        match body.get("code").and_then(|v| v.as_u64()) {
            Some(code) => code == 200,
            None => true,
        }
    }
}

#[async_trait]
impl AssessmentService for HttpAssessmentClient {
    async fn simulate(&self, payload: &GradingPayload) -> AppResult<JsonValue> {
        self.post("simulate", payload).await
    }

    async fn validate(&self, payload: &GradingPayload) -> AppResult<JsonValue> {
        self.post("validate", payload).await
    }

    async fn grade(&self, payload: &GradingPayload) -> AppResult<JsonValue> {
        self.post("grade", payload).await
    }
}
