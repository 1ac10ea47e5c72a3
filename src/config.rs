use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, AppResult, ConfigError};
use crate::workflow::retry_policy::{Growth, RetryPolicy};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 考试页面 URL（找不到时新开页面导航过去）
    pub target_url: String,
    /// 考试页面标题关键字，优先按标题匹配已打开的页面
    pub target_title: Option<String>,
    /// 嵌入模拟器 iframe 的 CSS 选择器
    pub frame_selector: String,
    /// 允许接收消息的 origin 白名单
    pub allowed_origins: Vec<String>,
    /// postMessage 的目标 origin
    pub target_origin: String,
    /// 地址中携带电路状态的查询参数名
    pub state_params: Vec<String>,
    /// 地址轮询间隔
    pub poll_interval: Duration,
    /// 页面消息队列抽取间隔
    pub message_pump_interval: Duration,
    /// 本地备份有效期
    pub backup_ttl: Duration,
    /// 模拟 / 校验使用的重试策略
    pub interactive_retry: RetryPolicy,
    /// 提交使用的重试策略
    pub submission_retry: RetryPolicy,
    /// 评分服务地址
    pub grading_api_base_url: String,
    /// 评分服务令牌
    pub grading_token: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: "http://localhost:3000/assessment".to_string(),
            target_title: None,
            frame_selector: "iframe#circuit-simulator".to_string(),
            allowed_origins: vec!["https://www.falstad.com".to_string()],
            target_origin: "https://www.falstad.com".to_string(),
            state_params: vec!["ctz".to_string(), "cct".to_string()],
            poll_interval: Duration::from_secs(2),
            message_pump_interval: Duration::from_millis(250),
            backup_ttl: Duration::from_secs(60 * 60),
            interactive_retry: RetryPolicy::interactive(),
            submission_retry: RetryPolicy::submission(),
            grading_api_base_url: "http://localhost:3000/api".to_string(),
            grading_token: String::new(),
            verbose_logging: false,
        }
    }
}

/// 配置文件中可选的字段，没写的保持默认值
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    browser_debug_port: Option<u16>,
    target_url: Option<String>,
    target_title: Option<String>,
    frame_selector: Option<String>,
    allowed_origins: Option<Vec<String>>,
    target_origin: Option<String>,
    state_params: Option<Vec<String>>,
    poll_interval_ms: Option<u64>,
    message_pump_interval_ms: Option<u64>,
    backup_ttl_secs: Option<u64>,
    interactive_retry: Option<RetryPolicy>,
    submission_retry: Option<RetryPolicy>,
    grading_api_base_url: Option<String>,
    grading_token: Option<String>,
    verbose_logging: Option<bool>,
}

impl Config {
    /// 读取可选的 TOML 配置文件，再叠加环境变量
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let base = match path {
            Some(path) if path.exists() => Self::from_toml_file(path)?,
            _ => Self::default(),
        };
        base.with_env()
    }

    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env()
    }

    fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| {
            AppError::Config(ConfigError::FileParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })?;
        Ok(Self::default().merge(file))
    }

    fn merge(self, file: ConfigFile) -> Self {
        let default_target_origin = file
            .allowed_origins
            .as_ref()
            .and_then(|origins| origins.first().cloned());
        Self {
            browser_debug_port: file.browser_debug_port.unwrap_or(self.browser_debug_port),
            target_url: file.target_url.unwrap_or(self.target_url),
            target_title: file.target_title.or(self.target_title),
            frame_selector: file.frame_selector.unwrap_or(self.frame_selector),
            allowed_origins: file.allowed_origins.unwrap_or(self.allowed_origins),
            target_origin: file
                .target_origin
                .or(default_target_origin)
                .unwrap_or(self.target_origin),
            state_params: file.state_params.unwrap_or(self.state_params),
            poll_interval: file
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(self.poll_interval),
            message_pump_interval: file
                .message_pump_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(self.message_pump_interval),
            backup_ttl: file
                .backup_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(self.backup_ttl),
            interactive_retry: file.interactive_retry.unwrap_or(self.interactive_retry),
            submission_retry: file.submission_retry.unwrap_or(self.submission_retry),
            grading_api_base_url: file.grading_api_base_url.unwrap_or(self.grading_api_base_url),
            grading_token: file.grading_token.unwrap_or(self.grading_token),
            verbose_logging: file.verbose_logging.unwrap_or(self.verbose_logging),
        }
    }

    fn with_env(self) -> AppResult<Self> {
        let allowed_origins = env_list("ALLOWED_ORIGINS").unwrap_or(self.allowed_origins);
        let target_origin = std::env::var("TARGET_ORIGIN").unwrap_or(self.target_origin);
        Ok(Self {
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT", "u16")?
                .unwrap_or(self.browser_debug_port),
            target_url: std::env::var("TARGET_URL").unwrap_or(self.target_url),
            target_title: std::env::var("TARGET_TITLE").ok().or(self.target_title),
            frame_selector: std::env::var("FRAME_SELECTOR").unwrap_or(self.frame_selector),
            allowed_origins,
            target_origin,
            state_params: env_list("STATE_PARAMS").unwrap_or(self.state_params),
            poll_interval: env_parse::<u64>("POLL_INTERVAL_MS", "u64")?
                .map(Duration::from_millis)
                .unwrap_or(self.poll_interval),
            message_pump_interval: env_parse::<u64>("MESSAGE_PUMP_INTERVAL_MS", "u64")?
                .map(Duration::from_millis)
                .unwrap_or(self.message_pump_interval),
            backup_ttl: env_parse::<u64>("BACKUP_TTL_SECS", "u64")?
                .map(Duration::from_secs)
                .unwrap_or(self.backup_ttl),
            interactive_retry: retry_from_env("INTERACTIVE_RETRY", self.interactive_retry)?,
            submission_retry: retry_from_env("SUBMISSION_RETRY", self.submission_retry)?,
            grading_api_base_url: std::env::var("GRADING_API_BASE_URL")
                .unwrap_or(self.grading_api_base_url),
            grading_token: std::env::var("GRADING_TOKEN").unwrap_or(self.grading_token),
            verbose_logging: env_parse("VERBOSE_LOGGING", "bool")?.unwrap_or(self.verbose_logging),
        })
    }
}

/// 读取并解析环境变量，不存在返回 None，解析失败返回配置错误
fn env_parse<T: std::str::FromStr>(var_name: &str, expected_type: &str) -> AppResult<Option<T>> {
    match std::env::var(var_name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| {
            AppError::Config(ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            })
        }),
        Err(_) => Ok(None),
    }
}

/// 逗号分隔的列表
fn env_list(var_name: &str) -> Option<Vec<String>> {
    let value = std::env::var(var_name).ok()?;
    let items: Vec<String> = value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!items.is_empty()).then_some(items)
}

/// `<PREFIX>_ATTEMPTS` / `<PREFIX>_BASE_MS` / `<PREFIX>_GROWTH`
fn retry_from_env(prefix: &str, current: RetryPolicy) -> AppResult<RetryPolicy> {
    let max_attempts = env_parse(&format!("{}_ATTEMPTS", prefix), "u32")?.unwrap_or(current.max_attempts);
    let base_delay = env_parse::<u64>(&format!("{}_BASE_MS", prefix), "u64")?
        .map(Duration::from_millis)
        .unwrap_or(current.base_delay);
    let growth_var = format!("{}_GROWTH", prefix);
    let growth = match std::env::var(&growth_var) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Growth::Fixed,
            "exponential" => Growth::Exponential,
            _ => {
                return Err(AppError::Config(ConfigError::EnvVarParseFailed {
                    var_name: growth_var,
                    value,
                    expected_type: "fixed | exponential".to_string(),
                }))
            }
        },
        Err(_) => current.growth,
    };
    Ok(RetryPolicy::new(max_attempts, base_delay, growth))
}
