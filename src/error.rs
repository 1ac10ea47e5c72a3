use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 浏览器相关错误
    Browser(BrowserError),
    /// 采集通道错误（通常静默处理）
    Channel(ChannelError),
    /// 本地存储错误
    Storage(StorageError),
    /// 远程服务调用错误
    Api(ApiError),
    /// 采集业务错误
    Capture(CaptureError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Browser(e) => write!(f, "浏览器错误: {}", e),
            AppError::Channel(e) => write!(f, "通道错误: {}", e),
            AppError::Storage(e) => write!(f, "存储错误: {}", e),
            AppError::Api(e) => write!(f, "API错误: {}", e),
            AppError::Capture(e) => write!(f, "采集错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Browser(e) => Some(e),
            AppError::Channel(e) => Some(e),
            AppError::Storage(e) => Some(e),
            AppError::Api(e) => Some(e),
            AppError::Capture(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 浏览器相关错误
#[derive(Debug)]
pub enum BrowserError {
    /// 执行脚本失败
    ScriptExecutionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::ScriptExecutionFailed { source } => {
                write!(f, "执行脚本失败: {}", source)
            }
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::ScriptExecutionFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 采集通道错误
///
/// 跨域拦截、没有收到消息都属于"通道不可用"，不是故障，调用方应静默处理。
#[derive(Debug)]
pub enum ChannelError {
    /// 通道暂不可用（例如同源策略拦截）
    Unavailable { channel: &'static str, reason: String },
    /// 消息发送失败
    SendFailed { reason: String },
}

impl ChannelError {
    pub fn unavailable(channel: &'static str, reason: impl Into<String>) -> Self {
        ChannelError::Unavailable {
            channel,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Unavailable { channel, reason } => {
                write!(f, "通道 {} 不可用: {}", channel, reason)
            }
            ChannelError::SendFailed { reason } => write!(f, "消息发送失败: {}", reason),
        }
    }
}

impl std::error::Error for ChannelError {}

/// 本地存储错误
#[derive(Debug)]
pub enum StorageError {
    /// 存储不可用（隐私模式、页面未就绪等）
    Unavailable { reason: String },
    /// 写入失败（例如配额超限）
    WriteFailed { key: String, reason: String },
    /// 记录无法解析
    Corrupt {
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable { reason } => write!(f, "存储不可用: {}", reason),
            StorageError::WriteFailed { key, reason } => {
                write!(f, "写入 {} 失败: {}", key, reason)
            }
            StorageError::Corrupt { key, source } => write!(f, "记录 {} 无法解析: {}", key, source),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Corrupt { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 远程服务调用错误
#[derive(Debug)]
pub enum ApiError {
    /// 网络请求失败
    RequestFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 服务返回错误响应
    BadResponse {
        endpoint: String,
        status: Option<u16>,
        message: Option<String>,
    },
    /// JSON 解析失败
    JsonParseFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::RequestFailed { endpoint, source } => {
                write!(f, "API请求失败 ({}): {}", endpoint, source)
            }
            ApiError::BadResponse {
                endpoint,
                status,
                message,
            } => {
                write!(
                    f,
                    "API返回错误响应 ({}): status={:?}, message={:?}",
                    endpoint, status, message
                )
            }
            ApiError::JsonParseFailed { source } => write!(f, "JSON解析失败: {}", source),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::RequestFailed { source, .. } | ApiError::JsonParseFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            ApiError::BadResponse { .. } => None,
        }
    }
}

/// 采集业务错误
///
/// 只有这一类会展示给操作员。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// 手动输入为空
    EmptyInput { field: &'static str },
    /// 粘贴的地址里没有电路状态参数
    MissingStateToken { input: String },
    /// 所有通道、备份、兜底都拿不到状态，提交中止
    Unrecoverable { question_id: String },
}

impl CaptureError {
    /// 给操作员看的提示
    pub fn operator_prompt(&self) -> String {
        match self {
            CaptureError::EmptyInput { field } => {
                format!("⚠️ {}不能为空，请粘贴内容后再确认", field)
            }
            CaptureError::MissingStateToken { .. } => {
                "⚠️ 地址中没有找到电路状态参数，请从模拟器重新复制分享链接".to_string()
            }
            CaptureError::Unrecoverable { question_id } => format!(
                "❌ 题目 {} 无法获取电路状态，请使用 `url <地址>` 或 `export <文本>` 手动录入后重新提交",
                question_id
            ),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::EmptyInput { field } => write!(f, "{}为空", field),
            CaptureError::MissingStateToken { input } => {
                write!(f, "地址中没有电路状态参数: {}", input)
            }
            CaptureError::Unrecoverable { question_id } => {
                write!(f, "题目 {} 的电路状态无法恢复", question_id)
            }
        }
    }
}

impl std::error::Error for CaptureError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件解析失败
    FileParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::FileParseFailed { path, source } => {
                write!(f, "配置文件 {} 解析失败: {}", path, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::FileParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            ConfigError::EnvVarParseFailed { .. } => None,
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_default();
        AppError::Api(ApiError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

impl From<ChannelError> for AppError {
    fn from(err: ChannelError) -> Self {
        AppError::Channel(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建服务端错误响应
    pub fn bad_response(
        endpoint: impl Into<String>,
        status: Option<u16>,
        message: Option<String>,
    ) -> Self {
        AppError::Api(ApiError::BadResponse {
            endpoint: endpoint.into(),
            status,
            message,
        })
    }

    /// 如果是采集业务错误则返回引用
    pub fn as_capture(&self) -> Option<&CaptureError> {
        match self {
            AppError::Capture(e) => Some(e),
            _ => None,
        }
    }

    /// 是否是不可恢复的采集失败（需要打开手动录入）
    pub fn is_unrecoverable_capture(&self) -> bool {
        matches!(self, AppError::Capture(CaptureError::Unrecoverable { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
