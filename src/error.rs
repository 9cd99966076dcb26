//! 中继统一错误处理
//!
//! 提供结构化错误类型，变体与翻译任务的失败路径一一对应：
//! 校验、服务商、内容创建、回调投递、身份认证

use std::fmt;

use thiserror::Error;

/// 中继错误类型
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    /// 任务字段缺失或格式错误（无副作用即被拒绝）
    #[error("{0}")]
    Validation(String),

    /// 翻译服务商失败：密钥错误、限流、网络等
    #[error("{0}")]
    Provider(String),

    /// 译文内容记录创建失败
    #[error("{0}")]
    Creation(String),

    /// 回调投递失败
    #[error("回调投递失败: {0}")]
    Delivery(String),

    /// 入站回调认证失败，原因只写日志不回显
    #[error("Unauthorized callback")]
    Authentication(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 存储错误
    #[error("存储错误: {0}")]
    Storage(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl RelayError {
    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RelayError::Validation(_) => ErrorSeverity::Info,
            RelayError::Authentication(_) => ErrorSeverity::Warning,
            RelayError::Provider(_) => ErrorSeverity::Warning,
            RelayError::Delivery(_) => ErrorSeverity::Warning,
            RelayError::Creation(_) => ErrorSeverity::Error,
            RelayError::Storage(_) => ErrorSeverity::Error,
            RelayError::Config(_) => ErrorSeverity::Critical,
            RelayError::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::Validation(_) => ErrorCategory::Validation,
            RelayError::Provider(_) => ErrorCategory::Provider,
            RelayError::Creation(_) => ErrorCategory::Creation,
            RelayError::Delivery(_) => ErrorCategory::Delivery,
            RelayError::Authentication(_) => ErrorCategory::Authentication,
            RelayError::Config(_) => ErrorCategory::Configuration,
            RelayError::Storage(_) => ErrorCategory::Storage,
            RelayError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::Validation(_) | RelayError::Config(_) => 400,
            RelayError::Authentication(_) => 403,
            RelayError::Delivery(_) => 502,
            RelayError::Provider(_)
            | RelayError::Creation(_)
            | RelayError::Storage(_)
            | RelayError::Internal(_) => 500,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        match self {
            RelayError::Validation(msg) => RelayError::Validation(format!("{msg} ({context})")),
            RelayError::Provider(msg) => RelayError::Provider(format!("{msg} ({context})")),
            RelayError::Creation(msg) => RelayError::Creation(format!("{msg} ({context})")),
            RelayError::Delivery(msg) => RelayError::Delivery(format!("{msg} ({context})")),
            RelayError::Authentication(msg) => {
                RelayError::Authentication(format!("{msg} ({context})"))
            }
            RelayError::Config(msg) => RelayError::Config(format!("{msg} ({context})")),
            RelayError::Storage(msg) => RelayError::Storage(format!("{msg} ({context})")),
            RelayError::Internal(msg) => RelayError::Internal(format!("{msg} ({context})")),
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Provider,
    Creation,
    Delivery,
    Authentication,
    Configuration,
    Storage,
    Internal,
}

impl From<reqwest::Error> for RelayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            RelayError::Delivery(format!("请求超时: {error}"))
        } else {
            RelayError::Delivery(error.to_string())
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(error: serde_json::Error) -> Self {
        RelayError::Validation(format!("JSON解析错误: {error}"))
    }
}

impl From<toml::ser::Error> for RelayError {
    fn from(error: toml::ser::Error) -> Self {
        RelayError::Config(format!("TOML序列化错误: {error}"))
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        RelayError::Config(error.to_string())
    }
}

impl From<redb::Error> for RelayError {
    fn from(error: redb::Error) -> Self {
        RelayError::Storage(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for RelayError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        RelayError::Internal(format!("异步操作超时: {error}"))
    }
}

/// 错误结果类型别名
pub type RelayResult<T> = Result<T, RelayError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录并返回错误
    pub fn log_error<T>(error: RelayError) -> RelayResult<T> {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!(category = ?error.category(), "{}", error),
            ErrorSeverity::Warning => {
                // 认证失败的具体原因只进日志
                if let RelayError::Authentication(reason) = &error {
                    tracing::warn!(category = ?error.category(), "回调认证失败: {}", reason);
                } else {
                    tracing::warn!(category = ?error.category(), "{}", error);
                }
            }
            ErrorSeverity::Error | ErrorSeverity::Critical => {
                tracing::error!(category = ?error.category(), "{}", error)
            }
        }

        Err(error)
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> RelayError {
        RelayError::Validation(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> RelayError {
        RelayError::Config(msg.to_string())
    }

    /// 创建存储错误
    pub fn storage_error<T: fmt::Display>(msg: T) -> RelayError {
        RelayError::Storage(msg.to_string())
    }

    /// 创建内部错误
    pub fn internal_error<T: fmt::Display>(msg: T) -> RelayError {
        RelayError::Internal(msg.to_string())
    }
}
