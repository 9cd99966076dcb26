//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，配置文件之上的最后一层覆盖

use std::env;
use std::fmt;
use std::time::Duration;

use crate::auth::AuthMethod;
use crate::store::PublishState;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 仅在变量被显式设置时返回值
    fn get_if_set() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 应用运行模式
    pub struct Mode;
    impl EnvVar<String> for Mode {
        const NAME: &'static str = "RELAY_MODE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Application mode: development, staging, production";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("production".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "development" | "dev" => Ok("development".to_string()),
                "staging" | "stage" => Ok("staging".to_string()),
                "production" | "prod" => Ok("production".to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid mode '{}'. Use: development, staging, production",
                        value
                    ),
                }),
            }
        }
    }

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "RELAY_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 中继行为相关环境变量
pub mod relay {
    use super::*;

    /// 当前使用的翻译服务商
    pub struct Provider;
    impl EnvVar<String> for Provider {
        const NAME: &'static str = "RELAY_PROVIDER";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Identifier of the translation provider to use";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("google".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            let id = value.trim();
            if id.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Provider identifier cannot be empty".to_string(),
                });
            }
            Ok(id.to_string())
        }
    }

    /// 服务商调用超时
    pub struct ProviderTimeout;
    impl EnvVar<Duration> for ProviderTimeout {
        const NAME: &'static str = "RELAY_PROVIDER_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(30));
        const DESCRIPTION: &'static str = "Translation provider request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_timeout(value, Self::NAME, 300)
        }
    }

    /// 回调投递超时
    pub struct DeliveryTimeout;
    impl EnvVar<Duration> for DeliveryTimeout {
        const NAME: &'static str = "RELAY_DELIVERY_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(15));
        const DESCRIPTION: &'static str = "Callback delivery request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_timeout(value, Self::NAME, 300)
        }
    }

    /// 整个接收处理器的超时
    pub struct HandlerTimeout;
    impl EnvVar<Duration> for HandlerTimeout {
        const NAME: &'static str = "RELAY_HANDLER_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(90));
        const DESCRIPTION: &'static str = "Timeout wrapping a whole inbound request in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_timeout(value, Self::NAME, 900)
        }
    }

    /// 跳过回调 TLS 校验（生产模式下无效）
    pub struct InsecureTls;
    impl EnvVar<bool> for InsecureTls {
        const NAME: &'static str = "RELAY_INSECURE_TLS";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str =
            "Skip TLS verification for callbacks (ignored in production mode)";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 译文记录的初始状态
    pub struct InitialStatus;
    impl EnvVar<PublishState> for InitialStatus {
        const NAME: &'static str = "RELAY_INITIAL_STATUS";
        const DEFAULT: Option<PublishState> = Some(PublishState::Draft);
        const DESCRIPTION: &'static str = "Initial status of translated items: draft, pending_review";

        fn parse(value: &str) -> EnvResult<PublishState> {
            match value.trim().to_lowercase().as_str() {
                "draft" => Ok(PublishState::Draft),
                "pending_review" | "pending" | "review" => Ok(PublishState::PendingReview),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid status '{}'. Use: draft, pending_review", value),
                }),
            }
        }
    }

    /// 状态数据库路径，空值表示只保存在内存
    pub struct StatusDbPath;
    impl EnvVar<String> for StatusDbPath {
        const NAME: &'static str = "RELAY_STATUS_DB";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Path of the on-disk status database (empty: in-memory)";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok(String::new()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            Ok(shellexpand::tilde(value.trim()).into_owned())
        }
    }
}

/// 回调认证相关环境变量
pub mod auth {
    use super::*;

    /// 共享密钥
    pub struct Secret;
    impl EnvVar<String> for Secret {
        const NAME: &'static str = "RELAY_AUTH_SECRET";
        const DEFAULT: Option<String> = None; // 未设置即开放模式
        const DESCRIPTION: &'static str = "Shared secret for callback authentication";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// 认证方式
    pub struct Method;
    impl EnvVar<AuthMethod> for Method {
        const NAME: &'static str = "RELAY_AUTH_METHOD";
        const DEFAULT: Option<AuthMethod> = Some(AuthMethod::None);
        const DESCRIPTION: &'static str =
            "Authentication method: none, query_param, bearer, custom_header, body_field";

        fn parse(value: &str) -> EnvResult<AuthMethod> {
            value.parse::<AuthMethod>().map_err(|message| EnvError {
                variable: Self::NAME.to_string(),
                message,
            })
        }
    }

    /// 查询参数 / 请求头 / 请求体字段名称
    pub struct FieldName;
    impl EnvVar<String> for FieldName {
        const NAME: &'static str = "RELAY_AUTH_FIELD";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str =
            "Name of the query parameter, header or body field carrying the secret";

        fn parse(value: &str) -> EnvResult<String> {
            let name = value.trim();
            if name.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Field name cannot be empty".to_string(),
                });
            }
            Ok(name.to_string())
        }
    }
}

/// 服务商凭据相关环境变量
pub mod providers {
    use super::*;

    /// Google Cloud Translation API 密钥（可选）
    pub struct GoogleApiKey;
    impl EnvVar<String> for GoogleApiKey {
        const NAME: &'static str = "RELAY_GOOGLE_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Google Cloud Translation API key (optional)";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// OpenAI API 密钥
    pub struct OpenAiApiKey;
    impl EnvVar<String> for OpenAiApiKey {
        const NAME: &'static str = "RELAY_OPENAI_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "OpenAI-compatible API key";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// OpenAI 模型
    pub struct OpenAiModel;
    impl EnvVar<String> for OpenAiModel {
        const NAME: &'static str = "RELAY_OPENAI_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Model used for OpenAI translations";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// OpenAI 兼容接口地址
    pub struct OpenAiBaseUrl;
    impl EnvVar<String> for OpenAiBaseUrl {
        const NAME: &'static str = "RELAY_OPENAI_BASE_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Base URL of the OpenAI-compatible API";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    /// DeepLX 接口地址
    pub struct DeepLxUrl;
    impl EnvVar<String> for DeepLxUrl {
        const NAME: &'static str = "RELAY_DEEPLX_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "DeepLX translate endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }
}

/// Web服务器相关环境变量
pub mod web {
    use super::*;

    /// 绑定地址
    pub struct BindAddress;
    impl EnvVar<String> for BindAddress {
        const NAME: &'static str = "RELAY_WEB_BIND_ADDRESS";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Web server bind address";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("127.0.0.1".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            let addr = value.trim();
            if addr.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Address cannot be empty".to_string(),
                });
            }
            Ok(addr.to_string())
        }
    }

    /// 端口
    pub struct Port;
    impl EnvVar<u16> for Port {
        const NAME: &'static str = "RELAY_WEB_PORT";
        const DEFAULT: Option<u16> = Some(7080);
        const DESCRIPTION: &'static str = "Web server port";

        fn parse(value: &str) -> EnvResult<u16> {
            let port: u16 = value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid port number (1-65535)".to_string(),
            })?;

            if port == 0 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Port cannot be 0".to_string(),
                });
            }

            Ok(port)
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_timeout(value: &str, var_name: &str, max_secs: u64) -> EnvResult<Duration> {
    let seconds: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid number of seconds".to_string(),
    })?;

    if seconds == 0 {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: "Timeout must be greater than 0".to_string(),
        });
    }

    if seconds > max_secs {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Timeout too long (max {} seconds)", max_secs),
        });
    }

    Ok(Duration::from_secs(seconds))
}

fn parse_http_url(value: &str, var_name: &str) -> EnvResult<String> {
    let url = value.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: "URL must start with http:// or https://".to_string(),
        })
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    fn line<T: fmt::Debug, V: EnvVar<T>>(docs: &mut String) {
        docs.push_str(&format!(
            "- `{}`: {} (default: {:?})\n",
            V::NAME,
            V::DESCRIPTION,
            V::DEFAULT
        ));
    }

    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    line::<String, core::Mode>(&mut docs);
    line::<String, core::LogLevel>(&mut docs);
    line::<bool, core::NoColor>(&mut docs);

    docs.push_str("\n## Relay Configuration\n\n");
    line::<String, relay::Provider>(&mut docs);
    line::<Duration, relay::ProviderTimeout>(&mut docs);
    line::<Duration, relay::DeliveryTimeout>(&mut docs);
    line::<Duration, relay::HandlerTimeout>(&mut docs);
    line::<bool, relay::InsecureTls>(&mut docs);
    line::<PublishState, relay::InitialStatus>(&mut docs);
    line::<String, relay::StatusDbPath>(&mut docs);

    docs.push_str("\n## Callback Authentication\n\n");
    line::<String, auth::Secret>(&mut docs);
    line::<AuthMethod, auth::Method>(&mut docs);
    line::<String, auth::FieldName>(&mut docs);

    docs.push_str("\n## Providers\n\n");
    line::<String, providers::GoogleApiKey>(&mut docs);
    line::<String, providers::OpenAiApiKey>(&mut docs);
    line::<String, providers::OpenAiModel>(&mut docs);
    line::<String, providers::OpenAiBaseUrl>(&mut docs);
    line::<String, providers::DeepLxUrl>(&mut docs);

    docs.push_str("\n## Web Server Configuration\n\n");
    line::<String, web::BindAddress>(&mut docs);
    line::<u16, web::Port>(&mut docs);

    docs
}
