//! 中继配置管理模块
//!
//! 支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{
    ConfigManager, DeepLxSettings, GoogleSettings, OpenAiSettings, ProviderSettings, RelayConfig,
};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    pub const DEFAULT_PROVIDER: &str = "google";

    // 超时设置
    pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);
    pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(90);

    // 服务商默认地址
    pub const GOOGLE_FREE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
    pub const GOOGLE_CLOUD_ENDPOINT: &str =
        "https://translation.googleapis.com/language/translate/v2";
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    pub const OPENAI_MODEL: &str = "gpt-4o-mini";
    pub const DEEPLX_ENDPOINT: &str = "http://localhost:1188/translate";

    /// 译文条目上的内部元数据前缀，复制原文元数据时跳过
    pub const MARKER_PREFIX: &str = "_relay_";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "relay-config.toml",
        "relay-config.json",
        ".relay-config.toml",
        "~/.config/translation-relay/config.toml",
        "/etc/translation-relay/config.toml",
    ];
}
