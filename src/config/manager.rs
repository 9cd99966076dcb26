//! 配置管理器
//!
//! 默认值 → 配置文件（TOML/JSON）→ 环境变量，依次覆盖，加载时统一校验

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::auth::{AuthConfig, AuthMethod};
use crate::error::{RelayError, RelayResult};
use crate::store::PublishState;

/// Google 翻译设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// 设置后改用 Cloud Translation v2
    pub api_key: Option<String>,
    pub endpoint: String,
    pub cloud_endpoint: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: constants::GOOGLE_FREE_ENDPOINT.to_string(),
            cloud_endpoint: constants::GOOGLE_CLOUD_ENDPOINT.to_string(),
        }
    }
}

/// OpenAI 兼容接口设置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: constants::OPENAI_BASE_URL.to_string(),
            model: constants::OPENAI_MODEL.to_string(),
            temperature: 0.2,
        }
    }
}

/// DeepLX 设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeepLxSettings {
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
}

impl Default for DeepLxSettings {
    fn default() -> Self {
        Self {
            endpoint: Some(constants::DEEPLX_ENDPOINT.to_string()),
            access_token: None,
        }
    }
}

/// 所有服务商的设置，第三方服务商的设置放在 `custom` 中
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub timeout_secs: u64,
    pub google: GoogleSettings,
    pub openai: OpenAiSettings,
    pub deeplx: DeepLxSettings,
    pub custom: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            timeout_secs: constants::DEFAULT_PROVIDER_TIMEOUT.as_secs(),
            google: GoogleSettings::default(),
            openai: OpenAiSettings::default(),
            deeplx: DeepLxSettings::default(),
            custom: BTreeMap::new(),
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 第三方服务商的某项设置
    pub fn custom_value(&self, provider: &str, key: &str) -> Option<&str> {
        self.custom
            .get(provider)
            .and_then(|values| values.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// 中继配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// 当前使用的服务商标识
    pub provider: String,
    pub delivery_timeout_secs: u64,
    pub handler_timeout_secs: u64,
    /// 仅在非生产模式下生效
    pub insecure_tls: bool,
    pub mode: String,
    pub initial_status: PublishState,
    /// 为空时状态只保存在内存
    pub status_db_path: Option<String>,
    pub auth: AuthConfig,
    pub providers: ProviderSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            provider: constants::DEFAULT_PROVIDER.to_string(),
            delivery_timeout_secs: constants::DEFAULT_DELIVERY_TIMEOUT.as_secs(),
            handler_timeout_secs: constants::DEFAULT_HANDLER_TIMEOUT.as_secs(),
            insecure_tls: false,
            mode: "production".to_string(),
            initial_status: PublishState::Draft,
            status_db_path: None,
            auth: AuthConfig::default(),
            providers: ProviderSettings::default(),
        }
    }
}

impl RelayConfig {
    /// 验证配置
    pub fn validate(&self) -> RelayResult<()> {
        if self.provider.trim().is_empty() {
            return Err(RelayError::Config("服务商标识不能为空".to_string()));
        }

        if self.providers.timeout_secs == 0 {
            return Err(RelayError::Config("服务商超时必须大于0".to_string()));
        }

        if self.delivery_timeout_secs == 0 {
            return Err(RelayError::Config("回调投递超时必须大于0".to_string()));
        }

        if self.handler_timeout_secs < self.providers.timeout_secs {
            return Err(RelayError::Config(
                "请求处理超时不能小于服务商超时".to_string(),
            ));
        }

        if self.initial_status == PublishState::Published {
            return Err(RelayError::Config(
                "译文初始状态只能是 draft 或 pending_review".to_string(),
            ));
        }

        if self.auth.method != AuthMethod::None
            && self.auth.secret.as_deref().map_or(true, str::is_empty)
        {
            tracing::warn!("已设置认证方式 {} 但未配置密钥，回调将以开放模式处理", self.auth.method);
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) -> RelayResult<()> {
        use crate::env::{auth, core, providers, relay, EnvVar};

        fn env_err(e: crate::env::EnvError) -> RelayError {
            RelayError::Config(e.to_string())
        }

        if let Some(mode) = core::Mode::get_if_set() {
            self.mode = mode.map_err(env_err)?;
        }

        if let Some(provider) = relay::Provider::get_if_set() {
            self.provider = provider.map_err(env_err)?;
            tracing::info!("环境变量覆盖服务商: {}", self.provider);
        }

        if let Some(timeout) = relay::ProviderTimeout::get_if_set() {
            self.providers.timeout_secs = timeout.map_err(env_err)?.as_secs();
        }

        if let Some(timeout) = relay::DeliveryTimeout::get_if_set() {
            self.delivery_timeout_secs = timeout.map_err(env_err)?.as_secs();
        }

        if let Some(timeout) = relay::HandlerTimeout::get_if_set() {
            self.handler_timeout_secs = timeout.map_err(env_err)?.as_secs();
        }

        if let Some(insecure) = relay::InsecureTls::get_if_set() {
            self.insecure_tls = insecure.map_err(env_err)?;
        }

        if let Some(status) = relay::InitialStatus::get_if_set() {
            self.initial_status = status.map_err(env_err)?;
        }

        if let Some(path) = relay::StatusDbPath::get_if_set() {
            let path = path.map_err(env_err)?;
            self.status_db_path = (!path.is_empty()).then_some(path);
        }

        if let Some(secret) = auth::Secret::get_if_set() {
            self.auth.secret = Some(secret.map_err(env_err)?);
        }

        if let Some(method) = auth::Method::get_if_set() {
            self.auth.method = method.map_err(env_err)?;
        }

        if let Some(name) = auth::FieldName::get_if_set() {
            self.auth.field_name = Some(name.map_err(env_err)?);
        }

        if let Some(key) = providers::GoogleApiKey::get_if_set() {
            self.providers.google.api_key = Some(key.map_err(env_err)?);
        }

        if let Some(key) = providers::OpenAiApiKey::get_if_set() {
            self.providers.openai.api_key = Some(key.map_err(env_err)?);
        }

        if let Some(model) = providers::OpenAiModel::get_if_set() {
            self.providers.openai.model = model.map_err(env_err)?;
        }

        if let Some(url) = providers::OpenAiBaseUrl::get_if_set() {
            self.providers.openai.base_url = url.map_err(env_err)?;
        }

        if let Some(url) = providers::DeepLxUrl::get_if_set() {
            self.providers.deeplx.endpoint = Some(url.map_err(env_err)?);
        }

        Ok(())
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    pub fn is_production(&self) -> bool {
        self.mode == "production"
    }

    /// 生产模式下始终校验证书
    pub fn skip_tls_verification(&self) -> bool {
        self.insecure_tls && !self.is_production()
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: RelayConfig,
}

impl ConfigManager {
    /// 搜索默认路径加载配置
    pub fn new() -> RelayResult<Self> {
        Self::load(None)
    }

    /// 从指定文件加载配置，仍然应用环境变量覆盖
    pub fn from_path(path: &str) -> RelayResult<Self> {
        Self::load(Some(path))
    }

    fn load(path: Option<&str>) -> RelayResult<Self> {
        Self::load_dotenv();

        let mut config = match path {
            Some(path) => Self::load_from_file(&shellexpand::tilde(path))?,
            None => Self::search_config()?,
        };
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(Self { config })
    }

    pub fn into_config(self) -> RelayConfig {
        self.config
    }

    fn search_config() -> RelayResult<RelayConfig> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(RelayConfig::default())
    }

    /// 从指定文件加载配置，格式由扩展名决定
    fn load_from_file(path: &str) -> RelayResult<RelayConfig> {
        if !Path::new(path).exists() {
            return Err(RelayError::Config(format!("配置文件不存在: {path}")));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(Path::new(path)))
            .build()?;

        Ok(settings.try_deserialize::<RelayConfig>()?)
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> RelayResult<()> {
        let content = toml::to_string_pretty(&RelayConfig::default())?;

        std::fs::write(path, content)
            .map_err(|e| RelayError::Config(format!("写入配置文件失败: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider, "google");
        assert!(!config.skip_tls_verification());
    }

    #[test]
    fn test_insecure_tls_ignored_in_production() {
        let mut config = RelayConfig {
            insecure_tls: true,
            ..Default::default()
        };
        assert!(!config.skip_tls_verification());

        config.mode = "development".to_string();
        assert!(config.skip_tls_verification());
    }

    #[test]
    fn test_rejects_published_initial_status() {
        let config = RelayConfig {
            initial_status: PublishState::Published,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_handler_timeout_below_provider_timeout() {
        let mut config = RelayConfig::default();
        config.handler_timeout_secs = 5;
        config.providers.timeout_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            r#"
provider = "openai"
delivery_timeout_secs = 5

[auth]
secret = "s3cret"
method = "bearer"

[providers.openai]
api_key = "sk-test"
model = "gpt-4o"

[providers.custom.acme]
region = "eu"
"#,
        )
        .unwrap();

        let config = ConfigManager::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.delivery_timeout_secs, 5);
        assert_eq!(config.auth.method, AuthMethod::Bearer);
        assert_eq!(config.providers.openai.model, "gpt-4o");
        assert_eq!(config.providers.custom_value("acme", "region"), Some("eu"));
        // 未出现的字段保持默认值
        assert_eq!(config.handler_timeout_secs, 90);
    }

    #[test]
    fn test_example_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.toml");
        ConfigManager::generate_example_config(path.to_str().unwrap()).unwrap();

        let config = ConfigManager::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config, RelayConfig::default());
    }
}
