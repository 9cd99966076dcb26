//! 翻译服务商
//!
//! 所有后端实现同一个 [`TranslationProvider`] 契约，编排代码只依赖这个特性。
//! 内置三个实现：
//!
//! - `google` - 免配置，可选 API 密钥切换到 Cloud Translation
//! - `openai` - 需要 API 密钥的 OpenAI 兼容接口
//! - `deeplx` - 自建 DeepLX 服务
//!
//! 第三方通过 [`RegistryBuilder::on_init`] 在启动时注册更多服务商。

pub mod deeplx;
pub mod google;
pub mod openai;
pub mod registry;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ProviderSettings;
use crate::error::RelayResult;
use crate::model::{LanguageCode, TranslatableFields, TranslationResult};

pub use deeplx::DeepLxProvider;
pub use google::GoogleProvider;
pub use openai::OpenAiProvider;
pub use registry::{
    AssistantRoutingHook, ProviderRegistry, RegistryBuilder, Selection, SelectionHook,
};

/// 共享的服务商句柄
pub type ProviderHandle = Arc<dyn TranslationProvider>;

/// 翻译服务商契约
///
/// `translate` 对普通的接口层失败（限流、密钥错误、网络错误）返回
/// [`TranslationResult::Failed`]，只有调用方违反契约时才返回 `Err`。
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// 注册表中的唯一标识
    fn id(&self) -> &str;

    /// 展示名称
    fn name(&self) -> &str {
        self.id()
    }

    fn is_configured(&self, settings: &ProviderSettings) -> bool;

    async fn translate(
        &self,
        fields: &TranslatableFields,
        source_language: &str,
        target_language: &str,
        settings: &ProviderSettings,
    ) -> RelayResult<TranslationResult>;

    /// 支持的目标语言，空集合表示全部
    fn supported_languages(&self) -> HashSet<LanguageCode> {
        HashSet::new()
    }

    /// 按主语言子标签比较，`pt-BR` 视为 `pt`
    fn supports(&self, language: &str) -> bool {
        let supported = self.supported_languages();
        if supported.is_empty() {
            return true;
        }
        let primary = primary_subtag(language);
        supported
            .iter()
            .any(|code| code.eq_ignore_ascii_case(language) || primary_subtag(code) == primary)
    }
}

pub(crate) fn primary_subtag(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// 逐字段翻译，任一字段失败即整体失败，不返回部分译文
pub(crate) async fn translate_each<F, Fut>(fields: &TranslatableFields, mut translate: F) -> TranslationResult
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    let mut translated = Vec::new();
    for (key, value) in fields.entries() {
        if value.trim().is_empty() {
            translated.push((key, value));
            continue;
        }
        match translate(value).await {
            Ok(text) => translated.push((key, text)),
            Err(message) => {
                return TranslationResult::Failed(format!("Failed to translate {key}: {message}"))
            }
        }
    }
    TranslationResult::Translated(fields.with_translations(translated))
}

/// 把失败的 HTTP 响应转成可读的错误信息
pub(crate) async fn describe_http_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    match status.as_u16() {
        401 | 403 => format!("HTTP {status}: invalid or unauthorized API key"),
        429 => format!("HTTP {status}: rate limit exceeded"),
        _ if snippet.trim().is_empty() => format!("HTTP {status}"),
        _ => format!("HTTP {status}: {}", snippet.trim()),
    }
}

/// 网络层错误描述
pub(crate) fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        format!("network error: {error}")
    }
}
