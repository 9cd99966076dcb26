//! DeepLX 翻译
//!
//! 调用自建的 DeepLX 服务，语言代码使用 DeepL 的大写形式。

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{describe_http_failure, describe_request_error, translate_each, TranslationProvider};
use crate::config::ProviderSettings;
use crate::error::RelayResult;
use crate::model::{LanguageCode, TranslatableFields, TranslationResult};

pub const PROVIDER_ID: &str = "deeplx";

/// DeepL 支持的目标语言
const DEEPL_LANGUAGES: &[&str] = &[
    "ar", "bg", "cs", "da", "de", "el", "en", "es", "et", "fi", "fr", "hu", "id", "it", "ja",
    "ko", "lt", "lv", "nb", "nl", "pl", "pt", "ro", "ru", "sk", "sl", "sv", "tr", "uk", "zh",
];

#[derive(Debug, Serialize)]
struct DeepLxRequest<'a> {
    text: &'a str,
    source_lang: String,
    target_lang: String,
}

#[derive(Debug, Deserialize)]
struct DeepLxResponse {
    code: u16,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// DeepLX 服务商
#[derive(Clone, Default)]
pub struct DeepLxProvider {
    client: Client,
}

impl DeepLxProvider {
    pub fn new() -> Self {
        Self::default()
    }

    async fn translate_text(
        &self,
        text: String,
        source_language: &str,
        target_language: &str,
        settings: &ProviderSettings,
    ) -> Result<String, String> {
        let endpoint = endpoint(settings).ok_or_else(|| "DeepLX endpoint not set".to_string())?;

        let request = DeepLxRequest {
            text: &text,
            source_lang: deepl_code(source_language),
            target_lang: deepl_code(target_language),
        };

        let mut builder = self
            .client
            .post(endpoint)
            .timeout(settings.timeout())
            .json(&request);
        if let Some(token) = settings.deeplx.access_token.as_deref().filter(|t| !t.is_empty()) {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| describe_request_error(&e))?;

        if !response.status().is_success() {
            return Err(describe_http_failure(response).await);
        }

        let parsed: DeepLxResponse = response
            .json()
            .await
            .map_err(|e| format!("unexpected response: {e}"))?;
        parse_response(parsed)
    }
}

fn endpoint(settings: &ProviderSettings) -> Option<&str> {
    settings
        .deeplx
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
}

/// DeepL 使用大写代码，自动检测写作 `auto`
fn deepl_code(language: &str) -> String {
    if language.eq_ignore_ascii_case("auto") {
        "auto".to_string()
    } else {
        language.replace('_', "-").to_ascii_uppercase()
    }
}

fn parse_response(response: DeepLxResponse) -> Result<String, String> {
    if response.code != 200 {
        return Err(format!(
            "DeepLX error {}: {}",
            response.code,
            response.message.unwrap_or_default()
        ));
    }
    response
        .data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| "empty response".to_string())
}

#[async_trait]
impl TranslationProvider for DeepLxProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        "DeepLX"
    }

    fn is_configured(&self, settings: &ProviderSettings) -> bool {
        endpoint(settings).is_some()
    }

    async fn translate(
        &self,
        fields: &TranslatableFields,
        source_language: &str,
        target_language: &str,
        settings: &ProviderSettings,
    ) -> RelayResult<TranslationResult> {
        Ok(translate_each(fields, |text| {
            self.translate_text(text, source_language, target_language, settings)
        })
        .await)
    }

    fn supported_languages(&self) -> HashSet<LanguageCode> {
        DEEPL_LANGUAGES.iter().map(|code| code.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deepl_codes() {
        assert_eq!(deepl_code("auto"), "auto");
        assert_eq!(deepl_code("pt_br"), "PT-BR");
        assert_eq!(deepl_code("fr"), "FR");
    }

    #[test]
    fn test_parse_response() {
        let ok = DeepLxResponse {
            code: 200,
            data: Some("Bonjour".to_string()),
            message: None,
        };
        assert_eq!(parse_response(ok).unwrap(), "Bonjour");

        let limited = DeepLxResponse {
            code: 429,
            data: None,
            message: Some("Too Many Requests".to_string()),
        };
        assert_eq!(
            parse_response(limited).unwrap_err(),
            "DeepLX error 429: Too Many Requests"
        );
    }

    #[test]
    fn test_supported_languages() {
        let provider = DeepLxProvider::new();
        assert!(provider.supports("pt-BR"));
        assert!(provider.supports("ZH"));
        assert!(!provider.supports("sw"));
    }

    #[test]
    fn test_requires_endpoint() {
        let provider = DeepLxProvider::new();
        let mut settings = ProviderSettings::default();
        assert!(provider.is_configured(&settings));

        settings.deeplx.endpoint = Some("  ".to_string());
        assert!(!provider.is_configured(&settings));
    }
}
