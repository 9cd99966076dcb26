//! Google 翻译
//!
//! 默认使用免密钥的公开接口；配置了 `api_key` 时改走 Cloud Translation v2，
//! 一次请求翻译全部字段。

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{describe_http_failure, describe_request_error, translate_each, TranslationProvider};
use crate::config::{GoogleSettings, ProviderSettings};
use crate::error::RelayResult;
use crate::model::{TranslatableFields, TranslationResult};

pub const PROVIDER_ID: &str = "google";

/// Cloud Translation v2 响应
#[derive(Debug, Deserialize)]
struct CloudResponse {
    data: CloudData,
}

#[derive(Debug, Deserialize)]
struct CloudData {
    translations: Vec<CloudTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudTranslation {
    translated_text: String,
}

/// Google 翻译服务商
#[derive(Clone, Default)]
pub struct GoogleProvider {
    client: Client,
}

impl GoogleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    async fn translate_free(
        &self,
        text: String,
        source_language: &str,
        target_language: &str,
        settings: &ProviderSettings,
    ) -> Result<String, String> {
        let response = self
            .client
            .post(&settings.google.endpoint)
            .timeout(settings.timeout())
            .query(&[
                ("client", "gtx"),
                ("sl", source_language),
                ("tl", target_language),
                ("dt", "t"),
            ])
            .form(&[("q", text.as_str())])
            .send()
            .await
            .map_err(|e| describe_request_error(&e))?;

        if !response.status().is_success() {
            return Err(describe_http_failure(response).await);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("unexpected response: {e}"))?;
        parse_free_response(&body).ok_or_else(|| "unexpected response format".to_string())
    }

    async fn translate_cloud(
        &self,
        fields: &TranslatableFields,
        source_language: &str,
        target_language: &str,
        settings: &ProviderSettings,
        api_key: &str,
    ) -> TranslationResult {
        let entries = fields.entries();
        if entries.is_empty() {
            return TranslationResult::Translated(fields.clone());
        }
        let mut body = json!({
            "q": entries.iter().map(|(_, v)| v.as_str()).collect::<Vec<_>>(),
            "target": target_language,
            "format": "html",
        });
        if source_language != "auto" {
            body["source"] = json!(source_language);
        }

        let response = match self
            .client
            .post(&settings.google.cloud_endpoint)
            .timeout(settings.timeout())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return TranslationResult::Failed(describe_request_error(&e)),
        };

        if !response.status().is_success() {
            return TranslationResult::Failed(describe_http_failure(response).await);
        }

        let parsed: CloudResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => return TranslationResult::Failed(format!("unexpected response: {e}")),
        };

        if parsed.data.translations.len() != entries.len() {
            return TranslationResult::Failed(format!(
                "expected {} translations, got {}",
                entries.len(),
                parsed.data.translations.len()
            ));
        }

        TranslationResult::Translated(
            fields.with_translations(
                entries
                    .into_iter()
                    .zip(parsed.data.translations)
                    .map(|((key, _), t)| (key, t.translated_text)),
            ),
        )
    }
}

/// 公开接口返回 `[[["译文","原文",...], ...], ...]`，拼接每个分句的译文
fn parse_free_response(body: &serde_json::Value) -> Option<String> {
    let sentences = body.get(0)?.as_array()?;
    let text: String = sentences
        .iter()
        .filter_map(|s| s.get(0).and_then(|t| t.as_str()))
        .collect();
    (!text.is_empty()).then_some(text)
}

fn api_key(settings: &GoogleSettings) -> Option<&str> {
    settings.api_key.as_deref().filter(|k| !k.trim().is_empty())
}

#[async_trait]
impl TranslationProvider for GoogleProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Google Translate"
    }

    /// 免密钥接口始终可用
    fn is_configured(&self, settings: &ProviderSettings) -> bool {
        !settings.google.endpoint.trim().is_empty()
    }

    async fn translate(
        &self,
        fields: &TranslatableFields,
        source_language: &str,
        target_language: &str,
        settings: &ProviderSettings,
    ) -> RelayResult<TranslationResult> {
        if let Some(key) = api_key(&settings.google) {
            return Ok(self
                .translate_cloud(fields, source_language, target_language, settings, key)
                .await);
        }

        Ok(translate_each(fields, |text| {
            self.translate_free(text, source_language, target_language, settings)
        })
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_free_response_joins_sentences() {
        let body = json!([
            [["Bonjour. ", "Hello. ", null, null, 10], ["Au revoir.", "Goodbye.", null, null, 10]],
            null,
            "en"
        ]);
        assert_eq!(parse_free_response(&body).as_deref(), Some("Bonjour. Au revoir."));
    }

    #[test]
    fn test_parse_free_response_rejects_garbage() {
        assert!(parse_free_response(&json!({"error": "nope"})).is_none());
        assert!(parse_free_response(&json!([[]])).is_none());
    }

    #[test]
    fn test_configured_without_key() {
        assert!(GoogleProvider::new().is_configured(&ProviderSettings::default()));
    }
}
