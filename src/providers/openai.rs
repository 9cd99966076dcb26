//! OpenAI 兼容接口翻译
//!
//! 每个字段一次 chat completions 请求，需要 API 密钥。

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{describe_http_failure, describe_request_error, translate_each, TranslationProvider};
use crate::config::ProviderSettings;
use crate::error::RelayResult;
use crate::model::{TranslatableFields, TranslationResult};

pub const PROVIDER_ID: &str = "openai";

/// 模型拒绝翻译时常见的开头
const REFUSAL_PHRASES: &[&str] = &[
    "i'm sorry",
    "i cannot",
    "i am unable",
    "as an ai",
    "my apologies",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// OpenAI 服务商
#[derive(Clone, Default)]
pub struct OpenAiProvider {
    client: Client,
}

impl OpenAiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    async fn complete(
        &self,
        text: String,
        source_language: &str,
        target_language: &str,
        settings: &ProviderSettings,
    ) -> Result<String, String> {
        let openai = &settings.openai;
        let api_key = openai.api_key.as_deref().unwrap_or_default();

        let request = ChatRequest {
            model: &openai.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt(source_language, target_language),
                },
                Message {
                    role: "user".to_string(),
                    content: text,
                },
            ],
            temperature: openai.temperature,
        };

        let url = format!("{}/chat/completions", openai.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .timeout(settings.timeout())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| describe_request_error(&e))?;

        if !response.status().is_success() {
            return Err(describe_http_failure(response).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("unexpected response: {e}"))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        check_completion(content)
    }
}

fn system_prompt(source_language: &str, target_language: &str) -> String {
    let source = if source_language == "auto" {
        "the detected source language".to_string()
    } else {
        source_language.to_string()
    };
    format!(
        "You are a professional translator. Translate the user's text from {source} to {target_language}. \
         Preserve HTML markup, shortcodes, placeholders and line breaks. \
         Reply with the translation only."
    )
}

fn check_completion(content: String) -> Result<String, String> {
    if content.is_empty() {
        return Err("empty response".to_string());
    }

    let lower = content.to_lowercase();
    if let Some(phrase) = REFUSAL_PHRASES.iter().find(|p| lower.starts_with(**p)) {
        return Err(format!("model refused to translate ({phrase})"));
    }

    Ok(content)
}

#[async_trait]
impl TranslationProvider for OpenAiProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    fn is_configured(&self, settings: &ProviderSettings) -> bool {
        settings
            .openai
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
            && !settings.openai.model.trim().is_empty()
    }

    async fn translate(
        &self,
        fields: &TranslatableFields,
        source_language: &str,
        target_language: &str,
        settings: &ProviderSettings,
    ) -> RelayResult<TranslationResult> {
        Ok(translate_each(fields, |text| {
            self.complete(text, source_language, target_language, settings)
        })
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let provider = OpenAiProvider::new();
        let mut settings = ProviderSettings::default();
        assert!(!provider.is_configured(&settings));

        settings.openai.api_key = Some("sk-test".to_string());
        assert!(provider.is_configured(&settings));
    }

    #[test]
    fn test_refusals_are_failures() {
        assert!(check_completion("I'm sorry, I can't help".to_string()).is_err());
        assert!(check_completion(String::new()).is_err());
        assert_eq!(check_completion("Bonjour".to_string()).unwrap(), "Bonjour");
    }

    #[test]
    fn test_prompt_mentions_languages() {
        let prompt = system_prompt("auto", "fr");
        assert!(prompt.contains("detected source language"));
        assert!(prompt.contains("to fr"));
    }
}
