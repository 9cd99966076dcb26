//! 入站载荷校验
//!
//! 校验失败不产生任何副作用

use url::Url;

use crate::error::{RelayError, RelayResult};
use crate::model::{
    CallbackEnvelope, CallbackPayload, JobRequest, LanguageCode, TranslatableFields,
    TranslationJob,
};

/// 回调地址缺失时的错误信息
pub const MISSING_ENDPOINT: &str = "Missing target_endpoint";

/// 由服务商自动识别源语言
pub const AUTO_DETECT: &str = "auto";

/// 翻译任务与回调载荷的结构校验器
#[derive(Debug, Clone, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// 只检查回调地址，接收端在解析服务商之前调用
    pub fn require_endpoint(&self, request: &JobRequest) -> RelayResult<String> {
        let endpoint = request
            .target_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RelayError::Validation(MISSING_ENDPOINT.to_string()))?;

        let url = Url::parse(endpoint)
            .map_err(|e| RelayError::Validation(format!("Invalid target_endpoint: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::Validation(format!(
                "Invalid target_endpoint: unsupported scheme '{}'",
                url.scheme()
            )));
        }

        Ok(endpoint.to_string())
    }

    pub fn validate_job(&self, request: JobRequest) -> RelayResult<TranslationJob> {
        let target_endpoint = self.require_endpoint(&request)?;
        let source_language = Self::language("source_language", request.source_language, true)?;
        let target_language = Self::language("target_language", request.target_language, false)?;
        let original_post_id = Self::item_id(request.original_post_id)?;
        let fields = Self::fields("toTranslate", request.to_translate)?;

        Ok(TranslationJob {
            fields,
            source_language,
            target_language,
            original_post_id,
            target_endpoint,
        })
    }

    pub fn validate_callback(&self, payload: CallbackPayload) -> RelayResult<CallbackEnvelope> {
        let source_language = Self::language("source_language", payload.source_language, true)?;
        let target_language = Self::language("target_language", payload.target_language, false)?;
        let original_post_id = Self::item_id(payload.original_post_id)?;
        let translated = Self::fields("translated", payload.translated)?;

        if source_language == target_language {
            return Err(RelayError::Validation(
                "source_language and target_language must differ".to_string(),
            ));
        }

        Ok(CallbackEnvelope {
            source_language,
            target_language,
            original_post_id,
            translated,
        })
    }

    /// `auto` 只能作为源语言
    fn language(name: &str, value: Option<LanguageCode>, allow_auto: bool) -> RelayResult<LanguageCode> {
        let code = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RelayError::Validation(format!("Missing {name}")))?;

        if code == AUTO_DETECT {
            if allow_auto {
                return Ok(code);
            }
            return Err(RelayError::Validation(format!(
                "{name} cannot be '{AUTO_DETECT}'"
            )));
        }
        if !is_language_code(&code) {
            return Err(RelayError::Validation(format!(
                "Invalid {name} '{code}'"
            )));
        }
        Ok(code)
    }

    fn item_id(value: Option<u64>) -> RelayResult<u64> {
        match value {
            Some(0) => Err(RelayError::Validation("Invalid original_post_id".to_string())),
            Some(id) => Ok(id),
            None => Err(RelayError::Validation("Missing original_post_id".to_string())),
        }
    }

    fn fields(name: &str, value: Option<TranslatableFields>) -> RelayResult<TranslatableFields> {
        match value {
            Some(fields) if !fields.is_empty() => Ok(fields),
            Some(_) => Err(RelayError::Validation(format!("{name} must not be empty"))),
            None => Err(RelayError::Validation(format!("Missing {name}"))),
        }
    }
}

/// `en`、`pt-BR`、`zh_Hans` 这类代码
fn is_language_code(code: &str) -> bool {
    let mut parts = code.split(['-', '_']);
    let primary = parts.next().unwrap_or_default();

    (2..=3).contains(&primary.len())
        && primary.chars().all(|c| c.is_ascii_alphabetic())
        && parts.all(|p| (2..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> JobRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_job() {
        let job = Validator::new()
            .validate_job(request(json!({
                "source_language": "en",
                "target_language": "fr",
                "original_post_id": 42,
                "toTranslate": {"title": "Hello"},
                "target_endpoint": "https://b.example/cb"
            })))
            .unwrap();

        assert_eq!(job.original_post_id, 42);
        assert_eq!(job.fields.title.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_missing_endpoint_checked_first() {
        let err = Validator::new().validate_job(request(json!({}))).unwrap_err();
        assert_eq!(err.to_string(), MISSING_ENDPOINT);
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let err = Validator::new()
            .require_endpoint(&request(json!({"target_endpoint": "ftp://b.example/cb"})))
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }

    #[test]
    fn test_rejects_empty_fields() {
        let err = Validator::new()
            .validate_job(request(json!({
                "source_language": "en",
                "target_language": "fr",
                "original_post_id": 1,
                "toTranslate": {},
                "target_endpoint": "https://b.example/cb"
            })))
            .unwrap_err();
        assert_eq!(err.to_string(), "toTranslate must not be empty");
    }

    #[test]
    fn test_callback_requires_distinct_languages() {
        let payload: CallbackPayload = serde_json::from_value(json!({
            "source_language": "en",
            "target_language": "en",
            "original_post_id": 3,
            "translated": {"title": "Hi"}
        }))
        .unwrap();
        assert!(Validator::new().validate_callback(payload).is_err());
    }

    #[test]
    fn test_language_codes() {
        assert!(is_language_code("en"));
        assert!(is_language_code("pt-BR"));
        assert!(is_language_code("zh_Hans"));
        assert!(!is_language_code("auto!"));
        assert!(!is_language_code("english!"));
        assert!(!is_language_code("e"));
    }

    #[test]
    fn test_auto_is_only_a_source_language() {
        let job = |source: &str, target: &str| {
            request(json!({
                "source_language": source,
                "target_language": target,
                "original_post_id": 42,
                "toTranslate": {"title": "Hello"},
                "target_endpoint": "https://b.example/cb"
            }))
        };

        let ok = Validator::new().validate_job(job("auto", "fr")).unwrap();
        assert_eq!(ok.source_language, "auto");

        let err = Validator::new().validate_job(job("en", "auto")).unwrap_err();
        assert_eq!(err.to_string(), "target_language cannot be 'auto'");

        let payload: CallbackPayload = serde_json::from_value(json!({
            "source_language": "en",
            "target_language": "auto",
            "original_post_id": 3,
            "translated": {"title": "Hi"}
        }))
        .unwrap();
        assert!(Validator::new().validate_callback(payload).is_err());
    }
}
