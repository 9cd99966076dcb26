//! 翻译任务的数据类型
//!
//! 入站载荷先以宽松的 `*Request` / `*Payload` 形式反序列化，
//! 经 [`crate::validator`] 校验后才成为不可变的 [`TranslationJob`] / [`CallbackEnvelope`]。

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// 内容条目标识
pub type ItemId = u64;

/// 语言代码，如 `en`、`fr`、`zh-CN`
pub type LanguageCode = String;

/// 可翻译字段
///
/// 已知字段之外的键都进入 `meta`，在线上格式中与已知字段平铺。
/// `meta` 中只有字符串值会被翻译，数字、数组、`null` 等原样保留。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatableFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "body", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(flatten)]
    pub meta: BTreeMap<String, Value>,
}

impl TranslatableFields {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.excerpt.is_none() && self.meta.is_empty()
    }

    /// 按固定顺序展开需要翻译的 (字段名, 文本)，非字符串的元数据不在其中
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::with_capacity(3 + self.meta.len());
        if let Some(title) = &self.title {
            entries.push(("title".to_string(), title.clone()));
        }
        if let Some(content) = &self.content {
            entries.push(("content".to_string(), content.clone()));
        }
        if let Some(excerpt) = &self.excerpt {
            entries.push(("excerpt".to_string(), excerpt.clone()));
        }
        for (key, value) in &self.meta {
            if let Value::String(text) = value {
                entries.push((key.clone(), text.clone()));
            }
        }
        entries
    }

    /// 用译文替换对应字段，其余字段保持不变
    pub fn with_translations<I>(&self, translations: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut fields = self.clone();
        fields.apply(translations);
        fields
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut fields = Self::default();
        fields.apply(entries);
        fields
    }

    fn apply<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in entries {
            match key.as_str() {
                "title" => self.title = Some(value),
                "content" | "body" => self.content = Some(value),
                "excerpt" => self.excerpt = Some(value),
                _ => {
                    self.meta.insert(key, Value::String(value));
                }
            }
        }
    }

    pub fn char_count(&self) -> usize {
        self.entries().iter().map(|(_, v)| v.chars().count()).sum()
    }
}

/// 入站翻译请求（未校验）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobRequest {
    pub source_language: Option<LanguageCode>,
    pub target_language: Option<LanguageCode>,
    #[serde(deserialize_with = "deserialize_item_id")]
    pub original_post_id: Option<ItemId>,
    #[serde(rename = "toTranslate")]
    pub to_translate: Option<TranslatableFields>,
    pub target_endpoint: Option<String>,
}

/// 校验通过的翻译任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationJob {
    pub fields: TranslatableFields,
    pub source_language: LanguageCode,
    pub target_language: LanguageCode,
    pub original_post_id: ItemId,
    pub target_endpoint: String,
}

/// 一次服务商调用的结果：要么完整译文，要么错误信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationResult {
    Translated(TranslatableFields),
    Failed(String),
}

impl TranslationResult {
    pub fn failed(message: impl Into<String>) -> Self {
        TranslationResult::Failed(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TranslationResult::Translated(_))
    }
}

#[derive(Serialize)]
struct TranslationResultWire<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    translated_content: Option<&'a TranslatableFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for TranslationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            TranslationResult::Translated(fields) => TranslationResultWire {
                success: true,
                translated_content: Some(fields),
                error: None,
            },
            TranslationResult::Failed(message) => TranslationResultWire {
                success: false,
                translated_content: None,
                error: Some(message),
            },
        };
        wire.serialize(serializer)
    }
}

/// 回调载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    pub source_language: LanguageCode,
    pub target_language: LanguageCode,
    pub original_post_id: ItemId,
    pub translated: TranslatableFields,
}

impl CallbackEnvelope {
    pub fn from_job(job: &TranslationJob, translated: TranslatableFields) -> Self {
        Self {
            source_language: job.source_language.clone(),
            target_language: job.target_language.clone(),
            original_post_id: job.original_post_id,
            translated,
        }
    }
}

/// 入站回调（未校验），认证字段等多余键被忽略
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallbackPayload {
    pub source_language: Option<LanguageCode>,
    pub target_language: Option<LanguageCode>,
    #[serde(deserialize_with = "deserialize_item_id")]
    pub original_post_id: Option<ItemId>,
    pub translated: Option<TranslatableFields>,
}

/// 接受数字或数字字符串形式的条目标识
fn deserialize_item_id<'de, D>(deserializer: D) -> Result<Option<ItemId>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(ItemId),
        Text(String),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Number(id)) => Ok(Some(id)),
        Some(RawId::Text(text)) => text
            .trim()
            .parse::<ItemId>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid item id '{text}'"))),
    }
}
