//! 元数据复制与翻译标记

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::config::constants::MARKER_PREFIX;
use crate::error::RelayResult;
use crate::model::{CallbackEnvelope, ItemId};
use crate::store::{ContentItem, ContentStore};

pub const MARKER_ORIGINAL_ID: &str = "_relay_original_id";
pub const MARKER_SOURCE_LANGUAGE: &str = "_relay_source_language";
pub const MARKER_TARGET_LANGUAGE: &str = "_relay_target_language";
pub const MARKER_TRANSLATED_AT: &str = "_relay_translated_at";

#[derive(Clone)]
pub struct MetadataManager {
    store: Arc<dyn ContentStore>,
}

impl MetadataManager {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// 复制原文中不需要翻译的元数据，写入译文元数据和翻译标记
    ///
    /// 返回写入的键数
    pub async fn apply(
        &self,
        item_id: ItemId,
        envelope: &CallbackEnvelope,
        original: Option<&ContentItem>,
    ) -> RelayResult<usize> {
        let translated = &envelope.translated.meta;
        let mut written = 0;

        if let Some(original) = original {
            for (key, value) in &original.meta {
                if key.starts_with(MARKER_PREFIX) || translated.contains_key(key) {
                    continue;
                }
                self.store.set_meta(item_id, key, value).await?;
                written += 1;
            }
        }

        for (key, value) in translated {
            if key.starts_with(MARKER_PREFIX) {
                debug!("忽略译文中的内部元数据 {}", key);
                continue;
            }
            self.store.set_meta(item_id, key, value).await?;
            written += 1;
        }

        let markers = [
            (MARKER_ORIGINAL_ID, Value::from(envelope.original_post_id.to_string())),
            (MARKER_SOURCE_LANGUAGE, Value::from(envelope.source_language.as_str())),
            (MARKER_TARGET_LANGUAGE, Value::from(envelope.target_language.as_str())),
            (MARKER_TRANSLATED_AT, Value::from(Utc::now().to_rfc3339())),
        ];
        for (key, value) in &markers {
            self.store.set_meta(item_id, key, value).await?;
        }
        written += markers.len();

        debug!("条目 {} 写入 {} 个元数据", item_id, written);
        Ok(written)
    }
}
