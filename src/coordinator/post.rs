//! 译文条目创建

use std::sync::Arc;

use tracing::info;

use crate::error::{RelayError, RelayResult};
use crate::model::{CallbackEnvelope, ItemId};
use crate::store::{ContentItem, ContentStore, NewItem, PublishState};

/// 用译文字段创建新条目，缺失的字段回退到原文
#[derive(Clone)]
pub struct PostCreator {
    store: Arc<dyn ContentStore>,
}

impl PostCreator {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        envelope: &CallbackEnvelope,
        original: Option<&ContentItem>,
    ) -> RelayResult<ItemId> {
        let item = build_item(envelope, original);

        let id = self
            .store
            .create_item(item)
            .await
            .map_err(|e| RelayError::Creation(format!("Failed to create translated item: {e}")))?;

        info!(
            "已创建译文条目 {} (原文 {}, {})",
            id, envelope.original_post_id, envelope.target_language
        );
        Ok(id)
    }
}

fn build_item(envelope: &CallbackEnvelope, original: Option<&ContentItem>) -> NewItem {
    let fields = &envelope.translated;
    let pick = |translated: &Option<String>, original: Option<&String>| {
        translated
            .clone()
            .or_else(|| original.cloned())
            .unwrap_or_default()
    };

    NewItem {
        title: pick(&fields.title, original.map(|i| &i.title)),
        content: pick(&fields.content, original.map(|i| &i.content)),
        excerpt: pick(&fields.excerpt, original.map(|i| &i.excerpt)),
        language: Some(envelope.target_language.clone()),
        status: PublishState::Draft,
        translation_of: Some(envelope.original_post_id),
    }
}
