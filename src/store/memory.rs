//! 内存内容存储

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use super::{ContentItem, ContentStore, NewItem, PublishState, Taxonomy, TermId};
use crate::error::helpers::storage_error;
use crate::error::RelayResult;
use crate::model::ItemId;

type TermKey = (Taxonomy, TermId, String);

/// 基于 `RwLock<HashMap>` 的内容存储，建立双向关联时需要一次锁住两个条目
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    items: Arc<RwLock<HashMap<ItemId, ContentItem>>>,
    term_translations: Arc<RwLock<HashMap<TermKey, TermId>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入一个已有条目，标识由调用方决定
    pub fn insert(&self, item: ContentItem) -> RelayResult<()> {
        self.next_id.fetch_max(item.id, Ordering::SeqCst);
        self.write_items()?.insert(item.id, item);
        Ok(())
    }

    /// 声明 `term` 在 `language` 下对应 `translated`
    pub fn map_term(
        &self,
        taxonomy: Taxonomy,
        term: TermId,
        language: &str,
        translated: TermId,
    ) -> RelayResult<()> {
        self.term_translations
            .write()
            .map_err(|_| storage_error("分类项映射锁已中毒".to_string()))?
            .insert((taxonomy, term, language.to_string()), translated);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_items(
        &self,
    ) -> RelayResult<std::sync::RwLockWriteGuard<'_, HashMap<ItemId, ContentItem>>> {
        self.items
            .write()
            .map_err(|_| storage_error("内容存储锁已中毒".to_string()))
    }

    fn update<F>(&self, id: ItemId, f: F) -> RelayResult<()>
    where
        F: FnOnce(&mut ContentItem),
    {
        let mut items = self.write_items()?;
        let item = items
            .get_mut(&id)
            .ok_or_else(|| storage_error(format!("内容条目 {id} 不存在")))?;
        f(item);
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get_item(&self, id: ItemId) -> RelayResult<Option<ContentItem>> {
        let items = self
            .items
            .read()
            .map_err(|_| storage_error("内容存储锁已中毒".to_string()))?;
        Ok(items.get(&id).cloned())
    }

    async fn create_item(&self, item: NewItem) -> RelayResult<ItemId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = ContentItem {
            id,
            title: item.title,
            content: item.content,
            excerpt: item.excerpt,
            language: item.language,
            status: item.status,
            translation_of: item.translation_of,
            ..Default::default()
        };
        self.write_items()?.insert(id, record);
        Ok(id)
    }

    async fn set_meta(&self, id: ItemId, key: &str, value: &Value) -> RelayResult<()> {
        self.update(id, |item| {
            item.meta.insert(key.to_string(), value.clone());
        })
    }

    async fn set_terms(&self, id: ItemId, taxonomy: Taxonomy, terms: &[TermId]) -> RelayResult<()> {
        self.update(id, |item| {
            item.terms.insert(taxonomy, terms.to_vec());
        })
    }

    async fn translated_term(
        &self,
        taxonomy: Taxonomy,
        term: TermId,
        language: &str,
    ) -> RelayResult<Option<TermId>> {
        let map = self
            .term_translations
            .read()
            .map_err(|_| storage_error("分类项映射锁已中毒".to_string()))?;
        Ok(map.get(&(taxonomy, term, language.to_string())).copied())
    }

    async fn link_translation(
        &self,
        original: ItemId,
        translation: ItemId,
        language: &str,
    ) -> RelayResult<()> {
        // 两个条目在同一把写锁下更新，DashMap 的分片锁做不到
        let mut items = self.write_items()?;
        if let Some(item) = items.get_mut(&original) {
            item.translations.insert(language.to_string(), translation);
        }
        let item = items
            .get_mut(&translation)
            .ok_or_else(|| storage_error(format!("内容条目 {translation} 不存在")))?;
        item.translation_of = Some(original);
        Ok(())
    }

    async fn set_status(&self, id: ItemId, status: PublishState) -> RelayResult<()> {
        self.update(id, |item| item.status = status)
    }
}
