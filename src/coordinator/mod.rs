//! 翻译协调器
//!
//! 把一次回调中的译文变成关联完整的内容条目。流水线阶段：
//!
//! ```text
//! received → validated → post_created → metadata_set → taxonomy_set
//!          → language_set → notified → completed
//! ```
//!
//! 任一阶段失败都进入 `failed(reason)`。条目创建之后的失败不回滚已创建的条目，
//! 状态记录为失败并带上条目标识。通知失败不影响结果。
//! 外层守卫同时捕获错误和 panic，保证每次尝试都以一次状态写入结束。

pub mod language;
pub mod metadata;
pub mod notification;
pub mod post;
pub mod taxonomy;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::helpers::internal_error;
use crate::error::RelayResult;
use crate::model::{CallbackEnvelope, CallbackPayload, ItemId};
use crate::status::StatusManager;
use crate::store::{ContentStore, PublishState};
use crate::validator::Validator;

pub use language::LanguageManager;
pub use metadata::MetadataManager;
pub use notification::{
    LogNotificationSink, Notification, NotificationKind, NotificationManager, NotificationSink,
};
pub use post::PostCreator;
pub use taxonomy::TaxonomyManager;

/// panic 时写入状态的通用原因
pub const UNEXPECTED_FAILURE: &str = "Unexpected error while building the translated item";

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Validated,
    PostCreated,
    MetadataSet,
    TaxonomySet,
    LanguageSet,
    Notified,
    Completed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::PostCreated => "post_created",
            PipelineStage::MetadataSet => "metadata_set",
            PipelineStage::TaxonomySet => "taxonomy_set",
            PipelineStage::LanguageSet => "language_set",
            PipelineStage::Notified => "notified",
            PipelineStage::Completed => "completed",
        })
    }
}

/// 一次成功处理的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorOutcome {
    pub item_id: ItemId,
    pub original_id: ItemId,
    pub language: String,
    pub stage: PipelineStage,
    /// 通知是否发送成功
    pub notified: bool,
}

/// 协调器统计信息
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    pub processed: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub notification_failures: AtomicU64,
}

/// 统计信息快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub notification_failures: u64,
}

impl CoordinatorStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
        }
    }
}

/// 翻译协调器
///
/// 由组合根构造一次后通过 `Arc` 共享。五个管理器各自只依赖内容存储。
pub struct TranslationCoordinator {
    store: Arc<dyn ContentStore>,
    status: StatusManager,
    validator: Validator,
    posts: PostCreator,
    metadata: MetadataManager,
    taxonomy: TaxonomyManager,
    language: LanguageManager,
    notifications: NotificationManager,
    stats: CoordinatorStats,
}

impl TranslationCoordinator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        status: StatusManager,
        initial_status: PublishState,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            posts: PostCreator::new(store.clone()),
            metadata: MetadataManager::new(store.clone()),
            taxonomy: TaxonomyManager::new(store.clone()),
            language: LanguageManager::new(store.clone(), initial_status),
            notifications: NotificationManager::new(sink, initial_status),
            validator: Validator::new(),
            store,
            status,
            stats: CoordinatorStats::default(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 校验入站回调后执行流水线，校验失败没有任何副作用
    pub async fn process_payload(&self, payload: CallbackPayload) -> RelayResult<CoordinatorOutcome> {
        let envelope = self.validator.validate_callback(payload).map_err(|e| {
            warn!("回调载荷校验失败: {}", e);
            e
        })?;
        self.process(envelope).await
    }

    /// 对已校验的载荷执行流水线
    pub async fn process(&self, envelope: CallbackEnvelope) -> RelayResult<CoordinatorOutcome> {
        let original_id = envelope.original_post_id;
        let language = envelope.target_language.clone();
        let started = Instant::now();

        self.stats.processed.fetch_add(1, Ordering::Relaxed);
        info!("开始处理译文: 原文 {} → {}", original_id, language);
        self.status.mark_pending(original_id, &language)?;

        let mut created = None;
        let result = AssertUnwindSafe(self.run_steps(&envelope, &mut created))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!("处理原文 {} ({}) 时发生 panic", original_id, language);
                Err(internal_error(UNEXPECTED_FAILURE))
            });

        match result {
            Ok(outcome) => {
                self.status
                    .mark_succeeded(original_id, &language, outcome.item_id)?;
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                info!(
                    "译文处理完成: 原文 {} → 条目 {} ({}), 耗时 {:?}",
                    original_id,
                    outcome.item_id,
                    language,
                    started.elapsed()
                );
                Ok(outcome)
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    "译文处理失败: 原文 {} ({}), 已创建条目 {:?}: {}",
                    original_id, language, created, e
                );
                if let Err(status_error) = self.status.mark_failed_with_item(
                    original_id,
                    &language,
                    &e.to_string(),
                    created,
                ) {
                    error!("写入失败状态时出错: {}", status_error);
                }
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        envelope: &CallbackEnvelope,
        created: &mut Option<ItemId>,
    ) -> RelayResult<CoordinatorOutcome> {
        let original_id = envelope.original_post_id;
        let language = envelope.target_language.as_str();

        let original = self.store.get_item(original_id).await?;
        if original.is_none() {
            warn!("本地不存在原文条目 {}，跳过元数据和分类复制", original_id);
        }

        let item_id = self.posts.create(envelope, original.as_ref()).await?;
        *created = Some(item_id);
        self.advance(PipelineStage::PostCreated, item_id);

        self.metadata
            .apply(item_id, envelope, original.as_ref())
            .await
            .map_err(|e| e.with_context("metadata"))?;
        self.advance(PipelineStage::MetadataSet, item_id);

        self.taxonomy
            .mirror(item_id, language, original.as_ref())
            .await
            .map_err(|e| e.with_context("taxonomy"))?;
        self.advance(PipelineStage::TaxonomySet, item_id);

        self.language
            .link(original_id, item_id, language)
            .await
            .map_err(|e| e.with_context("language"))?;
        self.advance(PipelineStage::LanguageSet, item_id);

        let notified = self.notifications.notify(item_id, original_id, language).await;
        if notified {
            self.advance(PipelineStage::Notified, item_id);
        } else {
            self.stats
                .notification_failures
                .fetch_add(1, Ordering::Relaxed);
        }

        Ok(CoordinatorOutcome {
            item_id,
            original_id,
            language: language.to_string(),
            stage: PipelineStage::Completed,
            notified,
        })
    }

    fn advance(&self, stage: PipelineStage, item_id: ItemId) {
        tracing::debug!(item_id, stage = %stage, "流水线阶段");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TranslatableFields;
    use serde_json::Value;
    use crate::status::TranslationState;
    use crate::store::{ContentItem, MemoryContentStore, Taxonomy};

    fn envelope() -> CallbackEnvelope {
        CallbackEnvelope {
            source_language: "en".into(),
            target_language: "fr".into(),
            original_post_id: 42,
            translated: TranslatableFields::from_entries(vec![
                ("title".into(), "Bonjour".into()),
                ("seo_title".into(), "Salut".into()),
            ]),
        }
    }

    fn seeded_store() -> MemoryContentStore {
        let store = MemoryContentStore::new();
        let mut original = ContentItem {
            id: 42,
            title: "Hello".into(),
            content: "<p>World</p>".into(),
            language: Some("en".into()),
            ..Default::default()
        };
        original.meta.insert("color".into(), "blue".into());
        original.meta.insert("seo_title".into(), "Hi".into());
        original.meta.insert("_relay_original_id".into(), "7".into());
        original.terms.insert(Taxonomy::Category, vec![3, 4]);
        original.terms.insert(Taxonomy::Tag, vec![9]);
        store.insert(original).unwrap();
        store.map_term(Taxonomy::Category, 3, "fr", 30).unwrap();
        store.map_term(Taxonomy::Tag, 9, "fr", 90).unwrap();
        store
    }

    fn coordinator(store: MemoryContentStore, initial: PublishState) -> TranslationCoordinator {
        TranslationCoordinator::new(
            Arc::new(store),
            StatusManager::in_memory(),
            initial,
            Arc::new(LogNotificationSink),
        )
    }

    #[tokio::test]
    async fn test_builds_fully_linked_item() {
        let store = seeded_store();
        let coordinator = coordinator(store.clone(), PublishState::PendingReview);

        let outcome = coordinator.process(envelope()).await.unwrap();
        assert_eq!(outcome.stage, PipelineStage::Completed);
        assert!(outcome.notified);

        let item = store.get_item(outcome.item_id).await.unwrap().unwrap();
        assert_eq!(item.title, "Bonjour");
        assert_eq!(item.content, "<p>World</p>");
        assert_eq!(item.language.as_deref(), Some("fr"));
        assert_eq!(item.status, PublishState::PendingReview);
        assert_eq!(item.translation_of, Some(42));
        assert_eq!(item.meta.get("color").and_then(Value::as_str), Some("blue"));
        assert_eq!(item.meta.get("seo_title").and_then(Value::as_str), Some("Salut"));
        assert_eq!(item.meta.get("_relay_original_id").and_then(Value::as_str), Some("42"));
        assert!(item.meta.contains_key("_relay_translated_at"));
        assert_eq!(item.terms.get(&Taxonomy::Category), Some(&vec![30]));
        assert_eq!(item.terms.get(&Taxonomy::Tag), Some(&vec![90]));

        let original = store.get_item(42).await.unwrap().unwrap();
        assert_eq!(original.translations.get("fr"), Some(&outcome.item_id));

        let status = coordinator.status.get(42, "fr").unwrap().unwrap();
        assert_eq!(
            status.state,
            TranslationState::Succeeded {
                item_id: outcome.item_id
            }
        );
    }

    #[tokio::test]
    async fn test_missing_original_still_creates_item() {
        let store = MemoryContentStore::new();
        let coordinator = coordinator(store.clone(), PublishState::Draft);

        let outcome = coordinator.process(envelope()).await.unwrap();
        let item = store.get_item(outcome.item_id).await.unwrap().unwrap();
        assert_eq!(item.title, "Bonjour");
        assert_eq!(item.translation_of, Some(42));
        assert!(item.terms.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_payload_has_no_side_effects() {
        let store = MemoryContentStore::new();
        let coordinator = coordinator(store.clone(), PublishState::Draft);

        let payload = CallbackPayload {
            source_language: Some("en".into()),
            target_language: Some("fr".into()),
            original_post_id: Some(42),
            translated: None,
        };
        assert!(coordinator.process_payload(payload).await.is_err());
        assert!(store.is_empty());
        assert!(coordinator.status.get(42, "fr").unwrap().is_none());
        assert_eq!(coordinator.stats().processed, 0);
    }
}
