//! 内容存储接口
//!
//! 内容平台的存储原语（条目、分类法、语言关联）被视为不透明的外部协作方，
//! 协调器只通过 [`ContentStore`] 访问它。[`MemoryContentStore`] 供服务进程和测试使用。

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayResult;
use crate::model::{ItemId, LanguageCode};

pub use memory::MemoryContentStore;

/// 分类项标识
pub type TermId = u64;

/// 条目的编辑状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    #[default]
    Draft,
    PendingReview,
    Published,
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PublishState::Draft => "draft",
            PublishState::PendingReview => "pending_review",
            PublishState::Published => "published",
        })
    }
}

/// 需要镜像到译文的分类法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    Category,
    Tag,
}

impl Taxonomy {
    pub const ALL: [Taxonomy; 2] = [Taxonomy::Category, Taxonomy::Tag];
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Taxonomy::Category => "category",
            Taxonomy::Tag => "tag",
        })
    }
}

/// 存储中的内容条目
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub language: Option<LanguageCode>,
    pub status: PublishState,
    pub meta: BTreeMap<String, Value>,
    pub terms: BTreeMap<Taxonomy, Vec<TermId>>,
    /// 译文指向原文
    pub translation_of: Option<ItemId>,
    /// 原文指向各语言译文
    pub translations: BTreeMap<LanguageCode, ItemId>,
}

/// 新建条目所需字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewItem {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub language: Option<LanguageCode>,
    pub status: PublishState,
    pub translation_of: Option<ItemId>,
}

/// 内容平台存储原语
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_item(&self, id: ItemId) -> RelayResult<Option<ContentItem>>;

    async fn create_item(&self, item: NewItem) -> RelayResult<ItemId>;

    async fn set_meta(&self, id: ItemId, key: &str, value: &Value) -> RelayResult<()>;

    async fn set_terms(&self, id: ItemId, taxonomy: Taxonomy, terms: &[TermId]) -> RelayResult<()>;

    /// 查找分类项在目标语言下的对应项，没有按语言维护的分类法时返回 `None`
    async fn translated_term(
        &self,
        taxonomy: Taxonomy,
        term: TermId,
        language: &str,
    ) -> RelayResult<Option<TermId>>;

    /// 建立原文与译文之间的双向关联
    async fn link_translation(
        &self,
        original: ItemId,
        translation: ItemId,
        language: &str,
    ) -> RelayResult<()>;

    async fn set_status(&self, id: ItemId, status: PublishState) -> RelayResult<()>;
}
