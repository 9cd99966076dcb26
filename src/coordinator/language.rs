//! 语言关联与初始状态

use std::sync::Arc;

use crate::error::RelayResult;
use crate::model::ItemId;
use crate::store::{ContentStore, PublishState};

#[derive(Clone)]
pub struct LanguageManager {
    store: Arc<dyn ContentStore>,
    initial_status: PublishState,
}

impl LanguageManager {
    pub fn new(store: Arc<dyn ContentStore>, initial_status: PublishState) -> Self {
        Self {
            store,
            initial_status,
        }
    }

    pub fn initial_status(&self) -> PublishState {
        self.initial_status
    }

    /// 建立双向关联并设置译文的初始编辑状态
    pub async fn link(&self, original: ItemId, translation: ItemId, language: &str) -> RelayResult<()> {
        self.store
            .link_translation(original, translation, language)
            .await?;
        self.store.set_status(translation, self.initial_status).await
    }
}
