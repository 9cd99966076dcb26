//! 译文创建后的下游通知
//!
//! 通知失败（包括 panic）只记录日志，不影响本次翻译的结果。

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::RelayResult;
use crate::model::{ItemId, LanguageCode};
use crate::store::PublishState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// 译文等待编辑审核
    ReadyForReview,
    Created,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationKind::ReadyForReview => "ready_for_review",
            NotificationKind::Created => "created",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub item_id: ItemId,
    pub original_id: ItemId,
    pub language: LanguageCode,
}

/// 通知的实际发送方
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, notification: &Notification) -> RelayResult<()>;
}

/// 只写日志的默认实现
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn emit(&self, notification: &Notification) -> RelayResult<()> {
        info!(
            kind = %notification.kind,
            item_id = notification.item_id,
            original_id = notification.original_id,
            language = %notification.language,
            "译文通知"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationManager {
    sink: Arc<dyn NotificationSink>,
    initial_status: PublishState,
}

impl NotificationManager {
    pub fn new(sink: Arc<dyn NotificationSink>, initial_status: PublishState) -> Self {
        Self {
            sink,
            initial_status,
        }
    }

    pub fn decide(&self) -> NotificationKind {
        match self.initial_status {
            PublishState::PendingReview => NotificationKind::ReadyForReview,
            PublishState::Draft | PublishState::Published => NotificationKind::Created,
        }
    }

    /// 发送通知，返回是否成功
    pub async fn notify(&self, item_id: ItemId, original_id: ItemId, language: &str) -> bool {
        let notification = Notification {
            kind: self.decide(),
            item_id,
            original_id,
            language: language.to_string(),
        };

        match AssertUnwindSafe(self.sink.emit(&notification))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("条目 {} 的通知发送失败: {}", item_id, e);
                false
            }
            Err(_) => {
                warn!("条目 {} 的通知发送时发生 panic", item_id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_status_selects_review_notification() {
        let sink: Arc<dyn NotificationSink> = Arc::new(LogNotificationSink);
        let review = NotificationManager::new(sink.clone(), PublishState::PendingReview);
        let draft = NotificationManager::new(sink, PublishState::Draft);

        assert_eq!(review.decide(), NotificationKind::ReadyForReview);
        assert_eq!(draft.decide(), NotificationKind::Created);
    }
}
