//! 翻译状态管理
//!
//! 每个 (原文条目, 目标语言) 只保留一条当前状态，写入即覆盖（后写者胜），
//! 不保留历史。任何失败路径都会写入状态，调用方可以轮询而不依赖一次性的 HTTP 响应。

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};
use crate::model::{ItemId, LanguageCode};

/// 状态机中的取值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TranslationState {
    Pending,
    Translating,
    /// 发送端：译文已被回调地址接收，接收端的结果以其自身记录为准
    Delivered,
    Succeeded {
        item_id: ItemId,
    },
    Failed {
        reason: String,
        /// 创建之后才失败时记录已创建的条目
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<ItemId>,
    },
}

impl TranslationState {
    pub fn label(&self) -> &'static str {
        match self {
            TranslationState::Pending => "pending",
            TranslationState::Translating => "translating",
            TranslationState::Delivered => "delivered",
            TranslationState::Succeeded { .. } => "succeeded",
            TranslationState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TranslationState::Pending | TranslationState::Translating)
    }
}

/// 一条状态记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub original_id: ItemId,
    pub language: LanguageCode,
    #[serde(flatten)]
    pub state: TranslationState,
    pub updated_at: DateTime<Utc>,
}

/// 状态持久化后端，单键写入需原子
pub trait StatusStore: Send + Sync {
    fn put(&self, record: StatusRecord) -> RelayResult<()>;

    fn get(&self, original_id: ItemId, language: &str) -> RelayResult<Option<StatusRecord>>;
}

/// 基于 `DashMap` 的内存状态存储
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    records: DashMap<(ItemId, LanguageCode), StatusRecord>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for MemoryStatusStore {
    fn put(&self, record: StatusRecord) -> RelayResult<()> {
        self.records
            .insert((record.original_id, record.language.clone()), record);
        Ok(())
    }

    fn get(&self, original_id: ItemId, language: &str) -> RelayResult<Option<StatusRecord>> {
        Ok(self
            .records
            .get(&(original_id, language.to_string()))
            .map(|entry| entry.value().clone()))
    }
}

const STATUS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("translation_status");

/// 基于 redb 的磁盘状态存储，跨进程重启保留
pub struct RedbStatusStore {
    db: Database,
}

impl RedbStatusStore {
    pub fn open<P: AsRef<Path>>(path: P) -> RelayResult<Self> {
        let db = Database::create(path.as_ref()).map_err(redb::Error::from)?;

        // 预先建表，读事务不必处理表不存在
        let txn = db.begin_write().map_err(redb::Error::from)?;
        txn.open_table(STATUS_TABLE).map_err(redb::Error::from)?;
        txn.commit().map_err(redb::Error::from)?;

        tracing::info!("状态数据库已打开: {}", path.as_ref().display());
        Ok(Self { db })
    }

    fn key(original_id: ItemId, language: &str) -> String {
        format!("{original_id}:{language}")
    }
}

impl StatusStore for RedbStatusStore {
    fn put(&self, record: StatusRecord) -> RelayResult<()> {
        let key = Self::key(record.original_id, &record.language);
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| RelayError::Storage(format!("状态序列化失败: {e}")))?;

        let txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = txn.open_table(STATUS_TABLE).map_err(redb::Error::from)?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(redb::Error::from)?;
        }
        txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }

    fn get(&self, original_id: ItemId, language: &str) -> RelayResult<Option<StatusRecord>> {
        let key = Self::key(original_id, language);
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(STATUS_TABLE).map_err(redb::Error::from)?;

        match table.get(key.as_str()).map_err(redb::Error::from)? {
            Some(guard) => {
                let record = serde_json::from_slice(guard.value())
                    .map_err(|e| RelayError::Storage(format!("状态记录损坏 {key}: {e}")))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

/// 状态管理器，翻译状态的唯一写入入口
#[derive(Clone)]
pub struct StatusManager {
    store: Arc<dyn StatusStore>,
}

impl StatusManager {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStatusStore::new()))
    }

    /// 按配置选择存储：给出路径时使用 redb，否则使用内存
    pub fn from_path(path: Option<&str>) -> RelayResult<Self> {
        match path.filter(|p| !p.trim().is_empty()) {
            Some(path) => Ok(Self::new(Arc::new(RedbStatusStore::open(path)?))),
            None => Ok(Self::in_memory()),
        }
    }

    pub fn mark_pending(&self, original_id: ItemId, language: &str) -> RelayResult<()> {
        self.write(original_id, language, TranslationState::Pending)
    }

    pub fn mark_translating(&self, original_id: ItemId, language: &str) -> RelayResult<()> {
        self.write(original_id, language, TranslationState::Translating)
    }

    pub fn mark_succeeded(
        &self,
        original_id: ItemId,
        language: &str,
        item_id: ItemId,
    ) -> RelayResult<()> {
        self.write(original_id, language, TranslationState::Succeeded { item_id })
    }

    pub fn mark_failed(&self, original_id: ItemId, language: &str, reason: &str) -> RelayResult<()> {
        self.mark_failed_with_item(original_id, language, reason, None)
    }

    pub fn mark_failed_with_item(
        &self,
        original_id: ItemId,
        language: &str,
        reason: &str,
        item_id: Option<ItemId>,
    ) -> RelayResult<()> {
        self.write(
            original_id,
            language,
            TranslationState::Failed {
                reason: reason.to_string(),
                item_id,
            },
        )
    }

    pub fn get(&self, original_id: ItemId, language: &str) -> RelayResult<Option<StatusRecord>> {
        self.store.get(original_id, language)
    }

    /// 只在当前尝试尚未结束时写入结果，已有的终态记录保持不变
    ///
    /// 返回是否写入。回调投给本站时，接收端已先写入终态，这里不会覆盖它。
    pub fn settle(
        &self,
        original_id: ItemId,
        language: &str,
        state: TranslationState,
    ) -> RelayResult<bool> {
        match self.store.get(original_id, language)? {
            Some(record) if record.state.is_terminal() => {
                tracing::debug!(
                    original_id,
                    language,
                    current = record.state.label(),
                    "保留已有的终态记录"
                );
                Ok(false)
            }
            _ => self.write(original_id, language, state).map(|_| true),
        }
    }

    fn write(&self, original_id: ItemId, language: &str, state: TranslationState) -> RelayResult<()> {
        tracing::debug!(original_id, language, state = state.label(), "写入翻译状态");
        self.store.put(StatusRecord {
            original_id,
            language: language.to_string(),
            state,
            updated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(manager: &StatusManager) -> TranslationState {
        manager.get(42, "fr").unwrap().unwrap().state
    }

    #[test]
    fn test_last_write_wins() {
        let manager = StatusManager::in_memory();

        manager.mark_failed(42, "fr", "boom").unwrap();
        manager.mark_succeeded(42, "fr", 7).unwrap();
        assert_eq!(state(&manager), TranslationState::Succeeded { item_id: 7 });

        manager.mark_failed(42, "fr", "later").unwrap();
        assert_eq!(
            state(&manager),
            TranslationState::Failed {
                reason: "later".into(),
                item_id: None
            }
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let manager = StatusManager::in_memory();
        manager.mark_pending(42, "fr").unwrap();
        manager.mark_translating(42, "de").unwrap();

        assert_eq!(state(&manager), TranslationState::Pending);
        assert_eq!(manager.get(42, "de").unwrap().unwrap().state.label(), "translating");
        assert!(manager.get(43, "fr").unwrap().is_none());
    }

    #[test]
    fn test_settle_never_overwrites_terminal_records() {
        let manager = StatusManager::in_memory();

        manager.mark_translating(42, "fr").unwrap();
        assert!(manager.settle(42, "fr", TranslationState::Delivered).unwrap());
        assert_eq!(state(&manager), TranslationState::Delivered);

        manager
            .mark_failed_with_item(42, "fr", "taxonomy lookup failed", Some(9))
            .unwrap();
        let late = TranslationState::Failed {
            reason: "HTTP 500".into(),
            item_id: None,
        };
        assert!(!manager.settle(42, "fr", late).unwrap());
        assert_eq!(
            state(&manager),
            TranslationState::Failed {
                reason: "taxonomy lookup failed".into(),
                item_id: Some(9)
            }
        );

        // 新的尝试从 pending 重新开始
        manager.mark_pending(42, "fr").unwrap();
        assert!(manager.settle(42, "fr", TranslationState::Delivered).unwrap());
        assert!(manager.settle(43, "fr", TranslationState::Delivered).unwrap());
    }

    #[test]
    fn test_redb_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.redb");

        {
            let manager = StatusManager::from_path(path.to_str()).unwrap();
            manager
                .mark_failed_with_item(42, "fr", "taxonomy lookup failed", Some(9))
                .unwrap();
        }

        let manager = StatusManager::from_path(path.to_str()).unwrap();
        assert_eq!(
            state(&manager),
            TranslationState::Failed {
                reason: "taxonomy lookup failed".into(),
                item_id: Some(9)
            }
        );
    }

    #[test]
    fn test_record_wire_format() {
        let record = StatusRecord {
            original_id: 1,
            language: "fr".into(),
            state: TranslationState::Succeeded { item_id: 2 },
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["state"], "succeeded");
        assert_eq!(value["item_id"], 2);
    }
}
