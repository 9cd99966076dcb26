//! Web 模块的数据类型定义

use std::sync::Arc;

use axum::{http::StatusCode, response::Json};
use serde::Serialize;
use serde_json::json;

use crate::coordinator::{StatsSnapshot, TranslationCoordinator};
use crate::error::RelayError;
use crate::extension::TranslationExtension;
use crate::model::{CallbackEnvelope, ItemId};
use crate::status::StatusManager;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub extension: TranslationExtension,
    pub coordinator: Arc<TranslationCoordinator>,
    pub status: StatusManager,
}

/// 处理器的错误响应
pub type ApiError = (StatusCode, Json<serde_json::Value>);

/// 翻译请求已受理
#[derive(Serialize)]
pub struct TranslateResponse {
    pub status: &'static str,
    pub result: CallbackEnvelope,
}

/// 回调已处理
#[derive(Serialize)]
pub struct CallbackResponse {
    pub status: &'static str,
    pub item_id: ItemId,
    pub notified: bool,
}

/// 服务商信息
#[derive(Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub configured: bool,
    pub active: bool,
}

#[derive(Serialize)]
pub struct ProvidersResponse {
    pub active: String,
    pub providers: Vec<ProviderInfo>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stats: StatsSnapshot,
}

/// 把中继错误转换为 `{error}` 响应
pub fn error_response(error: &RelayError) -> ApiError {
    let code = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(json!({ "error": error.to_string() })))
}
