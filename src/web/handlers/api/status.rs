//! 翻译状态查询

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;

use crate::model::ItemId;
use crate::status::StatusRecord;
use crate::web::types::{error_response, ApiError, AppState};

/// 查询 (原文, 目标语言) 的当前状态
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path((original_id, language)): Path<(ItemId, String)>,
) -> Result<Json<StatusRecord>, ApiError> {
    match state.status.get(original_id, &language) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("No translation status for {original_id} ({language})")
            })),
        )),
        Err(e) => Err(error_response(&e)),
    }
}
