//! 翻译请求处理器

use std::sync::Arc;

use axum::{body::Bytes, extract::State, response::Json};

use crate::error::helpers::validation_error;
use crate::model::JobRequest;
use crate::web::types::{error_response, ApiError, AppState, TranslateResponse};

/// 接收翻译任务
///
/// 成功只表示已经开始投递回调，不表示远端已确认。
pub async fn translate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TranslateResponse>, ApiError> {
    let request: JobRequest = serde_json::from_slice(&body)
        .map_err(|e| error_response(&validation_error(format!("Invalid request body: {e}"))))?;

    let outcome = state
        .extension
        .receive(request)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(TranslateResponse {
        status: "sent",
        result: outcome.envelope,
    }))
}
