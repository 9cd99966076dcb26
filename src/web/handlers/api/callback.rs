//! 回调接收处理器

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};

use crate::auth::InboundCredentials;
use crate::error::helpers::validation_error;
use crate::model::CallbackPayload;
use crate::web::types::{error_response, ApiError, AppState, CallbackResponse};

/// 接收远端投递的译文
///
/// 先认证再解析载荷，认证失败不做任何处理。
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CallbackResponse>, ApiError> {
    let parsed = serde_json::from_slice::<serde_json::Value>(&body);
    let credentials = InboundCredentials::new(
        query,
        headers.iter().filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        }),
        parsed.as_ref().cloned().unwrap_or(serde_json::Value::Null),
    );

    state
        .extension
        .authenticate_inbound(&credentials)
        .map_err(|e| error_response(&e))?;

    let body = parsed.map_err(|e| {
        error_response(&validation_error(format!("Invalid callback body: {e}")))
    })?;
    let payload: CallbackPayload = serde_json::from_value(body)
        .map_err(|e| error_response(&validation_error(format!("Invalid callback body: {e}"))))?;

    let outcome = state
        .coordinator
        .process_payload(payload)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(CallbackResponse {
        status: "created",
        item_id: outcome.item_id,
        notified: outcome.notified,
    }))
}
