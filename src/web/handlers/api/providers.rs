//! 服务商列表

use std::sync::Arc;

use axum::{extract::State, response::Json};

use crate::web::types::{AppState, ProviderInfo, ProvidersResponse};

/// 按注册顺序列出服务商及其配置状态
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    let config = state.extension.config();
    let providers = state
        .extension
        .registry()
        .describe(&config.providers)
        .into_iter()
        .map(|(id, name, configured)| ProviderInfo {
            active: id == config.provider,
            id,
            name,
            configured,
        })
        .collect();

    Json(ProvidersResponse {
        active: config.provider.clone(),
        providers,
    })
}
