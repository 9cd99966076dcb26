//! Web 路由定义

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::web::{handlers::*, types::AppState};

/// 创建路由结构
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        // 发送端：接收翻译任务
        .route("/api/translate", post(translate))
        // 接收端：远端投递的译文
        .route("/api/callback", post(callback))
        .route("/api/status/:original_id/:lang", get(get_status))
        .route("/api/providers", get(list_providers))
        .route("/health", get(health))
}
