//! Web 服务器模块
//!
//! 组合根：在这里构造注册表、状态管理器、扩展和协调器，注入到路由状态中。

pub mod config;
pub mod handlers;
pub mod routes;
pub mod types;

pub use config::*;
pub use handlers::*;
pub use routes::*;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::RelayConfig;
use crate::coordinator::{LogNotificationSink, NotificationSink, TranslationCoordinator};
use crate::error::helpers::{config_error, internal_error};
use crate::error::RelayResult;
use crate::extension::TranslationExtension;
use crate::providers::{ProviderRegistry, RegistryBuilder};
use crate::status::StatusManager;
use crate::store::{ContentStore, MemoryContentStore};

/// 路由层超时在处理器内部超时之后触发
const TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Web 服务器
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
    handler_timeout: Duration,
}

impl WebServer {
    /// 使用内置服务商、内存内容存储和日志通知创建服务器
    pub fn new(config: WebConfig, relay: RelayConfig) -> RelayResult<Self> {
        Self::with_parts(
            config,
            relay,
            RegistryBuilder::with_builtin_providers(),
            Arc::new(MemoryContentStore::new()),
            Arc::new(LogNotificationSink),
        )
    }

    /// 由调用方提供注册表构建器、内容存储和通知方
    pub fn with_parts(
        config: WebConfig,
        relay: RelayConfig,
        registry: RegistryBuilder,
        store: Arc<dyn ContentStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> RelayResult<Self> {
        let handler_timeout = relay.handler_timeout();
        let state = build_state(relay, registry.build(), store, sink)?;
        Ok(Self {
            config,
            state,
            handler_timeout,
        })
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone(), self.handler_timeout)
    }

    /// 启动 Web 服务器
    pub async fn start(&self) -> RelayResult<()> {
        let listener = tokio::net::TcpListener::bind(self.config.listen_address())
            .await
            .map_err(|e| config_error(format!("Failed to bind server: {e}")))?;

        tracing::info!(
            "Web server starting at http://{}",
            self.config.listen_address()
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| internal_error(format!("Server error: {e}")))?;

        Ok(())
    }
}

/// 构造共享状态
pub fn build_state(
    relay: RelayConfig,
    registry: ProviderRegistry,
    store: Arc<dyn ContentStore>,
    sink: Arc<dyn NotificationSink>,
) -> RelayResult<Arc<AppState>> {
    let status = StatusManager::from_path(relay.status_db_path.as_deref())?;
    let initial_status = relay.initial_status;
    let extension =
        TranslationExtension::new(Arc::new(registry), Arc::new(relay), status.clone())?;
    let coordinator = Arc::new(TranslationCoordinator::new(
        store,
        status.clone(),
        initial_status,
        sink,
    ));

    Ok(Arc::new(AppState {
        extension,
        coordinator,
        status,
    }))
}

/// 创建路由器
pub fn create_router(app_state: Arc<AppState>, handler_timeout: Duration) -> Router {
    create_routes()
        .with_state(app_state)
        .layer(TimeoutLayer::new(handler_timeout + TIMEOUT_MARGIN))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
