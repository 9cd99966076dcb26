// 集成测试公共模块
//
// 提供测试替身（服务商、内容存储、通知方）和本地回调接收端

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{HeaderMap, Request, StatusCode},
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use translation_relay::auth::{InboundCredentials, SignedRequest};
use translation_relay::config::{ProviderSettings, RelayConfig};
use translation_relay::coordinator::{Notification, NotificationSink};
use translation_relay::error::{RelayError, RelayResult};
use translation_relay::model::{ItemId, TranslatableFields, TranslationResult};
use translation_relay::providers::{RegistryBuilder, TranslationProvider};
use translation_relay::store::{
    ContentItem, ContentStore, MemoryContentStore, NewItem, PublishState, Taxonomy, TermId,
};
use translation_relay::web::{build_state, create_router, AppState};

/// 可控的翻译服务商
pub struct StubProvider {
    id: String,
    configured: bool,
    dictionary: HashMap<String, String>,
    failure: Option<String>,
    delay: Option<Duration>,
    panics: bool,
    calls: AtomicUsize,
}

impl StubProvider {
    fn base(id: &str) -> Self {
        Self {
            id: id.to_string(),
            configured: true,
            dictionary: HashMap::new(),
            failure: None,
            delay: None,
            panics: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// 按词典翻译，词典中没有的值加上目标语言前缀
    pub fn translating(id: &str, pairs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            dictionary: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Self::base(id)
        })
    }

    pub fn failing(id: &str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(message.to_string()),
            ..Self::base(id)
        })
    }

    pub fn unconfigured(id: &str) -> Arc<Self> {
        Arc::new(Self {
            configured: false,
            ..Self::base(id)
        })
    }

    /// 翻译前先等待，用于触发超时
    pub fn slow(id: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::base(id)
        })
    }

    pub fn panicking(id: &str) -> Arc<Self> {
        Arc::new(Self {
            panics: true,
            ..Self::base(id)
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationProvider for StubProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_configured(&self, _settings: &ProviderSettings) -> bool {
        self.configured
    }

    async fn translate(
        &self,
        fields: &TranslatableFields,
        _source_language: &str,
        target_language: &str,
        _settings: &ProviderSettings,
    ) -> RelayResult<TranslationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("provider blew up");
        }
        if let Some(message) = &self.failure {
            return Ok(TranslationResult::failed(message.clone()));
        }

        Ok(TranslationResult::Translated(fields.with_translations(
            fields.entries().into_iter().map(|(key, value)| {
                let translated = self
                    .dictionary
                    .get(&value)
                    .cloned()
                    .unwrap_or_else(|| format!("[{target_language}] {value}"));
                (key, translated)
            }),
        )))
    }
}

/// 总是失败的通知方
pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn emit(&self, _notification: &Notification) -> RelayResult<()> {
        Err(RelayError::Internal("notification service unavailable".to_string()))
    }
}

/// 记录收到的通知
#[derive(Default)]
pub struct RecordingSink {
    pub notifications: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn emit(&self, notification: &Notification) -> RelayResult<()> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// 可注入故障的内容存储，记录每个写操作
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub inner: MemoryContentStore,
    pub fail_create: bool,
    pub panic_on_terms: bool,
    pub operations: Arc<Mutex<Vec<&'static str>>>,
}

impl FaultyStore {
    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    pub fn panicking_on_terms() -> Self {
        Self {
            panic_on_terms: true,
            ..Default::default()
        }
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.operations.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str) {
        self.operations.lock().unwrap().push(operation);
    }
}

#[async_trait]
impl ContentStore for FaultyStore {
    async fn get_item(&self, id: ItemId) -> RelayResult<Option<ContentItem>> {
        self.inner.get_item(id).await
    }

    async fn create_item(&self, item: NewItem) -> RelayResult<ItemId> {
        self.record("create_item");
        if self.fail_create {
            return Err(RelayError::Storage("disk full".to_string()));
        }
        self.inner.create_item(item).await
    }

    async fn set_meta(&self, id: ItemId, key: &str, value: &Value) -> RelayResult<()> {
        self.record("set_meta");
        self.inner.set_meta(id, key, value).await
    }

    async fn set_terms(&self, id: ItemId, taxonomy: Taxonomy, terms: &[TermId]) -> RelayResult<()> {
        self.record("set_terms");
        if self.panic_on_terms {
            panic!("taxonomy backend crashed");
        }
        self.inner.set_terms(id, taxonomy, terms).await
    }

    async fn translated_term(
        &self,
        taxonomy: Taxonomy,
        term: TermId,
        language: &str,
    ) -> RelayResult<Option<TermId>> {
        self.inner.translated_term(taxonomy, term, language).await
    }

    async fn link_translation(
        &self,
        original: ItemId,
        translation: ItemId,
        language: &str,
    ) -> RelayResult<()> {
        self.record("link_translation");
        self.inner
            .link_translation(original, translation, language)
            .await
    }

    async fn set_status(&self, id: ItemId, status: PublishState) -> RelayResult<()> {
        self.record("set_status");
        self.inner.set_status(id, status).await
    }
}

/// 原文条目：id 42，带元数据和分类
pub fn seed_original(store: &MemoryContentStore) {
    let mut original = ContentItem {
        id: 42,
        title: "Hello".into(),
        content: "<p>World</p>".into(),
        language: Some("en".into()),
        ..Default::default()
    };
    original.meta.insert("color".into(), "blue".into());
    original.terms.insert(Taxonomy::Category, vec![3]);
    original.terms.insert(Taxonomy::Tag, vec![9]);
    store.insert(original).unwrap();
    store.map_term(Taxonomy::Category, 3, "fr", 30).unwrap();
}

/// 一个合法的翻译任务
pub fn job_body(endpoint: &str) -> Value {
    json!({
        "source_language": "en",
        "target_language": "fr",
        "original_post_id": 42,
        "toTranslate": {"title": "Hello"},
        "target_endpoint": endpoint
    })
}

/// 一个合法的回调载荷
pub fn callback_body() -> Value {
    json!({
        "source_language": "en",
        "target_language": "fr",
        "original_post_id": 42,
        "translated": {"title": "Bonjour", "content": "<p>Monde</p>"}
    })
}

/// 构造一个完整的中继实例
pub fn relay_state(
    config: RelayConfig,
    registry: RegistryBuilder,
    store: Arc<dyn ContentStore>,
    sink: Arc<dyn NotificationSink>,
) -> Arc<AppState> {
    build_state(config, registry.build(), store, sink).unwrap()
}

pub fn relay_router(state: Arc<AppState>) -> Router {
    create_router(state, Duration::from_secs(30))
}

/// 通过 oneshot 发送请求，返回状态码和 JSON 响应体
pub async fn send(
    router: Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// 签名请求转换为接收端看到的凭据
pub fn credentials_from(signed: &SignedRequest) -> InboundCredentials {
    let query = signed
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    InboundCredentials::new(query, signed.headers.clone(), signed.body.clone())
}

/// 回调接收端收到的一次请求
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

#[derive(Clone)]
struct ReceiverState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    status: StatusCode,
}

/// 本地回调接收端
pub struct CallbackReceiver {
    pub url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl CallbackReceiver {
    pub async fn start() -> Self {
        Self::responding(StatusCode::OK).await
    }

    /// 对每个请求返回指定状态码
    pub async fn responding(status: StatusCode) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = ReceiverState {
            requests: requests.clone(),
            status,
        };
        let app = Router::new()
            .route("/cb", post(capture))
            .with_state(state);
        let base = serve(app).await;

        Self {
            url: format!("{base}/cb"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// 等待至少 `count` 个请求到达
    pub async fn wait_for(&self, count: usize) -> Vec<CapturedRequest> {
        for _ in 0..100 {
            let requests = self.requests();
            if requests.len() >= count {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.requests()
    }
}

async fn capture(
    State(state): State<ReceiverState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let headers = headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state
        .requests
        .lock()
        .unwrap()
        .push(CapturedRequest { query, headers, body });
    state.status
}

/// 在随机端口上启动路由，返回基础地址
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
