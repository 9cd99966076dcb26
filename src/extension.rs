//! 翻译扩展：接收、投递与入站认证
//!
//! 接收翻译任务后按配置选择服务商执行翻译，再把结果签名后 POST 到任务给出的回调地址。
//! 投递在后台任务中进行，不影响已经返回给请求方的响应；
//! 投递结果写入日志和指标，也可以通过返回的 [`JoinHandle`] 观察。
//! 投递成功记为 `delivered`，失败记为 `failed`，但都不覆盖已有的终态记录。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use reqwest::Client;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::auth::InboundCredentials;
use crate::config::RelayConfig;
use crate::error::{helpers, RelayError, RelayResult};
use crate::model::{CallbackEnvelope, JobRequest, TranslationResult};
use crate::providers::ProviderRegistry;
use crate::status::{StatusManager, TranslationState};
use crate::validator::Validator;

/// 一次回调投递的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub endpoint: String,
    pub original_id: u64,
    pub language: String,
    /// 远端返回的 HTTP 状态码
    pub status: Option<u16>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// 接收成功后的结果
#[derive(Debug)]
pub struct ReceiveOutcome {
    pub envelope: CallbackEnvelope,
    /// 后台投递任务
    pub delivery: JoinHandle<DeliveryReport>,
}

/// 翻译扩展
///
/// 各字段都可廉价克隆，投递任务持有自己的一份。
#[derive(Clone)]
pub struct TranslationExtension {
    registry: Arc<ProviderRegistry>,
    config: Arc<RelayConfig>,
    client: Client,
    validator: Validator,
    status: StatusManager,
}

impl TranslationExtension {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        config: Arc<RelayConfig>,
        status: StatusManager,
    ) -> RelayResult<Self> {
        if config.skip_tls_verification() {
            warn!("回调投递已关闭 TLS 证书校验");
        }

        let client = Client::builder()
            .timeout(config.delivery_timeout())
            .danger_accept_invalid_certs(config.skip_tls_verification())
            .build()
            .map_err(|e| RelayError::Config(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            registry,
            config,
            client,
            validator: Validator::new(),
            status,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// 接收并执行一个翻译任务
    ///
    /// 回调地址缺失时在解析服务商之前就拒绝。服务商失败时不投递。
    pub async fn receive(&self, request: JobRequest) -> RelayResult<ReceiveOutcome> {
        let endpoint = self.validator.require_endpoint(&request)?;
        let job = self.validator.validate_job(request)?;
        let original_id = job.original_post_id;
        let language = job.target_language.clone();

        info!(
            "收到翻译任务: 原文 {} ({} → {}), 回调 {}",
            original_id, job.source_language, language, endpoint
        );
        self.record(self.status.mark_pending(original_id, &language));

        let requested = self.config.provider.as_str();
        let provider = match self.registry.select(requested) {
            Ok(provider) => provider,
            Err(e) => return Err(self.fail(original_id, &language, e)),
        };

        if !provider.is_configured(&self.config.providers) {
            let e = RelayError::Validation(format!(
                "Translation provider {requested} is not properly configured"
            ));
            return Err(self.fail(original_id, &language, e));
        }

        if !provider.supports(&language) {
            let e = RelayError::Validation(format!(
                "Translation provider {requested} does not support {language}"
            ));
            return Err(self.fail(original_id, &language, e));
        }

        self.record(self.status.mark_translating(original_id, &language));
        let started = Instant::now();
        let limit = self.config.handler_timeout();
        let call = AssertUnwindSafe(provider.translate(
            &job.fields,
            &job.source_language,
            &language,
            &self.config.providers,
        ))
        .catch_unwind();

        let result = match tokio::time::timeout(limit, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RelayError::Internal(format!(
                "Translation provider {} panicked",
                provider.id()
            ))),
            Err(_) => Err(RelayError::Provider(format!(
                "Translation timed out after {}s",
                limit.as_secs()
            ))),
        };

        let translated = match result {
            Ok(TranslationResult::Translated(fields)) => fields,
            Ok(TranslationResult::Failed(message)) => {
                return Err(self.fail(original_id, &language, RelayError::Provider(message)))
            }
            Err(e) => return Err(self.fail(original_id, &language, e)),
        };

        info!(
            "服务商 {} 翻译完成: {} 个字符, 耗时 {:?}",
            provider.id(),
            job.fields.char_count(),
            started.elapsed()
        );

        let envelope = CallbackEnvelope::from_job(&job, translated);
        let delivery = self.spawn_delivery(envelope.clone(), endpoint);

        Ok(ReceiveOutcome { envelope, delivery })
    }

    /// 在后台投递回调
    pub fn spawn_delivery(&self, envelope: CallbackEnvelope, endpoint: String) -> JoinHandle<DeliveryReport> {
        let extension = self.clone();
        tokio::spawn(async move { extension.deliver(&envelope, &endpoint).await })
    }

    /// 签名并投递回调，按结果结束本次尝试的状态
    pub async fn deliver(&self, envelope: &CallbackEnvelope, endpoint: &str) -> DeliveryReport {
        let started = Instant::now();
        let outcome = self.send(envelope, endpoint).await;
        let elapsed = started.elapsed();

        let (status, error) = match outcome {
            Ok(code) => {
                metrics::counter!("relay_deliveries_total", "outcome" => "delivered").increment(1);
                info!(
                    "回调投递成功: 原文 {} ({}) → {} [{}], 耗时 {:?}",
                    envelope.original_post_id, envelope.target_language, endpoint, code, elapsed
                );
                self.settle(envelope, TranslationState::Delivered);
                (Some(code), None)
            }
            Err((code, e)) => {
                metrics::counter!("relay_deliveries_total", "outcome" => "failed").increment(1);
                error!(
                    "回调投递失败: 原文 {} ({}) → {}: {}",
                    envelope.original_post_id, envelope.target_language, endpoint, e
                );
                self.settle(
                    envelope,
                    TranslationState::Failed {
                        reason: e.to_string(),
                        item_id: None,
                    },
                );
                (code, Some(e.to_string()))
            }
        };

        DeliveryReport {
            endpoint: endpoint.to_string(),
            original_id: envelope.original_post_id,
            language: envelope.target_language.clone(),
            status,
            error,
            elapsed_ms: duration_ms(elapsed),
        }
    }

    async fn send(
        &self,
        envelope: &CallbackEnvelope,
        endpoint: &str,
    ) -> Result<u16, (Option<u16>, RelayError)> {
        let body = serde_json::to_value(envelope).map_err(|e| (None, RelayError::from(e)))?;
        let signed = self.config.auth.sign(endpoint, body).map_err(|e| (None, e))?;

        let mut request = self.client.post(signed.url).json(&signed.body);
        for (name, value) in &signed.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| (None, RelayError::Delivery(e.to_string())))?;

        let code = response.status();
        if code.is_success() {
            Ok(code.as_u16())
        } else {
            Err((
                Some(code.as_u16()),
                RelayError::Delivery(format!("远端返回 HTTP {code}")),
            ))
        }
    }

    /// 校验入站回调，失败原因只写日志
    pub fn authenticate_inbound(&self, credentials: &InboundCredentials) -> RelayResult<()> {
        self.config.auth.verify(credentials).or_else(helpers::log_error)
    }

    fn settle(&self, envelope: &CallbackEnvelope, state: TranslationState) {
        let original_id = envelope.original_post_id;
        let language = envelope.target_language.as_str();
        let label = state.label();

        match self.status.settle(original_id, language, state) {
            Ok(true) => {}
            Ok(false) => info!(
                "原文 {} ({}) 已有终态记录，不写入投递结果 {}",
                original_id, language, label
            ),
            Err(e) => error!("写入翻译状态失败: {}", e),
        }
    }

    fn fail(&self, original_id: u64, language: &str, error: RelayError) -> RelayError {
        error!("翻译任务失败: 原文 {} ({}): {}", original_id, language, error);
        self.record(self.status.mark_failed(original_id, language, &error.to_string()));
        error
    }

    /// 状态写入失败不影响请求本身
    fn record(&self, result: RelayResult<()>) {
        if let Err(e) = result {
            error!("写入翻译状态失败: {}", e);
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
