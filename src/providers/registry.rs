//! 服务商注册表
//!
//! 启动时由 [`RegistryBuilder`] 收集内置服务商，再依次执行注册钩子（每个只执行一次），
//! 最后 `build()` 冻结为只读的 [`ProviderRegistry`]，通过 `Arc` 共享。
//! 构建器被 `build()` 消耗，之后不可能再注册，读取端无需加锁。

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};

use super::{DeepLxProvider, GoogleProvider, OpenAiProvider, ProviderHandle};
use crate::config::ProviderSettings;
use crate::error::{RelayError, RelayResult};

/// 启动时的注册钩子
pub type RegistrationHook = Box<dyn FnOnce(&mut RegistryBuilder) + Send>;

/// 外部助手标识的默认格式
pub const ASSISTANT_ID_PATTERN: &str = r"^asst_[A-Za-z0-9]{8,}$";

/// 选择钩子的决定
pub enum Selection {
    /// 使用按标识解析到的服务商
    Keep,
    /// 换成另一个服务商
    Substitute(ProviderHandle),
    /// 拒绝本次选择，附带原因
    Veto(String),
}

/// 服务商选择钩子
///
/// `resolved` 是按请求标识查到的服务商，可能不存在。
pub trait SelectionHook: Send + Sync {
    fn select(
        &self,
        requested: &str,
        resolved: Option<&ProviderHandle>,
        registry: &ProviderRegistry,
    ) -> Selection;
}

/// 注册表构建器
#[derive(Default)]
pub struct RegistryBuilder {
    order: Vec<String>,
    providers: HashMap<String, ProviderHandle>,
    init_hooks: Vec<RegistrationHook>,
    selection_hooks: Vec<Box<dyn SelectionHook>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置 google、openai、deeplx
    pub fn with_builtin_providers() -> Self {
        let mut builder = Self::new();
        builder.register(Arc::new(GoogleProvider::new()));
        builder.register(Arc::new(OpenAiProvider::new()));
        builder.register(Arc::new(DeepLxProvider::new()));
        builder
    }

    /// 按标识插入或覆盖，覆盖时保留首次注册的位置
    pub fn register(&mut self, provider: ProviderHandle) -> &mut Self {
        let id = provider.id().to_string();
        if self.providers.insert(id.clone(), provider).is_some() {
            info!("服务商 {} 已被重新注册", id);
        } else {
            debug!("注册服务商 {}", id);
            self.order.push(id);
        }
        self
    }

    /// 添加注册钩子，在 `build()` 时执行
    pub fn on_init<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnOnce(&mut RegistryBuilder) + Send + 'static,
    {
        self.init_hooks.push(Box::new(hook));
        self
    }

    pub fn with_selection_hook<H>(&mut self, hook: H) -> &mut Self
    where
        H: SelectionHook + 'static,
    {
        self.selection_hooks.push(Box::new(hook));
        self
    }

    /// 执行全部注册钩子并冻结
    ///
    /// 钩子中新增的钩子同样会被执行，每个钩子只执行一次。
    pub fn build(mut self) -> ProviderRegistry {
        while !self.init_hooks.is_empty() {
            let hooks = std::mem::take(&mut self.init_hooks);
            for hook in hooks {
                hook(&mut self);
            }
        }

        info!("服务商注册表就绪: {}", self.order.join(", "));

        ProviderRegistry {
            order: self.order,
            providers: self.providers,
            selection_hooks: self.selection_hooks,
        }
    }
}

/// 只读的服务商注册表
pub struct ProviderRegistry {
    order: Vec<String>,
    providers: HashMap<String, ProviderHandle>,
    selection_hooks: Vec<Box<dyn SelectionHook>>,
}

impl ProviderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::with_builtin_providers()
    }

    pub fn resolve(&self, id: &str) -> Option<ProviderHandle> {
        self.providers.get(id).cloned()
    }

    /// 按注册顺序列出
    pub fn list(&self) -> Vec<ProviderHandle> {
        self.order
            .iter()
            .filter_map(|id| self.providers.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 解析请求的服务商，并交给选择钩子替换或否决
    pub fn select(&self, requested: &str) -> RelayResult<ProviderHandle> {
        let mut chosen = self.resolve(requested);

        for hook in &self.selection_hooks {
            match hook.select(requested, chosen.as_ref(), self) {
                Selection::Keep => {}
                Selection::Substitute(provider) => {
                    debug!("服务商 {} 被替换为 {}", requested, provider.id());
                    chosen = Some(provider);
                }
                Selection::Veto(reason) => {
                    warn!("服务商 {} 的选择被否决: {}", requested, reason);
                    return Err(RelayError::Validation(reason));
                }
            }
        }

        chosen.ok_or_else(|| {
            RelayError::Validation(format!("Unknown translation provider {requested}"))
        })
    }

    /// 每个服务商的标识、名称与配置状态
    pub fn describe(&self, settings: &ProviderSettings) -> Vec<(String, String, bool)> {
        self.list()
            .into_iter()
            .map(|p| {
                (
                    p.id().to_string(),
                    p.name().to_string(),
                    p.is_configured(settings),
                )
            })
            .collect()
    }
}

/// 把外部助手标识（如 `asst_...`）路由到指定服务商
pub struct AssistantRoutingHook {
    pattern: Regex,
    target: String,
}

impl AssistantRoutingHook {
    pub fn new(target: impl Into<String>) -> RelayResult<Self> {
        Self::with_pattern(ASSISTANT_ID_PATTERN, target)
    }

    pub fn with_pattern(pattern: &str, target: impl Into<String>) -> RelayResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| RelayError::Config(format!("助手标识格式无效: {e}")))?;
        Ok(Self {
            pattern,
            target: target.into(),
        })
    }
}

impl SelectionHook for AssistantRoutingHook {
    fn select(
        &self,
        requested: &str,
        _resolved: Option<&ProviderHandle>,
        registry: &ProviderRegistry,
    ) -> Selection {
        if !self.pattern.is_match(requested) {
            return Selection::Keep;
        }
        match registry.resolve(&self.target) {
            Some(provider) => Selection::Substitute(provider),
            None => Selection::Veto(format!(
                "Assistant {requested} requires provider {} which is not registered",
                self.target
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayResult;
    use crate::model::{TranslatableFields, TranslationResult};
    use crate::providers::TranslationProvider;
    use async_trait::async_trait;

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl TranslationProvider for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn name(&self) -> &str {
            self.1
        }

        fn is_configured(&self, _settings: &ProviderSettings) -> bool {
            true
        }

        async fn translate(
            &self,
            fields: &TranslatableFields,
            _source_language: &str,
            _target_language: &str,
            _settings: &ProviderSettings,
        ) -> RelayResult<TranslationResult> {
            Ok(TranslationResult::Translated(fields.clone()))
        }
    }

    struct VetoAll;

    impl SelectionHook for VetoAll {
        fn select(&self, _: &str, _: Option<&ProviderHandle>, _: &ProviderRegistry) -> Selection {
            Selection::Veto("disabled".to_string())
        }
    }

    #[test]
    fn test_builtins_in_order() {
        let registry = ProviderRegistry::builder().build();
        let ids: Vec<_> = registry.list().iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["google", "openai", "deeplx"]);
    }

    #[test]
    fn test_last_registration_wins_and_keeps_position() {
        let mut builder = RegistryBuilder::with_builtin_providers();
        builder.register(Arc::new(Named("google", "Stub")));
        builder.register(Arc::new(Named("acme", "Acme")));
        let registry = builder.build();

        let names: Vec<_> = registry.list().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["Stub", "OpenAI", "DeepLX", "Acme"]);
        assert_eq!(registry.resolve("google").unwrap().name(), "Stub");
    }

    #[test]
    fn test_init_hooks_run_once_including_nested() {
        let mut builder = RegistryBuilder::new();
        builder.on_init(|b| {
            b.register(Arc::new(Named("first", "First")));
            b.on_init(|b| {
                b.register(Arc::new(Named("nested", "Nested")));
            });
        });
        let registry = builder.build();

        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("nested").is_some());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let registry = ProviderRegistry::builder().build();
        let err = registry.select("nope").err().unwrap();
        assert_eq!(err.to_string(), "Unknown translation provider nope");
    }

    #[test]
    fn test_assistant_ids_are_routed() {
        let mut builder = RegistryBuilder::with_builtin_providers();
        builder.with_selection_hook(AssistantRoutingHook::new("openai").unwrap());
        let registry = builder.build();

        assert_eq!(registry.select("asst_abc12345XYZ").unwrap().id(), "openai");
        assert_eq!(registry.select("google").unwrap().id(), "google");
        assert!(registry.select("asst_x").is_err());
    }

    #[test]
    fn test_veto_blocks_known_provider() {
        let mut builder = RegistryBuilder::with_builtin_providers();
        builder.with_selection_hook(VetoAll);
        let registry = builder.build();

        let err = registry.select("google").err().unwrap();
        assert_eq!(err.to_string(), "disabled");
    }
}
