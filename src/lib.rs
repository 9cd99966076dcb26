//! # Translation Relay
//!
//! 一个站点请求翻译内容，译文经可插拔的翻译服务商生成后，
//! 通过带认证的 HTTP 回调投递回（可能是另一个）站点并在那里建成完整的内容条目。
//!
//! ## 模块组织
//!
//! - `providers` - 翻译服务商契约、内置实现与注册表
//! - `validator` - 入站载荷的结构校验
//! - `coordinator` - 把译文建成内容条目的流水线及其管理器
//! - `status` - 每个 (原文, 目标语言) 的翻译状态
//! - `extension` - 接收任务、投递回调与入站认证
//! - `auth` - 共享密钥的签名与校验
//! - `store` - 内容平台存储接口
//! - `config` / `env` - 配置文件与环境变量
//! - `web` - HTTP 服务（可选）

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod env;
pub mod error;
pub mod extension;
pub mod model;
pub mod providers;
pub mod status;
pub mod store;
pub mod validator;
#[cfg(feature = "web")]
pub mod web;

// Re-export commonly used items for convenience
pub use error::{RelayError, RelayResult};
pub use model::{CallbackEnvelope, TranslatableFields, TranslationJob, TranslationResult};
