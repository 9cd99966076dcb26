//! 回调认证
//!
//! 发送端与接收端共享同一份 [`AuthConfig`]：发送时把密钥放到约定位置，
//! 接收时从同一位置取出并比对。位置由 [`AuthMethod`] 决定，双方方式不一致时
//! 接收端在约定位置找不到密钥，请求被拒绝。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RelayError, RelayResult};

/// 默认的查询参数名
pub const DEFAULT_QUERY_PARAM: &str = "token";
/// 默认的自定义请求头
pub const DEFAULT_CUSTOM_HEADER: &str = "X-Relay-Token";
/// 默认的请求体字段
pub const DEFAULT_BODY_FIELD: &str = "auth_token";

/// 密钥的传递方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// 不携带密钥
    #[default]
    None,
    /// 追加到 URL 查询参数
    QueryParam,
    /// `Authorization: Bearer <secret>`
    Bearer,
    /// 自定义请求头
    CustomHeader,
    /// 注入 JSON 请求体字段
    BodyField,
}

impl AuthMethod {
    pub const ALL: [AuthMethod; 5] = [
        AuthMethod::None,
        AuthMethod::QueryParam,
        AuthMethod::Bearer,
        AuthMethod::CustomHeader,
        AuthMethod::BodyField,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::QueryParam => "query_param",
            AuthMethod::Bearer => "bearer",
            AuthMethod::CustomHeader => "custom_header",
            AuthMethod::BodyField => "body_field",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "none" | "" => Ok(AuthMethod::None),
            "query_param" | "query" => Ok(AuthMethod::QueryParam),
            "bearer" | "bearer_header" => Ok(AuthMethod::Bearer),
            "custom_header" | "header" => Ok(AuthMethod::CustomHeader),
            "body_field" | "body" => Ok(AuthMethod::BodyField),
            other => Err(format!(
                "Invalid auth method '{}'. Use: none, query_param, bearer, custom_header, body_field",
                other
            )),
        }
    }
}

/// 回调认证配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// 共享密钥，为空即开放模式
    pub secret: Option<String>,
    pub method: AuthMethod,
    /// 查询参数 / 请求头 / 请求体字段名，缺省时按方式取默认值
    pub field_name: Option<String>,
}

/// 已附加认证信息的出站请求
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

/// 入站请求中可能携带密钥的位置
#[derive(Debug, Clone, Default)]
pub struct InboundCredentials {
    pub query: HashMap<String, String>,
    /// 键统一为小写
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
}

impl InboundCredentials {
    pub fn new(
        query: HashMap<String, String>,
        headers: impl IntoIterator<Item = (String, String)>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            query,
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.to_lowercase(), value))
                .collect(),
            body,
        }
    }
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>, method: AuthMethod) -> Self {
        Self {
            secret: Some(secret.into()),
            method,
            field_name: None,
        }
    }

    /// 未配置密钥或方式为 none 时不做认证
    pub fn is_open(&self) -> bool {
        self.method == AuthMethod::None || self.secret().is_none()
    }

    fn secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }

    /// 当前方式下实际使用的字段名
    pub fn field_name(&self) -> &str {
        if let Some(name) = self.field_name.as_deref().filter(|n| !n.is_empty()) {
            return name;
        }
        match self.method {
            AuthMethod::QueryParam => DEFAULT_QUERY_PARAM,
            AuthMethod::CustomHeader => DEFAULT_CUSTOM_HEADER,
            AuthMethod::BodyField => DEFAULT_BODY_FIELD,
            AuthMethod::Bearer => "Authorization",
            AuthMethod::None => "",
        }
    }

    /// 为出站回调附加认证信息，恰好使用一种方式
    pub fn sign(&self, endpoint: &str, body: serde_json::Value) -> RelayResult<SignedRequest> {
        let mut url = Url::parse(endpoint)
            .map_err(|e| RelayError::Delivery(format!("回调地址无效 {endpoint}: {e}")))?;
        let mut headers = Vec::new();
        let mut body = body;

        let secret = match self.secret() {
            Some(secret) => secret,
            None => return Ok(SignedRequest { url, headers, body }),
        };

        match self.method {
            AuthMethod::None => {}
            AuthMethod::QueryParam => {
                url.query_pairs_mut().append_pair(self.field_name(), secret);
            }
            AuthMethod::Bearer => {
                headers.push(("Authorization".to_string(), format!("Bearer {secret}")));
            }
            AuthMethod::CustomHeader => {
                headers.push((self.field_name().to_string(), secret.to_string()));
            }
            AuthMethod::BodyField => match body.as_object_mut() {
                Some(map) => {
                    map.insert(
                        self.field_name().to_string(),
                        serde_json::Value::String(secret.to_string()),
                    );
                }
                None => {
                    return Err(RelayError::Internal(
                        "body_field 认证要求请求体为 JSON 对象".to_string(),
                    ))
                }
            },
        }

        Ok(SignedRequest { url, headers, body })
    }

    /// 校验入站回调，失败原因只记录在错误内部，不对外回显
    pub fn verify(&self, inbound: &InboundCredentials) -> RelayResult<()> {
        let expected = match self.secret() {
            Some(secret) if self.method != AuthMethod::None => secret,
            _ => return Ok(()),
        };

        let presented = self.extract(inbound).ok_or_else(|| {
            RelayError::Authentication(format!(
                "未在 {} ({}) 中找到密钥",
                self.method,
                self.field_name()
            ))
        })?;

        if secrets_match(expected, &presented) {
            Ok(())
        } else {
            Err(RelayError::Authentication(format!(
                "{} 中的密钥不匹配",
                self.method
            )))
        }
    }

    fn extract(&self, inbound: &InboundCredentials) -> Option<String> {
        match self.method {
            AuthMethod::None => None,
            AuthMethod::QueryParam => inbound.query.get(self.field_name()).cloned(),
            AuthMethod::Bearer => inbound.headers.get("authorization").and_then(|value| {
                let (scheme, token) = value.trim().split_once(' ')?;
                scheme
                    .eq_ignore_ascii_case("bearer")
                    .then(|| token.trim().to_string())
            }),
            AuthMethod::CustomHeader => inbound
                .headers
                .get(&self.field_name().to_lowercase())
                .cloned(),
            AuthMethod::BodyField => inbound
                .body
                .get(self.field_name())
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

/// 比较摘要，耗时与密钥内容无关
fn secrets_match(expected: &str, presented: &str) -> bool {
    blake3::hash(expected.as_bytes()) == blake3::hash(presented.as_bytes())
}
