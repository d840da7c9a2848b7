//! 长连接握手认证
//!
//! 每个连接在握手时认证一次，解析出的身份保存在连接上下文中，
//! 后续的订阅请求通过 [`crate::auth::CallContext::Stream`] 复用它。

use std::collections::HashMap;
use std::sync::Arc;

use domain::User;
use uuid::Uuid;

use crate::auth::{AuthStrategy, TokenValidator};
use crate::error::ApplicationError;

/// 单个连接的上下文，连接断开即销毁，不在连接之间共享
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    id: Uuid,
    identity: Option<User>,
}

impl ConnectionContext {
    pub fn anonymous() -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: None,
        }
    }

    pub fn authenticated(user: User) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: Some(user),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> Option<&User> {
        self.identity.as_ref()
    }
}

/// 握手元数据
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    /// 握手参数（查询参数）
    pub params: HashMap<String, String>,
    pub authorization_header: Option<String>,
    /// 原始 `Cookie` 请求头
    pub cookie_header: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Params,
    Header,
    Cookie,
}

impl CredentialSource {
    /// 参数和请求头携带访问令牌，Cookie 携带刷新令牌
    fn strategy(self) -> AuthStrategy {
        match self {
            CredentialSource::Params | CredentialSource::Header => AuthStrategy::Access,
            CredentialSource::Cookie => AuthStrategy::Refresh,
        }
    }
}

pub struct ConnectionAuthenticator {
    validator: Arc<TokenValidator>,
    cookie_name: String,
}

impl ConnectionAuthenticator {
    pub fn new(validator: Arc<TokenValidator>, cookie_name: impl Into<String>) -> Self {
        Self {
            validator,
            cookie_name: cookie_name.into(),
        }
    }

    /// 按优先级选出凭证：握手参数 > Authorization 请求头 > Cookie。
    /// 某个来源缺失或格式错误时继续尝试下一个来源。
    pub fn extract(&self, handshake: &Handshake) -> Option<(CredentialSource, String)> {
        let from_params = handshake
            .params
            .get("Authorization")
            .or_else(|| handshake.params.get("authorization"))
            .and_then(|value| bearer_token(value))
            .map(|token| (CredentialSource::Params, token.to_owned()));

        from_params
            .or_else(|| {
                handshake
                    .authorization_header
                    .as_deref()
                    .and_then(bearer_token)
                    .map(|token| (CredentialSource::Header, token.to_owned()))
            })
            .or_else(|| {
                handshake
                    .cookie_header
                    .as_deref()
                    .and_then(|header| cookie_value(header, &self.cookie_name))
                    .map(|token| (CredentialSource::Cookie, token.to_owned()))
            })
    }

    /// 认证失败时不返回任何上下文，握手直接拒绝
    pub async fn authenticate(
        &self,
        handshake: &Handshake,
    ) -> Result<ConnectionContext, ApplicationError> {
        let (source, token) = self.extract(handshake).ok_or_else(|| {
            tracing::debug!("websocket handshake without credentials");
            ApplicationError::authentication("Authentication token not found.")
        })?;

        let user = self
            .validator
            .validate(source.strategy(), &token)
            .await
            .inspect_err(|err| {
                tracing::info!(?source, error = %err, "websocket handshake rejected");
            })?;

        let user_id = user.id;
        let context = ConnectionContext::authenticated(user);
        tracing::info!(
            connection_id = %context.id(),
            user_id = %user_id,
            ?source,
            "websocket connection authenticated"
        );
        Ok(context)
    }
}

/// 解析 `Bearer <token>`，方案名不区分大小写
pub fn bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

/// 从原始 Cookie 头中取出指定名字的值
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}
