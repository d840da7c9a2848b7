use std::sync::Arc;

use domain::User;

use crate::auth::strategy::{AuthStrategy, TokenValidator};
use crate::connection::ConnectionContext;
use crate::error::ApplicationError;

const MISSING_REFRESH_TOKEN: &str = "Refresh token is required for this operation.";
const MISSING_ACCESS_TOKEN: &str = "Access token is required for this operation.";
const UNAUTHENTICATED_CONNECTION: &str = "Connection is not authenticated.";

/// 单次请求携带的凭证
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    /// `Authorization: Bearer <token>` 中的令牌
    pub bearer: Option<String>,
    /// 刷新令牌 Cookie
    pub refresh_cookie: Option<String>,
}

/// 调用上下文：单次请求或已建立的长连接
#[derive(Debug, Clone, Copy)]
pub enum CallContext<'a> {
    Request(&'a RequestCredentials),
    Stream(&'a ConnectionContext),
}

/// 统一的鉴权入口
///
/// 请求上下文按策略取出对应凭证交给校验器；长连接上下文直接复用握手时解析出的身份。
pub struct AuthGuard {
    validator: Arc<TokenValidator>,
}

impl AuthGuard {
    pub fn new(validator: Arc<TokenValidator>) -> Self {
        Self { validator }
    }

    pub async fn authorize(
        &self,
        strategy: AuthStrategy,
        context: CallContext<'_>,
    ) -> Result<User, ApplicationError> {
        match context {
            CallContext::Stream(connection) => connection
                .identity()
                .cloned()
                .ok_or_else(|| ApplicationError::authentication(UNAUTHENTICATED_CONNECTION)),
            CallContext::Request(credentials) => {
                let token = match strategy {
                    AuthStrategy::Access => credentials
                        .bearer
                        .as_deref()
                        .ok_or_else(|| ApplicationError::authentication(MISSING_ACCESS_TOKEN))?,
                    AuthStrategy::Refresh => credentials
                        .refresh_cookie
                        .as_deref()
                        .ok_or_else(|| ApplicationError::authentication(MISSING_REFRESH_TOKEN))?,
                };
                self.validator.validate(strategy, token).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::UserRepository;
    use crate::test_support::Harness;

    #[tokio::test]
    async fn request_context_validates_bearer() {
        let harness = Harness::new();
        let alice = harness.alice().await;
        let pair = harness.issuer.issue(alice.id, &alice.email).await.unwrap();

        let credentials = RequestCredentials {
            bearer: Some(pair.access_token),
            refresh_cookie: None,
        };
        let user = harness
            .guard
            .authorize(AuthStrategy::Access, CallContext::Request(&credentials))
            .await
            .unwrap();
        assert_eq!(user.id, alice.id);
    }

    #[tokio::test]
    async fn missing_credentials_are_reported() {
        let harness = Harness::new();
        let credentials = RequestCredentials::default();

        let err = harness
            .guard
            .authorize(AuthStrategy::Refresh, CallContext::Request(&credentials))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), MISSING_REFRESH_TOKEN);

        let err = harness
            .guard
            .authorize(AuthStrategy::Access, CallContext::Request(&credentials))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), MISSING_ACCESS_TOKEN);
    }

    #[tokio::test]
    async fn stream_context_reuses_resolved_identity() {
        let harness = Harness::new();
        let alice = harness.alice().await;
        let connection = ConnectionContext::authenticated(alice.clone());

        // 用户已被删除，但连接上下文中的身份在连接期间仍然有效
        harness.users.delete(alice.id).await.unwrap();
        let user = harness
            .guard
            .authorize(AuthStrategy::Access, CallContext::Stream(&connection))
            .await
            .unwrap();
        assert_eq!(user.id, alice.id);
    }

    #[tokio::test]
    async fn anonymous_stream_is_rejected() {
        let harness = Harness::new();
        let connection = ConnectionContext::anonymous();

        assert!(matches!(
            harness
                .guard
                .authorize(AuthStrategy::Access, CallContext::Stream(&connection))
                .await,
            Err(ApplicationError::Authentication(_))
        ));
    }
}
