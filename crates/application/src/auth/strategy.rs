use std::sync::Arc;

use domain::User;

use crate::auth::issuer::REVOKED_REFRESH_TOKEN;
use crate::auth::token::{Claims, TokenCodec, TokenError, TokenKind};
use crate::error::ApplicationError;
use crate::password::TokenHasher;
use crate::repository::UserRepository;

/// 认证策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// 访问令牌：校验签名、有效期，并重新加载用户
    Access,
    /// 刷新令牌：在访问令牌的基础上比对存储的摘要
    Refresh,
}

impl AuthStrategy {
    fn token_kind(self) -> TokenKind {
        match self {
            AuthStrategy::Access => TokenKind::Access,
            AuthStrategy::Refresh => TokenKind::Refresh,
        }
    }
}

/// 令牌校验器，请求和长连接共用
pub struct TokenValidator {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn TokenHasher>,
}

impl TokenValidator {
    pub fn new(
        codec: Arc<TokenCodec>,
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn TokenHasher>,
    ) -> Self {
        Self {
            codec,
            users,
            hasher,
        }
    }

    pub async fn validate(
        &self,
        strategy: AuthStrategy,
        token: &str,
    ) -> Result<User, ApplicationError> {
        let claims = self.verify(strategy, token)?;
        match strategy {
            AuthStrategy::Access => self.resolve(&claims).await,
            AuthStrategy::Refresh => self.validate_refresh(&claims, token).await,
        }
    }

    fn verify(&self, strategy: AuthStrategy, token: &str) -> Result<Claims, ApplicationError> {
        self.codec
            .verify(strategy.token_kind(), token)
            .map_err(|err| {
                tracing::debug!(?strategy, error = %err, "token rejected");
                match (strategy, err) {
                    (AuthStrategy::Access, TokenError::Expired) => {
                        ApplicationError::authentication("Access token has expired.")
                    }
                    (AuthStrategy::Access, _) => {
                        ApplicationError::authentication("Invalid access token.")
                    }
                    (AuthStrategy::Refresh, _) => {
                        ApplicationError::authentication(REVOKED_REFRESH_TOKEN)
                    }
                }
            })
    }

    /// 令牌结构有效也要重新查库，已删除的用户一律拒绝
    async fn resolve(&self, claims: &Claims) -> Result<User, ApplicationError> {
        self.users
            .find_by_id(claims.user_id())
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %claims.user_id, "token references unknown user");
                ApplicationError::authentication("User not found or token invalid.")
            })
    }

    async fn validate_refresh(
        &self,
        claims: &Claims,
        token: &str,
    ) -> Result<User, ApplicationError> {
        let user = self
            .users
            .find_by_id(claims.user_id())
            .await?
            .ok_or_else(|| ApplicationError::authentication(REVOKED_REFRESH_TOKEN))?;

        let presented = self.hasher.digest(token);
        if user.refresh_token_hash.as_ref() == Some(&presented) {
            return Ok(user);
        }

        // 摘要不匹配或已被清除：主动吊销当前会话
        tracing::warn!(user_id = %user.id, "refresh token mismatch, revoking session");
        self.users.set_refresh_token_hash(user.id, None).await?;
        Err(ApplicationError::authentication(REVOKED_REFRESH_TOKEN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use chrono::{Duration, Utc};
    use domain::UserId;

    fn is_auth_error(result: Result<User, ApplicationError>) -> bool {
        matches!(result, Err(ApplicationError::Authentication(_)))
    }

    #[tokio::test]
    async fn access_token_resolves_user() {
        let harness = Harness::new();
        let alice = harness.alice().await;
        let pair = harness.issuer.issue(alice.id, &alice.email).await.unwrap();

        let user = harness
            .validator
            .validate(AuthStrategy::Access, &pair.access_token)
            .await
            .unwrap();
        assert_eq!(user.id, alice.id);
    }

    #[tokio::test]
    async fn access_token_of_deleted_user_is_rejected() {
        let harness = Harness::new();
        let alice = harness.alice().await;
        let pair = harness.issuer.issue(alice.id, &alice.email).await.unwrap();
        harness.users.delete(alice.id).await.unwrap();

        assert!(is_auth_error(
            harness
                .validator
                .validate(AuthStrategy::Access, &pair.access_token)
                .await
        ));
    }

    #[tokio::test]
    async fn expired_access_token_is_rejected() {
        let harness = Harness::new();
        let alice = harness.alice().await;
        let token = harness
            .codec
            .sign(
                TokenKind::Access,
                alice.id,
                &alice.email,
                Utc::now() - Duration::days(1),
            )
            .unwrap();

        let err = harness
            .validator
            .validate(AuthStrategy::Access, &token)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Access token has expired.");
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let harness = Harness::new();
        let alice = harness.alice().await;
        let pair = harness.issuer.issue(alice.id, &alice.email).await.unwrap();

        assert!(is_auth_error(
            harness
                .validator
                .validate(AuthStrategy::Access, &pair.refresh_token)
                .await
        ));
        assert!(is_auth_error(
            harness
                .validator
                .validate(AuthStrategy::Refresh, &pair.access_token)
                .await
        ));
    }

    #[tokio::test]
    async fn current_refresh_token_is_accepted() {
        let harness = Harness::new();
        let alice = harness.alice().await;
        let pair = harness.issuer.issue(alice.id, &alice.email).await.unwrap();

        let user = harness
            .validator
            .validate(AuthStrategy::Refresh, &pair.refresh_token)
            .await
            .unwrap();
        assert_eq!(user.id, alice.id);
    }

    #[tokio::test]
    async fn superseded_refresh_token_revokes_session() {
        let harness = Harness::new();
        let alice = harness.alice().await;
        let stale = harness.issuer.issue(alice.id, &alice.email).await.unwrap();
        let current = harness.issuer.issue(alice.id, &alice.email).await.unwrap();

        let err = harness
            .validator
            .validate(AuthStrategy::Refresh, &stale.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), REVOKED_REFRESH_TOKEN);

        // 旧令牌的重用导致当前会话也被吊销
        assert!(!harness.stored(alice.id).await.has_active_session());
        assert!(is_auth_error(
            harness
                .validator
                .validate(AuthStrategy::Refresh, &current.refresh_token)
                .await
        ));
    }

    #[tokio::test]
    async fn refresh_for_unknown_user_is_rejected() {
        let harness = Harness::new();
        let email = domain::UserEmail::parse("ghost@x.com").unwrap();
        let token = harness
            .codec
            .sign(TokenKind::Refresh, UserId::generate(), &email, Utc::now())
            .unwrap();

        assert!(is_auth_error(
            harness.validator.validate(AuthStrategy::Refresh, &token).await
        ));
    }
}
