use std::sync::Arc;

use domain::{RefreshTokenHash, UserEmail, UserId};
use serde::Serialize;

use crate::auth::token::{TokenCodec, TokenKind};
use crate::clock::Clock;
use crate::error::ApplicationError;
use crate::password::TokenHasher;
use crate::repository::UserRepository;

pub(crate) const REVOKED_REFRESH_TOKEN: &str =
    "Invalid or revoked refresh token. Please log in again.";

/// 一次签发得到的令牌对，不落库
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// 令牌签发器
///
/// 每个用户只保留最新刷新令牌的摘要，新签发总会覆盖旧摘要，
/// 从而使之前签发的刷新令牌失效（单会话策略）。
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn TokenHasher>,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(
        codec: Arc<TokenCodec>,
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn TokenHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec,
            users,
            hasher,
            clock,
        }
    }

    fn mint(&self, user_id: UserId, email: &UserEmail) -> Result<TokenPair, ApplicationError> {
        let now = self.clock.now();
        let sign = |kind| {
            self.codec
                .sign(kind, user_id, email, now)
                .map_err(|err| ApplicationError::infrastructure(err.to_string()))
        };

        Ok(TokenPair {
            access_token: sign(TokenKind::Access)?,
            refresh_token: sign(TokenKind::Refresh)?,
        })
    }

    /// 签发新令牌对并无条件覆盖存储的刷新摘要
    pub async fn issue(
        &self,
        user_id: UserId,
        email: &UserEmail,
    ) -> Result<TokenPair, ApplicationError> {
        let pair = self.mint(user_id, email)?;
        let hash = self.hasher.digest(&pair.refresh_token);
        self.users.set_refresh_token_hash(user_id, Some(hash)).await?;

        tracing::debug!(user_id = %user_id, "issued token pair");
        Ok(pair)
    }

    /// 轮换刷新令牌：只有存储摘要仍是 `presented` 时才写入新摘要。
    ///
    /// 同一刷新令牌的并发轮换只有一个会成功，其余调用返回认证错误且不签发任何令牌。
    pub async fn rotate(
        &self,
        user_id: UserId,
        email: &UserEmail,
        presented: &RefreshTokenHash,
    ) -> Result<TokenPair, ApplicationError> {
        let pair = self.mint(user_id, email)?;
        let next = self.hasher.digest(&pair.refresh_token);

        if !self
            .users
            .swap_refresh_token_hash(user_id, presented, next)
            .await?
        {
            tracing::warn!(user_id = %user_id, "refresh token rotated concurrently");
            return Err(ApplicationError::authentication(REVOKED_REFRESH_TOKEN));
        }

        tracing::debug!(user_id = %user_id, "rotated token pair");
        Ok(pair)
    }

    /// 吊销当前会话
    pub async fn revoke(&self, user_id: UserId) -> Result<(), ApplicationError> {
        self.users.set_refresh_token_hash(user_id, None).await?;
        tracing::debug!(user_id = %user_id, "revoked refresh token");
        Ok(())
    }
}
