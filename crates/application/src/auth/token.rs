//! 访问令牌与刷新令牌的签发和校验
//!
//! 两类令牌使用不同的密钥和有效期（HS256），载荷结构相同。

use chrono::Duration;
use config::JwtConfig;
use domain::{Timestamp, UserEmail, UserId};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::ttl_duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims 结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    /// 保证同一秒内签发的令牌互不相同
    pub jti: Uuid,
}

impl Claims {
    pub fn user_id(&self) -> UserId {
        UserId::from(self.user_id)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

struct KeySet {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeySet {
    fn new(secret: &str, ttl: std::time::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: ttl_duration(ttl),
        }
    }
}

pub struct TokenCodec {
    access: KeySet,
    refresh: KeySet,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            access: KeySet::new(&config.access_secret, config.access_ttl()),
            refresh: KeySet::new(&config.refresh_secret, config.refresh_ttl()),
            validation,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeySet {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn sign(
        &self,
        kind: TokenKind,
        user_id: UserId,
        email: &UserEmail,
        now: Timestamp,
    ) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let claims = Claims {
            user_id: user_id.into(),
            email: email.as_str().to_owned(),
            iat: now.timestamp(),
            exp: (now + keys.ttl).timestamp(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    /// 校验签名与有效期
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(err.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::jwt_config;
    use chrono::Utc;

    fn email() -> UserEmail {
        UserEmail::parse("alice@x.com").unwrap()
    }

    // ========================================================================
    // Round trip
    // ========================================================================

    #[test]
    fn signed_token_carries_identity() {
        let codec = TokenCodec::new(&jwt_config());
        let user_id = UserId::generate();
        let token = codec
            .sign(TokenKind::Access, user_id, &email(), Utc::now())
            .unwrap();

        let claims = codec.verify(TokenKind::Access, &token).unwrap();
        assert_eq!(claims.user_id(), user_id);
        assert_eq!(claims.email, "alice@x.com");
    }

    #[test]
    fn payload_uses_camel_case_user_id() {
        let claims = Claims {
            user_id: Uuid::nil(),
            email: "alice@x.com".into(),
            iat: 0,
            exp: 1,
            jti: Uuid::nil(),
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("userId").is_some());
    }

    #[test]
    fn tokens_issued_in_same_instant_differ() {
        let codec = TokenCodec::new(&jwt_config());
        let now = Utc::now();
        let user_id = UserId::generate();
        let first = codec.sign(TokenKind::Refresh, user_id, &email(), now).unwrap();
        let second = codec.sign(TokenKind::Refresh, user_id, &email(), now).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn oversized_lifetime_is_clamped_instead_of_wrapping() {
        let mut jwt = jwt_config();
        jwt.refresh_ttl_secs = u64::MAX;
        let codec = TokenCodec::new(&jwt);
        let now = Utc::now();

        let token = codec
            .sign(TokenKind::Refresh, UserId::generate(), &email(), now)
            .unwrap();
        let claims = codec.verify(TokenKind::Refresh, &token).unwrap();
        assert_eq!(claims.exp - claims.iat, config::MAX_TTL_SECS as i64);
    }

    // ========================================================================
    // Rejection
    // ========================================================================

    #[test]
    fn expired_token_is_rejected() {
        let codec = TokenCodec::new(&jwt_config());
        let issued = Utc::now() - Duration::hours(2);
        let token = codec
            .sign(TokenKind::Access, UserId::generate(), &email(), issued)
            .unwrap();

        assert_eq!(
            codec.verify(TokenKind::Access, &token),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn tampered_token_is_rejected() {
        let codec = TokenCodec::new(&jwt_config());
        let mut other_config = jwt_config();
        other_config.access_secret = "another-access-secret".into();
        let forger = TokenCodec::new(&other_config);

        let genuine = codec
            .sign(TokenKind::Access, UserId::generate(), &email(), Utc::now())
            .unwrap();
        let forged = forger
            .sign(TokenKind::Access, UserId::generate(), &email(), Utc::now())
            .unwrap();

        // 伪造者的签名对本服务无效
        assert!(matches!(
            codec.verify(TokenKind::Access, &forged),
            Err(TokenError::Invalid(_))
        ));

        // 替换载荷但保留原签名
        let genuine: Vec<&str> = genuine.split('.').collect();
        let forged: Vec<&str> = forged.split('.').collect();
        let spliced = format!("{}.{}.{}", genuine[0], forged[1], genuine[2]);
        assert!(matches!(
            codec.verify(TokenKind::Access, &spliced),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn kinds_do_not_share_secrets() {
        let codec = TokenCodec::new(&jwt_config());
        let refresh = codec
            .sign(TokenKind::Refresh, UserId::generate(), &email(), Utc::now())
            .unwrap();

        assert!(codec.verify(TokenKind::Refresh, &refresh).is_ok());
        assert!(matches!(
            codec.verify(TokenKind::Access, &refresh),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = TokenCodec::new(&jwt_config());
        assert!(codec.verify(TokenKind::Access, "not-a-token").is_err());
        assert!(codec.verify(TokenKind::Access, "").is_err());
    }
}
