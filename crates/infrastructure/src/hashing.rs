use application::{PasswordHasher, PasswordHasherError, TokenHasher};
use async_trait::async_trait;
use bcrypt::DEFAULT_COST;
use domain::{PasswordHash, RefreshTokenHash};
use sha2::{Digest, Sha256};

/// bcrypt 密码哈希，计算放在阻塞线程池中执行
#[derive(Debug, Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: Option<u32>) -> Self {
        Self {
            cost: cost.unwrap_or(DEFAULT_COST),
        }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(None)
    }
}

async fn blocking<T, F>(task: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| err.to_string())?
        .map_err(|err| err.to_string())
}

#[async_trait]
impl PasswordHasher for BcryptPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        let hashed = blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(PasswordHasherError::hash_error)?;

        PasswordHash::new(hashed).map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        let plaintext = plaintext.to_owned();
        let hashed = hashed.as_str().to_owned();
        blocking(move || bcrypt::verify(plaintext, &hashed))
            .await
            .map_err(PasswordHasherError::verify_error)
    }
}

/// 刷新令牌摘要：SHA-256 十六进制串。
///
/// JWT 通常超过 bcrypt 的 72 字节输入上限，截断后同一用户的不同令牌会得到相同的比较结果。
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256TokenHasher;

impl TokenHasher for Sha256TokenHasher {
    fn digest(&self, token: &str) -> RefreshTokenHash {
        let digest = hex::encode(Sha256::digest(token.as_bytes()));
        // 64 个十六进制字符，不可能为空
        RefreshTokenHash::new(digest).unwrap_or_else(|_| unreachable!("sha256 digest is never empty"))
    }
}
