use async_trait::async_trait;
use domain::{
    Cpf, Message, RefreshTokenHash, RepositoryError, RoomId, Timestamp, User, UserEmail, UserId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// email/cpf 重复时返回 `RepositoryError::Conflict`
    async fn create(&self, user: User) -> Result<User, RepositoryError>;
    async fn update(&self, user: User) -> Result<User, RepositoryError>;
    async fn delete(&self, id: UserId) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<User>, RepositoryError>;
    async fn find_by_cpf(&self, cpf: &Cpf) -> Result<Option<User>, RepositoryError>;
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;

    /// 无条件覆盖当前刷新令牌摘要，`None` 表示吊销
    async fn set_refresh_token_hash(
        &self,
        id: UserId,
        hash: Option<RefreshTokenHash>,
    ) -> Result<(), RepositoryError>;

    /// 仅当存储的摘要仍等于 `expected` 时才替换为 `next`，返回是否替换成功
    async fn swap_refresh_token_hash(
        &self,
        id: UserId,
        expected: &RefreshTokenHash,
        next: RefreshTokenHash,
    ) -> Result<bool, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: Message) -> Result<Message, RepositoryError>;

    /// 返回 `expires_at > now` 的消息，按创建时间升序
    async fn list_active(
        &self,
        room_id: Option<RoomId>,
        now: Timestamp,
    ) -> Result<Vec<Message>, RepositoryError>;

    /// 删除 `expires_at <= now` 的消息，返回删除条数
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, RepositoryError>;
}
