//! 内存存储实现，未配置数据库时使用，也用于测试。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{
    Cpf, Message, RefreshTokenHash, RepositoryError, RoomId, Timestamp, User, UserEmail, UserId,
};
use tokio::sync::RwLock;

use crate::repository::{MessageRepository, UserRepository};

#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 检查 email/cpf 是否已被其他用户占用
fn unique_violation(users: &HashMap<UserId, User>, candidate: &User) -> Option<RepositoryError> {
    let others = users.values().filter(|user| user.id != candidate.id);
    for other in others {
        if other.email == candidate.email {
            return Some(RepositoryError::conflict("email"));
        }
        if other.cpf == candidate.cpf {
            return Some(RepositoryError::conflict("cpf"));
        }
    }
    None
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(RepositoryError::conflict("id"));
        }
        if let Some(err) = unique_violation(&users, &user) {
            return Err(err);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(err) = unique_violation(&users, &user) {
            return Err(err);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| &user.email == email).cloned())
    }

    async fn find_by_cpf(&self, cpf: &Cpf) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| &user.cpf == cpf).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|user| user.created_at);
        Ok(users)
    }

    async fn set_refresh_token_hash(
        &self,
        id: UserId,
        hash: Option<RefreshTokenHash>,
    ) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.refresh_token_hash = hash;
        Ok(())
    }

    async fn swap_refresh_token_hash(
        &self,
        id: UserId,
        expected: &RefreshTokenHash,
        next: RefreshTokenHash,
    ) -> Result<bool, RepositoryError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if user.refresh_token_hash.as_ref() != Some(expected) {
            return Ok(false);
        }
        user.refresh_token_hash = Some(next);
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

impl MemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn insert(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut messages = self.messages.write().await;
        if messages.iter().any(|existing| existing.id == message.id) {
            return Err(RepositoryError::conflict("id"));
        }
        messages.push(message.clone());
        Ok(message)
    }

    async fn list_active(
        &self,
        room_id: Option<RoomId>,
        now: Timestamp,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut active: Vec<Message> = messages
            .iter()
            .filter(|message| !message.is_expired_at(now))
            .filter(|message| room_id.as_ref().map_or(true, |room| &message.room_id == room))
            .cloned()
            .collect();
        active.sort_by_key(|message| message.created_at);
        Ok(active)
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, RepositoryError> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|message| !message.is_expired_at(now));
        Ok((before - messages.len()) as u64)
    }
}
