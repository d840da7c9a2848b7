use std::sync::Arc;

use application::repository::{MessageRepository, UserRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Cpf, Message, MessageAuthor, MessageContent, MessageId, PasswordHash, PersonName,
    RefreshTokenHash, RepositoryError, RoomId, Timestamp, User, UserEmail, UserId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, name, email, cpf, password_hash, refresh_token_hash, created_at, updated_at";

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            // 约束名见 migrations/，未知约束按 id 冲突处理
            let field = match db_err.constraint() {
                Some("users_email_key") => "email",
                Some("users_cpf_key") => "cpf",
                _ => "id",
            };
            return RepositoryError::conflict(field);
        }
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(err: impl ToString) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    cpf: String,
    password_hash: String,
    refresh_token_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let refresh_token_hash = value
            .refresh_token_hash
            .map(RefreshTokenHash::new)
            .transpose()
            .map_err(invalid_data)?;

        Ok(User {
            id: UserId::from(value.id),
            name: PersonName::parse(value.name).map_err(invalid_data)?,
            email: UserEmail::parse(value.email).map_err(invalid_data)?,
            cpf: Cpf::parse(value.cpf).map_err(invalid_data)?,
            password: PasswordHash::new(value.password_hash).map_err(invalid_data)?,
            refresh_token_hash,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    room_id: String,
    content: String,
    author_id: Uuid,
    author_name: String,
    author_email: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        Ok(Message {
            id: MessageId::from(value.id),
            room_id: RoomId::parse(value.room_id).map_err(invalid_data)?,
            content: MessageContent::new(value.content).map_err(invalid_data)?,
            author: MessageAuthor {
                id: UserId::from(value.author_id),
                name: PersonName::parse(value.author_name).map_err(invalid_data)?,
                email: UserEmail::parse(value.author_email).map_err(invalid_data)?,
            },
            created_at: value.created_at,
            expires_at: value.expires_at,
        })
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn exists(&self, id: UserId) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(Uuid::from(id))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let query = format!(
            r#"
            INSERT INTO users ({USER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(Uuid::from(user.id))
            .bind(user.name.as_str())
            .bind(user.email.as_str())
            .bind(user.cpf.as_str())
            .bind(user.password.as_str())
            .bind(user.refresh_token_hash.as_ref().map(|hash| hash.as_str()))
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        User::try_from(record)
    }

    async fn update(&self, user: User) -> Result<User, RepositoryError> {
        // 刷新令牌摘要只通过专门的方法修改
        let query = format!(
            r#"
            UPDATE users
            SET name = $2, email = $3, cpf = $4, password_hash = $5, updated_at = $6
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(Uuid::from(user.id))
            .bind(user.name.as_str())
            .bind(user.email.as_str())
            .bind(user.cpf.as_str())
            .bind(user.password.as_str())
            .bind(user.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(RepositoryError::NotFound)?;

        User::try_from(record)
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<User>, RepositoryError> {
        self.find_one("email", email.as_str()).await
    }

    async fn find_by_cpf(&self, cpf: &Cpf) -> Result<Option<User>, RepositoryError> {
        self.find_one("cpf", cpf.as_str()).await
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        sqlx::query_as::<_, UserRecord>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn set_refresh_token_hash(
        &self,
        id: UserId,
        hash: Option<RefreshTokenHash>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET refresh_token_hash = $2 WHERE id = $1")
            .bind(Uuid::from(id))
            .bind(hash.as_ref().map(|hash| hash.as_str()))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn swap_refresh_token_hash(
        &self,
        id: UserId,
        expected: &RefreshTokenHash,
        next: RefreshTokenHash,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $3
            WHERE id = $1 AND refresh_token_hash = $2
            "#,
        )
        .bind(Uuid::from(id))
        .bind(expected.as_str())
        .bind(next.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if !self.exists(id).await? {
            return Err(RepositoryError::NotFound);
        }
        Ok(false)
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(&self, message: Message) -> Result<Message, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, room_id, content, author_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(message.room_id.as_str())
        .bind(message.content.as_str())
        .bind(Uuid::from(message.author.id))
        .bind(message.created_at)
        .bind(message.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(message)
    }

    async fn list_active(
        &self,
        room_id: Option<RoomId>,
        now: Timestamp,
    ) -> Result<Vec<Message>, RepositoryError> {
        sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT m.id, m.room_id, m.content, m.author_id,
                   u.name AS author_name, u.email AS author_email,
                   m.created_at, m.expires_at
            FROM messages m
            JOIN users u ON u.id = m.author_id
            WHERE m.expires_at > $1 AND ($2::TEXT IS NULL OR m.room_id = $2)
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(now)
        .bind(room_id.as_ref().map(|room| room.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .into_iter()
        .map(Message::try_from)
        .collect()
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
