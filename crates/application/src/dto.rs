use domain::{Message, MessageAuthor, Timestamp, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::TokenPair;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub cpf: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: Uuid::from(user.id),
            name: user.name.as_str().to_owned(),
            email: user.email.as_str().to_owned(),
            cpf: user.cpf.as_str().to_owned(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&MessageAuthor> for AuthorDto {
    fn from(author: &MessageAuthor) -> Self {
        Self {
            id: Uuid::from(author.id),
            name: author.name.as_str().to_owned(),
            email: author.email.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub room_id: String,
    pub content: String,
    pub author: AuthorDto,
    pub timestamp: Timestamp,
    pub expires_at: Timestamp,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: Uuid::from(message.id),
            room_id: message.room_id.as_str().to_owned(),
            content: message.content.as_str().to_owned(),
            author: AuthorDto::from(&message.author),
            timestamp: message.created_at,
            expires_at: message.expires_at,
        }
    }
}

/// 登录/注册/刷新的结果；刷新令牌由传输层放进 Cookie，不出现在响应体中
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserDto,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, message = "name should not be empty"))]
    pub name: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(equal = 11, message = "cpf must contain exactly 11 digits"))]
    pub cpf: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters long"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password should not be empty"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, message = "name should not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(equal = 11, message = "cpf must contain exactly 11 digits"))]
    pub cpf: Option<String>,
    #[validate(length(min = 6, message = "password must be at least 6 characters long"))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageInput {
    #[validate(length(min = 1, message = "roomId should not be empty"))]
    pub room_id: String,
    pub content: String,
}
