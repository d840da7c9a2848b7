use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::broadcaster::BroadcastError;
use crate::password::PasswordHasherError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 输入校验失败，携带逐字段的错误信息
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Conflict { field: String, message: String },
    #[error("room '{0}' not found")]
    RoomNotFound(String),
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("password error: {0}")]
    Password(#[from] PasswordHasherError),
    #[error("broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    pub fn authentication(message: impl Into<String>) -> Self {
        ApplicationError::Authentication(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApplicationError::NotFound(message.into())
    }

    /// 创建基础设施错误
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }

    pub fn conflict(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = match field.as_str() {
            "email" => "Email already in use.".to_string(),
            "cpf" => "CPF already in use.".to_string(),
            other => format!("{other} already in use."),
        };
        ApplicationError::Conflict { field, message }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict { field } => ApplicationError::conflict(field),
            RepositoryError::NotFound => {
                ApplicationError::not_found("requested resource not found")
            }
            other => ApplicationError::Repository(other),
        }
    }
}

impl From<validator::ValidationErrors> for ApplicationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| match &error.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();
        messages.sort();
        ApplicationError::Validation(messages)
    }
}
