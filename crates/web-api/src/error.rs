use application::ApplicationError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use config::Environment;
use domain::{DomainError, RepositoryError};
use serde::Serialize;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// 内部错误详情，随响应扩展传递给日志中间件，不进入响应体
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
                errors: None,
                field: None,
            },
            detail: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message)
    }

    pub fn validation(errors: Vec<String>) -> Self {
        let mut error = Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation failed");
        error.body.errors = Some(errors);
        error
    }

    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = Self::new(StatusCode::CONFLICT, "CONFLICT", message);
        error.body.field = Some(field.into());
        error
    }

    /// 对外只暴露通用信息，`detail` 仅用于日志
    pub fn internal_server_error(detail: impl Into<String>) -> Self {
        let mut error = Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            INTERNAL_ERROR_MESSAGE,
        );
        error.detail = Some(detail.into());
        error
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.body.code
    }

    pub fn message(&self) -> &str {
        &self.body.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;

        match error {
            AppErr::Validation(errors) => ApiError::validation(errors),
            AppErr::Domain(err @ DomainError::InvalidArgument { .. }) => {
                ApiError::validation(vec![err.to_string()])
            }
            AppErr::Authentication(message) => ApiError::unauthorized(message),
            AppErr::NotFound(message) => ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            AppErr::RoomNotFound(room_id) => ApiError::new(
                StatusCode::NOT_FOUND,
                "ROOM_NOT_FOUND",
                format!("Room \"{room_id}\" not found."),
            ),
            AppErr::Conflict { field, message } => ApiError::conflict(field, message),
            AppErr::Repository(RepositoryError::NotFound) => ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "requested resource not found",
            ),
            AppErr::Repository(RepositoryError::Conflict { field }) => {
                let message = format!("{field} already in use.");
                ApiError::conflict(field, message)
            }
            err @ (AppErr::Repository(RepositoryError::Storage { .. })
            | AppErr::Password(_)
            | AppErr::Broadcast(_)
            | AppErr::Infrastructure(_)) => ApiError::internal_server_error(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(detail) = self.detail {
            response.extensions_mut().insert(InternalErrorDetail(detail));
        }
        response
    }
}

/// 记录内部错误：非生产环境输出完整详情，生产环境只记录状态码
pub async fn log_internal_errors(
    State(environment): State<Environment>,
    mut response: Response,
) -> Response {
    let detail = response.extensions_mut().remove::<InternalErrorDetail>();
    if let Some(InternalErrorDetail(detail)) = detail {
        if environment.is_production() {
            tracing::error!(status = %response.status(), "request failed with internal error");
        } else {
            tracing::error!(status = %response.status(), detail = %detail, "request failed with internal error");
        }
    }
    response
}
