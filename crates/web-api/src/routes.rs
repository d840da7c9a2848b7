use application::{
    CreateMessageInput, LoginInput, MessageDto, RegisterInput, UpdateUserInput, UserDto,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use domain::UserId;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    auth::{
        clear_refresh_cookie, require_access, require_refresh, set_refresh_cookie, CurrentUser,
        PresentedRefreshToken,
    },
    error::{log_internal_errors, ApiError},
    state::AppState,
    websocket::websocket_upgrade,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    access_token: String,
    user: UserDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagesQuery {
    room_id: Option<String>,
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes(state.clone()))
        .layer(middleware::map_response_with_state(
            state.environment,
            log_internal_errors,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
        .allow_credentials(true)
}

fn api_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/ws", get(websocket_upgrade));

    let refresh = Router::new()
        .route("/auth/refresh", post(refresh_tokens))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_refresh,
        ));

    let protected = Router::new()
        .route("/auth/logout", post(logout))
        .route("/rooms", get(available_rooms))
        .route("/messages", get(list_messages).post(create_message))
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(current_profile))
        .route("/users/by-email/{email}", get(user_by_email))
        .route("/users/by-cpf/{cpf}", get(user_by_cpf))
        .route(
            "/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route_layer(middleware::from_fn_with_state(state, require_access));

    public.merge(refresh).merge(protected)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterInput>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    let session = state.auth_service.register(payload).await?;
    let jar = set_refresh_cookie(jar, &state.cookies, session.tokens.refresh_token);

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            access_token: session.tokens.access_token,
            user: session.user,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginInput>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let session = state.auth_service.login(payload).await?;
    let jar = set_refresh_cookie(jar, &state.cookies, session.tokens.refresh_token);

    Ok((
        jar,
        Json(AuthResponse {
            access_token: session.tokens.access_token,
            user: session.user,
        }),
    ))
}

async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<bool>), ApiError> {
    let revoked = state.auth_service.logout(&user).await?;
    Ok((clear_refresh_cookie(jar, &state.cookies), Json(revoked)))
}

async fn refresh_tokens(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    PresentedRefreshToken(token): PresentedRefreshToken,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RefreshResponse>), ApiError> {
    let tokens = state.auth_service.refresh(&user, &token).await?;
    let jar = set_refresh_cookie(jar, &state.cookies, tokens.refresh_token);

    Ok((
        jar,
        Json(RefreshResponse {
            access_token: tokens.access_token,
        }),
    ))
}

async fn available_rooms(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.chat_service.available_rooms())
}

async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let messages = state
        .chat_service
        .messages(query.room_id.as_deref())
        .await?;
    Ok(Json(messages))
}

async fn create_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateMessageInput>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let message = state.chat_service.create_message(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserDto>>, ApiError> {
    Ok(Json(state.user_service.list().await?))
}

async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    let user = state.user_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(UserDto::from(&user))))
}

async fn current_profile(CurrentUser(user): CurrentUser) -> Json<UserDto> {
    Json(UserDto::from(&user))
}

async fn user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Option<UserDto>>, ApiError> {
    Ok(Json(state.user_service.find_by_email(&email).await?))
}

async fn user_by_cpf(
    State(state): State<AppState>,
    Path(cpf): Path<String>,
) -> Result<Json<Option<UserDto>>, ApiError> {
    Ok(Json(state.user_service.find_by_cpf(&cpf).await?))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDto>, ApiError> {
    Ok(Json(state.user_service.get(UserId::from(id)).await?))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserInput>,
) -> Result<Json<UserDto>, ApiError> {
    Ok(Json(state.user_service.update(UserId::from(id), payload).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete(UserId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
