//! 请求级鉴权中间件与刷新令牌 Cookie
//!
//! 受保护的路由在进入处理函数之前依次经过 `require_access` / `require_refresh`，
//! 解析出的用户放进请求扩展，处理函数通过 [`CurrentUser`] 提取器读取。

use application::{bearer_token, AuthStrategy, CallContext, RequestCredentials};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use domain::User;

use crate::{
    error::ApiError,
    state::{AppState, CookieSettings},
};

/// 当前请求的已认证用户
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// 已通过刷新策略校验的原始刷新令牌
#[derive(Debug, Clone)]
pub struct PresentedRefreshToken(pub String);

fn request_credentials(headers: &HeaderMap, jar: &CookieJar, cookie_name: &str) -> RequestCredentials {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned);
    let refresh_cookie = jar
        .get(cookie_name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty());

    RequestCredentials {
        bearer,
        refresh_cookie,
    }
}

pub async fn require_access(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = request_credentials(request.headers(), &jar, &state.cookies.name);
    let user = state
        .guard
        .authorize(AuthStrategy::Access, CallContext::Request(&credentials))
        .await?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

pub async fn require_refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = request_credentials(request.headers(), &jar, &state.cookies.name);
    let user = state
        .guard
        .authorize(AuthStrategy::Refresh, CallContext::Request(&credentials))
        .await?;

    if let Some(token) = credentials.refresh_cookie {
        request.extensions_mut().insert(PresentedRefreshToken(token));
    }
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Access token is required for this operation."))
    }
}

impl<S> FromRequestParts<S> for PresentedRefreshToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PresentedRefreshToken>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Refresh token is required for this operation."))
    }
}

fn refresh_cookie(settings: &CookieSettings, value: String) -> Cookie<'static> {
    Cookie::build((settings.name.clone(), value))
        .path(settings.path.clone())
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Strict)
        .build()
}

pub fn set_refresh_cookie(jar: CookieJar, settings: &CookieSettings, token: String) -> CookieJar {
    let mut cookie = refresh_cookie(settings, token);
    cookie.set_max_age(time::Duration::seconds(settings.max_age_secs as i64));
    jar.add(cookie)
}

/// 用同名同路径的过期 Cookie 覆盖客户端保存的刷新令牌
pub fn clear_refresh_cookie(jar: CookieJar, settings: &CookieSettings) -> CookieJar {
    let mut cookie = refresh_cookie(settings, String::new());
    cookie.set_max_age(time::Duration::ZERO);
    jar.add(cookie)
}
