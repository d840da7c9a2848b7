//! WebSocket 入口与帧协议
//!
//! 握手阶段认证一次，失败时在升级之前返回 401；认证通过后由
//! [`crate::ws_connection::WebSocketConnection`] 接管连接。

use std::collections::HashMap;

use application::{Handshake, MessageDto};
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{header, HeaderMap},
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

/// 客户端发来的帧
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    Subscribe {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    Unsubscribe {
        #[serde(rename = "roomId")]
        room_id: String,
    },
}

/// 服务端推送的帧
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    Subscribed {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    Unsubscribed {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    MessageAdded {
        #[serde(rename = "roomId")]
        room_id: String,
        payload: MessageDto,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerFrame {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<ApiError> for ServerFrame {
    fn from(error: ApiError) -> Self {
        if let Some(detail) = error.detail() {
            tracing::error!(detail = %detail, "websocket operation failed with internal error");
        }
        ServerFrame::error(error.code(), error.message())
    }
}

fn handshake(params: HashMap<String, String>, headers: &HeaderMap) -> Handshake {
    let authorization_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let cookies: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    let cookie_header = (!cookies.is_empty()).then(|| cookies.join("; "));

    Handshake {
        params,
        authorization_header,
        cookie_header,
    }
}

pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let context = state
        .connections
        .authenticate(&handshake(params, &headers))
        .await?;

    Ok(ws.on_upgrade(move |socket| WebSocketConnection::new(socket, state, context).run()))
}
