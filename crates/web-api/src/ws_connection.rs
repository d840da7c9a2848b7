use std::collections::HashMap;

use application::{
    ApplicationError, AuthStrategy, CallContext, ConnectionContext, MessageDto, MessageStream,
};
use axum::{
    body::Bytes,
    extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocket},
};
use futures_util::{
    stream::{SplitStream, StreamExt},
    SinkExt,
};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    error::ApiError,
    state::AppState,
    websocket::{ClientFrame, ServerFrame},
};

/// 写命令通道容量；转发任务在通道满时等待，积压最终体现为总线上的滞后
const COMMAND_BUFFER: usize = 64;

/// WebSocket 写操作命令
///
/// 使用命令模式统一管理所有对 WebSocket sender 的写操作
#[derive(Debug)]
enum WsCommand {
    SendText(String),
    SendPong(Bytes),
    Close(&'static str),
}

/// 单个 WebSocket 连接
///
/// 一个连接可以同时订阅多个房间，每个订阅对应一个转发任务；
/// 取消订阅或连接断开时终止转发任务，订阅随之从总线注销。
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    context: ConnectionContext,
}

struct Session {
    state: AppState,
    context: ConnectionContext,
    cmd_tx: mpsc::Sender<WsCommand>,
    subscriptions: HashMap<String, JoinHandle<()>>,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, context: ConnectionContext) -> Self {
        Self {
            socket,
            state,
            context,
        }
    }

    pub async fn run(self) {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(COMMAND_BUFFER);
        let mut session = Session {
            state: self.state,
            context: self.context,
            cmd_tx,
            subscriptions: HashMap::new(),
        };
        let socket = self.socket;

        let connection_id = session.context.id();
        let user_id = session.context.identity().map(|user| user.id);
        tracing::info!(%connection_id, ?user_id, "websocket connection established");

        let (mut sender, mut incoming) = socket.split();

        // 发送任务：统一处理所有对 WebSocket sender 的写操作
        let mut send_task = tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                let message = match cmd {
                    WsCommand::SendText(text) => WsMessage::Text(text.into()),
                    WsCommand::SendPong(data) => WsMessage::Pong(data),
                    WsCommand::Close(reason) => {
                        let frame = CloseFrame {
                            code: close_code::POLICY,
                            reason: reason.into(),
                        };
                        if sender.send(WsMessage::Close(Some(frame))).await.is_err() {
                            tracing::debug!("failed to send close frame");
                        }
                        break;
                    }
                };
                if sender.send(message).await.is_err() {
                    tracing::warn!("failed to write websocket frame");
                    break;
                }
            }
        });

        // 任意一侧结束即视为连接断开
        tokio::select! {
            _ = &mut send_task => {
                tracing::debug!(%connection_id, "websocket send task finished");
            }
            _ = session.read_loop(&mut incoming) => {
                tracing::debug!(%connection_id, "websocket receive loop finished");
            }
        }

        session.close();
        send_task.abort();
        tracing::info!(%connection_id, ?user_id, "websocket connection closed");
    }
}

impl Session {
    async fn read_loop(&mut self, incoming: &mut SplitStream<WebSocket>) {
        while let Some(message) = incoming.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!(error = %err, "websocket read failed");
                    break;
                }
            };
            if self.handle_incoming(message).await.is_err() {
                break;
            }
        }
    }

    /// 处理来自客户端的消息，返回 `Err` 表示应当断开连接
    async fn handle_incoming(&mut self, message: WsMessage) -> Result<(), ()> {
        match message {
            WsMessage::Close(_) => Err(()),
            WsMessage::Ping(data) => self
                .cmd_tx
                .send(WsCommand::SendPong(data))
                .await
                .map_err(|_| ()),
            WsMessage::Pong(_) => Ok(()),
            WsMessage::Binary(_) => {
                self.send(ServerFrame::error("BAD_REQUEST", "binary frames are not supported"))
                    .await
            }
            WsMessage::Text(text) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(ClientFrame::Subscribe { room_id }) => self.subscribe(room_id).await,
                Ok(ClientFrame::Unsubscribe { room_id }) => self.unsubscribe(room_id).await,
                Err(err) => {
                    self.send(ServerFrame::error("BAD_REQUEST", format!("invalid frame: {err}")))
                        .await
                }
            },
        }
    }

    async fn open_stream(&self, room_id: &str) -> Result<MessageStream, ApplicationError> {
        self.state
            .guard
            .authorize(AuthStrategy::Access, CallContext::Stream(&self.context))
            .await?;
        self.state.chat_service.message_added(room_id)
    }

    async fn subscribe(&mut self, room_id: String) -> Result<(), ()> {
        if !self.subscriptions.contains_key(&room_id) {
            match self.open_stream(&room_id).await {
                Ok(stream) => {
                    let task = forward(stream, self.cmd_tx.clone());
                    self.subscriptions.insert(room_id.clone(), task);
                    tracing::debug!(connection_id = %self.context.id(), room_id = %room_id, "subscribed");
                }
                Err(err) => return self.send(ServerFrame::from(ApiError::from(err))).await,
            }
        }
        self.send(ServerFrame::Subscribed { room_id }).await
    }

    async fn unsubscribe(&mut self, room_id: String) -> Result<(), ()> {
        if let Some(task) = self.subscriptions.remove(&room_id) {
            task.abort();
            tracing::debug!(connection_id = %self.context.id(), room_id = %room_id, "unsubscribed");
        }
        self.send(ServerFrame::Unsubscribed { room_id }).await
    }

    async fn send(&self, frame: ServerFrame) -> Result<(), ()> {
        let text = serde_json::to_string(&frame).map_err(|err| {
            tracing::warn!(error = %err, "failed to serialize websocket frame");
        })?;
        self.cmd_tx
            .send(WsCommand::SendText(text))
            .await
            .map_err(|_| ())
    }

    fn close(&mut self) {
        for (_, task) in self.subscriptions.drain() {
            task.abort();
        }
    }
}

/// 把房间消息转发到写通道；流结束说明订阅者落后被总线切断，随即关闭连接
fn forward(mut stream: MessageStream, cmd_tx: mpsc::Sender<WsCommand>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let room_id = stream.room_id().to_string();
        while let Some(message) = stream.recv().await {
            let frame = ServerFrame::MessageAdded {
                room_id: room_id.clone(),
                payload: MessageDto::from(&message),
            };
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize websocket payload");
                    continue;
                }
            };
            if cmd_tx.send(WsCommand::SendText(text)).await.is_err() {
                return;
            }
        }

        tracing::warn!(room_id = %room_id, "subscriber fell behind, closing connection");
        let _ = cmd_tx.send(WsCommand::Close("subscriber lagged")).await;
    })
}
