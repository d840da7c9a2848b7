#![allow(dead_code)]

use std::sync::Arc;

use application::{LocalMessageBroadcaster, ManualClock, MessageReaper};
use config::AppConfig;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot};
use web_api::{assemble, Stores};

pub const ALICE_EMAIL: &str = "alice@x.com";
pub const ALICE_CPF: &str = "12345678901";
pub const ALICE_PASSWORD: &str = "secret1";

pub struct TestApp {
    pub base: String,
    pub ws_base: String,
    pub client: Client,
    pub clock: Arc<ManualClock>,
    pub reaper: Arc<MessageReaper>,
    pub broker: Arc<LocalMessageBroadcaster>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.bcrypt_cost = Some(4);
    config
}

/// 在随机端口上启动完整路由，使用内存存储和手动时钟
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: AppConfig) -> TestApp {
    let clock = Arc::new(ManualClock::default());
    let app = assemble(&config, Stores::in_memory(&config), clock.clone());
    let router = app.router();

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestApp {
        base: format!("http://{addr}/api/v1"),
        ws_base: format!("ws://{addr}/api/v1/ws"),
        client: Client::new(),
        clock,
        reaper: app.reaper.clone(),
        broker: app.broker.clone(),
        shutdown: Some(shutdown_tx),
    }
}

/// 从响应的 Set-Cookie 中取出刷新令牌
pub fn refresh_cookie(response: &Response) -> Option<String> {
    set_cookie_header(response)?
        .split(';')
        .next()?
        .strip_prefix("refreshToken=")
        .map(str::to_owned)
}

pub fn set_cookie_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("refreshToken="))
        .map(str::to_owned)
}

/// 已登录的客户端会话
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Value,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn register(&self, name: &str, email: &str, cpf: &str, password: &str) -> Response {
        self.client
            .post(self.url("/auth/register"))
            .json(&json!({ "name": name, "email": email, "cpf": cpf, "password": password }))
            .send()
            .await
            .expect("register request")
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request")
    }

    pub async fn refresh(&self, refresh_token: &str) -> Response {
        self.client
            .post(self.url("/auth/refresh"))
            .header(reqwest::header::COOKIE, format!("refreshToken={refresh_token}"))
            .send()
            .await
            .expect("refresh request")
    }

    pub async fn get(&self, path: &str, access_token: &str) -> Response {
        self.client
            .get(self.url(path))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("get request")
    }

    pub async fn post(&self, path: &str, access_token: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .expect("post request")
    }

    /// 注册并登录 Alice
    pub async fn alice(&self) -> Session {
        let registered = self
            .register("Alice", ALICE_EMAIL, ALICE_CPF, ALICE_PASSWORD)
            .await;
        assert_eq!(registered.status(), 201);
        self.session(ALICE_EMAIL, ALICE_PASSWORD).await
    }

    pub async fn session(&self, email: &str, password: &str) -> Session {
        let response = self.login(email, password).await;
        assert_eq!(response.status(), 200);
        let refresh_token = refresh_cookie(&response).expect("refresh cookie");
        let body: Value = response.json().await.expect("login json");

        Session {
            access_token: body["accessToken"].as_str().expect("access token").to_owned(),
            refresh_token,
            user: body["user"].clone(),
        }
    }
}
