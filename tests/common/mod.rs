#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use enginex_panel::app::{app, AppState};
use enginex_panel::auth::{generate_jwt, Claims};
use enginex_panel::config::AppConfig;
use enginex_panel::testing::TestContext;

pub const TEST_SECRET: &str = "integration-test-secret";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    _data_dir: tempfile::TempDir,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let data_dir = tempfile::tempdir().context("failed to create data dir")?;

        // Cargo builds the server binary for integration tests
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_enginex-panel"));
        cmd.env("APP_ENV", "development")
            .env("ENGINEX_PORT", port.to_string())
            .env("SERVER_BIND_HOST", "127.0.0.1")
            .env("STORAGE_DATA_DIR", data_dir.path())
            .env("PRIVILEGE_TOGGLE", "dry-run")
            .env("JWT_SECRET", TEST_SECRET)
            .env_remove("TELEGRAM_BOT_TOKEN")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            _data_dir: data_dir,
            child,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

pub fn bearer(user: &str, session: &str) -> String {
    let token = generate_jwt(&Claims::new(user, session, 1), TEST_SECRET).expect("sign test token");
    format!("Bearer {}", token)
}

/// In-process router over a `TestContext` (manual clock, recording toggle
/// and channel)
pub struct TestApp {
    pub ctx: TestContext,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let ctx = TestContext::new()?;
        let state = AppState::new(ctx.service.clone(), TEST_SECRET);
        let router = app(state, &AppConfig::development().security);
        Ok(Self { ctx, router })
    }

    pub async fn call(&self, method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            request = request.header("authorization", auth);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("build request");

        let response = self.router.clone().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, json)
    }
}
