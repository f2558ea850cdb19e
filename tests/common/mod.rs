//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fpp_monitor::clock::ManualClock;
use fpp_monitor::config::MonitorConfig;
use fpp_monitor::device::{DeviceApi, DeviceError, DeviceFuture, DeviceStatus};
use fpp_monitor::storage::Database;
use fpp_monitor::App;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Typical `/api/fppd/status` body while a show is running.
pub fn playing_status_body() -> String {
    json!({
        "status_name": "playing",
        "current_sequence": "Wizards in Winter.fseq",
        "current_playlist": { "playlist": "Main Show", "index": "3", "count": "12" },
        "seconds_played": "42",
        "seconds_remaining": "181",
        "volume": 70,
        "mode_name": "player",
        "uptimeTotalSeconds": 86400
    })
    .to_string()
}

pub fn idle_status_body() -> String {
    json!({
        "status_name": "idle",
        "current_sequence": "",
        "current_playlist": { "playlist": "", "index": "0", "count": "0" },
        "seconds_played": "0",
        "seconds_remaining": "0",
        "volume": 50,
        "mode_name": "player"
    })
    .to_string()
}

/// What the mock device does with one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(u16, String),
    /// Hold the connection open past any sane client deadline.
    Hang,
}

/// Start a programmable mock FPP device on an ephemeral port.
///
/// `f` receives the request path and decides the reply. Returns the bound
/// address and a counter of requests received.
pub async fn start_mock_device<F>(f: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(&str) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let f = Arc::new(f);

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let path = read_request_path(&mut socket).await;
                        counter.fetch_add(1, Ordering::SeqCst);

                        let (status, body) = match f(&path) {
                            Reply::Respond(status, body) => (status, body),
                            Reply::Hang => {
                                tokio::time::sleep(Duration::from_secs(30)).await;
                                return;
                            }
                        };
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, hits)
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string()
}

/// In-process device whose answers are set by the test.
pub struct FakeDevice {
    status: Mutex<Result<DeviceStatus, DeviceError>>,
    playlists: Mutex<Option<Value>>,
    pub calls: AtomicUsize,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(Err(DeviceError::Transport("connection refused".into()))),
            playlists: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, status: Result<DeviceStatus, DeviceError>) {
        *self.status.lock().unwrap() = status;
    }

    pub fn set_playlist(&self, body: Value) {
        *self.playlists.lock().unwrap() = Some(body);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DeviceApi for FakeDevice {
    fn fetch_status(&self) -> DeviceFuture<'_, DeviceStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.status.lock().unwrap().clone();
        Box::pin(async move { result })
    }

    fn fetch_playlist<'a>(&'a self, _name: &'a str) -> DeviceFuture<'a, Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .playlists
            .lock()
            .unwrap()
            .clone()
            .ok_or(DeviceError::Status(404));
        Box::pin(async move { result })
    }
}

pub fn playing() -> DeviceStatus {
    DeviceStatus {
        status: "playing".into(),
        current_sequence: Some("Wizards in Winter.fseq".into()),
        current_playlist: Some("Main Show".into()),
        playlist_index: Some(3),
        playlist_count: Some(12),
        seconds_played: Some(42),
        seconds_remaining: Some(181),
        volume: Some(70),
        mode: Some("player".into()),
        uptime: Some(86_400),
    }
}

pub const START_MILLIS: i64 = 1_700_000_000_000;

/// App over an in-memory database, the given device, and a manual clock.
pub fn build_app(device: Arc<dyn DeviceApi>, config: MonitorConfig) -> (App, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let db = Database::open_in_memory().unwrap();
    let app = App::assemble(config, db, device, clock.clone()).unwrap();
    (app, clock)
}

/// Poll `cond` until it holds or the deadline passes.
pub async fn wait_until<F, Fut>(deadline: Duration, mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < deadline {
        if cond().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
