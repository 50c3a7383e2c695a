//! Shared test fixtures: a canned task-API server and task table helpers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ---------------------------------------------------------------------------
// Fixture task API
// ---------------------------------------------------------------------------

/// One canned HTTP response.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: String,
}

pub fn ok_json(body: &str) -> CannedResponse {
    CannedResponse {
        status: 200,
        body: body.to_string(),
    }
}

/// Empty SUCCESS page; also what the fixture serves once the queued getdata
/// responses run out.
pub fn empty_page() -> CannedResponse {
    ok_json(r#"{"status":"SUCCESS","message":"","data":[]}"#)
}

pub fn update_success() -> CannedResponse {
    ok_json(r#"{"status":"SUCCESS","message":""}"#)
}

struct FixtureState {
    getdata: Mutex<VecDeque<CannedResponse>>,
    update: Mutex<CannedResponse>,
    paths: Mutex<Vec<String>>,
}

/// A minimal HTTP server speaking just enough of the protocol for the
/// runner: each connection carries one GET, answered from the canned queue
/// and closed.
pub struct FixtureApi {
    addr: SocketAddr,
    state: Arc<FixtureState>,
}

impl FixtureApi {
    pub async fn start(getdata: Vec<CannedResponse>, update: CannedResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(FixtureState {
            getdata: Mutex::new(getdata.into()),
            update: Mutex::new(update),
            paths: Mutex::new(Vec::new()),
        });

        let serve_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let state = Arc::clone(&serve_state);
                tokio::spawn(async move {
                    handle_connection(stream, state).await;
                });
            }
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request paths in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state.paths.lock().unwrap().clone()
    }

    pub fn getdata_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|p| p.starts_with("/timer/getdata/"))
            .collect()
    }

    pub fn update_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|p| p.starts_with("/timer/update/"))
            .collect()
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<FixtureState>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => return,
        }
    }

    let request = String::from_utf8_lossy(&buf);
    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
    state.paths.lock().unwrap().push(path.clone());

    let response = if path.starts_with("/timer/getdata/") {
        state
            .getdata
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(empty_page)
    } else {
        state.update.lock().unwrap().clone()
    };

    let raw = format!(
        "HTTP/1.1 {} Fixture\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(raw.as_bytes()).await;
    let _ = stream.shutdown().await;
}

// ---------------------------------------------------------------------------
// Task table helpers
// ---------------------------------------------------------------------------

pub fn open_task_db(path: &Path) -> Connection {
    taskwheel::scheduler::repository::open_database(path).unwrap()
}

pub fn insert_task(conn: &Connection, command: &str, run_expr: &str) -> i64 {
    conn.execute(
        "INSERT INTO tasks (name, task, run_time_regular) VALUES (?1, ?1, ?2)",
        params![command, run_expr],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn set_status(conn: &Connection, id: i64, status: i64) {
    conn.execute(
        "UPDATE tasks SET status = ?1 WHERE id = ?2",
        params![status, id],
    )
    .unwrap();
}

pub fn task_status(conn: &Connection, id: i64) -> i64 {
    conn.query_row("SELECT status FROM tasks WHERE id = ?1", params![id], |r| {
        r.get(0)
    })
    .unwrap()
}

pub fn last_start_time(conn: &Connection, id: i64) -> Option<String> {
    conn.query_row(
        "SELECT last_start_time FROM tasks WHERE id = ?1",
        params![id],
        |r| r.get(0),
    )
    .unwrap()
}
