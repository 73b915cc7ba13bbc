//! Shared fixtures: a local players API and a sleeper that records waits

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use drop_token_etl::ingest::Sleeper;

#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn secs(&self) -> Vec<u64> {
        self.sleeps.lock().iter().map(|d| d.as_secs()).collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.sleeps.lock().push(delay);
    }
}

/// Canned players API: `pages[n]` is served for `?page=n`, `[]` past the end.
/// `throttle[n]` answers 429 that many times before serving page n.
pub struct FakeApi {
    pub pages: Vec<String>,
    pub throttle: Mutex<HashMap<u32, u32>>,
    pub always_fail: Option<u16>,
    pub hits: Mutex<Vec<u32>>,
}

impl FakeApi {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            throttle: Mutex::new(HashMap::new()),
            always_fail: None,
            hits: Mutex::new(Vec::new()),
        }
    }

    pub fn throttle(self, page: u32, times: u32) -> Self {
        self.throttle.lock().insert(page, times);
        self
    }

    pub fn failing(mut self, status: u16) -> Self {
        self.always_fail = Some(status);
        self
    }
}

#[derive(Deserialize)]
struct PageQuery {
    page: u32,
}

async fn users(
    State(api): State<Arc<FakeApi>>,
    Query(q): Query<PageQuery>,
) -> (StatusCode, String) {
    api.hits.lock().push(q.page);

    if let Some(code) = api.always_fail {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, r#"{"message":"unavailable"}"#.to_string());
    }

    if let Some(left) = api.throttle.lock().get_mut(&q.page) {
        if *left > 0 {
            *left -= 1;
            return (
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"message":"Too Many Requests"}"#.to_string(),
            );
        }
    }

    let body = api
        .pages
        .get(q.page as usize)
        .cloned()
        .unwrap_or_else(|| "[]".to_string());
    (StatusCode::OK, body)
}

/// Serve `api` on an ephemeral port; returns the users endpoint URL
pub async fn spawn_api(api: Arc<FakeApi>) -> String {
    let app = Router::new().route("/prod/users", get(users)).with_state(api);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/prod/users", addr)
}

/// JSON array page of player records with ids `ids`
pub fn player_page(ids: &[i64], nat: &str) -> String {
    let records: Vec<String> = ids
        .iter()
        .map(|id| {
            format!(
                r#"{{"id":{id},"data":{{"gender":"female","name":"player {id}","nat":"{nat}","email":"p{id}@example.com"}}}}"#
            )
        })
        .collect();
    format!("[{}]", records.join(","))
}
