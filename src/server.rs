use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    config::ScanConfig,
    observer::{ChannelObserver, ScanEvent},
    scanner::{CancelHandle, ScanCoordinator, ScanOutcome},
    types::{PortResult, ScanRequest},
};

#[derive(Clone, Default)]
pub struct AppState {
    inner: Arc<RwLock<ServerState>>, // shared mutable state for progress/results
    config: ScanConfig,
}

impl AppState {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            inner: Arc::default(),
            config,
        }
    }
}

#[derive(Debug, Default)]
struct ServerState {
    /// Bumped on every new scan so a superseded scan cannot overwrite state.
    generation: u64,
    status: Status,
    results: Option<Vec<PortResult>>,
    cancel: Option<CancelHandle>,
}

#[derive(Debug, Clone, Copy, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Status {
    pub state: Phase,
    pub request: Option<ScanRequest>,
    pub last_port: u16,
    pub percentage: f64,
    pub open: usize,
    pub errors: usize,
    pub last_error: Option<String>,
}

impl Status {
    fn running(request: ScanRequest) -> Self {
        Self {
            state: Phase::Running,
            request: Some(request),
            ..Self::default()
        }
    }

    fn apply(&mut self, event: &ScanEvent) {
        match event {
            ScanEvent::Progress { port, percentage } => {
                self.last_port = *port;
                self.percentage = *percentage;
            }
            ScanEvent::Result(_) => self.open += 1,
            // Phase moves to Done only once the results are stored.
            ScanEvent::Complete { results } => self.open = results.len(),
            ScanEvent::Error { message } => {
                self.errors += 1;
                self.last_error = Some(message.clone());
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(post_scan))
        .route("/cancel", post(post_cancel))
        .route("/results", get(get_results))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, config: ScanConfig) -> Result<()> {
    let app = router(AppState::new(config));
    info!("serving scan API on http://{bind}/api");
    axum::serve(tokio::net::TcpListener::bind(bind).await?, app).await?;
    Ok(())
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    (StatusCode::OK, Json(s.status.clone()))
}

async fn get_results(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    if let Some(res) = s.results.as_ref() {
        (StatusCode::OK, Json(res.clone())).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn post_cancel(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    match s.cancel.as_ref() {
        Some(c) => {
            c.cancel();
            StatusCode::ACCEPTED
        }
        None => StatusCode::CONFLICT,
    }
}

async fn post_scan(State(app): State<AppState>, Json(req): Json<ScanRequest>) -> impl IntoResponse {
    if let Err(e) = req.validate() {
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }

    let coordinator = ScanCoordinator::new(app.config);
    let generation = {
        let mut s = app.inner.write().await;
        // Cancel any existing scan
        if let Some(c) = s.cancel.take() {
            c.cancel();
        }
        s.generation += 1;
        s.status = Status::running(req.clone());
        s.results = None;
        s.cancel = Some(coordinator.cancel_handle());
        s.generation
    };

    let (observer, mut rx) = ChannelObserver::new();
    let scan_req = req.clone();
    let scan = tokio::spawn(async move { coordinator.scan(&scan_req, observer).await });

    // Events are applied here, off the scan task, so the scan loop never waits on the lock.
    let app2 = app.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let mut s = app2.inner.write().await;
            if s.generation != generation {
                return;
            }
            s.status.apply(&event);
        }

        let outcome = scan.await;
        let mut s = app2.inner.write().await;
        if s.generation != generation {
            return;
        }
        s.cancel = None;
        match outcome {
            Ok(Ok(ScanOutcome::Completed(results))) => {
                s.status.state = Phase::Done;
                s.results = Some(results);
            }
            Ok(Ok(ScanOutcome::Cancelled)) => s.status.state = Phase::Cancelled,
            Ok(Err(e)) => {
                s.status.state = Phase::Idle;
                s.status.last_error = Some(e.to_string());
            }
            Err(e) => {
                error!("scan task failed: {e}");
                s.status.state = Phase::Idle;
                s.status.last_error = Some(e.to_string());
            }
        }
    });

    (StatusCode::ACCEPTED, Json(Status::running(req))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PortState, Protocol};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[test]
    fn status_tracks_events() {
        let mut status = Status::running(ScanRequest::new("127.0.0.1", 1, 2));
        let result = PortResult {
            port: 2,
            protocol: Protocol::Tcp,
            service: "unknown".into(),
            state: PortState::Open,
        };
        status.apply(&ScanEvent::Progress {
            port: 1,
            percentage: 50.0,
        });
        status.apply(&ScanEvent::Error {
            message: "boom".into(),
        });
        status.apply(&ScanEvent::Progress {
            port: 2,
            percentage: 100.0,
        });
        status.apply(&ScanEvent::Result(result.clone()));
        assert_eq!(status.state, Phase::Running);
        assert_eq!(status.open, 1);

        status.apply(&ScanEvent::Complete {
            results: vec![result],
        });
        assert_eq!(status.state, Phase::Running);
        assert_eq!(status.percentage, 100.0);
        assert_eq!(status.errors, 1);
        assert_eq!(status.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn scan_rejects_invalid_requests() {
        let app = router(AppState::default());

        let reversed = r#"{"host":"127.0.0.1","start_port":10,"end_port":5,"concurrency":10}"#;
        let res = app.clone().oneshot(post_json("/api/scan", reversed)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let oversized = r#"{"host":"127.0.0.1","start_port":1,"end_port":5,"concurrency":200000}"#;
        let res = app.clone().oneshot(post_json("/api/scan", oversized)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let status = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(status.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cancel_without_scan_conflicts() {
        let app = router(AppState::default());

        let res = app.clone().oneshot(post_json("/api/cancel", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = app
            .oneshot(Request::get("/api/results").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }
}
