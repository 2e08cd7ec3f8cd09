//! Local stand-ins for content gateways.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use pressledger::blockchain::Payload;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Serves `router` on an ephemeral local port and returns a `{cid}` template for it.
pub async fn spawn_gateway(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/ipfs/{{cid}}", addr)
}

/// Gateway answering every request with `status`.
pub async fn status_gateway(status: StatusCode) -> String {
    spawn_gateway(Router::new().route("/ipfs/:cid", get(move || async move { status }))).await
}

/// Gateway that never answers within a short client timeout.
pub async fn stalled_gateway() -> String {
    spawn_gateway(Router::new().route(
        "/ipfs/:cid",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            StatusCode::OK
        }),
    ))
    .await
}

/// Gateway serving the given documents by content identifier, 404 otherwise.
pub async fn content_gateway(documents: HashMap<String, Value>) -> String {
    async fn serve(
        State(docs): State<Arc<HashMap<String, Value>>>,
        Path(cid): Path<String>,
    ) -> Response {
        match docs.get(&cid) {
            Some(doc) => Json(doc.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    spawn_gateway(
        Router::new()
            .route("/ipfs/:cid", get(serve))
            .with_state(Arc::new(documents)),
    )
    .await
}

/// Request counters kept by [`counting_gateway`].
#[derive(Default)]
pub struct GatewayStats {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl GatewayStats {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Gateway that holds every request for `delay` and records how many overlap.
pub async fn counting_gateway(delay: Duration) -> (String, Arc<GatewayStats>) {
    async fn serve(
        State((stats, delay)): State<(Arc<GatewayStats>, Duration)>,
        Path(cid): Path<String>,
    ) -> Json<Value> {
        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak.fetch_max(now, Ordering::SeqCst);
        stats.total.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        Json(json!({"title": format!("Story {cid}")}))
    }

    let stats = Arc::new(GatewayStats::default());
    let url = spawn_gateway(
        Router::new()
            .route("/ipfs/:cid", get(serve))
            .with_state((stats.clone(), delay)),
    )
    .await;
    (url, stats)
}

/// Template pointing at a port nothing listens on.
pub fn dead_gateway() -> String {
    "http://127.0.0.1:1/ipfs/{cid}".to_string()
}

pub fn payload(value: Value) -> Payload {
    value.as_object().cloned().expect("payload must be an object")
}
