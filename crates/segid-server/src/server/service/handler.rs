//! HTTP service for segment-allocated IDs.
//!
//! This module defines [`IdService`], which owns the process-wide
//! [`SegmentAllocator`], and the axum [`router`] exposing it:
//!
//! - `GET /id` - one ID as plain text.
//! - `GET /batch?count=N` - `N` comma-separated IDs. A missing, unparsable,
//!   non-positive or oversized `count` yields a single ID.
//! - `GET /health` - `200 ok` while serving, `503` once shutdown begins.
//! - `GET /stats` - JSON snapshot of the allocator's segments.
//!
//! Any other method on these paths is answered with `405`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use portable_atomic::{AtomicBool, Ordering};
use segid::{AllocatorSnapshot, SegmentAllocator, StoreError};
use serde::Deserialize;

use crate::server::{
    config::ServerConfig,
    error::ApiError,
    store::AnyStore,
    telemetry::{increment_errors, increment_ids_issued, increment_requests, record_batch_size},
};

/// The allocator type served by this binary.
pub type Allocator = SegmentAllocator<AnyStore>;

/// Shared handle to the allocator plus the serving flag.
///
/// Cloning is cheap; every clone refers to the same allocator.
#[derive(Clone)]
pub struct IdService {
    allocator: Arc<Allocator>,
    max_batch: usize,
    serving: Arc<AtomicBool>,
}

impl IdService {
    /// Connects to the configured store and loads the first segment.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be reached or the first segment cannot be
    /// loaded. The server must not start serving in that case.
    pub async fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let store = AnyStore::connect(&config.store).await?;
        let allocator = SegmentAllocator::new(store, config.allocator.clone()).await?;
        Ok(Self::with_allocator(allocator, config.max_batch))
    }

    pub fn with_allocator(allocator: Allocator, max_batch: usize) -> Self {
        Self {
            allocator: Arc::new(allocator),
            max_batch,
            serving: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Hands out one ID.
    pub async fn next_id(&self) -> Result<i64, ApiError> {
        increment_requests();
        match self.allocator.next_id().await {
            Ok(id) => {
                increment_ids_issued(1);
                Ok(id)
            }
            Err(e) => {
                increment_errors();
                tracing::warn!(error = %e, "Failed to issue ID");
                Err(e.into())
            }
        }
    }

    /// Hands out `count` IDs, or none at all if any of them fails.
    pub async fn next_ids(&self, count: usize) -> Result<Vec<i64>, ApiError> {
        increment_requests();
        record_batch_size(count as f64);
        match self.allocator.next_ids(count).await {
            Ok(ids) => {
                increment_ids_issued(ids.len() as u64);
                Ok(ids)
            }
            Err(e) => {
                increment_errors();
                tracing::warn!(error = %e, count, "Failed to issue ID batch");
                Err(e.into())
            }
        }
    }

    /// Interprets the raw `count` query value. Anything that is not an
    /// integer in `1..=max_batch` falls back to a single ID.
    pub fn batch_count(&self, raw: Option<&str>) -> usize {
        raw.and_then(|value| value.trim().parse::<i64>().ok())
            .and_then(|count| usize::try_from(count).ok())
            .filter(|&count| count > 0 && count <= self.max_batch)
            .unwrap_or(1)
    }

    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> AllocatorSnapshot {
        self.allocator.snapshot()
    }

    /// Flips `/health` to `503` so load balancers stop routing here while
    /// in-flight requests drain.
    pub fn begin_shutdown(&self) {
        self.serving.store(false, Ordering::Release);
    }

    /// Closes the allocator and releases the store. Requests arriving after
    /// this are answered with `503`.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        self.begin_shutdown();
        self.allocator.close().await
    }
}

/// Builds the HTTP routes around `service`.
pub fn router(service: IdService) -> Router {
    Router::new()
        .route("/id", get(id))
        .route("/batch", get(batch))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(service)
}

#[tracing::instrument(level = "debug", skip_all)]
async fn id(State(service): State<IdService>) -> Result<String, ApiError> {
    service.next_id().await.map(|id| id.to_string())
}

#[derive(Debug, Deserialize)]
pub struct BatchParams {
    count: Option<String>,
}

#[tracing::instrument(level = "debug", skip_all)]
async fn batch(
    State(service): State<IdService>,
    Query(params): Query<BatchParams>,
) -> Result<String, ApiError> {
    let count = service.batch_count(params.count.as_deref());
    let ids = service.next_ids(count).await?;
    Ok(ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(","))
}

async fn health(State(service): State<IdService>) -> (StatusCode, &'static str) {
    if service.is_serving() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    }
}

async fn stats(State(service): State<IdService>) -> Json<AllocatorSnapshot> {
    Json(service.snapshot())
}
