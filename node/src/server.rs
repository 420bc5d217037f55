// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Reference remote event table.
//!
//! Speaks the same wire contract as the hosted table the HTTP client talks
//! to, backed by an in-memory [`EventTable`].

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, Request as AxumRequest, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;

use crate::api::{InsertRequest, InsertResponse, RealtimeParams, SelectParams};
use crate::errors::ServerError;
use crate::network::InsertStatus;
use crate::table::EventTable;

#[derive(Clone)]
pub struct AppState {
    pub table: Arc<EventTable>,
}

impl AppState {
    pub fn new(table: Arc<EventTable>) -> Self {
        Self { table }
    }
}

async fn auth_guard(State(token): State<Arc<String>>, req: AxumRequest, next: Next) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "));

    if provided == Some(token.as_str()) {
        return Ok(next.run(req).await);
    }
    Err(StatusCode::UNAUTHORIZED)
}

pub fn build_router(state: AppState, auth_token: Option<String>) -> Router {
    let mut api = Router::new()
        .route("/rest/v1/events", get(select_events).post(insert_events))
        .route("/realtime/v1/events", get(realtime_events))
        .with_state(state);

    if let Some(token) = auth_token {
        tracing::info!("Auth Enabled: Bearer token required");
        api = api.route_layer(from_fn_with_state(Arc::new(token), auth_guard));
    } else {
        tracing::warn!("Auth Disabled: No token configured");
    }

    Router::new()
        .merge(api)
        // Observability
        .route("/metrics", get(metrics_handler))
        .layer(CorsLayer::permissive())
}

async fn insert_events(
    State(state): State<AppState>,
    Json(body): Json<InsertRequest>,
) -> Result<(StatusCode, Json<InsertResponse>), ServerError> {
    let rows = body.into_rows();
    if rows.is_empty() {
        return Err(ServerError::InvalidInput("no rows".to_string()));
    }
    // Reject the whole batch before storing any of it
    for row in &rows {
        if row.client_id.is_empty() || row.user_id.trim().is_empty() {
            return Err(ServerError::InvalidInput("client_id and user_id are required".to_string()));
        }
        row.into_event()?;
    }

    let mut response = InsertResponse {
        inserted: 0,
        already_present: 0,
        rows: Vec::with_capacity(rows.len()),
    };
    for row in rows {
        let (status, stored) = state.table.insert(row);
        match status {
            InsertStatus::Inserted => response.inserted += 1,
            InsertStatus::AlreadyPresent => response.already_present += 1,
        }
        response.rows.push(stored);
    }
    tracing::debug!(
        "Insert: {} new, {} already present",
        response.inserted,
        response.already_present
    );

    let status = if response.inserted > 0 { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(response)))
}

async fn select_events(
    State(state): State<AppState>,
    Query(params): Query<SelectParams>,
) -> Json<Vec<trunk_kernel::EventRow>> {
    Json(state.table.select(&params.user_id, params.after_id))
}

async fn realtime_events(State(state): State<AppState>, Query(params): Query<RealtimeParams>) -> impl IntoResponse {
    let user_id = params.user_id;
    tracing::debug!("Realtime: subscriber for {}", user_id);

    let lines = BroadcastStream::new(state.table.subscribe()).filter_map(move |item| {
        let line = match item {
            Ok(row) if row.user_id == user_id => serde_json::to_string(&row).ok().map(|json| json + "\n"),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Realtime: subscriber lagged: {}", e);
                None
            }
        };
        futures::future::ready(line.map(Ok::<_, Infallible>))
    });

    ([(CONTENT_TYPE, "application/x-ndjson")], Body::from_stream(lines))
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
