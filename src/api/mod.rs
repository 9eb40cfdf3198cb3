//! HTTP surface
//!
//! - `GET /breakers`: status of every breaker
//! - `GET /breakers/:name`: status of one breaker
//! - `POST /breakers/:name/reset`: close a breaker and drop its counter
//! - `GET /resource/:name`: call the simulated resource through a breaker

pub mod resource;

pub use resource::{ResourceError, SimulatedResource};

use crate::circuit_breaker::{BreakerStatus, CircuitBreakerRegistry};
use crate::error::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub registry: CircuitBreakerRegistry,
    pub resource: Arc<SimulatedResource>,
}

impl AppState {
    pub fn new(registry: CircuitBreakerRegistry, resource: SimulatedResource) -> Self {
        Self {
            registry,
            resource: Arc::new(resource),
        }
    }
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/breakers", get(list_breakers))
        .route("/breakers/:name", get(get_breaker))
        .route("/breakers/:name/reset", post(reset_breaker))
        .route("/resource/:name", get(call_resource))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn list_breakers(State(state): State<AppState>) -> Json<Vec<BreakerStatus>> {
    Json(state.registry.all_status().await)
}

async fn get_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerStatus>> {
    let breaker = state.registry.breaker(&name)?;
    Ok(Json(breaker.status().await))
}

async fn reset_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerStatus>> {
    let breaker = state.registry.breaker(&name)?;
    breaker.reset().await;
    Ok(Json(breaker.status().await))
}

/// Gate the call, then record the resource's failure against the breaker
async fn call_resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let breaker = state.registry.breaker(&name)?;
    let payload = breaker.evaluate(format!("request for {}", name)).await?;

    match state.resource.connect(&payload).await {
        Ok(body) => Ok(body.into_response()),
        Err(e) => {
            warn!(breaker = %name, error = %e, "Resource call failed");
            breaker.record_error(&e).await;

            let status = StatusCode::BAD_GATEWAY;
            let body = Json(json!({
                "error": e.to_string(),
                "status": status.as_u16(),
            }));
            Ok((status, body).into_response())
        }
    }
}
