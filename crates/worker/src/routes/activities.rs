//! Activity invocation endpoints used by the workflow engine.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use inventory::ActivityContext;
use serde::{Deserialize, Serialize};
use state_store::StateStore;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeActivityRequest {
    #[serde(default)]
    pub workflow_instance_id: Option<String>,
    #[serde(default)]
    pub attempt: Option<u32>,
    pub input: serde_json::Value,
}

// -- Response types --

#[derive(Serialize)]
pub struct InvokeActivityResponse {
    pub output: serde_json::Value,
}

#[derive(Serialize)]
pub struct ActivityListResponse {
    pub activities: Vec<&'static str>,
}

// -- Handlers --

/// GET /activities — names of the registered activities.
pub async fn list<S: StateStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<ActivityListResponse> {
    Json(ActivityListResponse {
        activities: state.registry.names(),
    })
}

/// POST /activities/{name} — run one attempt of an activity.
#[tracing::instrument(skip(state, req))]
pub async fn invoke<S: StateStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
    Json(req): Json<InvokeActivityRequest>,
) -> Result<Json<InvokeActivityResponse>, ApiError> {
    let mut ctx = ActivityContext::new(req.workflow_instance_id.unwrap_or_default());
    if let Some(attempt) = req.attempt {
        ctx = ctx.with_attempt(attempt);
    }

    let started = Instant::now();
    let result = state.registry.invoke(&name, &ctx, req.input).await;

    let outcome = match &result {
        Ok(_) => "completed",
        Err(e) if e.is_retryable() => "retryable_failure",
        Err(_) => "terminal_failure",
    };
    metrics::counter!(
        "activity_invocations_total",
        "activity" => name.clone(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("activity_invocation_duration_seconds", "activity" => name)
        .record(started.elapsed().as_secs_f64());

    Ok(Json(InvokeActivityResponse { output: result? }))
}
