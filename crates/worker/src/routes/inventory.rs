//! Catalog endpoints for reading and restocking items.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use inventory::InventoryRecord;
use serde::{Deserialize, Serialize};
use state_store::StateStore;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockRequest {
    pub total_cost: f64,
    pub quantity: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockResponse {
    #[serde(flatten)]
    pub record: InventoryRecord,
    pub version: i64,
}

/// GET /inventory/{item} — current stock of an item.
pub async fn get<S: StateStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(item): Path<String>,
) -> Result<Json<InventoryRecord>, ApiError> {
    state
        .catalog
        .get(&item)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Item not found: {item}")))
}

/// PUT /inventory/{item} — overwrite the stock of an item.
#[tracing::instrument(skip(state, req))]
pub async fn restock<S: StateStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(item): Path<String>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<RestockResponse>, ApiError> {
    if !req.total_cost.is_finite() || req.total_cost < 0.0 {
        return Err(ApiError::BadRequest(format!(
            "totalCost must be a non-negative number, got {}",
            req.total_cost
        )));
    }

    let record = InventoryRecord::new(item, req.total_cost, req.quantity);
    let version = state.catalog.restock(&record).await?;

    Ok(Json(RestockResponse {
        record,
        version: version.as_i64(),
    }))
}
