//! Kitchen order endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::auth::require_api_key;
use super::{error_response, ApiState, ErrorResponse};
use crate::ordering::Order;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Most recent confirmed orders
async fn list_orders(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Order>>, (StatusCode, Json<ErrorResponse>)> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let orders = state
        .orders
        .blocking(move |orders| orders.list_recent(limit))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, error_response("db_error", &e.to_string())))?;

    Ok(Json(orders))
}

/// A single order with its lines
async fn get_order(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<Order>, (StatusCode, Json<ErrorResponse>)> {
    let order = state
        .orders
        .blocking(move |orders| orders.get(id))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, error_response("db_error", &e.to_string())))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, error_response("not_found", "Order not found")))?;

    Ok(Json(order))
}

/// Build orders router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list_orders))
        .route("/{id}", get(get_order))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}
