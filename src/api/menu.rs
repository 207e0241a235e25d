//! Kitchen menu endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;

use super::auth::require_api_key;
use super::{error_response, ApiState, ErrorResponse};
use crate::db::MenuRepo;
use crate::ordering::CatalogItem;
use crate::Error;

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

/// List every menu item, available or not
async fn list_menu(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<CatalogItem>>, (StatusCode, Json<ErrorResponse>)> {
    let items = state
        .menu
        .blocking(MenuRepo::list_all)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, error_response("db_error", &e.to_string())))?;

    Ok(Json(items))
}

/// Set stock for a dish; availability follows the new quantity
async fn set_quantity(
    State(state): State<Arc<ApiState>>,
    Path(dish_id): Path<String>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<CatalogItem>, (StatusCode, Json<ErrorResponse>)> {
    let quantity = req.quantity;
    let item = state
        .menu
        .blocking(move |menu| menu.set_quantity(&dish_id, quantity))
        .await
        .map_err(|e| match e {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, error_response("not_found", "Dish not found")),
            e => (StatusCode::INTERNAL_SERVER_ERROR, error_response("db_error", &e.to_string())),
        })?;

    tracing::info!(
        dish_id = %item.dish_id,
        quantity = item.quantity,
        available = item.available,
        "stock updated"
    );
    Ok(Json(item))
}

/// Build menu router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list_menu))
        .route("/{dish_id}/quantity", patch(set_quantity))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}
