//! Dashboard and widget CRUD endpoints

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::api::ApiState;
use crate::api::error::ApiError;
use crate::data::duckdb::repositories::dashboard::{
    self, NewDashboard, NewWidget, UpdateDashboard, UpdateWidget, WidgetPosition,
};
use crate::data::types::{Dashboard, DashboardWidget};

// =============================================================================
// Dashboards
// =============================================================================

pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<Dashboard>>, ApiError> {
    let dashboards = state.store.read(dashboard::list_dashboards).await?;
    Ok(Json(dashboards))
}

pub async fn get_by_id(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Dashboard>, ApiError> {
    let found = state
        .store
        .read(move |conn| dashboard::get_dashboard(conn, &id))
        .await?;
    Ok(Json(found))
}

pub async fn create(
    State(state): State<ApiState>,
    Json(new): Json<NewDashboard>,
) -> Result<(StatusCode, Json<Dashboard>), ApiError> {
    if new.name.is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }
    let created = state
        .store
        .write(move |conn| dashboard::create_dashboard(conn, &new))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(change): Json<UpdateDashboard>,
) -> Result<Json<Dashboard>, ApiError> {
    let updated = state
        .store
        .write(move |conn| dashboard::update_dashboard(conn, &id, &change))
        .await?;
    Ok(Json(updated))
}

pub async fn delete_by_id(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .write(move |conn| dashboard::delete_dashboard(conn, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Flips the default flag atomically: the previous default is un-set in
/// the same transaction
pub async fn set_default(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Dashboard>, ApiError> {
    let updated = state
        .store
        .write(move |conn| dashboard::set_default_dashboard(conn, &id))
        .await?;
    Ok(Json(updated))
}

// =============================================================================
// Widgets
// =============================================================================

pub async fn list_widgets(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<DashboardWidget>>, ApiError> {
    let widgets = state
        .store
        .read(move |conn| dashboard::list_widgets(conn, &id))
        .await?;
    Ok(Json(widgets))
}

pub async fn create_widget(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(new): Json<NewWidget>,
) -> Result<(StatusCode, Json<DashboardWidget>), ApiError> {
    if new.widget_type.is_empty() {
        return Err(ApiError::Validation("widgetType is required".to_string()));
    }
    let created = state
        .store
        .write(move |conn| dashboard::create_widget(conn, &id, &new))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_widget(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(change): Json<UpdateWidget>,
) -> Result<Json<DashboardWidget>, ApiError> {
    let updated = state
        .store
        .write(move |conn| dashboard::update_widget(conn, &id, &change))
        .await?;
    Ok(Json(updated))
}

pub async fn delete_widget(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .write(move |conn| dashboard::delete_widget(conn, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PositionsRequest {
    pub positions: Vec<WidgetPosition>,
}

/// Batch position update in one transaction; widgets not listed keep
/// their placement
pub async fn update_widget_positions(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<PositionsRequest>,
) -> Result<StatusCode, ApiError> {
    if request.positions.is_empty() {
        return Err(ApiError::Validation("positions must not be empty".to_string()));
    }
    state
        .store
        .write(move |conn| dashboard::update_widget_positions(conn, &id, &request.positions))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
