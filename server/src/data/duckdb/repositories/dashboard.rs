//! Dashboard and widget repository
//!
//! Mutations run inside the caller's transaction (`Store::write`), which
//! is what makes the default-dashboard flip and batch position updates
//! atomic.

use chrono::Utc;
use duckdb::{Connection, Row, params};
use serde::Deserialize;
use uuid::Uuid;

use crate::data::duckdb::StoreError;
use crate::data::types::{Dashboard, DashboardWidget};
use crate::utils::time::micros_to_datetime;

use super::ts_value;

// =============================================================================
// Request shapes
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDashboard {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDashboard {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWidget {
    pub widget_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub grid_col: i32,
    #[serde(default)]
    pub grid_row: i32,
    #[serde(default = "default_span")]
    pub col_span: i32,
    #[serde(default = "default_span")]
    pub row_span: i32,
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_span() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWidget {
    pub widget_type: Option<String>,
    pub title: Option<String>,
    pub grid_col: Option<i32>,
    pub grid_row: Option<i32>,
    pub col_span: Option<i32>,
    pub row_span: Option<i32>,
    pub config: Option<serde_json::Value>,
}

/// One entry of a batch position update
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetPosition {
    pub id: String,
    pub grid_col: i32,
    pub grid_row: i32,
    pub col_span: i32,
    pub row_span: i32,
}

// =============================================================================
// Dashboards
// =============================================================================

const DASHBOARD_COLUMNS: &str =
    "id, name, COALESCE(description, ''), is_default, epoch_us(created_at), epoch_us(updated_at)";

fn row_to_dashboard(row: &Row<'_>) -> Result<Dashboard, duckdb::Error> {
    Ok(Dashboard {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_default: row.get(3)?,
        created_at: micros_to_datetime(row.get(4)?),
        updated_at: micros_to_datetime(row.get(5)?),
    })
}

pub fn list_dashboards(conn: &Connection) -> Result<Vec<Dashboard>, StoreError> {
    let sql = format!("SELECT {DASHBOARD_COLUMNS} FROM dashboards ORDER BY created_at");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_dashboard)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}

pub fn get_dashboard(conn: &Connection, id: &str) -> Result<Dashboard, StoreError> {
    let sql = format!("SELECT {DASHBOARD_COLUMNS} FROM dashboards WHERE id = ?");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_dashboard)?;
    match rows.next() {
        Some(dashboard) => Ok(dashboard?),
        None => Err(StoreError::NotFound(format!("dashboard {}", id))),
    }
}

pub fn create_dashboard(conn: &Connection, new: &NewDashboard) -> Result<Dashboard, StoreError> {
    if new.is_default {
        conn.execute("UPDATE dashboards SET is_default = false WHERE is_default", [])?;
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO dashboards (id, name, description, is_default, created_at, updated_at)
         VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
        params![
            id,
            new.name,
            new.description,
            new.is_default,
            ts_value(now),
            ts_value(now)
        ],
    )?;
    get_dashboard(conn, &id)
}

pub fn update_dashboard(
    conn: &Connection,
    id: &str,
    update: &UpdateDashboard,
) -> Result<Dashboard, StoreError> {
    let existing = get_dashboard(conn, id)?;

    if update.is_default == Some(true) {
        conn.execute(
            "UPDATE dashboards SET is_default = false WHERE is_default AND id != ?",
            params![id],
        )?;
    }

    let name = update.name.clone().unwrap_or(existing.name);
    let description = update.description.clone().unwrap_or(existing.description);
    let is_default = update.is_default.unwrap_or(existing.is_default);
    conn.execute(
        "UPDATE dashboards SET name = ?, description = ?, is_default = ?, updated_at = CAST(? AS TIMESTAMP) WHERE id = ?",
        params![name, description, is_default, ts_value(Utc::now()), id],
    )?;
    get_dashboard(conn, id)
}

pub fn delete_dashboard(conn: &Connection, id: &str) -> Result<(), StoreError> {
    conn.execute("DELETE FROM dashboard_widgets WHERE dashboard_id = ?", params![id])?;
    let deleted = conn.execute("DELETE FROM dashboards WHERE id = ?", params![id])?;
    if deleted == 0 {
        return Err(StoreError::NotFound(format!("dashboard {}", id)));
    }
    Ok(())
}

/// Flip the default flag to the given dashboard, un-setting all others in
/// the same transaction
pub fn set_default_dashboard(conn: &Connection, id: &str) -> Result<Dashboard, StoreError> {
    // Existence check first so a bad id leaves the current default intact
    get_dashboard(conn, id)?;
    conn.execute("UPDATE dashboards SET is_default = false WHERE is_default", [])?;
    conn.execute(
        "UPDATE dashboards SET is_default = true, updated_at = CAST(? AS TIMESTAMP) WHERE id = ?",
        params![ts_value(Utc::now()), id],
    )?;
    get_dashboard(conn, id)
}

// =============================================================================
// Widgets
// =============================================================================

const WIDGET_COLUMNS: &str = "id, dashboard_id, widget_type, COALESCE(title, ''), grid_col,
    grid_row, col_span, row_span, CAST(config AS VARCHAR),
    epoch_us(created_at), epoch_us(updated_at)";

fn row_to_widget(row: &Row<'_>) -> Result<DashboardWidget, duckdb::Error> {
    let config_text: Option<String> = row.get(8)?;
    let config = config_text
        .and_then(|t| serde_json::from_str(&t).ok())
        .unwrap_or(serde_json::Value::Null);
    Ok(DashboardWidget {
        id: row.get(0)?,
        dashboard_id: row.get(1)?,
        widget_type: row.get(2)?,
        title: row.get(3)?,
        grid_col: row.get(4)?,
        grid_row: row.get(5)?,
        col_span: row.get(6)?,
        row_span: row.get(7)?,
        config,
        created_at: micros_to_datetime(row.get(9)?),
        updated_at: micros_to_datetime(row.get(10)?),
    })
}

pub fn list_widgets(
    conn: &Connection,
    dashboard_id: &str,
) -> Result<Vec<DashboardWidget>, StoreError> {
    let sql = format!(
        "SELECT {WIDGET_COLUMNS} FROM dashboard_widgets
         WHERE dashboard_id = ? ORDER BY grid_row, grid_col"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![dashboard_id], row_to_widget)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}

pub fn get_widget(conn: &Connection, id: &str) -> Result<DashboardWidget, StoreError> {
    let sql = format!("SELECT {WIDGET_COLUMNS} FROM dashboard_widgets WHERE id = ?");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_widget)?;
    match rows.next() {
        Some(widget) => Ok(widget?),
        None => Err(StoreError::NotFound(format!("widget {}", id))),
    }
}

pub fn create_widget(
    conn: &Connection,
    dashboard_id: &str,
    new: &NewWidget,
) -> Result<DashboardWidget, StoreError> {
    // Reject widgets on dashboards that do not exist
    get_dashboard(conn, dashboard_id)?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO dashboard_widgets (
            id, dashboard_id, widget_type, title, grid_col, grid_row,
            col_span, row_span, config, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
        params![
            id,
            dashboard_id,
            new.widget_type,
            new.title,
            new.grid_col,
            new.grid_row,
            new.col_span,
            new.row_span,
            serde_json::to_string(&new.config).unwrap_or_else(|_| "null".to_string()),
            ts_value(now),
            ts_value(now),
        ],
    )?;
    get_widget(conn, &id)
}

pub fn update_widget(
    conn: &Connection,
    id: &str,
    update: &UpdateWidget,
) -> Result<DashboardWidget, StoreError> {
    let existing = get_widget(conn, id)?;

    let widget_type = update.widget_type.clone().unwrap_or(existing.widget_type);
    let title = update.title.clone().unwrap_or(existing.title);
    let grid_col = update.grid_col.unwrap_or(existing.grid_col);
    let grid_row = update.grid_row.unwrap_or(existing.grid_row);
    let col_span = update.col_span.unwrap_or(existing.col_span);
    let row_span = update.row_span.unwrap_or(existing.row_span);
    let config = update.config.clone().unwrap_or(existing.config);

    conn.execute(
        "UPDATE dashboard_widgets SET widget_type = ?, title = ?, grid_col = ?, grid_row = ?,
         col_span = ?, row_span = ?, config = ?, updated_at = CAST(? AS TIMESTAMP) WHERE id = ?",
        params![
            widget_type,
            title,
            grid_col,
            grid_row,
            col_span,
            row_span,
            serde_json::to_string(&config).unwrap_or_else(|_| "null".to_string()),
            ts_value(Utc::now()),
            id,
        ],
    )?;
    get_widget(conn, id)
}

pub fn delete_widget(conn: &Connection, id: &str) -> Result<(), StoreError> {
    let deleted = conn.execute("DELETE FROM dashboard_widgets WHERE id = ?", params![id])?;
    if deleted == 0 {
        return Err(StoreError::NotFound(format!("widget {}", id)));
    }
    Ok(())
}

/// Update positions for the listed widgets only; widgets not named keep
/// their placement. Runs in the caller's transaction.
pub fn update_widget_positions(
    conn: &Connection,
    dashboard_id: &str,
    positions: &[WidgetPosition],
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "UPDATE dashboard_widgets
         SET grid_col = ?, grid_row = ?, col_span = ?, row_span = ?, updated_at = CAST(? AS TIMESTAMP)
         WHERE id = ? AND dashboard_id = ?",
    )?;
    let now = Utc::now();
    for pos in positions {
        let updated = stmt.execute(params![
            pos.grid_col,
            pos.grid_row,
            pos.col_span,
            pos.row_span,
            ts_value(now),
            pos.id,
            dashboard_id,
        ])?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!(
                "widget {} on dashboard {}",
                pos.id, dashboard_id
            )));
        }
    }
    Ok(())
}
