//! Controller catalog rows.

use mpc_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the `controllers` table. `kind` is kept as text so rows with an
/// unknown kind can still be read and reported.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ControllerRow {
    pub id: String,
    pub kind: String,
    pub project_id: String,
    pub name: String,
    pub weather_site_id: Option<String>,
    pub settings: serde_json::Value,
    pub favorite: bool,
    pub created_at: Timestamp,
}

/// DTO for inserting a new controller row.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateControllerRow {
    pub id: String,
    pub kind: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub weather_site_id: Option<String>,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub favorite: bool,
}
