//! Repository for the `controllers` table.

use sqlx::PgPool;

use crate::models::controller::{ControllerRow, CreateControllerRow};

/// Column list for `controllers` SELECT queries.
const COLUMNS: &str = "\
    id, kind, project_id, name, weather_site_id, settings, favorite, created_at";

/// Provides query operations for controllers.
pub struct ControllerRepo;

impl ControllerRepo {
    pub async fn list_all(pool: &PgPool) -> Result<Vec<ControllerRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM controllers ORDER BY id");
        sqlx::query_as::<_, ControllerRow>(&query)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<ControllerRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM controllers WHERE id = $1");
        sqlx::query_as::<_, ControllerRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn insert(
        pool: &PgPool,
        row: &CreateControllerRow,
    ) -> Result<ControllerRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO controllers \
                (id, kind, project_id, name, weather_site_id, settings, favorite) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ControllerRow>(&query)
            .bind(&row.id)
            .bind(&row.kind)
            .bind(&row.project_id)
            .bind(&row.name)
            .bind(&row.weather_site_id)
            .bind(&row.settings)
            .bind(row.favorite)
            .fetch_one(pool)
            .await
    }

    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM controllers WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
