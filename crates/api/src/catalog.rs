//! Relational source of truth for which controllers exist.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mpc_db::models::controller::{ControllerRow, CreateControllerRow};
use mpc_db::repositories::ControllerRepo;
use mpc_db::DbPool;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Controller already exists: {0}")]
    Duplicate(String),
}

#[async_trait]
pub trait EntityCatalog: Send + Sync {
    async fn list_rows(&self) -> Result<Vec<ControllerRow>, CatalogError>;

    async fn insert_row(&self, row: &CreateControllerRow) -> Result<ControllerRow, CatalogError>;

    /// Returns `true` if a row was removed.
    async fn delete_row(&self, id: &str) -> Result<bool, CatalogError>;
}

/// Catalog backed by the `controllers` table.
pub struct PgCatalog {
    pool: DbPool,
}

impl PgCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl EntityCatalog for PgCatalog {
    async fn list_rows(&self) -> Result<Vec<ControllerRow>, CatalogError> {
        Ok(ControllerRepo::list_all(&self.pool).await?)
    }

    async fn insert_row(&self, row: &CreateControllerRow) -> Result<ControllerRow, CatalogError> {
        if ControllerRepo::find_by_id(&self.pool, &row.id).await?.is_some() {
            return Err(CatalogError::Duplicate(row.id.clone()));
        }
        Ok(ControllerRepo::insert(&self.pool, row).await?)
    }

    async fn delete_row(&self, id: &str) -> Result<bool, CatalogError> {
        Ok(ControllerRepo::delete(&self.pool, id).await?)
    }
}

/// In-process catalog for local runs without a database and for tests.
#[derive(Default)]
pub struct MemoryCatalog {
    rows: RwLock<BTreeMap<String, ControllerRow>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = ControllerRow>) -> Self {
        Self {
            rows: RwLock::new(rows.into_iter().map(|r| (r.id.clone(), r)).collect()),
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.rows.read().await.contains_key(id)
    }
}

#[async_trait]
impl EntityCatalog for MemoryCatalog {
    async fn list_rows(&self) -> Result<Vec<ControllerRow>, CatalogError> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn insert_row(&self, row: &CreateControllerRow) -> Result<ControllerRow, CatalogError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&row.id) {
            return Err(CatalogError::Duplicate(row.id.clone()));
        }
        let stored = ControllerRow {
            id: row.id.clone(),
            kind: row.kind.clone(),
            project_id: row.project_id.clone(),
            name: row.name.clone(),
            weather_site_id: row.weather_site_id.clone(),
            settings: row.settings.clone(),
            favorite: row.favorite,
            created_at: chrono::Utc::now(),
        };
        rows.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete_row(&self, id: &str) -> Result<bool, CatalogError> {
        Ok(self.rows.write().await.remove(id).is_some())
    }
}
