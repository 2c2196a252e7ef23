use railbook_catalog::{Train, TrainCatalog};
use railbook_core::StoreError;
use sqlx::{PgPool, Row};
use tracing::warn;

/// Persistence for the train catalog. Routes are stored as a comma
/// separated stop list, matching the admin import format.
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load every persisted train into the in-memory catalog. Rows the
    /// catalog rejects (duplicate number, degenerate route) are skipped
    /// with a warning. Returns how many trains were loaded.
    pub async fn load_into(&self, catalog: &TrainCatalog) -> Result<usize, StoreError> {
        let rows = sqlx::query("SELECT train_id, train_name, route, total_seats FROM trains")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut loaded = 0;
        for row in rows {
            let train_id: String = row.get("train_id");
            let name: String = row.get("train_name");
            let route_csv: String = row.get("route");
            let total_seats: i32 = row.get("total_seats");

            let route: Vec<String> = route_csv
                .split(',')
                .map(|stop| stop.trim().to_string())
                .filter(|stop| !stop.is_empty())
                .collect();

            match catalog.add_train(&train_id, &name, route, total_seats.max(0) as usize) {
                Ok(_) => loaded += 1,
                Err(err) => {
                    warn!(train = %train_id, %err, "skipping persisted train the catalog rejected");
                }
            }
        }
        Ok(loaded)
    }

    pub async fn insert_train(&self, train: &Train) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO trains (train_id, train_name, route, total_seats) VALUES ($1, $2, $3, $4)",
        )
        .bind(train.train_id())
        .bind(train.name())
        .bind(train.route().join(","))
        .bind(train.total_seats() as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
