use crate::domain::model::{Cafeteria, MenuItem};
use crate::domain::ports::MenuRepository;
use crate::utils::error::{MenuError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Day-keyed menu storage in SQLite. Dishes are kept as a JSON blob.
#[derive(Clone)]
pub struct SqliteMenuRepository {
    pool: Pool<Sqlite>,
}

impl SqliteMenuRepository {
    /// Opens (creating if needed) the database at `url` and applies migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        if let Some(parent) = Path::new(options.get_filename()).parent() {
            if !parent.as_os_str().is_empty() && !is_memory(url) {
                std::fs::create_dir_all(parent)?;
            }
        }

        // 每個 in-memory 連線都是獨立的資料庫，只能共用一條連線
        let max_connections = if is_memory(url) { 1 } else { max_connections.max(1) };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

fn is_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[async_trait]
impl MenuRepository for SqliteMenuRepository {
    #[tracing::instrument(name = "repository::load", skip(self), fields(cafeteria = %cafeteria))]
    async fn load(&self, cafeteria: Cafeteria, date: NaiveDate) -> Result<Option<Vec<MenuItem>>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT dishes FROM menu WHERE cafeteria = ? AND date = ?")
                .bind(cafeteria.key())
                .bind(date)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(dishes,)| serde_json::from_str::<Vec<MenuItem>>(&dishes).map_err(MenuError::from))
            .transpose()
    }

    #[tracing::instrument(name = "repository::save", skip(self, dishes), fields(cafeteria = %cafeteria, dishes = dishes.len()))]
    async fn save(&self, cafeteria: Cafeteria, dishes: &[MenuItem], date: NaiveDate) -> Result<()> {
        let blob = serde_json::to_string(dishes)?;

        sqlx::query(
            r#"
            INSERT INTO menu (cafeteria, date, dishes, updated_at)
            VALUES (?, ?, ?, datetime('now'))
            ON CONFLICT (cafeteria, date) DO UPDATE
              SET dishes = excluded.dishes,
                  updated_at = excluded.updated_at
            "#,
        )
        .bind(cafeteria.key())
        .bind(date)
        .bind(blob)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
