//! Region and document metadata catalog using PostgreSQL.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::debug;

use hazard_common::{LoadError, LoadResult, Region};

/// Database connection pool and catalog operations.
///
/// The search path of every pooled connection is pinned to the configured
/// schema, so catalog statements and the bulk-copy path all resolve table
/// names against the same schema without qualifying each statement.
pub struct Catalog {
    pool: PgPool,
    schema: String,
}

impl Catalog {
    /// Connect to the database, pinning the search path to `schema`.
    pub async fn connect(database_url: &str, schema: &str) -> LoadResult<Self> {
        if schema.is_empty() {
            return Err(LoadError::Configuration(
                "Target schema name is empty".to_string(),
            ));
        }

        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| LoadError::Configuration(format!("Invalid database URL: {}", e)))?
            .options([("search_path", schema)]);

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| LoadError::Database(format!("Connection failed: {}", e)))?;

        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    /// The underlying connection pool, for bulk-copy operations.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The schema all catalog statements resolve against.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Create the target schema if it does not already exist.
    ///
    /// The schema script only manages tables; on a fresh database the
    /// pinned search path names nothing until this runs.
    pub async fn ensure_schema(&self) -> LoadResult<()> {
        sqlx::query(&create_schema_sql(&self.schema))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                LoadError::Database(format!("Create schema {} failed: {}", self.schema, e))
            })?;
        Ok(())
    }

    /// Execute an opaque SQL script as an ordered statement batch.
    ///
    /// Used for the externally supplied schema and index scripts.
    pub async fn run_script(&self, script: &str) -> LoadResult<()> {
        for statement in script.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| LoadError::Database(format!("Statement failed: {}", e)))?;
            }
        }
        Ok(())
    }

    /// Drop known secondary indexes ahead of a bulk load.
    pub async fn drop_indexes(&self, names: &[String]) -> LoadResult<()> {
        for name in names {
            debug!(index = %name, "Dropping index");
            sqlx::query(&format!("DROP INDEX IF EXISTS {}", name))
                .execute(&self.pool)
                .await
                .map_err(|e| LoadError::Database(format!("Drop index {} failed: {}", name, e)))?;
        }
        Ok(())
    }

    /// Insert region metadata, returning its identifier.
    ///
    /// On a name conflict the statement performs a no-op update so the
    /// existing row's id is still returned; upserting the same region twice
    /// yields the same identifier and exactly one stored row.
    pub async fn upsert_region(&self, region: &Region) -> LoadResult<i32> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO region (
                name,
                grid_spacing,
                max_latitude,
                max_longitude,
                min_latitude,
                min_longitude
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(&region.name)
        .bind(region.grid_spacing)
        .bind(region.bounds.max_latitude)
        .bind(region.bounds.max_longitude)
        .bind(region.bounds.min_latitude)
        .bind(region.bounds.min_longitude)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LoadError::Metadata {
            kind: "region",
            name: region.name.clone(),
            message: e.to_string(),
        })?;

        debug!(region = %region.name, id = id, "Upserted region");
        Ok(id)
    }

    /// Insert document metadata for a region; a no-op if already present.
    pub async fn upsert_document(&self, region_id: i32, name: &str) -> LoadResult<()> {
        sqlx::query(
            r#"
            INSERT INTO document (
                region_id,
                name
            ) VALUES ($1, $2)
            ON CONFLICT (region_id, name) DO NOTHING
            "#,
        )
        .bind(region_id)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| LoadError::Metadata {
            kind: "document",
            name: name.to_string(),
            message: e.to_string(),
        })?;

        debug!(document = %name, region_id = region_id, "Upserted document");
        Ok(())
    }
}

fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", schema)
}
