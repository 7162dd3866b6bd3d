//! Per-region bulk load: staging table, COPY stream, merge, cleanup.
//!
//! State machine per region:
//! `Init -> StagingReady -> Streaming -> Merging -> Cleanup -> Done`,
//! aborting to cleanup from any intermediate state on error. The staging
//! table never outlives one region's load; a failed region leaves no
//! partial rows in the permanent table.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgCopyIn, PgPoolCopyExt};
use sqlx::Postgres;
use tracing::{debug, info, warn};

use hazard_common::{ColumnFormat, LoadError, LoadResult, Region};
use storage::Catalog;

use crate::decompress::GzipStream;
use crate::transform::RowTransformer;

/// Staging table name; dropped and recreated for each region.
const STAGING_TABLE: &str = "temp_region_data";

/// Row counts from one region's load.
#[derive(Debug, Clone, Copy)]
pub struct RegionLoadOutcome {
    /// Rows accepted by the copy into staging (the header line the sink
    /// skips is not counted).
    pub rows_copied: u64,
    /// Rows inserted into the permanent table; lower than `rows_copied`
    /// when a prior run already loaded some of the data.
    pub rows_merged: u64,
    /// Rows dropped by the transformer for missing declared values.
    pub rows_skipped: u64,
}

/// Streams one region's compressed CSV source into the permanent table.
pub struct RegionLoader<'a> {
    catalog: &'a Catalog,
    client: &'a reqwest::Client,
    format: &'a ColumnFormat,
}

impl<'a> RegionLoader<'a> {
    pub fn new(catalog: &'a Catalog, client: &'a reqwest::Client, format: &'a ColumnFormat) -> Self {
        Self {
            catalog,
            client,
            format,
        }
    }

    /// Load one region end to end.
    ///
    /// The caller must have upserted the region's metadata first;
    /// `region_id` references that committed row. The staging table is
    /// dropped on every exit path, success or failure.
    pub async fn load(&self, region: &Region, region_id: i32) -> LoadResult<RegionLoadOutcome> {
        self.create_staging().await?;

        let result = self.stream_and_merge(region, region_id).await;

        // Cleanup runs regardless of the streaming/merge outcome.
        if let Err(e) = self.drop_staging().await {
            warn!(region = %region.name, error = %e, "Failed to drop staging table");
        }

        result
    }

    async fn stream_and_merge(
        &self,
        region: &Region,
        region_id: i32,
    ) -> LoadResult<RegionLoadOutcome> {
        let (rows_copied, rows_skipped) = self.copy_source(region).await?;
        debug!(region = %region.name, rows = rows_copied, "Staging copy complete");

        let rows_merged = self.merge(region_id).await?;

        Ok(RegionLoadOutcome {
            rows_copied,
            rows_merged,
            rows_skipped,
        })
    }

    async fn create_staging(&self) -> LoadResult<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {} CASCADE", STAGING_TABLE))
            .await?;
        self.execute(&staging_ddl(self.format)).await
    }

    async fn drop_staging(&self) -> LoadResult<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {} CASCADE", STAGING_TABLE))
            .await
    }

    /// Open the region's remote source and pipe it through decompression
    /// and the row transformer into the staging copy.
    async fn copy_source(&self, region: &Region) -> LoadResult<(u64, u64)> {
        let response = self
            .client
            .get(&region.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LoadError::Stream(format!("Request for {} failed: {}", region.url, e)))?;

        let mut copy = self
            .catalog
            .pool()
            .copy_in_raw(&copy_statement(self.format))
            .await
            .map_err(|e| LoadError::Database(format!("COPY start failed: {}", e)))?;

        let body = response.bytes_stream();
        let streamed = pump(body, &mut copy, self.format).await;

        match streamed {
            Ok(rows_skipped) => {
                let rows_copied = copy
                    .finish()
                    .await
                    .map_err(|e| LoadError::Stream(format!("COPY failed: {}", e)))?;
                Ok((rows_copied, rows_skipped))
            }
            Err(e) => {
                // Abort the sink before surfacing the error; the response
                // body was dropped by pump, closing the source connection.
                if let Err(abort_err) = copy.abort("region load failed").await {
                    warn!(error = %abort_err, "COPY abort failed");
                }
                Err(e)
            }
        }
    }

    /// Set-based transfer from staging into the permanent table.
    ///
    /// The full-tuple conflict target makes re-running the same load a
    /// no-op for rows that are already present.
    async fn merge(&self, region_id: i32) -> LoadResult<u64> {
        let result = sqlx::query(&merge_statement(self.format))
            .bind(region_id)
            .execute(self.catalog.pool())
            .await
            .map_err(|e| LoadError::Merge(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn execute(&self, sql: &str) -> LoadResult<()> {
        sqlx::query(sql)
            .execute(self.catalog.pool())
            .await
            .map_err(|e| LoadError::Database(format!("Statement failed: {}", e)))?;
        Ok(())
    }
}

/// Drive the source through decompression and transformation into the copy
/// sink, returning the transformer's skipped-row count.
///
/// Owns the response body stream so that any error path drops it here,
/// releasing the connection before the error propagates.
async fn pump(
    mut body: impl Stream<Item = reqwest::Result<Bytes>> + Unpin,
    copy: &mut PgCopyIn<PoolConnection<Postgres>>,
    format: &ColumnFormat,
) -> LoadResult<u64> {
    let mut gunzip = GzipStream::new();
    let mut transformer = RowTransformer::new(format);

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| LoadError::Stream(format!("Source read failed: {}", e)))?;
        let decoded = gunzip.push(&chunk)?;
        for row in transformer.consume(&decoded) {
            send_row(copy, row).await?;
        }
    }

    let tail = gunzip.finish()?;
    for row in transformer.consume(&tail) {
        send_row(copy, row).await?;
    }
    if let Some(row) = transformer.finish() {
        send_row(copy, row).await?;
    }

    info!(
        rows = transformer.rows_emitted(),
        skipped = transformer.rows_skipped(),
        "Source stream drained"
    );
    Ok(transformer.rows_skipped())
}

async fn send_row(copy: &mut PgCopyIn<PoolConnection<Postgres>>, row: String) -> LoadResult<()> {
    let mut bytes = row.into_bytes();
    bytes.push(b'\n');
    copy.send(bytes)
        .await
        .map_err(|e| LoadError::Stream(format!("COPY write failed: {}", e)))?;
    Ok(())
}

/// Staging table DDL: loosely typed, nullable landing columns.
fn staging_ddl(format: &ColumnFormat) -> String {
    let mut columns: Vec<String> = format
        .scalar_output_columns()
        .iter()
        .map(|name| format!("{} NUMERIC DEFAULT NULL", name))
        .collect();
    columns.push(format!("{} NUMERIC[] DEFAULT NULL", format.array_column()));

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        STAGING_TABLE,
        columns.join(",\n    ")
    )
}

/// COPY statement for the staging table. The HEADER option makes the sink
/// skip the (reshaped) header row the transformer passes through.
fn copy_statement(format: &ColumnFormat) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH CSV HEADER",
        STAGING_TABLE,
        format.data_columns.join(", ")
    )
}

/// Idempotent staging-to-permanent transfer, qualified by region id.
fn merge_statement(format: &ColumnFormat) -> String {
    let columns = format.data_columns.join(", ");
    format!(
        "INSERT INTO data (region_id, {columns}) \
         SELECT $1, {columns} FROM {STAGING_TABLE} \
         ON CONFLICT (region_id, {columns}) DO NOTHING"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> ColumnFormat {
        ColumnFormat {
            csv_columns: vec![
                "LATITUDE".to_string(),
                "LONGITUDE".to_string(),
                "MAPPED_PGAD".to_string(),
                "MAPPED_S1D".to_string(),
                "MAPPED_SSD".to_string(),
            ],
            scalar_columns: vec![
                "LATITUDE".to_string(),
                "LONGITUDE".to_string(),
                "MAPPED_PGAD".to_string(),
            ],
            spectral_columns: vec!["MAPPED_SSD".to_string(), "MAPPED_S1D".to_string()],
            data_columns: vec![
                "latitude".to_string(),
                "longitude".to_string(),
                "pgad".to_string(),
                "sad".to_string(),
            ],
        }
    }

    #[test]
    fn test_staging_ddl() {
        let ddl = staging_ddl(&format());
        assert!(ddl.starts_with("CREATE TABLE temp_region_data"));
        assert!(ddl.contains("latitude NUMERIC DEFAULT NULL"));
        assert!(ddl.contains("pgad NUMERIC DEFAULT NULL"));
        assert!(ddl.contains("sad NUMERIC[] DEFAULT NULL"));
        // Scalars land before the array column.
        assert!(ddl.find("pgad").unwrap() < ddl.find("sad NUMERIC[]").unwrap());
    }

    #[test]
    fn test_copy_statement() {
        assert_eq!(
            copy_statement(&format()),
            "COPY temp_region_data (latitude, longitude, pgad, sad) FROM STDIN WITH CSV HEADER"
        );
    }

    #[test]
    fn test_merge_statement() {
        let sql = merge_statement(&format());
        assert_eq!(
            sql,
            "INSERT INTO data (region_id, latitude, longitude, pgad, sad) \
             SELECT $1, latitude, longitude, pgad, sad FROM temp_region_data \
             ON CONFLICT (region_id, latitude, longitude, pgad, sad) DO NOTHING"
        );
    }
}
