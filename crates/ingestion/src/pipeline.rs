//! Drives metadata upserts and per-region bulk loads in a fixed order.
//!
//! Regions are processed strictly sequentially: region N+1 never starts
//! until region N's merge and cleanup have resolved. This bounds peak load
//! on the remote sources and the database's copy path, and makes every
//! failure attributable to exactly one region.

use std::collections::HashMap;
use std::future::Future;

use tracing::{error, info, instrument};

use hazard_common::{LoadError, LoadResult, Region};
use storage::Catalog;

use crate::config::{DatasetConfig, PipelineConfig, RunMode};
use crate::loader::{RegionLoadOutcome, RegionLoader};

/// Row counts for one successfully loaded region.
#[derive(Debug, Clone)]
pub struct RegionReport {
    pub name: String,
    pub rows_copied: u64,
    pub rows_merged: u64,
    pub rows_skipped: u64,
}

/// One region that failed, and why. Earlier regions stay committed and
/// later regions are still attempted.
#[derive(Debug, Clone)]
pub struct RegionFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub loaded: Vec<RegionReport>,
    pub failed: Vec<RegionFailure>,
}

impl LoadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    fn record_failure(&mut self, name: &str, reason: String) {
        self.failed.push(RegionFailure {
            name: name.to_string(),
            reason,
        });
    }
}

/// Sequences one dataset's load: schema/index lifecycle, metadata upserts,
/// then per-region bulk loads in the configured order.
pub struct LoadPipeline {
    catalog: Catalog,
    client: reqwest::Client,
    dataset: DatasetConfig,
    config: PipelineConfig,
}

impl LoadPipeline {
    pub fn new(
        catalog: Catalog,
        dataset: DatasetConfig,
        config: PipelineConfig,
    ) -> LoadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| LoadError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            catalog,
            client,
            dataset,
            config,
        })
    }

    /// Run the full load. Configuration errors abort before any side
    /// effects; region-level failures are collected into the summary.
    #[instrument(skip(self), fields(mode = ?self.config.mode))]
    pub async fn run(&self) -> LoadResult<LoadSummary> {
        self.dataset.validate()?;

        match self.config.mode {
            RunMode::FullReload => {
                info!("Recreating schema");
                // A fresh database has no target schema yet; the script
                // itself only manages tables.
                self.catalog.ensure_schema().await?;
                self.catalog.run_script(&self.config.schema_sql).await?;
            }
            RunMode::MissingOnly => {
                info!("Dropping secondary indexes for bulk load");
                self.catalog
                    .drop_indexes(&self.config.secondary_indexes)
                    .await?;
            }
        }

        let mut summary = LoadSummary::default();

        // All region ids are cached before any document or data work; the
        // cache is read-only from here on.
        let region_ids = self.upsert_regions(&mut summary).await;
        self.upsert_documents(&region_ids).await;
        self.load_regions(&region_ids, &mut summary).await;

        // Indexes are rebuilt even when some regions failed; the loaded
        // regions are committed and need to be queryable.
        info!("Rebuilding indexes");
        self.catalog.run_script(&self.config.index_sql).await?;

        info!(
            loaded = summary.loaded.len(),
            failed = summary.failed.len(),
            "Load complete"
        );
        Ok(summary)
    }

    async fn upsert_regions(&self, summary: &mut LoadSummary) -> HashMap<String, i32> {
        let mut region_ids = HashMap::new();

        for region in &self.dataset.regions {
            match self.catalog.upsert_region(region).await {
                Ok(id) => {
                    region_ids.insert(region.name.clone(), id);
                }
                Err(e) => {
                    // No foreign key to reference; this region's data load
                    // is skipped, siblings are unaffected.
                    error!(region = %region.name, error = %e, "Region upsert failed");
                    summary.record_failure(&region.name, e.to_string());
                }
            }
        }

        region_ids
    }

    /// Document metadata is best-effort: a failed pair is reported and the
    /// remaining pairs still run.
    async fn upsert_documents(&self, region_ids: &HashMap<String, i32>) {
        for document in &self.dataset.documents {
            for region_name in &document.regions {
                let Some(&region_id) = region_ids.get(region_name) else {
                    error!(
                        document = %document.name,
                        region = %region_name,
                        "Skipping document for unknown or failed region"
                    );
                    continue;
                };

                if let Err(e) = self.catalog.upsert_document(region_id, &document.name).await {
                    error!(document = %document.name, error = %e, "Document upsert failed");
                }
            }
        }
    }

    async fn load_regions(&self, region_ids: &HashMap<String, i32>, summary: &mut LoadSummary) {
        let loader = RegionLoader::new(&self.catalog, &self.client, &self.dataset.format);
        drive_regions(&self.dataset.regions, region_ids, summary, |region, id| {
            loader.load(region, id)
        })
        .await;
    }
}

/// Walk the regions in declared order, loading each through `load`.
///
/// A failed region is recorded in the summary and the walk continues;
/// earlier regions stay committed and later regions are still attempted.
async fn drive_regions<'a, F, Fut>(
    regions: &'a [Region],
    region_ids: &HashMap<String, i32>,
    summary: &mut LoadSummary,
    mut load: F,
) where
    F: FnMut(&'a Region, i32) -> Fut,
    Fut: Future<Output = LoadResult<RegionLoadOutcome>>,
{
    for region in regions {
        // Regions whose metadata failed were already recorded.
        let Some(&region_id) = region_ids.get(&region.name) else {
            continue;
        };

        info!(region = %region.name, url = %region.url, "Loading region data");
        match load(region, region_id).await {
            Ok(RegionLoadOutcome {
                rows_copied,
                rows_merged,
                rows_skipped,
            }) => {
                info!(
                    region = %region.name,
                    rows_copied = rows_copied,
                    rows_merged = rows_merged,
                    rows_skipped = rows_skipped,
                    "Region loaded"
                );
                summary.loaded.push(RegionReport {
                    name: region.name.clone(),
                    rows_copied,
                    rows_merged,
                    rows_skipped,
                });
            }
            Err(e) => {
                error!(region = %region.name, error = %e, "Region load failed");
                summary.record_failure(&region.name, e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use hazard_common::BoundingBox;

    fn region(name: &str) -> Region {
        Region {
            name: name.to_string(),
            grid_spacing: 0.01,
            bounds: BoundingBox::new(24.6, 50.0, -125.0, -65.0),
            url: format!("https://example.com/{}.csv.gz", name),
        }
    }

    fn outcome() -> RegionLoadOutcome {
        RegionLoadOutcome {
            rows_copied: 10,
            rows_merged: 10,
            rows_skipped: 0,
        }
    }

    #[test]
    fn test_failed_region_does_not_stop_later_regions() {
        let regions = vec![region("CONUS"), region("AK"), region("HI")];
        let region_ids: HashMap<String, i32> = [("CONUS", 1), ("AK", 2), ("HI", 3)]
            .into_iter()
            .map(|(name, id)| (name.to_string(), id))
            .collect();

        let mut summary = LoadSummary::default();
        let mut attempted = Vec::new();

        block_on(drive_regions(
            &regions,
            &region_ids,
            &mut summary,
            |region, _id| {
                attempted.push(region.name.clone());
                let fail = region.name == "AK";
                async move {
                    if fail {
                        Err(LoadError::Stream("connection reset".to_string()))
                    } else {
                        Ok(outcome())
                    }
                }
            },
        ));

        // The middle region's failure leaves its neighbors alone.
        assert_eq!(attempted, ["CONUS", "AK", "HI"]);
        let loaded: Vec<&str> = summary.loaded.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(loaded, ["CONUS", "HI"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].name, "AK");
    }

    #[test]
    fn test_region_without_metadata_not_attempted() {
        let regions = vec![region("CONUS"), region("AK")];
        // AK's metadata upsert failed earlier; it has no cached id.
        let region_ids: HashMap<String, i32> =
            [("CONUS".to_string(), 1)].into_iter().collect();

        let mut summary = LoadSummary::default();
        let mut attempted = Vec::new();

        block_on(drive_regions(
            &regions,
            &region_ids,
            &mut summary,
            |region, _id| {
                attempted.push(region.name.clone());
                async { Ok(outcome()) }
            },
        ));

        assert_eq!(attempted, ["CONUS"]);
        assert_eq!(summary.loaded.len(), 1);
    }

    #[test]
    fn test_summary_success() {
        let summary = LoadSummary::default();
        assert!(summary.all_succeeded());
    }

    #[test]
    fn test_summary_records_failures() {
        let mut summary = LoadSummary::default();
        summary.loaded.push(RegionReport {
            name: "CONUS".to_string(),
            rows_copied: 10,
            rows_merged: 10,
            rows_skipped: 0,
        });
        summary.record_failure("AK", "Stream error: connection reset".to_string());

        assert!(!summary.all_succeeded());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].name, "AK");
        // An earlier region's success is unaffected by a later failure.
        assert_eq!(summary.loaded[0].name, "CONUS");
    }
}
