//! Region and document metadata descriptions.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{LoadError, LoadResult};

/// A named geographic area with a fixed sampling grid and a data source URL.
///
/// The flattened bounds fields match the dataset description JSON:
/// `{"name": ..., "grid_spacing": ..., "min_latitude": ..., ..., "url": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub grid_spacing: f64,
    #[serde(flatten)]
    pub bounds: BoundingBox,
    /// Gzip-compressed CSV source for this region's grid.
    pub url: String,
}

impl Region {
    pub fn validate(&self) -> LoadResult<()> {
        if self.name.is_empty() {
            return Err(LoadError::Configuration("Region name is empty".to_string()));
        }
        if self.grid_spacing <= 0.0 {
            return Err(LoadError::Configuration(format!(
                "Region '{}' has non-positive grid spacing {}",
                self.name, self.grid_spacing
            )));
        }
        if !self.bounds.is_well_formed() {
            return Err(LoadError::Configuration(format!(
                "Region '{}' has inverted bounds",
                self.name
            )));
        }
        if self.url.is_empty() {
            return Err(LoadError::Configuration(format!(
                "Region '{}' has no source URL",
                self.name
            )));
        }
        Ok(())
    }
}

/// A design document associated with one or more regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    /// Names of the regions this document applies to.
    pub regions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> Region {
        Region {
            name: "CONUS".to_string(),
            grid_spacing: 0.01,
            bounds: BoundingBox::new(24.6, 50.0, -125.0, -65.0),
            url: "https://example.com/conus.csv.gz".to_string(),
        }
    }

    #[test]
    fn test_valid_region() {
        assert!(region().validate().is_ok());
    }

    #[test]
    fn test_invalid_grid_spacing() {
        let mut r = region();
        r.grid_spacing = 0.0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_inverted_bounds() {
        let mut r = region();
        r.bounds.min_latitude = 80.0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_region_json_roundtrip() {
        let json = r#"{
            "name": "AK",
            "grid_spacing": 0.05,
            "min_latitude": 48.0,
            "max_latitude": 72.0,
            "min_longitude": -200.0,
            "max_longitude": -125.0,
            "url": "https://example.com/ak.csv.gz"
        }"#;
        let r: Region = serde_json::from_str(json).unwrap();
        assert_eq!(r.name, "AK");
        assert_eq!(r.bounds.max_latitude, 72.0);
        assert!(r.validate().is_ok());
    }
}
