use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiveSite {
    pub id: Uuid,
    pub name: String,
    pub region: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub max_depth_m: Option<f64>,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSiteRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 100, message = "Region must be 1-100 characters"))]
    pub region: String,

    // Coordinate bounds are checked in validate_coords; the derive macro
    // cannot express a negative bound.
    pub lat: Option<f64>,
    pub lon: Option<f64>,

    #[validate(range(min = 1.0, max = 350.0, message = "Max depth must be 1-350 m"))]
    pub max_depth_m: Option<f64>,

    #[validate(length(max = 2000, message = "Description must be under 2000 characters"))]
    pub description: Option<String>,
}

impl CreateSiteRequest {
    pub fn validate_coords(&self) -> AppResult<()> {
        if let Some(lat) = self.lat {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(AppError::invalid("lat", "Latitude must be -90-90"));
            }
        }
        if let Some(lon) = self.lon {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(AppError::invalid("lon", "Longitude must be -180-180"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct SiteQuery {
    pub region: Option<String>,
    /// Case-insensitive substring match on the site name.
    pub q: Option<String>,
}

/// Site detail with a taste of recent activity there.
#[derive(Debug, Serialize)]
pub struct SiteDetail {
    #[serde(flatten)]
    pub site: DiveSite,
    pub public_dive_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(lat: Option<f64>, lon: Option<f64>) -> CreateSiteRequest {
        CreateSiteRequest {
            name: "Blue Hole".into(),
            region: "Dahab".into(),
            lat,
            lon,
            max_depth_m: Some(120.0),
            description: None,
        }
    }

    #[test]
    fn test_coords_in_bounds() {
        assert!(request(Some(28.57), Some(34.54)).validate_coords().is_ok());
        assert!(request(None, None).validate_coords().is_ok());
    }

    #[test]
    fn test_coords_out_of_bounds() {
        assert!(request(Some(91.0), Some(0.0)).validate_coords().is_err());
        assert!(request(Some(0.0), Some(-181.0)).validate_coords().is_err());
    }
}
