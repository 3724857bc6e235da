use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Drop-off address of a delivery. Never mutated once stored; `area` is the
/// partition key used by batch formation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub id: Uuid,
    pub region: String,
    pub area: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGeoLocation {
    pub region: String,
    pub area: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl NewGeoLocation {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.area.trim().is_empty() {
            return Err(AppError::Validation("area cannot be empty".to_string()));
        }
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AppError::Validation(format!(
                "latitude {} out of range",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AppError::Validation(format!(
                "longitude {} out of range",
                self.longitude
            )));
        }
        Ok(())
    }

    pub fn into_location(self) -> GeoLocation {
        GeoLocation {
            id: Uuid::new_v4(),
            region: self.region,
            area: self.area,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            updated_at: Utc::now(),
        }
    }
}

impl GeoLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}
