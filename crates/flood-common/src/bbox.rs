//! Geographic bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::error::FloodError;

/// A geographic bounding box in WGS84 degrees.
///
/// Longitudes are in [-180, 180], latitudes in [-90, 90]. Every pipeline
/// stage consumes the same validated box, so validation happens once at
/// the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Check the WGS84 range and ordering invariants.
    pub fn validate(&self) -> Result<(), FloodError> {
        for (name, lon) in [("min_lon", self.min_lon), ("max_lon", self.max_lon)] {
            if !(-180.0..=180.0).contains(&lon) || !lon.is_finite() {
                return Err(FloodError::InvalidBbox(format!(
                    "{} out of range [-180, 180]: {}",
                    name, lon
                )));
            }
        }
        for (name, lat) in [("min_lat", self.min_lat), ("max_lat", self.max_lat)] {
            if !(-90.0..=90.0).contains(&lat) || !lat.is_finite() {
                return Err(FloodError::InvalidBbox(format!(
                    "{} out of range [-90, 90]: {}",
                    name, lat
                )));
            }
        }
        if self.min_lon >= self.max_lon {
            return Err(FloodError::InvalidBbox(format!(
                "min_lon {} must be < max_lon {}",
                self.min_lon, self.max_lon
            )));
        }
        if self.min_lat >= self.max_lat {
            return Err(FloodError::InvalidBbox(format!(
                "min_lat {} must be < max_lat {}",
                self.min_lat, self.max_lat
            )));
        }
        Ok(())
    }

    /// Width of the bounding box in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height of the bounding box in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Largest angular span of the box, in degrees.
    ///
    /// Drives the adaptive weather sample count: bigger areas get more
    /// sample points.
    pub fn angular_span(&self) -> f64 {
        self.width().max(self.height())
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}
