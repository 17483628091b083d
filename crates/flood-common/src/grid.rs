//! Raster grid georeferencing.
//!
//! A [`RasterGrid`] is built once per prediction request from the request
//! bounding box and then shared by every raster in that request: the
//! precipitation field, the aligned terrain, and the risk output all carry
//! identical shape and georeferencing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BoundingBox;

/// Coordinate reference systems understood by the pipeline.
///
/// The sample grid is always geographic WGS84; terrain sources may
/// additionally be in Web Mercator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
}

impl CrsCode {
    /// Map an EPSG integer code (e.g. from a GeoTIFF GeoKey) to a CrsCode.
    pub fn from_epsg(code: u16) -> Option<Self> {
        match code {
            4326 => Some(CrsCode::Epsg4326),
            3857 => Some(CrsCode::Epsg3857),
            _ => None,
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg3857 => "EPSG:3857",
        };
        write!(f, "{}", code)
    }
}

/// Affine mapping between pixel indices and coordinates.
///
/// North-up rasters only: `x_step` is positive, `y_step` negative, and the
/// origin is the outer corner of pixel (0, 0) at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub x_step: f64,
    pub y_step: f64,
}

impl GridTransform {
    /// Transform covering `bbox` with `width` x `height` pixels.
    pub fn from_bounds(bbox: &BoundingBox, width: usize, height: usize) -> Self {
        Self {
            origin_x: bbox.min_lon,
            origin_y: bbox.max_lat,
            x_step: bbox.width() / width as f64,
            y_step: -bbox.height() / height as f64,
        }
    }

    /// Coordinate of a pixel's center.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.x_step,
            self.origin_y + (row as f64 + 0.5) * self.y_step,
        )
    }

    /// Fractional pixel position of a coordinate (col, row).
    ///
    /// Unbounded: callers decide how to treat positions outside the grid.
    pub fn coord_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.x_step - 0.5,
            (y - self.origin_y) / self.y_step - 0.5,
        )
    }
}

/// Shape and georeferencing shared by every raster in one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub transform: GridTransform,
    pub crs: CrsCode,
}

impl RasterGrid {
    /// Build the WGS84 grid for a request bounding box at the output size.
    pub fn from_bbox(bbox: &BoundingBox, width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            transform: GridTransform::from_bounds(bbox, width, height),
            crs: CrsCode::Epsg4326,
        }
    }

    /// Geographic bounds covered by this grid.
    pub fn bounds(&self) -> BoundingBox {
        let t = &self.transform;
        BoundingBox::new(
            t.origin_x,
            t.origin_y + self.height as f64 * t.y_step,
            t.origin_x + self.width as f64 * t.x_step,
            t.origin_y,
        )
    }

    /// Total number of pixels.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Check if the grid has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bbox_bounds_round_trip() {
        let bbox = BoundingBox::new(-74.006, 40.7128, -73.935, 40.758);
        let grid = RasterGrid::from_bbox(&bbox, 512, 512);
        let bounds = grid.bounds();

        assert!((bounds.min_lon - bbox.min_lon).abs() < 1e-9);
        assert!((bounds.min_lat - bbox.min_lat).abs() < 1e-9);
        assert!((bounds.max_lon - bbox.max_lon).abs() < 1e-9);
        assert!((bounds.max_lat - bbox.max_lat).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_center_orientation() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let grid = RasterGrid::from_bbox(&bbox, 10, 10);

        // Row 0 is the northern edge.
        let (x, y) = grid.transform.pixel_center(0, 0);
        assert!((x - 0.5).abs() < 1e-9);
        assert!((y - 9.5).abs() < 1e-9);

        let (x, y) = grid.transform.pixel_center(9, 9);
        assert!((x - 9.5).abs() < 1e-9);
        assert!((y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_coord_to_pixel_inverts_pixel_center() {
        let bbox = BoundingBox::new(-74.006, 40.7128, -73.935, 40.758);
        let grid = RasterGrid::from_bbox(&bbox, 512, 256);

        let (x, y) = grid.transform.pixel_center(100, 37);
        let (col, row) = grid.transform.coord_to_pixel(x, y);
        assert!((col - 100.0).abs() < 1e-6);
        assert!((row - 37.0).abs() < 1e-6);
    }

    #[test]
    fn test_crs_from_epsg() {
        assert_eq!(CrsCode::from_epsg(4326), Some(CrsCode::Epsg4326));
        assert_eq!(CrsCode::from_epsg(3857), Some(CrsCode::Epsg3857));
        assert_eq!(CrsCode::from_epsg(32633), None);
        assert!(CrsCode::Epsg4326.is_geographic());
        assert!(!CrsCode::Epsg3857.is_geographic());
    }
}
