//! Terrain reprojection onto the shared request grid.

use rand::Rng;
use tracing::warn;

use flood_common::{CrsCode, RasterGrid, ScalarRaster};

use crate::geotiff::ElevationDataset;

/// WGS84 semi-major axis, meters (spherical Web Mercator).
const EARTH_RADIUS_M: f64 = 6378137.0;

/// Ceiling of the synthetic elevation field, meters.
const SYNTHETIC_MAX_ELEVATION_M: f32 = 1000.0;

/// Aligns an elevation source onto the exact grid produced by the weather
/// sampler.
pub struct TerrainAligner;

impl TerrainAligner {
    /// Produce an elevation raster with the exact shape and georeferencing
    /// of `target`.
    ///
    /// Terrain unavailability never aborts a prediction: with no source, a
    /// synthetic random field stands in. Callers wanting reproducible
    /// output pass a seeded RNG.
    pub fn align(
        source: Option<&ElevationDataset>,
        target: &RasterGrid,
        rng: &mut impl Rng,
    ) -> ScalarRaster {
        match source {
            Some(dataset) => Self::reproject(dataset, target),
            None => {
                warn!("No terrain source, using synthetic elevation field");
                Self::synthetic(target, rng)
            }
        }
    }

    /// Uniform random elevation of the target shape.
    pub fn synthetic(target: &RasterGrid, rng: &mut impl Rng) -> ScalarRaster {
        let data = (0..target.len())
            .map(|_| rng.gen::<f32>() * SYNTHETIC_MAX_ELEVATION_M)
            .collect();
        ScalarRaster::from_data(target.width, target.height, data)
    }

    /// Reproject the source onto `target` with bilinear resampling.
    ///
    /// The output buffer is allocated at exactly the target grid's shape;
    /// whatever shape a generic reprojection would derive from the source
    /// resolution is irrelevant, the target shape always wins. Target
    /// pixels that map outside the source raster keep 0.
    pub fn reproject(source: &ElevationDataset, target: &RasterGrid) -> ScalarRaster {
        let mut out = ScalarRaster::zeros(target.width, target.height);

        for row in 0..target.height {
            for col in 0..target.width {
                // Target pixel center in WGS84, projected into the
                // source's native coordinates.
                let (lon, lat) = target.transform.pixel_center(col, row);
                let (sx, sy) = match source.crs {
                    CrsCode::Epsg4326 => (lon, lat),
                    CrsCode::Epsg3857 => mercator_forward(lon, lat),
                };

                let (src_col, src_row) = source.transform.coord_to_pixel(sx, sy);
                if let Some(value) = source.sample_bilinear(src_col, src_row) {
                    out.set(col, row, value);
                }
            }
        }

        out
    }
}

/// Forward spherical Web Mercator projection: degrees to meters.
fn mercator_forward(lon: f64, lat: f64) -> (f64, f64) {
    // Clamp away from the poles where the projection diverges.
    let lat = lat.clamp(-85.06, 85.06);
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0)
        .tan()
        .ln();
    (x, y)
}
