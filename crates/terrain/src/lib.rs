//! Terrain elevation loading and grid alignment.
//!
//! Reads single-band GeoTIFF elevation rasters and reprojects them onto
//! the exact grid produced by the weather sampler, so every raster in a
//! prediction run shares one shape and georeferencing.

pub mod align;
pub mod geotiff;

pub use align::TerrainAligner;
pub use geotiff::ElevationDataset;
