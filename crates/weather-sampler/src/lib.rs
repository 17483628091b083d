//! Precipitation sampling over a bounding box.
//!
//! Builds a coarse lat/lon sample lattice over the request area, fetches
//! precipitation for each sample point concurrently from the configured
//! weather source, and interpolates the sparse samples onto the dense
//! output raster. A deterministic synthetic generator covers total source
//! outage.

pub mod interpolate;
pub mod sampler;
pub mod source;
pub mod synthetic;

pub use sampler::{GridSampler, SamplePoint};
pub use source::{OpenMeteoClient, WeatherSource};
pub use synthetic::SyntheticWeatherGenerator;
