//! Shallow-water flood simulation.
//!
//! The highest-precedence estimator: a coarse triangular mesh over the
//! bounding box, rainfall injected as a constant flux, and water routed
//! downhill under Manning friction until the simulated hour is up. The
//! exact numerics are intentionally simpler than a full research solver;
//! what matters to the pipeline is the orchestration contract: same
//! inputs, same grid out, and any internal failure surfaces as
//! `SimulationFailure` so the orchestrator can fall through.

use std::collections::HashMap;

use tracing::{debug, info};

use flood_common::{BoundingBox, FloodError, FloodResult, ScalarRaster};

use crate::estimator::RiskEstimator;

/// Manning roughness coefficient applied uniformly to the domain.
const MANNING_N: f64 = 0.03;

/// Total simulated time, seconds.
const SIM_DURATION_S: f64 = 3600.0;

/// Outer evolve step; state is checked and logged at each yield.
const YIELD_STEP_S: f64 = 600.0;

/// Inner integration step, seconds.
const SUBSTEP_S: f64 = 10.0;

/// Mesh vertex count bounds per axis.
const MIN_MESH_SIDE: usize = 20;
const MAX_MESH_SIDE: usize = 50;

/// mm/h of rainfall expressed as m/s of water column growth.
const MM_PER_HOUR_TO_M_PER_S: f64 = 1.0 / (1000.0 * 3600.0);

/// Meters per degree of latitude, and of longitude at the equator.
const M_PER_DEG_LAT: f64 = 110_540.0;
const M_PER_DEG_LON: f64 = 111_320.0;

/// Physics-based risk estimation via a simplified shallow-water evolve.
pub struct PhysicsSimulation;

/// A triangle cell of the simulation mesh.
struct Cell {
    centroid: (f64, f64),
    /// Bed elevation in solver convention: negative above sea level.
    bed: f64,
    area: f64,
}

/// An internal edge between two cells.
struct Edge {
    cells: (usize, usize),
    length: f64,
    /// Centroid-to-centroid distance.
    span: f64,
}

struct Mesh {
    nx: usize,
    ny: usize,
    cells: Vec<Cell>,
    edges: Vec<Edge>,
    /// Cells adjacent to each vertex, for depth readback.
    vertex_cells: Vec<Vec<usize>>,
}

impl RiskEstimator for PhysicsSimulation {
    fn name(&self) -> &'static str {
        "physics-simulation"
    }

    fn estimate(
        &self,
        precipitation: &ScalarRaster,
        terrain: &ScalarRaster,
        bbox: &BoundingBox,
    ) -> FloodResult<ScalarRaster> {
        let (height, width) = precipitation.shape();
        if width < 2 || height < 2 {
            return Err(FloodError::SimulationFailure(format!(
                "raster {}x{} too small to mesh",
                width, height
            )));
        }

        // Mesh resolution adapts to raster size within fixed bounds.
        let nx = (width / 10).clamp(MIN_MESH_SIDE, MAX_MESH_SIDE);
        let ny = (height / 10).clamp(MIN_MESH_SIDE, MAX_MESH_SIDE);

        let mesh = Mesh::build(bbox, terrain, nx, ny)?;
        debug!(
            cells = mesh.cells.len(),
            edges = mesh.edges.len(),
            "Simulation mesh built"
        );

        // Rainfall enters as a constant flux: the worst precipitation rate
        // observed anywhere in the window, applied domain-wide.
        let max_precip = precipitation.max() as f64;
        let rain_rate = max_precip * MM_PER_HOUR_TO_M_PER_S;

        let depths = mesh.evolve(rain_rate)?;
        let max_depth = depths.iter().copied().fold(0.0f64, f64::max);
        info!(max_depth_m = max_depth, "Simulation complete");

        // Cell depths -> vertex lattice -> output raster.
        let lattice = mesh.depths_to_lattice(&depths);
        let out = lattice.resampled(width, height);

        // Relative, not absolute: normalize by this run's own maximum.
        if max_depth > 0.0 {
            Ok(out.map(|v| (v as f64 / max_depth) as f32))
        } else {
            Ok(ScalarRaster::zeros(width, height))
        }
    }
}

impl Mesh {
    /// Build the triangulated lattice with terrain as bed elevation.
    fn build(
        bbox: &BoundingBox,
        terrain: &ScalarRaster,
        nx: usize,
        ny: usize,
    ) -> FloodResult<Self> {
        // Work in local meters so Manning slopes are physical.
        let mid_lat = (bbox.min_lat + bbox.max_lat) / 2.0;
        let width_m = bbox.width() * M_PER_DEG_LON * mid_lat.to_radians().cos().abs().max(0.01);
        let height_m = bbox.height() * M_PER_DEG_LAT;
        if !(width_m.is_finite() && height_m.is_finite()) || width_m <= 0.0 || height_m <= 0.0 {
            return Err(FloodError::SimulationFailure(
                "degenerate domain extent".into(),
            ));
        }

        let dx = width_m / (nx - 1) as f64;
        let dy = height_m / (ny - 1) as f64;

        // Terrain at mesh vertices, row 0 north like every raster.
        let vertex_terrain = terrain.resampled(nx, ny);

        let vertex_pos = |i: usize, j: usize| (i as f64 * dx, j as f64 * dy);
        // Solver convention: negative is above sea level.
        let vertex_bed =
            |i: usize, j: usize| -> f64 { -(vertex_terrain.get(i, j) as f64) };

        let mut cells = Vec::with_capacity(2 * (nx - 1) * (ny - 1));
        let mut edge_map: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        let mut vertex_cells = vec![Vec::new(); nx * ny];

        let vid = |i: usize, j: usize| j * nx + i;
        for j in 0..ny - 1 {
            for i in 0..nx - 1 {
                // Split each quad along its antidiagonal.
                let quads = [
                    [vid(i, j), vid(i + 1, j), vid(i, j + 1)],
                    [vid(i + 1, j), vid(i + 1, j + 1), vid(i, j + 1)],
                ];
                for vertices in quads {
                    let cell_idx = cells.len();
                    let mut cx = 0.0;
                    let mut cy = 0.0;
                    let mut bed = 0.0;
                    for &v in &vertices {
                        let (x, y) = vertex_pos(v % nx, v / nx);
                        cx += x;
                        cy += y;
                        bed += vertex_bed(v % nx, v / nx);
                        vertex_cells[v].push(cell_idx);
                    }
                    cells.push(Cell {
                        centroid: (cx / 3.0, cy / 3.0),
                        bed: bed / 3.0,
                        area: dx * dy / 2.0,
                    });

                    for e in 0..3 {
                        let a = vertices[e];
                        let b = vertices[(e + 1) % 3];
                        let key = (a.min(b), a.max(b));
                        edge_map.entry(key).or_default().push(cell_idx);
                    }
                }
            }
        }

        // Interior edges connect exactly two cells; boundary edges have
        // one owner and act as reflective (no-flow) walls by omission.
        let mut edges = Vec::new();
        for ((a, b), owners) in edge_map {
            if owners.len() != 2 {
                continue;
            }
            let (ca, cb) = (owners[0], owners[1]);
            let (ax, ay) = vertex_pos(a % nx, a / nx);
            let (bx, by) = vertex_pos(b % nx, b / nx);
            let length = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
            let (cx0, cy0) = cells[ca].centroid;
            let (cx1, cy1) = cells[cb].centroid;
            let span = ((cx0 - cx1).powi(2) + (cy0 - cy1).powi(2))
                .sqrt()
                .max(1e-6);
            edges.push(Edge {
                cells: (ca, cb),
                length,
                span,
            });
        }

        Ok(Self {
            nx,
            ny,
            cells,
            edges,
            vertex_cells,
        })
    }

    /// Evolve the water state and return per-cell depths in meters.
    fn evolve(&self, rain_rate: f64) -> FloodResult<Vec<f64>> {
        // Dry start: stage sits on the bed, so per-cell depth is zero.
        let mut depth = vec![0.0f64; self.cells.len()];
        let mut time = 0.0;

        while time < SIM_DURATION_S {
            let yield_end = (time + YIELD_STEP_S).min(SIM_DURATION_S);
            while time < yield_end {
                let dt = SUBSTEP_S.min(yield_end - time);

                // Manning flow across each interior edge, upwinded on the
                // free-surface gradient. Bed is stored negated, so the
                // real surface elevation is depth minus bed.
                for edge in &self.edges {
                    let (a, b) = edge.cells;
                    let grad =
                        (depth[a] - self.cells[a].bed) - (depth[b] - self.cells[b].bed);
                    if grad.abs() < 1e-12 {
                        continue;
                    }
                    let (up, down) = if grad > 0.0 { (a, b) } else { (b, a) };
                    let depth_up = depth[up];
                    if depth_up <= 0.0 {
                        continue;
                    }

                    let slope = grad.abs() / edge.span;
                    let velocity = depth_up.powf(2.0 / 3.0) * slope.sqrt() / MANNING_N;
                    let mut volume = velocity * depth_up * edge.length * dt;
                    // A step can never move more water than the upstream
                    // cell holds across its three edges combined.
                    volume = volume.min(depth_up * self.cells[up].area / 6.0);

                    depth[up] -= volume / self.cells[up].area;
                    depth[down] += volume / self.cells[down].area;
                }

                for d in depth.iter_mut() {
                    *d = (*d + rain_rate * dt).max(0.0);
                }
                time += dt;
            }

            if depth.iter().any(|d| !d.is_finite()) {
                return Err(FloodError::SimulationFailure(format!(
                    "solver diverged at t={}s",
                    time
                )));
            }
            debug!(t = time, "Simulation yield step");
        }

        // Equivalent to max(stage - elevation, 0) on the stored fields.
        Ok(depth)
    }

    /// Average cell-centroid depths onto the vertex lattice.
    fn depths_to_lattice(&self, depths: &[f64]) -> ScalarRaster {
        let data = self
            .vertex_cells
            .iter()
            .map(|cells| {
                if cells.is_empty() {
                    0.0
                } else {
                    let sum: f64 = cells.iter().map(|&c| depths[c]).sum();
                    (sum / cells.len() as f64) as f32
                }
            })
            .collect();
        ScalarRaster::from_data(self.nx, self.ny, data)
    }
}
