//! Sparse-to-dense raster interpolation.
//!
//! The sample lattice is regular, so linear barycentric interpolation
//! reduces to splitting each lattice cell into two triangles and
//! evaluating the plane through the triangle's corners. Pixels outside
//! the lattice hull get 0.

/// Interpolate a `cols` x `rows` sample lattice spanning the full output
/// extent onto a dense `width` x `height` raster.
///
/// `samples` is row-major with row 0 at the northern edge, matching raster
/// orientation. Returns `None` when the lattice is too small to
/// triangulate; callers fall back to bilinear resampling.
pub fn interpolate_lattice(
    samples: &[f32],
    cols: usize,
    rows: usize,
    width: usize,
    height: usize,
) -> Option<Vec<f32>> {
    if cols < 2 || rows < 2 || samples.len() != cols * rows {
        return None;
    }

    let mut output = vec![0.0f32; width * height];

    // Lattice nodes sit on the bbox edges, so pixel centers map into
    // [0, cols-1] x [0, rows-1] fractional lattice coordinates.
    let u_scale = (cols - 1) as f32 / width as f32;
    let v_scale = (rows - 1) as f32 / height as f32;

    for y in 0..height {
        let v = (y as f32 + 0.5) * v_scale;
        for x in 0..width {
            let u = (x as f32 + 0.5) * u_scale;
            output[y * width + x] = sample_triangulated(samples, cols, rows, u, v);
        }
    }

    Some(output)
}

/// Evaluate the triangulated lattice at fractional coordinates (u, v).
fn sample_triangulated(samples: &[f32], cols: usize, rows: usize, u: f32, v: f32) -> f32 {
    // Outside the convex hull of the samples: 0, like the reference
    // interpolation's fill value.
    if u < 0.0 || v < 0.0 || u > (cols - 1) as f32 || v > (rows - 1) as f32 {
        return 0.0;
    }

    let i = (u.floor() as usize).min(cols - 2);
    let j = (v.floor() as usize).min(rows - 2);
    let fu = u - i as f32;
    let fv = v - j as f32;

    let v00 = samples[j * cols + i];
    let v10 = samples[j * cols + i + 1];
    let v01 = samples[(j + 1) * cols + i];
    let v11 = samples[(j + 1) * cols + i + 1];

    // Each cell splits along the (0,0)-(1,1) antidiagonal into two
    // triangles; interpolation is linear on each.
    if fu + fv <= 1.0 {
        v00 + fu * (v10 - v00) + fv * (v01 - v00)
    } else {
        v11 + (1.0 - fu) * (v01 - v11) + (1.0 - fv) * (v10 - v11)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_lattice_interpolates_constant() {
        let samples = vec![3.0; 9];
        let dense = interpolate_lattice(&samples, 3, 3, 16, 16).unwrap();
        assert!(dense.iter().all(|&v| (v - 3.0).abs() < 1e-5));
    }

    #[test]
    fn test_linear_gradient_preserved() {
        // Lattice values equal to their column index form a plane; linear
        // interpolation must reproduce it exactly at every pixel.
        let samples: Vec<f32> = (0..3)
            .flat_map(|_| (0..3).map(|c| c as f32))
            .collect();
        let width = 12;
        let dense = interpolate_lattice(&samples, 3, 3, width, 12).unwrap();

        for y in 0..12 {
            for x in 0..width {
                let expected = (x as f32 + 0.5) * 2.0 / width as f32;
                let got = dense[y * width + x];
                assert!(
                    (got - expected).abs() < 1e-5,
                    "pixel ({}, {}): {} != {}",
                    x,
                    y,
                    got,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_degenerate_lattice_returns_none() {
        assert!(interpolate_lattice(&[1.0, 2.0], 2, 1, 8, 8).is_none());
        assert!(interpolate_lattice(&[1.0], 1, 1, 8, 8).is_none());
        assert!(interpolate_lattice(&[1.0, 2.0, 3.0], 2, 2, 8, 8).is_none());
    }

    #[test]
    fn test_triangulated_cell_corners() {
        // 2x2 lattice, distinct corners.
        let samples = vec![0.0, 1.0, 2.0, 3.0];
        assert!((sample_triangulated(&samples, 2, 2, 0.0, 0.0) - 0.0).abs() < 1e-6);
        assert!((sample_triangulated(&samples, 2, 2, 1.0, 0.0) - 1.0).abs() < 1e-6);
        assert!((sample_triangulated(&samples, 2, 2, 0.0, 1.0) - 2.0).abs() < 1e-6);
        assert!((sample_triangulated(&samples, 2, 2, 1.0, 1.0) - 3.0).abs() < 1e-6);
        // Outside the hull: fill value 0.
        assert_eq!(sample_triangulated(&samples, 2, 2, -0.1, 0.5), 0.0);
        assert_eq!(sample_triangulated(&samples, 2, 2, 0.5, 1.5), 0.0);
    }
}
