//! Wavenumber tables and 2D FFTs over the periodic mesh.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array2, ArrayViewMut1, Axis, Zip};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::grid::Grid;

/// `sin(x) / x` with the removable singularity filled in.
pub fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        x.sin() / x
    }
}

/// FFT-ordered wavenumbers for `n` samples spaced `d` apart: `2 pi i / L`
/// for `i < n/2`, shifted down by `2 pi n / L` above that.
pub fn wavenumbers(n: usize, d: f64) -> Vec<f64> {
    let length = n as f64 * d;
    (0..n)
        .map(|i| {
            let m = if i < n / 2 { i as f64 } else { i as f64 - n as f64 };
            2.0 * PI * m / length
        })
        .collect()
}

/// Eigenvalue of the 3-point second difference: `(k sinc(k d / 2))^2`.
pub fn laplacian_eigenvalue(k: f64, d: f64) -> f64 {
    (k * sinc(0.5 * k * d)).powi(2)
}

/// Multiplier of the centred first difference, `k sinc(k d)`. Zero at the
/// Nyquist wavenumber, where the centred difference cannot see the mode.
pub fn gradient_multiplier(k: f64, d: f64) -> f64 {
    if ((k * d).abs() - PI).abs() < 1e-9 {
        0.0
    } else {
        k * sinc(k * d)
    }
}

/// Cached FFT plans and operator tables for one mesh.
pub struct Spectral {
    nx: usize,
    ny: usize,
    k2: Array2<f64>,    // Laplacian eigenvalue per mode
    kappa_x: Vec<f64>,  // Gradient multiplier along x
    kappa_y: Vec<f64>,  // Gradient multiplier along y
    fft_x: Arc<dyn Fft<f64>>,
    fft_y: Arc<dyn Fft<f64>>,
    ifft_x: Arc<dyn Fft<f64>>,
    ifft_y: Arc<dyn Fft<f64>>,
}

impl Spectral {
    pub fn new(grid: &Grid) -> Self {
        let kx = wavenumbers(grid.nx, grid.dx);
        let ky = wavenumbers(grid.ny, grid.dy);

        let k2 = Array2::from_shape_fn((grid.nx, grid.ny), |(i, j)| {
            laplacian_eigenvalue(kx[i], grid.dx) + laplacian_eigenvalue(ky[j], grid.dy)
        });
        let kappa_x = kx.iter().map(|&k| gradient_multiplier(k, grid.dx)).collect();
        let kappa_y = ky.iter().map(|&k| gradient_multiplier(k, grid.dy)).collect();

        let mut planner = FftPlanner::new();
        Spectral {
            nx: grid.nx,
            ny: grid.ny,
            k2,
            kappa_x,
            kappa_y,
            fft_x: planner.plan_fft_forward(grid.nx),
            fft_y: planner.plan_fft_forward(grid.ny),
            ifft_x: planner.plan_fft_inverse(grid.nx),
            ifft_y: planner.plan_fft_inverse(grid.ny),
        }
    }

    pub fn k2(&self) -> &Array2<f64> {
        &self.k2
    }

    pub fn kappa_x(&self) -> &[f64] {
        &self.kappa_x
    }

    pub fn kappa_y(&self) -> &[f64] {
        &self.kappa_y
    }

    /// Unnormalised forward transform of a real grid.
    pub(crate) fn forward(&self, values: &Array2<f64>, parallel: bool) -> Array2<Complex64> {
        let mut data = values.mapv(|v| Complex64::new(v, 0.0));
        transform_axis(&mut data, Axis(0), &self.fft_x, parallel);
        transform_axis(&mut data, Axis(1), &self.fft_y, parallel);
        data
    }

    /// Inverse transform scaled by `1 / (nx ny)`; keeps the real part.
    pub(crate) fn inverse_real(&self, mut data: Array2<Complex64>, parallel: bool) -> Array2<f64> {
        transform_axis(&mut data, Axis(1), &self.ifft_y, parallel);
        transform_axis(&mut data, Axis(0), &self.ifft_x, parallel);
        let norm = 1.0 / (self.nx * self.ny) as f64;
        data.mapv(|c| c.re * norm)
    }
}

/// Run `fft` over every 1D lane of `data` along `axis`.
fn transform_axis(data: &mut Array2<Complex64>, axis: Axis, fft: &Arc<dyn Fft<f64>>, parallel: bool) {
    let lanes = Zip::from(data.lanes_mut(axis));
    if parallel {
        lanes.par_for_each(|lane| transform_lane(lane, fft));
    } else {
        lanes.for_each(|lane| transform_lane(lane, fft));
    }
}

fn transform_lane(mut lane: ArrayViewMut1<'_, Complex64>, fft: &Arc<dyn Fft<f64>>) {
    match lane.as_slice_mut() {
        Some(slice) => fft.process(slice),
        None => {
            let mut buffer = lane.to_vec();
            fft.process(&mut buffer);
            for (dst, src) in lane.iter_mut().zip(buffer) {
                *dst = src;
            }
        }
    }
}
