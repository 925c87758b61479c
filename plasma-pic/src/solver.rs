//! Spectral Poisson solver.
//!
//! Solves `-lap(phi) = rho` and `E = -grad(phi)` on the periodic mesh with
//! the finite-difference symbols of the Laplacian and centred gradient, so
//! the discrete field is exactly antisymmetric and a lone particle feels no
//! force from its own charge.

use ndarray::Zip;
use num_complex::Complex64;
use tracing::debug;

use crate::error::{PicError, Result};
use crate::field::Field;
use crate::grid::Grid;
use crate::shape::Stencil;
use crate::spectral::Spectral;
use crate::storage::GridStorage2D;
use crate::vector::{self, Vec3};

/// E and phi from one solve. The 2D electrostatic solve has no Ez.
pub(crate) struct Electrostatic {
    ex: GridStorage2D,
    ey: GridStorage2D,
    phi: GridStorage2D,
}

impl Electrostatic {
    /// E at a continuous position, gathered like [`FieldSolver::e_at`].
    pub(crate) fn e_at(&self, grid: &Grid, x: f64, y: f64) -> Vec3 {
        let (x, y) = grid.wrap(x, y);
        let s = Stencil::new(grid, x, y);
        Vec3::new(s.gather(&self.ex), s.gather(&self.ey), 0.0)
    }

    pub(crate) fn energy(&self, grid: &Grid) -> f64 {
        let sum_sq: f64 = self.ex.iter().zip(self.ey.iter()).map(|(x, y)| x * x + y * y).sum();
        0.5 * sum_sq * grid.cell_area()
    }
}

pub struct FieldSolver {
    grid: Grid,
    spectral: Spectral,
    field: Field,
    magnetic: bool,
}

impl FieldSolver {
    pub fn new(grid: Grid) -> Self {
        FieldSolver {
            grid,
            spectral: Spectral::new(&grid),
            field: Field::new(grid.nx, grid.ny, grid.dx, grid.dy),
            magnetic: false,
        }
    }

    /// Enable magnetic coupling with `b(i, j)` on node `(i, j)`.
    pub fn set_b_field<F: Fn(usize, usize) -> Vec3>(&mut self, b: F) {
        self.field.set_b(b);
        self.magnetic = true;
    }

    pub fn magnetic_enabled(&self) -> bool {
        self.magnetic
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Recompute phi and E from the total charge density.
    pub fn solve(&mut self, density: &GridStorage2D) -> Result<()> {
        let solution = self.compute(density, true)?;
        self.install(solution);
        Ok(())
    }

    pub fn solve_serial(&mut self, density: &GridStorage2D) -> Result<()> {
        let solution = self.compute(density, false)?;
        self.install(solution);
        Ok(())
    }

    /// Solve for phi and E without replacing the current field.
    pub(crate) fn compute(&self, density: &GridStorage2D, parallel: bool) -> Result<Electrostatic> {
        let (nx, ny) = self.grid.shape();
        if density.dim() != (nx, ny) {
            return Err(PicError::SizeMismatch {
                expected: nx * ny,
                actual: density.len(),
            });
        }

        let mut phi_k = self.spectral.forward(density.as_array(), parallel);
        Zip::from(&mut phi_k)
            .and(self.spectral.k2())
            .for_each(|c, &k2| {
                // Mean potential is undetermined on a periodic domain.
                *c = if k2 > 0.0 { *c / k2 } else { Complex64::new(0.0, 0.0) };
            });

        let kappa_x = self.spectral.kappa_x();
        let kappa_y = self.spectral.kappa_y();
        let minus_i = Complex64::new(0.0, -1.0);
        let ex_k = ndarray::Array2::from_shape_fn((nx, ny), |(i, j)| minus_i * kappa_x[i] * phi_k[(i, j)]);
        let ey_k = ndarray::Array2::from_shape_fn((nx, ny), |(i, j)| minus_i * kappa_y[j] * phi_k[(i, j)]);

        Ok(Electrostatic {
            ex: GridStorage2D::from_array(self.spectral.inverse_real(ex_k, parallel)),
            ey: GridStorage2D::from_array(self.spectral.inverse_real(ey_k, parallel)),
            phi: GridStorage2D::from_array(self.spectral.inverse_real(phi_k, parallel)),
        })
    }

    /// Replace E and phi with a solution from [`FieldSolver::compute`].
    pub(crate) fn install(&mut self, solution: Electrostatic) {
        self.field.ex = solution.ex;
        self.field.ey = solution.ey;
        self.field.phi = solution.phi;
        self.field.ez.fill(0.0);
        debug!(
            max_e = self.field.ex.max_abs().max(self.field.ey.max_abs()),
            "field solve complete"
        );
    }

    /// E interpolated at a continuous position with the deposition stencil.
    pub fn e_at(&self, x: f64, y: f64) -> Vec3 {
        let (x, y) = self.grid.wrap(x, y);
        let s = Stencil::new(&self.grid, x, y);
        Vec3::new(s.gather(&self.field.ex), s.gather(&self.field.ey), s.gather(&self.field.ez))
    }

    /// B at a continuous position; zero when magnetic coupling is off.
    pub fn b_at(&self, x: f64, y: f64) -> Vec3 {
        if !self.magnetic {
            return vector::zero();
        }
        let (x, y) = self.grid.wrap(x, y);
        let s = Stencil::new(&self.grid, x, y);
        Vec3::new(s.gather(&self.field.bx), s.gather(&self.field.by), s.gather(&self.field.bz))
    }

    /// E on node `(i, j)`.
    pub fn e_at_node(&self, i: usize, j: usize) -> Result<Vec3> {
        Ok(Vec3::new(
            self.field.ex.get((i, j))?,
            self.field.ey.get((i, j))?,
            self.field.ez.get((i, j))?,
        ))
    }

    pub fn phi_at_node(&self, i: usize, j: usize) -> Result<f64> {
        self.field.phi.get((i, j))
    }

    pub fn electric_energy(&self) -> f64 {
        self.field.electric_energy()
    }
}
