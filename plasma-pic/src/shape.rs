//! First-order cloud-in-cell weighting.
//!
//! Deposition and interpolation both go through [`Stencil`], so a particle
//! scatters charge with exactly the weights it later gathers field with.

use crate::grid::Grid;
use crate::storage::GridStorage2D;

/// The four nodes surrounding a point and their bilinear area weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    pub nodes: [(usize, usize); 4],
    pub weights: [f64; 4],
}

impl Stencil {
    /// Stencil for a point already inside the periodic domain.
    pub fn new(grid: &Grid, x: f64, y: f64) -> Self {
        let sx = x / grid.dx;
        let sy = y / grid.dy;
        let i = (sx.floor() as usize).min(grid.nx - 1);
        let j = (sy.floor() as usize).min(grid.ny - 1);
        let hx = (sx - i as f64).clamp(0.0, 1.0);
        let hy = (sy - j as f64).clamp(0.0, 1.0);
        let ip = (i + 1) % grid.nx;
        let jp = (j + 1) % grid.ny;

        Stencil {
            nodes: [(i, j), (ip, j), (i, jp), (ip, jp)],
            weights: [
                (1.0 - hx) * (1.0 - hy),
                hx * (1.0 - hy),
                (1.0 - hx) * hy,
                hx * hy,
            ],
        }
    }

    /// Add `amount` to the grid split over the four nodes.
    pub fn scatter(&self, grid: &mut GridStorage2D, amount: f64) {
        for (node, w) in self.nodes.iter().zip(self.weights.iter()) {
            grid[*node] += amount * w;
        }
    }

    /// Weighted average of the grid over the four nodes.
    pub fn gather(&self, grid: &GridStorage2D) -> f64 {
        self.nodes
            .iter()
            .zip(self.weights.iter())
            .map(|(node, w)| grid[*node] * w)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_sum_to_one() {
        let grid = Grid::new(8, 8, 0.5, 0.25).unwrap();
        for &(x, y) in &[(0.0, 0.0), (1.3, 0.7), (3.99, 1.99), (2.25, 0.125)] {
            let s = Stencil::new(&grid, x, y);
            assert_relative_eq!(s.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
            assert!(s.weights.iter().all(|w| *w >= 0.0));
        }
    }

    #[test]
    fn node_point_takes_all_weight() {
        let grid = Grid::new(8, 8, 1.0, 1.0).unwrap();
        let s = Stencil::new(&grid, 3.0, 5.0);
        assert_eq!(s.nodes[0], (3, 5));
        assert_relative_eq!(s.weights[0], 1.0);
    }

    #[test]
    fn last_cell_wraps_to_first_node() {
        let grid = Grid::new(4, 4, 1.0, 1.0).unwrap();
        let s = Stencil::new(&grid, 3.75, 3.5);
        assert_eq!(s.nodes[3], (0, 0));
        assert_relative_eq!(s.weights[1], 0.75 * 0.5);
    }

    #[test]
    fn gather_reads_back_linear_profile() {
        let grid = Grid::new(8, 8, 1.0, 1.0).unwrap();
        let mut values = GridStorage2D::zeros(grid.shape());
        for i in 0..8 {
            for j in 0..8 {
                values[(i, j)] = i as f64 + 2.0 * j as f64;
            }
        }
        let s = Stencil::new(&grid, 2.25, 4.5);
        assert_relative_eq!(s.gather(&values), 2.25 + 9.0, epsilon = 1e-12);

        let mut deposit = GridStorage2D::zeros(grid.shape());
        s.scatter(&mut deposit, 2.0);
        assert_relative_eq!(deposit.sum(), 2.0, epsilon = 1e-14);
    }
}
