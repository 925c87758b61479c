use crate::error::{PicError, Result};

/// Periodic rectangular mesh. Node `(i, j)` sits at `(i*dx, j*dy)` and the
/// domain is `[0, nx*dx) x [0, ny*dy)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub nx: usize, // Number of nodes in x
    pub ny: usize, // Number of nodes in y
    pub dx: f64,   // Node spacing in x
    pub dy: f64,   // Node spacing in y
}

impl Grid {
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64) -> Result<Self> {
        if nx < 2 || ny < 2 {
            return Err(PicError::Config(format!(
                "mesh needs at least 2 nodes per axis (nx={}, ny={})",
                nx, ny
            )));
        }
        if !(dx > 0.0 && dx.is_finite()) || !(dy > 0.0 && dy.is_finite()) {
            return Err(PicError::Config(format!(
                "mesh spacing must be positive and finite (dx={}, dy={})",
                dx, dy
            )));
        }
        Ok(Grid { nx, ny, dx, dy })
    }

    pub fn x_coord(&self, i: usize) -> f64 {
        self.dx * (i as f64)
    }

    pub fn y_coord(&self, j: usize) -> f64 {
        self.dy * (j as f64)
    }

    /// Domain length in x. Periodic, so it spans all `nx` cells.
    pub fn width(&self) -> f64 {
        self.nx as f64 * self.dx
    }

    pub fn height(&self) -> f64 {
        self.ny as f64 * self.dy
    }

    pub fn cell_area(&self) -> f64 {
        self.dx * self.dy
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..self.width()).contains(&x) && (0.0..self.height()).contains(&y)
    }

    /// Map a coordinate into `[0, width)` x `[0, height)`.
    pub fn wrap(&self, x: f64, y: f64) -> (f64, f64) {
        (wrap_coord(x, self.width()), wrap_coord(y, self.height()))
    }
}

/// `rem_euclid` can round up to exactly `length` for tiny negative inputs.
fn wrap_coord(x: f64, length: f64) -> f64 {
    let w = x.rem_euclid(length);
    if w >= length {
        0.0
    } else {
        w
    }
}
