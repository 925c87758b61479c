use crate::storage::GridStorage2D;
use crate::vector::Vec3;

/// Mesh fields. The electric components and the potential are overwritten by
/// every solve; the magnetic components hold the (static) background field.
#[derive(Debug, Clone)]
pub struct Field {
    pub ex: GridStorage2D,
    pub ey: GridStorage2D,
    pub ez: GridStorage2D,
    pub phi: GridStorage2D,
    pub bx: GridStorage2D,
    pub by: GridStorage2D,
    pub bz: GridStorage2D,
    pub dx: f64,
    pub dy: f64,
}

impl Field {
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64) -> Self {
        Field {
            ex: GridStorage2D::zeros((nx, ny)),
            ey: GridStorage2D::zeros((nx, ny)),
            ez: GridStorage2D::zeros((nx, ny)),
            phi: GridStorage2D::zeros((nx, ny)),
            bx: GridStorage2D::zeros((nx, ny)),
            by: GridStorage2D::zeros((nx, ny)),
            bz: GridStorage2D::zeros((nx, ny)),
            dx,
            dy,
        }
    }

    /// Set B on every node from `b(i, j)`.
    pub fn set_b<F: Fn(usize, usize) -> Vec3>(&mut self, b: F) {
        let (nx, ny) = self.bz.dim();
        for i in 0..nx {
            for j in 0..ny {
                let v = b(i, j);
                self.bx[(i, j)] = v.x;
                self.by[(i, j)] = v.y;
                self.bz[(i, j)] = v.z;
            }
        }
    }

    /// Electrostatic energy `1/2 sum |E|^2 dx dy`.
    pub fn electric_energy(&self) -> f64 {
        let sum_sq: f64 = self
            .ex
            .iter()
            .zip(self.ey.iter())
            .zip(self.ez.iter())
            .map(|((x, y), z)| x * x + y * y + z * z)
            .sum();
        0.5 * sum_sq * self.dx * self.dy
    }

    /// Name of the first component holding a NaN or infinity.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        [
            ("ex", &self.ex),
            ("ey", &self.ey),
            ("ez", &self.ez),
            ("phi", &self.phi),
            ("bx", &self.bx),
            ("by", &self.by),
            ("bz", &self.bz),
        ]
        .into_iter()
        .find(|(_, grid)| !grid.all_finite())
        .map(|(name, _)| name)
    }
}
