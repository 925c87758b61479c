//! Dense fixed-size grid containers.
//!
//! One rank-generic type backs both the 1D columns (phase-space extracts) and
//! the 2D mesh quantities (densities, fields). The shape is fixed at
//! construction; there is no way to resize a grid afterwards.

use ndarray::{Array, Dimension, IntoDimension, Ix1, Ix2, NdIndex, Zip};
use serde::Serialize;
use std::fmt::Debug;

use crate::error::{PicError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GridStorage<D: Dimension> {
    data: Array<f64, D>,
}

pub type GridStorage1D = GridStorage<Ix1>;
pub type GridStorage2D = GridStorage<Ix2>;

impl<D: Dimension> GridStorage<D> {
    /// A grid of zeros.
    pub fn zeros<Sh: IntoDimension<Dim = D>>(shape: Sh) -> Self {
        Self {
            data: Array::zeros(shape.into_dimension()),
        }
    }

    /// A grid with every cell set to `value`.
    pub fn filled<Sh: IntoDimension<Dim = D>>(shape: Sh, value: f64) -> Self {
        Self {
            data: Array::from_elem(shape.into_dimension(), value),
        }
    }

    /// Build a grid from values in row-major order.
    ///
    /// Fails with [`PicError::SizeMismatch`] unless `values` holds exactly one
    /// value per cell.
    pub fn from_vec<Sh: IntoDimension<Dim = D>>(shape: Sh, values: Vec<f64>) -> Result<Self> {
        let dim = shape.into_dimension();
        let expected = dim.size();
        if values.len() != expected {
            return Err(PicError::SizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        let data = Array::from_shape_vec(dim, values).map_err(|_| PicError::SizeMismatch {
            expected,
            actual: expected,
        })?;
        Ok(Self { data })
    }

    pub fn from_array(data: Array<f64, D>) -> Self {
        Self { data }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bounds-checked read.
    pub fn get<I: NdIndex<D> + Debug>(&self, index: I) -> Result<f64> {
        let label = format!("{:?}", index);
        match self.data.get(index) {
            Some(v) => Ok(*v),
            None => Err(self.out_of_bounds(label)),
        }
    }

    /// Bounds-checked mutable access.
    pub fn get_mut<I: NdIndex<D> + Debug>(&mut self, index: I) -> Result<&mut f64> {
        let label = format!("{:?}", index);
        let shape = self.data.shape().to_vec();
        self.data.get_mut(index).ok_or(PicError::OutOfBounds {
            index: label,
            shape,
        })
    }

    pub fn set<I: NdIndex<D> + Debug>(&mut self, index: I, value: f64) -> Result<()> {
        *self.get_mut(index)? = value;
        Ok(())
    }

    fn out_of_bounds(&self, index: String) -> PicError {
        PicError::OutOfBounds {
            index,
            shape: self.data.shape().to_vec(),
        }
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    pub fn scale(&mut self, factor: f64) {
        self.data.mapv_inplace(|v| v * factor);
    }

    /// Elementwise `self += other`. Shapes must match.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        if self.data.shape() != other.data.shape() {
            return Err(PicError::SizeMismatch {
                expected: self.data.len(),
                actual: other.data.len(),
            });
        }
        Zip::from(&mut self.data)
            .and(&other.data)
            .for_each(|a, &b| *a += b);
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.data.sum()
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.data.iter()
    }

    pub fn as_array(&self) -> &Array<f64, D> {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }
}

impl GridStorage2D {
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }
}

impl<D: Dimension, I: NdIndex<D>> std::ops::Index<I> for GridStorage<D> {
    type Output = f64;

    /// Unchecked-style indexing; panics out of range like `ndarray`.
    fn index(&self, index: I) -> &f64 {
        &self.data[index]
    }
}

impl<D: Dimension, I: NdIndex<D>> std::ops::IndexMut<I> for GridStorage<D> {
    fn index_mut(&mut self, index: I) -> &mut f64 {
        &mut self.data[index]
    }
}
