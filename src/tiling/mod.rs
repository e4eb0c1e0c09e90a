// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mapping between the full-resolution data grid and the gain grid.
//!
//! For a data shape of (N1, N2, ...) and a subtiling of (M1, M2, ...), gains
//! have the shape (N1/M1, N2/M2, ...) =: (K1, K2, ...). Data are viewed in the
//! "subtiled" layout (K1, M1, K2, M2, ...), gains are broadcast into that
//! layout by inserting a length-1 axis after each of their axes, and products
//! are collapsed back onto the gain grid by summing every tile axis.

mod error;

pub use error::TilingError;

use std::ops::Add;

use itertools::Itertools;
use log::debug;
use ndarray::{prelude::*, CowArray};
use num_traits::Zero;
use vec1::Vec1;

use crate::c64;

/// Conversions between data arrays and the subtiled layout. Implementations
/// are chosen once per solver; the common case of no subtiling uses
/// [`TrivialTiling`], where every conversion is free.
pub trait Tiling: std::fmt::Debug + Send + Sync {
    /// Reshape a full-resolution data array into the subtiled layout.
    fn tile_data<'a>(&self, x: ArrayViewD<'a, c64>)
        -> Result<CowArray<'a, c64, IxDyn>, TilingError>;

    /// Reshape a subtiled array back to full resolution.
    fn untile_data(&self, x: ArrayD<c64>) -> Result<ArrayD<c64>, TilingError>;

    /// Make a gain-grid array broadcastable against the subtiled layout. No
    /// data are copied.
    fn tile_gain<'a>(&self, g: ArrayViewD<'a, c64>) -> ArrayViewD<'a, c64>;

    /// Sum every tile axis, collapsing a subtiled array onto the gain grid.
    fn reduce_subtiles(&self, x: ArrayD<c64>) -> ArrayD<c64>;

    /// [`Tiling::reduce_subtiles`] for real-valued weights.
    fn reduce_subtile_weights(&self, x: ArrayD<f64>) -> ArrayD<f64>;
}

/// No subtiling; the gain and data grids are the same.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialTiling;

impl Tiling for TrivialTiling {
    #[inline]
    fn tile_data<'a>(
        &self,
        x: ArrayViewD<'a, c64>,
    ) -> Result<CowArray<'a, c64, IxDyn>, TilingError> {
        Ok(x.into())
    }

    #[inline]
    fn untile_data(&self, x: ArrayD<c64>) -> Result<ArrayD<c64>, TilingError> {
        Ok(x)
    }

    #[inline]
    fn tile_gain<'a>(&self, g: ArrayViewD<'a, c64>) -> ArrayViewD<'a, c64> {
        g
    }

    #[inline]
    fn reduce_subtiles(&self, x: ArrayD<c64>) -> ArrayD<c64> {
        x
    }

    #[inline]
    fn reduce_subtile_weights(&self, x: ArrayD<f64>) -> ArrayD<f64> {
        x
    }
}

/// Gains vary more slowly than the data along at least one axis.
#[derive(Debug, Clone)]
pub struct SubtiledTiling {
    datashape: Vec<usize>,

    /// (K1, M1, K2, M2, ...)
    subtiled_shape: Vec<usize>,

    /// The tile axes of the subtiled layout, highest first, so that summing
    /// them in order doesn't shift the remaining axes.
    tile_axes: Vec<usize>,
}

impl SubtiledTiling {
    fn new(shape: &TileShape) -> SubtiledTiling {
        let subtiled_shape = shape
            .gainshape
            .iter()
            .zip(shape.subtiling.iter())
            .flat_map(|(&k, &m)| [k, m])
            .collect();
        let tile_axes = (0..shape.datashape.len())
            .rev()
            .map(|axis| 2 * axis + 1)
            .collect();
        SubtiledTiling {
            datashape: shape.datashape.to_vec(),
            subtiled_shape,
            tile_axes,
        }
    }

    pub fn subtiled_shape(&self) -> &[usize] {
        &self.subtiled_shape
    }

    fn sum_tile_axes<A>(&self, mut x: ArrayD<A>) -> ArrayD<A>
    where
        A: Clone + Zero + Add<Output = A>,
    {
        for &axis in &self.tile_axes {
            x = x.sum_axis(Axis(axis));
        }
        x
    }
}

impl Tiling for SubtiledTiling {
    fn tile_data<'a>(
        &self,
        x: ArrayViewD<'a, c64>,
    ) -> Result<CowArray<'a, c64, IxDyn>, TilingError> {
        if x.shape() != self.datashape.as_slice() {
            return Err(TilingError::DataShape {
                expected: self.datashape.clone(),
                got: x.shape().to_vec(),
            });
        }

        let shape = IxDyn(&self.subtiled_shape);
        if x.is_standard_layout() {
            Ok(x.into_shape_with_order(shape)?.into())
        } else {
            let x = x.as_standard_layout().into_owned();
            Ok(x.into_shape_with_order(shape)?.into())
        }
    }

    fn untile_data(&self, x: ArrayD<c64>) -> Result<ArrayD<c64>, TilingError> {
        let x = if x.is_standard_layout() {
            x
        } else {
            x.as_standard_layout().into_owned()
        };
        Ok(x.into_shape_with_order(IxDyn(&self.datashape))?)
    }

    fn tile_gain<'a>(&self, g: ArrayViewD<'a, c64>) -> ArrayViewD<'a, c64> {
        let mut g = g;
        for axis in 0..g.ndim() {
            g.insert_axis_inplace(Axis(2 * axis + 1));
        }
        g
    }

    fn reduce_subtiles(&self, x: ArrayD<c64>) -> ArrayD<c64> {
        self.sum_tile_axes(x)
    }

    fn reduce_subtile_weights(&self, x: ArrayD<f64>) -> ArrayD<f64> {
        self.sum_tile_axes(x)
    }
}

/// The data grid, the subtiling factors and the resulting gain grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileShape {
    datashape: Vec1<usize>,
    subtiling: Vec1<usize>,
    gainshape: Vec1<usize>,
}

impl TileShape {
    /// Validate the data shape against the subtiling factors. Every factor
    /// must evenly divide its data axis.
    pub fn new(datashape: &[usize], subtiling: &[usize]) -> Result<TileShape, TilingError> {
        let datashape =
            Vec1::try_from_vec(datashape.to_vec()).map_err(|_| TilingError::EmptyShape)?;
        if datashape.len() != subtiling.len() {
            return Err(TilingError::LengthMismatch {
                data: datashape.len(),
                subtiling: subtiling.len(),
            });
        }

        let mut gainshape = Vec::with_capacity(datashape.len());
        for (axis, (&extent, &factor)) in datashape.iter().zip(subtiling.iter()).enumerate() {
            if extent == 0 {
                return Err(TilingError::ZeroExtent { axis });
            }
            if factor == 0 {
                return Err(TilingError::ZeroFactor { axis });
            }
            if extent % factor != 0 {
                return Err(TilingError::NotDivisible {
                    axis,
                    extent,
                    factor,
                });
            }
            gainshape.push(extent / factor);
        }

        // Neither of these can be empty; their lengths match `datashape`.
        let subtiling =
            Vec1::try_from_vec(subtiling.to_vec()).map_err(|_| TilingError::EmptyShape)?;
        let gainshape = Vec1::try_from_vec(gainshape).map_err(|_| TilingError::EmptyShape)?;

        Ok(TileShape {
            datashape,
            subtiling,
            gainshape,
        })
    }

    /// A shape with no subtiling.
    pub fn untiled(datashape: &[usize]) -> Result<TileShape, TilingError> {
        TileShape::new(datashape, &vec![1; datashape.len()])
    }

    pub fn datashape(&self) -> &[usize] {
        &self.datashape
    }

    pub fn subtiling(&self) -> &[usize] {
        &self.subtiling
    }

    pub fn gainshape(&self) -> &[usize] {
        &self.gainshape
    }

    /// The number of elements in each gain array.
    pub fn num_gain_elements(&self) -> usize {
        self.gainshape.iter().product()
    }

    /// Are the gain and data grids the same?
    pub fn is_trivial(&self) -> bool {
        *self.subtiling.iter().max().unwrap_or(&1) == 1
    }

    /// Get the [`Tiling`] appropriate for this shape.
    pub fn tiling(&self) -> Box<dyn Tiling> {
        if self.is_trivial() {
            debug!("No subtiling; data shape {:?}", &self.datashape[..]);
            Box::new(TrivialTiling)
        } else {
            debug!(
                "Subtiling data shape ({}) by ({}) into gain shape ({})",
                self.datashape.iter().join(", "),
                self.subtiling.iter().join(", "),
                self.gainshape.iter().join(", ")
            );
            Box::new(SubtiledTiling::new(self))
        }
    }
}
