//! Batch-to-mosaic frame tiling.
//!
//! A batch of clips `(batch, time, channel, height, width)` becomes one clip
//! whose frames are grids of the batch elements:
//! `(time, rows * height, cols * width, channel)`.

use crate::result::{MediaError, MediaResult};
use crate::source::NumericArray;
use ndarray::{concatenate, Array4, ArrayD, Axis, IxDyn};

/// Tile a 4-D or 5-D array into mosaic frames of `u8`.
///
/// A 4-D input is a single clip. The batch is zero-padded up to the next
/// power of two whenever it is not one already; values are cast, never
/// rescaled.
pub fn prepare_data(data: &NumericArray) -> MediaResult<Array4<u8>> {
    let ndim = data.ndim();
    if ndim < 4 {
        return Err(MediaError::unsupported_input(
            "video arrays must have at least 4 dimensions: time, channel, height, width",
        ));
    }
    if ndim > 5 {
        return Err(MediaError::unsupported_input(
            "video arrays must have at most 5 dimensions: batch, time, channel, height, width",
        ));
    }

    let cast = data.to_u8();
    let mut array = if cast.is_standard_layout() {
        cast
    } else {
        cast.as_standard_layout().into_owned()
    };
    if ndim == 4 {
        array = array.insert_axis(Axis(0));
    }

    let &[batch, time, channels, height, width] = array.shape() else {
        return Err(MediaError::unsupported_input("video array is not 5-dimensional"));
    };
    if batch == 0 {
        return Err(MediaError::unsupported_input("video batch is empty"));
    }

    let padded = padded_batch(batch);
    if padded > batch {
        let zeros = ArrayD::<u8>::zeros(IxDyn(&[padded - batch, time, channels, height, width]));
        array = concatenate(Axis(0), &[array.view(), zeros.view()])?;
    }

    let (rows, cols) = grid_shape(batch);
    let grid = array.into_shape(IxDyn(&[rows, cols, time, channels, height, width]))?;
    let mosaic = grid
        .permuted_axes(IxDyn(&[2, 0, 4, 1, 5, 3]))
        .as_standard_layout()
        .into_owned();
    Ok(mosaic.into_shape((time, rows * height, cols * width, channels))?)
}

/// Batch size after padding: `2^bit_length(batch)` unless already a power
/// of two
#[must_use]
pub fn padded_batch(batch: usize) -> usize {
    if batch.is_power_of_two() {
        batch
    } else {
        1 << bit_length(batch)
    }
}

/// Mosaic grid `(rows, cols)` for an unpadded batch size
#[must_use]
pub fn grid_shape(batch: usize) -> (usize, usize) {
    let rows = 1 << (bit_length(batch).saturating_sub(1) / 2);
    (rows, padded_batch(batch) / rows)
}

const fn bit_length(n: usize) -> u32 {
    usize::BITS - n.leading_zeros()
}
