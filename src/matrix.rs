//! Host-side grid data.
//!
//! A [`Matrix`] is a square, row-major grid of `i64`; an [`ImageFrame`] is a
//! packed raster of byte samples. Both check their shape on construction, so
//! any value of either type is known to have the length its dimensions imply.

use crate::error::{HarnessError, Result};

/// Square row-major matrix of 64-bit signed integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    size: usize,
    data: Vec<i64>,
}

impl Matrix {
    /// Wraps `data` as a `size × size` matrix.
    ///
    /// # Errors
    ///
    /// [`HarnessError::DimensionMismatch`] if `size` is zero or
    /// `data.len() != size * size`.
    pub fn new(size: usize, data: Vec<i64>) -> Result<Self> {
        if size == 0 {
            return Err(HarnessError::DimensionMismatch(
                "matrix size must be positive".into(),
            ));
        }
        let expected = Self::element_count(size)?;
        if data.len() != expected {
            return Err(HarnessError::DimensionMismatch(format!(
                "{size}x{size} matrix needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { size, data })
    }

    /// Number of elements in a `size × size` matrix.
    ///
    /// # Errors
    ///
    /// [`HarnessError::DimensionMismatch`] if the count overflows `usize`.
    pub fn element_count(size: usize) -> Result<usize> {
        size.checked_mul(size).ok_or_else(|| {
            HarnessError::DimensionMismatch(format!("matrix size {size} overflows"))
        })
    }

    /// All-zero `size × size` matrix.
    ///
    /// # Errors
    ///
    /// Same as [`Matrix::new`].
    pub fn zeros(size: usize) -> Result<Self> {
        Self::new(size, vec![0; Self::element_count(size)?])
    }

    /// Identity matrix of the given size.
    ///
    /// # Errors
    ///
    /// Same as [`Matrix::new`].
    pub fn identity(size: usize) -> Result<Self> {
        let mut m = Self::zeros(size)?;
        for i in 0..size {
            m.data[i * size + i] = 1;
        }
        Ok(m)
    }

    /// Edge length.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of elements, always `size²`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Never true; kept for API symmetry with slices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major element slice.
    #[must_use]
    pub fn as_slice(&self) -> &[i64] {
        &self.data
    }

    /// Element at `(row, col)`.
    ///
    /// # Panics
    ///
    /// If either index is out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> i64 {
        assert!(row < self.size && col < self.size, "index out of range");
        self.data[row * self.size + col]
    }

    /// Consumes the matrix, returning its storage.
    #[must_use]
    pub fn into_vec(self) -> Vec<i64> {
        self.data
    }
}

/// Packed raster image, one byte per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl ImageFrame {
    /// Channel count of the colour inputs of the blending workload.
    pub const RGB: usize = 3;

    /// Wraps `data` as a `width × height` frame with `channels` bytes per pixel.
    ///
    /// # Errors
    ///
    /// [`HarnessError::DimensionMismatch`] if any dimension is zero or the
    /// buffer length is not `width * height * channels`.
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 || channels == 0 {
            return Err(HarnessError::DimensionMismatch(format!(
                "image dimensions must be positive, got {width}x{height}x{channels}"
            )));
        }
        let expected = Self::byte_count(width, height, channels)?;
        if data.len() != expected {
            return Err(HarnessError::DimensionMismatch(format!(
                "{width}x{height}x{channels} image needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Bytes in a `width × height` frame with `channels` bytes per pixel.
    ///
    /// # Errors
    ///
    /// [`HarnessError::DimensionMismatch`] if the count overflows `usize`.
    pub fn byte_count(width: usize, height: usize, channels: usize) -> Result<usize> {
        width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(channels))
            .ok_or_else(|| {
                HarnessError::DimensionMismatch(format!(
                    "{width}x{height}x{channels} image overflows"
                ))
            })
    }

    /// Columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Rows.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Bytes per pixel.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Bytes per row (`width * channels`).
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.width * self.channels
    }

    /// Number of pixels.
    #[must_use]
    pub const fn pixels(&self) -> usize {
        self.width * self.height
    }

    /// Raw samples.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the frame, returning its samples.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// True if `other` has the same width, height and channel count.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.channels == other.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let err = Matrix::new(2, vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, HarnessError::DimensionMismatch(_)));
    }

    #[test]
    fn rejects_zero_size() {
        assert!(Matrix::new(0, Vec::new()).is_err());
        assert!(ImageFrame::new(0, 4, 3, Vec::new()).is_err());
    }

    #[test]
    fn rejects_overflowing_shape() {
        assert!(matches!(
            ImageFrame::new(usize::MAX, 2, 3, Vec::new()),
            Err(HarnessError::DimensionMismatch(_))
        ));
        assert!(Matrix::zeros(usize::MAX).is_err());
    }

    #[test]
    fn identity_has_ones_on_diagonal() {
        let m = Matrix::identity(3).unwrap();
        assert_eq!(m.as_slice(), &[1, 0, 0, 0, 1, 0, 0, 0, 1]);
        assert_eq!(m.get(2, 2), 1);
    }

    #[test]
    fn frame_stride_counts_channels() {
        let f = ImageFrame::new(4, 2, 3, vec![0; 24]).unwrap();
        assert_eq!(f.stride(), 12);
        assert_eq!(f.pixels(), 8);
    }
}
