//! Packed numeric array decoding
//!
//! Arrays arrive in the NPY layout: a magic string, a format version, a
//! header describing element type, storage order and shape, then the raw
//! element buffer. Only little/big-endian `f8` elements are accepted; the
//! pipeline works on 64-bit floats throughout.

use ndarray::{ArrayView2, ShapeBuilder};
use npyz::{DType, NpyFile, Order, WriteOptions, WriterBuilder};
use thiserror::Error;

const MAGIC: &[u8] = b"\x93NUMPY";
const ELEMENT_SIZE: usize = std::mem::size_of::<f64>();

/// Errors raised while decoding a packed array
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("Not a packed numeric array (bad magic)")]
    BadMagic,

    #[error("Unsupported array format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("Array header is truncated")]
    TruncatedHeader,

    #[error("Unsupported element type: {0}")]
    UnsupportedType(String),

    #[error("Shape {shape:?} needs {expected} bytes but the buffer holds {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Expected a {expected}-dimensional array, got shape {shape:?}")]
    Dimensionality { expected: usize, shape: Vec<usize> },

    #[error("Malformed array: {0}")]
    Malformed(String),

    #[error("Failed to encode array: {0}")]
    EncodeFailed(String),
}

/// Result type for decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Element layout of a multi-dimensional buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StorageOrder {
    /// C order, last index varies fastest
    #[default]
    RowMajor,
    /// Fortran order, first index varies fastest
    ColumnMajor,
}

impl StorageOrder {
    pub fn is_column_major(&self) -> bool {
        matches!(self, StorageOrder::ColumnMajor)
    }
}

impl From<Order> for StorageOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::C => StorageOrder::RowMajor,
            Order::Fortran => StorageOrder::ColumnMajor,
        }
    }
}

impl From<StorageOrder> for Order {
    fn from(order: StorageOrder) -> Self {
        match order {
            StorageOrder::RowMajor => Order::C,
            StorageOrder::ColumnMajor => Order::Fortran,
        }
    }
}

/// A decoded array of 64-bit floats
///
/// Invariant: `data.len()` equals the product of `shape`.
#[derive(Clone, Debug, PartialEq)]
pub struct NumericArray {
    data: Vec<f64>,
    shape: Vec<usize>,
    order: StorageOrder,
}

impl NumericArray {
    /// Build an array from a raw buffer laid out in `order`
    pub fn new(data: Vec<f64>, shape: Vec<usize>, order: StorageOrder) -> DecodeResult<Self> {
        let count = byte_len(&shape)? / ELEMENT_SIZE;
        if count != data.len() {
            return Err(DecodeError::ShapeMismatch {
                expected: count * ELEMENT_SIZE,
                actual: data.len() * ELEMENT_SIZE,
                shape,
            });
        }
        Ok(Self { data, shape, order })
    }

    /// Decode an NPY buffer
    pub fn decode(bytes: &[u8]) -> DecodeResult<Self> {
        let offset = body_offset(bytes)?;
        let npy = NpyFile::new(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        match npy.dtype() {
            DType::Plain(ty) if ty.to_string().ends_with("f8") => {}
            other => return Err(DecodeError::UnsupportedType(format!("{:?}", other))),
        }

        let shape = npy
            .shape()
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<Result<Vec<usize>, _>>()
            .map_err(|_| DecodeError::Malformed(format!("shape {:?} too large", npy.shape())))?;
        let order = StorageOrder::from(npy.order());

        let expected = byte_len(&shape)?;
        let actual = bytes.len() - offset;
        if expected != actual {
            return Err(DecodeError::ShapeMismatch {
                shape,
                expected,
                actual,
            });
        }

        let data = npy
            .into_vec::<f64>()
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        Self::new(data, shape, order)
    }

    /// Encode back into an NPY buffer, preserving shape and storage order
    pub fn encode(&self) -> DecodeResult<Vec<u8>> {
        let shape: Vec<u64> = self.shape.iter().map(|&d| d as u64).collect();
        let mut buffer = Vec::with_capacity(128 + self.data.len() * ELEMENT_SIZE);
        {
            let mut writer = WriteOptions::<f64>::new()
                .default_dtype()
                .shape(&shape)
                .order(self.order.into())
                .writer(&mut buffer)
                .begin_nd()
                .map_err(|e| DecodeError::EncodeFailed(e.to_string()))?;
            writer
                .extend(self.data.iter().copied())
                .map_err(|e| DecodeError::EncodeFailed(e.to_string()))?;
            writer
                .finish()
                .map_err(|e| DecodeError::EncodeFailed(e.to_string()))?;
        }
        Ok(buffer)
    }

    /// Raw element buffer in storage order
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn order(&self) -> StorageOrder {
        self.order
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the first dimension (0 for a scalar array)
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// View a 2-dimensional array, honoring its storage order
    pub fn matrix(&self) -> DecodeResult<ArrayView2<'_, f64>> {
        if self.shape.len() != 2 {
            return Err(DecodeError::Dimensionality {
                expected: 2,
                shape: self.shape.clone(),
            });
        }
        let shape = (self.shape[0], self.shape[1]).set_f(self.order.is_column_major());
        ArrayView2::from_shape(shape, &self.data).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}

/// Size in bytes of an `f8` buffer with `shape`, rejecting overflow
fn byte_len(shape: &[usize]) -> DecodeResult<usize> {
    shape
        .iter()
        .try_fold(ELEMENT_SIZE, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| DecodeError::Malformed(format!("shape {:?} too large", shape)))
}

/// Validate the prelude and return the offset of the element buffer
fn body_offset(bytes: &[u8]) -> DecodeResult<usize> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    if bytes.len() < 8 {
        return Err(DecodeError::TruncatedHeader);
    }

    let (major, minor) = (bytes[6], bytes[7]);
    let (start, header_len) = match major {
        1 => {
            if bytes.len() < 10 {
                return Err(DecodeError::TruncatedHeader);
            }
            (10, u16::from_le_bytes([bytes[8], bytes[9]]) as usize)
        }
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(DecodeError::TruncatedHeader);
            }
            (
                12,
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            )
        }
        _ => return Err(DecodeError::UnsupportedVersion { major, minor }),
    };

    let offset = start + header_len;
    if offset > bytes.len() {
        return Err(DecodeError::TruncatedHeader);
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_major() -> NumericArray {
        NumericArray::new(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![2, 3],
            StorageOrder::RowMajor,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_shape_mismatch() {
        let err = NumericArray::new(vec![1.0, 2.0], vec![2, 3], StorageOrder::RowMajor);
        assert!(matches!(err, Err(DecodeError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_roundtrip_row_major() {
        let array = row_major();
        let bytes = array.encode().unwrap();
        let decoded = NumericArray::decode(&bytes).unwrap();

        assert_eq!(decoded, array);
        assert_eq!(decoded.rows(), 2);
    }

    #[test]
    fn test_roundtrip_column_major() {
        // [[1, 2, 3], [4, 5, 6]] stored first-index-fastest
        let array = NumericArray::new(
            vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0],
            vec![2, 3],
            StorageOrder::ColumnMajor,
        )
        .unwrap();
        let decoded = NumericArray::decode(&array.encode().unwrap()).unwrap();

        assert_eq!(decoded.order(), StorageOrder::ColumnMajor);
        assert_eq!(decoded.data(), array.data());
    }

    #[test]
    fn test_matrix_indexing_respects_order() {
        let c = row_major();
        let f = NumericArray::new(
            vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0],
            vec![2, 3],
            StorageOrder::ColumnMajor,
        )
        .unwrap();

        let (mc, mf) = (c.matrix().unwrap(), f.matrix().unwrap());
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(mc[[i, j]], mf[[i, j]]);
            }
        }
        assert_eq!(mf[[1, 0]], 4.0);
    }

    #[test]
    fn test_matrix_requires_two_dimensions() {
        let array = NumericArray::new(vec![1.0, 2.0, 3.0], vec![3], StorageOrder::RowMajor).unwrap();
        assert!(matches!(
            array.matrix(),
            Err(DecodeError::Dimensionality { expected: 2, .. })
        ));
    }

    #[test]
    fn test_decode_bad_magic() {
        let err = NumericArray::decode(b"PK\x03\x04not an array").unwrap_err();
        assert_eq!(err, DecodeError::BadMagic);
    }

    #[test]
    fn test_decode_unknown_version() {
        let mut bytes = row_major().encode().unwrap();
        bytes[6] = 9;
        assert!(matches!(
            NumericArray::decode(&bytes),
            Err(DecodeError::UnsupportedVersion { major: 9, .. })
        ));
    }

    #[test]
    fn test_decode_truncated_body() {
        let mut bytes = row_major().encode().unwrap();
        bytes.truncate(bytes.len() - 8);
        assert!(matches!(
            NumericArray::decode(&bytes),
            Err(DecodeError::ShapeMismatch {
                expected: 48,
                actual: 40,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_rejects_single_precision() {
        let mut buffer = Vec::new();
        {
            let mut writer = WriteOptions::<f32>::new()
                .default_dtype()
                .shape(&[2])
                .writer(&mut buffer)
                .begin_nd()
                .unwrap();
            writer.extend(vec![1.0f32, 2.0]).unwrap();
            writer.finish().unwrap();
        }
        assert!(matches!(
            NumericArray::decode(&buffer),
            Err(DecodeError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_decode_oversized_shape_is_error() {
        let mut header =
            "{'descr': '<f8', 'fortran_order': False, 'shape': (4611686018427387904, 3), }"
                .to_string();
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');

        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&[0u8; 48]);

        assert!(matches!(
            NumericArray::decode(&bytes),
            Err(DecodeError::Malformed(_))
        ));
    }
}
