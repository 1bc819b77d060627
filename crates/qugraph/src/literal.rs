//! Dense and sparse array literals and their wire encoding.
//!
//! Literal arrays are carried as [`ndarray`] containers and serialised as
//! dense payloads with explicit shape and dtype; complex arrays split into
//! real/imag channels. Sparse operators are COO triples, which is also
//! exactly their wire format.

use ndarray::{ArrayD, Ix2, IxDyn};
use num_complex::Complex64;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ensure, ErrorCode, GraphError, GraphResult};
use crate::shape::is_close;

/// A dense numeric literal, real or complex.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayLiteral {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
}

impl ArrayLiteral {
    pub fn shape(&self) -> &[usize] {
        match self {
            ArrayLiteral::Real(a) => a.shape(),
            ArrayLiteral::Complex(a) => a.shape(),
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, ArrayLiteral::Complex(_))
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayLiteral::Real(a) => a.len(),
            ArrayLiteral::Complex(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scalar(value: f64) -> Self {
        ArrayLiteral::Real(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn zeros(shape: &[usize]) -> Self {
        ArrayLiteral::Real(ArrayD::zeros(IxDyn(shape)))
    }

    /// The values as a real vector; fails on complex data or rank ≠ 1.
    pub fn as_real_vector(&self, name: &str) -> GraphResult<Vec<f64>> {
        match self {
            ArrayLiteral::Real(a) if a.ndim() == 1 => Ok(a.iter().copied().collect()),
            ArrayLiteral::Real(_) => Err(GraphError::new(
                ErrorCode::ShapeMismatch,
                format!("{name} must be a 1D array"),
            )),
            ArrayLiteral::Complex(_) => Err(GraphError::new(
                ErrorCode::InvalidDtype,
                format!("{name} must be real-valued"),
            )),
        }
    }

    fn complex_matrix(&self) -> Option<ndarray::Array2<Complex64>> {
        let promoted = match self {
            ArrayLiteral::Real(a) => a.mapv(|v| Complex64::new(v, 0.0)),
            ArrayLiteral::Complex(a) => a.clone(),
        };
        promoted.into_dimensionality::<Ix2>().ok()
    }

    pub fn is_all_zero(&self) -> bool {
        match self {
            ArrayLiteral::Real(a) => a.iter().all(|v| *v == 0.0),
            ArrayLiteral::Complex(a) => a.iter().all(|v| v.norm_sqr() == 0.0),
        }
    }

    /// `A == A†` within tolerance; the literal must be a square matrix.
    pub fn is_hermitian(&self) -> bool {
        let Some(matrix) = self.complex_matrix() else {
            return false;
        };
        if matrix.nrows() != matrix.ncols() {
            return false;
        }
        matrix
            .indexed_iter()
            .all(|((i, j), value)| close_complex(*value, matrix[[j, i]].conj()))
    }

    /// `V V† V == V` within tolerance; the literal must be a matrix.
    pub fn is_partial_isometry(&self) -> bool {
        let Some(matrix) = self.complex_matrix() else {
            return false;
        };
        let adjoint = matrix.t().mapv(|v| v.conj());
        let product = matrix.dot(&adjoint).dot(&matrix);
        product
            .iter()
            .zip(matrix.iter())
            .all(|(lhs, rhs)| close_complex(*lhs, *rhs))
    }

    /// `P == P† == P²` within tolerance.
    pub fn is_orthogonal_projection(&self) -> bool {
        if !self.is_hermitian() {
            return false;
        }
        let matrix = self.complex_matrix().expect("hermitian implies matrix");
        let squared = matrix.dot(&matrix);
        squared
            .iter()
            .zip(matrix.iter())
            .all(|(lhs, rhs)| close_complex(*lhs, *rhs))
    }
}

fn close_complex(a: Complex64, b: Complex64) -> bool {
    is_close(a.re, b.re) && is_close(a.im, b.im)
}

impl From<f64> for ArrayLiteral {
    fn from(value: f64) -> Self {
        ArrayLiteral::scalar(value)
    }
}

impl From<Complex64> for ArrayLiteral {
    fn from(value: Complex64) -> Self {
        ArrayLiteral::Complex(ArrayD::from_elem(IxDyn(&[]), value))
    }
}

impl From<ArrayD<f64>> for ArrayLiteral {
    fn from(value: ArrayD<f64>) -> Self {
        ArrayLiteral::Real(value)
    }
}

impl From<ArrayD<Complex64>> for ArrayLiteral {
    fn from(value: ArrayD<Complex64>) -> Self {
        ArrayLiteral::Complex(value)
    }
}

impl From<Vec<f64>> for ArrayLiteral {
    fn from(value: Vec<f64>) -> Self {
        let len = value.len();
        ArrayLiteral::Real(ArrayD::from_shape_vec(IxDyn(&[len]), value).expect("vector shape"))
    }
}

impl<const N: usize> From<[f64; N]> for ArrayLiteral {
    fn from(value: [f64; N]) -> Self {
        value.to_vec().into()
    }
}

impl From<ndarray::Array1<f64>> for ArrayLiteral {
    fn from(value: ndarray::Array1<f64>) -> Self {
        ArrayLiteral::Real(value.into_dyn())
    }
}

impl From<ndarray::Array2<f64>> for ArrayLiteral {
    fn from(value: ndarray::Array2<f64>) -> Self {
        ArrayLiteral::Real(value.into_dyn())
    }
}

impl From<ndarray::Array2<Complex64>> for ArrayLiteral {
    fn from(value: ndarray::Array2<Complex64>) -> Self {
        ArrayLiteral::Complex(value.into_dyn())
    }
}

impl Serialize for ArrayLiteral {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        match self {
            ArrayLiteral::Real(a) => {
                map.serialize_entry("dtype", "float64")?;
                map.serialize_entry("shape", a.shape())?;
                map.serialize_entry("data", &a.iter().collect::<Vec<_>>())?;
            }
            ArrayLiteral::Complex(a) => {
                map.serialize_entry("dtype", "complex128")?;
                map.serialize_entry("shape", a.shape())?;
                map.serialize_entry("real", &a.iter().map(|v| v.re).collect::<Vec<_>>())?;
                map.serialize_entry("imag", &a.iter().map(|v| v.im).collect::<Vec<_>>())?;
            }
        }
        map.end()
    }
}

#[derive(Deserialize)]
struct ArrayWire {
    dtype: String,
    shape: Vec<usize>,
    #[serde(default)]
    data: Vec<f64>,
    #[serde(default)]
    real: Vec<f64>,
    #[serde(default)]
    imag: Vec<f64>,
}

impl<'de> Deserialize<'de> for ArrayLiteral {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = ArrayWire::deserialize(deserializer)?;
        match wire.dtype.as_str() {
            "float64" => ArrayD::from_shape_vec(IxDyn(&wire.shape), wire.data)
                .map(ArrayLiteral::Real)
                .map_err(|err| D::Error::custom(format!("array payload: {err}"))),
            "complex128" => {
                if wire.real.len() != wire.imag.len() {
                    return Err(D::Error::custom("real/imag channel length mismatch"));
                }
                let values = wire
                    .real
                    .into_iter()
                    .zip(wire.imag)
                    .map(|(re, im)| Complex64::new(re, im))
                    .collect();
                ArrayD::from_shape_vec(IxDyn(&wire.shape), values)
                    .map(ArrayLiteral::Complex)
                    .map_err(|err| D::Error::custom(format!("array payload: {err}")))
            }
            other => Err(D::Error::custom(format!("unknown dtype `{other}`"))),
        }
    }
}

/// A sparse matrix in coordinate form. This is the client-side and the
/// wire representation; the client never computes with sparse operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooMatrix {
    pub shape: [usize; 2],
    pub row: Vec<usize>,
    pub col: Vec<usize>,
    pub real: Vec<f64>,
    pub imag: Vec<f64>,
}

impl CooMatrix {
    pub fn new(shape: [usize; 2], entries: &[(usize, usize, Complex64)]) -> GraphResult<Self> {
        let mut matrix = CooMatrix {
            shape,
            row: Vec::with_capacity(entries.len()),
            col: Vec::with_capacity(entries.len()),
            real: Vec::with_capacity(entries.len()),
            imag: Vec::with_capacity(entries.len()),
        };
        for &(row, col, value) in entries {
            ensure!(
                row < shape[0] && col < shape[1],
                ErrorCode::OutOfBounds,
                "entry ({row}, {col}) is outside a {} by {} matrix",
                shape[0],
                shape[1]
            );
            matrix.row.push(row);
            matrix.col.push(col);
            matrix.real.push(value.re);
            matrix.imag.push(value.im);
        }
        Ok(matrix)
    }

    pub fn nnz(&self) -> usize {
        self.row.len()
    }

    pub fn is_square(&self) -> bool {
        self.shape[0] == self.shape[1]
    }

    /// Hermiticity over the summed coordinate entries.
    pub fn is_hermitian(&self) -> bool {
        if !self.is_square() {
            return false;
        }
        let mut entries = std::collections::HashMap::new();
        for k in 0..self.nnz() {
            let value = Complex64::new(self.real[k], self.imag[k]);
            *entries
                .entry((self.row[k], self.col[k]))
                .or_insert(Complex64::new(0.0, 0.0)) += value;
        }
        entries.iter().all(|(&(row, col), &value)| {
            let mirrored = entries
                .get(&(col, row))
                .copied()
                .unwrap_or(Complex64::new(0.0, 0.0));
            close_complex(value, mirrored.conj())
        })
    }
}
