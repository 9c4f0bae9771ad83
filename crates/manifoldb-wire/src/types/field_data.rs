//! Typed, named columns.
//!
//! A [`FieldData`] is one column of a query or search result: a name plus a
//! [`Column`] holding the values of every row. Columns are a closed set of
//! variants, so every consumer matches exhaustively instead of downcasting.
//!
//! The two operations everything else is built on are [`FieldData::slice`]
//! (copy a row range into a new column) and [`FieldData::append`] (extend a
//! column in place with the rows of another column of the same type).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::schema::DataType;
use super::sparse::SparseVector;
use crate::encoding::float16::{
    bf16_to_f32, f16_to_f32, f32_to_bf16, f32_to_f16,
};
use crate::error::{WireError, WireResult};

/// Values of an array column, one inner `Vec` per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayColumn {
    /// Arrays of booleans.
    Bool(Vec<Vec<bool>>),
    /// Arrays of 8-bit integers.
    Int8(Vec<Vec<i8>>),
    /// Arrays of 16-bit integers.
    Int16(Vec<Vec<i16>>),
    /// Arrays of 32-bit integers.
    Int32(Vec<Vec<i32>>),
    /// Arrays of 64-bit integers.
    Int64(Vec<Vec<i64>>),
    /// Arrays of 32-bit floats.
    Float(Vec<Vec<f32>>),
    /// Arrays of 64-bit floats.
    Double(Vec<Vec<f64>>),
    /// Arrays of strings.
    VarChar(Vec<Vec<String>>),
}

impl ArrayColumn {
    /// The element type of the arrays.
    #[must_use]
    pub const fn element_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::VarChar(_) => DataType::VarChar,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::VarChar(v) => v.len(),
        }
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slice_rows(&self, from: usize, to: usize) -> Self {
        match self {
            Self::Bool(v) => Self::Bool(v[from..to].to_vec()),
            Self::Int8(v) => Self::Int8(v[from..to].to_vec()),
            Self::Int16(v) => Self::Int16(v[from..to].to_vec()),
            Self::Int32(v) => Self::Int32(v[from..to].to_vec()),
            Self::Int64(v) => Self::Int64(v[from..to].to_vec()),
            Self::Float(v) => Self::Float(v[from..to].to_vec()),
            Self::Double(v) => Self::Double(v[from..to].to_vec()),
            Self::VarChar(v) => Self::VarChar(v[from..to].to_vec()),
        }
    }

    /// Appends rows of the same element type; returns `false` on mismatch.
    fn append_rows(&mut self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.extend_from_slice(b),
            (Self::Int8(a), Self::Int8(b)) => a.extend_from_slice(b),
            (Self::Int16(a), Self::Int16(b)) => a.extend_from_slice(b),
            (Self::Int32(a), Self::Int32(b)) => a.extend_from_slice(b),
            (Self::Int64(a), Self::Int64(b)) => a.extend_from_slice(b),
            (Self::Float(a), Self::Float(b)) => a.extend_from_slice(b),
            (Self::Double(a), Self::Double(b)) => a.extend_from_slice(b),
            (Self::VarChar(a), Self::VarChar(b)) => a.extend_from_slice(b),
            _ => return false,
        }
        true
    }

    fn value_at(&self, row: usize) -> Option<Value> {
        let value = match self {
            Self::Bool(v) => Value::from(v.get(row)?.clone()),
            Self::Int8(v) => Value::from(v.get(row)?.clone()),
            Self::Int16(v) => Value::from(v.get(row)?.clone()),
            Self::Int32(v) => Value::from(v.get(row)?.clone()),
            Self::Int64(v) => Value::from(v.get(row)?.clone()),
            Self::Float(v) => {
                Value::Array(v.get(row)?.iter().map(|&x| float_value(f64::from(x))).collect())
            }
            Self::Double(v) => Value::Array(v.get(row)?.iter().map(|&x| float_value(x)).collect()),
            Self::VarChar(v) => Value::from(v.get(row)?.clone()),
        };
        Some(value)
    }
}

/// The values of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// Booleans.
    Bool(Vec<bool>),
    /// 8-bit integers.
    Int8(Vec<i8>),
    /// 16-bit integers.
    Int16(Vec<i16>),
    /// 32-bit integers.
    Int32(Vec<i32>),
    /// 64-bit integers.
    Int64(Vec<i64>),
    /// 32-bit floats.
    Float(Vec<f32>),
    /// 64-bit floats.
    Double(Vec<f64>),
    /// Strings.
    VarChar(Vec<String>),
    /// JSON documents.
    Json(Vec<Value>),
    /// Arrays of scalars.
    Array(ArrayColumn),
    /// Bit-packed binary vectors, one byte buffer per row.
    BinaryVector(Vec<Vec<u8>>),
    /// Float32 vectors.
    FloatVector(Vec<Vec<f32>>),
    /// Binary16 vectors as raw bit patterns.
    Float16Vector(Vec<Vec<u16>>),
    /// Bfloat16 vectors as raw bit patterns.
    BFloat16Vector(Vec<Vec<u16>>),
    /// Int8 vectors.
    Int8Vector(Vec<Vec<i8>>),
    /// Sparse float vectors.
    SparseFloatVector(Vec<SparseVector>),
    /// Struct of arrays: named sub-columns sharing the row count.
    Struct(Vec<FieldData>),
}

impl Column {
    /// The data type of this column.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::VarChar(_) => DataType::VarChar,
            Self::Json(_) => DataType::Json,
            Self::Array(_) => DataType::Array,
            Self::BinaryVector(_) => DataType::BinaryVector,
            Self::FloatVector(_) => DataType::FloatVector,
            Self::Float16Vector(_) => DataType::Float16Vector,
            Self::BFloat16Vector(_) => DataType::BFloat16Vector,
            Self::Int8Vector(_) => DataType::Int8Vector,
            Self::SparseFloatVector(_) => DataType::SparseFloatVector,
            Self::Struct(_) => DataType::Struct,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::VarChar(v) => v.len(),
            Self::Json(v) => v.len(),
            Self::Array(a) => a.len(),
            Self::BinaryVector(v) => v.len(),
            Self::FloatVector(v) => v.len(),
            Self::Float16Vector(v) => v.len(),
            Self::BFloat16Vector(v) => v.len(),
            Self::Int8Vector(v) => v.len(),
            Self::SparseFloatVector(v) => v.len(),
            Self::Struct(fields) => fields.first().map_or(0, FieldData::len),
        }
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An empty column of the same type (and element type / sub-layout).
    #[must_use]
    pub fn empty_like(&self) -> Self {
        match self {
            Self::Bool(_) => Self::Bool(Vec::new()),
            Self::Int8(_) => Self::Int8(Vec::new()),
            Self::Int16(_) => Self::Int16(Vec::new()),
            Self::Int32(_) => Self::Int32(Vec::new()),
            Self::Int64(_) => Self::Int64(Vec::new()),
            Self::Float(_) => Self::Float(Vec::new()),
            Self::Double(_) => Self::Double(Vec::new()),
            Self::VarChar(_) => Self::VarChar(Vec::new()),
            Self::Json(_) => Self::Json(Vec::new()),
            Self::Array(a) => Self::Array(a.slice_rows(0, 0)),
            Self::BinaryVector(_) => Self::BinaryVector(Vec::new()),
            Self::FloatVector(_) => Self::FloatVector(Vec::new()),
            Self::Float16Vector(_) => Self::Float16Vector(Vec::new()),
            Self::BFloat16Vector(_) => Self::BFloat16Vector(Vec::new()),
            Self::Int8Vector(_) => Self::Int8Vector(Vec::new()),
            Self::SparseFloatVector(_) => Self::SparseFloatVector(Vec::new()),
            Self::Struct(fields) => Self::Struct(
                fields
                    .iter()
                    .map(|f| FieldData::new(f.name.clone(), f.column.empty_like()))
                    .collect(),
            ),
        }
    }

    /// Copy rows `[from, to)`. The caller guarantees the range is in bounds.
    fn slice_rows(&self, from: usize, to: usize) -> WireResult<Self> {
        let column = match self {
            Self::Bool(v) => Self::Bool(v[from..to].to_vec()),
            Self::Int8(v) => Self::Int8(v[from..to].to_vec()),
            Self::Int16(v) => Self::Int16(v[from..to].to_vec()),
            Self::Int32(v) => Self::Int32(v[from..to].to_vec()),
            Self::Int64(v) => Self::Int64(v[from..to].to_vec()),
            Self::Float(v) => Self::Float(v[from..to].to_vec()),
            Self::Double(v) => Self::Double(v[from..to].to_vec()),
            Self::VarChar(v) => Self::VarChar(v[from..to].to_vec()),
            Self::Json(v) => Self::Json(v[from..to].to_vec()),
            Self::Array(a) => Self::Array(a.slice_rows(from, to)),
            Self::BinaryVector(v) => Self::BinaryVector(v[from..to].to_vec()),
            Self::FloatVector(v) => Self::FloatVector(v[from..to].to_vec()),
            Self::Float16Vector(v) => Self::Float16Vector(v[from..to].to_vec()),
            Self::BFloat16Vector(v) => Self::BFloat16Vector(v[from..to].to_vec()),
            Self::Int8Vector(v) => Self::Int8Vector(v[from..to].to_vec()),
            Self::SparseFloatVector(v) => Self::SparseFloatVector(v[from..to].to_vec()),
            Self::Struct(fields) => Self::Struct(
                fields.iter().map(|f| f.slice(from, to)).collect::<WireResult<Vec<_>>>()?,
            ),
        };
        Ok(column)
    }

    /// JSON rendering of one row, `None` when out of bounds.
    fn value_at(&self, row: usize) -> Option<Value> {
        let value = match self {
            Self::Bool(v) => Value::Bool(*v.get(row)?),
            Self::Int8(v) => Value::from(*v.get(row)?),
            Self::Int16(v) => Value::from(*v.get(row)?),
            Self::Int32(v) => Value::from(*v.get(row)?),
            Self::Int64(v) => Value::from(*v.get(row)?),
            Self::Float(v) => float_value(f64::from(*v.get(row)?)),
            Self::Double(v) => float_value(*v.get(row)?),
            Self::VarChar(v) => Value::String(v.get(row)?.clone()),
            Self::Json(v) => v.get(row)?.clone(),
            Self::Array(a) => a.value_at(row)?,
            Self::BinaryVector(v) => Value::from(v.get(row)?.clone()),
            Self::FloatVector(v) => {
                Value::Array(v.get(row)?.iter().map(|&x| float_value(f64::from(x))).collect())
            }
            Self::Float16Vector(v) => Value::Array(
                v.get(row)?.iter().map(|&bits| float_value(f64::from(f16_to_f32(bits)))).collect(),
            ),
            Self::BFloat16Vector(v) => Value::Array(
                v.get(row)?.iter().map(|&bits| float_value(f64::from(bf16_to_f32(bits)))).collect(),
            ),
            Self::Int8Vector(v) => Value::from(v.get(row)?.clone()),
            Self::SparseFloatVector(v) => {
                let sparse = v.get(row)?;
                let map: Map<String, Value> = sparse
                    .iter()
                    .map(|&(idx, val)| (idx.to_string(), float_value(f64::from(val))))
                    .collect();
                Value::Object(map)
            }
            Self::Struct(fields) => {
                let mut map = Map::with_capacity(fields.len());
                for field in fields {
                    map.insert(field.name.clone(), field.column.value_at(row)?);
                }
                Value::Object(map)
            }
        };
        Some(value)
    }
}

fn float_value(x: f64) -> Value {
    Number::from_f64(x).map_or(Value::Null, Value::Number)
}

/// A named column.
///
/// # Example
///
/// ```
/// use manifoldb_wire::types::FieldData;
///
/// let ids = FieldData::int64("id", vec![10, 11, 12, 13]);
/// let tail = ids.slice(2, 10).unwrap();
/// assert_eq!(tail.as_int64(), Some(&[12, 13][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    /// The field name.
    pub name: String,
    /// The row values.
    pub column: Column,
}

impl FieldData {
    /// Create a column.
    #[must_use]
    pub fn new(name: impl Into<String>, column: Column) -> Self {
        Self { name: name.into(), column }
    }

    /// Create a boolean column.
    #[must_use]
    pub fn bool(name: impl Into<String>, values: Vec<bool>) -> Self {
        Self::new(name, Column::Bool(values))
    }

    /// Create a 32-bit integer column.
    #[must_use]
    pub fn int32(name: impl Into<String>, values: Vec<i32>) -> Self {
        Self::new(name, Column::Int32(values))
    }

    /// Create a 64-bit integer column.
    #[must_use]
    pub fn int64(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self::new(name, Column::Int64(values))
    }

    /// Create a float column.
    #[must_use]
    pub fn float(name: impl Into<String>, values: Vec<f32>) -> Self {
        Self::new(name, Column::Float(values))
    }

    /// Create a double column.
    #[must_use]
    pub fn double(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, Column::Double(values))
    }

    /// Create a string column.
    #[must_use]
    pub fn varchar<S: Into<String>>(name: impl Into<String>, values: Vec<S>) -> Self {
        Self::new(name, Column::VarChar(values.into_iter().map(Into::into).collect()))
    }

    /// Create a JSON column.
    #[must_use]
    pub fn json(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(name, Column::Json(values))
    }

    /// Create an array column.
    #[must_use]
    pub fn array(name: impl Into<String>, values: ArrayColumn) -> Self {
        Self::new(name, Column::Array(values))
    }

    /// Create a float32 vector column.
    #[must_use]
    pub fn float_vector(name: impl Into<String>, values: Vec<Vec<f32>>) -> Self {
        Self::new(name, Column::FloatVector(values))
    }

    /// Create a binary16 vector column from float32 values.
    #[must_use]
    pub fn float16_vector(name: impl Into<String>, values: &[Vec<f32>]) -> Self {
        let rows = values.iter().map(|row| row.iter().map(|&x| f32_to_f16(x)).collect()).collect();
        Self::new(name, Column::Float16Vector(rows))
    }

    /// Create a bfloat16 vector column from float32 values.
    #[must_use]
    pub fn bfloat16_vector(name: impl Into<String>, values: &[Vec<f32>]) -> Self {
        let rows =
            values.iter().map(|row| row.iter().map(|&x| f32_to_bf16(x)).collect()).collect();
        Self::new(name, Column::BFloat16Vector(rows))
    }

    /// Create a sparse vector column.
    #[must_use]
    pub fn sparse(name: impl Into<String>, values: Vec<SparseVector>) -> Self {
        Self::new(name, Column::SparseFloatVector(values))
    }

    /// Create a struct column from sub-columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the sub-columns have different row counts.
    pub fn structure(name: impl Into<String>, fields: Vec<FieldData>) -> WireResult<Self> {
        let name = name.into();
        if let Some(first) = fields.first() {
            let expected = first.len();
            if let Some(bad) = fields.iter().find(|f| f.len() != expected) {
                return Err(WireError::RowCountMismatch {
                    field: format!("{name}.{}", bad.name),
                    expected,
                    actual: bad.len(),
                });
            }
        }
        Ok(Self::new(name, Column::Struct(fields)))
    }

    /// The field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The data type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.column.data_type()
    }

    /// The array element type, for array columns.
    #[must_use]
    pub const fn element_type(&self) -> Option<DataType> {
        match &self.column {
            Column::Array(a) => Some(a.element_type()),
            _ => None,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.column.len()
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }

    /// An empty column with the same name and type.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self::new(self.name.clone(), self.column.empty_like())
    }

    /// Copy rows `[from, min(to, len))` into a new column.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidRange`] if `from >= to` or `from >= len`.
    pub fn slice(&self, from: usize, to: usize) -> WireResult<Self> {
        let len = self.len();
        if from >= to || from >= len {
            return Err(WireError::InvalidRange { field: self.name.clone(), from, to, len });
        }
        let to = to.min(len);
        Ok(Self::new(self.name.clone(), self.column.slice_rows(from, to)?))
    }

    /// Append the rows of `other` to this column.
    ///
    /// The names of the two columns are not compared. Struct columns must have
    /// the same sub-column layout.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::TypeMismatch`] if the data types (or array element
    /// types) differ. On error `self` is left unchanged.
    pub fn append(&mut self, other: &FieldData) -> WireResult<()> {
        let mismatch = |expected: DataType, actual: DataType| WireError::TypeMismatch {
            field: self.name.clone(),
            expected,
            actual,
        };
        let (expected, actual) = (self.data_type(), other.data_type());
        if expected != actual {
            return Err(mismatch(expected, actual));
        }
        if let (Some(e), Some(a)) = (self.element_type(), other.element_type()) {
            if e != a {
                return Err(mismatch(e, a));
            }
        }

        match (&mut self.column, &other.column) {
            (Column::Bool(a), Column::Bool(b)) => a.extend_from_slice(b),
            (Column::Int8(a), Column::Int8(b)) => a.extend_from_slice(b),
            (Column::Int16(a), Column::Int16(b)) => a.extend_from_slice(b),
            (Column::Int32(a), Column::Int32(b)) => a.extend_from_slice(b),
            (Column::Int64(a), Column::Int64(b)) => a.extend_from_slice(b),
            (Column::Float(a), Column::Float(b)) => a.extend_from_slice(b),
            (Column::Double(a), Column::Double(b)) => a.extend_from_slice(b),
            (Column::VarChar(a), Column::VarChar(b)) => a.extend_from_slice(b),
            (Column::Json(a), Column::Json(b)) => a.extend_from_slice(b),
            (Column::Array(a), Column::Array(b)) => {
                if !a.append_rows(b) {
                    return Err(WireError::TypeMismatch {
                        field: self.name.clone(),
                        expected: DataType::Array,
                        actual: DataType::Array,
                    });
                }
            }
            (Column::BinaryVector(a), Column::BinaryVector(b)) => a.extend_from_slice(b),
            (Column::FloatVector(a), Column::FloatVector(b)) => a.extend_from_slice(b),
            (Column::Float16Vector(a), Column::Float16Vector(b)) => a.extend_from_slice(b),
            (Column::BFloat16Vector(a), Column::BFloat16Vector(b)) => a.extend_from_slice(b),
            (Column::Int8Vector(a), Column::Int8Vector(b)) => a.extend_from_slice(b),
            (Column::SparseFloatVector(a), Column::SparseFloatVector(b)) => a.extend_from_slice(b),
            (Column::Struct(a), Column::Struct(b)) => {
                if !same_sub_fields(a, b) {
                    return Err(WireError::invalid_value(format!(
                        "struct field '{}' has a different sub-field layout",
                        self.name
                    )));
                }
                for (x, y) in a.iter_mut().zip(b) {
                    x.append(y)?;
                }
            }
            _ => return Err(mismatch(expected, actual)),
        }
        Ok(())
    }

    /// Types match, and struct sub-fields match by name and type at every depth.
    fn same_layout(&self, other: &FieldData) -> bool {
        self.data_type() == other.data_type()
            && self.element_type() == other.element_type()
            && match (&self.column, &other.column) {
                (Column::Struct(a), Column::Struct(b)) => same_sub_fields(a, b),
                _ => true,
            }
    }

    /// JSON rendering of one row. Half-precision vectors render as floats.
    #[must_use]
    pub fn value_at(&self, row: usize) -> Option<Value> {
        self.column.value_at(row)
    }

    /// Boolean values, if this is a boolean column.
    #[must_use]
    pub fn as_bool(&self) -> Option<&[bool]> {
        match &self.column {
            Column::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Int64 values, if this is an int64 column.
    #[must_use]
    pub fn as_int64(&self) -> Option<&[i64]> {
        match &self.column {
            Column::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Float values, if this is a float column.
    #[must_use]
    pub fn as_float(&self) -> Option<&[f32]> {
        match &self.column {
            Column::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Double values, if this is a double column.
    #[must_use]
    pub fn as_double(&self) -> Option<&[f64]> {
        match &self.column {
            Column::Double(v) => Some(v),
            _ => None,
        }
    }

    /// String values, if this is a varchar column.
    #[must_use]
    pub fn as_varchar(&self) -> Option<&[String]> {
        match &self.column {
            Column::VarChar(v) => Some(v),
            _ => None,
        }
    }

    /// JSON values, if this is a JSON column.
    #[must_use]
    pub fn as_json(&self) -> Option<&[Value]> {
        match &self.column {
            Column::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Float32 vectors, if this is a float vector column.
    #[must_use]
    pub fn as_float_vector(&self) -> Option<&[Vec<f32>]> {
        match &self.column {
            Column::FloatVector(v) => Some(v),
            _ => None,
        }
    }

    /// Sparse vectors, if this is a sparse vector column.
    #[must_use]
    pub fn as_sparse(&self) -> Option<&[SparseVector]> {
        match &self.column {
            Column::SparseFloatVector(v) => Some(v),
            _ => None,
        }
    }

    /// Sub-columns, if this is a struct column.
    #[must_use]
    pub fn as_struct(&self) -> Option<&[FieldData]> {
        match &self.column {
            Column::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// A half-precision vector row widened to float32.
    #[must_use]
    pub fn half_vector_as_f32(&self, row: usize) -> Option<Vec<f32>> {
        match &self.column {
            Column::Float16Vector(v) => Some(v.get(row)?.iter().map(|&b| f16_to_f32(b)).collect()),
            Column::BFloat16Vector(v) => {
                Some(v.get(row)?.iter().map(|&b| bf16_to_f32(b)).collect())
            }
            _ => None,
        }
    }
}

fn same_sub_fields(a: &[FieldData], b: &[FieldData]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.name == y.name && x.same_layout(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slice_clamps_end() {
        let col = FieldData::varchar("name", vec!["a", "b", "c"]);
        let sliced = col.slice(1, 100).expect("valid range");
        assert_eq!(sliced.as_varchar(), Some(&["b".to_string(), "c".to_string()][..]));
        assert_eq!(sliced.name(), "name");
        // Source is untouched.
        assert_eq!(col.len(), 3);
    }

    #[test]
    fn test_slice_rejects_bad_ranges() {
        let col = FieldData::int64("id", vec![1, 2, 3]);
        assert!(matches!(col.slice(2, 2), Err(WireError::InvalidRange { .. })));
        assert!(matches!(col.slice(3, 5), Err(WireError::InvalidRange { .. })));
        assert!(matches!(col.slice(2, 1), Err(WireError::InvalidRange { .. })));
    }

    #[test]
    fn test_append_same_type() {
        let mut a = FieldData::float("score", vec![0.1, 0.2]);
        let b = FieldData::float("other_name", vec![0.3]);
        a.append(&b).expect("same type");
        assert_eq!(a.as_float(), Some(&[0.1, 0.2, 0.3][..]));
    }

    #[test]
    fn test_append_type_mismatch_leaves_target() {
        let mut a = FieldData::int64("id", vec![1]);
        let b = FieldData::int32("id", vec![2]);
        let err = a.append(&b).expect_err("mismatch");
        assert!(matches!(
            err,
            WireError::TypeMismatch { expected: DataType::Int64, actual: DataType::Int32, .. }
        ));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_append_array_element_mismatch() {
        let mut a = FieldData::array("tags", ArrayColumn::Int64(vec![vec![1, 2]]));
        let b = FieldData::array("tags", ArrayColumn::VarChar(vec![vec!["x".into()]]));
        assert!(a.append(&b).is_err());

        let c = FieldData::array("tags", ArrayColumn::Int64(vec![vec![3]]));
        a.append(&c).expect("same element type");
        assert_eq!(a.len(), 2);
        assert_eq!(a.element_type(), Some(DataType::Int64));
        assert_eq!(a.value_at(1), Some(json!([3])));
    }

    #[test]
    fn test_struct_slice_and_append() {
        let make = |ids: Vec<i64>, names: Vec<&str>| {
            FieldData::structure(
                "meta",
                vec![FieldData::int64("n", ids), FieldData::varchar("label", names)],
            )
            .expect("equal rows")
        };
        let mut a = make(vec![1, 2, 3], vec!["x", "y", "z"]);
        let tail = a.slice(1, 3).expect("valid range");
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.value_at(0), Some(json!({"n": 2, "label": "y"})));

        a.append(&make(vec![4], vec!["w"])).expect("same layout");
        assert_eq!(a.len(), 4);

        let other = FieldData::structure("meta", vec![FieldData::int64("n", vec![9])])
            .expect("single column");
        assert!(a.append(&other).is_err());
    }

    #[test]
    fn test_nested_struct_mismatch_leaves_target() {
        let make = |inner: FieldData| {
            FieldData::structure(
                "meta",
                vec![
                    FieldData::int64("n", vec![1]),
                    FieldData::structure("inner", vec![inner]).expect("one column"),
                ],
            )
            .expect("equal rows")
        };
        let mut a = make(FieldData::int64("x", vec![1]));
        let b = make(FieldData::varchar("x", vec!["1"]));
        assert!(a.append(&b).is_err());
        assert_eq!(a.len(), 1);
        assert_eq!(a.value_at(0), Some(json!({"n": 1, "inner": {"x": 1}})));

        a.append(&make(FieldData::int64("x", vec![2]))).expect("same layout");
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_struct_requires_equal_rows() {
        let err = FieldData::structure(
            "meta",
            vec![FieldData::int64("a", vec![1, 2]), FieldData::int64("b", vec![1])],
        );
        assert!(matches!(err, Err(WireError::RowCountMismatch { .. })));
    }

    #[test]
    fn test_value_at_renders_rows() {
        assert_eq!(FieldData::bool("b", vec![true]).value_at(0), Some(json!(true)));
        assert_eq!(FieldData::int64("i", vec![7]).value_at(0), Some(json!(7)));
        assert_eq!(FieldData::double("d", vec![0.5]).value_at(0), Some(json!(0.5)));
        assert_eq!(FieldData::double("d", vec![f64::NAN]).value_at(0), Some(Value::Null));
        assert_eq!(
            FieldData::json("j", vec![json!({"k": [1, 2]})]).value_at(0),
            Some(json!({"k": [1, 2]}))
        );
        let sparse = SparseVector::new(vec![(3, 0.5)]).expect("valid");
        assert_eq!(FieldData::sparse("s", vec![sparse]).value_at(0), Some(json!({"3": 0.5})));
        assert_eq!(FieldData::int64("i", vec![7]).value_at(1), None);
    }

    #[test]
    fn test_half_vectors() {
        let col = FieldData::float16_vector("v", &[vec![1.0, -0.5]]);
        assert_eq!(col.data_type(), DataType::Float16Vector);
        assert_eq!(col.half_vector_as_f32(0), Some(vec![1.0, -0.5]));
        assert_eq!(col.value_at(0), Some(json!([1.0, -0.5])));

        let col = FieldData::bfloat16_vector("v", &[vec![2.0]]);
        assert_eq!(col.half_vector_as_f32(0), Some(vec![2.0]));
    }

    #[test]
    fn test_empty_like_keeps_type() {
        let col = FieldData::array("tags", ArrayColumn::Double(vec![vec![1.0]]));
        let empty = col.empty_like();
        assert!(empty.is_empty());
        assert_eq!(empty.element_type(), Some(DataType::Double));
    }
}
