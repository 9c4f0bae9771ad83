//! Column data types and field schemas.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The data type of a column.
///
/// `Array` columns additionally carry an element type, see
/// [`FieldData::element_type`](super::FieldData::element_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean.
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    VarChar,
    /// JSON document.
    Json,
    /// Array of scalars.
    Array,
    /// Bit-packed binary vector.
    BinaryVector,
    /// Dense float32 vector.
    FloatVector,
    /// Dense IEEE half-precision vector.
    Float16Vector,
    /// Dense bfloat16 vector.
    BFloat16Vector,
    /// Dense int8 vector.
    Int8Vector,
    /// Sparse float vector.
    SparseFloatVector,
    /// Struct of arrays.
    Struct,
}

impl DataType {
    /// Returns `true` for the vector types.
    #[must_use]
    pub const fn is_vector(self) -> bool {
        matches!(
            self,
            Self::BinaryVector
                | Self::FloatVector
                | Self::Float16Vector
                | Self::BFloat16Vector
                | Self::Int8Vector
                | Self::SparseFloatVector
        )
    }

    /// Returns `true` if the type can be used as a primary key.
    #[must_use]
    pub const fn is_primary_key_type(self) -> bool {
        matches!(self, Self::Int64 | Self::VarChar)
    }

    /// Returns the type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::VarChar => "VarChar",
            Self::Json => "JSON",
            Self::Array => "Array",
            Self::BinaryVector => "BinaryVector",
            Self::FloatVector => "FloatVector",
            Self::Float16Vector => "Float16Vector",
            Self::BFloat16Vector => "BFloat16Vector",
            Self::Int8Vector => "Int8Vector",
            Self::SparseFloatVector => "SparseFloatVector",
            Self::Struct => "Struct",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Schema of a single field.
///
/// The iterators only need the name and type of the primary key; the other
/// attributes are carried so a schema fetched from the server round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Field type.
    pub data_type: DataType,
    /// Element type for `Array` fields.
    pub element_type: Option<DataType>,
    /// Whether this is the primary key.
    pub is_primary_key: bool,
    /// Whether the server generates the primary key.
    pub auto_id: bool,
    /// Vector dimension, for dense vector fields.
    pub dimension: Option<u32>,
}

impl FieldSchema {
    /// Create a schema for a plain field.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            element_type: None,
            is_primary_key: false,
            auto_id: false,
            dimension: None,
        }
    }

    /// Create a primary-key schema.
    #[must_use]
    pub fn primary_key(name: impl Into<String>, data_type: DataType) -> Self {
        Self { is_primary_key: true, ..Self::new(name, data_type) }
    }

    /// Set the array element type.
    #[must_use]
    pub const fn with_element_type(mut self, element_type: DataType) -> Self {
        self.element_type = Some(element_type);
        self
    }

    /// Set the vector dimension.
    #[must_use]
    pub const fn with_dimension(mut self, dimension: u32) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Mark the primary key as server-generated.
    #[must_use]
    pub const fn with_auto_id(mut self, auto_id: bool) -> Self {
        self.auto_id = auto_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_types() {
        assert!(DataType::Int64.is_primary_key_type());
        assert!(DataType::VarChar.is_primary_key_type());
        assert!(!DataType::Int32.is_primary_key_type());
        assert!(!DataType::FloatVector.is_primary_key_type());
    }

    #[test]
    fn test_schema_builder() {
        let schema = FieldSchema::primary_key("id", DataType::Int64).with_auto_id(true);
        assert!(schema.is_primary_key);
        assert!(schema.auto_id);
        assert_eq!(schema.data_type.to_string(), "Int64");
    }
}
