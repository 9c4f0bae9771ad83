//! Data types shared by requests and responses.
//!
//! This module defines typed result columns, the result containers built from
//! them, and the small enums (data types, consistency levels, metrics) that
//! appear on the wire.

mod field_data;
mod level;
mod results;
mod schema;
mod sparse;

pub use field_data::{ArrayColumn, Column, FieldData};
pub use level::{ConsistencyLevel, MetricType};
pub use results::{PrimaryKey, QueryResults, SingleResult};
pub use schema::{DataType, FieldSchema};
pub use sparse::SparseVector;
