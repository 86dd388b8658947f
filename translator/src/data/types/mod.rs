//! Canonical data model shared by translation, filtering and conversion

mod datapoint;
mod signature;

pub use datapoint::{DataPoint, Dimension, MetricType, Value, ValueKind};
pub use signature::{DimensionSignature, dimension_set_key};
