//! Data layer: the in-memory data point model

pub mod types;

pub use types::{
    DataPoint, Dimension, DimensionSignature, MetricType, Value, ValueKind, dimension_set_key,
};
