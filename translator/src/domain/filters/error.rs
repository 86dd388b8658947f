//! Filter error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid filter pattern \"{pattern}\": {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Metric filter must name at least one metric or dimension")]
    EmptyFilter,

    #[error("Filter for dimension \"{key}\" has no values")]
    EmptyDimensionValues { key: String },

    #[error("Failed to parse metric filters: {0}")]
    ParseError(String),
}
