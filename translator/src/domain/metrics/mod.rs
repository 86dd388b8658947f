//! OTLP metric conversion

mod converter;
mod error;
mod extract;

pub use converter::MetricsConverter;
pub use error::ConverterError;
pub use extract::extract_data_points;
