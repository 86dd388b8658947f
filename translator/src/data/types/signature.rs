//! Order-independent time series identity

use std::fmt;

use super::datapoint::Dimension;

const FIELD_SEP: char = '\u{1f}';
const PAIR_SEP: char = '\u{1e}';

/// Metric name plus sorted dimension pairs.
///
/// Two points with the same name and dimension set produce equal signatures
/// regardless of dimension order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionSignature(String);

impl DimensionSignature {
    pub fn new(metric: &str, dimensions: &[Dimension]) -> Self {
        let mut key = String::with_capacity(metric.len() + dimensions.len() * 16);
        key.push_str(metric);
        key.push(PAIR_SEP);
        key.push_str(&dimension_set_key(dimensions));
        Self(key)
    }
}

impl fmt::Display for DimensionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order-independent key over the dimension set alone (no metric name)
pub fn dimension_set_key(dimensions: &[Dimension]) -> String {
    let mut pairs: Vec<&Dimension> = dimensions.iter().collect();
    pairs.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.value.cmp(&b.value)));

    let mut key = String::new();
    for (i, d) in pairs.iter().enumerate() {
        if i > 0 {
            key.push(PAIR_SEP);
        }
        key.push_str(&d.key);
        key.push(FIELD_SEP);
        key.push_str(&d.value);
    }
    key
}
