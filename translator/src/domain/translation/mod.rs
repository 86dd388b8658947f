//! Rule-driven metric translation
//!
//! - `rules`: the closed set of rule kinds and their validation
//! - `translator`: the rule engine
//! - `delta`: previous observations of cumulative series
//! - `defaults`: the embedded default rule table

mod defaults;
mod delta;
mod error;
mod rules;
mod translator;

pub use defaults::{default_translation_rules, parse_rules};
pub use delta::{CacheEntry, DeltaCache};
pub use error::TranslationError;
pub use rules::{AggregationMethod, MetricOperator, Rule};
pub use translator::MetricTranslator;
