// =============================================================================
// Delta Translation
// =============================================================================

/// Default maximum age of a delta cache entry, in seconds
pub const DEFAULT_DELTA_TRANSLATION_TTL_SECS: u64 = 3600;

/// Delta cache updates between two expiry sweeps
pub const DELTA_CACHE_SWEEP_INTERVAL: u64 = 256;

// =============================================================================
// Dimensions
// =============================================================================

/// Non-alphanumeric characters allowed in dimension keys by default
pub const DEFAULT_NONALPHANUMERIC_DIMENSION_CHARS: &str = "_-.";

/// Replacement for disallowed dimension key characters
pub const DIMENSION_KEY_REPLACEMENT: char = '_';

// =============================================================================
// Converted Metric Names
// =============================================================================

/// Suffix for histogram/summary point counts
pub const COUNT_SUFFIX: &str = "_count";

/// Suffix for histogram/summary value sums
pub const SUM_SUFFIX: &str = "_sum";

/// Suffix for histogram bucket counts
pub const BUCKET_SUFFIX: &str = "_bucket";

/// Suffix for summary quantile values
pub const QUANTILE_SUFFIX: &str = "_quantile";

/// Dimension carrying a histogram bucket's upper bound
pub const UPPER_BOUND_DIMENSION: &str = "upper_bound";

/// Dimension carrying a summary quantile
pub const QUANTILE_DIMENSION: &str = "quantile";

/// Upper bound of the overflow bucket
pub const INFINITY_BOUND: &str = "+Inf";
