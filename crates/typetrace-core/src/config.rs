//! Explicit tunables for sampling, shrinking, and rewriting.
//!
//! Every knob is carried in a [`CoreConfig`] value passed into the relevant
//! entry point; there are no ambient/global defaults to mutate.

use serde::{Deserialize, Serialize};

use crate::errors::{TraceError, TraceResult};

/// Field-count ceiling for structural record inference. A mapping with more
/// distinct string keys than this is kept as a generic mapping. Zero disables
/// record inference entirely.
pub const DEFAULT_MAX_RECORD_SIZE: usize = 100;

/// Unions with more members than this are collapsed to `Unknown` by
/// [`CapUnionSize`](crate::rewrite::CapUnionSize).
pub const DEFAULT_MAX_UNION_MEMBERS: usize = 10;

/// How many stored samples the shrinker considers per call site.
pub const DEFAULT_SAMPLE_LIMIT: usize = 2000;

/// Tunable parameters threaded through the inference pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Structural-record field-count ceiling; 0 disables record inference.
    pub max_record_size: usize,
    /// Union-member cap applied by the large-union rewriter.
    pub max_union_members: usize,
    /// Maximum number of samples considered per call site.
    pub sample_limit: usize,
    /// Collapse a zero-field inferred record to a generic empty mapping
    /// instead of emitting a vacuous record.
    pub collapse_empty_record: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            max_union_members: DEFAULT_MAX_UNION_MEMBERS,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            collapse_empty_record: true,
        }
    }
}

impl CoreConfig {
    /// Build a validated configuration. Misuse is rejected here, not deep
    /// inside shrinking.
    pub fn new(
        max_record_size: usize,
        max_union_members: usize,
        sample_limit: usize,
    ) -> TraceResult<Self> {
        if max_union_members < 2 {
            return Err(TraceError::Config(format!(
                "max_union_members must be at least 2, got {max_union_members}"
            )));
        }
        if sample_limit == 0 {
            return Err(TraceError::Config(
                "sample_limit must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_record_size,
            max_union_members,
            sample_limit,
            collapse_empty_record: true,
        })
    }

    /// Override the zero-field record collapse policy.
    pub fn with_collapse_empty_record(mut self, collapse: bool) -> Self {
        self.collapse_empty_record = collapse;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.max_record_size, DEFAULT_MAX_RECORD_SIZE);
        assert_eq!(config.max_union_members, DEFAULT_MAX_UNION_MEMBERS);
        assert_eq!(config.sample_limit, DEFAULT_SAMPLE_LIMIT);
        assert!(config.collapse_empty_record);
    }

    #[test]
    fn test_new_valid() {
        let config = CoreConfig::new(10, 5, 100).unwrap();
        assert_eq!(config.max_record_size, 10);
        assert_eq!(config.max_union_members, 5);
        assert_eq!(config.sample_limit, 100);
    }

    #[test]
    fn test_new_rejects_tiny_union_cap() {
        assert!(CoreConfig::new(10, 1, 100).is_err());
        assert!(CoreConfig::new(10, 0, 100).is_err());
    }

    #[test]
    fn test_new_rejects_zero_sample_limit() {
        assert!(CoreConfig::new(10, 5, 0).is_err());
    }

    #[test]
    fn test_zero_record_size_is_allowed() {
        // 0 is the documented "disable record inference" value.
        let config = CoreConfig::new(0, 5, 100).unwrap();
        assert_eq!(config.max_record_size, 0);
    }

    #[test]
    fn test_with_collapse_empty_record() {
        let config = CoreConfig::default().with_collapse_empty_record(false);
        assert!(!config.collapse_empty_record);
    }
}
