use std::time::Duration;

use crate::merge::MergeConfig;
use crate::unate::UnateStrategyKind;

/// Knobs of the synthesis pipeline.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SynthesisConfig {
    /// Unate reduction to run first, if any.
    pub unate: Option<UnateStrategyKind>,
    /// Largest complement allowed by the exact unate test, relative to the automaton.
    pub complement_multiplier: usize,
    pub unate_timeout: Option<Duration>,
    pub dependency_timeout: Option<Duration>,
    /// Also look for inputs determined by the other variables. Reported only.
    pub find_input_dependencies: bool,
    pub fast_dependency_check: bool,
    /// Treat every output as independent.
    pub skip_dependencies: bool,
    pub merge: MergeConfig,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            unate: None,
            complement_multiplier: 5,
            unate_timeout: None,
            dependency_timeout: None,
            find_input_dependencies: false,
            fast_dependency_check: false,
            skip_dependencies: false,
            merge: MergeConfig::default(),
        }
    }
}

impl SynthesisConfig {
    pub fn with_unate(mut self, unate: Option<UnateStrategyKind>) -> Self {
        self.unate = unate;
        self
    }

    pub fn with_complement_multiplier(mut self, multiplier: usize) -> Self {
        self.complement_multiplier = multiplier;
        self
    }

    pub fn with_unate_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.unate_timeout = timeout;
        self
    }

    pub fn with_dependency_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dependency_timeout = timeout;
        self
    }

    pub fn with_input_dependencies(mut self, enabled: bool) -> Self {
        self.find_input_dependencies = enabled;
        self
    }

    pub fn with_fast_dependency_check(mut self, enabled: bool) -> Self {
        self.fast_dependency_check = enabled;
        self
    }

    pub fn with_skip_dependencies(mut self, skip: bool) -> Self {
        self.skip_dependencies = skip;
        self
    }

    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }
}
