//! Engine configuration
//!
//! Controls which WebAssembly proposals the translator accepts and how deep
//! guest recursion may go before the interpreter traps.

use bitflags::bitflags;
use serde::Deserialize;

/// Default maximum number of active call frames in one invocation
pub const DEFAULT_CALL_STACK_CEILING: usize = 2000;

bitflags! {
    /// WebAssembly proposals enabled for translation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct Features: u32 {
        /// `i32.extend8_s` and friends
        const SIGN_EXTENSION_OPS = 1 << 0;
        /// Functions and blocks with more than one result
        const MULTI_VALUE = 1 << 1;
        /// Shared memory with atomic wait/notify
        const THREADS = 1 << 2;
    }
}

impl Features {
    /// The WebAssembly 2.0 proposals the translator gates
    pub const V2: Features = Features::SIGN_EXTENSION_OPS.union(Features::MULTI_VALUE);

    /// Name of a single feature flag, as used in error messages
    pub fn feature_name(self) -> &'static str {
        match self {
            f if f == Features::SIGN_EXTENSION_OPS => "sign-extension-ops",
            f if f == Features::MULTI_VALUE => "multi-value",
            f if f == Features::THREADS => "threads",
            _ => "unknown",
        }
    }
}

impl Default for Features {
    fn default() -> Self {
        Features::V2
    }
}

/// Configuration shared by every module compiled with one engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Proposals accepted by the translator
    pub features: Features,
    /// Maximum number of frames (guest and host) active in one invocation
    pub call_stack_ceiling: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            features: Features::default(),
            call_stack_ceiling: DEFAULT_CALL_STACK_CEILING,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_call_stack_ceiling(mut self, ceiling: usize) -> Self {
        self.call_stack_ceiling = ceiling;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.call_stack_ceiling, DEFAULT_CALL_STACK_CEILING);
        assert!(config.features.contains(Features::SIGN_EXTENSION_OPS));
        assert!(!config.features.contains(Features::THREADS));
    }

    #[test]
    fn from_json_partial() {
        let config = EngineConfig::from_json(r#"{"call_stack_ceiling": 10}"#).unwrap();
        assert_eq!(config.call_stack_ceiling, 10);
        assert_eq!(config.features, Features::V2);
    }

    #[test]
    fn from_json_features() {
        let config = EngineConfig::from_json(r#"{"features": "THREADS | MULTI_VALUE"}"#).unwrap();
        assert_eq!(config.features, Features::THREADS | Features::MULTI_VALUE);
        assert_eq!(config.call_stack_ceiling, DEFAULT_CALL_STACK_CEILING);
    }

    #[test]
    fn from_json_rejects_unknown_fields() {
        assert!(EngineConfig::from_json(r#"{"ceiling": 1}"#).is_err());
    }

    #[test]
    fn from_json_rejects_unknown_features() {
        assert!(EngineConfig::from_json(r#"{"features": "MUTABLE_GLOBAL"}"#).is_err());
    }

    #[test]
    fn feature_names() {
        assert_eq!(Features::SIGN_EXTENSION_OPS.feature_name(), "sign-extension-ops");
        assert_eq!(Features::THREADS.feature_name(), "threads");
    }
}
