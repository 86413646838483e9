//! Configuration module for policy discovery
//!
//! Provides `DiscoveryConfig`, its builder, and the multilingual term
//! dictionary the extractors match against.

// Sub-modules
pub mod builder;
pub mod dictionary;
pub mod getters;
pub mod methods;
pub mod types;

use std::path::PathBuf;

use thiserror::Error;

// Re-exports for public API
pub use builder::DiscoveryConfigBuilder;
pub use dictionary::{KindTerms, TermDictionary};
pub use types::{DiscoveryConfig, FetchSettings, RenderSettings, ScoringWeights, SiteSettings};

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
