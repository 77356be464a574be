//! Configuration loading
//!
//! `defaults/wikiflow.default.toml` is embedded into the library so that documented defaults
//! and runtime behavior never drift apart. Callers layer TOML text and key overrides on top
//! with [`Loader`] before deserializing into [`WikiflowConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;

use crate::wiki::lexing::DEFAULT_LOOKAHEAD_LIMIT;

const DEFAULT_TOML: &str = include_str!("../../defaults/wikiflow.default.toml");

/// Nesting limit used when nothing else is configured.
pub const DEFAULT_MAX_EXPANSION_DEPTH: usize = 40;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WikiflowConfig {
    pub dispatch: DispatchConfig,
}

/// Knobs of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DispatchConfig {
    /// Nested expansions allowed below one top-level document.
    pub max_expansion_depth: usize,
    /// Lexemes the tokenizer may buffer while looking for a closing delimiter.
    pub lookahead_limit: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            max_expansion_depth: DEFAULT_MAX_EXPANSION_DEPTH,
            lookahead_limit: DEFAULT_LOOKAHEAD_LIMIT,
        }
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer TOML text, e.g. a configuration block embedded in a host document.
    pub fn with_toml_str(mut self, toml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(toml, FileFormat::Toml));
        self
    }

    /// Apply a single key/value override.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<WikiflowConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<WikiflowConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(config.dispatch, DispatchConfig::default());
        assert_eq!(config.dispatch.max_expansion_depth, 40);
        assert_eq!(config.dispatch.lookahead_limit, 256);
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("dispatch.max_expansion_depth", 2_i64)
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert_eq!(config.dispatch.max_expansion_depth, 2);
        assert_eq!(config.dispatch.lookahead_limit, 256);
    }

    #[test]
    fn layers_toml_text() {
        let config = Loader::new()
            .with_toml_str("[dispatch]\nlookahead_limit = 16\n")
            .build()
            .expect("config to build");
        assert_eq!(config.dispatch.lookahead_limit, 16);
        assert_eq!(config.dispatch.max_expansion_depth, 40);
    }
}
