//! # wikiflow
//!
//! A streaming tokenizer for wikitext-like markup and a staged dispatcher that runs the
//! token stream through ordered transformation stages, expanding templates recursively.
//!
//!     let templates = Arc::new(InMemoryTemplates::new().with("hi", "''hello''"));
//!     let dispatcher = standard_dispatcher(templates, DispatchConfig::default())?;
//!     for token in dispatcher.dispatch_text("*{{hi}}") {
//!         println!("{}", token?);
//!     }
//!
//! ## Layout
//!
//! - [`wiki::token`]: tokens, hierarchical ids, source ranges.
//! - [`wiki::lexing`]: the pull tokenizer.
//! - [`wiki::pipeline`]: stages, recipes and the queue dispatcher.
//! - [`wiki::transforms`]: the built-in stages.
//! - [`wiki::config`]: layered configuration.
//! - [`wiki::formats`]: detokenizing and serializing token streams.
//!
//! ## Testing
//!
//! Shared helpers live in the [testing module](wiki::testing).

pub mod wiki;

pub use wiki::config::{DispatchConfig, WikiflowConfig};
pub use wiki::lexing::{tokenize, Tokenizer};
pub use wiki::pipeline::{PipelineError, PipelineRecipe, QueueDispatcher, Stage};
pub use wiki::token::{Token, TokenId, TokenKind};
pub use wiki::transforms::{standard_dispatcher, standard_recipe, InMemoryTemplates, TemplateSource};
