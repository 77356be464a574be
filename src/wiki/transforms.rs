//! Built-in stages
//!
//!     Each stage module exports its `NAME` and `RANK` next to the stage type. Ranks leave
//!     gaps so hosts can slot their own stages in between:
//!
//!         100  attributes    raw attribute text -> name/value pairs
//!         150  references    <ref> numbering (shared across expansions)
//!         200  expansion     {{templates}} -> nested dispatch
//!         300  quotes        '' and ''' -> i / b
//!         400  lists         * # ; : -> ul / ol / dl
//!         500  tag_balance   well-nested output
//!
//!     Nested expansions only run stages ranked at or below the requesting stage, so a
//!     template body reaches quotes, lists and balancing as part of its parent document.
//!     [`standard`] assembles all of them into a recipe.

pub mod attributes;
pub mod expansion;
pub mod lists;
pub mod quotes;
pub mod references;
pub mod standard;
pub mod tag_balance;

pub use attributes::{parse_attributes, AttributeStage};
pub use expansion::{ExpansionStage, InMemoryTemplates, TemplateSource};
pub use lists::ListStage;
pub use quotes::QuoteStage;
pub use references::ReferenceStage;
pub use standard::{standard_dispatcher, standard_recipe};
pub use tag_balance::TagBalanceStage;
