//! Staged token dispatch
//!
//!     The pipeline half of wikiflow. A [`PipelineRecipe`] lists stage factories in rank
//!     order; a [`QueueDispatcher`] runs token streams through fresh instances of those
//!     stages and yields the finished stream lazily.
//!
//!         text -> Tokenizer -> [stage 0] -> [stage 1] -> ... -> sink -> caller
//!                                 ^                |
//!                                 +-- nested ------+   (expansion requests)
//!
//!     - [`stage`]: the [`Stage`] trait and what stages answer with ([`Emission`]).
//!     - [`builder`]: registering stage factories.
//!     - [`context`]: state shared by one document and its nested expansions.
//!     - [`dispatcher`]: the driving loop, numbering, ordering checks and expansion.
//!     - [`error`]: stage and pipeline errors.

pub mod builder;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod stage;

pub use builder::{PipelineBuilder, PipelineRecipe, StageFactory};
pub use context::DispatchContext;
pub use dispatcher::{Dispatch, QueueDispatcher};
pub use error::{PipelineAbortError, PipelineBuildError, PipelineError, StageError};
pub use stage::{Emission, Emit, Expansion, ExpansionScope, Stage, StageContext};
