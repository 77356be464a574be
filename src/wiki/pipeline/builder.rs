//! Pipeline assembly
//!
//! Stages are registered as factories because every nested expansion needs fresh instances.
//! The builder constructs each factory's stage once to learn its name, rank and whether it is
//! shareable, rejects duplicate names and sorts by rank (registration order breaks ties).

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::error::PipelineBuildError;
use super::stage::Stage;

/// Constructs a fresh stage instance.
pub type StageFactory = Arc<dyn Fn() -> Box<dyn Stage> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct StageSpec {
    pub(crate) name: String,
    pub(crate) rank: u32,
    pub(crate) shareable: bool,
    pub(crate) factory: StageFactory,
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("name", &self.name)
            .field("rank", &self.rank)
            .field("shareable", &self.shareable)
            .finish()
    }
}

/// An ordered, immutable list of stage factories. Cheap to clone and safe to share between
/// threads; each dispatch builds its own stage instances from it.
#[derive(Debug, Clone)]
pub struct PipelineRecipe {
    stages: Arc<[StageSpec]>,
}

impl PipelineRecipe {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) fn specs(&self) -> &[StageSpec] {
        &self.stages
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    factories: Vec<StageFactory>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        PipelineBuilder::default()
    }

    pub fn stage<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Stage> + Send + Sync + 'static,
    {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn stage_factory(mut self, factory: StageFactory) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn build(self) -> Result<PipelineRecipe, PipelineBuildError> {
        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(self.factories.len());
        for factory in self.factories {
            let probe = factory();
            let name = probe.name().to_string();
            if !seen.insert(name.clone()) {
                return Err(PipelineBuildError::DuplicateStage(name));
            }
            specs.push(StageSpec {
                name,
                rank: probe.rank(),
                shareable: probe.shareable(),
                factory,
            });
        }
        specs.sort_by_key(|spec| spec.rank);
        Ok(PipelineRecipe {
            stages: specs.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::testing::PassThrough;

    #[test]
    fn test_stages_sorted_by_rank() {
        let recipe = PipelineBuilder::new()
            .stage(|| Box::new(PassThrough::new("late", 300)))
            .stage(|| Box::new(PassThrough::new("early", 100)))
            .stage(|| Box::new(PassThrough::new("tie", 300)))
            .build()
            .unwrap();
        assert_eq!(recipe.stage_names(), vec!["early", "late", "tie"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = PipelineBuilder::new()
            .stage(|| Box::new(PassThrough::new("a", 1)))
            .stage(|| Box::new(PassThrough::new("a", 2)))
            .build()
            .unwrap_err();
        assert_eq!(err, PipelineBuildError::DuplicateStage("a".to_string()));
    }

    #[test]
    fn test_recipe_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineRecipe>();
    }
}
