//! Per-document dispatch state
//!
//! One [`DispatchContext`] exists per top-level document. It is threaded by `&mut` through
//! every nested expansion and holds the only state those share: the expansion depth and the
//! instances of shareable stages.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::wiki::config::DispatchConfig;

use super::builder::StageSpec;
use super::error::PipelineAbortError;
use super::stage::{Stage, StageContext};

pub(crate) type SharedStage = Rc<RefCell<Box<dyn Stage>>>;

pub struct DispatchContext {
    depth: usize,
    max_depth: usize,
    lookahead_limit: usize,
    shared: HashMap<usize, SharedStage>,
}

impl DispatchContext {
    pub fn new(config: &DispatchConfig) -> Self {
        DispatchContext {
            depth: 0,
            max_depth: config.max_expansion_depth,
            lookahead_limit: config.lookahead_limit,
            shared: HashMap::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn lookahead_limit(&self) -> usize {
        self.lookahead_limit
    }

    pub(crate) fn stage_context(&self) -> StageContext {
        StageContext::new(self.depth)
    }

    /// Enter one more level of expansion.
    pub(crate) fn enter(&mut self) -> Result<(), PipelineAbortError> {
        if self.depth >= self.max_depth {
            return Err(PipelineAbortError::DepthExceeded {
                max: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// The document-wide instance of the shareable stage at recipe position `index`.
    pub(crate) fn shared_stage(&mut self, index: usize, spec: &StageSpec) -> SharedStage {
        self.shared
            .entry(index)
            .or_insert_with(|| Rc::new(RefCell::new((spec.factory)())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_limit() {
        let mut cx = DispatchContext::new(&DispatchConfig {
            max_expansion_depth: 2,
            ..DispatchConfig::default()
        });
        assert!(cx.enter().is_ok());
        assert!(cx.enter().is_ok());
        assert_eq!(cx.depth(), 2);
        assert_eq!(
            cx.enter(),
            Err(PipelineAbortError::DepthExceeded { max: 2 })
        );
        cx.leave();
        assert_eq!(cx.depth(), 1);
        assert!(cx.stage_context().is_nested());
    }
}
