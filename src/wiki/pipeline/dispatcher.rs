//! The queue dispatcher
//!
//!     [`QueueDispatcher`] pairs a [`PipelineRecipe`] with a [`DispatchConfig`]. Every call to
//!     [`QueueDispatcher::dispatch`] builds fresh stage instances and returns a lazy
//!     [`Dispatch`] iterator.
//!
//! Driving Tokens
//!
//!     Each pull on the iterator takes one token from the source and pushes it into the
//!     first stage. Whatever a stage emits is pushed, token by token, into the next stage,
//!     depth first, until it falls out of the last stage into the output queue. When the
//!     source reports `EndOfInput` (or just runs dry) the stages are flushed in rank order,
//!     each flush feeding the stages after it, and the end token is released last.
//!
//! Numbering
//!
//!     A stage's synthetic tokens are numbered below the highest id that stage has released
//!     so far, ahead of anything an expansion may later splice under that id (see
//!     [`TokenId`]). Before releasing an emission the dispatcher checks that nothing in it
//!     sorts at or below what the stage released in earlier emissions, so a stage may
//!     reorder only what it buffers within a single emission.
//!
//! Expansion
//!
//!     An [`Emit::Expand`] request is served on the spot: the text is tokenized under the
//!     expansion's anchor, run through a nested pipeline made of the stages up to the
//!     requester, drained completely and spliced into the emission in place of the request.
//!     The nested `EndOfInput` is dropped. Nested pipelines get fresh stage instances, apart
//!     from shareable stages, which are the document-wide instances kept in the
//!     [`DispatchContext`]. Every nesting level counts against `max_expansion_depth`.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use tracing::{debug, trace};

use crate::wiki::config::DispatchConfig;
use crate::wiki::lexing::{tokenize, Tokenizer};
use crate::wiki::token::{Payload, SourceRange, Token, TokenId, TokenKind};

use super::builder::{PipelineRecipe, StageSpec};
use super::context::{DispatchContext, SharedStage};
use super::error::{PipelineAbortError, PipelineError, StageError};
use super::stage::{Emission, Emit, Expansion, Stage};

enum StageHandle {
    Owned(Box<dyn Stage>),
    Shared(SharedStage),
}

impl StageHandle {
    fn call<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut dyn Stage) -> Result<R, StageError>,
    ) -> Result<R, PipelineError> {
        let result = match self {
            StageHandle::Owned(stage) => f(&mut **stage),
            StageHandle::Shared(shared) => match shared.try_borrow_mut() {
                Ok(mut stage) => f(&mut **stage),
                Err(_) => {
                    return Err(PipelineAbortError::StageAborted {
                        stage: name.to_string(),
                        reason: "shared stage re-entered while busy".to_string(),
                    }
                    .into())
                }
            },
        };
        result.map_err(|err| PipelineError::from_stage(name, err))
    }
}

/// One stage instance plus the dispatcher's bookkeeping for it.
struct StageSlot {
    /// Position in the recipe; also selects the stage's synthetic id band.
    index: usize,
    name: String,
    handle: StageHandle,
    /// Highest id released so far (starts at the pipeline's virtual root).
    last: TokenId,
    synthetic: u32,
    /// Highest id released by an earlier emission.
    high_water: Option<TokenId>,
}

impl StageSlot {
    fn note(&mut self, id: &TokenId) {
        if *id > self.last {
            self.last = id.clone();
            self.synthetic = 0;
        }
    }

    fn next_synthetic_id(&mut self) -> TokenId {
        self.synthetic += 1;
        self.last.synthetic_child(self.index, self.synthetic)
    }

    fn check_order(&mut self, tokens: &[Token]) -> Result<(), PipelineAbortError> {
        if let Some(previous) = &self.high_water {
            if let Some(offender) = tokens.iter().find(|t| t.id() <= previous) {
                return Err(PipelineAbortError::OrderViolation {
                    stage: self.name.clone(),
                    id: offender.id().clone(),
                    previous: previous.clone(),
                });
            }
        }
        if let Some(max) = tokens.iter().map(Token::id).max() {
            self.high_water = Some(max.clone());
        }
        Ok(())
    }
}

/// A set of live stage instances for one document or one nested expansion.
struct Pipeline {
    recipe: PipelineRecipe,
    slots: Vec<StageSlot>,
    nested: bool,
}

impl Pipeline {
    fn top_level(recipe: &PipelineRecipe, cx: &mut DispatchContext) -> Self {
        Pipeline::assemble(recipe, &TokenId::unassigned(), false, cx, |_, _| true)
    }

    fn nested(
        recipe: &PipelineRecipe,
        requester: usize,
        expansion: &Expansion,
        cx: &mut DispatchContext,
    ) -> Self {
        Pipeline::assemble(recipe, &expansion.anchor, true, cx, |index, spec| {
            index <= requester && expansion.scope.admits(&spec.name)
        })
    }

    fn assemble(
        recipe: &PipelineRecipe,
        base: &TokenId,
        nested: bool,
        cx: &mut DispatchContext,
        include: impl Fn(usize, &StageSpec) -> bool,
    ) -> Self {
        let slots = recipe
            .specs()
            .iter()
            .enumerate()
            .filter(|(index, spec)| include(*index, *spec))
            .map(|(index, spec)| {
                let handle = if spec.shareable {
                    StageHandle::Shared(cx.shared_stage(index, spec))
                } else {
                    StageHandle::Owned((spec.factory)())
                };
                StageSlot {
                    index,
                    name: spec.name.clone(),
                    handle,
                    last: base.virtual_root(),
                    synthetic: 0,
                    high_water: None,
                }
            })
            .collect();
        Pipeline {
            recipe: recipe.clone(),
            slots,
            nested,
        }
    }

    /// Push `token` into the stage at `position`; what falls out of the last stage lands in `out`.
    fn feed(
        &mut self,
        position: usize,
        token: Token,
        cx: &mut DispatchContext,
        out: &mut Vec<Token>,
    ) -> Result<(), PipelineError> {
        let Some(slot) = self.slots.get_mut(position) else {
            out.push(token);
            return Ok(());
        };
        trace!(stage = %slot.name, id = %token.id(), kind = %token.kind(), "transform");
        let stage_cx = cx.stage_context();
        let emission = slot
            .handle
            .call(&slot.name, |stage| stage.transform(token, &stage_cx))?;
        self.release(position, emission, cx, out)
    }

    /// Flush every stage in rank order. Shared stages hold document-wide state, so only the
    /// top-level pipeline flushes them.
    fn flush(&mut self, cx: &mut DispatchContext, out: &mut Vec<Token>) -> Result<(), PipelineError> {
        for position in 0..self.slots.len() {
            let slot = &mut self.slots[position];
            if self.nested && matches!(slot.handle, StageHandle::Shared(_)) {
                continue;
            }
            trace!(stage = %slot.name, depth = cx.depth(), "flush");
            let stage_cx = cx.stage_context();
            let emission = slot.handle.call(&slot.name, |stage| stage.flush(&stage_cx))?;
            self.release(position, emission, cx, out)?;
        }
        Ok(())
    }

    fn release(
        &mut self,
        position: usize,
        emission: Emission,
        cx: &mut DispatchContext,
        out: &mut Vec<Token>,
    ) -> Result<(), PipelineError> {
        let tokens = self.resolve(position, emission, cx)?;
        for token in tokens {
            self.feed(position + 1, token, cx, out)?;
        }
        Ok(())
    }

    /// Number synthetic tokens, serve expansion requests and check the ordering rule.
    fn resolve(
        &mut self,
        position: usize,
        emission: Emission,
        cx: &mut DispatchContext,
    ) -> Result<Vec<Token>, PipelineError> {
        let requester = self.slots[position].index;
        let mut tokens = Vec::with_capacity(emission.len());
        for item in emission {
            match item {
                Emit::Token(mut token) => {
                    let slot = &mut self.slots[position];
                    if token.id().is_assigned() {
                        slot.note(token.id());
                    } else {
                        token.assign_id(slot.next_synthetic_id());
                    }
                    tokens.push(token);
                }
                Emit::Expand(expansion) => {
                    let expanded = Pipeline::expand(&self.recipe, requester, expansion, cx)?;
                    let slot = &mut self.slots[position];
                    for token in expanded {
                        slot.note(token.id());
                        tokens.push(token);
                    }
                }
            }
        }
        self.slots[position].check_order(&tokens)?;
        Ok(tokens)
    }

    fn expand(
        recipe: &PipelineRecipe,
        requester: usize,
        expansion: Expansion,
        cx: &mut DispatchContext,
    ) -> Result<Vec<Token>, PipelineError> {
        if let Err(err) = cx.enter() {
            debug!(anchor = %expansion.anchor, max = cx.max_depth(), "expansion depth exceeded");
            return Err(err.into());
        }
        debug!(
            depth = cx.depth(),
            anchor = %expansion.anchor,
            origin = ?expansion.origin,
            bytes = expansion.text.len(),
            "expansion started"
        );

        let mut source = Tokenizer::nested(
            &expansion.text,
            expansion.start_offset,
            &expansion.anchor,
            expansion.origin,
        )
        .with_lookahead_limit(cx.lookahead_limit());
        if !expansion.starts_line {
            source = source.starting_mid_line();
        }
        let nested = Pipeline::nested(recipe, requester, &expansion, cx);
        let result = nested.drain(source, cx);

        debug!(depth = cx.depth(), anchor = %expansion.anchor, ok = result.is_ok(), "expansion finished");
        cx.leave();
        result
    }

    /// Run a whole sub-stream through this pipeline, dropping its end token.
    fn drain(
        mut self,
        source: impl Iterator<Item = Token>,
        cx: &mut DispatchContext,
    ) -> Result<Vec<Token>, PipelineError> {
        let mut out = Vec::new();
        for token in source {
            if token.is_end_of_input() {
                break;
            }
            self.feed(0, token, cx, &mut out)?;
        }
        self.flush(cx, &mut out)?;
        Ok(out)
    }
}

/// Runs token streams through a fixed recipe of stages.
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    recipe: PipelineRecipe,
    config: DispatchConfig,
}

impl QueueDispatcher {
    pub fn new(recipe: PipelineRecipe, config: DispatchConfig) -> Self {
        QueueDispatcher { recipe, config }
    }

    pub fn recipe(&self) -> &PipelineRecipe {
        &self.recipe
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch a token stream. Source tokens are expected to carry ids, as tokenizer output does.
    pub fn dispatch<I>(&self, source: I) -> Dispatch<I::IntoIter>
    where
        I: IntoIterator<Item = Token>,
    {
        let mut context = DispatchContext::new(&self.config);
        let pipeline = Pipeline::top_level(&self.recipe, &mut context);
        debug!(
            stages = self.recipe.len(),
            max_depth = self.config.max_expansion_depth,
            "dispatch started"
        );
        Dispatch {
            source: source.into_iter(),
            pipeline,
            context,
            ready: VecDeque::new(),
            last_released: None,
            done: false,
        }
    }

    /// Tokenize `text` and dispatch the result.
    pub fn dispatch_text<'s>(&self, text: &'s str) -> Dispatch<Tokenizer<'s>> {
        self.dispatch(tokenize(text, 0).with_lookahead_limit(self.config.lookahead_limit))
    }
}

/// A lazy, single-document dispatch. Yields finalized tokens ending with `EndOfInput`, or an
/// error after which nothing more is yielded.
pub struct Dispatch<I> {
    source: I,
    pipeline: Pipeline,
    context: DispatchContext,
    ready: VecDeque<Token>,
    last_released: Option<Token>,
    done: bool,
}

impl<I: Iterator<Item = Token>> Dispatch<I> {
    /// Drain the dispatch, stopping at the first error.
    pub fn collect_tokens(self) -> Result<Vec<Token>, PipelineError> {
        self.collect()
    }

    fn step(&mut self, out: &mut Vec<Token>) -> Result<(), PipelineError> {
        match self.source.next() {
            Some(token) if token.is_end_of_input() => {
                self.done = true;
                self.pipeline.flush(&mut self.context, out)?;
                out.push(token);
            }
            Some(token) => self.pipeline.feed(0, token, &mut self.context, out)?,
            None => {
                self.done = true;
                self.pipeline.flush(&mut self.context, out)?;
                let end = self.synthesize_end(out.last());
                out.push(end);
            }
        }
        Ok(())
    }

    /// An end token for a source that stopped without one.
    fn synthesize_end(&self, last: Option<&Token>) -> Token {
        let last = last.or(self.last_released.as_ref());
        let parent = last
            .map(|t| t.id().clone())
            .unwrap_or_else(|| TokenId::unassigned().virtual_root());
        let at = last.map(|t| t.range().end).unwrap_or(0);
        let mut end = Token::new(
            parent.synthetic_child(self.pipeline.slots.len(), 1),
            TokenKind::EndOfInput,
            Payload::None,
            SourceRange::empty_at(at),
        );
        end.finalize();
        end
    }
}

impl<I: Iterator<Item = Token>> Iterator for Dispatch<I> {
    type Item = Result<Token, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(mut token) = self.ready.pop_front() {
                token.finalize();
                if token.is_end_of_input() {
                    debug!(id = %token.id(), "dispatch finished");
                }
                self.last_released = Some(token.clone());
                return Some(Ok(token));
            }
            if self.done {
                return None;
            }
            let mut out = Vec::new();
            match self.step(&mut out) {
                Ok(()) => self.ready.extend(out),
                Err(err) => {
                    self.done = true;
                    debug!(error = %err, "dispatch aborted");
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<I: Iterator<Item = Token>> FusedIterator for Dispatch<I> {}
