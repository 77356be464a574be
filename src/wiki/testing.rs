//! Testing utilities
//!
//! Helpers shared by the unit tests and the integration tests under `tests/`.
//!
//! ## Describing Token Streams
//!
//! Comparing token streams field by field is noisy. [`describe`] renders each token with its
//! `Display` form (`TagOpen(b)`, `Text("hello")`, `EndOfInput`), so a whole stream can be
//! checked with a single `assert_eq!` against a list of strings:
//!
//! ```rust-example
//! let tokens = run(&recipe, "<b>x")?;
//! assert_eq!(describe(&tokens), vec!["TagOpen(b)", "Text(\"x\")", "TagClose(b)", "EndOfInput"]);
//! ```
//!
//! ## Scripted Stages
//!
//! [`FnStage`] turns a closure into a [`Stage`], which keeps dispatcher tests self-contained.
//! [`PassThrough`], [`Recorder`] and [`Counter`] cover the common cases of a stage that does
//! nothing, one that logs what it sees, and a shareable one whose state spans expansions.

use std::sync::{Arc, Mutex};

use crate::wiki::config::DispatchConfig;
use crate::wiki::lexing::tokenize;
use crate::wiki::pipeline::{
    Emission, PipelineError, PipelineRecipe, QueueDispatcher, Stage, StageContext, StageError,
};
use crate::wiki::token::{Payload, Token, TokenKind};

/// Render every token with its `Display` form.
pub fn describe(tokens: &[Token]) -> Vec<String> {
    tokens.iter().map(ToString::to_string).collect()
}

/// Tokenize `text` from offset 0 and collect everything.
pub fn tokens(text: &str) -> Vec<Token> {
    tokenize(text, 0).collect()
}

/// Tokenize and describe in one go.
pub fn describe_source(text: &str) -> Vec<String> {
    describe(&tokens(text))
}

/// Dispatch `text` through `recipe` with the default configuration.
pub fn run(recipe: &PipelineRecipe, text: &str) -> Result<Vec<Token>, PipelineError> {
    QueueDispatcher::new(recipe.clone(), DispatchConfig::default())
        .dispatch_text(text)
        .collect_tokens()
}

/// Assert that `tokens` describe as `expected`, printing both streams on mismatch.
#[track_caller]
pub fn assert_described(tokens: &[Token], expected: &[&str]) {
    let actual = describe(tokens);
    if actual != expected {
        panic!(
            "token stream mismatch\n  expected: {:?}\n    actual: {:?}",
            expected, actual
        );
    }
}

/// Assert that every token's id sorts strictly after its predecessor's.
#[track_caller]
pub fn assert_strictly_increasing(tokens: &[Token]) {
    for pair in tokens.windows(2) {
        if pair[0].id() >= pair[1].id() {
            panic!(
                "ids out of order: {} ({}) is followed by {} ({})",
                pair[0].id(),
                pair[0],
                pair[1].id(),
                pair[1]
            );
        }
    }
}

type TransformFn = Box<dyn FnMut(Token, &StageContext) -> Result<Emission, StageError>>;
type FlushFn = Box<dyn FnMut(&StageContext) -> Result<Emission, StageError>>;

/// A stage scripted by closures.
pub struct FnStage {
    name: String,
    rank: u32,
    transform: TransformFn,
    flush: Option<FlushFn>,
}

impl FnStage {
    pub fn new<F>(name: &str, rank: u32, transform: F) -> Self
    where
        F: FnMut(Token, &StageContext) -> Result<Emission, StageError> + 'static,
    {
        FnStage {
            name: name.to_string(),
            rank,
            transform: Box::new(transform),
            flush: None,
        }
    }

    pub fn with_flush<F>(mut self, flush: F) -> Self
    where
        F: FnMut(&StageContext) -> Result<Emission, StageError> + 'static,
    {
        self.flush = Some(Box::new(flush));
        self
    }
}

impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn transform(&mut self, token: Token, cx: &StageContext) -> Result<Emission, StageError> {
        (self.transform)(token, cx)
    }

    fn flush(&mut self, cx: &StageContext) -> Result<Emission, StageError> {
        match &mut self.flush {
            Some(flush) => flush(cx),
            None => Ok(Emission::none()),
        }
    }
}

/// Emits every token unchanged.
pub struct PassThrough {
    name: String,
    rank: u32,
}

impl PassThrough {
    pub fn new(name: &str, rank: u32) -> Self {
        PassThrough {
            name: name.to_string(),
            rank,
        }
    }
}

impl Stage for PassThrough {
    fn name(&self) -> &str {
        &self.name
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn transform(&mut self, token: Token, _cx: &StageContext) -> Result<Emission, StageError> {
        Ok(Emission::token(token))
    }
}

/// Passes tokens through and appends `name:token` (or `name:flush`) to a shared log.
pub struct Recorder {
    name: String,
    rank: u32,
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new(name: &str, rank: u32, log: Arc<Mutex<Vec<String>>>) -> Self {
        Recorder {
            name: name.to_string(),
            rank,
            log,
        }
    }

    fn record(&self, entry: String) {
        if let Ok(mut log) = self.log.lock() {
            log.push(format!("{}:{}", self.name, entry));
        }
    }
}

impl Stage for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn transform(&mut self, token: Token, _cx: &StageContext) -> Result<Emission, StageError> {
        self.record(token.to_string());
        Ok(Emission::token(token))
    }

    fn flush(&mut self, _cx: &StageContext) -> Result<Emission, StageError> {
        self.record("flush".to_string());
        Ok(Emission::none())
    }
}

/// Shareable stage that numbers every token it sees and tags text with `#n`.
pub struct Counter {
    name: String,
    rank: u32,
    seen: usize,
}

impl Counter {
    pub fn new(name: &str, rank: u32) -> Self {
        Counter {
            name: name.to_string(),
            rank,
            seen: 0,
        }
    }
}

impl Stage for Counter {
    fn name(&self) -> &str {
        &self.name
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn shareable(&self) -> bool {
        true
    }

    fn transform(&mut self, mut token: Token, _cx: &StageContext) -> Result<Emission, StageError> {
        self.seen += 1;
        if token.is(TokenKind::Text) {
            let tagged = format!("{}#{}", token.text().unwrap_or_default(), self.seen);
            token.set_payload(Payload::Text(tagged))?;
        }
        Ok(Emission::token(token))
    }
}
