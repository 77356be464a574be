//! Lexical analysis
//!
//!     Two layers:
//!
//!     - [`lexemes`]: a logos scanner that splits text into delimiters and plain runs.
//!     - [`tokenizer`]: assembles lexemes into [`Token`](crate::wiki::token::Token)s with
//!       bounded lookahead, line-start tracking and graceful degradation of unterminated
//!       constructs.
//!
//!     Lexing never fails. Any input yields a finite token stream ending in exactly one
//!     `EndOfInput` token, and the token ranges tile the input.

pub mod lexemes;
pub mod tokenizer;

pub use tokenizer::{Tokenizer, DEFAULT_LOOKAHEAD_LIMIT};

/// Tokenize `text`, whose first byte sits at `start_offset` of the originating document.
///
/// The returned iterator is lazy: lexing happens as tokens are pulled.
pub fn tokenize(text: &str, start_offset: usize) -> Tokenizer<'_> {
    Tokenizer::new(text, start_offset)
}
