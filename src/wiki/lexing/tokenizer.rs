//! Pull-based tokenizer
//!
//!     The tokenizer turns the lexeme stream into [`Token`]s one at a time. It owns a logos
//!     lexer and a small lookahead window of lexemes it has already scanned but not yet
//!     consumed. When a construct opens (`<!--`, `{{`, `<b`, `</b`) the tokenizer peeks
//!     forward for the closing delimiter. If it shows up within the lookahead limit the whole
//!     construct becomes one token; otherwise only the opening delimiter is emitted as text
//!     and scanning resumes right after it, reusing the lexemes already in the window.
//!
//! Precedence
//!
//!     At every position the first lexeme decides what is tried:
//!
//!         newline                     -> Newline
//!         bullets at line start       -> ListMarker
//!         <!-- ... -->                -> CommentMarker
//!         {{ ... }} (nested braces)   -> ExpansionMarker
//!         <name ...> / <name .../>    -> TagOpen / SelfClosingTag
//!         </name>                     -> TagClose
//!         '' run                      -> QuoteMarker
//!         anything else               -> Text
//!
//!     Tags have to close on the same line. Comments and expansions may span lines.
//!     Consecutive literal lexemes (including degraded openers) merge into one Text token.
//!
//! Ranges
//!
//!     Every token's range is its exact slice of the input shifted by the start offset, so
//!     the ranges tile the input and joining them reproduces it byte for byte. The closing
//!     EndOfInput token has an empty range at the end of the input.

use super::lexemes::Lexeme;
use crate::wiki::token::{
    ExpansionData, IdSequence, Origin, Payload, SourceRange, TagData, Token, TokenId, TokenKind,
};
use logos::Logos;
use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::ops::Range;

/// Lookahead window used when nothing else is configured.
pub const DEFAULT_LOOKAHEAD_LIMIT: usize = 256;

#[derive(Debug, Clone)]
struct Lexed {
    lexeme: Lexeme,
    span: Range<usize>,
}

/// Lazy token stream over one text. See the [module documentation](self).
pub struct Tokenizer<'src> {
    source: &'src str,
    lexer: logos::Lexer<'src, Lexeme>,
    window: VecDeque<Lexed>,
    ids: IdSequence,
    offset: usize,
    origin: Origin,
    lookahead_limit: usize,
    at_line_start: bool,
    finished: bool,
}

impl<'src> Tokenizer<'src> {
    /// Top-level tokenizer. Ids are numbered `1, 2, 3, ...`.
    pub fn new(source: &'src str, start_offset: usize) -> Self {
        Tokenizer {
            source,
            lexer: Lexeme::lexer(source),
            window: VecDeque::new(),
            ids: IdSequence::top_level(),
            offset: start_offset,
            origin: Origin::Document,
            lookahead_limit: DEFAULT_LOOKAHEAD_LIMIT,
            at_line_start: true,
            finished: false,
        }
    }

    /// Tokenizer for expanded content spliced in at `anchor`.
    ///
    /// Ids are numbered `anchor.1, anchor.2, ...` so the resulting tokens sort right after
    /// the anchor and before whatever followed it.
    pub fn nested(source: &'src str, start_offset: usize, anchor: &TokenId, origin: Origin) -> Self {
        Tokenizer {
            ids: IdSequence::new(anchor.clone()),
            origin,
            ..Tokenizer::new(source, start_offset)
        }
    }

    pub fn with_lookahead_limit(mut self, limit: usize) -> Self {
        self.lookahead_limit = limit.max(1);
        self
    }

    /// Treat the first line as a continuation, so leading bullets are literal text.
    pub fn starting_mid_line(mut self) -> Self {
        self.at_line_start = false;
        self
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Make sure at least `n + 1` lexemes are buffered; returns the `n`-th if it exists.
    fn peek(&mut self, n: usize) -> Option<&Lexed> {
        while self.window.len() <= n {
            let result = self.lexer.next()?;
            // Every character is covered by some pattern, but a scanner error is still just text.
            let lexeme = result.unwrap_or(Lexeme::Symbol);
            self.window.push_back(Lexed {
                lexeme,
                span: self.lexer.span(),
            });
        }
        self.window.get(n)
    }

    fn advance(&mut self) -> Option<Lexed> {
        self.peek(0)?;
        self.window.pop_front()
    }

    /// Consume `count` lexemes from the window; returns the end of the last one.
    fn consume(&mut self, count: usize) -> Option<usize> {
        let mut end = None;
        for _ in 0..count {
            end = self.advance().map(|lexed| lexed.span.end);
        }
        end
    }

    fn slice(&self, range: Range<usize>) -> &'src str {
        let source: &'src str = self.source;
        &source[range]
    }

    fn make(&mut self, kind: TokenKind, payload: Payload, local: Range<usize>) -> Token {
        let range = SourceRange::new(local.start + self.offset, local.end + self.offset);
        Token::new(self.ids.next_id(), kind, payload, range).with_origin(self.origin)
    }

    /// Find the first lexeme after the opener (window index) that closes a comment.
    fn find_comment_close(&mut self) -> Option<usize> {
        for i in 0..self.lookahead_limit {
            if self.peek(i)?.lexeme == Lexeme::CommentClose {
                return Some(i);
            }
        }
        None
    }

    fn comment(&mut self, open: &Lexed) -> Option<Token> {
        let close_index = self.find_comment_close()?;
        let close_start = self.window[close_index].span.start;
        let end = self.consume(close_index + 1)?;
        let body = self.slice(open.span.end..close_start).to_string();
        Some(self.make(TokenKind::CommentMarker, Payload::Text(body), open.span.start..end))
    }

    fn expansion(&mut self, open: &Lexed) -> Option<Token> {
        let mut depth = 1usize;
        let mut pipes = Vec::new();
        let mut close_index = None;
        for i in 0..self.lookahead_limit {
            let lexed = self.peek(i)?;
            match lexed.lexeme {
                Lexeme::ExpansionOpen => depth += 1,
                Lexeme::ExpansionClose => {
                    depth -= 1;
                    if depth == 0 {
                        close_index = Some(i);
                        break;
                    }
                }
                Lexeme::Pipe if depth == 1 => pipes.push(lexed.span.clone()),
                _ => {}
            }
        }
        let close_index = close_index?;
        let close_start = self.window[close_index].span.start;

        let mut parts = Vec::with_capacity(pipes.len() + 1);
        let mut part_start = open.span.end;
        for pipe in &pipes {
            parts.push(self.slice(part_start..pipe.start).to_string());
            part_start = pipe.end;
        }
        parts.push(self.slice(part_start..close_start).to_string());

        let end = self.consume(close_index + 1)?;
        let mut parts = parts.into_iter();
        let target = parts.next().unwrap_or_default().trim().to_string();
        let data = ExpansionData {
            target,
            params: parts.collect(),
            raw: self.slice(open.span.start..end).to_string(),
        };
        Some(self.make(
            TokenKind::ExpansionMarker,
            Payload::Expansion(data),
            open.span.start..end,
        ))
    }

    /// `<name attrs>` or `<name attrs/>` on a single line.
    fn tag(&mut self, open: &Lexed) -> Option<Token> {
        let mut terminator = None;
        for i in 0..self.lookahead_limit {
            match self.peek(i)?.lexeme {
                Lexeme::TagEnd => {
                    terminator = Some((i, TokenKind::TagOpen));
                    break;
                }
                Lexeme::SelfCloseEnd => {
                    terminator = Some((i, TokenKind::SelfClosingTag));
                    break;
                }
                Lexeme::Newline | Lexeme::TagStart | Lexeme::EndTagStart | Lexeme::CommentOpen => {
                    return None
                }
                _ => {}
            }
        }
        let (index, kind) = terminator?;
        let raw = self.slice(open.span.end..self.window[index].span.start);
        if !raw.is_empty() && !raw.starts_with(char::is_whitespace) {
            return None;
        }
        let name = self.slice(open.span.start + 1..open.span.end);
        let data = TagData::with_raw_attributes(name, raw);
        let end = self.consume(index + 1)?;
        Some(self.make(kind, Payload::Tag(data), open.span.start..end))
    }

    /// `</name>` with nothing but whitespace before the `>`.
    fn end_tag(&mut self, open: &Lexed) -> Option<Token> {
        let mut index = 0;
        loop {
            if index >= self.lookahead_limit {
                return None;
            }
            let lexed = self.peek(index)?.clone();
            match lexed.lexeme {
                Lexeme::TagEnd => break,
                Lexeme::Word if self.slice(lexed.span).trim().is_empty() => index += 1,
                _ => return None,
            }
        }
        let raw = self.slice(open.span.end..self.window[index].span.start);
        let name = self.slice(open.span.start + 2..open.span.end);
        let data = TagData::with_raw_attributes(name, raw);
        let end = self.consume(index + 1)?;
        Some(self.make(TokenKind::TagClose, Payload::Tag(data), open.span.start..end))
    }

    /// Literal text starting at `first`, merged with every following literal lexeme.
    fn text(&mut self, first: &Lexed) -> Token {
        let start = first.span.start;
        let mut end = first.span.end;
        while let Some(next) = self.peek(0) {
            if next.lexeme.opens_construct() {
                break;
            }
            end = next.span.end;
            self.window.pop_front();
        }
        let text = self.slice(start..end).to_string();
        self.make(TokenKind::Text, Payload::Text(text), start..end)
    }

    fn end_of_input(&mut self) -> Token {
        self.finished = true;
        let end = self.source.len();
        self.make(TokenKind::EndOfInput, Payload::None, end..end)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let Some(first) = self.advance() else {
            return Some(self.end_of_input());
        };

        let token = match first.lexeme {
            Lexeme::Newline => {
                let text = self.slice(first.span.clone()).to_string();
                Some(self.make(TokenKind::Newline, Payload::Text(text), first.span.clone()))
            }
            Lexeme::Bullets if self.at_line_start => {
                let text = self.slice(first.span.clone()).to_string();
                Some(self.make(TokenKind::ListMarker, Payload::Text(text), first.span.clone()))
            }
            Lexeme::Quotes => {
                let text = self.slice(first.span.clone()).to_string();
                Some(self.make(TokenKind::QuoteMarker, Payload::Text(text), first.span.clone()))
            }
            Lexeme::CommentOpen => self.comment(&first),
            Lexeme::ExpansionOpen => self.expansion(&first),
            Lexeme::TagStart => self.tag(&first),
            Lexeme::EndTagStart => self.end_tag(&first),
            _ => None,
        };
        let token = token.unwrap_or_else(|| self.text(&first));

        match token.kind() {
            TokenKind::Newline => self.at_line_start = true,
            TokenKind::CommentMarker => {}
            _ => self.at_line_start = false,
        }
        Some(token)
    }
}

impl FusedIterator for Tokenizer<'_> {}
