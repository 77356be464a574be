//! Bold and italic quotes
//!
//!     Apostrophe runs only make sense per line: whether `'''` opens bold or is an italic
//!     plus a literal apostrophe depends on every other run on the same line. So from the
//!     first quote marker of a line the stage buffers everything until the newline (or the
//!     end of input) and then decides for the whole line at once.
//!
//! Chunks
//!
//!     The buffered line is kept as a list of chunks. Each chunk after the first starts with
//!     one quote head (a pending italic or bold) followed by the plain tokens up to the next
//!     head. Runs are split into heads by length:
//!
//!         ''      italic
//!         '''     bold
//!         ''''    apostrophe + bold
//!         '''''   italic + bold
//!         longer  the extra apostrophes as text + italic + bold
//!
//! Balancing
//!
//!     If both the italic and the bold counts of a line are odd, one `'''` is reinterpreted
//!     as an apostrophe followed by an italic. The candidate is the first bold that follows
//!     a single-letter word, else the first that follows a multi-letter word, else the first
//!     that follows a space. Then heads are paired up alternately as open and close tags,
//!     and anything left open is closed before the newline, innermost first.
//!
//!     The tag that replaces a quote marker keeps the marker's id; every piece keeps the
//!     part of the marker's source range it stands for.

use crate::wiki::pipeline::{Emission, Stage, StageContext, StageError};
use crate::wiki::token::{Payload, SourceRange, TagData, Token, TokenKind};

pub const NAME: &str = "quotes";
pub const RANK: u32 = 300;

/// What came right before a quote run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Before {
    Nothing,
    Text(String),
    Markup,
}

impl Before {
    fn of(token: &Token) -> Before {
        match (token.kind(), token.text()) {
            (TokenKind::Text, Some(text)) => Before::Text(text.to_string()),
            _ => Before::Markup,
        }
    }
}

#[derive(Debug)]
struct QuoteHead {
    /// The marker token this head replaces, if it is the one carrying the marker's id.
    marker: Option<Token>,
    range: SourceRange,
    before: Before,
    /// Only plain `'''` runs may be reinterpreted during balancing.
    convertible: bool,
}

#[derive(Debug)]
enum Head {
    Plain,
    Quote(QuoteHead),
    Tag(Token),
}

#[derive(Debug)]
struct Chunk {
    head: Head,
    tokens: Vec<Token>,
}

impl Chunk {
    fn new(head: Head) -> Self {
        Chunk {
            head,
            tokens: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct QuoteStage {
    active: bool,
    chunks: Vec<Chunk>,
    current: Chunk,
    italics: Vec<usize>,
    bolds: Vec<usize>,
    before: Before,
    last_end: usize,
}

impl Default for QuoteStage {
    fn default() -> Self {
        QuoteStage {
            active: false,
            chunks: Vec::new(),
            current: Chunk::new(Head::Plain),
            italics: Vec::new(),
            bolds: Vec::new(),
            before: Before::Nothing,
            last_end: 0,
        }
    }
}

impl QuoteStage {
    pub fn new() -> Self {
        QuoteStage::default()
    }

    fn reset(&mut self) {
        self.active = false;
        self.chunks.clear();
        self.current = Chunk::new(Head::Plain);
        self.italics.clear();
        self.bolds.clear();
    }

    /// Close the current chunk and start one headed by `head`; returns the new chunk's index.
    fn open_chunk(&mut self, head: Head) -> usize {
        let finished = std::mem::replace(&mut self.current, Chunk::new(head));
        self.chunks.push(finished);
        self.chunks.len()
    }

    fn chunk_mut(&mut self, index: usize) -> &mut Chunk {
        if index < self.chunks.len() {
            &mut self.chunks[index]
        } else {
            &mut self.current
        }
    }

    fn head(&self, index: usize) -> Option<&QuoteHead> {
        let chunk = self.chunks.get(index).unwrap_or(&self.current);
        match &chunk.head {
            Head::Quote(head) => Some(head),
            _ => None,
        }
    }

    fn on_quote(&mut self, marker: Token) {
        let ticks = marker.text().map_or(0, str::len);
        let range = marker.range();
        let before = self.before.clone();
        self.active = true;

        let quote = |marker: Option<Token>, start: usize, end: usize, convertible: bool| {
            Head::Quote(QuoteHead {
                marker,
                range: range.within(start, end),
                before: before.clone(),
                convertible,
            })
        };

        match ticks {
            0 | 1 => self.current.tokens.push(marker),
            2 => {
                let index = self.open_chunk(quote(Some(marker), range.start, range.end, false));
                self.italics.push(index);
            }
            3 => {
                let index = self.open_chunk(quote(Some(marker), range.start, range.end, true));
                self.bolds.push(index);
            }
            4 => {
                self.current.tokens.push(Token::synthetic_text(
                    "'",
                    range.within(range.start, range.start + 1),
                ));
                let index = self.open_chunk(quote(Some(marker), range.start + 1, range.end, true));
                self.bolds.push(index);
            }
            5 => {
                let italic = self.open_chunk(quote(Some(marker), range.start, range.start + 2, false));
                self.italics.push(italic);
                let bold = self.open_chunk(quote(None, range.end.saturating_sub(3), range.end, false));
                self.bolds.push(bold);
            }
            _ => {
                let extra = ticks - 5;
                self.current.tokens.push(Token::synthetic_text(
                    "'".repeat(extra),
                    range.within(range.start, range.start + extra),
                ));
                let italic = self.open_chunk(quote(
                    Some(marker),
                    range.start + extra,
                    range.end.saturating_sub(3),
                    false,
                ));
                self.italics.push(italic);
                let bold = self.open_chunk(quote(None, range.end.saturating_sub(3), range.end, false));
                self.bolds.push(bold);
            }
        }
    }

    /// With odd italic and bold counts, turn one bold into apostrophe + italic.
    fn balance(&mut self) {
        if self.italics.len() % 2 == 0 || self.bolds.len() % 2 == 0 {
            return;
        }
        let mut single_letter = None;
        let mut multi_letter = None;
        let mut space = None;
        for (position, &index) in self.bolds.iter().enumerate() {
            let Some(head) = self.head(index).filter(|h| h.convertible) else {
                continue;
            };
            match &head.before {
                Before::Text(text) => {
                    let mut chars = text.chars().rev();
                    let last = chars.next();
                    let second_to_last = chars.next();
                    if last == Some(' ') {
                        space.get_or_insert(position);
                    } else if second_to_last == Some(' ') && single_letter.is_none() {
                        single_letter = Some(position);
                    } else {
                        multi_letter.get_or_insert(position);
                    }
                }
                Before::Nothing | Before::Markup => {
                    multi_letter.get_or_insert(position);
                }
            }
        }
        if let Some(position) = single_letter.or(multi_letter).or(space) {
            self.convert_bold(position);
        }
    }

    fn convert_bold(&mut self, position: usize) {
        let index = self.bolds.remove(position);
        let Some(range) = self.head(index).map(|h| h.range) else {
            return;
        };
        let apostrophe = Token::synthetic_text("'", range.within(range.start, range.start + 1));
        // Chunk 0 never has a head, so a bold always has a predecessor chunk.
        self.chunk_mut(index - 1).tokens.push(apostrophe);
        self.italics.push(index);
        self.italics.sort_unstable();
    }

    /// Replace the heads in `indices` with alternating open/close tags named `name`.
    /// Returns the index of the chunk whose open tag stays unclosed, if any.
    fn quotes_to_tags(&mut self, indices: &[usize], name: &str) -> Result<Option<usize>, StageError> {
        let width = if name == "b" { 3 } else { 2 };
        let mut opening = true;
        for &index in indices {
            let chunk = self.chunk_mut(index);
            let Head::Quote(head) = std::mem::replace(&mut chunk.head, Head::Plain) else {
                continue;
            };
            let range = if head.range.len() == width {
                head.range
            } else {
                head.range.within(head.range.end.saturating_sub(width), head.range.end)
            };
            let kind = if opening {
                TokenKind::TagOpen
            } else {
                TokenKind::TagClose
            };
            let payload = Payload::Tag(TagData::new(name));
            let mut tag = match head.marker {
                Some(marker) => marker.rewrite(kind, payload)?,
                None => Token::synthetic(kind, payload, range.start),
            };
            tag.set_range(range)?;
            chunk.head = Head::Tag(tag);
            opening = !opening;
        }
        Ok(if opening { None } else { indices.last().copied() })
    }

    /// Resolve the buffered line and release it, followed by `terminator`.
    fn finish_line(&mut self, terminator: Option<Token>) -> Result<Emission, StageError> {
        self.balance();
        let italics = std::mem::take(&mut self.italics);
        let bolds = std::mem::take(&mut self.bolds);
        let mut unclosed = Vec::new();
        if let Some(index) = self.quotes_to_tags(&italics, "i")? {
            unclosed.push((index, "i"));
        }
        if let Some(index) = self.quotes_to_tags(&bolds, "b")? {
            unclosed.push((index, "b"));
        }
        unclosed.sort_by(|a, b| b.0.cmp(&a.0));

        let at = terminator
            .as_ref()
            .map_or(self.last_end, |t| t.range().start);
        for (_, name) in unclosed {
            self.current.tokens.push(Token::synthetic_close(name, at));
        }
        self.current.tokens.extend(terminator);
        self.open_chunk(Head::Plain);

        let mut emission = Emission::none();
        for chunk in self.chunks.drain(..) {
            match chunk.head {
                Head::Tag(tag) => emission.push(tag),
                Head::Quote(head) => {
                    if let Some(marker) = head.marker {
                        emission.push(marker);
                    }
                }
                Head::Plain => {}
            }
            emission.extend(chunk.tokens);
        }
        self.reset();
        Ok(emission)
    }
}

impl Stage for QuoteStage {
    fn name(&self) -> &str {
        NAME
    }

    fn rank(&self) -> u32 {
        RANK
    }

    fn transform(&mut self, token: Token, _cx: &StageContext) -> Result<Emission, StageError> {
        self.last_end = token.range().end;
        let before = Before::of(&token);
        let emission = match token.kind() {
            TokenKind::QuoteMarker => {
                self.on_quote(token);
                Emission::none()
            }
            TokenKind::Newline if self.active => self.finish_line(Some(token))?,
            _ if self.active => {
                self.current.tokens.push(token);
                Emission::none()
            }
            _ => Emission::token(token),
        };
        self.before = before;
        Ok(emission)
    }

    fn flush(&mut self, _cx: &StageContext) -> Result<Emission, StageError> {
        if self.active {
            self.finish_line(None)
        } else {
            Ok(Emission::none())
        }
    }
}
