//! Token data model
//!
//!     A [`Token`] is one lexical unit: a [`TokenKind`] tag, a kind-dependent [`Payload`], the
//!     [`SourceRange`] it was lexed from and a [`TokenId`] that fixes its place in document
//!     order. Equality and ordering look at the id only.
//!
//!     Tokens are mutable while they travel through the pipeline, but only until someone
//!     calls [`Token::finalize`]. After that every mutating call fails with
//!     [`InvalidStateError`]. The dispatcher finalizes every token it hands to the sink.
//!
//! Source Fidelity
//!
//!     Every token keeps enough of its raw text to be printed back exactly (see
//!     [`Token::source_text`]), and every tokenizer-produced token keeps the byte range it
//!     came from. Stage-made tokens (synthetic close tags and the like) have empty ranges, so
//!     joining the spans of a token stream reproduces the input minus what stages added.

pub mod formatting;
pub mod id;

pub use id::{IdSequence, TokenId};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use thiserror::Error;

/// The closed set of token kinds of this grammar version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Literal text, including degraded markup.
    Text,
    /// A line break (`\n` or `\r\n`).
    Newline,
    /// `<name attrs>`
    TagOpen,
    /// `</name>`
    TagClose,
    /// `<name attrs/>`
    SelfClosingTag,
    /// `<!-- ... -->`
    CommentMarker,
    /// `{{target|param|...}}`, content that needs recursive expansion.
    ExpansionMarker,
    /// A run of two or more apostrophes.
    QuoteMarker,
    /// List bullets (`*`, `#`, `:`, `;`) at the start of a line.
    ListMarker,
    /// Terminates every token stream, exactly once.
    EndOfInput,
}

/// Byte offsets of a token in its originating text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

impl SourceRange {
    pub fn new(start: usize, end: usize) -> Self {
        SourceRange { start, end }
    }

    /// A zero-width range, as used by synthetic tokens.
    pub fn empty_at(position: usize) -> Self {
        SourceRange {
            start: position,
            end: position,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The part of this range between `start` and `end`, clamped so it never leaves `self`.
    ///
    /// Stages slice marker ranges by the marker's text; a zero-width synthetic marker then
    /// yields zero-width pieces instead of wrapping around.
    pub fn within(&self, start: usize, end: usize) -> SourceRange {
        let end = end.clamp(self.start, self.end);
        SourceRange::new(start.clamp(self.start, end), end)
    }
}

impl From<Range<usize>> for SourceRange {
    fn from(range: Range<usize>) -> Self {
        SourceRange::new(range.start, range.end)
    }
}

/// Which text a token's range refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Origin {
    /// The document being dispatched.
    #[default]
    Document,
    /// Content produced by expansion (e.g. a template body); ranges refer to that content.
    Foreign,
}

/// One `name=value` pair of a tag. Bare attributes have no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: None,
        }
    }
}

/// Attributes of a tag, either as lexed or after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attributes {
    /// The raw text between the tag name and the closing `>`/`/>`, whitespace included.
    Raw(String),
    Parsed(Vec<Attribute>),
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes::Parsed(Vec::new())
    }
}

/// Payload of tag tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagData {
    pub name: String,
    pub attributes: Attributes,
}

impl TagData {
    pub fn new(name: impl Into<String>) -> Self {
        TagData {
            name: name.into(),
            attributes: Attributes::default(),
        }
    }

    pub fn with_raw_attributes(name: impl Into<String>, raw: impl Into<String>) -> Self {
        TagData {
            name: name.into(),
            attributes: Attributes::Raw(raw.into()),
        }
    }

    /// Builder-style helper for synthetic tags.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Tag names compare case-insensitively.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Look up a parsed attribute. Raw attributes are never searched.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match &self.attributes {
            Attributes::Parsed(attrs) => attrs
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case(name))
                .map(|a| a.value.as_deref().unwrap_or("")),
            Attributes::Raw(_) => None,
        }
    }

    /// Set (or replace) a parsed attribute. Raw attributes are discarded.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Attributes::Raw(_) = self.attributes {
            self.attributes = Attributes::Parsed(Vec::new());
        }
        if let Attributes::Parsed(attrs) = &mut self.attributes {
            match attrs.iter_mut().find(|a| a.name.eq_ignore_ascii_case(&name)) {
                Some(existing) => existing.value = Some(value),
                None => attrs.push(Attribute {
                    name,
                    value: Some(value),
                }),
            }
        }
    }
}

/// Payload of expansion markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionData {
    /// The template name, trimmed.
    pub target: String,
    /// The `|`-separated parameters, as written.
    pub params: Vec<String>,
    /// The complete marker source, braces included.
    pub raw: String,
}

/// Kind-dependent token value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Payload {
    None,
    Text(String),
    Tag(TagData),
    Expansion(ExpansionData),
}

/// Raised when a finalized token is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token {id} is finalized; {operation} is not allowed")]
pub struct InvalidStateError {
    pub id: TokenId,
    pub operation: &'static str,
}

/// One lexical unit. See the [module documentation](self).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    id: TokenId,
    kind: TokenKind,
    payload: Payload,
    range: SourceRange,
    #[serde(default)]
    origin: Origin,
    #[serde(skip)]
    finalized: bool,
}

impl Token {
    /// Create a token with a known id.
    pub fn new(id: TokenId, kind: TokenKind, payload: Payload, range: SourceRange) -> Self {
        Token {
            id,
            kind,
            payload,
            range,
            origin: Origin::Document,
            finalized: false,
        }
    }

    /// Create a stage-made token. It gets an empty range at `at` and its id is assigned by the
    /// dispatcher when the stage emits it.
    pub fn synthetic(kind: TokenKind, payload: Payload, at: usize) -> Self {
        Token::new(
            TokenId::unassigned(),
            kind,
            payload,
            SourceRange::empty_at(at),
        )
    }

    /// Synthetic literal text covering `range`.
    ///
    /// Used when a stage splits one token into several pieces that each keep part of the
    /// original span.
    pub fn synthetic_text(text: impl Into<String>, range: SourceRange) -> Self {
        Token::new(
            TokenId::unassigned(),
            TokenKind::Text,
            Payload::Text(text.into()),
            range,
        )
    }

    pub fn synthetic_open(name: &str, at: usize) -> Self {
        Token::synthetic(TokenKind::TagOpen, Payload::Tag(TagData::new(name)), at)
    }

    pub fn synthetic_close(name: &str, at: usize) -> Self {
        Token::synthetic(TokenKind::TagClose, Payload::Tag(TagData::new(name)), at)
    }

    pub fn id(&self) -> &TokenId {
        &self.id
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn range(&self) -> SourceRange {
        self.range
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_end_of_input(&self) -> bool {
        self.kind == TokenKind::EndOfInput
    }

    /// Text payload, for text-like tokens (text, newline, comment, quote and list markers).
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&TagData> {
        match &self.payload {
            Payload::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn expansion(&self) -> Option<&ExpansionData> {
        match &self.payload {
            Payload::Expansion(data) => Some(data),
            _ => None,
        }
    }

    /// Whether this is a tag token of `kind` whose name matches `name`.
    pub fn is_tag(&self, kind: TokenKind, name: &str) -> bool {
        self.kind == kind && self.tag().is_some_and(|t| t.is_named(name))
    }

    /// Reconstruct the markup this token stands for.
    ///
    /// For tokenizer-produced tokens this is exactly the source slice they were lexed from.
    pub fn source_text(&self) -> String {
        match (&self.kind, &self.payload) {
            (TokenKind::CommentMarker, Payload::Text(text)) => format!("<!--{}-->", text),
            (_, Payload::Text(text)) => text.clone(),
            (TokenKind::TagOpen, Payload::Tag(tag)) => {
                format!("<{}{}>", tag.name, attribute_source(&tag.attributes))
            }
            (TokenKind::SelfClosingTag, Payload::Tag(tag)) => {
                format!("<{}{}/>", tag.name, attribute_source(&tag.attributes))
            }
            (TokenKind::TagClose, Payload::Tag(tag)) => {
                format!("</{}{}>", tag.name, attribute_source(&tag.attributes))
            }
            (_, Payload::Expansion(data)) => data.raw.clone(),
            _ => String::new(),
        }
    }

    /// Replace the payload.
    pub fn set_payload(&mut self, payload: Payload) -> Result<(), InvalidStateError> {
        self.ensure_mutable("set_payload")?;
        self.payload = payload;
        Ok(())
    }

    /// Mutable access to the payload.
    pub fn payload_mut(&mut self) -> Result<&mut Payload, InvalidStateError> {
        self.ensure_mutable("payload_mut")?;
        Ok(&mut self.payload)
    }

    /// Narrow or move the source range (e.g. when one marker becomes several tokens).
    pub fn set_range(&mut self, range: SourceRange) -> Result<(), InvalidStateError> {
        self.ensure_mutable("set_range")?;
        self.range = range;
        Ok(())
    }

    /// Turn this token into a different kind, keeping id, range and origin.
    pub fn rewrite(mut self, kind: TokenKind, payload: Payload) -> Result<Token, InvalidStateError> {
        self.ensure_mutable("rewrite")?;
        self.kind = kind;
        self.payload = payload;
        Ok(self)
    }

    /// Degrade to literal text carrying this token's markup.
    pub fn downgrade_to_text(self) -> Result<Token, InvalidStateError> {
        let literal = self.source_text();
        self.rewrite(TokenKind::Text, Payload::Text(literal))
    }

    /// Freeze the token. Idempotent.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub(crate) fn assign_id(&mut self, id: TokenId) {
        self.id = id;
    }

    pub(crate) fn with_origin(mut self, origin: Origin) -> Token {
        self.origin = origin;
        self
    }

    fn ensure_mutable(&self, operation: &'static str) -> Result<(), InvalidStateError> {
        if self.finalized {
            Err(InvalidStateError {
                id: self.id.clone(),
                operation,
            })
        } else {
            Ok(())
        }
    }
}

fn attribute_source(attributes: &Attributes) -> String {
    match attributes {
        Attributes::Raw(raw) => raw.clone(),
        Attributes::Parsed(attrs) => attrs
            .iter()
            .map(|a| match &a.value {
                Some(value) => format!(" {}=\"{}\"", a.name, value),
                None => format!(" {}", a.name),
            })
            .collect(),
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Token {}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
