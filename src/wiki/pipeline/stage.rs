//! The stage interface
//!
//!     A [`Stage`] receives tokens one at a time through [`Stage::transform`] and answers with
//!     an [`Emission`]: the tokens (and expansion requests) it releases in response. Returning
//!     an empty emission buffers the token; returning several emits many. Once the source is
//!     exhausted [`Stage::flush`] drains whatever is still buffered.
//!
//!     Stage-made tokens are created with [`Token::synthetic`] and are numbered by the
//!     dispatcher when they are emitted, relative to the token the stage released just
//!     before them.
//!
//! Expansion
//!
//!     [`Emit::Expand`] asks the dispatcher to tokenize some text and run it through the
//!     stages up to (and including) the requesting one. The finished sub-stream takes the
//!     place of the request inside the emission, so the tokens that follow it in the same
//!     emission are released after all of the expanded content.

use crate::wiki::token::{Origin, Token, TokenId};

use super::error::StageError;

/// Read-only facts about the dispatch a stage is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageContext {
    depth: usize,
}

impl StageContext {
    pub(crate) fn new(depth: usize) -> Self {
        StageContext { depth }
    }

    /// Number of nested expansions between the top-level document and this stage instance.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_nested(&self) -> bool {
        self.depth > 0
    }
}

/// A transformation step. Implementations own their buffering state.
pub trait Stage {
    /// Unique within a pipeline.
    fn name(&self) -> &str;

    /// Lower ranks run earlier.
    fn rank(&self) -> u32;

    /// Shareable stages keep one instance per top-level document, reused by every nested
    /// expansion instead of being constructed fresh.
    fn shareable(&self) -> bool {
        false
    }

    fn transform(&mut self, token: Token, cx: &StageContext) -> Result<Emission, StageError>;

    fn flush(&mut self, _cx: &StageContext) -> Result<Emission, StageError> {
        Ok(Emission::none())
    }
}

/// Which stages a nested expansion runs through.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExpansionScope {
    /// Every stage up to and including the requester.
    #[default]
    UpToRequester,
    /// Only the named stages, among those up to and including the requester.
    Only(Vec<String>),
}

impl ExpansionScope {
    pub fn admits(&self, stage: &str) -> bool {
        match self {
            ExpansionScope::UpToRequester => true,
            ExpansionScope::Only(names) => names.iter().any(|n| n == stage),
        }
    }
}

/// A request to tokenize `text` and splice the dispatched result in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub text: String,
    /// Offset of `text` within whatever its ranges should refer to.
    pub start_offset: usize,
    /// Expanded tokens are numbered below this id.
    pub anchor: TokenId,
    pub origin: Origin,
    /// Whether `text` starts at the beginning of a line.
    pub starts_line: bool,
    pub scope: ExpansionScope,
}

impl Expansion {
    pub fn new(text: impl Into<String>, anchor: TokenId, origin: Origin) -> Self {
        Expansion {
            text: text.into(),
            start_offset: 0,
            anchor,
            origin,
            starts_line: true,
            scope: ExpansionScope::UpToRequester,
        }
    }

    pub fn at_offset(mut self, offset: usize) -> Self {
        self.start_offset = offset;
        self
    }

    pub fn mid_line(mut self) -> Self {
        self.starts_line = false;
        self
    }

    pub fn restricted_to<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = ExpansionScope::Only(stages.into_iter().map(Into::into).collect());
        self
    }
}

/// One item of an emission.
#[derive(Debug, Clone)]
pub enum Emit {
    Token(Token),
    Expand(Expansion),
}

/// What a stage releases in response to one call.
#[derive(Debug, Clone, Default)]
pub struct Emission {
    items: Vec<Emit>,
}

impl Emission {
    /// Release nothing (the token, if any, stays buffered or is dropped).
    pub fn none() -> Self {
        Emission { items: Vec::new() }
    }

    pub fn token(token: Token) -> Self {
        Emission {
            items: vec![Emit::Token(token)],
        }
    }

    pub fn tokens(tokens: impl IntoIterator<Item = Token>) -> Self {
        Emission {
            items: tokens.into_iter().map(Emit::Token).collect(),
        }
    }

    pub fn expand(expansion: Expansion) -> Self {
        Emission {
            items: vec![Emit::Expand(expansion)],
        }
    }

    pub fn push(&mut self, token: Token) {
        self.items.push(Emit::Token(token));
    }

    pub fn push_expansion(&mut self, expansion: Expansion) {
        self.items.push(Emit::Expand(expansion));
    }

    /// Builder-style [`push`](Self::push).
    pub fn then(mut self, token: Token) -> Self {
        self.push(token);
        self
    }

    pub fn append(&mut self, other: Emission) {
        self.items.extend(other.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Emit] {
        &self.items
    }
}

impl From<Token> for Emission {
    fn from(token: Token) -> Self {
        Emission::token(token)
    }
}

impl From<Vec<Token>> for Emission {
    fn from(tokens: Vec<Token>) -> Self {
        Emission::tokens(tokens)
    }
}

impl Extend<Token> for Emission {
    fn extend<T: IntoIterator<Item = Token>>(&mut self, iter: T) {
        self.items.extend(iter.into_iter().map(Emit::Token));
    }
}

impl IntoIterator for Emission {
    type Item = Emit;
    type IntoIter = std::vec::IntoIter<Emit>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::token::{Payload, TokenKind};

    #[test]
    fn test_emission_building() {
        let a = Token::synthetic(TokenKind::Newline, Payload::Text("\n".into()), 0);
        let mut emission = Emission::token(a.clone()).then(a.clone());
        emission.push_expansion(Expansion::new("x", TokenId::from_path(&[1]), Origin::Foreign));
        emission.extend(vec![a]);

        assert_eq!(emission.len(), 4);
        assert!(matches!(emission.items()[2], Emit::Expand(_)));
        assert!(Emission::none().is_empty());
    }

    #[test]
    fn test_scope() {
        let expansion = Expansion::new("x", TokenId::from_path(&[1]), Origin::Document)
            .restricted_to(["attributes"]);
        assert!(expansion.scope.admits("attributes"));
        assert!(!expansion.scope.admits("quotes"));
        assert!(ExpansionScope::UpToRequester.admits("quotes"));
    }
}
