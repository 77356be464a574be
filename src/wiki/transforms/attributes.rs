//! Attribute normalization
//!
//! Parses the raw attribute text the tokenizer leaves on tag tokens into name/value pairs.
//! Accepted forms are `name="value"`, `name='value'`, `name=value` and bare `name`. Anything
//! the grammar cannot account for (an unbalanced quote, an `=` with no name before it) makes
//! the whole tag literal text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::wiki::pipeline::{Emission, Stage, StageContext, StageError};
use crate::wiki::token::{Attribute, Attributes, Payload, Token, TokenKind};

pub const NAME: &str = "attributes";
pub const RANK: u32 = 100;

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#,
    )
    .expect("attribute pattern is valid")
});

/// Parse raw attribute text. `None` means malformed.
pub fn parse_attributes(raw: &str) -> Option<Vec<Attribute>> {
    let mut attributes = Vec::new();
    let mut rest = raw;
    while !rest.trim().is_empty() {
        let captures = ATTRIBUTE.captures(rest)?;
        let whole = captures.get(0)?;
        let name = captures.get(1)?.as_str();
        let value = captures
            .get(2)
            .or_else(|| captures.get(3))
            .or_else(|| captures.get(4))
            .map(|m| m.as_str().to_string());
        attributes.push(Attribute {
            name: name.to_string(),
            value,
        });
        rest = &rest[whole.end()..];
    }
    Some(attributes)
}

#[derive(Debug, Default)]
pub struct AttributeStage;

impl AttributeStage {
    pub fn new() -> Self {
        AttributeStage
    }
}

impl Stage for AttributeStage {
    fn name(&self) -> &str {
        NAME
    }

    fn rank(&self) -> u32 {
        RANK
    }

    fn transform(&mut self, mut token: Token, _cx: &StageContext) -> Result<Emission, StageError> {
        let raw = match (token.kind(), token.tag()) {
            (
                TokenKind::TagOpen | TokenKind::TagClose | TokenKind::SelfClosingTag,
                Some(tag),
            ) => match &tag.attributes {
                Attributes::Raw(raw) => raw.clone(),
                Attributes::Parsed(_) => return Ok(Emission::token(token)),
            },
            _ => return Ok(Emission::token(token)),
        };

        let parsed = match token.kind() {
            // End tags carry no attributes; the tokenizer only lets whitespace through.
            TokenKind::TagClose => Some(Vec::new()),
            _ => parse_attributes(&raw),
        };
        match parsed {
            Some(attributes) => {
                if let Payload::Tag(tag) = token.payload_mut()? {
                    tag.attributes = Attributes::Parsed(attributes);
                }
                Ok(Emission::token(token))
            }
            None => {
                tracing::trace!(id = %token.id(), raw = %raw, "malformed attributes, tag kept as text");
                Ok(Emission::token(token.downgrade_to_text()?))
            }
        }
    }
}
