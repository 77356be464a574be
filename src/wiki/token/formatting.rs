//! Human-readable token rendering
//!
//! `Display` output is compact and stable, e.g. `TagOpen(b)`, `Text("hello")`,
//! `ExpansionMarker(echo|x)`. Tests and the `simple` output format rely on it.

use super::{Attributes, Payload, Token, TokenKind};
use std::fmt;

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Text => "Text",
            TokenKind::Newline => "Newline",
            TokenKind::TagOpen => "TagOpen",
            TokenKind::TagClose => "TagClose",
            TokenKind::SelfClosingTag => "SelfClosingTag",
            TokenKind::CommentMarker => "CommentMarker",
            TokenKind::ExpansionMarker => "ExpansionMarker",
            TokenKind::QuoteMarker => "QuoteMarker",
            TokenKind::ListMarker => "ListMarker",
            TokenKind::EndOfInput => "EndOfInput",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind(), self.payload()) {
            (TokenKind::Newline, _) | (TokenKind::EndOfInput, _) => write!(f, "{}", self.kind()),
            (TokenKind::Text, Payload::Text(text)) | (TokenKind::CommentMarker, Payload::Text(text)) => {
                write!(f, "{}({:?})", self.kind(), text)
            }
            (kind, Payload::Text(text)) => write!(f, "{}({})", kind, text),
            (kind, Payload::Tag(tag)) => {
                write!(f, "{}({}", kind, tag.name)?;
                if let Attributes::Parsed(attrs) = &tag.attributes {
                    for attr in attrs {
                        match &attr.value {
                            Some(value) => write!(f, " {}={:?}", attr.name, value)?,
                            None => write!(f, " {}", attr.name)?,
                        }
                    }
                }
                write!(f, ")")
            }
            (kind, Payload::Expansion(data)) => {
                write!(f, "{}({}", kind, data.target)?;
                for param in &data.params {
                    write!(f, "|{}", param)?;
                }
                write!(f, ")")
            }
            (kind, Payload::None) => write!(f, "{}", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ExpansionData, SourceRange, TagData, TokenId};
    use super::*;

    #[test]
    fn test_display_forms() {
        let text = Token::synthetic_text("hi", SourceRange::new(0, 2));
        assert_eq!(text.to_string(), "Text(\"hi\")");

        let open = Token::synthetic(
            TokenKind::TagOpen,
            Payload::Tag(TagData::new("ref").with_attribute("index", "1")),
            0,
        );
        assert_eq!(open.to_string(), "TagOpen(ref index=\"1\")");

        let marker = Token::new(
            TokenId::from_path(&[1]),
            TokenKind::ExpansionMarker,
            Payload::Expansion(ExpansionData {
                target: "echo".to_string(),
                params: vec!["x".to_string()],
                raw: "{{echo|x}}".to_string(),
            }),
            SourceRange::new(0, 10),
        );
        assert_eq!(marker.to_string(), "ExpansionMarker(echo|x)");

        let quote = Token::synthetic(TokenKind::QuoteMarker, Payload::Text("''".into()), 0);
        assert_eq!(quote.to_string(), "QuoteMarker('')");

        let end = Token::synthetic(TokenKind::EndOfInput, Payload::None, 0);
        assert_eq!(end.to_string(), "EndOfInput");
    }
}
