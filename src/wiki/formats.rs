//! Output formats for token streams
//!
//! - [`detokenize`] rebuilds the document text from the document-origin spans of a stream.
//! - [`reconstruct`] rebuilds markup from the tokens alone (tokenizer output round-trips).
//! - [`tokens_to_string`] is the plain text of a stream: text tokens only.
//! - [`serialize`] renders a stream as `simple` (one `Display` line per token), `json` or
//!   `yaml`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::wiki::token::{Origin, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("unknown output format '{0}'")]
    UnknownFormat(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Simple,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn all() -> [OutputFormat; 3] {
        [OutputFormat::Simple, OutputFormat::Json, OutputFormat::Yaml]
    }
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(OutputFormat::Simple),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(FormatError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Simple => "simple",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        })
    }
}

/// Rebuild `source` from the document-origin tokens of a stream.
///
/// Tokens are expected in stream order. Spans that overlap text already written are skipped and
/// any stretch of `source` no token covers is copied through, so the result is `source` itself
/// whenever the stream's document spans tile it.
pub fn detokenize(source: &str, tokens: &[Token]) -> String {
    let mut result = String::with_capacity(source.len());
    let mut cursor = 0;
    for token in tokens {
        let range = token.range();
        if token.origin() != Origin::Document || range.is_empty() || range.start < cursor {
            continue;
        }
        let (Some(gap), Some(span)) = (source.get(cursor..range.start), source.get(range.as_range()))
        else {
            continue;
        };
        result.push_str(gap);
        result.push_str(span);
        cursor = range.end;
    }
    result.push_str(source.get(cursor..).unwrap_or_default());
    result
}

/// Rebuild markup from document-origin tokens without the source text.
pub fn reconstruct(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter(|t| t.origin() == Origin::Document)
        .map(Token::source_text)
        .collect()
}

/// Text content only; markup, comments and line breaks are dropped.
pub fn tokens_to_string(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter(|t| t.is(TokenKind::Text))
        .filter_map(Token::text)
        .collect()
}

/// One `Display` line per token.
pub fn to_string_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn serialize(tokens: &[Token], format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Simple => Ok(to_string_tokens(tokens)),
        OutputFormat::Json => serde_json::to_string_pretty(tokens)
            .map_err(|e| FormatError::Serialization(e.to_string())),
        OutputFormat::Yaml => {
            serde_yaml::to_string(tokens).map_err(|e| FormatError::Serialization(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::testing::{describe, run, tokens};
    use crate::wiki::transforms::{standard_recipe, InMemoryTemplates};
    use std::sync::Arc;

    const SAMPLE: &str = "*a ''b''\n<div class=\"x\">{{missing|y}}</div><!-- c -->\r\nz";

    #[test]
    fn test_detokenize_tokenizer_output() {
        assert_eq!(detokenize(SAMPLE, &tokens(SAMPLE)), SAMPLE);
        assert_eq!(reconstruct(&tokens(SAMPLE)), SAMPLE);
    }

    #[test]
    fn test_detokenize_dispatched_stream() {
        let templates = InMemoryTemplates::new().with("t", "'''inner'''");
        let recipe = standard_recipe(Arc::new(templates)).unwrap();
        for source in [SAMPLE, "a {{t}} b", "<b>open\n#x\n#y"] {
            let out = run(&recipe, source).unwrap();
            assert_eq!(detokenize(source, &out), source, "round trip of {:?}", source);
        }
    }

    #[test]
    fn test_tokens_to_string() {
        assert_eq!(tokens_to_string(&tokens("a<b>b</b>\n<!--x-->c")), "abc");
    }

    #[test]
    fn test_simple_format() {
        let out = serialize(&tokens("<b>x"), OutputFormat::Simple).unwrap();
        assert_eq!(out, "TagOpen(b)\nText(\"x\")\nEndOfInput");
    }

    #[test]
    fn test_json_round_trip_keeps_kinds() {
        let original = tokens("a\n<i>b</i>");
        let json = serialize(&original, OutputFormat::Json).unwrap();
        let parsed: Vec<Token> = serde_json::from_str(&json).unwrap();
        assert_eq!(describe(&parsed), describe(&original));
    }

    #[test]
    fn test_yaml_output() {
        let yaml = serialize(&tokens("x"), OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("kind: Text"));
        assert!(yaml.contains("kind: EndOfInput"));
    }

    #[test]
    fn test_format_names() {
        for format in OutputFormat::all() {
            assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
        }
        assert_eq!(
            "xml".parse::<OutputFormat>(),
            Err(FormatError::UnknownFormat("xml".to_string()))
        );
    }
}
