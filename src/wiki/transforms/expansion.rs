//! Template expansion
//!
//!     Resolves `{{target|params}}` markers through a [`TemplateSource`].
//!
//!     Resolved markers become a transclusion: the marker itself turns into a self-closing
//!     `meta` tag (`typeof="mw:Transclusion"`, keeping the marker's id and source range),
//!     followed by the template body tokenized and dispatched as foreign content, followed by
//!     a synthetic `meta` end marker. The body's tokens are numbered below the marker, so they
//!     sort between it and whatever followed it in the document.
//!
//!     Unresolved markers stay literal: `{{`, then the text between the braces tokenized as a
//!     mid-line document span (so markup inside the parameters still works), then `}}`.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::wiki::pipeline::{Emission, Expansion, Stage, StageContext, StageError};
use crate::wiki::token::{ExpansionData, Origin, Payload, TagData, Token, TokenKind};

pub const NAME: &str = "expansion";
pub const RANK: u32 = 200;

/// `typeof` of the meta tag that opens a transclusion.
pub const TRANSCLUSION: &str = "mw:Transclusion";
/// `typeof` of the meta tag that closes a transclusion.
pub const TRANSCLUSION_END: &str = "mw:Transclusion/End";

/// Where template bodies come from.
pub trait TemplateSource: Send + Sync {
    /// The expanded body for `target` called with `params`, or `None` if unknown.
    fn resolve(&self, target: &str, params: &[String]) -> Option<String>;
}

static PARAMETER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\{\s*([^{}|]+?)\s*(?:\|([^{}]*))?\}\}\}").expect("parameter pattern is valid")
});

/// Templates held in memory.
///
/// Bodies may reference arguments as `{{{1}}}` (positional, 1-based) or `{{{name}}}` (from a
/// `name=value` parameter), with an optional default: `{{{1|fallback}}}`. References without
/// a value or default are left as written.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplates {
    templates: HashMap<String, String>,
}

impl InMemoryTemplates {
    pub fn new() -> Self {
        InMemoryTemplates::default()
    }

    pub fn with(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(name, body);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.templates.insert(name.into().trim().to_string(), body.into());
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn argument<'p>(params: &'p [String], key: &str) -> Option<&'p str> {
    if let Ok(position) = key.parse::<usize>() {
        let positional = params.iter().filter(|p| !p.contains('='));
        return positional
            .map(String::as_str)
            .nth(position.checked_sub(1)?);
    }
    params.iter().find_map(|param| {
        let (name, value) = param.split_once('=')?;
        (name.trim() == key).then(|| value.trim())
    })
}

impl TemplateSource for InMemoryTemplates {
    fn resolve(&self, target: &str, params: &[String]) -> Option<String> {
        let body = self.templates.get(target.trim())?;
        let substituted = PARAMETER.replace_all(body, |caps: &Captures| {
            let key = caps.get(1).map_or("", |m| m.as_str());
            argument(params, key)
                .or_else(|| caps.get(2).map(|m| m.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        });
        Some(substituted.into_owned())
    }
}

pub struct ExpansionStage {
    templates: Arc<dyn TemplateSource>,
}

impl ExpansionStage {
    pub fn new(templates: Arc<dyn TemplateSource>) -> Self {
        ExpansionStage { templates }
    }

    fn transclude(&self, marker: Token, data: ExpansionData, body: String) -> Result<Emission, StageError> {
        let end = marker.range().end;
        let anchor = marker.id().clone();
        let start_tag = TagData::new("meta")
            .with_attribute("typeof", TRANSCLUSION)
            .with_attribute("data-target", data.target.as_str());
        let start = marker.rewrite(TokenKind::SelfClosingTag, Payload::Tag(start_tag))?;
        let end_tag = TagData::new("meta").with_attribute("typeof", TRANSCLUSION_END);

        let mut emission = Emission::token(start);
        emission.push_expansion(Expansion::new(body, anchor, Origin::Foreign));
        emission.push(Token::synthetic(
            TokenKind::SelfClosingTag,
            Payload::Tag(end_tag),
            end,
        ));
        Ok(emission)
    }

    fn keep_literal(&self, marker: Token, data: ExpansionData) -> Result<Emission, StageError> {
        let range = marker.range();
        let anchor = marker.id().clone();
        let origin = marker.origin();
        let inner = data
            .raw
            .get(2..data.raw.len().saturating_sub(2))
            .unwrap_or_default()
            .to_string();

        let mut open = marker.rewrite(TokenKind::Text, Payload::Text("{{".to_string()))?;
        open.set_range(range.within(range.start, range.start + 2))?;
        let close = Token::synthetic_text(
            "}}",
            range.within(range.end.saturating_sub(2), range.end),
        );

        let mut emission = Emission::token(open);
        if !inner.is_empty() {
            emission.push_expansion(
                Expansion::new(inner, anchor, origin)
                    .at_offset(range.start + 2)
                    .mid_line(),
            );
        }
        emission.push(close);
        Ok(emission)
    }
}

impl Stage for ExpansionStage {
    fn name(&self) -> &str {
        NAME
    }

    fn rank(&self) -> u32 {
        RANK
    }

    fn transform(&mut self, token: Token, cx: &StageContext) -> Result<Emission, StageError> {
        let Some(data) = token.expansion().cloned() else {
            return Ok(Emission::token(token));
        };
        match self.templates.resolve(&data.target, &data.params) {
            Some(body) => {
                tracing::debug!(target_name = %data.target, depth = cx.depth(), "transcluding template");
                self.transclude(token, data, body)
            }
            None => {
                tracing::trace!(target_name = %data.target, "unknown template kept literal");
                self.keep_literal(token, data)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::pipeline::PipelineRecipe;
    use crate::wiki::testing::{assert_described, assert_strictly_increasing, run, FnStage};

    #[test]
    fn test_positional_and_named_arguments() {
        let templates = InMemoryTemplates::new()
            .with("greet", "Hello {{{1}}}, {{{who}}}{{{missing|!}}}{{{2}}}");
        let body = templates
            .resolve("greet", &["Ann".to_string(), "who= Bob ".to_string()])
            .unwrap();
        assert_eq!(body, "Hello Ann, Bob!{{{2}}}");
    }

    #[test]
    fn test_unknown_template() {
        let templates = InMemoryTemplates::new().with("a", "x");
        assert!(templates.resolve("b", &[]).is_none());
        assert_eq!(templates.resolve(" a ", &[]).as_deref(), Some("x"));
        assert_eq!(templates.len(), 1);
    }

    #[test]
    fn test_zero_width_marker_stays_literal() {
        let recipe = PipelineRecipe::builder()
            .stage(|| {
                Box::new(FnStage::new("marker", 1, |token: Token, _cx: &StageContext| {
                    if token.text() != Some("q") {
                        return Ok(Emission::token(token));
                    }
                    let data = ExpansionData {
                        target: "nope".to_string(),
                        params: Vec::new(),
                        raw: "{{nope}}".to_string(),
                    };
                    Ok(Emission::token(Token::synthetic(
                        TokenKind::ExpansionMarker,
                        Payload::Expansion(data),
                        token.range().start,
                    )))
                }))
            })
            .stage(|| Box::new(ExpansionStage::new(Arc::new(InMemoryTemplates::new()))))
            .build()
            .unwrap();
        let tokens = run(&recipe, "q").unwrap();

        assert_described(
            &tokens,
            &["Text(\"{{\")", "Text(\"nope\")", "Text(\"}}\")", "EndOfInput"],
        );
        assert!(tokens[0].range().is_empty());
        assert!(tokens[2].range().is_empty());
        assert_strictly_increasing(&tokens);
    }
}
