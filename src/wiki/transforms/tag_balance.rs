//! Tag balancing
//!
//! Keeps a stack of open elements so the output is always well nested. A close tag that
//! matches an element further down the stack first closes everything opened above it, then
//! reopens those elements after it. A close tag with no matching open element is kept as
//! literal text. Whatever is still open at the end of input is closed there, innermost first.
//!
//! Void elements (`br`, `img`, `meta`, ...) never enter the stack.

use crate::wiki::pipeline::{Emission, Stage, StageContext, StageError};
use crate::wiki::token::{Payload, TagData, Token, TokenKind};

pub const NAME: &str = "tag_balance";
pub const RANK: u32 = 500;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(name))
}

#[derive(Debug, Default)]
pub struct TagBalanceStage {
    open: Vec<TagData>,
    last_end: usize,
}

impl TagBalanceStage {
    pub fn new() -> Self {
        TagBalanceStage::default()
    }

    /// Nesting depth of the elements currently open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn on_close(&mut self, token: Token) -> Result<Emission, StageError> {
        let Some(name) = token.tag().map(|tag| tag.name.clone()) else {
            return Ok(Emission::token(token));
        };
        let matching = self.open.iter().rposition(|tag| tag.is_named(&name));
        let Some(position) = matching.filter(|_| !is_void_element(&name)) else {
            tracing::trace!(id = %token.id(), name = %name, "stray close tag kept as text");
            return Ok(Emission::token(token.downgrade_to_text()?));
        };

        let range = token.range();
        let misnested = self.open.split_off(position + 1);
        self.open.pop();

        let mut emission = Emission::none();
        for tag in misnested.iter().rev() {
            emission.push(Token::synthetic_close(&tag.name, range.start));
        }
        emission.push(token);
        for tag in &misnested {
            emission.push(Token::synthetic(
                TokenKind::TagOpen,
                Payload::Tag(tag.clone()),
                range.end,
            ));
        }
        self.open.extend(misnested);
        Ok(emission)
    }
}

impl Stage for TagBalanceStage {
    fn name(&self) -> &str {
        NAME
    }

    fn rank(&self) -> u32 {
        RANK
    }

    fn transform(&mut self, token: Token, _cx: &StageContext) -> Result<Emission, StageError> {
        self.last_end = token.range().end;
        match token.kind() {
            TokenKind::TagOpen => {
                if let Some(tag) = token.tag().filter(|tag| !is_void_element(&tag.name)) {
                    self.open.push(tag.clone());
                }
                Ok(Emission::token(token))
            }
            TokenKind::TagClose => self.on_close(token),
            _ => Ok(Emission::token(token)),
        }
    }

    fn flush(&mut self, _cx: &StageContext) -> Result<Emission, StageError> {
        let at = self.last_end;
        Ok(self
            .open
            .drain(..)
            .rev()
            .map(|tag| Token::synthetic_close(&tag.name, at))
            .collect::<Vec<_>>()
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::pipeline::PipelineRecipe;
    use crate::wiki::testing::{assert_described, assert_strictly_increasing, run};

    fn balance(text: &str) -> Vec<Token> {
        let recipe = PipelineRecipe::builder()
            .stage(|| Box::new(TagBalanceStage::new()))
            .build()
            .unwrap();
        run(&recipe, text).unwrap()
    }

    #[test]
    fn test_unclosed_tag_is_closed_at_end() {
        let tokens = balance("<b>hello");
        assert_described(
            &tokens,
            &["TagOpen(b)", "Text(\"hello\")", "TagClose(b)", "EndOfInput"],
        );
        assert!(tokens[2].range().is_empty());
        assert_eq!(tokens[2].range().start, 8);
        assert_strictly_increasing(&tokens);
    }

    #[test]
    fn test_stray_close_becomes_text() {
        assert_described(
            &balance("a</i>b"),
            &["Text(\"a\")", "Text(\"</i>\")", "Text(\"b\")", "EndOfInput"],
        );
    }

    #[test]
    fn test_misnested_close_reopens_inner_elements() {
        let tokens = balance("<i><b>x</i>y</b>");
        assert_described(
            &tokens,
            &[
                "TagOpen(i)",
                "TagOpen(b)",
                "Text(\"x\")",
                "TagClose(b)",
                "TagClose(i)",
                "TagOpen(b)",
                "Text(\"y\")",
                "TagClose(b)",
                "EndOfInput",
            ],
        );
        assert_strictly_increasing(&tokens);
    }

    #[test]
    fn test_void_elements_are_not_stacked() {
        assert_described(
            &balance("<br>x</br>"),
            &["TagOpen(br)", "Text(\"x\")", "Text(\"</br>\")", "EndOfInput"],
        );
    }

    #[test]
    fn test_close_matching_is_case_insensitive() {
        assert_described(
            &balance("<B>x</b>"),
            &["TagOpen(B)", "Text(\"x\")", "TagClose(b)", "EndOfInput"],
        );
    }
}
