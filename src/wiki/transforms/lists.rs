//! List structure
//!
//! Turns line-start bullet markers into nested list tags. `*` is an unordered list, `#` an
//! ordered one, `;` and `:` are the term and description items of a definition list. The
//! stage remembers the bullets of the previous item and, for each new one, closes what is no
//! longer shared and opens what is new. A blank line or a line without bullets ends every
//! open list.

use crate::wiki::pipeline::{Emission, Stage, StageContext, StageError};
use crate::wiki::token::{Payload, TagData, Token, TokenKind};

pub const NAME: &str = "lists";
pub const RANK: u32 = 400;

/// List and item tag names for a bullet.
fn tags_for(bullet: char) -> Option<(&'static str, &'static str)> {
    match bullet {
        '*' => Some(("ul", "li")),
        '#' => Some(("ol", "li")),
        ';' => Some(("dl", "dt")),
        ':' => Some(("dl", "dd")),
        _ => None,
    }
}

fn is_term_description_pair(a: char, b: char) -> bool {
    matches!((a, b), (';', ':') | (':', ';'))
}

fn common_prefix_len(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

type TagStep = (TokenKind, &'static str);

#[derive(Debug, Default)]
pub struct ListStage {
    bullets: Vec<char>,
    /// Tag names to close, innermost last: list, item, list, item, ...
    end_tags: Vec<&'static str>,
    after_newline: bool,
    last_end: usize,
}

impl ListStage {
    pub fn new() -> Self {
        ListStage::default()
    }

    fn in_list(&self) -> bool {
        !self.bullets.is_empty()
    }

    fn pop_levels(&mut self, levels: usize) -> Vec<TagStep> {
        let mut steps = Vec::with_capacity(levels * 2);
        for _ in 0..levels {
            for _ in 0..2 {
                if let Some(name) = self.end_tags.pop() {
                    steps.push((TokenKind::TagClose, name));
                }
            }
        }
        steps
    }

    /// Close the current item and open a new one with the same name.
    fn next_item(&mut self, steps: &mut Vec<TagStep>) {
        if let Some(item) = self.end_tags.pop() {
            steps.push((TokenKind::TagClose, item));
            steps.push((TokenKind::TagOpen, item));
            self.end_tags.push(item);
        }
    }

    fn item_steps(&mut self, next: Vec<char>) -> Vec<TagStep> {
        let previous = std::mem::replace(&mut self.bullets, next.clone());
        let mut shared = common_prefix_len(&previous, &next);
        self.after_newline = false;

        let mut steps = Vec::new();
        if previous.len() == next.len() && shared == next.len() {
            self.next_item(&mut steps);
            return steps;
        }

        if shared < previous.len()
            && shared < next.len()
            && is_term_description_pair(previous[shared], next[shared])
        {
            steps.extend(self.pop_levels(previous.len() - shared - 1));
            if let (Some(old), Some((_, item))) = (self.end_tags.pop(), tags_for(next[shared])) {
                steps.push((TokenKind::TagClose, old));
                steps.push((TokenKind::TagOpen, item));
                self.end_tags.push(item);
            }
            shared += 1;
        } else {
            steps.extend(self.pop_levels(previous.len() - shared));
            if shared > 0 && next.len() == shared {
                self.next_item(&mut steps);
            }
        }

        for bullet in &next[shared..] {
            if let Some((list, item)) = tags_for(*bullet) {
                self.end_tags.push(list);
                self.end_tags.push(item);
                steps.push((TokenKind::TagOpen, list));
                steps.push((TokenKind::TagOpen, item));
            }
        }
        steps
    }

    fn on_marker(&mut self, marker: Token) -> Result<Emission, StageError> {
        let bullets: Vec<char> = marker.text().unwrap_or_default().chars().collect();
        let at = marker.range().start;
        let mut steps = self.item_steps(bullets);
        let Some((kind, name)) = steps.pop() else {
            return Ok(Emission::token(marker.downgrade_to_text()?));
        };

        let mut emission: Emission = steps
            .into_iter()
            .map(|(kind, name)| Token::synthetic(kind, Payload::Tag(TagData::new(name)), at))
            .collect::<Vec<_>>()
            .into();
        emission.push(marker.rewrite(kind, Payload::Tag(TagData::new(name)))?);
        Ok(emission)
    }

    /// Close every open list at `at`.
    fn close_all(&mut self, at: usize) -> Emission {
        let levels = self.bullets.len();
        let steps = self.pop_levels(levels);
        self.bullets.clear();
        self.end_tags.clear();
        self.after_newline = false;
        steps
            .into_iter()
            .map(|(kind, name)| Token::synthetic(kind, Payload::Tag(TagData::new(name)), at))
            .collect::<Vec<_>>()
            .into()
    }
}

impl Stage for ListStage {
    fn name(&self) -> &str {
        NAME
    }

    fn rank(&self) -> u32 {
        RANK
    }

    fn transform(&mut self, token: Token, _cx: &StageContext) -> Result<Emission, StageError> {
        self.last_end = token.range().end;
        if token.is(TokenKind::ListMarker) {
            return self.on_marker(token);
        }
        if !self.in_list() {
            return Ok(Emission::token(token));
        }
        // Transclusion boundaries must not end a list item.
        if token.is_tag(TokenKind::SelfClosingTag, "meta") {
            return Ok(Emission::token(token));
        }
        if token.is(TokenKind::Newline) && !self.after_newline {
            self.after_newline = true;
            return Ok(Emission::token(token));
        }
        if self.after_newline {
            let mut emission = self.close_all(token.range().start);
            emission.push(token);
            return Ok(emission);
        }
        Ok(Emission::token(token))
    }

    fn flush(&mut self, _cx: &StageContext) -> Result<Emission, StageError> {
        Ok(if self.in_list() {
            self.close_all(self.last_end)
        } else {
            Emission::none()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::pipeline::PipelineRecipe;
    use crate::wiki::testing::{assert_described, assert_strictly_increasing, run};

    fn lists(text: &str) -> Vec<Token> {
        let recipe = PipelineRecipe::builder()
            .stage(|| Box::new(ListStage::new()))
            .build()
            .unwrap();
        run(&recipe, text).unwrap()
    }

    #[test]
    fn test_simple_list() {
        let tokens = lists("*a\n*b");
        assert_described(
            &tokens,
            &[
                "TagOpen(ul)",
                "TagOpen(li)",
                "Text(\"a\")",
                "Newline",
                "TagClose(li)",
                "TagOpen(li)",
                "Text(\"b\")",
                "TagClose(li)",
                "TagClose(ul)",
                "EndOfInput",
            ],
        );
        assert_strictly_increasing(&tokens);
    }

    #[test]
    fn test_nested_list() {
        assert_described(
            &lists("*a\n**b\n*c"),
            &[
                "TagOpen(ul)",
                "TagOpen(li)",
                "Text(\"a\")",
                "Newline",
                "TagOpen(ul)",
                "TagOpen(li)",
                "Text(\"b\")",
                "Newline",
                "TagClose(li)",
                "TagClose(ul)",
                "TagClose(li)",
                "TagOpen(li)",
                "Text(\"c\")",
                "TagClose(li)",
                "TagClose(ul)",
                "EndOfInput",
            ],
        );
    }

    #[test]
    fn test_term_then_description() {
        assert_described(
            &lists(";t\n:d"),
            &[
                "TagOpen(dl)",
                "TagOpen(dt)",
                "Text(\"t\")",
                "Newline",
                "TagClose(dt)",
                "TagOpen(dd)",
                "Text(\"d\")",
                "TagClose(dd)",
                "TagClose(dl)",
                "EndOfInput",
            ],
        );
    }

    #[test]
    fn test_switching_list_type() {
        assert_described(
            &lists("*a\n#b"),
            &[
                "TagOpen(ul)",
                "TagOpen(li)",
                "Text(\"a\")",
                "Newline",
                "TagClose(li)",
                "TagClose(ul)",
                "TagOpen(ol)",
                "TagOpen(li)",
                "Text(\"b\")",
                "TagClose(li)",
                "TagClose(ol)",
                "EndOfInput",
            ],
        );
    }

    #[test]
    fn test_plain_line_ends_the_list() {
        let tokens = lists("*a\nb");
        assert_described(
            &tokens,
            &[
                "TagOpen(ul)",
                "TagOpen(li)",
                "Text(\"a\")",
                "Newline",
                "TagClose(li)",
                "TagClose(ul)",
                "Text(\"b\")",
                "EndOfInput",
            ],
        );
        assert_strictly_increasing(&tokens);
    }

    #[test]
    fn test_marker_keeps_its_id_and_range() {
        let tokens = lists("**x");
        let item = &tokens[3];
        assert_eq!(item.to_string(), "TagOpen(li)");
        assert_eq!(item.id().to_string(), "1");
        assert_eq!(item.range().as_range(), 0..2);
        assert!(tokens[0].range().is_empty());
    }
}
