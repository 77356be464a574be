//! Reference numbering
//!
//! Gives every `<ref>` an `index` attribute. Numbering is per top-level document: the stage
//! is shareable, so refs that come out of template expansions continue the same sequence.
//! A ref with a `name` that was seen before reuses that ref's number.

use std::collections::HashMap;

use crate::wiki::pipeline::{Emission, Stage, StageContext, StageError};
use crate::wiki::token::{Payload, Token, TokenKind};

pub const NAME: &str = "references";
pub const RANK: u32 = 150;

#[derive(Debug, Default)]
pub struct ReferenceStage {
    next: usize,
    named: HashMap<String, usize>,
}

impl ReferenceStage {
    pub fn new() -> Self {
        ReferenceStage::default()
    }

    fn number_for(&mut self, name: Option<&str>) -> usize {
        if let Some(existing) = name.and_then(|n| self.named.get(n)) {
            return *existing;
        }
        self.next += 1;
        if let Some(name) = name {
            self.named.insert(name.to_string(), self.next);
        }
        self.next
    }
}

impl Stage for ReferenceStage {
    fn name(&self) -> &str {
        NAME
    }

    fn rank(&self) -> u32 {
        RANK
    }

    fn shareable(&self) -> bool {
        true
    }

    fn transform(&mut self, mut token: Token, _cx: &StageContext) -> Result<Emission, StageError> {
        let is_ref = token.is_tag(TokenKind::TagOpen, "ref")
            || token.is_tag(TokenKind::SelfClosingTag, "ref");
        if !is_ref {
            return Ok(Emission::token(token));
        }

        let ref_name = token
            .tag()
            .and_then(|tag| tag.attribute("name"))
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let index = self.number_for(ref_name.as_deref());
        if let Payload::Tag(tag) = token.payload_mut()? {
            tag.set_attribute("index", index.to_string());
        }
        Ok(Emission::token(token))
    }
}
