//! Token identifiers
//!
//!     Every token carries a [`TokenId`]. Ids are the only thing token equality and ordering
//!     look at, so they have to encode document order even after recursive expansion has
//!     spliced whole sub-streams into the middle of a parent stream.
//!
//!     A plain counter cannot do that: a sub-stream is produced after the tokens that follow
//!     its expansion point may already exist. Instead ids are paths compared
//!     lexicographically, where a prefix sorts before all of its extensions:
//!
//!         1 < 2 < 2.1 < 2.2 < 2.2.1 < 3
//!
//!     - A top-level tokenizer numbers tokens `1, 2, 3, ...`.
//!     - A tokenizer invoked for the expansion anchored at token `M` numbers its tokens
//!       `M.1, M.2, ...`, which all sort between `M` and whatever followed `M`.
//!     - A synthetic token created by stage `i` right after token `P` gets `P.0.~i.k`. The
//!       `0` component puts it below `P.1`, the first token a nested tokenizer anchored at
//!       `P` hands out, so a stage may create tokens between a transclusion start and the
//!       content spliced after it. The `~i` component is `u32::MAX - i`, so synthetic tokens
//!       of later stages sort before those of earlier stages hanging off the same token. An
//!       earlier stage only ever emits its synthetic tokens after a later stage has already
//!       seen `P`, so this keeps emission order increasing.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Components at or above this value are synthetic stage markers.
const SYNTHETIC_BAND: u32 = u32::MAX - 4096;

/// Hierarchical, totally ordered token identifier.
///
/// The empty path is reserved for tokens whose id has not been assigned yet (synthetic tokens
/// before the dispatcher stamps them).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(SmallVec<[u32; 4]>);

impl TokenId {
    /// The id of a token that has not been stamped yet.
    pub fn unassigned() -> Self {
        TokenId(SmallVec::new())
    }

    /// Build an id from its path components.
    pub fn from_path(path: &[u32]) -> Self {
        TokenId(SmallVec::from_slice(path))
    }

    pub fn is_assigned(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// The `n`-th child of this id.
    pub fn child(&self, n: u32) -> TokenId {
        let mut path = self.0.clone();
        path.push(n);
        TokenId(path)
    }

    /// The id a stage uses as "previous token" before it has emitted anything.
    ///
    /// It sorts after `self` and before `self.child(1)`.
    pub fn virtual_root(&self) -> TokenId {
        self.child(0)
    }

    /// The `n`-th synthetic token created by stage `stage_index` after `self`.
    ///
    /// It sorts after `self` and before `self.child(1)`.
    pub fn synthetic_child(&self, stage_index: usize, n: u32) -> TokenId {
        let band = u32::try_from(stage_index)
            .ok()
            .and_then(|i| u32::MAX.checked_sub(i))
            .filter(|c| *c >= SYNTHETIC_BAND)
            .unwrap_or(SYNTHETIC_BAND);
        let mut path = self.0.clone();
        path.push(0);
        path.push(band);
        path.push(n);
        TokenId(path)
    }

    /// Whether `self` lies strictly inside the subtree rooted at `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &TokenId) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "?");
        }
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            if *component >= SYNTHETIC_BAND {
                write!(f, "~{}", u32::MAX - component)?;
            } else {
                write!(f, "{}", component)?;
            }
        }
        Ok(())
    }
}

/// Hands out consecutive ids below a base id.
///
/// A top-level tokenizer uses the empty base and yields `1, 2, 3, ...`; a nested tokenizer
/// uses its anchor token's id as base.
#[derive(Debug, Clone)]
pub struct IdSequence {
    base: TokenId,
    next: u32,
}

impl IdSequence {
    pub fn new(base: TokenId) -> Self {
        IdSequence { base, next: 1 }
    }

    pub fn top_level() -> Self {
        Self::new(TokenId::unassigned())
    }

    pub fn base(&self) -> &TokenId {
        &self.base
    }

    pub fn next_id(&mut self) -> TokenId {
        let id = self.base.child(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_sorts_before_extension() {
        let parent = TokenId::from_path(&[2]);
        let child = parent.child(1);
        let next = TokenId::from_path(&[3]);

        assert!(parent < child);
        assert!(child < next);
    }

    #[test]
    fn test_virtual_root_sits_between_anchor_and_first_child() {
        let anchor = TokenId::from_path(&[7]);
        assert!(anchor < anchor.virtual_root());
        assert!(anchor.virtual_root() < anchor.child(1));
    }

    #[test]
    fn test_later_stage_synthetics_sort_before_earlier_stage_synthetics() {
        let p = TokenId::from_path(&[4]);
        let from_stage_3 = p.synthetic_child(3, 1);
        let from_stage_1 = p.synthetic_child(1, 1);

        assert!(p < from_stage_3);
        assert!(from_stage_3 < from_stage_1);
        assert!(from_stage_1 < TokenId::from_path(&[5]));
    }

    #[test]
    fn test_synthetics_sort_before_nested_children() {
        let anchor = TokenId::from_path(&[4]);
        let synthetic = anchor.synthetic_child(4, 7);
        assert!(anchor < synthetic);
        assert!(synthetic < anchor.child(1));
        assert!(anchor.synthetic_child(2, 1) < anchor.child(1));

        // A synthetic after a nested token stays inside that token's slot.
        let nested = anchor.child(1);
        assert!(nested < nested.synthetic_child(5, 1));
        assert!(nested.synthetic_child(5, 1) < anchor.child(2));
    }

    #[test]
    fn test_sequence_numbers_under_base() {
        let mut top = IdSequence::top_level();
        assert_eq!(top.next_id(), TokenId::from_path(&[1]));
        assert_eq!(top.next_id(), TokenId::from_path(&[2]));

        let mut nested = IdSequence::new(TokenId::from_path(&[2]));
        assert_eq!(nested.next_id(), TokenId::from_path(&[2, 1]));
    }

    #[test]
    fn test_display() {
        let id = TokenId::from_path(&[4]).synthetic_child(2, 1);
        assert_eq!(id.to_string(), "4.0.~2.1");
        assert_eq!(TokenId::unassigned().to_string(), "?");
    }

    #[test]
    fn test_descendant() {
        let a = TokenId::from_path(&[1, 2]);
        assert!(a.child(3).is_descendant_of(&a));
        assert!(!a.is_descendant_of(&a));
        assert!(!TokenId::from_path(&[1, 3]).is_descendant_of(&a));
    }
}
