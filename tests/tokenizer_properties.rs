//! Property-based tests for the tokenizer
//!
//! Inputs are stitched together from markup fragments so that every construct (and every
//! way of leaving one unterminated) shows up often.

use proptest::prelude::*;
use wikiflow::wiki::formats::{detokenize, reconstruct};
use wikiflow::wiki::lexing::tokenize;
use wikiflow::wiki::token::{Token, TokenKind};

const FRAGMENTS: &[&str] = &[
    "a", "word", " ", "\n", "\r\n", "''", "'''", "'", "*", "#", ":", ";", "<b>", "</b>", "<i>",
    "</i>", "<br/>", "<div class=\"c\">", "</div>", "<", ">", "/", "-", "{{", "}}", "{{t}}",
    "{{t|x|k=v}}", "|", "<!--", "-->", "<!-- note -->", "<ref name=r>", "</ref>", "=",
];

fn wikitext() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 0..24).prop_map(|parts| parts.concat())
}

fn collect(text: &str) -> Vec<Token> {
    tokenize(text, 0).collect()
}

fn shape(tokens: &[Token]) -> Vec<(String, std::ops::Range<usize>)> {
    tokens
        .iter()
        .map(|t| (t.to_string(), t.range().as_range()))
        .collect()
}

proptest! {
    #[test]
    fn test_exactly_one_end_of_input(input in wikitext()) {
        let tokens = collect(&input);
        let ends = tokens.iter().filter(|t| t.is(TokenKind::EndOfInput)).count();
        prop_assert_eq!(ends, 1);
        prop_assert!(tokens.last().is_some_and(Token::is_end_of_input));
    }

    #[test]
    fn test_tokenize_is_deterministic(input in wikitext()) {
        prop_assert_eq!(shape(&collect(&input)), shape(&collect(&input)));
    }

    #[test]
    fn test_ranges_tile_the_input(input in wikitext()) {
        let tokens = collect(&input);
        let mut cursor = 0;
        for token in &tokens {
            prop_assert_eq!(token.range().start, cursor, "gap or overlap before {}", token);
            cursor = token.range().end;
        }
        prop_assert_eq!(cursor, input.len());
    }

    #[test]
    fn test_round_trip(input in wikitext()) {
        let tokens = collect(&input);
        prop_assert_eq!(detokenize(&input, &tokens), input.clone());
        prop_assert_eq!(reconstruct(&tokens), input);
    }

    #[test]
    fn test_ids_strictly_increase(input in wikitext()) {
        let tokens = collect(&input);
        for pair in tokens.windows(2) {
            prop_assert!(pair[0].id() < pair[1].id());
        }
    }

    #[test]
    fn test_start_offset_shifts_ranges(input in wikitext(), offset in 0usize..1000) {
        let base = collect(&input);
        let shifted: Vec<Token> = tokenize(&input, offset).collect();
        prop_assert_eq!(base.len(), shifted.len());
        for (a, b) in base.iter().zip(&shifted) {
            prop_assert_eq!(a.range().start + offset, b.range().start);
            prop_assert_eq!(a.to_string(), b.to_string());
        }
    }
}
