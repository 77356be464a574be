//! Raw lexemes
//!
//! The scanner layer of the tokenizer. Logos recognizes the delimiters of every construct
//! plus plain runs of text, always taking the longest match at the current position. It
//! knows nothing about context (line starts, nesting, whether a delimiter is ever closed);
//! the [`Tokenizer`](super::tokenizer::Tokenizer) decides that.
//!
//! The patterns together cover every character, so the scanner never fails on real input.

use logos::Logos;

/// Everything logos can recognize in wikitext-like markup.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lexeme {
    #[token("<!--")]
    CommentOpen,

    #[token("-->")]
    CommentClose,

    #[token("{{")]
    ExpansionOpen,

    #[token("}}")]
    ExpansionClose,

    /// `<` followed by a tag name.
    #[regex(r"<[A-Za-z][A-Za-z0-9]*")]
    TagStart,

    /// `</` followed by a tag name.
    #[regex(r"</[A-Za-z][A-Za-z0-9]*")]
    EndTagStart,

    #[token("/>")]
    SelfCloseEnd,

    #[token(">")]
    TagEnd,

    /// Two or more apostrophes.
    #[regex(r"'{2,}")]
    Quotes,

    #[regex(r"\r?\n")]
    Newline,

    /// List bullets. Only structural at the start of a line.
    #[regex(r"[*#:;]+")]
    Bullets,

    #[token("|")]
    Pipe,

    /// A run of characters that never start or end a construct.
    #[regex(r"[^<>{}'\r\n*#:;|/\-]+")]
    Word,

    /// A lone delimiter character that did not form a longer lexeme.
    #[regex(r"[<{}'/\-\r]")]
    Symbol,
}

impl Lexeme {
    /// Whether a construct can begin with this lexeme (apart from line-start bullets).
    pub fn opens_construct(self) -> bool {
        matches!(
            self,
            Lexeme::Newline
                | Lexeme::CommentOpen
                | Lexeme::ExpansionOpen
                | Lexeme::TagStart
                | Lexeme::EndTagStart
                | Lexeme::Quotes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<(Lexeme, &str)> {
        let mut lexer = Lexeme::lexer(source);
        let mut out = Vec::new();
        while let Some(result) = lexer.next() {
            out.push((result.expect("every character is covered"), lexer.slice()));
        }
        out
    }

    #[test]
    fn test_tag_lexemes() {
        assert_eq!(
            lex("<b>x</b><br/>"),
            vec![
                (Lexeme::TagStart, "<b"),
                (Lexeme::TagEnd, ">"),
                (Lexeme::Word, "x"),
                (Lexeme::EndTagStart, "</b"),
                (Lexeme::TagEnd, ">"),
                (Lexeme::TagStart, "<br"),
                (Lexeme::SelfCloseEnd, "/>"),
            ]
        );
    }

    #[test]
    fn test_longest_match_wins() {
        assert_eq!(lex("<!--"), vec![(Lexeme::CommentOpen, "<!--")]);
        assert_eq!(lex("'''"), vec![(Lexeme::Quotes, "'''")]);
        assert_eq!(lex("'"), vec![(Lexeme::Symbol, "'")]);
        assert_eq!(lex("{{{"), vec![(Lexeme::ExpansionOpen, "{{"), (Lexeme::Symbol, "{")]);
    }

    #[test]
    fn test_newlines() {
        assert_eq!(
            lex("a\r\nb\n"),
            vec![
                (Lexeme::Word, "a"),
                (Lexeme::Newline, "\r\n"),
                (Lexeme::Word, "b"),
                (Lexeme::Newline, "\n"),
            ]
        );
    }

    #[test]
    fn test_every_character_is_covered() {
        let source = "a < b > c -- d ->/ \r {x} ' ; | é 漢";
        let total: usize = lex(source).iter().map(|(_, s)| s.len()).sum();
        assert_eq!(total, source.len());
    }
}
