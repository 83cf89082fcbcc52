//! Query Lexer
//!
//! Splits a query string into classified tokens.
//!
//! # Supported Syntax
//!
//! ```text
//! <domain> [filter-token]* [directive-token]*
//!
//! tasks @webapp p<=2 due:eow -#blocked "release notes" cols:id,text,due sort:due+
//! ```
//!
//! Words are separated by whitespace, except inside `"..."`. Each word after
//! the domain is classified by the first matching entry of [`MATCHERS`], so
//! precedence is a table rather than implicit fallthrough.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, tag_no_case, take_till, take_till1, take_while, take_while1},
    character::complete::{char, satisfy},
    combinator::{all_consuming, map, peek, recognize, rest, verify},
    multi::{many1, separated_list1},
    sequence::{delimited, preceded, terminated},
    IResult,
};

use crate::query::error::LexError;
use crate::records::Domain;
use serde::Serialize;

/// Classified token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenKind {
    /// Leading domain keyword
    Domain { domain: Domain },
    /// `@name` or `@"name with spaces"`
    ProjectRef { name: String },
    /// Everything after the leading `p`: `1`, `<=2`, `1..3`
    PriorityExpr { expr: String },
    /// Everything after `due:`
    DateExpr { expr: String },
    /// The bare keyword `overdue`
    Overdue,
    /// Everything after `status:`
    StatusExpr { value: String },
    /// `#tag` or `-#tag`
    TagExpr { tag: String, negated: bool },
    /// Bare word or quoted phrase
    TextTerm { term: String },
    /// `key:value[,value...]`, key lower-cased
    Directive { name: String, values: Vec<String> },
}

/// A lexed token with its source text and byte offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Verbatim source text, quotes included
    pub raw: String,
    /// Byte offset of the first character in the query string
    pub position: usize,
}

/// A prefix matcher: `None` if the word is not its kind
pub type Matcher = fn(&str, usize) -> Option<Result<TokenKind, LexError>>;

/// Ordered prefix grammar; the first matcher returning `Some` wins
pub const MATCHERS: &[(&str, Matcher)] = &[
    ("quoted_text", match_quoted_text),
    ("project_ref", match_project_ref),
    ("negated_tag", match_negated_tag),
    ("tag", match_tag),
    ("due", match_due),
    ("overdue", match_overdue),
    ("status", match_status),
    ("priority", match_priority),
    ("directive", match_directive),
    ("text", match_text),
];

/// Lex a full query string
pub fn lex(input: &str) -> Result<Vec<Token>, LexError> {
    let words = split_words(input)?;
    let mut tokens = Vec::with_capacity(words.len());

    for (index, (position, word)) in words.into_iter().enumerate() {
        let kind = if index == 0 {
            match Domain::from_keyword(word) {
                Some(domain) => TokenKind::Domain { domain },
                None => classify(word, position)?,
            }
        } else {
            classify(word, position)?
        };

        tokens.push(Token {
            kind,
            raw: word.to_string(),
            position,
        });
    }

    Ok(tokens)
}

/// Classify one word using the matcher table
pub fn classify(word: &str, position: usize) -> Result<TokenKind, LexError> {
    MATCHERS
        .iter()
        .find_map(|(_, matcher)| matcher(word, position))
        .unwrap_or_else(|| Ok(TokenKind::TextTerm { term: unquote(word) }))
}

/// Split on whitespace outside quotes, returning `(byte offset, word)` pairs
fn split_words(input: &str) -> Result<Vec<(usize, &str)>, LexError> {
    let mut words = Vec::new();
    let mut remaining = input;

    loop {
        let (after_space, _) =
            parse_whitespace(remaining).map_err(|_| unterminated_quote(input, remaining))?;
        if after_space.is_empty() {
            break;
        }

        let position = input.len() - after_space.len();
        match parse_word(after_space) {
            // A word stops early only at a quote that never closes
            Ok((rest, _)) if rest.starts_with('"') => {
                return Err(unterminated_quote(input, rest))
            }
            Ok((rest, word)) => {
                words.push((position, word));
                remaining = rest;
            }
            Err(_) => return Err(unterminated_quote(input, after_space)),
        }
    }

    Ok(words)
}

fn unterminated_quote(input: &str, at: &str) -> LexError {
    LexError::UnterminatedQuote {
        fragment: at.to_string(),
        position: input.len() - at.len(),
    }
}

/// Parse a run of whitespace (possibly empty)
fn parse_whitespace(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace())(input)
}

/// Parse a `"..."` segment, quotes included
fn parse_quoted_segment(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('"'), take_till(|c: char| c == '"'), char('"')))(input)
}

/// Parse unquoted characters up to whitespace or a quote
fn parse_bare_segment(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace() || c == '"')(input)
}

/// Parse one word: bare and quoted segments glued together
fn parse_word(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((parse_quoted_segment, parse_bare_segment))))(input)
}

/// Parse one directive value; commas inside quotes do not split
fn parse_directive_value(input: &str) -> IResult<&str, String> {
    map(
        recognize(many1(alt((parse_quoted_segment, is_not(",\""))))),
        unquote,
    )(input)
}

/// Parse a directive key and its separator
fn parse_directive_key(input: &str) -> IResult<&str, &str> {
    terminated(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        char(':'),
    )(input)
}

/// Case-insensitive keyword prefix, yielding the remainder
fn after_prefix<'a>(word: &'a str, prefix: &'static str) -> Option<&'a str> {
    let parsed: IResult<&str, &str> = tag_no_case(prefix)(word);
    parsed.ok().map(|(rest, _)| rest)
}

fn unquote(s: &str) -> String {
    s.chars().filter(|&c| c != '"').collect()
}

fn match_quoted_text(word: &str, _: usize) -> Option<Result<TokenKind, LexError>> {
    let parsed: IResult<&str, char> = peek(char('"'))(word);
    parsed
        .ok()
        .map(|_| Ok(TokenKind::TextTerm { term: unquote(word) }))
}

fn match_project_ref(word: &str, _: usize) -> Option<Result<TokenKind, LexError>> {
    let parsed: IResult<&str, &str> = preceded(char('@'), rest)(word);
    let (_, name) = parsed.ok()?;
    Some(Ok(TokenKind::ProjectRef { name: unquote(name) }))
}

fn parse_tag_body(input: &str) -> IResult<&str, &str> {
    verify(rest, |s: &str| !s.is_empty())(input)
}

fn match_negated_tag(word: &str, _: usize) -> Option<Result<TokenKind, LexError>> {
    let (_, tag_name) = preceded(tag("-#"), parse_tag_body)(word).ok()?;
    Some(Ok(TokenKind::TagExpr {
        tag: unquote(tag_name),
        negated: true,
    }))
}

fn match_tag(word: &str, _: usize) -> Option<Result<TokenKind, LexError>> {
    let (_, tag_name) = preceded(char('#'), parse_tag_body)(word).ok()?;
    Some(Ok(TokenKind::TagExpr {
        tag: unquote(tag_name),
        negated: false,
    }))
}

fn match_due(word: &str, _: usize) -> Option<Result<TokenKind, LexError>> {
    let expr = after_prefix(word, "due:")?;
    Some(Ok(TokenKind::DateExpr {
        expr: unquote(expr).to_lowercase(),
    }))
}

fn match_overdue(word: &str, _: usize) -> Option<Result<TokenKind, LexError>> {
    let parsed: IResult<&str, &str> = all_consuming(tag_no_case("overdue"))(word);
    parsed.ok().map(|_| Ok(TokenKind::Overdue))
}

fn match_status(word: &str, _: usize) -> Option<Result<TokenKind, LexError>> {
    let value = after_prefix(word, "status:")?;
    Some(Ok(TokenKind::StatusExpr {
        value: unquote(value).to_lowercase(),
    }))
}

/// `p` followed by a digit or comparison operator; the operand is left unconsumed
fn parse_priority_prefix(input: &str) -> IResult<&str, &str> {
    terminated(
        tag_no_case("p"),
        peek(satisfy(|c| c.is_ascii_digit() || matches!(c, '<' | '>' | '='))),
    )(input)
}

fn match_priority(word: &str, _: usize) -> Option<Result<TokenKind, LexError>> {
    let (expr, _) = parse_priority_prefix(word).ok()?;
    Some(Ok(TokenKind::PriorityExpr {
        expr: expr.to_string(),
    }))
}

fn match_directive(word: &str, position: usize) -> Option<Result<TokenKind, LexError>> {
    let (rest, key) = parse_directive_key(word).ok()?;

    let parsed: IResult<&str, Vec<String>> =
        all_consuming(separated_list1(char(','), parse_directive_value))(rest);
    match parsed {
        Ok((_, values)) => Some(Ok(TokenKind::Directive {
            name: key.to_lowercase(),
            values,
        })),
        Err(_) => Some(Err(LexError::MalformedDirective {
            fragment: word.to_string(),
            position,
        })),
    }
}

fn match_text(word: &str, _: usize) -> Option<Result<TokenKind, LexError>> {
    Some(Ok(TokenKind::TextTerm { term: unquote(word) }))
}
