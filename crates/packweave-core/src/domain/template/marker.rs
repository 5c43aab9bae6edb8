//! `{{ }}` dialect.
//!
//! | Tag                         | Block                                 |
//! |-----------------------------|---------------------------------------|
//! | `{{path}}`                  | value, unknown property is an error   |
//! | `{{path?}}`                 | value, unknown property renders empty |
//! | `{{path \| "text"}}`        | value with fallback                   |
//! | `{{@slot name}}`            | named slot                            |
//! | `{{@slots name}}`           | repeating slot                        |
//! | `{{#if p}}..{{#else}}..{{/if}}` | conditional on truthiness         |
//! | `{{#if p == lit}}..{{/if}}` | conditional on equality               |
//! | `{{#when p}}{{#is lit}}..{{#else}}..{{/when}}` | multi-branch       |
//! | `{{#each p as x}}..{{/each}}` | repetition                          |
//! | `{{! text}}`                | comment                               |
//!
//! `\{{` escapes a tag: it is emitted literally with the backslash removed.
//! A control tag or comment alone on its line consumes the whole line. So
//! does a slot directive alone on a line ending in a break; its fragments
//! are then indented to the directive's column.

use logos::{Lexer, Logos};

use super::{Block, BlockKind, Branch, SlotRef, Span, ValueExpr, is_property_path, syntax_error};
use crate::domain::{error::DomainError, value_objects::Value};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub fn parse(body: &str) -> Result<Vec<Block>, DomainError> {
    let tokens = tokenize(body)?;
    let mut parser = Parser { tokens, pos: 0 };
    let (blocks, stop) = parser.sequence(&[])?;
    match stop {
        None => Ok(blocks),
        Some(tag) => Err(syntax_error(
            tag.span.start,
            format!("unexpected '{{{{{}}}}}'", tag.inner),
        )),
    }
}

// ── Tokens ───────────────────────────────────────────────────────────────────

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    /// `\{{ .. }}`: passed through with the backslash removed.
    #[token(r"\{{", escaped_tag)]
    Escaped,
    #[token("{{", close_tag)]
    Tag,
    #[regex(r"[^{\\]+")]
    #[token("{")]
    #[token("\\")]
    Text,
}

fn escaped_tag(lex: &mut Lexer<Lexeme>) {
    if let Some(close) = lex.remainder().find(CLOSE) {
        lex.bump(close + CLOSE.len());
    }
}

/// Extend an opening `{{` to its `}}`. No close is a lexing error.
fn close_tag(lex: &mut Lexer<Lexeme>) -> bool {
    match lex.remainder().find(CLOSE) {
        Some(close) => {
            lex.bump(close + CLOSE.len());
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone)]
struct Tag {
    inner: String,
    span: Span,
    /// Indentation of the line a standalone slot directive consumed.
    indent: Option<String>,
}

impl Tag {
    fn keyword(&self) -> &str {
        if self.inner.starts_with('!') {
            return "!";
        }
        self.inner.split_whitespace().next().unwrap_or_default()
    }

    /// Text after the keyword.
    fn argument(&self) -> &str {
        let keyword = self.keyword();
        self.inner[keyword.len()..].trim()
    }

    fn is_control(&self) -> bool {
        matches!(
            self.keyword(),
            "!" | "#if" | "#else" | "/if" | "#when" | "#is" | "/when" | "#each" | "/each"
        )
    }

    fn is_slot(&self) -> bool {
        matches!(self.keyword(), "@slot" | "@slots")
    }
}

#[derive(Debug, Clone)]
enum Token {
    Text { text: String, span: Span },
    Tag(Tag),
}

fn tokenize(body: &str) -> Result<Vec<Token>, DomainError> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut text_start = 0;

    for (lexeme, span) in Lexeme::lexer(body).spanned() {
        let slice = &body[span.clone()];
        match lexeme {
            Ok(Lexeme::Text) => text.push_str(slice),
            Ok(Lexeme::Escaped) => text.push_str(&slice[1..]),
            Ok(Lexeme::Tag) => {
                if !text.is_empty() {
                    tokens.push(Token::Text {
                        text: std::mem::take(&mut text),
                        span: text_start..span.start,
                    });
                }
                tokens.push(Token::Tag(Tag {
                    inner: slice[OPEN.len()..slice.len() - CLOSE.len()].trim().to_string(),
                    span: span.clone(),
                    indent: None,
                }));
                text_start = span.end;
            }
            Err(()) => return Err(syntax_error(span.start, "unterminated '{{'")),
        }
    }

    if !text.is_empty() {
        tokens.push(Token::Text {
            text,
            span: text_start..body.len(),
        });
    }

    Ok(strip_standalone_lines(body, tokens))
}

/// Remove the indentation and line break around control tags that sit alone
/// on their line. Slot directives take their line only when it ends in a
/// break, and remember its indentation for the fragments.
fn strip_standalone_lines(body: &str, mut tokens: Vec<Token>) -> Vec<Token> {
    let mut consumed: Vec<Span> = Vec::new();
    for token in &mut tokens {
        let Token::Tag(tag) = token else {
            continue;
        };
        if !tag.is_control() && !tag.is_slot() {
            continue;
        }
        let Some(line) = standalone_line(body, &tag.span) else {
            continue;
        };
        if tag.is_slot() {
            if !body[..line.end].ends_with('\n') {
                continue;
            }
            tag.indent = Some(body[line.start..tag.span.start].to_string());
        }
        consumed.push(line);
    }
    if consumed.is_empty() {
        return tokens;
    }

    tokens
        .into_iter()
        .filter_map(|token| match token {
            Token::Text { mut text, span } => {
                let mut start = span.start;
                let mut end = span.end;
                for line in &consumed {
                    if line.start <= start && line.end > start {
                        start = line.end.min(end);
                    }
                    if line.start < end && line.end >= end {
                        end = line.start.max(start);
                    }
                }
                // Consumed ranges only ever cover whitespace at the edges of a
                // text token, where text and source bytes coincide.
                let head = start - span.start;
                let tail = span.end - end;
                if head + tail >= text.len() {
                    return None;
                }
                text.truncate(text.len() - tail);
                text.drain(..head);
                Some(Token::Text {
                    text,
                    span: start..end,
                })
            }
            tag => Some(tag),
        })
        .collect()
}

fn standalone_line(body: &str, span: &Span) -> Option<Span> {
    let line_start = body[..span.start].rfind('\n').map_or(0, |i| i + 1);
    let (rest_end, line_end) = match body[span.end..].find('\n') {
        Some(i) => (span.end + i, span.end + i + 1),
        None => (body.len(), body.len()),
    };
    let blank = |s: &str| s.chars().all(|c| c == ' ' || c == '\t' || c == '\r');
    (blank(&body[line_start..span.start]) && blank(&body[span.end..rest_end]))
        .then_some(line_start..line_end)
}

// ── Parser ───────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parse until one of `stops` or the end of input.
    fn sequence(&mut self, stops: &[&str]) -> Result<(Vec<Block>, Option<Tag>), DomainError> {
        let mut blocks = Vec::new();

        while let Some(token) = self.tokens.get(self.pos).cloned() {
            self.pos += 1;
            let tag = match token {
                Token::Text { text, span } => {
                    blocks.push(Block::literal(text, span));
                    continue;
                }
                Token::Tag(tag) => tag,
            };

            let keyword = tag.keyword().to_string();
            if stops.contains(&keyword.as_str()) {
                return Ok((blocks, Some(tag)));
            }

            match keyword.as_str() {
                "!" => {}
                "@slot" | "@slots" => {
                    let name = tag.argument();
                    if !is_property_path(name) {
                        return Err(syntax_error(tag.span.start, "slot name expected"));
                    }
                    let slot = SlotRef {
                        name: name.to_string(),
                        indent: tag.indent.clone(),
                    };
                    let kind = if keyword.as_str() == "@slot" {
                        BlockKind::NamedSlot(slot)
                    } else {
                        BlockKind::RepeatingSlot(slot)
                    };
                    blocks.push(Block::new(kind, tag.span.clone()));
                }
                "#if" => blocks.push(self.conditional(tag)?),
                "#when" => blocks.push(self.when(tag)?),
                "#each" => blocks.push(self.each(tag)?),
                "#else" | "/if" | "#is" | "/when" | "/each" => {
                    return Err(syntax_error(
                        tag.span.start,
                        format!("unbalanced '{{{{{}}}}}'", tag.inner),
                    ));
                }
                k if k.starts_with(['#', '/', '@']) => {
                    return Err(syntax_error(
                        tag.span.start,
                        format!("unknown directive '{k}'"),
                    ));
                }
                _ => blocks.push(Block::new(
                    BlockKind::Value(value_expr(&tag)?),
                    tag.span.clone(),
                )),
            }
        }

        Ok((blocks, None))
    }

    /// Like [`sequence`](Self::sequence), but running out of input is an error.
    fn section(&mut self, opener: &Tag, stops: &[&str]) -> Result<(Vec<Block>, Tag), DomainError> {
        match self.sequence(stops)? {
            (blocks, Some(stop)) => Ok((blocks, stop)),
            (_, None) => Err(syntax_error(
                opener.span.start,
                format!("unclosed '{{{{{}}}}}'", opener.inner),
            )),
        }
    }

    fn conditional(&mut self, opener: Tag) -> Result<Block, DomainError> {
        let (property, value) = condition(&opener)?;
        let (body, stop) = self.section(&opener, &["#else", "/if"])?;
        let (otherwise, end) = if stop.keyword() == "#else" {
            let (otherwise, end) = self.section(&opener, &["/if"])?;
            (Some(otherwise), end)
        } else {
            (None, stop)
        };

        Ok(Block::new(
            BlockKind::Conditional {
                property,
                branches: vec![Branch { value, body }],
                otherwise,
            },
            opener.span.start..end.span.end,
        ))
    }

    fn when(&mut self, opener: Tag) -> Result<Block, DomainError> {
        let property = opener.argument();
        if !is_property_path(property) {
            return Err(syntax_error(opener.span.start, "property expected after '#when'"));
        }

        const STOPS: &[&str] = &["#is", "#else", "/when"];
        let (lead, mut stop) = self.section(&opener, STOPS)?;
        let stray = lead.iter().find(|b| match &b.kind {
            BlockKind::Literal(text) => !text.trim().is_empty(),
            _ => true,
        });
        if let Some(block) = stray {
            return Err(syntax_error(
                block.span.start,
                "only '{{#is}}' and '{{#else}}' may appear inside '{{#when}}'",
            ));
        }

        let mut branches = Vec::new();
        let mut otherwise = None;
        loop {
            let keyword = stop.keyword().to_string();
            match keyword.as_str() {
                "#is" => {
                    let value = literal(stop.argument(), stop.span.start)?;
                    let (body, next) = self.section(&opener, STOPS)?;
                    branches.push(Branch { value, body });
                    stop = next;
                }
                "#else" => {
                    let (body, next) = self.section(&opener, &["/when"])?;
                    otherwise = Some(body);
                    stop = next;
                }
                _ => break,
            }
        }

        Ok(Block::new(
            BlockKind::Conditional {
                property: property.to_string(),
                branches,
                otherwise,
            },
            opener.span.start..stop.span.end,
        ))
    }

    fn each(&mut self, opener: Tag) -> Result<Block, DomainError> {
        let argument = opener.argument();
        let (property, binding) = match argument.split_once(" as ") {
            Some((property, binding)) => (property.trim(), binding.trim()),
            None => (argument, "it"),
        };
        if !is_property_path(property) || !is_property_path(binding) {
            return Err(syntax_error(
                opener.span.start,
                "expected '{{#each <property> as <name>}}'",
            ));
        }

        let (body, end) = self.section(&opener, &["/each"])?;
        Ok(Block::new(
            BlockKind::Each {
                property: property.to_string(),
                binding: binding.to_string(),
                body,
            },
            opener.span.start..end.span.end,
        ))
    }
}

fn value_expr(tag: &Tag) -> Result<ValueExpr, DomainError> {
    let (path, fallback) = match tag.inner.split_once('|') {
        Some((path, fallback)) => (
            path.trim(),
            Some(quoted(fallback.trim(), tag.span.start)?),
        ),
        None => (tag.inner.as_str(), None),
    };
    let (path, optional) = match path.strip_suffix('?') {
        Some(path) => (path.trim_end(), true),
        None => (path, false),
    };
    if !is_property_path(path) {
        return Err(syntax_error(
            tag.span.start,
            format!("invalid expression '{}'", tag.inner),
        ));
    }
    Ok(ValueExpr {
        path: path.to_string(),
        fallback,
        optional,
    })
}

/// `#if p` tests truthiness, `#if p == lit` tests equality.
fn condition(tag: &Tag) -> Result<(String, Value), DomainError> {
    let argument = tag.argument();
    let (property, value) = match argument.split_once("==") {
        Some((property, lit)) => (property.trim(), literal(lit.trim(), tag.span.start)?),
        None => (argument, Value::Bool(true)),
    };
    if !is_property_path(property) {
        return Err(syntax_error(tag.span.start, "property expected after '#if'"));
    }
    Ok((property.to_string(), value))
}

/// Branch literal: quoted string, boolean, integer, or a bare word.
pub(super) fn literal(raw: &str, position: usize) -> Result<Value, DomainError> {
    if raw.is_empty() {
        return Err(syntax_error(position, "literal expected"));
    }
    if raw.starts_with(['"', '\'']) {
        return quoted(raw, position).map(Value::Str);
    }
    match raw {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(syntax_error(position, format!("malformed literal '{raw}'")));
    }
    Ok(Value::str(raw))
}

fn quoted(raw: &str, position: usize) -> Result<String, DomainError> {
    let mut chars = raw.chars();
    let quote = match chars.next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return Err(syntax_error(position, format!("quoted text expected, got '{raw}'"))),
    };
    let mut out = String::new();
    let mut escaped = false;
    while let Some(c) = chars.next() {
        match c {
            _ if escaped => {
                out.push(c);
                escaped = false;
            }
            '\\' => escaped = true,
            c if c == quote => {
                return if chars.as_str().trim().is_empty() {
                    Ok(out)
                } else {
                    Err(syntax_error(position, format!("malformed literal '{raw}'")))
                };
            }
            c => out.push(c),
        }
    }
    Err(syntax_error(position, format!("unterminated literal '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(body: &str) -> Vec<BlockKind> {
        parse(body).unwrap().into_iter().map(|b| b.kind).collect()
    }

    #[test]
    fn values_and_literals_keep_spans() {
        let blocks = parse("Hello, {{name}}!").unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], Block::literal("Hello, ", 0..7));
        assert_eq!(
            blocks[1],
            Block::new(BlockKind::Value(ValueExpr::required("name")), 7..15)
        );
        assert_eq!(blocks[2].span, 15..16);
    }

    #[test]
    fn value_modifiers() {
        assert_eq!(
            kinds("{{db.url?}}{{port | \"8080\"}}"),
            vec![
                BlockKind::Value(ValueExpr {
                    path: "db.url".into(),
                    fallback: None,
                    optional: true,
                }),
                BlockKind::Value(ValueExpr {
                    path: "port".into(),
                    fallback: Some("8080".into()),
                    optional: false,
                }),
            ]
        );
    }

    #[test]
    fn escaped_tag_is_literal() {
        assert_eq!(
            kinds(r"a \{{name}} b"),
            vec![BlockKind::Literal("a {{name}} b".into())]
        );
    }

    #[test]
    fn standalone_control_lines_are_consumed() {
        let blocks = parse("start\n  {{#if flag}}\n  inside\n  {{/if}}\nend\n").unwrap();
        let BlockKind::Conditional { branches, .. } = &blocks[1].kind else {
            panic!("expected conditional, got {:?}", blocks[1]);
        };
        assert_eq!(blocks[0].kind, BlockKind::Literal("start\n".into()));
        assert_eq!(branches[0].body[0].kind, BlockKind::Literal("  inside\n".into()));
        assert_eq!(blocks[2].kind, BlockKind::Literal("end\n".into()));
    }

    #[test]
    fn lone_braces_and_backslashes_are_text() {
        assert_eq!(
            kinds(r"a \{ b { c \ d }}"),
            vec![BlockKind::Literal(r"a \{ b { c \ d }}".into())]
        );
    }

    #[test]
    fn standalone_slot_takes_its_line() {
        let blocks = parse("deps {\n    {{@slots deps}}\n}\n").unwrap();
        assert_eq!(blocks[0].kind, BlockKind::Literal("deps {\n".into()));
        assert_eq!(
            blocks[1].kind,
            BlockKind::RepeatingSlot(SlotRef::standalone("deps", "    "))
        );
        assert_eq!(blocks[2].kind, BlockKind::Literal("}\n".into()));
    }

    #[test]
    fn slot_without_own_line_stays_inline() {
        assert_eq!(
            kinds("a {{@slot s}}\n"),
            vec![
                BlockKind::Literal("a ".into()),
                BlockKind::NamedSlot(SlotRef::inline("s")),
                BlockKind::Literal("\n".into()),
            ]
        );
        // The last line has no break to give up.
        assert_eq!(kinds("{{@slot s}}"), vec![BlockKind::NamedSlot(SlotRef::inline("s"))]);
    }

    #[test]
    fn inline_control_tags_keep_whitespace() {
        let blocks = parse("a {{#if x}}b{{/if}} c").unwrap();
        assert_eq!(blocks[0].kind, BlockKind::Literal("a ".into()));
        assert_eq!(blocks[2].kind, BlockKind::Literal(" c".into()));
    }

    #[test]
    fn comments_disappear() {
        assert_eq!(
            kinds("{{! header }}\nbody"),
            vec![BlockKind::Literal("body".into())]
        );
    }

    #[test]
    fn when_collects_branches() {
        let blocks = parse("{{#when target}}{{#is jvm}}J{{#is \"js\"}}S{{#else}}?{{/when}}").unwrap();
        let BlockKind::Conditional {
            property,
            branches,
            otherwise,
        } = &blocks[0].kind
        else {
            panic!("expected conditional");
        };
        assert_eq!(property, "target");
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].value, Value::str("jvm"));
        assert_eq!(branches[1].value, Value::str("js"));
        assert!(otherwise.is_some());
    }

    #[test]
    fn if_with_equality() {
        let blocks = parse("{{#if port == 8080}}x{{/if}}").unwrap();
        let BlockKind::Conditional { branches, .. } = &blocks[0].kind else {
            panic!("expected conditional");
        };
        assert_eq!(branches[0].value, Value::Int(8080));
    }

    #[test]
    fn each_binding_defaults_to_it() {
        assert!(matches!(
            &kinds("{{#each targets}}{{it}}{{/each}}")[0],
            BlockKind::Each { binding, .. } if binding == "it"
        ));
        assert!(matches!(
            &kinds("{{#each targets as t}}{{t}}{{/each}}")[0],
            BlockKind::Each { binding, property, .. } if binding == "t" && property == "targets"
        ));
    }

    #[test]
    fn syntax_errors_carry_positions() {
        let cases = [
            ("abc {{name", 4),
            ("{{#if a}}never closed", 0),
            ("x{{/if}}", 1),
            ("{{#bogus a}}", 0),
            ("{{a b}}", 0),
            ("{{#if a == \"open}}{{/if}}", 0),
            ("{{#when a}}junk{{#is b}}{{/when}}", 11),
        ];
        for (body, position) in cases {
            match parse(body) {
                Err(DomainError::TemplateSyntaxError { position: p, .. }) => {
                    assert_eq!(p, position, "wrong position for {body:?}")
                }
                other => panic!("{body:?} gave {other:?}"),
            }
        }
    }
}
