//! Host-language dialect.
//!
//! Templates are ordinary Kotlin sources in which calls on a `Pack` object
//! mark the dynamic parts:
//!
//! ```kotlin
//! val name = "${Pack.value("project.name")}"
//! dependencies {
//!     Pack.slots("dependencies")
//!     Pack.ifEnabled("ktor") {
//!         implementation(libs.ktor.server)
//!     } otherwise {
//!         implementation(libs.kotlinx.coroutines)
//!     }
//! }
//! ```
//!
//! | Call                                 | Block                          |
//! |--------------------------------------|--------------------------------|
//! | `Pack.value("p")`, `Pack.value("p", "fallback")` | value              |
//! | `Pack.optional("p")`                 | value, unknown renders empty   |
//! | `Pack.slot("s")` / `Pack.slots("s")` | named / repeating slot         |
//! | `Pack.ifEnabled("p") { } otherwise { }` | conditional on truthiness   |
//! | `Pack.ifEquals("p", lit) { }`        | conditional on equality        |
//! | `Pack.choose("p") { on(lit) { } otherwise { } }` | multi-branch       |
//! | `Pack.each("p") { x -> }`            | repetition, `it` by default    |
//!
//! Comments, character literals and strings are skipped, except that a
//! `${Pack.value(..)}` template inside a string is recognised. A block call
//! alone on its lines consumes them, and its bodies are re-indented to the
//! column of the call. A slot call alone on a line that ends in a break
//! consumes that line; its fragments are indented to the call's column.

use logos::{Lexer, Logos};

use super::{Block, BlockKind, Branch, SlotRef, Span, ValueExpr, is_property_path, syntax_error};
use crate::domain::{error::DomainError, value_objects::Value};

const RECEIVER: &str = "Pack";

pub fn parse(body: &str) -> Result<Vec<Block>, DomainError> {
    HostParser::new(body, 0..body.len())?.sequence(None)
}

// ── Lexer ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LexError {
    #[default]
    Unexpected,
    UnterminatedString,
    UnterminatedTemplate,
    UnterminatedComment,
}

impl LexError {
    fn reason(self) -> &'static str {
        match self {
            Self::Unexpected => "unexpected character",
            Self::UnterminatedString => "unterminated string literal",
            Self::UnterminatedTemplate => "unterminated '${' in string",
            Self::UnterminatedComment => "unterminated block comment",
        }
    }
}

/// Host source tokens. Everything between `Pack` calls is copied through as
/// source text, so the lexer only separates what the parser must see from
/// what it must skip: comments, character literals and strings.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(error = LexError)]
enum HostToken {
    #[regex(r"//[^\n]*")]
    LineComment,
    #[token("/*", block_comment)]
    BlockComment,
    /// Spans of the `${ .. }` templates inside the string.
    #[token("\"", |lex| string(lex, false))]
    #[token("\"\"\"", |lex| string(lex, true))]
    Str(Vec<Span>),
    #[regex(r"'([^'\\\n]|\\[^\n]|\\u[0-9a-fA-F]{4})'")]
    Char,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("<")]
    OpenAngle,
    #[token(">")]
    CloseAngle,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
    #[regex(r"-?[0-9]+L?")]
    Integer,
    #[regex(r"[ \t\r]+")]
    Space,
    #[token("\n")]
    Newline,
    #[regex(r#"[^a-zA-Z0-9_ \t\r\n/"'{}()<>,.\-]+"#)]
    #[token("/")]
    #[token("-")]
    #[token("'")]
    Other,
}

#[derive(Logos)]
enum CommentPart {
    #[token("/*")]
    Open,
    #[token("*/")]
    Close,
    #[regex(r"[^/*]+")]
    #[token("/")]
    #[token("*")]
    Text,
}

/// Block comments nest in Kotlin.
fn block_comment(lex: &mut Lexer<HostToken>) -> Result<(), LexError> {
    let mut depth = 1usize;
    let mut parts = CommentPart::lexer(lex.remainder());
    while let Some(part) = parts.next() {
        match part {
            Ok(CommentPart::Open) => depth += 1,
            Ok(CommentPart::Close) => {
                depth -= 1;
                if depth == 0 {
                    lex.bump(parts.span().end);
                    return Ok(());
                }
            }
            _ => {}
        }
    }
    Err(LexError::UnterminatedComment)
}

#[derive(Logos, Debug, PartialEq, Eq)]
enum StringPart {
    #[token("\"")]
    Quote,
    #[regex(r#""""+"#)]
    RawClose,
    #[regex(r"\\[^\n]")]
    Escape,
    #[token("${")]
    TemplateOpen,
    #[token("\n")]
    Newline,
    #[regex(r#"[^"\\$\n]+"#)]
    #[token("$")]
    #[token("\\")]
    Text,
}

/// Lex the rest of a string literal whose opening quote was just matched.
/// Raw strings keep backslashes and line breaks and may close with extra
/// quotes, which belong to the content.
fn string(lex: &mut Lexer<HostToken>, raw: bool) -> Result<Vec<Span>, LexError> {
    let base = lex.span().end;
    let mut templates = Vec::new();
    let mut parts = StringPart::lexer(lex.remainder());
    while let Some(part) = parts.next() {
        match part {
            Ok(StringPart::Quote) if !raw => {
                lex.bump(parts.span().end);
                return Ok(templates);
            }
            Ok(StringPart::RawClose) if raw => {
                lex.bump(parts.span().end);
                return Ok(templates);
            }
            Ok(StringPart::RawClose) if !raw => {
                lex.bump(parts.span().start + 1);
                return Ok(templates);
            }
            Ok(StringPart::Newline) if !raw => return Err(LexError::UnterminatedString),
            Ok(StringPart::Escape) if raw => {
                // `\` is plain text in a raw string; re-lex what follows it.
                let after = parts.span().start + 1;
                parts = StringPart::lexer(lex.remainder());
                parts.bump(after);
            }
            Ok(StringPart::TemplateOpen) => {
                let open = parts.span();
                let close = template_end(parts.remainder())?;
                parts.bump(close + 1);
                templates.push(base + open.start..base + open.end + close + 1);
            }
            Ok(_) => {}
            Err(()) => return Err(LexError::UnterminatedString),
        }
    }
    Err(LexError::UnterminatedString)
}

/// Offset of the `}` closing a `${` template whose body is `src`.
fn template_end(src: &str) -> Result<usize, LexError> {
    let mut depth = 0usize;
    let mut tokens = HostToken::lexer(src);
    while let Some(token) = tokens.next() {
        match token? {
            HostToken::OpenBrace => depth += 1,
            HostToken::CloseBrace if depth == 0 => return Ok(tokens.span().start),
            HostToken::CloseBrace => depth -= 1,
            _ => {}
        }
    }
    Err(LexError::UnterminatedTemplate)
}

// ── Parser ───────────────────────────────────────────────────────────────────

struct HostParser<'a> {
    src: &'a str,
    tokens: Vec<(HostToken, Span)>,
    pos: usize,
    /// End of the lexed range.
    end: usize,
}

impl<'a> HostParser<'a> {
    /// Lex `range` of `src`. Token spans are offsets into `src`.
    fn new(src: &'a str, range: Span) -> Result<Self, DomainError> {
        let base = range.start;
        let tokens = HostToken::lexer(&src[range.clone()])
            .spanned()
            .map(|(token, span)| {
                let span = base + span.start..base + span.end;
                match token {
                    Ok(HostToken::Str(templates)) => {
                        let templates = templates
                            .into_iter()
                            .map(|t| base + t.start..base + t.end)
                            .collect();
                        Ok((HostToken::Str(templates), span))
                    }
                    Ok(token) => Ok((token, span)),
                    Err(e) => Err(syntax_error(span.start, e.reason())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            src,
            tokens,
            pos: 0,
            end: range.end,
        })
    }

    fn peek(&self) -> Option<&HostToken> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn at(&self, token: &HostToken) -> bool {
        self.peek() == Some(token)
    }

    /// Start of the current token.
    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, span)| span.start)
    }

    /// End of the last consumed token.
    fn consumed_to(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |(_, span)| span.end)
    }

    fn text(&self, index: usize) -> &'a str {
        let src = self.src;
        self.tokens.get(index).map_or("", |(_, span)| &src[span.clone()])
    }

    /// Parse to the end of input, or up to the `}` matching the `{` at
    /// `open`. In the latter case the cursor is left on that `}`.
    fn sequence(&mut self, open: Option<usize>) -> Result<Vec<Block>, DomainError> {
        let mut blocks = Vec::new();
        let mut literal_start = self.offset();
        let mut depth = 0usize;

        while let Some((token, span)) = self.tokens.get(self.pos).cloned() {
            match token {
                HostToken::Str(templates) => {
                    for template in templates {
                        if let Some(expr) = self.inline_value(template.clone())? {
                            push_literal(&mut blocks, self.src, literal_start..template.start);
                            literal_start = template.end;
                            blocks.push(Block::new(BlockKind::Value(expr), template));
                        }
                    }
                    self.pos += 1;
                }
                HostToken::OpenBrace => {
                    depth += 1;
                    self.pos += 1;
                }
                HostToken::CloseBrace if depth == 0 && open.is_some() => {
                    push_literal(&mut blocks, self.src, literal_start..span.start);
                    return Ok(blocks);
                }
                HostToken::CloseBrace => {
                    depth = depth.saturating_sub(1);
                    self.pos += 1;
                }
                HostToken::Ident if self.at_call() => {
                    let receiver = self.pos;
                    match self.call(span.start)? {
                        Some((block, consumed)) => {
                            push_literal(&mut blocks, self.src, literal_start..consumed.start);
                            blocks.push(block);
                            literal_start = consumed.end;
                            while self.offset() < consumed.end {
                                self.pos += 1;
                            }
                        }
                        None => self.pos = receiver + 1,
                    }
                }
                _ => self.pos += 1,
            }
        }

        if let Some(open) = open {
            return Err(syntax_error(open, "unbalanced '{': body is never closed"));
        }
        push_literal(&mut blocks, self.src, literal_start..self.end);
        Ok(blocks)
    }

    /// `Pack.<member>` with nothing in between, not itself a member access.
    fn at_call(&self) -> bool {
        let member_access = self
            .pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .is_some_and(|(token, _)| *token == HostToken::Dot);
        let adjacent = |offset: usize, expected: HostToken| {
            self.tokens
                .get(self.pos + offset)
                .is_some_and(|(token, _)| *token == expected)
        };
        !member_access
            && self.text(self.pos) == RECEIVER
            && adjacent(1, HostToken::Dot)
            && adjacent(2, HostToken::Ident)
    }

    /// Parse a `Pack.<member>` call starting at byte `start`. Returns the
    /// block and the source range it replaces, or `None` for members this
    /// dialect does not know.
    fn call(&mut self, start: usize) -> Result<Option<(Block, Span)>, DomainError> {
        self.pos += 2;
        let member = self.identifier();
        let block = match member {
            "value" | "optional" => {
                let expr = self.value_call(start, member)?;
                Block::new(BlockKind::Value(expr), start..self.consumed_to())
            }
            "slot" | "slots" => return self.slot(start, member).map(Some),
            "ifEnabled" | "ifEquals" => return self.conditional(start, member).map(Some),
            "choose" => return self.choose(start).map(Some),
            "each" => return self.each(start).map(Some),
            _ => return Ok(None),
        };
        let span = block.span.clone();
        Ok(Some((block, span)))
    }

    fn value_call(&mut self, start: usize, member: &str) -> Result<ValueExpr, DomainError> {
        let args = self.arguments(start, member)?;
        let (path, fallback) = match (member, args.as_slice()) {
            (_, [Value::Str(path)]) => (path, None),
            ("value", [Value::Str(path), fallback]) => (path, fallback.to_text()),
            _ => return Err(arity(start, member, "a property path")),
        };
        if !is_property_path(path) {
            return Err(syntax_error(start, format!("invalid property path '{path}'")));
        }
        Ok(ValueExpr {
            path: path.clone(),
            fallback,
            optional: member == "optional",
        })
    }

    /// A slot call alone on a line that ends in a break takes the line.
    fn slot(&mut self, start: usize, member: &str) -> Result<(Block, Span), DomainError> {
        let args = self.arguments(start, member)?;
        let [Value::Str(name)] = args.as_slice() else {
            return Err(arity(start, member, "a slot name"));
        };
        if !is_property_path(name) {
            return Err(syntax_error(start, format!("invalid slot name '{name}'")));
        }

        let span = start..self.consumed_to();
        let (_, line) = layout(self.src, span.clone());
        let (slot, consumed) = if line != span && self.src[..line.end].ends_with('\n') {
            let indent = &self.src[line.start..start];
            (SlotRef::standalone(name.as_str(), indent), line)
        } else {
            (SlotRef::inline(name.as_str()), span.clone())
        };
        let kind = if member == "slot" {
            BlockKind::NamedSlot(slot)
        } else {
            BlockKind::RepeatingSlot(slot)
        };
        Ok((Block::new(kind, span), consumed))
    }

    fn conditional(&mut self, start: usize, member: &str) -> Result<(Block, Span), DomainError> {
        let args = self.arguments(start, member)?;
        let (property, value) = match (member, args.as_slice()) {
            ("ifEnabled", [Value::Str(property)]) => (property.clone(), Value::Bool(true)),
            ("ifEquals", [Value::Str(property), value]) => (property.clone(), value.clone()),
            ("ifEnabled", _) => return Err(arity(start, member, "a property name")),
            _ => return Err(arity(start, member, "a property name and a literal")),
        };
        check_property(start, &property)?;

        let mut bodies = vec![self.body(member)?];
        if self.otherwise_follows() {
            bodies.push(self.body("otherwise")?);
        }

        let end = self.consumed_to();
        let (column, consumed) = layout(self.src, start..end);
        let mut bodies = bodies
            .into_iter()
            .map(|(blocks, content)| tidy(blocks, &self.src[content], column));
        let body = bodies.next().unwrap_or_default();
        let otherwise = bodies.next();

        let block = Block::new(
            BlockKind::Conditional {
                property,
                branches: vec![Branch { value, body }],
                otherwise,
            },
            start..end,
        );
        Ok((block, consumed))
    }

    fn choose(&mut self, start: usize) -> Result<(Block, Span), DomainError> {
        let args = self.arguments(start, "choose")?;
        let [Value::Str(property)] = args.as_slice() else {
            return Err(arity(start, "choose", "a property name"));
        };
        let property = property.clone();
        check_property(start, &property)?;

        self.skip_inline_whitespace();
        if !self.at(&HostToken::OpenBrace) {
            return Err(syntax_error(self.offset(), "'{' expected after Pack.choose(..)"));
        }
        let open = self.offset();
        self.pos += 1;

        let mut arms = Vec::new();
        let mut otherwise = None;
        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    return Err(syntax_error(open, "unbalanced '{': Pack.choose is never closed"));
                }
                Some(HostToken::CloseBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {}
            }
            let arm_start = self.offset();
            match self.identifier() {
                "on" => {
                    self.skip_inline_whitespace();
                    let args = self.arguments(arm_start, "on")?;
                    let [value] = args.as_slice() else {
                        return Err(arity(arm_start, "on", "one literal"));
                    };
                    let value = value.clone();
                    arms.push((value, self.body("on")?));
                }
                "otherwise" if otherwise.is_none() => {
                    otherwise = Some(self.body("otherwise")?);
                }
                _ => {
                    return Err(syntax_error(
                        arm_start,
                        "only 'on(..) { }' and one 'otherwise { }' may appear inside Pack.choose",
                    ));
                }
            }
        }

        let end = self.consumed_to();
        let (column, consumed) = layout(self.src, start..end);
        let branches = arms
            .into_iter()
            .map(|(value, (blocks, content))| Branch {
                value,
                body: tidy(blocks, &self.src[content], column),
            })
            .collect();
        let otherwise = otherwise.map(|(blocks, content)| tidy(blocks, &self.src[content], column));

        let block = Block::new(
            BlockKind::Conditional {
                property,
                branches,
                otherwise,
            },
            start..end,
        );
        Ok((block, consumed))
    }

    fn each(&mut self, start: usize) -> Result<(Block, Span), DomainError> {
        let args = self.arguments(start, "each")?;
        let [Value::Str(property)] = args.as_slice() else {
            return Err(arity(start, "each", "a property name"));
        };
        let property = property.clone();
        check_property(start, &property)?;

        self.skip_inline_whitespace();
        if !self.at(&HostToken::OpenBrace) {
            return Err(syntax_error(self.offset(), "'{' expected after Pack.each(..)"));
        }
        let open = self.offset();
        self.pos += 1;

        // Optional `name ->` parameter.
        let after_brace = self.pos;
        self.skip_whitespace();
        let name = self.identifier();
        self.skip_inline_whitespace();
        let binding = if !name.is_empty() && self.at(&HostToken::Arrow) {
            self.pos += 1;
            name.to_string()
        } else {
            self.pos = after_brace;
            "it".to_string()
        };

        let content_start = self.offset();
        let blocks = self.sequence(Some(open))?;
        let content = content_start..self.offset();
        self.pos += 1;

        let end = self.consumed_to();
        let (column, consumed) = layout(self.src, start..end);
        let block = Block::new(
            BlockKind::Each {
                property,
                binding,
                body: tidy(blocks, &self.src[content], column),
            },
            start..end,
        );
        Ok((block, consumed))
    }

    /// `{ .. }` following a call. Returns the parsed blocks and the content
    /// range between the braces.
    fn body(&mut self, member: &str) -> Result<(Vec<Block>, Span), DomainError> {
        self.skip_inline_whitespace();
        if !self.at(&HostToken::OpenBrace) {
            return Err(syntax_error(
                self.offset(),
                format!("'{{' expected to open the {member} body"),
            ));
        }
        let open = self.offset();
        self.pos += 1;
        let blocks = self.sequence(Some(open))?;
        let content = open + 1..self.offset();
        self.pos += 1;
        Ok((blocks, content))
    }

    fn otherwise_follows(&mut self) -> bool {
        let saved = self.pos;
        self.skip_inline_whitespace();
        let found = self.identifier() == "otherwise" && {
            self.skip_inline_whitespace();
            self.at(&HostToken::OpenBrace)
        };
        if !found {
            self.pos = saved;
        }
        found
    }

    /// `(<literal>, ..)`, optionally preceded by a type argument such as
    /// `<Int>`.
    fn arguments(&mut self, start: usize, member: &str) -> Result<Vec<Value>, DomainError> {
        if self.at(&HostToken::OpenAngle) {
            loop {
                self.pos += 1;
                match self.peek() {
                    Some(HostToken::CloseAngle) => break,
                    Some(_) => {}
                    None => return Err(syntax_error(start, "unterminated type argument")),
                }
            }
            self.pos += 1;
        }
        if !self.at(&HostToken::OpenParen) {
            return Err(syntax_error(
                start,
                format!("'(' expected after Pack.{member}"),
            ));
        }
        self.pos += 1;

        let mut args = Vec::new();
        loop {
            self.skip_whitespace();
            if args.is_empty() && self.at(&HostToken::CloseParen) {
                self.pos += 1;
                return Ok(args);
            }
            args.push(self.argument()?);
            self.skip_whitespace();
            match self.peek() {
                Some(HostToken::Comma) => self.pos += 1,
                Some(HostToken::CloseParen) => {
                    self.pos += 1;
                    return Ok(args);
                }
                _ => {
                    return Err(syntax_error(
                        self.offset(),
                        format!("',' or ')' expected in Pack.{member}(..)"),
                    ));
                }
            }
        }
    }

    fn argument(&mut self) -> Result<Value, DomainError> {
        let start = self.offset();
        let text = self.text(self.pos);
        let value = match self.peek() {
            Some(HostToken::Str(templates)) if !templates.is_empty() => {
                return Err(syntax_error(
                    start,
                    "string templates are not allowed in Pack arguments",
                ));
            }
            Some(HostToken::Str(_)) => Value::Str(unquote(text)),
            Some(HostToken::Ident) if text == "true" => Value::Bool(true),
            Some(HostToken::Ident) if text == "false" => Value::Bool(false),
            Some(HostToken::Integer) => match text.strip_suffix('L').unwrap_or(text).parse() {
                Ok(i) => Value::Int(i),
                Err(_) => return Err(syntax_error(start, format!("integer out of range '{text}'"))),
            },
            _ => {
                return Err(syntax_error(
                    start,
                    "literal argument expected: string, boolean or integer",
                ));
            }
        };
        self.pos += 1;
        Ok(value)
    }

    /// A `${..}` template consisting of exactly one value call.
    fn inline_value(&self, template: Span) -> Result<Option<ValueExpr>, DomainError> {
        let mut inner = HostParser::new(self.src, template.start + 2..template.end - 1)?;
        inner.skip_whitespace();
        if !inner.at_call() {
            return Ok(None);
        }
        let start = inner.offset();
        inner.pos += 2;
        let member = inner.identifier();
        if member != "value" && member != "optional" {
            return Ok(None);
        }
        let expr = inner.value_call(start, member)?;
        inner.skip_whitespace();
        Ok(inner.peek().is_none().then_some(expr))
    }

    fn identifier(&mut self) -> &'a str {
        if !self.at(&HostToken::Ident) {
            return "";
        }
        self.pos += 1;
        self.text(self.pos - 1)
    }

    fn skip_while(&mut self, skip: impl Fn(&HostToken) -> bool) {
        while self.peek().is_some_and(&skip) {
            self.pos += 1;
        }
    }

    fn skip_inline_whitespace(&mut self) {
        self.skip_while(|t| *t == HostToken::Space);
    }

    fn skip_whitespace(&mut self) {
        self.skip_while(|t| matches!(t, HostToken::Space | HostToken::Newline));
    }

    fn skip_trivia(&mut self) {
        self.skip_while(|t| {
            matches!(
                t,
                HostToken::Space
                    | HostToken::Newline
                    | HostToken::LineComment
                    | HostToken::BlockComment
            )
        });
    }
}

/// Content of a string argument, escapes resolved.
fn unquote(literal: &str) -> String {
    if let Some(raw) = literal.strip_prefix("\"\"\"") {
        return raw.strip_suffix("\"\"\"").unwrap_or(raw).to_string();
    }
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn check_property(position: usize, property: &str) -> Result<(), DomainError> {
    if is_property_path(property) {
        Ok(())
    } else {
        Err(syntax_error(position, format!("invalid property name '{property}'")))
    }
}

fn arity(position: usize, member: &str, expected: &str) -> DomainError {
    syntax_error(position, format!("Pack.{member} expects {expected}"))
}

fn push_literal(blocks: &mut Vec<Block>, src: &str, span: Span) {
    if span.start < span.end {
        blocks.push(Block::literal(&src[span.clone()], span));
    }
}

/// Indentation column of the line holding `span`, and the range the call
/// replaces: its whole line when nothing else shares it.
fn layout(src: &str, span: Span) -> (usize, Span) {
    let line_start = src[..span.start].rfind('\n').map_or(0, |i| i + 1);
    let line = &src[line_start..];
    let column = line.len() - line.trim_start_matches([' ', '\t']).len();

    let (rest_end, line_end) = match src[span.end..].find('\n') {
        Some(i) => (span.end + i, span.end + i + 1),
        None => (src.len(), src.len()),
    };
    let blank = |s: &str| s.chars().all(|c| c == ' ' || c == '\t' || c == '\r');
    if blank(&src[line_start..span.start]) && blank(&src[span.end..rest_end]) {
        (column.min(span.start - line_start), line_start..line_end)
    } else {
        (column, span)
    }
}

/// Drop the line break after `{` and the indentation before `}`, then shift
/// the body left so its outermost lines sit at `column`.
fn tidy(mut blocks: Vec<Block>, raw: &str, column: usize) -> Vec<Block> {
    // A standalone slot took its line break along with it.
    let after_slot_line = blocks.len() >= 2
        && matches!(
            &blocks[blocks.len() - 2].kind,
            BlockKind::NamedSlot(slot) | BlockKind::RepeatingSlot(slot) if slot.indent.is_some()
        );
    if let Some(Block {
        kind: BlockKind::Literal(text),
        ..
    }) = blocks.last_mut()
    {
        match text.rfind('\n') {
            Some(newline) if text[newline + 1..].trim_matches([' ', '\t']).is_empty() => {
                text.truncate(newline + 1);
            }
            None if after_slot_line && text.trim_matches([' ', '\t']).is_empty() => text.clear(),
            _ => {}
        }
    }

    let mut leading_break = false;
    if let Some(Block {
        kind: BlockKind::Literal(text),
        ..
    }) = blocks.first_mut()
    {
        if let Some(newline) = text.find('\n') {
            if text[..newline].trim_matches([' ', '\t', '\r']).is_empty() {
                text.drain(..=newline);
                leading_break = true;
            }
        }
    }
    blocks.retain(|b| !matches!(&b.kind, BlockKind::Literal(t) if t.is_empty()));

    let indent = raw
        .split('\n')
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    let shift = indent.saturating_sub(column);
    if shift > 0 {
        dedent(&mut blocks, shift, leading_break);
    }
    blocks
}

fn dedent(blocks: &mut [Block], shift: usize, mut at_line_start: bool) -> bool {
    for block in blocks {
        match &mut block.kind {
            BlockKind::Literal(text) => {
                let mut out = String::with_capacity(text.len());
                for (i, line) in text.split_inclusive('\n').enumerate() {
                    if i > 0 || at_line_start {
                        let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
                        out.push_str(&line[indent.min(shift)..]);
                    } else {
                        out.push_str(line);
                    }
                }
                *text = out;
                if !text.is_empty() {
                    at_line_start = text.ends_with('\n');
                }
            }
            BlockKind::Conditional {
                branches,
                otherwise,
                ..
            } => {
                for branch in branches {
                    dedent(&mut branch.body, shift, at_line_start);
                }
                if let Some(body) = otherwise {
                    dedent(body, shift, at_line_start);
                }
            }
            BlockKind::Each { body, .. } => {
                dedent(body, shift, at_line_start);
            }
            BlockKind::NamedSlot(slot) | BlockKind::RepeatingSlot(slot) => match &mut slot.indent {
                Some(indent) => {
                    indent.drain(..shift.min(indent.len()));
                    at_line_start = true;
                }
                None => at_line_start = false,
            },
            BlockKind::Value(_) => at_line_start = false,
        }
    }
    at_line_start
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(body: &str) -> Vec<BlockKind> {
        parse(body).unwrap().into_iter().map(|b| b.kind).collect()
    }

    fn literal(text: &str) -> BlockKind {
        BlockKind::Literal(text.to_string())
    }

    #[test]
    fn plain_source_is_one_literal() {
        let src = "fun main() {\n    println(\"hi\")\n}\n";
        assert_eq!(kinds(src), vec![literal(src)]);
    }

    #[test]
    fn value_calls() {
        assert_eq!(
            kinds("val port = Pack.value<Int>(\"port\", 8080)"),
            vec![
                literal("val port = "),
                BlockKind::Value(ValueExpr {
                    path: "port".into(),
                    fallback: Some("8080".into()),
                    optional: false,
                }),
            ]
        );
        assert!(matches!(
            &kinds("x(Pack.optional(\"db.url\"))")[1],
            BlockKind::Value(ValueExpr { optional: true, .. })
        ));
    }

    #[test]
    fn template_inside_string_becomes_value() {
        let blocks = parse("val n = \"app-${Pack.value(\"project.name\")}\"").unwrap();
        assert_eq!(blocks[0].kind, literal("val n = \"app-"));
        assert_eq!(
            blocks[1].kind,
            BlockKind::Value(ValueExpr::required("project.name"))
        );
        assert_eq!(blocks[2].kind, literal("\""));
    }

    #[test]
    fn strings_and_comments_are_skipped() {
        let src = "// Pack.slot(\"a\")\n/* Pack.slot(\"b\") /* nested */ */\nval s = \"Pack.slot(\\\"c\\\")\"\nval t = \"${other}\"\n";
        assert_eq!(kinds(src), vec![literal(src)]);
    }

    #[test]
    fn raw_strings_and_char_literals_are_skipped() {
        let src = "val q = '\"'\nval r = \"\"\"Pack.slot(\"x\") \\ \"\"\"\"\nval c = '\\''\n";
        assert_eq!(kinds(src), vec![literal(src)]);
    }

    #[test]
    fn template_inside_raw_string_becomes_value() {
        let blocks = parse("val s = \"\"\"${Pack.optional(\"a\")}\"\"\"").unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(matches!(
            &blocks[1].kind,
            BlockKind::Value(ValueExpr { path, optional: true, .. }) if path == "a"
        ));
    }

    #[test]
    fn standalone_slot_takes_its_line() {
        assert_eq!(
            kinds("deps {\n    Pack.slots(\"deps\")\n}\n"),
            vec![
                literal("deps {\n"),
                BlockKind::RepeatingSlot(SlotRef::standalone("deps", "    ")),
                literal("}\n"),
            ]
        );
        assert_eq!(
            kinds("f(Pack.slot(\"x\"))\n"),
            vec![
                literal("f("),
                BlockKind::NamedSlot(SlotRef::inline("x")),
                literal(")\n"),
            ]
        );
    }

    #[test]
    fn slot_in_body_is_shifted_with_it() {
        let blocks = parse("Pack.ifEnabled(\"a\") {\n    Pack.slot(\"s\")\n}\n").unwrap();
        let BlockKind::Conditional { branches, .. } = &blocks[0].kind else {
            panic!("expected conditional, got {:?}", blocks[0]);
        };
        assert_eq!(
            branches[0].body,
            vec![Block::new(
                BlockKind::NamedSlot(SlotRef::standalone("s", "")),
                26..40
            )]
        );
    }

    #[test]
    fn unknown_members_and_foreign_receivers_stay_literal() {
        let src = "MyPack.value(\"x\")\nPack.version\n";
        assert_eq!(kinds(src), vec![literal(src)]);
    }

    #[test]
    fn standalone_conditional_is_reindented() {
        let src = "deps {\n    Pack.ifEnabled(\"ktor\") {\n        ktor()\n    } otherwise {\n        plain()\n    }\n}\n";
        let blocks = parse(src).unwrap();
        assert_eq!(blocks[0].kind, literal("deps {\n"));
        let BlockKind::Conditional {
            property,
            branches,
            otherwise,
        } = &blocks[1].kind
        else {
            panic!("expected conditional, got {:?}", blocks[1]);
        };
        assert_eq!(property, "ktor");
        assert_eq!(branches[0].value, Value::Bool(true));
        assert_eq!(branches[0].body.len(), 1);
        assert_eq!(branches[0].body[0].kind, literal("    ktor()\n"));
        assert_eq!(
            otherwise.as_ref().unwrap()[0].kind,
            literal("    plain()\n")
        );
        assert_eq!(blocks[2].kind, literal("}\n"));
    }

    #[test]
    fn nested_bodies_shift_to_outer_column() {
        let src = "Pack.ifEnabled(\"a\") {\n    a()\n    Pack.ifEnabled(\"b\") {\n        b()\n    }\n}\n";
        let blocks = parse(src).unwrap();
        let BlockKind::Conditional { branches, .. } = &blocks[0].kind else {
            panic!("expected conditional");
        };
        let outer = &branches[0].body;
        assert_eq!(outer[0].kind, literal("a()\n"));
        let BlockKind::Conditional { branches: inner, .. } = &outer[1].kind else {
            panic!("expected nested conditional, got {:?}", outer[1]);
        };
        assert_eq!(inner[0].body[0].kind, literal("b()\n"));
    }

    #[test]
    fn choose_collects_arms() {
        let src = "Pack.choose(\"db\") {\n    on(\"postgres\") { pg() }\n    on(\"h2\") { h2() }\n    otherwise { none() }\n}";
        let blocks = parse(src).unwrap();
        let BlockKind::Conditional {
            property,
            branches,
            otherwise,
        } = &blocks[0].kind
        else {
            panic!("expected conditional");
        };
        assert_eq!(property, "db");
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[1].value, Value::str("h2"));
        assert_eq!(branches[0].body[0].kind, literal(" pg() "));
        assert!(otherwise.is_some());
    }

    #[test]
    fn each_reads_its_parameter() {
        let blocks = parse("Pack.each(\"targets\") { t -> target(t) }").unwrap();
        assert!(matches!(
            &blocks[0].kind,
            BlockKind::Each { property, binding, .. } if property == "targets" && binding == "t"
        ));
        let blocks = parse("Pack.each(\"targets\") { target(it) }").unwrap();
        assert!(matches!(&blocks[0].kind, BlockKind::Each { binding, .. } if binding == "it"));
    }

    #[test]
    fn braces_in_bodies_balance() {
        let blocks = parse("Pack.ifEnabled(\"a\") { if (x) { y() } }").unwrap();
        let BlockKind::Conditional { branches, .. } = &blocks[0].kind else {
            panic!("expected conditional");
        };
        assert_eq!(branches[0].body[0].kind, literal(" if (x) { y() } "));
    }

    #[test]
    fn malformed_calls_are_syntax_errors() {
        for src in [
            "Pack.value(name)",
            "Pack.value(\"a\"",
            "Pack.slot()",
            "Pack.ifEnabled(\"a\")",
            "Pack.ifEnabled(\"a\") { never closed",
            "Pack.choose(\"a\") { stray() }",
            "Pack.value(\"${x}\")",
            "val s = \"unterminated",
            "/* never closed",
            "val s = \"${Pack.value(\"a\")\"",
        ] {
            assert!(
                matches!(parse(src), Err(DomainError::TemplateSyntaxError { .. })),
                "accepted {src:?}"
            );
        }
    }
}
