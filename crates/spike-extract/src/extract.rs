//! Routine discovery and call extraction over the token stream.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::classify::{InstructionKind, classify};
use crate::instruction::{Instruction, Literal};
use crate::lexer::{Token, TokenKind, number_value, string_value, tokenize};

/// Selects which top-level routines count as runnable missions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineFilter {
    suffix: String,
}

impl RoutineFilter {
    /// Routines whose name ends with `suffix`. An empty suffix selects all.
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }

    pub fn matches(&self, name: &str) -> bool {
        name.ends_with(&self.suffix)
    }
}

impl Default for RoutineFilter {
    fn default() -> Self {
        Self::with_suffix("_main")
    }
}

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass",
    "raise", "return", "try", "while", "with", "yield",
];

/// Keywords only at the start of a `match` statement or one of its arms.
const SOFT_KEYWORDS: &[&str] = &["match", "case"];

#[derive(Debug)]
struct RoutineSpan<'a> {
    name: &'a str,
    /// Token index range of the body, header excluded.
    body: std::ops::Range<usize>,
}

fn bracket_delta(token: &Token<'_>) -> i32 {
    if token.kind != TokenKind::Op {
        return 0;
    }
    match token.text {
        "(" | "[" | "{" => 1,
        ")" | "]" | "}" => -1,
        _ => 0,
    }
}

/// Top-level `def` blocks. A block runs until the next token that starts a
/// line in column 0 outside any bracket, unless a trailing `\` joined that
/// line to the one before.
fn find_routines<'a>(tokens: &[Token<'a>]) -> Vec<RoutineSpan<'a>> {
    let mut spans = Vec::new();
    let mut open: Option<(&'a str, usize)> = None;
    let mut depth = 0i32;

    for (i, token) in tokens.iter().enumerate() {
        if depth == 0 && token.first_on_line && !token.continued && token.col == 0 {
            if let Some((name, start)) = open.take() {
                spans.push(RoutineSpan {
                    name,
                    body: start.min(i)..i,
                });
            }
            let def_at = if token.is_ident("async") { i + 1 } else { i };
            let is_def = tokens.get(def_at).is_some_and(|t| t.is_ident("def"));
            if let (true, Some(name)) = (is_def, tokens.get(def_at + 1)) {
                if name.kind == TokenKind::Ident {
                    open = Some((name.text, def_at + 2));
                }
            }
        }
        depth = (depth + bracket_delta(token)).max(0);
    }
    if let Some((name, start)) = open {
        spans.push(RoutineSpan {
            name,
            body: start.min(tokens.len())..tokens.len(),
        });
    }
    spans
}

/// Names of the routines `filter` selects, in source order.
pub fn routines(src: &str, filter: &RoutineFilter) -> Vec<String> {
    let tokens = tokenize(src);
    find_routines(&tokens)
        .into_iter()
        .filter(|span| filter.matches(span.name))
        .map(|span| span.name.to_string())
        .collect()
}

/// Extract every call in every selected routine, in source order.
pub fn extract(src: &str, filter: &RoutineFilter) -> Vec<Instruction> {
    let tokens = tokenize(src);
    let mut out = Vec::new();
    let mut count = 0;
    for span in find_routines(&tokens).into_iter().filter(|s| filter.matches(s.name)) {
        count += 1;
        out.extend(extract_calls(src, span.name, &tokens[span.body]));
    }
    info!(routines = count, instructions = out.len(), "extracted mission");
    out
}

/// Extract the calls of the single routine `name`, whatever its suffix.
/// Empty when no such routine exists.
pub fn extract_routine(src: &str, name: &str) -> Vec<Instruction> {
    let tokens = tokenize(src);
    find_routines(&tokens)
        .into_iter()
        .find(|span| span.name == name)
        .map(|span| extract_calls(src, span.name, &tokens[span.body]))
        .unwrap_or_default()
}

/// Group instructions by routine. Routines iterate in sorted order; each
/// group keeps its source order.
pub fn group_by_routine(instructions: &[Instruction]) -> BTreeMap<String, Vec<Instruction>> {
    let mut groups: BTreeMap<String, Vec<Instruction>> = BTreeMap::new();
    for instr in instructions {
        groups
            .entry(instr.source_routine.clone())
            .or_default()
            .push(instr.clone());
    }
    groups
}

fn extract_calls(src: &str, routine: &str, body: &[Token<'_>]) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < body.len() {
        if let Some(colon) = soft_keyword_header(body, i) {
            // `case` patterns look like calls but only match against values.
            i = if body[i].text == "case" { colon + 1 } else { i + 1 };
            continue;
        }
        let Some((name_end, call)) = call_name(body, i) else {
            i += 1;
            continue;
        };
        let open = name_end + 1;
        let kind = classify(&call);
        let line = body[i].line;

        let instr = match split_arguments(body, open) {
            Some(args) => build(src, routine, line, kind, call, &args),
            None => {
                warn!(routine, line, call = %call, "unterminated call");
                Instruction {
                    source_routine: routine.to_string(),
                    line,
                    kind: InstructionKind::RawCall,
                    call,
                    fields: BTreeMap::new(),
                    unresolved: BTreeMap::new(),
                }
            }
        };
        debug!(routine, line, kind = %instr.kind, call = %instr.call, "call");
        out.push(instr);
        i += 1;
    }
    out
}

/// If a `match` or `case` statement header starts at `i`, the index of the
/// `:` that closes it.
fn soft_keyword_header(tokens: &[Token<'_>], i: usize) -> Option<usize> {
    let first = tokens.get(i)?;
    if first.kind != TokenKind::Ident || !first.first_on_line || !SOFT_KEYWORDS.contains(&first.text) {
        return None;
    }
    let mut depth = 0i32;
    for (j, token) in tokens.iter().enumerate().skip(i + 1) {
        if depth == 0 {
            if token.first_on_line && !token.continued {
                return None;
            }
            if token.is_op(":") {
                return Some(j);
            }
        }
        depth = (depth + bracket_delta(token)).max(0);
    }
    None
}

/// If a call's dotted name starts at `i`, return the index of its last name
/// token and the joined name. A name chained onto a call or subscript result,
/// like `reset` in `hub.sensor(port.C).reset()`, starts a name of its own.
fn call_name(tokens: &[Token<'_>], i: usize) -> Option<(usize, String)> {
    let first = tokens.get(i)?;
    if first.kind != TokenKind::Ident || KEYWORDS.contains(&first.text) {
        return None;
    }
    if i > 0 {
        let prev = &tokens[i - 1];
        let on_result = i > 1 && (tokens[i - 2].is_op(")") || tokens[i - 2].is_op("]"));
        if (prev.is_op(".") && !on_result) || prev.is_ident("def") || prev.is_ident("class") {
            return None;
        }
    }

    let mut name = first.text.to_string();
    let mut end = i;
    while tokens.get(end + 1).is_some_and(|t| t.is_op("."))
        && tokens.get(end + 2).is_some_and(|t| t.kind == TokenKind::Ident)
    {
        name.push('.');
        name.push_str(tokens[end + 2].text);
        end += 2;
    }

    tokens.get(end + 1).filter(|t| t.is_op("(")).map(|_| (end, name))
}

/// Top-level argument token slices of the call whose `(` is at `open`.
/// `None` when the closing bracket never arrives.
fn split_arguments<'t, 'a>(tokens: &'t [Token<'a>], open: usize) -> Option<Vec<&'t [Token<'a>]>> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = open + 1;
    for (j, token) in tokens.iter().enumerate().skip(open) {
        depth += bracket_delta(token);
        if depth == 0 {
            if j > start {
                args.push(&tokens[start..j]);
            }
            return Some(args);
        }
        if depth == 1 && token.is_op(",") {
            if j > start {
                args.push(&tokens[start..j]);
            }
            start = j + 1;
        }
    }
    None
}

fn build(
    src: &str,
    routine: &str,
    line: usize,
    kind: InstructionKind,
    call: String,
    args: &[&[Token<'_>]],
) -> Instruction {
    let mut fields = BTreeMap::new();
    let mut unresolved = BTreeMap::new();
    let mut positional = 0;
    // After `*args` the parameter a positional lands on is unknown.
    let mut unpacked = false;
    let mut mappings = 0;

    for &arg in args {
        let (name, value) = match arg {
            [key, eq, value @ ..] if key.kind == TokenKind::Ident && eq.is_op("=") && !value.is_empty() => {
                (key.text.to_string(), value)
            }
            [star, ..] if star.is_op("**") => {
                let name = match mappings {
                    0 => "kwargs".to_string(),
                    n => format!("kwargs{n}"),
                };
                mappings += 1;
                (name, arg)
            }
            [star, ..] if star.is_op("*") => {
                unpacked = true;
                let name = format!("arg{positional}");
                positional += 1;
                (name, arg)
            }
            _ => {
                let name = if unpacked {
                    format!("arg{positional}")
                } else {
                    kind.parameter_name(positional)
                };
                positional += 1;
                (name, arg)
            }
        };
        match literal(value) {
            Some(lit) => {
                unresolved.remove(&name);
                fields.insert(name, lit);
            }
            None => {
                fields.remove(&name);
                unresolved.insert(name, source_text(src, value));
            }
        }
    }

    Instruction {
        source_routine: routine.to_string(),
        line,
        kind,
        call,
        fields,
        unresolved,
    }
}

fn source_text(src: &str, tokens: &[Token<'_>]) -> String {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => src[first.start..last.end].to_string(),
        _ => String::new(),
    }
}

/// Literal value of an argument expression, if it is one.
fn literal(tokens: &[Token<'_>]) -> Option<Literal> {
    match tokens {
        [t] if t.kind == TokenKind::Number => number_value(t.text).map(Literal::Number),
        [sign, t] if t.kind == TokenKind::Number && (sign.is_op("-") || sign.is_op("+")) => {
            let n = number_value(t.text)?;
            Some(Literal::Number(if sign.is_op("-") { -n } else { n }))
        }
        [t] if t.is_ident("True") => Some(Literal::Bool(true)),
        [t] if t.is_ident("False") => Some(Literal::Bool(false)),
        [t] if t.is_ident("None") => Some(Literal::None),
        [_, ..] if tokens.iter().all(|t| t.kind == TokenKind::Str) => {
            let mut text = String::new();
            for t in tokens {
                text.push_str(&string_value(t.text)?);
            }
            Some(Literal::Text(text))
        }
        _ => None,
    }
}
