//! Tokenizer for mission script source.
//!
//! Recognises just enough of the scripting language to find routine
//! definitions and call expressions: identifiers, numbers, string literals
//! (prefixed, raw and triple-quoted), operators and brackets. Comments and
//! line continuations are skipped. Never fails: an unterminated string runs to
//! the end of its line (or of the input, for triple quotes).

/// Token category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Name or keyword.
    Ident,
    /// Numeric literal, as written.
    Number,
    /// String literal including prefix and quotes.
    Str,
    /// Operator or bracket.
    Op,
}

/// A lexed token borrowing its text from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Category.
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    /// 1-based line of the first character.
    pub line: usize,
    /// 0-based byte column of the first character.
    pub col: usize,
    /// Whether this is the first token on its physical line.
    pub first_on_line: bool,
    /// Whether that line was joined to the previous one by a trailing `\`.
    pub continued: bool,
}

impl Token<'_> {
    /// Whether this token is the operator or bracket `op`.
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    /// Whether this token is the identifier `name`.
    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }
}

const TWO_CHAR_OPS: &[&str] = &[
    "==", "!=", "<=", ">=", "**", "//", "->", ":=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "<<", ">>", "@=",
];

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    line_start: usize,
    last_token_line: usize,
    /// Line most recently reached through a backslash continuation.
    continued_line: usize,
}

/// Split `src` into tokens.
pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    let mut lexer = Lexer {
        src,
        bytes: src.as_bytes(),
        pos: 0,
        line: 1,
        line_start: 0,
        last_token_line: 0,
        continued_line: 0,
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token() {
        tokens.push(token);
    }
    tokens
}

impl<'a> Lexer<'a> {
    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn newline(&mut self) {
        self.pos += 1;
        self.line += 1;
        self.line_start = self.pos;
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek(0) {
            match b {
                b'\n' => self.newline(),
                b' ' | b'\t' | b'\r' | b'\x0c' => self.pos += 1,
                b'#' => {
                    while let Some(c) = self.peek(0) {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                // Explicit line continuation.
                b'\\' if matches!(self.peek(1), Some(b'\n')) => {
                    self.pos += 1;
                    self.newline();
                    self.continued_line = self.line;
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        self.skip_trivia();
        let b = self.peek(0)?;
        let start = self.pos;
        let line = self.line;
        let col = start - self.line_start;

        let kind = if let Some(prefix_len) = self.string_prefix_len() {
            self.pos += prefix_len;
            self.lex_string();
            TokenKind::Str
        } else if b.is_ascii_digit() || (b == b'.' && self.peek(1).is_some_and(|c| c.is_ascii_digit())) {
            self.lex_number();
            TokenKind::Number
        } else if is_ident_start(self.src[start..].chars().next()?) {
            self.lex_ident();
            TokenKind::Ident
        } else {
            let two = self.src.get(start..start + 2);
            if two.is_some_and(|t| TWO_CHAR_OPS.contains(&t)) {
                self.pos += 2;
            } else {
                self.pos += self.src[start..].chars().next().map_or(1, char::len_utf8);
            }
            TokenKind::Op
        };

        let first_on_line = self.last_token_line != line;
        let continued = first_on_line && self.continued_line == line;
        self.last_token_line = self.line;
        Some(Token {
            kind,
            text: &self.src[start..self.pos],
            start,
            end: self.pos,
            line,
            col,
            first_on_line,
            continued,
        })
    }

    /// Length of a string prefix (`r`, `b`, `f`, `u`, two-letter combos) if a
    /// quote follows, `Some(0)` at a bare quote, `None` otherwise.
    fn string_prefix_len(&self) -> Option<usize> {
        let mut len = 0;
        while len < 2 {
            match self.peek(len) {
                Some(b'r' | b'R' | b'b' | b'B' | b'f' | b'F' | b'u' | b'U') => len += 1,
                _ => break,
            }
        }
        matches!(self.peek(len), Some(b'\'' | b'"')).then_some(len)
    }

    fn lex_string(&mut self) {
        let Some(quote) = self.peek(0) else { return };
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        while let Some(c) = self.peek(0) {
            match c {
                b'\\' => {
                    self.pos += 1;
                    if self.peek(0) == Some(b'\n') {
                        self.newline();
                    } else if self.peek(0).is_some() {
                        self.pos += 1;
                    }
                }
                b'\n' if !triple => return,
                b'\n' => self.newline(),
                _ if c == quote => {
                    if !triple {
                        self.pos += 1;
                        return;
                    }
                    if self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                        self.pos += 3;
                        return;
                    }
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn lex_number(&mut self) {
        let hex = self.peek(0) == Some(b'0') && matches!(self.peek(1), Some(b'x' | b'X'));
        while let Some(c) = self.peek(0) {
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                self.pos += 1;
                if !hex && matches!(c, b'e' | b'E') && matches!(self.peek(0), Some(b'+' | b'-')) {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn lex_ident(&mut self) {
        for ch in self.src[self.pos..].chars() {
            if ch == '_' || ch.is_alphanumeric() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

/// Decode a string token into its value. Returns `None` for f-strings, whose
/// value depends on runtime state.
pub fn string_value(token: &str) -> Option<String> {
    let quote_at = token.find(['\'', '"'])?;
    let prefix = &token[..quote_at];
    if prefix.contains(['f', 'F']) {
        return None;
    }
    let raw = prefix.contains(['r', 'R']);
    let body = &token[quote_at..];
    let quote = &body[..1];
    let delim = if body.len() >= 6 && body.starts_with(&quote.repeat(3)) && body.ends_with(&quote.repeat(3)) {
        3
    } else {
        1
    };
    let inner = if body.len() >= 2 * delim && body.ends_with(quote) {
        &body[delim..body.len() - delim]
    } else {
        // Unterminated: everything after the opening quote.
        &body[delim.min(body.len())..]
    };

    if raw {
        return Some(inner.to_string());
    }
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
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}

/// Parse a numeric literal as written. `None` for complex or malformed numbers.
pub fn number_value(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let parse_radix = |digits: &str, radix: u32| i64::from_str_radix(digits, radix).ok().map(|v| v as f64);
    if let Some(digits) = lower.strip_prefix("0x") {
        parse_radix(digits, 16)
    } else if let Some(digits) = lower.strip_prefix("0o") {
        parse_radix(digits, 8)
    } else if let Some(digits) = lower.strip_prefix("0b") {
        parse_radix(digits, 2)
    } else {
        lower.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}
