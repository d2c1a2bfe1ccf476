//! Free-variable detection for expression-style scripts.
//!
//! This is a lexical scan, not a parser. It is good enough for the short
//! expressions hosts evaluate (`a + b * c`, `IF(x > 1, y, z)`) and skips:
//!
//! - keywords, string literals, numbers and comments;
//! - names used as calls: `f(...)`, `f"..."`, `f{...}`;
//! - the root and the fields of member paths such as `a.b.c` or `a:m()`;
//! - names assigned or declared before they are read (`x = 1; return x`,
//!   `local a, b`, `for i, v in ...`, function parameters).

use std::collections::{BTreeSet, HashSet};

const KEYWORDS: &[&str] = &[
    "and", "break", "continue", "do", "else", "elseif", "end", "false", "for", "function", "goto",
    "if", "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Sorted, de-duplicated free variable names of `script`.
pub fn detect_variable_names(script: &str) -> Vec<String> {
    let mut scanner = Scanner::new(script);
    scanner.run();
    scanner.found.into_iter().collect()
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    found: BTreeSet<String>,
    bound: HashSet<&'a str>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            found: BTreeSet::new(),
            bound: HashSet::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn run(&mut self) {
        while let Some(c) = self.peek(0) {
            match c {
                b'-' if self.peek(1) == Some(b'-') => {
                    self.pos += 2;
                    self.skip_comment();
                }
                b'[' if self.long_bracket_level().is_some() => self.skip_long_string(),
                b'"' | b'\'' => self.skip_quoted(c),
                b'0'..=b'9' => self.skip_number(),
                b'.' if self.peek(1).is_some_and(|d| d.is_ascii_digit()) => self.skip_number(),
                b'.' if self.peek(1) == Some(b'.') => {
                    while self.peek(0) == Some(b'.') {
                        self.pos += 1;
                    }
                }
                b'.' => {
                    self.pos += 1;
                    self.skip_ws();
                    self.skip_ident();
                }
                b':' if self.peek(1) == Some(b':') => self.pos += 2,
                b':' => {
                    self.pos += 1;
                    self.skip_ws();
                    self.skip_ident();
                }
                c if is_ident_start(c) => self.identifier(),
                _ => self.pos += 1,
            }
        }
    }

    fn identifier(&mut self) {
        let name = self.read_ident();
        match name {
            "local" | "for" => return self.declare_list(),
            "function" => return self.function_header(),
            _ if KEYWORDS.contains(&name) => return,
            _ => {}
        }

        let next = self.next_non_ws();
        match (self.bytes.get(next).copied(), self.bytes.get(next + 1).copied()) {
            (Some(b'.'), Some(b'.')) => self.record(name),
            // member path root
            (Some(b'.' | b':'), _) => {}
            (Some(b'='), Some(b'=')) => self.record(name),
            (Some(b'='), _) => {
                self.bound.insert(name);
            }
            // call
            (Some(b'(' | b'"' | b'\'' | b'{'), _) => {}
            (Some(b'['), Some(b'[' | b'=')) => {}
            _ => self.record(name),
        }
    }

    /// `local a, b` / `for k, v`: bind every name in the list.
    fn declare_list(&mut self) {
        loop {
            self.skip_ws();
            match self.peek(0) {
                Some(c) if is_ident_start(c) => {
                    let name = self.read_ident();
                    if name == "function" {
                        return self.function_header();
                    }
                    self.bound.insert(name);
                    self.skip_attrib();
                }
                _ => return,
            }
            self.skip_ws();
            if self.peek(0) != Some(b',') {
                return;
            }
            self.pos += 1;
        }
    }

    /// `function name.path:method(a, b)`: bind the parameters.
    fn function_header(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == b'(' {
                break;
            }
            if !(is_ident_char(c) || c == b'.' || c == b':' || c.is_ascii_whitespace()) {
                return;
            }
            self.pos += 1;
        }
        self.pos += 1;
        loop {
            self.skip_ws();
            match self.peek(0) {
                Some(c) if is_ident_start(c) => {
                    let name = self.read_ident();
                    self.bound.insert(name);
                }
                Some(b'.' | b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return;
                }
                _ => return,
            }
        }
    }

    /// Lua 5.4 `<const>` / `<close>` after a local name.
    fn skip_attrib(&mut self) {
        self.skip_ws();
        if self.peek(0) == Some(b'<') {
            while let Some(c) = self.peek(0) {
                self.pos += 1;
                if c == b'>' {
                    break;
                }
            }
        }
    }

    fn record(&mut self, name: &'a str) {
        if !self.bound.contains(name) {
            self.found.insert(name.to_string());
        }
    }

    fn read_ident(&mut self) -> &'a str {
        let start = self.pos;
        self.skip_ident();
        &self.src[start..self.pos]
    }

    fn skip_ident(&mut self) {
        while self.peek(0).is_some_and(is_ident_char) {
            self.pos += 1;
        }
    }

    fn skip_ws(&mut self) {
        self.pos = self.next_non_ws();
    }

    fn next_non_ws(&self) -> usize {
        let mut i = self.pos;
        while self.bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }
        i
    }

    fn skip_comment(&mut self) {
        if self.peek(0) == Some(b'[') && self.long_bracket_level().is_some() {
            self.skip_long_string();
            return;
        }
        while let Some(c) = self.peek(0) {
            if c == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    /// Level of a long bracket opening at `pos`: `[[` is 0, `[==[` is 2.
    fn long_bracket_level(&self) -> Option<usize> {
        let mut level = 0;
        while self.peek(1 + level) == Some(b'=') {
            level += 1;
        }
        (self.peek(1 + level) == Some(b'[')).then_some(level)
    }

    fn skip_long_string(&mut self) {
        let Some(level) = self.long_bracket_level() else {
            return;
        };
        self.pos += level + 2;
        while let Some(c) = self.peek(0) {
            if c == b']' {
                let mut eq = 0;
                while self.peek(1 + eq) == Some(b'=') {
                    eq += 1;
                }
                if eq == level && self.peek(1 + eq) == Some(b']') {
                    self.pos += eq + 2;
                    return;
                }
            }
            self.pos += 1;
        }
    }

    fn skip_quoted(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(c) = self.peek(0) {
            match c {
                b'\\' => self.pos += 2,
                b'\n' => return,
                c if c == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_number(&mut self) {
        let hex = self.peek(0) == Some(b'0') && matches!(self.peek(1), Some(b'x' | b'X'));
        if hex {
            self.pos += 2;
        }
        while let Some(c) = self.peek(0) {
            let exponent_sign = matches!(c, b'+' | b'-')
                && self.pos > 0
                && if hex {
                    matches!(self.bytes[self.pos - 1], b'p' | b'P')
                } else {
                    matches!(self.bytes[self.pos - 1], b'e' | b'E')
                };
            if c == b'.' && self.peek(1) == Some(b'.') {
                break;
            }
            if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}
