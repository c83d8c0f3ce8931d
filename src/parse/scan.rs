//! Character-level cursor for the command-line parser.
//!
//! One escape-character convention runs through everything here:
//! `esc esc` stands for two literal escape characters, `esc delim` for a
//! literal delimiter, and `esc other` keeps both characters. Statement
//! boundaries and token splits skip the character after an escape without
//! interpreting it; delimiter copy and token capture apply the rules.

use std::iter::Peekable;
use std::str::CharIndices;

/// Scanning cursor over one line of command text.
pub(crate) struct Scan<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pos: usize,
    escape: char,
}

impl<'a> Scan<'a> {
    pub fn new(input: &'a str, escape: char) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            pos: 0,
            escape,
        }
    }

    pub fn escape(&self) -> char {
        self.escape
    }

    /// Byte position of the cursor.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    /// Unconsumed remainder of the input.
    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    pub fn advance(&mut self) -> Option<char> {
        self.chars.next().map(|(idx, c)| {
            self.pos = idx + c.len_utf8();
            c
        })
    }

    /// Consume `c` if it is next.
    pub fn bump_if(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.advance();
        }
    }

    fn take_while<F>(&mut self, start: usize, predicate: F) -> &'a str
    where
        F: Fn(char) -> bool,
    {
        while let Some(c) = self.peek() {
            if predicate(c) {
                self.advance();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    /// Collect a command or alias name: alphabetic head, alphanumeric
    /// tail. Empty when the next character cannot start a name.
    pub fn take_name(&mut self) -> &'a str {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return "",
        }
        self.take_while(self.pos, |c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// Collect a run of ASCII digits.
    pub fn take_digits(&mut self) -> &'a str {
        self.take_while(self.pos, |c| c.is_ascii_digit())
    }

    /// Raw word: everything up to the next blank or statement boundary.
    pub fn take_word(&mut self) -> &'a str {
        self.take_while(self.pos, |c| {
            !matches!(c, ' ' | '\t' | ';' | '#' | '\n' | '\r')
        })
    }

    /// Copy text up to the next unescaped `delim`, applying the escape
    /// rules, consuming the delimiter. With `tolerate` a missing closer
    /// yields the rest of the input; without it, `None`.
    pub fn delim_copy(&mut self, delim: char, tolerate: bool) -> Option<String> {
        let mut out = String::new();
        while let Some(c) = self.advance() {
            if c == self.escape {
                match self.peek() {
                    Some(n) if n == self.escape => {
                        out.push(self.escape);
                        out.push(self.escape);
                        self.advance();
                    }
                    Some(n) if n == delim => {
                        out.push(delim);
                        self.advance();
                    }
                    Some(n) => {
                        out.push(self.escape);
                        out.push(n);
                        self.advance();
                    }
                    None => out.push(self.escape),
                }
            } else if c == delim {
                return Some(out);
            } else {
                out.push(c);
            }
        }
        if tolerate { Some(out) } else { None }
    }

    /// Extent of the current statement: everything up to the next
    /// unescaped `;`, `#`, or end of line outside quoted substrings.
    /// The cursor stops at the boundary character; the returned slice is
    /// right-trimmed.
    pub fn stmt_extent(&mut self) -> &'a str {
        let start = self.pos;
        let mut quote: Option<char> = None;
        loop {
            let Some(c) = self.peek() else { break };
            match quote {
                Some(q) => {
                    if c == self.escape && self.peek_nth(1).is_some() {
                        self.advance();
                        self.advance();
                        continue;
                    }
                    self.advance();
                    if c == q {
                        quote = None;
                    }
                }
                None => {
                    if c == self.escape && self.peek_nth(1).is_some() {
                        self.advance();
                        self.advance();
                    } else if matches!(c, ';' | '#' | '\n' | '\r') {
                        break;
                    } else {
                        self.advance();
                        if c == '\'' || c == '"' {
                            quote = Some(c);
                        }
                    }
                }
            }
        }
        self.input[start..self.pos].trim_end_matches([' ', '\t'])
    }

    /// One blank-separated token with shell-style quote grouping; quotes
    /// are stripped and escapes applied. `None` at end of input.
    pub fn take_token(&mut self) -> Option<String> {
        self.skip_blanks();
        self.peek()?;
        let mut out = String::new();
        let mut quote: Option<char> = None;
        while let Some(c) = self.peek() {
            match quote {
                Some(q) => {
                    self.advance();
                    if c == self.escape {
                        if let Some(n) = self.advance() {
                            out.push(n);
                        } else {
                            out.push(self.escape);
                        }
                    } else if c == q {
                        quote = None;
                    } else {
                        out.push(c);
                    }
                }
                None => {
                    if matches!(c, ' ' | '\t') {
                        break;
                    }
                    self.advance();
                    if c == self.escape {
                        if let Some(n) = self.advance() {
                            out.push(n);
                        } else {
                            out.push(self.escape);
                        }
                    } else if c == '\'' || c == '"' {
                        quote = Some(c);
                    } else {
                        out.push(c);
                    }
                }
            }
        }
        Some(out)
    }

    /// Remaining tokens as an argument vector.
    pub fn take_argv(&mut self) -> Vec<String> {
        let mut argv = Vec::new();
        while let Some(tok) = self.take_token() {
            argv.push(tok);
        }
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(s: &str) -> Scan<'_> {
        Scan::new(s, '@')
    }

    #[test]
    fn test_take_name_and_digits() {
        let mut s = scan("cmdf2 rest");
        assert_eq!(s.take_name(), "cmdf2");
        s.skip_blanks();
        assert_eq!(s.take_name(), "rest");

        let mut s = scan("123abc");
        assert_eq!(s.take_digits(), "123");
        assert_eq!(s.take_name(), "abc");

        let mut s = scan("5");
        assert_eq!(s.take_name(), "");
        assert_eq!(s.take_digits(), "5");
    }

    #[test]
    fn test_delim_copy_plain() {
        let mut s = scan("foo/rest");
        assert_eq!(s.delim_copy('/', false), Some("foo".into()));
        assert_eq!(s.rest(), "rest");
    }

    #[test]
    fn test_delim_copy_escapes() {
        // esc delim keeps the delimiter.
        let mut s = scan("a@/b/x");
        assert_eq!(s.delim_copy('/', false), Some("a/b".into()));
        assert_eq!(s.rest(), "x");

        // esc esc keeps both escapes.
        let mut s = scan("a@@b/");
        assert_eq!(s.delim_copy('/', false), Some("a@@b".into()));

        // esc other keeps both characters.
        let mut s = scan("a@xb/");
        assert_eq!(s.delim_copy('/', false), Some("a@xb".into()));
    }

    #[test]
    fn test_delim_copy_missing_closer() {
        let mut s = scan("unterminated");
        assert_eq!(s.delim_copy('/', false), None);

        let mut s = scan("unterminated");
        assert_eq!(s.delim_copy('/', true), Some("unterminated".into()));
    }

    #[test]
    fn test_stmt_extent_boundaries() {
        let mut s = scan("tt ; rest");
        assert_eq!(s.stmt_extent(), "tt");
        assert_eq!(s.peek(), Some(';'));

        let mut s = scan("ce a b # note");
        assert_eq!(s.stmt_extent(), "ce a b");
        assert_eq!(s.peek(), Some('#'));

        let mut s = scan("no boundary at all");
        assert_eq!(s.stmt_extent(), "no boundary at all");
        assert!(s.at_end());
    }

    #[test]
    fn test_stmt_extent_quotes_and_escapes() {
        let mut s = scan("ce 'a;b' next; tail");
        assert_eq!(s.stmt_extent(), "ce 'a;b' next");

        let mut s = scan("ce a@;b; tail");
        assert_eq!(s.stmt_extent(), "ce a@;b");

        // esc esc does not shield a following boundary.
        let mut s = scan("ce a@@; tail");
        assert_eq!(s.stmt_extent(), "ce a@@");
        assert_eq!(s.peek(), Some(';'));
    }

    #[test]
    fn test_take_token_quoting() {
        let mut s = scan("plain 'two words' a'b c'd @;x");
        assert_eq!(s.take_token(), Some("plain".into()));
        assert_eq!(s.take_token(), Some("two words".into()));
        assert_eq!(s.take_token(), Some("ab cd".into()));
        assert_eq!(s.take_token(), Some(";x".into()));
        assert_eq!(s.take_token(), None);
    }

    #[test]
    fn test_take_argv() {
        let mut s = scan("a.txt \"b c\" -x");
        assert_eq!(
            s.take_argv(),
            vec!["a.txt".to_string(), "b c".into(), "-x".into()]
        );
    }
}
