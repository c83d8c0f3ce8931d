//! Command-line parsing.
//!
//! - [`Parser::parse_line`] turns one typed command line into a chain.
//! - [`Parser::parse_body`] handles key-definition bodies and alias
//!   expansions, which additionally run the prompt prescan.
//!
//! A line is a sequence of statements. An unescaped `;` separates
//! statements; `#` comments out the rest of its statement. The first
//! non-blank character of a statement picks the grammar: the
//! single-character commands (`/`, `\`, `?`, `[`, `{`, `(`, `=`, `$`,
//! `,`, `:`, `!`), a signed decimal line number, or an alphabetic name
//! looked up in the command table. Names that match nothing are handed
//! to the alias source and expand in place.

use crate::cmd::{Cmd, CmdKind, Coords, Goto, Op, Point, Rel, Shell, Subst};
use crate::error::{ParseError, Reporter, Severity};

mod alias;
mod grammar;
mod keydef;
pub(crate) mod scan;

pub use alias::{AliasSource, NoAliases};

use scan::Scan;

/// Escape character used when the host configures none.
pub const DEFAULT_ESCAPE: char = '@';

// =============================================================================
// PARSER
// =============================================================================

/// Turns command text into [`Cmd`] chains.
///
/// Holds the two collaborators every parse needs: the alias source
/// consulted for unrecognized names and the reporter that receives one
/// diagnostic per failed line. The parser itself keeps no state between
/// calls.
pub struct Parser<'a> {
    aliases: &'a dyn AliasSource,
    reporter: &'a dyn Reporter,
    escape: char,
}

impl<'a> Parser<'a> {
    pub fn new(aliases: &'a dyn AliasSource, reporter: &'a dyn Reporter, escape: char) -> Self {
        Parser {
            aliases,
            reporter,
            escape,
        }
    }

    /// Parse one typed command line.
    ///
    /// `transient` marks the resulting commands as one-shot rather than
    /// stored definitions; `line_no` is the 1-based source line when the
    /// text came from a command file. Errors are reported to the
    /// [`Reporter`] exactly once and returned.
    pub fn parse_line(
        &self,
        text: &str,
        transient: bool,
        line_no: Option<u32>,
    ) -> Result<Vec<Cmd>, ParseError> {
        let trimmed = text.trim_matches([' ', '\t', '\n', '\r']);
        let body = strip_full_quotes(trimmed, self.escape).unwrap_or(trimmed);
        let result = self
            .stmts(body, transient, line_no, 0)
            .and_then(|cmds| check_comma(cmds, body, line_no));
        self.reported(result)
    }

    /// Parse a key-definition body or alias expansion.
    ///
    /// Runs the prompt prescan first: when the text carries unescaped
    /// `&` markers the result is the prompt run alone, and the rewritten
    /// text is parsed only after the responses are substituted in.
    pub fn parse_body(
        &self,
        text: &str,
        transient: bool,
        line_no: Option<u32>,
    ) -> Result<Vec<Cmd>, ParseError> {
        let result = self
            .body(text, transient, line_no, 0)
            .and_then(|cmds| check_comma(cmds, text, line_no));
        self.reported(result)
    }

    fn reported(&self, result: Result<Vec<Cmd>, ParseError>) -> Result<Vec<Cmd>, ParseError> {
        if let Err(err) = &result {
            self.reporter.report(Severity::Error, &err.report_text());
        }
        result
    }

    fn body(
        &self,
        text: &str,
        transient: bool,
        line_no: Option<u32>,
        depth: u32,
    ) -> Result<Vec<Cmd>, ParseError> {
        if let Some(run) = crate::prompt::prescan(text, self.escape, transient) {
            return Ok(run);
        }
        self.stmts(text, transient, line_no, depth)
    }

    // ===== STATEMENT LOOP =====

    fn stmts(
        &self,
        text: &str,
        transient: bool,
        line_no: Option<u32>,
        depth: u32,
    ) -> Result<Vec<Cmd>, ParseError> {
        let mut scan = Scan::new(text, self.escape);
        let mut cmds = Vec::new();
        loop {
            scan.skip_blanks();
            let Some(c) = scan.peek() else { break };
            match c {
                // Statement separators produce no command.
                ';' | '\n' | '\r' => {
                    scan.advance();
                }
                '#' => {
                    scan.advance();
                    skip_comment(&mut scan);
                }
                _ => self.statement(&mut scan, &mut cmds, transient, line_no, depth)?,
            }
        }
        Ok(cmds)
    }

    fn statement(
        &self,
        scan: &mut Scan,
        out: &mut Vec<Cmd>,
        transient: bool,
        line_no: Option<u32>,
        depth: u32,
    ) -> Result<(), ParseError> {
        let Some(c) = scan.peek() else { return Ok(()) };
        let op = match c {
            '/' => {
                scan.advance();
                Op::Find(scan.delim_copy('/', true).unwrap_or_default())
            }
            '\\' | '?' => {
                scan.advance();
                Op::Rfind(scan.delim_copy(c, true).unwrap_or_default())
            }
            '[' => {
                scan.advance();
                let (row, col) = grammar::parse_coords(scan, ']', true, "markc", line_no)?;
                Op::MarkC(Coords { row, col })
            }
            '{' => {
                scan.advance();
                let (row, col) = grammar::parse_coords(scan, '}', true, "corner", line_no)?;
                Op::Corner(Coords { row, col })
            }
            '(' => {
                scan.advance();
                let (x, y) = grammar::parse_coords(scan, ')', false, "markp", line_no)?;
                Op::MarkP(Point { x, y })
            }
            '=' => {
                scan.advance();
                Op::Simple(CmdKind::Equal)
            }
            '$' => {
                scan.advance();
                Op::Simple(CmdKind::Bottom)
            }
            ',' => {
                scan.advance();
                Op::Simple(CmdKind::Comma)
            }
            ':' => {
                scan.advance();
                Op::Simple(CmdKind::Null)
            }
            '!' => {
                scan.advance();
                self.parse_bang(scan, line_no)?
            }
            c if c == '+' || c == '-' || c.is_ascii_digit() => parse_num(scan, line_no)?,
            c if c.is_ascii_alphabetic() => {
                return self.alpha_statement(scan, out, transient, line_no, depth);
            }
            c => {
                return Err(grammar::syntax(
                    "dm",
                    format!("unrecognized command character '{c}'"),
                    scan.rest(),
                    line_no,
                ));
            }
        };
        out.push(Cmd { op, transient });
        Ok(())
    }

    fn alpha_statement(
        &self,
        scan: &mut Scan,
        out: &mut Vec<Cmd>,
        transient: bool,
        line_no: Option<u32>,
        depth: u32,
    ) -> Result<(), ParseError> {
        let lower = scan.take_name().to_ascii_lowercase();
        let op = match CmdKind::lookup(&lower) {
            Some(k @ (CmdKind::Kd | CmdKind::Ld | CmdKind::Alias | CmdKind::Mi | CmdKind::Lsf)) => {
                keydef::parse_keydef(k, scan, line_no)?
            }
            Some(k @ (CmdKind::Es | CmdKind::Msg)) => {
                let text = one_delimited(scan, k.name(), line_no)?;
                match k {
                    CmdKind::Es => Op::Es(text),
                    _ => Op::Msg(text),
                }
            }
            Some(k @ (CmdKind::S | CmdKind::So)) => {
                let (from, to) = two_delimited(scan, k.name(), line_no)?;
                match k {
                    CmdKind::S => Op::S(Subst { from, to }),
                    _ => Op::So(Subst { from, to }),
                }
            }
            Some(k) if k.is_supported() => {
                let body = scan.stmt_extent();
                grammar::parse_args(k, body, self.escape, line_no)?
            }
            Some(k) => {
                // Recognized but not built in: an alias may shadow it,
                // otherwise the statement is dropped with a warning.
                if let Some(body) = self.aliases.lookup(&lower) {
                    return self.expand(&lower, &body, scan, out, transient, line_no, depth);
                }
                self.warn_unsupported(k.name(), line_no);
                let _ = scan.stmt_extent();
                return Ok(());
            }
            None => {
                if let Some(body) = self.aliases.lookup(&lower) {
                    return self.expand(&lower, &body, scan, out, transient, line_no, depth);
                }
                return Err(ParseError::Unknown {
                    name: lower,
                    line: line_no,
                });
            }
        };
        out.push(Cmd { op, transient });
        Ok(())
    }

    // ===== PER-FORM HELPERS =====

    /// `!` shell escape: dash options, then the rest of the physical
    /// line verbatim (`;` and `#` are ordinary shell characters here).
    fn parse_bang(&self, scan: &mut Scan, line_no: Option<u32>) -> Result<Op, ParseError> {
        let mut sh = Shell::default();
        loop {
            scan.skip_blanks();
            if scan.peek() != Some('-') {
                break;
            }
            let Some(tok) = scan.take_token() else { break };
            match tok.as_str() {
                "-c" => {
                    if sh.c {
                        return Err(grammar::duplicate("bang", &tok, line_no));
                    }
                    sh.c = true;
                }
                "-m" => {
                    if sh.m {
                        return Err(grammar::duplicate("bang", &tok, line_no));
                    }
                    sh.m = true;
                }
                "-e" => {
                    if sh.e {
                        return Err(grammar::duplicate("bang", &tok, line_no));
                    }
                    sh.e = true;
                }
                t if t.starts_with("-s") => {
                    if sh.shell_opts.is_some() {
                        return Err(grammar::duplicate("bang", "-s", line_no));
                    }
                    sh.shell_opts = Some(t["-s".len()..].to_string());
                }
                t => {
                    return Err(grammar::syntax(
                        "bang",
                        format!("unknown option {t}"),
                        t,
                        line_no,
                    ));
                }
            }
        }
        scan.skip_blanks();
        let rest = scan.rest();
        let start = scan.pos();
        while let Some(c) = scan.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            scan.advance();
        }
        let taken = &rest[..scan.pos() - start];
        sh.cmdline = taken.trim_end_matches([' ', '\t']).to_string();
        Ok(Op::Bang(sh))
    }

    fn expand(
        &self,
        name: &str,
        body: &str,
        scan: &mut Scan,
        out: &mut Vec<Cmd>,
        transient: bool,
        line_no: Option<u32>,
        depth: u32,
    ) -> Result<(), ParseError> {
        if depth >= alias::MAX_EXPANSION_DEPTH {
            return Err(grammar::syntax(
                "alias",
                format!("expansion of {name} recurses too deeply"),
                name,
                line_no,
            ));
        }
        let extent = scan.stmt_extent();
        let args = Scan::new(extent, self.escape).take_argv();
        let text = alias::substitute(body, &args, self.escape);
        log::trace!("alias {name} expands to {text:?}");
        let cmds = self.body(&text, transient, line_no, depth + 1)?;
        out.extend(cmds);
        Ok(())
    }

    fn warn_unsupported(&self, name: &str, line_no: Option<u32>) {
        let msg = match line_no {
            Some(n) => format!("line {n}: {name}: not supported"),
            None => format!("{name}: not supported"),
        };
        self.reporter.report(Severity::Warning, &msg);
    }
}

// =============================================================================
// FREE HELPERS
// =============================================================================

/// Leading signed decimal literal: a goto-line command.
fn parse_num(scan: &mut Scan, line_no: Option<u32>) -> Result<Op, ParseError> {
    let rel = match scan.peek() {
        Some('+') => {
            scan.advance();
            Rel::Plus
        }
        Some('-') => {
            scan.advance();
            Rel::Minus
        }
        _ => Rel::Abs,
    };
    let digits = scan.take_digits();
    if digits.is_empty() {
        return Err(grammar::syntax(
            "num",
            "expected digits after sign",
            scan.rest(),
            line_no,
        ));
    }
    let n: i32 = digits
        .parse()
        .map_err(|_| grammar::syntax("num", "number out of range", digits, line_no))?;
    // Absolute lines are typed 1-based and stored zero-based.
    let line = match rel {
        Rel::Abs => (n - 1).max(0),
        _ => n,
    };
    Ok(Op::Num(Goto { line, rel }))
}

/// Delimiter-bounded single string (`es`, `msg`). The delimiter is the
/// first non-blank character after the name; a missing closer is
/// tolerated and captures to end of input.
fn one_delimited(
    scan: &mut Scan,
    cmd: &'static str,
    line_no: Option<u32>,
) -> Result<String, ParseError> {
    let delim = open_delim(scan, cmd, line_no)?;
    Ok(scan.delim_copy(delim, true).unwrap_or_default())
}

/// Delimiter-bounded pair (`s`, `so`): the first string requires its
/// closing delimiter, the second tolerates end of input.
fn two_delimited(
    scan: &mut Scan,
    cmd: &'static str,
    line_no: Option<u32>,
) -> Result<(String, String), ParseError> {
    let delim = open_delim(scan, cmd, line_no)?;
    let from = scan
        .delim_copy(delim, false)
        .ok_or_else(|| grammar::syntax(cmd, format!("missing closing {delim}"), "", line_no))?;
    let to = scan.delim_copy(delim, true).unwrap_or_default();
    Ok((from, to))
}

fn open_delim(scan: &mut Scan, cmd: &'static str, line_no: Option<u32>) -> Result<char, ParseError> {
    scan.skip_blanks();
    let delim = match scan.peek() {
        None | Some('\n') | Some('\r') => {
            return Err(grammar::syntax(
                cmd,
                "missing delimited text",
                scan.rest(),
                line_no,
            ));
        }
        Some(d) => d,
    };
    if delim == scan.escape() {
        return Err(grammar::syntax(
            cmd,
            "delimiter equals the escape character",
            scan.rest(),
            line_no,
        ));
    }
    scan.advance();
    Ok(delim)
}

/// Comment text runs to the next unescaped `;`, `#`, or end of line.
/// Quotes are not special inside a comment.
fn skip_comment(scan: &mut Scan) {
    while let Some(c) = scan.peek() {
        if c == scan.escape() {
            scan.advance();
            scan.advance();
        } else if matches!(c, ';' | '#' | '\n' | '\r') {
            break;
        } else {
            scan.advance();
        }
    }
}

/// Strip one pair of quotes enclosing the whole line, when the interior
/// holds no further unescaped quote of the same kind.
fn strip_full_quotes(text: &str, escape: char) -> Option<&str> {
    let mut chars = text.chars();
    let q = chars.next()?;
    if q != '\'' && q != '"' {
        return None;
    }
    let mut inner = 0usize;
    let mut closes_at = None;
    let mut iter = text[1..].char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if c == escape {
            iter.next();
            continue;
        }
        if c == q {
            inner += 1;
            closes_at = Some(i + 1);
        }
    }
    match (inner, closes_at) {
        (1, Some(p)) if p == text.len() - q.len_utf8() => Some(&text[q.len_utf8()..p]),
        _ => None,
    }
}

fn check_comma(cmds: Vec<Cmd>, text: &str, line_no: Option<u32>) -> Result<Vec<Cmd>, ParseError> {
    if cmds.first().map(|c| c.kind()) == Some(CmdKind::Comma) {
        return Err(grammar::syntax("comma", "cannot open a line", text, line_no));
    }
    if cmds.last().map(|c| c.kind()) == Some(CmdKind::Comma) {
        return Err(grammar::syntax("comma", "cannot close a line", text, line_no));
    }
    Ok(cmds)
}

// =============================================================================
// TESTS
// =============================================================================
