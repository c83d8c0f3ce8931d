//! Key-definition bodies: `kd key definition ke` and friends.
//!
//! The definition text between the key and the `ke` terminator is kept
//! verbatim; it is re-parsed when the key fires, so nothing inside it is
//! interpreted here beyond finding where it ends. Quoted substrings hide
//! a `ke`, and a `ke` directly followed by an escaped `;` is captured
//! (escape stripped) so one key can both define a nested key and chain
//! further statements.

use crate::cmd::{CmdKind, KeyDef, Op};
use crate::error::ParseError;
use crate::parse::grammar::syntax;
use crate::parse::scan::Scan;

/// Parse `key [definition ke]` after a key-definition command name.
///
/// The cursor is left just past the terminator (or the key for the query
/// form), so the statement loop can continue on the same line.
pub(crate) fn parse_keydef(
    kind: CmdKind,
    scan: &mut Scan,
    line: Option<u32>,
) -> Result<Op, ParseError> {
    let cmd = kind.name();
    scan.skip_blanks();
    let key = scan.take_word();
    if key.is_empty() {
        return Err(syntax(cmd, "missing key", scan.rest(), line));
    }
    let key = key.to_string();

    scan.skip_blanks();
    let def = match scan.peek() {
        None | Some(';') | Some('#') | Some('\n') | Some('\r') => None,
        Some(_) => Some(scan_body(cmd, &key, scan, line)?),
    };

    let kd = KeyDef { key, def, line };
    Ok(match kind {
        CmdKind::Kd => Op::Kd(kd),
        CmdKind::Ld => Op::Ld(kd),
        CmdKind::Alias => Op::Alias(kd),
        CmdKind::Mi => Op::Mi(kd),
        CmdKind::Lsf => Op::Lsf(kd),
        _ => unreachable!("not a key-definition kind"),
    })
}

/// Copy definition text up to the unquoted `ke` terminator.
fn scan_body(
    cmd: &'static str,
    key: &str,
    scan: &mut Scan,
    line: Option<u32>,
) -> Result<String, ParseError> {
    let escape = scan.escape();
    let mut body = String::new();
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    while let Some(c) = scan.peek() {
        // Escape pairs pass through untouched; the body is re-parsed on
        // execution with the same escape conventions.
        if c == escape {
            scan.advance();
            body.push(c);
            if let Some(n) = scan.advance() {
                body.push(n);
                prev = Some(n);
            } else {
                prev = Some(c);
            }
            continue;
        }

        match quote {
            Some(q) => {
                scan.advance();
                body.push(c);
                if c == q {
                    quote = None;
                }
                prev = Some(c);
            }
            None => {
                if c == '\'' || c == '"' {
                    scan.advance();
                    body.push(c);
                    quote = Some(c);
                    prev = Some(c);
                    continue;
                }
                let token_break = prev.is_none_or(|p| !(p.is_alphanumeric() || p == '_'));
                if c == 'k' && token_break && scan.rest().len() >= 2 && scan.rest().starts_with("ke")
                {
                    let after: Vec<char> = scan.rest().chars().skip(2).take(2).collect();
                    match (after.first().copied(), after.get(1).copied()) {
                        // `ke` escape `;`: keep `ke;` and scan on.
                        (Some(e), Some(';')) if e == escape => {
                            scan.advance();
                            scan.advance();
                            scan.advance();
                            scan.advance();
                            body.push_str("ke;");
                            prev = Some(';');
                            continue;
                        }
                        // A third alphanumeric makes it an ordinary word.
                        (Some(a), _) if a.is_alphanumeric() || a == '_' => {}
                        // Terminator.
                        _ => {
                            scan.advance();
                            scan.advance();
                            let trimmed = body.trim_end_matches([' ', '\t']);
                            return Ok(trimmed.to_string());
                        }
                    }
                }
                scan.advance();
                body.push(c);
                prev = Some(c);
            }
        }
    }

    Err(ParseError::UnterminatedDef {
        cmd,
        key: key.to_string(),
        line,
    })
}
