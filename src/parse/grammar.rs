//! Argument micro-grammars for the alphabetic commands.
//!
//! Each grammar consumes the statement body that followed the command
//! name and must account for all of it; leftover text is a syntax error.
//! Delimiter-bounded and key-definition commands are not handled here,
//! they find their own extent in the statement parser.

use crate::cmd::{CmdKind, Coord, DqArgs, Op, Proc, Rel, Scroll, Toggle, WwArgs, Xfer};
use crate::error::ParseError;
use crate::parse::scan::Scan;

pub(crate) fn syntax(
    cmd: &'static str,
    detail: impl Into<String>,
    text: &str,
    line: Option<u32>,
) -> ParseError {
    ParseError::Syntax {
        cmd,
        detail: detail.into(),
        text: text.to_string(),
        line,
    }
}

pub(crate) fn duplicate(cmd: &'static str, tok: &str, line: Option<u32>) -> ParseError {
    syntax(cmd, format!("duplicate option {tok}"), tok, line)
}

fn unknown_option(cmd: &'static str, tok: &str, line: Option<u32>) -> ParseError {
    syntax(cmd, format!("unknown option {tok}"), tok, line)
}

/// Parse the argument body of a non-special alphabetic command.
pub(crate) fn parse_args(
    kind: CmdKind,
    body: &str,
    escape: char,
    line: Option<u32>,
) -> Result<Op, ParseError> {
    let mut scan = Scan::new(body, escape);
    let op = match kind {
        CmdKind::Ce => Op::Ce(scan.take_argv()),
        CmdKind::Cv => Op::Cv(scan.take_argv()),
        CmdKind::Cmdf => Op::Cmdf(scan.take_argv()),
        CmdKind::Cp => Op::Cp(parse_proc(&mut scan, "cp", line)?),
        CmdKind::Cpo => Op::Cpo(parse_proc(&mut scan, "cpo", line)?),
        CmdKind::Cps => Op::Cps(parse_proc(&mut scan, "cps", line)?),
        CmdKind::Dq => Op::Dq(parse_dq(&mut scan, line)?),
        CmdKind::Ww => Op::Ww(parse_ww(&mut scan, line)?),
        CmdKind::Xc => Op::Xc(parse_xfer(&mut scan, "xc", line)?),
        CmdKind::Xd => Op::Xd(parse_xfer(&mut scan, "xd", line)?),
        CmdKind::Xp => Op::Xp(parse_xfer(&mut scan, "xp", line)?),
        CmdKind::Ei => Op::Ei(parse_toggle(&mut scan, "ei", line)?),
        CmdKind::Ro => Op::Ro(parse_toggle(&mut scan, "ro", line)?),
        CmdKind::Wh => Op::Wh(parse_toggle(&mut scan, "wh", line)?),
        CmdKind::Wi => Op::Wi(parse_toggle(&mut scan, "wi", line)?),
        CmdKind::Ws => Op::Ws(parse_toggle(&mut scan, "ws", line)?),
        CmdKind::Pp => Op::Pp(parse_scroll(&mut scan, "pp", line)?),
        CmdKind::Pv => Op::Pv(parse_scroll(&mut scan, "pv", line)?),
        CmdKind::Ph => Op::Ph(parse_scroll(&mut scan, "ph", line)?),
        CmdKind::Pn => Op::Pn(parse_name_arg(&mut scan, "pn", line)?),
        CmdKind::Pw => Op::Pw(parse_name_arg(&mut scan, "pw", line)?),
        k if k.is_supported() => {
            // No-argument commands: the body must be empty.
            scan.skip_blanks();
            if !scan.at_end() {
                return Err(syntax(k.name(), "takes no arguments", scan.rest(), line));
            }
            Op::Simple(k)
        }
        k => {
            // Unsupported kinds are filtered out before grammar dispatch.
            return Err(syntax(k.name(), "not supported", body, line));
        }
    };
    Ok(op)
}

/// `-w -d -s` then an argument vector.
fn parse_proc(scan: &mut Scan, cmd: &'static str, line: Option<u32>) -> Result<Proc, ParseError> {
    let mut p = Proc::default();
    loop {
        scan.skip_blanks();
        if scan.peek() != Some('-') {
            break;
        }
        let tok = scan.take_token().unwrap_or_default();
        match tok.as_str() {
            "-w" => {
                if p.w {
                    return Err(duplicate(cmd, &tok, line));
                }
                p.w = true;
            }
            "-d" => {
                if p.d {
                    return Err(duplicate(cmd, &tok, line));
                }
                p.d = true;
            }
            "-s" => {
                if p.s {
                    return Err(duplicate(cmd, &tok, line));
                }
                p.s = true;
            }
            _ => return Err(unknown_option(cmd, &tok, line)),
        }
    }
    p.argv = scan.take_argv();
    Ok(p)
}

fn parse_count(
    scan: &mut Scan,
    cmd: &'static str,
    opt: &str,
    line: Option<u32>,
) -> Result<i32, ParseError> {
    let tok = scan
        .take_token()
        .ok_or_else(|| syntax(cmd, format!("{opt} needs a count"), opt, line))?;
    tok.parse()
        .map_err(|_| syntax(cmd, format!("bad count after {opt}"), &tok, line))
}

fn parse_value(
    scan: &mut Scan,
    cmd: &'static str,
    opt: &str,
    line: Option<u32>,
) -> Result<String, ParseError> {
    match scan.take_token() {
        Some(tok) if !tok.is_empty() => Ok(tok),
        _ => Err(syntax(cmd, format!("{opt} needs a value"), opt, line)),
    }
}

/// `dq [-s] [-b] [-i] [-c N] [-a HH] [name]`.
fn parse_dq(scan: &mut Scan, line: Option<u32>) -> Result<DqArgs, ParseError> {
    let mut d = DqArgs::default();
    loop {
        scan.skip_blanks();
        if scan.at_end() {
            break;
        }
        if scan.peek() == Some('-') {
            let tok = scan.take_token().unwrap_or_default();
            match tok.as_str() {
                "-s" => {
                    if d.s {
                        return Err(duplicate("dq", &tok, line));
                    }
                    d.s = true;
                }
                "-b" => {
                    if d.b {
                        return Err(duplicate("dq", &tok, line));
                    }
                    d.b = true;
                }
                "-i" => {
                    if d.i {
                        return Err(duplicate("dq", &tok, line));
                    }
                    d.i = true;
                }
                "-c" => {
                    if d.count.is_some() {
                        return Err(duplicate("dq", &tok, line));
                    }
                    d.count = Some(parse_count(scan, "dq", "-c", line)?);
                }
                "-a" => {
                    if d.at.is_some() {
                        return Err(duplicate("dq", &tok, line));
                    }
                    d.at = Some(parse_value(scan, "dq", "-a", line)?);
                }
                _ => return Err(unknown_option("dq", &tok, line)),
            }
        } else {
            let tok = scan.take_token().unwrap_or_default();
            if d.name.is_some() {
                return Err(syntax("dq", "unexpected argument", &tok, line));
            }
            if tok.is_empty() {
                return Err(syntax("dq", "empty name", &tok, line));
            }
            d.name = Some(tok);
        }
    }
    Ok(d)
}

/// `ww [-a] [-i] [-c N] [-on|-off]`.
fn parse_ww(scan: &mut Scan, line: Option<u32>) -> Result<WwArgs, ParseError> {
    let mut w = WwArgs::default();
    loop {
        scan.skip_blanks();
        if scan.at_end() {
            break;
        }
        if scan.peek() != Some('-') {
            return Err(syntax("ww", "unexpected argument", scan.rest(), line));
        }
        let tok = scan.take_token().unwrap_or_default();
        match tok.as_str() {
            "-a" => {
                if w.a {
                    return Err(duplicate("ww", &tok, line));
                }
                w.a = true;
            }
            "-i" => {
                if w.i {
                    return Err(duplicate("ww", &tok, line));
                }
                w.i = true;
            }
            "-c" => {
                if w.count.is_some() {
                    return Err(duplicate("ww", &tok, line));
                }
                w.count = Some(parse_count(scan, "ww", "-c", line)?);
            }
            "-on" => {
                if w.state.is_some() {
                    return Err(duplicate("ww", &tok, line));
                }
                w.state = Some(true);
            }
            "-off" => {
                if w.state.is_some() {
                    return Err(duplicate("ww", &tok, line));
                }
                w.state = Some(false);
            }
            _ => return Err(unknown_option("ww", &tok, line)),
        }
    }
    Ok(w)
}

/// `xc`/`xd`/`xp` `[-r] [-f path]`.
fn parse_xfer(scan: &mut Scan, cmd: &'static str, line: Option<u32>) -> Result<Xfer, ParseError> {
    let mut x = Xfer::default();
    loop {
        scan.skip_blanks();
        if scan.at_end() {
            break;
        }
        if scan.peek() != Some('-') {
            return Err(syntax(cmd, "unexpected argument", scan.rest(), line));
        }
        let tok = scan.take_token().unwrap_or_default();
        match tok.as_str() {
            "-r" => {
                if x.r {
                    return Err(duplicate(cmd, &tok, line));
                }
                x.r = true;
            }
            "-f" => {
                if x.file.is_some() {
                    return Err(duplicate(cmd, &tok, line));
                }
                x.file = Some(parse_value(scan, cmd, "-f", line)?);
            }
            _ => return Err(unknown_option(cmd, &tok, line)),
        }
    }
    Ok(x)
}

/// `-on`, `-off`, or nothing (flip).
fn parse_toggle(
    scan: &mut Scan,
    cmd: &'static str,
    line: Option<u32>,
) -> Result<Toggle, ParseError> {
    scan.skip_blanks();
    if scan.at_end() {
        return Ok(Toggle { state: None });
    }
    let tok = scan.take_token().unwrap_or_default();
    let state = match tok.as_str() {
        "-on" => Some(true),
        "-off" => Some(false),
        _ => return Err(unknown_option(cmd, &tok, line)),
    };
    scan.skip_blanks();
    if !scan.at_end() {
        return Err(syntax(cmd, "unexpected argument", scan.rest(), line));
    }
    Ok(Toggle { state })
}

/// Optional signed count, defaulting to one page forward.
fn parse_scroll(
    scan: &mut Scan,
    cmd: &'static str,
    line: Option<u32>,
) -> Result<Scroll, ParseError> {
    scan.skip_blanks();
    if scan.at_end() {
        return Ok(Scroll::default());
    }
    let negative = match scan.peek() {
        Some('+') => {
            scan.advance();
            false
        }
        Some('-') => {
            scan.advance();
            true
        }
        _ => false,
    };
    let digits = scan.take_digits();
    if digits.is_empty() {
        return Err(syntax(cmd, "expected a count", scan.rest(), line));
    }
    let n: i32 = digits
        .parse()
        .map_err(|_| syntax(cmd, "count out of range", digits, line))?;
    scan.skip_blanks();
    if !scan.at_end() {
        return Err(syntax(cmd, "unexpected argument", scan.rest(), line));
    }
    Ok(Scroll {
        delta: if negative { -n } else { n },
    })
}

/// Exactly one non-empty token.
fn parse_name_arg(
    scan: &mut Scan,
    cmd: &'static str,
    line: Option<u32>,
) -> Result<String, ParseError> {
    let name = match scan.take_token() {
        Some(tok) if !tok.is_empty() => tok,
        _ => return Err(syntax(cmd, "missing argument", "", line)),
    };
    scan.skip_blanks();
    if !scan.at_end() {
        return Err(syntax(cmd, "unexpected argument", scan.rest(), line));
    }
    Ok(name)
}

/// Coordinate pair for `[row,col]`, `{row,col}`, `(x,y)`.
///
/// The opener has been consumed; `one_based` converts absolute values to
/// zero-based storage. Both coordinates may be blank.
pub(crate) fn parse_coords(
    scan: &mut Scan,
    closer: char,
    one_based: bool,
    cmd: &'static str,
    line: Option<u32>,
) -> Result<(Option<Coord>, Option<Coord>), ParseError> {
    let first = parse_coord(scan, one_based, cmd, line)?;
    scan.skip_blanks();
    let second = if scan.bump_if(',') {
        parse_coord(scan, one_based, cmd, line)?
    } else {
        None
    };
    scan.skip_blanks();
    if !scan.bump_if(closer) {
        return Err(syntax(
            cmd,
            format!("expected closing {closer}"),
            scan.rest(),
            line,
        ));
    }
    Ok((first, second))
}

fn parse_coord(
    scan: &mut Scan,
    one_based: bool,
    cmd: &'static str,
    line: Option<u32>,
) -> Result<Option<Coord>, ParseError> {
    scan.skip_blanks();
    let rel = match scan.peek() {
        Some('+') => {
            scan.advance();
            Rel::Plus
        }
        Some('-') => {
            scan.advance();
            Rel::Minus
        }
        Some(c) if c.is_ascii_digit() => Rel::Abs,
        _ => return Ok(None),
    };
    let digits = scan.take_digits();
    if digits.is_empty() {
        return Err(syntax(cmd, "expected a number", scan.rest(), line));
    }
    let n: i32 = digits
        .parse()
        .map_err(|_| syntax(cmd, "number out of range", digits, line))?;
    let value = match rel {
        Rel::Abs if one_based => (n - 1).max(0),
        _ => n,
    };
    Ok(Some(Coord { value, rel }))
}
