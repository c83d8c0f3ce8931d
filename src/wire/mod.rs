//! Binary codec for command chains.
//!
//! - [`size`] returns the exact byte count [`flatten`] will write.
//! - [`flatten`] encodes a chain into the shared-store wire format,
//!   refusing a chain whose frames outgrow the `u16` length field.
//! - [`inflate`] decodes, keeping whatever it read before corruption.
//!
//! Every command becomes one frame: a big-endian `u16` length covering
//! the rest of the frame, the kind discriminant, a header flag byte
//! (bit 0 = transient), then kind-specific fields. Multi-byte integers
//! are big-endian; strings are raw bytes plus a NUL, with an absent
//! optional string written as a single NUL. A reader advances by the
//! frame length, never by the fields it happens to know, so frames from
//! a newer writer with extra trailing fields still decode.

use bytes::{BufMut, BytesMut};

use crate::cmd::{
    Cmd, CmdKind, Coord, Coords, DqArgs, Goto, KeyDef, Op, Point, Proc, PromptArgs, Quote, Rel,
    Scroll, Shell, Subst, Toggle, WwArgs, Xfer, is_simple_kind,
};
use crate::error::WireError;

pub mod store;

// ===== HEADER LAYOUT =====

const HDR_TRANSIENT: u8 = 0b0000_0001;

const SHELL_C: u8 = 0b0000_0001;
const SHELL_M: u8 = 0b0000_0010;
const SHELL_E: u8 = 0b0000_0100;
const SHELL_OPTS: u8 = 0b0000_1000;

const PROC_W: u8 = 0b0000_0001;
const PROC_D: u8 = 0b0000_0010;
const PROC_S: u8 = 0b0000_0100;

const DQ_S: u8 = 0b0000_0001;
const DQ_B: u8 = 0b0000_0010;
const DQ_I: u8 = 0b0000_0100;

const WW_A: u8 = 0b0000_0001;
const WW_I: u8 = 0b0000_0010;

const XFER_R: u8 = 0b0000_0001;

const PROMPT_MULT: u8 = 0b0000_0001;
const PROMPT_KEEP: u8 = 0b0000_0010;
const PROMPT_TEMPLATE: u8 = 0b0000_0100;

fn rel_tag(rel: Rel) -> u8 {
    match rel {
        Rel::Abs => 1,
        Rel::Plus => 2,
        Rel::Minus => 3,
    }
}

fn tag_rel(tag: u8) -> Option<Rel> {
    match tag {
        1 => Some(Rel::Abs),
        2 => Some(Rel::Plus),
        3 => Some(Rel::Minus),
        _ => None,
    }
}

fn state_tag(state: Option<bool>) -> u8 {
    match state {
        None => 0,
        Some(true) => 1,
        Some(false) => 2,
    }
}

fn tag_state(tag: u8) -> Option<Option<bool>> {
    match tag {
        0 => Some(None),
        1 => Some(Some(true)),
        2 => Some(Some(false)),
        _ => None,
    }
}

// ===== SIZE =====

/// Exact number of bytes [`flatten`] writes for this chain.
pub fn size(cmds: &[Cmd]) -> usize {
    cmds.iter().map(|c| 4 + payload_size(&c.op)).sum()
}

fn string_size(s: &str) -> usize {
    s.len() + 1
}

fn opt_string_size(s: Option<&str>) -> usize {
    match s {
        Some(s) => s.len() + 1,
        None => 1,
    }
}

fn argv_size(argv: &[String]) -> usize {
    2 + argv.iter().map(|s| string_size(s)).sum::<usize>()
}

fn payload_size(op: &Op) -> usize {
    match op {
        Op::Simple(_) => 0,
        Op::Find(p) | Op::Rfind(p) | Op::Es(p) | Op::Msg(p) | Op::Pn(p) | Op::Pw(p) => {
            string_size(p)
        }
        Op::Num(_) => 5,
        Op::MarkC(_) | Op::Corner(_) | Op::MarkP(_) => 10,
        Op::Bang(sh) => {
            let opts = sh.shell_opts.as_deref().map_or(0, string_size);
            1 + opts + string_size(&sh.cmdline)
        }
        Op::S(s) | Op::So(s) => string_size(&s.from) + string_size(&s.to),
        Op::Ce(argv) | Op::Cv(argv) | Op::Cmdf(argv) => argv_size(argv),
        Op::Cp(p) | Op::Cpo(p) | Op::Cps(p) => 1 + argv_size(&p.argv),
        Op::Dq(d) => 1 + 5 + opt_string_size(d.at.as_deref()) + opt_string_size(d.name.as_deref()),
        Op::Ww(_) => 1 + 5 + 1,
        Op::Xc(x) | Op::Xd(x) | Op::Xp(x) => 1 + opt_string_size(x.file.as_deref()),
        Op::Ei(_) | Op::Ro(_) | Op::Wh(_) | Op::Wi(_) | Op::Ws(_) => 1,
        Op::Pp(_) | Op::Pv(_) | Op::Ph(_) => 4,
        Op::Kd(k) | Op::Ld(k) | Op::Alias(k) | Op::Mi(k) | Op::Lsf(k) => {
            let def = k.def.as_deref().map_or(0, string_size);
            string_size(&k.key) + 1 + def + 4
        }
        Op::Prompt(p) => {
            let template = p.template.as_deref().map_or(0, string_size);
            3 + string_size(&p.prompt) + template
        }
    }
}

// ===== FLATTEN =====

/// Encode a chain. `inflate` of the result reconstructs the chain
/// field for field.
///
/// Fails with [`WireError::Oversize`] when a frame or a prompt insert
/// offset outgrows its 16-bit wire field.
pub fn flatten(cmds: &[Cmd]) -> Result<Vec<u8>, WireError> {
    let mut buf = BytesMut::with_capacity(size(cmds));
    for cmd in cmds {
        let frame_len = 2 + payload_size(&cmd.op);
        check_frame(cmd, frame_len)?;
        buf.put_u16(frame_len as u16);
        buf.put_u8(cmd.kind() as u8);
        buf.put_u8(if cmd.transient { HDR_TRANSIENT } else { 0 });
        put_payload(&mut buf, &cmd.op);
    }
    Ok(buf.into())
}

/// The frame length and the prompt insert offset are `u16` on the wire.
fn check_frame(cmd: &Cmd, frame_len: usize) -> Result<(), WireError> {
    if frame_len > u16::MAX as usize {
        return Err(WireError::Oversize { size: frame_len });
    }
    if let Op::Prompt(p) = &cmd.op {
        if p.insert_at > u16::MAX as usize {
            return Err(WireError::Oversize { size: p.insert_at });
        }
    }
    Ok(())
}

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

fn put_opt_string(buf: &mut BytesMut, s: Option<&str>) {
    if let Some(s) = s {
        buf.put_slice(s.as_bytes());
    }
    buf.put_u8(0);
}

fn put_coord(buf: &mut BytesMut, coord: Option<Coord>) {
    match coord {
        None => {
            buf.put_u8(0);
            buf.put_i32(0);
        }
        Some(c) => {
            buf.put_u8(rel_tag(c.rel));
            buf.put_i32(c.value);
        }
    }
}

fn put_opt_i32(buf: &mut BytesMut, value: Option<i32>) {
    match value {
        None => {
            buf.put_u8(0);
            buf.put_i32(0);
        }
        Some(n) => {
            buf.put_u8(1);
            buf.put_i32(n);
        }
    }
}

fn put_argv(buf: &mut BytesMut, argv: &[String]) {
    // Every element writes at least a NUL, so the frame check already
    // bounds the count.
    buf.put_u16(argv.len() as u16);
    for arg in argv {
        put_string(buf, arg);
    }
}

fn put_payload(buf: &mut BytesMut, op: &Op) {
    match op {
        Op::Simple(_) => {}
        Op::Find(p) | Op::Rfind(p) | Op::Es(p) | Op::Msg(p) | Op::Pn(p) | Op::Pw(p) => {
            put_string(buf, p);
        }
        Op::Num(g) => {
            buf.put_u8(rel_tag(g.rel));
            buf.put_i32(g.line);
        }
        Op::MarkC(c) | Op::Corner(c) => {
            put_coord(buf, c.row);
            put_coord(buf, c.col);
        }
        Op::MarkP(p) => {
            put_coord(buf, p.x);
            put_coord(buf, p.y);
        }
        Op::Bang(sh) => {
            let mut flags = 0u8;
            if sh.c {
                flags |= SHELL_C;
            }
            if sh.m {
                flags |= SHELL_M;
            }
            if sh.e {
                flags |= SHELL_E;
            }
            if sh.shell_opts.is_some() {
                flags |= SHELL_OPTS;
            }
            buf.put_u8(flags);
            if let Some(opts) = &sh.shell_opts {
                put_string(buf, opts);
            }
            put_string(buf, &sh.cmdline);
        }
        Op::S(s) | Op::So(s) => {
            put_string(buf, &s.from);
            put_string(buf, &s.to);
        }
        Op::Ce(argv) | Op::Cv(argv) | Op::Cmdf(argv) => put_argv(buf, argv),
        Op::Cp(p) | Op::Cpo(p) | Op::Cps(p) => {
            let mut flags = 0u8;
            if p.w {
                flags |= PROC_W;
            }
            if p.d {
                flags |= PROC_D;
            }
            if p.s {
                flags |= PROC_S;
            }
            buf.put_u8(flags);
            put_argv(buf, &p.argv);
        }
        Op::Dq(d) => {
            let mut flags = 0u8;
            if d.s {
                flags |= DQ_S;
            }
            if d.b {
                flags |= DQ_B;
            }
            if d.i {
                flags |= DQ_I;
            }
            buf.put_u8(flags);
            put_opt_i32(buf, d.count);
            put_opt_string(buf, d.at.as_deref());
            put_opt_string(buf, d.name.as_deref());
        }
        Op::Ww(w) => {
            let mut flags = 0u8;
            if w.a {
                flags |= WW_A;
            }
            if w.i {
                flags |= WW_I;
            }
            buf.put_u8(flags);
            put_opt_i32(buf, w.count);
            buf.put_u8(state_tag(w.state));
        }
        Op::Xc(x) | Op::Xd(x) | Op::Xp(x) => {
            buf.put_u8(if x.r { XFER_R } else { 0 });
            put_opt_string(buf, x.file.as_deref());
        }
        Op::Ei(t) | Op::Ro(t) | Op::Wh(t) | Op::Wi(t) | Op::Ws(t) => {
            buf.put_u8(state_tag(t.state));
        }
        Op::Pp(s) | Op::Pv(s) | Op::Ph(s) => buf.put_i32(s.delta),
        Op::Kd(k) | Op::Ld(k) | Op::Alias(k) | Op::Mi(k) | Op::Lsf(k) => {
            put_string(buf, &k.key);
            // Query (no definition) and an empty definition differ, so
            // the definition carries its own presence byte.
            match &k.def {
                None => buf.put_u8(0),
                Some(d) => {
                    buf.put_u8(1);
                    put_string(buf, d);
                }
            }
            buf.put_u32(k.line.unwrap_or(0));
        }
        Op::Prompt(p) => {
            let mut flags = 0u8;
            if p.mult {
                flags |= PROMPT_MULT;
            }
            if p.quote == Quote::Keep {
                flags |= PROMPT_KEEP;
            }
            if p.template.is_some() {
                flags |= PROMPT_TEMPLATE;
            }
            buf.put_u8(flags);
            buf.put_u16(p.insert_at as u16);
            put_string(buf, &p.prompt);
            if let Some(t) = &p.template {
                put_string(buf, t);
            }
        }
    }
}

// ===== INFLATE =====

/// Result of decoding a flattened buffer.
///
/// `cmds` holds everything decoded before the first problem; `error`
/// is `None` for a clean decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub cmds: Vec<Cmd>,
    pub error: Option<WireError>,
}

/// Decode a flattened buffer back into a chain.
///
/// Frames of recognized-but-unsupported kinds are skipped. A zero or
/// overlong length, an unknown discriminant, or a field running past
/// its frame stops the decode; everything already decoded stays.
pub fn inflate(buf: &[u8]) -> Decoded {
    let mut cmds = Vec::new();
    let mut offset = 0usize;
    while offset < buf.len() {
        match inflate_frame(buf, offset) {
            Ok((cmd, next)) => {
                if let Some(cmd) = cmd {
                    cmds.push(cmd);
                }
                offset = next;
            }
            Err(err) => {
                log::warn!("command decode stopped: {err}");
                return Decoded {
                    cmds,
                    error: Some(err),
                };
            }
        }
    }
    Decoded { cmds, error: None }
}

/// One frame at `offset`. `Ok((None, next))` is a skipped frame.
fn inflate_frame(buf: &[u8], offset: usize) -> Result<(Option<Cmd>, usize), WireError> {
    if buf.len() - offset < 2 {
        return Err(WireError::Truncated { offset });
    }
    let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
    let body = len as usize;
    if len == 0 || body > buf.len() - offset - 2 {
        return Err(WireError::BadLength { offset, len });
    }
    let frame = &buf[offset + 2..offset + 2 + body];
    let next = offset + 2 + body;

    let mut r = FrameReader::new(frame, offset + 2);
    let code = r.u8()?;
    let Some(kind) = CmdKind::from_u8(code) else {
        return Err(WireError::BadKind {
            offset: offset + 2,
            code,
        });
    };
    let flags = r.u8()?;

    if !kind.is_supported() {
        log::warn!("skipping stored {kind} command (not supported)");
        return Ok((None, next));
    }

    let op = decode_op(kind, &mut r)?;
    let cmd = Cmd {
        op,
        transient: flags & HDR_TRANSIENT != 0,
    };
    // Anything after the known fields came from a newer writer.
    Ok((Some(cmd), next))
}

fn decode_op(kind: CmdKind, r: &mut FrameReader) -> Result<Op, WireError> {
    let op = match kind {
        CmdKind::Find => Op::Find(r.string()?),
        CmdKind::Rfind => Op::Rfind(r.string()?),
        CmdKind::Num => Op::Num(Goto {
            rel: r.rel()?,
            line: r.i32()?,
        }),
        CmdKind::MarkC => Op::MarkC(Coords {
            row: r.coord()?,
            col: r.coord()?,
        }),
        CmdKind::Corner => Op::Corner(Coords {
            row: r.coord()?,
            col: r.coord()?,
        }),
        CmdKind::MarkP => Op::MarkP(Point {
            x: r.coord()?,
            y: r.coord()?,
        }),
        CmdKind::Bang => {
            let flags = r.u8()?;
            let shell_opts = if flags & SHELL_OPTS != 0 {
                Some(r.string()?)
            } else {
                None
            };
            Op::Bang(Shell {
                c: flags & SHELL_C != 0,
                m: flags & SHELL_M != 0,
                e: flags & SHELL_E != 0,
                shell_opts,
                cmdline: r.string()?,
            })
        }
        CmdKind::Es => Op::Es(r.string()?),
        CmdKind::Msg => Op::Msg(r.string()?),
        CmdKind::S => Op::S(Subst {
            from: r.string()?,
            to: r.string()?,
        }),
        CmdKind::So => Op::So(Subst {
            from: r.string()?,
            to: r.string()?,
        }),
        CmdKind::Ce => Op::Ce(r.argv()?),
        CmdKind::Cv => Op::Cv(r.argv()?),
        CmdKind::Cmdf => Op::Cmdf(r.argv()?),
        CmdKind::Cp | CmdKind::Cpo | CmdKind::Cps => {
            let flags = r.u8()?;
            let proc = Proc {
                w: flags & PROC_W != 0,
                d: flags & PROC_D != 0,
                s: flags & PROC_S != 0,
                argv: r.argv()?,
            };
            match kind {
                CmdKind::Cp => Op::Cp(proc),
                CmdKind::Cpo => Op::Cpo(proc),
                _ => Op::Cps(proc),
            }
        }
        CmdKind::Dq => {
            let flags = r.u8()?;
            Op::Dq(DqArgs {
                s: flags & DQ_S != 0,
                b: flags & DQ_B != 0,
                i: flags & DQ_I != 0,
                count: r.opt_i32()?,
                at: r.opt_string()?,
                name: r.opt_string()?,
            })
        }
        CmdKind::Ww => {
            let flags = r.u8()?;
            Op::Ww(WwArgs {
                a: flags & WW_A != 0,
                i: flags & WW_I != 0,
                count: r.opt_i32()?,
                state: r.state()?,
            })
        }
        CmdKind::Xc | CmdKind::Xd | CmdKind::Xp => {
            let flags = r.u8()?;
            let xfer = Xfer {
                r: flags & XFER_R != 0,
                file: r.opt_string()?,
            };
            match kind {
                CmdKind::Xc => Op::Xc(xfer),
                CmdKind::Xd => Op::Xd(xfer),
                _ => Op::Xp(xfer),
            }
        }
        CmdKind::Ei => Op::Ei(Toggle { state: r.state()? }),
        CmdKind::Ro => Op::Ro(Toggle { state: r.state()? }),
        CmdKind::Wh => Op::Wh(Toggle { state: r.state()? }),
        CmdKind::Wi => Op::Wi(Toggle { state: r.state()? }),
        CmdKind::Ws => Op::Ws(Toggle { state: r.state()? }),
        CmdKind::Pp => Op::Pp(Scroll { delta: r.i32()? }),
        CmdKind::Pv => Op::Pv(Scroll { delta: r.i32()? }),
        CmdKind::Ph => Op::Ph(Scroll { delta: r.i32()? }),
        CmdKind::Pn => Op::Pn(r.string()?),
        CmdKind::Pw => Op::Pw(r.string()?),
        CmdKind::Kd | CmdKind::Ld | CmdKind::Alias | CmdKind::Mi | CmdKind::Lsf => {
            let key = r.string()?;
            let def = match r.u8()? {
                0 => None,
                _ => Some(r.string()?),
            };
            let line = match r.u32()? {
                0 => None,
                n => Some(n),
            };
            let kd = KeyDef { key, def, line };
            match kind {
                CmdKind::Kd => Op::Kd(kd),
                CmdKind::Ld => Op::Ld(kd),
                CmdKind::Alias => Op::Alias(kd),
                CmdKind::Mi => Op::Mi(kd),
                _ => Op::Lsf(kd),
            }
        }
        CmdKind::Prompt => {
            let flags = r.u8()?;
            let insert_at = r.u16()? as usize;
            let prompt = r.string()?;
            let template = if flags & PROMPT_TEMPLATE != 0 {
                Some(r.string()?)
            } else {
                None
            };
            Op::Prompt(PromptArgs {
                prompt,
                insert_at,
                mult: flags & PROMPT_MULT != 0,
                quote: if flags & PROMPT_KEEP != 0 {
                    Quote::Keep
                } else {
                    Quote::Trim
                },
                template,
            })
        }
        k if is_simple_kind(k) => Op::Simple(k),
        k => {
            // Unsupported kinds are skipped before payload decode.
            return Err(WireError::BadKind {
                offset: r.frame_start,
                code: k as u8,
            });
        }
    };
    Ok(op)
}

// ===== FRAME READER =====

/// Bounds-checked cursor over one frame's bytes.
struct FrameReader<'a> {
    frame: &'a [u8],
    pos: usize,
    /// Absolute offset of the frame body, for diagnostics.
    frame_start: usize,
}

impl<'a> FrameReader<'a> {
    fn new(frame: &'a [u8], frame_start: usize) -> Self {
        FrameReader {
            frame,
            pos: 0,
            frame_start,
        }
    }

    fn truncated(&self) -> WireError {
        WireError::Truncated {
            offset: self.frame_start,
        }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.frame.len() - self.pos < n {
            return Err(self.truncated());
        }
        let out = &self.frame[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, WireError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32, WireError> {
        let b = self.bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// NUL-terminated string; decoding is lossy on non-UTF-8 bytes.
    fn string(&mut self) -> Result<String, WireError> {
        let rest = &self.frame[self.pos..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(self.truncated());
        };
        let s = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos += nul + 1;
        Ok(s)
    }

    /// An empty string on the wire means "absent".
    fn opt_string(&mut self) -> Result<Option<String>, WireError> {
        let s = self.string()?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }

    fn rel(&mut self) -> Result<Rel, WireError> {
        tag_rel(self.u8()?).ok_or_else(|| self.truncated())
    }

    fn coord(&mut self) -> Result<Option<Coord>, WireError> {
        let tag = self.u8()?;
        let value = self.i32()?;
        match tag {
            0 => Ok(None),
            t => match tag_rel(t) {
                Some(rel) => Ok(Some(Coord { value, rel })),
                None => Err(self.truncated()),
            },
        }
    }

    fn opt_i32(&mut self) -> Result<Option<i32>, WireError> {
        let tag = self.u8()?;
        let value = self.i32()?;
        Ok(match tag {
            0 => None,
            _ => Some(value),
        })
    }

    fn state(&mut self) -> Result<Option<bool>, WireError> {
        tag_state(self.u8()?).ok_or_else(|| self.truncated())
    }

    fn argv(&mut self) -> Result<Vec<String>, WireError> {
        let count = self.u16()? as usize;
        let mut argv = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            argv.push(self.string()?);
        }
        Ok(argv)
    }
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SilentReporter;
    use crate::parse::{DEFAULT_ESCAPE, NoAliases, Parser};

    fn parse(text: &str) -> Vec<Cmd> {
        Parser::new(&NoAliases, &SilentReporter, DEFAULT_ESCAPE)
            .parse_line(text, true, None)
            .unwrap()
    }

    fn round_trip(cmds: &[Cmd]) {
        let bytes = flatten(cmds).unwrap();
        assert_eq!(bytes.len(), size(cmds));
        let decoded = inflate(&bytes);
        assert_eq!(decoded.error, None);
        assert_eq!(decoded.cmds, cmds);
    }

    #[test]
    fn test_round_trip_every_class() {
        let lines = [
            "/needle/",
            "\\back\\",
            "s/from/to/",
            "so/x/y/",
            "5",
            "+3",
            "-12",
            "[2,+3]",
            "{1,1}",
            "(10,20)",
            "[,]",
            "=",
            "$",
            ":",
            "5,$",
            "!-c -m -e -s'x y' make all",
            "!ls",
            "es'hello world'",
            "msg'note'",
            "ce 'a b' c",
            "cv",
            "cmdf script.dm arg",
            "cp prog a b",
            "cpo -w -d prog",
            "cps -s prog",
            "dq -s -b -i -c 3 -a FF name",
            "dq",
            "ww -a -i -c 2 -off",
            "ww",
            "xc -r -f buf1",
            "xd",
            "xp -f paste",
            "ei -on",
            "ro -off",
            "wh",
            "wi -on",
            "ws",
            "pp -2",
            "pv 4",
            "ph 1",
            "pn scratch",
            "pw out.txt",
            "tt; tb; tl; tr; th; ti; tn; tdm",
            "au; ad; al; ar",
            "pt; pb; wp; wg; wc; dr; gm; ab; undo",
            "kd f1 es 'hi' ke",
            "kd f2 ke",
            "kd f3",
            "ld k1 tt ke",
            "alias foo tt ke",
            "mi m1 ad ke",
            "lsf s1 pp ke",
        ];
        for line in lines {
            round_trip(&parse(line));
        }
    }

    #[test]
    fn test_round_trip_prompt_run() {
        let parser = Parser::new(&NoAliases, &SilentReporter, DEFAULT_ESCAPE);
        let chain = parser.parse_body("cmdf &'File:' &`Mode:`", false, None).unwrap();
        round_trip(&chain);
    }

    #[test]
    fn test_round_trip_keeps_transient_flag() {
        let parser = Parser::new(&NoAliases, &SilentReporter, DEFAULT_ESCAPE);
        let stored = parser.parse_line("tt", false, None).unwrap();
        let typed = parser.parse_line("tt", true, None).unwrap();
        assert!(!inflate(&flatten(&stored).unwrap()).cmds[0].transient);
        assert!(inflate(&flatten(&typed).unwrap()).cmds[0].transient);
    }

    #[test]
    fn test_keydef_line_number_survives() {
        let parser = Parser::new(&NoAliases, &SilentReporter, DEFAULT_ESCAPE);
        let cmds = parser.parse_line("kd f1 tt ke", false, Some(7)).unwrap();
        let decoded = inflate(&flatten(&cmds).unwrap());
        match &decoded.cmds[0].op {
            Op::Kd(kd) => assert_eq!(kd.line, Some(7)),
            other => panic!("expected kd, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_buffer() {
        let decoded = inflate(&[]);
        assert!(decoded.cmds.is_empty());
        assert_eq!(decoded.error, None);
    }

    #[test]
    fn test_zero_length_aborts_keeping_partials() {
        let mut bytes = flatten(&parse("tt")).unwrap();
        bytes.extend_from_slice(&[0, 0]);
        let decoded = inflate(&bytes);
        assert_eq!(decoded.cmds.len(), 1);
        assert!(matches!(
            decoded.error,
            Some(WireError::BadLength { len: 0, .. })
        ));
    }

    #[test]
    fn test_overlong_length_aborts() {
        let decoded = inflate(&[0, 50, 1, 0]);
        assert!(decoded.cmds.is_empty());
        assert!(matches!(
            decoded.error,
            Some(WireError::BadLength { len: 50, .. })
        ));
    }

    #[test]
    fn test_unknown_kind_aborts() {
        let decoded = inflate(&[0, 2, 200, 0]);
        assert!(matches!(
            decoded.error,
            Some(WireError::BadKind { code: 200, .. })
        ));
    }

    #[test]
    fn test_unsupported_kind_is_skipped() {
        let mut bytes = vec![0, 2, CmdKind::Mono as u8, 0];
        bytes.extend_from_slice(&flatten(&parse("tt")).unwrap());
        let decoded = inflate(&bytes);
        assert_eq!(decoded.error, None);
        assert_eq!(decoded.cmds.len(), 1);
        assert_eq!(decoded.cmds[0].kind(), CmdKind::Tt);
    }

    #[test]
    fn test_unknown_trailing_fields_are_ignored() {
        let cmds = parse("ei -on");
        let mut bytes = flatten(&cmds).unwrap();
        // A newer writer appended a field this build does not know.
        bytes.extend_from_slice(&[9, 9, 9]);
        let grown = (u16::from_be_bytes([bytes[0], bytes[1]]) + 3).to_be_bytes();
        bytes[0] = grown[0];
        bytes[1] = grown[1];
        let decoded = inflate(&bytes);
        assert_eq!(decoded.error, None);
        assert_eq!(decoded.cmds, cmds);
    }

    #[test]
    fn test_truncated_string_field() {
        // find frame whose pattern lost its NUL.
        let bytes = [0, 4, CmdKind::Find as u8, 0, b'a', b'b'];
        let decoded = inflate(&bytes);
        assert!(matches!(decoded.error, Some(WireError::Truncated { .. })));
    }

    #[test]
    fn test_size_is_exact_not_just_upper_bound() {
        let chain = parse("kd f1 es 'hi' ke; s/a/b/; ce x y; [2,3]");
        assert_eq!(size(&chain), flatten(&chain).unwrap().len());
        assert_eq!(size(&[]), 0);
        assert_eq!(flatten(&[]), Ok(Vec::new()));
    }

    #[test]
    fn test_oversize_frame_is_refused() {
        // Largest es payload whose frame still fits the length field.
        let widest = parse(&format!("es'{}'", "x".repeat(u16::MAX as usize - 3)));
        assert_eq!(flatten(&widest).unwrap().len(), size(&widest));

        let over = parse(&format!("es'{}'", "x".repeat(70_000)));
        assert_eq!(flatten(&over), Err(WireError::Oversize { size: 70_003 }));
    }

    #[test]
    fn test_oversize_prompt_offset_is_refused() {
        let cmd = Cmd::new(Op::Prompt(PromptArgs {
            prompt: "File:".to_string(),
            insert_at: 70_000,
            mult: false,
            quote: Quote::Trim,
            template: None,
        }));
        assert_eq!(flatten(&[cmd]), Err(WireError::Oversize { size: 70_000 }));
    }
}
