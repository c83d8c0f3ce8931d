//! The parsed command model.
//!
//! A command line parses into a chain of [`Cmd`] nodes (`Vec<Cmd>`); each
//! node is one statement. [`Op`] carries the per-kind payload, [`CmdKind`]
//! is the flat discriminant shared with the wire codec. Payloads own their
//! strings, so dropping a chain frees everything it reaches.

use std::fmt;

pub mod kind;

pub use kind::CmdKind;

// =============================================================================
// PAYLOADS
// =============================================================================

/// Whether a numeric value is absolute or an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rel {
    Abs,
    Plus,
    Minus,
}

/// Line-number command payload. Absolute lines are stored zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Goto {
    pub line: i32,
    pub rel: Rel,
}

/// One coordinate of a mark: magnitude plus relativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coord {
    pub value: i32,
    pub rel: Rel,
}

impl Coord {
    pub fn abs(value: i32) -> Self {
        Coord {
            value,
            rel: Rel::Abs,
        }
    }
}

/// Buffer mark `[row,col]` or window corner `{row,col}`. A `None`
/// coordinate means "leave unchanged". Absolute values are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coords {
    pub row: Option<Coord>,
    pub col: Option<Coord>,
}

/// Root-window point `(x,y)`, stored as typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: Option<Coord>,
    pub y: Option<Coord>,
}

/// Substitute payload for `s` and `so`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subst {
    pub from: String,
    pub to: String,
}

/// Shell escape `!`: option letters plus the raw command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Shell {
    pub c: bool,
    pub m: bool,
    pub e: bool,
    pub shell_opts: Option<String>,
    pub cmdline: String,
}

/// Process creation (`cp`/`cpo`/`cps`): option letters plus argv.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Proc {
    pub w: bool,
    pub d: bool,
    pub s: bool,
    pub argv: Vec<String>,
}

/// `dq` payload: options passed through to the session manager.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DqArgs {
    pub s: bool,
    pub b: bool,
    pub i: bool,
    pub count: Option<i32>,
    pub at: Option<String>,
    pub name: Option<String>,
}

/// `ww` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WwArgs {
    pub a: bool,
    pub i: bool,
    pub count: Option<i32>,
    pub state: Option<bool>,
}

/// Cut/delete/paste payload (`xc`/`xd`/`xp`): optional paste-buffer file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Xfer {
    pub file: Option<String>,
    pub r: bool,
}

/// Mode toggle: `-on`, `-off`, or flip when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Toggle {
    pub state: Option<bool>,
}

/// Scroll payload (`pp`/`pv`/`ph`); signed, defaults to one page forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scroll {
    pub delta: i32,
}

impl Default for Scroll {
    fn default() -> Self {
        Scroll { delta: 1 }
    }
}

/// Key definition (`kd`/`ld`/`alias`/`mi`/`lsf`).
///
/// `def` is `None` for the query form (`kd f1`), `Some("")` for an
/// explicit empty binding (`kd f1 ke`), and the verbatim body text
/// otherwise. `line` is the 1-based source line when the definition came
/// from a command file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDef {
    pub key: String,
    pub def: Option<String>,
    pub line: Option<u32>,
}

/// Which quote introduced a prompt string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    /// `'…'`: leading blanks are trimmed from the response.
    Trim,
    /// Backquoted: the response is taken verbatim.
    Keep,
}

impl Quote {
    pub fn char(self) -> char {
        match self {
            Quote::Trim => '\'',
            Quote::Keep => '`',
        }
    }
}

/// One `&` marker found by the prompt prescan.
///
/// `insert_at` is the byte offset of the marker inside the rewritten
/// definition text; the rewritten text itself (the substitution template)
/// is owned by the last prompt of a run, earlier nodes carry `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptArgs {
    pub prompt: String,
    pub insert_at: usize,
    /// Set on every prompt of a run except the first.
    pub mult: bool,
    pub quote: Quote,
    pub template: Option<String>,
}

// =============================================================================
// COMMAND NODES
// =============================================================================

/// Per-kind payload of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Commands that carry no payload (`=`, `$`, `,`, `:`, and the
    /// no-argument alphabetic commands).
    Simple(CmdKind),
    Find(String),
    Rfind(String),
    Num(Goto),
    MarkC(Coords),
    Corner(Coords),
    MarkP(Point),
    Bang(Shell),
    Es(String),
    Msg(String),
    S(Subst),
    So(Subst),
    Ce(Vec<String>),
    Cv(Vec<String>),
    Cmdf(Vec<String>),
    Cp(Proc),
    Cpo(Proc),
    Cps(Proc),
    Dq(DqArgs),
    Ww(WwArgs),
    Xc(Xfer),
    Xd(Xfer),
    Xp(Xfer),
    Ei(Toggle),
    Ro(Toggle),
    Wh(Toggle),
    Wi(Toggle),
    Ws(Toggle),
    Pp(Scroll),
    Pv(Scroll),
    Ph(Scroll),
    Pn(String),
    Pw(String),
    Kd(KeyDef),
    Ld(KeyDef),
    Alias(KeyDef),
    Mi(KeyDef),
    Lsf(KeyDef),
    Prompt(PromptArgs),
}

/// One parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Cmd {
    pub op: Op,
    /// One-shot commands (typed lines, substituted prompt output) rather
    /// than stored definitions.
    pub transient: bool,
}

impl Cmd {
    pub fn new(op: Op) -> Self {
        Cmd {
            op,
            transient: false,
        }
    }

    pub fn transient(op: Op) -> Self {
        Cmd {
            op,
            transient: true,
        }
    }

    pub fn simple(kind: CmdKind) -> Self {
        Cmd::new(Op::Simple(kind))
    }

    /// The wire discriminant of this node.
    pub fn kind(&self) -> CmdKind {
        match &self.op {
            Op::Simple(k) => *k,
            Op::Find(_) => CmdKind::Find,
            Op::Rfind(_) => CmdKind::Rfind,
            Op::Num(_) => CmdKind::Num,
            Op::MarkC(_) => CmdKind::MarkC,
            Op::Corner(_) => CmdKind::Corner,
            Op::MarkP(_) => CmdKind::MarkP,
            Op::Bang(_) => CmdKind::Bang,
            Op::Es(_) => CmdKind::Es,
            Op::Msg(_) => CmdKind::Msg,
            Op::S(_) => CmdKind::S,
            Op::So(_) => CmdKind::So,
            Op::Ce(_) => CmdKind::Ce,
            Op::Cv(_) => CmdKind::Cv,
            Op::Cmdf(_) => CmdKind::Cmdf,
            Op::Cp(_) => CmdKind::Cp,
            Op::Cpo(_) => CmdKind::Cpo,
            Op::Cps(_) => CmdKind::Cps,
            Op::Dq(_) => CmdKind::Dq,
            Op::Ww(_) => CmdKind::Ww,
            Op::Xc(_) => CmdKind::Xc,
            Op::Xd(_) => CmdKind::Xd,
            Op::Xp(_) => CmdKind::Xp,
            Op::Ei(_) => CmdKind::Ei,
            Op::Ro(_) => CmdKind::Ro,
            Op::Wh(_) => CmdKind::Wh,
            Op::Wi(_) => CmdKind::Wi,
            Op::Ws(_) => CmdKind::Ws,
            Op::Pp(_) => CmdKind::Pp,
            Op::Pv(_) => CmdKind::Pv,
            Op::Ph(_) => CmdKind::Ph,
            Op::Pn(_) => CmdKind::Pn,
            Op::Pw(_) => CmdKind::Pw,
            Op::Kd(_) => CmdKind::Kd,
            Op::Ld(_) => CmdKind::Ld,
            Op::Alias(_) => CmdKind::Alias,
            Op::Mi(_) => CmdKind::Mi,
            Op::Lsf(_) => CmdKind::Lsf,
            Op::Prompt(_) => CmdKind::Prompt,
        }
    }

    /// Textual form that re-parses to this command.
    pub fn render(&self, escape: char) -> String {
        render_cmd(self, escape)
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(crate::parse::DEFAULT_ESCAPE))
    }
}

/// True for kinds whose payload is `Op::Simple`.
pub(crate) fn is_simple_kind(kind: CmdKind) -> bool {
    matches!(
        kind,
        CmdKind::Equal
            | CmdKind::Bottom
            | CmdKind::Comma
            | CmdKind::Null
            | CmdKind::Au
            | CmdKind::Ad
            | CmdKind::Al
            | CmdKind::Ar
            | CmdKind::Tt
            | CmdKind::Tb
            | CmdKind::Tl
            | CmdKind::Tr
            | CmdKind::Th
            | CmdKind::Ti
            | CmdKind::Tn
            | CmdKind::Tdm
            | CmdKind::Pt
            | CmdKind::Pb
            | CmdKind::Wp
            | CmdKind::Wg
            | CmdKind::Wc
            | CmdKind::Dr
            | CmdKind::Gm
            | CmdKind::Ab
            | CmdKind::Undo
    )
}

// =============================================================================
// RENDERING
// =============================================================================

/// Render a whole chain as one command line, `;`-separated.
///
/// A chain that begins with a prompt run is rendered back to its `&`
/// marker form from the template, so `parse_body` reproduces the chain.
pub fn render_chain(cmds: &[Cmd], escape: char) -> String {
    let mut out = String::new();
    let mut i = 0;

    if matches!(cmds.first(), Some(c) if matches!(c.op, Op::Prompt(_))) {
        let run_len = cmds
            .iter()
            .take_while(|c| matches!(c.op, Op::Prompt(_)))
            .count();
        out.push_str(&render_prompt_run(&cmds[..run_len]));
        i = run_len;
    }

    for cmd in &cmds[i..] {
        if !out.is_empty() {
            out.push(';');
        }
        out.push_str(&cmd.render(escape));
    }
    out
}

// Prompt strings end at their own quote char during prescan, so the
// re-quoting here needs no escaping.
fn render_prompt_run(run: &[Cmd]) -> String {
    let prompts: Vec<&PromptArgs> = run
        .iter()
        .filter_map(|c| match &c.op {
            Op::Prompt(p) => Some(p),
            _ => None,
        })
        .collect();
    let template = match prompts.last().and_then(|p| p.template.as_deref()) {
        Some(t) => t,
        // A detached prompt node; render its marker alone.
        None => {
            let mut out = String::new();
            for p in &prompts {
                out.push('&');
                out.push(p.quote.char());
                out.push_str(&p.prompt);
                out.push(p.quote.char());
            }
            return out;
        }
    };

    // Re-insert each quoted prompt string after its marker. Offsets
    // from a decoded chain may not fit the template; such markers render
    // without their leading text.
    let mut out = String::new();
    let mut cursor = 0;
    for p in &prompts {
        if let Some(lead) = template.get(cursor..=p.insert_at) {
            out.push_str(lead);
            cursor = p.insert_at + 1;
        }
        if !p.prompt.is_empty() {
            out.push(p.quote.char());
            out.push_str(&p.prompt);
            out.push(p.quote.char());
        }
    }
    out.push_str(template.get(cursor..).unwrap_or_default());
    out
}

/// Search commands must open with their own character, so embedded
/// delimiters are escaped rather than swapped out.
fn find_text(delim: char, pattern: &str, escape: char) -> String {
    let mut out = String::new();
    out.push(delim);
    for c in pattern.chars() {
        if c == delim {
            out.push(escape);
        }
        out.push(c);
    }
    out.push(delim);
    out
}

const DELIM_CANDIDATES: [char; 8] = ['/', '\'', '"', '|', '%', '~', '^', '.'];

fn pick_delim(parts: &[&str], escape: char) -> char {
    DELIM_CANDIDATES
        .iter()
        .copied()
        .find(|&d| d != escape && parts.iter().all(|p| !p.contains(d)))
        .unwrap_or('/')
}

fn delimited(name: &str, parts: &[&str], escape: char) -> String {
    let d = pick_delim(parts, escape);
    let mut out = String::from(name);
    for p in parts {
        out.push(d);
        out.push_str(p);
    }
    out.push(d);
    out
}

/// Quote an argv token when it would not survive re-tokenizing bare.
fn quote_token(tok: &str, escape: char) -> String {
    let needs = tok.is_empty()
        || tok.starts_with('-')
        || tok
            .chars()
            .any(|c| matches!(c, ' ' | '\t' | ';' | '#' | '\'' | '"') || c == escape);
    if !needs {
        return tok.to_string();
    }
    let q = if tok.contains('\'') { '"' } else { '\'' };
    let mut out = String::new();
    out.push(q);
    for c in tok.chars() {
        if c == q || c == escape {
            out.push(escape);
        }
        out.push(c);
    }
    out.push(q);
    out
}

fn push_argv(out: &mut String, argv: &[String], escape: char) {
    for tok in argv {
        out.push(' ');
        out.push_str(&quote_token(tok, escape));
    }
}

fn coord_text(coord: Option<Coord>, one_based: bool) -> String {
    match coord {
        None => String::new(),
        Some(c) => match c.rel {
            Rel::Abs => {
                let shown = if one_based { c.value + 1 } else { c.value };
                shown.to_string()
            }
            Rel::Plus => format!("+{}", c.value),
            Rel::Minus => format!("-{}", c.value),
        },
    }
}

fn toggle_text(name: &str, t: Toggle) -> String {
    match t.state {
        Some(true) => format!("{name} -on"),
        Some(false) => format!("{name} -off"),
        None => name.to_string(),
    }
}

/// Re-escape `ke;` sequences inside a stored definition so the
/// sub-scanner keeps scanning past them on re-parse. Quoted text is
/// copied untouched, matching the sub-scanner's quote tracking.
fn escape_ke(def: &str, escape: char) -> String {
    let chars: Vec<char> = def.chars().collect();
    let mut out = String::with_capacity(def.len() + 4);
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == escape && i + 1 < chars.len() {
            out.push(c);
            out.push(chars[i + 1]);
            prev = Some(chars[i + 1]);
            i += 2;
            continue;
        }
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                } else if c == 'k'
                    && chars.get(i + 1) == Some(&'e')
                    && chars.get(i + 2) == Some(&';')
                    && prev.is_none_or(|p| !(p.is_alphanumeric() || p == '_'))
                {
                    out.push_str("ke");
                    out.push(escape);
                    out.push(';');
                    prev = Some(';');
                    i += 3;
                    continue;
                }
            }
        }
        out.push(c);
        prev = Some(c);
        i += 1;
    }
    out
}

fn keydef_text(name: &str, kd: &KeyDef, escape: char) -> String {
    match &kd.def {
        None => format!("{name} {}", kd.key),
        Some(d) if d.is_empty() => format!("{name} {} ke", kd.key),
        Some(d) => format!("{name} {} {} ke", kd.key, escape_ke(d, escape)),
    }
}

fn render_cmd(cmd: &Cmd, escape: char) -> String {
    match &cmd.op {
        Op::Simple(k) => match k {
            CmdKind::Equal => "=".to_string(),
            CmdKind::Bottom => "$".to_string(),
            CmdKind::Comma => ",".to_string(),
            CmdKind::Null => ":".to_string(),
            k => k.name().to_string(),
        },
        Op::Find(p) => find_text('/', p, escape),
        Op::Rfind(p) => find_text('\\', p, escape),
        Op::Num(g) => match g.rel {
            Rel::Abs => (g.line + 1).to_string(),
            Rel::Plus => format!("+{}", g.line),
            Rel::Minus => format!("-{}", g.line),
        },
        Op::MarkC(c) => format!(
            "[{},{}]",
            coord_text(c.row, true),
            coord_text(c.col, true)
        ),
        Op::Corner(c) => format!(
            "{{{},{}}}",
            coord_text(c.row, true),
            coord_text(c.col, true)
        ),
        Op::MarkP(p) => format!(
            "({},{})",
            coord_text(p.x, false),
            coord_text(p.y, false)
        ),
        Op::Bang(sh) => {
            let mut out = String::from("!");
            if sh.c {
                out.push_str("-c ");
            }
            if sh.m {
                out.push_str("-m ");
            }
            if sh.e {
                out.push_str("-e ");
            }
            if let Some(opts) = &sh.shell_opts {
                out.push_str("-s");
                out.push_str(&quote_token(opts, escape));
                out.push(' ');
            }
            out.push_str(&sh.cmdline);
            out
        }
        Op::Es(t) => delimited("es", &[t.as_str()], escape),
        Op::Msg(t) => delimited("msg", &[t.as_str()], escape),
        Op::S(s) => delimited("s", &[s.from.as_str(), s.to.as_str()], escape),
        Op::So(s) => delimited("so", &[s.from.as_str(), s.to.as_str()], escape),
        Op::Ce(argv) | Op::Cv(argv) | Op::Cmdf(argv) => {
            let mut out = cmd.kind().name().to_string();
            push_argv(&mut out, argv, escape);
            out
        }
        Op::Cp(p) | Op::Cpo(p) | Op::Cps(p) => {
            let mut out = cmd.kind().name().to_string();
            if p.w {
                out.push_str(" -w");
            }
            if p.d {
                out.push_str(" -d");
            }
            if p.s {
                out.push_str(" -s");
            }
            push_argv(&mut out, &p.argv, escape);
            out
        }
        Op::Dq(d) => {
            let mut out = String::from("dq");
            if d.s {
                out.push_str(" -s");
            }
            if d.b {
                out.push_str(" -b");
            }
            if d.i {
                out.push_str(" -i");
            }
            if let Some(n) = d.count {
                out.push_str(&format!(" -c {n}"));
            }
            if let Some(at) = &d.at {
                out.push_str(" -a ");
                out.push_str(&quote_token(at, escape));
            }
            if let Some(name) = &d.name {
                out.push(' ');
                out.push_str(&quote_token(name, escape));
            }
            out
        }
        Op::Ww(w) => {
            let mut out = String::from("ww");
            if w.a {
                out.push_str(" -a");
            }
            if w.i {
                out.push_str(" -i");
            }
            if let Some(n) = w.count {
                out.push_str(&format!(" -c {n}"));
            }
            match w.state {
                Some(true) => out.push_str(" -on"),
                Some(false) => out.push_str(" -off"),
                None => {}
            }
            out
        }
        Op::Xc(x) | Op::Xd(x) | Op::Xp(x) => {
            let mut out = cmd.kind().name().to_string();
            if x.r {
                out.push_str(" -r");
            }
            if let Some(file) = &x.file {
                out.push_str(" -f ");
                out.push_str(&quote_token(file, escape));
            }
            out
        }
        Op::Ei(t) | Op::Ro(t) | Op::Wh(t) | Op::Wi(t) | Op::Ws(t) => {
            toggle_text(cmd.kind().name(), *t)
        }
        Op::Pp(s) | Op::Pv(s) | Op::Ph(s) => {
            format!("{} {}", cmd.kind().name(), s.delta)
        }
        Op::Pn(n) | Op::Pw(n) => {
            format!("{} {}", cmd.kind().name(), quote_token(n, escape))
        }
        Op::Kd(k) | Op::Ld(k) | Op::Alias(k) | Op::Mi(k) | Op::Lsf(k) => {
            keydef_text(cmd.kind().name(), k, escape)
        }
        Op::Prompt(p) => {
            let mut out = String::from("&");
            if !p.prompt.is_empty() {
                out.push(p.quote.char());
                out.push_str(&p.prompt);
                out.push(p.quote.char());
            }
            out
        }
    }
}
