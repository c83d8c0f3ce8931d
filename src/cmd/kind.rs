//! Command kinds: the wire discriminants and the name table.
//!
//! Every command the language knows has exactly one [`CmdKind`] value.
//! The numeric value doubles as the wire discriminant, so the order below
//! is frozen; new kinds are appended, never inserted.

use std::fmt;

/// Discriminant for every command the language knows.
///
/// Values 1..=63 are supported; the tail of the enum names commands this
/// build recognizes but does not execute (reported and skipped at parse
/// time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CmdKind {
    // Single-character and numeric forms.
    Find = 1,
    Rfind,
    Num,
    MarkC,
    Corner,
    MarkP,
    Equal,
    Bottom,
    Comma,
    Null,
    Bang,
    // Delimiter-bounded text.
    Es,
    Msg,
    S,
    So,
    // Argument vectors.
    Ce,
    Cv,
    Cmdf,
    // Process creation.
    Cp,
    Cpo,
    Cps,
    // Flag grammars.
    Dq,
    Ww,
    Xc,
    Xd,
    Xp,
    // Toggles.
    Ei,
    Ro,
    Wh,
    Wi,
    Ws,
    // Scroll counts.
    Pp,
    Pv,
    Ph,
    // Single string argument.
    Pn,
    Pw,
    // No arguments.
    Au,
    Ad,
    Al,
    Ar,
    Tt,
    Tb,
    Tl,
    Tr,
    Th,
    Ti,
    Tn,
    Tdm,
    Pt,
    Pb,
    Wp,
    Wg,
    Wc,
    Dr,
    Gm,
    Ab,
    Undo,
    // Key definitions.
    Kd,
    Ld,
    Alias,
    Mi,
    Lsf,
    // Built by the prompt prescan, never typed.
    Prompt,
    // Recognized but not supported by this build.
    Cms,
    Shut,
    Icon,
    Fl,
    Wdf,
    Idf,
    Aa,
    Az,
    Mono,
    Em,
    Sq,
    Dc,
    Cc,
    Pk,
}

/// Declaration-order table: discriminant value i+1 lives at index i.
const INFO: [(CmdKind, &str); 77] = [
    (CmdKind::Find, "find"),
    (CmdKind::Rfind, "rfind"),
    (CmdKind::Num, "num"),
    (CmdKind::MarkC, "markc"),
    (CmdKind::Corner, "corner"),
    (CmdKind::MarkP, "markp"),
    (CmdKind::Equal, "equal"),
    (CmdKind::Bottom, "bottom"),
    (CmdKind::Comma, "comma"),
    (CmdKind::Null, "null"),
    (CmdKind::Bang, "bang"),
    (CmdKind::Es, "es"),
    (CmdKind::Msg, "msg"),
    (CmdKind::S, "s"),
    (CmdKind::So, "so"),
    (CmdKind::Ce, "ce"),
    (CmdKind::Cv, "cv"),
    (CmdKind::Cmdf, "cmdf"),
    (CmdKind::Cp, "cp"),
    (CmdKind::Cpo, "cpo"),
    (CmdKind::Cps, "cps"),
    (CmdKind::Dq, "dq"),
    (CmdKind::Ww, "ww"),
    (CmdKind::Xc, "xc"),
    (CmdKind::Xd, "xd"),
    (CmdKind::Xp, "xp"),
    (CmdKind::Ei, "ei"),
    (CmdKind::Ro, "ro"),
    (CmdKind::Wh, "wh"),
    (CmdKind::Wi, "wi"),
    (CmdKind::Ws, "ws"),
    (CmdKind::Pp, "pp"),
    (CmdKind::Pv, "pv"),
    (CmdKind::Ph, "ph"),
    (CmdKind::Pn, "pn"),
    (CmdKind::Pw, "pw"),
    (CmdKind::Au, "au"),
    (CmdKind::Ad, "ad"),
    (CmdKind::Al, "al"),
    (CmdKind::Ar, "ar"),
    (CmdKind::Tt, "tt"),
    (CmdKind::Tb, "tb"),
    (CmdKind::Tl, "tl"),
    (CmdKind::Tr, "tr"),
    (CmdKind::Th, "th"),
    (CmdKind::Ti, "ti"),
    (CmdKind::Tn, "tn"),
    (CmdKind::Tdm, "tdm"),
    (CmdKind::Pt, "pt"),
    (CmdKind::Pb, "pb"),
    (CmdKind::Wp, "wp"),
    (CmdKind::Wg, "wg"),
    (CmdKind::Wc, "wc"),
    (CmdKind::Dr, "dr"),
    (CmdKind::Gm, "gm"),
    (CmdKind::Ab, "ab"),
    (CmdKind::Undo, "undo"),
    (CmdKind::Kd, "kd"),
    (CmdKind::Ld, "ld"),
    (CmdKind::Alias, "alias"),
    (CmdKind::Mi, "mi"),
    (CmdKind::Lsf, "lsf"),
    (CmdKind::Prompt, "prompt"),
    (CmdKind::Cms, "cms"),
    (CmdKind::Shut, "shut"),
    (CmdKind::Icon, "icon"),
    (CmdKind::Fl, "fl"),
    (CmdKind::Wdf, "wdf"),
    (CmdKind::Idf, "idf"),
    (CmdKind::Aa, "aa"),
    (CmdKind::Az, "az"),
    (CmdKind::Mono, "mono"),
    (CmdKind::Em, "em"),
    (CmdKind::Sq, "sq"),
    (CmdKind::Dc, "dc"),
    (CmdKind::Cc, "cc"),
    (CmdKind::Pk, "pk"),
];

/// Names the statement parser accepts as alphabetic command tokens,
/// sorted for binary search. Single-character commands and `prompt`
/// cannot be typed by name and are absent.
const TYPEABLE: [(&str, CmdKind); 65] = [
    ("aa", CmdKind::Aa),
    ("ab", CmdKind::Ab),
    ("ad", CmdKind::Ad),
    ("al", CmdKind::Al),
    ("alias", CmdKind::Alias),
    ("ar", CmdKind::Ar),
    ("au", CmdKind::Au),
    ("az", CmdKind::Az),
    ("cc", CmdKind::Cc),
    ("ce", CmdKind::Ce),
    ("cmdf", CmdKind::Cmdf),
    ("cms", CmdKind::Cms),
    ("cp", CmdKind::Cp),
    ("cpo", CmdKind::Cpo),
    ("cps", CmdKind::Cps),
    ("cv", CmdKind::Cv),
    ("dc", CmdKind::Dc),
    ("dq", CmdKind::Dq),
    ("dr", CmdKind::Dr),
    ("ei", CmdKind::Ei),
    ("em", CmdKind::Em),
    ("es", CmdKind::Es),
    ("fl", CmdKind::Fl),
    ("gm", CmdKind::Gm),
    ("icon", CmdKind::Icon),
    ("idf", CmdKind::Idf),
    ("kd", CmdKind::Kd),
    ("ld", CmdKind::Ld),
    ("lsf", CmdKind::Lsf),
    ("mi", CmdKind::Mi),
    ("mono", CmdKind::Mono),
    ("msg", CmdKind::Msg),
    ("pb", CmdKind::Pb),
    ("ph", CmdKind::Ph),
    ("pk", CmdKind::Pk),
    ("pn", CmdKind::Pn),
    ("pp", CmdKind::Pp),
    ("pt", CmdKind::Pt),
    ("pv", CmdKind::Pv),
    ("pw", CmdKind::Pw),
    ("ro", CmdKind::Ro),
    ("s", CmdKind::S),
    ("shut", CmdKind::Shut),
    ("so", CmdKind::So),
    ("sq", CmdKind::Sq),
    ("tb", CmdKind::Tb),
    ("tdm", CmdKind::Tdm),
    ("th", CmdKind::Th),
    ("ti", CmdKind::Ti),
    ("tl", CmdKind::Tl),
    ("tn", CmdKind::Tn),
    ("tr", CmdKind::Tr),
    ("tt", CmdKind::Tt),
    ("undo", CmdKind::Undo),
    ("wc", CmdKind::Wc),
    ("wdf", CmdKind::Wdf),
    ("wg", CmdKind::Wg),
    ("wh", CmdKind::Wh),
    ("wi", CmdKind::Wi),
    ("wp", CmdKind::Wp),
    ("ws", CmdKind::Ws),
    ("ww", CmdKind::Ww),
    ("xc", CmdKind::Xc),
    ("xd", CmdKind::Xd),
    ("xp", CmdKind::Xp),
];

impl CmdKind {
    /// Reverse of the wire discriminant.
    pub fn from_u8(code: u8) -> Option<CmdKind> {
        match code {
            0 => None,
            c => INFO.get(c as usize - 1).map(|&(kind, _)| kind),
        }
    }

    /// Mnemonic name, for diagnostics and rendering.
    pub fn name(self) -> &'static str {
        INFO[self as u8 as usize - 1].1
    }

    /// Look up an alphabetic command token (already lower-cased).
    pub fn lookup(name: &str) -> Option<CmdKind> {
        TYPEABLE
            .binary_search_by(|&(n, _)| n.cmp(name))
            .ok()
            .map(|i| TYPEABLE[i].1)
    }

    /// False for commands this build recognizes but does not execute.
    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            CmdKind::Cms
                | CmdKind::Shut
                | CmdKind::Icon
                | CmdKind::Fl
                | CmdKind::Wdf
                | CmdKind::Idf
                | CmdKind::Aa
                | CmdKind::Az
                | CmdKind::Mono
                | CmdKind::Em
                | CmdKind::Sq
                | CmdKind::Dc
                | CmdKind::Cc
                | CmdKind::Pk
        )
    }
}

impl fmt::Display for CmdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_matches_discriminants() {
        for (i, &(kind, _)) in INFO.iter().enumerate() {
            assert_eq!(kind as u8 as usize, i + 1, "INFO out of order at {i}");
        }
    }

    #[test]
    fn test_typeable_is_sorted_and_consistent() {
        for pair in TYPEABLE.windows(2) {
            assert!(pair[0].0 < pair[1].0, "TYPEABLE out of order: {pair:?}");
        }
        for &(name, kind) in &TYPEABLE {
            assert_eq!(kind.name(), name);
            assert_eq!(CmdKind::lookup(name), Some(kind));
        }
    }

    #[test]
    fn test_from_u8_round_trip() {
        assert_eq!(CmdKind::from_u8(0), None);
        assert_eq!(CmdKind::from_u8(200), None);
        for &(kind, _) in &INFO {
            assert_eq!(CmdKind::from_u8(kind as u8), Some(kind));
        }
    }

    #[test]
    fn test_lookup_misses() {
        assert_eq!(CmdKind::lookup("find"), None);
        assert_eq!(CmdKind::lookup("zz"), None);
        assert_eq!(CmdKind::lookup(""), None);
    }

    #[test]
    fn test_supported_split() {
        assert!(CmdKind::Es.is_supported());
        assert!(CmdKind::Kd.is_supported());
        assert!(!CmdKind::Cms.is_supported());
        let disabled = INFO.iter().filter(|(k, _)| !k.is_supported()).count();
        assert_eq!(disabled, 14);
    }
}
