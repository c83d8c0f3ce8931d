//! Key descriptors for the binding table.
//!
//! A key definition names its key the way the command language spells it:
//! `^x` for control, `f1`..`f20` for function keys, `m1`..`m4` for mouse
//! buttons, `np0`..`np9`/`npe` for the numeric pad, a handful of named
//! keys, and a trailing `s`/`u` on special keys for the shifted and
//! release (key-up) transitions. [`KeySpec`] is the parsed form the host's
//! binding table keys on; the parser itself stores the token verbatim.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Modifier set carried by a key descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Mods: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
    }
}

/// The physical key a descriptor names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    F(u8),
    Mouse(u8),
    Np(u8),
    NpEnter,
    Ins,
    Del,
    Bs,
    Cr,
    Tab,
    Esc,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PgUp,
    PgDn,
}

impl Key {
    /// True for keys that accept the `s`/`u` suffix notation.
    fn is_special(&self) -> bool {
        !matches!(self, Key::Char(_))
    }

    fn from_name(name: &str) -> Option<Key> {
        let key = match name {
            "ins" => Key::Ins,
            "del" => Key::Del,
            "bs" => Key::Bs,
            "cr" => Key::Cr,
            "tab" => Key::Tab,
            "esc" => Key::Esc,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "home" => Key::Home,
            "end" => Key::End,
            "pgup" => Key::PgUp,
            "pgdn" => Key::PgDn,
            "npe" => Key::NpEnter,
            _ => {
                if let Some(n) = name.strip_prefix('f') {
                    let n: u8 = n.parse().ok()?;
                    if (1..=20).contains(&n) {
                        return Some(Key::F(n));
                    }
                } else if let Some(n) = name.strip_prefix('m') {
                    let n: u8 = n.parse().ok()?;
                    if (1..=4).contains(&n) {
                        return Some(Key::Mouse(n));
                    }
                } else if let Some(n) = name.strip_prefix("np") {
                    let n: u8 = n.parse().ok()?;
                    if n <= 9 {
                        return Some(Key::Np(n));
                    }
                }
                return None;
            }
        };
        Some(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::F(n) => write!(f, "f{n}"),
            Key::Mouse(n) => write!(f, "m{n}"),
            Key::Np(n) => write!(f, "np{n}"),
            Key::NpEnter => write!(f, "npe"),
            Key::Ins => write!(f, "ins"),
            Key::Del => write!(f, "del"),
            Key::Bs => write!(f, "bs"),
            Key::Cr => write!(f, "cr"),
            Key::Tab => write!(f, "tab"),
            Key::Esc => write!(f, "esc"),
            Key::Up => write!(f, "up"),
            Key::Down => write!(f, "down"),
            Key::Left => write!(f, "left"),
            Key::Right => write!(f, "right"),
            Key::Home => write!(f, "home"),
            Key::End => write!(f, "end"),
            Key::PgUp => write!(f, "pgup"),
            Key::PgDn => write!(f, "pgdn"),
        }
    }
}

/// A key token that names no key this build knows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key \"{0}\"")]
pub struct UnknownKey(pub String);

/// A fully parsed key descriptor: key, modifiers, transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySpec {
    pub key: Key,
    pub mods: Mods,
    /// True when the binding fires on release rather than press.
    pub release: bool,
}

impl KeySpec {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            mods: Mods::empty(),
            release: false,
        }
    }
}

impl FromStr for KeySpec {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mods = Mods::empty();
        let mut rest = s;

        if let Some(stripped) = rest.strip_prefix('^') {
            mods |= Mods::CTRL;
            rest = stripped;
        }

        // Single raw character, case preserved.
        let mut chars = rest.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(KeySpec {
                key: Key::Char(c),
                mods,
                release: false,
            });
        }

        let lower = rest.to_ascii_lowercase();
        if let Some(key) = Key::from_name(&lower) {
            return Ok(KeySpec {
                key,
                mods,
                release: false,
            });
        }

        // Suffix notation: trailing `u` = release, then trailing `s` =
        // shifted. Only special keys take suffixes.
        let mut stem = lower.as_str();
        let mut release = false;
        if let Some(s) = stem.strip_suffix('u') {
            release = true;
            stem = s;
        }
        if let Some(s) = stem.strip_suffix('s') {
            mods |= Mods::SHIFT;
            stem = s;
        }
        match Key::from_name(stem) {
            Some(key) if key.is_special() => Ok(KeySpec { key, mods, release }),
            _ => Err(UnknownKey(s.to_string())),
        }
    }
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mods.contains(Mods::CTRL) {
            write!(f, "^")?;
        }
        write!(f, "{}", self.key)?;
        if self.mods.contains(Mods::SHIFT) {
            write!(f, "s")?;
        }
        if self.release {
            write!(f, "u")?;
        }
        Ok(())
    }
}
