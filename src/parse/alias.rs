//! Alias lookup and expansion.
//!
//! - [`AliasSource`] supplies definition text for a name the grammar
//!   does not recognize.
//! - [`substitute`] splices positional arguments into the definition
//!   before it is reparsed.
//!
//! An alias body is ordinary command text. `$1` through `$9` stand for
//! the words following the alias name at the call site; a missing
//! position expands to nothing. The escape character hides a dollar
//! (`@$1` yields a literal `$1`); every other escape pair is copied
//! through untouched so the reparse sees it.

use std::collections::HashMap;

/// Maximum alias-within-alias depth before expansion is abandoned.
pub(crate) const MAX_EXPANSION_DEPTH: u32 = 16;

// ===== SOURCES =====

/// Provides alias definitions by name.
///
/// Names reach [`lookup`](Self::lookup) already lowercased.
pub trait AliasSource {
    /// Returns the definition text for `name`, if one exists.
    fn lookup(&self, name: &str) -> Option<String>;
}

/// An [`AliasSource`] with no definitions.
pub struct NoAliases;

impl AliasSource for NoAliases {
    fn lookup(&self, _name: &str) -> Option<String> {
        None
    }
}

impl AliasSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

// ===== SUBSTITUTION =====

/// Splices `args` into `body` at each unescaped `$1`..`$9`.
pub(crate) fn substitute(body: &str, args: &[String], escape: char) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == escape {
            match chars.next() {
                // Hidden dollar: drop the escape, keep the dollar.
                Some('$') => out.push('$'),
                // Any other pair survives for the reparse.
                Some(n) => {
                    out.push(c);
                    out.push(n);
                }
                None => out.push(c),
            }
        } else if c == '$' {
            match chars.peek() {
                Some(&d) if ('1'..='9').contains(&d) => {
                    chars.next();
                    let idx = d as usize - '1' as usize;
                    if let Some(arg) = args.get(idx) {
                        out.push_str(arg);
                    }
                }
                _ => out.push('$'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_substitution() {
        let out = substitute("es '$1' ; tt $2", &args(&["hi", "x"]), '@');
        assert_eq!(out, "es 'hi' ; tt x");
    }

    #[test]
    fn test_missing_argument_expands_empty() {
        let out = substitute("ce $1 $3", &args(&["a"]), '@');
        assert_eq!(out, "ce a ");
    }

    #[test]
    fn test_escaped_dollar_is_literal() {
        let out = substitute("es '@$1'", &args(&["no"]), '@');
        assert_eq!(out, "es '$1'");
    }

    #[test]
    fn test_other_escapes_pass_through() {
        let out = substitute("/a@;b/ $1", &args(&["c"]), '@');
        assert_eq!(out, "/a@;b/ c");
    }

    #[test]
    fn test_bare_dollar_kept() {
        assert_eq!(substitute("es '$'", &[], '@'), "es '$'");
        assert_eq!(substitute("es '$0'", &[], '@'), "es '$0'");
    }

    #[test]
    fn test_map_source() {
        let mut map = HashMap::new();
        map.insert("save".to_string(), "pw $1".to_string());
        assert_eq!(map.lookup("save"), Some("pw $1".to_string()));
        assert_eq!(map.lookup("other"), None);
        assert_eq!(NoAliases.lookup("save"), None);
    }
}
