use std::fmt;
use std::str::FromStr;

use symbolic::common::{Language, Name, NameMangling};
use symbolic::demangle::{Demangle, DemangleOptions};

use crate::error::{Error, Result};

/// How much of a demangled name to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemangleMode {
    /// Leave names as stored in the file
    None,
    /// Drop parameter lists, template arguments and Rust hashes
    #[default]
    Short,
    /// Everything the demangler produces
    Full,
}

impl DemangleMode {
    /// Demangles `name` according to the mode. Names that are not
    /// mangled come back unchanged.
    pub fn filter(self, name: &str) -> String {
        match self {
            DemangleMode::None => name.to_owned(),
            DemangleMode::Full => Name::new(name, NameMangling::Unknown, Language::Unknown)
                .try_demangle(DemangleOptions::complete())
                .into_owned(),
            DemangleMode::Short => {
                let mangled = Name::new(name, NameMangling::Unknown, Language::Unknown);
                let demangled = mangled.try_demangle(DemangleOptions::name_only());
                if mangled.detect_language() == Language::Cpp {
                    strip_cpp_args(&demangled)
                } else {
                    demangled.into_owned()
                }
            }
        }
    }
}

impl FromStr for DemangleMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(DemangleMode::None),
            "short" => Ok(DemangleMode::Short),
            "full" => Ok(DemangleMode::Full),
            _ => Err(Error::UnknownDemangleMode(s.to_owned())),
        }
    }
}

impl fmt::Display for DemangleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemangleMode::None => f.write_str("none"),
            DemangleMode::Short => f.write_str("short"),
            DemangleMode::Full => f.write_str("full"),
        }
    }
}

/// Operator spellings that contain brackets, longest first.
const BRACKET_OPERATORS: &[&str] = &[
    "<=>", "<<=", ">>=", "->*", "<<", ">>", "<=", ">=", "->", "()", "<", ">",
];

/// Removes template argument lists and the parameter lists of enclosing
/// functions (`outer(int)::inner` becomes `outer::inner`) from a
/// demangled C++ name. Other parenthesized groups are kept and stripped
/// in turn.
fn strip_cpp_args(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(c) = rest.chars().next() {
        let at_word_start = !out.ends_with(|c: char| c.is_alphanumeric() || c == '_');
        if let Some(after) = rest.strip_prefix("operator").filter(|_| at_word_start) {
            let op = BRACKET_OPERATORS
                .iter()
                .find(|op| after.starts_with(**op))
                .map_or(0, |op| op.len());
            let len = "operator".len() + op;
            out.push_str(&rest[..len]);
            rest = &rest[len..];
            continue;
        }

        match c {
            '<' => match closing(rest, '<', '>') {
                Some(end) => {
                    while out.ends_with(' ') {
                        out.pop();
                    }
                    rest = &rest[end + 1..];
                }
                None => {
                    out.push_str(rest);
                    break;
                }
            },
            '(' => match closing(rest, '(', ')') {
                Some(end) if rest[end + 1..].starts_with("::") && !rest.starts_with("(anonymous") => {
                    rest = &rest[end + 1..];
                }
                Some(end) => {
                    // kept groups such as `{vtable(...)}` or `{lambda(...)#1}`
                    // still lose their template arguments
                    out.push('(');
                    out.push_str(&strip_cpp_args(&rest[1..end]));
                    out.push(')');
                    rest = &rest[end + 1..];
                }
                None => {
                    out.push_str(rest);
                    break;
                }
            },
            _ => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    out
}

/// Byte offset of the bracket closing the one `s` starts with
fn closing(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}
