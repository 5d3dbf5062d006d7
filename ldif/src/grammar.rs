//! Distinguished-name grammar and the LDIF SAFE-STRING test.
//!
//! The patterns are regular and compiled once per process.

use std::sync::OnceLock;

use regex::Regex;

macro_rules! attrtype_pattern {
    () => {
        r"[A-Za-z0-9_;.-]+(?:;[A-Za-z0-9_-]+)*"
    };
}

macro_rules! attrvalue_pattern {
    () => {
        r#"(?:(?:[^,]|\\,)+|".*?")"#
    };
}

macro_rules! attr_pattern {
    () => {
        concat!(attrtype_pattern!(), r"[ ]*=[ ]*", attrvalue_pattern!())
    };
}

macro_rules! rdn_pattern {
    () => {
        concat!(
            attr_pattern!(),
            r"(?:[ ]*\+[ ]*",
            attr_pattern!(),
            r")*[ ]*"
        )
    };
}

macro_rules! dn_pattern {
    () => {
        concat!(rdn_pattern!(), r"(?:[ ]*,[ ]*", rdn_pattern!(), r")*[ ]*")
    };
}

/// Attribute type with optional `;option` suffixes.
pub const ATTRTYPE_PATTERN: &str = attrtype_pattern!();

/// Attribute value inside an RDN: quoted, or unquoted with `\,` escapes.
pub const ATTRVALUE_PATTERN: &str = attrvalue_pattern!();

/// One or more `type=value` pairs joined by `+`.
pub const RDN_PATTERN: &str = rdn_pattern!();

/// One or more RDNs joined by `,`.
pub const DN_PATTERN: &str = dn_pattern!();

/// A single unfolded LDIF attribute line (`dn:` lines must carry a DN).
pub const LDIF_PATTERN: &str = concat!(
    r"^(?:(?:dn(?::|::) ",
    dn_pattern!(),
    r")|(?:",
    attrtype_pattern!(),
    r"(?::|::) .*)$)+"
);

/// Valid `changetype:` values.
pub const CHANGE_TYPES: [&str; 4] = ["add", "delete", "modify", "modrdn"];

/// Modification operation names, indexed by operation code.
pub const MOD_OPS: [&str; 3] = ["add", "delete", "replace"];

fn dn_regex() -> &'static Regex {
    static DN_REGEX: OnceLock<Regex> = OnceLock::new();
    DN_REGEX.get_or_init(|| {
        Regex::new(concat!("^", dn_pattern!(), "$")).expect("DN pattern compiles")
    })
}

fn ldif_regex() -> &'static Regex {
    static LDIF_REGEX: OnceLock<Regex> = OnceLock::new();
    LDIF_REGEX.get_or_init(|| Regex::new(LDIF_PATTERN).expect("LDIF pattern compiles"))
}

/// Return true if `s` is a string representation of a distinguished name.
/// The empty string (root DSE) counts.
pub fn is_dn(s: &str) -> bool {
    s.is_empty() || dn_regex().is_match(s)
}

/// Return true if `line` is a well-formed unfolded `type: value` or
/// `type:: base64` line.
pub fn is_ldif_line(line: &str) -> bool {
    ldif_regex().is_match(line)
}

/// Return true if `data` cannot be written as an LDIF SAFE-STRING:
/// it starts with NUL, LF, CR, space, colon or less-than, contains
/// NUL, LF, CR or any byte >= 0x80, or ends with a space.
pub fn is_unsafe_string(data: &[u8]) -> bool {
    let (first, last) = match (data.first(), data.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return false,
    };
    if matches!(first, 0 | b'\n' | b'\r' | b' ' | b':' | b'<') {
        return true;
    }
    if last == b' ' {
        return true;
    }
    data.iter()
        .any(|&c| c == 0 || c == b'\n' || c == b'\r' || c >= 0x80)
}
