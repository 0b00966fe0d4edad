//! `Cookie` / `Set-Cookie` header handling.
//!
//! Request headers are split on raw bytes so a fragment that is not valid
//! UTF-8 never hides the ones around it. Only fragments whose name is
//! protected are parsed further, with the `cookie` crate; everything else
//! is carried through byte for byte.

use cookie::Cookie;

/// Trimmed, non-empty `;` separated fragments of a request `Cookie` line.
pub fn fragments(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    line.split(|b| *b == b';')
        .map(<[u8]>::trim_ascii)
        .filter(|fragment| !fragment.is_empty())
}

/// Name part of a fragment: everything before the first `=`, or the whole
/// fragment when there is none.
pub fn fragment_name(fragment: &[u8]) -> &[u8] {
    fragment
        .split(|b| *b == b'=')
        .next()
        .unwrap_or(fragment)
        .trim_ascii()
}

/// Name of the cookie a raw `Set-Cookie` value sets.
pub fn set_cookie_name(header: &[u8]) -> &[u8] {
    let pair = header.split(|b| *b == b';').next().unwrap_or(header);
    fragment_name(pair)
}

/// Parse a request fragment as a `name=value` pair. `None` for
/// fragments without `=`, with an empty name, or not valid UTF-8.
pub fn parse_pair(fragment: &[u8]) -> Option<Cookie<'_>> {
    let text = std::str::from_utf8(fragment).ok()?;
    Cookie::parse(text).ok()
}

/// A response `Set-Cookie` header split into pair and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie<'a> {
    pub name: &'a str,
    pub value: &'a str,
    /// Everything after the first `;`, including the `;`.
    pub attributes: &'a str,
}

impl<'a> SetCookie<'a> {
    pub fn parse(header: &'a str) -> Option<Self> {
        let (pair, attributes) = match header.find(';') {
            Some(idx) => header.split_at(idx),
            None => (header, ""),
        };
        let cookie = Cookie::parse(pair).ok()?;
        Some(Self {
            name: cookie.name_raw()?,
            value: cookie.value_raw()?,
            attributes,
        })
    }

    /// Render with a replacement value, attributes untouched.
    pub fn with_value(&self, value: &str) -> String {
        format!("{}={}{}", self.name, value, self.attributes)
    }
}
