//! `Location` target inspection.
//!
//! Extraction follows what a browser would do with the value: leading
//! whitespace is ignored, tabs and line breaks are removed and
//! backslashes count as slashes. That way `//evil.test`, `/\evil.test`
//! and `\t//evil.test` are all seen as absolute.

use url::{ParseError, Url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    /// No host component: same origin.
    Relative,
    /// Absolute target; host is lowercase without a trailing dot.
    Host(String),
    /// Looks absolute but cannot be parsed.
    Malformed,
}

impl RedirectTarget {
    pub fn parse(location: &str) -> Self {
        let normalized: String = location
            .trim_start_matches(|c: char| c.is_ascii_whitespace() || c.is_ascii_control())
            .chars()
            .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
            .map(|c| if c == '\\' { '/' } else { c })
            .collect();

        let parsed = if normalized.starts_with("//") {
            Url::parse(&format!("http:{}", normalized))
        } else {
            Url::parse(&normalized)
        };

        match parsed {
            Ok(url) => match url.host_str() {
                Some(host) => {
                    let host = host.trim_end_matches('.').to_ascii_lowercase();
                    if host.is_empty() {
                        RedirectTarget::Malformed
                    } else {
                        RedirectTarget::Host(host)
                    }
                }
                None if url.scheme() == "http" || url.scheme() == "https" => RedirectTarget::Malformed,
                None => RedirectTarget::Relative,
            },
            Err(ParseError::RelativeUrlWithoutBase) => RedirectTarget::Relative,
            Err(_) => RedirectTarget::Malformed,
        }
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            RedirectTarget::Host(host) => Some(host),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(location: &str) -> RedirectTarget {
        RedirectTarget::Host(location.to_string())
    }

    #[test]
    fn test_relative_targets() {
        for location in ["/", "/login?next=/home", "page.html", "../up", "?q=1", "#frag", ""] {
            assert_eq!(RedirectTarget::parse(location), RedirectTarget::Relative, "{location:?}");
        }
    }

    #[test]
    fn test_absolute_targets() {
        assert_eq!(RedirectTarget::parse("http://evil.test/"), host("evil.test"));
        assert_eq!(RedirectTarget::parse("https://WWW.Example.COM:8443/x"), host("www.example.com"));
        assert_eq!(RedirectTarget::parse("https://example.com./"), host("example.com"));
    }

    #[test]
    fn test_scheme_relative_and_backslash_tricks() {
        assert_eq!(RedirectTarget::parse("//evil.test/path"), host("evil.test"));
        assert_eq!(RedirectTarget::parse("/\\evil.test"), host("evil.test"));
        assert_eq!(RedirectTarget::parse("\\\\evil.test"), host("evil.test"));
        assert_eq!(RedirectTarget::parse("  //evil.test"), host("evil.test"));
        assert_eq!(RedirectTarget::parse("/\t/evil.test"), host("evil.test"));
        assert_eq!(RedirectTarget::parse("https:\\\\evil.test"), host("evil.test"));
    }

    #[test]
    fn test_userinfo_does_not_hide_host() {
        assert_eq!(
            RedirectTarget::parse("https://example.com@evil.test/"),
            host("evil.test")
        );
    }

    #[test]
    fn test_hostless_schemes_are_not_external() {
        assert_eq!(RedirectTarget::parse("mailto:someone@example.com"), RedirectTarget::Relative);
    }

    #[test]
    fn test_malformed_targets() {
        assert_eq!(RedirectTarget::parse("http://exa mple.com/"), RedirectTarget::Malformed);
        assert_eq!(RedirectTarget::parse("http://[::1/"), RedirectTarget::Malformed);
    }
}
