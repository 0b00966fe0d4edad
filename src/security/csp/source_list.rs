//! CSP source-list parsing.
//!
//! # Grammar
//! A source list is a run of tokens separated by spaces or tabs. Each token
//! is one of:
//! - a keyword from [`Keyword`], matched case-sensitively with its quotes
//! - a scheme such as `https:` or `data:`
//! - anything else quoted (`'nonce-…'`, `'sha256-…'`), passed through verbatim
//! - a host pattern (`example.com`, `*.example.com`, `*`, `https://a.b:443`)
//!
//! # Design Decisions
//! - Line breaks are not separators: a `\r` or `\n` is a control character
//!   inside a token and rejects the whole list
//! - `;` and `,` are rejected because they end a directive or a policy
//! - Duplicates are dropped silently, first occurrence wins

use std::collections::HashSet;
use std::fmt;

use super::CspError;

/// The fixed keyword allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    SelfOrigin,
    None,
    UnsafeInline,
    UnsafeEval,
}

impl Keyword {
    pub const ALL: [Keyword; 4] = [
        Keyword::SelfOrigin,
        Keyword::None,
        Keyword::UnsafeInline,
        Keyword::UnsafeEval,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::SelfOrigin => "'self'",
            Keyword::None => "'none'",
            Keyword::UnsafeInline => "'unsafe-inline'",
            Keyword::UnsafeEval => "'unsafe-eval'",
        }
    }

    fn lookup(token: &str) -> Option<Keyword> {
        Self::ALL.into_iter().find(|k| k.as_str() == token)
    }
}

/// A single validated source expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceToken {
    Keyword(Keyword),
    Scheme(String),
    Host(String),
    /// Quoted expressions outside the keyword list (nonces, hashes, ...).
    Verbatim(String),
}

impl SourceToken {
    /// Classify an already validated token.
    fn classify(token: &str) -> Self {
        if let Some(keyword) = Keyword::lookup(token) {
            SourceToken::Keyword(keyword)
        } else if token.starts_with('\'') {
            SourceToken::Verbatim(token.to_string())
        } else if is_scheme(token) {
            SourceToken::Scheme(token.to_string())
        } else {
            SourceToken::Host(token.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SourceToken::Keyword(k) => k.as_str(),
            SourceToken::Scheme(s) | SourceToken::Host(s) | SourceToken::Verbatim(s) => s,
        }
    }
}

impl fmt::Display for SourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `scheme ":"` with scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_scheme(token: &str) -> bool {
    let Some(name) = token.strip_suffix(':') else {
        return false;
    };
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Check that a token can be placed in a header value unchanged.
pub(crate) fn validate_token(token: &str) -> Result<(), CspError> {
    let reason = if token.chars().any(|c| c.is_control()) {
        Some("contains a control character")
    } else if token.contains([';', ',']) {
        Some("contains a directive separator")
    } else if !token.is_ascii() {
        Some("contains non-ASCII characters")
    } else if token.contains(' ') {
        Some("contains whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CspError::InvalidPolicyToken {
            token: token.escape_debug().to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// An ordered set of distinct source tokens for one directive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceList {
    tokens: Vec<SourceToken>,
}

impl SourceList {
    /// Parse a raw directive value.
    pub fn parse(raw: &str) -> Result<Self, CspError> {
        let mut seen = HashSet::new();
        let mut tokens = Vec::new();

        for token in raw.split([' ', '\t']).filter(|t| !t.is_empty()) {
            validate_token(token)?;
            if seen.insert(token) {
                tokens.push(SourceToken::classify(token));
            }
        }

        Ok(Self { tokens })
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceToken> {
        self.tokens.iter()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t.as_str() == token)
    }
}

impl fmt::Display for SourceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_tokens() {
        let list = SourceList::parse("'self' https: *.cdn.example 'nonce-abc123' data:").unwrap();
        let tokens: Vec<_> = list.iter().cloned().collect();
        assert_eq!(
            tokens,
            vec![
                SourceToken::Keyword(Keyword::SelfOrigin),
                SourceToken::Scheme("https:".into()),
                SourceToken::Host("*.cdn.example".into()),
                SourceToken::Verbatim("'nonce-abc123'".into()),
                SourceToken::Scheme("data:".into()),
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        let list = SourceList::parse("'SELF' self").unwrap();
        assert!(list.iter().all(|t| !matches!(t, SourceToken::Keyword(_))));
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let list = SourceList::parse("b.example 'self'  a.example\tb.example 'self'").unwrap();
        assert_eq!(list.to_string(), "b.example 'self' a.example");
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_rejects_line_breaks() {
        assert!(SourceList::parse("'self'\r\nX-Injected: 1").is_err());
        assert!(SourceList::parse("'self'\nfoo").is_err());
        assert!(SourceList::parse("foo\u{0}").is_err());
    }

    #[test]
    fn test_rejects_directive_separators() {
        let err = SourceList::parse("'self'; script-src *").unwrap_err();
        assert!(matches!(err, CspError::InvalidPolicyToken { .. }));
        assert!(SourceList::parse("a.example,b.example").is_err());
    }

    #[test]
    fn test_rejects_non_ascii() {
        assert!(SourceList::parse("bücher.example").is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(SourceList::parse("").unwrap().is_empty());
        assert!(SourceList::parse("  \t ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_is_idempotent_over_rendering() {
        let inputs = [
            "'self' *.cdn.example",
            "https: 'unsafe-inline' 'unsafe-eval' https: example.com",
            "* data: blob: 'sha256-abc='",
            "'none'",
        ];
        for input in inputs {
            let first = SourceList::parse(input).unwrap();
            let second = SourceList::parse(&first.to_string()).unwrap();
            assert_eq!(first, second, "input: {input}");
        }
    }

    #[test]
    fn test_scheme_detection() {
        assert!(is_scheme("https:"));
        assert!(is_scheme("chrome-extension:"));
        assert!(!is_scheme("https://example.com"));
        assert!(!is_scheme("1abc:"));
        assert!(!is_scheme(":"));
    }
}
