//! CSP policy model and header rendering.

use std::collections::HashMap;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use super::source_list::{validate_token, SourceList};
use super::CspError;
use crate::config::CspConfig;
use crate::security::SecurityError;

const CSP: HeaderName = HeaderName::from_static("content-security-policy");
const CSP_REPORT_ONLY: HeaderName = HeaderName::from_static("content-security-policy-report-only");
const X_CSP: HeaderName = HeaderName::from_static("x-content-security-policy");
const X_CSP_REPORT_ONLY: HeaderName =
    HeaderName::from_static("x-content-security-policy-report-only");
const X_WEBKIT_CSP: HeaderName = HeaderName::from_static("x-webkit-csp");
const X_WEBKIT_CSP_REPORT_ONLY: HeaderName = HeaderName::from_static("x-webkit-csp-report-only");

/// Fetch directives, in the order they are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    Default,
    Script,
    Object,
    Style,
    Img,
    Media,
    Frame,
    Font,
    Connect,
}

impl Directive {
    pub const ALL: [Directive; 9] = [
        Directive::Default,
        Directive::Script,
        Directive::Object,
        Directive::Style,
        Directive::Img,
        Directive::Media,
        Directive::Frame,
        Directive::Font,
        Directive::Connect,
    ];

    /// Header directive name.
    pub fn name(self) -> &'static str {
        match self {
            Directive::Default => "default-src",
            Directive::Script => "script-src",
            Directive::Object => "object-src",
            Directive::Style => "style-src",
            Directive::Img => "img-src",
            Directive::Media => "media-src",
            Directive::Frame => "frame-src",
            Directive::Font => "font-src",
            Directive::Connect => "connect-src",
        }
    }

    fn raw_value(self, config: &CspConfig) -> &str {
        match self {
            Directive::Default => &config.default,
            Directive::Script => &config.script,
            Directive::Object => &config.object,
            Directive::Style => &config.style,
            Directive::Img => &config.img,
            Directive::Media => &config.media,
            Directive::Frame => &config.frame,
            Directive::Font => &config.font,
            Directive::Connect => &config.connect,
        }
    }
}

/// A complete Content-Security-Policy. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CspPolicy {
    directives: HashMap<Directive, SourceList>,
    report_uri: Option<String>,
    report_only: bool,
    compat_headers: bool,
}

impl CspPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every directive of a `[security.csp]` section.
    pub fn from_config(config: &CspConfig) -> Result<Self, SecurityError> {
        let mut policy = Self::new()
            .report_only(config.report_only)
            .compat_headers(config.compat_headers);

        for directive in Directive::ALL {
            let list = SourceList::parse(directive.raw_value(config)).map_err(|source| {
                SecurityError::Csp {
                    directive: directive.name(),
                    source,
                }
            })?;
            policy = policy.with_directive(directive, list);
        }

        match config.report_uri.as_deref().map(str::trim) {
            Some(uri) if !uri.is_empty() => {
                policy = policy
                    .with_report_uri(uri)
                    .map_err(|source| SecurityError::Csp {
                        directive: "report-uri",
                        source,
                    })?;
            }
            _ => {}
        }

        Ok(policy)
    }

    pub fn with_directive(mut self, directive: Directive, sources: SourceList) -> Self {
        self.directives.insert(directive, sources);
        self
    }

    pub fn with_report_uri(mut self, uri: impl Into<String>) -> Result<Self, CspError> {
        let uri = uri.into();
        validate_token(&uri)?;
        self.report_uri = Some(uri);
        Ok(self)
    }

    pub fn report_only(mut self, enabled: bool) -> Self {
        self.report_only = enabled;
        self
    }

    pub fn compat_headers(mut self, enabled: bool) -> Self {
        self.compat_headers = enabled;
        self
    }

    pub fn directive(&self, directive: Directive) -> Option<&SourceList> {
        self.directives.get(&directive)
    }

    pub fn report_uri(&self) -> Option<&str> {
        self.report_uri.as_deref()
    }

    /// The report URI when it points at this gateway rather than another host.
    pub fn local_report_path(&self) -> Option<&str> {
        self.report_uri
            .as_deref()
            .filter(|uri| uri.starts_with('/') && !uri.starts_with("//"))
    }

    /// Render the header value; `None` when there is nothing to send.
    pub fn header_value(&self) -> Option<String> {
        let mut parts: Vec<String> = Directive::ALL
            .into_iter()
            .filter_map(|d| {
                self.directives
                    .get(&d)
                    .filter(|list| !list.is_empty())
                    .map(|list| format!("{} {}", d.name(), list))
            })
            .collect();

        if let Some(uri) = &self.report_uri {
            parts.push(format!("report-uri {}", uri));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }

    /// Header names the value is sent under.
    pub fn header_names(&self) -> Vec<HeaderName> {
        match (self.report_only, self.compat_headers) {
            (false, false) => vec![CSP],
            (true, false) => vec![CSP_REPORT_ONLY],
            (false, true) => vec![CSP, X_CSP, X_WEBKIT_CSP],
            (true, true) => vec![CSP_REPORT_ONLY, X_CSP_REPORT_ONLY, X_WEBKIT_CSP_REPORT_ONLY],
        }
    }

    /// Render all `(name, value)` header pairs for this policy.
    pub fn build_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let Some(value) = self.header_value() else {
            return Vec::new();
        };

        match HeaderValue::try_from(value) {
            Ok(value) => self
                .header_names()
                .into_iter()
                .map(|name| (name, value.clone()))
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "CSP policy does not form a valid header value");
                Vec::new()
            }
        }
    }
}

/// Pre-rendered CSP headers shared by every response.
#[derive(Debug, Clone, Default)]
pub struct CspHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl CspHeaders {
    pub fn new(policy: &CspPolicy) -> Self {
        Self {
            headers: policy.build_headers(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.headers.iter()
    }

    /// Set the policy headers, replacing any the upstream sent.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CspConfig {
        CspConfig {
            enabled: true,
            ..CspConfig::default()
        }
    }

    #[test]
    fn test_script_directive_renders_exactly() {
        let policy = CspPolicy::from_config(&CspConfig {
            script: "'self' *.cdn.example".into(),
            ..config()
        })
        .unwrap();
        assert_eq!(
            policy.header_value().as_deref(),
            Some("script-src 'self' *.cdn.example")
        );
    }

    #[test]
    fn test_directive_order_is_fixed() {
        let policy = CspPolicy::from_config(&CspConfig {
            connect: "api.example".into(),
            img: "data:".into(),
            default: "'self'".into(),
            report_uri: Some("/csp/report".into()),
            ..config()
        })
        .unwrap();
        assert_eq!(
            policy.header_value().unwrap(),
            "default-src 'self'; img-src data:; connect-src api.example; report-uri /csp/report"
        );
    }

    #[test]
    fn test_empty_directives_are_omitted() {
        let policy = CspPolicy::from_config(&CspConfig {
            default: "'self'".into(),
            script: "   ".into(),
            ..config()
        })
        .unwrap();
        assert_eq!(policy.header_value().unwrap(), "default-src 'self'");
    }

    #[test]
    fn test_nothing_configured_emits_nothing() {
        let policy = CspPolicy::from_config(&config()).unwrap();
        assert!(policy.header_value().is_none());
        assert!(policy.build_headers().is_empty());
    }

    #[test]
    fn test_header_names() {
        let base = CspConfig {
            default: "'self'".into(),
            ..config()
        };

        let enforce = CspPolicy::from_config(&base).unwrap().build_headers();
        assert_eq!(enforce.len(), 1);
        assert_eq!(enforce[0].0, "content-security-policy");

        let report_only = CspPolicy::from_config(&CspConfig {
            report_only: true,
            ..base.clone()
        })
        .unwrap()
        .build_headers();
        assert_eq!(report_only.len(), 1);
        assert_eq!(report_only[0].0, "content-security-policy-report-only");

        let compat = CspPolicy::from_config(&CspConfig {
            compat_headers: true,
            ..base.clone()
        })
        .unwrap()
        .build_headers();
        let names: Vec<_> = compat.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["content-security-policy", "x-content-security-policy", "x-webkit-csp"]
        );
        assert!(compat.iter().all(|(_, v)| v == "default-src 'self'"));
    }

    #[test]
    fn test_invalid_token_names_directive() {
        let err = CspPolicy::from_config(&CspConfig {
            style: "'self'\r\nSet-Cookie: x=1".into(),
            ..config()
        })
        .unwrap_err();
        match err {
            SecurityError::Csp { directive, .. } => assert_eq!(directive, "style-src"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_report_uri() {
        let err = CspPolicy::from_config(&CspConfig {
            report_uri: Some("/report; script-src *".into()),
            ..config()
        })
        .unwrap_err();
        assert!(matches!(err, SecurityError::Csp { directive: "report-uri", .. }));
    }

    #[test]
    fn test_local_report_path() {
        let local = CspPolicy::new().with_report_uri("/csp/report").unwrap();
        assert_eq!(local.local_report_path(), Some("/csp/report"));

        let remote = CspPolicy::new()
            .with_report_uri("https://reports.example/csp")
            .unwrap();
        assert_eq!(remote.local_report_path(), None);
    }

    #[test]
    fn test_apply_replaces_upstream_header() {
        let policy = CspPolicy::new().with_directive(
            Directive::Default,
            SourceList::parse("'none'").unwrap(),
        );
        let csp = CspHeaders::new(&policy);
        let mut headers = HeaderMap::new();
        headers.insert(CSP, HeaderValue::from_static("default-src *"));
        csp.apply(&mut headers);
        assert_eq!(headers.get(CSP).unwrap(), "default-src 'none'");
        assert_eq!(headers.get_all(CSP).iter().count(), 1);
    }
}
