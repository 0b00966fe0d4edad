//! Built-in confirmation page for rewritten external redirects.
//!
//! Shown when `override = true`. The original destination arrives in the
//! `forward_as` query parameter and is only rendered as a link when it is
//! an http(s) URL.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use url::Url;

use super::RedirectGuard;

pub const DEFAULT_INTERSTITIAL_PATH: &str = "/_guard/external-redirect";

pub async fn interstitial_handler(
    State(guard): State<Arc<RedirectGuard>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let target = guard
        .policy()
        .forward_as
        .as_deref()
        .and_then(|name| params.get(name))
        .map(String::as_str);

    match target {
        Some(target) => Html(render_page(target)).into_response(),
        None => (StatusCode::BAD_REQUEST, "Missing redirect target").into_response(),
    }
}

fn render_page(target: &str) -> String {
    let escaped = escape_html(target);
    let link = match Url::parse(target) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            format!(r#"<p><a href="{escaped}" rel="noopener noreferrer">Continue to {escaped}</a></p>"#)
        }
        _ => String::new(),
    };
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Leaving this site</title></head>\n\
         <body><h1>You are leaving this site</h1>\n<p>The page tried to send you to <code>{escaped}</code>.</p>\n\
         {link}</body></html>\n"
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_links_http_targets() {
        let page = render_page("https://evil.test/?a=1&b=2");
        assert!(page.contains(r#"href="https://evil.test/?a=1&amp;b=2""#));
    }

    #[test]
    fn test_page_escapes_and_skips_script_targets() {
        let page = render_page("javascript:alert('<x>')");
        assert!(!page.contains("href="));
        assert!(page.contains("javascript:alert(&#x27;&lt;x&gt;&#x27;)"));
        assert!(!page.contains("<x>"));
    }
}
