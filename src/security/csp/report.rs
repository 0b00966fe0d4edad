//! CSP violation report intake.
//!
//! Browsers POST `{"csp-report": {...}}` to the policy's `report-uri`. When
//! that URI is a local path the gateway answers it here instead of the
//! upstream. Reports are logged and counted, nothing is stored.

use axum::{body::Bytes, http::StatusCode};
use serde::Deserialize;

use crate::observability::metrics;

/// Envelope sent by browsers.
#[derive(Debug, Deserialize)]
pub struct ViolationReport {
    #[serde(rename = "csp-report")]
    pub report: ViolationDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ViolationDetails {
    pub document_uri: String,
    pub referrer: String,
    pub violated_directive: String,
    pub effective_directive: String,
    pub original_policy: String,
    pub blocked_uri: String,
    pub source_file: Option<String>,
    pub line_number: Option<u64>,
}

impl ViolationDetails {
    /// Directive used for grouping, stripped of its source list.
    pub fn directive(&self) -> &str {
        let directive = if self.effective_directive.is_empty() {
            &self.violated_directive
        } else {
            &self.effective_directive
        };
        directive.split_whitespace().next().unwrap_or("unknown")
    }
}

pub async fn csp_report_handler(body: Bytes) -> StatusCode {
    let report = match serde_json::from_slice::<ViolationReport>(&body) {
        Ok(report) => report.report,
        Err(e) => {
            tracing::debug!(error = %e, "Discarding malformed CSP report");
            return StatusCode::BAD_REQUEST;
        }
    };

    tracing::warn!(
        document_uri = %report.document_uri,
        directive = %report.directive(),
        blocked_uri = %report.blocked_uri,
        source_file = ?report.source_file,
        line_number = ?report.line_number,
        "Content-Security-Policy violation"
    );
    metrics::record_csp_report(report.directive());

    StatusCode::NO_CONTENT
}
