use std::fmt;

use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use serde::Serialize;
use thiserror::Error;

use crate::parser::PlanFile;
use crate::parser::RawRow;

/// HTTP methods a row may declare. Anything else in the method column falls
/// back to GET; the fallback is a documented policy, decided once at load
/// time rather than on every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            _ => Method::Get,
        }
    }

    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_reqwest())
    }
}

/// How a row's payload reaches the wire. `file` and `formfile` mean a
/// multipart upload, `body` means a JSON body, and every other value in the
/// column means query parameters. Like the method column, the default is a
/// deliberate policy and is resolved at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Query,
    Body,
    File,
}

impl PayloadKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "file" | "formfile" => PayloadKind::File,
            "body" => PayloadKind::Body,
            _ => PayloadKind::Query,
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Query => write!(f, "query"),
            PayloadKind::Body => write!(f, "body"),
            PayloadKind::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    /// A stray value in the outcome column (neither PASS nor FAIL) loads as
    /// unset, which keeps the row eligible for re-execution.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "PASS" => Some(Outcome::Pass),
            "FAIL" => Some(Outcome::Fail),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "PASS"),
            Outcome::Fail => write!(f, "FAIL"),
        }
    }
}

/// What the engine recorded in the actual-status column: a real HTTP status
/// (0 is the reserved pseudo-status for unreachable calls and other
/// invocation failures), or the login sentinel written when authentication
/// fails before any row runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActualStatus {
    Code(u16),
    LoginFailed,
}

impl ActualStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == "LOGIN_FAILED" {
            return Some(ActualStatus::LoginFailed);
        }

        raw.parse::<u16>().ok().map(ActualStatus::Code)
    }
}

impl fmt::Display for ActualStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActualStatus::Code(code) => write!(f, "{code}"),
            ActualStatus::LoginFailed => write!(f, "LOGIN_FAILED"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestRow {
    pub endpoint: String,
    pub method: Method,
    pub test_case: String,
    pub payload: String,
    pub payload_kind: PayloadKind,
    pub expected_status: u16,
    pub expected_response: String,
    pub actual_status: Option<ActualStatus>,
    pub actual_response: Option<String>,
    pub outcome: Option<Outcome>,
}

impl TestRow {
    /// A blank endpoint is the end-of-plan sentinel.
    pub fn is_blank(&self) -> bool {
        self.endpoint.trim().is_empty()
    }

    /// Rows already marked PASS are settled; everything else with an
    /// endpoint is a candidate for execution.
    pub fn eligible(&self) -> bool {
        !self.is_blank() && self.outcome != Some(Outcome::Pass)
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid row {row}: {message}")]
pub struct PlanError {
    row: usize,
    message: String,
    #[source_code]
    src: Option<NamedSource<String>>,
    #[label("defined here")]
    span: Option<SourceSpan>,
}

/// The ordered rows of one run. Owned exclusively by the engine for the
/// duration of the run; the engine is the only writer of the three result
/// columns.
#[derive(Debug)]
pub struct TestPlan {
    pub rows: Vec<TestRow>,
}

impl TestPlan {
    pub fn from_raw(file: &PlanFile, toml_src: &str, file_name: &str) -> Result<Self, PlanError> {
        let rows = file
            .rows
            .iter()
            .enumerate()
            .map(|(index, raw)| row_from_raw(index, raw, toml_src, file_name))
            .collect::<Result<Vec<_>, PlanError>>()?;

        Ok(Self { rows })
    }

    /// Count of rows the next run would execute, for sizing the progress
    /// denominator up front.
    pub fn eligible_count(&self) -> usize {
        self.rows.iter().filter(|row| row.eligible()).count()
    }

    /// Merges the engine-written result columns back into the raw file
    /// model. The authored columns are left exactly as they were loaded.
    pub fn write_back(&self, file: &mut PlanFile) {
        for (row, raw) in self.rows.iter().zip(file.rows.iter_mut()) {
            raw.actual_status = row.actual_status.map(|status| status.to_string());
            raw.actual_response = row.actual_response.clone();
            raw.outcome = row.outcome.map(|outcome| outcome.to_string());
        }
    }
}

fn row_from_raw(
    index: usize,
    raw: &RawRow,
    toml_src: &str,
    file_name: &str,
) -> Result<TestRow, PlanError> {
    let blank = raw.endpoint.trim().is_empty();

    let expected_status = match raw.expected_status {
        Some(status) => status,
        // Blank rows terminate the scan and are never compared against.
        None if blank => 0,
        None => {
            return Err(PlanError {
                row: index,
                message: "expected_status is required for a row with an endpoint".into(),
                src: Some(NamedSource::new(file_name, toml_src.to_string())),
                span: find_span(&raw.endpoint, toml_src),
            });
        }
    };

    Ok(TestRow {
        endpoint: raw.endpoint.clone(),
        method: Method::parse(&raw.method),
        test_case: raw.test_case.clone(),
        payload: raw.payload.clone(),
        payload_kind: PayloadKind::parse(&raw.payload_kind),
        expected_status,
        expected_response: raw.expected_response.clone(),
        actual_status: raw.actual_status.as_deref().and_then(ActualStatus::parse),
        actual_response: raw.actual_response.clone(),
        outcome: raw.outcome.as_deref().and_then(Outcome::parse),
    })
}

fn find_span(needle: &str, toml_src: &str) -> Option<SourceSpan> {
    let pattern = format!("\"{}\"", needle);
    toml_src
        .find(&pattern)
        .map(|start| SourceSpan::new(start.into(), needle.len()))
}
