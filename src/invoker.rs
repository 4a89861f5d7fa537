use std::path::Path;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart;
use thiserror::Error;

use crate::plan::PayloadKind;
use crate::plan::TestRow;
use crate::repair::repair;

/// Placeholder authors use in the payload column to mean "no payload".
pub const NO_PAYLOAD: &str = "(none)";

/// The normalized result of exactly one invocation attempt. Status 0 is
/// reserved for calls that never produced an HTTP response (unreachable
/// target, missing upload file, malformed query payload); it can never
/// collide with a real status, so comparison against the expected status
/// fails for such rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeOutcome {
    pub status: u16,
    pub body: String,
}

#[derive(Error, Debug)]
enum InvokeError {
    #[error("query payload is not a flat JSON object: {0}")]
    QueryPayload(#[from] serde_json::Error),

    #[error("failed to read upload file {path}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
}

#[allow(async_fn_in_trait)]
pub trait Invoke {
    async fn invoke(&self, row: &TestRow, token: &str) -> InvokeOutcome;
}

pub struct HttpInvoker {
    client: Client,
}

impl HttpInvoker {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn try_invoke(&self, row: &TestRow, token: &str) -> Result<InvokeOutcome, InvokeError> {
        let mut request = self
            .client
            .request(row.method.as_reqwest(), row.endpoint.as_str())
            .bearer_auth(token);

        match row.payload_kind {
            PayloadKind::File => {
                let path = strip_file_path(&row.payload);
                if !Path::new(&path).is_file() {
                    return Ok(InvokeOutcome {
                        status: 0,
                        body: format!("FILE NOT FOUND: {path}"),
                    });
                }

                let bytes = tokio::fs::read(&path).await.map_err(|source| {
                    InvokeError::FileRead {
                        path: path.clone(),
                        source,
                    }
                })?;
                let file_name = Path::new(&path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.clone());

                let form = multipart::Form::new()
                    .part("file", multipart::Part::bytes(bytes).file_name(file_name));
                request = request.multipart(form);
            }
            PayloadKind::Body => {
                if !row.payload.trim().is_empty() {
                    request = request
                        .header(CONTENT_TYPE, "application/json")
                        .body(repair(&row.payload));
                }
            }
            PayloadKind::Query => {
                let payload = row.payload.trim();
                if !payload.is_empty() && payload != NO_PAYLOAD {
                    let normalized = payload.replace('\'', "\"");
                    let object: serde_json::Map<String, serde_json::Value> =
                        serde_json::from_str(&normalized)?;

                    let pairs: Vec<(String, String)> = object
                        .iter()
                        .map(|(key, value)| (key.clone(), value_text(value)))
                        .collect();
                    request = request.query(&pairs);
                }
            }
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|err| format!("Failed to read body: {err}"));

                Ok(InvokeOutcome { status, body })
            }
            Err(err) => Ok(InvokeOutcome {
                status: 0,
                body: format!("Unreachable endpoint. Network error: {err}"),
            }),
        }
    }
}

impl Default for HttpInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl Invoke for HttpInvoker {
    /// Total by contract: every invocation failure is folded into an
    /// `InvokeOutcome` so nothing escapes into the engine's row loop.
    async fn invoke(&self, row: &TestRow, token: &str) -> InvokeOutcome {
        match self.try_invoke(row, token).await {
            Ok(outcome) => outcome,
            Err(err) => InvokeOutcome {
                status: 0,
                body: err.to_string(),
            },
        }
    }
}

/// The payload cell for a file row is a quoted or braced path.
fn strip_file_path(payload: &str) -> String {
    payload.replace(['"', '{', '}'], "").trim().to_string()
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::HttpInvoker;
    use super::Invoke;
    use super::strip_file_path;
    use super::value_text;
    use crate::plan::Method;
    use crate::plan::PayloadKind;
    use crate::plan::TestRow;

    fn row(endpoint: &str, payload: &str, payload_kind: PayloadKind) -> TestRow {
        TestRow {
            endpoint: endpoint.into(),
            method: Method::Get,
            test_case: "test".into(),
            payload: payload.into(),
            payload_kind,
            expected_status: 200,
            expected_response: String::new(),
            actual_status: None,
            actual_response: None,
            outcome: None,
        }
    }

    #[test]
    fn strips_braces_and_quotes_from_file_paths() {
        assert_eq!(strip_file_path("{\"/tmp/data.csv\"}"), "/tmp/data.csv");
        assert_eq!(strip_file_path("  \"C:/files/a.txt\" "), "C:/files/a.txt");
        assert_eq!(strip_file_path("/tmp/plain.txt"), "/tmp/plain.txt");
    }

    #[test]
    fn query_values_render_without_json_quoting() {
        assert_eq!(value_text(&serde_json::json!("ola")), "ola");
        assert_eq!(value_text(&serde_json::json!(42)), "42");
        assert_eq!(value_text(&serde_json::json!(true)), "true");
        assert_eq!(value_text(&serde_json::Value::Null), "");
    }

    #[tokio::test]
    async fn missing_file_short_circuits_without_a_call() {
        let invoker = HttpInvoker::new();
        let row = row(
            "http://127.0.0.1:1/upload",
            "{\"/no/such/file.bin\"}",
            PayloadKind::File,
        );

        let outcome = invoker.invoke(&row, "token").await;

        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.body, "FILE NOT FOUND: /no/such/file.bin");
    }

    #[tokio::test]
    async fn malformed_query_payload_is_normalized_to_status_zero() {
        let invoker = HttpInvoker::new();
        let row = row("http://127.0.0.1:1/search", "{not json", PayloadKind::Query);

        let outcome = invoker.invoke(&row, "token").await;

        assert_eq!(outcome.status, 0);
        assert!(outcome.body.contains("query payload"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_normalized_to_status_zero() {
        let invoker = HttpInvoker::new();
        // Port 1 on loopback is never listening.
        let row = row("http://127.0.0.1:1/ping", "{}", PayloadKind::Query);

        let outcome = invoker.invoke(&row, "token").await;

        assert_eq!(outcome.status, 0);
        assert!(outcome.body.starts_with("Unreachable endpoint."));
    }

    #[tokio::test]
    async fn existing_file_reaches_the_transport_stage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "payload bytes").unwrap();
        let payload = format!("{{\"{}\"}}", file.path().display());

        let invoker = HttpInvoker::new();
        let row = row("http://127.0.0.1:1/upload", &payload, PayloadKind::File);

        let outcome = invoker.invoke(&row, "token").await;

        // The file was found, so the failure is the unreachable target,
        // not the missing-file short circuit.
        assert_eq!(outcome.status, 0);
        assert!(outcome.body.starts_with("Unreachable endpoint."));
    }

    #[tokio::test]
    async fn none_placeholder_sends_no_query_parameters() {
        let invoker = HttpInvoker::new();
        let row = row("http://127.0.0.1:1/ping", "(none)", PayloadKind::Query);

        let outcome = invoker.invoke(&row, "token").await;

        // "(none)" must not be parsed as JSON; the row fails on transport
        // like any other row pointed at a dead target.
        assert_eq!(outcome.status, 0);
        assert!(outcome.body.starts_with("Unreachable endpoint."));
    }
}
